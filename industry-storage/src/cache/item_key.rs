//! Group-scoped item keys for the LMDB `items` database.
//!
//! Every item key starts with its owning group's id, so a group's items are
//! contiguous in key order and a cascade delete is a prefix scan.

use industry_core::{GroupId, ItemId};

/// Separator byte between group_id and item_id.
const SEPARATOR: u8 = 0xFF;

/// Encoded key length.
pub const ITEM_KEY_LEN: usize = 33;

/// Group prefix length.
pub const GROUP_PREFIX_LEN: usize = 17;

/// Key of one cached item.
///
/// # Binary Format
///
/// - Bytes 0-15: group_id (UUID as bytes)
/// - Byte 16: separator (0xFF)
/// - Bytes 17-32: item_id (UUIDv7 as bytes)
///
/// UUIDv7 item ids keep a group's items in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemKey {
    group_id: GroupId,
    item_id: ItemId,
}

impl ItemKey {
    pub fn new(group_id: GroupId, item_id: ItemId) -> Self {
        Self { group_id, item_id }
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    /// Encode this key to a fixed-size byte array for LMDB storage.
    pub fn encode(&self) -> [u8; ITEM_KEY_LEN] {
        let mut bytes = [0u8; ITEM_KEY_LEN];
        bytes[0..16].copy_from_slice(self.group_id.as_bytes());
        bytes[16] = SEPARATOR;
        bytes[17..33].copy_from_slice(self.item_id.as_bytes());
        bytes
    }

    /// Decode a key from bytes.
    ///
    /// Returns `None` on a wrong length or a missing separator.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != ITEM_KEY_LEN || bytes[16] != SEPARATOR {
            return None;
        }

        let group_id = GroupId::from_slice(&bytes[0..16]).ok()?;
        let item_id = ItemId::from_slice(&bytes[17..33]).ok()?;
        Some(Self { group_id, item_id })
    }

    /// Prefix shared by every item key of a group.
    pub fn group_prefix(group_id: GroupId) -> [u8; GROUP_PREFIX_LEN] {
        let mut prefix = [0u8; GROUP_PREFIX_LEN];
        prefix[0..16].copy_from_slice(group_id.as_bytes());
        prefix[16] = SEPARATOR;
        prefix
    }
}
