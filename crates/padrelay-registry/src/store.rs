//! Room-scoped blob storage.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;

/// Identifies one stored blob. File names are kept as the raw bytes the
/// client sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlobKey {
    File(Bytes),
    ControllerSettings,
    GfxSettings,
    Custom(u8),
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(name) => write!(f, "file {:?}", String::from_utf8_lossy(name)),
            Self::ControllerSettings => f.write_str("controller settings"),
            Self::GfxSettings => f.write_str("gfx settings"),
            Self::Custom(slot) => write!(f, "custom slot {slot}"),
        }
    }
}

/// Every blob uploaded to a room. Uploads always overwrite.
#[derive(Debug, Default)]
pub struct BlobStore {
    blobs: HashMap<BlobKey, Bytes>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `data` under `key`. Returns `true` if it replaced a value.
    pub fn put(&mut self, key: BlobKey, data: Bytes) -> bool {
        self.blobs.insert(key, data).is_some()
    }

    /// Cheap clone of the stored bytes.
    pub fn get(&self, key: &BlobKey) -> Option<Bytes> {
        self.blobs.get(key).cloned()
    }

    pub fn contains(&self, key: &BlobKey) -> bool {
        self.blobs.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_overwrites() {
        let mut store = BlobStore::new();
        let key = BlobKey::File("save.eep".into());
        assert!(!store.put(key.clone(), Bytes::from_static(b"one")));
        assert!(store.put(key.clone(), Bytes::from_static(b"two")));
        assert_eq!(store.get(&key), Some(Bytes::from_static(b"two")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_keys_are_distinct() {
        let mut store = BlobStore::new();
        store.put(BlobKey::Custom(0), Bytes::from_static(b"c"));
        assert!(!store.contains(&BlobKey::Custom(1)));
        assert!(!store.contains(&BlobKey::GfxSettings));
        assert!(store.get(&BlobKey::File(Bytes::new())).is_none());
    }

    #[test]
    fn test_key_display() {
        assert_eq!(BlobKey::File("a".into()).to_string(), "file \"a\"");
        assert_eq!(
            BlobKey::File(Bytes::from_static(&[b'a', 0xff])).to_string(),
            "file \"a\u{fffd}\""
        );
        assert_eq!(BlobKey::Custom(7).to_string(), "custom slot 7");
    }
}
