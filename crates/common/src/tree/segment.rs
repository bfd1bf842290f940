use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::crypto::{Tag, TAG_SIZE};

/// Number of hex characters used for the directory fan-out of segment objects
pub const SEGMENT_PREFIX_LEN: usize = 3;

/// Content address of a sealed segment: the tag produced when it was encrypted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentId([u8; TAG_SIZE]);

impl SegmentId {
    pub fn as_bytes(&self) -> &[u8; TAG_SIZE] {
        &self.0
    }

    /// The tag a decryptor must see for this segment to be authentic.
    pub fn tag(&self) -> Tag {
        Tag::from(self.0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Object path relative to the data root: `<3 hex>/<61 hex>`.
    pub fn object_key(&self) -> String {
        let hex = self.to_hex();
        let (prefix, rest) = hex.split_at(SEGMENT_PREFIX_LEN);
        format!("{prefix}/{rest}")
    }

    pub fn prefix(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(SEGMENT_PREFIX_LEN);
        hex
    }
}

impl From<Tag> for SegmentId {
    fn from(tag: Tag) -> Self {
        Self(*tag.as_bytes())
    }
}

impl From<[u8; TAG_SIZE]> for SegmentId {
    fn from(bytes: [u8; TAG_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SegmentId({})", self.to_hex())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid segment id: {0}")]
pub struct ParseSegmentIdError(String);

impl FromStr for SegmentId {
    type Err = ParseSegmentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != TAG_SIZE * 2 || s.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(ParseSegmentIdError(s.to_string()));
        }
        let mut buff = [0u8; TAG_SIZE];
        hex::decode_to_slice(s, &mut buff).map_err(|_| ParseSegmentIdError(s.to_string()))?;
        Ok(Self(buff))
    }
}

/// One immutable piece of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub id: SegmentId,
    /// Plaintext length, always > 0
    pub size: u32,
}

impl SegmentInfo {
    pub fn new(id: SegmentId, size: u32) -> Self {
        Self { id, size }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_object_key() {
        let id = SegmentId::from([0xabu8; TAG_SIZE]);
        let key = id.object_key();
        assert_eq!(&key[..4], "aba/");
        assert_eq!(key.len(), 64 + 1);
        assert_eq!(id.prefix(), "aba");
    }

    #[test]
    fn test_parse() {
        let id = SegmentId::from([0x01u8; TAG_SIZE]);
        assert_eq!(id.to_string().parse::<SegmentId>().unwrap(), id);
        assert!("0101".parse::<SegmentId>().is_err());
        assert!(id.to_string().to_uppercase().parse::<SegmentId>().is_err());
    }
}
