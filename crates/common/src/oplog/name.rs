use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::crypto::{Tag, TAG_SIZE};

use super::OpLogError;

const LOG_PREFIX: &str = "log";
const CHECKPOINT_PREFIX: &str = "meta";
const CURRENT: &str = "current";
const TEMP: &str = "tmp";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetaKind {
    Log,
    Checkpoint,
}

/// Either the tag a file was sealed with, or the placeholder of a log
///  that is still open.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetaTag {
    Sealed(Tag),
    Current,
}

/// Name of a persisted log or checkpoint: `<log|meta>.<16 hex version>.<tag|current>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MetaName {
    pub kind: MetaKind,
    pub version: u64,
    pub tag: MetaTag,
}

impl MetaName {
    pub fn log(version: u64, tag: Tag) -> Self {
        Self {
            kind: MetaKind::Log,
            version,
            tag: MetaTag::Sealed(tag),
        }
    }

    pub fn current_log(version: u64) -> Self {
        Self {
            kind: MetaKind::Log,
            version,
            tag: MetaTag::Current,
        }
    }

    pub fn checkpoint(version: u64, tag: Tag) -> Self {
        Self {
            kind: MetaKind::Checkpoint,
            version,
            tag: MetaTag::Sealed(tag),
        }
    }

    /// Name a checkpoint is written under before its tag is known.
    pub fn temp_checkpoint(version: u64) -> String {
        format!("{CHECKPOINT_PREFIX}.{version:016x}.{TEMP}")
    }

    pub fn is_current(&self) -> bool {
        self.tag == MetaTag::Current
    }

    /// The tag a reader must verify, if one is known.
    pub fn expected_tag(&self) -> Option<Tag> {
        match self.tag {
            MetaTag::Sealed(tag) => Some(tag),
            MetaTag::Current => None,
        }
    }

    /// Replay order: by version, a sealed file before an open one.
    pub fn replay_order(&self, other: &Self) -> Ordering {
        self.version
            .cmp(&other.version)
            .then_with(|| self.is_current().cmp(&other.is_current()))
    }
}

impl fmt::Display for MetaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            MetaKind::Log => LOG_PREFIX,
            MetaKind::Checkpoint => CHECKPOINT_PREFIX,
        };
        match &self.tag {
            MetaTag::Sealed(tag) => write!(f, "{}.{:016x}.{}", prefix, self.version, tag),
            MetaTag::Current => write!(f, "{}.{:016x}.{}", prefix, self.version, CURRENT),
        }
    }
}

impl FromStr for MetaName {
    type Err = OpLogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || OpLogError::InvalidName(s.to_string());

        let mut parts = s.split('.');
        let (Some(prefix), Some(version), Some(tag), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let kind = match prefix {
            LOG_PREFIX => MetaKind::Log,
            CHECKPOINT_PREFIX => MetaKind::Checkpoint,
            _ => return Err(invalid()),
        };
        // only the zero-padded lowercase form maps back to the same object
        if version.len() != 16 || !is_lower_hex(version) {
            return Err(invalid());
        }
        let version = u64::from_str_radix(version, 16).map_err(|_| invalid())?;

        let tag = if tag == CURRENT && kind == MetaKind::Log {
            MetaTag::Current
        } else if tag.len() == TAG_SIZE * 2 && is_lower_hex(tag) {
            MetaTag::Sealed(Tag::from_hex(tag).map_err(|_| invalid())?)
        } else {
            return Err(invalid());
        };

        Ok(Self { kind, version, tag })
    }
}

fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
