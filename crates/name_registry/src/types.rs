//! Types for the name registry

use serde::{Deserialize, Serialize};
use somnia_types::Address;

/// Every registrable name ends with this suffix.
pub const NAME_SUFFIX: &str = ".somnia";

/// Names must be strictly longer than this many bytes, which puts the
/// shortest accepted label at three characters (`abc.somnia`).
pub const NAME_LENGTH_FLOOR: usize = 9;

/// Check the on-chain name format.
///
/// A valid name ends with [`NAME_SUFFIX`], is longer than
/// [`NAME_LENGTH_FLOOR`] bytes, and its label (everything before the suffix)
/// is made only of ASCII letters, digits and hyphens. There is no upper
/// length bound. Matching is case-sensitive and nothing is normalised.
pub fn is_valid_name(name: &str) -> bool {
    if name.len() <= NAME_LENGTH_FLOOR {
        return false;
    }
    let Some(label) = name.strip_suffix(NAME_SUFFIX) else {
        return false;
    };
    !label.is_empty()
        && label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// Stored entry for a registered name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRecord {
    /// Current owner
    pub owner: Address,
    /// Block time of registration, in seconds
    pub registered_at: u64,
}

/// Non-failing view of a name, used for existence checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameInfo {
    pub owner: Address,
    pub registered_at: u64,
    pub exists: bool,
}

impl NameInfo {
    /// What an unregistered name reports: zero owner, zero time.
    pub fn absent() -> Self {
        Self {
            owner: Address::ZERO,
            registered_at: 0,
            exists: false,
        }
    }
}

impl From<&NameRecord> for NameInfo {
    fn from(record: &NameRecord) -> Self {
        Self {
            owner: record.owner,
            registered_at: record.registered_at,
            exists: true,
        }
    }
}
