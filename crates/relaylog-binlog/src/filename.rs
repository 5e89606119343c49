//! Binlog filename rules
//!
//! Files are named `<base>.<suffix>` where base is `[A-Za-z0-9_-]+` and the
//! suffix is exactly six decimal digits, e.g. `mysql-bin.000042`.

use std::cmp::Ordering;
use std::fmt;

/// Number of digits in a binlog filename suffix
pub const SUFFIX_DIGITS: usize = 6;

/// A parsed binlog filename
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinlogFilename {
    base: String,
    seq: u32,
}

impl BinlogFilename {
    /// Parse a filename, returning `None` if it breaks the naming rules
    pub fn parse(name: &str) -> Option<Self> {
        let (base, suffix) = name.rsplit_once('.')?;
        if base.is_empty()
            || !base
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return None;
        }
        if suffix.len() != SUFFIX_DIGITS || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self {
            base: base.to_string(),
            seq: suffix.parse().ok()?,
        })
    }

    /// Base name without the numeric suffix
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Numeric suffix
    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// The filename that follows this one, if the suffix has room left
    pub fn next(&self) -> Option<Self> {
        let seq = self.seq + 1;
        if seq >= 10u32.pow(SUFFIX_DIGITS as u32) {
            return None;
        }
        Some(Self {
            base: self.base.clone(),
            seq,
        })
    }
}

impl fmt::Display for BinlogFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.base, self.seq)
    }
}

impl PartialOrd for BinlogFilename {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BinlogFilename {
    fn cmp(&self, other: &Self) -> Ordering {
        self.base
            .cmp(&other.base)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Check a filename against `^[A-Za-z0-9_\-]+\.\d{6}$`
pub fn verify_filename(name: &str) -> bool {
    BinlogFilename::parse(name).is_some()
}
