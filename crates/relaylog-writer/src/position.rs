//! Position validation
//!
//! Pure decisions about where an incoming event lands relative to the
//! current write offset. Nothing here touches the filesystem.

/// Where an event falls relative to the write offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Event starts exactly at the write offset
    Append,
    /// Event starts past the write offset; `size` bytes are missing
    Hole { size: u32 },
    /// Event starts before the write offset
    Overlap,
}

/// Classify an event starting at `start` against write offset `cur`
pub fn classify(start: u64, cur: u64) -> Placement {
    match start.cmp(&cur) {
        std::cmp::Ordering::Equal => Placement::Append,
        std::cmp::Ordering::Greater => Placement::Hole {
            // start comes from a u32 log position, so the gap fits
            size: (start - cur).min(u32::MAX as u64) as u32,
        },
        std::cmp::Ordering::Less => Placement::Overlap,
    }
}

/// Outcome of comparing stored bytes with an overlapping event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateCheck {
    /// Stored range is byte-identical to the event
    Match,
    /// Stored range differs from the event or is missing
    Mismatch(String),
}

/// Compare the bytes stored at the event's range with its encoding
///
/// `stored` is `None` when the file does not cover the whole range.
pub fn compare_stored(stored: Option<&[u8]>, candidate: &[u8]) -> DuplicateCheck {
    let Some(stored) = stored else {
        return DuplicateCheck::Mismatch("stored range does not exist in the file".into());
    };
    if stored.len() != candidate.len() {
        return DuplicateCheck::Mismatch(format!(
            "stored range has {} bytes, event has {}",
            stored.len(),
            candidate.len()
        ));
    }
    match stored.iter().zip(candidate).position(|(a, b)| a != b) {
        None => DuplicateCheck::Match,
        Some(at) => DuplicateCheck::Mismatch(format!(
            "stored bytes differ from the event at byte {}",
            at
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify(123, 123), Placement::Append);
        assert_eq!(classify(152, 123), Placement::Hole { size: 29 });
        assert_eq!(classify(4, 123), Placement::Overlap);
    }

    #[test]
    fn test_compare_match() {
        assert_eq!(compare_stored(Some(b"abcdef"), b"abcdef"), DuplicateCheck::Match);
    }

    #[test]
    fn test_compare_mismatch() {
        match compare_stored(Some(b"abcdef"), b"abcxef") {
            DuplicateCheck::Mismatch(reason) => assert!(reason.contains("byte 3")),
            DuplicateCheck::Match => panic!("expected mismatch"),
        }
        assert!(matches!(
            compare_stored(Some(b"abc"), b"abcd"),
            DuplicateCheck::Mismatch(_)
        ));
    }

    #[test]
    fn test_compare_missing_range() {
        assert!(matches!(
            compare_stored(None, b"abc"),
            DuplicateCheck::Mismatch(reason) if reason.contains("does not exist")
        ));
    }
}
