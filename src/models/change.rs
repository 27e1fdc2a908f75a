//! Change categories produced by the classifier.

use std::fmt;

/// How a fetched document differs from the previous one.
///
/// Computed fresh on every scan and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeCategory {
    /// First scan, nothing to compare against
    NewContent,
    NoChange,
    MinorChange,
    MajorChange,
}

impl fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeCategory::NewContent => "new content",
            ChangeCategory::NoChange => "no change",
            ChangeCategory::MinorChange => "minor change",
            ChangeCategory::MajorChange => "major change",
        };
        f.write_str(label)
    }
}

/// Which stored document slot of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotSlot {
    /// Baseline captured when a change was first detected
    Old,
    /// Most recent successful fetch
    New,
}

impl SnapshotSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotSlot::Old => "old",
            SnapshotSlot::New => "new",
        }
    }
}
