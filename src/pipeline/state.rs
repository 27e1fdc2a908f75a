//! Page state machine.
//!
//! | current  | NewContent | NoChange | MinorChange | MajorChange |
//! |----------|------------|----------|-------------|-------------|
//! | NoChange | NoChange   | NoChange | NoChange    | Changed     |
//! | Changed  | Changed    | Changed  | Changed     | Changed     |
//!
//! Scan results only ever move a page into `Changed`. Leaving it requires
//! an acknowledgment (`Page::acknowledge`).

use crate::models::{ChangeCategory, PageState};

/// Outcome of feeding one classification into the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: PageState,
    /// Copy the pre-scan NEW snapshot into OLD before overwriting NEW.
    pub promote_baseline: bool,
    /// Store the fetched document as the NEW snapshot.
    pub write_new: bool,
}

/// Compute the next state and the snapshot writes for a classification.
pub fn transition(current: PageState, category: ChangeCategory) -> Transition {
    let next = match (current, category) {
        (PageState::Changed, _) => PageState::Changed,
        (PageState::NoChange, ChangeCategory::MajorChange) => PageState::Changed,
        (PageState::NoChange, _) => PageState::NoChange,
    };

    Transition {
        next,
        // Baseline is captured once, when the change is first seen.
        promote_baseline: category == ChangeCategory::MajorChange
            && current != PageState::Changed,
        write_new: true,
    }
}
