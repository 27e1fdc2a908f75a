//! Change classification.
//!
//! Wraps the fuzzy comparator with the page-level rules:
//! 1. an empty baseline means first scan (`NewContent`),
//! 2. exact equality short-circuits to `NoChange` before any diff work,
//! 3. optional normalization (markup stripping, digit collapsing),
//! 4. the threshold decides between minor and major.

use std::borrow::Cow;

use crate::models::{ChangeCategory, Page};
use crate::pipeline::content::{collapse_numbers, visible_text};
use crate::pipeline::fuzzy::is_major_change;

/// Classification settings for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classifier {
    /// Changed characters needed for a major change
    pub threshold: u32,
    /// Collapse digit runs before comparing
    pub ignore_numbers: bool,
    /// Compare visible text instead of raw markup
    pub strip_markup: bool,
}

impl Classifier {
    pub fn new(threshold: u32, ignore_numbers: bool) -> Self {
        Self {
            threshold,
            ignore_numbers,
            strip_markup: false,
        }
    }

    /// Settings taken from a page's configuration.
    pub fn for_page(page: &Page, strip_markup: bool) -> Self {
        Self {
            threshold: page.change_threshold,
            ignore_numbers: page.ignore_numbers,
            strip_markup,
        }
    }

    /// Classify `new` against the previous document `old`.
    pub fn classify(&self, old: &str, new: &str) -> ChangeCategory {
        // Emptiness first: two empty documents are still a first scan.
        if old.is_empty() {
            return ChangeCategory::NewContent;
        }
        if old == new {
            return ChangeCategory::NoChange;
        }

        let old = self.normalize(old);
        let new = self.normalize(new);

        if old == new {
            ChangeCategory::NoChange
        } else if is_major_change(&old, &new, self.threshold) {
            ChangeCategory::MajorChange
        } else {
            ChangeCategory::MinorChange
        }
    }

    fn normalize<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let text = if self.strip_markup {
            Cow::Owned(visible_text(text))
        } else {
            Cow::Borrowed(text)
        };

        if !self.ignore_numbers {
            return text;
        }
        match text {
            Cow::Borrowed(raw) => collapse_numbers(raw),
            Cow::Owned(owned) => Cow::Owned(collapse_numbers(&owned).into_owned()),
        }
    }
}

/// Classify a fetch against the previous document.
pub fn classify(old: &str, new: &str, threshold: u32, ignore_numbers: bool) -> ChangeCategory {
    Classifier::new(threshold, ignore_numbers).classify(old, new)
}
