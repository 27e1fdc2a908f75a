//! Content normalization applied before comparison.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;
use scraper::Html;

/// Placeholder every digit run collapses to.
pub const NUMBER_PLACEHOLDER: &str = "#";

/// Elements whose text never reaches the reader.
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

fn digit_runs() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"\d+").expect("digit pattern is valid"))
}

/// Collapse each maximal run of digits into a single placeholder.
pub fn collapse_numbers(text: &str) -> Cow<'_, str> {
    digit_runs().replace_all(text, NUMBER_PLACEHOLDER)
}

/// Reduce a document to its visible text.
///
/// Script and style content, tags and comments are dropped. Whitespace runs
/// become a single space. Plain text input comes back whitespace-collapsed.
pub fn visible_text(document: &str) -> String {
    let html = Html::parse_document(document);
    let mut words: Vec<&str> = Vec::new();

    for node in html.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }

    words.join(" ")
}
