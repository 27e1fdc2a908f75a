//! Fuzzy text comparison.
//!
//! Measures how many characters (extended grapheme clusters) were inserted
//! or deleted between two documents, and checks that count against a
//! threshold.
//!
//! Small edits are measured exactly with a Myers O(ND) diff over graphemes.
//! Large documents are first split into word-boundary tokens. The common
//! prefix and suffix are trimmed, and the remaining tokens are diffed with a
//! work-bounded Myers pass. Each changed hunk is refined at grapheme level
//! while a per-comparison work budget lasts, and counts its full length
//! after that. If the token diff exceeds its edit budget, tokens occurring
//! exactly once on each side are used as anchors. The heaviest in-order
//! chain of anchors is kept and every gap between them is charged as a hunk.
//!
//! Every path only ever counts spans it cannot match, so the result never
//! falls below the exact edit distance.

use std::collections::HashMap;

use unicode_segmentation::UnicodeSegmentation;

/// Largest side (in graphemes) measured with an exact grapheme diff.
pub const CHAR_DIFF_LIMIT: usize = 4096;

/// Upper bound on token edits explored before falling back to anchors.
pub const MAX_TOKEN_EDITS: usize = 1024;

/// Budget for `(n + m) * d` in the token-level diff.
const DIFF_WORK_BUDGET: usize = 50_000_000;

/// Budget for `(n + m) * d` across all grapheme-level hunk refinements of
/// one comparison.
const REFINE_WORK_BUDGET: usize = 80_000_000;

/// Number of inserted plus deleted characters between two texts.
///
/// Deterministic, symmetric in its arguments, and zero only for equal input.
pub fn change_magnitude(old: &str, new: &str) -> usize {
    if old == new {
        return 0;
    }

    // Fixed argument order keeps the measure symmetric.
    let (a, b) = if old <= new { (old, new) } else { (new, old) };

    let a_tokens: Vec<&str> = a.split_word_bounds().collect();
    let b_tokens: Vec<&str> = b.split_word_bounds().collect();
    let (a_mid, b_mid) = trim_common(&a_tokens, &b_tokens);

    diff_tokens(a_mid, b_mid)
}

/// Whether the change between two texts reaches `threshold` characters.
///
/// Identical texts are never a major change, even with a threshold of 0.
pub fn is_major_change(old: &str, new: &str, threshold: u32) -> bool {
    let magnitude = change_magnitude(old, new);
    magnitude > 0 && magnitude >= threshold as usize
}

fn diff_tokens(a: &[&str], b: &[&str]) -> usize {
    let mut budget = RefineBudget::new();
    if a.is_empty() || b.is_empty() || (fits_char_diff(a) && fits_char_diff(b)) {
        return budget.hunk(a, b);
    }

    let mut ids: HashMap<&str, usize> = HashMap::new();
    let a_ids: Vec<usize> = a.iter().map(|t| intern(&mut ids, *t)).collect();
    let b_ids: Vec<usize> = b.iter().map(|t| intern(&mut ids, *t)).collect();

    let max_d = MAX_TOKEN_EDITS
        .min(DIFF_WORK_BUDGET / (a.len() + b.len()))
        .max(1);

    match myers_script(&a_ids, &b_ids, max_d) {
        Some(ops) => hunk_total(&ops, a, b, &mut budget),
        None => {
            log::debug!(
                "Token diff exceeded {} edits ({} vs {} tokens), using anchored comparison",
                max_d,
                a.len(),
                b.len()
            );
            anchored_magnitude(a, b, &a_ids, &b_ids, ids.len(), &mut budget)
        }
    }
}

fn intern<'a>(ids: &mut HashMap<&'a str, usize>, token: &'a str) -> usize {
    let next = ids.len();
    *ids.entry(token).or_insert(next)
}

/// Sum the changed hunks of an edit script.
fn hunk_total(ops: &[Op], a: &[&str], b: &[&str], budget: &mut RefineBudget) -> usize {
    let mut total = 0;
    let mut deleted: Vec<&str> = Vec::new();
    let mut inserted: Vec<&str> = Vec::new();

    for op in ops {
        match *op {
            Op::Equal => {
                total += budget.hunk(&deleted, &inserted);
                deleted.clear();
                inserted.clear();
            }
            Op::Delete(i) => deleted.push(a[i]),
            Op::Insert(j) => inserted.push(b[j]),
        }
    }

    total + budget.hunk(&deleted, &inserted)
}

/// Grapheme-level refinement with a shared work allowance.
struct RefineBudget {
    remaining: usize,
}

impl RefineBudget {
    fn new() -> Self {
        Self {
            remaining: REFINE_WORK_BUDGET,
        }
    }

    /// Edit distance of one hunk, or its full length when it is too large
    /// or the allowance is spent.
    fn hunk(&mut self, deleted: &[&str], inserted: &[&str]) -> usize {
        if deleted.is_empty()
            || inserted.is_empty()
            || !(fits_char_diff(deleted) && fits_char_diff(inserted))
        {
            return grapheme_count(deleted) + grapheme_count(inserted);
        }

        let a = graphemes(deleted);
        let b = graphemes(inserted);
        let (a, b) = trim_common(&a, &b);
        let full = a.len() + b.len();
        if a.is_empty() || b.is_empty() {
            return full;
        }

        let max_d = (self.remaining / full).min(full);
        match myers_distance(a, b, max_d) {
            Some(d) => {
                self.remaining = self.remaining.saturating_sub(full * (d + 1));
                d
            }
            None => {
                self.remaining = self.remaining.saturating_sub(full * (max_d + 1));
                full
            }
        }
    }
}

/// Anchored comparison for token sequences too far apart for Myers.
///
/// Tokens that occur exactly once on each side are anchor candidates. The
/// in-order chain with the most matched graphemes is kept, and the gaps
/// between consecutive anchors are measured as hunks.
fn anchored_magnitude(
    a: &[&str],
    b: &[&str],
    a_ids: &[usize],
    b_ids: &[usize],
    id_count: usize,
    budget: &mut RefineBudget,
) -> usize {
    let mut a_count = vec![0u32; id_count];
    let mut b_count = vec![0u32; id_count];
    let mut b_pos = vec![0usize; id_count];
    for &id in a_ids {
        a_count[id] += 1;
    }
    for (j, &id) in b_ids.iter().enumerate() {
        b_count[id] += 1;
        b_pos[id] = j;
    }

    let candidates: Vec<(usize, usize, usize)> = a_ids
        .iter()
        .enumerate()
        .filter(|(_, id)| a_count[**id] == 1 && b_count[**id] == 1)
        .map(|(i, &id)| (i, b_pos[id], a[i].graphemes(true).count()))
        .collect();

    let mut total = 0;
    let (mut i, mut j) = (0, 0);
    for (anchor_a, anchor_b) in heaviest_chain(&candidates, b.len()) {
        total += gap_magnitude(&a[i..anchor_a], &b[j..anchor_b], budget);
        i = anchor_a + 1;
        j = anchor_b + 1;
    }
    total + gap_magnitude(&a[i..], &b[j..], budget)
}

fn gap_magnitude(a: &[&str], b: &[&str], budget: &mut RefineBudget) -> usize {
    let (a, b) = trim_common(a, b);
    budget.hunk(a, b)
}

/// Heaviest subsequence of `(a_pos, b_pos, weight)` candidates (given in
/// `a_pos` order) that is also increasing in `b_pos`.
fn heaviest_chain(candidates: &[(usize, usize, usize)], b_len: usize) -> Vec<(usize, usize)> {
    let mut tree = MaxTree::new(b_len);
    let mut previous = vec![None; candidates.len()];
    let mut best: Option<(usize, usize)> = None;

    for (index, &(_, b_pos, weight)) in candidates.iter().enumerate() {
        let (before, link) = tree.query(b_pos);
        let chain = before + weight;
        previous[index] = link;
        tree.update(b_pos, chain, index);
        if best.is_none_or(|(heaviest, _)| chain > heaviest) {
            best = Some((chain, index));
        }
    }

    let mut chain = Vec::new();
    let mut cursor = best.map(|(_, index)| index);
    while let Some(index) = cursor {
        let (a_pos, b_pos, _) = candidates[index];
        chain.push((a_pos, b_pos));
        cursor = previous[index];
    }
    chain.reverse();
    chain
}

/// Fenwick tree of prefix maxima over `b` positions.
struct MaxTree {
    nodes: Vec<(usize, Option<usize>)>,
}

impl MaxTree {
    fn new(len: usize) -> Self {
        Self {
            nodes: vec![(0, None); len + 1],
        }
    }

    /// Best chain ending strictly before position `end`.
    fn query(&self, end: usize) -> (usize, Option<usize>) {
        let mut best = (0, None);
        let mut i = end;
        while i > 0 {
            if self.nodes[i].0 > best.0 {
                best = self.nodes[i];
            }
            i &= i - 1;
        }
        best
    }

    fn update(&mut self, pos: usize, weight: usize, index: usize) {
        let mut i = pos + 1;
        while i < self.nodes.len() {
            if weight > self.nodes[i].0 {
                self.nodes[i] = (weight, Some(index));
            }
            i += i & i.wrapping_neg();
        }
    }
}

fn graphemes<'a>(tokens: &[&'a str]) -> Vec<&'a str> {
    tokens.iter().copied().flat_map(|t| t.graphemes(true)).collect()
}

fn grapheme_count(tokens: &[&str]) -> usize {
    tokens.iter().map(|t| t.graphemes(true).count()).sum()
}

fn fits_char_diff(tokens: &[&str]) -> bool {
    let bytes: usize = tokens.iter().map(|t| t.len()).sum();
    bytes <= CHAR_DIFF_LIMIT || grapheme_count(tokens) <= CHAR_DIFF_LIMIT
}

fn trim_common<'a, T: PartialEq>(a: &'a [T], b: &'a [T]) -> (&'a [T], &'a [T]) {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let (a, b) = (&a[prefix..], &b[prefix..]);

    let suffix = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    (&a[..a.len() - suffix], &b[..b.len() - suffix])
}

/// Single step of an edit script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal,
    Delete(usize),
    Insert(usize),
}

/// Index of the furthest-reaching x on diagonal `k` for edit count `d`.
fn next_x(v: &[isize], k: isize, d: isize, offset: isize) -> isize {
    let down = v[(k + 1 + offset) as usize];
    if k == -d || (k != d && v[(k - 1 + offset) as usize] < down) {
        down
    } else {
        v[(k - 1 + offset) as usize] + 1
    }
}

/// Myers edit distance in linear space. `None` when more than `max_d` edits.
fn myers_distance<T: PartialEq>(a: &[T], b: &[T], max_d: usize) -> Option<usize> {
    let (n, m) = (a.len() as isize, b.len() as isize);
    let limit = max_d.min(a.len() + b.len());
    let offset = limit as isize + 1;
    let mut v = vec![0isize; 2 * limit + 3];

    for d in 0..=limit as isize {
        let mut k = -d;
        while k <= d {
            let mut x = next_x(&v, k, d, offset);
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[(k + offset) as usize] = x;
            if x >= n && y >= m {
                return Some(d as usize);
            }
            k += 2;
        }
    }
    None
}

/// Myers diff with a recorded trace. `None` when more than `max_d` edits.
fn myers_script<T: PartialEq>(a: &[T], b: &[T], max_d: usize) -> Option<Vec<Op>> {
    let (n, m) = (a.len() as isize, b.len() as isize);
    let limit = max_d.min(a.len() + b.len());
    let offset = limit as isize + 1;
    let mut v = vec![0isize; 2 * limit + 3];
    let mut trace: Vec<Vec<isize>> = Vec::new();
    let mut found = None;

    'search: for d in 0..=limit as isize {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let mut x = next_x(&v, k, d, offset);
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[(k + offset) as usize] = x;
            if x >= n && y >= m {
                found = Some(d);
                break 'search;
            }
            k += 2;
        }
    }

    let edits = found?;
    let mut ops = Vec::with_capacity((n + m) as usize);
    let (mut x, mut y) = (n, m);

    for d in (0..=edits).rev() {
        let v = &trace[d as usize];
        let k = x - y;
        let prev_k = if k == -d
            || (k != d && v[(k - 1 + offset) as usize] < v[(k + 1 + offset) as usize])
        {
            k + 1
        } else {
            k - 1
        };
        let prev_x = v[(prev_k + offset) as usize];
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
            ops.push(Op::Equal);
        }
        if d > 0 {
            if x == prev_x {
                y -= 1;
                ops.push(Op::Insert(y as usize));
            } else {
                x -= 1;
                ops.push(Op::Delete(x as usize));
            }
        }
    }

    ops.reverse();
    Some(ops)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(lines: usize, word: &str) -> String {
        (0..lines)
            .map(|i| format!("line {i} of the {word} body\n"))
            .collect()
    }

    #[test]
    fn test_identical_is_zero() {
        assert_eq!(change_magnitude("same text", "same text"), 0);
        assert_eq!(change_magnitude("", ""), 0);
        assert!(!is_major_change("same", "same", 0));
    }

    #[test]
    fn test_counts_inserted_and_deleted_characters() {
        assert_eq!(change_magnitude("abc", "abd"), 2);
        assert_eq!(change_magnitude("", "hello"), 5);
        assert_eq!(change_magnitude("hello world", "hello"), 6);
        assert_eq!(change_magnitude("kitten", "sitting"), 5);
    }

    #[test]
    fn test_graphemes_count_once() {
        assert_eq!(change_magnitude("caf\u{e9}", "cafe"), 2);
        assert_eq!(change_magnitude("cafe\u{301}", "cafe"), 2);
    }

    #[test]
    fn test_symmetric() {
        let pairs = [
            ("abc", "abd"),
            ("The quick brown fox", "The quick red fox jumps"),
            ("", "x"),
            ("1234", "4321"),
        ];
        for (a, b) in pairs {
            assert_eq!(change_magnitude(a, b), change_magnitude(b, a), "{a:?} {b:?}");
        }

        let big_a = document(3000, "original");
        let big_b = document(3000, "updated");
        assert_eq!(
            change_magnitude(&big_a, &big_b),
            change_magnitude(&big_b, &big_a)
        );
    }

    #[test]
    fn test_deterministic() {
        let a = document(500, "alpha");
        let b = document(400, "beta");
        let first = change_magnitude(&a, &b);
        for _ in 0..3 {
            assert_eq!(change_magnitude(&a, &b), first);
        }
    }

    #[test]
    fn test_threshold_boundary() {
        // "aaaa" -> "aaaabb" inserts exactly 2 characters.
        assert_eq!(change_magnitude("aaaa", "aaaabb"), 2);
        assert!(is_major_change("aaaa", "aaaabb", 2));
        assert!(!is_major_change("aaaa", "aaaabb", 3));
        assert!(is_major_change("aaaa", "aaaabb", 0));
    }

    #[test]
    fn test_monotonic_in_added_content() {
        let base = "The page lists three items.";
        let small = format!("{base} A fourth item.");
        let large = format!("{base} A fourth item. And a fifth one as well.");
        assert!(change_magnitude(base, &small) <= change_magnitude(base, &large));
    }

    fn block(word: &str, separator: char, words: usize) -> String {
        (0..words).map(|i| format!("{word}{i:04}{separator}")).collect()
    }

    /// Content sharing no grapheme with `block` output: two tokens per unit.
    fn distinct(units: usize) -> String {
        "QZX|".repeat(units)
    }

    #[test]
    fn test_monotonic_on_token_path() {
        let old = document(300, "page");
        assert!(old.len() > CHAR_DIFF_LIMIT);
        let edited = old.replacen("line 100 of", "line hundred of", 1);

        let mut previous = 0;
        for units in [0, 5, 50, 500] {
            let new = format!("{edited}{}", distinct(units));
            let magnitude = change_magnitude(&old, &new);
            assert!(magnitude > previous, "{units} units: {magnitude} <= {previous}");
            previous = magnitude;
        }
    }

    #[test]
    fn test_monotonic_across_token_edit_limit() {
        let first = block("alpha", '\n', 250);
        let second = block("gamma", ';', 250);
        let old = format!("{first}{second}");

        // Swapping the halves costs about 1000 token edits. The extra units
        // push the token diff past MAX_TOKEN_EDITS.
        let swapped = change_magnitude(&old, &format!("{second}{first}"));
        let extended = change_magnitude(&old, &format!("{second}{first}{}", distinct(40)));

        assert!(swapped > 0);
        assert!(extended >= swapped, "{extended} < {swapped}");
        assert!(extended >= second.len() * 2);
    }

    #[test]
    fn test_reordered_halves_are_not_zero() {
        let first = block("alpha", '\n', 700);
        let second = block("gamma", ';', 700);
        let old = format!("{first}{second}");
        let new = format!("{second}{first}");

        let magnitude = change_magnitude(&old, &new);
        assert!(magnitude >= first.len(), "magnitude was {magnitude}");
        assert_eq!(magnitude, change_magnitude(&new, &old));
        assert!(is_major_change(&old, &new, 100));
    }

    #[test]
    fn test_heaviest_chain_prefers_matched_weight() {
        // Either of the two crossing anchors can be kept; the heavier wins.
        let candidates = [(0, 1, 3), (1, 0, 9)];
        assert_eq!(heaviest_chain(&candidates, 2), vec![(1, 0)]);

        let ordered = [(0, 0, 1), (1, 2, 1), (2, 1, 5), (3, 3, 1)];
        assert_eq!(heaviest_chain(&ordered, 4), vec![(0, 0), (2, 1), (3, 3)]);
    }

    #[test]
    fn test_large_document_single_edit_is_exact() {
        let old = document(20_000, "document");
        let new = old.replacen("line 12345 of the document", "line 12345 of the dokument", 1);
        assert_ne!(old, new);
        assert_eq!(change_magnitude(&old, &new), 2);
    }

    #[test]
    fn test_large_document_scattered_edits() {
        let old = document(20_000, "document");
        let new = old
            .replacen("line 10 of", "line ten of", 1)
            .replacen("line 19990 of", "line 19990 (edited) of", 1);

        let magnitude = change_magnitude(&old, &new);
        assert!(magnitude > 0);
        assert!(magnitude < 40, "magnitude was {magnitude}");
    }

    #[test]
    fn test_unrelated_large_documents_fall_back() {
        let old: String = (0..60_000).map(|i| format!("a{i} ")).collect();
        let new: String = (0..60_000).map(|i| format!("b{i} ")).collect();

        let magnitude = change_magnitude(&old, &new);
        assert_eq!(magnitude, change_magnitude(&new, &old));
        assert!(magnitude > 100_000);
        assert!(is_major_change(&old, &new, 100));
    }

    #[test]
    fn test_refine_budget_is_shared_across_hunks() {
        let mut budget = RefineBudget { remaining: 1000 };
        assert_eq!(budget.hunk(&["kitten"], &["sitting"]), 5);
        assert_eq!(budget.remaining, 922);

        // Once spent, hunks count their full length.
        budget.remaining = 13;
        assert_eq!(budget.hunk(&["kitten"], &["sitting"]), 13);
        assert_eq!(budget.remaining, 0);
        assert_eq!(budget.hunk(&["kitten"], &["sitting"]), 13);
    }

    #[test]
    fn test_many_long_hunks_stay_exact() {
        let word = |i: usize, fill: &str| format!("{i:06}{}", fill.repeat(3000));
        let old: Vec<String> = (0..200).map(|i| word(i, "x")).collect();
        let new: Vec<String> = (0..200)
            .map(|i| if i % 2 == 0 { word(i, "y") } else { word(i, "x") })
            .collect();

        let magnitude = change_magnitude(&old.join(" "), &new.join(" "));
        assert_eq!(magnitude, 100 * 6000);
    }

    #[test]
    fn test_myers_script_round_trip() {
        let a: Vec<char> = "ABCABBA".chars().collect();
        let b: Vec<char> = "CBABAC".chars().collect();
        let ops = myers_script(&a, &b, 20).unwrap();

        let edits = ops.iter().filter(|op| **op != Op::Equal).count();
        assert_eq!(edits, 5);
        assert_eq!(myers_distance(&a, &b, 20), Some(5));

        // Replaying the script on `a` produces `b`.
        let mut rebuilt = Vec::new();
        let mut i = 0;
        for op in ops {
            match op {
                Op::Equal => {
                    rebuilt.push(a[i]);
                    i += 1;
                }
                Op::Delete(_) => i += 1,
                Op::Insert(j) => rebuilt.push(b[j]),
            }
        }
        assert_eq!(rebuilt, b);
    }

    #[test]
    fn test_myers_respects_edit_budget() {
        let a: Vec<u8> = (0..50).collect();
        let b: Vec<u8> = (100..150).collect();
        assert_eq!(myers_distance(&a, &b, 10), None);
        assert!(myers_script(&a, &b, 10).is_none());
        assert_eq!(myers_distance(&a, &b, 100), Some(100));
    }
}
