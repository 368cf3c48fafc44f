//! Low-level string parsing helpers for humanized marketplace counts.
//!
//! Marketplace listings render counts in loose human formats such as
//! `"4.8 star rating with 12k reviews"`, `"1.2k members"`, or `"$1,299.00"`.
//! These functions use manual byte scanning to pull numeric values out of
//! those strings. See the platform modules for how they compose into full
//! signal extraction.

/// Attempts to parse a review total from a listing's review blurb.
///
/// Matching rules (case-insensitive):
/// - the first number directly followed by the word `"reviews"` wins,
///   e.g. `"120 reviews"` → `120.0`;
/// - a `k` or `m` suffix glued to the number scales it,
///   e.g. `"4.8 star rating with 12k reviews"` → `12000.0`;
/// - thousands separators are accepted, e.g. `"1,024 reviews"` → `1024.0`.
///
/// Returns `None` when no number annotated with `"reviews"` is found.
#[must_use]
pub(crate) fn parse_review_total(reviews: &str) -> Option<f64> {
    let lower = reviews.to_lowercase();
    let bytes = lower.as_bytes();
    let len = bytes.len();
    let mut i = 0usize;

    while i < len {
        if bytes[i].is_ascii_digit() {
            if let Some((value, after_num)) = scan_number(&lower, i) {
                let (multiplier, after_suffix) = scan_suffix(&lower, after_num);
                let mut scan = after_suffix;
                while scan < len && bytes[scan] == b' ' {
                    scan += 1;
                }
                if lower[scan..].starts_with("review") {
                    return Some(value * multiplier);
                }
                i = after_num;
                continue;
            }
        }
        i += 1;
    }
    None
}

/// Attempts to parse a humanized count such as `"847"`, `"1.2k"`, or `"3m"`.
///
/// The suffix multiplier (`k` = 1 000, `m` = 1 000 000) is applied only when
/// it is glued to the number and not the start of a longer word, so
/// `"1.2k members"` parses as `1200.0` while `"12kb"` parses as `12.0`.
///
/// Returns `None` when the input contains no digits.
#[must_use]
pub(crate) fn parse_count(text: &str) -> Option<f64> {
    let lower = text.trim().to_lowercase();
    let bytes = lower.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() && !bytes[i].is_ascii_digit() {
        i += 1;
    }
    let (value, after_num) = scan_number(&lower, i)?;
    let (multiplier, _) = scan_suffix(&lower, after_num);
    Some(value * multiplier)
}

/// Attempts to parse a price such as `"12.00"`, `"$8.50"`, or `"1,299.00"`.
///
/// Currency symbols and other text before the first digit are skipped;
/// no suffix multipliers apply to prices.
///
/// Returns `None` when the input contains no digits.
#[must_use]
pub(crate) fn parse_price(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    let bytes = trimmed.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() && !bytes[i].is_ascii_digit() {
        i += 1;
    }
    scan_number(trimmed, i).map(|(value, _)| value)
}

// ---------------------------------------------------------------------------
// Internal scanning helpers
// ---------------------------------------------------------------------------

/// Scans a number starting at byte offset `start`: digits with optional
/// thousands separators and at most one decimal point. Returns the parsed
/// value and the offset one past the number, or `None` if `start` is not on
/// a digit.
fn scan_number(s: &str, start: usize) -> Option<(f64, usize)> {
    let bytes = s.as_bytes();
    let len = bytes.len();
    if start >= len || !bytes[start].is_ascii_digit() {
        return None;
    }

    let mut i = start;
    let mut has_dot = false;
    while i < len {
        let b = bytes[i];
        if b.is_ascii_digit() {
            i += 1;
        } else if b == b'.' && !has_dot && i + 1 < len && bytes[i + 1].is_ascii_digit() {
            has_dot = true;
            i += 1;
        } else if b == b',' && i + 1 < len && bytes[i + 1].is_ascii_digit() {
            i += 1;
        } else {
            break;
        }
    }

    let token: String = s[start..i].chars().filter(|c| *c != ',').collect();
    token.parse::<f64>().ok().map(|value| (value, i))
}

/// Reads an optional `k`/`m` multiplier suffix at byte offset `i`.
/// Input must be pre-lowercased.
///
/// The suffix counts only when the following character is not alphanumeric,
/// so `"12k reviews"` scales while `"12kb"` does not. Returns the multiplier
/// and the offset one past the suffix (unchanged when no suffix applies).
fn scan_suffix(s: &str, i: usize) -> (f64, usize) {
    let bytes = s.as_bytes();
    let multiplier = match bytes.get(i) {
        Some(b'k') => 1_000.0,
        Some(b'm') => 1_000_000.0,
        _ => return (1.0, i),
    };
    let suffix_starts_word = bytes
        .get(i + 1)
        .is_some_and(|b| b.is_ascii_alphanumeric());
    if suffix_starts_word {
        (1.0, i)
    } else {
        (multiplier, i + 1)
    }
}
