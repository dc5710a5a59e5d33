//! Locale-aware ordering of display names.
//!
//! Comparison runs in three levels, like a collator would: primary weights
//! ignoring accents and case, then accents, then case (lowercase first). At
//! the primary level spaces and punctuation sort before digits, digits before
//! letters, and letters without a decomposition (`æ`, `ø`, `ß`, ...) sort with
//! the plain letters they are written as. The raw string breaks any remaining
//! tie so the order is total.

use std::cmp::Ordering;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Primary weight of one character. Variant order is the group order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Primary {
    Symbol(char),
    Digit(char),
    Letter(char),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CollationKey {
    base: Vec<Primary>,
    accents: String,
    case: Vec<bool>,
    raw: String,
}

impl CollationKey {
    pub fn new(s: &str) -> Self {
        let decomposed: String = s.nfd().collect();
        let accents: String = decomposed.chars().flat_map(char::to_lowercase).collect();
        let base = primary_weights(&accents);
        let case = decomposed
            .chars()
            .filter(|c| !is_combining_mark(*c))
            .map(char::is_uppercase)
            .collect();
        CollationKey {
            base,
            accents,
            case,
            raw: s.to_owned(),
        }
    }
}

/// Letters NFD leaves alone, spelled out as the letters they sort with.
fn letter_expansion(c: char) -> Option<&'static str> {
    let expansion = match c {
        'æ' => "ae",
        'œ' => "oe",
        'ß' => "ss",
        'þ' => "th",
        'ø' => "o",
        'ł' => "l",
        'đ' | 'ð' => "d",
        'ħ' => "h",
        'ı' => "i",
        _ => return None,
    };
    Some(expansion)
}

fn primary_weights(lowercase: &str) -> Vec<Primary> {
    let mut weights = Vec::with_capacity(lowercase.len());
    for c in lowercase.chars().filter(|c| !is_combining_mark(*c)) {
        if let Some(expansion) = letter_expansion(c) {
            weights.extend(expansion.chars().map(Primary::Letter));
        } else if c.is_alphabetic() {
            weights.push(Primary::Letter(c));
        } else if c.is_numeric() {
            weights.push(Primary::Digit(c));
        } else {
            weights.push(Primary::Symbol(c));
        }
    }
    weights
}

pub fn compare(a: &str, b: &str) -> Ordering {
    CollationKey::new(a).cmp(&CollationKey::new(b))
}

/// Sorts `items` by the collation of the string `key` returns, keeping the
/// relative order of equal names.
pub fn sort_by_name<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> &str,
{
    items.sort_by_cached_key(|item| CollationKey::new(key(item)));
}
