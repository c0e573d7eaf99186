use once_cell::sync::Lazy;
use ragconf_index::TermStats;
use regex::Regex;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("non-word regex"));

pub const MIN_TERM_CHARS: usize = 3;

/// Lexical tokenizer: lowercases, strips punctuation and drops tokens of two
/// characters or fewer.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let stripped = NON_WORD.replace_all(&lowered, " ");
    stripped
        .split_whitespace()
        .filter(|token| token.chars().count() >= MIN_TERM_CHARS)
        .map(str::to_string)
        .collect()
}

pub fn term_stats(text: &str) -> TermStats {
    let mut stats = TermStats::default();
    for term in tokenize(text) {
        stats.term_count += 1;
        *stats.term_freqs.entry(term).or_insert(0) += 1;
    }
    stats
}

pub fn prefix_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
