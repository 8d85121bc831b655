//! Tokenization and phrase helpers shared by the heuristics modules.

/// Split text into lower-cased word tokens.
///
/// Letters, digits, `-` and `'` stay inside a token; everything else is a
/// separator. Leading and trailing `-`/`'` are trimmed so `"--texas'"`
/// becomes `"texas"`.
pub fn tokenize(text: &str) -> Vec<String> {
    word_spans(text).map(|t| t.to_lowercase()).collect()
}

/// Same split as [`tokenize`] with the original spelling kept, so
/// `result[i]` is what the user typed for `tokenize(text)[i]`.
pub fn tokenize_cased(text: &str) -> Vec<&str> {
    word_spans(text).collect()
}

fn word_spans(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '\''))
        .map(|t| t.trim_matches(|c| c == '-' || c == '\''))
        .filter(|t| !t.is_empty())
}

/// Position of `phrase` (a token sequence) inside `tokens`, skipping
/// positions already marked in `consumed`.
pub fn find_phrase(tokens: &[String], phrase: &[String], consumed: &[bool]) -> Option<usize> {
    if phrase.is_empty() || phrase.len() > tokens.len() {
        return None;
    }
    (0..=tokens.len() - phrase.len()).find(|&start| {
        (0..phrase.len()).all(|i| !consumed[start + i] && tokens[start + i] == phrase[i])
    })
}

/// True when `phrase` occurs in `text` on token boundaries.
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    let tokens = tokenize(text);
    let phrase = tokenize(phrase);
    let consumed = vec![false; tokens.len()];
    find_phrase(&tokens, &phrase, &consumed).is_some()
}

/// Append `value` to `list` unless an equal (case-insensitive) entry exists.
pub fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        list.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_keeps_hyphenated_words() {
        assert_eq!(
            tokenize("Show me 1-Pagers, for TX!"),
            vec!["show", "me", "1-pagers", "for", "tx"]
        );
    }

    #[test]
    fn test_cased_tokens_line_up() {
        let text = "webinars - for TX/ca";
        let cased = tokenize_cased(text);
        assert_eq!(cased, vec!["webinars", "for", "TX", "ca"]);
        assert_eq!(cased.len(), tokenize(text).len());
    }

    #[test]
    fn test_find_phrase_respects_consumed() {
        let tokens = tokenize("video clip video");
        let phrase = tokenize("video");
        let mut consumed = vec![false; tokens.len()];
        assert_eq!(find_phrase(&tokens, &phrase, &consumed), Some(0));
        consumed[0] = true;
        assert_eq!(find_phrase(&tokens, &phrase, &consumed), Some(2));
    }

    #[test]
    fn test_contains_phrase_word_boundaries() {
        assert!(contains_phrase("New York schools", "new york"));
        assert!(!contains_phrase("Newark schools", "new"));
    }
}
