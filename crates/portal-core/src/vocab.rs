//! Built-in vocabulary: content types, US states, competitors, personas,
//! and the autocorrect dictionary.
//!
//! Every table is an ordered slice. Matching code walks them in
//! declaration order, so when two entries claim the same text the later
//! one wins.

use strsim::normalized_damerau_levenshtein;

use crate::text::tokenize;

/// Canonical values of the `type` column.
pub const CONTENT_TYPES: &[&str] = &[
    "Customer Story",
    "Video",
    "Video Clip",
    "Ebook",
    "1-Pager",
    "Webinar",
    "Blog",
    "Press Release",
    "Award",
    "Landing Page",
    "Asset",
];

/// Phrases users type, mapped to a canonical content type.
pub const TYPE_KEYWORDS: &[(&str, &str)] = &[
    ("customer story", "Customer Story"),
    ("customer stories", "Customer Story"),
    ("case study", "Customer Story"),
    ("case studies", "Customer Story"),
    ("success story", "Customer Story"),
    ("success stories", "Customer Story"),
    ("testimonial", "Customer Story"),
    ("testimonials", "Customer Story"),
    ("video", "Video"),
    ("videos", "Video"),
    ("demo", "Video"),
    ("tutorial", "Video"),
    ("video clip", "Video Clip"),
    ("video clips", "Video Clip"),
    ("clip", "Video Clip"),
    ("clips", "Video Clip"),
    ("ebook", "Ebook"),
    ("ebooks", "Ebook"),
    ("e-book", "Ebook"),
    ("e-books", "Ebook"),
    ("whitepaper", "Ebook"),
    ("white paper", "Ebook"),
    ("guide", "Ebook"),
    ("guides", "Ebook"),
    ("1-pager", "1-Pager"),
    ("1-pagers", "1-Pager"),
    ("1 pager", "1-Pager"),
    ("one pager", "1-Pager"),
    ("one-pager", "1-Pager"),
    ("one-pagers", "1-Pager"),
    ("fact sheet", "1-Pager"),
    ("flyer", "1-Pager"),
    ("webinar", "Webinar"),
    ("webinars", "Webinar"),
    ("blog", "Blog"),
    ("blogs", "Blog"),
    ("blog post", "Blog"),
    ("article", "Blog"),
    ("articles", "Blog"),
    ("press release", "Press Release"),
    ("press releases", "Press Release"),
    ("award", "Award"),
    ("awards", "Award"),
    ("landing page", "Landing Page"),
    ("landing pages", "Landing Page"),
];

/// Variant spellings of the `type` column rewritten by `standardize-types`.
pub const TYPE_STANDARDIZATIONS: &[(&str, &str)] = &[
    ("1 Pager", "1-Pager"),
    ("1 pager", "1-Pager"),
    ("1Pager", "1-Pager"),
    ("one pager", "1-Pager"),
    ("One Pager", "1-Pager"),
    ("VideoClip", "Video Clip"),
    ("video clip", "Video Clip"),
    ("Videoclip", "Video Clip"),
    ("customer story", "Customer Story"),
    ("customerstory", "Customer Story"),
    ("case study", "Customer Story"),
    ("ebook", "Ebook"),
    ("EBook", "Ebook"),
    ("e-book", "Ebook"),
    ("webinar", "Webinar"),
    ("blog", "Blog"),
    ("video", "Video"),
];

/// `(abbreviation, full name)` for every state plus DC.
pub const US_STATES: &[(&str, &str)] = &[
    ("AL", "alabama"),
    ("AK", "alaska"),
    ("AZ", "arizona"),
    ("AR", "arkansas"),
    ("CA", "california"),
    ("CO", "colorado"),
    ("CT", "connecticut"),
    ("DE", "delaware"),
    ("DC", "district of columbia"),
    ("FL", "florida"),
    ("GA", "georgia"),
    ("HI", "hawaii"),
    ("ID", "idaho"),
    ("IL", "illinois"),
    ("IN", "indiana"),
    ("IA", "iowa"),
    ("KS", "kansas"),
    ("KY", "kentucky"),
    ("LA", "louisiana"),
    ("ME", "maine"),
    ("MD", "maryland"),
    ("MA", "massachusetts"),
    ("MI", "michigan"),
    ("MN", "minnesota"),
    ("MS", "mississippi"),
    ("MO", "missouri"),
    ("MT", "montana"),
    ("NE", "nebraska"),
    ("NV", "nevada"),
    ("NH", "new hampshire"),
    ("NJ", "new jersey"),
    ("NM", "new mexico"),
    ("NY", "new york"),
    ("NC", "north carolina"),
    ("ND", "north dakota"),
    ("OH", "ohio"),
    ("OK", "oklahoma"),
    ("OR", "oregon"),
    ("PA", "pennsylvania"),
    ("RI", "rhode island"),
    ("SC", "south carolina"),
    ("SD", "south dakota"),
    ("TN", "tennessee"),
    ("TX", "texas"),
    ("UT", "utah"),
    ("VT", "vermont"),
    ("VA", "virginia"),
    ("WA", "washington"),
    ("WV", "west virginia"),
    ("WI", "wisconsin"),
    ("WY", "wyoming"),
];

/// Lower-case abbreviations that are also ordinary English words. These
/// only count as states when typed in upper case.
pub const AMBIGUOUS_ABBREVIATIONS: &[&str] = &[
    "al", "co", "de", "hi", "id", "in", "la", "ma", "me", "mo", "oh", "ok", "or", "pa",
];

/// Competitor canonical name and the phrases that name it.
pub const COMPETITORS: &[(&str, &[&str])] = &[
    ("naviance", &["naviance"]),
    ("xello", &["xello"]),
    ("scoir", &["scoir"]),
    ("majorclarity", &["majorclarity", "major clarity"]),
    ("powerschool", &["powerschool", "power school"]),
    ("kuder", &["kuder"]),
    ("youscience", &["youscience", "you science"]),
    ("maialearning", &["maialearning", "maia learning", "maia"]),
    ("ccgi", &["ccgi"]),
];

/// Persona canonical name and the phrases that name it.
pub const PERSONAS: &[(&str, &[&str])] = &[
    (
        "counselors",
        &["counselor", "counselors", "guidance counselor", "school counselor"],
    ),
    (
        "administrators",
        &[
            "administrator",
            "administrators",
            "admin",
            "admins",
            "principal",
            "principals",
            "superintendent",
            "superintendents",
        ],
    ),
    (
        "CTE coordinators",
        &["cte coordinator", "cte coordinators", "cte director", "career coach", "cte"],
    ),
    ("parents", &["parent", "parents", "family", "families", "guardian"]),
    ("students", &["student", "students"]),
];

/// Known misspellings, applied word by word before any matching.
pub const AUTOCORRECT: &[(&str, &str)] = &[
    ("texs", "texas"),
    ("teaxs", "texas"),
    ("texaas", "texas"),
    ("califronia", "california"),
    ("calfornia", "california"),
    ("flordia", "florida"),
    ("pensylvania", "pennsylvania"),
    ("pennsilvania", "pennsylvania"),
    ("misouri", "missouri"),
    ("tennesee", "tennessee"),
    ("massachusets", "massachusetts"),
    ("conneticut", "connecticut"),
    ("ilinois", "illinois"),
    ("michagan", "michigan"),
    ("arizonia", "arizona"),
    ("virgina", "virginia"),
    ("webniar", "webinar"),
    ("webiner", "webinar"),
    ("webinr", "webinar"),
    ("costumer", "customer"),
    ("cusomter", "customer"),
    ("stroy", "story"),
    ("storys", "stories"),
    ("vidoe", "video"),
    ("vidoes", "videos"),
    ("ebok", "ebook"),
    ("navience", "naviance"),
    ("naviannce", "naviance"),
    ("navance", "naviance"),
    ("xelo", "xello"),
    ("zelo", "xello"),
    ("xcello", "xello"),
    ("powerschol", "powerschool"),
    ("majorclairty", "majorclarity"),
    ("counsler", "counselor"),
    ("councelor", "counselor"),
    ("councelors", "counselors"),
];

/// Words that never become search terms.
pub const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "about", "from", "that", "this", "what", "which", "any",
    "all", "some", "show", "find", "get", "give", "need", "want", "looking", "look", "have",
    "has", "are", "our", "your", "you", "can", "content", "resources", "resource", "stuff",
    "materials", "something", "please", "into", "over", "more", "most", "best", "good",
    "related", "help", "using", "use", "their", "them", "there", "who", "how", "why",
    "when", "where", "does", "did", "not", "but", "like", "also", "just", "other", "than",
];

/// Minimum normalized Damerau-Levenshtein similarity for fuzzy correction.
pub const FUZZY_THRESHOLD: f64 = 0.85;

/// Canonical content type for a user-typed value, case-insensitive.
pub fn canonical_type(value: &str) -> Option<&'static str> {
    let lower = value.trim().to_lowercase();
    CONTENT_TYPES
        .iter()
        .find(|t| t.to_lowercase() == lower)
        .copied()
        .or_else(|| {
            TYPE_KEYWORDS
                .iter()
                .rev()
                .find(|(k, _)| *k == lower)
                .map(|(_, t)| *t)
        })
}

/// Standardized spelling of a stored type value, if it is a known variant.
pub fn standardize_type(value: &str) -> Option<&'static str> {
    TYPE_STANDARDIZATIONS
        .iter()
        .find(|(from, _)| *from == value)
        .map(|(_, to)| *to)
}

/// Abbreviation for a state given by name or abbreviation.
pub fn state_abbreviation(value: &str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("national") {
        return Some("National");
    }
    US_STATES
        .iter()
        .find(|(abbr, name)| abbr.eq_ignore_ascii_case(trimmed) || name.eq_ignore_ascii_case(trimmed))
        .map(|(abbr, _)| *abbr)
}

/// Full lower-case name of a state abbreviation.
pub fn state_name(abbr: &str) -> Option<&'static str> {
    US_STATES
        .iter()
        .find(|(a, _)| a.eq_ignore_ascii_case(abbr))
        .map(|(_, name)| *name)
}

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Every single word the vocabulary knows, used as the fuzzy-match target set.
fn known_words() -> impl Iterator<Item = &'static str> {
    let types = TYPE_KEYWORDS.iter().map(|(k, _)| *k);
    let states = US_STATES.iter().map(|(_, n)| *n);
    let competitors = COMPETITORS.iter().flat_map(|(_, names)| names.iter().copied());
    let personas = PERSONAS.iter().flat_map(|(_, names)| names.iter().copied());
    types
        .chain(states)
        .chain(competitors)
        .chain(personas)
        .flat_map(|phrase| phrase.split(' '))
}

fn dictionary_fix(word: &str) -> Option<&'static str> {
    AUTOCORRECT
        .iter()
        .find(|(wrong, _)| *wrong == word)
        .map(|(_, right)| *right)
}

fn fuzzy_fix(word: &str) -> Option<&'static str> {
    if word.chars().count() < 5 || word.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    if known_words().any(|k| k == word) {
        return None;
    }
    // Plurals of known words are fine as typed.
    if let Some(stem) = word.strip_suffix('s') {
        if known_words().any(|k| k == stem) {
            return None;
        }
    }
    known_words()
        .map(|k| (k, normalized_damerau_levenshtein(word, k)))
        .filter(|(_, score)| *score >= FUZZY_THRESHOLD)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(k, _)| k)
}

/// Correct known misspellings word by word.
///
/// Words that are not changed keep their original spelling and case, so
/// later stages can still tell `"TX"` from `"tx"`.
pub fn autocorrect(query: &str) -> String {
    query
        .split_whitespace()
        .map(|raw| {
            let word = tokenize(raw);
            if word.len() != 1 {
                return raw.to_string();
            }
            let word = &word[0];
            match dictionary_fix(word).or_else(|| fuzzy_fix(word)) {
                Some(fixed) => fixed.to_string(),
                None => raw.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autocorrect_dictionary() {
        assert_eq!(autocorrect("texs customer stories"), "texas customer stories");
        assert_eq!(autocorrect("navience webniar"), "naviance webinar");
    }

    #[test]
    fn test_autocorrect_preserves_unknown_and_case() {
        assert_eq!(autocorrect("FAFSA in TX"), "FAFSA in TX");
    }

    #[test]
    fn test_autocorrect_fuzzy_long_words() {
        // one transposition in a 10-letter word
        assert_eq!(autocorrect("tennesese"), "tennessee");
        // short words are never fuzzed
        assert_eq!(autocorrect("guid"), "guid");
    }

    #[test]
    fn test_canonical_type_lookup() {
        assert_eq!(canonical_type("customer story"), Some("Customer Story"));
        assert_eq!(canonical_type("case studies"), Some("Customer Story"));
        assert_eq!(canonical_type("EBOOK"), Some("Ebook"));
        assert_eq!(canonical_type("podcast"), None);
    }

    #[test]
    fn test_state_abbreviation_by_name_or_code() {
        assert_eq!(state_abbreviation("Texas"), Some("TX"));
        assert_eq!(state_abbreviation("ny"), Some("NY"));
        assert_eq!(state_abbreviation("national"), Some("National"));
        assert_eq!(state_abbreviation("Atlantis"), None);
    }

    #[test]
    fn test_standardize_type_variants() {
        assert_eq!(standardize_type("1 Pager"), Some("1-Pager"));
        assert_eq!(standardize_type("1-Pager"), None);
    }
}
