use once_cell::sync::Lazy;
use regex::Regex;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "new", "used", "like", "good", "great", "condition", "sale",
];

const MAX_PLAIN_WORDS: usize = 4;
const FALLBACK_QUERY: &str = "product";

static YEAR_RE: Lazy<Option<Regex>> = Lazy::new(|| compile(r"\b(?:19|20)\d{2}\b"));

static MODEL_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    compile(r"\b[a-z0-9]+-[a-z0-9]+\b|\b[a-z]+[0-9]+[a-z0-9]*\b|\b[0-9]+[a-z]+[a-z0-9]*\b")
});

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::error!(pattern, %err, "invalid keyword pattern");
            None
        }
    }
}

fn push_unique(tokens: &mut Vec<String>, token: &str) -> bool {
    if token.is_empty() || tokens.iter().any(|seen| seen == token) {
        return false;
    }
    tokens.push(token.to_string());
    true
}

/// Reduce a listing title to a short search query.
///
/// Years come first, then model-like tokens such as `cbr600rr` or `f-150`,
/// then a handful of plain words. Never returns an empty string.
pub fn extract_keywords(title: &str) -> String {
    let lowered = title.to_lowercase();
    let mut tokens: Vec<String> = Vec::new();
    for re in [YEAR_RE.as_ref(), MODEL_RE.as_ref()].into_iter().flatten() {
        for m in re.find_iter(&lowered) {
            push_unique(&mut tokens, m.as_str());
        }
    }

    let plain: Vec<&str> = lowered
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric() && c != '-'))
        .filter(|word| word.chars().count() > 2 && !STOPWORDS.contains(word))
        .collect();
    let mut added = 0;
    for word in plain {
        if added == MAX_PLAIN_WORDS {
            break;
        }
        if push_unique(&mut tokens, word) {
            added += 1;
        }
    }

    if tokens.is_empty() {
        FALLBACK_QUERY.to_string()
    } else {
        tokens.join(" ")
    }
}
