// src/utils/text.rs
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

/// Title abbreviations expanded before matching
const TITLE_ABBREVIATIONS: &[(&str, &str)] = &[
    ("cfo", "chief financial officer"),
    ("gc", "general counsel"),
];

/// Normalize organization names for searching
pub fn normalize_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let cleaned = NON_ALNUM.replace_all(&lowered, " ");
    let normalized = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    debug!("Normalized '{}' -> '{}'", name, normalized);
    normalized
}

/// Normalize job titles, expanding the common abbreviations
pub fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let cleaned = NON_ALNUM.replace_all(&lowered, " ");
    let mut normalized = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    for (abbr, full) in TITLE_ABBREVIATIONS {
        if normalized == *abbr || normalized.starts_with(&format!("{} ", abbr)) {
            normalized = normalized.replacen(abbr, full, 1);
        }
    }

    normalized
}

/// Lowercase a person's name and collapse whitespace
pub fn normalize_person(name: &str) -> String {
    name.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase and drop everything that is not a letter or digit
pub fn compact_alnum(value: &str) -> String {
    NON_ALNUM.replace_all(&value.to_lowercase(), "").into_owned()
}

/// Ratcliff/Obershelp similarity: `2 * matches / total length`
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matches = matching_characters(&a, &b);
    2.0 * matches as f64 / total as f64
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }

    matched
}

/// Longest common block in `a[alo..ahi]` and `b[blo..bhi]`, earliest on ties
fn longest_match(a: &[char], b: &[char], alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0);
    let width = bhi.saturating_sub(blo);
    let mut prev = vec![0usize; width + 1];

    for i in alo..ahi {
        let mut row = vec![0usize; width + 1];
        for j in blo..bhi {
            if a[i] == b[j] {
                let k = prev[j - blo] + 1;
                row[j - blo + 1] = k;
                if k > best_k {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_k = k;
                }
            }
        }
        prev = row;
    }

    (best_i, best_j, best_k)
}

/// Decode the handful of entities that show up in leadership pages
pub fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Escape text for inclusion in HTML
pub fn html_encode(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Turn markup into trimmed, non-empty text lines, one per element boundary
pub fn html_to_lines(html: &str) -> Vec<String> {
    TAG.replace_all(html, "\n")
        .lines()
        .map(|line| decode_entities(line.trim()).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Collapse markup into a single lowercase line of text
pub fn html_to_text(html: &str) -> String {
    let text = TAG.replace_all(html, " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Case-insensitive alternation matching any of the roles
pub fn role_pattern<S: AsRef<str>>(roles: &[S]) -> Option<Regex> {
    let alternatives: Vec<String> = roles
        .iter()
        .map(|r| r.as_ref().trim().to_lowercase())
        .filter(|r| !r.is_empty())
        .map(|r| regex::escape(&r))
        .collect();

    if alternatives.is_empty() {
        return None;
    }

    Regex::new(&alternatives.join("|")).ok()
}
