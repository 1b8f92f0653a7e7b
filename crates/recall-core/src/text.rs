//! Text normalization helpers for fan-out payload construction.

/// Convert a machine-cased identifier into human-readable word-separated
/// form, e.g. `TwoPointers` / `two_pointers` / `two-pointers` →
/// `Two Pointers`.
///
/// Strings that already contain whitespace are assumed human-readable and
/// only trimmed. Runs of uppercase letters (acronyms like `BFS`) are kept
/// intact.
pub fn humanize_identifier(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.chars().any(char::is_whitespace) {
        return trimmed.to_string();
    }

    let words: Vec<String> = if trimmed.contains(['_', '-']) {
        trimmed
            .split(['_', '-'])
            .filter(|w| !w.is_empty())
            .map(capitalize)
            .collect()
    } else {
        split_camel(trimmed).into_iter().map(capitalize).collect()
    };

    words.join(" ")
}

/// Split on lower→upper boundaries while keeping acronym runs together:
/// `parseHTTPResponse` → ["parse", "HTTP", "Response"].
fn split_camel(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !current.is_empty() && c.is_uppercase() {
            let prev_lower = chars[i - 1].is_lowercase();
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev_lower || (chars[i - 1].is_uppercase() && next_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: impl AsRef<str>) -> String {
    let word = word.as_ref();
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case_split() {
        assert_eq!(humanize_identifier("TwoPointers"), "Two Pointers");
        assert_eq!(
            humanize_identifier("DynamicProgramming"),
            "Dynamic Programming"
        );
    }

    #[test]
    fn test_snake_and_kebab_case() {
        assert_eq!(humanize_identifier("two_pointers"), "Two Pointers");
        assert_eq!(humanize_identifier("two-pointers"), "Two Pointers");
    }

    #[test]
    fn test_already_human_readable_is_only_trimmed() {
        assert_eq!(humanize_identifier("  Hash Map O(n) "), "Hash Map O(n)");
        assert_eq!(humanize_identifier("Two Pointers"), "Two Pointers");
    }

    #[test]
    fn test_acronym_runs_survive() {
        assert_eq!(humanize_identifier("BFS"), "BFS");
        assert_eq!(humanize_identifier("parseHTTPResponse"), "Parse HTTP Response");
    }

    #[test]
    fn test_single_word() {
        assert_eq!(humanize_identifier("graph"), "Graph");
        assert_eq!(humanize_identifier("Graph"), "Graph");
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert_eq!(humanize_identifier(""), "");
        assert_eq!(humanize_identifier("   "), "");
    }
}
