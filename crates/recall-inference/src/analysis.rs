//! Analysis prompt construction and structured-output parsing.

use recall_core::{AnalysisOutcome, Error, GenerationBackend, Result};

use crate::retry::with_retry;

/// Build the analysis prompt for one solved-problem submission.
///
/// The model must answer with a single JSON object whose `tags` field is
/// the ordered pair `[domain, keyAlgorithm]`.
pub fn build_analysis_prompt(link: &str, code: &str) -> String {
    format!(
        r#"You are an expert algorithm tutor. For every problem return ONE JSON object.

Field rules
-----------
- name         : human-readable title (e.g. "Two Sum")
- approachName : a short, descriptive name for this specific solution
                 (e.g. "Brute Force", "Hash Map O(n)", "Two Pointers")
- pseudoCode   : 3-10 ultra-concise English lines (first = signature)
- time         : ONE Big-O term (e.g. "O(n)")
- space        : ONE Big-O term (e.g. "O(1)")
- tags         : ARRAY [Data Structure, keyAlgorithm]
                 (e.g. ["Graph", "Dijkstra"], ["Array", "Two Pointers"])
- difficulty   : "Easy" | "Medium" | "Hard"

Problem URL: {link}

Solution code:
{code}
"#
    )
}

/// Parse and validate the model's JSON answer.
///
/// Malformed output (invalid JSON, blank approach name, tags that are not
/// the `[domain, keyAlgorithm]` pair) is an inference failure — the caller
/// maps it to a bad-gateway response, never a retry.
pub fn parse_analysis(raw: &str) -> Result<AnalysisOutcome> {
    let outcome: AnalysisOutcome = serde_json::from_str(raw.trim())
        .map_err(|e| Error::Inference(format!("model returned invalid analysis JSON: {e}")))?;

    if outcome.approach_name.trim().is_empty() {
        return Err(Error::Inference(
            "model did not provide a valid approachName".into(),
        ));
    }
    if outcome.tags.len() != 2 || outcome.tags.iter().any(|t| t.trim().is_empty()) {
        return Err(Error::Inference(
            "model did not return tags in [domain, keyAlgorithm] format".into(),
        ));
    }
    if outcome.pseudo_code.is_empty() {
        return Err(Error::Inference("model returned empty pseudocode".into()));
    }

    Ok(outcome)
}

/// Run the analysis generation call with the bounded retry policy and
/// validate its structured output.
pub async fn generate_analysis(
    backend: &dyn GenerationBackend,
    link: &str,
    code: &str,
) -> Result<AnalysisOutcome> {
    let prompt = build_analysis_prompt(link, code);
    let raw = with_retry("generate_analysis", || backend.generate_json(&prompt)).await?;
    parse_analysis(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::Difficulty;

    const VALID: &str = r#"{
        "name": "Two Sum",
        "approachName": "Hash Map",
        "pseudoCode": ["fn twoSum(nums, target)", "scan once, store complements"],
        "time": "O(n)",
        "space": "O(n)",
        "tags": ["Array", "Hash Map"],
        "difficulty": "Easy"
    }"#;

    #[test]
    fn test_parse_valid_analysis() {
        let outcome = parse_analysis(VALID).unwrap();
        assert_eq!(outcome.name, "Two Sum");
        assert_eq!(outcome.approach_name, "Hash Map");
        assert_eq!(outcome.difficulty, Difficulty::Easy);
    }

    #[test]
    fn test_parse_tolerates_surrounding_whitespace() {
        let padded = format!("\n  {VALID}  \n");
        assert!(parse_analysis(&padded).is_ok());
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        let err = parse_analysis("not json").unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn test_parse_rejects_blank_approach_name() {
        let raw = VALID.replace("Hash Map\",", "  \",");
        let err = parse_analysis(&raw).unwrap_err();
        assert!(err.to_string().contains("approachName"));
    }

    #[test]
    fn test_parse_rejects_wrong_tag_arity() {
        let raw = VALID.replace(r#"["Array", "Hash Map"]"#, r#"["Array"]"#);
        let err = parse_analysis(&raw).unwrap_err();
        assert!(err.to_string().contains("[domain, keyAlgorithm]"));
    }

    #[test]
    fn test_prompt_carries_link_and_code() {
        let prompt = build_analysis_prompt("https://leetcode.com/two-sum", "def solve(): pass");
        assert!(prompt.contains("https://leetcode.com/two-sum"));
        assert!(prompt.contains("def solve(): pass"));
        assert!(prompt.contains("approachName"));
    }
}
