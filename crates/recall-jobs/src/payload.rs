//! Fan-out payload validation at the trust boundary.

use recall_core::{Error, JobPayload, ProblemDescriptor, Result};

/// Validate and sanitize a parsed fan-out payload.
///
/// All string fields must be non-blank after trimming and the problem URL
/// must look like an absolute http(s) URL. Returns the sanitized payload;
/// schema mismatch is a validation error the consumer maps to a 400.
pub fn validate_payload(payload: JobPayload) -> Result<JobPayload> {
    let user_id = require_field("userId", &payload.user_id)?;
    let url = require_field("problem.url", &payload.problem.url)?;
    let name = require_field("problem.name", &payload.problem.name)?;
    let domain = require_field("problem.domain", &payload.problem.domain)?;
    let approach_name = require_field("problem.approachName", &payload.problem.approach_name)?;

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(Error::InvalidInput(
            "problem.url must be an absolute http(s) URL".into(),
        ));
    }

    Ok(JobPayload {
        user_id,
        problem: ProblemDescriptor {
            url,
            name,
            domain,
            approach_name,
        },
    })
}

fn require_field(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!("{field} must not be blank")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> JobPayload {
        JobPayload {
            user_id: "u-1".to_string(),
            problem: ProblemDescriptor {
                url: "https://leetcode.com/two-sum".to_string(),
                name: "Two Sum".to_string(),
                domain: "Array".to_string(),
                approach_name: "Hash Map".to_string(),
            },
        }
    }

    #[test]
    fn test_valid_payload_passes_through() {
        let sanitized = validate_payload(payload()).unwrap();
        assert_eq!(sanitized, payload());
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let mut p = payload();
        p.problem.name = "  Two Sum \n".to_string();
        p.problem.domain = " Array".to_string();

        let sanitized = validate_payload(p).unwrap();
        assert_eq!(sanitized.problem.name, "Two Sum");
        assert_eq!(sanitized.problem.domain, "Array");
    }

    #[test]
    fn test_blank_fields_are_rejected() {
        let mut p = payload();
        p.problem.approach_name = "   ".to_string();

        let err = validate_payload(p).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("approachName"));
    }

    #[test]
    fn test_non_http_url_is_rejected() {
        let mut p = payload();
        p.problem.url = "ftp://leetcode.com/two-sum".to_string();
        assert!(validate_payload(p).is_err());
    }
}
