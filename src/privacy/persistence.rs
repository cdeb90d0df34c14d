//! Persistence gate for case summaries
//!
//! Summaries handed to long-term storage must never carry the raw inbound
//! email. The gate walks the whole payload, so nesting a raw body under a
//! sub-object does not get it through.

use crate::error::{Error, Result};
use serde_json::Value;

/// Keys that identify a raw email body, compared case-insensitively
const RAW_EMAIL_KEYS: &[&str] = &["email_body", "raw_email", "raw_email_body"];

/// Reject a summary payload that carries a raw email field at any depth.
pub fn ensure_no_raw_email(payload: &Value) -> Result<()> {
    match find_raw_email_key(payload, "$") {
        Some(path) => {
            tracing::warn!(path = %path, "Refusing to persist raw email content");
            Err(Error::Validation(format!(
                "summary payload must not contain raw email content (found at {})",
                path
            )))
        }
        None => Ok(()),
    }
}

fn find_raw_email_key(value: &Value, path: &str) -> Option<String> {
    match value {
        Value::Object(map) => map.iter().find_map(|(key, child)| {
            let child_path = format!("{}.{}", path, key);
            if RAW_EMAIL_KEYS
                .iter()
                .any(|k| k.eq_ignore_ascii_case(key.trim()))
            {
                Some(child_path)
            } else {
                find_raw_email_key(child, &child_path)
            }
        }),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, child)| find_raw_email_key(child, &format!("{}[{}]", path, i))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_summary_accepted() {
        let summary = json!({
            "case_id": "CASE-1001",
            "summary": "Late delivery, voucher offered",
            "decision": {"type": "VOUCHER", "amount": 15.0},
            "tags": ["delivery", "voucher"]
        });
        assert!(ensure_no_raw_email(&summary).is_ok());
    }

    #[test]
    fn test_top_level_raw_email_rejected() {
        let summary = json!({"case_id": "CASE-1", "email_body": "hello"});
        let err = ensure_no_raw_email(&summary).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("$.email_body"));
    }

    #[test]
    fn test_nested_and_case_insensitive() {
        let summary = json!({
            "case_id": "CASE-2",
            "history": [{"note": "ok"}, {"context": {"Raw_Email": "..."}}]
        });
        let err = ensure_no_raw_email(&summary).unwrap_err();
        assert!(err.to_string().contains("$.history[1].context.Raw_Email"));
    }

    #[test]
    fn test_value_mentioning_key_is_fine() {
        // Only keys count; a string value naming the field is not raw content
        let summary = json!({"note": "raw_email_body was dropped"});
        assert!(ensure_no_raw_email(&summary).is_ok());
        assert!(ensure_no_raw_email(&json!(null)).is_ok());
    }
}
