// ============================================================================
// Log Sanitization - partner fields and remote error payloads
// ============================================================================
//
// Partner names and tax ids are typed by users, and Sankhya error bodies are
// echoed back verbatim, so both pass through here before reaching a log line.
// Newlines and ANSI escapes would otherwise allow forged log entries.
//
// ============================================================================

use regex::Regex;
use once_cell::sync::Lazy;

/// Maximum length for logged values to prevent log bloat
const MAX_LOG_LENGTH: usize = 200;

/// Digits of a tax id left visible in logs
const VISIBLE_TAX_ID_DIGITS: usize = 4;

static ANSI_ESCAPE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]").expect("static ANSI regex is valid")
});

/// Sanitize user-controlled or remote text for logging.
///
/// Strips ANSI escapes, folds newlines and tabs into spaces, drops other
/// control characters and truncates to `MAX_LOG_LENGTH` characters.
///
/// ```
/// use sankhya_partners::utils::log_sanitizer::sanitize_for_log;
///
/// assert_eq!(sanitize_for_log("Acme\nINFO: forged"), "Acme INFO: forged");
/// assert_eq!(sanitize_for_log("test\x1b[31mred\x1b[0m"), "testred");
/// ```
pub fn sanitize_for_log(input: &str) -> String {
    let no_ansi = ANSI_ESCAPE_REGEX.replace_all(input, "");

    let cleaned: String = no_ansi
        .chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' => ' ',
            other => other,
        })
        .filter(|c| !c.is_control())
        .collect();

    if cleaned.chars().count() > MAX_LOG_LENGTH {
        let truncated: String = cleaned.chars().take(MAX_LOG_LENGTH).collect();
        format!("{}...", truncated)
    } else {
        cleaned
    }
}

/// Mask a CPF/CNPJ, keeping only its last digits.
///
/// ```
/// use sankhya_partners::utils::log_sanitizer::mask_tax_id;
///
/// assert_eq!(mask_tax_id("12.345.678/0001-99"), "**********0199");
/// ```
pub fn mask_tax_id(tax_id: &str) -> String {
    let digits: Vec<char> = tax_id.chars().filter(|c| c.is_ascii_digit()).collect();
    let visible = digits.len().min(VISIBLE_TAX_ID_DIGITS);
    let hidden = digits.len() - visible;

    std::iter::repeat('*')
        .take(hidden)
        .chain(digits[hidden..].iter().copied())
        .collect()
}

/// Use for values that must never be logged in full (passwords, tokens).
pub fn redact_sensitive(input: &str) -> String {
    format!("[REDACTED-{}]", input.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_removes_newlines() {
        let result = sanitize_for_log("Acme Corp\nINFO: Fake log entry");
        assert!(!result.contains('\n'));
        assert_eq!(result, "Acme Corp INFO: Fake log entry");
    }

    #[test]
    fn test_sanitize_removes_ansi_and_control_chars() {
        assert_eq!(sanitize_for_log("test\x1b[31mred text\x1b[0m"), "testred text");
        assert_eq!(sanitize_for_log("test\x00\x01\x02data"), "testdata");
    }

    #[test]
    fn test_sanitize_truncates_long_strings() {
        let result = sanitize_for_log(&"a".repeat(300));
        assert_eq!(result.len(), MAX_LOG_LENGTH + 3);
        assert!(result.ends_with("..."));
    }

    #[test]
    fn test_sanitize_truncation_respects_char_boundaries() {
        let result = sanitize_for_log(&"ç".repeat(300));
        assert!(result.ends_with("..."));
        assert_eq!(result.chars().count(), MAX_LOG_LENGTH + 3);
    }

    #[test]
    fn test_mask_tax_id() {
        assert_eq!(mask_tax_id("123.456.789-01"), "*******8901");
        assert_eq!(mask_tax_id("12"), "12");
        assert_eq!(mask_tax_id(""), "");
    }

    #[test]
    fn test_redact_sensitive() {
        let result = redact_sensitive("bearer-token-value");
        assert!(!result.contains("token"));
        assert_eq!(result, "[REDACTED-18]");
    }
}
