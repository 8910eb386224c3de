//! Response envelope handling
//!
//! The trace service wraps every payload in an XML declaration and a
//! `<string>` element. Stripping is textual: each wrapper literal is removed
//! once, wherever it first appears, and the remainder is the payload. Errors are
//! signalled by the substring `error` anywhere in the raw body.

use crate::error::{TraceError, TraceResult};

pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>";
pub const STRING_OPEN: &str = "<string xmlns=\"http://tempuri.org/\">";
pub const STRING_CLOSE: &str = "</string>";
pub const ERROR_SENTINEL: &str = "error";

/// Remove the first occurrence of each wrapper literal
pub fn strip(raw: &str) -> String {
    raw.replacen(XML_DECLARATION, "", 1)
        .replacen(STRING_OPEN, "", 1)
        .replacen(STRING_CLOSE, "", 1)
}

/// Case-sensitive sentinel check on the undecoded body
pub fn is_error(raw: &str) -> bool {
    raw.contains(ERROR_SENTINEL)
}

/// Strip the envelope, turning a sentinel-bearing body into `TraceError::Service`
pub fn decode(raw: &str) -> TraceResult<String> {
    let payload = strip(raw);
    if is_error(raw) {
        return Err(TraceError::Service(payload));
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACE_BODY: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?><string xmlns=\"http://tempuri.org/\">[\"f1\",\"f2\"]</string>";

    #[test]
    fn test_strip_full_envelope() {
        assert_eq!(strip(TRACE_BODY), "[\"f1\",\"f2\"]");
    }

    #[test]
    fn test_strip_keeps_whitespace_between_wrappers() {
        let raw = format!("{}\r\n{}diagram-42{}", XML_DECLARATION, STRING_OPEN, STRING_CLOSE);
        assert_eq!(strip(&raw), "\r\ndiagram-42");
    }

    #[test]
    fn test_strip_only_first_occurrence() {
        let raw = format!("{}a{}b{}", STRING_OPEN, STRING_CLOSE, STRING_CLOSE);
        assert_eq!(strip(&raw), format!("ab{}", STRING_CLOSE));
    }

    #[test]
    fn test_strip_passes_unwrapped_text_through() {
        assert_eq!(strip("plain"), "plain");
    }

    #[test]
    fn test_decode_detects_sentinel_on_raw_body() {
        let raw = format!("{}{}error: no subnetwork{}", XML_DECLARATION, STRING_OPEN, STRING_CLOSE);
        assert_eq!(
            decode(&raw),
            Err(TraceError::Service("error: no subnetwork".to_string()))
        );
    }

    #[test]
    fn test_sentinel_is_case_sensitive() {
        assert!(!is_error("ERROR"));
        assert!(is_error("an error occurred"));
    }

    #[test]
    fn test_decode_success() {
        assert_eq!(decode(TRACE_BODY).unwrap(), "[\"f1\",\"f2\"]");
    }
}
