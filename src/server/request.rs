//! HTTP request types for the kaf server.

use axum::http::{header, HeaderMap};
use serde::Deserialize;

use super::response::WindowFormat;
use crate::error::{Error, Result};
use crate::registry::is_hidden_name;

/// Largest accepted put payload.
pub const MAX_PUT_BYTES: u64 = 5 * 1024 * 1024;

/// Query parameters for get requests.
#[derive(Debug, Deserialize)]
pub struct GetParams {
    /// First record number to return. Required, at least 1.
    pub from: Option<u32>,
    /// Window framing; defaults to `kaf`.
    pub format: Option<WindowFormat>,
}

impl GetParams {
    /// The validated `from` number.
    pub fn from_num(&self) -> Result<u32> {
        match self.from {
            Some(n) if n >= 1 => Ok(n),
            Some(_) => Err(Error::InvalidInput(
                "invalid 'from' message number".to_string(),
            )),
            None => Err(Error::InvalidInput(
                "missing 'from' message number".to_string(),
            )),
        }
    }

    /// The requested window format.
    pub fn format(&self) -> WindowFormat {
        self.format.unwrap_or(WindowFormat::Kaf)
    }
}

/// Query parameters for archive requests.
#[derive(Debug, Deserialize)]
pub struct ArchiveParams {
    /// Archive everything up to and including this number. Required, at
    /// least 1.
    pub upto: Option<u32>,
}

impl ArchiveParams {
    /// The validated `upto` number.
    pub fn upto(&self) -> Result<u32> {
        match self.upto {
            Some(n) if n >= 1 => Ok(n),
            Some(_) => Err(Error::InvalidInput(
                "invalid 'upto' message number".to_string(),
            )),
            None => Err(Error::InvalidInput(
                "missing 'upto' message number".to_string(),
            )),
        }
    }
}

/// Validates a log name taken from the request path.
///
/// Whitespace is trimmed; hidden names (empty, dot files, archived files)
/// are rejected.
pub fn validate_log_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if is_hidden_name(name) {
        return Err(Error::InvalidInput("invalid log name".to_string()));
    }
    Ok(name)
}

/// Validates the declared payload size of a put request.
///
/// `Content-Length` must be present, parse as a decimal and fall in
/// `1..=`[`MAX_PUT_BYTES`].
pub fn put_payload_size(headers: &HeaderMap) -> Result<u64> {
    let raw = headers
        .get(header::CONTENT_LENGTH)
        .ok_or_else(|| Error::InvalidInput("no content-length found".to_string()))?;
    let sz: u64 = raw
        .to_str()
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::InvalidInput("invalid content-length".to_string()))?;
    if sz == 0 {
        return Err(Error::InvalidInput("empty message".to_string()));
    }
    if sz > MAX_PUT_BYTES {
        return Err(Error::InvalidInput("message too large".to_string()));
    }
    Ok(sz)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers_with_length(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn should_accept_valid_from_number() {
        // given
        let params = GetParams {
            from: Some(3),
            format: None,
        };

        // when/then
        assert_eq!(params.from_num().unwrap(), 3);
    }

    #[test]
    fn should_reject_missing_and_zero_from() {
        let missing = GetParams {
            from: None,
            format: None,
        };
        let zero = GetParams {
            from: Some(0),
            format: None,
        };
        assert!(matches!(missing.from_num(), Err(Error::InvalidInput(_))));
        assert!(matches!(zero.from_num(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn should_default_format_to_kaf() {
        // given
        let params = GetParams {
            from: Some(1),
            format: None,
        };

        // when/then
        assert_eq!(params.format(), WindowFormat::Kaf);
    }

    #[test]
    fn should_parse_format_values() {
        // given
        let params: GetParams = serde_json::from_str(r#"{"from": 1, "format": "raw"}"#).unwrap();

        // when/then
        assert_eq!(params.format(), WindowFormat::Raw);
    }

    #[test]
    fn should_reject_missing_and_zero_upto() {
        let missing = ArchiveParams { upto: None };
        let zero = ArchiveParams { upto: Some(0) };
        assert!(matches!(missing.upto(), Err(Error::InvalidInput(_))));
        assert!(matches!(zero.upto(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn should_trim_and_accept_plain_log_name() {
        assert_eq!(validate_log_name(" orders ").unwrap(), "orders");
    }

    #[test]
    fn should_reject_hidden_log_names() {
        assert!(validate_log_name("").is_err());
        assert!(validate_log_name("  ").is_err());
        assert!(validate_log_name(".hidden").is_err());
        assert!(validate_log_name("--orders--2024").is_err());
    }

    #[test]
    fn should_accept_payload_size_in_bounds() {
        let headers = headers_with_length("5");
        assert_eq!(put_payload_size(&headers).unwrap(), 5);
    }

    #[test]
    fn should_reject_missing_content_length() {
        let headers = HeaderMap::new();
        assert!(matches!(
            put_payload_size(&headers),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn should_reject_unparseable_content_length() {
        let headers = headers_with_length("five");
        assert!(matches!(
            put_payload_size(&headers),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn should_reject_empty_payload() {
        let headers = headers_with_length("0");
        assert!(matches!(
            put_payload_size(&headers),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn should_reject_oversized_payload() {
        let headers = headers_with_length(&(MAX_PUT_BYTES + 1).to_string());
        assert!(matches!(
            put_payload_size(&headers),
            Err(Error::InvalidInput(_))
        ));
    }
}
