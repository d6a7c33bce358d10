//! HTTP response types for the kaf server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::codec::{self, Message};
use crate::error::Error;

/// Response header carrying the number of the last record in a window.
/// (Canonically spelled `X-Kaf-LastMsgSent`; header names are
/// case-insensitive on the wire and `HeaderName` keeps them lowercase.)
pub const LAST_MSG_SENT: &str = "x-kaf-lastmsgsent";

/// Prefix of the `kaf` window framing: `KAF_MSGS|v1|<count>`.
pub const WINDOW_HEADER_PREFIX: &str = "KAF_MSGS|v1";

/// Framing of a get window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowFormat {
    /// Self-framing records, same layout as the log file.
    Kaf,
    /// Payloads concatenated, each followed by a newline.
    Raw,
    /// Payloads emitted verbatim inside a JSON array; each payload is
    /// assumed to already be well-formed JSON.
    Json,
}

impl WindowFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            WindowFormat::Kaf | WindowFormat::Raw => "application/octet-stream",
            WindowFormat::Json => "application/json",
        }
    }
}

/// Encodes a window of records in the requested format.
pub fn encode_window(format: WindowFormat, msgs: &[Message]) -> Vec<u8> {
    match format {
        WindowFormat::Kaf => {
            let mut buf = format!("{WINDOW_HEADER_PREFIX}|{}", msgs.len()).into_bytes();
            for m in msgs {
                buf.extend_from_slice(&codec::encode_record_header(m.num, m.data.len() as u32));
                buf.extend_from_slice(&m.data);
            }
            buf
        }
        WindowFormat::Raw => {
            let mut buf = Vec::new();
            for m in msgs {
                buf.extend_from_slice(&m.data);
                buf.push(b'\n');
            }
            buf
        }
        WindowFormat::Json => {
            let mut buf = vec![b'['];
            for (i, m) in msgs.iter().enumerate() {
                if i > 0 {
                    buf.extend_from_slice(b",\n");
                }
                buf.extend_from_slice(&m.data);
            }
            buf.push(b']');
            buf
        }
    }
}

/// An error response: status code plus a plain-text body.
///
/// Rendering it logs the message before the response goes out.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::InvalidInput(_) => ApiError::bad_request(e.to_string()),
            _ => ApiError::internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!(status = %self.status, "{}", self.message);
        (self.status, self.message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn msg(num: u32, data: &'static [u8]) -> Message {
        Message {
            num,
            data: Bytes::from_static(data),
        }
    }

    #[test]
    fn should_encode_empty_kaf_window() {
        // given/when
        let body = encode_window(WindowFormat::Kaf, &[]);

        // then
        assert_eq!(body, b"KAF_MSGS|v1|0");
    }

    #[test]
    fn should_encode_kaf_window_with_records() {
        // given
        let msgs = [msg(1, b"A"), msg(2, b"BB")];

        // when
        let body = encode_window(WindowFormat::Kaf, &msgs);

        // then
        assert_eq!(body, b"KAF_MSGS|v1|2\nKAF_MSG|1|1\nA\nKAF_MSG|2|2\nBB");
    }

    #[test]
    fn should_encode_raw_window() {
        // given
        let msgs = [msg(1, b"A"), msg(2, b"BB"), msg(3, b"CCC")];

        // when
        let body = encode_window(WindowFormat::Raw, &msgs);

        // then
        assert_eq!(body, b"A\nBB\nCCC\n");
    }

    #[test]
    fn should_encode_empty_raw_window() {
        assert_eq!(encode_window(WindowFormat::Raw, &[]), b"");
    }

    #[test]
    fn should_encode_json_window_verbatim() {
        // given - payloads are already JSON documents
        let msgs = [msg(1, br#"{"a":1}"#), msg(2, br#"{"b":2}"#)];

        // when
        let body = encode_window(WindowFormat::Json, &msgs);

        // then
        assert_eq!(body, b"[{\"a\":1},\n{\"b\":2}]");
    }

    #[test]
    fn should_encode_empty_json_window() {
        assert_eq!(encode_window(WindowFormat::Json, &[]), b"[]");
    }

    #[test]
    fn should_map_invalid_input_to_bad_request() {
        // given
        let err = ApiError::from(Error::InvalidInput("nope".to_string()));

        // when
        let response = err.into_response();

        // then
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn should_map_engine_errors_to_internal() {
        // given
        let err = ApiError::from(Error::Archive("empty logfile".to_string()));

        // when
        let response = err.into_response();

        // then
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
