//! Error taxonomy for the stats collection pipeline.
//!
//! Every fallible operation in the library returns [`TdarrError`]. The
//! collector decides per call site whether an error aborts the cycle or only
//! drops one data point.

use std::num::ParseFloatError;

/// Errors raised while talking to Tdarr or interpreting its responses.
#[derive(Debug, thiserror::Error)]
pub enum TdarrError {
    /// The transport gave up after retrying a network-level failure.
    #[error("error sending HTTP request to {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server kept answering with a 5xx status after all retries.
    #[error("received server error status code {status} from {url}")]
    Server { url: String, status: u16 },

    /// 4xx responses are returned immediately, never retried.
    #[error("received client error status code {status} from {url}")]
    Client { url: String, status: u16 },

    /// 3xx responses are reported, not followed.
    #[error("received redirect status code {status} from {url}{}", location_suffix(.location))]
    Redirect {
        url: String,
        status: u16,
        location: Option<String>,
    },

    #[error("failed to decode response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse {field} value {value:?} as a number: {source}")]
    Parse {
        field: &'static str,
        value: String,
        #[source]
        source: ParseFloatError,
    },

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("invalid request url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to encode request payload: {0}")]
    Encode(#[source] serde_json::Error),

    /// The HTTP client itself could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

fn location_suffix(location: &Option<String>) -> String {
    match location {
        Some(location) => format!(", location: {location}"),
        None => String::new(),
    }
}

impl TdarrError {
    /// Parses a numeric string field, tagging failures with the field name.
    pub fn parse_f64(field: &'static str, value: &str) -> Result<f64, TdarrError> {
        value
            .trim()
            .parse::<f64>()
            .map_err(|source| TdarrError::Parse {
                field,
                value: value.to_string(),
                source,
            })
    }
}

/// A legacy positional row field that did not have the expected JSON type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("legacy pie row {row} field {index} ({field}): expected {expected}, found {found}")]
pub struct ShapeError {
    /// Position of the row inside the `pies` array.
    pub row: usize,
    /// Position of the field inside the row.
    pub index: usize,
    pub field: &'static str,
    pub expected: &'static str,
    /// JSON type actually found (`"missing"` when the row is too short).
    pub found: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_f64_accepts_decimal_string() {
        let value = TdarrError::parse_f64("tdarrScore", "57.3").unwrap();
        assert!((value - 57.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_f64_rejects_non_numeric() {
        let err = TdarrError::parse_f64("tdarrScore", "n/a").unwrap_err();
        match err {
            TdarrError::Parse { field, value, .. } => {
                assert_eq!(field, "tdarrScore");
                assert_eq!(value, "n/a");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_redirect_display_includes_location() {
        let err = TdarrError::Redirect {
            url: "http://tdarr/api".into(),
            status: 301,
            location: Some("https://tdarr/api".into()),
        };
        assert_eq!(
            err.to_string(),
            "received redirect status code 301 from http://tdarr/api, location: https://tdarr/api"
        );

        let err = TdarrError::Redirect {
            url: "http://tdarr/api".into(),
            status: 302,
            location: None,
        };
        assert_eq!(
            err.to_string(),
            "received redirect status code 302 from http://tdarr/api"
        );
    }

    #[test]
    fn test_shape_error_display_and_conversion() {
        let shape = ShapeError {
            row: 2,
            index: 3,
            field: "total transcodes",
            expected: "number",
            found: "string",
        };
        assert_eq!(
            shape.to_string(),
            "legacy pie row 2 field 3 (total transcodes): expected number, found string"
        );
        let err: TdarrError = shape.clone().into();
        assert_eq!(err.to_string(), shape.to_string());
    }
}
