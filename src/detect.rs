//! Remote classification client.
//!
//! The contract with the inference server is a single JSON round trip:
//! `POST <endpoint>` with `{"image": "<base64 jpeg, no data-URL prefix>"}`
//! answers either
//! `{"status": "success", "prediction": "...", "confidence": 0..1}` or
//! `{"status": "error", "message": "..."}` (message optional).

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::frame::DATA_URL_PREFIX;

/// Substituted when the server reports an error without a message.
pub const DEFAULT_SERVER_ERROR: &str = "Unknown error";

/// Classification labels the client knows how to present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Prediction {
    CorrectMask,
    IncorrectMask,
    NoMask,
    /// A label outside the known set (e.g. a server trained with different
    /// classes). Presented neutrally, never treated as an error.
    Other(String),
}

impl Prediction {
    pub fn parse(label: &str) -> Self {
        match label {
            "correct_mask" => Prediction::CorrectMask,
            "incorrect_mask" => Prediction::IncorrectMask,
            "no_mask" => Prediction::NoMask,
            other => Prediction::Other(other.to_string()),
        }
    }

    /// The wire label as sent by the server.
    pub fn label(&self) -> &str {
        match self {
            Prediction::CorrectMask => "correct_mask",
            Prediction::IncorrectMask => "incorrect_mask",
            Prediction::NoMask => "no_mask",
            Prediction::Other(label) => label,
        }
    }
}

/// Parsed outcome of one classification round trip. Transient: rendered once
/// and discarded.
#[derive(Clone, Debug, PartialEq)]
pub enum Detection {
    Classified {
        prediction: Prediction,
        confidence: f32,
    },
    /// The server answered HTTP 200 with a logical error.
    ServerError { message: String },
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    image: &'a str,
}

/// Wire response - covers both the success and the error shape.
#[derive(Debug, Deserialize)]
pub struct DetectResponse {
    pub status: String,
    #[serde(default)]
    pub prediction: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Lift a wire response into a typed `Detection`.
///
/// Any status other than "success" takes the error path. A success response
/// missing its prediction or confidence, or carrying a confidence outside
/// [0, 1], is malformed.
pub fn parse_detect_response(response: DetectResponse) -> Result<Detection> {
    if response.status != "success" {
        let message = response
            .message
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_ERROR.to_string());
        return Ok(Detection::ServerError { message });
    }
    let prediction = response
        .prediction
        .ok_or_else(|| anyhow!("success response missing prediction"))?;
    let confidence = response
        .confidence
        .ok_or_else(|| anyhow!("success response missing confidence"))?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(anyhow!("confidence {} out of bounds", confidence));
    }
    Ok(Detection::Classified {
        prediction: Prediction::parse(&prediction),
        confidence,
    })
}

pub(crate) fn wire_payload(frame_data: &str) -> &str {
    frame_data
        .strip_prefix(DATA_URL_PREFIX)
        .unwrap_or(frame_data)
}

/// HTTP client for the classification endpoint.
#[derive(Clone)]
pub struct DetectClient {
    endpoint: Url,
    agent: ureq::Agent,
}

impl DetectClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint).context("parse classification endpoint")?;
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self { endpoint, agent })
    }

    /// Submit one frame. Accepts either a data-URL or a bare base64 payload;
    /// the data-URL prefix never goes on the wire.
    pub fn classify(&self, frame_data: &str) -> Result<Detection> {
        let response = self
            .agent
            .post(self.endpoint.as_str())
            .send_json(DetectRequest {
                image: wire_payload(frame_data),
            })
            .context("submit frame to classification endpoint")?;
        let parsed: DetectResponse = response
            .into_json()
            .context("decode classification response")?;
        parse_detect_response(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_json(json: &str) -> Result<Detection> {
        let response: DetectResponse = serde_json::from_str(json).expect("wire json");
        parse_detect_response(response)
    }

    #[test]
    fn success_response_parses_to_classification() -> Result<()> {
        let detection = parse_json(
            r#"{"status": "success", "prediction": "no_mask", "confidence": 0.87}"#,
        )?;
        assert_eq!(
            detection,
            Detection::Classified {
                prediction: Prediction::NoMask,
                confidence: 0.87,
            }
        );
        Ok(())
    }

    #[test]
    fn unknown_labels_are_preserved_not_rejected() -> Result<()> {
        let detection =
            parse_json(r#"{"status": "success", "prediction": "mask", "confidence": 0.5}"#)?;
        match detection {
            Detection::Classified { prediction, .. } => {
                assert_eq!(prediction, Prediction::Other("mask".to_string()));
                assert_eq!(prediction.label(), "mask");
            }
            other => panic!("unexpected detection {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn error_without_message_gets_the_default() -> Result<()> {
        let detection = parse_json(r#"{"status": "error"}"#)?;
        assert_eq!(
            detection,
            Detection::ServerError {
                message: DEFAULT_SERVER_ERROR.to_string(),
            }
        );
        Ok(())
    }

    #[test]
    fn empty_error_message_gets_the_default() -> Result<()> {
        let detection = parse_json(r#"{"status": "error", "message": ""}"#)?;
        assert_eq!(
            detection,
            Detection::ServerError {
                message: DEFAULT_SERVER_ERROR.to_string(),
            }
        );
        Ok(())
    }

    #[test]
    fn unrecognized_status_takes_the_error_path() -> Result<()> {
        let detection = parse_json(r#"{"status": "pending", "message": "warming up"}"#)?;
        assert_eq!(
            detection,
            Detection::ServerError {
                message: "warming up".to_string(),
            }
        );
        Ok(())
    }

    #[test]
    fn success_missing_fields_is_malformed() {
        assert!(parse_json(r#"{"status": "success"}"#).is_err());
        assert!(parse_json(r#"{"status": "success", "prediction": "no_mask"}"#).is_err());
        assert!(parse_json(r#"{"status": "success", "confidence": 0.9}"#).is_err());
    }

    #[test]
    fn out_of_bounds_confidence_is_malformed() {
        assert!(
            parse_json(r#"{"status": "success", "prediction": "no_mask", "confidence": 1.2}"#)
                .is_err()
        );
        assert!(
            parse_json(r#"{"status": "success", "prediction": "no_mask", "confidence": -0.1}"#)
                .is_err()
        );
    }

    #[test]
    fn data_url_prefix_is_stripped_from_the_payload() {
        assert_eq!(wire_payload("data:image/jpeg;base64,AAAA"), "AAAA");
        assert_eq!(wire_payload("AAAA"), "AAAA");
    }
}
