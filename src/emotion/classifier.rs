use std::collections::HashMap;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, error};

use crate::config::ClassifierConfig;
use crate::{Error, Result};

use super::EmotionLabel;

/// Why a sentiment classification could not be obtained.
#[derive(Debug, Error)]
pub enum ClassificationError {
    /// The request could not be sent, or the response could not be read. Includes timeouts.
    #[error("sentiment request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The service answered with a non-success HTTP status.
    #[error("sentiment service returned HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message reported by the service, or the status reason.
        message: String,
    },
    /// The service answered with an error payload.
    #[error("sentiment service error: {0}")]
    Api(String),
    /// The service answered with nothing.
    #[error("sentiment service returned an empty response")]
    Empty,
    /// The response could not be interpreted as three class scores.
    #[error("unexpected sentiment response format: {0}")]
    Format(String),
}

/// Scores of the three sentiment classes. The scores do not need to sum to 1.
#[derive(Debug, PartialEq, Clone, Copy, Default)]
#[allow(missing_docs)]
pub struct SentimentScores {
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
}

impl SentimentScores {
    /// Returns the winning label and its score.
    ///
    /// A class wins when its score is at least as large as both others. Ties go to positive, then
    /// negative, then neutral.
    pub fn winner(&self) -> (EmotionLabel, f64) {
        if self.positive >= self.neutral.max(self.negative) {
            (EmotionLabel::Positive, self.positive)
        } else if self.negative >= self.positive.max(self.neutral) {
            (EmotionLabel::Negative, self.negative)
        } else {
            (EmotionLabel::Neutral, self.neutral)
        }
    }

    /// Interprets a classifier response.
    ///
    /// Accepts a list of `{"label", "score"}` entries, or the same list wrapped in another list.
    /// Labels are case-insensitive and may use the ordinal names `LABEL_0` (negative), `LABEL_1`
    /// (neutral) and `LABEL_2` (positive). Classes missing from the response score 0.
    pub fn from_payload(payload: &Value) -> std::result::Result<Self, ClassificationError> {
        let items = match payload {
            Value::Object(map) if map.contains_key("error") => {
                error!(%payload, "sentiment service returned an error");
                return Err(ClassificationError::Api(error_message(&map["error"])));
            }
            Value::Null => return Err(empty_response()),
            Value::Array(items) if items.is_empty() => return Err(empty_response()),
            Value::Object(map) if map.is_empty() => return Err(empty_response()),
            Value::Array(items) => items,
            _ => return Err(unexpected_format(payload, "not a list")),
        };

        let entries = match &items[0] {
            Value::Array(inner) => inner,
            Value::Object(entry) if entry.contains_key("label") => items,
            _ => return Err(unexpected_format(payload, "no label entries")),
        };

        let score_map = entries
            .iter()
            .map(|entry| entry.as_object().and_then(label_and_score))
            .collect::<Option<HashMap<_, _>>>()
            .ok_or_else(|| unexpected_format(payload, "malformed label entry"))?;
        debug!(?score_map, "sentiment scores");

        let positive = class_score(&score_map, "positive", "label_2");
        let neutral = class_score(&score_map, "neutral", "label_1");
        let negative = class_score(&score_map, "negative", "label_0");

        match (positive, neutral, negative) {
            (None, None, None) => Err(unexpected_format(payload, "no sentiment labels")),
            (positive, neutral, negative) => Ok(Self {
                positive: positive.unwrap_or(0.0),
                neutral: neutral.unwrap_or(0.0),
                negative: negative.unwrap_or(0.0),
            }),
        }
    }
}

/// A remote or local service that scores text on the positive/neutral/negative scale.
pub trait Classifier {
    /// Scores the given text. Called at most once per detection, never retried.
    fn classify(&self, text: &str) -> std::result::Result<SentimentScores, ClassificationError>;
}

impl<F> Classifier for F
where
    F: Fn(&str) -> std::result::Result<SentimentScores, ClassificationError>,
{
    fn classify(&self, text: &str) -> std::result::Result<SentimentScores, ClassificationError> {
        self(text)
    }
}

/// Classifier backed by the Hugging Face inference API.
pub struct HuggingFaceClassifier {
    client: Client,
    endpoint: String,
}

impl HuggingFaceClassifier {
    /// Creates a classifier from the given configuration. Fails when no API token is available.
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let token = config.resolve_token().ok_or_else(|| {
            Error::Configuration(format!(
                "set one of the following environment variables for the Hugging Face API token: {}",
                config.token_env_vars.join(", ")
            ))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|err| Error::Configuration(format!("invalid API token: {}", err)))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|err| Error::Configuration(format!("failed to create HTTP client: {}", err)))?;

        let endpoint = config.endpoint();
        debug!(model = %config.model_id, %endpoint, "initialized sentiment classifier");

        Ok(Self {
            client,
            endpoint,
        })
    }

    /// Returns the URL classification requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Classifier for HuggingFaceClassifier {
    fn classify(&self, text: &str) -> std::result::Result<SentimentScores, ClassificationError> {
        let body = json!({
            "inputs": text,
            "options": {"wait_for_model": true, "use_cache": true},
        });

        let response = self.client.post(&self.endpoint).json(&body).send().map_err(|err| {
            error!(error = %err, "call to sentiment service failed");
            ClassificationError::Transport(err)
        })?;

        let status = response.status();
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-")
            .to_string();
        debug!(status = status.as_u16(), %request_id, "sentiment service responded");

        let body = response.text()?;
        let payload = serde_json::from_str::<Value>(&body);

        if !status.is_success() {
            let message = payload
                .ok()
                .and_then(|value| value.get("error").map(error_message))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
            error!(status = status.as_u16(), %message, "sentiment service rejected the request");
            return Err(ClassificationError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let payload = payload.map_err(|err| {
            error!(error = %err, "sentiment service returned invalid JSON");
            ClassificationError::Format(format!("invalid JSON: {}", err))
        })?;
        SentimentScores::from_payload(&payload)
    }
}

fn label_and_score(entry: &Map<String, Value>) -> Option<(String, f64)> {
    let label = entry.get("label")?.as_str()?.to_lowercase();
    let score = entry.get("score")?.as_f64()?;
    Some((label, score))
}

// A zero canonical score defers to the ordinal alias.
fn class_score(scores: &HashMap<String, f64>, name: &str, alias: &str) -> Option<f64> {
    match scores.get(name) {
        Some(&score) if score != 0.0 => Some(score),
        canonical => scores.get(alias).copied().or_else(|| canonical.copied()),
    }
}

fn error_message(value: &Value) -> String {
    match value {
        Value::String(message) => message.clone(),
        other => other.to_string(),
    }
}

fn empty_response() -> ClassificationError {
    error!("sentiment service returned an empty response");
    ClassificationError::Empty
}

fn unexpected_format(payload: &Value, reason: &str) -> ClassificationError {
    error!(%payload, reason, "unexpected response format from sentiment service");
    ClassificationError::Format(reason.to_string())
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    use super::*;

    fn parse(payload: Value) -> std::result::Result<SentimentScores, ClassificationError> {
        SentimentScores::from_payload(&payload)
    }

    #[test]
    fn test_nested_list() {
        let scores = parse(json!([[
            {"label": "positive", "score": 0.7},
            {"label": "neutral", "score": 0.2},
            {"label": "negative", "score": 0.1},
        ]]))
        .unwrap();
        assert_eq!(
            SentimentScores {
                positive: 0.7,
                neutral: 0.2,
                negative: 0.1,
            },
            scores
        );
    }

    #[test]
    fn test_flat_list_with_mixed_case() {
        let scores = parse(json!([
            {"label": "Negative", "score": 0.6},
            {"label": "NEUTRAL", "score": 0.3},
        ]))
        .unwrap();
        assert_eq!(0.0, scores.positive);
        assert_eq!(0.3, scores.neutral);
        assert_eq!(0.6, scores.negative);
    }

    #[test]
    fn test_ordinal_labels() {
        let scores = parse(json!([[
            {"label": "LABEL_0", "score": 0.05},
            {"label": "LABEL_1", "score": 0.15},
            {"label": "LABEL_2", "score": 0.8},
        ]]))
        .unwrap();
        assert_eq!((EmotionLabel::Positive, 0.8), scores.winner());
    }

    #[test]
    fn test_error_payload() {
        let err = parse(json!({"error": "Model is loading"})).unwrap_err();
        assert!(matches!(err, ClassificationError::Api(ref message) if message == "Model is loading"));
    }

    #[test]
    fn test_empty_payloads() {
        assert!(matches!(parse(Value::Null), Err(ClassificationError::Empty)));
        assert!(matches!(parse(json!([])), Err(ClassificationError::Empty)));
        assert!(matches!(parse(json!({})), Err(ClassificationError::Empty)));
    }

    #[test]
    fn test_unrecognized_shapes() {
        assert!(matches!(parse(json!("positive")), Err(ClassificationError::Format(_))));
        assert!(matches!(parse(json!({"label": "positive"})), Err(ClassificationError::Format(_))));
        assert!(matches!(parse(json!([1, 2, 3])), Err(ClassificationError::Format(_))));
        assert!(matches!(
            parse(json!([{"label": "positive", "score": "high"}])),
            Err(ClassificationError::Format(_))
        ));
        assert!(matches!(
            parse(json!([{"label": "joy", "score": 0.9}])),
            Err(ClassificationError::Format(_))
        ));
    }

    #[test]
    fn test_winner_tie_break() {
        let all_equal = SentimentScores {
            positive: 0.3,
            neutral: 0.3,
            negative: 0.3,
        };
        assert_eq!(EmotionLabel::Positive, all_equal.winner().0);

        let negative_neutral = SentimentScores {
            positive: 0.1,
            neutral: 0.45,
            negative: 0.45,
        };
        assert_eq!(EmotionLabel::Negative, negative_neutral.winner().0);

        let neutral = SentimentScores {
            positive: 0.1,
            neutral: 0.5,
            negative: 0.4,
        };
        assert_eq!((EmotionLabel::Neutral, 0.5), neutral.winner());
    }

    #[test]
    fn test_missing_token_is_configuration_error() {
        let config = ClassifierConfig {
            token_env_vars: vec!["EMPATHY_ENGINE_TEST_UNSET_TOKEN".to_string()],
            ..Default::default()
        };
        assert!(matches!(HuggingFaceClassifier::new(&config), Err(Error::Configuration(_))));
    }

    // Answers a single request with the given status line and body, and returns the request body.
    fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}/models/test", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            request
        });
        (endpoint, handle)
    }

    fn read_request(stream: &mut impl Read) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if data.len() >= end + 4 + length {
                    return String::from_utf8_lossy(&data[end + 4..end + 4 + length]).into_owned();
                }
            }
        }
        String::new()
    }

    fn classifier_at(endpoint: String) -> HuggingFaceClassifier {
        HuggingFaceClassifier::new(&ClassifierConfig {
            endpoint: Some(endpoint),
            token: Some("test-token".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_classify_success() {
        let (endpoint, server) = serve_once(
            "200 OK",
            r#"[[{"label":"negative","score":0.1},{"label":"neutral","score":0.2},{"label":"positive","score":0.7}]]"#,
        );
        let scores = classifier_at(endpoint).classify("What a day!").unwrap();
        assert_eq!(0.7, scores.positive);
        assert_eq!(0.2, scores.neutral);
        assert_eq!(0.1, scores.negative);

        let request: Value = serde_json::from_str(&server.join().unwrap()).unwrap();
        assert_eq!("What a day!", request["inputs"]);
        assert_eq!(true, request["options"]["wait_for_model"]);
    }

    #[test]
    fn test_classify_error_status() {
        let (endpoint, server) = serve_once("503 Service Unavailable", r#"{"error":"Model is loading"}"#);
        let err = classifier_at(endpoint).classify("hello").unwrap_err();
        server.join().unwrap();
        assert!(matches!(
            err,
            ClassificationError::Status { status: 503, ref message } if message == "Model is loading"
        ));
    }

    #[test]
    fn test_classify_error_status_without_body() {
        let (endpoint, server) = serve_once("500 Internal Server Error", "oops");
        let err = classifier_at(endpoint).classify("hello").unwrap_err();
        server.join().unwrap();
        assert!(matches!(
            err,
            ClassificationError::Status { status: 500, ref message } if message == "Internal Server Error"
        ));
    }

    #[test]
    fn test_classify_invalid_json() {
        let (endpoint, server) = serve_once("200 OK", "<html>not json</html>");
        let err = classifier_at(endpoint).classify("hello").unwrap_err();
        server.join().unwrap();
        assert!(matches!(
            err,
            ClassificationError::Format(ref message) if message.starts_with("invalid JSON")
        ));
    }

    #[test]
    fn test_classify_empty_list() {
        let (endpoint, server) = serve_once("200 OK", "[]");
        let err = classifier_at(endpoint).classify("hello").unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, ClassificationError::Empty));
    }

    #[test]
    fn test_classify_connection_refused() {
        let endpoint = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}/models/test", listener.local_addr().unwrap())
        };
        let err = classifier_at(endpoint).classify("hello").unwrap_err();
        assert!(matches!(err, ClassificationError::Transport(_)));
    }
}
