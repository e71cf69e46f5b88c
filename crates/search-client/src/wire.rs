use core_types::Citation;
use serde::{Deserialize, Serialize};

/// Body of `POST /v1beta/models/{model}:generateContent`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    pub tools: Vec<Tool>,
}

impl GenerateRequest {
    /// A single-turn prompt with search grounding switched on.
    pub fn grounded(prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            tools: vec![Tool {
                google_search: GoogleSearch {},
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub google_search: GoogleSearch,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoogleSearch {}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroundingChunk {
    pub web: Option<WebSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSource {
    pub uri: Option<String>,
    pub title: Option<String>,
}

impl GenerateResponse {
    /// Every text part of every candidate, joined by newlines.
    pub fn text(&self) -> String {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Grounding sources with a uri, in reply order. A missing title falls back to the uri.
    pub fn citations(&self) -> Vec<Citation> {
        self.candidates
            .iter()
            .filter_map(|c| c.grounding_metadata.as_ref())
            .flat_map(|meta| meta.grounding_chunks.iter())
            .filter_map(|chunk| chunk.web.as_ref())
            .filter_map(|web| {
                let uri = web.uri.clone().filter(|u| !u.is_empty())?;
                let title = web.title.clone().unwrap_or_else(|| uri.clone());
                Some(Citation { uri, title })
            })
            .collect()
    }
}

/// Error envelope returned on non-2xx replies.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorEnvelope {
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    pub message: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub details: Vec<serde_json::Value>,
}

impl ErrorEnvelope {
    pub fn describe(&self) -> String {
        self.error
            .as_ref()
            .and_then(|e| e.message.clone().or_else(|| e.status.clone()))
            .unwrap_or_else(|| "no details".to_string())
    }

    /// A 400 can still mean a bad key; the reason is buried in the details.
    pub fn is_invalid_key(&self) -> bool {
        let Some(body) = &self.error else {
            return false;
        };
        let message = body.message.as_deref().unwrap_or_default();
        message.contains("API key not valid")
            || body
                .details
                .iter()
                .any(|d| d.get("reason").and_then(|r| r.as_str()) == Some("API_KEY_INVALID"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_enables_search_grounding() {
        let body = serde_json::to_value(GenerateRequest::grounded("price of SPY")).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "price of SPY");
        assert_eq!(body["tools"][0]["google_search"], serde_json::json!({}));
    }

    #[test]
    fn reads_text_and_citations() {
        let raw = r#"{"candidates":[{
            "content":{"parts":[{"text":"Here you go:"},{"text":"{\"currentPrice\": 501.2}"}],"role":"model"},
            "groundingMetadata":{"groundingChunks":[
                {"web":{"uri":"https://a.example/spy","title":"A"}},
                {"web":{"uri":"https://b.example/spy"}},
                {"retrievedContext":{}}
            ]}
        }]}"#;
        let response: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.text(), "Here you go:\n{\"currentPrice\": 501.2}");

        let citations = response.citations();
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[1].title, "https://b.example/spy");
    }

    #[test]
    fn recognises_a_rejected_key_on_bad_request() {
        let raw = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.",
            "status":"INVALID_ARGUMENT","details":[{"reason":"API_KEY_INVALID"}]}}"#;
        let envelope: ErrorEnvelope = serde_json::from_str(raw).unwrap();
        assert!(envelope.is_invalid_key());

        let other: ErrorEnvelope =
            serde_json::from_str(r#"{"error":{"message":"Request contains an invalid argument."}}"#).unwrap();
        assert!(!other.is_invalid_key());
    }
}
