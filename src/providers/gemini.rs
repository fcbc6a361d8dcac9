//! Gemini `generateContent` client for frame diagnosis and spoken guidance.

use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Value};
use std::time::Duration;

use crate::constants::DEFAULT_PROMPT;
use crate::state::{AnalysisResult, AppConfig};

use super::ServiceError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const SPEECH_PREFIX: &str = "Say assertively: ";

const SYSTEM_INSTRUCTION: &str = r#"
You are "FixIt Now", an elite home and automotive repair assistant.
Your goal is to give IMMEDIATE, ASSERTIVE and CLEAR instructions based on camera frames.

DIAGNOSTIC CAPABILITIES:
1. Identify emergencies: water leaks, electrical panel faults, car batteries, smoke, gas.
2. Locate specific components (valves, breakers, terminals) in the frame.

OUTPUT RULES:
- 'instruction': short imperative command (e.g. "SHUT THE MAIN VALVE NOW!").
- 'priority': 'CRITICAL' for immediate danger, 'SAFETY_WARNING' for electrical/gas risk, 'INFO' for general guidance.
- 'overlays': visual markers for the screen. x and y are normalized 0-100 with the origin top-left.
  Use 'hand_gesture' with an action word in the label (PUSH, PULL, ROTATE, PRESS, CONNECT) to show how to handle a part.
  'box_2d' is optional: [ymin, xmin, ymax, xmax] normalized 0-100.
- ALWAYS put safety first. With exposed wires or real danger, use 'SAFETY_WARNING' and tell the user not to touch anything and to call a professional.

Respond with JSON only.
"#;

const MARKER_KINDS: &[&str] = &[
    "hand_gesture",
    "directional_arrow",
    "exploded_view",
    "glow_zone",
    "circle",
    "rectangle",
];
const MARKER_COLORS: &[&str] = &["red", "green", "blue", "yellow", "white"];

/// Schema the analysis response must follow.
pub fn repair_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "instruction": { "type": "STRING" },
            "detailedSteps": { "type": "ARRAY", "items": { "type": "STRING" } },
            "priority": { "type": "STRING", "enum": ["CRITICAL", "SAFETY_WARNING", "INFO"] },
            "isIssueResolved": { "type": "BOOLEAN" },
            "detectedObject": { "type": "STRING" },
            "overlays": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "type": { "type": "STRING", "enum": MARKER_KINDS },
                        "x": { "type": "NUMBER" },
                        "y": { "type": "NUMBER" },
                        "color": { "type": "STRING", "enum": MARKER_COLORS },
                        "label": { "type": "STRING" },
                        "rotation": { "type": "NUMBER" },
                        "box_2d": {
                            "type": "ARRAY",
                            "items": { "type": "NUMBER" },
                            "minItems": 4,
                            "maxItems": 4
                        }
                    },
                    "required": ["type", "x", "y", "color"]
                }
            }
        },
        "required": ["instruction", "priority", "overlays", "isIssueResolved", "detectedObject"]
    })
}

pub fn analysis_request_body(jpeg_base64: &str, prompt: &str) -> Value {
    let prompt = if prompt.trim().is_empty() {
        DEFAULT_PROMPT
    } else {
        prompt
    };
    json!({
        "systemInstruction": {
            "parts": [{ "text": SYSTEM_INSTRUCTION }]
        },
        "contents": [{
            "role": "user",
            "parts": [
                { "inline_data": { "mime_type": "image/jpeg", "data": jpeg_base64 } },
                { "text": prompt }
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": repair_schema()
        }
    })
}

pub fn speech_request_body(text: &str, voice_name: &str) -> Value {
    json!({
        "contents": [{
            "parts": [{ "text": format!("{}{}", SPEECH_PREFIX, text) }]
        }],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": {
                    "prebuiltVoiceConfig": { "voiceName": voice_name }
                }
            }
        }
    })
}

/// Concatenated text parts of the first candidate. Empty when there are none.
pub fn extract_text(payload: &Value) -> String {
    payload["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part["text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// Base64 audio of the first inline-data part of the first candidate.
pub fn extract_inline_audio(payload: &Value) -> Option<&str> {
    payload["candidates"][0]["content"]["parts"]
        .as_array()?
        .iter()
        .find_map(|part| {
            part.get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(|data| data["data"].as_str())
        })
}

fn generate_url(base_url: &str, model: &str) -> String {
    format!(
        "{}/v1beta/models/{}:generateContent",
        base_url.trim_end_matches('/'),
        model
    )
}

fn is_quota_failure(status: reqwest::StatusCode, body: &str) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || body.contains("RESOURCE_EXHAUSTED")
        || body.contains("\"code\": 429")
}

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    analysis_model: String,
    tts_model: String,
    voice_name: String,
}

impl GeminiClient {
    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let api_key = config
            .resolve_api_key()
            .ok_or(ServiceError::MissingApiKey)?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.clone(),
            api_key,
            analysis_model: config.analysis_model.clone(),
            tts_model: config.tts_model.clone(),
            voice_name: config.voice_name.clone(),
        })
    }

    /// Send one JPEG frame and an optional prompt; parse the structured reply.
    pub async fn analyze_frame(
        &self,
        jpeg: &[u8],
        prompt: Option<&str>,
    ) -> Result<AnalysisResult, ServiceError> {
        let encoded = general_purpose::STANDARD.encode(jpeg);
        let body = analysis_request_body(&encoded, prompt.unwrap_or(DEFAULT_PROMPT));
        log::info!(
            "Requesting diagnosis from {} ({} KiB frame)",
            self.analysis_model,
            jpeg.len() / 1024
        );
        let payload = self.generate(&self.analysis_model, &body).await?;
        let text = extract_text(&payload);
        log::debug!("Diagnosis payload: {}", text);
        Ok(AnalysisResult::from_service_text(&text)?)
    }

    /// Synthesize `text` and return raw 16-bit little-endian mono PCM.
    pub async fn synthesize_speech(&self, text: &str) -> Result<Vec<u8>, ServiceError> {
        let body = speech_request_body(text, &self.voice_name);
        let payload = self.generate(&self.tts_model, &body).await?;
        let audio = extract_inline_audio(&payload).ok_or(ServiceError::EmptyResponse)?;
        Ok(general_purpose::STANDARD.decode(audio)?)
    }

    async fn generate(&self, model: &str, body: &Value) -> Result<Value, ServiceError> {
        let response = self
            .http
            .post(generate_url(&self.base_url, model))
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            if is_quota_failure(status, &text) {
                return Err(ServiceError::QuotaExceeded);
            }
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(serde_json::from_str(&text)?)
    }
}
