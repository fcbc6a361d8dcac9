use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::marker::{MarkerList, MarkerWire};

/// Urgency of a diagnosis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Critical,
    SafetyWarning,
    Info,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Priority::Critical => "CRITICAL",
            Priority::SafetyWarning => "SAFETY WARNING",
            Priority::Info => "INFO",
        }
    }
}

/// Structured diagnosis returned by the analysis service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Short imperative command
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detailed_steps: Vec<String>,
    pub priority: Priority,
    pub is_issue_resolved: bool,
    pub detected_object: String,
    /// Overlays that failed to parse are skipped individually
    #[serde(default, deserialize_with = "lenient_overlays")]
    pub overlays: Vec<MarkerWire>,
    /// Stamped locally when the result is ingested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
}

fn lenient_overlays<'de, D>(deserializer: D) -> Result<Vec<MarkerWire>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    let mut overlays = Vec::with_capacity(raw.len());
    for (index, value) in raw.into_iter().enumerate() {
        match serde_json::from_value::<MarkerWire>(value) {
            Ok(wire) => overlays.push(wire),
            Err(err) => log::warn!("Skipping malformed overlay #{}: {}", index, err),
        }
    }
    Ok(overlays)
}

impl AnalysisResult {
    /// Parse the service's JSON text and stamp the receive time.
    pub fn from_service_text(text: &str) -> Result<Self, serde_json::Error> {
        let text = if text.trim().is_empty() { "{}" } else { text };
        let mut result: AnalysisResult = serde_json::from_str(text)?;
        result.received_at = Some(Utc::now());
        Ok(result)
    }

    /// Ingest the overlays into a fresh marker list.
    pub fn marker_list(&self) -> MarkerList {
        MarkerList::from_wire(&self.overlays)
    }

    /// Plain-text rendering of the control panel contents.
    pub fn summary(&self) -> String {
        let mut out = format!("[{}] {}\n", self.priority.label(), self.instruction);
        for step in self.detailed_steps.iter() {
            out.push_str(&format!("  - {}\n", step));
        }
        out.push_str(&format!("Diagnosis: {}", self.detected_object));
        if self.is_issue_resolved {
            out.push_str(" (RESOLVED)");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "instruction": "CLOSE THE VALVE NOW!",
        "detailedSteps": ["Find the main valve", "Turn clockwise"],
        "priority": "SAFETY_WARNING",
        "isIssueResolved": false,
        "detectedObject": "Water pipe",
        "overlays": [
            {"type": "arrow", "x": 50, "y": 50, "color": "red", "rotation": 90},
            {"type": "ghost_hand", "x": 30, "y": 40, "color": "green", "label": "ROTATE"}
        ]
    }"#;

    #[test]
    fn test_parses_camel_case_payload() {
        let result = AnalysisResult::from_service_text(SAMPLE).unwrap();
        assert_eq!(result.priority, Priority::SafetyWarning);
        assert_eq!(result.detailed_steps.len(), 2);
        assert_eq!(result.overlays.len(), 2);
        assert!(result.received_at.is_some());
        assert_eq!(result.marker_list().len(), 2);
    }

    #[test]
    fn test_empty_text_is_rejected() {
        assert!(AnalysisResult::from_service_text("").is_err());
    }

    #[test]
    fn test_missing_overlays_defaults_to_empty() {
        let json = r#"{"instruction":"OK","priority":"INFO","isIssueResolved":true,"detectedObject":"Fuse box"}"#;
        let result = AnalysisResult::from_service_text(json).unwrap();
        assert!(result.overlays.is_empty());
        assert!(result.marker_list().is_empty());
    }

    #[test]
    fn test_malformed_overlay_does_not_discard_diagnosis() {
        let json = r#"{
            "instruction": "SHUT OFF THE GAS",
            "priority": "CRITICAL",
            "isIssueResolved": false,
            "detectedObject": "Gas meter",
            "overlays": [
                {"type": "rectangle", "x": 40, "y": 40, "color": "red", "box_2d": [10, 20, 30]},
                {"type": "circle", "x": "left", "y": 10, "color": "red"},
                {"type": "glow_zone", "x": 60, "y": 30, "color": "yellow"}
            ]
        }"#;
        let result = AnalysisResult::from_service_text(json).unwrap();
        assert_eq!(result.instruction, "SHUT OFF THE GAS");
        assert_eq!(result.overlays.len(), 2);

        let list = result.marker_list();
        assert_eq!(list.len(), 2);
        assert_eq!(list.markers()[0].extent, None);
        assert_eq!(list.markers()[1].shape, crate::state::MarkerShape::GlowZone);
    }

    #[test]
    fn test_null_overlays_defaults_to_empty() {
        let json = r#"{"instruction":"OK","priority":"INFO","isIssueResolved":true,"detectedObject":"Sink","overlays":null}"#;
        assert!(AnalysisResult::from_service_text(json).unwrap().overlays.is_empty());
    }

    #[test]
    fn test_summary_lists_steps_and_resolution() {
        let json = r#"{"instruction":"DONE","detailedSteps":["Check"],"priority":"INFO","isIssueResolved":true,"detectedObject":"Breaker"}"#;
        let summary = AnalysisResult::from_service_text(json).unwrap().summary();
        assert!(summary.starts_with("[INFO] DONE"));
        assert!(summary.contains("  - Check"));
        assert!(summary.ends_with("Diagnosis: Breaker (RESOLVED)"));
    }
}
