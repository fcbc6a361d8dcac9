use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::providers::ServiceError;

use super::analysis::AnalysisResult;
use super::marker::MarkerList;

pub const QUOTA_BANNER: &str = "QUOTA EXCEEDED. TRY AGAIN IN 1 MINUTE.";
pub const FAILURE_BANNER: &str = "TELEMETRY FAILURE.";

/// Preset diagnostic prompts offered before the first analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickPrompt {
    Leak,
    PowerOutage,
    BatteryJump,
    GasSmell,
}

impl QuickPrompt {
    pub const ALL: [QuickPrompt; 4] = [
        QuickPrompt::Leak,
        QuickPrompt::PowerOutage,
        QuickPrompt::BatteryJump,
        QuickPrompt::GasSmell,
    ];

    pub fn label(self) -> &'static str {
        match self {
            QuickPrompt::Leak => "Leak",
            QuickPrompt::PowerOutage => "Power outage",
            QuickPrompt::BatteryJump => "Battery jump-start",
            QuickPrompt::GasSmell => "Gas smell",
        }
    }

    pub fn prompt(self) -> String {
        format!("Checking: {}", self.label())
    }

    fn key(self) -> &'static str {
        match self {
            QuickPrompt::Leak => "leak",
            QuickPrompt::PowerOutage => "power-outage",
            QuickPrompt::BatteryJump => "battery-jump",
            QuickPrompt::GasSmell => "gas-smell",
        }
    }
}

impl fmt::Display for QuickPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for QuickPrompt {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim().to_ascii_lowercase().replace('_', "-");
        QuickPrompt::ALL
            .into_iter()
            .find(|prompt| prompt.key() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = QuickPrompt::ALL.iter().map(|prompt| prompt.key()).collect();
                format!("unknown quick prompt '{}' (expected one of: {})", raw, known.join(", "))
            })
    }
}

/// Host-view state around one camera feed: the busy flag, the current
/// diagnosis and the marker list handed to the overlay driver.
#[derive(Debug)]
pub struct RepairSession {
    is_analyzing: bool,
    analysis: Option<AnalysisResult>,
    markers: Arc<MarkerList>,
    error: Option<String>,
    tts_enabled: bool,
}

impl RepairSession {
    pub fn new(tts_enabled: bool) -> Self {
        Self {
            is_analyzing: false,
            analysis: None,
            markers: Arc::new(MarkerList::empty()),
            error: None,
            tts_enabled,
        }
    }

    /// Start a request. Clears the previous diagnosis and its markers
    /// immediately. Returns `false` while another request is in flight.
    pub fn begin_diagnostic(&mut self) -> bool {
        if self.is_analyzing {
            log::debug!("Diagnostic already in flight");
            return false;
        }
        self.is_analyzing = true;
        self.error = None;
        self.analysis = None;
        self.markers = Arc::new(MarkerList::empty());
        true
    }

    pub fn finish_diagnostic(&mut self, result: Result<AnalysisResult, ServiceError>) {
        self.is_analyzing = false;
        match result {
            Ok(analysis) => {
                let markers = analysis.marker_list();
                log::info!(
                    "Diagnosis received: {} ({} overlays)",
                    analysis.detected_object,
                    markers.len()
                );
                self.markers = Arc::new(markers);
                self.analysis = Some(analysis);
            }
            Err(err) => {
                log::warn!("Diagnosis failed: {}", err);
                let banner = if err.is_quota() {
                    QUOTA_BANNER
                } else {
                    FAILURE_BANNER
                };
                self.error = Some(banner.to_string());
            }
        }
    }

    /// Instruction to narrate, if audio guidance is on.
    pub fn instruction_to_speak(&self) -> Option<&str> {
        if !self.tts_enabled {
            return None;
        }
        self.analysis
            .as_ref()
            .map(|analysis| analysis.instruction.as_str())
            .filter(|text| !text.trim().is_empty())
    }

    pub fn toggle_tts(&mut self) {
        self.tts_enabled = !self.tts_enabled;
    }

    pub fn markers(&self) -> Arc<MarkerList> {
        Arc::clone(&self.markers)
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.analysis.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[cfg(test)]
    pub fn is_analyzing(&self) -> bool {
        self.is_analyzing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quick_prompt_parses_cli_names() {
        assert_eq!("power-outage".parse::<QuickPrompt>(), Ok(QuickPrompt::PowerOutage));
        assert_eq!("GAS_SMELL".parse::<QuickPrompt>(), Ok(QuickPrompt::GasSmell));
        assert!("flood".parse::<QuickPrompt>().is_err());
        assert_eq!(QuickPrompt::BatteryJump.prompt(), "Checking: Battery jump-start");
    }

    fn analysis_with_overlay() -> AnalysisResult {
        AnalysisResult::from_service_text(
            r#"{"instruction":"TURN OFF THE BREAKER","priority":"CRITICAL","isIssueResolved":false,
                "detectedObject":"Panel","overlays":[{"type":"circle","x":10,"y":10,"color":"red"}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_begin_clears_previous_markers() {
        let mut session = RepairSession::new(true);
        assert!(session.begin_diagnostic());
        session.finish_diagnostic(Ok(analysis_with_overlay()));
        assert_eq!(session.markers().len(), 1);

        assert!(session.begin_diagnostic());
        assert!(session.markers().is_empty());
        assert!(session.analysis().is_none());
    }

    #[test]
    fn test_busy_flag_rejects_second_request() {
        let mut session = RepairSession::new(false);
        assert!(session.begin_diagnostic());
        assert!(!session.begin_diagnostic());
        assert!(session.is_analyzing());
    }

    #[test]
    fn test_quota_error_maps_to_quota_banner() {
        let mut session = RepairSession::new(true);
        session.begin_diagnostic();
        session.finish_diagnostic(Err(ServiceError::QuotaExceeded));
        assert_eq!(session.error(), Some(QUOTA_BANNER));
        assert!(!session.is_analyzing());
    }

    #[test]
    fn test_other_errors_map_to_failure_banner() {
        let mut session = RepairSession::new(true);
        session.begin_diagnostic();
        session.finish_diagnostic(Err(ServiceError::MissingApiKey));
        assert_eq!(session.error(), Some(FAILURE_BANNER));
        assert!(session.markers().is_empty());
    }

    #[test]
    fn test_speech_follows_toggle() {
        let mut session = RepairSession::new(true);
        session.begin_diagnostic();
        session.finish_diagnostic(Ok(analysis_with_overlay()));
        assert_eq!(session.instruction_to_speak(), Some("TURN OFF THE BREAKER"));
        session.toggle_tts();
        assert_eq!(session.instruction_to_speak(), None);
    }

    #[test]
    fn test_quick_prompt_text() {
        assert_eq!(QuickPrompt::GasSmell.prompt(), "Checking: Gas smell");
        assert_eq!(QuickPrompt::ALL.len(), 4);
    }
}
