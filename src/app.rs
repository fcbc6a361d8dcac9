//! Command flows: diagnose a frame, re-render a saved diagnosis, manage config.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ab_glyph::FontVec;
use anyhow::{bail, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use crate::constants::TTS_SAMPLE_RATE;
use crate::core::audio::pcm::decode_pcm16_le;
use crate::core::audio::playback::SpeechPlayer;
use crate::core::audio::AudioError;
use crate::core::overlay::{RasterSurface, TimelineConfig};
use crate::core::paths::resolve_resource_path;
use crate::core::sequence::{write_png_sequence, SequenceBase, SequenceOptions};
use crate::providers::GeminiClient;
use crate::state::{AnalysisResult, AppConfig, MarkerList, QuickPrompt, RepairSession};

const ANALYSIS_FILE_NAME: &str = "analysis.json";
const FRAMES_DIR_NAME: &str = "frames";
/// Slack on top of the utterance length before playback is abandoned.
const SPEECH_DRAIN_SLACK: Duration = Duration::from_secs(2);

pub struct AnalyzeArgs {
    pub frame: PathBuf,
    pub prompt: Option<String>,
    pub quick: Option<QuickPrompt>,
    pub out: Option<PathBuf>,
    pub seconds: Option<f64>,
    pub no_speech: bool,
}

pub struct RenderArgs {
    pub analysis: PathBuf,
    pub frame: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub seconds: Option<f64>,
}

/// Diagnose one camera frame, save the result, render the overlay cue and
/// speak the instruction.
pub async fn run_analyze(config: &AppConfig, args: AnalyzeArgs) -> Result<()> {
    let frame = open_frame(&args.frame)?;
    let jpeg = encode_jpeg(&frame, config.jpeg_quality).context("Failed to encode frame as JPEG")?;
    let prompt = args
        .prompt
        .or_else(|| args.quick.map(QuickPrompt::prompt));

    let mut session = RepairSession::new(config.tts_enabled);
    if args.no_speech && config.tts_enabled {
        session.toggle_tts();
    }
    if !session.begin_diagnostic() {
        bail!("A diagnostic is already running");
    }
    let client = match GeminiClient::from_config(config) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            session.finish_diagnostic(Err(err));
            bail!(session.error().unwrap_or_default().to_string());
        }
    };
    let result = client.analyze_frame(&jpeg, prompt.as_deref()).await;
    session.finish_diagnostic(result);
    if let Some(banner) = session.error() {
        bail!(banner.to_string());
    }
    let Some(analysis) = session.analysis() else {
        bail!("Diagnostic finished without a result");
    };

    println!("{}", analysis.summary());
    let out_dir = output_dir(args.out);
    save_analysis(&out_dir, analysis)?;

    let speech = session
        .instruction_to_speak()
        .map(|text| spawn_speech(Arc::clone(&client), text.to_string()));

    render_frames_blocking(config, out_dir, session.markers(), frame, args.seconds).await?;

    if let Some(handle) = speech {
        if let Err(err) = handle.await {
            log::warn!("Speech task ended abnormally: {}", err);
        }
    }
    Ok(())
}

/// Re-render a saved diagnosis, over a frame or a blank demo canvas.
pub fn run_render(config: &AppConfig, args: RenderArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.analysis)
        .with_context(|| format!("Failed to read {:?}", args.analysis))?;
    let analysis: AnalysisResult = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid analysis file {:?}", args.analysis))?;
    println!("{}", analysis.summary());

    let frame = args
        .frame
        .as_deref()
        .map(open_frame)
        .transpose()?
        .map(|frame| frame.to_rgba8());
    let base = match frame.as_ref() {
        Some(frame) => SequenceBase::Frame(frame),
        None => SequenceBase::Blank {
            width: config.demo_viewport.width,
            height: config.demo_viewport.height,
        },
    };

    let out_dir = output_dir(args.out);
    render_frames(
        config,
        &out_dir,
        Arc::new(analysis.marker_list()),
        base,
        args.seconds,
    )
}

/// Print the effective config; with `init`, also write it to `path`.
pub fn run_config(config: &AppConfig, path: &Path, init: bool) -> Result<()> {
    if init {
        if path.exists() {
            bail!("Config already exists at {:?}", path);
        }
        config
            .save_to(path)
            .with_context(|| format!("Failed to write config {:?}", path))?;
        log::info!("Wrote default config to {:?}", path);
    }
    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(config)?);
    println!(
        "# API key: {}",
        if config.resolve_api_key().is_some() {
            "configured"
        } else {
            "missing"
        }
    );
    Ok(())
}

pub fn list_quick_prompts() {
    for prompt in QuickPrompt::ALL {
        println!("{:<14} {}", prompt.to_string(), prompt.prompt());
    }
}

fn render_frames(
    config: &AppConfig,
    out_dir: &Path,
    markers: Arc<MarkerList>,
    base: SequenceBase<'_>,
    seconds: Option<f64>,
) -> Result<()> {
    let options = SequenceOptions {
        duration_ms: seconds
            .map(|seconds| seconds * 1000.0)
            .unwrap_or(config.timeline_ms),
        fps: config.fps,
        timeline: TimelineConfig::with_duration(config.timeline_ms),
    };
    let frames_dir = out_dir.join(FRAMES_DIR_NAME);
    let count = write_png_sequence(&frames_dir, markers, base, &options, load_label_font(config))
        .map_err(anyhow::Error::msg)?;
    println!("{} frame(s) written to {}", count, frames_dir.display());
    Ok(())
}

/// Render over `frame` on the blocking pool so the runtime keeps driving the
/// speech task.
async fn render_frames_blocking(
    config: &AppConfig,
    out_dir: PathBuf,
    markers: Arc<MarkerList>,
    frame: DynamicImage,
    seconds: Option<f64>,
) -> Result<()> {
    let config = config.clone();
    tokio::task::spawn_blocking(move || {
        let rgba = frame.to_rgba8();
        render_frames(
            &config,
            &out_dir,
            markers,
            SequenceBase::Frame(&rgba),
            seconds,
        )
    })
    .await
    .context("Overlay render task panicked")?
}

fn load_label_font(config: &AppConfig) -> Option<FontVec> {
    let path = resolve_resource_path(config.label_font_path.as_deref()?);
    match RasterSurface::load_font(&path) {
        Ok(font) => Some(font),
        Err(err) => {
            log::warn!("{}; labels will be skipped", err);
            None
        }
    }
}

fn open_frame(path: &Path) -> Result<DynamicImage> {
    let path = resolve_resource_path(path);
    image::open(&path).with_context(|| format!("Failed to open frame {:?}", path))
}

fn encode_jpeg(frame: &DynamicImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let rgb = frame.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100)).encode_image(&rgb)?;
    Ok(bytes)
}

fn output_dir(requested: Option<PathBuf>) -> PathBuf {
    requested.unwrap_or_else(|| {
        PathBuf::from(format!(
            "fixit-{}",
            chrono::Local::now().format("%Y%m%d-%H%M%S")
        ))
    })
}

fn save_analysis(out_dir: &Path, analysis: &AnalysisResult) -> Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("Failed to create {:?}", out_dir))?;
    let path = out_dir.join(ANALYSIS_FILE_NAME);
    let json = serde_json::to_string_pretty(analysis)?;
    fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
    log::info!("Saved diagnosis to {:?}", path);
    Ok(())
}

/// Narrate in the background; failures are logged and otherwise ignored.
fn spawn_speech(client: Arc<GeminiClient>, text: String) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = speak(&client, &text).await {
            log::warn!("Speech guidance failed: {:#}", err);
        }
    })
}

async fn speak(client: &GeminiClient, text: &str) -> Result<()> {
    let bytes = client.synthesize_speech(text).await?;
    let samples = decode_pcm16_le(&bytes)?;
    tokio::task::spawn_blocking(move || -> Result<(), AudioError> {
        let player = SpeechPlayer::new()?;
        player.enqueue(&samples, TTS_SAMPLE_RATE);
        let length = Duration::from_secs_f64(samples.len() as f64 / TTS_SAMPLE_RATE as f64);
        if !player.wait_until_drained(length + SPEECH_DRAIN_SLACK) {
            log::warn!("Speech playback did not finish in time");
            player.stop();
        }
        Ok(())
    })
    .await??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_jpeg_produces_jpeg_magic() {
        let frame = DynamicImage::new_rgb8(16, 16);
        let bytes = encode_jpeg(&frame, 80).unwrap();
        assert_eq!(&bytes[..2], &[0xff, 0xd8]);
    }

    #[test]
    fn test_output_dir_prefers_requested() {
        assert_eq!(
            output_dir(Some(PathBuf::from("out"))),
            PathBuf::from("out")
        );
        assert!(output_dir(None)
            .to_string_lossy()
            .starts_with("fixit-"));
    }

    #[tokio::test]
    async fn test_blocking_render_writes_frames_over_camera_frame() {
        let dir = std::env::temp_dir().join(format!("fixit-frames-{}", uuid::Uuid::new_v4()));
        let mut config = AppConfig::default();
        config.fps = 4.0;
        let markers = Arc::new(AnalysisResult::from_service_text(
            r#"{"instruction":"PRESS RESET","priority":"INFO","isIssueResolved":false,
                "detectedObject":"GFCI outlet","overlays":[{"type":"circle","x":50,"y":50,"color":"green"}]}"#,
        )
        .unwrap()
        .marker_list());

        render_frames_blocking(
            &config,
            dir.clone(),
            markers,
            DynamicImage::new_rgb8(32, 24),
            Some(0.5),
        )
        .await
        .unwrap();

        let first = image::open(dir.join(FRAMES_DIR_NAME).join("frame_00000.png")).unwrap();
        assert_eq!((first.width(), first.height()), (32, 24));
        assert_eq!(fs::read_dir(dir.join(FRAMES_DIR_NAME)).unwrap().count(), 2);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_render_writes_frames_for_saved_analysis() {
        let dir = std::env::temp_dir().join(format!("fixit-render-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let analysis_path = dir.join(ANALYSIS_FILE_NAME);
        fs::write(
            &analysis_path,
            r#"{"instruction":"PUSH THE RESET BUTTON","priority":"INFO","isIssueResolved":false,
                "detectedObject":"Breaker","overlays":[{"type":"hand_gesture","x":50,"y":50,"color":"blue","label":"PUSH"}]}"#,
        )
        .unwrap();

        let mut config = AppConfig::default();
        config.fps = 5.0;
        config.demo_viewport.width = 64;
        config.demo_viewport.height = 48;
        run_render(
            &config,
            RenderArgs {
                analysis: analysis_path,
                frame: None,
                out: Some(dir.clone()),
                seconds: Some(1.0),
            },
        )
        .unwrap();

        let frames = fs::read_dir(dir.join(FRAMES_DIR_NAME)).unwrap().count();
        assert_eq!(frames, 5);
        let _ = fs::remove_dir_all(&dir);
    }
}
