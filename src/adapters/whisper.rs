//! Local Whisper transcription via subprocess.
//!
//! Spawns the `whisper` CLI with JSON output and parses the result file.
//! Language is auto-detected by the model; duration is derived from the
//! last segment's end time.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;

use super::{Transcriber, TranscriptOutput};

/// Whisper CLI transcriber
pub struct WhisperTranscriber {
    /// Path to the whisper binary (default: "whisper")
    binary_path: String,

    /// Model size (tiny/base/small/medium/large)
    model_size: String,
}

#[derive(Debug, Deserialize)]
struct WhisperJson {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    end: f64,
}

impl WhisperTranscriber {
    /// Create a transcriber with the default binary path
    pub fn new(model_size: impl Into<String>) -> Self {
        Self {
            binary_path: "whisper".to_string(),
            model_size: model_size.into(),
        }
    }

    /// Override the binary path
    pub fn with_binary_path(mut self, binary_path: impl Into<String>) -> Self {
        self.binary_path = binary_path.into();
        self
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    fn name(&self) -> &str {
        "whisper-local"
    }

    async fn transcribe(&self, audio: &Path, step_timeout: Duration) -> Result<TranscriptOutput> {
        let output_dir = audio.parent().unwrap_or_else(|| Path::new("."));

        let child = Command::new(&self.binary_path)
            .arg(audio)
            .args(["--model", &self.model_size])
            .args(["--output_format", "json"])
            .arg("--output_dir")
            .arg(output_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn whisper for {}", audio.display()))?;

        let output = timeout(step_timeout, child.wait_with_output())
            .await
            .with_context(|| {
                format!(
                    "Whisper timed out after {:?} on {}",
                    step_timeout,
                    audio.display()
                )
            })?
            .context("Failed to wait for whisper process")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "Whisper failed with exit code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        // Whisper writes <stem>.json next to the audio file
        let stem = audio
            .file_stem()
            .context("Audio path has no file stem")?
            .to_string_lossy();
        let json_path = output_dir.join(format!("{}.json", stem));

        let content = tokio::fs::read_to_string(&json_path)
            .await
            .with_context(|| format!("Failed to read whisper output: {}", json_path.display()))?;

        let parsed: WhisperJson =
            serde_json::from_str(&content).context("Failed to parse whisper JSON output")?;

        let duration_minutes = parsed
            .segments
            .last()
            .map(|segment| segment.end / 60.0);

        Ok(TranscriptOutput {
            text: parsed.text.trim().to_string(),
            language: parsed.language.unwrap_or_else(|| "unknown".to_string()),
            duration_minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whisper_json_parsing() {
        let json = r#"{
            "text": " Hello world. ",
            "language": "en",
            "segments": [{"end": 10.0}, {"end": 2712.5}]
        }"#;
        let parsed: WhisperJson = serde_json::from_str(json).unwrap();

        assert_eq!(parsed.language.as_deref(), Some("en"));
        let minutes = parsed.segments.last().unwrap().end / 60.0;
        assert!((minutes - 45.2).abs() < 0.1);
    }

    #[test]
    fn test_missing_language_defaults_to_unknown() {
        let json = r#"{"text": "hi", "segments": []}"#;
        let parsed: WhisperJson = serde_json::from_str(json).unwrap();
        assert!(parsed.language.is_none());
        assert!(parsed.segments.last().is_none());
    }
}
