//! Batch orchestrator: drives each candidate item through the stage
//! pipeline exactly once.
//!
//! Idempotency rests on three stores. The seen-set is the authoritative
//! "fully done" marker, written only after publish succeeds. The artifact
//! store is the stage-level checkpoint: a rerun of a partially processed
//! item resumes from the first missing artifact instead of repeating paid
//! work. The cost ledger records every billable call after the service
//! returns and before the artifact is persisted, so an entry exists exactly
//! once per performed call.
//!
//! One item failing never aborts the batch; remaining items still run.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{LlmService, MediaFetcher, PublishSink, SinkDocument, Transcriber};
use crate::config::PipelineSettings;
use crate::domain::{CandidateItem, ItemIdentity, PipelineError, Stage, StageArtifact};
use crate::sidecar::MetadataSidecar;

use super::artifact_store::ArtifactStore;
use super::ledger::{CostLedger, Usage};
use super::pipeline;
use super::seen_set::{ProcessingRecord, SeenSet};

const TRANSLATION_MAX_TOKENS: u32 = 8192;
const SUMMARY_MAX_TOKENS: u32 = 1500;
const CHAPTER_MAX_TOKENS: u32 = 300;
const TAG_MAX_TOKENS: u32 = 200;

/// External collaborators the orchestrator drives
pub struct Services {
    /// Media downloader
    pub fetcher: Box<dyn MediaFetcher>,

    /// Speech-to-text service
    pub transcriber: Box<dyn Transcriber>,

    /// Cheap model for translation, chapters, and tags
    pub fast_llm: Box<dyn LlmService>,

    /// Stronger model for summarization
    pub summary_llm: Box<dyn LlmService>,

    /// Knowledge-base publishing sink
    pub sink: Box<dyn PublishSink>,
}

/// Per-batch outcome counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Items that reached the terminal stage this run
    pub succeeded: usize,

    /// Items that failed at some stage (their progress is preserved)
    pub failed: usize,

    /// Items already in the seen-set
    pub skipped: usize,
}

/// Drives candidate items through the stage pipeline
pub struct Orchestrator {
    artifacts: ArtifactStore,
    seen: SeenSet,
    ledger: CostLedger,
    services: Services,
    settings: PipelineSettings,

    /// Where fetched audio lands
    audio_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(
        artifacts: ArtifactStore,
        seen: SeenSet,
        ledger: CostLedger,
        services: Services,
        settings: PipelineSettings,
        audio_dir: PathBuf,
    ) -> Self {
        Self {
            artifacts,
            seen,
            ledger,
            services,
            settings,
            audio_dir,
        }
    }

    fn timeout(&self) -> Duration {
        self.settings.timeout()
    }

    /// Process one batch of candidates.
    ///
    /// Items already in the seen-set are skipped without any service call.
    /// A per-item failure is logged and counted; the batch continues.
    pub async fn process_batch(&self, items: &[CandidateItem]) -> anyhow::Result<BatchSummary> {
        let batch_id = Uuid::new_v4();
        info!(%batch_id, item_count = items.len(), "Starting batch");

        let mut summary = BatchSummary::default();
        let mut first = true;

        for item in items {
            // Throttle between items so downstream services are not hammered
            if !first && self.settings.throttle_seconds > 0 {
                tokio::time::sleep(Duration::from_secs(self.settings.throttle_seconds)).await;
            }
            first = false;

            let identity = match ItemIdentity::resolve(&item.metadata) {
                Ok(identity) => identity,
                Err(e) => {
                    warn!(
                        source = %item.metadata.source_name,
                        error = %e,
                        "Cannot resolve item identity, skipping item"
                    );
                    summary.failed += 1;
                    continue;
                }
            };

            match self.seen.is_processed(&identity) {
                Ok(true) => {
                    debug!(identity = %identity, "Already processed, skipping");
                    summary.skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    error!(identity = %identity, error = %e, "Seen-set read failed");
                    summary.failed += 1;
                    continue;
                }
            }

            match self.process_item(item, &identity).await {
                Ok(()) => summary.succeeded += 1,
                Err(e) => {
                    error!(identity = %identity, error = %e, "Item failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            %batch_id,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "Batch finished"
        );
        Ok(summary)
    }

    /// Run one item through every stage it has not yet completed.
    #[instrument(skip(self, item), fields(identity = %identity, title = %item.metadata.display_title()))]
    pub async fn process_item(
        &self,
        item: &CandidateItem,
        identity: &ItemIdentity,
    ) -> Result<(), PipelineError> {
        let mut artifacts = self
            .artifacts
            .load_all(identity)
            .await
            .map_err(|e| PipelineError::store(identity, e))?;

        if !artifacts.is_empty() {
            info!(
                completed = artifacts.len(),
                "Resuming item with existing artifacts"
            );
        }

        for stage in Stage::ORDER {
            if artifacts.contains_key(&stage) {
                debug!(%stage, "Stage already complete");
                continue;
            }

            info!(%stage, "Running stage");
            let artifact = self
                .run_stage(stage, item, identity, &artifacts)
                .await
                .map_err(|e| PipelineError::stage(stage, identity, e))?;

            // The persisted artifact is the stage's commit point
            self.artifacts
                .store(identity, &artifact)
                .await
                .map_err(|e| PipelineError::store(identity, e))?;

            artifacts.insert(stage, artifact);
        }

        // The publish artifact can persist and the seen-set write still fail.
        // A retry then finds every stage complete and skips the whole loop,
        // so the done-marker is written here, not inside the terminal stage.
        if !self
            .seen
            .is_processed(identity)
            .map_err(|e| PipelineError::store(identity, e))?
        {
            self.seen
                .mark_processed(ProcessingRecord::completed(
                    identity.clone(),
                    item.metadata.kind,
                ))
                .map_err(|e| PipelineError::store(identity, e))?;
        }

        info!("Item fully processed");
        Ok(())
    }

    /// Execute one stage and return its artifact. Billable calls are
    /// recorded to the ledger as soon as the service returns.
    async fn run_stage(
        &self,
        stage: Stage,
        item: &CandidateItem,
        identity: &ItemIdentity,
        artifacts: &BTreeMap<Stage, StageArtifact>,
    ) -> anyhow::Result<StageArtifact> {
        match stage {
            Stage::FetchMedia => {
                let fetched = self
                    .services
                    .fetcher
                    .fetch(&item.media, &self.audio_dir, &item.slug(), self.timeout())
                    .await?;

                Ok(StageArtifact::Media {
                    path: fetched.path,
                    duration_minutes: fetched.duration_minutes,
                })
            }

            Stage::Transcribe => {
                let (media_path, media_duration) = require_media(artifacts)?;

                let output = self
                    .services
                    .transcriber
                    .transcribe(&media_path, self.timeout())
                    .await?;

                let duration_minutes = output.duration_minutes.or(media_duration);
                self.record_cost(
                    identity,
                    stage,
                    self.services.transcriber.name(),
                    Usage::Minutes {
                        minutes: duration_minutes.unwrap_or(0.0),
                    },
                )?;

                Ok(StageArtifact::Transcript {
                    text: output.text,
                    language: output.language,
                    duration_minutes,
                })
            }

            Stage::Translate => {
                let transcript = require_transcript(artifacts)?;

                if !pipeline::needs_translation(Some(transcript.language)) {
                    debug!(language = %transcript.language, "Translation not needed");
                    return Ok(pipeline::translation_passthrough(&transcript.text));
                }

                let prompt = pipeline::translation_prompt(&transcript.text, &transcript.language);
                let response = self
                    .services
                    .fast_llm
                    .complete(&prompt, TRANSLATION_MAX_TOKENS, self.timeout())
                    .await?;

                self.record_cost(
                    identity,
                    stage,
                    self.services.fast_llm.name(),
                    Usage::Tokens {
                        input: response.input_tokens,
                        output: response.output_tokens,
                    },
                )?;

                Ok(StageArtifact::Translation { text: response.text })
            }

            Stage::ExtractChapters => {
                let transcript = require_transcript(artifacts)?;
                let text = require_translation(artifacts)?;

                if !pipeline::needs_chapters(
                    transcript.duration_minutes,
                    self.settings.min_chapter_minutes,
                ) {
                    debug!(
                        duration_minutes = ?transcript.duration_minutes,
                        "Episode below chapter threshold"
                    );
                    return Ok(pipeline::chapters_passthrough());
                }

                let prompt = pipeline::chapter_prompt(text);
                let response = self
                    .services
                    .fast_llm
                    .complete(&prompt, CHAPTER_MAX_TOKENS, self.timeout())
                    .await?;

                self.record_cost(
                    identity,
                    stage,
                    self.services.fast_llm.name(),
                    Usage::Tokens {
                        input: response.input_tokens,
                        output: response.output_tokens,
                    },
                )?;

                let titles = pipeline::parse_chapters(&response.text);
                if titles.is_empty() {
                    warn!("Model returned no parseable chapter lines");
                }

                Ok(StageArtifact::Chapters { titles })
            }

            Stage::Summarize => {
                let text = require_translation(artifacts)?;

                let prompt = pipeline::summary_prompt(text);
                let response = self
                    .services
                    .summary_llm
                    .complete(&prompt, SUMMARY_MAX_TOKENS, self.timeout())
                    .await?;

                self.record_cost(
                    identity,
                    stage,
                    self.services.summary_llm.name(),
                    Usage::Tokens {
                        input: response.input_tokens,
                        output: response.output_tokens,
                    },
                )?;

                Ok(StageArtifact::Summary { text: response.text })
            }

            Stage::Tag => {
                let summary = require_summary(artifacts)?;

                let prompt = pipeline::tag_prompt(
                    summary,
                    self.settings.max_tags,
                    self.settings.tag_input_max_chars,
                );
                let response = self
                    .services
                    .fast_llm
                    .complete(&prompt, TAG_MAX_TOKENS, self.timeout())
                    .await?;

                self.record_cost(
                    identity,
                    stage,
                    self.services.fast_llm.name(),
                    Usage::Tokens {
                        input: response.input_tokens,
                        output: response.output_tokens,
                    },
                )?;

                let tags = pipeline::parse_tags(&response.text, self.settings.max_tags);
                Ok(StageArtifact::TagSet { tags })
            }

            Stage::Publish => {
                let summary = require_summary(artifacts)?;
                let chapters = require_chapters(artifacts)?;
                let ai_tags = require_tags(artifacts)?;

                let sidecar = MetadataSidecar::build(&item.metadata, &item.static_tags, ai_tags);
                self.artifacts.store_sidecar(identity, &sidecar).await?;

                let document = SinkDocument {
                    sidecar,
                    summary: summary.to_string(),
                    chapters: chapters.to_vec(),
                };

                let page_ref = self
                    .services
                    .sink
                    .upsert(identity, &document, self.timeout())
                    .await?;

                info!(sink = self.services.sink.name(), %page_ref, "Published");
                Ok(StageArtifact::Published { page_ref })
            }
        }
    }

    fn record_cost(
        &self,
        identity: &ItemIdentity,
        stage: Stage,
        service: &str,
        usage: Usage,
    ) -> anyhow::Result<()> {
        let entry = self.ledger.record(identity, stage, service, usage)?;
        debug!(service, cost_usd = entry.cost_usd, "Recorded cost");
        Ok(())
    }
}

struct TranscriptView<'a> {
    text: &'a str,
    language: &'a str,
    duration_minutes: Option<f64>,
}

// Artifact accessors. A missing or wrong-variant artifact means the store
// was corrupted or a stage was skipped out of order; both fail the item.

fn require_media(artifacts: &BTreeMap<Stage, StageArtifact>) -> anyhow::Result<(PathBuf, Option<f64>)> {
    match artifacts.get(&Stage::FetchMedia) {
        Some(StageArtifact::Media { path, duration_minutes }) => {
            Ok((path.clone(), *duration_minutes))
        }
        _ => Err(anyhow!("media artifact missing or malformed")),
    }
}

fn require_transcript(artifacts: &BTreeMap<Stage, StageArtifact>) -> anyhow::Result<TranscriptView<'_>> {
    match artifacts.get(&Stage::Transcribe) {
        Some(StageArtifact::Transcript { text, language, duration_minutes }) => Ok(TranscriptView {
            text,
            language,
            duration_minutes: *duration_minutes,
        }),
        _ => Err(anyhow!("transcript artifact missing or malformed")),
    }
}

fn require_translation(artifacts: &BTreeMap<Stage, StageArtifact>) -> anyhow::Result<&str> {
    match artifacts.get(&Stage::Translate) {
        Some(StageArtifact::Translation { text }) => Ok(text),
        _ => Err(anyhow!("translation artifact missing or malformed")),
    }
}

fn require_summary(artifacts: &BTreeMap<Stage, StageArtifact>) -> anyhow::Result<&str> {
    match artifacts.get(&Stage::Summarize) {
        Some(StageArtifact::Summary { text }) => Ok(text),
        _ => Err(anyhow!("summary artifact missing or malformed")),
    }
}

fn require_chapters(artifacts: &BTreeMap<Stage, StageArtifact>) -> anyhow::Result<&[String]> {
    match artifacts.get(&Stage::ExtractChapters) {
        Some(StageArtifact::Chapters { titles }) => Ok(titles),
        _ => Err(anyhow!("chapters artifact missing or malformed")),
    }
}

fn require_tags(artifacts: &BTreeMap<Stage, StageArtifact>) -> anyhow::Result<&[String]> {
    match artifacts.get(&Stage::Tag) {
        Some(StageArtifact::TagSet { tags }) => Ok(tags),
        _ => Err(anyhow!("tag artifact missing or malformed")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_helpers_reject_wrong_variant() {
        let mut artifacts = BTreeMap::new();
        artifacts.insert(
            Stage::Transcribe,
            StageArtifact::Summary { text: "not a transcript".to_string() },
        );

        assert!(require_transcript(&artifacts).is_err());
        assert!(require_media(&artifacts).is_err());
    }

    #[test]
    fn test_require_translation_accepts_passthrough() {
        let mut artifacts = BTreeMap::new();
        artifacts.insert(
            Stage::Translate,
            pipeline::translation_passthrough("same text"),
        );

        assert_eq!(require_translation(&artifacts).unwrap(), "same text");
    }
}
