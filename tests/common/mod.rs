//! Shared mock adapters and harness for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use podflow::adapters::{
    FetchedMedia, LlmResponse, LlmService, MediaFetcher, PublishSink, SinkDocument, Transcriber,
    TranscriptOutput,
};
use podflow::config::PipelineSettings;
use podflow::core::{ArtifactStore, CostLedger, Orchestrator, PriceTable, SeenSet, Services};
use podflow::domain::{CandidateItem, ItemIdentity, MediaReference, SourceKind, SourceMetadata};

pub const FAST_MODEL: &str = "claude-3-5-haiku-20241022";
pub const SUMMARY_MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Clone, Default)]
pub struct MockFetcher {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl MediaFetcher for MockFetcher {
    async fn fetch(
        &self,
        _media: &MediaReference,
        dest_dir: &Path,
        base_name: &str,
        _timeout: Duration,
    ) -> Result<FetchedMedia> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FetchedMedia {
            path: dest_dir.join(format!("{base_name}.mp3")),
            duration_minutes: None,
        })
    }
}

#[derive(Clone)]
pub struct MockTranscriber {
    pub calls: Arc<AtomicUsize>,
    pub language: String,
    pub duration_minutes: Option<f64>,
}

impl MockTranscriber {
    pub fn new(language: &str, duration_minutes: Option<f64>) -> Self {
        Self {
            calls: Arc::default(),
            language: language.to_string(),
            duration_minutes,
        }
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    fn name(&self) -> &str {
        "whisper-local"
    }

    async fn transcribe(&self, _audio: &Path, _timeout: Duration) -> Result<TranscriptOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(TranscriptOutput {
            text: "raw transcript text".to_string(),
            language: self.language.clone(),
            duration_minutes: self.duration_minutes,
        })
    }
}

/// Scripted LLM that answers each prompt kind with a plausible response.
/// `fail_next` makes the next call error once, then recover.
#[derive(Clone)]
pub struct MockLlm {
    pub model: String,
    pub calls: Arc<AtomicUsize>,
    pub fail_next: Arc<AtomicBool>,
}

impl MockLlm {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            calls: Arc::default(),
            fail_next: Arc::default(),
        }
    }
}

#[async_trait]
impl LlmService for MockLlm {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        prompt: &str,
        _max_tokens: u32,
        _timeout: Duration,
    ) -> Result<LlmResponse> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("simulated service outage");
        }

        self.calls.fetch_add(1, Ordering::SeqCst);

        let text = if prompt.starts_with("Translate") {
            "translated transcript text".to_string()
        } else if prompt.starts_with("Divide") {
            (1..=6)
                .map(|i| format!("CHAPTER: Part {i}"))
                .collect::<Vec<_>>()
                .join("\n")
        } else if prompt.starts_with("Suggest") {
            r#"["economics", "history"]"#.to_string()
        } else {
            "A thorough episode summary.".to_string()
        };

        Ok(LlmResponse {
            text,
            input_tokens: 10_000,
            output_tokens: 500,
        })
    }
}

#[derive(Clone, Default)]
pub struct MockSink {
    pub calls: Arc<AtomicUsize>,
    pub documents: Arc<Mutex<Vec<SinkDocument>>>,
}

#[async_trait]
impl PublishSink for MockSink {
    fn name(&self) -> &str {
        "mock-sink"
    }

    async fn upsert(
        &self,
        identity: &ItemIdentity,
        document: &SinkDocument,
        _timeout: Duration,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.documents.lock().unwrap().push(document.clone());
        Ok(format!("page-{}", identity.as_str()))
    }
}

/// Mock services plus the on-disk stores, both reusable across orchestrator
/// instances to simulate separate invocations over the same state.
pub struct TestHarness {
    pub home: PathBuf,
    pub fetcher: MockFetcher,
    pub transcriber: MockTranscriber,
    pub fast_llm: MockLlm,
    pub summary_llm: MockLlm,
    pub sink: MockSink,
}

impl TestHarness {
    pub fn new(home: &Path, language: &str, duration_minutes: Option<f64>) -> Self {
        Self {
            home: home.to_path_buf(),
            fetcher: MockFetcher::default(),
            transcriber: MockTranscriber::new(language, duration_minutes),
            fast_llm: MockLlm::new(FAST_MODEL),
            summary_llm: MockLlm::new(SUMMARY_MODEL),
            sink: MockSink::default(),
        }
    }

    /// A fresh orchestrator over the shared stores and mocks, as a new
    /// process invocation would construct it
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.artifact_store(),
            self.seen(),
            self.ledger(),
            Services {
                fetcher: Box::new(self.fetcher.clone()),
                transcriber: Box::new(self.transcriber.clone()),
                fast_llm: Box::new(self.fast_llm.clone()),
                summary_llm: Box::new(self.summary_llm.clone()),
                sink: Box::new(self.sink.clone()),
            },
            PipelineSettings {
                throttle_seconds: 0,
                ..Default::default()
            },
            self.home.join("audio"),
        )
    }

    pub fn artifact_store(&self) -> ArtifactStore {
        ArtifactStore::new(self.home.join("artifacts"))
    }

    pub fn seen(&self) -> SeenSet {
        SeenSet::new(self.home.join("seen.json"))
    }

    pub fn ledger(&self) -> CostLedger {
        CostLedger::new(self.home.join("costs.jsonl"), PriceTable::default())
    }
}

/// A feed episode candidate with a stable guid
pub fn feed_item(guid: &str) -> CandidateItem {
    CandidateItem {
        metadata: SourceMetadata {
            kind: SourceKind::Feed,
            source_name: "Test Podcast".to_string(),
            guid: Some(guid.to_string()),
            link: Some(format!("https://example.com/{guid}")),
            title: Some(format!("Episode {guid}")),
            published: Some("Thu, 21 Aug 2025 05:00:00 -0000".to_string()),
        },
        media: MediaReference::AudioUrl(format!("https://example.com/{guid}.mp3")),
        static_tags: vec!["podcast".to_string()],
    }
}

pub fn identity_of(item: &CandidateItem) -> ItemIdentity {
    ItemIdentity::resolve(&item.metadata).unwrap()
}
