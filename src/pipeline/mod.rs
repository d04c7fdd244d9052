//! The ingestion pipeline: listing, relevance filter, enrichment, persistence.
//!
//! [`Pipeline`] owns the dataset store and relevance cache for the duration of
//! a command. Work items are partitioned by identifier before dispatch, enriched
//! concurrently through [`BatchRunner`], and merged back one at a time by the
//! collecting loop, with a save after every completed item.

pub mod filter;
pub mod runner;
pub mod summarize;

pub use filter::{parse_selection, FilterOutcome, RelevanceFilter, Selection};
pub use runner::{BatchHandle, BatchRunner, TaskError, TaskOutcome};
pub use summarize::{fallback_long, fallback_short, Summaries, Summarizer, SummaryKind, NO_PREVIEW};

use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;

use crate::config::Config;
use crate::llm::SharedClient;
use crate::models::{Candidate, PaperRecord};
use crate::sources::arxiv::abs_url;
use crate::sources::{normalize_identifier, ContentOrigin, PaperSource, SourceError};
use crate::store::{DatasetStore, RelevanceCache, StoreError};
use crate::ui::{ProgressReporter, Status};

/// Errors that abort a pipeline command
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Not a recognizable paper reference: {0}")]
    InvalidReference(String),
}

/// Aggregate counts for one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Listing rows with a recognizable identifier
    pub listed: usize,
    pub kept: usize,
    pub rejected: usize,
    /// Kept papers already enriched
    pub skipped: usize,
    pub enriched: usize,
    pub failed: usize,
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "listed {}, kept {}, rejected {}, skipped {}, enriched {}, failed {}",
            self.listed, self.kept, self.rejected, self.skipped, self.enriched, self.failed
        )
    }
}

/// Result of adding a single paper by reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added { identifier: String, kind: SummaryKind },
    /// Previously rejected by the relevance filter; use `force` to override
    SkippedRejected { identifier: String },
    /// Already has both summaries; use `force` to regenerate
    SkippedEnriched { identifier: String },
}

/// Which records `regen` revisits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegenTarget {
    /// Records holding fallback or no-preview summaries
    Degraded,
    All,
}

/// One finished enrichment
struct Enriched {
    record: PaperRecord,
    kind: SummaryKind,
    origin: ContentOrigin,
}

/// Orchestrates the listing, filter, enrichment and store for one command.
#[derive(Debug)]
pub struct Pipeline {
    config: Config,
    source: Arc<dyn PaperSource>,
    llm: Option<SharedClient>,
    store: DatasetStore,
    cache: RelevanceCache,
    progress: ProgressReporter,
}

impl Pipeline {
    /// Open the store and cache under the configured data directory.
    pub fn new(config: Config, source: Arc<dyn PaperSource>, llm: Option<SharedClient>) -> Self {
        let store = DatasetStore::open(&config.paths, source.name());
        let cache = RelevanceCache::load(config.paths.relevance_path());
        Self {
            config,
            source,
            llm,
            store,
            cache,
            progress: ProgressReporter::hidden(),
        }
    }

    /// Report per-item progress to the terminal
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    pub fn cache(&self) -> &RelevanceCache {
        &self.cache
    }

    fn summarizer(&self) -> Summarizer {
        Summarizer::new(
            self.llm.clone(),
            self.config.llm.language.clone(),
            self.config.llm.reasoning,
        )
    }

    /// Daily run: listing, filter, enrich whatever is not enriched yet.
    pub async fn run(&mut self) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::default();
        let rows = self.source.listing(self.config.pipeline.max_items).await?;

        let candidates = dedupe_candidates(rows);
        report.listed = candidates.len();
        self.progress
            .status(Status::Info, format!("{} papers on the listing", candidates.len()));

        let filter = RelevanceFilter::new(
            self.llm.clone(),
            self.config.pipeline.filter_batch_size,
            self.config.pipeline.filter_concurrency,
        );
        let outcome = filter.filter(candidates, &mut self.cache).await?;
        report.kept = outcome.kept.len();
        report.rejected = outcome.rejected.len();
        if outcome.failed_batches > 0 {
            self.progress.status(
                Status::Warning,
                format!("{} relevance batches failed; kept their titles", outcome.failed_batches),
            );
        }
        self.progress.status(
            Status::Info,
            format!("{} relevant, {} rejected", report.kept, report.rejected),
        );

        let mut pending = Vec::new();
        for candidate in outcome.kept {
            let record = candidate.to_record();
            if self.store.is_enriched(&record.identifier) {
                // refresh listing metadata; no-op when unchanged
                self.store.upsert(record);
                report.skipped += 1;
            } else {
                pending.push(record);
            }
        }
        self.store.save()?;

        let (enriched, failed) = self.enrich(pending).await?;
        report.enriched = enriched;
        report.failed = failed;
        Ok(report)
    }

    /// Add one paper by reference. `force` overrides a rejection or an existing enrichment.
    pub async fn add(&mut self, reference: &str, force: bool) -> Result<AddOutcome, PipelineError> {
        let identifier = normalize_identifier(reference)
            .ok_or_else(|| PipelineError::InvalidReference(reference.to_string()))?;
        let cache_key = abs_url(&identifier);

        if !force {
            if self.cache.is_rejected(&cache_key) {
                return Ok(AddOutcome::SkippedRejected { identifier });
            }
            if self.store.is_enriched(&identifier) {
                return Ok(AddOutcome::SkippedEnriched { identifier });
            }
        }

        let record = match self.source.metadata(&identifier).await {
            Ok(record) => record,
            Err(e) => match self.store.get(&identifier) {
                Some(existing) => {
                    tracing::warn!("Metadata lookup for {} failed ({}); using stored record", identifier, e);
                    existing.clone()
                }
                None => return Err(e.into()),
            },
        };

        if force {
            self.cache.force_keep(&cache_key);
        } else {
            self.cache.record_kept(&cache_key);
        }
        self.cache.save()?;

        let (enriched, _) = self.enrich(vec![record]).await?;
        let kind = match (enriched, self.store.get(&identifier)) {
            (1, Some(stored)) => SummaryKind::of(stored),
            _ => SummaryKind::Missing,
        };
        Ok(AddOutcome::Added { identifier, kind })
    }

    /// Re-summarize up to `batch_size` records.
    pub async fn regen(&mut self, target: RegenTarget, batch_size: usize) -> Result<RunReport, PipelineError> {
        let selected: Vec<PaperRecord> = self
            .store
            .records()
            .filter(|record| match target {
                RegenTarget::All => true,
                RegenTarget::Degraded => matches!(
                    SummaryKind::of(record),
                    SummaryKind::Fallback | SummaryKind::NoPreview
                ),
            })
            .take(batch_size)
            .map(PaperRecord::clone)
            .collect();

        self.progress
            .status(Status::Info, format!("Regenerating {} records", selected.len()));
        let mut report = RunReport::default();
        let (enriched, failed) = self.enrich(selected).await?;
        report.enriched = enriched;
        report.failed = failed;
        Ok(report)
    }

    /// Enrich up to `batch_size` records missing summaries, then ones missing images.
    pub async fn backfill(&mut self, batch_size: usize) -> Result<RunReport, PipelineError> {
        let missing_summaries = self
            .store
            .records()
            .filter(|r| SummaryKind::of(r) == SummaryKind::Missing);
        let missing_images = self.store.records().filter(|r| {
            r.image_references.is_empty()
                && matches!(SummaryKind::of(r), SummaryKind::Generated | SummaryKind::Fallback)
        });
        let selected: Vec<PaperRecord> = missing_summaries
            .chain(missing_images)
            .take(batch_size)
            .cloned()
            .collect();

        self.progress
            .status(Status::Info, format!("Backfilling {} records", selected.len()));
        let mut report = RunReport::default();
        let (enriched, failed) = self.enrich(selected).await?;
        report.enriched = enriched;
        report.failed = failed;
        Ok(report)
    }

    /// Extract and summarize `records` concurrently, merging each as it finishes.
    ///
    /// Returns `(enriched, failed)`.
    async fn enrich(&mut self, records: Vec<PaperRecord>) -> Result<(usize, usize), PipelineError> {
        if records.is_empty() {
            return Ok((0, 0));
        }

        let identifiers: Vec<String> = records.iter().map(|r| r.identifier.clone()).collect();
        let summarizer = self.summarizer();
        let tasks: Vec<_> = records
            .into_iter()
            .map(|record| {
                let source = Arc::clone(&self.source);
                let summarizer = summarizer.clone();
                move || async move {
                    let content = source.content(&record.identifier).await;
                    let summaries = summarizer.summarize(&record.title, &content.text).await;

                    let mut record = record;
                    record.short_summary = Some(summaries.short);
                    record.long_summary = Some(summaries.long);
                    record.image_references = content.images;
                    Ok::<_, Infallible>(Enriched {
                        record,
                        kind: summaries.kind,
                        origin: content.origin,
                    })
                }
            })
            .collect();

        self.progress.start(tasks.len() as u64, "Enriching");
        let mut handle = BatchRunner::new(self.config.pipeline.enrich_concurrency).spawn(tasks);
        let (mut enriched, mut failed) = (0, 0);

        while let Some((index, outcome)) = handle.next().await {
            match outcome {
                Ok(Enriched {
                    mut record,
                    kind,
                    origin,
                }) => {
                    let keeps_generated = self
                        .store
                        .get(&record.identifier)
                        .is_some_and(|existing| SummaryKind::of(existing) == SummaryKind::Generated);
                    if keeps_generated && kind != SummaryKind::Generated {
                        record.short_summary = None;
                        record.long_summary = None;
                    }

                    self.progress.item(
                        status_for(kind),
                        format!("{} {} ({:?}, {:?})", record.identifier, record.title, kind, origin),
                    );
                    self.store.upsert(record);
                    self.store.save()?;
                    enriched += 1;
                }
                Err(e) => {
                    tracing::warn!("Enrichment of {} failed: {}", identifiers[index], e);
                    self.progress
                        .item(Status::Error, format!("{} failed: {}", identifiers[index], e));
                    failed += 1;
                }
            }
        }

        self.progress.finish(format!("{} enriched, {} failed", enriched, failed));
        Ok((enriched, failed))
    }
}

fn status_for(kind: SummaryKind) -> Status {
    match kind {
        SummaryKind::Generated => Status::Success,
        SummaryKind::Fallback | SummaryKind::NoPreview => Status::Warning,
        SummaryKind::Missing => Status::Error,
    }
}

/// Normalize identifiers and drop duplicates, keeping the first occurrence.
fn dedupe_candidates(rows: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter_map(|mut row| {
            let identifier =
                normalize_identifier(&row.identifier).or_else(|| normalize_identifier(&row.link));
            let Some(identifier) = identifier else {
                tracing::debug!("Skipping unrecognized reference: {}", row.link);
                return None;
            };
            row.identifier = identifier;
            seen.insert(row.identifier.clone()).then_some(row)
        })
        .collect()
}
