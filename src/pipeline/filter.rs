//! Relevance filter: batch title classification with a durable cache.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::llm::{CompletionRequest, SharedClient};
use crate::models::Candidate;
use crate::pipeline::runner::BatchRunner;
use crate::sources::arxiv::abs_url;
use crate::store::{Relevance, RelevanceCache, StoreError};

/// Sentinel a classifier returns when no title in the batch is relevant
pub const NONE_SENTINEL: &str = "NONE";

const FILTER_SYSTEM_PROMPT: &str = "You screen newly published papers for a robotics \
research digest. Relevant papers study robots or embodied agents: manipulation, \
locomotion, navigation, grasping, robot learning, perception for robots, planning \
and control, humanoids, drones, or autonomous vehicles.";

const FILTER_TIMEOUT: Duration = Duration::from_secs(60);

/// What a classifier response selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Zero-based indices of relevant items
    Indices(BTreeSet<usize>),
    /// The explicit "none relevant" sentinel
    Nothing,
    /// No usable index and no sentinel
    Unparseable,
}

/// Parse a comma-separated list of 1-based indices for a batch of `len` items.
///
/// Out-of-range and non-numeric tokens are dropped.
pub fn parse_selection(response: &str, len: usize) -> Selection {
    let trimmed = response.trim().trim_matches(|c: char| c == '"' || c == '\'' || c == '`');
    if trimmed.eq_ignore_ascii_case(NONE_SENTINEL) {
        return Selection::Nothing;
    }

    let mut indices = BTreeSet::new();
    let mut saw_number = false;
    for token in trimmed.split(|c: char| c == ',' || c == '，' || c.is_whitespace()) {
        let token = token.trim_matches(|c: char| !c.is_ascii_digit());
        let Ok(n) = token.parse::<usize>() else {
            continue;
        };
        saw_number = true;
        if (1..=len).contains(&n) {
            indices.insert(n - 1);
        }
    }

    if !indices.is_empty() || saw_number {
        // numbers that were all out of range still count as an answer
        Selection::Indices(indices)
    } else {
        Selection::Unparseable
    }
}

/// Build the user prompt for one batch of titles
pub fn build_batch_prompt(titles: &[&str]) -> String {
    let mut prompt = String::from(
        "Which of the following paper titles are relevant to robotics? Reply with the \
         comma-separated numbers of the relevant titles only, for example `1,4,7`. \
         If none are relevant, reply with NONE.\n\n",
    );
    for (i, title) in titles.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, title));
    }
    prompt
}

/// Partition of candidates after filtering
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// Kept candidates, in input order
    pub kept: Vec<Candidate>,
    pub rejected: Vec<Candidate>,
    /// Kept because the cache already said so
    pub cached_kept: usize,
    /// Dropped because the cache already said so
    pub cached_rejected: usize,
    /// Batches whose classification failed and were kept wholesale
    pub failed_batches: usize,
}

/// Classifies candidate titles in batches through the completion service.
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    client: Option<SharedClient>,
    batch_size: usize,
    concurrency: usize,
}

impl RelevanceFilter {
    pub fn new(client: Option<SharedClient>, batch_size: usize, concurrency: usize) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
            concurrency: concurrency.max(1),
        }
    }

    /// Partition `candidates`, consulting and updating `cache`.
    ///
    /// The cache is saved after every completed batch. Without a client, every
    /// uncached candidate is kept and the cache is left untouched.
    pub async fn filter(
        &self,
        candidates: Vec<Candidate>,
        cache: &mut RelevanceCache,
    ) -> Result<FilterOutcome, StoreError> {
        let mut outcome = FilterOutcome::default();
        let mut keep = vec![false; candidates.len()];
        let mut pending: Vec<usize> = Vec::new();

        for (i, candidate) in candidates.iter().enumerate() {
            match cache.status(&abs_url(&candidate.identifier)) {
                Some(Relevance::Kept) => {
                    keep[i] = true;
                    outcome.cached_kept += 1;
                }
                Some(Relevance::Rejected) => outcome.cached_rejected += 1,
                None => pending.push(i),
            }
        }

        match &self.client {
            None => {
                tracing::info!(
                    "No completion service; keeping {} unclassified candidates",
                    pending.len()
                );
                for &i in &pending {
                    keep[i] = true;
                }
            }
            Some(client) if !pending.is_empty() => {
                self.classify(client, &candidates, &pending, &mut keep, cache, &mut outcome)
                    .await?;
            }
            Some(_) => {}
        }

        for (candidate, kept) in candidates.into_iter().zip(keep) {
            if kept {
                outcome.kept.push(candidate);
            } else {
                outcome.rejected.push(candidate);
            }
        }
        Ok(outcome)
    }

    async fn classify(
        &self,
        client: &SharedClient,
        candidates: &[Candidate],
        pending: &[usize],
        keep: &mut [bool],
        cache: &mut RelevanceCache,
        outcome: &mut FilterOutcome,
    ) -> Result<(), StoreError> {
        let batches: Vec<Vec<usize>> = pending
            .chunks(self.batch_size)
            .map(<[usize]>::to_vec)
            .collect();
        tracing::info!(
            "Classifying {} titles in {} batches",
            pending.len(),
            batches.len()
        );

        let tasks: Vec<_> = batches
            .iter()
            .map(|batch| {
                let client = client.clone();
                let titles: Vec<String> =
                    batch.iter().map(|&i| candidates[i].title.clone()).collect();
                move || async move {
                    let refs: Vec<&str> = titles.iter().map(String::as_str).collect();
                    let request = CompletionRequest::new(FILTER_SYSTEM_PROMPT, build_batch_prompt(&refs))
                        .temperature(0.0)
                        .max_tokens(256)
                        .timeout(FILTER_TIMEOUT);
                    let response = client.complete(&request).await?;
                    match parse_selection(&response, titles.len()) {
                        Selection::Unparseable => Err(crate::llm::LlmError::Malformed(format!(
                            "unusable selection: {:?}",
                            response.chars().take(80).collect::<String>()
                        ))),
                        selection => Ok(selection),
                    }
                }
            })
            .collect();

        let mut handle = BatchRunner::new(self.concurrency).spawn(tasks);
        while let Some((batch_index, result)) = handle.next().await {
            let batch = &batches[batch_index];
            let selected = match result {
                Ok(Selection::Indices(indices)) => Some(indices),
                Ok(_) => Some(BTreeSet::new()),
                Err(e) => {
                    tracing::warn!(
                        "Relevance batch {} failed ({}); keeping all {} titles",
                        batch_index + 1,
                        e,
                        batch.len()
                    );
                    outcome.failed_batches += 1;
                    None
                }
            };

            for (position, &i) in batch.iter().enumerate() {
                let reference = abs_url(&candidates[i].identifier);
                match &selected {
                    Some(indices) if !indices.contains(&position) => {
                        cache.record_rejected(&reference);
                    }
                    _ => {
                        keep[i] = true;
                        cache.record_kept(&reference);
                    }
                }
            }
            cache.save()?;
        }
        Ok(())
    }
}
