//! Short and long summaries with deterministic fallbacks.

use std::time::Duration;

use crate::llm::{CompletionRequest, LlmError, SharedClient};
use crate::models::PaperRecord;
use crate::utils::{clamp_with_ellipsis, collapse_whitespace, truncate_chars};

/// Stored in both summary fields when no full text could be extracted
pub const NO_PREVIEW: &str = "No preview available.";

pub const SHORT_CONTEXT_CHARS: usize = 4_000;
pub const LONG_CONTEXT_CHARS: usize = 32_000;
pub const SHORT_MAX_CHARS: usize = 160;

const SHORT_TIMEOUT: Duration = Duration::from_secs(60);
const LONG_TIMEOUT: Duration = Duration::from_secs(180);

const LONG_SECTIONS: [&str; 4] = [
    "Background & Motivation",
    "Method",
    "Experiments & Results",
    "Conclusion",
];

/// How a record's summaries came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SummaryKind {
    Generated,
    Fallback,
    NoPreview,
    Missing,
}

impl SummaryKind {
    /// Classify the summaries already stored on a record
    pub fn of(record: &PaperRecord) -> Self {
        let (Some(short), Some(long)) = (
            record.short_summary.as_deref().filter(|s| !s.trim().is_empty()),
            record.long_summary.as_deref().filter(|s| !s.trim().is_empty()),
        ) else {
            return SummaryKind::Missing;
        };

        if short == NO_PREVIEW || long == NO_PREVIEW {
            SummaryKind::NoPreview
        } else if short == fallback_short(&record.title) || long == fallback_long(&record.title) {
            SummaryKind::Fallback
        } else {
            SummaryKind::Generated
        }
    }
}

/// Both summaries for one paper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summaries {
    pub short: String,
    pub long: String,
    pub kind: SummaryKind,
}

impl Summaries {
    pub fn no_preview() -> Self {
        Self {
            short: NO_PREVIEW.to_string(),
            long: NO_PREVIEW.to_string(),
            kind: SummaryKind::NoPreview,
        }
    }

    pub fn fallback(title: &str) -> Self {
        Self {
            short: fallback_short(title),
            long: fallback_long(title),
            kind: SummaryKind::Fallback,
        }
    }
}

fn display_title(title: &str) -> String {
    let title = collapse_whitespace(title);
    if title.is_empty() {
        "Untitled paper".to_string()
    } else {
        title
    }
}

/// Title-derived short summary used when generation is unavailable
pub fn fallback_short(title: &str) -> String {
    clamp_with_ellipsis(
        &format!("{}: see the full paper for details.", display_title(title)),
        SHORT_MAX_CHARS,
    )
}

/// Title-derived long summary used when generation is unavailable
pub fn fallback_long(title: &str) -> String {
    let title = display_title(title);
    format!(
        "## {}\n\nThis paper, \"{}\", addresses a problem in robotics.\n\n\
         ## {}\n\nThe approach is described in the full text.\n\n\
         ## {}\n\nSee the paper for the experimental setup and results.\n\n\
         ## {}\n\nAn automatic summary was not available for this paper.",
        LONG_SECTIONS[0], title, LONG_SECTIONS[1], LONG_SECTIONS[2], LONG_SECTIONS[3]
    )
}

/// Generates summaries through the completion service.
#[derive(Debug, Clone)]
pub struct Summarizer {
    client: Option<SharedClient>,
    language: String,
    reasoning: bool,
}

impl Summarizer {
    pub fn new(client: Option<SharedClient>, language: impl Into<String>, reasoning: bool) -> Self {
        Self {
            client,
            language: language.into(),
            reasoning,
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are a robotics research assistant writing for a daily paper digest. \
             Write in {}. Be factual and do not invent results.",
            self.language
        )
    }

    /// One-sentence summary, at most 160 characters. `None` on failure.
    pub async fn short_summary(&self, title: &str, text: &str) -> Option<String> {
        let client = self.client.as_ref()?;
        let user = format!(
            "Summarize the contribution of this paper in a single sentence of 100 to 160 \
             characters. Reply with the sentence only.\n\nTitle: {}\n\nText:\n{}",
            title,
            truncate_chars(text, SHORT_CONTEXT_CHARS)
        );
        let request = CompletionRequest::new(self.system_prompt(), user)
            .temperature(0.3)
            .max_tokens(200)
            .timeout(SHORT_TIMEOUT);

        let reply = log_failure(title, "short", client.complete(&request).await)?;
        let cleaned = collapse_whitespace(reply.trim_matches(|c: char| c == '"' || c == '“' || c == '”'));
        (!cleaned.is_empty()).then(|| clamp_with_ellipsis(&cleaned, SHORT_MAX_CHARS))
    }

    /// Structured multi-section summary. `None` on failure.
    pub async fn long_summary(&self, title: &str, text: &str) -> Option<String> {
        let client = self.client.as_ref()?;
        let outline = LONG_SECTIONS
            .iter()
            .map(|s| format!("## {}", s))
            .collect::<Vec<_>>()
            .join("\n");
        let user = format!(
            "Write a structured summary of this paper in 800 to 1500 characters using \
             exactly these markdown sections:\n{}\n\nTitle: {}\n\nText:\n{}",
            outline,
            title,
            truncate_chars(text, LONG_CONTEXT_CHARS)
        );
        let request = CompletionRequest::new(self.system_prompt(), user)
            .temperature(0.3)
            .max_tokens(2048)
            .reasoning(self.reasoning)
            .timeout(LONG_TIMEOUT);

        let reply = log_failure(title, "long", client.complete(&request).await)?;
        let reply = reply.trim();
        (!reply.is_empty()).then(|| reply.to_string())
    }

    /// Both summaries, falling back per field. Empty text yields [`NO_PREVIEW`].
    pub async fn summarize(&self, title: &str, text: &str) -> Summaries {
        if text.trim().is_empty() {
            return Summaries::no_preview();
        }
        if self.client.is_none() {
            return Summaries::fallback(title);
        }

        let (short, long) = tokio::join!(self.short_summary(title, text), self.long_summary(title, text));
        let kind = if short.is_some() && long.is_some() {
            SummaryKind::Generated
        } else {
            SummaryKind::Fallback
        };
        Summaries {
            short: short.unwrap_or_else(|| fallback_short(title)),
            long: long.unwrap_or_else(|| fallback_long(title)),
            kind,
        }
    }
}

fn log_failure(title: &str, which: &str, result: Result<String, LlmError>) -> Option<String> {
    match result {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!("{} summary failed for \"{}\": {}", which, title, e);
            None
        }
    }
}
