//! Markdown digest composition.

use super::OutgoingMessage;
use crate::models::PaperRecord;
use crate::utils::{clamp_with_ellipsis, collapse_whitespace};

/// Content budget per message; the messaging API rejects markdown over 4096 bytes
pub const CONTENT_BUDGET: usize = 4000;

fn entry(record: &PaperRecord) -> String {
    let title = collapse_whitespace(&record.title);
    let mut entry = format!("**[{}]({})**", title, record.source_url);
    if !record.category.is_empty() {
        entry.push_str(&format!("\n<font color=\"comment\">{}</font>", record.category));
    }
    if let Some(summary) = record.short_summary.as_deref().filter(|s| !s.trim().is_empty()) {
        entry.push_str(&format!("\n> {}", collapse_whitespace(summary)));
    }
    entry
}

/// Shrink a single entry until it fits `budget` bytes.
fn fit(entry: String, budget: usize) -> String {
    if entry.len() <= budget {
        return entry;
    }
    let mut chars = entry.chars().count();
    let mut fitted = entry.clone();
    while fitted.len() > budget && chars > 1 {
        chars = chars * 9 / 10;
        fitted = clamp_with_ellipsis(&entry, chars);
    }
    fitted
}

/// Compose digest messages for the first `limit` records.
///
/// Entries are packed in order; each message stays under 4000 bytes of content.
pub fn compose_digest<'a, I>(records: I, agent_id: i64, to_user: &str, limit: usize) -> Vec<OutgoingMessage>
where
    I: IntoIterator<Item = &'a PaperRecord>,
{
    let entries: Vec<String> = records.into_iter().take(limit).map(entry).collect();
    if entries.is_empty() {
        return Vec::new();
    }

    let total = entries.len();
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for entry in entries {
        // room for the "(n/m)" header added below
        let entry = fit(entry, CONTENT_BUDGET - 64);
        let separator = if current.is_empty() { 0 } else { 2 };
        if !current.is_empty() && current.len() + separator + entry.len() > CONTENT_BUDGET - 64 {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(&entry);
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    let parts = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, body)| {
            let header = if parts > 1 {
                format!("## Robotics papers: {} new ({}/{})", total, i + 1, parts)
            } else {
                format!("## Robotics papers: {} new", total)
            };
            OutgoingMessage::markdown(to_user, agent_id, format!("{}\n\n{}", header, body))
        })
        .collect()
}
