//! Terminal output: status lines, enrichment progress, dataset tables.
//!
//! Everything here is presentation only. Library code reports through a
//! [`ProgressReporter`], which is silent unless the binary asks for output.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use owo_colors::OwoColorize;
use std::io::IsTerminal;

use crate::models::PaperRecord;
use crate::pipeline::SummaryKind;

/// Get the current terminal width.
pub fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(100)
}

/// Check if stderr is a terminal.
pub fn is_terminal() -> bool {
    std::io::stderr().is_terminal()
}

/// Status types for colored output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
    Pending,
}

/// Status icons for different outcomes.
pub fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Success => "✓",
        Status::Error => "✗",
        Status::Warning => "⚠",
        Status::Info => "ℹ",
        Status::Pending => "○",
    }
}

/// A colored status line
pub fn status_line(status: Status, msg: &str) -> String {
    let icon = status_icon(status);
    match status {
        Status::Success => format!("{} {}", icon.green().bold(), msg),
        Status::Error => format!("{} {}", icon.red().bold(), msg),
        Status::Warning => format!("{} {}", icon.yellow().bold(), msg),
        Status::Info => format!("{} {}", icon.cyan().bold(), msg),
        Status::Pending => format!("{} {}", icon.white().dimmed(), msg),
    }
}

/// Print a styled status message to stdout.
#[macro_export]
macro_rules! print_status {
    ($status:expr, $msg:expr) => {
        println!("{}", $crate::ui::status_line($status, &$msg))
    };
}

/// Truncate text to fit within the specified display width.
pub fn truncate_with_ellipsis(text: &str, max_width: usize) -> String {
    if max_width <= 3 {
        return "...".to_string();
    }

    let total: usize = text
        .chars()
        .map(|c| unicode_width::UnicodeWidthChar::width(c).unwrap_or(1))
        .sum();
    if total <= max_width {
        return text.to_string();
    }

    let mut width = 0;
    let mut kept = String::new();
    for c in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(1);
        if width + w > max_width - 3 {
            break;
        }
        width += w;
        kept.push(c);
    }
    format!("{}...", kept)
}

/// Per-item progress for long-running pipeline stages.
///
/// Hidden reporters do nothing; visible ones draw a bar on stderr and print
/// status lines above it.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    visible: bool,
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    pub fn hidden() -> Self {
        Self {
            visible: false,
            bar: None,
        }
    }

    pub fn stderr() -> Self {
        Self {
            visible: true,
            bar: None,
        }
    }

    /// Print a status line, above the bar if one is running
    pub fn status(&self, status: Status, msg: impl AsRef<str>) {
        if !self.visible {
            return;
        }
        let line = status_line(status, msg.as_ref());
        match &self.bar {
            Some(bar) => bar.println(line),
            None => eprintln!("{}", line),
        }
    }

    /// Begin a stage of `len` items
    pub fn start(&mut self, len: u64, msg: &str) {
        if !self.visible {
            return;
        }
        let bar = ProgressBar::with_draw_target(Some(len), ProgressDrawTarget::stderr());
        if let Ok(style) =
            ProgressStyle::with_template("{msg}: {bar:40.cyan/blue} {pos}/{len} ({elapsed})")
        {
            bar.set_style(style.progress_chars("█▓▒░ "));
        }
        bar.set_message(msg.to_string());
        self.bar = Some(bar);
    }

    /// Report one finished item and advance the bar
    pub fn item(&self, status: Status, msg: impl AsRef<str>) {
        self.status(status, msg);
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    /// End the current stage with a summary line
    pub fn finish(&mut self, msg: impl AsRef<str>) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        self.status(Status::Success, msg);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::hidden()
    }
}

fn kind_cell(kind: SummaryKind) -> Cell {
    let (label, color) = match kind {
        SummaryKind::Generated => ("generated", Color::Green),
        SummaryKind::Fallback => ("fallback", Color::Yellow),
        SummaryKind::NoPreview => ("no preview", Color::DarkYellow),
        SummaryKind::Missing => ("missing", Color::Red),
    };
    Cell::new(label).fg(color)
}

/// Tabulate records for the `list` command.
pub fn records_table<'a, I>(records: I) -> Table
where
    I: IntoIterator<Item = &'a PaperRecord>,
{
    let title_width = terminal_width().saturating_sub(60).clamp(20, 80);

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "Date", "Category", "Title", "Summary", "Images"]);

    for record in records {
        table.add_row(vec![
            Cell::new(&record.identifier).add_attribute(Attribute::Bold),
            Cell::new(&record.publication_date),
            Cell::new(truncate_with_ellipsis(&record.category, 20)),
            Cell::new(truncate_with_ellipsis(&record.title, title_width)),
            kind_cell(SummaryKind::of(record)),
            Cell::new(record.image_references.len()),
        ]);
    }
    table
}
