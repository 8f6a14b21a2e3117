/*!
 * Terminal rendering for batch watching and history browsing.
 *
 * The watch view is a single progress bar plus one printed line per
 * item change, so a long-running batch stays readable in scrollback.
 */

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::job::JobRecord;
use crate::tracking::{BatchProgress, ItemDelta, PollEvent, StopReason};

/// Progress bar renderer for one watched batch
pub struct BatchConsole {
    multi: MultiProgress,
    bar: ProgressBar,
}

impl BatchConsole {
    /// Create a console for a batch of the given size
    pub fn new(total: u32) -> Self {
        let multi = MultiProgress::new();
        let bar = multi.add(ProgressBar::new(total as u64));
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} items ({percent}%) {msg}")
            .or_else(|_| {
                ProgressStyle::default_bar()
                    .template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}")
            })
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(template_result.progress_chars("█▓▒░"));
        bar.set_message("Waiting for first status");
        Self { multi, bar }
    }

    /// Render one poller event
    pub fn handle(&self, event: &PollEvent) {
        match event {
            PollEvent::Snapshot { progress, deltas } => {
                // Attached batches learn their size from the first snapshot
                self.bar.set_length(progress.total as u64);
                self.bar.set_position(progress.settled() as u64);
                self.bar.set_message(format!(
                    "{} processing, {} queued",
                    progress.processing, progress.queued
                ));
                for delta in deltas.iter().filter(|delta| delta.changed) {
                    self.bar.println(Self::item_line(delta));
                }
            }
            PollEvent::FetchFailed {
                consecutive,
                threshold,
                message,
            } => {
                self.bar.println(format!(
                    "Status fetch failed ({}/{}): {}",
                    consecutive, threshold, message
                ));
            }
            PollEvent::Stopped { reason, progress } => self.finish(*reason, progress.as_ref()),
        }
    }

    fn finish(&self, reason: StopReason, progress: Option<&BatchProgress>) {
        match reason {
            StopReason::Complete => {
                let summary = progress
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "all items settled".to_string());
                self.bar.finish_with_message(format!("Batch done: {}", summary));
            }
            StopReason::ErrorThreshold => {
                self.bar
                    .abandon_with_message("Gave up: the backend stopped answering");
            }
            StopReason::Cancelled => {
                self.bar.abandon_with_message("Watch cancelled");
            }
        }
    }

    /// Suspend the bar while running another print, then redraw
    pub fn println(&self, line: impl AsRef<str>) {
        self.bar.println(line.as_ref());
    }

    fn item_line(delta: &ItemDelta) -> String {
        let item = &delta.item;
        let mut line = format!("{:>3}. {:<32} {}", delta.index + 1, fit(&item.name, 32), item.status);
        if let Some(progress) = item.progress {
            if !item.status.is_terminal() {
                line.push_str(&format!(" {:.0}%", progress));
            }
        }
        if let Some(error) = &item.error {
            line.push_str(&format!(" ({})", error));
        }
        if let Some(primary) = item.result.as_ref().and_then(|r| r.primary()) {
            line.push_str(&format!(" -> {}", primary));
        }
        line
    }
}

impl Drop for BatchConsole {
    fn drop(&mut self) {
        // Leave a clean prompt even when the watch loop bails early
        let _unused = self.multi.clear();
    }
}

/// Print the history as an indexed table
pub fn print_history(records: &[JobRecord]) {
    if records.is_empty() {
        println!("History is empty");
        return;
    }

    println!(
        "{:>3}  {:<32} {:<10} {:<14} {}",
        "#", "NAME", "STATUS", "LANGUAGES", "COMPLETED"
    );
    for (index, record) in records.iter().enumerate() {
        let completed = record
            .completed_at
            .as_deref()
            .unwrap_or(record.created_at.as_str());
        println!(
            "{:>3}  {:<32} {:<10} {:<14} {}",
            index,
            fit(&record.name, 32),
            record.status.to_string(),
            fit(&record.target_languages.join(","), 14),
            format_timestamp(completed)
        );
    }
    println!("{} record(s)", records.len());
}

/// Print one record in full, as shown by `history list --index`
pub fn print_record(index: usize, record: &JobRecord) {
    println!("#{} {}", index, record.name);
    println!("  source:    {}", record.source_ref);
    println!("  status:    {}", record.status);
    println!("  languages: {}", record.target_languages.join(", "));
    println!("  submitted: {}", format_timestamp(&record.created_at));
    if let Some(completed_at) = &record.completed_at {
        println!("  completed: {}", format_timestamp(completed_at));
    }
    if let Some(primary) = record.result.as_ref().and_then(|r| r.primary()) {
        println!("  result:    {}", primary);
    }
    if let Some(error) = &record.error_message {
        println!("  error:     {}", error);
    }
    for line in &record.logs {
        println!("  log:       {}", line);
    }
}

fn format_timestamp(raw: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|stamp| stamp.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn fit(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let cut: String = text.chars().take(width.saturating_sub(1)).collect();
    format!("{}…", cut)
}
