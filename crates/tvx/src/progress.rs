//! 📊 progress.rs: "Did it work?": every on-call engineer, every run, forever.
//!
//! 🚀 Two things live here:
//! - [`RunReport`]: what one run of a flow did, in numbers. Returned by every pipeline,
//!   logged on the way out, and rendered as a comfy table for one-shot runs.
//! - [`FanOutProgress`]: an indicatif bar for the station fan-out, because watching
//!   ten thousand detail fetches scroll by in the log is not a hobby.
//!
//! ⚠️ Watching the bar will not make the transit API faster. We've tried.
//!
//! 🦆

use std::fmt;
use std::time::Duration;

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// ⏱️ MM:SS.mmm, or HH:MM:SS if it has been that kind of day.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}.{:03}", minutes, seconds, duration.subsec_millis())
    }
}

/// 🏷️ Which flow produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Stations,
    Trips,
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flow::Stations => write!(f, "stations"),
            Flow::Trips => write!(f, "trips"),
        }
    }
}

/// 📋 One run, summarized. Never an error: a run that went badly is a report with sad numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub flow: Flow,
    /// how many entities the lister returned
    pub listed: usize,
    /// how many made it through fetch/transform into the batch
    pub produced: usize,
    /// listed but not produced: failed fetches, rejected or parked trips
    pub dropped: usize,
    pub submitted: usize,
    pub failed: usize,
    pub positions_written: usize,
    /// 🗺️ true when the geo index was deleted and repopulated without error
    pub index_rebuilt: bool,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn new(flow: Flow) -> Self {
        Self {
            flow,
            listed: 0,
            produced: 0,
            dropped: 0,
            submitted: 0,
            failed: 0,
            positions_written: 0,
            index_rebuilt: false,
            elapsed: Duration::ZERO,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.submitted.saturating_sub(self.failed)
    }

    /// 📣 The one line per run that everyone greps for.
    pub fn log_summary(&self) {
        info!(
            "🏁 {} run completed in {}: {} listed, {} produced, {} dropped, {}/{} rows upserted, {} positions written, index rebuilt: {}",
            self.flow,
            format_duration(self.elapsed),
            self.listed,
            self.produced,
            self.dropped,
            self.succeeded(),
            self.submitted,
            self.positions_written,
            self.index_rebuilt
        );
    }

    /// 🍽️ Two columns, no borders, numbers right-aligned. Comfy.
    pub fn render_table(&self) -> String {
        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);

        let rows: Vec<(&str, String)> = vec![
            ("flow", self.flow.to_string()),
            ("listed", self.listed.to_string()),
            ("produced", self.produced.to_string()),
            ("dropped", self.dropped.to_string()),
            ("rows submitted", self.submitted.to_string()),
            ("rows failed", self.failed.to_string()),
            ("rows upserted", self.succeeded().to_string()),
            ("positions written", self.positions_written.to_string()),
            ("index rebuilt", if self.index_rebuilt { "yes" } else { "no" }.to_string()),
            ("elapsed", format_duration(self.elapsed)),
        ];
        for (label, value) in rows {
            table.add_row(vec![
                Cell::new(label),
                Cell::new(value).set_alignment(CellAlignment::Right),
            ]);
        }
        table.to_string()
    }
}

/// 📊 A progress bar over the station roster. Hidden unless someone asked for it.
///
/// `ProgressBar` is an `Arc` inside, so every detail worker gets a clone and
/// ticks it when it finishes, successfully or not.
#[derive(Clone)]
pub(crate) struct FanOutProgress {
    bar: ProgressBar,
}

impl fmt::Debug for FanOutProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 🎭 ProgressBar is a diva and won't derive Debug
        f.debug_struct("FanOutProgress")
            .field("position", &self.bar.position())
            .field("length", &self.bar.length())
            .finish()
    }
}

impl FanOutProgress {
    pub(crate) fn new(total: usize, visible: bool) -> Self {
        if !visible {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template(
            "🚏 {msg} [{bar:40.cyan/blue}] {pos}/{len} stations ({elapsed})",
        )
        .map(|style| style.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_message("fetching station details");
        Self { bar }
    }

    pub(crate) fn hidden() -> Self {
        Self::new(0, false)
    }

    pub(crate) fn tick_one(&self) {
        self.bar.inc(1);
    }

    pub(crate) fn position(&self) -> u64 {
        self.bar.position()
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
