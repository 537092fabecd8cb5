//! Progress display.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use envsensor_core::{SyncPhase, SyncProgress};

/// Standard spinner tick characters (Braille dots animation)
const SPINNER_TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

const SPINNER_TICK_MS: u64 = 80;

const PROGRESS_CHARS: &str = "█▓░";

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(SPINNER_TICK_CHARS)
}

fn page_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} pages {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(PROGRESS_CHARS)
}

/// A bar that follows session progress across devices.
///
/// Hidden when `quiet` is set.
pub fn sync_progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
    pb
}

/// Render one progress report onto `pb`.
pub fn show_progress(pb: &ProgressBar, progress: &SyncProgress) {
    match progress.phase {
        SyncPhase::Connecting => {
            pb.set_style(spinner_style());
            pb.set_message(format!("Connecting to {}...", progress.device));
        }
        SyncPhase::Identifying => pb.set_message(format!("{}: checking device", progress.device)),
        SyncPhase::ClockCheck => pb.set_message(format!("{}: checking clock", progress.device)),
        SyncPhase::Planning => pb.set_message(format!("{}: planning", progress.device)),
        SyncPhase::Fetching => {
            if progress.pages_done == 0 {
                pb.set_style(page_bar_style());
                pb.set_length(progress.pages_total as u64);
                pb.set_position(0);
            }
            pb.set_position(progress.pages_done as u64);
            match progress.page {
                Some(page) => pb.set_message(format!("{} page {}", progress.device, page)),
                None => pb.set_message(progress.device.clone()),
            }
        }
        SyncPhase::Done => {
            pb.set_style(spinner_style());
            pb.set_message(format!("{}: done", progress.device));
        }
    }
}
