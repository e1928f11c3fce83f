//! Aggregation of per-mod install events into one status stream.
//!
//! One aggregator task per sync pass owns the mod-to-state table and
//! selects over the capability's event channel, a fixed 100 ms tick,
//! and an explicit shutdown signal. Producers and the tick never touch
//! shared state, so the snapshot computed on a tick is always at least
//! as fresh as the last applied event; intermediate events may coalesce.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use super::rate::RateTracker;
use super::{ByteProgress, Progress, ProgressPublisher};
use crate::fetch::InstallEvent;

/// Snapshot cadence.
pub const TICK: Duration = Duration::from_millis(100);

/// Rate estimation window.
const RATE_WINDOW: Duration = Duration::from_secs(5);

/// Transient per-mod progress, created on the first event for a mod and
/// discarded when the sync pass ends.
///
/// Once `complete` is set, later events for the mod are ignored: the
/// download and extract pipelines may emit stale updates after
/// completion, and last-writer-wins would walk progress backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModProgressState {
    pub download: ByteProgress,
    pub extract: ByteProgress,
    pub downloading: bool,
    pub complete: bool,
}

/// Merges per-mod progress events into one aggregate snapshot.
#[derive(Debug)]
pub struct ProgressAggregator {
    item: String,
    mods: HashMap<String, ModProgressState>,
    download_rate: RateTracker,
    extract_rate: RateTracker,
}

impl ProgressAggregator {
    pub fn new(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            mods: HashMap::new(),
            download_rate: RateTracker::new(RATE_WINDOW),
            extract_rate: RateTracker::new(RATE_WINDOW),
        }
    }

    /// Apply one capability event to the per-mod table.
    pub fn apply(&mut self, event: &InstallEvent) {
        let reference = match event {
            // The capability's own whole-operation summary; counting it
            // alongside the per-mod events would double the totals.
            InstallEvent::Overall(_) => return,
            InstallEvent::Download { mod_reference, .. }
            | InstallEvent::Extract { mod_reference, .. }
            | InstallEvent::ModComplete { mod_reference } => mod_reference,
        };

        let state = self.mods.entry(reference.clone()).or_default();
        if state.complete {
            return;
        }
        match event {
            InstallEvent::Download { progress, .. } => {
                state.downloading = true;
                state.download = *progress;
            }
            InstallEvent::Extract { progress, .. } => {
                state.downloading = false;
                state.extract = *progress;
            }
            InstallEvent::ModComplete { .. } => {
                state.downloading = false;
                state.complete = true;
            }
            InstallEvent::Overall(_) => unreachable!(),
        }
    }

    /// Compute the snapshot for one tick. `None` when neither phase has
    /// anything to report; the previous message then stands.
    pub fn tick(&mut self) -> Option<Progress> {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> Option<Progress> {
        let mut download_bytes = ByteProgress::default();
        let mut extract_bytes = ByteProgress::default();
        let mut download_mods = ByteProgress::default();
        let mut extract_mods = ByteProgress::default();
        let mut has_downloading = false;

        for state in self.mods.values() {
            if state.download.total != 0 {
                download_mods.total += 1;
                if state.complete || !state.downloading {
                    download_mods.completed += 1;
                }
                if !state.complete && state.downloading {
                    has_downloading = true;
                }
            }
            // Extraction totals are unknown while a mod is still
            // downloading, but it still counts as an extraction that has
            // to execute.
            if state.download.total != 0 || state.extract.total != 0 {
                extract_mods.total += 1;
                if state.complete {
                    extract_mods.completed += 1;
                }
            }

            download_bytes.completed += state.download.completed;
            download_bytes.total += state.download.total;
            extract_bytes.completed += state.extract.completed;
            extract_bytes.total += state.extract.total;
        }

        self.download_rate.add_at(now, download_bytes.completed);
        self.download_rate.total = download_bytes.total;
        self.extract_rate.add_at(now, extract_bytes.completed);
        self.extract_rate.total = extract_bytes.total;

        // One coherent phase at a time: any active download wins over
        // extraction, even when most mods are already extracting.
        if has_downloading {
            if download_bytes.total == 0 {
                return None;
            }
            Some(Progress {
                item: self.item.clone(),
                message: phase_message("Downloading", download_mods, download_bytes, &self.download_rate),
                progress: download_bytes.fraction(),
            })
        } else {
            if extract_bytes.total == 0 {
                return None;
            }
            Some(Progress {
                item: self.item.clone(),
                message: phase_message("Extracting", extract_mods, extract_bytes, &self.extract_rate),
                progress: extract_bytes.fraction(),
            })
        }
    }
}

fn phase_message(
    verb: &str,
    mods: ByteProgress,
    bytes: ByteProgress,
    rate: &RateTracker,
) -> String {
    format!(
        "{verb} {}/{} mods: {}/{}, {}/s, {}",
        mods.completed,
        mods.total,
        format_size(bytes.completed),
        format_size(bytes.total),
        format_size(rate.speed() as u64),
        format_eta(rate.eta()),
    )
}

/// Format bytes as human readable.
pub(crate) fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn format_eta(eta: Option<Duration>) -> String {
    let Some(eta) = eta else {
        return "soon".to_string();
    };
    let secs = eta.as_secs_f64().round() as u64;
    if secs == 0 {
        return "soon".to_string();
    }
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Drive an aggregator until the shutdown signal fires.
///
/// The loop owns all progress state; it selects between incoming events,
/// the tick, and shutdown. Teardown is the explicit signal sent once
/// after the install call returns, never a channel-close race.
pub async fn run(
    mut aggregator: ProgressAggregator,
    mut events: mpsc::Receiver<InstallEvent>,
    mut shutdown: oneshot::Receiver<()>,
    publisher: ProgressPublisher,
) {
    let mut ticker = tokio::time::interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut events_open = true;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            received = events.recv(), if events_open => {
                match received {
                    Some(event) => aggregator.apply(&event),
                    None => events_open = false,
                }
            }
            _ = ticker.tick() => {
                if let Some(progress) = aggregator.tick() {
                    publisher.publish(progress);
                }
            }
        }
    }

    // Apply anything still queued so the final snapshot reflects every
    // event sent before shutdown.
    while let Ok(event) = events.try_recv() {
        aggregator.apply(&event);
    }
    if let Some(progress) = aggregator.tick() {
        publisher.publish(progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn download(reference: &str, completed: u64, total: u64) -> InstallEvent {
        InstallEvent::Download {
            mod_reference: reference.to_string(),
            progress: ByteProgress::new(completed, total),
        }
    }

    fn extract(reference: &str, completed: u64, total: u64) -> InstallEvent {
        InstallEvent::Extract {
            mod_reference: reference.to_string(),
            progress: ByteProgress::new(completed, total),
        }
    }

    fn complete(reference: &str) -> InstallEvent {
        InstallEvent::ModComplete {
            mod_reference: reference.to_string(),
        }
    }

    #[test]
    fn events_after_completion_are_ignored() {
        let mut aggregator = ProgressAggregator::new("base-lib");
        aggregator.apply(&download("base-lib", 500, 500));
        aggregator.apply(&complete("base-lib"));
        let frozen = aggregator.mods["base-lib"];

        // Extract updates are sometimes received after the mod is
        // marked complete.
        aggregator.apply(&extract("base-lib", 10, 400));
        aggregator.apply(&download("base-lib", 0, 9999));
        assert_eq!(aggregator.mods["base-lib"], frozen);
    }

    #[test]
    fn overall_events_are_ignored() {
        let mut aggregator = ProgressAggregator::new("__update__");
        aggregator.apply(&InstallEvent::Overall(ByteProgress::new(3, 10)));
        assert!(aggregator.mods.is_empty());
        assert!(aggregator.tick().is_none());
    }

    #[test]
    fn download_phase_wins_while_any_mod_is_downloading() {
        let mut aggregator = ProgressAggregator::new("__update__");
        // One mod mid-download.
        aggregator.apply(&download("alpha", 400, 1000));
        // One mod fully downloaded and extracted.
        aggregator.apply(&download("beta", 500, 500));
        aggregator.apply(&extract("beta", 500, 500));
        aggregator.apply(&complete("beta"));

        let snapshot = aggregator.tick().unwrap();
        assert!(
            snapshot.message.starts_with("Downloading 1/2 mods"),
            "unexpected message: {}",
            snapshot.message
        );
        assert!((snapshot.progress - 900.0 / 1500.0).abs() < 1e-9);
    }

    #[test]
    fn extract_phase_reported_once_downloads_settle() {
        let mut aggregator = ProgressAggregator::new("alpha");
        aggregator.apply(&download("alpha", 500, 500));
        aggregator.apply(&extract("alpha", 100, 400));

        let snapshot = aggregator.tick().unwrap();
        assert!(
            snapshot.message.starts_with("Extracting 0/1 mods"),
            "unexpected message: {}",
            snapshot.message
        );
        assert!((snapshot.progress - 0.25).abs() < 1e-9);
    }

    #[test]
    fn queued_extractions_count_before_their_totals_exist() {
        let mut aggregator = ProgressAggregator::new("alpha");
        // Still downloading: no extract bytes yet, but the extraction is
        // known to be pending.
        aggregator.apply(&download("alpha", 100, 500));
        aggregator.apply(&download("beta", 500, 500));
        aggregator.apply(&extract("beta", 200, 400));

        let snapshot = aggregator.tick().unwrap();
        // alpha is downloading, so the download phase is reported, with
        // beta's finished download counted as completed.
        assert!(snapshot.message.starts_with("Downloading 1/2 mods"));
    }

    #[test]
    fn no_snapshot_when_nothing_to_report() {
        let mut aggregator = ProgressAggregator::new("alpha");
        assert!(aggregator.tick().is_none());

        // A mod whose download total is still unknown reports nothing.
        aggregator.apply(&download("alpha", 0, 0));
        assert!(aggregator.tick().is_none());
    }

    #[test]
    fn eta_renders_soon_when_rate_is_unknown() {
        assert_eq!(format_eta(None), "soon");
        assert_eq!(format_eta(Some(Duration::from_secs(0))), "soon");
        assert_eq!(format_eta(Some(Duration::from_secs(5))), "5s");
        assert_eq!(format_eta(Some(Duration::from_secs(65))), "1m5s");
        assert_eq!(format_eta(Some(Duration::from_secs(3725))), "1h2m5s");
    }

    #[test]
    fn sizes_are_humanized() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KiB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MiB");
    }
}
