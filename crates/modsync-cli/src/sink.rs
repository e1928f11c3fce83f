//! Console event sink: renders aggregate progress on one status line.
//!
//! Uses manual cursor control for reliable single-line updates; mod-set
//! notifications are ignored because the commands print final state
//! themselves.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use modsync_core::{EventSink, Installation, Lockfile, Profile, Progress};

#[derive(Debug, Default)]
pub struct ConsoleSink {
    line_open: AtomicBool,
}

impl EventSink for ConsoleSink {
    fn lockfile_mods(&self, _: &Lockfile) {}
    fn manifest_mods(&self, _: &Profile) {}
    fn installations(&self, _: &[Installation]) {}
    fn selected_installation(&self, _: Option<&Installation>) {}

    fn progress(&self, progress: Option<&Progress>) {
        let mut out = io::stderr();
        match progress {
            Some(p) if p.progress >= 0.0 => {
                let percent = (p.progress * 100.0).round();
                let _ = write!(out, "\r\x1b[2K{percent:>3.0}% {}", p.message);
                self.line_open.store(true, Ordering::Relaxed);
            }
            Some(p) => {
                let _ = write!(out, "\r\x1b[2K     {}", p.message);
                self.line_open.store(true, Ordering::Relaxed);
            }
            None => {
                if self.line_open.swap(false, Ordering::Relaxed) {
                    let _ = writeln!(out);
                }
            }
        }
        let _ = out.flush();
    }
}
