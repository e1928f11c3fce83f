//! Operation progress: the shared slot, single-flight admission, and
//! per-mod aggregation.
//!
//! The progress slot is the only state visible outside a running
//! operation, and doubles as the single-flight lock: a mutating
//! operation is admitted iff the slot is empty, and the RAII
//! [`OperationHandle`] clears it on every exit path.

pub mod aggregate;
pub mod rate;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::events::EventSink;

/// Completed/total byte (or item) counts for one phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteProgress {
    pub completed: u64,
    pub total: u64,
}

impl ByteProgress {
    pub fn new(completed: u64, total: u64) -> Self {
        Self { completed, total }
    }

    /// Fraction in [0, 1]; zero when the total is unknown.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Aggregate operation progress, replaced on every tick while an
/// operation runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    /// The operation's overall target: a mod reference, or a synthetic
    /// label such as `__update__`.
    pub item: String,
    pub message: String,
    /// Fraction in [0, 1], or -1.0 when indeterminate.
    pub progress: f64,
}

impl Progress {
    pub fn indeterminate(item: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            message: message.into(),
            progress: -1.0,
        }
    }
}

/// The process-wide "current progress" slot and single-flight gate.
#[derive(Debug, Clone, Default)]
pub struct ProgressSlot {
    inner: Arc<Mutex<Option<Progress>>>,
}

impl ProgressSlot {
    /// Snapshot of the currently running operation's progress, if any.
    pub fn current(&self) -> Option<Progress> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Admit one operation. Fails fast when the slot is occupied;
    /// callers must treat the failure as retryable, never queue.
    pub(crate) fn begin(
        &self,
        sink: &Arc<dyn EventSink>,
        initial: Progress,
    ) -> Result<OperationHandle, Error> {
        {
            let mut slot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_some() {
                return Err(Error::OperationInProgress);
            }
            *slot = Some(initial.clone());
        }
        let publisher = ProgressPublisher {
            slot: Arc::clone(&self.inner),
            sink: Arc::clone(sink),
        };
        publisher.sink.progress(Some(&initial));
        Ok(OperationHandle { publisher })
    }
}

/// Writes progress snapshots into the slot and forwards them to the
/// sink. Cheap to clone; handed to the aggregator task.
#[derive(Clone)]
pub struct ProgressPublisher {
    slot: Arc<Mutex<Option<Progress>>>,
    sink: Arc<dyn EventSink>,
}

impl fmt::Debug for ProgressPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressPublisher").finish_non_exhaustive()
    }
}

impl ProgressPublisher {
    /// Replace the current snapshot and notify the sink.
    pub fn publish(&self, progress: Progress) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(progress.clone());
        self.sink.progress(Some(&progress));
    }

    fn clear(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.sink.progress(None);
    }
}

/// Admission token for one mutating operation. Dropping it clears the
/// progress slot unconditionally, including on panics and early
/// returns, so the UI never observes a stuck operation.
#[derive(Debug)]
pub struct OperationHandle {
    publisher: ProgressPublisher,
}

impl OperationHandle {
    pub fn publisher(&self) -> ProgressPublisher {
        self.publisher.clone()
    }

    pub fn publish(&self, progress: Progress) {
        self.publisher.publish(progress);
    }
}

impl Drop for OperationHandle {
    fn drop(&mut self) {
        self.publisher.clear();
    }
}
