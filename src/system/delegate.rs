//! Delegate notifications and their serialized asynchronous dispatch.
//!
//! Collaborators report ingestion progress and staleness through the
//! [`IndexSystemDelegate`] interface. [`AsyncIndexDelegate`] wraps the
//! user-supplied delegate and defers every callback onto a dedicated
//! serial worker, so reporters never block on user code. The one exception
//! is the explicitly synchronous out-of-date notification, which runs
//! inline when the reporter needs immediate acknowledgement.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::SystemTime;

use crossbeam_channel::{unbounded, Sender};

use crate::types::StoreUnitInfo;

/// Why a unit was detected stale: either a file changed underneath it, or
/// a unit it depends on did (a chain of hints, rooted at the file).
#[derive(Debug, Clone)]
pub enum UnitOutOfDateHint {
    DependentFile {
        path: PathBuf,
    },
    DependentUnit {
        unit_name: String,
        dependency: Arc<UnitOutOfDateHint>,
    },
}

impl UnitOutOfDateHint {
    pub fn file(path: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(UnitOutOfDateHint::DependentFile { path: path.into() })
    }

    pub fn unit(unit_name: impl Into<String>, dependency: Arc<UnitOutOfDateHint>) -> Arc<Self> {
        Arc::new(UnitOutOfDateHint::DependentUnit {
            unit_name: unit_name.into(),
            dependency,
        })
    }

    /// The file at the root of the hint chain.
    pub fn original_file_trigger(&self) -> &Path {
        match self {
            UnitOutOfDateHint::DependentFile { path } => path,
            UnitOutOfDateHint::DependentUnit { dependency, .. } => {
                dependency.original_file_trigger()
            }
        }
    }

    /// Human-readable chain, e.g. `unit(app.o) -> /src/util.h`.
    pub fn description(&self) -> String {
        match self {
            UnitOutOfDateHint::DependentFile { path } => path.display().to_string(),
            UnitOutOfDateHint::DependentUnit {
                unit_name,
                dependency,
            } => format!("unit({unit_name}) -> {}", dependency.description()),
        }
    }
}

/// Consumer interface for index system events. All methods default to
/// no-ops so implementors override only what they observe.
pub trait IndexSystemDelegate: Send + Sync {
    /// `pending` new units were queued for ingestion.
    fn processing_added_pending(&self, _pending: usize) {}

    /// `completed` units finished processing.
    fn processing_completed(&self, _completed: usize) {}

    fn processed_store_unit(&self, _unit_info: StoreUnitInfo) {}

    /// A unit was detected stale. When `synchronous` is true the reporter
    /// is blocked until this returns.
    fn unit_is_out_of_date(
        &self,
        _unit_info: StoreUnitInfo,
        _out_of_date_mod_time: SystemTime,
        _hint: Arc<UnitOutOfDateHint>,
        _synchronous: bool,
    ) {
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Single-consumer serial work queue: producers send boxed closures, one
/// named worker thread runs them in FIFO order.
struct SerialWorkQueue {
    sender: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl SerialWorkQueue {
    fn new(name: &str) -> Self {
        let (sender, receiver) = unbounded::<Job>();
        let thread_name = name.to_string();
        let worker = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        tracing::error!(
                            target: "delegate",
                            "panic in task on queue '{thread_name}'; continuing"
                        );
                    }
                }
            })
            .expect("failed to spawn delegate worker thread");

        Self {
            sender: Some(sender),
            worker: Some(worker),
        }
    }

    fn dispatch(&self, job: impl FnOnce() + Send + 'static) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(Box::new(job));
        }
    }

    /// Run a no-op through the queue and wait for it, establishing
    /// happens-before with everything dispatched earlier.
    fn dispatch_sync_barrier(&self) {
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        self.dispatch(move || {
            let _ = done_tx.send(());
        });
        let _ = done_rx.recv();
    }
}

impl Drop for SerialWorkQueue {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Serializes and defers delegate callbacks so the index system never
/// blocks on delegate implementations.
pub struct AsyncIndexDelegate {
    other: Option<Arc<dyn IndexSystemDelegate>>,
    queue: SerialWorkQueue,
}

impl AsyncIndexDelegate {
    pub fn new(other: Option<Arc<dyn IndexSystemDelegate>>) -> Self {
        Self {
            other,
            queue: SerialWorkQueue::new("symdex-delegate"),
        }
    }

    /// Wait for all previously enqueued delegate events to be observed.
    pub fn drain(&self) {
        self.queue.dispatch_sync_barrier();
    }
}

impl IndexSystemDelegate for AsyncIndexDelegate {
    fn processing_added_pending(&self, pending: usize) {
        let Some(other) = self.other.clone() else {
            return;
        };
        self.queue
            .dispatch(move || other.processing_added_pending(pending));
    }

    fn processing_completed(&self, completed: usize) {
        let Some(other) = self.other.clone() else {
            return;
        };
        self.queue
            .dispatch(move || other.processing_completed(completed));
    }

    fn processed_store_unit(&self, unit_info: StoreUnitInfo) {
        let Some(other) = self.other.clone() else {
            return;
        };
        self.queue
            .dispatch(move || other.processed_store_unit(unit_info));
    }

    fn unit_is_out_of_date(
        &self,
        unit_info: StoreUnitInfo,
        out_of_date_mod_time: SystemTime,
        hint: Arc<UnitOutOfDateHint>,
        synchronous: bool,
    ) {
        let Some(other) = self.other.clone() else {
            return;
        };

        if synchronous {
            other.unit_is_out_of_date(unit_info, out_of_date_mod_time, hint, true);
            return;
        }

        self.queue.dispatch(move || {
            other.unit_is_out_of_date(unit_info, out_of_date_mod_time, hint, false)
        });
    }
}
