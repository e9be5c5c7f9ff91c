/// Iterative ACL comparison worker.
///
/// Walks the tree with an explicit stack of frames, each frame carrying
/// the directory, its level below the root, and the ACL its children are
/// compared against. Mismatches and per-folder failures are streamed over
/// a bounded crossbeam channel; the final outcome arrives on a separate
/// completion channel once the walk ends.
use super::{
    AclComparisonError, AclComparisonResult, CompareProgress, Tally, PROGRESS_CHANNEL_CAPACITY,
};
use crate::error::ScanError;
use crate::model::{is_acl_equal, AclModel};
use crate::services::ScanServices;
use chrono::{DateTime, Local};
use crossbeam_channel::{Receiver, Sender};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// What the worker does when a listed child turns out to be unreadable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeniedChildPolicy {
    /// Stop processing the remaining children of the directory.
    #[default]
    AbandonDirectory,
    /// Skip the child and carry on with its siblings.
    SkipChild,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    pub denied_child_policy: DeniedChildPolicy,
    /// Capacity of the progress channel.
    pub channel_capacity: usize,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            denied_child_policy: DeniedChildPolicy::default(),
            channel_capacity: PROGRESS_CHANNEL_CAPACITY,
        }
    }
}

/// How a worker run ended.
#[derive(Debug)]
pub enum WorkerOutcome {
    Completed,
    Cancelled,
    /// The root's ACL or listing could not be read.
    Failed(ScanError),
}

/// Sent once on the completion channel when the walk ends.
#[derive(Debug)]
pub struct WorkerCompletion {
    pub outcome: WorkerOutcome,
    pub folders_compared: u64,
    pub mismatches: u64,
    pub errors: u64,
    pub duration: Duration,
    pub finished_at: DateTime<Local>,
}

impl WorkerCompletion {
    fn new(outcome: WorkerOutcome, tally: &Tally) -> Self {
        let summary = tally.summary(matches!(outcome, WorkerOutcome::Cancelled));
        Self {
            outcome,
            folders_compared: summary.folders_compared,
            mismatches: summary.mismatches,
            errors: summary.errors,
            duration: summary.duration,
            finished_at: summary.finished_at,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, WorkerOutcome::Cancelled)
    }
}

/// Explicit-stack comparison engine.
#[derive(Debug, Clone)]
pub struct AclComparerWorker {
    services: ScanServices,
    options: WorkerOptions,
}

impl AclComparerWorker {
    pub fn new(services: ScanServices) -> Self {
        Self::with_options(services, WorkerOptions::default())
    }

    pub fn with_options(services: ScanServices, options: WorkerOptions) -> Self {
        Self { services, options }
    }

    /// Start comparing below `root` on a background thread.
    pub fn start(&self, root: impl Into<PathBuf>) -> Result<WorkerHandle, ScanError> {
        let root = root.into();
        if root.as_os_str().to_string_lossy().trim().is_empty() {
            return Err(ScanError::InvalidArgument("root path must not be blank"));
        }

        let (events_tx, events) =
            crossbeam_channel::bounded::<CompareProgress>(self.options.channel_capacity.max(1));
        let (completion_tx, completion) = crossbeam_channel::bounded::<WorkerCompletion>(1);
        let cancel_flag = Arc::new(AtomicBool::new(false));

        let mut walk = StackWalk {
            services: self.services.clone(),
            policy: self.options.denied_child_policy,
            cancel_flag: cancel_flag.clone(),
            events: events_tx,
            tally: Tally::start(),
        };
        let display = root.display().to_string();

        let thread = thread::Builder::new()
            .name("aclsleuth-worker".into())
            .spawn(move || {
                info!("Worker comparing ACLs below {}", root.display());
                let outcome = walk.run(&root);
                match &outcome {
                    WorkerOutcome::Failed(e) => warn!("Worker failed on {}: {e}", root.display()),
                    other => info!(
                        "Worker {:?} on {}: {} folders, {} mismatches, {} errors",
                        other,
                        root.display(),
                        walk.tally.folders_compared,
                        walk.tally.mismatches,
                        walk.tally.errors,
                    ),
                }
                let _ = completion_tx.send(WorkerCompletion::new(outcome, &walk.tally));
            })
            .map_err(|source| ScanError::Io {
                path: display,
                source,
            })?;

        Ok(WorkerHandle {
            events,
            completion,
            cancel_flag,
            thread: Some(thread),
        })
    }
}

/// Handle to a running worker.
///
/// The event channel is bounded: keep draining `events` while the walk
/// runs, or it stalls once the channel is full.
pub struct WorkerHandle {
    /// Mismatches and per-folder failures, in discovery order. Disconnects
    /// when the walk ends.
    pub events: Receiver<CompareProgress>,
    /// Receives exactly one [`WorkerCompletion`].
    pub completion: Receiver<WorkerCompletion>,
    cancel_flag: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request the walk to stop. Checked before each frame and each child.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    /// Drain every remaining event, then wait for the completion.
    pub fn finish(self) -> (Vec<CompareProgress>, WorkerCompletion) {
        let items: Vec<CompareProgress> = self.events.iter().collect();
        (items, Self::await_completion(self.completion, self.thread))
    }

    /// Wait for the completion, discarding events not yet received.
    pub fn join(self) -> WorkerCompletion {
        drop(self.events);
        Self::await_completion(self.completion, self.thread)
    }

    fn await_completion(
        completion: Receiver<WorkerCompletion>,
        thread: Option<thread::JoinHandle<()>>,
    ) -> WorkerCompletion {
        let completion = completion.recv().unwrap_or_else(|_| {
            warn!("Worker thread ended without a completion");
            WorkerCompletion {
                outcome: WorkerOutcome::Failed(ScanError::Unhandled(
                    "worker thread panicked".into(),
                )),
                folders_compared: 0,
                mismatches: 0,
                errors: 0,
                duration: Duration::ZERO,
                finished_at: Local::now(),
            }
        });
        if let Some(thread) = thread {
            let _ = thread.join();
        }
        completion
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("pending_events", &self.events.len())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

struct Frame {
    directory: PathBuf,
    /// Scan root = 1.
    level: u32,
    /// Shared with the mismatch report of the directory itself.
    acl: Arc<[AclModel]>,
}

struct StackWalk {
    services: ScanServices,
    policy: DeniedChildPolicy,
    cancel_flag: Arc<AtomicBool>,
    events: Sender<CompareProgress>,
    tally: Tally,
}

impl StackWalk {
    fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    fn emit(&mut self, item: CompareProgress) {
        self.tally.record(&item);
        let _ = self.events.send(item);
    }

    fn run(&mut self, root: &Path) -> WorkerOutcome {
        let baseline: Arc<[AclModel]> = match self.services.acl_models(root) {
            Ok(acl) => acl.into(),
            Err(e) => return WorkerOutcome::Failed(e),
        };

        let mut stack = vec![Frame {
            directory: root.to_path_buf(),
            level: 1,
            acl: baseline,
        }];

        while let Some(frame) = stack.pop() {
            if self.is_cancelled() {
                return WorkerOutcome::Cancelled;
            }

            let children = match self.services.lister.get_directories(&frame.directory) {
                Ok(children) => children,
                Err(e) if frame.level == 1 => return WorkerOutcome::Failed(e),
                Err(e) => {
                    warn!("Cannot list {}: {e}", frame.directory.display());
                    self.emit(CompareProgress::Error(AclComparisonError::from_error(
                        &frame.directory,
                        e,
                    )));
                    continue;
                }
            };

            let child_level = frame.level + 1;
            for child in children {
                if self.is_cancelled() {
                    return WorkerOutcome::Cancelled;
                }

                if self.services.lister.is_access_denied(&child) {
                    warn!("Access denied: {}", child.full_path.display());
                    match self.policy {
                        DeniedChildPolicy::AbandonDirectory => break,
                        DeniedChildPolicy::SkipChild => continue,
                    }
                }

                let acl: Arc<[AclModel]> = match self.services.acl_models(&child.full_path) {
                    Ok(acl) => acl.into(),
                    Err(e) => {
                        warn!("Cannot read ACL of {}: {e}", child.full_path.display());
                        self.emit(CompareProgress::Error(AclComparisonError::from_error(
                            &child.full_path,
                            e,
                        )));
                        continue;
                    }
                };

                self.tally.folders_compared += 1;
                if !is_acl_equal(&frame.acl, &acl) {
                    self.emit(CompareProgress::Mismatch(AclComparisonResult::mismatch(
                        &child.full_path,
                        &frame.directory,
                        &acl,
                    )));
                }

                if self
                    .services
                    .trustee
                    .current_report_trustee()
                    .allows_level(child_level)
                {
                    stack.push(Frame {
                        directory: child.full_path,
                        level: child_level,
                        acl,
                    });
                }
            }
        }

        if self.is_cancelled() {
            WorkerOutcome::Cancelled
        } else {
            WorkerOutcome::Completed
        }
    }
}
