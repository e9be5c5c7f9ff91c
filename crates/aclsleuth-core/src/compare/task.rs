/// Recursive ACL comparison on a background thread.
///
/// Each run walks the tree depth-first, comparing every child folder with
/// the ACL of the folder it was listed from, and hands each mismatch or
/// per-folder failure to the caller's progress callback as it is found.
use super::{AclComparisonError, AclComparisonResult, CompareProgress, CompareSummary, Tally};
use crate::error::ScanError;
use crate::model::{is_acl_equal, AclModel, FolderEntry};
use crate::services::ScanServices;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Stack reserved for the comparison thread; recursion depth follows the
/// folder nesting depth.
const COMPARE_THREAD_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Cancel flags of the runs that have not finished yet.
type LiveRuns = Arc<Mutex<Vec<Arc<AtomicBool>>>>;

/// Recursive comparison engine.
///
/// Every run gets its own cancel flag. Clones share the set of live runs,
/// so a clone handed to a progress callback can cancel the run it is
/// reporting on, and starting a new run never revives a cancelled one.
#[derive(Debug, Clone)]
pub struct AclCompareTask {
    services: ScanServices,
    live: LiveRuns,
    cancel_requested: Arc<AtomicBool>,
}

impl AclCompareTask {
    pub fn new(services: ScanServices) -> Self {
        Self {
            services,
            live: Arc::new(Mutex::new(Vec::new())),
            cancel_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request every running comparison of this task to stop. No progress
    /// callback fires after the request is observed.
    pub fn cancel(&self) {
        self.cancel_requested.store(true, Ordering::Relaxed);
        for flag in self.live.lock().iter() {
            flag.store(true, Ordering::Relaxed);
        }
    }

    /// `true` once [`cancel`](Self::cancel) was called, until the next run
    /// starts.
    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Relaxed)
    }

    /// `true` while at least one run of this task has not finished.
    pub fn is_busy(&self) -> bool {
        !self.live.lock().is_empty()
    }

    fn begin_run(&self) -> RunGuard {
        self.cancel_requested.store(false, Ordering::Relaxed);
        RunGuard::enter(self.live.clone())
    }

    /// Start comparing below `root` on a background thread.
    pub fn run<P>(&self, root: impl Into<PathBuf>, on_progress: P) -> Result<CompareHandle, ScanError>
    where
        P: FnMut(CompareProgress) + Send + 'static,
    {
        self.run_with_completion(root, on_progress, |_| {})
    }

    /// Like [`run`](Self::run), additionally invoking `on_complete` on the
    /// comparison thread with the final outcome.
    pub fn run_with_completion<P, C>(
        &self,
        root: impl Into<PathBuf>,
        on_progress: P,
        on_complete: C,
    ) -> Result<CompareHandle, ScanError>
    where
        P: FnMut(CompareProgress) + Send + 'static,
        C: FnOnce(&Result<CompareSummary, ScanError>) + Send + 'static,
    {
        let root = root.into();
        if root.as_os_str().to_string_lossy().trim().is_empty() {
            return Err(ScanError::InvalidArgument("root path must not be blank"));
        }

        let run = self.begin_run();
        let cancel_flag = run.flag.clone();

        let walker = Walker {
            services: self.services.clone(),
            cancel_flag: cancel_flag.clone(),
            on_progress,
            tally: Tally::start(),
        };
        let display = root.display().to_string();

        let thread = compare_thread()
            .spawn(move || {
                let _run = run;
                let result = walker.run(&root);
                on_complete(&result);
                result
            })
            .map_err(|source| ScanError::Io {
                path: display,
                source,
            })?;

        Ok(CompareHandle {
            cancel_flag,
            thread,
        })
    }

    /// Compare below `root` and wait for the result.
    ///
    /// The walk still runs on a comparison thread so deep trees get the
    /// same stack as [`run`](Self::run); `on_progress` may borrow from the
    /// caller.
    pub fn run_blocking<P>(
        &self,
        root: impl AsRef<Path>,
        on_progress: P,
    ) -> Result<CompareSummary, ScanError>
    where
        P: FnMut(CompareProgress) + Send,
    {
        let root = root.as_ref();
        if root.as_os_str().to_string_lossy().trim().is_empty() {
            return Err(ScanError::InvalidArgument("root path must not be blank"));
        }

        let run = self.begin_run();
        let walker = Walker {
            services: self.services.clone(),
            cancel_flag: run.flag.clone(),
            on_progress,
            tally: Tally::start(),
        };

        thread::scope(|scope| {
            compare_thread()
                .spawn_scoped(scope, move || walker.run(root))
                .map_err(|source| ScanError::Io {
                    path: root.display().to_string(),
                    source,
                })?
                .join()
                .unwrap_or_else(|_| Err(ScanError::Unhandled("comparison thread panicked".into())))
        })
    }
}

fn compare_thread() -> thread::Builder {
    thread::Builder::new()
        .name("aclsleuth-compare".into())
        .stack_size(COMPARE_THREAD_STACK_SIZE)
}

/// Handle to a comparison started with [`AclCompareTask::run`].
#[derive(Debug)]
pub struct CompareHandle {
    cancel_flag: Arc<AtomicBool>,
    thread: thread::JoinHandle<Result<CompareSummary, ScanError>>,
}

impl CompareHandle {
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the comparison to end.
    ///
    /// Fails when the root's ACL or listing could not be read, or when the
    /// progress callback panicked.
    pub fn join(self) -> Result<CompareSummary, ScanError> {
        self.thread
            .join()
            .unwrap_or_else(|_| Err(ScanError::Unhandled("comparison thread panicked".into())))
    }
}

/// Registers one run's cancel flag with its task for the run's lifetime.
struct RunGuard {
    live: LiveRuns,
    flag: Arc<AtomicBool>,
}

impl RunGuard {
    fn enter(live: LiveRuns) -> Self {
        let flag = Arc::new(AtomicBool::new(false));
        live.lock().push(flag.clone());
        Self { live, flag }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.live.lock().retain(|f| !Arc::ptr_eq(f, &self.flag));
    }
}

struct Walker<P> {
    services: ScanServices,
    cancel_flag: Arc<AtomicBool>,
    on_progress: P,
    tally: Tally,
}

impl<P: FnMut(CompareProgress)> Walker<P> {
    fn run(mut self, root: &Path) -> Result<CompareSummary, ScanError> {
        info!("Comparing ACLs below {}", root.display());

        let baseline = self.services.acl_models(root)?;
        if !self.is_cancelled() && self.allows_level(1) {
            let children = self.services.lister.get_directories(root)?;
            self.compare_children(root, children, &baseline, 1);
        }

        let summary = self.tally.summary(self.is_cancelled());
        info!(
            "ACL comparison of {} {}: {} folders, {} mismatches, {} errors in {:.2?}",
            root.display(),
            if summary.cancelled { "cancelled" } else { "finished" },
            summary.folders_compared,
            summary.mismatches,
            summary.errors,
            summary.duration,
        );
        Ok(summary)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    /// The trustee is read on every check so scan-level changes take
    /// effect mid-run.
    fn allows_level(&self, level: u32) -> bool {
        self.services
            .trustee
            .current_report_trustee()
            .allows_level(level)
    }

    fn emit(&mut self, item: CompareProgress) {
        if self.is_cancelled() {
            return;
        }
        self.tally.record(&item);
        (self.on_progress)(item);
    }

    fn walk(&mut self, directory: &Path, baseline: &[AclModel], level: u32) {
        if self.is_cancelled() || !self.allows_level(level) {
            return;
        }

        match self.services.lister.get_directories(directory) {
            Ok(children) => self.compare_children(directory, children, baseline, level),
            Err(e) => {
                warn!("Cannot list {}: {e}", directory.display());
                self.emit(CompareProgress::Error(AclComparisonError::from_error(
                    directory, e,
                )));
            }
        }
    }

    fn compare_children(
        &mut self,
        parent: &Path,
        children: Vec<FolderEntry>,
        baseline: &[AclModel],
        level: u32,
    ) {
        for child in children {
            if self.is_cancelled() {
                return;
            }

            if self.services.lister.is_access_denied(&child) {
                debug!("Access denied: {}", child.full_path.display());
                self.emit(CompareProgress::Error(AclComparisonError::access_denied(
                    &child.full_path,
                )));
                continue;
            }

            let acl = match self.services.acl_models(&child.full_path) {
                Ok(acl) => acl,
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
            if !is_acl_equal(baseline, &acl) {
                self.emit(CompareProgress::Mismatch(AclComparisonResult::mismatch(
                    &child.full_path,
                    parent,
                    &acl,
                )));
            }

            self.walk(&child.full_path, &acl, level + 1);
        }
    }
}
