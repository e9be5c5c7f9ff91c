/// Folder report builder.
///
/// Walks a folder tree depth-first in pre-order (a folder is yielded before
/// its children) and produces one [`FolderReport`] per visited folder. The
/// walk is driven by the consumer: past the root listing, nothing is read
/// until the next report is requested, and the pending work is an explicit
/// stack rather than recursion.
///
/// # Failure handling
///
/// - Listing the scan root is the only fatal step;
///   [`FolderReportBuilder::build_reports`] returns it as `Err`.
/// - Every other failure becomes a report with a non-`Ok` status and the
///   walk continues with the next sibling. A failed folder is never
///   descended into.
/// - A failed owner lookup leaves `owner` empty; the report stays `Ok`.
use crate::error::ScanError;
use crate::model::{FileStats, FolderEntry, FolderEnumeratorOptions, FolderReport};
use crate::services::ScanServices;
use std::iter::FusedIterator;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Produces folder report streams against a set of collaborators.
#[derive(Debug, Clone)]
pub struct FolderReportBuilder {
    services: ScanServices,
}

impl FolderReportBuilder {
    pub fn new(services: ScanServices) -> Self {
        Self { services }
    }

    /// Start a report stream rooted at `root`.
    ///
    /// `on_tick` is called once for every processed folder. `cancel` is
    /// polled before each folder; once it returns `true` the stream ends.
    /// Reports already handed out stay valid.
    pub fn build_reports<T, C>(
        &self,
        root: impl AsRef<Path>,
        options: FolderEnumeratorOptions,
        on_tick: T,
        cancel: C,
    ) -> Result<FolderReports<T, C>, ScanError>
    where
        T: FnMut(),
        C: Fn() -> bool,
    {
        let root = root.as_ref();
        if root.as_os_str().to_string_lossy().trim().is_empty() {
            return Err(ScanError::InvalidArgument("root path must not be blank"));
        }

        debug!("Building folder reports for {}", root.display());
        let root_entry = FolderEntry::new(root, true);

        let pending_root = options.include_current_folder.then(|| root_entry.clone());

        let children = self.services.lister.get_directories(root)?;

        let mut reports = FolderReports {
            services: self.services.clone(),
            options,
            on_tick,
            cancel,
            pending_root,
            stack: Vec::new(),
            finished: false,
            started: Instant::now(),
            reported: 0,
            failed: 0,
        };
        reports.push_children(children, 1);
        Ok(reports)
    }
}

/// A folder waiting to be reported, with its depth below the root.
struct Pending {
    entry: FolderEntry,
    depth: u32,
}

/// Lazy, finite, non-restartable stream of folder reports.
pub struct FolderReports<T, C> {
    services: ScanServices,
    options: FolderEnumeratorOptions,
    on_tick: T,
    cancel: C,
    /// The root itself, reported on the first `next()` when requested.
    pending_root: Option<FolderEntry>,
    /// Top of the stack is the next folder in pre-order.
    stack: Vec<Pending>,
    finished: bool,
    started: Instant,
    reported: u64,
    failed: u64,
}

impl<T, C> FolderReports<T, C>
where
    T: FnMut(),
    C: Fn() -> bool,
{
    fn push_children(&mut self, children: Vec<FolderEntry>, depth: u32) {
        let include_hidden = self.options.include_hidden;
        // Reversed so the first listed child is popped first.
        self.stack.extend(
            children
                .into_iter()
                .filter(|child| include_hidden || !child.is_hidden)
                .rev()
                .map(|entry| Pending { entry, depth }),
        );
    }

    /// Children of a folder at `depth` are listed only within the scan level.
    fn lists_children_at(&self, depth: u32) -> bool {
        self.options.include_subtree
            && (self.options.scan_level == 0 || depth < self.options.scan_level)
    }

    /// Report one folder and queue its children. `None` when the folder is
    /// excluded by the owner filter.
    fn process(&mut self, pending: Pending) -> Option<FolderReport> {
        let Pending { entry, depth } = pending;

        if self.services.lister.is_access_denied(&entry) {
            debug!("Access denied: {}", entry.full_path.display());
            return Some(FolderReport::failed(
                &entry,
                ScanError::AccessDenied {
                    path: entry.display_path(),
                },
            ));
        }

        let lists_children = entry.has_sub_folders && self.lists_children_at(depth);
        let result = report_totals(&self.services, &self.options, &entry, &self.cancel).and_then(|report| {
            let children = if lists_children {
                self.services.lister.get_directories(&entry.full_path)?
            } else {
                Vec::new()
            };
            Ok((report, children))
        });

        match result {
            Ok((report, children)) => {
                self.push_children(children, depth + 1);
                if self.options.owner_matches(report.owner.as_deref()) {
                    Some(report)
                } else {
                    None
                }
            }
            Err(e) => {
                debug!("Folder {} failed: {e}", entry.full_path.display());
                Some(FolderReport::failed(&entry, e))
            }
        }
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.stack.clear();
        info!(
            "Folder report finished: {} reported, {} failed in {:?}",
            self.reported,
            self.failed,
            self.started.elapsed()
        );
    }

    fn emit(&mut self, report: FolderReport) -> Option<FolderReport> {
        self.reported += 1;
        if !report.is_ok() {
            self.failed += 1;
        }
        Some(report)
    }
}

impl<T, C> Iterator for FolderReports<T, C>
where
    T: FnMut(),
    C: Fn() -> bool,
{
    type Item = FolderReport;

    fn next(&mut self) -> Option<FolderReport> {
        loop {
            if self.finished {
                return None;
            }
            if (self.cancel)() {
                debug!("Folder report cancelled");
                self.finish();
                return None;
            }

            let report = if let Some(root) = self.pending_root.take() {
                let report = report_totals(&self.services, &self.options, &root, &self.cancel)
                    .unwrap_or_else(|e| FolderReport::failed(&root, e));
                Some(report)
            } else {
                let Some(pending) = self.stack.pop() else {
                    self.finish();
                    return None;
                };
                self.process(pending)
            };
            (self.on_tick)();

            // Subtree totals gathered while a cancel arrived are incomplete.
            if self.options.include_file_count_for_subtree && (self.cancel)() {
                debug!("Folder report cancelled");
                self.finish();
                return None;
            }
            if let Some(report) = report {
                return self.emit(report);
            }
        }
    }
}

impl<T, C> FusedIterator for FolderReports<T, C>
where
    T: FnMut(),
    C: Fn() -> bool,
{
}

/// Counts, subtree totals and owner of one folder, as requested by
/// `options`.
fn report_totals(
    services: &ScanServices,
    options: &FolderEnumeratorOptions,
    entry: &FolderEntry,
    cancel: &dyn Fn() -> bool,
) -> Result<FolderReport, ScanError> {
    let mut report = FolderReport::ok(entry);

    if options.include_file_count {
        report = report.with_stats(services.lister.file_stats(&entry.full_path)?);
    }
    if options.include_file_count_for_subtree {
        report = report.with_subtree_stats(subtree_stats(services, &entry.full_path, cancel)?);
    }
    if options.include_owner {
        report.owner = match services.acl_view.get_owner(&entry.full_path) {
            Ok(owner) => Some(owner),
            Err(e) => {
                debug!("Owner lookup failed for {}: {e}", entry.full_path.display());
                None
            }
        };
    }

    Ok(report)
}

/// File totals of `root` and everything below it.
///
/// Failures on `root` itself propagate; unreadable descendants are left
/// out of the totals. `cancel` is polled before each descendant; the
/// partial totals of a cancelled walk are never reported.
fn subtree_stats(
    services: &ScanServices,
    root: &Path,
    cancel: &dyn Fn() -> bool,
) -> Result<FileStats, ScanError> {
    let mut totals = services.lister.file_stats(root)?;
    if cancel() {
        return Ok(totals);
    }
    let mut stack = services.lister.get_directories(root)?;

    while let Some(folder) = stack.pop() {
        if cancel() {
            break;
        }
        if services.lister.is_access_denied(&folder) {
            continue;
        }
        match services.lister.file_stats(&folder.full_path) {
            Ok(stats) => totals += stats,
            Err(e) => {
                debug!("Skipping {} in subtree totals: {e}", folder.full_path.display());
                continue;
            }
        }
        if folder.has_sub_folders {
            match services.lister.get_directories(&folder.full_path) {
                Ok(children) => stack.extend(children),
                Err(e) => debug!("Skipping children of {}: {e}", folder.full_path.display()),
            }
        }
    }

    Ok(totals)
}
