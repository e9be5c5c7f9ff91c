/// Report trustee configuration and its live, shareable source.
use super::TrusteeSource;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Scan configuration supplied by the configuration collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTrustee {
    /// Deepest level below the scan root that is processed. `0` = unlimited.
    #[serde(rename = "ScanLevel", alias = "scan_level", default)]
    pub scan_level: u32,
}

impl ReportTrustee {
    pub fn with_scan_level(scan_level: u32) -> Self {
        Self { scan_level }
    }

    /// `true` if a directory at `level` (scan root = 1) may be processed.
    pub fn allows_level(&self, level: u32) -> bool {
        self.scan_level == 0 || level <= self.scan_level
    }
}

/// A fixed trustee acts as its own source.
impl TrusteeSource for ReportTrustee {
    fn current_report_trustee(&self) -> ReportTrustee {
        *self
    }
}

/// Trustee shared between the configuration side and running scans.
///
/// Updates are visible to a scan at its next depth check.
#[derive(Debug, Clone, Default)]
pub struct SharedTrustee {
    inner: Arc<RwLock<ReportTrustee>>,
}

impl SharedTrustee {
    pub fn new(trustee: ReportTrustee) -> Self {
        Self {
            inner: Arc::new(RwLock::new(trustee)),
        }
    }

    pub fn set_scan_level(&self, scan_level: u32) {
        self.inner.write().scan_level = scan_level;
    }

    pub fn replace(&self, trustee: ReportTrustee) {
        *self.inner.write() = trustee;
    }
}

impl TrusteeSource for SharedTrustee {
    fn current_report_trustee(&self) -> ReportTrustee {
        *self.inner.read()
    }
}
