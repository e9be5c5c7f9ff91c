/// In-memory folder tree with per-folder ACLs for the comparison tests.
use crate::error::ScanError;
use crate::model::acl::{ACCESS_ALLOWED_ACE_TYPE, CONTAINER_INHERIT_ACE, OBJECT_INHERIT_ACE};
use crate::model::{AccessRule, AccountType, FileStats, FolderEntry};
use crate::services::{
    AclViewProvider, DefaultAclModelBuilder, DirectoryLister, ScanServices, TrusteeSource,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Default)]
pub struct AclTree {
    children: HashMap<PathBuf, Vec<FolderEntry>>,
    acls: HashMap<PathBuf, Vec<AccessRule>>,
    failing_acl: HashSet<PathBuf>,
    failing_list: HashSet<PathBuf>,
    pub acl_fetches: Mutex<Vec<PathBuf>>,
    pub denied_checks: Mutex<Vec<PathBuf>>,
    pub listed: Mutex<Vec<PathBuf>>,
}

/// Allow entry granting `mask` to `account`, inherited by files and folders.
pub fn allow(account: &str, mask: u32) -> AccessRule {
    AccessRule {
        account: account.into(),
        account_type: AccountType::User,
        ace_type: ACCESS_ALLOWED_ACE_TYPE,
        access_mask: mask,
        ace_flags: CONTAINER_INHERIT_ACE | OBJECT_INHERIT_ACE,
    }
}

impl AclTree {
    pub fn root(path: &str, acl: Vec<AccessRule>) -> Self {
        let mut tree = Self::default();
        tree.acls.insert(PathBuf::from(path), acl);
        tree
    }

    /// Add `parent/name` with the given ACL; returns the child's path.
    pub fn dir(&mut self, parent: &str, name: &str, acl: Vec<AccessRule>) -> String {
        let path = format!("{parent}/{name}");
        self.children
            .entry(PathBuf::from(parent))
            .or_default()
            .push(FolderEntry::new(&path, false));
        self.acls.insert(PathBuf::from(&path), acl);
        path
    }

    pub fn denied_dir(&mut self, parent: &str, name: &str) -> String {
        let path = format!("{parent}/{name}");
        self.children
            .entry(PathBuf::from(parent))
            .or_default()
            .push(FolderEntry::new(&path, false).denied());
        path
    }

    pub fn fail_acl(&mut self, path: &str) {
        self.failing_acl.insert(PathBuf::from(path));
    }

    pub fn fail_listing(&mut self, path: &str) {
        self.failing_list.insert(PathBuf::from(path));
    }

    pub fn fetched(&self) -> Vec<PathBuf> {
        self.acl_fetches.lock().clone()
    }
}

pub fn services(tree: &Arc<AclTree>, trustee: Arc<dyn TrusteeSource>) -> ScanServices {
    ScanServices {
        lister: tree.clone(),
        acl_view: tree.clone(),
        model_builder: Arc::new(DefaultAclModelBuilder),
        trustee,
    }
}

impl DirectoryLister for AclTree {
    fn get_directories(&self, path: &Path) -> Result<Vec<FolderEntry>, ScanError> {
        self.listed.lock().push(path.to_path_buf());
        if self.failing_list.contains(path) {
            return Err(ScanError::Io {
                path: path.display().to_string(),
                source: std::io::Error::other("network path vanished"),
            });
        }
        Ok(self.children.get(path).cloned().unwrap_or_default())
    }

    fn is_access_denied(&self, entry: &FolderEntry) -> bool {
        self.denied_checks.lock().push(entry.full_path.clone());
        entry.access_denied
    }

    fn has_sub_folders(&self, path: &Path) -> Result<bool, ScanError> {
        Ok(self.children.get(path).is_some_and(|c| !c.is_empty()))
    }

    fn file_stats(&self, _path: &Path) -> Result<FileStats, ScanError> {
        Ok(FileStats::default())
    }
}

impl AclViewProvider for AclTree {
    fn get_acl_view(&self, path: &Path) -> Result<Vec<AccessRule>, ScanError> {
        self.acl_fetches.lock().push(path.to_path_buf());
        if self.failing_acl.contains(path) {
            return Err(ScanError::PathTooLong {
                path: path.display().to_string(),
            });
        }
        Ok(self.acls.get(path).cloned().unwrap_or_default())
    }

    fn get_owner(&self, _path: &Path) -> Result<String, ScanError> {
        Ok("BUILTIN\\Administrators".into())
    }
}

/// Three-level tree below `test` in which every folder carries its own
/// distinct ACL:
///
/// ```text
/// test/first/one/{01,02}   test/second/one/{01,02}
/// test/first/two/01        test/second/two/01
/// ```
///
/// Comparing it yields 2, 6, or 12 mismatches for scan levels 1, 2, and 0.
pub fn three_level_tree() -> AclTree {
    let mut mask = 0x1_0000u32;
    let mut distinct = || {
        mask += 1;
        vec![allow("CORP\\auditor", mask)]
    };

    let mut tree = AclTree::root("test", distinct());
    for top in ["first", "second"] {
        let top = tree.dir("test", top, distinct());
        let one = tree.dir(&top, "one", distinct());
        let two = tree.dir(&top, "two", distinct());
        tree.dir(&one, "01", distinct());
        tree.dir(&one, "02", distinct());
        tree.dir(&two, "01", distinct());
    }
    tree
}
