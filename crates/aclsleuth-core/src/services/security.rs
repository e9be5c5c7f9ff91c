/// Native ACL provider and the default entry-to-model mapping.
use super::{AclModelBuilder, AclViewProvider};
use crate::error::ScanError;
use crate::model::{AccessRule, AclModel};
use crate::platform::SecurityReader;
use std::path::Path;

/// Reads ACLs and owners from the local security subsystem.
#[derive(Default)]
pub struct NativeAclProvider {
    reader: SecurityReader,
}

impl NativeAclProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AclViewProvider for NativeAclProvider {
    fn get_acl_view(&self, path: &Path) -> Result<Vec<AccessRule>, ScanError> {
        self.reader.access_rules(path)
    }

    fn get_owner(&self, path: &Path) -> Result<String, ScanError> {
        self.reader.owner(path)
    }
}

/// One-to-one mapping of [`AccessRule`] into [`AclModel`]; account names
/// are taken as resolved by the provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAclModelBuilder;

impl AclModelBuilder for DefaultAclModelBuilder {
    fn build(&self, rule: &AccessRule) -> Option<AclModel> {
        AclModel::from_rule(rule)
    }
}
