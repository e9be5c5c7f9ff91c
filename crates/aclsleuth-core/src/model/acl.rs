/// ACL model and order-independent ACL equality.
///
/// A native access-control entry ([`AccessRule`]) is mapped one-to-one into
/// an [`AclModel`]. Two folder ACLs are considered equal when they hold the
/// same multiset of `(account, type, rights, inheritance, propagation)`
/// keys; entry order carries no meaning.
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

// Raw ACE header values as stored in a security descriptor.
pub const ACCESS_ALLOWED_ACE_TYPE: u8 = 0x0;
pub const ACCESS_DENIED_ACE_TYPE: u8 = 0x1;

pub const OBJECT_INHERIT_ACE: u8 = 0x01;
pub const CONTAINER_INHERIT_ACE: u8 = 0x02;
pub const NO_PROPAGATE_INHERIT_ACE: u8 = 0x04;
pub const INHERIT_ONLY_ACE: u8 = 0x08;
pub const INHERITED_ACE: u8 = 0x10;

/// Kind of security principal an entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    User,
    Group,
    Alias,
    WellKnownGroup,
    Computer,
    Unknown,
}

/// Whether an entry grants or denies its rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AceType {
    Allow,
    Deny,
}

impl AceType {
    /// Map a raw ACE header type. Only allow/deny ACEs take part in folder
    /// ACL comparison; anything else yields `None`.
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            ACCESS_ALLOWED_ACE_TYPE => Some(Self::Allow),
            ACCESS_DENIED_ACE_TYPE => Some(Self::Deny),
            _ => None,
        }
    }
}

macro_rules! flag_type {
    ($(#[$meta:meta])* $name:ident($repr:ty) { $($(#[$cmeta:meta])* $flag:ident = $value:expr,)* }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub $repr);

        impl $name {
            $($(#[$cmeta])* pub const $flag: Self = Self($value);)*

            pub const fn empty() -> Self {
                Self(0)
            }

            pub const fn bits(self) -> $repr {
                self.0
            }

            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut first = true;
                write!(f, "{}(", stringify!($name))?;
                $(
                    if $value != 0 && self.0 & $value == $value {
                        if !first {
                            f.write_str(" | ")?;
                        }
                        f.write_str(stringify!($flag))?;
                        first = false;
                    }
                )*
                if first {
                    write!(f, "{:#x}", self.0)?;
                }
                f.write_str(")")
            }
        }
    };
}

flag_type! {
    /// File-system access mask.
    FileSystemRights(u32) {
        READ_DATA = 0x0000_0001,
        WRITE_DATA = 0x0000_0002,
        APPEND_DATA = 0x0000_0004,
        READ_EXTENDED_ATTRIBUTES = 0x0000_0008,
        WRITE_EXTENDED_ATTRIBUTES = 0x0000_0010,
        EXECUTE_FILE = 0x0000_0020,
        DELETE_SUBDIRECTORIES_AND_FILES = 0x0000_0040,
        READ_ATTRIBUTES = 0x0000_0080,
        WRITE_ATTRIBUTES = 0x0000_0100,
        DELETE = 0x0001_0000,
        READ_PERMISSIONS = 0x0002_0000,
        CHANGE_PERMISSIONS = 0x0004_0000,
        TAKE_OWNERSHIP = 0x0008_0000,
        SYNCHRONIZE = 0x0010_0000,
        /// Standard "Read" permission set.
        READ = 0x0002_0089,
        /// Standard "Write" permission set.
        WRITE = 0x0000_0116,
        /// Standard "Read & execute" permission set.
        READ_AND_EXECUTE = 0x0002_00A9,
        /// Standard "Modify" permission set.
        MODIFY = 0x0003_01BF,
        FULL_CONTROL = 0x001F_01FF,
    }
}

flag_type! {
    /// Which child objects inherit an entry.
    InheritanceFlags(u8) {
        CONTAINER_INHERIT = 0x1,
        OBJECT_INHERIT = 0x2,
    }
}

flag_type! {
    /// How inheritance propagates below the immediate children.
    PropagationFlags(u8) {
        NO_PROPAGATE_INHERIT = 0x1,
        INHERIT_ONLY = 0x2,
    }
}

/// One allow/deny entry as read from a folder's DACL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    /// Resolved `DOMAIN\name`, or the SID string when it cannot be resolved.
    pub account: CompactString,
    pub account_type: AccountType,
    /// Raw ACE header type.
    pub ace_type: u8,
    pub access_mask: u32,
    /// Raw ACE header flags.
    pub ace_flags: u8,
}

/// Comparable model of a single ACL entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclModel {
    pub account: CompactString,
    pub account_type: AccountType,
    pub ace_type: AceType,
    pub rights: FileSystemRights,
    pub inheritance_flags: InheritanceFlags,
    pub propagation_flags: PropagationFlags,
    /// Informational only; does not take part in ACL equality.
    pub is_inherited: bool,
}

impl AclModel {
    /// Map a native entry into the model. Returns `None` for ACE types that
    /// are neither allow nor deny.
    pub fn from_rule(rule: &AccessRule) -> Option<Self> {
        let ace_type = AceType::from_raw(rule.ace_type)?;

        let mut inheritance_flags = InheritanceFlags::empty();
        if rule.ace_flags & CONTAINER_INHERIT_ACE != 0 {
            inheritance_flags |= InheritanceFlags::CONTAINER_INHERIT;
        }
        if rule.ace_flags & OBJECT_INHERIT_ACE != 0 {
            inheritance_flags |= InheritanceFlags::OBJECT_INHERIT;
        }

        let mut propagation_flags = PropagationFlags::empty();
        if rule.ace_flags & NO_PROPAGATE_INHERIT_ACE != 0 {
            propagation_flags |= PropagationFlags::NO_PROPAGATE_INHERIT;
        }
        if rule.ace_flags & INHERIT_ONLY_ACE != 0 {
            propagation_flags |= PropagationFlags::INHERIT_ONLY;
        }

        Some(Self {
            account: rule.account.clone(),
            account_type: rule.account_type,
            ace_type,
            rights: FileSystemRights(rule.access_mask),
            inheritance_flags,
            propagation_flags,
            is_inherited: rule.ace_flags & INHERITED_ACE != 0,
        })
    }

    fn key(&self) -> AclKey<'_> {
        AclKey {
            account: &self.account,
            ace_type: self.ace_type,
            rights: self.rights,
            inheritance_flags: self.inheritance_flags,
            propagation_flags: self.propagation_flags,
        }
    }
}

/// The part of an [`AclModel`] that decides equality.
#[derive(PartialEq, Eq, Hash)]
struct AclKey<'a> {
    account: &'a str,
    ace_type: AceType,
    rights: FileSystemRights,
    inheritance_flags: InheritanceFlags,
    propagation_flags: PropagationFlags,
}

/// Order-independent multiset equality of two ACLs.
///
/// Lists of different length are never equal, even when one is a repeat of
/// the other. Runs in linear time by counting keys in a hash map.
pub fn is_acl_equal(parent: &[AclModel], child: &[AclModel]) -> bool {
    if parent.len() != child.len() {
        return false;
    }

    let mut counts: HashMap<AclKey<'_>, isize> = HashMap::with_capacity(parent.len());
    for model in parent {
        *counts.entry(model.key()).or_insert(0) += 1;
    }

    for model in child {
        match counts.get_mut(&model.key()) {
            Some(n) if *n > 0 => *n -= 1,
            _ => return false,
        }
    }

    // Equal lengths and no key went below zero, so every count is zero.
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn model(account: &str, rights: FileSystemRights) -> AclModel {
        AclModel {
            account: CompactString::new(account),
            account_type: AccountType::User,
            ace_type: AceType::Allow,
            rights,
            inheritance_flags: InheritanceFlags::CONTAINER_INHERIT
                | InheritanceFlags::OBJECT_INHERIT,
            propagation_flags: PropagationFlags::empty(),
            is_inherited: false,
        }
    }

    fn numbered(range: std::ops::Range<usize>) -> Vec<AclModel> {
        range
            .map(|i| model(&format!("CORP\\user{i:05}"), FileSystemRights::MODIFY))
            .collect()
    }

    #[test]
    fn list_equals_itself() {
        let acl = vec![
            model("BUILTIN\\Administrators", FileSystemRights::FULL_CONTROL),
            model("CORP\\alice", FileSystemRights::READ_AND_EXECUTE),
        ];
        assert!(is_acl_equal(&acl, &acl));
    }

    #[test]
    fn order_does_not_matter() {
        let a = vec![
            model("CORP\\alice", FileSystemRights::READ),
            model("CORP\\bob", FileSystemRights::WRITE),
        ];
        let b = vec![a[1].clone(), a[0].clone()];
        assert!(is_acl_equal(&a, &b));
    }

    #[test]
    fn doubled_list_is_not_equal() {
        let a = numbered(0..10);
        let mut doubled = a.clone();
        doubled.extend(a.iter().cloned());
        assert!(!is_acl_equal(&a, &doubled));
    }

    #[test]
    fn multiplicity_matters_at_equal_length() {
        let a = vec![
            model("CORP\\alice", FileSystemRights::READ),
            model("CORP\\alice", FileSystemRights::READ),
        ];
        let b = vec![
            model("CORP\\alice", FileSystemRights::READ),
            model("CORP\\bob", FileSystemRights::READ),
        ];
        assert!(!is_acl_equal(&a, &b));
        assert!(!is_acl_equal(&b, &a));
    }

    #[test]
    fn differing_rights_or_type_are_not_equal() {
        let a = vec![model("CORP\\alice", FileSystemRights::READ)];
        let b = vec![model("CORP\\alice", FileSystemRights::MODIFY)];
        assert!(!is_acl_equal(&a, &b));

        let mut deny = a.clone();
        deny[0].ace_type = AceType::Deny;
        assert!(!is_acl_equal(&a, &deny));
    }

    #[test]
    fn account_type_and_inherited_flag_are_ignored() {
        let a = vec![model("CORP\\alice", FileSystemRights::READ)];
        let mut b = a.clone();
        b[0].account_type = AccountType::Group;
        b[0].is_inherited = true;
        assert!(is_acl_equal(&a, &b));
    }

    #[test]
    fn empty_lists_are_equal() {
        assert!(is_acl_equal(&[], &[]));
    }

    /// 1000 vs 1500 entries with 500 overlapping must be unequal and fast.
    #[test]
    fn large_disjoint_lists_compare_quickly() {
        let parent = numbered(0..1_000);
        let child = numbered(500..2_000);

        let start = Instant::now();
        assert!(!is_acl_equal(&parent, &child));
        assert!(
            start.elapsed().as_millis() < 1_000,
            "comparison took {:?}",
            start.elapsed()
        );
    }

    #[test]
    fn large_shuffled_lists_are_equal() {
        let parent = numbered(0..2_000);
        let mut child = parent.clone();
        child.reverse();
        assert!(is_acl_equal(&parent, &child));
    }

    #[test]
    fn rule_flags_map_to_model_flags() {
        let rule = AccessRule {
            account: CompactString::new("CORP\\auditors"),
            account_type: AccountType::Group,
            ace_type: ACCESS_DENIED_ACE_TYPE,
            access_mask: FileSystemRights::WRITE.bits(),
            ace_flags: CONTAINER_INHERIT_ACE | INHERIT_ONLY_ACE | INHERITED_ACE,
        };
        let m = AclModel::from_rule(&rule).unwrap();
        assert_eq!(m.ace_type, AceType::Deny);
        assert!(m
            .inheritance_flags
            .contains(InheritanceFlags::CONTAINER_INHERIT));
        assert!(!m.inheritance_flags.contains(InheritanceFlags::OBJECT_INHERIT));
        assert_eq!(m.propagation_flags, PropagationFlags::INHERIT_ONLY);
        assert!(m.is_inherited);
        assert!(m.rights.contains(FileSystemRights::WRITE_DATA));
    }

    #[test]
    fn audit_aces_are_not_modelled() {
        let rule = AccessRule {
            account: CompactString::new("Everyone"),
            account_type: AccountType::WellKnownGroup,
            ace_type: 0x2,
            access_mask: 0,
            ace_flags: 0,
        };
        assert!(AclModel::from_rule(&rule).is_none());
    }

    #[test]
    fn rights_debug_lists_named_flags() {
        let text = format!("{:?}", FileSystemRights::READ_DATA | FileSystemRights::DELETE);
        assert!(text.contains("READ_DATA"));
        assert!(text.contains("DELETE"));
    }
}
