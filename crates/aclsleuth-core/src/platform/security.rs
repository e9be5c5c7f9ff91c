/// Native security reading: a folder's DACL entries and owner.
///
/// On Windows the security descriptor is fetched with
/// `GetNamedSecurityInfoW`; every allow/deny ACE is returned with its SID
/// resolved through `LookupAccountSidW` (falling back to the SID string).
/// Resolved SIDs are cached per reader because domain lookups are slow.
///
/// Elsewhere the POSIX mode bits are presented as three entries (owner,
/// group, everyone) so that the comparison engine behaves the same way on
/// any host.
pub use imp::SecurityReader;

#[cfg(windows)]
mod imp {
    use crate::error::ScanError;
    use crate::model::{AccessRule, AccountType};
    use crate::model::acl::{ACCESS_ALLOWED_ACE_TYPE, ACCESS_DENIED_ACE_TYPE};
    use crate::platform::long_path::normalize_long_path;
    use compact_str::CompactString;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::path::Path;
    use windows::core::{PCWSTR, PWSTR};
    use windows::Win32::Foundation::{
        LocalFree, ERROR_ACCESS_DENIED, ERROR_FILENAME_EXCED_RANGE, ERROR_SUCCESS, HLOCAL,
        WIN32_ERROR,
    };
    use windows::Win32::Security::Authorization::{
        ConvertSidToStringSidW, GetNamedSecurityInfoW, SE_FILE_OBJECT,
    };
    use windows::Win32::Security::{
        AclSizeInformation, GetAce, GetAclInformation, GetLengthSid, LookupAccountSidW,
        SidTypeAlias, SidTypeComputer, SidTypeGroup, SidTypeUser, SidTypeWellKnownGroup,
        ACCESS_ALLOWED_ACE, ACE_HEADER, ACL, ACL_SIZE_INFORMATION, DACL_SECURITY_INFORMATION,
        OBJECT_SECURITY_INFORMATION, OWNER_SECURITY_INFORMATION, PSECURITY_DESCRIPTOR, PSID,
        SID_NAME_USE,
    };

    /// Frees a `LocalAlloc`-owned buffer on drop.
    struct LocalBuffer(*mut core::ffi::c_void);

    impl Drop for LocalBuffer {
        fn drop(&mut self) {
            if !self.0.is_null() {
                unsafe {
                    let _ = LocalFree(HLOCAL(self.0));
                }
            }
        }
    }

    /// Reads DACLs and owners, caching SID → account resolution.
    #[derive(Default)]
    pub struct SecurityReader {
        accounts: Mutex<HashMap<Vec<u8>, (CompactString, AccountType)>>,
    }

    impl SecurityReader {
        pub fn new() -> Self {
            Self::default()
        }

        /// All allow/deny entries of the folder's DACL, in stored order.
        pub fn access_rules(&self, path: &Path) -> Result<Vec<AccessRule>, ScanError> {
            let display = path.to_string_lossy().into_owned();
            let mut dacl: *mut ACL = std::ptr::null_mut();
            let descriptor = self.descriptor(
                &display,
                DACL_SECURITY_INFORMATION,
                None,
                Some(&mut dacl),
            )?;

            // A null DACL grants everyone full access and has no entries.
            if dacl.is_null() {
                drop(descriptor);
                return Ok(Vec::new());
            }

            let mut info = ACL_SIZE_INFORMATION::default();
            unsafe {
                GetAclInformation(
                    dacl,
                    &mut info as *mut ACL_SIZE_INFORMATION as *mut core::ffi::c_void,
                    std::mem::size_of::<ACL_SIZE_INFORMATION>() as u32,
                    AclSizeInformation,
                )
            }
            .map_err(|e| ScanError::Io {
                path: display.clone(),
                source: std::io::Error::other(e.message().to_string()),
            })?;

            let mut rules = Vec::with_capacity(info.AceCount as usize);
            for index in 0..info.AceCount {
                let mut ace: *mut core::ffi::c_void = std::ptr::null_mut();
                if unsafe { GetAce(dacl, index, &mut ace) }.is_err() || ace.is_null() {
                    continue;
                }

                // SAFETY: GetAce returned a pointer into the DACL, which lives
                // as long as `descriptor`. Every ACE starts with ACE_HEADER.
                let header = unsafe { &*(ace as *const ACE_HEADER) };
                if header.AceType != ACCESS_ALLOWED_ACE_TYPE && header.AceType != ACCESS_DENIED_ACE_TYPE
                {
                    continue;
                }

                // SAFETY: allowed and denied ACEs share the ACCESS_ALLOWED_ACE
                // layout; the SID starts at `SidStart`.
                let body = unsafe { &*(ace as *const ACCESS_ALLOWED_ACE) };
                let sid = PSID(&body.SidStart as *const u32 as *mut core::ffi::c_void);
                let (account, account_type) = self.resolve(sid);

                rules.push(AccessRule {
                    account,
                    account_type,
                    ace_type: header.AceType,
                    access_mask: body.Mask,
                    ace_flags: header.AceFlags,
                });
            }

            drop(descriptor);
            Ok(rules)
        }

        /// Resolved owner account of the folder.
        pub fn owner(&self, path: &Path) -> Result<String, ScanError> {
            let display = path.to_string_lossy().into_owned();
            let mut owner = PSID::default();
            let descriptor =
                self.descriptor(&display, OWNER_SECURITY_INFORMATION, Some(&mut owner), None)?;
            if owner.0.is_null() {
                return Err(ScanError::Service(format!("{display} has no owner")));
            }
            let (account, _) = self.resolve(owner);
            drop(descriptor);
            Ok(account.to_string())
        }

        fn descriptor(
            &self,
            path: &str,
            what: OBJECT_SECURITY_INFORMATION,
            owner: Option<&mut PSID>,
            dacl: Option<&mut *mut ACL>,
        ) -> Result<LocalBuffer, ScanError> {
            let native = normalize_long_path(path)?;
            let wide: Vec<u16> = native.encode_utf16().chain(std::iter::once(0)).collect();
            let mut descriptor = PSECURITY_DESCRIPTOR::default();

            let status: WIN32_ERROR = unsafe {
                GetNamedSecurityInfoW(
                    PCWSTR(wide.as_ptr()),
                    SE_FILE_OBJECT,
                    what,
                    owner.map(|o| o as *mut PSID),
                    None,
                    dacl.map(|d| d as *mut *mut ACL),
                    None,
                    &mut descriptor,
                )
            };

            if status == ERROR_SUCCESS {
                return Ok(LocalBuffer(descriptor.0));
            }
            let path = path.to_string();
            Err(if status == ERROR_ACCESS_DENIED {
                ScanError::AccessDenied { path }
            } else if status == ERROR_FILENAME_EXCED_RANGE {
                ScanError::PathTooLong { path }
            } else {
                ScanError::Io {
                    path,
                    source: std::io::Error::from_raw_os_error(status.0 as i32),
                }
            })
        }

        fn resolve(&self, sid: PSID) -> (CompactString, AccountType) {
            let len = unsafe { GetLengthSid(sid) } as usize;
            // SAFETY: `sid` points at a valid SID of `len` bytes.
            let key = unsafe { std::slice::from_raw_parts(sid.0 as *const u8, len) }.to_vec();

            if let Some(hit) = self.accounts.lock().get(&key) {
                return hit.clone();
            }
            let resolved = lookup_account(sid);
            self.accounts.lock().insert(key, resolved.clone());
            resolved
        }
    }

    fn lookup_account(sid: PSID) -> (CompactString, AccountType) {
        let mut name = [0u16; 256];
        let mut domain = [0u16; 256];
        let mut name_len = name.len() as u32;
        let mut domain_len = domain.len() as u32;
        let mut sid_use = SID_NAME_USE::default();

        let found = unsafe {
            LookupAccountSidW(
                PCWSTR::null(),
                sid,
                PWSTR(name.as_mut_ptr()),
                &mut name_len,
                PWSTR(domain.as_mut_ptr()),
                &mut domain_len,
                &mut sid_use,
            )
        }
        .is_ok();

        if !found {
            return (CompactString::new(sid_string(sid)), AccountType::Unknown);
        }

        let name = String::from_utf16_lossy(&name[..name_len as usize]);
        let domain = String::from_utf16_lossy(&domain[..domain_len as usize]);
        let account = if domain.is_empty() {
            name
        } else {
            format!("{domain}\\{name}")
        };

        let account_type = match sid_use {
            u if u == SidTypeUser => AccountType::User,
            u if u == SidTypeGroup => AccountType::Group,
            u if u == SidTypeAlias => AccountType::Alias,
            u if u == SidTypeWellKnownGroup => AccountType::WellKnownGroup,
            u if u == SidTypeComputer => AccountType::Computer,
            _ => AccountType::Unknown,
        };
        (CompactString::new(account), account_type)
    }

    fn sid_string(sid: PSID) -> String {
        let mut text = PWSTR::null();
        if unsafe { ConvertSidToStringSidW(sid, &mut text) }.is_err() {
            return "<unknown SID>".to_string();
        }
        let _guard = LocalBuffer(text.0 as *mut core::ffi::c_void);
        unsafe { text.to_string() }.unwrap_or_else(|_| "<unknown SID>".to_string())
    }
}

#[cfg(not(windows))]
mod imp {
    use crate::error::ScanError;
    use crate::model::acl::ACCESS_ALLOWED_ACE_TYPE;
    use crate::model::{AccessRule, AccountType, FileSystemRights};
    use compact_str::{format_compact, CompactString};
    use std::os::unix::fs::MetadataExt;
    use std::path::Path;

    /// Presents POSIX permission bits as allow entries.
    #[derive(Debug, Default)]
    pub struct SecurityReader;

    impl SecurityReader {
        pub fn new() -> Self {
            Self
        }

        /// Owner, group and everyone entries derived from the mode bits.
        pub fn access_rules(&self, path: &Path) -> Result<Vec<AccessRule>, ScanError> {
            let display = path.to_string_lossy();
            let meta = std::fs::metadata(path).map_err(|e| ScanError::from_io(&display, e))?;
            let mode = meta.mode();

            Ok(vec![
                rule(
                    format_compact!("uid:{}", meta.uid()),
                    AccountType::User,
                    (mode >> 6) & 0o7,
                ),
                rule(
                    format_compact!("gid:{}", meta.gid()),
                    AccountType::Group,
                    (mode >> 3) & 0o7,
                ),
                rule(
                    CompactString::new("Everyone"),
                    AccountType::WellKnownGroup,
                    mode & 0o7,
                ),
            ])
        }

        /// Numeric owner of the folder.
        pub fn owner(&self, path: &Path) -> Result<String, ScanError> {
            let display = path.to_string_lossy();
            let meta = std::fs::metadata(path).map_err(|e| ScanError::from_io(&display, e))?;
            Ok(format!("uid:{}", meta.uid()))
        }
    }

    fn rule(account: CompactString, account_type: AccountType, bits: u32) -> AccessRule {
        AccessRule {
            account,
            account_type,
            ace_type: ACCESS_ALLOWED_ACE_TYPE,
            access_mask: rights_from_bits(bits).bits(),
            ace_flags: 0,
        }
    }

    /// rwx on a directory: list, create/delete entries, traverse.
    pub(super) fn rights_from_bits(bits: u32) -> FileSystemRights {
        let mut rights = FileSystemRights::empty();
        if bits & 0o4 != 0 {
            rights |= FileSystemRights::READ;
        }
        if bits & 0o2 != 0 {
            rights |= FileSystemRights::WRITE | FileSystemRights::DELETE_SUBDIRECTORIES_AND_FILES;
        }
        if bits & 0o1 != 0 {
            rights |= FileSystemRights::EXECUTE_FILE;
        }
        rights
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        #[test]
        fn mode_bits_become_three_entries() {
            let tmp = TempDir::new().unwrap();
            let dir = tmp.path().join("shared");
            fs::create_dir(&dir).unwrap();
            fs::set_permissions(&dir, fs::Permissions::from_mode(0o750)).unwrap();

            let rules = SecurityReader::new().access_rules(&dir).unwrap();
            assert_eq!(rules.len(), 3);
            assert_eq!(rules[2].account, "Everyone");
            assert_eq!(rules[2].access_mask, 0);
            assert!(FileSystemRights(rules[0].access_mask).contains(FileSystemRights::READ));
            assert!(!FileSystemRights(rules[1].access_mask).contains(FileSystemRights::WRITE));
        }

        #[test]
        fn owner_is_numeric_uid() {
            let tmp = TempDir::new().unwrap();
            let owner = SecurityReader::new().owner(tmp.path()).unwrap();
            assert!(owner.starts_with("uid:"));
        }

        #[test]
        fn missing_folder_is_io_error() {
            let tmp = TempDir::new().unwrap();
            let err = SecurityReader::new()
                .access_rules(&tmp.path().join("gone"))
                .unwrap_err();
            assert!(err.is_io());
        }

        #[test]
        fn write_bit_includes_delete_children() {
            assert!(rights_from_bits(0o2).contains(FileSystemRights::DELETE_SUBDIRECTORIES_AND_FILES));
            assert!(rights_from_bits(0).is_empty());
        }
    }
}
