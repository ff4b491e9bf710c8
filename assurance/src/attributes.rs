//! File attribute snapshots and content hashing
//!
//! Every attribute category is captured independently. A category that cannot be read on the
//! current platform (or for the given path) is `None`; read failures are logged and never
//! raised.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::config::HashAlgorithm;
use crate::error::{AssuranceError, Result};

/// Basic metadata available on every platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAttributes {
    pub is_directory: bool,
    pub is_other: bool,
    pub is_regular_file: bool,
    pub is_symbolic_link: bool,
    pub size: u64,
    pub creation: Option<DateTime<Utc>>,
    pub last_access: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// DOS/Windows attribute flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DosAttributes {
    pub archive: bool,
    pub hidden: bool,
    pub read_only: bool,
    pub system: bool,
}

/// POSIX owner, group and permission set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosixAttributes {
    pub owner: String,
    pub group: String,
    /// Canonical form, e.g. `rwxr-xr-x`
    pub permissions: String,
}

/// Snapshot of a file's metadata and, optionally, its content hash
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttributes {
    pub contents_hash: Option<String>,
    pub basic: Option<BasicAttributes>,
    pub dos: Option<DosAttributes>,
    pub posix: Option<PosixAttributes>,
    pub file_owner: Option<String>,
    pub acl_description: Option<String>,
    pub user_defined_attributes_hash: Option<String>,
}

impl FileAttributes {
    /// Capture the attributes of `path`. The content hash is only computed for regular files
    /// and only when a hasher is supplied.
    pub fn capture(path: &Path, hasher: Option<&ContentHasher>) -> Self {
        let basic = capture_basic(path);
        let posix = capture_posix(path);

        let contents_hash = match (hasher, &basic) {
            (Some(hasher), Some(basic)) if basic.is_regular_file => match hasher.hash_file(path) {
                Ok(hash) => Some(hash),
                Err(e) => {
                    tracing::warn!("{}", e);
                    None
                }
            },
            _ => None,
        };

        Self {
            contents_hash,
            file_owner: posix.as_ref().map(|p| p.owner.clone()),
            basic,
            dos: capture_dos(path),
            posix,
            acl_description: capture_acl(path),
            user_defined_attributes_hash: capture_user_defined(path),
        }
    }
}

/// Streaming content hasher
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher {
    algorithm: HashAlgorithm,
}

impl ContentHasher {
    const BUFFER_SIZE: usize = 64 * 1024;

    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Hash the contents of a file as a lower-case hex digest
    pub fn hash_file(&self, path: &Path) -> Result<String> {
        let mut file = fs::File::open(path).map_err(|e| {
            AssuranceError::hash_error(path, format!("Failed to open file: {}", e))
        })?;
        let mut buffer = vec![0u8; Self::BUFFER_SIZE];

        match self.algorithm {
            HashAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                loop {
                    let bytes_read = file.read(&mut buffer).map_err(|e| {
                        AssuranceError::hash_error(path, format!("Failed to read file: {}", e))
                    })?;
                    if bytes_read == 0 {
                        break;
                    }
                    hasher.update(&buffer[..bytes_read]);
                }
                Ok(format!("{:x}", hasher.finalize()))
            }
            HashAlgorithm::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                loop {
                    let bytes_read = file.read(&mut buffer).map_err(|e| {
                        AssuranceError::hash_error(path, format!("Failed to read file: {}", e))
                    })?;
                    if bytes_read == 0 {
                        break;
                    }
                    hasher.update(&buffer[..bytes_read]);
                }
                Ok(hasher.finalize().to_hex().to_string())
            }
        }
    }
}

fn capture_basic(path: &Path) -> Option<BasicAttributes> {
    // Dangling links still get a snapshot of the link itself
    let metadata = match fs::metadata(path).or_else(|_| fs::symlink_metadata(path)) {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!("Could not read basic attributes of {}: {}", path.display(), e);
            return None;
        }
    };
    let is_symbolic_link = fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false);

    let file_type = metadata.file_type();
    Some(BasicAttributes {
        is_directory: file_type.is_dir(),
        is_regular_file: file_type.is_file(),
        is_other: !file_type.is_dir() && !file_type.is_file() && !file_type.is_symlink(),
        is_symbolic_link,
        size: metadata.len(),
        creation: metadata.created().ok().map(DateTime::<Utc>::from),
        last_access: metadata.accessed().ok().map(DateTime::<Utc>::from),
        last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
    })
}

#[cfg(windows)]
fn capture_dos(path: &Path) -> Option<DosAttributes> {
    use std::os::windows::fs::MetadataExt;

    const READONLY: u32 = 0x1;
    const HIDDEN: u32 = 0x2;
    const SYSTEM: u32 = 0x4;
    const ARCHIVE: u32 = 0x20;

    match fs::metadata(path) {
        Ok(metadata) => {
            let bits = metadata.file_attributes();
            Some(DosAttributes {
                archive: bits & ARCHIVE != 0,
                hidden: bits & HIDDEN != 0,
                read_only: bits & READONLY != 0,
                system: bits & SYSTEM != 0,
            })
        }
        Err(e) => {
            debug!("Could not read DOS attributes of {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(not(windows))]
fn capture_dos(_path: &Path) -> Option<DosAttributes> {
    None
}

#[cfg(unix)]
fn capture_posix(path: &Path) -> Option<PosixAttributes> {
    use std::os::unix::fs::MetadataExt;
    use nix::unistd::{Gid, Group, Uid, User};

    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!("Could not read POSIX attributes of {}: {}", path.display(), e);
            return None;
        }
    };

    let owner = User::from_uid(Uid::from_raw(metadata.uid()))
        .ok()
        .flatten()
        .map(|user| user.name)
        .unwrap_or_else(|| metadata.uid().to_string());
    let group = Group::from_gid(Gid::from_raw(metadata.gid()))
        .ok()
        .flatten()
        .map(|group| group.name)
        .unwrap_or_else(|| metadata.gid().to_string());

    Some(PosixAttributes {
        owner,
        group,
        permissions: permission_string(metadata.mode()),
    })
}

#[cfg(not(unix))]
fn capture_posix(_path: &Path) -> Option<PosixAttributes> {
    None
}

/// Render the nine permission bits of a mode as `rwxr-xr-x`
pub fn permission_string(mode: u32) -> String {
    "rwxrwxrwx"
        .chars()
        .enumerate()
        .map(|(i, flag)| if mode & (0o400 >> i) != 0 { flag } else { '-' })
        .collect()
}

#[cfg(target_os = "linux")]
fn capture_acl(path: &Path) -> Option<String> {
    match xattr::get(path, "system.posix_acl_access") {
        Ok(Some(value)) => describe_posix_acl(&value),
        Ok(None) => None,
        Err(e) => {
            debug!("Could not read ACL of {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn capture_acl(_path: &Path) -> Option<String> {
    None
}

/// Decode the `system.posix_acl_access` xattr value (version header followed by
/// tag/perm/id entries) into a readable description.
pub fn describe_posix_acl(value: &[u8]) -> Option<String> {
    const HEADER_LEN: usize = 4;
    const ENTRY_LEN: usize = 8;
    const ACL_VERSION: u32 = 2;
    const UNDEFINED_ID: u32 = u32::MAX;

    if value.len() < HEADER_LEN || (value.len() - HEADER_LEN) % ENTRY_LEN != 0 {
        return None;
    }
    let version = u32::from_le_bytes([value[0], value[1], value[2], value[3]]);
    if version != ACL_VERSION {
        return None;
    }

    let entries: Vec<String> = value[HEADER_LEN..]
        .chunks_exact(ENTRY_LEN)
        .map(|entry| {
            let tag = u16::from_le_bytes([entry[0], entry[1]]);
            let perm = u16::from_le_bytes([entry[2], entry[3]]);
            let id = u32::from_le_bytes([entry[4], entry[5], entry[6], entry[7]]);
            let qualifier = if id == UNDEFINED_ID { String::new() } else { id.to_string() };
            let kind = match tag {
                0x01 | 0x02 => "user",
                0x04 | 0x08 => "group",
                0x10 => "mask",
                0x20 => "other",
                _ => "unknown",
            };
            let perms: String = [(4, 'r'), (2, 'w'), (1, 'x')]
                .iter()
                .map(|(bit, flag)| if perm & bit != 0 { *flag } else { '-' })
                .collect();
            format!("{}:{}:{}", kind, qualifier, perms)
        })
        .collect();

    Some(entries.join(", "))
}

#[cfg(target_os = "linux")]
fn capture_user_defined(path: &Path) -> Option<String> {
    let names = match xattr::list(path) {
        Ok(names) => names,
        Err(e) => {
            debug!("Could not list extended attributes of {}: {}", path.display(), e);
            return None;
        }
    };

    let mut user_names: Vec<String> = names
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| name.starts_with("user."))
        .collect();
    user_names.sort();

    let mut hasher = blake3::Hasher::new();
    for name in &user_names {
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
        match xattr::get(path, name) {
            Ok(Some(value)) => {
                hasher.update(&value);
            }
            Ok(None) => {}
            Err(e) => {
                debug!("Could not read {} of {}: {}", name, path.display(), e);
                return None;
            }
        }
        hasher.update(&[0]);
    }
    Some(hasher.finalize().to_hex().to_string())
}

#[cfg(not(target_os = "linux"))]
fn capture_user_defined(_path: &Path) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_capture_regular_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file.txt");
        fs::write(&path, b"Hi").unwrap();

        let hasher = ContentHasher::default();
        let attributes = FileAttributes::capture(&path, Some(&hasher));

        let basic = attributes.basic.as_ref().unwrap();
        assert!(basic.is_regular_file);
        assert!(!basic.is_directory);
        assert!(!basic.is_symbolic_link);
        assert_eq!(basic.size, 2);
        assert_eq!(attributes.contents_hash, Some(hasher.hash_file(&path).unwrap()));

        #[cfg(unix)]
        {
            assert!(attributes.posix.is_some());
            assert_eq!(
                attributes.file_owner,
                attributes.posix.as_ref().map(|p| p.owner.clone())
            );
        }
    }

    #[test]
    fn test_capture_without_hasher() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file.txt");
        fs::write(&path, b"content").unwrap();

        let attributes = FileAttributes::capture(&path, None);
        assert!(attributes.contents_hash.is_none());
        assert!(attributes.basic.is_some());
    }

    #[test]
    fn test_capture_directory_is_not_hashed() {
        let temp_dir = TempDir::new().unwrap();
        let attributes = FileAttributes::capture(temp_dir.path(), Some(&ContentHasher::default()));
        assert!(attributes.basic.unwrap().is_directory);
        assert!(attributes.contents_hash.is_none());
    }

    #[test]
    fn test_capture_missing_path() {
        let temp_dir = TempDir::new().unwrap();
        let attributes = FileAttributes::capture(&temp_dir.path().join("missing"), None);
        assert!(attributes.basic.is_none());
        assert!(attributes.posix.is_none());
        assert!(attributes.file_owner.is_none());
    }

    #[test]
    fn test_hash_algorithms_differ() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file.txt");
        fs::write(&path, b"hello world").unwrap();

        let blake = ContentHasher::new(HashAlgorithm::Blake3).hash_file(&path).unwrap();
        let sha = ContentHasher::new(HashAlgorithm::Sha256).hash_file(&path).unwrap();
        assert_eq!(blake.len(), 64);
        assert_eq!(
            sha,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_ne!(blake, sha);
    }

    #[test]
    fn test_hash_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = ContentHasher::default()
            .hash_file(&temp_dir.path().join("missing"))
            .unwrap_err();
        assert!(matches!(err, AssuranceError::Hash { .. }));
    }

    #[test]
    fn test_permission_string() {
        assert_eq!(permission_string(0o755), "rwxr-xr-x");
        assert_eq!(permission_string(0o100644), "rw-r--r--");
        assert_eq!(permission_string(0), "---------");
    }

    #[test]
    fn test_describe_posix_acl() {
        let mut value = 2u32.to_le_bytes().to_vec();
        for (tag, perm, id) in [
            (0x01u16, 7u16, u32::MAX),
            (0x02, 4, 1000),
            (0x04, 5, u32::MAX),
            (0x10, 5, u32::MAX),
            (0x20, 4, u32::MAX),
        ] {
            value.extend_from_slice(&tag.to_le_bytes());
            value.extend_from_slice(&perm.to_le_bytes());
            value.extend_from_slice(&id.to_le_bytes());
        }

        assert_eq!(
            describe_posix_acl(&value).unwrap(),
            "user::rwx, user:1000:r--, group::r-x, mask::r-x, other::r--"
        );
        assert!(describe_posix_acl(&value[..6]).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_capture_symlink() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("target.txt");
        let link = temp_dir.path().join("link");
        fs::write(&target, b"x").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let basic = FileAttributes::capture(&link, None).basic.unwrap();
        assert!(basic.is_symbolic_link);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_user_defined_attributes_hash() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file.txt");
        fs::write(&path, b"x").unwrap();

        let before = capture_user_defined(&path);
        if xattr::set(&path, "user.assurance.tag", b"blue").is_err() {
            // Filesystem without user xattrs
            return;
        }
        let tagged = capture_user_defined(&path);
        assert!(tagged.is_some());
        assert_ne!(tagged, before);

        xattr::set(&path, "user.assurance.tag", b"red").unwrap();
        assert_ne!(capture_user_defined(&path), tagged);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_capture_acl_without_entry() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file.txt");
        fs::write(&path, b"x").unwrap();
        assert_eq!(capture_acl(&path), None);
    }
}
