//! Deleted items location and the filesystem moves and copies merges are built from

use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::config::APPLICATION_SHORT_NAME;
use crate::error::{AssuranceError, Result};
use crate::model::ComparisonResult;

const UNKNOWN_SCAN_FOLDER: &str = "unknown_scan";

/// Root of the per-scan trash folders.
///
/// Layout: `<root>/<scan folder>/<original absolute path, without its root>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedItems {
    root: PathBuf,
}

impl DeletedItems {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<home>/.assurance`
    pub fn application_default() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| {
                AssuranceError::Config("Could not determine the home directory".to_string())
            })?;
        Ok(Self::new(home.join(format!(".{}", APPLICATION_SHORT_NAME.to_lowercase()))))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scan_folder(&self, folder_name: &str) -> PathBuf {
        self.root.join(folder_name)
    }

    /// Where `path` of `result` is kept once deleted
    pub fn location_for(&self, result: &ComparisonResult, path: &Path) -> PathBuf {
        match &result.deleted_items_folder {
            Some(folder) => self.scan_folder(folder).join(relative_trash_path(path)),
            None => {
                let mut location = self.root.join(UNKNOWN_SCAN_FOLDER);
                if let Some(name) = path.file_name() {
                    location.push(name);
                }
                location
            }
        }
    }
}

/// Turn an absolute path into one that can be nested under a trash folder
fn relative_trash_path(path: &Path) -> PathBuf {
    path.components()
        .filter_map(|component| match component {
            Component::Prefix(prefix) => Some(OsString::from(
                prefix.as_os_str().to_string_lossy().replace(':', "~"),
            )),
            Component::Normal(part) => Some(part.to_os_string()),
            Component::RootDir | Component::CurDir | Component::ParentDir => None,
        })
        .collect()
}

/// Copy a file, link or directory tree onto `destination`, overwriting files and links
/// already there. Links are recreated, never followed. Modification times are preserved.
pub fn copy_path(source: &Path, destination: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(source)
        .map_err(|e| AssuranceError::copy_error(source, destination, e.to_string()))?;
    let existing = fs::symlink_metadata(destination).ok();

    if metadata.is_dir() {
        if existing.is_some_and(|existing| !existing.is_dir()) {
            return Err(AssuranceError::copy_error(
                source,
                destination,
                "Destination exists and is not a directory",
            ));
        }
        copy_directory(source, destination)
    } else {
        if existing.is_some_and(|existing| existing.is_dir()) {
            return Err(AssuranceError::copy_error(
                source,
                destination,
                "Destination exists and is a directory",
            ));
        }
        if metadata.file_type().is_symlink() {
            copy_link(source, destination)
        } else {
            copy_file(source, destination)
        }
    }
}

fn copy_directory(source: &Path, destination: &Path) -> Result<()> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry =
            entry.map_err(|e| AssuranceError::copy_error(source, destination, e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| AssuranceError::copy_error(source, destination, e.to_string()))?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            if is_link(&target) {
                remove_path(&target)?;
            }
            fs::create_dir_all(&target)
                .map_err(|e| AssuranceError::copy_error(entry.path(), &target, e.to_string()))?;
        } else if entry.file_type().is_symlink() {
            copy_link(entry.path(), &target)?;
        } else {
            copy_file(entry.path(), &target)?;
        }
    }

    preserve_mtime(source, destination);
    Ok(())
}

fn copy_file(source: &Path, destination: &Path) -> Result<()> {
    create_parent(source, destination)?;
    // fs::copy writes through a link at the destination
    if is_link(destination) {
        remove_path(destination)?;
    }

    fs::copy(source, destination)
        .map_err(|e| AssuranceError::copy_error(source, destination, e.to_string()))?;
    preserve_mtime(source, destination);
    Ok(())
}

/// Recreate the link at `source` as `destination`, replacing a file or link already there
fn copy_link(source: &Path, destination: &Path) -> Result<()> {
    let link = fs::read_link(source)
        .map_err(|e| AssuranceError::copy_error(source, destination, e.to_string()))?;
    create_parent(source, destination)?;
    if let Ok(existing) = fs::symlink_metadata(destination) {
        if existing.is_dir() {
            return Err(AssuranceError::copy_error(
                source,
                destination,
                "Destination exists and is a directory",
            ));
        }
        remove_path(destination)?;
    }

    make_link(source, &link, destination)
        .map_err(|e| AssuranceError::copy_error(source, destination, e.to_string()))?;

    let times = fs::symlink_metadata(source).and_then(|metadata| {
        let atime = filetime::FileTime::from_last_access_time(&metadata);
        let mtime = filetime::FileTime::from_last_modification_time(&metadata);
        filetime::set_symlink_file_times(destination, atime, mtime)
    });
    if let Err(e) = times {
        tracing::debug!("Could not preserve link times on {}: {}", destination.display(), e);
    }
    Ok(())
}

#[cfg(unix)]
fn make_link(_source: &Path, link: &Path, destination: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(link, destination)
}

#[cfg(windows)]
fn make_link(source: &Path, link: &Path, destination: &Path) -> std::io::Result<()> {
    if fs::metadata(source).map(|metadata| metadata.is_dir()).unwrap_or(false) {
        std::os::windows::fs::symlink_dir(link, destination)
    } else {
        std::os::windows::fs::symlink_file(link, destination)
    }
}

fn create_parent(source: &Path, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AssuranceError::copy_error(source, destination, e.to_string()))?;
    }
    Ok(())
}

fn is_link(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|metadata| metadata.file_type().is_symlink())
        .unwrap_or(false)
}

fn preserve_mtime(source: &Path, destination: &Path) {
    let result = fs::metadata(source).and_then(|metadata| {
        let mtime = filetime::FileTime::from_last_modification_time(&metadata);
        filetime::set_file_mtime(destination, mtime)
    });
    if let Err(e) = result {
        tracing::warn!("Could not preserve modification time on {}: {}", destination.display(), e);
    }
}

/// Move a file or directory to `destination`, creating its parent directories.
/// An existing destination is an error.
pub fn move_path(source: &Path, destination: &Path) -> Result<()> {
    if destination.symlink_metadata().is_ok() {
        return Err(AssuranceError::move_error(source, destination, "Destination already exists"));
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AssuranceError::move_error(source, destination, e.to_string()))?;
    }

    if fs::rename(source, destination).is_ok() {
        return Ok(());
    }

    // Rename fails across filesystems
    copy_path(source, destination)
        .map_err(|e| AssuranceError::move_error(source, destination, e.to_string()))?;
    remove_path(source).map_err(|e| AssuranceError::move_error(source, destination, e.to_string()))
}

/// Remove a file, link or directory tree
pub fn remove_path(path: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use crate::model::{ComparisonReason, FileReference};

    fn result_in_folder(folder: Option<&str>) -> ComparisonResult {
        let mut result = ComparisonResult::new(
            FileReference::new("/data/source/a.txt"),
            FileReference::new("/data/target/a.txt"),
            ComparisonReason::TargetDoesNotExist,
        );
        result.deleted_items_folder = folder.map(str::to_string);
        result
    }

    #[test]
    fn test_location_for_scan_result() {
        let trash = DeletedItems::new("/trash");
        let result = result_in_folder(Some("docs_01_02_2024_03_04_05"));
        assert_eq!(
            trash.location_for(&result, Path::new("/data/source/a.txt")),
            PathBuf::from("/trash/docs_01_02_2024_03_04_05/data/source/a.txt")
        );
    }

    #[test]
    fn test_location_for_unknown_scan() {
        let trash = DeletedItems::new("/trash");
        let result = result_in_folder(None);
        assert_eq!(
            trash.location_for(&result, Path::new("/data/source/a.txt")),
            PathBuf::from("/trash/unknown_scan/a.txt")
        );
    }

    #[test]
    fn test_relative_trash_path_drops_root() {
        assert_eq!(relative_trash_path(Path::new("/a/./b/../c")), PathBuf::from("a/b/c"));
    }

    #[test]
    fn test_application_default_under_home() {
        if let Some(home) = dirs::home_dir() {
            let trash = DeletedItems::application_default().unwrap();
            assert_eq!(trash.root(), home.join(".assurance"));
        }
    }

    #[test]
    fn test_copy_file_preserves_mtime_and_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source.txt");
        let destination = temp_dir.path().join("nested").join("dest.txt");
        fs::write(&source, b"Hi").unwrap();
        let mtime = filetime::FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&source, mtime).unwrap();

        copy_path(&source, &destination).unwrap();
        fs::write(&source, b"Hi!").unwrap();
        copy_path(&source, &destination).unwrap();

        assert_eq!(fs::read(&destination).unwrap(), b"Hi!");
        let copied = fs::metadata(&destination).unwrap();
        assert_eq!(
            filetime::FileTime::from_last_modification_time(&copied),
            filetime::FileTime::from_last_modification_time(&fs::metadata(&source).unwrap())
        );
    }

    #[test]
    fn test_copy_directory_tree() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source");
        fs::create_dir_all(source.join("sub")).unwrap();
        fs::write(source.join("a.txt"), b"a").unwrap();
        fs::write(source.join("sub").join("b.txt"), b"b").unwrap();

        let destination = temp_dir.path().join("destination");
        copy_path(&source, &destination).unwrap();

        assert_eq!(fs::read(destination.join("a.txt")).unwrap(), b"a");
        assert_eq!(fs::read(destination.join("sub").join("b.txt")).unwrap(), b"b");
    }

    #[test]
    fn test_copy_file_onto_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source.txt");
        let destination = temp_dir.path().join("dir");
        fs::write(&source, b"x").unwrap();
        fs::create_dir(&destination).unwrap();

        let err = copy_path(&source, &destination).unwrap_err();
        assert!(matches!(err, AssuranceError::FileCopy { .. }));
    }

    #[test]
    fn test_move_path() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("item.txt");
        let destination = temp_dir.path().join("trash").join("deep").join("item.txt");
        fs::write(&source, b"x").unwrap();

        move_path(&source, &destination).unwrap();
        assert!(!source.exists());
        assert_eq!(fs::read(&destination).unwrap(), b"x");

        // Moving onto an existing entry is refused
        fs::write(&source, b"y").unwrap();
        let err = move_path(&source, &destination).unwrap_err();
        assert!(matches!(err, AssuranceError::FileMove { .. }));
        assert!(source.exists());
    }

    #[test]
    fn test_remove_path() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("dir");
        fs::create_dir_all(dir.join("inner")).unwrap();
        fs::write(dir.join("inner").join("f"), b"f").unwrap();

        remove_path(&dir).unwrap();
        assert!(!dir.exists());
        assert!(remove_path(&dir).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_link_replaces_destination_link() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("one.txt"), b"1").unwrap();
        fs::write(temp_dir.path().join("two.txt"), b"2").unwrap();
        let source = temp_dir.path().join("source_link");
        let destination = temp_dir.path().join("destination_link");
        symlink("one.txt", &source).unwrap();
        symlink("two.txt", &destination).unwrap();

        copy_path(&source, &destination).unwrap();

        assert_eq!(fs::read_link(&destination).unwrap(), PathBuf::from("one.txt"));
        assert_eq!(fs::read(temp_dir.path().join("two.txt")).unwrap(), b"2");
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_file_does_not_write_through_destination_link() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source.txt");
        let unrelated = temp_dir.path().join("unrelated.txt");
        let destination = temp_dir.path().join("destination");
        fs::write(&source, b"new").unwrap();
        fs::write(&unrelated, b"keep").unwrap();
        symlink(&unrelated, &destination).unwrap();

        copy_path(&source, &destination).unwrap();

        assert!(!fs::symlink_metadata(&destination).unwrap().file_type().is_symlink());
        assert_eq!(fs::read(&destination).unwrap(), b"new");
        assert_eq!(fs::read(&unrelated).unwrap(), b"keep");
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_directory_keeps_links() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source");
        fs::create_dir_all(source.join("sub")).unwrap();
        fs::write(source.join("a.txt"), b"a").unwrap();
        symlink("a.txt", source.join("file_link")).unwrap();
        symlink("sub", source.join("dir_link")).unwrap();
        symlink("missing", source.join("dangling")).unwrap();

        let destination = temp_dir.path().join("destination");
        copy_path(&source, &destination).unwrap();

        for (name, link) in [("file_link", "a.txt"), ("dir_link", "sub"), ("dangling", "missing")] {
            let copied = destination.join(name);
            assert!(fs::symlink_metadata(&copied).unwrap().file_type().is_symlink());
            assert_eq!(fs::read_link(&copied).unwrap(), PathBuf::from(link));
        }
    }
}
