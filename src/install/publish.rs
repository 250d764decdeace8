//! Making an unpacked distribution visible
//!
//! A distribution directory counts as installed only when its `.installed`
//! marker exists and names a directory that is present. The marker is written
//! last and atomically, so readers never need the lock to trust it.

use crate::core::error::InstallError;
use crate::core::output;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Completion marker inside the distribution directory
pub(crate) const MARKER_FILE: &str = ".installed";

/// Prefix of the staging directory used while unpacking
pub(crate) const STAGING_PREFIX: &str = ".unpack-";

/// Root directory of a completed install, if there is one.
pub(crate) fn installed_home(distribution_dir: &Path) -> Option<PathBuf> {
    let content = std::fs::read_to_string(distribution_dir.join(MARKER_FILE)).ok()?;
    let name = content.trim();

    let mut components = Path::new(name).components();
    let single_normal = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none();
    if !single_normal {
        return None;
    }

    let home = distribution_dir.join(name);
    let populated = std::fs::read_dir(&home).ok()?.next().is_some();
    populated.then_some(home)
}

/// Record `root_name` as the installed root, atomically.
pub(crate) fn write_marker(distribution_dir: &Path, root_name: &str) -> Result<(), InstallError> {
    let marker = distribution_dir.join(MARKER_FILE);
    let mut tmp = tempfile::Builder::new()
        .prefix(".installed.")
        .tempfile_in(distribution_dir)
        .map_err(InstallError::io("cannot create", &marker))?;
    writeln!(tmp, "{}", root_name).map_err(InstallError::io("cannot write", &marker))?;
    tmp.as_file()
        .sync_all()
        .map_err(InstallError::io("cannot write", &marker))?;
    tmp.persist(&marker)
        .map_err(|e| InstallError::io("cannot write", &marker)(e.error))?;
    Ok(())
}

/// Forget a previous install before replacing it.
pub(crate) fn remove_marker(distribution_dir: &Path) -> Result<(), InstallError> {
    let marker = distribution_dir.join(MARKER_FILE);
    match std::fs::remove_file(&marker) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(InstallError::io("cannot remove", marker)(e)),
    }
}

/// Move `staged_root` to `<distribution_dir>/<root_name>` and mark it installed.
///
/// If the move fails because a concurrent install already published a root,
/// that root is returned and `staged_root` is discarded.
pub(crate) fn commit(
    staged_root: &Path,
    distribution_dir: &Path,
    root_name: &str,
) -> Result<PathBuf, InstallError> {
    let home = distribution_dir.join(root_name);
    if let Err(e) = std::fs::rename(staged_root, &home) {
        let Some(winner) = installed_home(distribution_dir) else {
            return Err(InstallError::io("cannot move unpacked distribution to", &home)(e));
        };
        output::detail(&format!("adopting concurrent install at {}", winner.display()));
        if let Err(e) = std::fs::remove_dir_all(staged_root) {
            output::warning(&format!("cannot remove {}: {}", staged_root.display(), e));
        }
        return Ok(winner);
    }

    write_marker(distribution_dir, root_name)?;
    Ok(home)
}

/// Name of the single top-level directory in `staging`.
///
/// Top-level files are ignored; anything but exactly one directory is an error.
pub(crate) fn single_root(staging: &Path, url: &str) -> Result<String, InstallError> {
    let mut roots: Vec<OsString> = Vec::new();
    for entry in std::fs::read_dir(staging).map_err(InstallError::io("cannot read", staging))? {
        let entry = entry.map_err(InstallError::io("cannot read", staging))?;
        let is_dir = entry
            .file_type()
            .map_err(InstallError::io("cannot read", entry.path()))?
            .is_dir();
        if is_dir {
            roots.push(entry.file_name());
        }
    }

    match roots.as_slice() {
        [] => Err(InstallError::NoRootDirectory {
            url: url.to_string(),
        }),
        [root] => Ok(root.to_string_lossy().into_owned()),
        _ => Err(InstallError::MultipleRootDirectories {
            url: url.to_string(),
            found: roots.len(),
        }),
    }
}

/// Remove everything in `distribution_dir` except the paths in `keep`.
///
/// Clears half-extracted leftovers of interrupted runs and the previous root
/// when re-unpacking.
pub(crate) fn clear_stale(distribution_dir: &Path, keep: &[&Path]) -> Result<(), InstallError> {
    for entry in std::fs::read_dir(distribution_dir)
        .map_err(InstallError::io("cannot read", distribution_dir))?
    {
        let entry = entry.map_err(InstallError::io("cannot read", distribution_dir))?;
        let path = entry.path();
        if keep.iter().any(|k| *k == path) {
            continue;
        }

        let file_type = entry
            .file_type()
            .map_err(InstallError::io("cannot read", &path))?;
        let removed = if file_type.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        removed.map_err(InstallError::io("cannot remove", &path))?;
    }
    Ok(())
}

/// Mark every regular file directly under `<root>/bin` executable.
#[cfg(unix)]
pub(crate) fn make_executable(root: &Path) -> Result<(), InstallError> {
    use std::os::unix::fs::PermissionsExt;

    let bin = root.join("bin");
    if !bin.is_dir() {
        return Ok(());
    }

    for entry in walkdir::WalkDir::new(&bin).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| bin.clone());
            InstallError::io("cannot read", path)(e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let mut perms = std::fs::metadata(path)
            .map_err(InstallError::io("cannot read", path))?
            .permissions();
        perms.set_mode(perms.mode() | 0o755);
        std::fs::set_permissions(path, perms)
            .map_err(InstallError::io("cannot set permissions on", path))?;
    }
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn make_executable(_root: &Path) -> Result<(), InstallError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_marker_round_trip() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("tool-1.0/bin")).unwrap();
        assert_eq!(installed_home(dir.path()), None);

        write_marker(dir.path(), "tool-1.0").unwrap();
        assert_eq!(installed_home(dir.path()), Some(dir.path().join("tool-1.0")));

        remove_marker(dir.path()).unwrap();
        assert_eq!(installed_home(dir.path()), None);
        remove_marker(dir.path()).unwrap();
    }

    #[test]
    fn test_marker_naming_missing_dir_is_not_installed() {
        let dir = TempDir::new().unwrap();
        write_marker(dir.path(), "gone").unwrap();
        assert_eq!(installed_home(dir.path()), None);
    }

    #[test]
    fn test_marker_naming_empty_dir_is_not_installed() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("tool-1.0")).unwrap();
        write_marker(dir.path(), "tool-1.0").unwrap();
        assert_eq!(installed_home(dir.path()), None);
    }

    #[test]
    fn test_marker_with_path_escape_is_ignored() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(MARKER_FILE), "../elsewhere\n").unwrap();
        assert_eq!(installed_home(dir.path()), None);
    }

    #[test]
    fn test_commit_publishes_and_marks() {
        let dir = TempDir::new().unwrap();
        let staged = dir.path().join(".unpack-abc/tool-1.0");
        std::fs::create_dir_all(staged.join("bin")).unwrap();

        let home = commit(&staged, dir.path(), "tool-1.0").unwrap();
        assert_eq!(home, dir.path().join("tool-1.0"));
        assert!(home.join("bin").is_dir());
        assert!(!staged.exists());
        assert_eq!(installed_home(dir.path()), Some(home));
    }

    #[test]
    fn test_commit_adopts_root_published_concurrently() {
        let dir = TempDir::new().unwrap();
        let winner = dir.path().join("tool-1.0");
        std::fs::create_dir_all(&winner).unwrap();
        std::fs::write(winner.join("owner"), b"first").unwrap();
        write_marker(dir.path(), "tool-1.0").unwrap();

        let staged = dir.path().join(".unpack-abc/tool-1.0");
        std::fs::create_dir_all(&staged).unwrap();
        std::fs::write(staged.join("owner"), b"second").unwrap();

        let home = commit(&staged, dir.path(), "tool-1.0").unwrap();
        assert_eq!(home, winner);
        assert_eq!(std::fs::read(winner.join("owner")).unwrap(), b"first");
        assert!(!staged.exists());
        assert_eq!(installed_home(dir.path()), Some(winner));
    }

    #[test]
    fn test_commit_without_winner_reports_move_failure() {
        let dir = TempDir::new().unwrap();
        let occupied = dir.path().join("tool-1.0");
        std::fs::create_dir_all(&occupied).unwrap();
        std::fs::write(occupied.join("leftover"), b"x").unwrap();

        let staged = dir.path().join(".unpack-abc/tool-1.0");
        std::fs::create_dir_all(&staged).unwrap();
        std::fs::write(staged.join("file"), b"y").unwrap();

        let err = commit(&staged, dir.path(), "tool-1.0").unwrap_err();
        assert!(matches!(err, InstallError::Io { .. }), "unexpected error: {err:?}");
        assert!(staged.exists());
        assert_eq!(installed_home(dir.path()), None);
    }

    #[test]
    fn test_single_root() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            single_root(dir.path(), "u").unwrap_err(),
            InstallError::NoRootDirectory { .. }
        ));

        std::fs::create_dir(dir.path().join("tool-1.0")).unwrap();
        std::fs::write(dir.path().join("README"), b"top-level file").unwrap();
        assert_eq!(single_root(dir.path(), "u").unwrap(), "tool-1.0");

        std::fs::create_dir(dir.path().join("extra")).unwrap();
        assert!(matches!(
            single_root(dir.path(), "u").unwrap_err(),
            InstallError::MultipleRootDirectories { found: 2, .. }
        ));
    }

    #[test]
    fn test_clear_stale_keeps_listed_paths() {
        let dir = TempDir::new().unwrap();
        let zip = dir.path().join("tool.zip");
        let staging = dir.path().join(".unpack-abc");
        std::fs::write(&zip, b"zip").unwrap();
        std::fs::create_dir(&staging).unwrap();
        std::fs::create_dir_all(dir.path().join("half-extracted/lib")).unwrap();
        std::fs::write(dir.path().join(MARKER_FILE), b"old").unwrap();

        clear_stale(dir.path(), &[&zip, &staging]).unwrap();

        let mut left: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        left.sort();
        assert_eq!(left, vec![OsString::from(".unpack-abc"), OsString::from("tool.zip")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_make_executable_only_touches_bin() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let root = dir.path().join("tool-1.0");
        std::fs::create_dir_all(root.join("bin")).unwrap();
        std::fs::create_dir_all(root.join("lib")).unwrap();
        std::fs::write(root.join("bin/tool"), b"#!/bin/sh\n").unwrap();
        std::fs::write(root.join("lib/tool.jar"), b"jar").unwrap();
        for f in ["bin/tool", "lib/tool.jar"] {
            std::fs::set_permissions(root.join(f), std::fs::Permissions::from_mode(0o644)).unwrap();
        }

        make_executable(&root).unwrap();

        let mode = |f: &str| std::fs::metadata(root.join(f)).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode("bin/tool"), 0o755);
        assert_eq!(mode("lib/tool.jar"), 0o644);
    }

    #[test]
    fn test_make_executable_without_bin() {
        let dir = TempDir::new().unwrap();
        make_executable(dir.path()).unwrap();
    }
}
