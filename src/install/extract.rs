//! Archive extraction
//!
//! The format is taken from the archive's leading bytes and only falls back to
//! the file extension when those are inconclusive, so a mislabelled download
//! still unpacks and an error page saved as `.zip` is reported as such.

use crate::core::error::InstallError;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    TarXz,
    TarBz2,
    TarZst,
}

/// Bytes needed to see a tar header's `ustar` magic at offset 257
const SNIFF_LEN: usize = 262;

/// Work out the archive format of `archive`.
pub(crate) fn detect_format(archive: &Path) -> Result<ArchiveFormat, InstallError> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    File::open(archive)
        .map_err(InstallError::io("cannot open", archive))?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .map_err(InstallError::io("cannot read", archive))?;

    if head.is_empty() {
        return Err(InstallError::EmptyArchive {
            archive: archive.to_path_buf(),
        });
    }

    if let Some(format) = sniff(&head) {
        return Ok(format);
    }

    // Old-style tar headers carry no magic; trust the name for those.
    if format_from_name(archive) == Some(ArchiveFormat::Tar) && !looks_like_html(&head) {
        return Ok(ArchiveFormat::Tar);
    }

    Err(InstallError::NotAnArchive {
        archive: archive.to_path_buf(),
        reason: describe_content(&head),
    })
}

fn sniff(head: &[u8]) -> Option<ArchiveFormat> {
    match head {
        [b'P', b'K', 0x03, 0x04, ..] | [b'P', b'K', 0x05, 0x06, ..] => Some(ArchiveFormat::Zip),
        [0x1f, 0x8b, ..] => Some(ArchiveFormat::TarGz),
        [0xfd, b'7', b'z', b'X', b'Z', 0x00, ..] => Some(ArchiveFormat::TarXz),
        [b'B', b'Z', b'h', ..] => Some(ArchiveFormat::TarBz2),
        [0x28, 0xb5, 0x2f, 0xfd, ..] => Some(ArchiveFormat::TarZst),
        _ if head.len() >= SNIFF_LEN && &head[257..262] == b"ustar" => Some(ArchiveFormat::Tar),
        _ => None,
    }
}

fn format_from_name(archive: &Path) -> Option<ArchiveFormat> {
    let name = archive.file_name()?.to_string_lossy().to_lowercase();
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Some(ArchiveFormat::TarGz)
    } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
        Some(ArchiveFormat::TarXz)
    } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
        Some(ArchiveFormat::TarBz2)
    } else if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
        Some(ArchiveFormat::TarZst)
    } else if name.ends_with(".zip") {
        Some(ArchiveFormat::Zip)
    } else if name.ends_with(".tar") {
        Some(ArchiveFormat::Tar)
    } else {
        None
    }
}

fn looks_like_html(head: &[u8]) -> bool {
    let text = String::from_utf8_lossy(&head[..head.len().min(64)]).to_lowercase();
    let text = text.trim_start();
    text.starts_with("<!doctype html") || text.starts_with("<html")
}

fn describe_content(head: &[u8]) -> String {
    if looks_like_html(head) {
        "content is an HTML page".to_string()
    } else {
        format!("unrecognized content starting with {}", hex::encode(&head[..head.len().min(8)]))
    }
}

/// Unpack `archive` into `dest`, returning the number of entries written.
pub(crate) fn extract(archive: &Path, dest: &Path) -> Result<usize, InstallError> {
    let format = detect_format(archive)?;
    std::fs::create_dir_all(dest).map_err(InstallError::io("cannot create directory", dest))?;

    let open = || -> Result<BufReader<File>, InstallError> {
        let file = File::open(archive).map_err(InstallError::io("cannot open", archive))?;
        Ok(BufReader::new(file))
    };
    let corrupt = |reason: String| InstallError::CorruptArchive {
        archive: archive.to_path_buf(),
        reason,
    };

    match format {
        ArchiveFormat::Zip => extract_zip(archive, dest),
        ArchiveFormat::Tar => extract_tar(open()?, archive, dest),
        ArchiveFormat::TarGz => extract_tar(flate2::read::GzDecoder::new(open()?), archive, dest),
        ArchiveFormat::TarXz => extract_tar(xz2::read::XzDecoder::new(open()?), archive, dest),
        ArchiveFormat::TarBz2 => extract_tar(bzip2::read::BzDecoder::new(open()?), archive, dest),
        ArchiveFormat::TarZst => {
            let decoder = zstd::stream::read::Decoder::new(open()?)
                .map_err(|e| corrupt(format!("zstd init error: {}", e)))?;
            extract_tar(decoder, archive, dest)
        }
    }
}

/// Lexically normalize a path (no filesystem access).
fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    let mut has_root = false;

    for c in path.components() {
        match c {
            Component::Prefix(p) => {
                out.clear();
                out.push(p.as_os_str());
                has_root = true;
            }
            Component::RootDir => {
                out.push(Component::RootDir.as_os_str());
                has_root = true;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = out
                    .components()
                    .next_back()
                    .is_some_and(|last| matches!(last, Component::Normal(_)));
                if popped {
                    out.pop();
                } else if !has_root {
                    out.push("..");
                }
            }
            Component::Normal(seg) => out.push(seg),
        }
    }

    out
}

/// Relative, with no `..`, root or prefix components.
fn is_safe_relative(path: &Path) -> bool {
    !path.is_absolute()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn ensure_no_symlink_components(
    archive: &Path,
    dest: &Path,
    full_path: &Path,
) -> Result<(), InstallError> {
    let Ok(rel) = full_path.strip_prefix(dest) else {
        return Err(InstallError::CorruptArchive {
            archive: archive.to_path_buf(),
            reason: format!("entry outside destination: {}", full_path.display()),
        });
    };

    let mut cur = dest.to_path_buf();
    for comp in rel.components() {
        cur.push(comp);
        if let Ok(md) = std::fs::symlink_metadata(&cur)
            && md.file_type().is_symlink()
        {
            return Err(InstallError::CorruptArchive {
                archive: archive.to_path_buf(),
                reason: format!("entry written through symlink {}", cur.display()),
            });
        }
    }

    Ok(())
}

fn ensure_link_target_within_dest(
    archive: &Path,
    dest: &Path,
    link_parent: &Path,
    link_name: &Path,
) -> Result<(), InstallError> {
    let candidate = normalize_lexical(&link_parent.join(link_name));
    if link_name.is_absolute() || candidate.strip_prefix(normalize_lexical(dest)).is_err() {
        return Err(InstallError::CorruptArchive {
            archive: archive.to_path_buf(),
            reason: format!(
                "unsafe link target: {} -> {}",
                link_parent.display(),
                link_name.display()
            ),
        });
    }
    Ok(())
}

fn extract_tar<R: Read>(reader: R, archive: &Path, dest: &Path) -> Result<usize, InstallError> {
    let corrupt = |reason: String| InstallError::CorruptArchive {
        archive: archive.to_path_buf(),
        reason,
    };

    let mut tar = tar::Archive::new(reader);
    let mut count = 0;

    for entry in tar.entries().map_err(|e| corrupt(e.to_string()))? {
        let mut entry = entry.map_err(|e| corrupt(e.to_string()))?;
        let path = entry
            .path()
            .map_err(|e| corrupt(e.to_string()))?
            .into_owned();

        if !is_safe_relative(&path) {
            return Err(corrupt(format!("unsafe path: {}", path.display())));
        }
        if path.as_os_str().is_empty() || normalize_lexical(&path).as_os_str().is_empty() {
            continue;
        }

        let full_path = dest.join(&path);
        ensure_no_symlink_components(archive, dest, &full_path)?;

        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            let link_name = entry
                .link_name()
                .map_err(|e| corrupt(e.to_string()))?
                .ok_or_else(|| corrupt(format!("link without target: {}", path.display())))?;
            // Hard link targets are archive-relative; symlinks resolve from their parent.
            let link_parent = if entry_type.is_hard_link() {
                dest
            } else {
                full_path.parent().unwrap_or(dest)
            };
            ensure_link_target_within_dest(archive, dest, link_parent, &link_name)?;
        }

        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(InstallError::io("cannot create directory", parent))?;
        }

        // unpack_in resolves hard link targets against `dest`.
        let unpacked = entry
            .unpack_in(dest)
            .map_err(|e| corrupt(format!("{}: {}", path.display(), e)))?;
        if unpacked {
            count += 1;
        }
    }

    Ok(count)
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<usize, InstallError> {
    let corrupt = |reason: String| InstallError::CorruptArchive {
        archive: archive.to_path_buf(),
        reason,
    };

    let file = File::open(archive).map_err(InstallError::io("cannot open", archive))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| corrupt(e.to_string()))?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| corrupt(e.to_string()))?;

        let Some(relative) = entry.enclosed_name() else {
            return Err(corrupt(format!("unsafe path: {}", entry.name())));
        };
        let outpath = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath)
                .map_err(InstallError::io("cannot create directory", &outpath))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent)
                .map_err(InstallError::io("cannot create directory", parent))?;
        }

        let mut outfile =
            File::create(&outpath).map_err(InstallError::io("cannot create", &outpath))?;
        std::io::copy(&mut entry, &mut outfile)
            .map_err(|e| corrupt(format!("{}: {}", entry.name(), e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode & 0o7777))
                    .map_err(InstallError::io("cannot set permissions on", &outpath))?;
            }
        }
    }

    Ok(zip.len())
}
