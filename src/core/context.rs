use crate::utils::error::{BootstrapError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Empties `dir` (creating it when missing) so every build starts clean.
pub fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Copies one file into `dest_dir`, keeping its file name.
pub fn copy_file_into(src: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let name = src.file_name().ok_or_else(|| BootstrapError::InvalidConfigValueError {
        field: "build.manifest".to_string(),
        value: src.display().to_string(),
        reason: "Path has no file name".to_string(),
    })?;
    let dest = dest_dir.join(name);
    fs::copy(src, &dest)?;
    Ok(dest)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyStats {
    pub files: usize,
    pub dirs: usize,
    pub bytes: u64,
}

/// Copies the whole build context into `dest`, verbatim.
///
/// Entries under any of `skip` are left out; this keeps an image directory
/// that lives inside its own context from being copied into itself.
pub fn copy_context(context: &Path, dest: &Path, skip: &[PathBuf]) -> Result<CopyStats> {
    if !context.is_dir() {
        return Err(BootstrapError::ContextMissing {
            path: context.to_path_buf(),
        });
    }

    let context = context.canonicalize()?;
    let skip: Vec<PathBuf> = skip
        .iter()
        .filter_map(|p| p.canonicalize().ok())
        .collect();
    let dest_canonical = dest.canonicalize().unwrap_or_else(|_| dest.to_path_buf());

    let mut stats = CopyStats::default();
    let mut walker = WalkDir::new(&context).min_depth(1).into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| {
            BootstrapError::IoError(std::io::Error::other(format!(
                "Directory traversal error: {}",
                e
            )))
        })?;
        let path = entry.path();

        if skip.iter().any(|s| path.starts_with(s)) || dest_canonical.starts_with(path) {
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }

        let relative = path.strip_prefix(&context).map_err(|e| {
            BootstrapError::IoError(std::io::Error::other(e.to_string()))
        })?;
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            let link_target = fs::read_link(path)?;
            let _ = fs::remove_file(&target);
            #[cfg(unix)]
            std::os::unix::fs::symlink(&link_target, &target)?;
            #[cfg(not(unix))]
            {
                let _ = link_target;
                fs::copy(path, &target)?;
            }
            stats.files += 1;
        } else if file_type.is_dir() {
            fs::create_dir_all(&target)?;
            stats.dirs += 1;
        } else {
            stats.bytes += fs::copy(path, &target)?;
            stats.files += 1;
        }
    }

    Ok(stats)
}
