use std::env;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use log::debug;
use walkdir::{DirEntry, WalkDir};

use crate::errors::{Error, Result};

/// Extensions of sources that are replaced by their compiled `.js` output.
const COMPILED_SOURCE_EXTENSIONS: [&str; 3] = ["ts", "tsx", "jsx"];

/// Returns a PathBuf that is relative to the current working directory (CWD).
/// If the given path cannot be made relative, it returns the original path.
pub fn make_relative_to_cwd(path: &Path) -> PathBuf {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let relative_path = pathdiff::diff_paths(path, &cwd).unwrap_or_else(|| path.to_path_buf());
    normalize_path(&relative_path)
}

pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .map_err(|e| Error::Custom(format!("Failed to create directory: {:?}: {e}", path)))?;
    }
    Ok(())
}

/// Lexically resolve `.` and `..`. Leading `..` components are kept.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    let mut leading_parents = 0;

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                } else if components.is_empty() {
                    leading_parents += 1;
                }
            }
            other => components.push(other),
        }
    }

    let mut normalized_path = PathBuf::new();
    for _ in 0..leading_parents {
        normalized_path.push("..");
    }
    normalized_path.extend(components);
    normalized_path
}

/// Copy a project directory into `out_dir`, leaving out what the build
/// replaces: `.ts`/`.tsx`/`.jsx` sources, mirror directories named in
/// `skip_dirs`, and `out_dir` itself when it sits inside the project.
/// Returns the number of files copied.
pub fn copy_project_assets(project_dir: &Path, out_dir: &Path, skip_dirs: &[&str]) -> Result<usize> {
    let out_dir_abs = out_dir.canonicalize().ok();
    let keep = |entry: &DirEntry| {
        if entry.depth() == 0 {
            return true;
        }
        if entry.file_type().is_dir() {
            let name = entry.file_name().to_string_lossy();
            if skip_dirs.iter().any(|skip| *skip == name) {
                return false;
            }
            if let (Some(out), Ok(dir)) = (&out_dir_abs, entry.path().canonicalize()) {
                return &dir != out;
            }
            return true;
        }
        !is_compiled_source(entry.path())
    };

    let mut copied = 0;
    for entry in WalkDir::new(project_dir).into_iter().filter_entry(keep) {
        let entry = entry.map_err(|e| Error::Custom(format!("Failed to walk {:?}: {e}", project_dir)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(project_dir)
            .map_err(|e| Error::Custom(format!("{:?} is outside {:?}: {e}", entry.path(), project_dir)))?;
        let target = out_dir.join(relative);
        if let Some(parent) = target.parent() {
            ensure_directory_exists(parent)?;
        }
        std::fs::copy(entry.path(), &target).map_err(|e| {
            Error::Custom(format!(
                "Failed to copy file from {:?} to {:?}: {e}",
                entry.path(),
                target
            ))
        })?;
        debug!("Copied {}", relative.display());
        copied += 1;
    }
    Ok(copied)
}

pub fn is_compiled_source(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| COMPILED_SOURCE_EXTENSIONS.contains(&ext))
}
