//! Declaration file discovery without a require graph
//!
//! Every immediate subdirectory of the root is one product. A root without subdirectories is scanned directly.
use crate::require::{has_extension, RequireError};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Declaration files grouped by directory, both in file name order
pub fn discover(root: &Path, extension: &str) -> Result<Vec<PathBuf>, RequireError> {
    let subdirectories: Vec<PathBuf> = entries(root)?
        .into_iter()
        .filter(|path| path.is_dir())
        .filter(|path| !is_hidden(path))
        .collect();

    let directories = if subdirectories.is_empty() {
        tracing::debug!(root = %root.display(), "no subdirectories, scanning root");
        vec![root.to_path_buf()]
    } else {
        subdirectories
    };

    let mut files = vec![];
    for directory in directories {
        let found: Vec<PathBuf> = entries(&directory)?
            .into_iter()
            .filter(|path| path.is_file() && has_extension(path, extension))
            .collect();

        tracing::debug!(directory = %directory.display(), files = found.len(), "discovered");
        files.extend(found);
    }

    Ok(files)
}

fn entries(directory: &Path) -> Result<Vec<PathBuf>, RequireError> {
    let mut paths = vec![];
    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        paths.push(entry?.into_path());
    }
    Ok(paths)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}
