//! Crash-safe persistence of rendered categories
//!
//! A category is written into a hidden staging directory next to its canonical
//! directory, every file is synced, and only then is the staging directory
//! promoted by rename. The previous canonical directory is moved aside to a
//! backup first and removed once the new one is in place.
//!
//! # Known limitation
//!
//! The swap is two renames, not one atomic exchange. If the process dies
//! between them, the canonical directory is missing and the backup holds the
//! previous state, so a reader looking at that moment sees no category at all.
//! Nothing is lost: [`LocalWriter::recover`] (run before every write) moves the
//! backup back. Closing the window needs `renameat2(RENAME_EXCHANGE)`, which is
//! Linux-only and not exposed by `std`.

use crate::category::ArtifactSet;
use crate::error::CategoryError;
use crate::types::Category;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Writes artifact sets below a tenant's local directory
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalWriter;

impl LocalWriter {
    /// Replace `local_directory/<category dir>` with `artifacts`
    ///
    /// Runs on the blocking thread pool. Once started, the write runs to
    /// completion even if the calling future is dropped, so a cancelled fetch
    /// never leaves a half-promoted directory behind.
    ///
    /// Returns the number of files written.
    pub async fn write(
        &self,
        local_directory: &Path,
        category: Category,
        artifacts: ArtifactSet,
    ) -> Result<usize, CategoryError> {
        let root = local_directory.to_path_buf();
        tokio::task::spawn_blocking(move || write_category(&root, category, &artifacts))
            .await
            .map_err(|e| CategoryError::Io(format!("writer task failed: {}", e)))?
    }

    /// Restore the state left behind by an interrupted write
    pub fn recover(&self, local_directory: &Path, category: Category) -> Result<(), CategoryError> {
        recover(&CategoryPaths::new(local_directory, category))
    }
}

struct CategoryPaths<'a> {
    root: &'a Path,
    canonical: PathBuf,
    backup: PathBuf,
    staging_prefix: String,
}

impl<'a> CategoryPaths<'a> {
    fn new(root: &'a Path, category: Category) -> Self {
        let name = category.directory_name();
        Self {
            root,
            canonical: root.join(name),
            backup: root.join(format!(".{}.backup", name)),
            staging_prefix: format!(".{}.staging-", name),
        }
    }
}

fn recover(paths: &CategoryPaths<'_>) -> Result<(), CategoryError> {
    if paths.backup.is_dir() {
        if paths.canonical.exists() {
            // Promotion finished, only the cleanup was lost
            fs::remove_dir_all(&paths.backup)?;
        } else {
            tracing::warn!(
                backup = %paths.backup.display(),
                "Restoring category directory from interrupted write"
            );
            fs::rename(&paths.backup, &paths.canonical)?;
        }
    }

    if !paths.root.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(paths.root)? {
        let entry = entry?;
        let is_stale_staging = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(&paths.staging_prefix));
        if is_stale_staging && entry.file_type()?.is_dir() {
            tracing::debug!(path = %entry.path().display(), "Removing stale staging directory");
            fs::remove_dir_all(entry.path())?;
        }
    }
    Ok(())
}

fn write_category(
    root: &Path,
    category: Category,
    artifacts: &ArtifactSet,
) -> Result<usize, CategoryError> {
    fs::create_dir_all(root)?;
    let paths = CategoryPaths::new(root, category);
    recover(&paths)?;

    let staging = tempfile::Builder::new()
        .prefix(&paths.staging_prefix)
        .tempdir_in(root)?;

    for dir in artifacts.dirs() {
        fs::create_dir_all(staging.path().join(checked(dir)?))?;
    }
    for (relative, contents) in artifacts.files() {
        let target = staging.path().join(checked(relative)?);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&target)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }

    let had_previous = paths.canonical.exists();
    if had_previous {
        fs::rename(&paths.canonical, &paths.backup)?;
    }

    if let Err(e) = fs::rename(staging.path(), &paths.canonical) {
        if had_previous {
            fs::rename(&paths.backup, &paths.canonical)?;
        }
        return Err(e.into());
    }
    sync_dir(root);

    if had_previous && let Err(e) = fs::remove_dir_all(&paths.backup) {
        // The new directory is already in place; the next write cleans up
        tracing::warn!(
            backup = %paths.backup.display(),
            error = %e,
            "Failed to remove previous category directory"
        );
    }

    tracing::debug!(
        category = %category,
        path = %paths.canonical.display(),
        files = artifacts.len(),
        "Category written"
    );

    // `staging` no longer exists on disk; dropping it is a no-op
    drop(staging);
    Ok(artifacts.len())
}

/// Artifact paths must stay inside the category directory
fn checked(path: &Path) -> Result<&Path, CategoryError> {
    if path
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        Ok(path)
    } else {
        Err(CategoryError::Io(format!(
            "refusing to write outside category directory: {}",
            path.display()
        )))
    }
}

/// Persist the renames in `dir`
fn sync_dir(dir: &Path) {
    #[cfg(unix)]
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        tracing::debug!(path = %dir.display(), error = %e, "Directory sync failed");
    }
    #[cfg(not(unix))]
    let _ = dir;
}
