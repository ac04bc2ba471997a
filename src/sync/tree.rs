use crate::errors::{RemoteFsError, ToolError};
use crate::remote::fs::RemoteFilesystem;
use crate::remote::paths::{
    join_relative, join_remote, local_basename, looks_like_dir, split_parent,
};
use crate::services::logger::Logger;
use crate::sync::ensure::{
    create_dir_if_missing, ensure_dir_exists, log_tolerated_race, DirOutcome,
};
use serde::Serialize;
use std::path::Path;
use walkdir::WalkDir;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TreeUploadSummary {
    pub directories_created: usize,
    pub directories_existing: usize,
    pub files_uploaded: usize,
    pub bytes_uploaded: u64,
    pub skipped: Vec<String>,
}

/// Final remote path for a single-file upload: a destination ending in a
/// separator names a directory, so the local basename is appended.
pub fn resolve_file_target(local_file: &Path, remote_path: &str) -> String {
    if !looks_like_dir(remote_path) {
        return remote_path.replace('\\', "/");
    }
    match local_basename(local_file) {
        Some(name) => join_remote(remote_path, &name),
        None => remote_path.replace('\\', "/"),
    }
}

#[derive(Clone)]
pub struct TreeUploader {
    logger: Logger,
}

impl TreeUploader {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger: logger.child("tree"),
        }
    }

    /// Uploads one local file, creating the remote parent directories.
    pub fn upload_file<F>(
        &self,
        fs: &F,
        local_file: &Path,
        remote_path: &str,
    ) -> Result<u64, ToolError>
    where
        F: RemoteFilesystem + ?Sized,
    {
        let target = resolve_file_target(local_file, remote_path);
        let (parent, _) = split_parent(&target);
        ensure_dir_exists(fs, &parent)?.log_races(&self.logger);
        let bytes = fs.put_file(local_file, &target)?;
        self.logger.debug(
            "file uploaded",
            Some(&serde_json::json!({"remote_path": target, "bytes": bytes})),
        );
        Ok(bytes)
    }

    /// Mirrors `local_dir` onto `remote_base`. Directories are visited before
    /// their contents, so every remote parent exists before a file lands in
    /// it. Existing remote files are overwritten. The first unrecoverable
    /// failure aborts the walk; whatever was already uploaded stays.
    pub fn upload_tree<F>(
        &self,
        fs: &F,
        local_dir: &Path,
        remote_base: &str,
    ) -> Result<TreeUploadSummary, ToolError>
    where
        F: RemoteFilesystem + ?Sized,
    {
        if !local_dir.is_dir() {
            return Err(ToolError::invalid_params(format!(
                "Local path '{}' is not a directory",
                local_dir.display()
            )));
        }
        ensure_dir_exists(fs, remote_base)
            .map_err(|err| step_error("ensure base directory", err))?
            .log_races(&self.logger);

        let mut summary = TreeUploadSummary::default();
        let walker = WalkDir::new(local_dir)
            .follow_links(false)
            .sort_by_file_name()
            .min_depth(1);

        for entry in walker {
            let entry = entry.map_err(|err| {
                ToolError::internal(format!("Failed to walk local directory: {}", err))
            })?;
            let relative = entry.path().strip_prefix(local_dir).map_err(|_| {
                ToolError::internal(format!(
                    "Walked outside of local root: {}",
                    entry.path().display()
                ))
            })?;
            let remote = join_relative(remote_base, relative);

            let file_type = entry.file_type();
            if file_type.is_dir() {
                self.mirror_dir(fs, &remote, &mut summary)?;
            } else if file_type.is_file() {
                self.mirror_file(fs, entry.path(), &remote, &mut summary)?;
            } else if file_type.is_symlink() {
                // Links are resolved once and never descended into.
                match std::fs::metadata(entry.path()) {
                    Ok(meta) if meta.is_file() => {
                        self.mirror_file(fs, entry.path(), &remote, &mut summary)?
                    }
                    Ok(meta) if meta.is_dir() => self.mirror_dir(fs, &remote, &mut summary)?,
                    _ => self.skip(entry.path(), "dangling symlink", &mut summary),
                }
            } else {
                self.skip(entry.path(), "not a regular file", &mut summary);
            }
        }

        self.logger.info(
            "tree uploaded",
            Some(&serde_json::json!({
                "local_dir": local_dir.display().to_string(),
                "remote_base": remote_base,
                "files": summary.files_uploaded,
                "directories_created": summary.directories_created,
            })),
        );
        Ok(summary)
    }

    fn mirror_dir<F>(
        &self,
        fs: &F,
        remote: &str,
        summary: &mut TreeUploadSummary,
    ) -> Result<(), ToolError>
    where
        F: RemoteFilesystem + ?Sized,
    {
        let outcome =
            create_dir_if_missing(fs, remote).map_err(|err| step_error("create directory", err))?;
        match outcome {
            DirOutcome::Created => {
                summary.directories_created += 1;
                self.logger.debug(
                    "directory created",
                    Some(&serde_json::json!({"remote_path": remote})),
                );
            }
            DirOutcome::Existing => summary.directories_existing += 1,
            DirOutcome::RaceTolerated => {
                summary.directories_existing += 1;
                log_tolerated_race(&self.logger, remote);
            }
        }
        Ok(())
    }

    fn mirror_file<F>(
        &self,
        fs: &F,
        local: &Path,
        remote: &str,
        summary: &mut TreeUploadSummary,
    ) -> Result<(), ToolError>
    where
        F: RemoteFilesystem + ?Sized,
    {
        let bytes = fs
            .put_file(local, remote)
            .map_err(|err| step_error("upload file", err))?;
        summary.files_uploaded += 1;
        summary.bytes_uploaded += bytes;
        Ok(())
    }

    fn skip(&self, local: &Path, reason: &str, summary: &mut TreeUploadSummary) {
        self.logger.warn(
            "skipping local entry",
            Some(&serde_json::json!({"path": local.display().to_string(), "reason": reason})),
        );
        summary.skipped.push(local.display().to_string());
    }
}

fn step_error(step: &str, err: RemoteFsError) -> ToolError {
    let base: ToolError = err.into();
    let message = format!("{} failed: {}", step, base.message);
    ToolError { message, ..base }
}
