use crate::errors::{ToolError, ToolErrorKind};
use crate::remote::exec::CommandExecutor;
use crate::remote::fs::RemoteFilesystem;
use crate::remote::paths::{join_remote, local_basename, shell_quote};
use crate::services::logger::Logger;
use crate::sync::ensure::ensure_dir_exists;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const FORMAT_HINT: &str = "Please specify 'zip', 'tar', or 'tar_gz'.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
}

impl ArchiveFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::TarGz => "tar_gz",
        }
    }

    /// Infers the format from the file name suffix, ignoring case.
    pub fn infer(path: &Path) -> Option<Self> {
        let name = local_basename(path)?.to_lowercase();
        if name.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveFormat::TarGz)
        } else if name.ends_with(".tar") {
            Some(ArchiveFormat::Tar)
        } else {
            None
        }
    }

    /// An explicit format wins; otherwise the suffix decides.
    pub fn resolve(explicit: Option<ArchiveFormat>, path: &Path) -> Result<Self, ToolError> {
        if let Some(format) = explicit {
            return Ok(format);
        }
        ArchiveFormat::infer(path).ok_or_else(|| {
            ToolError::invalid_params(format!("Error: Could not infer format. {}", FORMAT_HINT))
                .with_details(serde_json::json!({"local_path": path.display().to_string()}))
        })
    }

    /// Shell command that unpacks `archive` into `dest`, overwriting files.
    pub fn extract_command(self, archive: &str, dest: &str) -> String {
        let archive = shell_quote(archive);
        let dest = shell_quote(dest);
        match self {
            ArchiveFormat::Zip => format!("unzip -o {} -d {}", archive, dest),
            ArchiveFormat::TarGz => format!("tar -xzf {} -C {}", archive, dest),
            ArchiveFormat::Tar => format!("tar -xf {} -C {}", archive, dest),
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveFormat {
    type Err = ToolError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "zip" => Ok(ArchiveFormat::Zip),
            "tar" => Ok(ArchiveFormat::Tar),
            "tar_gz" | "tar.gz" | "tgz" => Ok(ArchiveFormat::TarGz),
            other => Err(ToolError::invalid_params(format!(
                "Error: Unsupported format '{}'. {}",
                other, FORMAT_HINT
            ))),
        }
    }
}

/// Progress of one deployment, reported with any failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStage {
    Idle,
    DirEnsured,
    ArchiveUploaded,
    Extracted,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    pub remote_dir: String,
    pub remote_archive_path: String,
    pub format: ArchiveFormat,
    pub command: String,
    pub bytes_uploaded: u64,
    pub stdout: String,
}

/// A validated deployment request. Building one touches only the local
/// filesystem, so precondition failures never open a connection.
#[derive(Debug, Clone)]
pub struct ArchiveDeployment {
    local_archive: PathBuf,
    remote_dir: String,
    format: ArchiveFormat,
    file_name: String,
}

impl ArchiveDeployment {
    pub fn prepare(
        local_archive: &Path,
        remote_dir: &str,
        format: Option<ArchiveFormat>,
    ) -> Result<Self, ToolError> {
        if !local_archive.exists() {
            return Err(ToolError::invalid_params(format!(
                "Error: Local path '{}' does not exist.",
                local_archive.display()
            )));
        }
        if !local_archive.is_file() {
            return Err(ToolError::invalid_params(format!(
                "Error: Local path '{}' is not a file.",
                local_archive.display()
            )));
        }
        let format = ArchiveFormat::resolve(format, local_archive)?;
        let file_name = local_basename(local_archive).ok_or_else(|| {
            ToolError::invalid_params(format!(
                "Error: Local path '{}' has no file name.",
                local_archive.display()
            ))
        })?;
        Ok(Self {
            local_archive: local_archive.to_path_buf(),
            remote_dir: remote_dir.replace('\\', "/"),
            format,
            file_name,
        })
    }

    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    pub fn remote_archive_path(&self) -> String {
        join_remote(&self.remote_dir, &self.file_name)
    }

    pub fn extract_command(&self) -> String {
        self.format
            .extract_command(&self.remote_archive_path(), &self.remote_dir)
    }
}

/// Removes the uploaded archive when dropped, on success, error or unwind.
struct RemoteCleanup<'a, F: RemoteFilesystem + ?Sized> {
    fs: &'a F,
    path: String,
    logger: &'a Logger,
}

impl<F: RemoteFilesystem + ?Sized> Drop for RemoteCleanup<'_, F> {
    fn drop(&mut self) {
        match self.fs.remove(&self.path) {
            Ok(()) => self.logger.debug(
                "archive removed",
                Some(&serde_json::json!({"remote_path": self.path})),
            ),
            Err(err) => self.logger.debug(
                "archive cleanup failed",
                Some(&serde_json::json!({"remote_path": self.path, "error": err.to_string()})),
            ),
        }
    }
}

#[derive(Clone)]
pub struct ArchiveDeployer {
    logger: Logger,
}

impl ArchiveDeployer {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger: logger.child("archive"),
        }
    }

    /// Upload, extract, then always remove the uploaded archive. A cleanup
    /// failure is logged and never replaces the primary result.
    pub fn deploy<F, X>(
        &self,
        fs: &F,
        executor: &X,
        deployment: &ArchiveDeployment,
    ) -> Result<DeployReport, ToolError>
    where
        F: RemoteFilesystem + ?Sized,
        X: CommandExecutor + ?Sized,
    {
        let mut stage = DeployStage::Idle;
        ensure_dir_exists(fs, &deployment.remote_dir)
            .map_err(|err| at_stage(err.into(), stage))?
            .log_races(&self.logger);
        stage = DeployStage::DirEnsured;

        let remote_archive_path = deployment.remote_archive_path();
        let _cleanup = RemoteCleanup {
            fs,
            path: remote_archive_path.clone(),
            logger: &self.logger,
        };

        let bytes_uploaded = fs
            .put_file(&deployment.local_archive, &remote_archive_path)
            .map_err(|err| at_stage(err.into(), stage))?;
        stage = DeployStage::ArchiveUploaded;

        let command = deployment.extract_command();
        self.logger.debug(
            "extracting archive",
            Some(&serde_json::json!({"format": deployment.format, "command": command})),
        );
        let output = executor.exec(&command).map_err(|err| {
            let err = ToolError::new(
                ToolErrorKind::Internal,
                "EXEC_FAILED",
                format!("Failed to run extraction command: {}", err.message),
            );
            at_stage(err, stage)
        })?;
        if !output.success() {
            let err = ToolError::command_failed(format!("Error extracting: {}", output.stderr))
                .with_details(serde_json::json!({
                    "stage": stage,
                    "exit_status": output.exit_status,
                    "command": command,
                }));
            return Err(err);
        }

        self.logger.info(
            "archive extracted",
            Some(&serde_json::json!({
                "stage": DeployStage::Extracted,
                "remote_dir": deployment.remote_dir,
                "format": deployment.format,
            })),
        );
        Ok(DeployReport {
            remote_dir: deployment.remote_dir.clone(),
            remote_archive_path,
            format: deployment.format,
            command,
            bytes_uploaded,
            stdout: output.stdout,
        })
    }

    pub fn deploy_archive<F, X>(
        &self,
        fs: &F,
        executor: &X,
        local_archive: &Path,
        remote_dir: &str,
        format: Option<ArchiveFormat>,
    ) -> Result<DeployReport, ToolError>
    where
        F: RemoteFilesystem + ?Sized,
        X: CommandExecutor + ?Sized,
    {
        let deployment = ArchiveDeployment::prepare(local_archive, remote_dir, format)?;
        self.deploy(fs, executor, &deployment)
    }
}

fn at_stage(err: ToolError, stage: DeployStage) -> ToolError {
    let details = serde_json::json!({"stage": stage});
    err.with_details(details)
}
