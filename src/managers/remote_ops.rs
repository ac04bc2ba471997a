use crate::errors::ToolError;
use crate::remote::exec::{CommandExecutor, ExecOutput};
use crate::remote::fs::RemoteFilesystem;
use crate::remote::session::{RemoteSession, SessionOpener, SshOpener};
use crate::services::connection::ConnectionParams;
use crate::services::logger::Logger;
use crate::services::validation::Validation;
use crate::sync::archive::{ArchiveDeployer, ArchiveDeployment, ArchiveFormat};
use crate::sync::tree::{resolve_file_target, TreeUploader};
use std::fmt;
use std::sync::Arc;

/// Outcome of a caller-facing operation: always a message, never silent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    Success(String),
    Failure(String),
}

impl OperationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success(_))
    }

    pub fn message(&self) -> &str {
        match self {
            OperationResult::Success(message) | OperationResult::Failure(message) => message,
        }
    }

    pub fn into_message(self) -> String {
        match self {
            OperationResult::Success(message) | OperationResult::Failure(message) => message,
        }
    }

    fn from_result(result: Result<String, ToolError>, context: &str) -> Self {
        match result {
            Ok(message) => OperationResult::Success(message),
            Err(err) => OperationResult::Failure(render_failure(context, &err)),
        }
    }
}

impl fmt::Display for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

fn render_failure(context: &str, err: &ToolError) -> String {
    let mut message = if err.is_self_describing() {
        if err.message.starts_with("Error") {
            err.message.clone()
        } else {
            format!("Error: {}", err.message)
        }
    } else {
        format!("Error {}: {}", context, err.message)
    };
    if let Some(hint) = &err.hint {
        message.push_str("\nhint: ");
        message.push_str(hint);
    }
    message
}

pub fn format_exec_output(output: &ExecOutput) -> String {
    let mut result = format!("Command exited with status {}\n", output.exit_status);
    if !output.stdout.is_empty() {
        result.push_str(&format!("STDOUT:\n{}\n", output.stdout));
    }
    if !output.stderr.is_empty() {
        result.push_str(&format!("STDERR:\n{}\n", output.stderr));
    }
    result
}

#[derive(Clone)]
pub struct RemoteOps {
    logger: Logger,
    validation: Validation,
    tree_uploader: TreeUploader,
    archive_deployer: ArchiveDeployer,
    opener: Arc<dyn SessionOpener>,
}

impl RemoteOps {
    pub fn new(logger: Logger, validation: Validation) -> Self {
        let logger = logger.child("ops");
        Self {
            tree_uploader: TreeUploader::new(logger.clone()),
            archive_deployer: ArchiveDeployer::new(logger.clone()),
            logger,
            validation,
            opener: Arc::new(SshOpener),
        }
    }

    /// Replaces how sessions are opened; every operation still gets its own.
    pub fn with_opener(mut self, opener: Arc<dyn SessionOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub async fn upload_content(
        &self,
        params: &ConnectionParams,
        remote_path: &str,
        content: &str,
    ) -> OperationResult {
        let result = self.upload_content_inner(params, remote_path, content).await;
        self.finish(
            "upload_content",
            OperationResult::from_result(result, "uploading content"),
        )
    }

    async fn upload_content_inner(
        &self,
        params: &ConnectionParams,
        remote_path: &str,
        content: &str,
    ) -> Result<String, ToolError> {
        let remote_path = self.validation.ensure_remote_path(remote_path, "remote_path")?;
        let bytes = content.as_bytes().to_vec();
        let target = remote_path.clone();
        self.with_transfer(params, move |session| {
            session.put_bytes(&bytes, &target)?;
            Ok(())
        })
        .await?;
        Ok(format!(
            "Successfully uploaded content to {} on {}",
            remote_path, params.host
        ))
    }

    pub async fn upload_local_path(
        &self,
        params: &ConnectionParams,
        local_path: &str,
        remote_path: &str,
    ) -> OperationResult {
        let result = self
            .upload_local_path_inner(params, local_path, remote_path)
            .await;
        self.finish(
            "upload_local_path",
            OperationResult::from_result(result, "uploading local path"),
        )
    }

    async fn upload_local_path_inner(
        &self,
        params: &ConnectionParams,
        local_path: &str,
        remote_path: &str,
    ) -> Result<String, ToolError> {
        let local = self.validation.ensure_local_path(local_path)?;
        let remote_path = self.validation.ensure_remote_path(remote_path, "remote_path")?;

        if local.is_file() {
            let target = resolve_file_target(&local, &remote_path);
            let uploader = self.tree_uploader.clone();
            let remote = target.clone();
            self.with_transfer(params, move |session| {
                uploader.upload_file(session, &local, &remote)
            })
            .await?;
            return Ok(format!(
                "Successfully uploaded file '{}' to '{}'",
                local_path, target
            ));
        }

        if local.is_dir() {
            let uploader = self.tree_uploader.clone();
            let remote = remote_path.clone();
            self.with_transfer(params, move |session| {
                uploader.upload_tree(session, &local, &remote)
            })
            .await?;
            return Ok(format!(
                "Successfully uploaded directory '{}' to '{}'",
                local_path, remote_path
            ));
        }

        Err(ToolError::invalid_params(format!(
            "Error: Local path '{}' is neither a file nor a directory.",
            local_path
        )))
    }

    pub async fn upload_and_extract(
        &self,
        params: &ConnectionParams,
        local_path: &str,
        remote_path: &str,
        format: Option<&str>,
    ) -> OperationResult {
        let result = self
            .upload_and_extract_inner(params, local_path, remote_path, format)
            .await;
        self.finish(
            "upload_and_extract",
            OperationResult::from_result(result, "processing archive"),
        )
    }

    async fn upload_and_extract_inner(
        &self,
        params: &ConnectionParams,
        local_path: &str,
        remote_path: &str,
        format: Option<&str>,
    ) -> Result<String, ToolError> {
        let local = self.validation.ensure_local_path(local_path)?;
        let remote_path = self.validation.ensure_remote_path(remote_path, "remote_path")?;
        let explicit = format
            .filter(|raw| !raw.trim().is_empty())
            .map(str::parse::<ArchiveFormat>)
            .transpose()?;
        let deployment = ArchiveDeployment::prepare(&local, &remote_path, explicit)?;

        let deployer = self.archive_deployer.clone();
        self.with_transfer(params, move |session| {
            deployer.deploy(session, session, &deployment)
        })
        .await?;
        Ok(format!(
            "Successfully uploaded and extracted '{}' to '{}'",
            local_path, remote_path
        ))
    }

    pub async fn exec_command(&self, params: &ConnectionParams, command: &str) -> OperationResult {
        let result = self.exec_command_inner(params, command).await;
        self.finish(
            "exec_command",
            OperationResult::from_result(result, "executing command"),
        )
    }

    async fn exec_command_inner(
        &self,
        params: &ConnectionParams,
        command: &str,
    ) -> Result<String, ToolError> {
        let command = self.validation.ensure_string(command, "command", false)?;
        let params = params.clone();
        let opener = self.opener.clone();
        let output = tokio::task::spawn_blocking(move || {
            let connection = opener.open_exec(&params)?;
            connection.exec(&command)
        })
        .await
        .map_err(|_| ToolError::internal("SSH exec task failed"))??;
        Ok(format_exec_output(&output))
    }

    /// Opens one transfer session for `handler` on the blocking pool. The
    /// session is dropped, SFTP channel first, on every exit path.
    async fn with_transfer<F, T>(
        &self,
        params: &ConnectionParams,
        handler: F,
    ) -> Result<T, ToolError>
    where
        F: FnOnce(&dyn RemoteSession) -> Result<T, ToolError> + Send + 'static,
        T: Send + 'static,
    {
        let params = params.clone();
        self.logger.debug("opening transfer session", Some(&params.describe()));
        let opener = self.opener.clone();
        tokio::task::spawn_blocking(move || {
            let session = opener.open_transfer(&params)?;
            handler(session.as_ref())
        })
        .await
        .map_err(|_| ToolError::internal("SSH SFTP task failed"))?
    }

    fn finish(&self, operation: &str, result: OperationResult) -> OperationResult {
        match &result {
            OperationResult::Success(_) => self.logger.info(
                "operation succeeded",
                Some(&serde_json::json!({"operation": operation})),
            ),
            OperationResult::Failure(message) => self.logger.warn(
                "operation failed",
                Some(&serde_json::json!({"operation": operation, "error": message})),
            ),
        }
        result
    }
}
