use crate::errors::ToolError;
use crate::managers::{OperationResult, RemoteOps};
use crate::services::connection::{ConnectionParams, Credentials};
use crate::services::logger::Logger;
use crate::services::validation::Validation;
use clap::{Args, Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "sshdeploy",
    version,
    about = "Upload files, deploy archives and run commands over SSH"
)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct ConnectionArgs {
    /// Remote host name or IP address.
    #[arg(long, global = true, default_value = "")]
    pub host: String,
    #[arg(long, global = true)]
    pub port: Option<u32>,
    #[arg(long, short = 'u', global = true, default_value = "")]
    pub username: String,
    /// Falls back to SSHDEPLOY_PASSWORD.
    #[arg(long, global = true)]
    pub password: Option<String>,
    #[arg(long, global = true)]
    pub private_key_file: Option<PathBuf>,
    #[arg(long, global = true)]
    pub passphrase: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write text to a remote file. Reads stdin when --content is omitted.
    UploadContent {
        remote_path: String,
        #[arg(long)]
        content: Option<String>,
    },
    /// Upload a local file or directory tree.
    Upload {
        local_path: String,
        remote_path: String,
    },
    /// Upload an archive and extract it remotely.
    Deploy {
        local_path: String,
        remote_path: String,
        /// zip, tar or tar_gz; inferred from the file name when omitted.
        #[arg(long)]
        format: Option<String>,
    },
    /// Run a shell command remotely.
    Exec { command: String },
}

impl ConnectionArgs {
    /// Credentials come only from flags or the environment.
    pub fn into_params(self) -> Result<ConnectionParams, ToolError> {
        let password = self
            .password
            .or_else(|| std::env::var("SSHDEPLOY_PASSWORD").ok());
        let private_key = std::env::var("SSHDEPLOY_PRIVATE_KEY").ok();
        let credentials =
            Credentials::resolve(password, private_key, self.private_key_file, self.passphrase)?;
        ConnectionParams::new(&self.host, self.port, &self.username, credentials)
    }
}

pub struct App {
    pub logger: Logger,
    pub ops: RemoteOps,
}

impl App {
    pub fn initialize() -> Self {
        let logger = Logger::new("sshdeploy");
        let ops = RemoteOps::new(logger.clone(), Validation::new());
        Self { logger, ops }
    }

    pub async fn run(&self, cli: Cli) -> OperationResult {
        let params = match cli.connection.into_params() {
            Ok(params) => params,
            Err(err) => return OperationResult::Failure(format!("Error: {}", err.message)),
        };
        match cli.command {
            Command::UploadContent {
                remote_path,
                content,
            } => {
                let content = match content {
                    Some(content) => content,
                    None => match read_stdin() {
                        Ok(content) => content,
                        Err(err) => {
                            return OperationResult::Failure(format!(
                                "Error reading stdin: {}",
                                err
                            ))
                        }
                    },
                };
                self.ops
                    .upload_content(&params, &remote_path, &content)
                    .await
            }
            Command::Upload {
                local_path,
                remote_path,
            } => {
                self.ops
                    .upload_local_path(&params, &local_path, &remote_path)
                    .await
            }
            Command::Deploy {
                local_path,
                remote_path,
                format,
            } => {
                self.ops
                    .upload_and_extract(&params, &local_path, &remote_path, format.as_deref())
                    .await
            }
            Command::Exec { command } => self.ops.exec_command(&params, &command).await,
        }
    }
}

fn read_stdin() -> std::io::Result<String> {
    let mut content = String::new();
    std::io::stdin().read_to_string(&mut content)?;
    Ok(content)
}
