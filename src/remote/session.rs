use crate::constants::sftp::{DIR_MODE, FILE_MODE};
use crate::errors::{RemoteFsError, ToolError};
use crate::remote::exec::{drain_interleaved, CommandExecutor, ExecOutput};
use crate::remote::fs::{RemoteFilesystem, RemoteStat};
use crate::services::connection::{connect_session, ConnectionParams};
use ssh2::{OpenFlags, OpenType, Session, Sftp};
use std::io::Read;
use std::path::Path;

/// An authenticated SSH connection, disconnected when dropped.
pub struct SshConnection {
    session: Session,
    host: String,
}

impl SshConnection {
    pub fn open(params: &ConnectionParams) -> Result<Self, ToolError> {
        let session = connect_session(params)?;
        Ok(Self {
            session,
            host: params.host.clone(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn run(&self, command: &str) -> Result<ExecOutput, ToolError> {
        let mut channel = self.session.channel_session()?;
        channel.exec(command)?;

        self.session.set_blocking(false);
        let drained = {
            let mut stdout = channel.stream(0);
            let mut stderr = channel.stderr();
            drain_interleaved(&mut stdout, &mut stderr, || channel.eof())
        };
        self.session.set_blocking(true);
        let (stdout, stderr) = drained?;

        channel.wait_close()?;
        let exit_status = channel.exit_status()?;
        Ok(ExecOutput {
            exit_status,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

impl CommandExecutor for SshConnection {
    fn exec(&self, command: &str) -> Result<ExecOutput, ToolError> {
        self.run(command)
    }
}

impl Drop for SshConnection {
    fn drop(&mut self) {
        self.session.set_blocking(true);
        let _ = self.session.disconnect(None, "closing", None);
    }
}

/// Anything an archive or tree operation can drive: SFTP plus exec.
pub trait RemoteSession: RemoteFilesystem + CommandExecutor {}

impl<T: RemoteFilesystem + CommandExecutor> RemoteSession for T {}

/// Opens the per-operation sessions. Each call yields a fresh session that
/// is released when the returned box is dropped.
pub trait SessionOpener: Send + Sync {
    fn open_transfer(&self, params: &ConnectionParams)
        -> Result<Box<dyn RemoteSession>, ToolError>;

    fn open_exec(&self, params: &ConnectionParams) -> Result<Box<dyn CommandExecutor>, ToolError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SshOpener;

impl SessionOpener for SshOpener {
    fn open_transfer(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn RemoteSession>, ToolError> {
        Ok(Box::new(TransferSession::open(params)?))
    }

    fn open_exec(&self, params: &ConnectionParams) -> Result<Box<dyn CommandExecutor>, ToolError> {
        Ok(Box::new(SshConnection::open(params)?))
    }
}

/// A connection plus its SFTP channel, owned by exactly one operation.
pub struct TransferSession {
    // Field order is drop order: the SFTP channel closes before the connection.
    sftp: Sftp,
    connection: SshConnection,
}

impl TransferSession {
    pub fn open(params: &ConnectionParams) -> Result<Self, ToolError> {
        let connection = SshConnection::open(params)?;
        let sftp = connection.session.sftp()?;
        Ok(Self { sftp, connection })
    }

    pub fn host(&self) -> &str {
        self.connection.host()
    }
}

impl CommandExecutor for TransferSession {
    fn exec(&self, command: &str) -> Result<ExecOutput, ToolError> {
        self.connection.run(command)
    }
}

impl RemoteFilesystem for TransferSession {
    fn stat(&self, path: &str) -> Result<RemoteStat, RemoteFsError> {
        let stat = self
            .sftp
            .stat(Path::new(path))
            .map_err(|err| RemoteFsError::from_ssh("stat", path, &err))?;
        Ok(RemoteStat {
            is_dir: stat.is_dir(),
            size: stat.size,
        })
    }

    fn mkdir(&self, path: &str) -> Result<(), RemoteFsError> {
        self.sftp
            .mkdir(Path::new(path), DIR_MODE)
            .map_err(|err| RemoteFsError::from_ssh("mkdir", path, &err))
    }

    fn remove(&self, path: &str) -> Result<(), RemoteFsError> {
        self.sftp
            .unlink(Path::new(path))
            .map_err(|err| RemoteFsError::from_ssh("remove", path, &err))
    }

    fn write_from_reader(
        &self,
        reader: &mut dyn Read,
        path: &str,
    ) -> Result<u64, RemoteFsError> {
        let mut file = self
            .sftp
            .open_mode(
                Path::new(path),
                OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
                FILE_MODE,
                OpenType::File,
            )
            .map_err(|err| RemoteFsError::from_ssh("open", path, &err))?;
        let written = std::io::copy(reader, &mut file)
            .map_err(|err| RemoteFsError::failed("write", path, err.to_string()))?;
        file.close()
            .map_err(|err| RemoteFsError::from_ssh("close", path, &err))?;
        Ok(written)
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, RemoteFsError> {
        let mut file = self
            .sftp
            .open(Path::new(path))
            .map_err(|err| RemoteFsError::from_ssh("open", path, &err))?;
        let mut out = Vec::new();
        file.read_to_end(&mut out)
            .map_err(|err| RemoteFsError::failed("read", path, err.to_string()))?;
        Ok(out)
    }
}
