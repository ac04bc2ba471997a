pub mod exec;
pub mod fs;
pub mod paths;
pub mod session;

pub use exec::{CommandExecutor, ExecOutput};
pub use fs::{RemoteFilesystem, RemoteStat};
pub use session::{RemoteSession, SessionOpener, SshConnection, SshOpener, TransferSession};
