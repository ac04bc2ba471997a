use crate::constants::sftp::COPY_BUFFER_BYTES;
use crate::errors::RemoteFsError;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteStat {
    pub is_dir: bool,
    pub size: Option<u64>,
}

/// Filesystem operations over an open remote session. Every call takes an
/// explicit path; there is no working-directory state.
pub trait RemoteFilesystem {
    fn stat(&self, path: &str) -> Result<RemoteStat, RemoteFsError>;

    fn mkdir(&self, path: &str) -> Result<(), RemoteFsError>;

    fn remove(&self, path: &str) -> Result<(), RemoteFsError>;

    /// Creates or truncates `path` and streams `reader` into it.
    fn write_from_reader(&self, reader: &mut dyn Read, path: &str)
        -> Result<u64, RemoteFsError>;

    fn read_file(&self, path: &str) -> Result<Vec<u8>, RemoteFsError>;

    fn put_bytes(&self, bytes: &[u8], path: &str) -> Result<u64, RemoteFsError> {
        let mut reader = bytes;
        self.write_from_reader(&mut reader, path)
    }

    fn put_file(&self, local: &Path, path: &str) -> Result<u64, RemoteFsError> {
        let local_io = |source| RemoteFsError::LocalIo {
            path: local.display().to_string(),
            source,
        };
        let file = File::open(local).map_err(local_io)?;
        let mut reader = BufReader::with_capacity(COPY_BUFFER_BYTES, file);
        self.write_from_reader(&mut reader, path)
    }
}
