#![allow(dead_code)]

use sshdeploy::errors::{RemoteFsError, ToolError};
use sshdeploy::remote::paths::split_parent;
use sshdeploy::remote::{
    CommandExecutor, ExecOutput, RemoteFilesystem, RemoteSession, RemoteStat, SessionOpener,
};
use sshdeploy::services::connection::ConnectionParams;
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub static ENV_LOCK: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

pub type Journal = Arc<Mutex<Vec<String>>>;

#[derive(Clone, Copy, Debug)]
pub enum MkdirFault {
    /// Someone else creates the directory just before our mkdir lands.
    LosesRace,
    Denied,
}

#[derive(Default)]
struct State {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    mkdir_faults: HashMap<String, MkdirFault>,
    put_faults: HashSet<String>,
    remove_fails: bool,
}

/// Remote filesystem held in memory. Every mutating call is appended to the
/// shared journal as `"<op> <path>"`.
pub struct MemoryFs {
    state: Mutex<State>,
    journal: Journal,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            journal: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn entries(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    pub fn clear_journal(&self) {
        self.journal.lock().unwrap().clear();
    }

    pub fn with_dirs(self, dirs: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for dir in dirs {
                state.dirs.insert(dir.to_string());
            }
        }
        self
    }

    pub fn with_file(self, path: &str, content: &[u8]) -> Self {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), content.to_vec());
        self
    }

    pub fn fail_mkdir(&self, path: &str, fault: MkdirFault) {
        self.state
            .lock()
            .unwrap()
            .mkdir_faults
            .insert(path.to_string(), fault);
    }

    pub fn fail_put(&self, path: &str) {
        self.state.lock().unwrap().put_faults.insert(path.to_string());
    }

    pub fn fail_remove(&self) {
        self.state.lock().unwrap().remove_fails = true;
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.state.lock().unwrap().dirs.contains(path)
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    fn record(&self, entry: String) {
        self.journal.lock().unwrap().push(entry);
    }

    fn parent_exists(state: &State, path: &str) -> bool {
        let (parent, _) = split_parent(path);
        parent.is_empty() || parent == "/" || state.dirs.contains(&parent)
    }
}

impl RemoteFilesystem for MemoryFs {
    fn stat(&self, path: &str) -> Result<RemoteStat, RemoteFsError> {
        let state = self.state.lock().unwrap();
        if path == "/" || state.dirs.contains(path) {
            return Ok(RemoteStat {
                is_dir: true,
                size: None,
            });
        }
        if let Some(content) = state.files.get(path) {
            return Ok(RemoteStat {
                is_dir: false,
                size: Some(content.len() as u64),
            });
        }
        Err(RemoteFsError::NotFound {
            path: path.to_string(),
        })
    }

    fn mkdir(&self, path: &str) -> Result<(), RemoteFsError> {
        let mut state = self.state.lock().unwrap();
        match state.mkdir_faults.get(path).copied() {
            Some(MkdirFault::LosesRace) => {
                state.dirs.insert(path.to_string());
                return Err(RemoteFsError::failed("mkdir", path, "Failure"));
            }
            Some(MkdirFault::Denied) => {
                return Err(RemoteFsError::PermissionDenied {
                    path: path.to_string(),
                })
            }
            None => {}
        }
        if state.dirs.contains(path) || state.files.contains_key(path) {
            return Err(RemoteFsError::failed("mkdir", path, "Failure"));
        }
        if !Self::parent_exists(&state, path) {
            return Err(RemoteFsError::NotFound {
                path: path.to_string(),
            });
        }
        state.dirs.insert(path.to_string());
        drop(state);
        self.record(format!("mkdir {}", path));
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<(), RemoteFsError> {
        let mut state = self.state.lock().unwrap();
        if state.remove_fails {
            return Err(RemoteFsError::failed("remove", path, "connection lost"));
        }
        if state.files.remove(path).is_none() {
            return Err(RemoteFsError::NotFound {
                path: path.to_string(),
            });
        }
        drop(state);
        self.record(format!("remove {}", path));
        Ok(())
    }

    fn write_from_reader(
        &self,
        reader: &mut dyn Read,
        path: &str,
    ) -> Result<u64, RemoteFsError> {
        let mut content = Vec::new();
        reader
            .read_to_end(&mut content)
            .map_err(|err| RemoteFsError::failed("write", path, err.to_string()))?;
        let mut state = self.state.lock().unwrap();
        if state.put_faults.contains(path) {
            return Err(RemoteFsError::failed("write", path, "No space left on device"));
        }
        if !Self::parent_exists(&state, path) {
            return Err(RemoteFsError::NotFound {
                path: path.to_string(),
            });
        }
        let len = content.len() as u64;
        state.files.insert(path.to_string(), content);
        drop(state);
        self.record(format!("put {}", path));
        Ok(len)
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, RemoteFsError> {
        self.file(path).ok_or_else(|| RemoteFsError::NotFound {
            path: path.to_string(),
        })
    }
}

/// Answers every command with the same canned result.
pub struct ScriptedExecutor {
    response: Result<ExecOutput, ToolError>,
    journal: Journal,
}

impl ScriptedExecutor {
    pub fn new(journal: Journal, response: Result<ExecOutput, ToolError>) -> Self {
        Self { response, journal }
    }

    pub fn exiting(journal: Journal, exit_status: i32, stderr: &str) -> Self {
        Self::new(
            journal,
            Ok(ExecOutput {
                exit_status,
                stdout: String::new(),
                stderr: stderr.to_string(),
            }),
        )
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn exec(&self, command: &str) -> Result<ExecOutput, ToolError> {
        self.journal.lock().unwrap().push(format!("exec {}", command));
        self.response.clone()
    }
}

/// One session over the shared in-memory filesystem and executor.
pub struct MemorySession {
    fs: Arc<MemoryFs>,
    executor: Arc<ScriptedExecutor>,
}

impl RemoteFilesystem for MemorySession {
    fn stat(&self, path: &str) -> Result<RemoteStat, RemoteFsError> {
        self.fs.stat(path)
    }

    fn mkdir(&self, path: &str) -> Result<(), RemoteFsError> {
        self.fs.mkdir(path)
    }

    fn remove(&self, path: &str) -> Result<(), RemoteFsError> {
        self.fs.remove(path)
    }

    fn write_from_reader(
        &self,
        reader: &mut dyn Read,
        path: &str,
    ) -> Result<u64, RemoteFsError> {
        self.fs.write_from_reader(reader, path)
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, RemoteFsError> {
        self.fs.read_file(path)
    }
}

impl CommandExecutor for MemorySession {
    fn exec(&self, command: &str) -> Result<ExecOutput, ToolError> {
        self.executor.exec(command)
    }
}

/// Hands out [`MemorySession`]s and journals `"open transfer <host>"` or
/// `"open exec <host>"` for each one.
pub struct MemoryOpener {
    fs: Arc<MemoryFs>,
    executor: Arc<ScriptedExecutor>,
}

impl MemoryOpener {
    pub fn new(fs: Arc<MemoryFs>, executor: ScriptedExecutor) -> Self {
        Self {
            fs,
            executor: Arc::new(executor),
        }
    }

    fn session(&self, kind: &str, params: &ConnectionParams) -> MemorySession {
        self.fs.record(format!("open {} {}", kind, params.host));
        MemorySession {
            fs: self.fs.clone(),
            executor: self.executor.clone(),
        }
    }
}

impl SessionOpener for MemoryOpener {
    fn open_transfer(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn RemoteSession>, ToolError> {
        Ok(Box::new(self.session("transfer", params)))
    }

    fn open_exec(&self, params: &ConnectionParams) -> Result<Box<dyn CommandExecutor>, ToolError> {
        Ok(Box::new(self.session("exec", params)))
    }
}

pub fn tmp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create tmp dir");
    dir
}

pub fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent");
    }
    std::fs::write(&path, content).expect("write fixture");
    path
}

pub fn position(entries: &[String], needle: &str) -> usize {
    entries
        .iter()
        .position(|entry| entry == needle)
        .unwrap_or_else(|| panic!("{} not in {:?}", needle, entries))
}
