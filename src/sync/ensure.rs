//! Idempotent "create if missing" for remote directories.
//!
//! Post-condition of every function here: the directory exists on the remote
//! side, or an error that is not an existence race is returned. A failed
//! `mkdir` is forgiven only when a follow-up `stat` shows a directory at the
//! path (another client won the race, or the server reports `FAILURE` for an
//! existing directory). Permission errors and files in the way still surface.

use crate::errors::RemoteFsError;
use crate::remote::fs::RemoteFilesystem;
use crate::remote::paths::{normalize_separators, split_parent};
use crate::services::logger::Logger;

/// What a single probe-then-create step found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirOutcome {
    Created,
    Existing,
    /// `mkdir` failed but the directory was there on re-stat.
    RaceTolerated,
}

/// Directories an ensure call created, and those whose creation failed
/// only because they appeared in the meantime.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnsureReport {
    pub created: Vec<String>,
    pub tolerated_races: Vec<String>,
}

impl EnsureReport {
    pub fn log_races(&self, logger: &Logger) {
        for path in &self.tolerated_races {
            log_tolerated_race(logger, path);
        }
    }
}

pub fn log_tolerated_race(logger: &Logger, path: &str) {
    logger.debug(
        "directory appeared concurrently, mkdir failure ignored",
        Some(&serde_json::json!({"remote_path": path})),
    );
}

/// Ensures `dir` and all of its missing ancestors exist, creating them
/// parent-first. `/` and the empty path are treated as always present.
pub fn ensure_dir_exists<F>(fs: &F, dir: &str) -> Result<EnsureReport, RemoteFsError>
where
    F: RemoteFilesystem + ?Sized,
{
    let mut report = EnsureReport::default();
    ensure_into(fs, dir, &mut report)?;
    Ok(report)
}

fn ensure_into<F>(fs: &F, dir: &str, report: &mut EnsureReport) -> Result<(), RemoteFsError>
where
    F: RemoteFilesystem + ?Sized,
{
    let dir = normalize_separators(dir);
    let dir = if dir.len() > 1 {
        dir.strip_suffix('/').unwrap_or(&dir).to_string()
    } else {
        dir
    };
    if dir.is_empty() || dir == "/" {
        return Ok(());
    }

    match fs.stat(&dir) {
        Ok(stat) if stat.is_dir => return Ok(()),
        Ok(_) => return Err(RemoteFsError::NotADirectory { path: dir }),
        Err(_) => {}
    }

    let (parent, _) = split_parent(&dir);
    ensure_into(fs, &parent, report)?;
    match mkdir_tolerating_race(fs, &dir)? {
        DirOutcome::Created => report.created.push(dir),
        DirOutcome::RaceTolerated => report.tolerated_races.push(dir),
        DirOutcome::Existing => {}
    }
    Ok(())
}

/// Probes `dir` and creates it if absent. Unlike [`ensure_dir_exists`] the
/// parent must already exist.
pub fn create_dir_if_missing<F>(fs: &F, dir: &str) -> Result<DirOutcome, RemoteFsError>
where
    F: RemoteFilesystem + ?Sized,
{
    match fs.stat(dir) {
        Ok(stat) if stat.is_dir => Ok(DirOutcome::Existing),
        Ok(_) => Err(RemoteFsError::NotADirectory {
            path: dir.to_string(),
        }),
        Err(_) => mkdir_tolerating_race(fs, dir),
    }
}

fn mkdir_tolerating_race<F>(fs: &F, dir: &str) -> Result<DirOutcome, RemoteFsError>
where
    F: RemoteFilesystem + ?Sized,
{
    let Err(err) = fs.mkdir(dir) else {
        return Ok(DirOutcome::Created);
    };
    match fs.stat(dir) {
        Ok(stat) if stat.is_dir => Ok(DirOutcome::RaceTolerated),
        _ => Err(err),
    }
}
