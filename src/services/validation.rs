use crate::constants::limits::{MAX_PORT, MIN_PORT};
use crate::errors::ToolError;
use std::path::{Path, PathBuf};

#[derive(Clone)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    pub fn ensure_string(&self, value: &str, label: &str, trim: bool) -> Result<String, ToolError> {
        let normalized = value.trim();
        if normalized.is_empty() {
            return Err(ToolError::invalid_params(format!(
                "{} must be a non-empty string",
                label
            )));
        }
        if value.contains('\0') {
            return Err(ToolError::invalid_params(format!(
                "{} must not contain null bytes",
                label
            )));
        }
        Ok(if trim {
            normalized.to_string()
        } else {
            value.to_string()
        })
    }

    pub fn ensure_port(&self, value: Option<u32>, fallback: u16) -> Result<u16, ToolError> {
        let Some(numeric) = value else {
            return Ok(fallback);
        };
        if numeric < MIN_PORT as u32 || numeric > MAX_PORT as u32 {
            return Err(ToolError::invalid_params(format!(
                "Port must be an integer between {} and {}",
                MIN_PORT, MAX_PORT
            )));
        }
        Ok(numeric as u16)
    }

    /// Checks that a local path exists before any remote work starts.
    pub fn ensure_local_path(&self, raw: &str) -> Result<PathBuf, ToolError> {
        let path = expand_home_path(raw);
        if raw.trim().is_empty() || !path.exists() {
            return Err(ToolError::invalid_params(format!(
                "Error: Local path '{}' does not exist.",
                raw
            )));
        }
        Ok(path)
    }

    pub fn ensure_remote_path(&self, raw: &str, label: &str) -> Result<String, ToolError> {
        self.ensure_string(raw, label, true)
    }
}

impl Default for Validation {
    fn default() -> Self {
        Self::new()
    }
}

pub fn expand_home_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if let Some(str_path) = path.to_str() {
        if let Some(rest) = str_path.strip_prefix("~/") {
            if let Ok(home) = std::env::var("HOME") {
                return PathBuf::from(home).join(rest);
            }
        }
        if str_path == "~" {
            if let Ok(home) = std::env::var("HOME") {
                return PathBuf::from(home);
            }
        }
    }
    path.to_path_buf()
}
