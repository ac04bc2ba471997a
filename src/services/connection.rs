use crate::constants::network as network_constants;
use crate::errors::{ToolError, ToolErrorKind};
use crate::services::validation::Validation;
use ssh2::Session;
use std::fmt;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone)]
pub enum Credentials {
    Password(String),
    PrivateKey {
        pem: String,
        passphrase: Option<String>,
    },
    PrivateKeyFile {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

impl Credentials {
    /// Key material wins over a key file, which wins over a password.
    pub fn resolve(
        password: Option<String>,
        private_key: Option<String>,
        private_key_file: Option<PathBuf>,
        passphrase: Option<String>,
    ) -> Result<Self, ToolError> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        if let Some(pem) = non_empty(private_key) {
            return Ok(Credentials::PrivateKey { pem, passphrase });
        }
        if let Some(path) = private_key_file {
            return Ok(Credentials::PrivateKeyFile { path, passphrase });
        }
        if let Some(password) = non_empty(password) {
            return Ok(Credentials::Password(password));
        }
        Err(ToolError::invalid_params(
            "SSH credentials are required: provide a password, a private key or a private key file",
        ))
    }

    fn method(&self) -> &'static str {
        match self {
            Credentials::Password(_) => "password",
            Credentials::PrivateKey { .. } => "private_key",
            Credentials::PrivateKeyFile { .. } => "private_key_file",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credentials({})", self.method())
    }
}

#[derive(Clone, Debug)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub credentials: Credentials,
    pub connect_timeout_ms: u64,
    pub keepalive_interval_ms: u64,
}

impl ConnectionParams {
    pub fn new(
        host: &str,
        port: Option<u32>,
        username: &str,
        credentials: Credentials,
    ) -> Result<Self, ToolError> {
        let validation = Validation::new();
        Ok(Self {
            host: validation.ensure_string(host, "host", true)?,
            port: validation.ensure_port(port, network_constants::SSH_DEFAULT_PORT)?,
            username: validation.ensure_string(username, "username", true)?,
            credentials,
            connect_timeout_ms: resolve_connect_timeout_ms(),
            keepalive_interval_ms: resolve_keepalive_interval_ms(),
        })
    }

    pub fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "host": self.host,
            "port": self.port,
            "username": self.username,
            "auth": self.credentials.method(),
        })
    }
}

fn resolve_env_ms(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(fallback)
}

pub fn resolve_connect_timeout_ms() -> u64 {
    resolve_env_ms(
        "SSHDEPLOY_CONNECT_TIMEOUT_MS",
        network_constants::TIMEOUT_SSH_READY_MS,
    )
}

pub fn resolve_keepalive_interval_ms() -> u64 {
    resolve_env_ms(
        "SSHDEPLOY_KEEPALIVE_INTERVAL_MS",
        network_constants::KEEPALIVE_INTERVAL_MS,
    )
}

fn connect_error(message: impl Into<String>) -> ToolError {
    ToolError::new(ToolErrorKind::Internal, "CONNECT_FAILED", message)
}

fn resolve_addr(params: &ConnectionParams) -> Result<SocketAddr, ToolError> {
    (params.host.as_str(), params.port)
        .to_socket_addrs()
        .map_err(|err| {
            connect_error(format!(
                "Failed to resolve SSH host {}:{}: {}",
                params.host, params.port, err
            ))
        })?
        .next()
        .ok_or_else(|| connect_error("Invalid SSH host/port"))
}

/// Opens and authenticates an SSH session. The server host key is accepted
/// without verification.
pub fn connect_session(params: &ConnectionParams) -> Result<Session, ToolError> {
    let addr = resolve_addr(params)?;
    let timeout = Duration::from_millis(params.connect_timeout_ms);
    let tcp = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|err| connect_error(format!("Failed to connect SSH: {}", err)))?;
    tcp.set_read_timeout(Some(timeout)).ok();
    tcp.set_write_timeout(Some(timeout)).ok();

    let mut session =
        Session::new().map_err(|_| ToolError::internal("Failed to create SSH session"))?;
    session.set_tcp_stream(tcp);
    session.handshake()?;

    let auth = match &params.credentials {
        Credentials::PrivateKey { pem, passphrase } => session.userauth_pubkey_memory(
            &params.username,
            None,
            pem,
            passphrase.as_deref(),
        ),
        Credentials::PrivateKeyFile { path, passphrase } => session.userauth_pubkey_file(
            &params.username,
            None,
            path,
            passphrase.as_deref(),
        ),
        Credentials::Password(password) => session.userauth_password(&params.username, password),
    };
    auth.map_err(|err| {
        ToolError::denied(format!("SSH authentication failed: {}", err.message()))
    })?;

    if !session.authenticated() {
        return Err(ToolError::denied("SSH authentication failed"));
    }
    let interval = std::cmp::max(1, (params.keepalive_interval_ms / 1000) as u32);
    session.set_keepalive(true, interval);

    Ok(session)
}
