pub mod network {
    pub const SSH_DEFAULT_PORT: u16 = 22;
    pub const TIMEOUT_SSH_READY_MS: u64 = 10_000;
    pub const KEEPALIVE_INTERVAL_MS: u64 = 30_000;
}

pub mod limits {
    pub const MAX_PORT: u16 = 65_535;
    pub const MIN_PORT: u16 = 1;
}

pub mod sftp {
    pub const DIR_MODE: i32 = 0o755;
    pub const FILE_MODE: i32 = 0o644;
    pub const COPY_BUFFER_BYTES: usize = 64 * 1024;
}

pub mod exec {
    pub const READ_CHUNK_BYTES: usize = 8192;
    pub const IDLE_POLL_MS: u64 = 20;
}
