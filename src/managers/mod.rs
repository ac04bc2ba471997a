pub mod remote_ops;

pub use remote_ops::{OperationResult, RemoteOps};
