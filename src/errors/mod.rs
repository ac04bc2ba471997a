mod remote_fs_error;
mod tool_error;

pub use remote_fs_error::RemoteFsError;
pub use tool_error::{ToolError, ToolErrorKind};
