pub mod archive;
pub mod ensure;
pub mod tree;

pub use archive::{ArchiveDeployer, ArchiveDeployment, ArchiveFormat, DeployReport};
pub use ensure::{create_dir_if_missing, ensure_dir_exists, DirOutcome, EnsureReport};
pub use tree::{resolve_file_target, TreeUploadSummary, TreeUploader};
