mod common;
use common::{tmp_dir, write_file, MemoryFs, MemoryOpener, ScriptedExecutor, ENV_LOCK};

use sshdeploy::managers::{OperationResult, RemoteOps};
use sshdeploy::remote::ExecOutput;
use std::sync::Arc;
use sshdeploy::services::connection::{
    resolve_connect_timeout_ms, ConnectionParams, Credentials,
};
use sshdeploy::services::logger::Logger;
use sshdeploy::services::validation::Validation;

// Reserved TLD: resolution fails fast if an operation ever tries to connect.
fn unreachable_params() -> ConnectionParams {
    ConnectionParams::new(
        "sshdeploy.invalid",
        Some(22),
        "deploy",
        Credentials::Password("pw".to_string()),
    )
    .expect("params")
}

fn ops() -> RemoteOps {
    RemoteOps::new(Logger::new("test"), Validation::new())
}

fn ops_over(fs: &Arc<MemoryFs>, executor: ScriptedExecutor) -> RemoteOps {
    ops().with_opener(Arc::new(MemoryOpener::new(fs.clone(), executor)))
}

fn idle_executor(fs: &MemoryFs) -> ScriptedExecutor {
    ScriptedExecutor::exiting(fs.journal(), 0, "")
}

#[tokio::test]
async fn missing_local_path_is_reported_without_connecting() {
    let missing = tmp_dir("sshdeploy-ops").join("nope");
    let result = ops()
        .upload_local_path(&unreachable_params(), &missing.to_string_lossy(), "/dst")
        .await;
    assert_eq!(
        result,
        OperationResult::Failure(format!(
            "Error: Local path '{}' does not exist.",
            missing.to_string_lossy()
        ))
    );
}

#[tokio::test]
async fn uninferable_archive_is_reported_without_connecting() {
    let root = tmp_dir("sshdeploy-ops-xyz");
    let archive = write_file(&root, "bundle.xyz", "data");
    let result = ops()
        .upload_and_extract(
            &unreachable_params(),
            &archive.to_string_lossy(),
            "/srv",
            None,
        )
        .await;
    assert!(!result.is_success());
    assert_eq!(
        result.message(),
        "Error: Could not infer format. Please specify 'zip', 'tar', or 'tar_gz'."
    );
}

#[tokio::test]
async fn unsupported_explicit_format_is_rejected() {
    let root = tmp_dir("sshdeploy-ops-rar");
    let archive = write_file(&root, "bundle.rar", "data");
    let result = ops()
        .upload_and_extract(
            &unreachable_params(),
            &archive.to_string_lossy(),
            "/srv",
            Some("rar"),
        )
        .await;
    assert!(result.message().starts_with("Error: Unsupported format 'rar'"));
}

#[tokio::test]
async fn connection_failures_become_error_messages() {
    let result = ops().exec_command(&unreachable_params(), "uptime").await;
    assert!(!result.is_success());
    assert!(
        result.message().starts_with("Error executing command: "),
        "{}",
        result
    );
}

#[tokio::test]
async fn blank_command_is_rejected_before_opening_a_session() {
    let fs = Arc::new(MemoryFs::new());
    let executor = idle_executor(&fs);
    let result = ops_over(&fs, executor)
        .exec_command(&unreachable_params(), "   ")
        .await;
    assert_eq!(
        result,
        OperationResult::Failure("Error: command must be a non-empty string".to_string())
    );
    assert!(fs.entries().is_empty());
}

#[tokio::test]
async fn upload_content_writes_exact_utf8_bytes() {
    let fs = Arc::new(MemoryFs::new().with_dirs(&["/etc"]));
    let executor = idle_executor(&fs);
    let text = "greeting = \"héllo wörld ✓\"\n";

    let result = ops_over(&fs, executor)
        .upload_content(&unreachable_params(), "/etc/app.toml", text)
        .await;

    assert_eq!(
        result,
        OperationResult::Success(
            "Successfully uploaded content to /etc/app.toml on sshdeploy.invalid".to_string()
        )
    );
    assert_eq!(fs.file("/etc/app.toml").expect("uploaded"), text.as_bytes());
    assert_eq!(
        fs.entries(),
        vec!["open transfer sshdeploy.invalid", "put /etc/app.toml"]
    );
}

#[tokio::test]
async fn upload_content_does_not_create_parents() {
    let fs = Arc::new(MemoryFs::new());
    let executor = idle_executor(&fs);

    let result = ops_over(&fs, executor)
        .upload_content(&unreachable_params(), "/missing/app.toml", "x")
        .await;

    assert!(!result.is_success());
    assert!(
        result.message().starts_with("Error uploading content: "),
        "{}",
        result
    );
    assert!(!fs.has_dir("/missing"));
}

#[tokio::test]
async fn exec_reports_nonzero_status_with_both_streams() {
    let fs = Arc::new(MemoryFs::new());
    let executor = ScriptedExecutor::new(
        fs.journal(),
        Ok(ExecOutput {
            exit_status: 2,
            stdout: "partial".to_string(),
            stderr: "boom".to_string(),
        }),
    );

    let result = ops_over(&fs, executor)
        .exec_command(&unreachable_params(), "false")
        .await;

    assert_eq!(
        result,
        OperationResult::Success(
            "Command exited with status 2\nSTDOUT:\npartial\nSTDERR:\nboom\n".to_string()
        )
    );
    assert_eq!(
        fs.entries(),
        vec!["open exec sshdeploy.invalid", "exec false"]
    );
}

#[tokio::test]
async fn local_file_upload_creates_remote_parents() {
    let root = tmp_dir("sshdeploy-ops-file");
    let local = write_file(&root, "app.toml", "port = 80\n");
    let fs = Arc::new(MemoryFs::new());
    let executor = idle_executor(&fs);

    let result = ops_over(&fs, executor)
        .upload_local_path(&unreachable_params(), &local.to_string_lossy(), "/srv/conf/")
        .await;

    assert_eq!(
        result,
        OperationResult::Success(format!(
            "Successfully uploaded file '{}' to '/srv/conf/app.toml'",
            local.to_string_lossy()
        ))
    );
    assert_eq!(fs.file("/srv/conf/app.toml").expect("uploaded"), b"port = 80\n");
    assert_eq!(
        fs.entries(),
        vec![
            "open transfer sshdeploy.invalid",
            "mkdir /srv",
            "mkdir /srv/conf",
            "put /srv/conf/app.toml",
        ]
    );
}

#[tokio::test]
async fn local_directory_upload_mirrors_the_tree() {
    let root = tmp_dir("sshdeploy-ops-tree");
    write_file(&root, "site/index.html", "<h1>hi</h1>");
    write_file(&root, "site/css/main.css", "body{}");
    let local = root.join("site");
    let fs = Arc::new(MemoryFs::new().with_dirs(&["/var"]));
    let executor = idle_executor(&fs);

    let result = ops_over(&fs, executor)
        .upload_local_path(&unreachable_params(), &local.to_string_lossy(), "/var/www")
        .await;

    assert_eq!(
        result,
        OperationResult::Success(format!(
            "Successfully uploaded directory '{}' to '/var/www'",
            local.to_string_lossy()
        ))
    );
    assert!(fs.has_dir("/var/www/css"));
    assert_eq!(fs.file("/var/www/index.html").expect("index"), b"<h1>hi</h1>");
    assert_eq!(fs.file("/var/www/css/main.css").expect("css"), b"body{}");
    assert_eq!(
        fs.entries()
            .iter()
            .filter(|entry| entry.starts_with("open "))
            .count(),
        1
    );
}

#[tokio::test]
async fn archive_is_extracted_and_removed_in_one_session() {
    let root = tmp_dir("sshdeploy-ops-archive");
    let archive = write_file(&root, "bundle.tar.gz", "gz");
    let fs = Arc::new(MemoryFs::new());
    let executor = idle_executor(&fs);

    let result = ops_over(&fs, executor)
        .upload_and_extract(
            &unreachable_params(),
            &archive.to_string_lossy(),
            "/srv/app",
            None,
        )
        .await;

    assert_eq!(
        result,
        OperationResult::Success(format!(
            "Successfully uploaded and extracted '{}' to '/srv/app'",
            archive.to_string_lossy()
        ))
    );
    assert_eq!(
        fs.entries(),
        vec![
            "open transfer sshdeploy.invalid",
            "mkdir /srv",
            "mkdir /srv/app",
            "put /srv/app/bundle.tar.gz",
            "exec tar -xzf '/srv/app/bundle.tar.gz' -C '/srv/app'",
            "remove /srv/app/bundle.tar.gz",
        ]
    );
    assert!(fs.file("/srv/app/bundle.tar.gz").is_none());
}

#[tokio::test]
async fn failed_extraction_surfaces_stderr() {
    let root = tmp_dir("sshdeploy-ops-badzip");
    let archive = write_file(&root, "bundle.zip", "not a zip");
    let fs = Arc::new(MemoryFs::new().with_dirs(&["/srv"]));
    let executor =
        ScriptedExecutor::exiting(fs.journal(), 9, "End-of-central-directory not found");

    let result = ops_over(&fs, executor)
        .upload_and_extract(
            &unreachable_params(),
            &archive.to_string_lossy(),
            "/srv",
            None,
        )
        .await;

    assert_eq!(
        result.message(),
        "Error extracting: End-of-central-directory not found"
    );
    assert!(!result.is_success());
    assert!(fs.file("/srv/bundle.zip").is_none());
}

#[tokio::test]
async fn connect_timeout_honours_environment() {
    let _guard = ENV_LOCK.lock().await;

    std::env::set_var("SSHDEPLOY_CONNECT_TIMEOUT_MS", "2500");
    assert_eq!(resolve_connect_timeout_ms(), 2500);
    std::env::set_var("SSHDEPLOY_CONNECT_TIMEOUT_MS", "not-a-number");
    assert_eq!(resolve_connect_timeout_ms(), 10_000);
    std::env::remove_var("SSHDEPLOY_CONNECT_TIMEOUT_MS");
}
