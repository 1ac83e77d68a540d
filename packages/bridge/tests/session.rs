// ABOUTME: Tests for bridge request dispatch against a mocked container runtime
// ABOUTME: Checks response frames, error codes and interpreter selection

use async_trait::async_trait;
use chrono::Utc;
use mockall::mock;
use pretty_assertions::assert_eq;
use runbox_bridge::{parse_frame, ErrorCode, OutboundFrame, Session};
use runbox_core::{Language, Project};
use runbox_sandbox::archive::{pack_file, unpack_file};
use runbox_sandbox::{
    ContainerGateway, ContainerRuntime, ContainerSummary, ExecResult, GatewayConfig,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

mock! {
    Runtime {}

    #[async_trait]
    impl ContainerRuntime for Runtime {
        async fn find_container(&self, name: &str) -> runbox_sandbox::Result<Option<ContainerSummary>>;
        async fn is_running(&self, container_id: &str) -> runbox_sandbox::Result<bool>;
        async fn start_container(&self, container_id: &str) -> runbox_sandbox::Result<()>;
        async fn exec(&self, container_id: &str, command: Vec<String>) -> runbox_sandbox::Result<ExecResult>;
        async fn download_archive(&self, container_id: &str, path: &str) -> runbox_sandbox::Result<Vec<u8>>;
        async fn upload_archive(&self, container_id: &str, dest_dir: &str, archive: Vec<u8>) -> runbox_sandbox::Result<()>;
    }
}

fn running_runtime() -> MockRuntime {
    let mut runtime = MockRuntime::new();
    runtime.expect_find_container().returning(|name| {
        Ok(Some(ContainerSummary {
            id: "c-1".to_string(),
            name: name.to_string(),
            running: true,
        }))
    });
    runtime
}

fn python_project() -> Project {
    Project {
        id: "p1".to_string(),
        owner_id: "u1".to_string(),
        name: "demo".to_string(),
        language: Language::Python,
        created_at: Utc::now(),
        last_used_at: None,
    }
}

fn session(runtime: MockRuntime, project: Option<&Project>) -> (Session, TempDir) {
    let staging = TempDir::new().unwrap();
    let config = GatewayConfig {
        staging_dir: staging.path().to_path_buf(),
        command_timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let gateway = ContainerGateway::new(Arc::new(runtime), config);
    (Session::new(gateway, "10.0.0.5", project), staging)
}

#[tokio::test]
async fn test_mkdir_result_frame() {
    let mut runtime = running_runtime();
    runtime
        .expect_exec()
        .withf(|_, command| command[..] == ["mkdir", "-p", "/app/src"])
        .times(1)
        .returning(|_, _| Ok(ExecResult::default()));
    let (session, _staging) = session(runtime, None);

    let frame = parse_frame(r#"{"id":1,"op":"mkdir","path":"/app/src"}"#).unwrap();
    let response = session.respond(frame).await;

    assert_eq!(
        response,
        OutboundFrame::Result {
            id: Some(json!(1)),
            op: "mkdir".to_string(),
            data: json!({"path": "/app/src"}),
        }
    );
}

#[tokio::test]
async fn test_list_files_returns_entries() {
    let mut runtime = running_runtime();
    runtime.expect_exec().returning(|_, _| {
        Ok(ExecResult {
            exit_code: 0,
            stdout: b"total 4\n-rw-r--r-- 1 root root 12 Jan 1 00:00 a.txt\n".to_vec(),
            stderr: Vec::new(),
        })
    });
    let (session, _staging) = session(runtime, None);

    let frame = parse_frame(r#"{"id":"ls-1","op":"list_files","path":"/app"}"#).unwrap();
    let response = session.respond(frame).await;

    match response {
        OutboundFrame::Result { id, op, data } => {
            assert_eq!(id, Some(json!("ls-1")));
            assert_eq!(op, "list_files");
            assert_eq!(
                data["entries"],
                json!([{
                    "name": "a.txt",
                    "isDirectory": false,
                    "permissions": "-rw-r--r--",
                    "sizeBytes": 12,
                    "modifiedAt": "Jan 1 00:00"
                }])
            );
        }
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[tokio::test]
async fn test_write_file_uploads_into_parent_directory() {
    let mut runtime = running_runtime();
    runtime
        .expect_upload_archive()
        .withf(|_, dest_dir, archive| dest_dir == "/app" && !archive.is_empty())
        .times(1)
        .returning(|_, _, _| Ok(()));
    let (session, staging) = session(runtime, None);

    let frame =
        parse_frame(r#"{"id":2,"op":"write_file","path":"/app/a.txt","content":"hi"}"#).unwrap();
    let response = session.respond(frame).await;

    assert!(matches!(response, OutboundFrame::Result { .. }));
    assert!(std::fs::read_dir(staging.path()).unwrap().next().is_none());
}

fn serving_file(name: &'static str, content: &'static [u8]) -> MockRuntime {
    let mut runtime = running_runtime();
    runtime.expect_download_archive().returning(move |_, _| {
        let scratch = TempDir::new().unwrap();
        Ok(pack_file(scratch.path(), name, content).unwrap())
    });
    runtime
}

#[tokio::test]
async fn test_read_text_file_is_utf8() {
    let (session, _staging) = session(serving_file("a.txt", "héllo\n".as_bytes()), None);

    let frame = parse_frame(r#"{"id":6,"op":"read_file","path":"/app/a.txt"}"#).unwrap();

    assert_eq!(
        session.respond(frame).await,
        OutboundFrame::Result {
            id: Some(json!(6)),
            op: "read_file".to_string(),
            data: json!({"path": "/app/a.txt", "content": "héllo\n", "encoding": "utf8"}),
        }
    );
}

#[tokio::test]
async fn test_read_binary_file_is_base64() {
    let (session, _staging) = session(serving_file("logo.png", &[0x89, 0x50, 0x00, 0xff]), None);

    let frame = parse_frame(r#"{"id":7,"op":"read_file","path":"/app/logo.png"}"#).unwrap();

    match session.respond(frame).await {
        OutboundFrame::Result { data, .. } => {
            assert_eq!(data["encoding"], json!("base64"));
            assert_eq!(data["content"], json!("iVAA/w=="));
        }
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[tokio::test]
async fn test_write_base64_content_uploads_raw_bytes() {
    let mut runtime = running_runtime();
    runtime
        .expect_upload_archive()
        .withf(|_, dest_dir, archive| {
            let scratch = TempDir::new().unwrap();
            dest_dir == "/app"
                && unpack_file(archive, scratch.path(), "logo.png").unwrap() == [0x89, 0x50, 0x00, 0xff]
        })
        .times(1)
        .returning(|_, _, _| Ok(()));
    let (session, _staging) = session(runtime, None);

    let frame = parse_frame(
        r#"{"id":8,"op":"write_file","path":"/app/logo.png","content":"iVAA/w==","encoding":"base64"}"#,
    )
    .unwrap();

    assert_eq!(
        session.respond(frame).await,
        OutboundFrame::Result {
            id: Some(json!(8)),
            op: "write_file".to_string(),
            data: json!({"path": "/app/logo.png", "bytes": 4}),
        }
    );
}

#[tokio::test]
async fn test_write_invalid_base64_is_bad_request() {
    let mut runtime = running_runtime();
    runtime.expect_upload_archive().never();
    let (session, _staging) = session(runtime, None);

    let frame = parse_frame(
        r#"{"id":9,"op":"write_file","path":"/app/a.bin","content":"not base64!","encoding":"base64"}"#,
    )
    .unwrap();

    match session.respond(frame).await {
        OutboundFrame::Error { id, code, message } => {
            assert_eq!(id, Some(json!(9)));
            assert_eq!(code, ErrorCode::BadRequest);
            assert!(message.contains("base64"));
        }
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[tokio::test]
async fn test_execute_uses_project_interpreter() {
    let mut runtime = running_runtime();
    runtime
        .expect_exec()
        .withf(|_, command| command[..] == ["python3", "/app/main.py", "-v"])
        .times(1)
        .returning(|_, _| {
            Ok(ExecResult {
                exit_code: 1,
                stdout: b"partial\n".to_vec(),
                stderr: b"Traceback\n".to_vec(),
            })
        });
    let project = python_project();
    let (session, _staging) = session(runtime, Some(&project));

    let frame =
        parse_frame(r#"{"id":3,"op":"execute","path":"/app/main.py","args":["-v"]}"#).unwrap();
    let response = session.respond(frame).await;

    assert_eq!(
        response,
        OutboundFrame::Result {
            id: Some(json!(3)),
            op: "execute".to_string(),
            data: json!({"stdout": "partial\n", "stderr": "Traceback\n", "exitCode": 1}),
        }
    );
}

#[tokio::test]
async fn test_execute_explicit_interpreter_wins() {
    let mut runtime = running_runtime();
    runtime
        .expect_exec()
        .withf(|_, command| command[..] == ["node", "/app/main.js"])
        .times(1)
        .returning(|_, _| Ok(ExecResult::default()));
    let project = python_project();
    let (session, _staging) = session(runtime, Some(&project));

    let frame = parse_frame(r#"{"op":"execute","path":"/app/main.js","interpreter":"node"}"#)
        .unwrap();

    assert!(matches!(
        session.respond(frame).await,
        OutboundFrame::Result { .. }
    ));
}

#[tokio::test]
async fn test_missing_container_is_not_found() {
    let mut runtime = MockRuntime::new();
    runtime.expect_find_container().returning(|_| Ok(None));
    runtime.expect_exec().never();
    let (session, _staging) = session(runtime, None);

    let frame = parse_frame(r#"{"id":4,"op":"delete","path":"/app/a.txt"}"#).unwrap();

    match session.respond(frame).await {
        OutboundFrame::Error { id, code, .. } => {
            assert_eq!(id, Some(json!(4)));
            assert_eq!(code, ErrorCode::NotFound);
        }
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_delete_is_remote_command_failure() {
    let mut runtime = running_runtime();
    runtime.expect_exec().returning(|_, _| {
        Ok(ExecResult {
            exit_code: 1,
            stdout: Vec::new(),
            stderr: b"rm: cannot remove '/app/x': Is a directory\n".to_vec(),
        })
    });
    let (session, _staging) = session(runtime, None);

    let frame = parse_frame(r#"{"id":5,"op":"delete","path":"/app/x"}"#).unwrap();

    match session.respond(frame).await {
        OutboundFrame::Error { code, message, .. } => {
            assert_eq!(code, ErrorCode::RemoteCommandFailed);
            assert!(message.contains("Is a directory"));
        }
        other => panic!("unexpected frame: {other:?}"),
    }
}
