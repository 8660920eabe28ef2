#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use compressor::app::create_app;
use compressor::config::settings::AppConfig;
use compressor::infrastructure::engine::{
    EngineError, ProgressSender, TranscodeEngine, TranscodeRequest,
};
use compressor::state::AppState;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use tower::ServiceExt;

pub const BOUNDARY: &str = "compressor-test-boundary";

/// What the in-process engine does with each request.
#[derive(Clone)]
pub enum Script {
    /// Reports `steps`, then writes an output half the size of the input.
    Succeed { steps: Vec<f64> },
    Fail(&'static str),
    /// Never finishes on its own.
    Hang,
}

pub struct ScriptedEngine {
    script: Script,
    gate: Option<Arc<Notify>>,
}

impl ScriptedEngine {
    pub fn new(script: Script) -> Self {
        Self { script, gate: None }
    }

    /// Holds every encode after its progress steps until `gate` is notified.
    pub fn gated(script: Script, gate: Arc<Notify>) -> Self {
        Self {
            script,
            gate: Some(gate),
        }
    }
}

#[async_trait]
impl TranscodeEngine for ScriptedEngine {
    async fn transcode(
        &self,
        request: &TranscodeRequest,
        progress: ProgressSender,
    ) -> Result<(), EngineError> {
        let steps = match &self.script {
            Script::Succeed { steps } => steps.clone(),
            _ => vec![12.5],
        };
        for pct in steps {
            let _ = progress.send(pct).await;
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        match &self.script {
            Script::Succeed { .. } => {
                let input = tokio::fs::read(&request.input_path).await?;
                let output = vec![0u8; (input.len() / 2).max(1)];
                tokio::fs::write(&request.output_path, output).await?;
                Ok(())
            }
            Script::Fail(message) => Err(EngineError::Failed(message.to_string())),
            Script::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub tmp: TempDir,
}

pub fn test_config(tmp: &TempDir) -> AppConfig {
    AppConfig {
        uploads_dir: tmp.path().join("uploads"),
        processed_dir: tmp.path().join("processed"),
        max_upload_bytes: 1024 * 1024,
        max_concurrent_encodes: 2,
        encode_queue_capacity: 8,
        max_encode_duration: Duration::from_secs(30),
        input_cleanup_delay: Duration::from_secs(3600),
        ..AppConfig::default()
    }
}

pub async fn spawn_app(engine: ScriptedEngine) -> TestApp {
    spawn_app_with(engine, |_| {}).await
}

pub async fn spawn_app_with(engine: ScriptedEngine, configure: impl FnOnce(&mut AppConfig)) -> TestApp {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = test_config(&tmp);
    configure(&mut config);

    let state = AppState::new(config, Arc::new(engine)).await.unwrap();
    state.start();
    let router = create_app(state.clone()).await;

    TestApp { router, state, tmp }
}

pub struct FilePart<'a> {
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub data: Vec<u8>,
}

pub fn video(file_name: &str, size: usize) -> FilePart<'_> {
    FilePart {
        file_name,
        content_type: "video/mp4",
        data: vec![42u8; size],
    }
}

pub fn multipart_body(file: Option<FilePart<'_>>, quality: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();

    if let Some(file) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"video\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                file.file_name, file.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(&file.data);
        body.extend_from_slice(b"\r\n");
    }

    if let Some(quality) = quality {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"quality\"\r\n\r\n{quality}\r\n"
            )
            .as_bytes(),
        );
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn compress_request(body: Vec<u8>, with_content_length: bool) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/compress")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if with_content_length {
        builder = builder.header(header::CONTENT_LENGTH, body.len());
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    pub async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = self.send(request).await;
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, value)
    }

    /// Uploads a file and returns the new job id.
    pub async fn upload(&self, file: FilePart<'_>, quality: Option<&str>) -> String {
        let (status, body) = self
            .send_json(compress_request(multipart_body(Some(file), quality), true))
            .await;
        assert_eq!(status, StatusCode::OK, "upload rejected: {body}");
        body["jobId"].as_str().unwrap().to_string()
    }

    pub async fn status(&self, job_id: &str) -> (StatusCode, Value) {
        self.send_json(get(&format!("/status/{job_id}"))).await
    }

    pub async fn wait_for_status(&self, job_id: &str, expected: &str) -> Value {
        const MAX_POLLS: usize = 200;
        const POLL_INTERVAL_MS: u64 = 10;

        for _ in 0..MAX_POLLS {
            let (_, body) = self.status(job_id).await;
            if body["status"] == expected {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }

        panic!("job {job_id} did not reach {expected} within timeout");
    }

    pub async fn wait_for_terminal(&self, job_id: &str) -> Value {
        const MAX_POLLS: usize = 200;
        const POLL_INTERVAL_MS: u64 = 10;

        for _ in 0..MAX_POLLS {
            let (_, body) = self.status(job_id).await;
            if body["status"] == "completed" || body["status"] == "failed" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }

        panic!("job {job_id} did not reach a terminal status within timeout");
    }

    pub fn uploads_is_empty(&self) -> bool {
        std::fs::read_dir(&self.state.config.uploads_dir)
            .unwrap()
            .next()
            .is_none()
    }
}
