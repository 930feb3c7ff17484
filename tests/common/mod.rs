#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use places_api::app::{build_state, router};
use places_api::auth::{generate_jwt, Claims};
use places_api::config::AppConfig;
use places_api::database::models::User;
use places_api::database::{MemoryStore, UserRepository};

pub const BOUNDARY: &str = "places-test-boundary";

/// The full router over an in-memory store, driven in-process.
pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
    pub config: AppConfig,
    uploads: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let uploads = tempfile::tempdir().expect("temp upload dir");
        let mut config = AppConfig::development();
        config.api.upload_dir = uploads.path().join("images");

        let store = MemoryStore::new();
        let state = build_state(&config, Arc::new(store.clone())).expect("state");
        let router = router(state, &config);

        Self {
            router,
            store,
            config,
            uploads,
        }
    }

    /// Creates a user and returns its id with a valid bearer token.
    pub async fn user(&self, name: &str) -> (Uuid, String) {
        let user = User::new(name);
        self.store.save_user(&user).await.expect("save user");
        let claims = Claims::new(user.id, name, 1);
        let token = generate_jwt(&claims, &self.config.security.jwt_secret).expect("token");
        (user.id, token)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.expect("infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.patch_raw(uri, token, Some("application/json"), body.to_string()).await
    }

    /// PATCH with an arbitrary body and optional content type.
    pub async fn patch_raw(
        &self,
        uri: &str,
        token: &str,
        content_type: Option<&str>,
        body: impl Into<Body>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method(Method::PATCH)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"));
        if let Some(content_type) = content_type {
            request = request.header(header::CONTENT_TYPE, content_type);
        }
        self.send(request.body(body.into()).unwrap()).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn create(&self, token: Option<&str>, form: Form) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri("/api/places")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"));
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(request.body(Body::from(form.finish())).unwrap()).await
    }

    /// Files currently in the upload directory.
    pub fn uploaded_files(&self) -> Vec<std::path::PathBuf> {
        match std::fs::read_dir(&self.config.api.upload_dir) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Polls until the upload directory is empty; deletions run on detached tasks.
    pub async fn wait_for_empty_uploads(&self) -> bool {
        for _ in 0..50 {
            if self.uploaded_files().is_empty() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

/// Hand-built multipart/form-data body.
#[derive(Default)]
pub struct Form {
    body: Vec<u8>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

pub fn cafe_form() -> Form {
    Form::new()
        .text("title", "Cafe")
        .text("description", "Corner cafe")
        .text("address", "1 Main St")
        .file("image", "cafe.png", "image/png", b"\x89PNG fake image")
}

/// The server binary, started on a free port against the in-memory store.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
    _workdir: TempDir,
}

impl TestServer {
    pub fn spawn() -> Result<Self> {
        Self::spawn_with_dotenv(None)
    }

    /// Starts the binary in a fresh working directory, optionally holding a
    /// `.env` file for the server to pick up.
    pub fn spawn_with_dotenv(dotenv: Option<&str>) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let workdir = tempfile::tempdir()?;
        if let Some(contents) = dotenv {
            std::fs::write(workdir.path().join(".env"), contents)?;
        }

        let child = Command::new(env!("CARGO_BIN_EXE_places-api"))
            .current_dir(workdir.path())
            .env("PLACES_API_PORT", port.to_string())
            .env("API_UPLOAD_DIR", workdir.path().join("images"))
            .env("APP_ENV", "development")
            // Set rather than removed: dotenvy fills missing vars from .env
            .env("DATABASE_URL", "")
            .env_remove("GEOCODER_API_KEY")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .context("failed to spawn server binary")?;

        Ok(Self {
            port,
            base_url,
            child,
            _workdir: workdir,
        })
    }

    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
