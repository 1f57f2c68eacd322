#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use chrono::Utc;
use http_body_util::BodyExt;
use media_uploader::config::UploaderConfig;
use media_uploader::services::storage::{ObjectAttrs, ObjectStore};
use media_uploader::{AppState, create_app};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tower::ServiceExt;

pub const BUCKET: &str = "media-bucket";
pub const BOUNDARY: &str = "---------------------------123456789012345678901234567";

pub struct MockObjectStore {
    buckets: Mutex<HashSet<String>>,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    put_calls: AtomicUsize,
    fail_puts: Mutex<Option<String>>,
    put_delay: Mutex<Option<Duration>>,
    remove_source: AtomicBool,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::with_buckets(&[BUCKET])
    }

    pub fn with_buckets(buckets: &[&str]) -> Self {
        Self {
            buckets: Mutex::new(buckets.iter().map(|b| b.to_string()).collect()),
            objects: Mutex::new(HashMap::new()),
            put_calls: AtomicUsize::new(0),
            fail_puts: Mutex::new(None),
            put_delay: Mutex::new(None),
            remove_source: AtomicBool::new(false),
        }
    }

    pub fn fail_puts_with(&self, message: &str) {
        *self.fail_puts.lock().unwrap() = Some(message.to_string());
    }

    pub fn delay_puts(&self, delay: Duration) {
        *self.put_delay.lock().unwrap() = Some(delay);
    }

    /// Deletes the local source after reading it, so the caller's own
    /// cleanup fails.
    pub fn remove_source_on_put(&self) {
        self.remove_source.store(true, Ordering::SeqCst);
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&format!("{}/{}", bucket, key))
            .cloned()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> anyhow::Result<bool> {
        Ok(self.buckets.lock().unwrap().contains(bucket))
    }

    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        _content_type: Option<&str>,
    ) -> anyhow::Result<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.put_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.fail_puts.lock().unwrap().clone();
        if let Some(message) = failure {
            return Err(anyhow::anyhow!(message));
        }

        let data = tokio::fs::read(path).await?;
        if self.remove_source.load(Ordering::SeqCst) {
            tokio::fs::remove_file(path).await?;
        }
        self.objects
            .lock()
            .unwrap()
            .insert(format!("{}/{}", bucket, key), data);
        Ok(())
    }

    async fn object_attrs(&self, bucket: &str, key: &str) -> anyhow::Result<ObjectAttrs> {
        let objects = self.objects.lock().unwrap();
        let data = objects
            .get(&format!("{}/{}", bucket, key))
            .ok_or_else(|| anyhow::anyhow!("Key not found"))?;

        Ok(ObjectAttrs {
            bucket: bucket.to_string(),
            name: key.to_string(),
            size: data.len() as i64,
            content_type: None,
            etag: Some("\"mock-etag\"".to_string()),
            last_modified: Some(Utc::now()),
        })
    }
}

pub fn test_config(scratch_dir: &Path, extra: &[(&str, &str)]) -> UploaderConfig {
    let mut values: HashMap<String, String> = [
        ("UPLOADER_BUCKET", BUCKET),
        ("UPLOADER_MAX_FILE_SIZE", "4"),
        ("UPLOADER_FILES_COUNT", "3"),
        ("UPLOADER_PUBLISH_TIMEOUT_SECS", "5"),
        ("UPLOADER_STATUS_USERNAME", "admin"),
        ("UPLOADER_STATUS_PASSWORD", "password123"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    values.insert(
        "UPLOADER_SCRATCH_DIR".to_string(),
        scratch_dir.display().to_string(),
    );
    for (k, v) in extra {
        values.insert(k.to_string(), v.to_string());
    }

    UploaderConfig::from_map(&values).unwrap()
}

pub struct TestApp {
    pub app: Router,
    pub store: Arc<MockObjectStore>,
    pub scratch: tempfile::TempDir,
}

pub fn setup_app(store: MockObjectStore, extra: &[(&str, &str)]) -> TestApp {
    let scratch = tempfile::tempdir().unwrap();
    let config = test_config(scratch.path(), extra);
    setup_app_with_config(store, config, scratch)
}

/// Same as [`setup_app`] for a config adjusted by the caller.
pub fn setup_app_with_config(
    store: MockObjectStore,
    config: UploaderConfig,
    scratch: tempfile::TempDir,
) -> TestApp {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let store = Arc::new(store);
    let state = AppState::new(config, store.clone());

    TestApp {
        app: create_app(state),
        store,
        scratch,
    }
}

impl TestApp {
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch.path()).unwrap().count()
    }

    pub async fn post_form(&self, uri: &str, body: Vec<u8>) -> (u16, Value) {
        let content_type = format!("multipart/form-data; boundary={}", BOUNDARY);
        self.post_raw(uri, &content_type, body).await
    }

    pub async fn post_raw(&self, uri: &str, content_type: &str, body: Vec<u8>) -> (u16, Value) {
        let response = self
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("Content-Type", content_type)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        json_response(response).await
    }
}

pub async fn json_response(response: Response<Body>) -> (u16, Value) {
    let status = response.status().as_u16();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or_else(|_| {
        panic!(
            "Response with status {} is not JSON: {:?}",
            status,
            String::from_utf8_lossy(&body)
        )
    });
    (status, json)
}

/// Builds a multipart body from (field, filename, content) parts.
pub fn multipart_body(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, content) in parts {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
                Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn gif_bytes(len: usize) -> Vec<u8> {
    let mut buf = b"GIF89a".to_vec();
    buf.extend_from_slice(&[0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00]);
    buf.resize(len.max(buf.len()), 0x3B);
    buf
}

pub fn mp4_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0x00, 0x00, 0x00, 0x20];
    buf.extend_from_slice(b"ftypisom");
    buf.extend_from_slice(&[0x00, 0x00, 0x02, 0x00]);
    buf.extend_from_slice(b"isomiso2avc1mp41");
    buf.resize(len.max(buf.len()), 0x00);
    buf
}

/// Checks the `media/YYYY/MM/DD/<16 alphanumerics><ext>` layout against the
/// dates seen around the request.
pub fn assert_media_key(key: &str, extension: &str, dates: &[String]) {
    let rest = key
        .strip_prefix("media/")
        .unwrap_or_else(|| panic!("{} lacks media/ prefix", key));
    let (date, file) = rest.split_at(10);
    assert!(dates.iter().any(|d| d == date), "unexpected date in {}", key);

    let file = file.strip_prefix('/').unwrap();
    let id = file
        .strip_suffix(extension)
        .unwrap_or_else(|| panic!("{} does not end with {}", key, extension));
    assert_eq!(id.len(), 16, "bad id in {}", key);
    assert!(id.chars().all(|c| c.is_ascii_alphanumeric()), "bad id in {}", key);
}

pub fn today() -> String {
    Utc::now().format("%Y/%m/%d").to_string()
}
