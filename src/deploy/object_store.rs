use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

/// Storage seam for the deploy phase. Keys are bucket-relative paths.
pub trait ObjectStore: Send + Sync {
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> anyhow::Result<()>;
}

/// Uploads objects through an S3-compatible storage gateway over plain HTTP.
/// Config via env:
/// - ETL_STORAGE_ENDPOINT (e.g., https://storage.example.com)
/// - ETL_STORAGE_TOKEN (bearer token for the gateway)
pub struct S3Gateway {
    endpoint: String,
    token: String,
    client: reqwest::blocking::Client,
}

impl S3Gateway {
    pub fn from_env() -> anyhow::Result<Self> {
        let endpoint = std::env::var("ETL_STORAGE_ENDPOINT")?;
        let token = std::env::var("ETL_STORAGE_TOKEN")?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
            client: reqwest::blocking::Client::new(),
        })
    }
}

impl ObjectStore for S3Gateway {
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> anyhow::Result<()> {
        let endpoint = format!("{}/{}/{}", self.endpoint, bucket, key);
        let resp = self
            .client
            .put(&endpoint)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            anyhow::bail!("upload of '{key}' failed: {status} - {body}");
        }
        debug!(bucket, key, size = bytes.len(), "object uploaded");
        Ok(())
    }
}

/// In-memory object store for development/testing.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_uploads: bool,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every upload fails, for exercising the non-fatal
    /// deploy-failure path.
    pub fn failing() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            fail_uploads: true,
        }
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let objects = self.objects.lock().unwrap();
        objects.get(&format!("{bucket}/{key}")).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> anyhow::Result<()> {
        if self.fail_uploads {
            anyhow::bail!("bucket '{bucket}' is not reachable");
        }
        let mut objects = self.objects.lock().unwrap();
        objects.insert(format!("{bucket}/{key}"), bytes.to_vec());
        Ok(())
    }
}
