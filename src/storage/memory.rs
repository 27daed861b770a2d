use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{PipelineError, Result};
use crate::storage::content::{Namespace, StorageKey};
use crate::storage::{ObjectStore, Upload};

// Records every call so tests can check what reached the backend.
#[derive(Default)]
pub(crate) struct MemoryStore {
    pub(crate) objects: Mutex<HashMap<String, Vec<u8>>>,
    pub(crate) writes: Mutex<usize>,
    pub(crate) containers: Mutex<Vec<String>>,
    pub(crate) reject_writes: bool,
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn ensure_container(&self, namespace: &Namespace) -> Result<()> {
        self.containers.lock().unwrap().push(namespace.to_string());
        Ok(())
    }

    async fn upload_if_absent(&self, key: &StorageKey, content: &[u8]) -> Result<Upload> {
        if self.reject_writes {
            return Err(PipelineError::storage(key.as_str(), "write rejected"));
        }
        let mut objects = self.objects.lock().unwrap();
        let created = !objects.contains_key(key.as_str());
        if created {
            objects.insert(key.to_string(), content.to_vec());
            *self.writes.lock().unwrap() += 1;
        }
        Ok(Upload {
            location: format!("mem://{}", key),
            created,
        })
    }

    async fn issue_read_url(&self, key: &StorageKey, ttl: Duration) -> Result<String> {
        Ok(format!("mem://{}?ttl={}", key, ttl.as_secs()))
    }
}
