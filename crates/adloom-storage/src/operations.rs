//! Store operations for generated artifacts.

use aws_sdk_s3::primitives::ByteStream;
use tracing::debug;

use crate::client::ObjectStore;
use crate::error::{StorageError, StorageResult};

impl ObjectStore {
    /// Upload raw bytes under the given key and return the object URI.
    pub async fn put_bytes(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String> {
        let size = data.len();

        self.inner()
            .put_object()
            .bucket(self.bucket())
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(key, e.to_string()))?;

        debug!(key, bytes = size, "uploaded artifact");
        Ok(self.object_uri(key))
    }
}
