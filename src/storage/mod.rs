pub mod cloudinary;

use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::Result;

/// Opaque sink for finished media. Returns a public URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload_buffer(&self, buffer: Bytes, filename: &str, folder: &str) -> Result<String>;
}
