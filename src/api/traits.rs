use crate::{
    error::Result,
    models::{GenerationRequest, GenerationResponse, HealthStatus, ImageEntry},
};
use async_trait::async_trait;

/// Everything the client needs from the generation backend.
#[async_trait]
pub trait ImageApi: Send + Sync {
    /// `POST /generate`. Runs under the long generation timeout.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse>;

    async fn list_images(&self) -> Result<Vec<ImageEntry>>;

    async fn delete_image(&self, filename: &str) -> Result<()>;

    /// Raw bytes of an already resolved image URL.
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>>;

    async fn health(&self) -> Result<HealthStatus>;
}
