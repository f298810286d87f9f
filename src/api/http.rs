use crate::{
    api::traits::ImageApi,
    config::ClientConfig,
    error::{Result, SdError},
    models::{ErrorBody, GenerationRequest, GenerationResponse, HealthStatus, ImageEntry},
};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use url::Url;

/// `ImageApi` over HTTP with `reqwest`.
#[derive(Clone)]
pub struct HttpImageApi {
    client: Client,
    config: ClientConfig,
}

impl HttpImageApi {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SdError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Turn a non-2xx reply into a server or transport error.
    async fn error_from_response(response: Response) -> SdError {
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                log::debug!("Failed to read error body: {}", e);
                String::new()
            }
        };

        let detail = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.detail)
            .and_then(|detail| match detail {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|d| !d.trim().is_empty());

        match detail {
            Some(detail) => SdError::Server {
                status: status.as_u16(),
                detail,
            },
            None => SdError::Transport(format!(
                "Request failed with status code {}",
                status.as_u16()
            )),
        }
    }

    /// URL of one stored image, with the file name as a single encoded path segment.
    fn image_url(&self, filename: &str) -> Result<Url> {
        if filename.is_empty()
            || filename == "."
            || filename == ".."
            || filename.contains(['/', '\\'])
        {
            return Err(SdError::InvalidState(format!(
                "refusing to delete invalid filename {:?}",
                filename
            )));
        }

        let mut url = Url::parse(&self.config.endpoint("/images"))
            .map_err(|e| SdError::Config(format!("invalid images endpoint: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| SdError::Config("images endpoint cannot take a path".into()))?
            .pop_if_empty()
            .push(filename);
        Ok(url)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| SdError::Response(e.to_string()))
    }
}

#[async_trait]
impl ImageApi for HttpImageApi {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let url = self.config.endpoint("/generate");
        log::debug!("🎨 POST {} (timeout {:?})", url, self.config.generation_timeout);

        let response = self
            .client
            .post(&url)
            .timeout(self.config.generation_timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                log::error!("Generation request failed: {}", e);
                SdError::from(e)
            })?;

        Self::decode(response).await
    }

    async fn list_images(&self) -> Result<Vec<ImageEntry>> {
        let url = self.config.endpoint("/images");
        log::debug!("📚 GET {}", url);

        let response = self.client.get(&url).send().await?;
        Self::decode(response).await
    }

    async fn delete_image(&self, filename: &str) -> Result<()> {
        let url = self.image_url(filename)?;
        log::debug!("🗑️  DELETE {}", url);

        let response = self.client.delete(url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from_response(response).await)
        }
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        log::debug!("📥 GET {}", url);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn health(&self) -> Result<HealthStatus> {
        let url = self.config.endpoint("/health");
        let response = self.client.get(&url).send().await?;
        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> HttpImageApi {
        HttpImageApi::new(ClientConfig::new().with_base_url("http://127.0.0.1:8000")).unwrap()
    }

    #[test]
    fn image_url_encodes_reserved_characters() {
        let url = api().image_url("a?b#c%d.png").unwrap();
        assert_eq!(url.path(), "/api/v1/images/a%3Fb%23c%25d.png");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn image_url_keeps_plain_names() {
        let url = api().image_url("sd_20240601_120000.png").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8000/api/v1/images/sd_20240601_120000.png"
        );
    }

    #[test]
    fn image_url_rejects_path_like_names() {
        for name in ["", ".", "..", "../secret.png", "dir/a.png", "dir\\a.png"] {
            assert!(
                matches!(api().image_url(name), Err(SdError::InvalidState(_))),
                "{:?} should be rejected",
                name
            );
        }
    }
}
