//! HTTP client for the Visioncraft image API

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, error, trace};
use crate::auth::{IssuedToken, StaticToken, TokenSource};
use crate::config::ClientConfig;
use crate::error::Error;
use crate::request::{AuthorizedRequest, GenerationRequest};
use crate::stream::JobStream;

/// The three remote calls the controller depends on
#[async_trait]
pub trait ImageApi: Send + Sync
{   /// Model names available in a category
    async fn fetch_models(&self, category: &str)
      -> Result<Vec<String>, Error>;

    /// LoRA adapter names available in a category
    async fn fetch_loras(&self, category: &str)
      -> Result<Vec<String>, Error>;

    /// Submit a job and hand back its live status stream
    async fn generate_image(&self, request: &GenerationRequest)
      -> Result<JobStream, Error>;
}

/// reqwest-backed implementation of `ImageApi`
pub struct VisioncraftApi
{   base: String
  , timeout: Option<Duration>
  , http_client: reqwest::Client
  , tokens: Arc<dyn TokenSource>
}

impl VisioncraftApi
{   /// Build a client from configuration
    ///
    /// With no token configuration the service is called with an empty
    /// token, which local deployments accept.
    pub fn new(config: &ClientConfig) -> Result<Self, Error>
    {   config.validate()?;
        debug!("Creating VisioncraftApi for {}", config.base());

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs
        {   builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        let http_client = builder.build().map_err(|e| {
          error!("Failed to build HTTP client: {}", e);
          Error::InvalidConfiguration(e.to_string())
        })?;

        let tokens: Arc<dyn TokenSource> = match &config.token
        {   Some(token_config) => Arc::new(IssuedToken::new(
              token_config.clone(),
              http_client.clone()
            ))
          , None => Arc::new(StaticToken(String::new()))
        };

        Ok(VisioncraftApi
        {   base: config.base().to_string()
          , timeout: config.timeout_secs.map(Duration::from_secs)
          , http_client
          , tokens
        })
    }

    /// Replace the token source
    pub fn with_token_source(
      mut self
    , tokens: Arc<dyn TokenSource>
    ) -> Self
    {   self.tokens = tokens;
        self
    }

    pub fn base(&self) -> &str
    {   &self.base
    }

    async fn fetch_names(&self, kind: &str, category: &str)
      -> Result<Vec<String>, Error>
    {   let url = format!("{}/{}/{}", self.base, kind, category);
        debug!("Fetching {} from {}", kind, url);

        let mut request = self.http_client.get(&url);
        if let Some(timeout) = self.timeout
        {   request = request.timeout(timeout);
        }

        let response = request
          .send()
          .await
          .map_err(|e| {
            error!("Error fetching {}: {}", kind, e);
            Error::Network(e.to_string())
          })?;

        let status = response.status();
        trace!("{} response status: {}", kind, status);
        if !status.is_success()
        {   error!("Error fetching {}: status {}", kind, status);
            return Err(Error::HttpStatus(status.as_u16()));
        }

        let names: Vec<String> = response.json().await.map_err(|e| {
          error!("Error decoding {}: {}", kind, e);
          Error::from(e)
        })?;

        debug!("Retrieved {} {}", names.len(), kind);
        Ok(names)
    }
}

#[async_trait]
impl ImageApi for VisioncraftApi
{   async fn fetch_models(&self, category: &str)
      -> Result<Vec<String>, Error>
    {   self.fetch_names("models", category).await
    }

    async fn fetch_loras(&self, category: &str)
      -> Result<Vec<String>, Error>
    {   self.fetch_names("loras", category).await
    }

    async fn generate_image(&self, request: &GenerationRequest)
      -> Result<JobStream, Error>
    {   let url = format!("{}/generate", self.base);
        debug!("Submitting generation for model: {}", request.model);

        let token = self.tokens.token().await.map_err(|e| {
          error!("Error generating image: {}", e);
          e
        })?;
        let body = AuthorizedRequest
        {   request
          , token: &token
        };

        let response = self.http_client
          .post(&url)
          .json(&body)
          .send()
          .await
          .map_err(|e| {
            error!("Error generating image: {}", e);
            Error::Network(e.to_string())
          })?;

        let status = response.status();
        trace!("Generate response status: {}", status);
        if !status.is_success()
        {   error!("Error generating image: HTTP status {}", status);
            return Err(Error::HttpStatus(status.as_u16()));
        }

        let chunks = response
          .bytes_stream()
          .map(|chunk| {
            chunk
              .map(|bytes| bytes.to_vec())
              .map_err(|e| Error::Network(e.to_string()))
          });
        Ok(Box::pin(chunks))
    }
}
