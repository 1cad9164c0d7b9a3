//! Sources of the token sent with generation requests

use std::time::{Duration, Instant};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use log::{debug, error, trace};
use crate::config::TokenConfig;
use crate::error::Error;

/// Supplies the token attached to each generation request
#[async_trait]
pub trait TokenSource: Send + Sync
{   async fn token(&self) -> Result<String, Error>;
}

/// Fixed token, for local services and tests
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken
{   async fn token(&self) -> Result<String, Error>
    {   Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct IssuedTokenResponse
{   token: String
  , expires_in: u64
}

#[derive(Debug)]
struct CachedToken
{   value: String
  , refresh_at: Instant
}

/// Short-lived token fetched from an issuing endpoint
///
/// The credential is presented as a bearer header; the returned token is
/// reused until `refresh_margin_secs` before it expires.
pub struct IssuedToken
{   config: TokenConfig
  , http_client: reqwest::Client
  , cached: Mutex<Option<CachedToken>>
}

impl IssuedToken
{   pub fn new(
      config: TokenConfig
    , http_client: reqwest::Client
    ) -> Self
    {   debug!("Creating IssuedToken for {}", config.token_url);
        IssuedToken
        {   config
          , http_client
          , cached: Mutex::new(None)
        }
    }

    async fn fetch(&self) -> Result<CachedToken, Error>
    {   debug!("Requesting token from {}", self.config.token_url);

        let response = self.http_client
          .post(&self.config.token_url)
          .bearer_auth(&self.config.credential)
          .send()
          .await
          .map_err(|e| {
            error!("Token request failed: {}", e);
            Error::Auth(e.to_string())
          })?;

        let status = response.status();
        trace!("Token response status: {}", status);
        if !status.is_success()
        {   error!("Token endpoint refused: {}", status);
            return Err(Error::Auth(format!(
              "token endpoint returned {}", status.as_u16()
            )));
        }

        let issued: IssuedTokenResponse
          = response.json().await.map_err(|e| {
            error!("Token parse error: {}", e);
            Error::Parse(e.to_string())
          })?;

        let lifetime = Duration::from_secs(
          issued.expires_in
            .saturating_sub(self.config.refresh_margin_secs)
        );
        let refresh_at = Instant::now().checked_add(lifetime)
          .ok_or_else(|| {
            error!("Token lifetime out of range: {}", issued.expires_in);
            Error::Auth(format!(
              "expires_in out of range: {}", issued.expires_in
            ))
          })?;
        Ok(CachedToken
        {   value: issued.token
          , refresh_at
        })
    }
}

#[async_trait]
impl TokenSource for IssuedToken
{   async fn token(&self) -> Result<String, Error>
    {   let mut cached = self.cached.lock().await;
        if let Some(current) = cached.as_ref()
        {   if Instant::now() < current.refresh_at
            {   trace!("Reusing cached token");
                return Ok(current.value.clone());
            }
            debug!("Cached token expired");
        }
        let fresh = self.fetch().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}
