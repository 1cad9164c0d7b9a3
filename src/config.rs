//! Configuration for the Visioncraft client and form

use serde::{Deserialize, Serialize};
use log::debug;

/// Public image API of the hosted service
pub const DEFAULT_API_BASE: &str
  = "https://visioncraft.top/api/image";

/// Sampler sent with every generation request
pub const SAMPLER: &str = "DPM++ 2M Karras";

/// Hard cap on LoRA rows in the form
pub const MAX_LORA_ROWS: usize = 5;

/// Weight pre-filled in a freshly added LoRA row
pub const DEFAULT_LORA_WEIGHT: &str = "0.8";

/// Accepted LoRA weight range, inclusive
pub const LORA_WEIGHT_MIN: f32 = 0.1;
pub const LORA_WEIGHT_MAX: f32 = 2.0;

const ENV_API_BASE: &str = "VISIONCRAFT_API_BASE";
const ENV_TOKEN_URL: &str = "VISIONCRAFT_TOKEN_URL";
const ENV_CREDENTIAL: &str = "VISIONCRAFT_CREDENTIAL";
const ENV_TIMEOUT: &str = "VISIONCRAFT_TIMEOUT_SECS";

/// Where generation tokens come from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig
{   /// Endpoint issuing short-lived tokens
    pub token_url: String
  , /// Credential presented to the token endpoint
    pub credential: String
  , /// Refresh this many seconds before expiry
    pub refresh_margin_secs: u64
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig
{   /// API base URL
    pub api_base: String
  , /// Timeout for connecting and for list requests, in seconds
    pub timeout_secs: Option<u64>
  , /// Token issuing, if the service requires it
    pub token: Option<TokenConfig>
}

impl Default for ClientConfig
{   fn default() -> Self
    {   ClientConfig
        {   api_base: DEFAULT_API_BASE.to_string()
          , timeout_secs: Some(30)
          , token: None
        }
    }
}

impl ClientConfig
{   /// Defaults overlaid with `VISIONCRAFT_*` environment variables
    pub fn from_env() -> Result<Self, crate::error::Error>
    {   let mut config = ClientConfig::default();

        if let Ok(base) = std::env::var(ENV_API_BASE)
        {   debug!("Using API base from environment: {}", base);
            config.api_base = base;
        }

        if let Ok(raw) = std::env::var(ENV_TIMEOUT)
        {   let secs = raw.trim().parse::<u64>()
              .map_err(|_| {
                crate::error::Error::InvalidConfiguration(
                  format!("{} is not a number: {}", ENV_TIMEOUT, raw)
                )
              })?;
            config.timeout_secs = Some(secs);
        }

        match (
          std::env::var(ENV_TOKEN_URL).ok()
        , std::env::var(ENV_CREDENTIAL).ok()
        )
        {   (Some(token_url), Some(credential)) => {
              config.token = Some(TokenConfig
              {   token_url
                , credential
                , refresh_margin_secs: 30
              });
            }
          , (None, None) => {}
          , _ => {
              return Err(crate::error::Error::InvalidConfiguration(
                format!(
                  "{} and {} must be set together",
                  ENV_TOKEN_URL, ENV_CREDENTIAL
                )
              ));
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no request could succeed with
    pub fn validate(&self) -> Result<(), crate::error::Error>
    {   if !(self.api_base.starts_with("http://")
          || self.api_base.starts_with("https://"))
        {   return Err(crate::error::Error::InvalidConfiguration(
              format!("api_base must be an http(s) URL: {}", self.api_base)
            ));
        }
        if self.timeout_secs == Some(0)
        {   return Err(crate::error::Error::InvalidConfiguration(
              "timeout_secs must be positive".to_string()
            ));
        }
        Ok(())
    }

    /// API base without a trailing slash
    pub fn base(&self) -> &str
    {   self.api_base.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn default_points_at_hosted_service()
    {   let config = ClientConfig::default();
        assert_eq!(config.base(), DEFAULT_API_BASE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn trailing_slash_is_trimmed()
    {   let config = ClientConfig
        {   api_base: "http://localhost:8080/api/".to_string()
          , ..ClientConfig::default()
        };
        assert_eq!(config.base(), "http://localhost:8080/api");
    }

    #[test]
    fn non_http_base_is_rejected()
    {   let config = ClientConfig
        {   api_base: "visioncraft.top".to_string()
          , ..ClientConfig::default()
        };
        assert!(matches!(
          config.validate(),
          Err(crate::error::Error::InvalidConfiguration(_))
        ));
    }
}
