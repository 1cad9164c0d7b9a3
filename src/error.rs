use std::fmt;

/// Error type for Visioncraft operations
/// Implements Clone so outcomes can be handed back through channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error
{   /// Transport failure talking to the service
    Network(String)
  , /// Response body could not be decoded
    Parse(String)
  , /// Service answered with a non-success status code
    HttpStatus(u16)
  , /// A job record carried a status tag we do not know
    UnexpectedStatus(String)
  , /// The status stream ended before a terminal record
    StreamClosed
  , /// The submission was cancelled by the user
    Cancelled
  , /// A form field could not be turned into a request value
    InvalidInput
    {   field: String
      , value: String
    }
  , /// Token could not be obtained
    Auth(String)
  , /// Invalid configuration
    InvalidConfiguration(String)
  , /// The controller's event channel is closed
    Disconnected
}

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Error::Network(msg) => {
              write!(f, "Network error: {}", msg)
            }
          , Error::Parse(msg) => {
              write!(f, "Parse error: {}", msg)
            }
          , Error::HttpStatus(code) => {
              write!(f, "HTTP error! status: {}", code)
            }
          , Error::UnexpectedStatus(tag) => {
              write!(f, "Unexpected status: {}", tag)
            }
          , Error::StreamClosed => {
              write!(f, "Connection closed unexpectedly")
            }
          , Error::Cancelled => {
              write!(f, "Submission cancelled")
            }
          , Error::InvalidInput { field, value } => {
              write!(f,
                "Invalid value for {}: {:?}",
                field, value
              )
            }
          , Error::Auth(msg) => {
              write!(f, "Authentication error: {}", msg)
            }
          , Error::InvalidConfiguration(msg) => {
              write!(f, "Invalid configuration: {}", msg)
            }
          , Error::Disconnected => {
              write!(f, "Controller disconnected")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<reqwest::Error> for Error
{   fn from(e: reqwest::Error) -> Self
    {   if e.is_decode()
        {   Error::Parse(e.to_string())
        } else if let Some(status) = e.status()
        {   Error::HttpStatus(status.as_u16())
        } else
        {   Error::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for Error
{   fn from(e: serde_json::Error) -> Self
    {   Error::Parse(e.to_string())
    }
}
