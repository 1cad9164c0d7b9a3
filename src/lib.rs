pub mod error;
pub mod config;
pub mod request;
pub mod stream;
pub mod auth;
pub mod api;
pub mod view;
pub mod controller;
pub mod app;

/*

visioncraft: async client for the Visioncraft image generation service.
A form (any toolkit, behind the ViewPort trait) collects a prompt and
settings, the controller submits a job and follows its status stream
until the finished image URL arrives.

visioncraft/
├── Cargo.toml
├── src/
│   ├── lib.rs          # Re-exports and logging setup
│   ├── error.rs        # Error taxonomy
│   ├── config.rs       # Client configuration and form constants
│   ├── request.rs      # Request payload and job status records
│   ├── stream.rs       # Status stream decoding
│   ├── auth.rs         # Token sources
│   ├── api.rs          # HTTP client (models, loras, generate)
│   ├── view.rs         # View contract
│   ├── controller.rs   # Submission state machine
│   └── app.rs          # Event loop
└── tests/              # Integration tests

*/

pub use api::{ImageApi, VisioncraftApi};
pub use app::{event_channel, run, run_event_loop, UiEvent, VisioncraftHand};
pub use auth::{IssuedToken, StaticToken, TokenSource};
pub use config::ClientConfig;
pub use controller::{
  CancelHandle, SubmissionOutcome, SubmissionState, UiController
};
pub use error::Error;
pub use request::{FormFields, GenerationRequest, JobStatusRecord, LoraRow};
pub use stream::{JobStream, RecordDecoder};
pub use view::{Field, RowId, ViewPort};

const RUST_LOG: &str = "RUST_LOG";

/// Start env_logger, defaulting to `info` when RUST_LOG is unset
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging()
{   let env = env_logger::Env::default()
      .filter_or(RUST_LOG, "info");
    let _ = env_logger::Builder::from_env(env).try_init();
}
