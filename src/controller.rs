//! Form controller driving one submission at a time

use std::sync::Arc;
use futures::StreamExt;
use tokio::sync::watch;
use log::{debug, error, info, warn};
use crate::api::ImageApi;
use crate::config::MAX_LORA_ROWS;
use crate::error::Error;
use crate::request::{GenerationRequest, JobStatusRecord};
use crate::stream::{JobStream, RecordDecoder};
use crate::view::{Field, RowId, ViewPort};

pub const SUBMITTING_MESSAGE: &str = "Submitting job...";
pub const WAITING_STATUS: &str = "Waiting in queue";
pub const RUNNING_STATUS: &str = "Generating image";
pub const RUNNING_PLACEHOLDER: &str = "Processing...";
pub const GENERATE_FAILED_ALERT: &str
  = "Failed to generate image. Please try again.";
pub const LORA_LIMIT_ALERT: &str
  = "Maximum of 5 LORA entries allowed.";

/// Where the current (or last) submission stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState
{   Idle
  , Submitting
  , Polling
  , Succeeded
  , Failed
  , Cancelled
}

/// How a submission ended
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome
{   /// Image rendered
    Succeeded
    {   image_url: String
      , seed: i64
    }
  , /// Form could not be turned into a request; nothing was sent
    Rejected(Error)
  , /// Request or status stream failed
    Failed(Error)
  , /// User cancelled while the job was in flight
    Cancelled
}

/// Aborts the submission in flight
///
/// Cloneable and usable while the controller itself is busy polling.
#[derive(Debug, Clone)]
pub struct CancelHandle
{   tx: Arc<watch::Sender<bool>>
}

impl CancelHandle
{   pub fn cancel(&self)
    {   debug!("Cancel requested");
        self.tx.send_replace(true);
    }
}

/// Wires form input to the image API and renders progress
pub struct UiController<A, V>
{   api: A
  , view: V
  , lora_options: Vec<String>
  , state: SubmissionState
  , cancel_tx: Arc<watch::Sender<bool>>
}

impl<A, V> UiController<A, V>
where
  A: ImageApi
, V: ViewPort
{   pub fn new(api: A, view: V) -> Self
    {   debug!("Creating UiController");
        let (cancel_tx, _) = watch::channel(false);
        UiController
        {   api
          , view
          , lora_options: Vec::new()
          , state: SubmissionState::Idle
          , cancel_tx: Arc::new(cancel_tx)
        }
    }

    pub fn view(&self) -> &V
    {   &self.view
    }

    pub fn view_mut(&mut self) -> &mut V
    {   &mut self.view
    }

    pub fn api(&self) -> &A
    {   &self.api
    }

    pub fn state(&self) -> SubmissionState
    {   self.state
    }

    /// LoRA names offered in every new row
    pub fn lora_options(&self) -> &[String]
    {   &self.lora_options
    }

    pub fn cancel_handle(&self) -> CancelHandle
    {   CancelHandle
        {   tx: Arc::clone(&self.cancel_tx)
        }
    }

    /// Title, model list and the first LoRA row for `category`
    pub async fn initialize(&mut self, category: &str)
    {   info!("Initializing Visioncraft for category: {}", category);
        self.update_page_title(category);
        self.initialize_models(category).await;
        self.initialize_loras(category).await;
    }

    pub fn update_page_title(&mut self, category: &str)
    {   self.view.set_page_title(
          &format!("Visioncraft {} Image Generator", category)
        );
    }

    /// Fill the model select; failures are logged only
    pub async fn initialize_models(&mut self, category: &str)
    {   match self.api.fetch_models(category).await
        {   Ok(models) => {
              debug!("Loaded {} models", models.len());
              self.view.set_model_options(&models);
            }
          , Err(e) => {
              error!("Error initializing models: {}", e);
            }
        }
    }

    /// Fetch LoRA options once and render the first row
    pub async fn initialize_loras(&mut self, category: &str)
    {   match self.api.fetch_loras(category).await
        {   Ok(loras) => {
              debug!("Loaded {} LoRA options", loras.len());
              self.lora_options = loras;
              self.add_lora_row();
            }
          , Err(e) => {
              error!("Error initializing LORAs: {}", e);
            }
        }
    }

    /// Append a row unless the form already holds the maximum
    pub fn add_lora_row(&mut self) -> Option<RowId>
    {   let count = self.view.lora_rows().len();
        if count >= MAX_LORA_ROWS
        {   warn!("Refusing LoRA row {}", count + 1);
            self.view.alert(LORA_LIMIT_ALERT);
            return None;
        }
        let id = self.view.append_lora_row(&self.lora_options);
        debug!("Added LoRA row {:?}", id);
        Some(id)
    }

    pub fn remove_lora_row(&mut self, id: RowId) -> bool
    {   let removed = self.view.remove_lora_row(id);
        debug!("Remove LoRA row {:?}: {}", id, removed);
        removed
    }

    /// Cancel outside a submission only dismisses the overlay
    pub fn dismiss_overlay(&mut self)
    {   self.view.hide_overlay();
    }

    /// Build the request from the form as it is right now
    pub fn build_request(&self) -> Result<GenerationRequest, Error>
    {   GenerationRequest::from_form(
          &self.view.form_fields(),
          &self.view.lora_rows()
        )
    }

    /// Run one submission to its end
    ///
    /// Every failure is shown to the user here; the outcome is returned
    /// for the caller's information only.
    pub async fn submit(&mut self) -> SubmissionOutcome
    {   let request = match self.build_request()
        {   Ok(request) => request
          , Err(e) => {
              warn!("Rejected submission: {}", e);
              self.state = SubmissionState::Idle;
              self.view.alert(&e.to_string());
              return SubmissionOutcome::Rejected(e);
            }
        };

        self.cancel_tx.send_replace(false);
        let mut cancelled = self.cancel_tx.subscribe();

        self.state = SubmissionState::Submitting;
        self.view.show_overlay(SUBMITTING_MESSAGE);
        self.view.show_image(None);

        let issued = tokio::select!
        {   result = self.api.generate_image(&request) => result
          , _ = cancelled.wait_for(|c| *c) => Err(Error::Cancelled)
        };

        let stream = match issued
        {   Ok(stream) => stream
          , Err(Error::Cancelled) => return self.finish_cancelled()
          , Err(e) => {
              error!("Error: {}", e);
              self.state = SubmissionState::Failed;
              self.view.hide_overlay();
              self.view.alert(GENERATE_FAILED_ALERT);
              return SubmissionOutcome::Failed(e);
            }
        };

        self.state = SubmissionState::Polling;
        match self.poll_job_status(stream, &mut cancelled).await
        {   Ok((image_url, seed)) => {
              info!("Image ready: {}", image_url);
              self.state = SubmissionState::Succeeded;
              self.view.hide_overlay();
              self.display_generated_image(&image_url, seed);
              SubmissionOutcome::Succeeded { image_url, seed }
            }
          , Err(Error::Cancelled) => self.finish_cancelled()
          , Err(e) => {
              error!("Error polling job status: {}", e);
              self.state = SubmissionState::Failed;
              self.view.hide_overlay();
              self.view.alert(
                &format!("Error checking job status: {}", e)
              );
              SubmissionOutcome::Failed(e)
            }
        }
    }

    /// Read records until SUCCESS, an error, or cancellation
    ///
    /// Returning drops the stream, which closes the connection.
    async fn poll_job_status(
      &mut self
    , mut stream: JobStream
    , cancelled: &mut watch::Receiver<bool>
    ) -> Result<(String, i64), Error>
    {   let mut decoder = RecordDecoder::new();

        loop
        {   let chunk = tokio::select!
            {   chunk = stream.next() => chunk
              , _ = cancelled.wait_for(|c| *c) => {
                  return Err(Error::Cancelled);
                }
            };

            let records = match chunk
            {   Some(bytes) => decoder.push(&bytes?)?
              , None => {
                  debug!("Status stream ended");
                  if let Some(record) = decoder.finish()?
                  {   if let Some(done) = self.apply_record(record)
                      {   return Ok(done);
                      }
                  }
                  return Err(Error::StreamClosed);
                }
            };

            for record in records
            {   if let Some(done) = self.apply_record(record)
                {   return Ok(done);
                }
            }
        }
    }

    /// Show progress; hand back the image on SUCCESS
    fn apply_record(&mut self, record: JobStatusRecord)
      -> Option<(String, i64)>
    {   debug!("Job record: {:?}", record);
        match record
        {   JobStatusRecord::Waiting { queue_position, queue_total } => {
              self.view.set_status(
                WAITING_STATUS,
                &format!("Position: {} / {}", queue_position, queue_total)
              );
              None
            }
          , JobStatusRecord::Running { progress } => {
              self.view.set_status(
                RUNNING_STATUS,
                progress.as_deref().unwrap_or(RUNNING_PLACEHOLDER)
              );
              None
            }
          , JobStatusRecord::Success { image_url, seed } => {
              Some((image_url, seed))
            }
        }
    }

    fn display_generated_image(&mut self, image_url: &str, seed: i64)
    {   self.view.show_image(Some(image_url));
        self.view.set_field(Field::Seed, &seed.to_string());
    }

    fn finish_cancelled(&mut self) -> SubmissionOutcome
    {   info!("Submission cancelled");
        self.state = SubmissionState::Cancelled;
        self.view.hide_overlay();
        SubmissionOutcome::Cancelled
    }
}
