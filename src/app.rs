//! Event loop connecting view callbacks to the controller

use tokio::sync::mpsc;
use log::{debug, info};
use crate::api::ImageApi;
use crate::controller::{SubmissionOutcome, UiController};
use crate::error::Error;
use crate::view::{RowId, ViewPort};

/// User actions the view reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent
{   AddLora
  , RemoveLora(RowId)
  , Submit
  , Cancel
}

pub type UiEventReceiver = mpsc::UnboundedReceiver<UiEvent>;

/// Sender side handed to whatever produces view callbacks
#[derive(Debug, Clone)]
pub struct VisioncraftHand
{   events_tx: mpsc::UnboundedSender<UiEvent>
}

impl VisioncraftHand
{   pub fn send(&self, event: UiEvent) -> Result<(), Error>
    {   self.events_tx.send(event).map_err(|_| {
          debug!("Event loop gone, dropping {:?}", event);
          Error::Disconnected
        })
    }

    pub fn add_lora(&self) -> Result<(), Error>
    {   self.send(UiEvent::AddLora)
    }

    pub fn remove_lora(&self, id: RowId) -> Result<(), Error>
    {   self.send(UiEvent::RemoveLora(id))
    }

    pub fn submit(&self) -> Result<(), Error>
    {   self.send(UiEvent::Submit)
    }

    pub fn cancel(&self) -> Result<(), Error>
    {   self.send(UiEvent::Cancel)
    }
}

/// Channel pair for `run_event_loop`
pub fn event_channel() -> (VisioncraftHand, UiEventReceiver)
{   let (events_tx, events_rx) = mpsc::unbounded_channel();
    (VisioncraftHand { events_tx }, events_rx)
}

/// Initialize the form for `category`, then serve events until every
/// hand is dropped. Returns the controller so the host can keep it.
pub async fn run<A, V>(
  mut controller: UiController<A, V>
, category: &str
, events: UiEventReceiver
) -> UiController<A, V>
where
  A: ImageApi
, V: ViewPort
{   controller.initialize(category).await;
    run_event_loop(&mut controller, events).await;
    controller
}

/// Dispatch events to the controller
///
/// While a submission is in flight `Cancel` aborts it, a second `Submit`
/// is dropped, and row edits wait until the submission is over.
pub async fn run_event_loop<A, V>(
  controller: &mut UiController<A, V>
, mut events: UiEventReceiver
)
where
  A: ImageApi
, V: ViewPort
{   debug!("Starting Visioncraft event loop");
    let mut deferred: Vec<UiEvent> = Vec::new();

    while let Some(event) = events.recv().await
    {   if event != UiEvent::Submit
        {   apply_idle_event(controller, event);
            continue;
        }

        let cancel = controller.cancel_handle();
        let outcome =
        {   let submission = controller.submit();
            tokio::pin!(submission);
            loop
            { tokio::select!
              { biased;
                // submission first, so it arms cancellation before any
                // queued Cancel is seen
                outcome = &mut submission => break outcome
              , Some(event) = events.recv() => match event
                {   UiEvent::Cancel => cancel.cancel()
                  , UiEvent::Submit => {
                      debug!("Submission already in flight, ignoring");
                    }
                  , other => deferred.push(other)
                }
              }
            }
        };
        log_outcome(&outcome);

        for event in deferred.drain(..)
        {   apply_idle_event(controller, event);
        }
    }
    info!("Visioncraft event loop finished");
}

fn apply_idle_event<A, V>(
  controller: &mut UiController<A, V>
, event: UiEvent
)
where
  A: ImageApi
, V: ViewPort
{   match event
    {   UiEvent::AddLora => {
          controller.add_lora_row();
        }
      , UiEvent::RemoveLora(id) => {
          controller.remove_lora_row(id);
        }
      , UiEvent::Cancel => controller.dismiss_overlay()
      , UiEvent::Submit => {}
    }
}

fn log_outcome(outcome: &SubmissionOutcome)
{   match outcome
    {   SubmissionOutcome::Succeeded { image_url, seed } => {
          info!("Submission succeeded: {} (seed {})", image_url, seed);
        }
      , SubmissionOutcome::Rejected(e) => info!("Submission rejected: {}", e)
      , SubmissionOutcome::Failed(e) => info!("Submission failed: {}", e)
      , SubmissionOutcome::Cancelled => info!("Submission cancelled")
    }
}
