#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use async_trait::async_trait;
use futures::StreamExt;
use visioncraft::{
  Error, Field, GenerationRequest, ImageApi, JobStream, LoraRow, RowId,
  ViewPort
};

pub fn init_test_logging()
{   let _ = env_logger::builder().is_test(true).try_init();
}

/// In-memory view recording everything the controller does to it
#[derive(Debug, Default)]
pub struct FakeView
{   pub fields: HashMap<Field, String>
  , pub model_options: Vec<String>
  , pub rows: Vec<LoraRow>
  , pub row_options: HashMap<RowId, Vec<String>>
  , next_row: u64
  , pub overlay_visible: bool
  , pub overlay_message: Option<String>
  , pub status_history: Vec<(String, String)>
  , pub image: Option<String>
  , pub image_history: Vec<Option<String>>
  , pub alerts: Vec<String>
  , pub title: String
}

impl FakeView
{   /// A view with every numeric field holding a valid value
    pub fn filled() -> Self
    {   let mut view = FakeView::default();
        for (field, value) in [
          (Field::Model, "flux-dev")
        , (Field::Prompt, "a red fox in snow")
        , (Field::NegativePrompt, "low quality")
        , (Field::Steps, "25")
        , (Field::Width, "512")
        , (Field::Height, "768")
        , (Field::CfgScale, "7")
        , (Field::Seed, "99")
        ]
        {   view.fields.insert(field, value.to_string());
        }
        view
    }

    pub fn select_lora(&mut self, id: RowId, name: &str, weight: &str)
    {   let row = self.rows.iter_mut()
          .find(|r| r.id == id)
          .expect("row is rendered");
        row.selection = name.to_string();
        row.weight = weight.to_string();
    }

    pub fn seed(&self) -> String
    {   self.field(Field::Seed)
    }
}

impl ViewPort for FakeView
{   fn field(&self, field: Field) -> String
    {   self.fields.get(&field).cloned().unwrap_or_default()
    }

    fn set_field(&mut self, field: Field, value: &str)
    {   self.fields.insert(field, value.to_string());
    }

    fn set_model_options(&mut self, models: &[String])
    {   self.model_options = models.to_vec();
    }

    fn lora_rows(&self) -> Vec<LoraRow>
    {   self.rows.clone()
    }

    fn append_lora_row(&mut self, options: &[String]) -> RowId
    {   self.next_row += 1;
        let id = RowId(self.next_row);
        self.rows.push(LoraRow
        {   id
          , selection: String::new()
          , weight: visioncraft::config::DEFAULT_LORA_WEIGHT.to_string()
        });
        self.row_options.insert(id, options.to_vec());
        id
    }

    fn remove_lora_row(&mut self, id: RowId) -> bool
    {   let before = self.rows.len();
        self.rows.retain(|r| r.id != id);
        before != self.rows.len()
    }

    fn show_overlay(&mut self, message: &str)
    {   self.overlay_visible = true;
        self.overlay_message = Some(message.to_string());
    }

    fn hide_overlay(&mut self)
    {   self.overlay_visible = false;
    }

    fn set_status(&mut self, status: &str, progress: &str)
    {   self.status_history.push(
          (status.to_string(), progress.to_string())
        );
    }

    fn show_image(&mut self, url: Option<&str>)
    {   self.image = url.map(str::to_string);
        self.image_history.push(self.image.clone());
    }

    fn alert(&mut self, message: &str)
    {   self.alerts.push(message.to_string());
    }

    fn set_page_title(&mut self, title: &str)
    {   self.title = title.to_string();
    }
}

/// What a scripted generate call answers with
#[derive(Debug, Clone)]
pub enum Script
{   /// Stream these chunks, then end
    Chunks(Vec<String>)
  , /// Stream these chunks, then never end
    HoldOpen(Vec<String>)
  , /// Fail the call itself
    Fail(Error)
  , /// Never answer the call
    Stall
}

/// `ImageApi` double answering from fixed data
pub struct ScriptedApi
{   pub models: Result<Vec<String>, Error>
  , pub loras: Result<Vec<String>, Error>
  , pub script: Script
  , pub requests: Mutex<Vec<GenerationRequest>>
}

impl ScriptedApi
{   pub fn new(script: Script) -> Self
    {   ScriptedApi
        {   models: Ok(vec!["flux-dev".to_string(), "sdxl".to_string()])
          , loras: Ok(vec!["detail".to_string(), "film-grain".to_string()])
          , script
          , requests: Mutex::new(Vec::new())
        }
    }

    pub fn streaming(records: &[&str]) -> Self
    {   ScriptedApi::new(Script::Chunks(
          records.iter().map(|r| r.to_string()).collect()
        ))
    }

    pub fn sent(&self) -> Vec<GenerationRequest>
    {   self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageApi for ScriptedApi
{   async fn fetch_models(&self, _category: &str)
      -> Result<Vec<String>, Error>
    {   self.models.clone()
    }

    async fn fetch_loras(&self, _category: &str)
      -> Result<Vec<String>, Error>
    {   self.loras.clone()
    }

    async fn generate_image(&self, request: &GenerationRequest)
      -> Result<JobStream, Error>
    {   self.requests.lock().unwrap().push(request.clone());
        let to_chunks = |records: &Vec<String>| {
          records.iter()
            .map(|r| Ok(r.clone().into_bytes()))
            .collect::<Vec<Result<Vec<u8>, Error>>>()
        };
        match &self.script
        {   Script::Chunks(records) => {
              Ok(Box::pin(futures::stream::iter(to_chunks(records))))
            }
          , Script::HoldOpen(records) => {
              Ok(Box::pin(
                futures::stream::iter(to_chunks(records))
                  .chain(futures::stream::pending())
              ))
            }
          , Script::Fail(e) => Err(e.clone())
          , Script::Stall => futures::future::pending().await
        }
    }
}

pub const WAITING: &str
  = r#"{"status":"WAITING","queue_position":2,"queue_total":5}"#;
pub const RUNNING: &str
  = r#"{"status":"RUNNING","progress":"50%"}"#;
pub const SUCCESS: &str
  = r#"{"status":"SUCCESS","image_url":"https://x/y.png","seed":42}"#;
