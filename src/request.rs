//! Request payload and job status record types

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use log::{debug, trace};
use crate::config::{
  LORA_WEIGHT_MAX, LORA_WEIGHT_MIN, MAX_LORA_ROWS, SAMPLER
};
use crate::error::Error;
use crate::view::Field;

/// LoRA adapter name to weight
pub type LoraWeights = BTreeMap<String, f32>;

/// Body of a generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest
{   pub model: String
  , pub prompt: String
  , pub negative_prompt: String
  , pub sampler: String
  , pub steps: u32
  , pub width: u32
  , pub height: u32
  , pub cfg_scale: f32
  , pub loras: LoraWeights
  , /// `None` is sent as `null` and lets the service pick
    pub seed: Option<i64>
  , pub stream: bool
  , pub nsfw_filter: bool
}

/// Request body as it goes on the wire
#[derive(Debug, Serialize)]
pub struct AuthorizedRequest<'a>
{   #[serde(flatten)]
    pub request: &'a GenerationRequest
  , pub token: &'a str
}

/// Raw form values, exactly as typed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormFields
{   pub model: String
  , pub prompt: String
  , pub negative_prompt: String
  , pub steps: String
  , pub width: String
  , pub height: String
  , pub cfg_scale: String
  , pub seed: String
}

/// One LoRA row as rendered in the form
#[derive(Debug, Clone, PartialEq)]
pub struct LoraRow
{   pub id: crate::view::RowId
  , /// Selected adapter, empty when nothing is chosen
    pub selection: String
  , /// Weight field text
    pub weight: String
}

impl GenerationRequest
{   /// Build a request from the current form contents
    ///
    /// Integers are parsed in base 10. Anything that is not a number is
    /// rejected with `Error::InvalidInput`; the only blank accepted is the
    /// seed, which becomes `None`.
    pub fn from_form(
      fields: &FormFields
    , rows: &[LoraRow]
    ) -> Result<Self, Error>
    {   let request = GenerationRequest
        {   model: fields.model.clone()
          , prompt: fields.prompt.clone()
          , negative_prompt: fields.negative_prompt.clone()
          , sampler: SAMPLER.to_string()
          , steps: parse_int(Field::Steps.name(), &fields.steps)?
          , width: parse_int(Field::Width.name(), &fields.width)?
          , height: parse_int(Field::Height.name(), &fields.height)?
          , cfg_scale: parse_float(Field::CfgScale.name(), &fields.cfg_scale)?
          , loras: lora_weights(rows)?
          , seed: parse_seed(&fields.seed)?
          , stream: true
          , nsfw_filter: false
        };
        trace!("Built generation request: {:?}", request);
        Ok(request)
    }
}

/// Collect rows that have both an adapter and a weight
pub fn lora_weights(rows: &[LoraRow])
  -> Result<LoraWeights, Error>
{   if rows.len() > MAX_LORA_ROWS
    {   return Err(Error::InvalidInput
        {   field: "loras".to_string()
          , value: format!("{} rows", rows.len())
        });
    }

    let mut weights = LoraWeights::new();
    for row in rows
    {   let weight_text = row.weight.trim();
        if row.selection.is_empty() || weight_text.is_empty()
        {   trace!("Skipping incomplete LoRA row {:?}", row.id);
            continue;
        }
        let weight = parse_float("lora weight", weight_text)?;
        if !(LORA_WEIGHT_MIN..=LORA_WEIGHT_MAX).contains(&weight)
        {   return Err(Error::InvalidInput
            {   field: format!("lora weight ({})", row.selection)
              , value: row.weight.clone()
            });
        }
        weights.insert(row.selection.clone(), weight);
    }
    debug!("Collected {} LoRA weights", weights.len());
    Ok(weights)
}

fn parse_int(field: &str, raw: &str) -> Result<u32, Error>
{   raw.trim().parse::<u32>().map_err(|_| invalid(field, raw))
}

fn parse_float(field: &str, raw: &str) -> Result<f32, Error>
{   raw.trim().parse::<f32>()
      .ok()
      .filter(|v| v.is_finite())
      .ok_or_else(|| invalid(field, raw))
}

fn parse_seed(raw: &str) -> Result<Option<i64>, Error>
{   let raw_trimmed = raw.trim();
    if raw_trimmed.is_empty()
    {   return Ok(None);
    }
    raw_trimmed.parse::<i64>()
      .map(Some)
      .map_err(|_| invalid(Field::Seed.name(), raw))
}

fn invalid(field: &str, raw: &str) -> Error
{   Error::InvalidInput
    {   field: field.to_string()
      , value: raw.to_string()
    }
}

/// One record of the job status stream
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatusRecord
{   Waiting
    {   queue_position: u64
      , queue_total: u64
    }
  , Running
    {   progress: Option<String>
    }
  , Success
    {   image_url: String
      , seed: i64
    }
}

/// Loose shape of a record before the tag is checked
#[derive(Debug, Deserialize)]
struct RawJobRecord
{   status: String
  , #[serde(default)]
    queue_position: Option<u64>
  , #[serde(default)]
    queue_total: Option<u64>
  , #[serde(default)]
    progress: Option<String>
  , #[serde(default)]
    image_url: Option<String>
  , #[serde(default)]
    seed: Option<i64>
}

impl JobStatusRecord
{   /// Decode a single JSON record
    pub fn from_json(text: &str) -> Result<Self, Error>
    {   let raw: RawJobRecord = serde_json::from_str(text)?;
        JobStatusRecord::try_from(raw)
    }

    /// SUCCESS ends the stream
    pub fn is_terminal(&self) -> bool
    {   matches!(self, JobStatusRecord::Success { .. })
    }
}

impl TryFrom<RawJobRecord> for JobStatusRecord
{   type Error = Error;

    fn try_from(raw: RawJobRecord) -> Result<Self, Error>
    {   match raw.status.as_str()
        {   "WAITING" => Ok(JobStatusRecord::Waiting
            {   queue_position: required(raw.queue_position, "queue_position")?
              , queue_total: required(raw.queue_total, "queue_total")?
            })
          , "RUNNING" => Ok(JobStatusRecord::Running
            {   progress: raw.progress.filter(|p| !p.is_empty())
            })
          , "SUCCESS" => Ok(JobStatusRecord::Success
            {   image_url: required(raw.image_url, "image_url")?
              , seed: required(raw.seed, "seed")?
            })
          , _ => Err(Error::UnexpectedStatus(raw.status))
        }
    }
}

fn required<T>(value: Option<T>, name: &str) -> Result<T, Error>
{   value.ok_or_else(|| {
      Error::Parse(format!("record is missing {}", name))
    })
}
