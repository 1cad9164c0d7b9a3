//! The view contract the controller renders through

use crate::request::{FormFields, LoraRow};

/// Identifies a rendered LoRA row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(pub u64);

/// Named input fields of the generation form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field
{   Model
  , Prompt
  , NegativePrompt
  , Steps
  , Width
  , Height
  , CfgScale
  , Seed
}

impl Field
{   /// Form name of the field
    pub fn name(&self) -> &'static str
    {   match self
        {   Field::Model => "model"
          , Field::Prompt => "prompt"
          , Field::NegativePrompt => "negative_prompt"
          , Field::Steps => "steps"
          , Field::Width => "width"
          , Field::Height => "height"
          , Field::CfgScale => "cfg_scale"
          , Field::Seed => "seed"
        }
    }
}

/// Everything the controller needs from the host document
///
/// Implementations own the rendered state (field values, LoRA rows,
/// overlay visibility). The controller only reads and writes through this
/// trait, so any toolkit, terminal or test double can stand in.
pub trait ViewPort
{   /// Current text of a form field
    fn field(&self, field: Field) -> String;

    fn set_field(&mut self, field: Field, value: &str);

    /// Replace the options of the model select
    fn set_model_options(&mut self, models: &[String]);

    /// Rows currently rendered, in display order
    fn lora_rows(&self) -> Vec<LoraRow>;

    /// Render a new row offering `options`, with the default weight
    fn append_lora_row(&mut self, options: &[String]) -> RowId;

    /// Remove one row; false when it is not rendered
    fn remove_lora_row(&mut self, id: RowId) -> bool;

    fn show_overlay(&mut self, message: &str);

    fn hide_overlay(&mut self);

    /// Status and progress lines inside the overlay
    fn set_status(&mut self, status: &str, progress: &str);

    /// Show the image at `url`, or clear it with `None`
    fn show_image(&mut self, url: Option<&str>);

    /// Blocking notice to the user
    fn alert(&mut self, message: &str);

    fn set_page_title(&mut self, title: &str);

    /// Snapshot of all form fields
    fn form_fields(&self) -> FormFields
    {   FormFields
        {   model: self.field(Field::Model)
          , prompt: self.field(Field::Prompt)
          , negative_prompt: self.field(Field::NegativePrompt)
          , steps: self.field(Field::Steps)
          , width: self.field(Field::Width)
          , height: self.field(Field::Height)
          , cfg_scale: self.field(Field::CfgScale)
          , seed: self.field(Field::Seed)
        }
    }
}
