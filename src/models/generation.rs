use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIN_STEPS: u32 = 5;
pub const MAX_STEPS: u32 = 20;
pub const MIN_GUIDANCE: f32 = 3.0;
pub const MAX_GUIDANCE: f32 = 10.0;
/// Seeds are kept inside the signed 32-bit range.
pub const MAX_SEED: u64 = i32::MAX as u64;

pub const DEFAULT_STEPS: u32 = 10;
pub const DEFAULT_GUIDANCE: f32 = 5.0;

pub const EXAMPLE_PROMPTS: [&str; 5] = [
    "A serene landscape with mountains and a lake at sunset",
    "A futuristic cityscape with flying cars and neon lights",
    "A photorealistic portrait of a fantasy character with detailed features",
    "An abstract painting with vibrant colors and geometric shapes",
    "A cozy cafe interior with warm lighting and people reading books",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum ImageDimension {
    Px256,
    Px512,
    Px768,
    Px1024,
}

impl ImageDimension {
    pub const ALL: [ImageDimension; 4] = [
        ImageDimension::Px256,
        ImageDimension::Px512,
        ImageDimension::Px768,
        ImageDimension::Px1024,
    ];

    pub fn pixels(self) -> u32 {
        match self {
            ImageDimension::Px256 => 256,
            ImageDimension::Px512 => 512,
            ImageDimension::Px768 => 768,
            ImageDimension::Px1024 => 1024,
        }
    }
}

impl Default for ImageDimension {
    fn default() -> Self {
        ImageDimension::Px256
    }
}

impl From<ImageDimension> for u32 {
    fn from(d: ImageDimension) -> Self {
        d.pixels()
    }
}

impl TryFrom<u32> for ImageDimension {
    type Error = ValidationError;

    fn try_from(px: u32) -> Result<Self, Self::Error> {
        ImageDimension::ALL
            .into_iter()
            .find(|d| d.pixels() == px)
            .ok_or(ValidationError::UnsupportedDimension(px))
    }
}

impl fmt::Display for ImageDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}px", self.pixels())
    }
}

/// One typed edit of the generation form.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Prompt(String),
    NegativePrompt(String),
    Steps(u32),
    GuidanceScale(f32),
    Width(ImageDimension),
    Height(ImageDimension),
    /// Raw seed text; an empty string clears the seed. Parsed at submission.
    Seed(String),
}

/// Editable form fields backing a generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationForm {
    pub prompt: String,
    pub negative_prompt: String,
    pub steps: u32,
    pub guidance_scale: f32,
    pub width: ImageDimension,
    pub height: ImageDimension,
    pub seed: String,
}

impl Default for GenerationForm {
    fn default() -> Self {
        GenerationForm {
            prompt: String::new(),
            negative_prompt: String::new(),
            steps: DEFAULT_STEPS,
            guidance_scale: DEFAULT_GUIDANCE,
            width: ImageDimension::default(),
            height: ImageDimension::default(),
            seed: String::new(),
        }
    }
}

impl GenerationForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, update: FieldUpdate) -> Result<(), ValidationError> {
        match update {
            FieldUpdate::Prompt(prompt) => self.prompt = prompt,
            FieldUpdate::NegativePrompt(negative) => self.negative_prompt = negative,
            FieldUpdate::Steps(steps) => self.steps = check_steps(steps)?,
            FieldUpdate::GuidanceScale(scale) => self.guidance_scale = check_guidance(scale)?,
            FieldUpdate::Width(width) => self.width = width,
            FieldUpdate::Height(height) => self.height = height,
            FieldUpdate::Seed(seed) => self.seed = seed.trim().to_string(),
        }
        Ok(())
    }

    /// Returns `Ok(None)` for an empty seed field.
    pub fn parsed_seed(&self) -> Result<Option<u64>, ValidationError> {
        if self.seed.is_empty() {
            return Ok(None);
        }
        self.seed
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ValidationError::InvalidSeed(self.seed.clone()))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.to_request().map(|_| ())
    }

    /// Snapshot the form into an immutable request.
    pub fn to_request(&self) -> Result<GenerationRequest, ValidationError> {
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        let seed = self.parsed_seed()?;
        let negative_prompt = if self.negative_prompt.trim().is_empty() {
            None
        } else {
            Some(self.negative_prompt.clone())
        };

        Ok(GenerationRequest {
            prompt: self.prompt.clone(),
            negative_prompt,
            num_inference_steps: check_steps(self.steps)?,
            guidance_scale: check_guidance(self.guidance_scale)?,
            width: self.width,
            height: self.height,
            seed,
        })
    }
}

fn check_steps(steps: u32) -> Result<u32, ValidationError> {
    if (MIN_STEPS..=MAX_STEPS).contains(&steps) {
        Ok(steps)
    } else {
        Err(ValidationError::StepsOutOfRange {
            value: steps,
            min: MIN_STEPS,
            max: MAX_STEPS,
        })
    }
}

fn check_guidance(scale: f32) -> Result<f32, ValidationError> {
    let in_range = (MIN_GUIDANCE..=MAX_GUIDANCE).contains(&scale);
    // 0.5 increments only
    let on_step = (scale * 2.0).fract() == 0.0;
    if in_range && on_step {
        Ok(scale)
    } else {
        Err(ValidationError::GuidanceOutOfRange {
            value: scale,
            min: MIN_GUIDANCE,
            max: MAX_GUIDANCE,
        })
    }
}

/// Validated request body for `POST /generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    pub num_inference_steps: u32,
    pub guidance_scale: f32,
    pub width: ImageDimension,
    pub height: ImageDimension,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Success body of `POST /generate` as sent by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationResponse {
    pub image_url: String,
    #[serde(default)]
    pub generation_params: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    /// Always absolute; relative backend paths are resolved against the origin.
    pub image_url: String,
    pub generation_params: serde_json::Map<String, serde_json::Value>,
}

impl GenerationResult {
    /// Parameters echoed by the backend, as indented JSON.
    pub fn params_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.generation_params).unwrap_or_default()
    }

    pub fn download_filename(timestamp_millis: i64) -> String {
        format!("sd-image-{}.png", timestamp_millis)
    }
}

/// Error body of any non-2xx reply.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}
