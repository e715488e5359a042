//! Configuration for the grading pipeline.
//!
//! Every knob lives in one immutable [`GraderConfig`], built once at startup
//! via [`GraderConfigBuilder`] (or [`GraderConfig::from_env`]) and shared by
//! reference with the extractor and the Gemini client. Nothing here is
//! mutated after the server starts.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default Gemini REST endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Configuration for a grading server or one-shot grading run.
///
/// # Example
/// ```rust
/// use edgequake_grade::GraderConfig;
///
/// let config = GraderConfig::builder()
///     .api_key("test-key")
///     .dpi(200)
///     .model("gemini-2.5-flash")
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Clone)]
pub struct GraderConfig {
    /// Rasterisation DPI for each page. Range: 72–600. Default: 300.
    ///
    /// Handwriting OCR needs far more pixels than a VLM does; 300 DPI is the
    /// resolution tesseract's models were trained at.
    pub dpi: u32,

    /// Per-edge pixel cap applied on top of `dpi`. Default: 6000.
    ///
    /// A 300-DPI A4 page is 2480 × 3508 px and is unaffected; oversized
    /// pages (posters, A0 scans) are scaled down to fit.
    pub max_rendered_pixels: u32,

    /// Tesseract language profile. Default: `eng`.
    pub ocr_language: String,

    /// Tesseract executable. Default: `tesseract` (resolved on `PATH`).
    pub tesseract_cmd: String,

    /// Gemini model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Gemini API key. Required.
    pub api_key: String,

    /// Gemini REST base URL, without trailing slash.
    pub api_base_url: String,

    /// Fixed sampling parameters sent with every request.
    pub generation: GenerationSettings,

    /// Safety thresholds sent with every request.
    pub safety_settings: Vec<SafetySetting>,

    /// Optional client-side timeout for the model call. Default: none.
    pub api_timeout_secs: Option<u64>,

    /// Maximum accepted upload size in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_rendered_pixels: 6000,
            ocr_language: "eng".to_string(),
            tesseract_cmd: "tesseract".to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            generation: GenerationSettings::default(),
            safety_settings: SafetySetting::default_set(),
            api_timeout_secs: None,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl fmt::Debug for GraderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraderConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("ocr_language", &self.ocr_language)
            .field("tesseract_cmd", &self.tesseract_cmd)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .field("generation", &self.generation)
            .field("safety_settings", &self.safety_settings)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl GraderConfig {
    /// Create a new builder for `GraderConfig`.
    pub fn builder() -> GraderConfigBuilder {
        GraderConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a config from the process environment.
    ///
    /// `GEMINI_API_KEY` is required. Optional overrides: `GRADER_MODEL`,
    /// `GRADER_DPI`, `GRADER_OCR_LANGUAGE`, `TESSERACT_CMD`,
    /// `GEMINI_API_BASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`GraderConfig::from_env`] but reading from an arbitrary
    /// lookup, so tests need not touch the real environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GEMINI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let mut builder = Self::builder().api_key(api_key);

        if let Some(model) = lookup("GRADER_MODEL").filter(|v| !v.is_empty()) {
            builder = builder.model(model);
        }
        if let Some(raw) = lookup("GRADER_DPI") {
            let dpi = raw.trim().parse::<u32>().map_err(|_| ConfigError::InvalidEnv {
                var: "GRADER_DPI".into(),
                value: raw.clone(),
            })?;
            builder = builder.dpi(dpi);
        }
        if let Some(lang) = lookup("GRADER_OCR_LANGUAGE").filter(|v| !v.is_empty()) {
            builder = builder.ocr_language(lang);
        }
        if let Some(cmd) = lookup("TESSERACT_CMD").filter(|v| !v.is_empty()) {
            builder = builder.tesseract_cmd(cmd);
        }
        if let Some(url) = lookup("GEMINI_API_BASE_URL").filter(|v| !v.is_empty()) {
            builder = builder.api_base_url(url);
        }

        builder.build()
    }

    /// Full `generateContent` URL for the configured model.
    pub fn generate_content_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Builder for [`GraderConfig`].
#[derive(Debug)]
pub struct GraderConfigBuilder {
    config: GraderConfig,
}

impl GraderConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn tesseract_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.config.tesseract_cmd = cmd.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn generation(mut self, generation: GenerationSettings) -> Self {
        self.config.generation = generation;
        self
    }

    pub fn safety_settings(mut self, settings: Vec<SafetySetting>) -> Self {
        self.config.safety_settings = settings;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GraderConfig, ConfigError> {
        if self.config.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        self.build_for_extraction()
    }

    /// Build without requiring an API key.
    ///
    /// For OCR-only runs that never call the model.
    pub fn build_for_extraction(self) -> Result<GraderConfig, ConfigError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(ConfigError::Invalid(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".into()));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(ConfigError::Invalid("OCR language must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&c.generation.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be 0.0–2.0, got {}",
                c.generation.temperature
            )));
        }
        if c.generation.max_output_tokens == 0 {
            return Err(ConfigError::Invalid("max_output_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid("API timeout must be ≥ 1s".into()));
        }
        Ok(self.config)
    }
}

// ── Generation & safety ──────────────────────────────────────────────────

/// Sampling parameters for the grading call.
///
/// Serialises to Gemini's `generationConfig` object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    /// Low temperature keeps scores consistent across runs. Default: 0.2.
    pub temperature: f32,
    /// Default: 1.0 (nucleus sampling off).
    pub top_p: f32,
    /// Default: 1 (greedy).
    pub top_k: u32,
    /// Default: 8192; long answer sheets produce long evaluations.
    pub max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_p: 1.0,
            top_k: 1,
            max_output_tokens: 8192,
        }
    }
}

/// Gemini harm categories we set thresholds for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

/// Severity at which Gemini withholds content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockLowAndAbove,
    BlockMediumAndAbove,
    BlockOnlyHigh,
    BlockNone,
}

/// One entry of Gemini's `safetySettings` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

impl SafetySetting {
    /// All four categories at `BLOCK_MEDIUM_AND_ABOVE`.
    pub fn default_set() -> Vec<SafetySetting> {
        [
            HarmCategory::Harassment,
            HarmCategory::HateSpeech,
            HarmCategory::SexuallyExplicit,
            HarmCategory::DangerousContent,
        ]
        .into_iter()
        .map(|category| SafetySetting {
            category,
            threshold: HarmBlockThreshold::BlockMediumAndAbove,
        })
        .collect()
    }
}
