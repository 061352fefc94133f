use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Gemini upstream configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Gemini API origin.
    /// TOML: `generation.base_url`. Default: `https://generativelanguage.googleapis.com`.
    #[serde(default = "default_base_url")]
    pub base_url: Url,

    /// Optional upstream HTTP proxy. If set, used for reqwest clients.
    /// TOML: `generation.proxy`. Example: `http://127.0.0.1:1080`.
    #[serde(default)]
    pub proxy: Option<Url>,

    /// Whole-request timeout; image generation is slow.
    /// TOML: `generation.timeout_secs`. Default: `180`.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Max retry attempts for transient upstream failures.
    /// TOML: `generation.retry_max_times`. Default: `2`.
    #[serde(default = "default_retry_max_times")]
    pub retry_max_times: usize,

    /// Four-panel layout image sent ahead of comic prompts.
    /// TOML: `generation.comic_layout_template`. Default: unset.
    #[serde(default)]
    pub comic_layout_template: Option<PathBuf>,

    /// Character-sheet layout image sent ahead of character prompts.
    /// TOML: `generation.character_sheet_template`. Default: unset.
    #[serde(default)]
    pub character_sheet_template: Option<PathBuf>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            proxy: None,
            timeout_secs: default_timeout_secs(),
            retry_max_times: default_retry_max_times(),
            comic_layout_template: None,
            character_sheet_template: None,
        }
    }
}

fn default_base_url() -> Url {
    Url::parse("https://generativelanguage.googleapis.com")
        .expect("default Gemini base url is valid")
}

fn default_timeout_secs() -> u64 {
    180
}

fn default_retry_max_times() -> usize {
    2
}
