//! Loading application configuration (chat settings, generation knobs, park table) from TOML.
//!
//! Every section is optional; missing keys fall back to the defaults below.
//!
//! ```toml
//! [chat]
//! max_history = 50
//! timeout_secs = 30
//! max_sessions = 1000
//! idle_ttl_secs = 3600
//! fallback_reply = "Sorry, I can't answer right now."
//!
//! [[parks]]
//! min = 70
//! max = 130
//! park = "Denali National Park"
//! ```

use serde::Deserialize;
use tracing::{error, info};

use crate::parks::{ParkTable, ScoreRange};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub chat: ChatConfig,
  #[serde(default)]
  pub generation: GenerationConfig,
  /// Replaces the built-in table when present.
  #[serde(default)]
  pub parks: Option<Vec<ScoreRange>>,
}

/// Session and upstream-call behavior for the camping assistant.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
  pub max_history: usize,
  pub timeout_secs: u64,
  /// Extra attempts after a transient provider failure.
  pub max_retries: u32,
  pub fallback_reply: String,
  pub persist_turns: bool,
  pub default_category: String,
  pub system_instruction: String,
  /// Upper bound on live sessions; the least recently used idle one goes first.
  pub max_sessions: usize,
  /// Sessions untouched for this long are dropped when a new one is created.
  pub idle_ttl_secs: u64,
}

impl Default for ChatConfig {
  fn default() -> Self {
    Self {
      max_history: 50,
      timeout_secs: 30,
      max_retries: 1,
      fallback_reply: "Sorry, I'm having trouble reaching the camping assistant right now. Please try again in a moment.".into(),
      persist_turns: true,
      default_category: "general".into(),
      max_sessions: 1000,
      idle_ttl_secs: 3600,
      system_instruction: concat!(
        "You are an AI expert specializing in family-friendly camping advice. You have the knowledge of park rangers and survival specialists. ",
        "You are knowledgeable about camping in national parks, especially in tundras, deserts, valleys, mountains, and forests. ",
        "You provide expert guidance on the best camping gear and brands, strategies for sourcing food in the wild, essential survival skills, ",
        "and practical tips and tricks for a safe and enjoyable outdoor experience. ",
        "Maintain a friendly and supportive tone suitable for families and beginners. ",
        "Your responses are short, concise, and easy to understand. ",
        "You use diction that high school students can understand. ",
        "You DO NOT give responses longer than 4 sentences."
      )
      .into(),
    }
  }
}

/// Sampling parameters forwarded to the provider.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
  pub temperature: f32,
  pub top_p: f32,
  pub top_k: u32,
  pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
  fn default() -> Self {
    Self { temperature: 1.0, top_p: 1.0, top_k: 50, max_output_tokens: 10_000 }
  }
}

impl AppConfig {
  /// Build the park table, falling back to the defaults if the configured one is invalid.
  pub fn park_table(&self) -> ParkTable {
    match &self.parks {
      None => ParkTable::default(),
      Some(ranges) => match ParkTable::new(ranges.clone()) {
        Ok(t) => {
          info!(target: "trailhead", ranges = t.ranges().len(), "Using configured park table");
          t
        }
        Err(e) => {
          error!(target: "trailhead", error = %e, "Invalid park table in config; using defaults");
          ParkTable::default()
        }
      },
    }
  }
}

/// Attempt to load `AppConfig` from TRAILHEAD_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("TRAILHEAD_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "trailhead", %path, "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "trailhead", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "trailhead", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
