//! Game settings: variant, difficulty, AI tuning and rule options
//!
//! Settings are plain JSON; every field has a default so partial files work.

use crate::game::Variant;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Computer opponent strength
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl std::str::FromStr for Difficulty {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(ConfigError::Invalid(format!("unknown difficulty '{}'", other))),
        }
    }
}

/// One step of the classic priority heuristic. A uniform random pick
/// among all legal moves always follows the configured rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeuristicRule {
    /// Close a mill now
    FormMill,
    /// Occupy the opponent's winning point
    BlockMill,
    /// Leave two of ours and an empty point in a line
    Setup,
    /// Take the point the opponent would use for its own setup
    BlockSetup,
}

/// AI tuning
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Alpha-beta depth for the simple variant
    pub search_depth: u32,
    /// Score of a completed mill in the search
    pub win_score: i32,
    /// Classic heuristic order
    pub priorities: Vec<HeuristicRule>,
    /// Artificial thinking delay before a computer move
    pub thinking_delay_ms: u64,
    /// Random extra delay on top of `thinking_delay_ms`
    pub thinking_jitter_ms: u64,
    /// Random seed for reproducibility (None = random)
    pub seed: Option<u64>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            search_depth: 4,
            win_score: 100,
            priorities: vec![
                HeuristicRule::FormMill,
                HeuristicRule::BlockMill,
                HeuristicRule::Setup,
                HeuristicRule::BlockSetup,
            ],
            thinking_delay_ms: 600,
            thinking_jitter_ms: 400,
            seed: None,
        }
    }
}

impl AiConfig {
    /// Set search depth
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.search_depth = depth;
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Optional rule tweaks
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Classic game is drawn after this many moving plies without a capture
    pub no_capture_draw_limit: Option<u32>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            no_capture_draw_limit: Some(100),
        }
    }
}

/// Everything needed to start a local game
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub variant: Variant,
    pub difficulty: Difficulty,
    pub ai: AiConfig,
    pub rules: RulesConfig,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            variant: Variant::Classic,
            difficulty: Difficulty::Medium,
            ai: AiConfig::default(),
            rules: RulesConfig::default(),
        }
    }
}

impl GameSettings {
    /// Load from JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let settings: GameSettings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save to JSON file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ai.search_depth == 0 {
            return Err(ConfigError::Invalid("search_depth must be at least 1".to_string()));
        }
        if self.ai.win_score <= 0 {
            return Err(ConfigError::Invalid("win_score must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = GameSettings::default();
        assert_eq!(settings.ai.search_depth, 4);
        assert_eq!(settings.ai.win_score, 100);
        assert_eq!(settings.ai.priorities.len(), 4);
        assert_eq!(settings.rules.no_capture_draw_limit, Some(100));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: GameSettings =
            serde_json::from_str(r#"{"variant": "simple", "ai": {"search_depth": 2}}"#).unwrap();
        assert_eq!(settings.variant, Variant::Simple);
        assert_eq!(settings.ai.search_depth, 2);
        assert_eq!(settings.ai.thinking_delay_ms, 600);
        assert_eq!(settings.difficulty, Difficulty::Medium);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("morris-settings-{}.json", std::process::id()));
        let settings = GameSettings {
            difficulty: Difficulty::Hard,
            ai: AiConfig::default().with_seed(7),
            ..Default::default()
        };
        settings.save(&path).unwrap();
        let loaded = GameSettings::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_rejects_zero_depth() {
        let path = std::env::temp_dir().join(format!("morris-bad-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"ai": {"search_depth": 0}}"#).unwrap();
        let result = GameSettings::load(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_difficulty_from_str() {
        assert_eq!("HARD".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("brutal".parse::<Difficulty>().is_err());
    }
}
