use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use thiserror::Error;

use crate::error::{ErrorCode, SocialRankError};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigValidationError {
    #[error("d_max must be finite and non-negative, got {0}")]
    InvalidDelta(f64),
    #[error("{category} budget must be finite and non-negative, got {value}")]
    InvalidBudget { category: &'static str, value: f64 },
    #[error("user budget sums to {0}, which exceeds 1.0")]
    BudgetOverflow(f64),
}

impl SocialRankError for ConfigValidationError {
    fn error_code(&self) -> ErrorCode {
        ErrorCode::InvalidArgument
    }
}

/// Share of a user's outgoing mass assigned to each neighbor category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserBudget {
    pub hashtag: f64,
    pub post: f64,
    pub user: f64,
}

impl Default for UserBudget {
    fn default() -> Self {
        Self {
            hashtag: 0.3,
            post: 0.4,
            user: 0.3,
        }
    }
}

impl UserBudget {
    pub fn total(&self) -> f64 {
        self.hashtag + self.post + self.user
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        for (category, value) in [
            ("hashtag", self.hashtag),
            ("post", self.post),
            ("user", self.user),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigValidationError::InvalidBudget { category, value });
            }
        }
        let total = self.total();
        if total > 1.0 + 1e-9 {
            return Err(ConfigValidationError::BudgetOverflow(total));
        }
        Ok(())
    }
}

/// What happens to the budget of a neighbor category a user has no edges in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnallocatedBudget {
    /// The budget is dropped; the user's outgoing weights sum to less than 1.0.
    #[default]
    Leave,
    /// The budget is shared among the non-empty categories in proportion to
    /// their own budgets.
    Redistribute,
}

/// What a run returns when it is cancelled between generations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelPolicy {
    #[default]
    ReturnPartial,
    Discard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Largest acceptable label delta between two generations.
    pub d_max: f64,
    /// Hard cap on the number of generations.
    pub i_max: usize,
    /// Keep only the N heaviest posts per user.
    pub top_n: Option<usize>,
    pub user_budget: UserBudget,
    pub unallocated: UnallocatedBudget,
    pub cancel_policy: CancelPolicy,
    /// Wall-clock limit, checked between generations.
    pub timeout_ms: Option<u64>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            d_max: 0.001,
            i_max: 25,
            top_n: None,
            user_budget: UserBudget::default(),
            unallocated: UnallocatedBudget::default(),
            cancel_policy: CancelPolicy::default(),
            timeout_ms: None,
        }
    }
}

impl RankingConfig {
    pub fn new(d_max: f64, i_max: usize) -> Self {
        Self {
            d_max,
            i_max,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !self.d_max.is_finite() || self.d_max < 0.0 {
            return Err(ConfigValidationError::InvalidDelta(self.d_max));
        }
        self.user_budget.validate()
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct InputConfig {
    pub snapshot_path: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// Without a WAL path results are kept in memory only.
    pub wal_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunnerMode {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RunnerConfig {
    pub mode: RunnerMode,
    pub queue_capacity: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            mode: RunnerMode::Local,
            queue_capacity: 16,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub ranking: RankingConfig,
    pub input: InputConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("config"))
    }

    /// Layers `default`, then `{RUN_MODE}`, then `SOCIALRANK__*` variables.
    pub fn load_from(dir: &Path) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .add_source(File::from(dir.join("default")))
            .add_source(File::from(dir.join(&run_mode)).required(false))
            .add_source(
                Environment::with_prefix("SOCIALRANK")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config
            .ranking
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(config)
    }
}
