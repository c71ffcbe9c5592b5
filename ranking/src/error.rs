use graph::WeightError;
use socialrank_core::config::ConfigValidationError;
use socialrank_core::error::{ErrorCode, SocialRankError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RankingError {
    #[error("invalid ranking config: {0}")]
    InvalidConfig(#[from] ConfigValidationError),
    #[error("edge weighting failed: {0}")]
    Weight(#[from] WeightError),
    #[error("ranking cancelled after {generations} generations")]
    Cancelled { generations: usize },
}

impl SocialRankError for RankingError {
    fn error_code(&self) -> ErrorCode {
        match self {
            RankingError::InvalidConfig(_) => ErrorCode::InvalidArgument,
            RankingError::Weight(inner) => inner.error_code(),
            RankingError::Cancelled { .. } => ErrorCode::Cancelled,
        }
    }
}
