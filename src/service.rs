//! Request-level operations over a running [`BowlingHandle`].
//!
//! This is the surface an HTTP layer would sit on: start a game by player
//! name, add rolls, read the score and ask for a summary. Both collaborators
//! are injected; nothing here reaches for global state.

use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    core::store::StoreError,
    game::{GameRecord, ScoreCard, StartedGame},
    runtime::handle::{BowlingHandle, RuntimeError},
    summary::{GenerationError, SummaryConfig, SummaryGenerator, SummaryRequest},
    types::{GameId, Pins},
};

/// Failures of a service call, grouped by who is at fault.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Store or runtime failure.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    /// The frame breakdown could not be rendered for the generator.
    #[error("frame rendering failed: {0}")]
    Render(#[from] serde_json::Error),
    /// The summary generator failed.
    #[error(transparent)]
    UpstreamGenerationFailure(#[from] GenerationError),
}

impl ServiceError {
    /// True when the failure is about the game the caller referenced.
    pub fn is_game_not_found(&self) -> bool {
        matches!(
            self,
            ServiceError::Runtime(RuntimeError::Store(StoreError::GameNotFound(_)))
        )
    }

    /// HTTP status an outer layer should answer with.
    ///
    /// Store rejections (unknown game, failed validation) are client errors;
    /// everything else, generator failures included, is a server error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::Runtime(RuntimeError::Store(_)) => 400,
            ServiceError::Runtime(_) | ServiceError::Render(_) => 500,
            ServiceError::UpstreamGenerationFailure(_) => 500,
        }
    }
}

/// Bowling operations backed by a runtime handle and a summary generator.
pub struct BowlingService<G> {
    handle: BowlingHandle,
    generator: G,
    summary: SummaryConfig,
}

impl<G: SummaryGenerator> BowlingService<G> {
    /// Builds a service with the default [`SummaryConfig`].
    pub fn new(handle: BowlingHandle, generator: G) -> Self {
        Self::with_summary_config(handle, generator, SummaryConfig::default())
    }

    /// Builds a service with explicit model parameters.
    pub fn with_summary_config(
        handle: BowlingHandle,
        generator: G,
        summary: SummaryConfig,
    ) -> Self {
        Self {
            handle,
            generator,
            summary,
        }
    }

    /// Underlying runtime handle.
    pub fn handle(&self) -> &BowlingHandle {
        &self.handle
    }

    /// Starts a new game, creating the player if the name is unknown.
    pub async fn start_game(&self, name: &str) -> Result<StartedGame, ServiceError> {
        Ok(self.handle.start_game(name).await?)
    }

    /// Records a roll and returns the updated game.
    pub async fn add_roll(&self, game_id: GameId, pins: Pins) -> Result<GameRecord, ServiceError> {
        Ok(self.handle.roll(game_id, pins).await?)
    }

    /// Current running total.
    pub async fn score(&self, game_id: GameId) -> Result<u32, ServiceError> {
        Ok(self.handle.score(game_id).await?)
    }

    /// Current score card.
    pub async fn score_card(&self, game_id: GameId) -> Result<ScoreCard, ServiceError> {
        Ok(self.handle.score_card(game_id).await?)
    }

    /// Natural-language summary of the game so far.
    ///
    /// Lookup failures are reported before the generator is called.
    pub async fn summary(&self, game_id: GameId) -> Result<String, ServiceError> {
        let card = self.handle.score_card(game_id).await?;
        let request = SummaryRequest::from_frames(&self.summary, &card.frames)?;
        debug!(game_id, frames = card.frames.len(), total = card.total, "requesting summary");

        match self.generator.generate(&request).await {
            Ok(text) => Ok(text.trim().to_string()),
            Err(err) => {
                warn!(game_id, error = %err, "summary generation failed");
                Err(err.into())
            }
        }
    }
}
