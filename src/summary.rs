//! Prompt building for natural-language game summaries.
//!
//! The crate does not talk to a language model itself. It renders the frame
//! breakdown into a [`SummaryRequest`] and hands it to whatever
//! [`SummaryGenerator`] the caller supplies.

use std::future::Future;

use serde::Serialize;
use thiserror::Error;

use crate::game::Frame;

/// Instruction given to the model ahead of the frame text.
pub const SYSTEM_PROMPT: &str = "You are a bowling game assistant. Your task is to analyze a \
single-player bowling game's roll record and generate a concise, informative summary. Include \
the player's total score, key achievements (e.g., strikes, spares, turkeys), and notable moments \
(e.g., consecutive strikes or a perfect game). Maintain a clear and engaging tone suitable for a \
general audience. If applicable, mention any unusual patterns or significant turning points in \
the game. Answer in 2 or 3 sentences.";

/// Model parameters for summary requests.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryConfig {
    /// Chat model name.
    pub model: String,
    /// Completion length cap.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 200,
            temperature: 0.7,
        }
    }
}

/// Fully rendered request for a [`SummaryGenerator`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRequest {
    /// Chat model name.
    pub model: String,
    /// System message.
    pub system_prompt: String,
    /// User message: the rendered frames.
    pub user_message: String,
    /// Completion length cap.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl SummaryRequest {
    /// Renders `frames` into a request using `config`.
    pub fn from_frames(
        config: &SummaryConfig,
        frames: &[Frame],
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            model: config.model.clone(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_message: frames_text(frames)?,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

/// One JSON object per frame, space separated.
pub fn frames_text(frames: &[Frame]) -> Result<String, serde_json::Error> {
    let parts = frames
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join(" "))
}

/// Failure reported by a [`SummaryGenerator`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("summary generation failed: {message}")]
pub struct GenerationError {
    /// Upstream error text.
    pub message: String,
}

impl GenerationError {
    /// Wraps an upstream error message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Text generator that turns a rendered game into prose.
pub trait SummaryGenerator: Send + Sync {
    /// Produces the summary text for `request`.
    fn generate(
        &self,
        request: &SummaryRequest,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send;
}
