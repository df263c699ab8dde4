//! Answer generation seam.
//!
//! The generator receives the assembled instruction string and returns the
//! answer text. Concrete LLM clients live in the application crate.

use async_trait::async_trait;

use crate::error::GenerateError;

/// Answer shown when generation fails or returns nothing.
pub const PLACEHOLDER_ANSWER: &str =
    "[LegalLens: answer generation is unavailable right now. The retrieved sources below are still accurate; please try again later.]";

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Returns the model identifier, for logging.
    fn model_name(&self) -> &str;

    async fn generate(&self, instruction: &str) -> Result<String, GenerateError>;
}
