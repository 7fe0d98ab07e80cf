//! Novelist - generates complete novels from a short story prompt.
//!
//! This library provides functionality for:
//! - Choosing a writing style and chapter count for a prompt
//! - Planning a premise, title and chapter outline
//! - Writing chapters in order with rolling context
//! - Designing cover art and packaging the book as Markdown and EPUB

pub mod analyzer;
pub mod assembler;
pub mod config;
pub mod console;
pub mod cover;
pub mod error;
pub mod image;
pub mod llm;
pub mod model;
pub mod outline;
pub mod pipeline;
pub mod response;
pub mod style;
pub mod writer;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::Config;
pub use console::Console;
pub use error::{AssemblyError, ConfigError, ImageError, LlmError, OutlineError, PipelineError};
pub use image::{ImageGenerator, StabilityClient};
pub use llm::{LanguageModel, OpenAiClient, Prompt};
pub use model::{GenerationRequest, GenerationResult, Stage, Status};
pub use pipeline::{Novelist, generate_novel};
pub use style::WritingStyle;
