//! Error types for the Novelist pipeline.
//!
//! Uses `thiserror` for structured error definitions that provide
//! clear context about what went wrong and in which stage.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Missing required configuration value
    #[error("Missing required config value: {0}")]
    MissingValue(String),

    /// Invalid configuration value
    #[error("Invalid config value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Config directory not found
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Error type for language model requests.
#[derive(Error, Debug)]
pub enum LlmError {
    /// HTTP request to API failed
    #[error("API request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// API returned an error response
    #[error("API error: {0}")]
    ApiError(String),

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// The model declined the request or returned nothing
    #[error("Model refused: {0}")]
    Refused(String),

    /// All retry attempts exhausted
    #[error("All retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

/// Error type for cover image generation.
#[derive(Error, Debug)]
pub enum ImageError {
    /// HTTP request to the image API failed
    #[error("Image request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Image API returned an error response
    #[error("Image API error: {0}")]
    ApiError(String),

    /// The response body was not an image
    #[error("Unexpected image response: {0}")]
    InvalidResponse(String),

    /// All retry attempts exhausted
    #[error("Image generation failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

/// Error returned by the strict response parsers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// An expected tag was absent or empty
    #[error("Missing <{0}> in model response")]
    MissingTag(String),

    /// A tag was present but its content could not be interpreted
    #[error("Invalid value for <{tag}>: {value}")]
    InvalidValue { tag: String, value: String },
}

/// Error type for outline generation.
#[derive(Error, Debug)]
pub enum OutlineError {
    /// A planning request failed
    #[error("Outline request failed: {0}")]
    Llm(#[from] LlmError),

    /// The chapter plan could not be parsed at all
    #[error("Chapter plan unusable: {0}")]
    Parse(#[from] ParseError),
}

/// Error type for writing output artifacts.
#[derive(Error, Debug)]
pub enum AssemblyError {
    /// Filesystem operation failed
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// EPUB packaging failed
    #[error("Failed to build EPUB: {0}")]
    Epub(String),

    /// Chapters don't line up with the outline
    #[error("Chapter sequence invalid: {0}")]
    ChapterSequence(String),
}

impl AssemblyError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AssemblyError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Unrecoverable pipeline failure.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration is incomplete or invalid
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The requested chapter count was zero
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Outline generation failed
    #[error("Outline generation failed: {0}")]
    Outline(#[from] OutlineError),

    /// A chapter could not be written
    #[error("Chapter {index} failed: {source}")]
    Chapter {
        index: u32,
        #[source]
        source: LlmError,
    },

    /// Writing output files failed
    #[error("Assembly failed: {0}")]
    Assembly(#[from] AssemblyError),
}

impl PipelineError {
    /// Returns the chapter index for chapter failures.
    pub fn chapter_index(&self) -> Option<u32> {
        match self {
            PipelineError::Chapter { index, .. } => Some(*index),
            _ => None,
        }
    }
}
