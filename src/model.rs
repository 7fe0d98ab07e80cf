//! Values passed between pipeline stages.
//!
//! Each stage produces a new value that the next stage only reads.

use crate::style::WritingStyle;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Everything needed to generate one novel.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Free-text story idea.
    pub prompt: String,
    /// Forced style; inferred from the prompt when absent.
    pub style: Option<WritingStyle>,
    /// Forced chapter count; inferred when absent.
    pub chapters: Option<u32>,
    /// Directory the artifacts are written to.
    pub output_dir: PathBuf,
    pub author: String,
}

impl GenerationRequest {
    pub const DEFAULT_OUTPUT_DIR: &'static str = "output";
    pub const DEFAULT_AUTHOR: &'static str = "AI";

    /// A request with default output directory and author.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            style: None,
            chapters: None,
            output_dir: PathBuf::from(Self::DEFAULT_OUTPUT_DIR),
            author: Self::DEFAULT_AUTHOR.to_string(),
        }
    }

    pub fn with_style(mut self, style: WritingStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn with_chapters(mut self, chapters: u32) -> Self {
        self.chapters = Some(chapters);
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }
}

/// Plan for a single chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterPlan {
    /// 1-based position in the book.
    pub index: u32,
    pub title: String,
    /// Two or three sentence overview.
    pub summary: String,
}

/// Title, premise and per-chapter plan for a novel.
#[derive(Debug, Clone)]
pub struct Outline {
    pub title: String,
    /// Refined free-text story outline used as global context.
    pub premise: String,
    pub chapters: Vec<ChapterPlan>,
}

/// A written chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub index: u32,
    pub title: Option<String>,
    pub body: String,
}

impl Chapter {
    /// Heading used in both output formats.
    pub fn heading(&self) -> String {
        match &self.title {
            Some(title) => format!("Chapter {}: {}", self.index, title),
            None => format!("Chapter {}", self.index),
        }
    }
}

/// Encoding of a cover image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }

    /// Name the image API expects for `output_format`.
    pub fn api_name(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
        }
    }

    /// Parses the `output_format` config value.
    pub fn from_config(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            _ => None,
        }
    }
}

/// Generated cover art.
#[derive(Clone)]
pub struct CoverImage {
    pub data: Vec<u8>,
    pub format: ImageFormat,
}

impl fmt::Debug for CoverImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverImage")
            .field("bytes", &self.data.len())
            .field("format", &self.format)
            .finish()
    }
}

/// Pipeline position, used to report where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    StyleResolved,
    OutlineReady,
    ChaptersComplete,
    AssetsAssembled,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::StyleResolved => "style resolved",
            Stage::OutlineReady => "outline ready",
            Stage::ChaptersComplete => "chapters complete",
            Stage::AssetsAssembled => "assets assembled",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failure,
}

/// Paths of the written artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutputFiles {
    pub markdown: Option<PathBuf>,
    pub epub: Option<PathBuf>,
    pub cover: Option<PathBuf>,
}

impl OutputFiles {
    /// All written paths in a stable order.
    pub fn paths(&self) -> Vec<&PathBuf> {
        [&self.epub, &self.markdown, &self.cover]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Details of a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureDetail {
    /// Last stage that completed before the failure.
    pub stage: Stage,
    /// Chapter being written when the failure happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter: Option<u32>,
    pub message: String,
}

/// Outcome handed back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<WritingStyle>,
    pub output_dir: PathBuf,
    pub files: OutputFiles,
    pub cover_generated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureDetail>,
}

impl GenerationResult {
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}
