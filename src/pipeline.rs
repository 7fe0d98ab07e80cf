//! End-to-end orchestration: prompt in, book files out.
//!
//! Stages run strictly in order. The last completed stage is tracked so a
//! failure can be reported against it, and nothing is written to the output
//! directory until every chapter exists.

use crate::analyzer;
use crate::assembler::{self, Book};
use crate::config::{Config, GenerationConfig};
use crate::console::Console;
use crate::cover::CoverArtist;
use crate::error::PipelineError;
use crate::image::{ImageGenerator, StabilityClient};
use crate::llm::{LanguageModel, OpenAiClient};
use crate::model::{
    FailureDetail, GenerationRequest, GenerationResult, OutputFiles, Stage, Status,
};
use crate::outline::OutlineGenerator;
use crate::style::WritingStyle;
use crate::writer::ChapterWriter;
use std::sync::Arc;

/// What is known about a run so far.
struct Progress {
    stage: Stage,
    title: Option<String>,
    style: Option<WritingStyle>,
}

impl Progress {
    fn new() -> Self {
        Self {
            stage: Stage::Init,
            title: None,
            style: None,
        }
    }
}

/// Runs the full generation pipeline against a model and an optional image
/// generator.
pub struct Novelist {
    model: Arc<dyn LanguageModel>,
    images: Option<Arc<dyn ImageGenerator>>,
    generation: GenerationConfig,
    console: Console,
}

impl Novelist {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        images: Option<Arc<dyn ImageGenerator>>,
        generation: GenerationConfig,
        console: Console,
    ) -> Self {
        Self {
            model,
            images,
            generation,
            console,
        }
    }

    /// Validates `config` and builds the HTTP clients it describes.
    ///
    /// Missing credentials fail here, before any request is sent.
    pub fn from_config(config: &Config, console: Console) -> Result<Self, PipelineError> {
        config.validate()?;

        let model = OpenAiClient::new(config.llm.clone(), console.clone())
            .map_err(|e| PipelineError::InvalidRequest(format!("language model client: {}", e)))?;

        let images: Option<Arc<dyn ImageGenerator>> = if config.cover.enabled {
            match StabilityClient::new(config.image.clone(), console.clone()) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    console.warning(&format!("Cover generation disabled: {}", e));
                    None
                }
            }
        } else {
            None
        };

        Ok(Self::new(
            Arc::new(model),
            images,
            config.generation.clone(),
            console,
        ))
    }

    /// Generates a novel. Never panics or returns early; failures are
    /// reported in the result.
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        let mut progress = Progress::new();

        match self.run(request, &mut progress).await {
            Ok(files) => {
                self.console.section("Novel complete");
                for path in files.paths() {
                    self.console.info(&format!("  {}", path.display()));
                }
                GenerationResult {
                    status: Status::Success,
                    title: progress.title,
                    style: progress.style,
                    output_dir: request.output_dir.clone(),
                    cover_generated: files.cover.is_some(),
                    files,
                    error: None,
                }
            }
            Err(e) => {
                self.console
                    .error(&format!("Generation failed after stage '{}': {}", progress.stage, e));
                GenerationResult {
                    status: Status::Failure,
                    title: progress.title,
                    style: progress.style,
                    output_dir: request.output_dir.clone(),
                    files: OutputFiles::default(),
                    cover_generated: false,
                    error: Some(FailureDetail {
                        stage: progress.stage,
                        chapter: e.chapter_index(),
                        message: e.to_string(),
                    }),
                }
            }
        }
    }

    async fn run(
        &self,
        request: &GenerationRequest,
        progress: &mut Progress,
    ) -> Result<OutputFiles, PipelineError> {
        if request.prompt.trim().is_empty() {
            return Err(PipelineError::InvalidRequest("prompt is empty".to_string()));
        }
        if request.chapters == Some(0) {
            return Err(PipelineError::InvalidRequest(
                "chapter count must be at least 1".to_string(),
            ));
        }

        let model = self.model.as_ref();

        let resolution = analyzer::resolve(
            model,
            &request.prompt,
            request.style,
            request.chapters,
            &self.console,
        )
        .await;
        self.console.success(&format!(
            "Style: {} ({:?}), chapters: {} ({:?})",
            resolution.style.name(),
            resolution.style_source,
            resolution.chapters,
            resolution.chapters_source
        ));
        progress.style = Some(resolution.style);
        progress.stage = Stage::StyleResolved;

        let outline = OutlineGenerator::new(
            model,
            resolution.style,
            self.generation.candidate_premises,
            &self.console,
        )
        .generate(&request.prompt, resolution.chapters)
        .await?;
        progress.title = Some(outline.title.clone());
        progress.stage = Stage::OutlineReady;

        let chapters = ChapterWriter::new(model, resolution.style, &self.generation, &self.console)
            .write_all(&outline)
            .await?;
        progress.stage = Stage::ChaptersComplete;

        let cover = match &self.images {
            Some(images) => {
                CoverArtist::new(model, images.as_ref(), &self.console)
                    .create(&outline, resolution.style)
                    .await
            }
            None => None,
        };

        let book = Book {
            title: &outline.title,
            author: &request.author,
            description: Some(outline.premise.as_str()),
            chapters: &chapters,
            cover: cover.as_ref(),
        };
        let files = assembler::assemble(
            &book,
            &request.output_dir,
            outline.chapters.len(),
            &self.console,
        )?;
        progress.stage = Stage::AssetsAssembled;
        self.console.success(&format!("Wrote {} file(s)", files.paths().len()));

        progress.stage = Stage::Done;
        Ok(files)
    }
}

/// Builds clients from `config` and runs one request.
pub async fn generate_novel(
    config: &Config,
    request: &GenerationRequest,
    console: Console,
) -> GenerationResult {
    match Novelist::from_config(config, console.clone()) {
        Ok(novelist) => novelist.generate(request).await,
        Err(e) => {
            console.error(&e.to_string());
            GenerationResult {
                status: Status::Failure,
                title: None,
                style: request.style,
                output_dir: request.output_dir.clone(),
                files: OutputFiles::default(),
                cover_generated: false,
                error: Some(FailureDetail {
                    stage: Stage::Init,
                    chapter: None,
                    message: e.to_string(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::testing::{FakeImages, ScriptedModel, epub_entries};
    use std::path::Path;

    fn novelist(model: Arc<ScriptedModel>, images: Option<Arc<FakeImages>>) -> Novelist {
        Novelist::new(
            model,
            images.map(|i| i as Arc<dyn ImageGenerator>),
            GenerationConfig::default(),
            Console::quiet(),
        )
    }

    fn request(dir: &Path) -> GenerationRequest {
        GenerationRequest::new("A robot who wants to paint the ocean")
            .with_style(WritingStyle::Scifi)
            .with_chapters(3)
            .with_output_dir(dir)
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_full_run_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new().novel(3));
        let images = Arc::new(FakeImages::working());

        let result = novelist(model.clone(), Some(images.clone()))
            .generate(&request(dir.path()))
            .await;

        assert!(result.is_success(), "{:?}", result.error);
        assert_eq!(result.title.as_deref(), Some("The Painted Sea"));
        assert_eq!(result.style, Some(WritingStyle::Scifi));
        assert!(result.cover_generated);
        assert_eq!(
            file_names(dir.path()),
            ["The Painted Sea.epub", "The Painted Sea.jpg", "The Painted Sea.md"]
        );

        // both overrides given, so the analyzer is never consulted
        assert!(
            !model
                .calls()
                .iter()
                .any(|p| p.user.contains("Analyze the story prompt"))
        );
        assert_eq!(images.call_count(), 1);

        let markdown = std::fs::read_to_string(dir.path().join("The Painted Sea.md")).unwrap();
        assert!(markdown.starts_with("# The Painted Sea\n\n*by AI*\n\n## Chapter 1: Part 1\n\n"));
        assert!(markdown.contains("## Chapter 3: Part 3"));
    }

    #[tokio::test]
    async fn test_analyzer_fills_in_style_and_chapters() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(
            ScriptedModel::new()
                .on(
                    "Analyze the story prompt",
                    "<response><style>mystery</style><chapters>5</chapters></response>",
                )
                .novel(5),
        );
        let request = GenerationRequest::new("Who painted over the lighthouse?")
            .with_output_dir(dir.path());

        let result = novelist(model, None).generate(&request).await;

        assert!(result.is_success(), "{:?}", result.error);
        assert_eq!(result.style, Some(WritingStyle::Mystery));
        let markdown = std::fs::read_to_string(dir.path().join("The Painted Sea.md")).unwrap();
        assert_eq!(markdown.matches("\n## Chapter ").count(), 5);
    }

    #[tokio::test]
    async fn test_cover_failure_still_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new().novel(3));
        let images = Arc::new(FakeImages::failing());

        let result = novelist(model, Some(images))
            .generate(&request(dir.path()))
            .await;

        assert!(result.is_success());
        assert!(!result.cover_generated);
        assert!(result.files.cover.is_none());
        assert_eq!(
            file_names(dir.path()),
            ["The Painted Sea.epub", "The Painted Sea.md"]
        );

        let epub = std::fs::read(dir.path().join("The Painted Sea.epub")).unwrap();
        let entries = epub_entries(&epub);
        assert_eq!(entries.iter().filter(|e| e.contains("chapter_")).count(), 3);
        assert!(!entries.iter().any(|e| e.ends_with(".jpg")));
    }

    #[tokio::test]
    async fn test_no_image_client_skips_cover() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new().novel(3));

        let result = novelist(model.clone(), None)
            .generate(&request(dir.path()))
            .await;

        assert!(result.is_success());
        assert!(
            !model
                .calls()
                .iter()
                .any(|p| p.user.contains("Describe a book cover"))
        );
    }

    #[tokio::test]
    async fn test_chapter_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("books");
        let model = Arc::new(ScriptedModel::new().fail_on("Chapter number: 2\n").novel(3));
        let images = Arc::new(FakeImages::working());

        let result = novelist(model, Some(images.clone()))
            .generate(&request(&out))
            .await;

        assert_eq!(result.status, Status::Failure);
        let error = result.error.unwrap();
        assert_eq!(error.stage, Stage::OutlineReady);
        assert_eq!(error.chapter, Some(2));
        assert!(error.message.contains("Chapter 2"));
        assert_eq!(result.title.as_deref(), Some("The Painted Sea"));
        assert!(file_names(&out).is_empty());
        assert_eq!(images.call_count(), 0);
    }

    #[tokio::test]
    async fn test_books_share_an_output_directory() {
        let dir = tempfile::tempdir().unwrap();

        let first = Arc::new(ScriptedModel::new().novel(3));
        let images = Arc::new(FakeImages::working());
        let result = novelist(first, Some(images)).generate(&request(dir.path())).await;
        assert!(result.is_success());

        let second = Arc::new(
            ScriptedModel::new()
                .on("Create a title", "<response>The Quiet Harbor</response>")
                .novel(3),
        );
        let result = novelist(second, None).generate(&request(dir.path())).await;
        assert!(result.is_success());
        assert!(result.files.cover.is_none());

        assert_eq!(
            file_names(dir.path()),
            [
                "The Painted Sea.epub",
                "The Painted Sea.jpg",
                "The Painted Sea.md",
                "The Quiet Harbor.epub",
                "The Quiet Harbor.md",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_any_request() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("books");
        let config = Config {
            llm: LlmConfig {
                // nothing listens here; reaching it would surface as a network error
                base_url: "http://127.0.0.1:9".to_string(),
                retries: 1,
                delay_between_requests_sec: 0.0,
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(matches!(
            Novelist::from_config(&config, Console::quiet()),
            Err(PipelineError::Config(_))
        ));

        let result = generate_novel(&config, &request(&out), Console::quiet()).await;
        assert_eq!(result.status, Status::Failure);
        let error = result.error.unwrap();
        assert_eq!(error.stage, Stage::Init);
        assert!(error.message.contains("llm.key"), "{}", error.message);
        assert!(result.title.is_none());
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_zero_chapters_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new().novel(3));
        let request = request(dir.path()).with_chapters(0);

        let result = novelist(model.clone(), None).generate(&request).await;

        assert_eq!(result.status, Status::Failure);
        assert_eq!(result.error.map(|e| e.stage), Some(Stage::Init));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_markdown_is_deterministic() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();

        for dir in [first.path(), second.path()] {
            let model = Arc::new(ScriptedModel::new().novel(3));
            let result = novelist(model, None).generate(&request(dir)).await;
            assert!(result.is_success());
        }

        let a = std::fs::read(first.path().join("The Painted Sea.md")).unwrap();
        let b = std::fs::read(second.path().join("The Painted Sea.md")).unwrap();
        assert_eq!(a, b);
    }
}
