//! Scripted stand-ins for the model and image clients.

use crate::error::{ImageError, LlmError};
use crate::image::ImageGenerator;
use crate::llm::{LanguageModel, Prompt};
use crate::model::{CoverImage, ImageFormat};
use async_trait::async_trait;
use std::io::{Cursor, Read};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

enum Reply {
    Text(String),
    Fail,
    Refuse,
}

struct Rule {
    needle: String,
    reply: Reply,
    /// Rule is spent after its first match.
    once: bool,
    used: AtomicBool,
}

impl Rule {
    fn new(needle: &str, reply: Reply, once: bool) -> Self {
        Self {
            needle: needle.to_string(),
            reply,
            once,
            used: AtomicBool::new(false),
        }
    }

    fn matches(&self, prompt: &Prompt) -> bool {
        prompt.user.contains(&self.needle) && !(self.once && self.used.swap(true, Ordering::SeqCst))
    }
}

/// Replies by matching substrings of the user prompt; first rule wins.
#[derive(Default)]
pub struct ScriptedModel {
    rules: Vec<Rule>,
    calls: Mutex<Vec<Prompt>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, needle: &str, reply: impl Into<String>) -> Self {
        self.rules.push(Rule::new(needle, Reply::Text(reply.into()), false));
        self
    }

    pub fn fail_on(mut self, needle: &str) -> Self {
        self.rules.push(Rule::new(needle, Reply::Fail, false));
        self
    }

    /// Declines the first matching request only.
    pub fn refuse_once(mut self, needle: &str) -> Self {
        self.rules.push(Rule::new(needle, Reply::Refuse, true));
        self
    }

    /// A full script for a novel with `chapters` chapters.
    ///
    /// Rules added before calling this take precedence.
    pub fn novel(self, chapters: u32) -> Self {
        let plan: String = (1..=chapters)
            .map(|i| {
                format!(
                    "<chapter {i}><title>Part {i}</title><overview>Things happen in part {i}.</overview></chapter {i}>\n"
                )
            })
            .collect();

        let mut model = self
            .on("Analyze the story prompt", "<response><style>scifi</style><chapters>3</chapters></response>")
            .on("story premises", "<response>1. A robot paints.\n2. A robot sings.</response>")
            .on("Select the most engaging premise", "<response>A robot paints.</response>")
            .on("Refine this story premise", "<response>A lonely robot learns to paint the sea.</response>")
            .on("Create a title", "<response>The Painted Sea</response>")
            .on("Plan the chapters", format!("<response><chapters>\n{}</chapters></response>", plan))
            .on("Describe a book cover", "<response>A robot at an easel facing a teal sea.</response>");

        for i in 1..=chapters {
            model = model.on(&format!("Chapter number: {}\n", i), chapter_reply(i));
        }
        model
    }

    pub fn calls(&self) -> Vec<Prompt> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }
}

/// Deterministic chapter prose comfortably above the default minimum length.
pub fn chapter_reply(index: u32) -> String {
    let paragraph = format!("The robot dipped its brush again in chapter {}.", index);
    let body = vec![paragraph; 30].join("\n");
    format!("<response>\n{}\n</response>", body)
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(prompt.clone());
        }

        match self.rules.iter().find(|r| r.matches(prompt)).map(|r| &r.reply) {
            Some(Reply::Text(text)) => Ok(text.clone()),
            Some(Reply::Fail) => Err(LlmError::ApiError("HTTP 503: scripted failure".to_string())),
            Some(Reply::Refuse) => Err(LlmError::Refused("I'm sorry, I can't write that.".to_string())),
            None => Err(LlmError::ApiError(format!(
                "no scripted reply for '{}'",
                prompt.label
            ))),
        }
    }
}

/// Image client that returns a tiny JPEG or always fails.
pub struct FakeImages {
    fail: bool,
    calls: AtomicUsize,
}

impl FakeImages {
    pub fn working() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate(&self, _prompt: &str) -> Result<CoverImage, ImageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ImageError::ApiError("HTTP 402: out of credits".to_string()));
        }
        Ok(CoverImage {
            data: vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10],
            format: ImageFormat::Jpeg,
        })
    }
}

/// Entry names of an EPUB archive, in archive order.
pub fn epub_entries(bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

/// Contents of the first entry whose name ends with `suffix`.
pub fn epub_entry(bytes: &[u8], suffix: &str) -> Option<Vec<u8>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        if file.name().ends_with(suffix) {
            let mut data = Vec::new();
            file.read_to_end(&mut data).unwrap();
            return Some(data);
        }
    }
    None
}
