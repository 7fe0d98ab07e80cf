//! Cover art: a visual description from the language model, rendered by the
//! image model. Every failure here is reported and swallowed; a novel
//! without a cover is still a novel.

use crate::console::Console;
use crate::image::ImageGenerator;
use crate::llm::{LanguageModel, Prompt};
use crate::model::{CoverImage, Outline};
use crate::response::response_body;
use crate::style::WritingStyle;

const DESIGNER_SYSTEM_PROMPT: &str = "You are a world-class book cover designer. \
You translate a story into a single striking image that communicates its genre, tone and core themes, \
using deliberate color, lighting and composition while avoiding cliches.";

/// Longest description sent to the image API.
const MAX_DESCRIPTION_CHARS: usize = 1500;

pub struct CoverArtist<'a> {
    model: &'a dyn LanguageModel,
    images: &'a dyn ImageGenerator,
    console: &'a Console,
}

impl<'a> CoverArtist<'a> {
    pub fn new(
        model: &'a dyn LanguageModel,
        images: &'a dyn ImageGenerator,
        console: &'a Console,
    ) -> Self {
        Self {
            model,
            images,
            console,
        }
    }

    /// Produces a cover, or `None` if either request fails.
    pub async fn create(&self, outline: &Outline, style: WritingStyle) -> Option<CoverImage> {
        self.console.step("Designing cover...");
        let description = self.describe(outline, style).await;

        match self.images.generate(&description).await {
            Ok(image) => {
                self.console
                    .success(&format!("Cover generated ({} bytes)", image.data.len()));
                Some(image)
            }
            Err(e) => {
                self.console
                    .warning(&format!("Cover generation failed, continuing without cover: {}", e));
                None
            }
        }
    }

    /// Asks the model for a visual description, falling back to a template.
    async fn describe(&self, outline: &Outline, style: WritingStyle) -> String {
        let reply = self
            .model
            .complete(&description_prompt(&outline.premise))
            .await
            .map_err(|e| e.to_string())
            .and_then(|raw| response_body(&raw).map_err(|e| e.to_string()));

        match reply {
            Ok(description) => truncate_chars(&description, MAX_DESCRIPTION_CHARS),
            Err(reason) => {
                self.console
                    .warning(&format!("Cover description unavailable ({}), using template", reason));
                template_description(&outline.title, style)
            }
        }
    }
}

pub fn description_prompt(premise: &str) -> Prompt {
    let user = format!(
        "Describe a book cover for the story outlined below.\n\n\
         Story outline:\n{}\n\n\
         Your description should:\n\
         1. Describe a SINGLE powerful focal image or scene\n\
         2. Specify a cohesive palette of 3-4 colors\n\
         3. Define the lighting and atmosphere\n\
         4. Suggest composition and visual hierarchy\n\
         5. Convey the emotional tone of the story\n\
         6. Cover visual elements only, with no text or typography\n\n\
         Output your response concisely in the following format:\n\
         <response>\n\
         the cover description in English, without tags or extra text\n\
         </response>",
        premise
    );
    Prompt::new("Cover description", DESIGNER_SYSTEM_PROMPT, user)
}

/// Fixed description built from title and style alone.
pub fn template_description(title: &str, style: WritingStyle) -> String {
    format!(
        "Book cover illustration for a {} novel titled \"{}\". {} \
         A single striking focal scene, cinematic lighting, rich cohesive colors, no text.",
        style.name(),
        title,
        style.description()
    )
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
