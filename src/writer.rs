//! Chapter writing.
//!
//! Chapters are written strictly in order. Each request carries the premise,
//! a rolling summary of every earlier chapter's plan, and the tail of the
//! previous chapter's prose so the model can continue seamlessly.

use crate::config::GenerationConfig;
use crate::console::Console;
use crate::error::{LlmError, PipelineError};
use crate::llm::{LanguageModel, Prompt};
use crate::model::{Chapter, ChapterPlan, Outline};
use crate::response::response_body;
use crate::style::WritingStyle;

/// Where a chapter sits in the book; selects the prompt's goals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Opening,
    Middle,
    Final,
}

impl Position {
    pub fn of(index: u32, total: u32) -> Self {
        if index >= total {
            Position::Final
        } else if index == 1 {
            Position::Opening
        } else {
            Position::Middle
        }
    }

    fn goals(self) -> &'static str {
        match self {
            Position::Opening => {
                "This opening chapter should:\n\
                 1. Set up the story world and introduce key characters\n\
                 2. Establish the tone and atmosphere\n\
                 3. Hook the reader's interest\n\
                 4. Begin building the main conflict or tension"
            }
            Position::Middle => {
                "This chapter should:\n\
                 1. Stay consistent with previous events and character development\n\
                 2. Advance the plot naturally\n\
                 3. Keep the established tone and style\n\
                 4. Build on the story's momentum"
            }
            Position::Final => {
                "This final chapter should:\n\
                 1. Resolve the main conflicts and storylines\n\
                 2. Give satisfying closure to the character arcs\n\
                 3. Stay consistent with previous events\n\
                 4. End memorably, in keeping with the story's tone"
            }
        }
    }
}

/// Writes every chapter of an outline.
pub struct ChapterWriter<'a> {
    model: &'a dyn LanguageModel,
    style: WritingStyle,
    config: &'a GenerationConfig,
    console: &'a Console,
}

impl<'a> ChapterWriter<'a> {
    pub fn new(
        model: &'a dyn LanguageModel,
        style: WritingStyle,
        config: &'a GenerationConfig,
        console: &'a Console,
    ) -> Self {
        Self {
            model,
            style,
            config,
            console,
        }
    }

    /// Writes chapters in outline order, stopping at the first failure.
    pub async fn write_all(&self, outline: &Outline) -> Result<Vec<Chapter>, PipelineError> {
        let total = outline.chapters.len() as u32;
        let mut chapters: Vec<Chapter> = Vec::with_capacity(outline.chapters.len());

        for plan in &outline.chapters {
            self.console.step(&format!(
                "Writing chapter {}/{}: {}",
                plan.index, total, plan.title
            ));

            let chapter = self
                .write_chapter(outline, plan, chapters.last())
                .await
                .map_err(|source| PipelineError::Chapter {
                    index: plan.index,
                    source,
                })?;

            self.console.success(&format!(
                "Chapter {} written ({} chars)",
                chapter.index,
                chapter.body.chars().count()
            ));
            chapters.push(chapter);
        }

        Ok(chapters)
    }

    /// Writes one chapter, re-requesting while it is shorter than the minimum.
    ///
    /// Declined and empty replies count as failed attempts. If every attempt
    /// comes back short, the longest reply is used.
    pub async fn write_chapter(
        &self,
        outline: &Outline,
        plan: &ChapterPlan,
        previous: Option<&Chapter>,
    ) -> Result<Chapter, LlmError> {
        let prompt = self.chapter_prompt(outline, plan, previous);
        let attempts = self.config.chapter_attempts.max(1);
        let mut best: Option<String> = None;

        for attempt in 1..=attempts {
            let raw = match self.model.complete(&prompt).await {
                Ok(raw) => raw,
                Err(LlmError::Refused(reason)) => {
                    self.console.warning(&format!(
                        "Chapter {} declined: {} (attempt {}/{})",
                        plan.index, reason, attempt, attempts
                    ));
                    continue;
                }
                Err(e) => return Err(e),
            };

            let body = match response_body(&raw) {
                Ok(body) => body,
                Err(e) => {
                    self.console.warning(&format!(
                        "Chapter {}: {} (attempt {}/{})",
                        plan.index, e, attempt, attempts
                    ));
                    continue;
                }
            };

            let length = body.chars().count();
            if length >= self.config.min_chapter_chars {
                return Ok(self.chapter(plan, body));
            }

            self.console.warning(&format!(
                "Chapter {} too short ({} < {}) (attempt {}/{})",
                plan.index, length, self.config.min_chapter_chars, attempt, attempts
            ));
            if best.as_ref().is_none_or(|b| b.chars().count() < length) {
                best = Some(body);
            }
        }

        best.map(|body| self.chapter(plan, body))
            .ok_or_else(|| LlmError::Refused(format!("no chapter text after {} attempts", attempts)))
    }

    fn chapter(&self, plan: &ChapterPlan, body: String) -> Chapter {
        Chapter {
            index: plan.index,
            title: Some(plan.title.clone()),
            body,
        }
    }

    fn chapter_prompt(&self, outline: &Outline, plan: &ChapterPlan, previous: Option<&Chapter>) -> Prompt {
        let total = outline.chapters.len() as u32;
        let position = Position::of(plan.index, total);

        let mut user = format!(
            "Write chapter {} of {} of the novel \"{}\".\n\n\
             Story outline:\n{}\n\n",
            plan.index, total, outline.title, outline.premise
        );

        let story_so_far = story_so_far(&outline.chapters, plan.index);
        if !story_so_far.is_empty() {
            user.push_str(&format!("Story so far:\n{}\n\n", story_so_far));
        }

        if let Some(previous) = previous {
            user.push_str(&format!(
                "End of the previous chapter:\n{}\n\n",
                tail_chars(&previous.body, self.config.context_chars)
            ));
        }

        user.push_str(&format!(
            "Chapter number: {}\n\
             Chapter title: {}\n\
             Chapter overview: {}\n\n\
             {}\n\n\
             Output your response concisely in the following format:\n\
             <response>\n\
             ONLY the chapter prose (without the chapter title or overview), in the same language as the story outline\n\
             </response>",
            plan.index,
            plan.title,
            plan.summary,
            position.goals()
        ));

        Prompt::new(format!("Chapter {}", plan.index), self.style.system_prompt(), user)
    }
}

/// Plans of all chapters before `index`, one line each.
fn story_so_far(plans: &[ChapterPlan], index: u32) -> String {
    plans
        .iter()
        .filter(|p| p.index < index)
        .map(|p| format!("- Chapter {} ({}): {}", p.index, p.title, p.summary))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The last `max` characters of `text`, starting at a line boundary when one
/// is available.
fn tail_chars(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }

    let start = text
        .char_indices()
        .nth(count - max)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let tail = &text[start..];
    match tail.find('\n') {
        Some(newline) if newline + 1 < tail.len() => &tail[newline + 1..],
        _ => tail,
    }
}
