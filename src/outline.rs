//! Outline generation: premise, title and chapter plan.
//!
//! Planning runs as a short chain of requests: draft candidate premises,
//! pick or merge the best one, refine it, title it, then split it into
//! exactly the requested number of chapters.

use crate::console::Console;
use crate::error::{LlmError, OutlineError, ParseError};
use crate::llm::{LanguageModel, Prompt};
use crate::model::{ChapterPlan, Outline};
use crate::response::{extract_tag, response_body};
use crate::style::WritingStyle;
use regex::Regex;
use std::sync::LazyLock;

/// Opening tag of one chapter entry in the plan.
static CHAPTER_OPEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<chapter (\d+)>").expect("Invalid CHAPTER_OPEN_REGEX"));

/// Title used when the model gives none.
pub const FALLBACK_TITLE: &str = "Untitled Novel";

const PLACEHOLDER_SUMMARY: &str =
    "Continue the story naturally from the previous chapter, advancing the main conflict.";
const PLACEHOLDER_FINAL_SUMMARY: &str =
    "Bring the story to a satisfying conclusion, resolving the main conflict.";

/// How the parsed plan was adjusted to the requested length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    Exact,
    /// The model planned too many chapters; the tail was dropped.
    Truncated { dropped: usize },
    /// The model planned too few; placeholder plans were appended.
    Padded { added: usize },
}

/// Drives the planning chain for one novel.
pub struct OutlineGenerator<'a> {
    model: &'a dyn LanguageModel,
    style: WritingStyle,
    candidates: u32,
    console: &'a Console,
}

impl<'a> OutlineGenerator<'a> {
    pub fn new(
        model: &'a dyn LanguageModel,
        style: WritingStyle,
        candidates: u32,
        console: &'a Console,
    ) -> Self {
        Self {
            model,
            style,
            candidates: candidates.max(1),
            console,
        }
    }

    /// Produces an outline with exactly `chapters` plans.
    pub async fn generate(&self, story_prompt: &str, chapters: u32) -> Result<Outline, OutlineError> {
        self.console.step("Drafting story premises...");
        let candidates = self
            .ask_or(self.premises_prompt(story_prompt), story_prompt)
            .await?;

        self.console.step("Selecting the strongest premise...");
        let selected = self.ask_or(self.select_prompt(&candidates), &candidates).await?;

        self.console.step("Refining premise...");
        let premise = self.ask_or(self.refine_prompt(&selected), &selected).await?;

        self.console.step("Choosing a title...");
        let title = self.title(&premise).await?;
        self.console.success(&format!("Title: {}", title));

        self.console.step(&format!("Planning {} chapters...", chapters));
        let raw = self.model.complete(&self.plan_prompt(&premise, chapters)).await?;
        let parsed = parse_chapter_plan(&raw)?;
        let (plans, reconciliation) = reconcile(parsed, chapters);

        match reconciliation {
            Reconciliation::Exact => {}
            Reconciliation::Truncated { dropped } => self.console.warning(&format!(
                "Model planned {} extra chapter(s); keeping the first {}",
                dropped, chapters
            )),
            Reconciliation::Padded { added } => self.console.warning(&format!(
                "Model planned {} chapter(s) too few; added placeholder plans",
                added
            )),
        }

        Ok(Outline {
            title,
            premise,
            chapters: plans,
        })
    }

    /// Asks the model and returns the response body, or `fallback` if the
    /// reply has no usable body.
    async fn ask_or(&self, prompt: Prompt, fallback: &str) -> Result<String, LlmError> {
        let body = match self.model.complete(&prompt).await {
            Ok(raw) => response_body(&raw).map_err(|e| e.to_string()),
            Err(LlmError::Refused(reason)) => Err(reason),
            Err(e) => return Err(e),
        };

        Ok(body.unwrap_or_else(|reason| {
            self.console
                .warning(&format!("{}: {}, keeping previous text", prompt.label, reason));
            fallback.to_string()
        }))
    }

    async fn title(&self, premise: &str) -> Result<String, LlmError> {
        let raw = match self.model.complete(&self.title_prompt(premise)).await {
            Ok(raw) => Some(raw),
            Err(LlmError::Refused(_)) => None,
            Err(e) => return Err(e),
        };
        Ok(raw
            .and_then(|raw| response_body(&raw).ok())
            .and_then(|body| clean_title(&body))
            .unwrap_or_else(|| {
                self.console
                    .warning(&format!("No usable title, using '{}'", FALLBACK_TITLE));
                FALLBACK_TITLE.to_string()
            }))
    }

    fn prompt(&self, label: &str, user: String) -> Prompt {
        Prompt::new(label, self.style.system_prompt(), user)
    }

    fn premises_prompt(&self, story_prompt: &str) -> Prompt {
        self.prompt(
            "Drafting premises",
            format!(
                "Generate {} distinct {} story premises based on the user prompt.\n\n\
                 User prompt:\n{}\n\n\
                 Requirements:\n\
                 1. All premises must be in the same language as the user prompt\n\n\
                 Output your response concisely in the following format:\n\
                 <response>\n\
                 1. first premise\n\
                 2. second premise\n\
                 ...\n\
                 </response>",
                self.candidates,
                self.style.name(),
                story_prompt
            ),
        )
    }

    fn select_prompt(&self, candidates: &str) -> Prompt {
        self.prompt(
            "Selecting premise",
            format!(
                "Select the most engaging premise, or combine the best elements of several candidates into a new one. \
                 The story must be engaging, unique and creative.\n\n\
                 Candidate premises:\n{}\n\n\
                 Output your response concisely in the following format:\n\
                 <response>\n\
                 the chosen premise, in the same language as the candidates\n\
                 </response>",
                candidates
            ),
        )
    }

    fn refine_prompt(&self, premise: &str) -> Prompt {
        self.prompt(
            "Refining premise",
            format!(
                "Refine this story premise into a richer story outline with clear characters, conflict and arc.\n\n\
                 Premise:\n{}\n\n\
                 Output your response concisely in the following format:\n\
                 <response>\n\
                 the refined story outline, in the same language as the premise\n\
                 </response>",
                premise
            ),
        )
    }

    fn title_prompt(&self, premise: &str) -> Prompt {
        self.prompt(
            "Titling",
            format!(
                "Create a title for the story described by this outline.\n\n\
                 Story outline:\n{}\n\n\
                 Requirements:\n\
                 1. The title must be in the same language as the story outline\n\
                 2. Output only the title, without quotes or extra text\n\n\
                 Output your response concisely in the following format:\n\
                 <response>\n\
                 the title\n\
                 </response>",
                premise
            ),
        )
    }

    fn plan_prompt(&self, premise: &str, chapters: u32) -> Prompt {
        self.prompt(
            "Planning chapters",
            format!(
                "Plan the chapters of a {style} novel with exactly {n} chapters based on the story outline.\n\n\
                 Story outline:\n{premise}\n\n\
                 Requirements:\n\
                 1. Each chapter must have a unique, descriptive title without special characters\n\
                 2. Each overview must be 2-3 sentences\n\
                 3. Number the chapters from 1 to {n}\n\
                 4. All titles and overviews must be in the same language as the story outline\n\n\
                 Output your response concisely in the following format:\n\
                 <response>\n\
                 <chapters>\n\
                 <chapter 1>\n\
                   <title>First chapter title</title>\n\
                   <overview>Brief overview of chapter one.</overview>\n\
                 </chapter 1>\n\
                 ...\n\
                 <chapter {n}>\n\
                   <title>Chapter {n} title</title>\n\
                   <overview>Brief overview of chapter {n}.</overview>\n\
                 </chapter {n}>\n\
                 </chapters>\n\
                 </response>",
                style = self.style.name(),
                n = chapters,
                premise = premise
            ),
        )
    }
}

/// First non-empty line, stripped of quotes and markdown emphasis.
fn clean_title(body: &str) -> Option<String> {
    let line = body.lines().map(str::trim).find(|l| !l.is_empty())?;
    let title = line
        .trim_start_matches('#')
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '*' | '“' | '”' | '「' | '」' | '《' | '》'))
        .trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Parses `<chapter N><title/><overview/></chapter N>` entries.
///
/// Plans keep the number the model gave them; entries lacking a title or an
/// overview are skipped. Finding no usable entry is an error.
pub fn parse_chapter_plan(raw: &str) -> Result<Vec<ChapterPlan>, ParseError> {
    let body = response_body(raw)?;
    let scope = extract_tag(&body, "chapters").unwrap_or(&body);

    let mut plans = Vec::new();
    for caps in CHAPTER_OPEN_REGEX.captures_iter(scope) {
        let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Ok(index) = number.as_str().parse::<u32>() else {
            continue;
        };

        let rest = &scope[whole.end()..];
        let close = format!("</chapter {}>", index);
        let Some(end) = rest.find(&close) else {
            continue;
        };
        let entry = &rest[..end];

        if let (Some(title), Some(summary)) = (extract_tag(entry, "title"), extract_tag(entry, "overview")) {
            plans.push(ChapterPlan {
                index,
                title: title.to_string(),
                summary: summary.to_string(),
            });
        }
    }

    if plans.is_empty() {
        return Err(ParseError::MissingTag("chapter".to_string()));
    }
    Ok(plans)
}

/// Orders plans by the model's numbering, then truncates or pads to `target`
/// and renumbers them 1..=target.
pub fn reconcile(mut plans: Vec<ChapterPlan>, target: u32) -> (Vec<ChapterPlan>, Reconciliation) {
    plans.sort_by_key(|p| p.index);
    plans.dedup_by_key(|p| p.index);

    let target_len = target as usize;
    let reconciliation = match plans.len() {
        n if n > target_len => {
            plans.truncate(target_len);
            Reconciliation::Truncated {
                dropped: n - target_len,
            }
        }
        n if n < target_len => {
            for i in (n + 1)..=target_len {
                let summary = if i == target_len {
                    PLACEHOLDER_FINAL_SUMMARY
                } else {
                    PLACEHOLDER_SUMMARY
                };
                plans.push(ChapterPlan {
                    index: 0,
                    title: format!("Chapter {}", i),
                    summary: summary.to_string(),
                });
            }
            Reconciliation::Padded {
                added: target_len - n,
            }
        }
        _ => Reconciliation::Exact,
    };

    for (i, plan) in plans.iter_mut().enumerate() {
        plan.index = i as u32 + 1;
    }

    (plans, reconciliation)
}
