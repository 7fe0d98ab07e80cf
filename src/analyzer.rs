//! Prompt analysis: picks a writing style and chapter count for a prompt.
//!
//! The model's answer is parsed strictly; each field that is missing or out
//! of range falls back to a fixed default so this stage never fails.

use crate::console::Console;
use crate::error::ParseError;
use crate::llm::{LanguageModel, Prompt};
use crate::response::{require_tag, response_body};
use crate::style::WritingStyle;
use std::ops::RangeInclusive;

/// Chapter counts the model may recommend.
pub const RECOMMENDED_CHAPTERS: RangeInclusive<u32> = 5..=15;

/// Chapter count used when the model gives no usable recommendation.
pub const DEFAULT_CHAPTERS: u32 = 10;

const ANALYST_SYSTEM_PROMPT: &str = "You are an expert literary analyst who determines the most appropriate writing style and chapter count for a story based on its prompt.";

/// Model's classification of a prompt, as parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub style: Result<WritingStyle, ParseError>,
    pub chapters: Result<u32, ParseError>,
    pub explanation: Option<String>,
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    User,
    Model,
    Default,
}

/// Final style and chapter count for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub style: WritingStyle,
    pub style_source: Source,
    pub chapters: u32,
    pub chapters_source: Source,
}

/// Builds the classification prompt.
pub fn analysis_prompt(story_prompt: &str) -> Prompt {
    let user = format!(
        "Analyze the story prompt and choose a writing style from the list of available styles and a chapter count.\n\n\
         Story prompt:\n{}\n\n\
         Available styles:\n{}\n\n\
         Important rules:\n\
         1. Choose a style only from the available options\n\
         2. Chapters must be a single number between {} and {}\n\n\
         Output your response concisely in the following format:\n\
         <response>\n\
         <style>your selected style</style>\n\
         <chapters>your selected chapter count, a number, not a range</chapters>\n\
         <explanation>your explanation</explanation>\n\
         </response>",
        story_prompt,
        WritingStyle::key_list(),
        RECOMMENDED_CHAPTERS.start(),
        RECOMMENDED_CHAPTERS.end()
    );
    Prompt::new("Analyzing prompt", ANALYST_SYSTEM_PROMPT, user)
}

/// Parses the model's answer field by field.
pub fn parse_analysis(raw: &str) -> Result<Analysis, ParseError> {
    let body = response_body(raw)?;

    let style = require_tag(&body, "style").and_then(|value| {
        value.parse::<WritingStyle>().map_err(|_| ParseError::InvalidValue {
            tag: "style".to_string(),
            value: value.to_string(),
        })
    });

    let chapters = require_tag(&body, "chapters").and_then(|value| {
        value
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|n| RECOMMENDED_CHAPTERS.contains(n))
            .ok_or_else(|| ParseError::InvalidValue {
                tag: "chapters".to_string(),
                value: value.to_string(),
            })
    });

    // Nothing usable: report the first problem.
    if let (Err(e), Err(_)) = (&style, &chapters) {
        return Err(e.clone());
    }

    Ok(Analysis {
        style,
        chapters,
        explanation: require_tag(&body, "explanation").ok().map(str::to_string),
    })
}

/// Resolves style and chapter count, asking the model only when needed.
pub async fn resolve(
    model: &dyn LanguageModel,
    story_prompt: &str,
    style: Option<WritingStyle>,
    chapters: Option<u32>,
    console: &Console,
) -> Resolution {
    if let (Some(style), Some(chapters)) = (style, chapters) {
        return Resolution {
            style,
            style_source: Source::User,
            chapters,
            chapters_source: Source::User,
        };
    }

    console.step("Analyzing prompt to choose style and chapter count...");
    let analysis = match model.complete(&analysis_prompt(story_prompt)).await {
        Ok(raw) => parse_analysis(&raw).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    let analysis = match analysis {
        Ok(analysis) => Some(analysis),
        Err(reason) => {
            console.warning(&format!("Prompt analysis unusable, using defaults: {}", reason));
            None
        }
    };

    if let Some(explanation) = analysis.as_ref().and_then(|a| a.explanation.as_deref()) {
        console.info(&format!("Analyst: {}", explanation));
    }

    let (style, style_source) = match style {
        Some(style) => (style, Source::User),
        None => match analysis.as_ref().map(|a| a.style.clone()) {
            Some(Ok(style)) => (style, Source::Model),
            Some(Err(e)) => {
                console.warning(&format!("{}, using {}", e, WritingStyle::DEFAULT));
                (WritingStyle::DEFAULT, Source::Default)
            }
            None => (WritingStyle::DEFAULT, Source::Default),
        },
    };

    let (chapters, chapters_source) = match chapters {
        Some(chapters) => (chapters, Source::User),
        None => match analysis.as_ref().map(|a| a.chapters.clone()) {
            Some(Ok(chapters)) => (chapters, Source::Model),
            Some(Err(e)) => {
                console.warning(&format!("{}, using {} chapters", e, DEFAULT_CHAPTERS));
                (DEFAULT_CHAPTERS, Source::Default)
            }
            None => (DEFAULT_CHAPTERS, Source::Default),
        },
    };

    Resolution {
        style,
        style_source,
        chapters,
        chapters_source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;

    const MARKER: &str = "Analyze the story prompt";

    #[test]
    fn test_parse_valid() {
        let raw = "<response><style>scifi</style><chapters>8</chapters>\
                   <explanation>Robots.</explanation></response>";
        let analysis = parse_analysis(raw).unwrap();
        assert_eq!(analysis.style, Ok(WritingStyle::Scifi));
        assert_eq!(analysis.chapters, Ok(8));
        assert_eq!(analysis.explanation.as_deref(), Some("Robots."));
    }

    #[test]
    fn test_parse_out_of_range_chapters() {
        let raw = "<response><style>horror</style><chapters>40</chapters></response>";
        let analysis = parse_analysis(raw).unwrap();
        assert_eq!(analysis.style, Ok(WritingStyle::Horror));
        assert!(matches!(
            analysis.chapters,
            Err(ParseError::InvalidValue { ref tag, .. }) if tag == "chapters"
        ));
    }

    #[test]
    fn test_parse_range_is_rejected() {
        let raw = "<response><style>horror</style><chapters>8-10</chapters></response>";
        assert!(parse_analysis(raw).unwrap().chapters.is_err());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_analysis("I think this is a lovely story!").is_err());
    }

    #[tokio::test]
    async fn test_overrides_skip_model() {
        let model = ScriptedModel::new();
        let resolution = resolve(
            &model,
            "A heist on Mars",
            Some(WritingStyle::Thriller),
            Some(4),
            &Console::quiet(),
        )
        .await;

        assert_eq!(model.call_count(), 0);
        assert_eq!(resolution.style, WritingStyle::Thriller);
        assert_eq!(resolution.chapters, 4);
        assert_eq!(resolution.style_source, Source::User);
    }

    #[tokio::test]
    async fn test_model_fills_missing_fields() {
        let model = ScriptedModel::new().on(
            MARKER,
            "<response><style>Mystery</style><chapters>12</chapters></response>",
        );
        let resolution = resolve(&model, "Who stole the moon?", None, Some(6), &Console::quiet()).await;

        assert_eq!(model.call_count(), 1);
        assert_eq!(resolution.style, WritingStyle::Mystery);
        assert_eq!(resolution.style_source, Source::Model);
        // user override wins over the model's 12
        assert_eq!(resolution.chapters, 6);
        assert_eq!(resolution.chapters_source, Source::User);
    }

    #[tokio::test]
    async fn test_per_field_fallback() {
        let model = ScriptedModel::new().on(
            MARKER,
            "<response><style>cookbook</style><chapters>7</chapters></response>",
        );
        let resolution = resolve(&model, "Soup", None, None, &Console::quiet()).await;

        assert_eq!(resolution.style, WritingStyle::DEFAULT);
        assert_eq!(resolution.style_source, Source::Default);
        assert_eq!(resolution.chapters, 7);
        assert_eq!(resolution.chapters_source, Source::Model);
    }

    #[tokio::test]
    async fn test_model_failure_uses_defaults() {
        let model = ScriptedModel::new().fail_on(MARKER);
        let resolution = resolve(&model, "Anything", None, None, &Console::quiet()).await;

        assert_eq!(resolution.style, WritingStyle::DEFAULT);
        assert_eq!(resolution.chapters, DEFAULT_CHAPTERS);
        assert_eq!(resolution.chapters_source, Source::Default);
    }
}
