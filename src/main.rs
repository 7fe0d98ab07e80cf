//! Novelist CLI - generates a complete novel from a story prompt.

use anyhow::{Context, Result};
use clap::Parser;
use novelist::config::Config;
use novelist::console::{Console, Style};
use novelist::model::{GenerationRequest, GenerationResult};
use novelist::style::WritingStyle;
use std::path::PathBuf;

/// Generates a complete novel (Markdown, EPUB and cover) from a story prompt.
#[derive(Parser, Debug)]
#[command(name = "novelist")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The story idea to expand into a novel.
    #[arg(short, long, required_unless_present = "list_styles")]
    prompt: Option<String>,

    /// Number of chapters (chosen from the prompt when omitted).
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    chapters: Option<u32>,

    /// Writing style (chosen from the prompt when omitted).
    #[arg(short, long)]
    style: Option<WritingStyle>,

    /// Directory the book files are written to.
    #[arg(short, long, default_value = GenerationRequest::DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Author name shown in the book.
    #[arg(short, long, default_value = GenerationRequest::DEFAULT_AUTHOR)]
    author: String,

    /// Path to a config file instead of the default location.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip cover generation.
    #[arg(long)]
    no_cover: bool,

    /// Print the result as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// List available writing styles and exit.
    #[arg(long)]
    list_styles: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_styles {
        print_styles(&Console::new());
        return Ok(());
    }

    let console = if args.json {
        Console::quiet()
    } else {
        Console::new()
    };

    console.section("Novelist - Novel Generator");

    console.step("Loading configuration...");
    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    config
        .apply_env()
        .context("Invalid environment override")?;
    if args.no_cover {
        config.cover.enabled = false;
    }

    if !config.llm.is_configured() {
        let config_path = match &args.config {
            Some(path) => path.clone(),
            None => Config::config_path()?,
        };
        console.warning(&format!(
            "API key not configured. Set OPENAI_API_KEY or edit: {}",
            config_path.display()
        ));
    }

    config.validate().context("Invalid configuration")?;
    console.success("Configuration loaded");

    // clap guarantees a prompt unless --list-styles was given
    let prompt = args.prompt.unwrap_or_default();
    let mut request = GenerationRequest::new(prompt)
        .with_output_dir(args.output_dir)
        .with_author(args.author);
    request.style = args.style;
    request.chapters = args.chapters;

    let result = novelist::generate_novel(&config, &request, console.clone()).await;

    if args.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialize result")?;
        println!("{}", json);
    } else {
        print_summary(&console, &result);
    }

    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_styles(console: &Console) {
    console.section("Available writing styles");
    for style in WritingStyle::ALL {
        println!(
            "  {} {}",
            console.style(&format!("{:<18}", style.key()), &[Style::Bold]),
            style.description()
        );
    }
}

fn print_summary(console: &Console, result: &GenerationResult) {
    // failures were already reported by the pipeline
    if !result.is_success() {
        return;
    }

    if let Some(title) = &result.title {
        console.success(&format!("\"{}\" is ready", title));
    }
    if !result.cover_generated {
        console.info("No cover was generated");
    }
}
