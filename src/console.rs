//! Console output with ANSI color support.
//!
//! This is the pipeline's logging surface: every stage reports through a
//! `Console`, which labels lines by severity and keeps a single in-place
//! progress line while a response is streaming. Colors follow TTY detection
//! and the NO_COLOR convention.

use std::io::{self, IsTerminal, Write};
use std::time::Duration;

/// ANSI style codes for terminal formatting.
#[derive(Debug, Clone, Copy)]
pub enum Style {
    Bold,
    Dim,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    Gray,
}

impl Style {
    fn code(self) -> &'static str {
        match self {
            Style::Bold => "1",
            Style::Dim => "2",
            Style::Red => "31",
            Style::Green => "32",
            Style::Yellow => "33",
            Style::Blue => "34",
            Style::Magenta => "35",
            Style::Cyan => "36",
            Style::Gray => "90",
        }
    }
}

const RESET: &str = "\x1b[0m";

/// Width of the trailing preview shown on the progress line.
const PREVIEW_CHARS: usize = 50;

/// Console output handler.
#[derive(Debug, Clone)]
pub struct Console {
    colors_enabled: bool,
    quiet: bool,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    /// Creates a Console, enabling colors only for a TTY without NO_COLOR.
    pub fn new() -> Self {
        let colors_enabled = std::env::var("NO_COLOR").is_err() && io::stdout().is_terminal();

        Self {
            colors_enabled,
            quiet: false,
        }
    }

    /// Creates a Console with colors explicitly enabled or disabled.
    pub fn with_colors(enabled: bool) -> Self {
        Self {
            colors_enabled: enabled,
            quiet: false,
        }
    }

    /// A console that prints nothing. Errors still go to stderr.
    pub fn quiet() -> Self {
        Self {
            colors_enabled: false,
            quiet: true,
        }
    }

    /// Applies ANSI styles to text if colors are enabled.
    pub fn style(&self, text: &str, styles: &[Style]) -> String {
        if !self.colors_enabled || styles.is_empty() {
            return text.to_string();
        }

        let codes: Vec<&str> = styles.iter().map(|s| s.code()).collect();
        format!("\x1b[{}m{}{}", codes.join(";"), text, RESET)
    }

    /// Creates a colored label like `[INFO]`.
    pub fn label(&self, label: &str, color: Style) -> String {
        format!("[{}]", self.style(label, &[color, Style::Bold]))
    }

    fn line(&self, label: &str, color: Style, message: &str) {
        if !self.quiet {
            println!("{} {}", self.label(label, color), message);
        }
    }

    pub fn info(&self, message: &str) {
        self.line("INFO", Style::Blue, message);
    }

    pub fn success(&self, message: &str) {
        self.line("OK", Style::Green, message);
    }

    pub fn warning(&self, message: &str) {
        self.line("WARN", Style::Yellow, message);
    }

    /// Prints an error message to stderr, even when quiet.
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", self.label("ERROR", Style::Red), message);
    }

    pub fn step(&self, message: &str) {
        self.line("STEP", Style::Cyan, message);
    }

    /// Prints a section header in magenta bold.
    pub fn section(&self, message: &str) {
        if !self.quiet {
            println!();
            println!("{}", self.style(message, &[Style::Magenta, Style::Bold]));
        }
    }

    /// Returns text styled as muted (dim gray).
    pub fn muted(&self, text: &str) -> String {
        self.style(text, &[Style::Gray, Style::Dim])
    }

    /// Redraws the streaming progress line for a response in flight.
    pub fn stream_progress(&self, task: &str, received: &str, elapsed: Duration) {
        if self.quiet {
            return;
        }

        let chars = received.chars().count();
        let speed = if elapsed.as_secs_f64() > 0.0 {
            chars as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        self.clear_line();
        print!(
            "{} {} {} chars at {} {}",
            self.label("..", Style::Cyan),
            self.style(task, &[Style::Cyan, Style::Bold]),
            self.style(&chars.to_string(), &[Style::Green, Style::Bold]),
            self.style(&format!("{:.0}/sec", speed), &[Style::Yellow, Style::Bold]),
            self.muted(&format!("{}...", preview_tail(received, PREVIEW_CHARS)))
        );
        let _ = io::stdout().flush();
    }

    /// Clears the current line (for progress updates).
    pub fn clear_line(&self) {
        if self.colors_enabled && !self.quiet {
            print!("\r\x1b[2K");
            let _ = io::stdout().flush();
        }
    }
}

/// Last `max` characters of `text` on a single line.
fn preview_tail(text: &str, max: usize) -> String {
    let count = text.chars().count();
    text.chars()
        .skip(count.saturating_sub(max))
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect()
}
