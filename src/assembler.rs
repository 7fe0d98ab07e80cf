//! Book assembly: renders the finished chapters to Markdown and EPUB and
//! writes them, with the cover, into the output directory.
//!
//! All files for a book share the title-derived stem, so several books can
//! live in one directory. Everything is rendered in memory first. Each file
//! is then written to a temporary file beside its destination and renamed
//! into place, so a failure never leaves a half-written artifact behind.

use crate::console::Console;
use crate::error::AssemblyError;
use crate::model::{Chapter, CoverImage, OutputFiles};
use epub_builder::{EpubBuilder, EpubContent, ReferenceType, ZipLibrary};
use std::fmt::Display;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Longest title prefix used in file names.
const MAX_FILENAME_CHARS: usize = 50;

/// Longest chapter title shown in the EPUB table of contents.
const MAX_TOC_TITLE_CHARS: usize = 100;

const STYLESHEET: &str = r#"body {
  font-family: "Georgia", "Times New Roman", serif;
  line-height: 1.6;
  color: #333;
  margin: 0;
  padding: 0;
}
.chapter { margin: 2em auto; padding: 0 1em; }
.chapter-title {
  font-size: 1.8em;
  text-align: center;
  text-transform: uppercase;
  letter-spacing: 0.1em;
  margin: 1em 0 0.3em;
}
.chapter-subtitle {
  font-size: 1.3em;
  font-style: italic;
  text-align: center;
  margin: 0 0 1.5em;
}
.chapter-content { text-align: justify; }
.paragraph { margin: 0 0 1em; text-indent: 1.5em; }
.chapter-content .paragraph:first-child { text-indent: 0; }
"#;

/// Everything that goes into the output files.
#[derive(Debug, Clone, Copy)]
pub struct Book<'a> {
    pub title: &'a str,
    pub author: &'a str,
    /// Short blurb for the EPUB metadata.
    pub description: Option<&'a str>,
    pub chapters: &'a [Chapter],
    pub cover: Option<&'a CoverImage>,
}

/// File-system-safe name derived from a title.
pub fn safe_filename(title: &str) -> String {
    let safe: String = title
        .chars()
        .take(MAX_FILENAME_CHARS)
        .filter(|c| c.is_alphanumeric() || " -_.,()".contains(*c))
        .collect();
    let safe = safe.trim().trim_matches('.').trim();
    if safe.is_empty() {
        "novel".to_string()
    } else {
        safe.to_string()
    }
}

/// Verifies chapters are numbered 1..=expected in order.
pub fn check_sequence(chapters: &[Chapter], expected: usize) -> Result<(), AssemblyError> {
    if chapters.len() != expected {
        return Err(AssemblyError::ChapterSequence(format!(
            "expected {} chapters, got {}",
            expected,
            chapters.len()
        )));
    }

    for (position, chapter) in chapters.iter().enumerate() {
        let want = position as u32 + 1;
        if chapter.index != want {
            return Err(AssemblyError::ChapterSequence(format!(
                "chapter at position {} has index {}",
                want, chapter.index
            )));
        }
    }

    Ok(())
}

pub fn render_markdown(book: &Book<'_>) -> String {
    let mut out = format!("# {}\n\n*by {}*\n\n", book.title, book.author);
    for chapter in book.chapters {
        out.push_str(&format!("## {}\n\n{}\n\n", chapter.heading(), chapter.body.trim()));
    }
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    out.push('\n');
    out
}

fn epub_err<E: Display>(e: E) -> AssemblyError {
    AssemblyError::Epub(e.to_string())
}

/// XHTML document for one chapter.
fn chapter_xhtml(chapter: &Chapter) -> String {
    let paragraphs: String = chapter
        .body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| format!("      <p class=\"paragraph\">{}</p>\n", html_escape::encode_text(line)))
        .collect();

    let subtitle = chapter
        .title
        .as_deref()
        .map(|t| format!("    <h2 class=\"chapter-subtitle\">{}</h2>\n", html_escape::encode_text(t)))
        .unwrap_or_default();

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE html>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\">\n\
         <head>\n\
         \x20 <title>{heading}</title>\n\
         \x20 <link rel=\"stylesheet\" type=\"text/css\" href=\"stylesheet.css\"/>\n\
         </head>\n\
         <body>\n\
         \x20 <div class=\"chapter\">\n\
         \x20   <h1 class=\"chapter-title\">Chapter {index}</h1>\n\
         {subtitle}\
         \x20   <div class=\"chapter-content\">\n\
         {paragraphs}\
         \x20   </div>\n\
         \x20 </div>\n\
         </body>\n\
         </html>\n",
        heading = html_escape::encode_text(&chapter.heading()),
        index = chapter.index,
        subtitle = subtitle,
        paragraphs = paragraphs
    )
}

fn toc_title(chapter: &Chapter) -> String {
    let heading = chapter.heading();
    if heading.chars().count() <= MAX_TOC_TITLE_CHARS {
        heading
    } else {
        let cut: String = heading.chars().take(MAX_TOC_TITLE_CHARS - 3).collect();
        format!("{}...", cut)
    }
}

/// Packages the book as EPUB bytes.
pub fn render_epub(book: &Book<'_>) -> Result<Vec<u8>, AssemblyError> {
    let mut builder = EpubBuilder::new(ZipLibrary::new().map_err(epub_err)?).map_err(epub_err)?;

    builder.metadata("title", book.title).map_err(epub_err)?;
    builder.metadata("author", book.author).map_err(epub_err)?;
    builder.metadata("lang", "en").map_err(epub_err)?;
    builder.metadata("generator", "novelist").map_err(epub_err)?;
    if let Some(description) = book.description {
        builder.metadata("description", description).map_err(epub_err)?;
    }
    builder.stylesheet(STYLESHEET.as_bytes()).map_err(epub_err)?;

    if let Some(cover) = book.cover {
        let name = format!("cover.{}", cover.format.extension());
        builder
            .add_cover_image(name, cover.data.as_slice(), cover.format.mime_type())
            .map_err(epub_err)?;
    }

    builder.inline_toc();

    for chapter in book.chapters {
        let xhtml = chapter_xhtml(chapter);
        let content = EpubContent::new(format!("chapter_{}.xhtml", chapter.index), xhtml.as_bytes())
            .title(toc_title(chapter))
            .reftype(ReferenceType::Text);
        builder.add_content(content).map_err(epub_err)?;
    }

    let mut output = Vec::new();
    builder.generate(&mut output).map_err(epub_err)?;
    Ok(output)
}

/// Writes `bytes` to `dir/name` via a temporary file and rename.
fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf, AssemblyError> {
    let target = dir.join(name);
    let mut temp = tempfile::Builder::new()
        .prefix(".novelist-")
        .suffix(".partial")
        .tempfile_in(dir)
        .map_err(|e| AssemblyError::io(dir, e))?;

    temp.write_all(bytes)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| AssemblyError::io(temp.path(), e))?;

    temp.persist(&target)
        .map_err(|e| AssemblyError::io(&target, e.error))?;
    Ok(target)
}

/// Renders and writes all artifacts, returning their paths.
pub fn assemble(
    book: &Book<'_>,
    output_dir: &Path,
    expected_chapters: usize,
    console: &Console,
) -> Result<OutputFiles, AssemblyError> {
    check_sequence(book.chapters, expected_chapters)?;

    console.step("Assembling book...");
    let markdown = render_markdown(book);
    let epub = render_epub(book)?;

    std::fs::create_dir_all(output_dir).map_err(|e| AssemblyError::io(output_dir, e))?;
    let stem = safe_filename(book.title);

    let mut files = OutputFiles::default();
    if let Some(cover) = book.cover {
        let name = format!("{}.{}", stem, cover.format.extension());
        files.cover = Some(write_atomic(output_dir, &name, &cover.data)?);
    }

    let md_path = write_atomic(output_dir, &format!("{}.md", stem), markdown.as_bytes())?;
    console.success(&format!("Markdown saved: {}", md_path.display()));
    files.markdown = Some(md_path);

    let epub_path = write_atomic(output_dir, &format!("{}.epub", stem), &epub)?;
    console.success(&format!("EPUB saved: {}", epub_path.display()));
    files.epub = Some(epub_path);

    Ok(files)
}
