//! Plain text extraction from text, EPUB and PDF files.

use crate::library::sanitize_name;
use epub::doc::EpubDoc;
use html2text::from_read;
use log::{error, info, warn};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command as ProcessCommand, Stdio};
use std::sync::OnceLock;

/// Wide enough that html2text never wraps a paragraph.
const UNWRAPPED_WIDTH: usize = 100_000;

struct Patterns {
    block: Regex,
    spaces: Regex,
    paragraph_breaks: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        block: Regex::new(r"(?is)<(?:h[1-6]|p)\b[^>]*>(.*?)</(?:h[1-6]|p)\s*>").expect("valid regex"),
        spaces: Regex::new(r"[ \t]+").expect("valid regex"),
        paragraph_breaks: Regex::new(r"\n{3,}").expect("valid regex"),
    })
}

/// Collapses runs of spaces and tabs, limits paragraph breaks to one blank line, trims.
pub fn normalize_whitespace(text: &str) -> String {
    let p = patterns();
    let text = text.replace("\r\n", "\n");
    let text = p.spaces.replace_all(&text, " ");
    let text = text
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    p.paragraph_breaks.replace_all(&text, "\n\n").trim().to_string()
}

/// Text of every heading and paragraph element of an XHTML document, one
/// paragraph per element.
pub fn html_paragraphs(html: &str) -> Vec<String> {
    patterns()
        .block
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|inner| {
            let text = from_read(inner.as_str().as_bytes(), UNWRAPPED_WIDTH);
            text.split_whitespace().collect::<Vec<_>>().join(" ")
        })
        .filter(|text| !text.is_empty())
        .collect()
}

/// Reads a document into plain text, choosing the reader by extension.
///
/// Failures are logged and produce an empty string.
pub fn extract_text(path: &Path) -> String {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let result = match extension.as_str() {
        "epub" => extract_epub(path),
        "pdf" => extract_pdf(path),
        _ => fs::read_to_string(path).map_err(|e| e.to_string()),
    };

    match result {
        Ok(text) => normalize_whitespace(&text),
        Err(e) => {
            error!("Error extracting text from {}: {}", path.display(), e);
            String::new()
        }
    }
}

fn extract_epub(path: &Path) -> Result<String, String> {
    let mut doc = EpubDoc::new(path).map_err(|e| e.to_string())?;
    let mut paragraphs = Vec::new();

    // Walk the spine in reading order.
    loop {
        if let Some((html, _mime)) = doc.get_current_str() {
            paragraphs.extend(html_paragraphs(&html));
        }
        if !doc.go_next() {
            break;
        }
    }

    Ok(paragraphs.join("\n\n"))
}

fn extract_pdf(path: &Path) -> Result<String, String> {
    let output = ProcessCommand::new("pdftotext")
        .arg("-layout")
        .arg(path)
        .arg("-")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| format!("pdftotext not available ({}). Please install poppler", e))?;

    if !output.status.success() {
        return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
    }

    // pdftotext separates pages with form feeds.
    let text = String::from_utf8_lossy(&output.stdout);
    Ok(text
        .split('\u{c}')
        .filter(|page| !page.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n"))
}

fn image_extension(mime: &str) -> &str {
    match mime {
        "image/jpeg" => "jpg",
        "image/svg+xml" => "svg",
        other => other.strip_prefix("image/").unwrap_or("bin"),
    }
}

/// Saves the images of an EPUB into `<output_dir>/images`. Returns the written paths.
pub fn extract_epub_images(epub_path: &Path, output_dir: &Path) -> crate::Result<Vec<PathBuf>> {
    let images_dir = output_dir.join("images");
    fs::create_dir_all(&images_dir)?;

    let mut doc = match EpubDoc::new(epub_path) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Could not open {} for images: {}", epub_path.display(), e);
            return Ok(Vec::new());
        }
    };

    let mut ids: Vec<String> = doc.resources.keys().cloned().collect();
    ids.sort();

    let mut written = Vec::new();
    for id in ids {
        let Some((content, mime)) = doc.get_resource(&id) else {
            continue;
        };
        if !mime.starts_with("image/") {
            continue;
        }

        let mut file_name = sanitize_name(&id);
        let extension = image_extension(&mime);
        if !file_name.to_ascii_lowercase().ends_with(&format!(".{}", extension)) {
            file_name = format!("{}.{}", file_name, extension);
        }

        let image_path = images_dir.join(file_name);
        match fs::write(&image_path, content) {
            Ok(()) => written.push(image_path),
            Err(e) => warn!("Could not save image {}: {}", id, e),
        }
    }

    info!("Extracted {} images into {}", written.len(), images_dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        let text = "  Hello \t  world \n\n\n\n\nNext   para \r\n";
        assert_eq!(normalize_whitespace(text), "Hello world\n\nNext para");
    }

    #[test]
    fn test_html_paragraphs_keep_document_order() {
        let html = r#"<html><body>
            <h1 class="title">Chapter <em>One</em></h1>
            <div>ignored wrapper</div>
            <p>It was a   bright
               cold day &amp; the clocks</p>
            <P>were striking thirteen.</P>
            <p>   </p>
        </body></html>"#;

        let paragraphs = html_paragraphs(html);
        assert_eq!(paragraphs.len(), 3);
        assert!(paragraphs[0].contains("Chapter"));
        assert!(paragraphs[0].contains("One"));
        assert!(paragraphs[1].starts_with("It was a bright cold day"));
        assert!(paragraphs[1].contains('&'));
        assert!(paragraphs[2].contains("thirteen"));
    }

    #[test]
    fn test_plain_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.txt");
        fs::write(&path, "First.\n\n\n\nSecond.\n").unwrap();

        assert_eq!(extract_text(&path), "First.\n\nSecond.");
    }

    #[test]
    fn test_unreadable_file_gives_empty_text() {
        assert_eq!(extract_text(Path::new("/no/such/book.txt")), "");
        assert_eq!(extract_text(Path::new("/no/such/book.epub")), "");
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("image/jpeg"), "jpg");
        assert_eq!(image_extension("image/png"), "png");
        assert_eq!(image_extension("image/svg+xml"), "svg");
    }
}
