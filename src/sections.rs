//! Paragraph-level sections of a book and the ways users refer to them.

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Number of characters of section text shown in a label.
const LABEL_PREVIEW_CHARS: usize = 60;

fn blank_line_splitter() -> &'static Regex {
    static SPLITTER: OnceLock<Regex> = OnceLock::new();
    SPLITTER.get_or_init(|| Regex::new(r"\n{2,}").expect("valid regex"))
}

fn label_pattern() -> &'static Regex {
    static LABEL: OnceLock<Regex> = OnceLock::new();
    LABEL.get_or_init(|| Regex::new(r"^\s*Section\s+(\d+)\b").expect("valid regex"))
}

/// One 1-indexed block of text, the unit of synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub index: usize,
    pub text: String,
}

/// Ordered sections of the currently loaded document.
#[derive(Debug, Default, Clone)]
pub struct SectionStore {
    sections: Vec<Section>,
}

impl SectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_text(raw_text: &str) -> Self {
        let mut store = Self::new();
        store.load(raw_text);
        store
    }

    /// Replaces all sections with the blank-line separated blocks of `raw_text`.
    /// Returns the new section count.
    pub fn load(&mut self, raw_text: &str) -> usize {
        let normalized = raw_text.replace("\r\n", "\n");

        self.sections = blank_line_splitter()
            .split(&normalized)
            .map(str::trim)
            .filter(|chunk| !chunk.is_empty())
            .enumerate()
            .map(|(i, chunk)| Section {
                index: i + 1,
                text: chunk.to_string(),
            })
            .collect();

        self.sections.len()
    }

    /// Text of the section at 1-based `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.sections.get(i))
            .map(|section| section.text.as_str())
    }

    pub fn all(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// All indices, in order.
    pub fn indices(&self) -> Vec<usize> {
        (1..=self.sections.len()).collect()
    }

    pub fn labels(&self) -> Vec<String> {
        self.sections
            .iter()
            .map(|s| section_label(s.index, &s.text))
            .collect()
    }
}

/// `"Section 3: First words of the paragraph..."`
pub fn section_label(index: usize, text: &str) -> String {
    let mut preview: String = text.chars().take(LABEL_PREVIEW_CHARS).collect();
    if text.chars().count() > LABEL_PREVIEW_CHARS {
        preview.push_str("...");
    }
    format!("Section {}: {}", index, preview.replace('\n', " "))
}

pub fn parse_section_label(label: &str) -> Option<usize> {
    label_pattern()
        .captures(label)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Parses a selection such as `"1-3, 5,8"` into sorted, unique 1-based indices.
///
/// `"all"` selects every section and therefore needs `section_count`. When the
/// count is known (non-zero), indices beyond it are rejected.
pub fn parse_selection(input: &str, section_count: usize) -> Result<Vec<usize>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::NothingSelected);
    }
    if input.eq_ignore_ascii_case("all") {
        if section_count == 0 {
            return Err(Error::NothingSelected);
        }
        return Ok((1..=section_count).collect());
    }

    let mut indices = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_index(start, part)?;
                let end = parse_index(end, part)?;
                if start > end {
                    return Err(Error::InvalidSelection(format!(
                        "range {} runs backwards",
                        part
                    )));
                }
                indices.extend(start..=end);
            }
            None => indices.push(parse_index(part, part)?),
        }
    }

    if indices.is_empty() {
        return Err(Error::NothingSelected);
    }
    indices.sort_unstable();
    indices.dedup();
    if let Some(&index) = indices.iter().find(|&&i| section_count > 0 && i > section_count) {
        return Err(Error::SectionOutOfRange {
            index,
            count: section_count,
        });
    }
    Ok(indices)
}

fn parse_index(value: &str, context: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err(Error::InvalidSelection(format!(
            "sections are numbered from 1 ({})",
            context
        ))),
        Ok(index) => Ok(index),
        Err(_) => Err(Error::InvalidSelection(format!(
            "'{}' is not a section number",
            context
        ))),
    }
}
