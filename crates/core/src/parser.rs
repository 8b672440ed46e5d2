//! Line-level structural parsing of textbook pages.
//!
//! Every line is offered to an ordered list of heading rules. The first rule
//! that accepts the line decides how the scan state changes; lines no rule
//! accepts accumulate into the running body block.

use crate::error::IngestError;
use crate::extractor::{extract_page_texts, PageText};
use crate::models::{Block, BlockKind};
use regex::Regex;
use std::path::Path;

/// A line that ends the running block and is emitted standalone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Heading {
    Chapter(u32),
    Section(String),
    Example,
    Exercise,
}

type Matcher = fn(&Regex, &str) -> Option<Heading>;

struct HeadingRule {
    pattern: Regex,
    matcher: Matcher,
}

pub struct StructuralParser {
    rules: Vec<HeadingRule>,
}

impl StructuralParser {
    /// Rules in priority order: chapter, section, example, exercise.
    pub fn new() -> Result<Self, IngestError> {
        let rules = vec![
            HeadingRule {
                pattern: Regex::new(r"(?i)^\s*chapter\s+(\d+)")?,
                matcher: match_chapter,
            },
            HeadingRule {
                pattern: Regex::new(r"^\d+(?:\.\d+)+")?,
                matcher: match_section,
            },
            HeadingRule {
                pattern: Regex::new(r"(?i)\bexample\s+\d+")?,
                matcher: match_example,
            },
            HeadingRule {
                pattern: Regex::new(r"(?i)\bexercise\b")?,
                matcher: match_exercise,
            },
        ];

        Ok(Self { rules })
    }

    pub fn classify(&self, line: &str) -> Option<Heading> {
        self.rules
            .iter()
            .find_map(|rule| (rule.matcher)(&rule.pattern, line))
    }

    pub fn parse(&self, pages: &[PageText], subject: &str, class_level: u32) -> Vec<Block> {
        let mut scan = ScanState::new(subject, class_level);

        for page in pages {
            scan.page = page.number;
            for line in page.text.lines() {
                match self.classify(line) {
                    Some(heading) => scan.apply(heading, line),
                    None => scan.buffer.push(line.to_string()),
                }
            }
        }

        scan.finish()
    }
}

fn match_chapter(pattern: &Regex, line: &str) -> Option<Heading> {
    let captures = pattern.captures(line)?;
    captures[1].parse().ok().map(Heading::Chapter)
}

fn match_section(pattern: &Regex, line: &str) -> Option<Heading> {
    let trimmed = line.trim();
    if !pattern.is_match(trimmed) {
        return None;
    }
    trimmed
        .split_whitespace()
        .next()
        .map(|label| Heading::Section(label.to_string()))
}

fn match_example(pattern: &Regex, line: &str) -> Option<Heading> {
    pattern.is_match(line).then_some(Heading::Example)
}

fn match_exercise(pattern: &Regex, line: &str) -> Option<Heading> {
    pattern.is_match(line).then_some(Heading::Exercise)
}

struct ScanState<'a> {
    subject: &'a str,
    class_level: u32,
    chapter: Option<u32>,
    section: Option<String>,
    buffer: Vec<String>,
    pending: BlockKind,
    page: u32,
    blocks: Vec<Block>,
}

impl<'a> ScanState<'a> {
    fn new(subject: &'a str, class_level: u32) -> Self {
        Self {
            subject,
            class_level,
            chapter: None,
            section: None,
            buffer: Vec::new(),
            pending: BlockKind::Paragraph,
            page: 1,
            blocks: Vec::new(),
        }
    }

    fn apply(&mut self, heading: Heading, line: &str) {
        self.flush();

        match heading {
            Heading::Chapter(number) => {
                self.chapter = Some(number);
                self.section = None;
                self.emit(BlockKind::ChapterTitle, line.to_string());
                self.pending = BlockKind::Paragraph;
            }
            Heading::Section(label) => {
                self.section = Some(label);
                self.emit(BlockKind::SectionTitle, line.to_string());
                self.pending = BlockKind::Paragraph;
            }
            Heading::Example => {
                self.emit(BlockKind::ExampleTitle, line.to_string());
                self.pending = BlockKind::ExampleBody;
            }
            Heading::Exercise => {
                self.emit(BlockKind::ExerciseTitle, line.to_string());
                self.pending = BlockKind::Exercise;
            }
        }
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let text = self.buffer.join("\n");
        self.buffer.clear();
        self.emit(self.pending, text);
    }

    fn emit(&mut self, kind: BlockKind, text: String) {
        let sequence = self.blocks.len() as u64 + 1;
        self.blocks.push(Block {
            id: format!("b{sequence}"),
            subject: self.subject.to_string(),
            class_level: self.class_level,
            chapter: self.chapter,
            section: self.section.clone(),
            kind,
            sequence,
            text,
            page: self.page,
        });
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        self.blocks
    }
}

pub fn parse_pages(
    pages: &[PageText],
    subject: &str,
    class_level: u32,
) -> Result<Vec<Block>, IngestError> {
    Ok(StructuralParser::new()?.parse(pages, subject, class_level))
}

pub fn parse_pdf(path: &Path, subject: &str, class_level: u32) -> Result<Vec<Block>, IngestError> {
    let pages = extract_page_texts(path)?;
    parse_pages(&pages, subject, class_level)
}
