use std::ops::Range;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::BotConfig;
use crate::pattern::alternation;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^=+[^=\n].*=[ \t]*$").expect("heading pattern"));

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?(?:-->|\z)").expect("comment pattern"));

/// Recognises the trailing lines that belong to the footer: category links,
/// interlanguage links, sort keys and stub templates.
#[derive(Debug, Clone)]
pub struct FooterRules {
    line: Regex,
}

impl FooterRules {
    pub fn new(category_namespaces: &[String], stub_suffixes: &[String]) -> Result<Self> {
        let categories = alternation(category_namespaces.iter().map(String::as_str))
            .unwrap_or_else(|| "Category".to_string());
        let stubs = stub_suffixes
            .iter()
            .map(|suffix| suffix.trim())
            .filter(|suffix| !suffix.is_empty())
            .map(regex::escape)
            .collect::<Vec<_>>();

        let mut items = vec![
            format!(r"\[\[\s*(?:{categories})\s*:[^\[\]\n]*\]\]"),
            r"\[\[\s*[a-z]{2,3}(?:-[a-z]+)*\s*:[^\[\]\n|]*\]\]".to_string(),
            r"\{\{\s*DEFAULTSORT\s*:[^{}\n]*\}\}".to_string(),
            r"<!--.*?-->".to_string(),
        ];
        if !stubs.is_empty() {
            items.push(format!(
                r"\{{\{{[^{{}}|\n]*(?i:{})\s*(?:\|[^{{}}\n]*)?\}}\}}",
                stubs.join("|")
            ));
        }
        let pattern = format!(r"^(?:\s*(?:{}))*\s*$", items.join("|"));
        let line = Regex::new(&pattern).context("failed to compile footer pattern")?;
        Ok(Self { line })
    }

    pub fn from_config(config: &BotConfig) -> Result<Self> {
        Self::new(&config.category_namespaces(), &config.stub_suffixes())
    }

    fn is_footer_line(&self, line: &str) -> bool {
        self.line.is_match(line)
    }

    /// Byte offset where the footer starts; leading whitespace of the
    /// trailing run stays with the text above it.
    fn footer_start(&self, text: &str) -> usize {
        let mut start = text.len();
        for line in text.split_inclusive('\n').rev() {
            if !self.is_footer_line(line) {
                break;
            }
            start -= line.len();
        }
        let run = &text[start..];
        start + (run.len() - run.trim_start().len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Heading line including its newline.
    pub heading: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRegions {
    pub header: String,
    pub sections: Vec<Section>,
    pub footer: String,
}

impl ArticleRegions {
    pub fn split(text: &str, rules: &FooterRules) -> Self {
        let footer_start = rules.footer_start(text);
        let body = &text[..footer_start];
        let headings = heading_lines(body);

        let header_end = headings.first().map_or(body.len(), |range| range.start);
        let mut sections = Vec::with_capacity(headings.len());
        for (index, heading) in headings.iter().enumerate() {
            let body_end = headings
                .get(index + 1)
                .map_or(body.len(), |next| next.start);
            sections.push(Section {
                heading: body[heading.clone()].to_string(),
                body: body[heading.end..body_end].to_string(),
            });
        }

        Self {
            header: body[..header_end].to_string(),
            sections,
            footer: text[footer_start..].to_string(),
        }
    }

    pub fn assemble(&self) -> String {
        let mut out = String::with_capacity(
            self.header.len()
                + self.footer.len()
                + self
                    .sections
                    .iter()
                    .map(|section| section.heading.len() + section.body.len())
                    .sum::<usize>(),
        );
        out.push_str(&self.header);
        for section in &self.sections {
            out.push_str(&section.heading);
            out.push_str(&section.body);
        }
        out.push_str(&self.footer);
        out
    }
}

/// Heading lines outside comments, each range covering the line and its
/// newline.
fn heading_lines(text: &str) -> Vec<Range<usize>> {
    let comments = COMMENT_RE
        .find_iter(text)
        .map(|found| found.range())
        .collect::<Vec<_>>();
    HEADING_RE
        .find_iter(text)
        .filter(|found| {
            !comments
                .iter()
                .any(|comment| comment.start <= found.start() && found.start() < comment.end)
        })
        .map(|found| {
            let end = if text.as_bytes().get(found.end()) == Some(&b'\n') {
                found.end() + 1
            } else {
                found.end()
            };
            found.start()..end
        })
        .collect()
}
