use std::collections::BTreeSet;

use anyhow::{Context, Result};
use regex::Regex;

/// Regex fragment matching `title` with a case-insensitive first letter.
pub fn first_letter_pattern(title: &str) -> String {
    let mut chars = title.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let rest = regex::escape(chars.as_str());
    let upper = first.to_uppercase().collect::<String>();
    let lower = first.to_lowercase().collect::<String>();
    if upper == lower {
        let mut buffer = [0u8; 4];
        return format!("{}{rest}", regex::escape(first.encode_utf8(&mut buffer)));
    }
    format!(
        "(?:{}|{}){rest}",
        regex::escape(&upper),
        regex::escape(&lower)
    )
}

/// Alternation of every title, longest first so that a title never shadows a
/// longer one sharing its prefix.
pub fn alternation<'a, I>(titles: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let unique = titles
        .into_iter()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .collect::<BTreeSet<_>>();
    if unique.is_empty() {
        return None;
    }
    let mut ordered = unique.into_iter().collect::<Vec<_>>();
    ordered.sort_by(|left, right| right.len().cmp(&left.len()).then(left.cmp(right)));
    Some(
        ordered
            .into_iter()
            .map(first_letter_pattern)
            .collect::<Vec<_>>()
            .join("|"),
    )
}

/// Key under which two spellings differing only in first-letter case collide.
pub fn fold_first_letter(title: &str) -> String {
    let trimmed = title.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Matches whole template names against a fixed set of titles.
#[derive(Debug, Clone)]
pub struct TitleMatcher {
    regex: Regex,
}

impl TitleMatcher {
    /// `Ok(None)` when the title set is empty.
    pub fn compile<'a, I>(titles: I) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let Some(alternation) = alternation(titles) else {
            return Ok(None);
        };
        let regex = Regex::new(&format!("^(?:{alternation})$"))
            .context("failed to compile title matcher")?;
        Ok(Some(Self { regex }))
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name.trim())
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}
