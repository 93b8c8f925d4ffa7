use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::tag_data::SummaryMessages;

/// Longest edit summary the wiki accepts, in characters.
pub const SUMMARY_LIMIT: usize = 499;

static PIPED_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[[^\[\]|]*\|([^\[\]]*)\]\]").expect("piped link pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SummaryError {
    #[error("a reason and an override summary cannot be combined")]
    ConflictingOptions,
}

/// Build the edit summary for the given canonical template titles.
pub fn compose_summary(
    added: &[&str],
    removed: &[&str],
    messages: &SummaryMessages,
    reason: Option<&str>,
    summary_override: Option<&str>,
) -> Result<String, SummaryError> {
    if let Some(summary) = summary_override {
        if reason.is_some() {
            return Err(SummaryError::ConflictingOptions);
        }
        return Ok(summary.to_string());
    }

    let mut clauses = Vec::new();
    if !added.is_empty() {
        clauses.push(clause(&messages.adding, added, messages));
    }
    if !removed.is_empty() {
        clauses.push(clause(&messages.removing, removed, messages));
    }
    let mut summary = clauses.join(&messages.separator);
    if let Some(reason) = reason.map(str::trim).filter(|reason| !reason.is_empty()) {
        if summary.is_empty() {
            summary = reason.to_string();
        } else {
            summary = format!("{summary}: {reason}");
        }
    }
    if !summary.is_empty() {
        summary = format!("{}{summary}", messages.bot_prefix);
    }

    if summary.chars().count() > SUMMARY_LIMIT {
        summary = PIPED_LINK_RE.replace_all(&summary, "$1").into_owned();
    }
    Ok(summary)
}

fn clause(verb: &str, titles: &[&str], messages: &SummaryMessages) -> String {
    let noun = if titles.len() == 1 {
        &messages.tag
    } else {
        &messages.tags
    };
    let links = titles
        .iter()
        .map(|title| format!("{{{{[[{}:{title}|{title}]]}}}}", messages.template_ns))
        .collect::<Vec<_>>();
    format!("{verb} {noun} {}", join_series(&links, messages))
}

fn join_series(items: &[String], messages: &SummaryMessages) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{first}{}{second}", messages.and),
        [init @ .., last] => format!(
            "{}{}{last}",
            init.join(&messages.comma_separator),
            messages.and
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag_data::builtin_messages;

    fn english() -> SummaryMessages {
        builtin_messages("en").expect("en messages")
    }

    #[test]
    fn single_addition_uses_singular_noun() {
        let summary = compose_summary(&["Unreferenced"], &[], &english(), None, None)
            .expect("summary");
        assert_eq!(
            summary,
            "Bot: Adding tag {{[[Template:Unreferenced|Unreferenced]]}}"
        );
    }

    #[test]
    fn series_use_and_and_commas() {
        let summary = compose_summary(
            &["Orphan", "Dead end", "Unreferenced"],
            &["One source"],
            &english(),
            None,
            None,
        )
        .expect("summary");
        assert_eq!(
            summary,
            "Bot: Adding tags {{[[Template:Orphan|Orphan]]}}, {{[[Template:Dead end|Dead end]]}} and \
             {{[[Template:Unreferenced|Unreferenced]]}}; Removing tag \
             {{[[Template:One source|One source]]}}"
        );

        let pair = compose_summary(&[], &["Orphan", "Dead end"], &english(), None, None)
            .expect("summary");
        assert_eq!(
            pair,
            "Bot: Removing tags {{[[Template:Orphan|Orphan]]}} and {{[[Template:Dead end|Dead end]]}}"
        );
    }

    #[test]
    fn reason_is_appended() {
        let summary = compose_summary(&["Orphan"], &[], &english(), Some("cleanup drive"), None)
            .expect("summary");
        assert!(summary.ends_with("]]}}: cleanup drive"));
    }

    #[test]
    fn override_is_verbatim_and_excludes_reason() {
        let summary = compose_summary(&["Orphan"], &[], &english(), None, Some("manual"))
            .expect("summary");
        assert_eq!(summary, "manual");
        assert_eq!(
            compose_summary(&["Orphan"], &[], &english(), Some("why"), Some("manual")),
            Err(SummaryError::ConflictingOptions)
        );
    }

    #[test]
    fn long_summaries_drop_link_syntax() {
        let titles = (0..20)
            .map(|index| format!("Very long maintenance template name {index}"))
            .collect::<Vec<_>>();
        let titles = titles.iter().map(String::as_str).collect::<Vec<_>>();
        let summary = compose_summary(&titles, &[], &english(), None, None).expect("summary");
        assert!(!summary.contains("[["));
        assert!(summary.contains("{{Very long maintenance template name 0}}"));
    }

    #[test]
    fn short_summaries_keep_links() {
        let summary = compose_summary(&["Orphan"], &[], &english(), None, None).expect("summary");
        assert!(summary.chars().count() <= SUMMARY_LIMIT);
        assert!(summary.contains("[[Template:Orphan|Orphan]]"));
    }

    #[test]
    fn nothing_to_say_is_empty() {
        assert_eq!(
            compose_summary(&[], &[], &english(), None, None).expect("summary"),
            ""
        );
    }

    #[test]
    fn localized_messages_are_used() {
        let messages = builtin_messages("ckb").expect("ckb messages");
        let summary =
            compose_summary(&["بێ سەرچاوە"], &[], &messages, None, None).expect("summary");
        assert!(summary.starts_with("بۆت: زیادکردنی تاگی {{[[داڕێژە:بێ سەرچاوە|بێ سەرچاوە]]}}"));
    }
}
