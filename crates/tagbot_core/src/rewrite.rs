use std::collections::HashMap;
use std::ops::Range;

use thiserror::Error;
use tracing::{debug, warn};

use crate::aliases::TemplateCatalog;
use crate::decision::DecisionSet;
use crate::pattern::TitleMatcher;
use crate::regions::{ArticleRegions, FooterRules};
use crate::tag_data::is_footer_tag;
use crate::wikitext::{
    TemplateCall, named_parameter, parameter_spans, remove_spans, template_calls, template_name,
    top_level_calls,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SortError {
    #[error("cannot read the template name of banner {0:?}")]
    UnreadableBanner(String),
}

/// One maintenance banner call as it will be emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub text: String,
    /// Tag key resolved through the alias table, if the template is known.
    pub key: Option<String>,
    /// Non-template wrapper content that followed this banner.
    pub notes: Vec<String>,
}

impl Banner {
    pub fn from_text(text: impl Into<String>, catalog: &TemplateCatalog) -> Self {
        let text = text.into();
        let key = catalog
            .canonical_tag_for(&template_name(&text))
            .map(str::to_string);
        Self {
            text,
            key,
            notes: Vec::new(),
        }
    }
}

/// Fragments of a wrapper call around its banner list.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ExistingWrapper {
    opening: String,
    closing: String,
    /// Content slot text before the first banner.
    leading: Vec<String>,
    /// Banner calls with the slot text following each one.
    banners: Vec<(String, Vec<String>)>,
}

/// Rewrite the article for the given decisions. `None` is the NO-OP outcome.
pub fn rewrite_article(
    text: &str,
    decisions: &DecisionSet,
    catalog: &TemplateCatalog,
    rules: &FooterRules,
) -> Option<String> {
    if decisions.is_noop() {
        return None;
    }

    let stripped = strip_removed_tags(text, decisions, catalog);
    let mut regions = ArticleRegions::split(&stripped, rules);
    let mut header = regions.header.clone();

    let mut existing = None;
    if let Some((_, wrapper_matcher)) = catalog.wrapper()
        && let Some((wrapper, span)) = take_wrapper(&header, wrapper_matcher)
    {
        header = remove_spans(&header, &[span]);
        existing = Some(wrapper);
    }

    let (standalone, rest) = take_standalone_banners(&header, catalog);
    header = rest;

    let mut candidates = existing
        .as_ref()
        .map(|wrapper| wrapper.banners.clone())
        .unwrap_or_default()
        .into_iter()
        .chain(standalone.into_iter().map(|banner| (banner, Vec::new())))
        .map(|(text, notes)| Banner {
            notes,
            ..Banner::from_text(text, catalog)
        })
        .collect::<Vec<_>>();
    candidates = dedup_banners(candidates);

    for decision in decisions.additions() {
        let key = decision.tag.as_str();
        let Some(set) = catalog.tag(key) else {
            continue;
        };
        let call = format!("{{{{{}{}}}}}", set.canonical_title, decision.params);
        if is_footer_tag(key) {
            regions.footer.push('\n');
            regions.footer.push_str(&call);
            continue;
        }
        if candidates.iter().any(|banner| banner.key.as_deref() == Some(key)) {
            continue;
        }
        candidates.push(Banner {
            text: call,
            key: Some(key.to_string()),
            notes: Vec::new(),
        });
    }

    let (layouts, rest) = take_layout_templates(&header, catalog.layout_matchers());
    header = rest;

    let banners = match sort_banners(&candidates, catalog) {
        Ok(sorted) => sorted,
        Err(error) => {
            warn!(error = %error, "could not sort banners; keeping their current order");
            candidates
        }
    };
    debug!(
        banners = banners.len(),
        layouts = layouts.len(),
        rewrapped = existing.is_some(),
        "rebuilt banner block"
    );

    let mut new_header = String::new();
    for layout in &layouts {
        new_header.push_str(layout);
        new_header.push('\n');
    }
    new_header.push_str(&banner_block(&banners, existing.as_ref(), catalog));
    new_header.push_str(header.trim_start_matches('\n'));
    regions.header = new_header;

    Some(regions.assemble())
}

/// Remove every occurrence of each REMOVE-marked tag, nested ones included.
fn strip_removed_tags(text: &str, decisions: &DecisionSet, catalog: &TemplateCatalog) -> String {
    let matchers = decisions
        .removed()
        .into_iter()
        .filter_map(|tag| catalog.tag_matcher(tag.as_str()))
        .collect::<Vec<_>>();
    if matchers.is_empty() {
        return text.to_string();
    }
    let spans = template_calls(text)
        .iter()
        .filter(|call| matchers.iter().any(|matcher| matcher.is_match(&call.name)))
        .map(|call| call.span_with_newline(text))
        .collect::<Vec<_>>();
    remove_spans(text, &spans)
}

fn take_wrapper(header: &str, matcher: &TitleMatcher) -> Option<(ExistingWrapper, Range<usize>)> {
    top_level_calls(header)
        .into_iter()
        .filter(|call| matcher.is_match(&call.name))
        .find_map(|call| {
            let wrapper = parse_wrapper(header, &call)?;
            Some((wrapper, call.span_with_newline(header)))
        })
}

/// Split a wrapper call into opening, banner list and closing. `None` when the
/// call has no content slot.
fn parse_wrapper(source: &str, call: &TemplateCall) -> Option<ExistingWrapper> {
    let slot = parameter_spans(source, call)
        .into_iter()
        .find_map(|span| match named_parameter(&source[span.clone()]) {
            Some((name, value)) if name == "1" => Some(span.end - value.len()..span.end),
            Some((name, _)) if !name.contains("{{") => None,
            _ => Some(span),
        })?;

    let content = &source[slot.clone()];
    let start = slot.start + (content.len() - content.trim_start().len());
    let end = (slot.start + content.trim_end().len()).max(start);
    let inner = &source[start..end];

    let mut leading = Vec::new();
    let mut banners: Vec<(String, Vec<String>)> = Vec::new();
    let mut cursor = 0;
    for banner in top_level_calls(inner) {
        push_note(&inner[cursor..banner.start], &mut leading, &mut banners);
        banners.push((banner.text(inner).to_string(), Vec::new()));
        cursor = banner.end;
    }
    push_note(&inner[cursor..], &mut leading, &mut banners);

    Some(ExistingWrapper {
        opening: source[call.start..start].to_string(),
        closing: source[end..call.end].to_string(),
        leading,
        banners,
    })
}

/// Attach slot text between calls to the banner before it.
fn push_note(gap: &str, leading: &mut Vec<String>, banners: &mut [(String, Vec<String>)]) {
    let note = gap.trim();
    if note.is_empty() {
        return;
    }
    match banners.last_mut() {
        Some((_, notes)) => notes.push(note.to_string()),
        None => leading.push(note.to_string()),
    }
}

/// Extract standalone maintenance banners, leaving footer-placed tags alone.
fn take_standalone_banners(header: &str, catalog: &TemplateCatalog) -> (Vec<String>, String) {
    let mut banners = Vec::new();
    let mut spans = Vec::new();
    for call in top_level_calls(header) {
        let Some(key) = catalog.canonical_tag_for(&call.name) else {
            continue;
        };
        if is_footer_tag(key) {
            continue;
        }
        banners.push(call.text(header).to_string());
        spans.push(call.span_with_newline(header));
    }
    (banners, remove_spans(header, &spans))
}

/// Extract layout templates in layout priority order, then text order.
fn take_layout_templates(
    header: &str,
    matchers: &[(String, TitleMatcher)],
) -> (Vec<String>, String) {
    let mut found = Vec::new();
    for call in top_level_calls(header) {
        if let Some(priority) = matchers
            .iter()
            .position(|(_, matcher)| matcher.is_match(&call.name))
        {
            found.push((priority, call));
        }
    }
    found.sort_by_key(|(priority, _)| *priority);

    let spans = found
        .iter()
        .map(|(_, call)| call.span_with_newline(header))
        .collect::<Vec<_>>();
    let layouts = found
        .iter()
        .map(|(_, call)| call.text(header).to_string())
        .collect();
    (layouts, remove_spans(header, &spans))
}

/// Keep the first banner of each tag identity. Unknown templates are compared
/// by their text. Notes of a dropped duplicate move to the kept banner.
pub fn dedup_banners(banners: Vec<Banner>) -> Vec<Banner> {
    let mut kept: Vec<Banner> = Vec::with_capacity(banners.len());
    let mut index = HashMap::new();
    for banner in banners {
        let identity = match &banner.key {
            Some(key) => (true, key.clone()),
            None => (false, banner.text.trim().to_string()),
        };
        match index.get(&identity) {
            Some(&position) => {
                let first: &mut Banner = &mut kept[position];
                first.notes.extend(banner.notes);
            }
            None => {
                index.insert(identity, kept.len());
                kept.push(banner);
            }
        }
    }
    kept
}

/// Stable sort by priority rank; unknown templates go last in their
/// original order.
pub fn sort_banners(banners: &[Banner], catalog: &TemplateCatalog) -> Result<Vec<Banner>, SortError> {
    let mut ranked = Vec::with_capacity(banners.len());
    for banner in banners {
        if template_name(&banner.text).is_empty() {
            return Err(SortError::UnreadableBanner(banner.text.clone()));
        }
        let rank = banner
            .key
            .as_deref()
            .map_or(catalog.unranked(), |key| catalog.rank(key));
        ranked.push((rank, banner.clone()));
    }
    ranked.sort_by_key(|(rank, _)| *rank);
    Ok(ranked.into_iter().map(|(_, banner)| banner).collect())
}

fn banner_block(
    banners: &[Banner],
    existing: Option<&ExistingWrapper>,
    catalog: &TemplateCatalog,
) -> String {
    let mut inner = existing
        .map(|wrapper| wrapper.leading.iter().map(String::as_str).collect::<Vec<_>>())
        .unwrap_or_default();
    for banner in banners {
        inner.push(banner.text.as_str());
        inner.extend(banner.notes.iter().map(String::as_str));
    }
    match (banners.len(), catalog.wrapper()) {
        (0, _) if inner.is_empty() => String::new(),
        (0 | 1, _) => format!("{}\n", inner.join("\n")),
        (_, Some((wrapper, _))) => match existing {
            Some(existing) => format!(
                "{}{}\n{}\n",
                existing.opening,
                inner.join("\n"),
                existing.closing.trim_start()
            ),
            None => format!(
                "{{{{{}|\n{}\n}}}}\n",
                wrapper.canonical_title,
                inner.join("\n")
            ),
        },
        (_, None) => {
            let mut flat = inner.join("\n");
            flat.push('\n');
            flat
        }
    }
}
