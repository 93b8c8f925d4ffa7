use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::aliases::TemplateCatalog;
use crate::mediawiki::{ArticleInspector, NS_MAIN, PageSnapshot};
use crate::pattern::TitleMatcher;
use crate::wikitext::template_calls;

/// Comments and `<nowiki>` blocks; nothing inside them is rendered.
static INERT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<!--.*?(?:-->|\z)|<nowiki\s*>.*?(?:</nowiki\s*>|\z)")
        .expect("inert block pattern")
});

/// A complete `<ref ...>...</ref>` element. Self-closing re-use refs never
/// match because the opening tag may not end in `/`.
static REF_ELEMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<ref(?:\s[^>]*?[^/\s>])?\s*>.*?</ref\s*>").expect("ref element pattern")
});

/// Any ref tag, self-closing ones first so that they do not open a span.
static REF_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<ref[^>]*/>|<ref(?:\s[^>]*)?>.*?</ref\s*>").expect("ref span pattern")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceCount {
    pub ref_tags: usize,
    pub citation_templates: usize,
}

impl ReferenceCount {
    pub fn total(&self) -> usize {
        self.ref_tags + self.citation_templates
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArticleFacts {
    pub is_biography_of_living_person: bool,
    pub references: ReferenceCount,
    pub internal_link_count: usize,
    pub is_orphan: bool,
    pub visible_category_count: usize,
}

impl ArticleFacts {
    pub fn total_reference_count(&self) -> usize {
        self.references.total()
    }
}

/// Count `<ref>` elements plus citation templates outside any ref span.
pub fn count_references(text: &str, citation_matcher: Option<&TitleMatcher>) -> ReferenceCount {
    let text = INERT_RE.replace_all(text, "");
    let ref_tags = REF_ELEMENT_RE.find_iter(&text).count();
    let citation_templates = match citation_matcher {
        Some(matcher) => {
            let outside = REF_SPAN_RE.replace_all(&text, "");
            template_calls(&outside)
                .iter()
                .filter(|call| matcher.is_match(&call.name))
                .count()
        }
        None => 0,
    };
    ReferenceCount {
        ref_tags,
        citation_templates,
    }
}

/// Exact title comparison ignoring case.
pub fn is_living_people_category(category: &str, living_people: &str) -> bool {
    category.trim().to_lowercase() == living_people.trim().to_lowercase()
}

/// Gather the facts for one article. Read-only against the wiki.
pub fn analyze<I>(
    page: &PageSnapshot,
    catalog: &TemplateCatalog,
    inspector: &mut I,
) -> Result<ArticleFacts>
where
    I: ArticleInspector + ?Sized,
{
    let categories = inspector
        .categories(&page.title)
        .with_context(|| format!("failed to load categories of {}", page.title))?;
    let is_biography_of_living_person = catalog
        .living_people_category()
        .is_some_and(|living| {
            categories
                .iter()
                .any(|category| is_living_people_category(&category.title, living))
        });
    let visible_category_count = categories.iter().filter(|category| !category.hidden).count();

    let references = count_references(&page.text, catalog.citation_matcher());
    let internal_link_count = inspector
        .internal_link_count(&page.title)
        .with_context(|| format!("failed to count links of {}", page.title))?;
    let backlinks = inspector
        .backlink_count(&page.title, NS_MAIN)
        .with_context(|| format!("failed to count backlinks of {}", page.title))?;

    let facts = ArticleFacts {
        is_biography_of_living_person,
        references,
        internal_link_count,
        is_orphan: backlinks == 0,
        visible_category_count,
    };
    debug!(
        title = %page.title,
        blp = facts.is_biography_of_living_person,
        references = facts.total_reference_count(),
        links = facts.internal_link_count,
        backlinks,
        categories = facts.visible_category_count,
        "analyzed article"
    );
    Ok(facts)
}
