use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::mediawiki::{KnowledgeBase, NS_TEMPLATE, RedirectSource};
use crate::pattern::{TitleMatcher, fold_first_letter};
use crate::tag_data::{
    CITATION_TEMPLATE_IDS, LAYOUT_TEMPLATE_IDS, LIVING_PEOPLE_CATEGORY_ID, MULTIPLE_ISSUES_ID,
    TAGS_BY_PRIORITY,
};

const RESOLVE_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateAliasSet {
    pub canonical_title: String,
    /// Redirect titles; the canonical title is not repeated here.
    pub aliases: BTreeSet<String>,
}

impl TemplateAliasSet {
    pub fn new(canonical_title: impl Into<String>) -> Self {
        Self {
            canonical_title: canonical_title.into(),
            aliases: BTreeSet::new(),
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Canonical title followed by every alias.
    pub fn titles(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.canonical_title.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutTemplate {
    pub id: String,
    pub templates: TemplateAliasSet,
}

/// Raw outcome of the two resolution phases for one wiki.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedTemplates {
    pub language: String,
    pub tags: BTreeMap<String, TemplateAliasSet>,
    pub wrapper: Option<TemplateAliasSet>,
    pub layouts: Vec<LayoutTemplate>,
    pub citations: Vec<TemplateAliasSet>,
    pub living_people_category: Option<String>,
}

/// Read-only template knowledge for one run, built once at startup and
/// passed by reference to every component.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    resolved: ResolvedTemplates,
    tag_order: Vec<String>,
    tag_matchers: BTreeMap<String, TitleMatcher>,
    wrapper_matcher: Option<TitleMatcher>,
    layout_matchers: Vec<(String, TitleMatcher)>,
    citation_matcher: Option<TitleMatcher>,
    canonical_by_alias: HashMap<String, String>,
    rank: HashMap<String, usize>,
}

impl TemplateCatalog {
    /// Run both resolution phases. Lookup failures degrade the catalog rather
    /// than failing the run.
    pub fn resolve<K, R>(language: &str, knowledge_base: &mut K, redirects: &mut R) -> Result<Self>
    where
        K: KnowledgeBase + ?Sized,
        R: RedirectSource + ?Sized,
    {
        info!(language, "resolving template titles");
        let titles = resolve_titles_in_batches(language, knowledge_base);

        let mut layout_ids = Vec::new();
        for id in LAYOUT_TEMPLATE_IDS {
            if !layout_ids.contains(id) {
                layout_ids.push(*id);
            }
        }

        let total = TAGS_BY_PRIORITY.len() + layout_ids.len() + CITATION_TEMPLATE_IDS.len() + 1;
        let mut done = 0usize;
        let mut expand = |title: Option<&String>, group: &str| -> Option<TemplateAliasSet> {
            done += 1;
            debug!(done, total, group, "fetching redirects");
            let title = title?;
            let set = TemplateAliasSet::new(title.clone());
            match redirects.list_redirects(title, NS_TEMPLATE) {
                Ok(found) => Some(set.with_aliases(
                    found.into_iter().filter(|alias| alias != title),
                )),
                Err(error) => {
                    warn!(title = %title, error = %error, "could not list redirects; using the canonical title only");
                    Some(set)
                }
            }
        };

        let mut resolved = ResolvedTemplates {
            language: language.to_string(),
            ..ResolvedTemplates::default()
        };
        for (key, id) in TAGS_BY_PRIORITY {
            if let Some(set) = expand(titles.get(*id), "tags") {
                resolved.tags.insert((*key).to_string(), set);
            }
        }
        resolved.wrapper = expand(titles.get(MULTIPLE_ISSUES_ID), "wrapper");
        for id in &layout_ids {
            if let Some(set) = expand(titles.get(*id), "layout") {
                resolved.layouts.push(LayoutTemplate {
                    id: (*id).to_string(),
                    templates: set,
                });
            }
        }
        for id in CITATION_TEMPLATE_IDS {
            if let Some(set) = expand(titles.get(*id), "citations") {
                resolved.citations.push(set);
            }
        }
        resolved.living_people_category = titles.get(LIVING_PEOPLE_CATEGORY_ID).cloned();

        if resolved.living_people_category.is_none() {
            warn!(language, "living people category not found; BLP tagging is disabled");
        }
        if resolved.wrapper.is_none() {
            warn!(language, "multiple issues template not found; banner wrapping is disabled");
        }
        info!(
            tags = resolved.tags.len(),
            layouts = resolved.layouts.len(),
            citations = resolved.citations.len(),
            "template resolution complete"
        );

        Self::from_resolved(resolved)
    }

    pub fn from_resolved(resolved: ResolvedTemplates) -> Result<Self> {
        let mut tag_order = Vec::new();
        let mut tag_matchers = BTreeMap::new();
        let mut canonical_by_alias = HashMap::new();
        let mut rank = HashMap::new();

        for (index, (key, _)) in TAGS_BY_PRIORITY.iter().enumerate() {
            rank.insert((*key).to_string(), index);
            let Some(set) = resolved.tags.get(*key) else {
                continue;
            };
            if let Some(matcher) = TitleMatcher::compile(set.titles())? {
                tag_order.push((*key).to_string());
                tag_matchers.insert((*key).to_string(), matcher);
            }
            for title in set.titles() {
                canonical_by_alias
                    .entry(fold_first_letter(title))
                    .or_insert_with(|| (*key).to_string());
            }
        }

        let wrapper_matcher = match &resolved.wrapper {
            Some(set) => TitleMatcher::compile(set.titles())?,
            None => None,
        };

        let mut layout_matchers = Vec::new();
        for layout in &resolved.layouts {
            if let Some(matcher) = TitleMatcher::compile(layout.templates.titles())? {
                layout_matchers.push((layout.id.clone(), matcher));
            }
        }

        let citation_matcher =
            TitleMatcher::compile(resolved.citations.iter().flat_map(|set| set.titles()))?;

        Ok(Self {
            resolved,
            tag_order,
            tag_matchers,
            wrapper_matcher,
            layout_matchers,
            citation_matcher,
            canonical_by_alias,
            rank,
        })
    }

    pub fn resolved(&self) -> &ResolvedTemplates {
        &self.resolved
    }

    pub fn tag(&self, key: &str) -> Option<&TemplateAliasSet> {
        self.resolved.tags.get(key)
    }

    pub fn tag_matcher(&self, key: &str) -> Option<&TitleMatcher> {
        self.tag_matchers.get(key)
    }

    /// Resolved tag keys in priority order.
    pub fn tag_keys(&self) -> impl Iterator<Item = &str> {
        self.tag_order.iter().map(String::as_str)
    }

    /// Tag key for a template name or any of its redirects.
    pub fn canonical_tag_for(&self, template_name: &str) -> Option<&str> {
        self.canonical_by_alias
            .get(&fold_first_letter(template_name))
            .map(String::as_str)
    }

    /// Position in the master priority table; unranked keys sort last.
    pub fn rank(&self, key: &str) -> usize {
        self.rank.get(key).copied().unwrap_or(TAGS_BY_PRIORITY.len())
    }

    pub fn unranked(&self) -> usize {
        TAGS_BY_PRIORITY.len()
    }

    pub fn wrapper(&self) -> Option<(&TemplateAliasSet, &TitleMatcher)> {
        match (&self.resolved.wrapper, &self.wrapper_matcher) {
            (Some(set), Some(matcher)) => Some((set, matcher)),
            _ => None,
        }
    }

    pub fn layout_matchers(&self) -> &[(String, TitleMatcher)] {
        &self.layout_matchers
    }

    pub fn citation_matcher(&self) -> Option<&TitleMatcher> {
        self.citation_matcher.as_ref()
    }

    pub fn living_people_category(&self) -> Option<&str> {
        self.resolved.living_people_category.as_deref()
    }
}

fn resolve_titles_in_batches<K>(language: &str, knowledge_base: &mut K) -> BTreeMap<String, String>
where
    K: KnowledgeBase + ?Sized,
{
    let mut ids = BTreeSet::new();
    ids.extend(TAGS_BY_PRIORITY.iter().map(|(_, id)| (*id).to_string()));
    ids.extend(CITATION_TEMPLATE_IDS.iter().map(|id| (*id).to_string()));
    ids.extend(LAYOUT_TEMPLATE_IDS.iter().map(|id| (*id).to_string()));
    ids.insert(MULTIPLE_ISSUES_ID.to_string());
    ids.insert(LIVING_PEOPLE_CATEGORY_ID.to_string());
    let ids = ids.into_iter().collect::<Vec<_>>();

    let mut titles = BTreeMap::new();
    for batch in ids.chunks(RESOLVE_BATCH_SIZE) {
        match knowledge_base.resolve_titles(language, batch) {
            Ok(found) => titles.extend(found),
            Err(error) => {
                warn!(
                    language,
                    batch_size = batch.len(),
                    error = %error,
                    "knowledge-base lookup failed; dependent templates are disabled for this run"
                );
            }
        }
    }
    titles
}
