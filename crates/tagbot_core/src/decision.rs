use serde::Serialize;
use tracing::{debug, warn};

use crate::aliases::TemplateCatalog;
use crate::analyzer::ArticleFacts;
use crate::config::TagDefinitions;
use crate::tag_data::{MaintenanceTag, TagDefinition};
use crate::wikitext::{TemplateCall, template_calls};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagAction {
    Add,
    Remove,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagStatus {
    Evaluated,
    ConfigMissing,
    TemplateNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagDecision {
    pub tag: MaintenanceTag,
    pub status: TagStatus,
    pub has_tag: bool,
    pub action: TagAction,
    /// Markup appended after the template name when the tag is added.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub params: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecisionSet {
    pub decisions: Vec<TagDecision>,
}

impl DecisionSet {
    pub fn is_noop(&self) -> bool {
        self.decisions
            .iter()
            .all(|decision| decision.action == TagAction::None)
    }

    /// Tags to add, in evaluation order.
    pub fn added(&self) -> Vec<MaintenanceTag> {
        self.with_action(TagAction::Add)
    }

    pub fn removed(&self) -> Vec<MaintenanceTag> {
        self.with_action(TagAction::Remove)
    }

    pub fn additions(&self) -> impl Iterator<Item = &TagDecision> {
        self.decisions
            .iter()
            .filter(|decision| decision.action == TagAction::Add)
    }

    fn with_action(&self, action: TagAction) -> Vec<MaintenanceTag> {
        self.decisions
            .iter()
            .filter(|decision| decision.action == action)
            .map(|decision| decision.tag)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredicateOutcome {
    pub should_add: bool,
    pub should_remove: bool,
}

/// Whether the article's facts call for the tag at all.
pub fn tag_applies(tag: MaintenanceTag, facts: &ArticleFacts) -> bool {
    let references = facts.total_reference_count();
    let blp = facts.is_biography_of_living_person;
    match tag {
        MaintenanceTag::Unreferenced => references == 0 && !blp,
        MaintenanceTag::BlpUnreferenced => references == 0 && blp,
        MaintenanceTag::OneSource => references == 1 && !blp,
        MaintenanceTag::BlpOneSource => references == 1 && blp,
        MaintenanceTag::Deadend => facts.internal_link_count == 0,
        MaintenanceTag::Orphan => facts.is_orphan,
        MaintenanceTag::Uncategorized => facts.visible_category_count == 0,
    }
}

pub fn evaluate(tag: MaintenanceTag, has_tag: bool, facts: &ArticleFacts) -> PredicateOutcome {
    let applies = tag_applies(tag, facts);
    PredicateOutcome {
        should_add: !has_tag && applies,
        should_remove: has_tag && !applies,
    }
}

pub fn choose_action(outcome: PredicateOutcome, definition: &TagDefinition) -> TagAction {
    if outcome.should_add && definition.addable {
        TagAction::Add
    } else if outcome.should_remove && definition.removable {
        TagAction::Remove
    } else {
        TagAction::None
    }
}

/// Classify every decidable tag for one article. Makes no text edits.
pub fn decide(
    text: &str,
    facts: &ArticleFacts,
    catalog: &TemplateCatalog,
    definitions: &TagDefinitions,
) -> DecisionSet {
    let calls = template_calls(text);
    let mut decisions = Vec::with_capacity(MaintenanceTag::ALL.len());

    for tag in MaintenanceTag::ALL {
        let Some(definition) = definitions.resolve(tag) else {
            warn!(tag = %tag, "no usable configuration; skipping tag");
            decisions.push(skipped(tag, TagStatus::ConfigMissing));
            continue;
        };
        let Some(matcher) = catalog.tag_matcher(tag.as_str()) else {
            debug!(tag = %tag, "template not found on this wiki; skipping tag");
            decisions.push(skipped(tag, TagStatus::TemplateNotFound));
            continue;
        };

        let has_tag = calls
            .iter()
            .any(|call: &TemplateCall| matcher.is_match(&call.name));
        let outcome = evaluate(tag, has_tag, facts);
        let action = choose_action(outcome, &definition);
        debug!(
            tag = %tag,
            has_tag,
            should_add = outcome.should_add,
            should_remove = outcome.should_remove,
            action = ?action,
            "tag decision"
        );
        decisions.push(TagDecision {
            tag,
            status: TagStatus::Evaluated,
            has_tag,
            action,
            params: definition.params,
        });
    }

    DecisionSet { decisions }
}

fn skipped(tag: MaintenanceTag, status: TagStatus) -> TagDecision {
    TagDecision {
        tag,
        status,
        has_tag: false,
        action: TagAction::None,
        params: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::analyzer::ReferenceCount;
    use crate::config::TagOverride;
    use crate::tag_data::default_tag_definitions;
    use crate::test_support::sample_catalog;

    fn action_for(decisions: &DecisionSet, tag: MaintenanceTag) -> TagAction {
        decisions
            .decisions
            .iter()
            .find(|decision| decision.tag == tag)
            .map_or(TagAction::None, |decision| decision.action)
    }

    fn facts(references: usize, blp: bool) -> ArticleFacts {
        ArticleFacts {
            is_biography_of_living_person: blp,
            references: ReferenceCount {
                ref_tags: references,
                citation_templates: 0,
            },
            internal_link_count: 5,
            is_orphan: false,
            visible_category_count: 2,
        }
    }

    #[test]
    fn unreferenced_and_blp_variants_are_exclusive() {
        for blp in [false, true] {
            let facts = facts(0, blp);
            assert_eq!(tag_applies(MaintenanceTag::Unreferenced, &facts), !blp);
            assert_eq!(tag_applies(MaintenanceTag::BlpUnreferenced, &facts), blp);
            assert!(!tag_applies(MaintenanceTag::OneSource, &facts));
        }
        let single = facts(1, false);
        assert!(tag_applies(MaintenanceTag::OneSource, &single));
        assert!(!tag_applies(MaintenanceTag::Unreferenced, &single));
    }

    #[test]
    fn predicate_never_adds_present_or_removes_absent_tags() {
        let facts = facts(0, false);
        let present = evaluate(MaintenanceTag::Unreferenced, true, &facts);
        assert!(!present.should_add && !present.should_remove);
        let absent = evaluate(MaintenanceTag::Deadend, false, &facts);
        assert!(!absent.should_add && !absent.should_remove);
        let stale = evaluate(MaintenanceTag::Deadend, true, &facts);
        assert!(stale.should_remove);
    }

    #[test]
    fn unaddable_tags_are_never_added() {
        let definition = TagDefinition {
            addable: false,
            removable: true,
            params: String::new(),
        };
        let outcome = PredicateOutcome {
            should_add: true,
            should_remove: false,
        };
        assert_eq!(choose_action(outcome, &definition), TagAction::None);
    }

    #[test]
    fn unreferenced_article_gets_a_single_addition() {
        let catalog = sample_catalog();
        let decisions = decide(
            "Plain text.",
            &facts(0, false),
            &catalog,
            &TagDefinitions::builtin(),
        );
        assert_eq!(decisions.added(), vec![MaintenanceTag::Unreferenced]);
        assert!(decisions.removed().is_empty());
        assert!(!decisions.is_noop());
    }

    #[test]
    fn stale_deadend_is_removed_and_orphan_kept() {
        let catalog = sample_catalog();
        let mut facts = facts(2, false);
        facts.internal_link_count = 3;
        facts.is_orphan = true;
        let decisions = decide(
            "{{Orphan|date=May 2020}}\n{{dead end}}\nText",
            &facts,
            &catalog,
            &TagDefinitions::builtin(),
        );
        assert_eq!(action_for(&decisions, MaintenanceTag::Deadend), TagAction::Remove);
        assert_eq!(action_for(&decisions, MaintenanceTag::Orphan), TagAction::None);
        assert!(decisions.added().is_empty());
    }

    #[test]
    fn redirect_spelling_counts_as_present() {
        let catalog = sample_catalog();
        let mut facts = facts(2, false);
        facts.is_orphan = true;
        let decisions = decide("{{Lonely}}\nText", &facts, &catalog, &TagDefinitions::builtin());
        assert_eq!(action_for(&decisions, MaintenanceTag::Orphan), TagAction::None);
    }

    #[test]
    fn missing_config_and_templates_are_reported() {
        let catalog = sample_catalog();
        let mut defaults = default_tag_definitions();
        defaults.remove(&MaintenanceTag::Unreferenced);
        let definitions = TagDefinitions::new(defaults, BTreeMap::<String, TagOverride>::new());
        let decisions = decide("Text", &facts(0, false), &catalog, &definitions);

        let status = |tag| {
            decisions
                .decisions
                .iter()
                .find(|decision| decision.tag == tag)
                .map(|decision| decision.status)
        };
        assert_eq!(status(MaintenanceTag::Unreferenced), Some(TagStatus::ConfigMissing));
        assert_eq!(status(MaintenanceTag::BlpOneSource), Some(TagStatus::TemplateNotFound));
        assert!(decisions.is_noop());
    }
}
