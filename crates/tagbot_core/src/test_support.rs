use crate::aliases::{LayoutTemplate, ResolvedTemplates, TemplateAliasSet, TemplateCatalog};
use crate::decision::{DecisionSet, TagAction, TagDecision, TagStatus};
use crate::regions::FooterRules;
use crate::tag_data::{DATE_PARAMS, MaintenanceTag};

pub(crate) fn sample_resolved() -> ResolvedTemplates {
    let mut resolved = ResolvedTemplates {
        language: "en".to_string(),
        ..ResolvedTemplates::default()
    };
    let tags = [
        ("unreferenced", TemplateAliasSet::new("Unreferenced").with_aliases(["Unsourced"])),
        ("one_source", TemplateAliasSet::new("One source")),
        ("blp_unreferenced", TemplateAliasSet::new("BLP unreferenced")),
        ("deadend", TemplateAliasSet::new("Dead end").with_aliases(["Deadend", "Dead-end"])),
        ("orphan", TemplateAliasSet::new("Orphan").with_aliases(["Lonely"])),
        ("uncategorized", TemplateAliasSet::new("Uncategorized").with_aliases(["Uncat"])),
        ("cleanup", TemplateAliasSet::new("Cleanup")),
        ("notability", TemplateAliasSet::new("Notability")),
    ];
    for (key, set) in tags {
        resolved.tags.insert(key.to_string(), set);
    }
    resolved.wrapper = Some(TemplateAliasSet::new("Multiple issues").with_aliases(["MI"]));
    for (id, title) in [
        ("Q52083446", "Short description"),
        ("Q5766677", "About"),
        ("Q6466220", "Pp"),
    ] {
        resolved.layouts.push(LayoutTemplate {
            id: id.to_string(),
            templates: TemplateAliasSet::new(title),
        });
    }
    resolved
        .citations
        .push(TemplateAliasSet::new("Cite web").with_aliases(["Cite-web"]));
    resolved.living_people_category = Some("Living people".to_string());
    resolved
}

pub(crate) fn sample_catalog() -> TemplateCatalog {
    TemplateCatalog::from_resolved(sample_resolved()).expect("sample catalog")
}

pub(crate) fn catalog_without_wrapper() -> TemplateCatalog {
    let mut resolved = sample_resolved();
    resolved.wrapper = None;
    TemplateCatalog::from_resolved(resolved).expect("catalog without wrapper")
}

pub(crate) fn footer_rules() -> FooterRules {
    FooterRules::new(&["Category".to_string()], &["stub".to_string()]).expect("footer rules")
}

/// Decision set with dated additions and plain removals.
pub(crate) fn decisions(add: &[MaintenanceTag], remove: &[MaintenanceTag]) -> DecisionSet {
    let decisions = MaintenanceTag::ALL
        .into_iter()
        .map(|tag| {
            let action = if add.contains(&tag) {
                TagAction::Add
            } else if remove.contains(&tag) {
                TagAction::Remove
            } else {
                TagAction::None
            };
            TagDecision {
                tag,
                status: TagStatus::Evaluated,
                has_tag: action == TagAction::Remove,
                action,
                params: DATE_PARAMS.to_string(),
            }
        })
        .collect();
    DecisionSet { decisions }
}

