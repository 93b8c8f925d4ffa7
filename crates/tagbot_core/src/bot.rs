use anyhow::{Context, Result};
use serde::Serialize;
use similar::TextDiff;
use tracing::{error, info, warn};

use crate::aliases::TemplateCatalog;
use crate::analyzer::{ArticleFacts, analyze};
use crate::config::TagDefinitions;
use crate::decision::{DecisionSet, decide};
use crate::mediawiki::{ArticleInspector, NS_MAIN, PageSnapshot, PageStore, SaveError, SaveOutcome};
use crate::regions::FooterRules;
use crate::rewrite::rewrite_article;
use crate::summary::{SummaryError, compose_summary};
use crate::tag_data::{MaintenanceTag, SummaryMessages};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Save without asking.
    pub always: bool,
    pub dry_run: bool,
    pub reason: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Yes,
    No,
    All,
    Quit,
}

pub trait Confirm {
    fn confirm(&mut self, title: &str, diff: &str, summary: &str) -> Result<Choice>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageAction {
    Saved,
    Unchanged,
    NoOp,
    DryRun,
    Skipped,
    Declined,
    Failed,
}

impl PageAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Saved => "saved",
            Self::Unchanged => "unchanged",
            Self::NoOp => "no_op",
            Self::DryRun => "dry_run",
            Self::Skipped => "skipped",
            Self::Declined => "declined",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageOutcome {
    pub title: String,
    pub action: PageAction,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<MaintenanceTag>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<MaintenanceTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl PageOutcome {
    fn new(title: &str, action: PageAction) -> Self {
        Self {
            title: title.to_string(),
            action,
            added: Vec::new(),
            removed: Vec::new(),
            detail: None,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub treated: usize,
    pub saved: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub declined: usize,
    pub failed: usize,
    pub dry_run: bool,
    pub stopped_early: bool,
    pub pages: Vec<PageOutcome>,
}

impl RunReport {
    fn record(&mut self, outcome: PageOutcome) {
        match outcome.action {
            PageAction::Saved => self.saved += 1,
            PageAction::Unchanged | PageAction::NoOp => self.unchanged += 1,
            PageAction::Skipped => self.skipped += 1,
            PageAction::Declined => self.declined += 1,
            PageAction::Failed => self.failed += 1,
            PageAction::DryRun => {}
        }
        if outcome.action != PageAction::Skipped {
            self.treated += 1;
        }
        self.pages.push(outcome);
    }
}

/// Everything computed for one article before any write.
#[derive(Debug, Clone, Serialize)]
pub struct PagePlan {
    pub title: String,
    pub facts: ArticleFacts,
    pub decisions: DecisionSet,
    pub summary: String,
    #[serde(skip)]
    pub new_text: Option<String>,
}

pub struct TagBot<'a> {
    catalog: &'a TemplateCatalog,
    definitions: TagDefinitions,
    messages: SummaryMessages,
    rules: FooterRules,
    options: RunOptions,
}

impl<'a> TagBot<'a> {
    /// Rejects a reason combined with an override summary before any page
    /// is touched.
    pub fn new(
        catalog: &'a TemplateCatalog,
        definitions: TagDefinitions,
        messages: SummaryMessages,
        rules: FooterRules,
        options: RunOptions,
    ) -> Result<Self, SummaryError> {
        if options.reason.is_some() && options.summary.is_some() {
            return Err(SummaryError::ConflictingOptions);
        }
        Ok(Self {
            catalog,
            definitions,
            messages,
            rules,
            options,
        })
    }

    pub fn plan<W>(&self, page: &PageSnapshot, wiki: &mut W) -> Result<PagePlan>
    where
        W: ArticleInspector + ?Sized,
    {
        let facts = analyze(page, self.catalog, wiki)?;
        let decisions = decide(&page.text, &facts, self.catalog, &self.definitions);
        let new_text = rewrite_article(&page.text, &decisions, self.catalog, &self.rules);
        let summary = self.summary_for(&decisions)?;
        Ok(PagePlan {
            title: page.title.clone(),
            facts,
            decisions,
            summary,
            new_text,
        })
    }

    /// Fetch and plan one page without checking eligibility.
    pub fn inspect<W>(&self, title: &str, wiki: &mut W) -> Result<PagePlan>
    where
        W: PageStore + ArticleInspector + ?Sized,
    {
        let page = wiki
            .fetch_page(title)?
            .with_context(|| format!("page does not exist: {title}"))?;
        self.plan(&page, wiki)
    }

    pub fn run<W, C>(&self, titles: &[String], wiki: &mut W, confirm: &mut C) -> RunReport
    where
        W: PageStore + ArticleInspector + ?Sized,
        C: Confirm + ?Sized,
    {
        let mut report = RunReport {
            dry_run: self.options.dry_run,
            ..RunReport::default()
        };
        let mut always = self.options.always;

        for title in titles {
            let outcome = match self.process_page(title, wiki, confirm, &mut always) {
                Ok(Step::Continue(outcome)) => outcome,
                Ok(Step::Stop(outcome)) => {
                    report.record(outcome);
                    report.stopped_early = true;
                    info!("run stopped by operator");
                    break;
                }
                Err(error) => {
                    error!(title = %title, error = %format!("{error:#}"), "failed to process page");
                    PageOutcome::new(title, PageAction::Failed).with_detail(format!("{error:#}"))
                }
            };
            report.record(outcome);
        }

        info!(
            treated = report.treated,
            saved = report.saved,
            failed = report.failed,
            "run finished"
        );
        report
    }

    fn process_page<W, C>(
        &self,
        title: &str,
        wiki: &mut W,
        confirm: &mut C,
        always: &mut bool,
    ) -> Result<Step>
    where
        W: PageStore + ArticleInspector + ?Sized,
        C: Confirm + ?Sized,
    {
        let Some(page) = wiki.fetch_page(title)? else {
            return Ok(Step::Continue(skip(title, "page does not exist")));
        };
        if page.namespace != NS_MAIN {
            return Ok(Step::Continue(skip(title, "not in the article namespace")));
        }
        if page.is_redirect {
            return Ok(Step::Continue(skip(title, "redirect")));
        }
        if wiki.is_disambiguation(title)? {
            return Ok(Step::Continue(skip(title, "disambiguation page")));
        }

        let plan = self.plan(&page, wiki)?;
        let mut outcome = PageOutcome::new(title, PageAction::NoOp);
        outcome.added = plan.decisions.added();
        outcome.removed = plan.decisions.removed();

        let Some(new_text) = plan.new_text.as_deref() else {
            info!(title, "no tag changes");
            return Ok(Step::Continue(outcome));
        };
        if new_text == page.text {
            outcome.action = PageAction::Unchanged;
            return Ok(Step::Continue(outcome));
        }
        if self.options.dry_run {
            info!(title, summary = %plan.summary, "would save");
            outcome.action = PageAction::DryRun;
            outcome.detail = Some(plan.summary);
            return Ok(Step::Continue(outcome));
        }

        if !*always {
            let diff = render_diff(&page.text, new_text, title);
            match confirm.confirm(title, &diff, &plan.summary)? {
                Choice::Yes => {}
                Choice::All => *always = true,
                Choice::No => {
                    outcome.action = PageAction::Declined;
                    return Ok(Step::Continue(outcome));
                }
                Choice::Quit => {
                    outcome.action = PageAction::Declined;
                    return Ok(Step::Stop(outcome));
                }
            }
        }

        match wiki.save(&page, new_text, &plan.summary) {
            Ok(SaveOutcome::Saved { revision_id }) => {
                info!(title, revision_id = ?revision_id, summary = %plan.summary, "saved");
                outcome.action = PageAction::Saved;
            }
            Ok(SaveOutcome::Unchanged) => {
                outcome.action = PageAction::Unchanged;
            }
            Err(error @ (SaveError::EditConflict | SaveError::SpamBlacklisted(_))) => {
                warn!(title, error = %error, "save rejected");
                outcome.action = PageAction::Failed;
                outcome.detail = Some(error.to_string());
            }
            Err(SaveError::Other(error)) => {
                return Err(error).with_context(|| format!("failed to save {title}"));
            }
        }
        Ok(Step::Continue(outcome))
    }

    fn summary_for(&self, decisions: &DecisionSet) -> Result<String, SummaryError> {
        let titles = |tags: Vec<MaintenanceTag>| {
            tags.into_iter()
                .filter_map(|tag| self.catalog.tag(tag.as_str()))
                .map(|set| set.canonical_title.as_str())
                .collect::<Vec<_>>()
        };
        compose_summary(
            &titles(decisions.added()),
            &titles(decisions.removed()),
            &self.messages,
            self.options.reason.as_deref(),
            self.options.summary.as_deref(),
        )
    }
}

enum Step {
    Continue(PageOutcome),
    Stop(PageOutcome),
}

fn skip(title: &str, reason: &str) -> PageOutcome {
    info!(title, reason, "skipping page");
    PageOutcome::new(title, PageAction::Skipped).with_detail(reason)
}

/// Unified line diff between the stored and the rewritten text.
pub fn render_diff(old: &str, new: &str, title: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(2)
        .header(&format!("{title} (current)"), &format!("{title} (proposed)"))
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use anyhow::bail;

    use super::*;
    use crate::mediawiki::CategoryInfo;
    use crate::tag_data::builtin_messages;
    use crate::test_support::{footer_rules, sample_catalog};

    #[derive(Default)]
    struct MockWiki {
        pages: BTreeMap<String, PageSnapshot>,
        backlinks: BTreeMap<String, usize>,
        links: BTreeMap<String, usize>,
        disambiguation: Vec<String>,
        broken: Vec<String>,
        conflict: Vec<String>,
        saves: Vec<(String, String, String)>,
    }

    impl MockWiki {
        fn with_page(mut self, title: &str, text: &str) -> Self {
            self.pages
                .insert(title.to_string(), PageSnapshot::new(title, text));
            self
        }
    }

    impl PageStore for MockWiki {
        fn fetch_page(&mut self, title: &str) -> Result<Option<PageSnapshot>> {
            if self.broken.iter().any(|item| item == title) {
                bail!("backend failure for {title}");
            }
            Ok(self.pages.get(title).cloned())
        }

        fn save(
            &mut self,
            page: &PageSnapshot,
            new_text: &str,
            summary: &str,
        ) -> Result<SaveOutcome, SaveError> {
            if page.text == new_text {
                return Ok(SaveOutcome::Unchanged);
            }
            if self.conflict.iter().any(|item| item == &page.title) {
                return Err(SaveError::EditConflict);
            }
            self.saves
                .push((page.title.clone(), new_text.to_string(), summary.to_string()));
            if let Some(stored) = self.pages.get_mut(&page.title) {
                stored.text = new_text.to_string();
            }
            Ok(SaveOutcome::Saved {
                revision_id: Some(self.saves.len() as i64),
            })
        }
    }

    impl ArticleInspector for MockWiki {
        fn categories(&mut self, _title: &str) -> Result<Vec<CategoryInfo>> {
            Ok(vec![CategoryInfo {
                title: "Bars".to_string(),
                hidden: false,
            }])
        }

        fn backlink_count(&mut self, title: &str, _namespace: i32) -> Result<usize> {
            Ok(self.backlinks.get(title).copied().unwrap_or(0))
        }

        fn internal_link_count(&mut self, title: &str) -> Result<usize> {
            Ok(self.links.get(title).copied().unwrap_or(0))
        }

        fn is_disambiguation(&mut self, title: &str) -> Result<bool> {
            Ok(self.disambiguation.iter().any(|item| item == title))
        }
    }

    struct Scripted(Vec<Choice>);

    impl Confirm for Scripted {
        fn confirm(&mut self, _title: &str, diff: &str, _summary: &str) -> Result<Choice> {
            assert!(diff.contains("+{{"));
            Ok(if self.0.is_empty() {
                Choice::No
            } else {
                self.0.remove(0)
            })
        }
    }

    fn bot(catalog: &TemplateCatalog, options: RunOptions) -> TagBot<'_> {
        TagBot::new(
            catalog,
            TagDefinitions::builtin(),
            builtin_messages("en").expect("en"),
            footer_rules(),
            options,
        )
        .expect("bot")
    }

    fn always() -> RunOptions {
        RunOptions {
            always: true,
            ..RunOptions::default()
        }
    }

    fn titles(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn reason_and_summary_together_are_rejected() {
        let catalog = sample_catalog();
        let result = TagBot::new(
            &catalog,
            TagDefinitions::builtin(),
            builtin_messages("en").expect("en"),
            footer_rules(),
            RunOptions {
                reason: Some("why".to_string()),
                summary: Some("what".to_string()),
                ..RunOptions::default()
            },
        );
        assert!(matches!(result, Err(SummaryError::ConflictingOptions)));
    }

    #[test]
    fn unreferenced_article_is_tagged_and_saved() {
        let catalog = sample_catalog();
        let mut wiki = MockWiki::default().with_page("Foo", "'''Foo''' is a bar.\n");
        wiki.backlinks.insert("Foo".to_string(), 4);
        wiki.links.insert("Foo".to_string(), 2);

        let report = bot(&catalog, always()).run(&titles(&["Foo"]), &mut wiki, &mut Scripted(vec![]));
        assert_eq!(report.saved, 1);
        assert_eq!(report.pages[0].added, vec![MaintenanceTag::Unreferenced]);
        let (_, text, summary) = &wiki.saves[0];
        assert_eq!(text, "{{Unreferenced|{{subst:DATE}}}}\n'''Foo''' is a bar.\n");
        assert_eq!(
            summary,
            "Bot: Adding tag {{[[Template:Unreferenced|Unreferenced]]}}"
        );
    }

    #[test]
    fn second_run_changes_nothing() {
        let catalog = sample_catalog();
        let mut wiki = MockWiki::default().with_page("Foo", "Text.\n");
        let bot = bot(&catalog, always());

        let first = bot.run(&titles(&["Foo"]), &mut wiki, &mut Scripted(vec![]));
        assert_eq!(first.saved, 1);
        let second = bot.run(&titles(&["Foo"]), &mut wiki, &mut Scripted(vec![]));
        assert_eq!(second.saved, 0);
        assert_eq!(second.pages[0].action, PageAction::NoOp);
        assert_eq!(wiki.saves.len(), 1);
    }

    #[test]
    fn ineligible_pages_are_skipped() {
        let catalog = sample_catalog();
        let mut wiki = MockWiki::default()
            .with_page("Redirect", "#REDIRECT [[Foo]]")
            .with_page("Foo (disambiguation)", "Foo may refer to:");
        if let Some(page) = wiki.pages.get_mut("Redirect") {
            page.is_redirect = true;
        }
        wiki.disambiguation.push("Foo (disambiguation)".to_string());

        let report = bot(&catalog, always()).run(
            &titles(&["Redirect", "Foo (disambiguation)", "Missing"]),
            &mut wiki,
            &mut Scripted(vec![]),
        );
        assert_eq!(report.skipped, 3);
        assert_eq!(report.treated, 0);
        assert!(wiki.saves.is_empty());
    }

    #[test]
    fn one_failing_page_does_not_stop_the_batch() {
        let catalog = sample_catalog();
        let mut wiki = MockWiki::default()
            .with_page("Conflicted", "Text.")
            .with_page("Fine", "Text.");
        wiki.broken.push("Broken".to_string());
        wiki.conflict.push("Conflicted".to_string());

        let report = bot(&catalog, always()).run(
            &titles(&["Broken", "Conflicted", "Fine"]),
            &mut wiki,
            &mut Scripted(vec![]),
        );
        assert_eq!(report.failed, 2);
        assert_eq!(report.saved, 1);
        assert_eq!(report.pages[1].detail.as_deref(), Some("edit conflict"));
        assert_eq!(wiki.saves[0].0, "Fine");
    }

    #[test]
    fn confirmation_choices_drive_the_run() {
        let catalog = sample_catalog();
        let mut wiki = MockWiki::default()
            .with_page("A", "Text.")
            .with_page("B", "Text.")
            .with_page("C", "Text.")
            .with_page("D", "Text.");
        let mut confirm = Scripted(vec![Choice::No, Choice::All]);

        let report = bot(&catalog, RunOptions::default()).run(
            &titles(&["A", "B", "C"]),
            &mut wiki,
            &mut confirm,
        );
        assert_eq!(report.declined, 1);
        assert_eq!(report.saved, 2);

        let mut quit = Scripted(vec![Choice::Quit]);
        let report =
            bot(&catalog, RunOptions::default()).run(&titles(&["D", "A"]), &mut wiki, &mut quit);
        assert!(report.stopped_early);
        assert_eq!(report.pages.len(), 1);
    }

    #[test]
    fn dry_run_never_saves() {
        let catalog = sample_catalog();
        let mut wiki = MockWiki::default().with_page("Foo", "Text.");
        let report = bot(
            &catalog,
            RunOptions {
                dry_run: true,
                ..RunOptions::default()
            },
        )
        .run(&titles(&["Foo"]), &mut wiki, &mut Scripted(vec![]));
        assert_eq!(report.pages[0].action, PageAction::DryRun);
        assert!(report.dry_run);
        assert!(wiki.saves.is_empty());
    }

    #[test]
    fn diff_shows_added_lines() {
        let diff = render_diff("Text.\n", "{{Orphan}}\nText.\n", "Foo");
        assert!(diff.contains("--- Foo (current)"));
        assert!(diff.contains("+{{Orphan}}"));
    }
}
