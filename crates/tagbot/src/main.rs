use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tagbot_core::aliases::TemplateCatalog;
use tagbot_core::bot::{Choice, Confirm, PagePlan, RunOptions, RunReport, TagBot};
use tagbot_core::config::{BotConfig, load_config, resolve_config_path};
use tagbot_core::mediawiki::{MediaWikiClient, MediaWikiClientConfig, PageSource};
use tagbot_core::regions::FooterRules;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "tagbot",
    version,
    about = "Adds, removes and consolidates maintenance tags on wiki articles"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Treat a set of articles.
    Run(RunArgs),
    /// Print the facts, decisions and summary for one article without editing.
    Inspect(InspectArgs),
    /// Print the resolved template catalog as JSON.
    Catalog,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long, help = "Save without asking for confirmation")]
    always: bool,
    #[arg(long, help = "Compute edits but never save")]
    dry_run: bool,
    #[arg(long, help = "Print the run report as JSON")]
    json: bool,
    #[arg(long, value_name = "TEXT", help = "Reason appended to the edit summary")]
    reason: Option<String>,
    #[arg(long, value_name = "TEXT", help = "Use this edit summary verbatim")]
    summary: Option<String>,
    #[arg(long = "page", value_name = "TITLE")]
    pages: Vec<String>,
    #[arg(long, value_name = "NAME", help = "Treat the articles in a category")]
    category: Option<String>,
    #[arg(long, value_name = "N", help = "Treat the N most recently edited articles")]
    recent_changes: Option<usize>,
    #[arg(long, value_name = "N", help = "Treat the first N articles")]
    all_pages: Option<usize>,
}

impl RunArgs {
    fn has_generator(&self) -> bool {
        !self.pages.is_empty()
            || self.category.is_some()
            || self.recent_changes.is_some()
            || self.all_pages.is_some()
    }
}

#[derive(Debug, Args)]
struct InspectArgs {
    title: String,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let config = load_config(&config_path)?;

    match cli.command {
        Commands::Run(args) => run_bot(&config, args),
        Commands::Inspect(args) => run_inspect(&config, args),
        Commands::Catalog => run_catalog(&config),
    }
}

fn run_bot(config: &BotConfig, args: RunArgs) -> Result<()> {
    if args.reason.is_some() && args.summary.is_some() {
        bail!("--reason and --summary cannot be combined");
    }
    if !args.has_generator() {
        bail!("no pages selected (use --page, --category, --recent-changes or --all-pages)");
    }

    let mut wiki = connect_wiki(config)?;
    if !args.dry_run && !wiki.login_from_env()? {
        warn!("WIKI_BOT_USER / WIKI_BOT_PASS not set; editing anonymously");
    }
    let catalog = resolve_catalog(config, &mut wiki)?;
    let titles = collect_titles(&args, &mut wiki)?;
    info!(pages = titles.len(), "collected pages");

    let bot = TagBot::new(
        &catalog,
        config.tag_definitions(),
        config.summary_messages(),
        FooterRules::from_config(config)?,
        RunOptions {
            always: args.always,
            dry_run: args.dry_run,
            reason: args.reason,
            summary: args.summary,
        },
    )?;
    let report = bot.run(&titles, &mut wiki, &mut StdinConfirm);
    info!(requests = wiki.request_count(), "wiki requests issued");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn run_inspect(config: &BotConfig, args: InspectArgs) -> Result<()> {
    let mut wiki = connect_wiki(config)?;
    let catalog = resolve_catalog(config, &mut wiki)?;
    let bot = TagBot::new(
        &catalog,
        config.tag_definitions(),
        config.summary_messages(),
        FooterRules::from_config(config)?,
        RunOptions::default(),
    )?;
    let plan = bot.inspect(&args.title, &mut wiki)?;
    print_plan(&plan);
    Ok(())
}

fn run_catalog(config: &BotConfig) -> Result<()> {
    let mut wiki = connect_wiki(config)?;
    let catalog = resolve_catalog(config, &mut wiki)?;
    println!("{}", serde_json::to_string_pretty(catalog.resolved())?);
    Ok(())
}

fn connect_wiki(config: &BotConfig) -> Result<MediaWikiClient> {
    MediaWikiClient::new(MediaWikiClientConfig::for_wiki(config))
}

fn resolve_catalog(config: &BotConfig, wiki: &mut MediaWikiClient) -> Result<TemplateCatalog> {
    let mut knowledge_base =
        MediaWikiClient::new(MediaWikiClientConfig::for_knowledge_base(config))?;
    let language = config.language();
    info!(language = %language, "resolving template aliases");
    let catalog = TemplateCatalog::resolve(&language, &mut knowledge_base, wiki)
        .context("failed to resolve the template catalog")?;
    let tags = catalog.tag_keys().collect::<Vec<_>>().join(", ");
    info!(tags = %tags, "resolved maintenance templates");
    Ok(catalog)
}

fn collect_titles<S: PageSource>(args: &RunArgs, source: &mut S) -> Result<Vec<String>> {
    let mut titles = args.pages.clone();
    if let Some(category) = &args.category {
        titles.extend(source.category_members(category)?);
    }
    if let Some(limit) = args.recent_changes {
        titles.extend(source.recent_changes(limit)?);
    }
    if let Some(limit) = args.all_pages {
        titles.extend(source.all_pages(limit)?);
    }
    let mut seen = BTreeSet::new();
    titles.retain(|title| seen.insert(title.clone()));
    Ok(titles)
}

fn print_report(report: &RunReport) {
    println!("tagbot run");
    println!("dry_run: {}", format_flag(report.dry_run));
    println!("treated: {}", report.treated);
    println!("saved: {}", report.saved);
    println!("unchanged: {}", report.unchanged);
    println!("skipped: {}", report.skipped);
    println!("declined: {}", report.declined);
    println!("failed: {}", report.failed);
    if report.stopped_early {
        println!("stopped_early: yes");
    }
    if !report.pages.is_empty() {
        println!("pages:");
        for page in &report.pages {
            match &page.detail {
                Some(detail) => println!("  - {}: {} ({detail})", page.title, page.action.as_str()),
                None => println!("  - {}: {}", page.title, page.action.as_str()),
            }
        }
    }
}

fn print_plan(plan: &PagePlan) {
    let facts = &plan.facts;
    println!("title: {}", plan.title);
    println!("living_person: {}", format_flag(facts.is_biography_of_living_person));
    println!("ref_tags: {}", facts.references.ref_tags);
    println!("citation_templates: {}", facts.references.citation_templates);
    println!("internal_links: {}", facts.internal_link_count);
    println!("orphan: {}", format_flag(facts.is_orphan));
    println!("visible_categories: {}", facts.visible_category_count);
    println!("decisions:");
    for decision in &plan.decisions.decisions {
        println!(
            "  - {}: {:?} (present: {}, status: {:?})",
            decision.tag,
            decision.action,
            format_flag(decision.has_tag),
            decision.status
        );
    }
    println!("would_edit: {}", format_flag(plan.new_text.is_some()));
    println!(
        "summary: {}",
        if plan.summary.is_empty() { "<none>" } else { plan.summary.as_str() }
    );
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, title: &str, diff: &str, summary: &str) -> Result<Choice> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        println!("\n>>> {title} <<<");
        println!("{diff}");
        println!("summary: {summary}");
        loop {
            print!("Save this edit? [y]es, [n]o, [a]ll, [q]uit: ");
            stdout.flush().context("failed to flush stdout")?;
            let mut answer = String::new();
            if stdin.lock().read_line(&mut answer)? == 0 {
                return Ok(Choice::Quit);
            }
            match answer.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(Choice::Yes),
                "n" | "no" => return Ok(Choice::No),
                "a" | "all" => return Ok(Choice::All),
                "q" | "quit" => return Ok(Choice::Quit),
                _ => continue,
            }
        }
    }
}
