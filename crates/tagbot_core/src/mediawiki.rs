use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::BotConfig;

pub const NS_MAIN: i32 = 0;
pub const NS_TEMPLATE: i32 = 10;
pub const NS_CATEGORY: i32 = 14;

const TITLE_BATCH_SIZE: usize = 50;

/// An `error` object returned by the MediaWiki action API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("MediaWiki API error [{code}]: {info}")]
pub struct ApiError {
    pub code: String,
    pub info: String,
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("edit conflict")]
    EditConflict,
    #[error("blocked by the spam blacklist: {0}")]
    SpamBlacklisted(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SaveError {
    /// Classify a failed edit request by its API error code.
    pub fn from_api(error: anyhow::Error) -> Self {
        match error.downcast_ref::<ApiError>() {
            Some(api) if api.code == "editconflict" => Self::EditConflict,
            Some(api) if api.code == "spamblacklist" => Self::SpamBlacklisted(api.info.clone()),
            _ => Self::Other(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SaveOutcome {
    Saved { revision_id: Option<i64> },
    Unchanged,
}

/// Latest revision of a page as fetched for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    pub title: String,
    pub namespace: i32,
    pub text: String,
    /// Base revision timestamp, sent back on save for conflict detection.
    pub timestamp: Option<String>,
    pub is_redirect: bool,
}

impl PageSnapshot {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            namespace: NS_MAIN,
            text: text.into(),
            timestamp: None,
            is_redirect: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryInfo {
    /// Title without the namespace prefix.
    pub title: String,
    pub hidden: bool,
}

pub trait PageStore {
    /// `Ok(None)` when the page does not exist.
    fn fetch_page(&mut self, title: &str) -> Result<Option<PageSnapshot>>;
    /// Identical text is reported as [`SaveOutcome::Unchanged`] without a write.
    fn save(
        &mut self,
        page: &PageSnapshot,
        new_text: &str,
        summary: &str,
    ) -> Result<SaveOutcome, SaveError>;
}

pub trait ArticleInspector {
    fn categories(&mut self, title: &str) -> Result<Vec<CategoryInfo>>;
    /// Non-redirect pages in `namespace` linking to `title`.
    fn backlink_count(&mut self, title: &str, namespace: i32) -> Result<usize>;
    /// Outgoing links to the article namespace.
    fn internal_link_count(&mut self, title: &str) -> Result<usize>;
    fn is_disambiguation(&mut self, title: &str) -> Result<bool>;
}

pub trait RedirectSource {
    /// Titles (without namespace prefix) redirecting to `title` in `namespace`.
    fn list_redirects(&mut self, title: &str, namespace: i32) -> Result<Vec<String>>;
}

pub trait PageSource {
    fn category_members(&mut self, category: &str) -> Result<Vec<String>>;
    fn recent_changes(&mut self, limit: usize) -> Result<Vec<String>>;
    fn all_pages(&mut self, limit: usize) -> Result<Vec<String>>;
}

pub trait KnowledgeBase {
    /// Local titles keyed by global id; ids without a sitelink are absent.
    fn resolve_titles(&mut self, language: &str, ids: &[String]) -> Result<BTreeMap<String, String>>;
}

#[derive(Debug, Clone)]
pub struct MediaWikiClientConfig {
    pub api_url: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub rate_limit_read_ms: u64,
    pub rate_limit_write_ms: u64,
    pub max_retries: usize,
    pub max_write_retries: usize,
    pub retry_delay_ms: u64,
}

impl MediaWikiClientConfig {
    /// Client settings for the wiki being tagged.
    pub fn for_wiki(config: &BotConfig) -> Self {
        Self::with_env_tuning(config.api_url(), config.user_agent())
    }

    /// Client settings for the knowledge base (Wikidata) endpoint.
    pub fn for_knowledge_base(config: &BotConfig) -> Self {
        Self::with_env_tuning(config.knowledge_base_api_url(), config.user_agent())
    }

    fn with_env_tuning(api_url: String, user_agent: String) -> Self {
        Self {
            api_url,
            user_agent,
            timeout_ms: env_value_u64("WIKI_HTTP_TIMEOUT_MS", 30_000),
            rate_limit_read_ms: env_value_u64("WIKI_RATE_LIMIT_READ", 300),
            rate_limit_write_ms: env_value_u64("WIKI_RATE_LIMIT_WRITE", 1_000),
            max_retries: env_value_usize("WIKI_HTTP_RETRIES", 2),
            max_write_retries: env_value_usize("WIKI_HTTP_WRITE_RETRIES", 1),
            retry_delay_ms: env_value_u64("WIKI_HTTP_RETRY_DELAY_MS", 500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

pub struct MediaWikiClient {
    client: Client,
    config: MediaWikiClientConfig,
    last_request_at: Option<Instant>,
    request_count: usize,
    csrf_token: Option<String>,
}

impl MediaWikiClient {
    pub fn new(config: MediaWikiClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .cookie_store(true)
            .build()
            .context("failed to build MediaWiki HTTP client")?;

        Ok(Self {
            client,
            config,
            last_request_at: None,
            request_count: 0,
            csrf_token: None,
        })
    }

    pub fn request_count(&self) -> usize {
        self.request_count
    }

    /// Log in with bot-password credentials when both env variables are set.
    pub fn login_from_env(&mut self) -> Result<bool> {
        let (Ok(username), Ok(password)) = (env::var("WIKI_BOT_USER"), env::var("WIKI_BOT_PASS"))
        else {
            return Ok(false);
        };
        if username.trim().is_empty() || password.is_empty() {
            return Ok(false);
        }
        self.login(username.trim(), &password)?;
        Ok(true)
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let login_token = self.fetch_token("login")?;
        let login_response = self.call(
            Access::Write,
            &[
                ("action", "login".to_string()),
                ("lgname", username.to_string()),
                ("lgpassword", password.to_string()),
                ("lgtoken", login_token),
            ],
        )?;
        let login_payload: LoginResponse =
            serde_json::from_value(login_response).context("failed to decode login response")?;
        match login_payload.login.result.as_deref() {
            Some("Success") => {
                self.csrf_token = None;
                Ok(())
            }
            other => bail!(
                "MediaWiki login failed: {}",
                login_payload
                    .login
                    .reason
                    .or_else(|| other.map(ToString::to_string))
                    .unwrap_or_else(|| "unknown error".to_string())
            ),
        }
    }

    /// One API round trip. Reads go out as GET, writes as POST; both are
    /// throttled and retried on transient failures.
    fn call(&mut self, access: Access, params: &[(&str, String)]) -> Result<Value> {
        let pairs = request_pairs(params);
        let retries = match access {
            Access::Read => self.config.max_retries,
            Access::Write => self.config.max_write_retries,
        };
        let mut attempt = 0;
        loop {
            self.throttle(access);
            let request = match access {
                Access::Read => self.client.get(&self.config.api_url).query(&pairs),
                Access::Write => self.client.post(&self.config.api_url).form(&pairs),
            };
            let sent = request.header(USER_AGENT, &self.config.user_agent).send();
            let transient = match &sent {
                Ok(response) => is_retryable_status(response.status()),
                Err(error) => error.is_timeout() || error.is_connect(),
            };
            if transient && attempt < retries {
                attempt += 1;
                let delay = self.config.retry_delay_ms << (attempt - 1).min(6);
                debug!(attempt, delay_ms = delay, "retrying MediaWiki request");
                sleep(Duration::from_millis(delay));
                continue;
            }
            let response = sent
                .context("failed to call MediaWiki API")?
                .error_for_status()
                .context("MediaWiki API request failed")?;
            let payload: Value = response
                .json()
                .context("failed to decode MediaWiki API JSON response")?;
            return check_api_error(payload);
        }
    }

    /// Follow `continue` tokens until exhausted or `limit` items were seen.
    fn query_all<F>(
        &mut self,
        params: Vec<(&str, String)>,
        limit: Option<usize>,
        mut collect: F,
    ) -> Result<()>
    where
        F: FnMut(QueryPayload) -> usize,
    {
        let mut seen = 0usize;
        let mut continuation: Option<BTreeMap<String, Value>> = None;
        loop {
            let mut request = params
                .iter()
                .map(|(key, value)| (*key, value.clone()))
                .collect::<Vec<(&str, String)>>();
            if let Some(tokens) = &continuation {
                for (key, value) in tokens {
                    let value = match value {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    };
                    request.push((key.as_str(), value));
                }
            }

            let response = self.call(Access::Read, &request)?;
            let parsed: QueryResponse =
                serde_json::from_value(response).context("failed to decode query API response")?;
            seen += collect(parsed.query);
            if limit.is_some_and(|limit| seen >= limit) {
                break;
            }
            continuation = parsed.continuation;
            if continuation.is_none() {
                break;
            }
        }
        Ok(())
    }

    fn throttle(&mut self, access: Access) {
        let gap = Duration::from_millis(match access {
            Access::Read => self.config.rate_limit_read_ms,
            Access::Write => self.config.rate_limit_write_ms,
        });
        if let Some(wait) = self
            .last_request_at
            .and_then(|last| gap.checked_sub(last.elapsed()))
        {
            sleep(wait);
        }
        self.last_request_at = Some(Instant::now());
        self.request_count += 1;
    }

    /// `meta=tokens` lookup for `login` or `csrf`.
    fn fetch_token(&mut self, kind: &str) -> Result<String> {
        let response = self.call(
            Access::Read,
            &[
                ("action", "query".to_string()),
                ("meta", "tokens".to_string()),
                ("type", kind.to_string()),
            ],
        )?;
        response["query"]["tokens"][format!("{kind}token")]
            .as_str()
            .map(str::to_string)
            .with_context(|| format!("MediaWiki returned no {kind} token"))
    }

    fn submit_edit(&mut self, page: &PageSnapshot, new_text: &str, summary: &str) -> Result<SaveOutcome> {
        let token = match self.csrf_token.clone() {
            Some(token) => token,
            None => {
                let token = self.fetch_token("csrf")?;
                self.csrf_token = Some(token.clone());
                token
            }
        };
        let response = self.call(
            Access::Write,
            &[
                ("action", "edit".to_string()),
                ("title", page.title.clone()),
                ("text", new_text.to_string()),
                ("summary", summary.to_string()),
                ("basetimestamp", page.timestamp.clone().unwrap_or_default()),
                ("nocreate", "1".to_string()),
                ("bot", "1".to_string()),
                ("token", token),
            ],
        )?;
        let payload: EditResponse =
            serde_json::from_value(response).context("failed to decode edit response")?;
        edit_outcome(payload)
    }
}

impl PageStore for MediaWikiClient {
    fn fetch_page(&mut self, title: &str) -> Result<Option<PageSnapshot>> {
        let response = self.call(Access::Read, &[
            ("action", "query".to_string()),
            ("titles", title.to_string()),
            ("prop", "revisions|info".to_string()),
            ("rvprop", "content|timestamp".to_string()),
            ("rvslots", "main".to_string()),
        ])?;
        let parsed: QueryResponse = serde_json::from_value(response)
            .context("failed to decode page content API response")?;
        Ok(parsed.query.pages.into_iter().next().and_then(page_snapshot))
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
        self.submit_edit(page, new_text, summary)
            .map_err(SaveError::from_api)
    }
}

impl ArticleInspector for MediaWikiClient {
    fn categories(&mut self, title: &str) -> Result<Vec<CategoryInfo>> {
        let mut categories = Vec::new();
        self.query_all(
            vec![
                ("action", "query".to_string()),
                ("titles", title.to_string()),
                ("prop", "categories".to_string()),
                ("clprop", "hidden".to_string()),
                ("cllimit", "max".to_string()),
            ],
            None,
            |query| {
                let before = categories.len();
                for page in query.pages {
                    categories.extend(page.categories.into_iter().map(|category| CategoryInfo {
                        title: strip_namespace(&category.title, NS_CATEGORY).to_string(),
                        hidden: category.hidden,
                    }));
                }
                categories.len() - before
            },
        )?;
        Ok(categories)
    }

    fn backlink_count(&mut self, title: &str, namespace: i32) -> Result<usize> {
        let mut count = 0usize;
        self.query_all(
            vec![
                ("action", "query".to_string()),
                ("list", "backlinks".to_string()),
                ("bltitle", title.to_string()),
                ("blnamespace", namespace.to_string()),
                ("blfilterredir", "nonredirects".to_string()),
                ("bllimit", "max".to_string()),
            ],
            None,
            |query| {
                count += query.backlinks.len();
                query.backlinks.len()
            },
        )?;
        Ok(count)
    }

    fn internal_link_count(&mut self, title: &str) -> Result<usize> {
        let mut count = 0usize;
        self.query_all(
            vec![
                ("action", "query".to_string()),
                ("titles", title.to_string()),
                ("prop", "links".to_string()),
                ("plnamespace", NS_MAIN.to_string()),
                ("pllimit", "max".to_string()),
            ],
            None,
            |query| {
                let links = query.pages.iter().map(|page| page.links.len()).sum::<usize>();
                count += links;
                links
            },
        )?;
        Ok(count)
    }

    fn is_disambiguation(&mut self, title: &str) -> Result<bool> {
        let response = self.call(Access::Read, &[
            ("action", "query".to_string()),
            ("titles", title.to_string()),
            ("prop", "pageprops".to_string()),
            ("ppprop", "disambiguation".to_string()),
        ])?;
        let parsed: QueryResponse =
            serde_json::from_value(response).context("failed to decode pageprops response")?;
        Ok(parsed.query.pages.iter().any(|page| {
            page.pageprops
                .as_ref()
                .is_some_and(|props| props.contains_key("disambiguation"))
        }))
    }
}

impl RedirectSource for MediaWikiClient {
    fn list_redirects(&mut self, title: &str, namespace: i32) -> Result<Vec<String>> {
        let mut redirects = BTreeSet::new();
        self.query_all(
            vec![
                ("action", "query".to_string()),
                ("titles", prefixed_title(title, namespace)),
                ("prop", "redirects".to_string()),
                ("rdnamespace", namespace.to_string()),
                ("rdlimit", "max".to_string()),
            ],
            None,
            |query| {
                let mut found = 0usize;
                for page in query.pages {
                    for redirect in page.redirects {
                        redirects.insert(strip_namespace(&redirect.title, namespace).to_string());
                        found += 1;
                    }
                }
                found
            },
        )?;
        debug!(title, redirects = redirects.len(), "listed redirects");
        Ok(redirects.into_iter().collect())
    }
}

impl PageSource for MediaWikiClient {
    fn category_members(&mut self, category: &str) -> Result<Vec<String>> {
        let mut titles = Vec::new();
        self.query_all(
            vec![
                ("action", "query".to_string()),
                ("list", "categorymembers".to_string()),
                ("cmtitle", prefixed_title(category, NS_CATEGORY)),
                ("cmnamespace", NS_MAIN.to_string()),
                ("cmtype", "page".to_string()),
                ("cmlimit", "max".to_string()),
            ],
            None,
            |query| {
                let found = query.categorymembers.len();
                titles.extend(query.categorymembers.into_iter().map(|item| item.title));
                found
            },
        )?;
        Ok(titles)
    }

    fn recent_changes(&mut self, limit: usize) -> Result<Vec<String>> {
        let mut titles = Vec::new();
        let mut seen = BTreeSet::new();
        self.query_all(
            vec![
                ("action", "query".to_string()),
                ("list", "recentchanges".to_string()),
                ("rcnamespace", NS_MAIN.to_string()),
                ("rcprop", "title".to_string()),
                ("rctype", "edit|new".to_string()),
                ("rcshow", "!bot|!redirect".to_string()),
                ("rclimit", limit.clamp(1, 500).to_string()),
            ],
            Some(limit),
            |query| {
                let before = titles.len();
                for item in query.recentchanges {
                    if titles.len() < limit && seen.insert(item.title.clone()) {
                        titles.push(item.title);
                    }
                }
                titles.len() - before
            },
        )?;
        Ok(titles)
    }

    fn all_pages(&mut self, limit: usize) -> Result<Vec<String>> {
        let mut titles = Vec::new();
        self.query_all(
            vec![
                ("action", "query".to_string()),
                ("list", "allpages".to_string()),
                ("apnamespace", NS_MAIN.to_string()),
                ("apfilterredir", "nonredirects".to_string()),
                ("aplimit", limit.clamp(1, 500).to_string()),
            ],
            Some(limit),
            |query| {
                let before = titles.len();
                for item in query.allpages {
                    if titles.len() < limit {
                        titles.push(item.title);
                    }
                }
                titles.len() - before
            },
        )?;
        Ok(titles)
    }
}

impl KnowledgeBase for MediaWikiClient {
    fn resolve_titles(&mut self, language: &str, ids: &[String]) -> Result<BTreeMap<String, String>> {
        let site = format!("{}wiki", language.replace('-', "_"));
        let mut titles = BTreeMap::new();
        for batch in ids.chunks(TITLE_BATCH_SIZE) {
            let response = self.call(Access::Read, &[
                ("action", "wbgetentities".to_string()),
                ("ids", batch.join("|")),
                ("props", "sitelinks".to_string()),
                ("sitefilter", site.clone()),
            ])?;
            let parsed: EntitiesResponse = serde_json::from_value(response)
                .context("failed to decode wbgetentities response")?;
            titles.extend(sitelink_titles(parsed, &site));
        }
        Ok(titles)
    }
}

fn request_pairs(params: &[(&str, String)]) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(params.len() + 2);
    pairs.push(("format".to_string(), "json".to_string()));
    pairs.push(("formatversion".to_string(), "2".to_string()));
    for (key, value) in params {
        if !value.is_empty() {
            pairs.push(((*key).to_string(), value.clone()));
        }
    }
    pairs
}

fn check_api_error(payload: Value) -> Result<Value> {
    if let Some(error) = payload.get("error") {
        let code = error
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error");
        let info = error
            .get("info")
            .and_then(Value::as_str)
            .unwrap_or("unknown info");
        return Err(ApiError {
            code: code.to_string(),
            info: info.to_string(),
        }
        .into());
    }
    Ok(payload)
}

fn edit_outcome(payload: EditResponse) -> Result<SaveOutcome> {
    let edit = payload
        .edit
        .ok_or_else(|| anyhow::anyhow!("missing edit payload in API response"))?;
    if let Some(matches) = edit.spamblacklist {
        return Err(ApiError {
            code: "spamblacklist".to_string(),
            info: matches,
        }
        .into());
    }
    if edit.result.as_deref() != Some("Success") {
        bail!(
            "MediaWiki edit failed: {}",
            edit.result.unwrap_or_else(|| "unknown".to_string())
        );
    }
    if edit.nochange {
        return Ok(SaveOutcome::Unchanged);
    }
    Ok(SaveOutcome::Saved {
        revision_id: edit.newrevid,
    })
}

fn page_snapshot(page: PageQueryItem) -> Option<PageSnapshot> {
    if page.missing || page.invalid {
        return None;
    }
    let revision = page.revisions.into_iter().next()?;
    let text = revision.slots?.main?.content;
    Some(PageSnapshot {
        title: page.title,
        namespace: page.ns,
        text,
        timestamp: Some(revision.timestamp),
        is_redirect: page.redirect,
    })
}

fn sitelink_titles(response: EntitiesResponse, site: &str) -> BTreeMap<String, String> {
    response
        .entities
        .into_iter()
        .filter_map(|(id, entity)| {
            let title = entity.sitelinks.get(site)?.title.as_str();
            let title = [NS_TEMPLATE, NS_CATEGORY]
                .into_iter()
                .fold(title, |title, namespace| strip_namespace(title, namespace));
            Some((id, title.to_string()))
        })
        .collect()
}

/// Canonical and local names of the namespaces the bot addresses by prefix.
fn namespace_names(namespace: i32) -> &'static [&'static str] {
    match namespace {
        NS_TEMPLATE => &["Template", "داڕێژە"],
        NS_CATEGORY => &["Category", "پۆل"],
        _ => &[],
    }
}

fn is_namespace_prefix(prefix: &str, namespace: i32) -> bool {
    let prefix = prefix.trim().replace('_', " ");
    namespace_names(namespace)
        .iter()
        .any(|name| name.eq_ignore_ascii_case(&prefix))
}

/// Title text after a prefix naming `namespace`. Any other colon belongs to
/// the title.
pub fn strip_namespace(title: &str, namespace: i32) -> &str {
    let title = title.trim();
    match title.split_once(':') {
        Some((prefix, rest)) if is_namespace_prefix(prefix, namespace) => rest.trim(),
        _ => title,
    }
}

fn prefixed_title(title: &str, namespace: i32) -> String {
    let Some(canonical) = namespace_names(namespace).first() else {
        return title.to_string();
    };
    match title.split_once(':') {
        Some((prefix, _)) if is_namespace_prefix(prefix, namespace) => title.to_string(),
        _ => format!("{canonical}:{title}"),
    }
}

fn env_value_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_value_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

#[derive(Debug, Deserialize, Default)]
struct QueryResponse {
    #[serde(default)]
    query: QueryPayload,
    #[serde(default, rename = "continue")]
    continuation: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Deserialize, Default)]
struct QueryPayload {
    #[serde(default)]
    allpages: Vec<TitleQueryItem>,
    #[serde(default)]
    categorymembers: Vec<TitleQueryItem>,
    #[serde(default)]
    recentchanges: Vec<TitleQueryItem>,
    #[serde(default)]
    backlinks: Vec<TitleQueryItem>,
    #[serde(default)]
    pages: Vec<PageQueryItem>,
}

#[derive(Debug, Deserialize)]
struct TitleQueryItem {
    title: String,
}

#[derive(Debug, Deserialize)]
struct PageQueryItem {
    #[serde(default)]
    ns: i32,
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    redirect: bool,
    #[serde(default)]
    revisions: Vec<RevisionQueryItem>,
    #[serde(default)]
    categories: Vec<CategoryQueryItem>,
    #[serde(default)]
    links: Vec<TitleQueryItem>,
    #[serde(default)]
    redirects: Vec<TitleQueryItem>,
    pageprops: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RevisionQueryItem {
    timestamp: String,
    slots: Option<RevisionSlotContainer>,
}

#[derive(Debug, Deserialize)]
struct RevisionSlotContainer {
    main: Option<RevisionMainSlot>,
}

#[derive(Debug, Deserialize)]
struct RevisionMainSlot {
    content: String,
}

#[derive(Debug, Deserialize)]
struct CategoryQueryItem {
    title: String,
    #[serde(default)]
    hidden: bool,
}

#[derive(Debug, Deserialize, Default)]
struct LoginResponse {
    #[serde(default)]
    login: LoginPayload,
}

#[derive(Debug, Deserialize, Default)]
struct LoginPayload {
    result: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct EditResponse {
    edit: Option<EditPayload>,
}

#[derive(Debug, Deserialize, Default)]
struct EditPayload {
    result: Option<String>,
    #[serde(default)]
    nochange: bool,
    newrevid: Option<i64>,
    spamblacklist: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct EntitiesResponse {
    #[serde(default)]
    entities: BTreeMap<String, EntityPayload>,
}

#[derive(Debug, Deserialize, Default)]
struct EntityPayload {
    #[serde(default)]
    sitelinks: BTreeMap<String, SitelinkPayload>,
}

#[derive(Debug, Deserialize)]
struct SitelinkPayload {
    title: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn api_errors_keep_their_code() {
        let error = check_api_error(json!({"error": {"code": "editconflict", "info": "Edit conflict."}}))
            .expect_err("must fail");
        let api = error.downcast_ref::<ApiError>().expect("typed error");
        assert_eq!(api.code, "editconflict");
        assert!(error.to_string().contains("[editconflict]"));
    }

    #[test]
    fn save_errors_are_classified_by_code() {
        let conflict = anyhow::Error::new(ApiError {
            code: "editconflict".to_string(),
            info: "Edit conflict.".to_string(),
        });
        assert!(matches!(SaveError::from_api(conflict), SaveError::EditConflict));

        let spam = anyhow::Error::new(ApiError {
            code: "spamblacklist".to_string(),
            info: "example.com".to_string(),
        });
        match SaveError::from_api(spam) {
            SaveError::SpamBlacklisted(detail) => assert_eq!(detail, "example.com"),
            other => panic!("unexpected {other:?}"),
        }

        let other = anyhow::anyhow!("network down");
        assert!(matches!(SaveError::from_api(other), SaveError::Other(_)));
    }

    #[test]
    fn edit_payload_maps_to_outcomes() {
        let saved: EditResponse =
            serde_json::from_value(json!({"edit": {"result": "Success", "newrevid": 42}}))
                .expect("decode");
        assert_eq!(
            edit_outcome(saved).expect("outcome"),
            SaveOutcome::Saved {
                revision_id: Some(42)
            }
        );

        let unchanged: EditResponse =
            serde_json::from_value(json!({"edit": {"result": "Success", "nochange": true}}))
                .expect("decode");
        assert_eq!(edit_outcome(unchanged).expect("outcome"), SaveOutcome::Unchanged);

        let blocked: EditResponse = serde_json::from_value(
            json!({"edit": {"result": "Failure", "spamblacklist": "spam.example"}}),
        )
        .expect("decode");
        let error = edit_outcome(blocked).expect_err("must fail");
        assert!(matches!(
            SaveError::from_api(error),
            SaveError::SpamBlacklisted(_)
        ));
    }

    #[test]
    fn sitelinks_resolve_to_unprefixed_titles() {
        let response: EntitiesResponse = serde_json::from_value(json!({
            "entities": {
                "Q5962027": {"sitelinks": {"ckbwiki": {"site": "ckbwiki", "title": "داڕێژە:بێ سەرچاوە"}}},
                "Q5312304": {"sitelinks": {"ckbwiki": {"site": "ckbwiki", "title": "پۆل:زیندووان"}}},
                "Q404": {"id": "Q404", "missing": ""},
                "Q1": {"sitelinks": {}}
            }
        }))
        .expect("decode");
        let titles = sitelink_titles(response, "ckbwiki");
        assert_eq!(titles.len(), 2);
        assert_eq!(titles["Q5962027"], "بێ سەرچاوە");
        assert_eq!(titles["Q5312304"], "زیندووان");
    }

    #[test]
    fn page_snapshot_reads_revision_and_flags() {
        let response: QueryResponse = serde_json::from_value(json!({
            "query": {"pages": [{
                "ns": 0,
                "title": "Foo",
                "redirect": true,
                "revisions": [{"timestamp": "2024-01-01T00:00:00Z", "slots": {"main": {"content": "#REDIRECT [[Bar]]"}}}]
            }]}
        }))
        .expect("decode");
        let page = response
            .query
            .pages
            .into_iter()
            .next()
            .and_then(page_snapshot)
            .expect("snapshot");
        assert!(page.is_redirect);
        assert_eq!(page.timestamp.as_deref(), Some("2024-01-01T00:00:00Z"));

        let missing: QueryResponse =
            serde_json::from_value(json!({"query": {"pages": [{"ns": 0, "title": "Nope", "missing": true}]}}))
                .expect("decode");
        assert!(missing.query.pages.into_iter().next().and_then(page_snapshot).is_none());
    }

    #[test]
    fn continuation_tokens_are_kept_verbatim() {
        let response: QueryResponse = serde_json::from_value(json!({
            "continue": {"blcontinue": "0|123", "continue": "-||"},
            "query": {"backlinks": [{"title": "A"}, {"title": "B"}]}
        }))
        .expect("decode");
        let continuation = response.continuation.expect("continuation");
        assert_eq!(continuation["blcontinue"], "0|123");
        assert_eq!(response.query.backlinks.len(), 2);
    }

    #[test]
    fn namespace_prefixes() {
        assert_eq!(strip_namespace("Template:Orphan", NS_TEMPLATE), "Orphan");
        assert_eq!(strip_namespace("Orphan", NS_TEMPLATE), "Orphan");
        assert_eq!(strip_namespace("category:Living people", NS_CATEGORY), "Living people");
        assert_eq!(prefixed_title("Orphan", NS_TEMPLATE), "Template:Orphan");
        assert_eq!(prefixed_title("داڕێژە:Orphan", NS_TEMPLATE), "داڕێژە:Orphan");
        assert_eq!(prefixed_title("Living people", NS_CATEGORY), "Category:Living people");
        assert_eq!(prefixed_title("Foo", NS_MAIN), "Foo");
    }

    #[test]
    fn colons_inside_titles_are_not_namespaces() {
        assert_eq!(strip_namespace("Star Trek: Voyager", NS_MAIN), "Star Trek: Voyager");
        assert_eq!(
            strip_namespace("Template:Star Trek: Voyager", NS_TEMPLATE),
            "Star Trek: Voyager"
        );
        assert_eq!(
            strip_namespace("Category:Star Trek: Voyager", NS_TEMPLATE),
            "Category:Star Trek: Voyager"
        );
        assert_eq!(
            prefixed_title("Star Trek: Voyager", NS_CATEGORY),
            "Category:Star Trek: Voyager"
        );
        assert_eq!(prefixed_title("Cleanup: reason", NS_TEMPLATE), "Template:Cleanup: reason");
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
    }
}
