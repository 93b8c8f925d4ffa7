use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::tag_data::{
    DEFAULT_LANGUAGE, FALLBACK_LOCALE, MaintenanceTag, SummaryMessages, TagDefinition,
    builtin_category_namespaces, builtin_messages, default_tag_definitions,
};

pub const DEFAULT_USER_AGENT: &str = "tagbot/0.1";
pub const DEFAULT_KNOWLEDGE_BASE_API_URL: &str = "https://www.wikidata.org/w/api.php";
pub const DEFAULT_CONFIG_FILENAME: &str = "tagbot.toml";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct BotConfig {
    #[serde(default)]
    pub wiki: WikiSection,
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseSection,
    /// `[tags.<language>.<tag>]` overrides.
    #[serde(default)]
    pub tags: BTreeMap<String, BTreeMap<String, TagOverride>>,
    /// `[messages.<language>]` overrides.
    #[serde(default)]
    pub messages: BTreeMap<String, MessageOverride>,
    #[serde(default)]
    pub footer: FooterSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiSection {
    pub api_url: Option<String>,
    pub language: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct KnowledgeBaseSection {
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct TagOverride {
    pub addable: Option<bool>,
    pub removable: Option<bool>,
    pub params: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct MessageOverride {
    pub bot_prefix: Option<String>,
    pub adding: Option<String>,
    pub removing: Option<String>,
    pub tag: Option<String>,
    pub tags: Option<String>,
    pub and: Option<String>,
    pub comma_separator: Option<String>,
    pub separator: Option<String>,
    pub template_ns: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct FooterSection {
    #[serde(default)]
    pub category_namespaces: Vec<String>,
    #[serde(default)]
    pub stub_suffixes: Vec<String>,
}

impl BotConfig {
    /// Resolve the wiki language code: env WIKI_LANGUAGE > config > default.
    pub fn language(&self) -> String {
        if let Some(value) = env_override("WIKI_LANGUAGE") {
            return value;
        }
        self.wiki
            .language
            .clone()
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
    }

    /// Resolve the wiki API URL: env WIKI_API_URL > config > derived from the language.
    pub fn api_url(&self) -> String {
        if let Some(value) = env_override("WIKI_API_URL") {
            return value;
        }
        self.wiki
            .api_url
            .clone()
            .unwrap_or_else(|| wikipedia_api_url(&self.language()))
    }

    pub fn user_agent(&self) -> String {
        if let Some(value) = env_override("WIKI_USER_AGENT") {
            return value;
        }
        self.wiki
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    pub fn knowledge_base_api_url(&self) -> String {
        if let Some(value) = env_override("KNOWLEDGE_BASE_API_URL") {
            return value;
        }
        self.knowledge_base
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_KNOWLEDGE_BASE_API_URL.to_string())
    }

    pub fn tag_definitions(&self) -> TagDefinitions {
        let language = self.language();
        TagDefinitions::new(
            default_tag_definitions(),
            self.tags.get(&language).cloned().unwrap_or_default(),
        )
    }

    /// Messages for the configured language. Each field resolves on its own:
    /// config override, then the built-in locale, then the default locale.
    pub fn summary_messages(&self) -> SummaryMessages {
        let language = self.language();
        let mut messages = builtin_messages(FALLBACK_LOCALE).unwrap_or_else(empty_messages);
        if let Some(local) = builtin_messages(&language) {
            overlay_messages(&mut messages, local);
        }
        if let Some(overrides) = self.messages.get(&language) {
            apply_message_override(&mut messages, overrides);
        }
        messages
    }

    pub fn category_namespaces(&self) -> Vec<String> {
        let mut names = vec!["Category".to_string()];
        for name in builtin_category_namespaces(&self.language()) {
            names.push((*name).to_string());
        }
        for name in &self.footer.category_namespaces {
            if !name.trim().is_empty() && !names.contains(name) {
                names.push(name.trim().to_string());
            }
        }
        names
    }

    pub fn stub_suffixes(&self) -> Vec<String> {
        let mut suffixes = vec!["stub".to_string()];
        for suffix in &self.footer.stub_suffixes {
            if !suffix.trim().is_empty() && !suffixes.contains(suffix) {
                suffixes.push(suffix.trim().to_string());
            }
        }
        suffixes
    }
}

/// Two-level tag configuration: built-in defaults plus the current wiki's
/// overrides. The default table is never mutated.
#[derive(Debug, Clone, Default)]
pub struct TagDefinitions {
    defaults: BTreeMap<MaintenanceTag, TagDefinition>,
    overrides: BTreeMap<String, TagOverride>,
}

impl TagDefinitions {
    pub fn new(
        defaults: BTreeMap<MaintenanceTag, TagDefinition>,
        overrides: BTreeMap<String, TagOverride>,
    ) -> Self {
        Self {
            defaults,
            overrides,
        }
    }

    pub fn builtin() -> Self {
        Self::new(default_tag_definitions(), BTreeMap::new())
    }

    /// `None` when neither a default nor an override exists for the tag.
    pub fn resolve(&self, tag: MaintenanceTag) -> Option<TagDefinition> {
        let default = self.defaults.get(&tag);
        let overrides = self.overrides.get(tag.as_str());
        if default.is_none() && overrides.is_none() {
            return None;
        }

        let mut resolved = default.cloned().unwrap_or(TagDefinition {
            addable: false,
            removable: false,
            params: String::new(),
        });
        if let Some(overrides) = overrides {
            if let Some(addable) = overrides.addable {
                resolved.addable = addable;
            }
            if let Some(removable) = overrides.removable {
                resolved.removable = removable;
            }
            if let Some(params) = &overrides.params {
                resolved.params = params.clone();
            }
        }
        Some(resolved)
    }
}

/// Load and parse a BotConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<BotConfig> {
    if !config_path.exists() {
        return Ok(BotConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: BotConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

/// Resolve the config file location: flag > env TAGBOT_CONFIG > `tagbot.toml`.
pub fn resolve_config_path(flag: Option<&Path>) -> PathBuf {
    if let Some(path) = flag {
        return path.to_path_buf();
    }
    if let Some(value) = env_override("TAGBOT_CONFIG") {
        return PathBuf::from(value);
    }
    PathBuf::from(DEFAULT_CONFIG_FILENAME)
}

pub fn wikipedia_api_url(language: &str) -> String {
    format!("https://{language}.wikipedia.org/w/api.php")
}

fn env_override(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn apply_message_override(messages: &mut SummaryMessages, overrides: &MessageOverride) {
    let fields = [
        (&mut messages.bot_prefix, &overrides.bot_prefix),
        (&mut messages.adding, &overrides.adding),
        (&mut messages.removing, &overrides.removing),
        (&mut messages.tag, &overrides.tag),
        (&mut messages.tags, &overrides.tags),
        (&mut messages.and, &overrides.and),
        (&mut messages.comma_separator, &overrides.comma_separator),
        (&mut messages.separator, &overrides.separator),
        (&mut messages.template_ns, &overrides.template_ns),
    ];
    for (target, value) in fields {
        if let Some(value) = value {
            *target = value.clone();
        }
    }
}

/// Copy every non-empty field of `layer` over `base`.
fn overlay_messages(base: &mut SummaryMessages, layer: SummaryMessages) {
    let fields = [
        (&mut base.bot_prefix, layer.bot_prefix),
        (&mut base.adding, layer.adding),
        (&mut base.removing, layer.removing),
        (&mut base.tag, layer.tag),
        (&mut base.tags, layer.tags),
        (&mut base.and, layer.and),
        (&mut base.comma_separator, layer.comma_separator),
        (&mut base.separator, layer.separator),
        (&mut base.template_ns, layer.template_ns),
    ];
    for (target, value) in fields {
        if !value.is_empty() {
            *target = value;
        }
    }
}

fn empty_messages() -> SummaryMessages {
    SummaryMessages {
        bot_prefix: String::new(),
        adding: String::new(),
        removing: String::new(),
        tag: String::new(),
        tags: String::new(),
        and: String::new(),
        comma_separator: String::new(),
        separator: String::new(),
        template_ns: "Template".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_config_returns_default_for_missing_file() {
        let config = load_config(Path::new("/nonexistent/tagbot.toml")).expect("load config");
        assert_eq!(config, BotConfig::default());
    }

    #[test]
    fn load_config_parses_all_sections() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("tagbot.toml");
        fs::write(
            &config_path,
            r#"
[wiki]
api_url = "https://ckb.wikipedia.org/w/api.php"
language = "ckb"
user_agent = "ckb-tagbot/1.0"

[knowledge_base]
api_url = "https://kb.example.org/w/api.php"

[tags.ckb.unreferenced]
removable = false

[tags.ckb.orphan]
params = "|date=now"

[messages.ckb]
bot_prefix = "Robot: "

[footer]
category_namespaces = ["Kategorie"]
stub_suffixes = ["-kurt"]
"#,
        )
        .expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert_eq!(
            config.wiki.api_url.as_deref(),
            Some("https://ckb.wikipedia.org/w/api.php")
        );
        assert_eq!(config.wiki.language.as_deref(), Some("ckb"));
        assert_eq!(
            config.knowledge_base.api_url.as_deref(),
            Some("https://kb.example.org/w/api.php")
        );
        let ckb = config.tags.get("ckb").expect("ckb overrides");
        assert_eq!(ckb["unreferenced"].removable, Some(false));
        assert_eq!(ckb["orphan"].params.as_deref(), Some("|date=now"));
        assert_eq!(
            config.messages["ckb"].bot_prefix.as_deref(),
            Some("Robot: ")
        );
        assert_eq!(config.footer.category_namespaces, vec!["Kategorie"]);
    }

    #[test]
    fn load_config_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("tagbot.toml");
        fs::write(&config_path, "[wiki\nlanguage = \"oops\"").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }

    #[test]
    fn tag_overrides_layer_over_defaults_without_mutating_them() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "unreferenced".to_string(),
            TagOverride {
                removable: Some(false),
                ..TagOverride::default()
            },
        );
        let definitions = TagDefinitions::new(default_tag_definitions(), overrides);

        let unreferenced = definitions
            .resolve(MaintenanceTag::Unreferenced)
            .expect("resolved");
        assert!(unreferenced.addable);
        assert!(!unreferenced.removable);
        assert_eq!(unreferenced.params, "|{{subst:DATE}}");

        let orphan = definitions.resolve(MaintenanceTag::Orphan).expect("resolved");
        assert!(orphan.removable);
        assert!(default_tag_definitions()[&MaintenanceTag::Unreferenced].removable);
    }

    #[test]
    fn missing_tag_definition_resolves_to_none() {
        let mut defaults = default_tag_definitions();
        defaults.remove(&MaintenanceTag::Deadend);
        let definitions = TagDefinitions::new(defaults, BTreeMap::new());
        assert!(definitions.resolve(MaintenanceTag::Deadend).is_none());
        assert!(definitions.resolve(MaintenanceTag::Orphan).is_some());
    }

    #[test]
    fn override_alone_yields_a_conservative_definition() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "deadend".to_string(),
            TagOverride {
                removable: Some(true),
                ..TagOverride::default()
            },
        );
        let definitions = TagDefinitions::new(BTreeMap::new(), overrides);
        let deadend = definitions.resolve(MaintenanceTag::Deadend).expect("resolved");
        assert!(!deadend.addable);
        assert!(deadend.removable);
    }

    #[test]
    fn messages_fall_back_to_english_for_unknown_languages() {
        let config = BotConfig {
            wiki: WikiSection {
                language: Some("xx".to_string()),
                ..WikiSection::default()
            },
            ..BotConfig::default()
        };
        if env::var("WIKI_LANGUAGE").is_err() {
            assert_eq!(config.summary_messages().adding, "Adding");
        }
    }

    #[test]
    fn message_overrides_replace_single_fields() {
        let mut messages = builtin_messages("en").expect("en");
        apply_message_override(
            &mut messages,
            &MessageOverride {
                bot_prefix: Some("Robot: ".to_string()),
                ..MessageOverride::default()
            },
        );
        assert_eq!(messages.bot_prefix, "Robot: ");
        assert_eq!(messages.adding, "Adding");
    }

    #[test]
    fn empty_locale_fields_fall_back_individually() {
        let mut messages = builtin_messages("en").expect("en");
        let mut kurdish = builtin_messages("ckb").expect("ckb");
        kurdish.and = String::new();
        let adding = kurdish.adding.clone();
        overlay_messages(&mut messages, kurdish);
        assert_eq!(messages.adding, adding);
        assert_eq!(messages.and, " and ");
    }

    #[test]
    fn configured_language_layers_override_over_locale() {
        let mut config = BotConfig {
            wiki: WikiSection {
                language: Some("ckb".to_string()),
                ..WikiSection::default()
            },
            ..BotConfig::default()
        };
        config.messages.insert(
            "ckb".to_string(),
            MessageOverride {
                separator: Some(" | ".to_string()),
                ..MessageOverride::default()
            },
        );
        if env::var("WIKI_LANGUAGE").is_err() {
            let messages = config.summary_messages();
            assert_eq!(messages.separator, " | ");
            assert_eq!(
                messages.adding,
                builtin_messages("ckb").expect("ckb").adding
            );
        }
    }

    #[test]
    fn category_namespaces_always_include_canonical_name() {
        let config = BotConfig {
            footer: FooterSection {
                category_namespaces: vec!["Kategorie".to_string(), "Category".to_string()],
                stub_suffixes: Vec::new(),
            },
            ..BotConfig::default()
        };
        let names = config.category_namespaces();
        assert_eq!(names[0], "Category");
        assert!(names.contains(&"Kategorie".to_string()));
        assert_eq!(names.iter().filter(|name| *name == "Category").count(), 1);
    }

    #[test]
    fn wikipedia_api_url_uses_language_subdomain() {
        assert_eq!(
            wikipedia_api_url("ckb"),
            "https://ckb.wikipedia.org/w/api.php"
        );
    }

    #[test]
    fn config_path_flag_wins() {
        assert_eq!(
            resolve_config_path(Some(Path::new("/etc/tagbot.toml"))),
            PathBuf::from("/etc/tagbot.toml")
        );
    }
}
