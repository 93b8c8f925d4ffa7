use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Result, bail};
use serde::Serialize;

pub const MULTIPLE_ISSUES_ID: &str = "Q6450720";
pub const LIVING_PEOPLE_CATEGORY_ID: &str = "Q5312304";
pub const DATE_PARAMS: &str = "|{{subst:DATE}}";
pub const DEFAULT_LANGUAGE: &str = "ckb";
pub const FALLBACK_LOCALE: &str = "en";

/// Tags the bot can decide on. Every other key in [`TAGS_BY_PRIORITY`] is
/// only recognised, sorted and deduplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceTag {
    Unreferenced,
    OneSource,
    BlpUnreferenced,
    BlpOneSource,
    Deadend,
    Orphan,
    Uncategorized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Header,
    Footer,
}

impl MaintenanceTag {
    /// Evaluation order: content issues first, then style issues.
    pub const ALL: [MaintenanceTag; 7] = [
        MaintenanceTag::BlpUnreferenced,
        MaintenanceTag::Unreferenced,
        MaintenanceTag::BlpOneSource,
        MaintenanceTag::OneSource,
        MaintenanceTag::Deadend,
        MaintenanceTag::Orphan,
        MaintenanceTag::Uncategorized,
    ];

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unreferenced" => Ok(Self::Unreferenced),
            "one_source" => Ok(Self::OneSource),
            "blp_unreferenced" => Ok(Self::BlpUnreferenced),
            "blp_one_source" => Ok(Self::BlpOneSource),
            "deadend" => Ok(Self::Deadend),
            "orphan" => Ok(Self::Orphan),
            "uncategorized" => Ok(Self::Uncategorized),
            other => bail!("unsupported maintenance tag: {other}"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unreferenced => "unreferenced",
            Self::OneSource => "one_source",
            Self::BlpUnreferenced => "blp_unreferenced",
            Self::BlpOneSource => "blp_one_source",
            Self::Deadend => "deadend",
            Self::Orphan => "orphan",
            Self::Uncategorized => "uncategorized",
        }
    }

    pub fn placement(self) -> Placement {
        match self {
            Self::Uncategorized => Placement::Footer,
            _ => Placement::Header,
        }
    }
}

impl fmt::Display for MaintenanceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys whose banners never enter the header block.
pub fn is_footer_tag(key: &str) -> bool {
    MaintenanceTag::parse(key)
        .map(|tag| tag.placement() == Placement::Footer)
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagDefinition {
    pub addable: bool,
    pub removable: bool,
    pub params: String,
}

pub fn default_tag_definitions() -> BTreeMap<MaintenanceTag, TagDefinition> {
    MaintenanceTag::ALL
        .into_iter()
        .map(|tag| {
            (
                tag,
                TagDefinition {
                    addable: true,
                    removable: true,
                    params: DATE_PARAMS.to_string(),
                },
            )
        })
        .collect()
}

/// Master sort order for banners inside the wrapper template.
pub const TAGS_BY_PRIORITY: &[(&str, &str)] = &[
    // Special cases
    ("undisclosed_paid", "Q28522885"),
    // Content issues
    ("unreferenced", "Q5962027"),
    ("one_source", "Q5620159"),
    ("blp_unreferenced", "Q6708313"),
    ("blp_one_source", "Q81934336"),
    ("more_citations_needed", "Q5619503"),
    ("blp_sources", "Q6708297"),
    ("notability", "Q6459976"),
    ("update", "Q5617874"),
    ("primary_sources", "Q13365792"),
    ("promotional", "Q6583806"),
    ("original_research", "Q6526878"),
    ("coi", "Q6737821"),
    ("lead_too_short", "Q5618428"),
    ("independent_sources", "Q13534686"),
    ("unreliable_sources", "Q7780349"),
    ("cleanup_rewrite", "Q6473982"),
    ("globalize", "Q5877521"),
    ("missing_information", "Q10953923"),
    ("pov", "Q6294435"),
    ("self-published", "Q14455639"),
    ("cleanup_press_release", "Q14337818"),
    ("disputed", "Q5618260"),
    ("autobiography", "Q6705258"),
    ("fan_pov", "Q5621019"),
    ("expert_needed", "Q6929750"),
    ("in-universe", "Q6623577"),
    ("peacock", "Q8644341"),
    ("how-to", "Q13411298"),
    ("weasel", "Q7780480"),
    ("unfocused", "Q14473791"),
    ("undue_weight", "Q18145477"),
    ("paid_contributions", "Q25970985"),
    ("too_few_opinions", "Q18145476"),
    ("lead_missing", "Q11169781"),
    ("contradicts_others", "Q7648384"),
    ("npov_language", "Q24237762"),
    ("fiction", "Q13421307"),
    ("close_paraphrasing", "Q7641121"),
    // Style issues
    ("deadend", "Q5621858"),
    ("orphan", "Q5754827"),
    ("uncategorized", "Q5884621"),
    ("more_footnotes_needed", "Q5622270"),
    ("no_footnotes", "Q6867401"),
    ("no_plot", "Q14399120"),
    ("cleanup", "Q5624688"),
    ("tone", "Q5858353"),
    ("essay-like", "Q7211526"),
    ("citation_style", "Q5618775"),
    ("resume-like", "Q7481565"),
    ("long_plot", "Q10971078"),
    ("overly_detailed", "Q13518229"),
    ("more_plot", "Q14398290"),
    ("prose", "Q5616140"),
    ("technical", "Q6839519"),
    ("cleanup_bare_urls", "Q6746581"),
    ("external_links", "Q13365838"),
    ("context", "Q7648212"),
    ("confusing", "Q7646707"),
    ("cleanup_reorganize", "Q13433594"),
    ("all_plot", "Q6676442"),
    ("copy_edit", "Q6292692"),
    ("convert_to_episode_table", "Q135849488"),
    ("lead_rewrite", "Q5616697"),
    ("lead_too_long", "Q10988907"),
    ("very_long", "Q5618853"),
    ("cleanup_lang", "Q7639966"),
    ("excessive_examples", "Q14473738"),
    ("cleanup_section", "Q7640087"),
    ("cleanup_mos", "Q14473826"),
    ("in_popular_culture", "Q14473789"),
    ("travel_guide", "Q14450719"),
    ("recentism", "Q5896905"),
    ("cleanup_biography", "Q7639925"),
    ("too_many_sections", "Q7646501"),
    ("story", "Q14455745"),
    ("buzzword", "Q6734300"),
    ("dictionary_definition", "Q15599246"),
    ("unsorted_list", "Q6676752"),
    ("duplication", "Q14399173"),
    ("review", "Q13421187"),
    ("too_many_photos", "Q14398993"),
    ("cleanup_school", "Q7639994"),
    ("directory", "Q19753394"),
    ("underlinked", "Q13107723"),
];

/// Templates counted as references when they appear outside `<ref>` tags.
pub const CITATION_TEMPLATE_IDS: &[&str] = &[
    "Q6925554",  // citation
    "Q92570",    // cite book
    "Q5624899",  // cite journal
    "Q5625676",  // cite news
    "Q5637226",  // cite web
];

/// Templates placed above the banner block, highest priority first.
pub const LAYOUT_TEMPLATE_IDS: &[&str] = &[
    // Before hatnotes
    "Q52083446", // short description
    "Q7748394",  // DISPLAYTITLE
    "Q4282320",  // lowercase title
    "Q5805831",  // italic title
    // Hatnotes
    "Q5625128",   // hatnote
    "Q6797933",   // main
    "Q6383276",   // correct title
    "Q118038211", // distinguish
    "Q6176023",   // for
    "Q6215759",   // further
    "Q5622390",   // self-reference
    "Q14452336",  // about year
    "Q20750675",  // similar names
    "Q22742328",  // highway detail hatnote
    "Q19676997",  // broader
    "Q6667048",   // about-distinguish
    "Q25990535",  // about other people
    "Q5766677",   // about
    "Q22756090",  // other storms
    "Q6501382",   // other people
    "Q13360194",  // other places
    "Q13108237",  // other ships
    "Q5758947",   // other uses
    "Q13099245",  // other uses of
    "Q6042392",   // redirect
    "Q14449133",  // redirect-distinguish
    "Q13421042",  // redirect-synonym
    "Q25977434",  // redirect-multi
    "Q13667217",  // see Wiktionary
    "Q5538331",   // see also
    "Q62073361",  // see also if exists
    // Featured badges
    "Q5857568", // featured list
    "Q5626124", // featured article
    "Q5303",    // good article
    // Speedy deletion
    "Q6535594",   // db-g1
    "Q10954700",  // db-g2
    "Q10988846",  // db-g3
    "Q7479432",   // db-hoax
    "Q11453769",  // db-g4
    "Q11454960",  // db-g5
    "Q11455750",  // db-g6
    "Q13218936",  // db-copypaste
    "Q25971427",  // db-error
    "Q13218917",  // db-move
    "Q106312912", // db-moved
    "Q13107189",  // db-xfd
    "Q110936998", // db-afc-move
    "Q9634684",   // db-g7
    "Q11457965",  // db-g8
    "Q11459573",  // db-g10
    "Q13218913",  // db-negublp
    "Q11460470",  // db-g11
    "Q10989772",  // db-g12
    "Q13218935",  // db-g14
    "Q12470007",  // db-a1
    "Q12470008",  // db-a2
    "Q13218934",  // db-empty
    "Q12470022",  // db-a7
    "Q6806662",   // db-person
    "Q13218938",  // db-band
    "Q13218937",  // db-club
    "Q6806656",   // db-inc
    "Q6806673",   // db-web
    "Q13218939",  // db-animal
    "Q15622820",  // db-event
    "Q12470024",  // db-a9
    "Q12470026",  // db-a10
    "Q16605081",  // db-a11
    // Proposed deletion
    "Q12857463", // proposed deletion
    "Q14397354", // prod blp
    "Q14397353", // proposed deletion endorsed
    "Q14441550", // prod-nn
    // Protection
    "Q6466220",  // pp
    "Q7482910",  // pp-move
    "Q14627998", // pp-pc
    "Q14441548", // pp-blp
    "Q9037125",  // pp-dispute
    "Q14441546", // pp-move-dispute
    "Q25976532", // pp-extended
    "Q9039502",  // pp-semi-indef
    "Q9039353",  // pp-sock
    "Q6704722",  // pp-vandalism
    "Q13566056", // pp-move-vandalism
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryMessages {
    pub bot_prefix: String,
    pub adding: String,
    pub removing: String,
    pub tag: String,
    pub tags: String,
    pub and: String,
    pub comma_separator: String,
    pub separator: String,
    pub template_ns: String,
}

pub fn builtin_messages(language: &str) -> Option<SummaryMessages> {
    match language {
        "en" => Some(SummaryMessages {
            bot_prefix: "Bot: ".to_string(),
            adding: "Adding".to_string(),
            removing: "Removing".to_string(),
            tag: "tag".to_string(),
            tags: "tags".to_string(),
            and: " and ".to_string(),
            comma_separator: ", ".to_string(),
            separator: "; ".to_string(),
            template_ns: "Template".to_string(),
        }),
        "ckb" => Some(SummaryMessages {
            bot_prefix: "بۆت: ".to_string(),
            adding: "زیادکردنی".to_string(),
            removing: "لابردنی".to_string(),
            tag: "تاگی".to_string(),
            tags: "تاگەکانی".to_string(),
            and: " و ".to_string(),
            comma_separator: "، ".to_string(),
            separator: "؛ ".to_string(),
            template_ns: "داڕێژە".to_string(),
        }),
        _ => None,
    }
}

/// Localised category namespace names recognised in the footer, in addition
/// to the canonical `Category`.
pub fn builtin_category_namespaces(language: &str) -> &'static [&'static str] {
    match language {
        "ckb" => &["پۆل"],
        _ => &[],
    }
}
