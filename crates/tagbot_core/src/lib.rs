pub mod aliases;
pub mod analyzer;
pub mod bot;
pub mod config;
pub mod decision;
pub mod mediawiki;
pub mod pattern;
pub mod regions;
pub mod rewrite;
pub mod summary;
pub mod tag_data;
pub mod wikitext;

#[cfg(test)]
mod test_support;
