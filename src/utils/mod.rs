/// TOML configuration loading and validation.
pub mod toml_config;

pub use toml_config::{ConfigError, DelveConfig, ResearchConfig, SearchConfig};

/// Cut `text` to at most `max_chars` characters, respecting char boundaries.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
