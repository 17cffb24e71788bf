//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use jisuye_core::{Category, Link, Settings, Skin, SyncState};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print any serializable value as pretty JSON
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Error: could not serialize output: {}", e),
        }
    }

    /// Print a single link
    pub fn print_link(&self, link: &Link, category: Option<&Category>) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:          {}", link.id);
                println!("Title:       {}", link.title);
                println!("URL:         {}", link.url);
                match category {
                    Some(category) => println!("Category:    {}", category.name),
                    None => println!("Category:    {} (missing)", link.category_id),
                }
                for (key, value) in &link.extra {
                    println!("{:<12} {}", format!("{}:", key), display_value(value));
                }
                println!("Created:     {}", local_time(&link.created_at));
                println!("Updated:     {}", local_time(&link.updated_at));
            }
            OutputFormat::Json => self.json(link),
            OutputFormat::Quiet => println!("{}", link.id),
        }
    }

    /// Print a list of links
    pub fn print_links(&self, links: &[Link]) {
        match self.format {
            OutputFormat::Human => {
                if links.is_empty() {
                    println!("No links found.");
                    return;
                }
                for link in links {
                    println!(
                        "{} | {} | {}",
                        short_id(&link.id.to_string()),
                        truncate(&link.title, 35),
                        truncate(&link.url, 45)
                    );
                }
                println!("\n{} link(s)", links.len());
            }
            OutputFormat::Json => self.json(links),
            OutputFormat::Quiet => {
                for link in links {
                    println!("{}", link.id);
                }
            }
        }
    }

    /// Print a single category
    pub fn print_category(&self, category: &Category) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:      {}", category.id);
                println!("Name:    {}", category.name);
                for (key, value) in &category.extra {
                    println!("{:<8} {}", format!("{}:", key), display_value(value));
                }
                println!("Created: {}", local_time(&category.created_at));
            }
            OutputFormat::Json => self.json(category),
            OutputFormat::Quiet => println!("{}", category.id),
        }
    }

    /// Print categories with their link counts
    pub fn print_categories(&self, categories: &[(Category, usize)]) {
        match self.format {
            OutputFormat::Human => {
                if categories.is_empty() {
                    println!("No categories found.");
                    return;
                }
                for (category, count) in categories {
                    println!(
                        "{} | {} ({})",
                        short_id(&category.id.to_string()),
                        category.name,
                        count
                    );
                }
                println!("\n{} categories", categories.len());
            }
            OutputFormat::Json => {
                let rows: Vec<_> = categories
                    .iter()
                    .map(|(category, count)| {
                        let mut value = serde_json::to_value(category).unwrap_or_default();
                        if let Some(object) = value.as_object_mut() {
                            object.insert("linkCount".into(), (*count).into());
                        }
                        value
                    })
                    .collect();
                self.json(&rows);
            }
            OutputFormat::Quiet => {
                for (category, _) in categories {
                    println!("{}", category.id);
                }
            }
        }
    }

    pub fn print_settings(&self, settings: &Settings) {
        match self.format {
            OutputFormat::Human => {
                println!("Site name:        {}", settings.site_name);
                println!("Description:      {}", settings.site_description);
                println!("Language:         {}", settings.language);
                println!("Show search:      {}", settings.show_search);
                println!("Show categories:  {}", settings.show_categories);
                println!("Show icons:       {}", settings.show_icons);
                if !settings.search_engines.is_empty() {
                    let names: Vec<_> =
                        settings.search_engines.iter().map(|e| e.name.as_str()).collect();
                    println!("Search engines:   {}", names.join(", "));
                }
                if let Some(ref engine) = settings.default_search_engine {
                    println!("Default engine:   {}", engine);
                }
                for (key, value) in &settings.extra {
                    println!("{:<17} {}", format!("{}:", key), display_value(value));
                }
            }
            OutputFormat::Json => self.json(settings),
            OutputFormat::Quiet => println!("{}", settings.site_name),
        }
    }

    /// Print skins, marking the active one
    pub fn print_skins(&self, skins: &[Skin], current: &str) {
        match self.format {
            OutputFormat::Human => {
                for skin in skins {
                    let marker = if skin.id == current { "*" } else { " " };
                    let kind = if skin.is_system { "built-in" } else { "custom" };
                    println!("{} {:<16} {:<12} {}", marker, skin.id, skin.name, kind);
                }
            }
            OutputFormat::Json => self.json(skins),
            OutputFormat::Quiet => {
                for skin in skins {
                    println!("{}", skin.id);
                }
            }
        }
    }

    pub fn print_sync_state(&self, state: &SyncState) {
        match self.format {
            OutputFormat::Human => {
                println!("  Status:      {}", state.status_text());
                match state.last_sync_time {
                    Some(time) => println!("  Last sync:   {}", local_time(&time)),
                    None => println!("  Last sync:   never"),
                }
                if let Some(ref error) = state.sync_error {
                    println!("  Last error:  {}", error);
                }
            }
            OutputFormat::Json => self.json(state),
            OutputFormat::Quiet => println!("{}", state.status_text()),
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning to stderr
    pub fn warn(&self, msg: &str) {
        if !self.is_quiet() {
            eprintln!("⚠ {}", msg);
        }
    }
}

/// First eight characters of an id
/// Timestamps are stored in UTC and shown in local time
fn local_time(time: &DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Render a free-form field without JSON quotes for strings
fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_time_matches_local_clock() {
        let time = Utc::now();
        let expected = time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string();
        assert_eq!(local_time(&time), expected);
        assert_eq!(local_time(&time).len(), 16);
    }

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        // Multi-byte titles are cut on character boundaries
        assert_eq!(truncate("我的导航我的导航我的导航", 6), "我的导...");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&serde_json::json!("icon.png")), "icon.png");
        assert_eq!(display_value(&serde_json::json!(3)), "3");
        assert_eq!(display_value(&serde_json::json!(true)), "true");
    }
}
