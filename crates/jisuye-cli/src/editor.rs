//! Terminal interaction
//!
//! Skin JSON is authored in the user's editor; deletes ask for a yes/no and
//! the login flow reads back one pasted line.

use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::process::Command;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;

#[cfg(windows)]
const FALLBACK_EDITOR: &str = "notepad";
#[cfg(not(windows))]
const FALLBACK_EDITOR: &str = "vi";

/// Open `initial` in the editor until it parses as `T`
///
/// On a parse error the user is asked whether to edit again; declining aborts.
pub fn edit_json<T: DeserializeOwned>(initial: &str) -> Result<T> {
    let file = tempfile::Builder::new()
        .prefix("jisuye-")
        .suffix(".json")
        .tempfile()
        .context("Failed to create temp file")?;
    fs::write(file.path(), initial)
        .with_context(|| format!("Failed to write temp file: {:?}", file.path()))?;

    let editor = editor_from(|name| env::var(name).ok());
    let mut words = editor.split_whitespace();
    let program = words.next().unwrap_or(FALLBACK_EDITOR);
    let args: Vec<&str> = words.collect();

    loop {
        let status = Command::new(program)
            .args(&args)
            .arg(file.path())
            .status()
            .with_context(|| format!("Failed to run editor: {}", editor))?;
        if !status.success() {
            bail!("Editor '{}' exited with {}", editor, status);
        }

        let text = fs::read_to_string(file.path())
            .with_context(|| format!("Failed to read temp file: {:?}", file.path()))?;
        match serde_json::from_str(&text) {
            Ok(value) => return Ok(value),
            Err(e) => {
                eprintln!("Invalid JSON: {}", e);
                if !confirm("Edit again?")? {
                    bail!("Aborted, nothing was saved");
                }
            }
        }
    }
}

/// Ask a yes/no question; anything but y/yes is a no
///
/// Without a terminal on stdin there is nobody to answer, so this is a no.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !atty::is(atty::Stream::Stdin) {
        return Ok(false);
    }
    Ok(is_yes(&read_answer(&format!("{} [y/N] ", prompt))?))
}

/// Read one trimmed line after printing `prompt`
pub fn prompt_line(prompt: &str) -> Result<String> {
    read_answer(prompt)
}

// $VISUAL wins over $EDITOR; blank values count as unset.
fn editor_from(lookup: impl Fn(&str) -> Option<String>) -> String {
    ["VISUAL", "EDITOR"]
        .into_iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| FALLBACK_EDITOR.to_string())
}

fn read_answer(prompt: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", prompt)?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_editor_prefers_visual() {
        let editor = editor_from(lookup(&[("VISUAL", "code --wait"), ("EDITOR", "nano")]));
        assert_eq!(editor, "code --wait");
    }

    #[test]
    fn test_editor_skips_blank_values() {
        assert_eq!(editor_from(lookup(&[("VISUAL", "  "), ("EDITOR", "nano")])), "nano");
        assert_eq!(editor_from(lookup(&[])), FALLBACK_EDITOR);
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y"));
        assert!(is_yes("YES"));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
    }
}
