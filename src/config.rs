//! Saved defaults for the command line.
//!
//! Defaults are stored as the flags themselves, one per line, in a global
//! file and an optional `.tomerc` in the working directory. Effective flags
//! are global, then local, then the command line, later ones winning.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::encoding::EncodingChoice;
use crate::index::IndexConfig;
use crate::layout::WindowConfig;

const LOCAL_FILE: &str = ".tomerc";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub pattern: Option<String>,
    pub encoding: Option<String>,
    pub window: Option<usize>,
    pub width: Option<u16>,
    pub perf: bool,
    pub debug_log: Option<PathBuf>,
}

impl ConfigFlags {
    /// Merge `other` over `self`: options from `other` win, booleans combine.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            pattern: other.pattern.clone().or_else(|| self.pattern.clone()),
            encoding: other.encoding.clone().or_else(|| self.encoding.clone()),
            window: other.window.or(self.window),
            width: other.width.or(self.width),
            perf: self.perf || other.perf,
            debug_log: other.debug_log.clone().or_else(|| self.debug_log.clone()),
        }
    }

    /// Indexer settings these flags select.
    ///
    /// # Errors
    ///
    /// Fails on an encoding label that is neither `auto` nor a known
    /// encoding.
    pub fn index_config(&self) -> Result<IndexConfig> {
        let mut config = IndexConfig::default();
        if let Some(pattern) = &self.pattern {
            config.heading_pattern.clone_from(pattern);
        }
        if let Some(label) = &self.encoding {
            let Some(choice) = EncodingChoice::from_label(label) else {
                bail!("Unknown encoding: {label}");
            };
            config.encoding = choice;
        }
        Ok(config)
    }

    pub fn window_config(&self) -> WindowConfig {
        let mut config = WindowConfig::default();
        if let Some(max_slots) = self.window {
            config.max_slots = max_slots.max(1);
        }
        config
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("tome").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("tome")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("tome").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join(".config")
                .join("tome")
                .join("config");
        }
    }

    PathBuf::from(LOCAL_FILE)
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(LOCAL_FILE)
}

/// Read saved flags; a missing file means no flags.
///
/// Each line holds one flag and its value, so values may contain spaces.
///
/// # Errors
///
/// Fails if the file exists but cannot be read.
pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| match line.split_once(char::is_whitespace) {
            Some((flag, value)) => vec![flag.to_string(), value.trim().to_string()],
            None => vec![line.to_string()],
        })
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

/// # Errors
///
/// Fails if the directory or file cannot be written.
pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = vec!["# tome defaults (saved with --save)".to_string()];
    if let Some(pattern) = &flags.pattern {
        lines.push(format!("--pattern {pattern}"));
    }
    if let Some(encoding) = &flags.encoding {
        lines.push(format!("--encoding {encoding}"));
    }
    if let Some(window) = flags.window {
        lines.push(format!("--window {window}"));
    }
    if let Some(width) = flags.width {
        lines.push(format!("--width {width}"));
    }
    if flags.perf {
        lines.push("--perf".to_string());
    }
    if let Some(path) = &flags.debug_log {
        lines.push(format!("--debug-log {}", path.display()));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

/// # Errors
///
/// Fails if the file exists but cannot be removed.
pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Pick the saveable flags out of raw arguments.
///
/// Unknown tokens (the file name, `--save`, ...) are skipped, as are values
/// that do not parse.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        if token == "--perf" {
            flags.perf = true;
        } else if let Some((name, inline)) = split_option(token) {
            let value = match inline {
                Some(value) => Some(value.to_string()),
                None => {
                    i += 1;
                    tokens.get(i).cloned()
                }
            };
            if let Some(value) = value {
                apply_option(&mut flags, name, value);
            }
        }
        i += 1;
    }
    flags
}

const VALUE_OPTIONS: [&str; 5] = ["--pattern", "--encoding", "--window", "--width", "--debug-log"];

/// `--name value` or `--name=value` for options that take a value.
fn split_option(token: &str) -> Option<(&str, Option<&str>)> {
    let (name, inline) = match token.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (token, None),
    };
    VALUE_OPTIONS.contains(&name).then_some((name, inline))
}

fn apply_option(flags: &mut ConfigFlags, name: &str, value: String) {
    match name {
        "--pattern" => flags.pattern = Some(value),
        "--encoding" => flags.encoding = Some(value),
        "--window" => flags.window = value.parse().ok().or(flags.window),
        "--width" => flags.width = value.parse().ok().or(flags.width),
        "--debug-log" => flags.debug_log = Some(PathBuf::from(value)),
        _ => {}
    }
}
