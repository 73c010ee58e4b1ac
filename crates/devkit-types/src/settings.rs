//! Configuration for devkit components.
//!
//! An explicit struct passed by reference into the components that need
//! it. Defaults can be overridden once at startup from `DEV_*`
//! environment variables; after that the struct is read-only.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

/// Placeholder token for the variable name inside
/// [`Settings::virtual_vars`].
pub const VIRTUAL_VAR_SLOT: &str = "%s";

/// Process-wide configuration, initialized once and read many times.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Working directory used when spawning shell sessions.
    pub cwd: PathBuf,
    /// Whether commands may be used by anyone rather than owners only.
    pub global_use: bool,
    /// Delimiter between flag names and values in command payloads.
    pub flag_delimiter: char,
    /// Whether edited invocation messages re-run their command.
    pub invoke_on_edit: bool,
    /// Locale tag used for user-facing strings.
    pub locale: String,
    /// Principal IDs allowed to use owner-only commands.
    pub owners: BTreeSet<u64>,
    /// Whether the evaluation scope is retained across runs.
    pub retain: bool,
    /// Root folder of the host application, scrubbed from error output.
    pub root_folder: PathBuf,
    /// Template for virtual variable placeholders; `%s` is replaced by
    /// the variable name. Defaults to `|%s|`.
    pub virtual_vars: String,
}

impl Default for Settings {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            cwd: cwd.clone(),
            global_use: false,
            flag_delimiter: '=',
            invoke_on_edit: false,
            locale: "en-US".to_string(),
            owners: BTreeSet::new(),
            retain: false,
            root_folder: cwd,
            virtual_vars: "|%s|".to_string(),
        }
    }
}

impl Settings {
    /// Build settings from defaults plus `DEV_*` environment overrides.
    ///
    /// Directory overrides must name an existing directory; anything else
    /// is rejected so a typo cannot silently point the shell elsewhere.
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();

        if let Some(cwd) = read_env("DEV_CWD") {
            settings.cwd = existing_dir(&cwd)?;
        }
        if let Some(v) = read_env("DEV_GLOBAL_USE") {
            settings.global_use = v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = read_env("DEV_FLAG_DELIMITER") {
            match v.chars().next() {
                Some(c) if v.chars().count() == 1 => settings.flag_delimiter = c,
                _ => bail!("DEV_FLAG_DELIMITER must be a single character, got {v:?}"),
            }
        }
        if let Some(v) = read_env("DEV_INVOKE_ON_EDIT") {
            settings.invoke_on_edit = v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = read_env("DEV_LOCALE") {
            settings.locale = v;
        }
        if let Some(v) = read_env("DEV_OWNERS") {
            settings.owners = parse_ids(&v)?;
        }
        if let Some(v) = read_env("DEV_RETAIN") {
            settings.retain = v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = read_env("DEV_ROOT_FOLDER") {
            settings.root_folder = existing_dir(&v)?;
        }
        if let Some(v) = read_env("DEV_VIRTUAL_VARS") {
            if !v.contains(VIRTUAL_VAR_SLOT) {
                bail!("DEV_VIRTUAL_VARS must contain {VIRTUAL_VAR_SLOT:?}, got {v:?}");
            }
            settings.virtual_vars = v;
        }

        Ok(settings)
    }

    /// Render the placeholder for a virtual variable name.
    pub fn placeholder(&self, name: &str) -> String {
        self.virtual_vars.replacen(VIRTUAL_VAR_SLOT, name, 1)
    }
}

fn read_env(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Resolve a path and require it to be an existing directory.
fn existing_dir(path: &str) -> Result<PathBuf> {
    let dir = Path::new(path);
    if !dir.is_dir() {
        bail!("not a directory: {path}");
    }
    Ok(dir.canonicalize()?)
}

/// Parse a comma/whitespace separated list of numeric principal IDs.
fn parse_ids(raw: &str) -> Result<BTreeSet<u64>> {
    let mut ids = BTreeSet::new();
    for part in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        if part.is_empty() {
            continue;
        }
        match part.parse::<u64>() {
            Ok(id) => {
                ids.insert(id);
            }
            Err(_) => bail!("invalid owner id: {part:?}"),
        }
    }
    Ok(ids)
}
