//! Virtual-variable substitution and output scrubbing.
//!
//! A virtual variable is a scope binding surfaced in chat text through a
//! placeholder such as `|name|`. Forward substitution resolves
//! placeholders in incoming text; the reverse substitution hides live
//! values (credentials, tokens) behind their placeholders before text
//! reaches the output sink. Path scrubbing replaces locally-identifying
//! directory prefixes the same way.

use devkit_types::{Settings, Value};

use crate::scope::Scope;

/// Resolve virtual-variable placeholders against the scope's globals.
///
/// Text with no matching placeholder passes through unchanged, so the
/// substitution is idempotent in the forward direction.
pub fn replace_vars(content: &str, settings: &Settings, scope: &Scope) -> String {
    let mut out = content.to_string();
    for (name, value) in &scope.globals {
        let Value::String(value) = value else {
            continue;
        };
        let placeholder = settings.placeholder(name);
        if out.contains(&placeholder) {
            out = out.replace(&placeholder, value);
        }
    }
    out
}

/// Hide bound values behind their placeholders.
///
/// The reverse of [`replace_vars`], applied to outgoing text so a live
/// value never leaks into a response. Globals are concealed first, then
/// locals; empty values are skipped because replacing an empty string
/// would riddle the text with placeholders.
pub fn conceal_vars(content: &str, settings: &Settings, scope: &Scope) -> String {
    let mut out = content.to_string();
    for tier in [&scope.globals, &scope.locals] {
        for (name, value) in tier {
            let Value::String(value) = value else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            if out.contains(value.as_str()) {
                out = out.replace(value.as_str(), &settings.placeholder(name));
            }
        }
    }
    out
}

/// Replace the application root and session working directory with `~`.
///
/// The longer prefix goes first so a cwd nested under the root folder
/// is not half-scrubbed.
pub fn scrub_paths(content: &str, settings: &Settings) -> String {
    let root = settings.root_folder.to_string_lossy().into_owned();
    let cwd = settings.cwd.to_string_lossy().into_owned();

    let mut prefixes = [root, cwd];
    prefixes.sort_by_key(|p| std::cmp::Reverse(p.len()));

    let mut out = content.to_string();
    for prefix in prefixes {
        if prefix.len() > 1 && out.contains(&prefix) {
            out = out.replace(&prefix, "~");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope_with(name: &str, value: &str) -> Scope {
        let mut scope = Scope::new();
        scope.set_global(name, Value::String(value.to_string()));
        scope
    }

    #[test]
    fn forward_substitution_resolves_placeholders() {
        let settings = Settings::default();
        let scope = scope_with("token", "s3cret");
        assert_eq!(
            replace_vars("auth |token| end", &settings, &scope),
            "auth s3cret end"
        );
    }

    #[test]
    fn forward_substitution_is_idempotent_without_matches() {
        let settings = Settings::default();
        let scope = scope_with("token", "s3cret");
        assert_eq!(
            replace_vars("nothing here", &settings, &scope),
            "nothing here"
        );
    }

    #[test]
    fn reverse_substitution_conceals_values() {
        let settings = Settings::default();
        let scope = scope_with("token", "s3cret");
        assert_eq!(
            conceal_vars("leaked s3cret!", &settings, &scope),
            "leaked |token|!"
        );
    }

    #[test]
    fn reverse_substitution_skips_empty_and_non_string_values() {
        let settings = Settings::default();
        let mut scope = scope_with("empty", "");
        scope.set_local("num", Value::Int(3));
        assert_eq!(conceal_vars("3 and more", &settings, &scope), "3 and more");
    }

    #[test]
    fn locals_are_concealed_too() {
        let settings = Settings::default();
        let mut scope = Scope::new();
        scope.set_local("key", Value::String("hunter2".to_string()));
        assert_eq!(
            conceal_vars("pw: hunter2", &settings, &scope),
            "pw: |key|"
        );
    }

    #[test]
    fn paths_are_scrubbed_longest_first() {
        let mut settings = Settings::default();
        settings.root_folder = "/srv/app".into();
        settings.cwd = "/srv/app/work".into();
        assert_eq!(
            scrub_paths("at /srv/app/work/file.rs in /srv/app", &settings),
            "at ~/file.rs in ~"
        );
    }
}
