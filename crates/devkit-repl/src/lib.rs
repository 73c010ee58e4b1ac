//! devkit REPL — interactive driver for the evaluator/session core.
//!
//! It handles:
//! - Meta-commands: `:help`, `:quit`, `:vars`, `:retain`, `:traceback`, `:reset`
//! - Snippet evaluation against a persistent [`Scope`]
//! - Shell escapes (`!command`) through a [`ShellSession`]
//! - Command history via rustyline

use std::path::PathBuf;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use tokio::runtime::Runtime;

use devkit_kernel::{
    conceal_vars, replace_vars, scrub_paths, strip_codeblock, Execute, Scope, ShellSession,
};
use devkit_types::{DevError, ResultItem, Settings, TimedInfo, TracebackStore, SUCCESS_MARKER};

/// Result from meta-command handling.
#[derive(Debug)]
enum MetaResult {
    /// Continue with optional output
    Continue(Option<String>),
    /// Exit the REPL (caller should save history and exit)
    Exit,
}

/// REPL configuration and state.
pub struct Repl {
    settings: Settings,
    scope: Scope,
    session: Option<ShellSession>,
    tracebacks: TracebackStore,
    runtime: Runtime,
}

impl Repl {
    /// Create a REPL using `DEV_*` environment overrides.
    pub fn new() -> Result<Self> {
        Self::with_settings(Settings::from_env()?)
    }

    pub fn with_settings(settings: Settings) -> Result<Self> {
        let runtime = Runtime::new().context("Failed to create tokio runtime")?;
        let mut tracebacks = TracebackStore::new();
        tracebacks.enable();

        Ok(Self {
            settings,
            scope: Scope::new(),
            session: None,
            tracebacks,
            runtime,
        })
    }

    /// Process a single line of input.
    ///
    /// Returns Ok(None) for empty input, Ok(Some(output)) for output to
    /// display, or an `__REPL_EXIT__` error to signal exit.
    pub fn process_line(&mut self, line: &str) -> Result<Option<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        if trimmed.starts_with(':') {
            return match self.handle_meta_command(trimmed) {
                MetaResult::Continue(output) => Ok(output),
                MetaResult::Exit => Err(anyhow::anyhow!("__REPL_EXIT__")),
            };
        }

        if let Some(command) = trimmed.strip_prefix('!') {
            return Ok(Some(self.run_shell(command)));
        }

        Ok(Some(self.eval_snippet(trimmed)))
    }

    /// Evaluate a snippet, streaming prints and captured values in
    /// program order. Partial output before an error is preserved.
    pub fn eval_snippet(&mut self, source: &str) -> String {
        if !self.settings.retain {
            self.scope = Scope::new();
        }

        // Placeholders like |token| resolve against the scope before the
        // snippet runs.
        let source = replace_vars(strip_codeblock(source), &self.settings, &self.scope);
        let mut timer = TimedInfo::start();
        let mut lines = Vec::new();
        let mut failure = None;

        match Execute::new(&source, &mut self.scope, None) {
            Ok(exec) => {
                for item in exec {
                    match item {
                        Ok(ResultItem::Printed(text)) => lines.push(text),
                        Ok(ResultItem::Value(value)) => lines.push(value.to_string()),
                        Err(err) => {
                            failure = Some(err);
                            break;
                        }
                    }
                }
            }
            Err(err) => failure = Some(err),
        }

        timer.finish();
        tracing::debug!(elapsed = ?timer.elapsed(), ok = failure.is_none(), "snippet evaluated");

        match failure {
            Some(err) => lines.push(self.report_error(err)),
            None => lines.push(SUCCESS_MARKER.to_string()),
        }
        self.filter(&lines.join("\n"))
    }

    /// Run a shell escape through the session, creating it on first use.
    fn run_shell(&mut self, command: &str) -> String {
        let command = replace_vars(command, &self.settings, &self.scope);
        let cwd = self.settings.cwd.to_string_lossy().into_owned();
        let session = self.session.get_or_insert_with(|| ShellSession::new(cwd));

        let result: Result<String, DevError> = self.runtime.block_on(async {
            let mut process = session.invoke(&command)?;
            process.run_until_complete(None).await
        });

        match result {
            Ok(rendered) => self.filter(&rendered),
            Err(err) => self.report_error(err),
        }
    }

    /// Record the scrubbed detail and return the short marker line.
    fn report_error(&mut self, err: DevError) -> String {
        let detail = self.filter(&err.to_string());
        self.tracebacks.push(err.category(), detail);
        format!(
            "{} {} error (:traceback for details)",
            err.marker(),
            err.category()
        )
    }

    /// Scrub outgoing text: live variable values become placeholders and
    /// local path prefixes become `~`.
    fn filter(&self, text: &str) -> String {
        let concealed = conceal_vars(text, &self.settings, &self.scope);
        scrub_paths(&concealed, &self.settings)
    }

    /// Handle a meta-command (starts with :).
    fn handle_meta_command(&mut self, cmd: &str) -> MetaResult {
        let parts: Vec<&str> = cmd.split_whitespace().collect();
        let command = parts.first().copied().unwrap_or("");

        match command {
            ":quit" | ":q" | ":exit" => MetaResult::Exit,
            ":help" | ":h" | ":?" => MetaResult::Continue(Some(HELP_TEXT.to_string())),
            ":vars" | ":scope" => MetaResult::Continue(Some(self.format_vars())),
            ":retain" => {
                let enable = match parts.get(1).copied() {
                    Some("on") => true,
                    Some("off") => false,
                    _ => !self.settings.retain,
                };
                self.settings.retain = enable;
                if !enable {
                    self.scope = Scope::new();
                }
                MetaResult::Continue(Some(format!(
                    "Retain mode: {}",
                    if enable { "ON" } else { "OFF (scope cleared)" }
                )))
            }
            ":traceback" | ":tb" => {
                let saved = self.tracebacks.drain();
                self.tracebacks.enable();
                if saved.is_empty() {
                    MetaResult::Continue(Some("(no saved tracebacks)".to_string()))
                } else {
                    let mut output = String::from("Saved tracebacks:\n");
                    for (category, detail) in saved {
                        output.push_str(&format!("  {} {category}: {detail}\n", category.marker()));
                    }
                    MetaResult::Continue(Some(output.trim_end().to_string()))
                }
            }
            ":reset" => {
                self.scope = Scope::new();
                self.session = None;
                self.tracebacks = TracebackStore::new();
                self.tracebacks.enable();
                MetaResult::Continue(Some(
                    "Session reset (scope, shell session, and tracebacks cleared)".to_string(),
                ))
            }
            _ => MetaResult::Continue(Some(format!(
                "Unknown command: {command}\nType :help for available commands."
            ))),
        }
    }

    fn format_vars(&self) -> String {
        if self.scope.is_empty() {
            return "(no variables set)".to_string();
        }
        let (mut globals, mut locals) = self.scope.items();
        globals.sort_by_key(|(name, _)| *name);
        locals.sort_by_key(|(name, _)| *name);

        let mut output = String::from("Variables:\n");
        for (name, value) in globals {
            output.push_str(&format!("  g {name} = {value}\n"));
        }
        for (name, value) in locals {
            output.push_str(&format!("  l {name} = {value}\n"));
        }
        output.trim_end().to_string()
    }
}

const HELP_TEXT: &str = r#"devkit REPL

Meta Commands:
  :help, :h, :?     Show this help
  :quit, :q         Exit the REPL
  :vars, :scope     Show all variables (by tier: g = global, l = local)
  :retain [on|off]  Toggle keeping the scope across evaluations
  :traceback, :tb   Show saved error detail (clears it)
  :reset            Clear scope, shell session, and saved tracebacks

Shell escapes:
  !<command>        Run a command in the interactive shell session
  !exit             Close the shell session

Language:
  x = 5             Assign a variable
  del x             Delete a variable
  x + 1             The trailing expression run is echoed back
  print(a, b)       Print values
  len / str / int / type
  lists: [1, 2, 3], indexing (negative too), == != < <= > >= && || !

Examples:
  x = 6 * 7
  print("answer:", x)
  [1, 2, 3][-1]
  !uname -a
"#;

/// Save REPL history to disk.
fn save_history(rl: &mut Editor<(), DefaultHistory>, history_path: &Option<PathBuf>) {
    if let Some(path) = history_path {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("Failed to create history directory: {}", e);
            }
        }
        if let Err(e) = rl.save_history(path) {
            tracing::warn!("Failed to save history: {}", e);
        }
    }
}

/// Run the REPL.
pub fn run() -> Result<()> {
    println!("devkit v{}", env!("CARGO_PKG_VERSION"));
    println!("Type :help for commands, :quit to exit.");

    let mut rl: Editor<(), DefaultHistory> =
        Editor::new().context("Failed to create editor")?;

    // Load history if it exists
    let history_path = directories::BaseDirs::new()
        .map(|b| b.data_dir().join("devkit").join("history.txt"));
    if let Some(ref path) = history_path {
        if let Err(e) = rl.load_history(path) {
            let is_not_found = matches!(&e, ReadlineError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound);
            if !is_not_found {
                tracing::warn!("Failed to load history: {}", e);
            }
        }
    }

    let mut repl = Repl::new()?;
    println!();

    loop {
        match rl.readline("devkit> ") {
            Ok(line) => {
                if let Err(e) = rl.add_history_entry(line.as_str()) {
                    tracing::warn!("Failed to add history entry: {}", e);
                }

                match repl.process_line(&line) {
                    Ok(Some(output)) => println!("{}", output),
                    Ok(None) => {}
                    Err(e) if e.to_string() == "__REPL_EXIT__" => {
                        save_history(&mut rl, &history_path);
                        return Ok(());
                    }
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        }
    }

    save_history(&mut rl, &history_path);
    Ok(())
}
