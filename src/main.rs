use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use canvapet_keys::config::Config;
use canvapet_keys::logging::init_stderr_tracing;
use canvapet_keys::shortcuts::help::{render_help_text, search};
use canvapet_keys::shortcuts::{
    DispatchOutcome, EventTarget, KeyEventHub, KeyPress, Scope, ScopeController,
    ShortcutDefinition, ShortcutDispatcher,
};

#[derive(Parser)]
#[command(
    name = "canvapet-keys",
    version,
    about = "Keyboard shortcut catalog and dispatch tools",
    disable_help_subcommand = true
)]
struct Cli {
    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List shortcuts, optionally for a single scope
    List {
        #[arg(long)]
        scope: Option<Scope>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print the help overlay text, grouped by scope
    Help,
    /// Fuzzy-search shortcuts by description or action name
    Search { query: String },
    /// Validate the configured catalog and report conflicts
    Check,
    /// Write a commented default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Read keys from the terminal and print what each one resolves to
    Log {
        /// Pin the dispatcher to this scope
        #[arg(long)]
        scope: Option<Scope>,
        /// Pretend focus is in a text input
        #[arg(long)]
        typing: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_stderr_tracing("warn")?;

    match cli.command {
        Command::List { scope, json } => list(&load_config(cli.config.as_deref())?, scope, json),
        Command::Help => {
            let registry = load_config(cli.config.as_deref())?.build_registry()?;
            print!("{}", render_help_text(&registry));
            Ok(())
        }
        Command::Search { query } => search_shortcuts(&load_config(cli.config.as_deref())?, &query),
        Command::Check => check(&load_config(cli.config.as_deref())?),
        Command::InitConfig { force } => init_config(cli.config.as_deref(), force),
        Command::Log { scope, typing } => {
            key_logger(&load_config(cli.config.as_deref())?, scope, typing)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn list(config: &Config, scope: Option<Scope>, json: bool) -> Result<()> {
    let registry = config.build_registry()?;
    let definitions: Vec<&ShortcutDefinition> = match scope {
        Some(scope) => registry.by_scope(scope),
        None => registry.all().iter().collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&definitions)?);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Scope", "Keys", "Action", "Description", "Status"]);

    for def in definitions {
        table.add_row(vec![
            def.scope.to_string(),
            def.display_keys(),
            def.action.to_string(),
            def.description.clone(),
            if def.disabled { "disabled" } else { "enabled" }.to_string(),
        ]);
    }

    println!("{table}");
    Ok(())
}

fn search_shortcuts(config: &Config, query: &str) -> Result<()> {
    let registry = config.build_registry()?;
    let results = search(&registry, query);
    if results.is_empty() {
        println!("No shortcuts match '{}'", query);
        return Ok(());
    }

    for entry in results {
        println!(
            "{:<14} {:<16} {} ({})",
            entry.scope.to_string(),
            entry.keys,
            entry.description,
            entry.action
        );
    }
    Ok(())
}

fn check(config: &Config) -> Result<()> {
    match config.build_registry() {
        Ok(registry) => {
            let disabled = registry.all().iter().filter(|d| d.disabled).count();
            println!(
                "OK: {} shortcuts ({} disabled), no conflicts",
                registry.len(),
                disabled
            );
            Ok(())
        }
        Err(e) => Err(e).context("Shortcut configuration is invalid"),
    }
}

fn init_config(path: Option<&Path>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::get_config_path()?,
    };

    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, Config::create_default_with_comments())?;
    println!("Configuration written to: {}", path.display());
    Ok(())
}

/// Leaves raw mode on every exit path
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

fn key_logger(config: &Config, scope: Option<Scope>, typing: bool) -> Result<()> {
    let registry = Arc::new(config.build_registry()?);
    let hub = KeyEventHub::new();
    let scopes = ScopeController::new();

    let mut options = config.dispatch_options();
    if let Some(scope) = scope {
        options = options.with_scope(scope);
    }

    let mut dispatcher = ShortcutDispatcher::new(Arc::clone(&registry), scopes);
    dispatcher.start(&hub, |_| Ok(()), options)?;
    let handle = dispatcher.handle();

    let target = if typing {
        EventTarget::element("input")
    } else {
        EventTarget::none()
    };

    println!("canvapet-keys key logger (scope: {})", handle.current_scope());
    println!("Press keys to see what they resolve to. Ctrl+C quits.");
    println!();

    let raw_mode = RawModeGuard::enable()?;
    let mut stdout = io::stdout();

    loop {
        hub.tick(Instant::now());

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let key = match event::read()? {
            Event::Key(key) => key,
            _ => continue,
        };

        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            break;
        }

        let mut press = match KeyPress::from_crossterm(&key, target.clone()) {
            Some(press) => press,
            None => continue,
        };
        hub.emit(&mut press);

        let outcome = handle.last_outcome().unwrap_or(DispatchOutcome::Inactive);
        let pending = handle.pending_sequence().join(" ");
        write!(
            stdout,
            "│ {:<12} │ {:<28} │ pending: {}\r\n",
            press.to_string(),
            describe(outcome),
            pending
        )?;
        stdout.flush()?;
    }

    drop(raw_mode);
    dispatcher.stop();
    println!();
    println!("Goodbye!");
    Ok(())
}

fn describe(outcome: DispatchOutcome) -> String {
    match outcome {
        DispatchOutcome::Dispatched(action) => format!("=> {}", action),
        DispatchOutcome::Suppressed(action) => format!("(suppressed {})", action),
        DispatchOutcome::HandlerFailed(action) => format!("!! {} failed", action),
        DispatchOutcome::Unmatched => "(no match)".to_string(),
        DispatchOutcome::Ignored => "(typing, ignored)".to_string(),
        DispatchOutcome::Disabled => "(disabled)".to_string(),
        DispatchOutcome::Inactive => "(inactive)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_list_scope() {
        let cli = Cli::try_parse_from(["canvapet-keys", "list", "--scope", "gallery"]).unwrap();
        match cli.command {
            Command::List { scope, json } => {
                assert_eq!(scope, Some(Scope::Gallery));
                assert!(!json);
            }
            _ => panic!("Expected list command"),
        }
    }

    #[test]
    fn test_cli_parses_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["canvapet-keys", "help", "--config", "/tmp/keys.toml"]).unwrap();
        assert!(matches!(cli.command, Command::Help));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/keys.toml")));
    }

    #[test]
    fn test_cli_rejects_unknown_scope() {
        assert!(Cli::try_parse_from(["canvapet-keys", "list", "--scope", "kitchen"]).is_err());
    }

    #[test]
    fn test_describe_outcomes() {
        assert_eq!(
            describe(DispatchOutcome::Dispatched(
                canvapet_keys::shortcuts::ShortcutAction::SavePet
            )),
            "=> save-pet"
        );
        assert_eq!(describe(DispatchOutcome::Ignored), "(typing, ignored)");
    }
}
