//! Tagview CLI application entry point
//!
//! # Usage
//!
//! ```bash
//! # Facets at the top of the tree (default command)
//! tagview
//! tagview list /
//!
//! # Narrow down and list matching items
//! tagview list "/holiday/,not/me/,evaluate"
//!
//! # Rename a tag in config files, content, names and directories
//! tagview rename /person/me /person/myself
//!
//! # Report configuration and scan problems
//! tagview check
//!
//! # Machine-readable output
//! tagview --json tags
//! ```
//!
//! # Configuration
//!
//! The configuration is read from `~/.config/tagview/config.toml` on Linux
//! unless `--config` names another file. `tagview init <root>` writes a
//! starter file. Log verbosity follows `RUST_LOG` (default `info`).

use std::path::Path;

use tagview::{
    TagTree, TagviewError,
    cli::{Cli, Commands},
    config, output,
    query::QueryOptions,
};
use tracing_subscriber::EnvFilter;

type Result<T> = std::result::Result<T, TagviewError>;

fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn handle_init(config_path: &Path, root: &Path, force: bool, quiet: bool) -> Result<()> {
    if config_path.exists() && !force {
        return Err(TagviewError::InvalidInput(format!(
            "{} already exists, use --force to overwrite",
            config_path.display()
        )));
    }
    let root = std::fs::canonicalize(root)?;
    config::write(config_path, &config::example(&root)?)?;
    if !quiet {
        println!("Wrote {}", config_path.display());
    }
    Ok(())
}

fn handle_list(tree: &TagTree, cli: &Cli, query: &str, flat: bool) -> Result<()> {
    let options = QueryOptions {
        hierarchical: tree.settings().hierarchical_facets && !flat,
    };
    let listing = tree.list_with(query, options);
    if cli.json {
        println!("{}", output::json(&listing)?);
    } else {
        for line in output::listing(&listing, cli.path_format(), cli.quiet) {
            println!("{line}");
        }
    }
    Ok(())
}

fn handle_check(tree: &TagTree, cli: &Cli) -> Result<()> {
    let reports = tree.rescan(true);
    let mut problems: Vec<String> = tree.errors().to_vec();
    problems.extend(reports.iter().flat_map(|r| r.errors.iter().map(|e| format!("{}: {e}", r.input))));
    if cli.json {
        println!("{}", output::json(&problems)?);
    } else {
        if !cli.quiet {
            for report in &reports {
                println!("{}: {} item(s)", report.input, report.items);
            }
        }
        for problem in &problems {
            println!("{problem}");
        }
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(TagviewError::InvalidInput(format!("{} problem(s) found", problems.len())))
    }
}

fn handle_rename(tree: &mut TagTree, cli: &Cli, from: &str, to: &str) -> Result<()> {
    let summary = tree.rename(from, to)?;
    if cli.json {
        println!("{}", output::json(&summary)?);
    } else if !cli.quiet {
        println!("{}", output::rename_summary(&summary));
    }
    Ok(())
}

fn handle_tags(tree: &TagTree, cli: &Cli) -> Result<()> {
    let tags = tree.tags();
    if cli.json {
        println!("{}", output::json(&tags)?);
    } else {
        for tag in &tags {
            println!("{}", output::tag_line(tag, cli.quiet));
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.quiet);

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config::default_config_path()?,
    };
    let command = cli.get_command();

    match &command {
        Commands::Init { root, force } => handle_init(&config_path, root, *force, cli.quiet),
        Commands::List { query, flat } => handle_list(&TagTree::load(config_path)?, &cli, query, *flat),
        Commands::Rename { from, to } => handle_rename(&mut TagTree::load(config_path)?, &cli, from, to),
        Commands::Check => handle_check(&TagTree::load(config_path)?, &cli),
        Commands::Tags => handle_tags(&TagTree::load(config_path)?, &cli),
    }
}
