use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};

use stackctl::cli::{Cli, Commands};
use stackctl::common::config::{self, Settings};
use stackctl::common::paths::expand_path;
use stackctl::completions::{self, CompletionCommands};
use stackctl::orchestrator::{ExecutionMode, Orchestrator, PackageStatus, RemovalOptions};
use stackctl::package::validation::{safe_join, sanitize_names};
use stackctl::package::{Category, detect_circular_dependencies, installation_order};
use stackctl::ui::{self, prelude::*};

fn json_mode() -> bool {
    matches!(get_output_format(), OutputFormat::Json)
}

fn mode(parallel: bool, settings: &Settings) -> ExecutionMode {
    if parallel || settings.parallel {
        ExecutionMode::Parallel
    } else {
        ExecutionMode::Sequential
    }
}

fn print_list(statuses: &[PackageStatus]) {
    if json_mode() {
        emit(
            Level::Info,
            "list",
            &format!("{} packages", statuses.len()),
            Some(serde_json::json!(statuses)),
        );
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Package", "Category", "Installed", "Version", "Depends on"]);
    for status in statuses {
        let installed = if status.installed {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("no").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(&status.name),
            Cell::new(status.category),
            installed,
            Cell::new(status.version.as_deref().unwrap_or("-")),
            Cell::new(status.dependencies.join(", ")),
        ]);
    }
    println!("{table}");
}

fn print_status(status: &PackageStatus) {
    if json_mode() {
        emit(
            Level::Info,
            "status",
            &status.name,
            Some(serde_json::json!(status)),
        );
        return;
    }

    println!("{} - {}", status.name.bold(), status.description);
    println!("  {: <18} {}", "Category:", status.category);
    let installed = if status.installed {
        "yes".green()
    } else {
        "no".red()
    };
    println!("  {: <18} {}", "Installed:", installed);
    println!(
        "  {: <18} {}",
        "Version:",
        status.version.as_deref().unwrap_or("-")
    );
    println!("  {: <18} {}", "Installed via:", status.installation_type);
    if !status.supported_versions.is_empty() {
        println!(
            "  {: <18} {}",
            "Versions:",
            status.supported_versions.join(", ")
        );
    }
    if !status.dependencies.is_empty() {
        println!("  {: <18} {}", "Depends on:", status.dependencies.join(", "));
    }
}

/// Cycles and script paths; returns whether the catalog is usable
fn check_catalog(orchestrator: &Orchestrator, settings: &Settings) -> bool {
    let registry = orchestrator.registry();
    let mut healthy = true;

    match detect_circular_dependencies(registry) {
        Ok(()) => emit(
            Level::Success,
            "check.cycles",
            &format!("{} packages, no circular dependencies", registry.len()),
            None,
        ),
        Err(err) => {
            healthy = false;
            emit(Level::Error, "check.cycles", &err.to_string(), None);
        }
    }

    for pkg in registry.all() {
        match safe_join(&settings.install_root, &pkg.script_path) {
            Ok(path) if path.is_file() => emit(
                Level::Debug,
                "check.script",
                &format!("{}: {}", pkg.name, path.display()),
                None,
            ),
            Ok(path) => emit(
                Level::Warn,
                "check.script.missing",
                &format!("{}: install script {} not found", pkg.name, path.display()),
                Some(serde_json::json!({ "package": pkg.name })),
            ),
            Err(err) => {
                healthy = false;
                emit(
                    Level::Error,
                    "check.script.invalid",
                    &format!("{}: {}", pkg.name, err),
                    Some(serde_json::json!({ "package": pkg.name })),
                );
            }
        }
    }
    healthy
}

async fn run(command: Commands, mut settings: Settings) -> Result<bool> {
    match command {
        Commands::Install {
            packages,
            version,
            parallel,
            timeout,
        } => {
            let names = sanitize_names(&packages);
            if version.is_some() && names.len() != 1 {
                anyhow::bail!("--version can only be used with a single package");
            }
            if timeout.is_some() {
                settings.script_timeout_secs = timeout;
            }
            let orchestrator = Orchestrator::for_host(&settings)?;
            let summary = orchestrator
                .install(names, version, mode(parallel, &settings))
                .await;
            summary.print();
            Ok(!summary.has_failures())
        }
        Commands::Remove {
            packages,
            force,
            dry_run,
            parallel,
        } => {
            let orchestrator = Orchestrator::for_host(&settings)?;
            let summary = orchestrator
                .remove(
                    sanitize_names(&packages),
                    RemovalOptions { force, dry_run },
                    mode(parallel, &settings),
                )
                .await;
            summary.print();
            Ok(!summary.has_failures())
        }
        Commands::List { category } => {
            let orchestrator = Orchestrator::for_host(&settings)?;
            let statuses = orchestrator
                .registry()
                .all()
                .into_iter()
                .filter(|pkg| category.is_none_or(|c: Category| pkg.category == c))
                .map(|pkg| orchestrator.status(&pkg.name))
                .collect::<stackctl::Result<Vec<_>>>()?;
            print_list(&statuses);
            Ok(true)
        }
        Commands::Status { package } => {
            let orchestrator = Orchestrator::for_host(&settings)?;
            let name = package.trim().to_lowercase();
            let status = orchestrator.status(&name)?;
            print_status(&status);
            Ok(true)
        }
        Commands::Order { packages } => {
            let orchestrator = Orchestrator::for_host(&settings)?;
            let order = installation_order(orchestrator.registry(), &sanitize_names(&packages))?;
            if json_mode() {
                emit(
                    Level::Info,
                    "order",
                    &order.join(" "),
                    Some(serde_json::json!({ "order": order })),
                );
            } else {
                for (index, name) in order.iter().enumerate() {
                    println!("{:>3}. {}", index + 1, name);
                }
            }
            Ok(true)
        }
        Commands::Check => {
            let orchestrator = Orchestrator::for_host(&settings)?;
            Ok(check_catalog(&orchestrator, &settings))
        }
        Commands::Cleanup { max_age_hours } => {
            let orchestrator = Orchestrator::for_host(&settings)?;
            let max_age = max_age_hours
                .map(config::hours)
                .unwrap_or_else(|| settings.rollback_max_age());
            let removed = orchestrator
                .rollback()
                .cleanup_old_rollback_points(max_age)
                .context("sweeping rollback points")?;
            emit(
                Level::Success,
                "cleanup.done",
                &format!(
                    "Removed {} rollback point(s) from {}",
                    removed,
                    orchestrator.rollback().root().display()
                ),
                Some(serde_json::json!({ "removed": removed })),
            );
            Ok(true)
        }
        Commands::Completions { command } => {
            match command {
                CompletionCommands::Generate { shell } => {
                    print!("{}", completions::generate(shell)?);
                }
                CompletionCommands::Install {
                    shell,
                    output,
                    force,
                } => {
                    let path = completions::install(shell, output, force)?;
                    emit(
                        Level::Success,
                        "completions.installed",
                        &format!("Installed {} completions to {}", shell, path.display()),
                        None,
                    );
                    println!("{}", completions::instructions(shell, &path));
                }
            }
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    ui::init(cli.output, !cli.no_color);
    ui::set_debug_mode(cli.debug);
    if cli.no_color {
        colored::control::set_override(false);
    }

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(root) = &cli.root {
        settings.install_root = expand_path(root);
    }
    emit(
        Level::Debug,
        "config.loaded",
        &format!("Using install root {}", settings.install_root.display()),
        None,
    );

    if !run(cli.command, settings).await? {
        std::process::exit(1);
    }
    Ok(())
}
