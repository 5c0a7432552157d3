// src/main.rs

use anyhow::{Context, Result};
use cfgstore::db::models::{ConfigSet, Revision};
use cfgstore::{CfgstoreConfig, GitilesClient, ImportEngine, ImportReport};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "cfgstore")]
#[command(author, version, about = "Import configuration from source control into a content-addressed store", long_about = None)]
struct Cli {
    /// Configuration file (default: /etc/cfgstore/cfgstore.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path, overriding the configuration file
    #[arg(short, long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,
    /// Import config sets (services and projects by default)
    Import {
        /// Only import services
        #[arg(long, conflicts_with_all = ["projects", "config_set"])]
        services: bool,
        /// Only import projects and their branches
        #[arg(long, conflicts_with = "config_set")]
        projects: bool,
        /// Import one config set from a location: NAME LOCATION
        #[arg(long, num_args = 2, value_names = ["NAME", "LOCATION"])]
        config_set: Option<Vec<String>>,
    },
    /// Show a config set and its revisions
    Show {
        /// Config set name, e.g. services/luci-config
        name: String,
    },
    /// Print a file from the latest revision of a config set
    Cat {
        /// Config set name
        name: String,
        /// Path inside the config set
        path: String,
    },
}

fn load_config(path: Option<&Path>) -> Result<CfgstoreConfig> {
    match path {
        Some(path) => CfgstoreConfig::load(path),
        None => {
            let default = Path::new(cfgstore::config::DEFAULT_CONFIG_PATH);
            if default.exists() {
                CfgstoreConfig::load(default)
            } else {
                Ok(CfgstoreConfig::default())
            }
        }
    }
}

fn print_report(report: &ImportReport) {
    for (name, outcome) in &report.outcomes {
        println!("  [{}] {}", outcome, name);
    }
    for (name, error) in &report.failures {
        println!("  [FAILED] {}: {}", name, error);
    }
    println!(
        "{} imported, {} published, {} failed",
        report.outcomes.len(),
        report.published().count(),
        report.failures.len()
    );
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let db_path = cli.db_path.unwrap_or_else(|| config.storage.db_path.clone());

    match cli.command {
        Commands::Init => {
            info!("Initializing cfgstore database at: {}", db_path.display());
            cfgstore::db::init(&db_path)?;
            println!("Database initialized successfully at: {}", db_path.display());
            Ok(())
        }
        Commands::Import {
            services,
            projects,
            config_set,
        } => {
            let client = GitilesClient::with_timeout(config.gitiles.timeout())?
                .with_token(config.gitiles.auth_token());
            let engine = ImportEngine::new(&db_path, Arc::new(client), config.import_settings());

            let report = if let Some(args) = config_set {
                let [name, location] = args.as_slice() else {
                    anyhow::bail!("--config-set takes NAME LOCATION");
                };
                let mut report = ImportReport::default();
                match engine.import_config_set(name, location) {
                    Ok(outcome) => {
                        report.outcomes.insert(name.clone(), outcome);
                    }
                    Err(e) => {
                        report.failures.insert(name.clone(), e.to_string());
                    }
                }
                report
            } else if services {
                engine.import_services()?
            } else if projects {
                engine.import_projects()?
            } else {
                engine.import_all()?
            };

            print_report(&report);
            if report.has_failures() {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Show { name } => {
            let conn = cfgstore::db::open(&db_path)?;
            let cs = ConfigSet::find_by_name(&conn, &name)?
                .ok_or_else(|| anyhow::anyhow!("Config set '{}' not found", name))?;

            println!("{}", cs.name);
            println!("  Location: {} ({})", cs.location, cs.location_type);
            println!("  Latest:   {}", cs.latest_revision.as_deref().unwrap_or("(none)"));
            println!("  Imported: {}", cs.last_import_at.as_deref().unwrap_or("(never)"));

            if let Some(latest) = &cs.latest_revision {
                if let Some(manifest) = Revision::get_manifest(&conn, &name, latest)? {
                    println!("  Files:");
                    for (path, hash) in manifest {
                        println!("    {}  {}", hash, path);
                    }
                }
            }

            let revisions = Revision::list_for_config_set(&conn, &name)?;
            println!("  Revisions: {}", revisions.len());
            Ok(())
        }
        Commands::Cat { name, path } => {
            let conn = cfgstore::db::open(&db_path)?;
            let content = cfgstore::storage::read_latest_file(&conn, &name, &path)?
                .with_context(|| format!("{} has no file {}", name, path))?;
            std::io::stdout().write_all(&content)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_config_set() {
        let cli = Cli::try_parse_from([
            "cfgstore",
            "import",
            "--config-set",
            "services/x",
            "https://localhost/x",
        ])
        .unwrap();
        match cli.command {
            Commands::Import { config_set, .. } => {
                assert_eq!(
                    config_set,
                    Some(vec!["services/x".to_string(), "https://localhost/x".to_string()])
                );
            }
            _ => panic!("expected import"),
        }
    }

    #[test]
    fn test_cli_rejects_conflicting_modes() {
        assert!(Cli::try_parse_from(["cfgstore", "import", "--services", "--projects"]).is_err());
    }
}
