use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use svcrank::catalog::FeatureRepository;
use svcrank::comparison::render_table;
use svcrank::config::Config;
use svcrank::export::{export_catalog, rankings_report, write_json};
use svcrank::ingest::{import_records, load_records};
use svcrank::logging;
use svcrank::ranking::{RankingEngine, WeightVector};
use svcrank::recommend::{RecommendationFilter, Requirements};
use svcrank::server::{self, AppState};
use svcrank::store::{schema, Storage};

#[derive(Parser)]
#[command(name = "svcrank", version, about = "Service feature catalog with context-specific rankings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Skip the schema bootstrap on startup
    #[arg(long, global = true)]
    skip_migrate: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the schema and exit
    Migrate,
    /// Serve the HTTP API
    Serve,
    /// Import a JSON array of extracted service records
    Import {
        file: PathBuf,
    },
    /// Calculate rankings; every preset context unless --context is given
    Rank {
        #[arg(long)]
        context: Option<String>,
        /// JSON object of feature → weight, stored as the context's new weights
        #[arg(long, requires = "context")]
        weights: Option<PathBuf>,
    },
    /// Show the stored ranking for a context
    Rankings {
        context: String,
    },
    /// Print the feature comparison table
    Compare {
        #[arg(long)]
        category: Option<String>,
        /// Only show these services (repeatable)
        #[arg(long = "service")]
        services: Vec<String>,
    },
    /// Show one service with its features and rankings
    Summary {
        name: String,
    },
    /// Services matching every required feature, best first
    Recommend {
        #[arg(long)]
        context: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// Requirement as feature=true|false (repeatable)
        #[arg(long = "require", value_parser = parse_requirement)]
        requirements: Vec<(String, bool)>,
    },
    /// Write the catalog export and rankings report as JSON
    Export {
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Upsert the built-in categories and file uncategorized services under "todo"
    Seed,
    /// List categories
    Categories,
}

fn parse_requirement(raw: &str) -> Result<(String, bool), String> {
    let (feature, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected feature=true|false, got '{}'", raw))?;
    let value = match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => true,
        "false" | "no" | "n" | "0" => false,
        other => return Err(format!("'{}' is not a boolean", other)),
    };
    let feature = feature.trim();
    if feature.is_empty() {
        return Err("feature name cannot be empty".to_string());
    }
    Ok((feature.to_string(), value))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args
    let cli = Cli::parse();

    // 2. Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Config error (using defaults): {}", e);
        Config::default()
    });

    // 3. Initialize logging before any other output; stdout carries command results
    logging::init_logging(&config);

    // 4. Open storage and bring the schema up to date
    let storage = Storage::connect(&config)
        .await
        .context("Failed to connect to database")?;
    if matches!(cli.command, Commands::Migrate) || !cli.skip_migrate {
        schema::bootstrap(&storage).await.context("Schema bootstrap failed")?;
    }

    let repo = FeatureRepository::new(storage.clone());
    let engine = RankingEngine::new(storage.clone());

    // 5. Handle subcommands
    match cli.command {
        Commands::Migrate => {
            println!("Schema is up to date ({}).", storage.dialect().name());
        }

        Commands::Serve => {
            let state = Arc::new(AppState::new(storage.clone(), config.default_context.clone()));
            server::serve(state, &config.host, config.port).await?;
        }

        Commands::Import { file } => {
            let records = load_records(&file)?;
            let report = import_records(&repo, &records).await;
            print_json(&report)?;
            if !records.is_empty() && report.succeeded.is_empty() {
                anyhow::bail!("No records imported from {}", file.display());
            }
        }

        Commands::Rank { context: Some(context), weights } => {
            let weights: Option<WeightVector> = match weights {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    Some(serde_json::from_str(&text).with_context(|| {
                        format!("{} is not a JSON object of feature weights", path.display())
                    })?)
                }
                None => None,
            };
            let ranked = engine.calculate_rankings(&context, weights.as_ref()).await?;
            print_json(&ranked)?;
        }

        Commands::Rank { context: None, .. } => {
            let all = engine.generate_all_rankings().await?;
            let by_context: std::collections::BTreeMap<_, _> = all.into_iter().collect();
            print_json(&by_context)?;
        }

        Commands::Rankings { context } => {
            print_json(&engine.get_rankings(&context).await?)?;
        }

        Commands::Compare { category, services } => {
            let mut matrix = repo.get_feature_comparison(category.as_deref()).await?;
            if !services.is_empty() {
                matrix.retain_services(|name| services.iter().any(|s| s == name));
            }
            print!("{}", render_table(&matrix));
        }

        Commands::Summary { name } => {
            let summary = repo
                .get_service_summary(&name)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Service not found: {}", name))?;
            print_json(&summary)?;
        }

        Commands::Recommend { context, category, requirements } => {
            let context = context.unwrap_or_else(|| config.default_context.clone());
            let requirements: Requirements = requirements.into_iter().collect();
            let filter = RecommendationFilter::new(repo.clone(), engine.clone());
            let result = filter.recommend(&requirements, &context, category.as_deref()).await?;
            print_json(&result)?;
        }

        Commands::Export { out } => {
            let catalog_path = out.join("todo_services_data.json");
            let report_path = out.join("rankings_report.json");
            write_json(&catalog_path, &export_catalog(&repo).await?)?;
            write_json(&report_path, &rankings_report(&engine, &repo).await?)?;
            print_json(&serde_json::json!({
                "catalog": catalog_path,
                "rankings_report": report_path,
            }))?;
        }

        Commands::Seed => {
            let seeded = repo.seed_categories().await?;
            let assigned = repo.assign_uncategorized("todo").await?;
            print_json(&serde_json::json!({
                "categories": seeded.into_iter().collect::<std::collections::BTreeMap<_, _>>(),
                "assigned_to_todo": assigned,
            }))?;
        }

        Commands::Categories => {
            print_json(&repo.get_categories().await?)?;
        }
    }

    storage.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_requirement() {
        assert_eq!(parse_requirement("free_tier=true"), Ok(("free_tier".to_string(), true)));
        assert_eq!(parse_requirement("offline_mode=no"), Ok(("offline_mode".to_string(), false)));
        assert!(parse_requirement("free_tier").is_err());
        assert!(parse_requirement("free_tier=maybe").is_err());
        assert!(parse_requirement("=true").is_err());
    }

    #[test]
    fn test_cli_parses_repeated_requirements() {
        let cli = Cli::try_parse_from([
            "svcrank",
            "recommend",
            "--context",
            "team_collaboration",
            "--require",
            "free_tier=true",
            "--require",
            "collaboration=true",
        ])
        .unwrap();
        match cli.command {
            Commands::Recommend { context, requirements, .. } => {
                assert_eq!(context.as_deref(), Some("team_collaboration"));
                assert_eq!(requirements.len(), 2);
            }
            _ => panic!("expected recommend"),
        }
    }
}
