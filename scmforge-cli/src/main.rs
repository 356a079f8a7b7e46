//! scmforge CLI
//!
//! Command-line interface for bulk-provisioning Strata Cloud Manager objects.
//!
//! # Usage
//!
//! ```bash
//! # Create every tag in a definitions file
//! scmforge create tags tags.json --folder Shared
//!
//! # Resume a security rule batch from the 120th definition
//! scmforge create security-rules rules.json --position pre --start-index 120
//!
//! # List address objects in a folder
//! scmforge list addresses --folder "Mobile Users"
//!
//! # Fetch one object by path
//! scmforge get "/sse/config/v1/addresses?name=web-01&folder=Shared"
//!
//! # Move a rule to the top of the pre rulebase
//! scmforge move-rule 5f0e... --destination top --rulebase pre
//!
//! # Check (or force) the cached access token
//! scmforge token --force
//! ```

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use scmforge_core::{
    BatchOrchestrator, BatchReport, ClientCredentialsProvider, FileTokenStore, HttpTransport,
    MoveDestination, MoveRule, ObjectDefinition, ObjectType, RetryPolicy, Rulebase, ScmClient,
    TokenGuard, endpoint::parse_base,
};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::ScmforgeConfig;

#[derive(Parser)]
#[command(name = "scmforge")]
#[command(about = "Bulk-provision Strata Cloud Manager configuration objects")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true, env = "SCMFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Also append log events to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create every object in a JSON definitions file
    Create {
        /// Object type (e.g., tags, addresses, security-rules)
        object_type: ObjectType,

        /// JSON file holding an array of object definitions
        file: PathBuf,

        /// Target folder
        #[arg(short, long, default_value = "Shared")]
        folder: String,

        /// Skip definitions before this index
        #[arg(long, default_value_t = 0)]
        start_index: usize,

        /// Concurrent requests (defaults to max_workers from config)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Raw query fragment placed ahead of the folder, e.g. "position=pre&"
        #[arg(long, default_value = "")]
        extra_params: String,

        /// Rulebase for security and NAT rules (pre, post)
        #[arg(long)]
        position: Option<Rulebase>,
    },

    /// List objects of a type in a folder
    List {
        /// Object type
        object_type: ObjectType,

        /// Folder to list
        #[arg(short, long, default_value = "Shared")]
        folder: String,

        /// Rulebase for security and NAT rules (pre, post)
        #[arg(long)]
        position: Option<Rulebase>,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Fetch one object by API path and print its data as JSON
    Get {
        /// Path and query under the API base URL
        path: String,
    },

    /// Move a security rule within its rulebase
    MoveRule {
        /// ID of the rule to move
        rule_id: String,

        /// Where to move it (top, bottom, before, after)
        #[arg(short, long)]
        destination: MoveDestination,

        /// Rulebase holding the rule (pre, post)
        #[arg(short, long, default_value = "pre")]
        rulebase: Rulebase,

        /// Anchor rule ID for before/after
        #[arg(long)]
        destination_rule: Option<String>,
    },

    /// Show the cached access token's expiry, refreshing it if needed
    Token {
        /// Fetch a new token even if the cached one is still valid
        #[arg(short, long)]
        force: bool,

        /// Print the raw access token to stdout
        #[arg(long)]
        print: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    let config = ScmforgeConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    config.validate()?;
    let client = build_client(&config)?;

    match cli.command {
        Commands::Create {
            object_type,
            file,
            folder,
            start_index,
            workers,
            extra_params,
            position,
        } => {
            let extra_params = rule_params(object_type, position, extra_params);
            let workers = workers.unwrap_or(config.max_workers);
            let policy = RetryPolicy::new(config.max_retries, config.retry_delay());
            create_objects(
                &client,
                object_type,
                &file,
                &folder,
                &extra_params,
                start_index,
                workers,
                policy,
            )
            .await
        }
        Commands::List {
            object_type,
            folder,
            position,
            format,
        } => list_objects(&client, object_type, &folder, position, &format).await,
        Commands::Get { path } => {
            let policy = RetryPolicy::new(config.max_retries, config.retry_delay());
            let data = client.get_object(&path, &policy).await?;
            println!("{}", serde_json::to_string_pretty(&data)?);
            Ok(())
        }
        Commands::MoveRule {
            rule_id,
            destination,
            rulebase,
            destination_rule,
        } => {
            let request = MoveRule::new(destination, rulebase, destination_rule)?;
            client.move_rule(&rule_id, &request).await?;
            println!("Moved rule {}", rule_id);
            Ok(())
        }
        Commands::Token { force, print } => show_token(&client, force, print).await,
    }
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Log file {:?} has no file name", path))?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    Ok(guard)
}

fn build_client(config: &ScmforgeConfig) -> Result<ScmClient> {
    let credentials = config.credentials()?;
    let provider = ClientCredentialsProvider::new(config.auth_url.as_str(), &credentials)?;
    let store = FileTokenStore::new(&config.token_file);
    let guard = TokenGuard::new(Arc::new(provider), Arc::new(store))
        .with_expiry_buffer(config.expiry_buffer());

    let base_url = parse_base(&config.api_base_url)?;
    Ok(ScmClient::new(base_url, Arc::new(guard), Arc::new(HttpTransport::new()))
        .with_timeout(config.request_timeout()))
}

/// Rule types need a rulebase in their query; default to `pre` unless the
/// caller already passed one through `extra_params`.
fn rule_params(object_type: ObjectType, position: Option<Rulebase>, extra_params: String) -> String {
    if !object_type.is_rulebase() {
        if position.is_some() {
            tracing::warn!("--position is ignored for {}", object_type);
        }
        return extra_params;
    }
    if extra_params.contains("position=") {
        return extra_params;
    }
    let position = position.unwrap_or(Rulebase::Pre);
    format!("position={}&{}", position.as_str(), extra_params)
}

fn load_definitions(file: &Path) -> Result<Vec<ObjectDefinition>> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read definitions from {:?}", file))?;
    let value: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse definitions from {:?}", file))?;
    Ok(ObjectDefinition::parse_list(value)?)
}

#[allow(clippy::too_many_arguments)]
async fn create_objects(
    client: &ScmClient,
    object_type: ObjectType,
    file: &Path,
    folder: &str,
    extra_params: &str,
    start_index: usize,
    workers: usize,
    policy: RetryPolicy,
) -> Result<()> {
    let definitions = load_definitions(file)?;
    if definitions.is_empty() {
        bail!("{:?} contains no object definitions", file);
    }

    let creator = client.creator(object_type, folder, extra_params)?;
    info!(
        "Creating {} {} in {} with {} workers",
        definitions.len().saturating_sub(start_index),
        object_type,
        folder,
        workers
    );

    let batch = BatchOrchestrator::new(Arc::new(creator), policy);
    let outcomes = batch
        .resume(definitions, start_index, workers)
        .await
        .context("Batch aborted")?;

    for outcome in &outcomes {
        println!("{}", outcome);
    }

    let report = BatchReport::from_outcomes(outcomes);
    report.log();
    println!("{}", report);
    Ok(())
}

async fn list_objects(
    client: &ScmClient,
    object_type: ObjectType,
    folder: &str,
    position: Option<Rulebase>,
    format: &str,
) -> Result<()> {
    let position = match position {
        None if object_type.is_rulebase() => Some(Rulebase::Pre),
        other => other,
    };
    let objects = client.list_all(object_type, folder, position).await?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&objects)?);
        }
        _ => {
            println!("{} {} in {}:", objects.len(), object_type, folder);
            for object in &objects {
                let name = object.get("name").and_then(|n| n.as_str()).unwrap_or("<unnamed>");
                match object.get("id").and_then(|id| id.as_str()) {
                    Some(id) => println!("  {} ({})", name, id),
                    None => println!("  {}", name),
                }
            }
        }
    }
    Ok(())
}

async fn show_token(client: &ScmClient, force: bool, print: bool) -> Result<()> {
    let credential = client.guard().obtain_token(force).await?;
    if print {
        println!("{}", credential.access_token.expose());
    } else {
        println!("Token valid until {}", credential.expires_at.to_rfc3339());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rule_params_defaults_to_pre() {
        assert_eq!(
            rule_params(ObjectType::SecurityRules, None, String::new()),
            "position=pre&"
        );
        assert_eq!(
            rule_params(ObjectType::NatRules, Some(Rulebase::Post), String::new()),
            "position=post&"
        );
    }

    #[test]
    fn test_rule_params_respects_explicit_fragment() {
        assert_eq!(
            rule_params(ObjectType::SecurityRules, None, "position=post&".to_string()),
            "position=post&"
        );
        assert_eq!(rule_params(ObjectType::Tags, Some(Rulebase::Pre), String::new()), "");
    }

    #[test]
    fn test_load_definitions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tags.json");
        std::fs::write(&path, r#"[{"name": "a", "color": "Red"}, {"name": "b"}]"#).unwrap();

        let definitions = load_definitions(&path).unwrap();
        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[1].name(), "b");
    }

    #[test]
    fn test_load_definitions_rejects_nameless() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tags.json");
        std::fs::write(&path, r#"[{"name": "a"}, {"color": "Red"}]"#).unwrap();

        assert!(load_definitions(&path).is_err());
    }

    #[test]
    fn test_cli_parses_create() {
        let cli = Cli::try_parse_from([
            "scmforge",
            "create",
            "security-rules",
            "rules.json",
            "--position",
            "post",
            "--start-index",
            "5",
        ])
        .unwrap();

        match cli.command {
            Commands::Create {
                object_type,
                start_index,
                position,
                folder,
                ..
            } => {
                assert_eq!(object_type, ObjectType::SecurityRules);
                assert_eq!(start_index, 5);
                assert_eq!(position, Some(Rulebase::Post));
                assert_eq!(folder, "Shared");
            }
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn test_cli_parses_get() {
        let cli = Cli::try_parse_from(["scmforge", "get", "/sse/config/v1/tags?folder=Shared"])
            .unwrap();
        match cli.command {
            Commands::Get { path } => assert_eq!(path, "/sse/config/v1/tags?folder=Shared"),
            _ => panic!("expected get"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_type() {
        assert!(Cli::try_parse_from(["scmforge", "list", "widgets"]).is_err());
    }
}
