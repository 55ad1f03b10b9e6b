use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use harvest_engine::{Requester, build_http_clients, load_definitions_file};
use harvest_types::{PossibleArgs, ResourceIdentifier};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let matches = build_cli().get_matches();

    let definitions_path = matches
        .get_one::<String>("definitions")
        .context("--definitions is required")?;

    match matches.subcommand() {
        Some(("fetch", fetch_matches)) => run_fetch(definitions_path, fetch_matches).await,
        _ => anyhow::bail!("expected a subcommand; see --help"),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init();
}

/// `RUST_LOG` directives, or `info` when unset or invalid.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn build_cli() -> Command {
    Command::new("harvest")
        .about("Fetch resources described by declarative adapter definitions")
        .arg(
            Arg::new("definitions")
                .long("definitions")
                .short('d')
                .action(ArgAction::Set)
                .required(true)
                .global(true)
                .help("Path to the adapter definitions YAML/JSON"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("fetch")
                .about("Fetch every record of a resource type")
                .arg(Arg::new("type").required(true).help("Resource type name, e.g. Ticket"))
                .arg(
                    Arg::new("arg")
                        .long("arg")
                        .short('a')
                        .action(ArgAction::Append)
                        .value_name("NAME=VALUE")
                        .help("Candidate value for an argument root; JSON, or a plain string. Repeatable"),
                )
                .arg(
                    Arg::new("pretty")
                        .long("pretty")
                        .action(ArgAction::SetTrue)
                        .help("Pretty-print the JSON output"),
                ),
        )
}

async fn run_fetch(definitions_path: &str, matches: &ArgMatches) -> Result<()> {
    let type_name = matches.get_one::<String>("type").context("resource type is required")?;
    let raw_args: Vec<&str> = matches
        .get_many::<String>("arg")
        .map(|values| values.map(String::as_str).collect())
        .unwrap_or_default();
    let possible_args = parse_possible_args(&raw_args)?;

    let definitions = load_definitions_file(definitions_path)?;
    let clients = build_http_clients(&definitions)?;
    let requester = Requester::new(Arc::new(definitions), clients);

    let items = requester
        .request_all_for_resource(&possible_args, &ResourceIdentifier::new(type_name.clone()))
        .await
        .with_context(|| format!("Failed to fetch {type_name}"))?;
    info!(type_name = %type_name, item_count = items.len(), "fetch finished");

    let output = if matches.get_flag("pretty") {
        serde_json::to_string_pretty(&items)?
    } else {
        serde_json::to_string(&items)?
    };
    println!("{output}");
    Ok(())
}

/// Parses `name=value` pairs into an argument pool; repeated names accumulate.
fn parse_possible_args(raw_args: &[&str]) -> Result<PossibleArgs> {
    let mut possible_args = PossibleArgs::new();
    for raw in raw_args {
        let (name, value) = raw
            .split_once('=')
            .with_context(|| format!("invalid --arg '{raw}': expected NAME=VALUE"))?;
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("invalid --arg '{raw}': name is empty");
        }
        let value = serde_json::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()));
        possible_args.entry(name.to_string()).or_default().push(value);
    }
    Ok(possible_args)
}
