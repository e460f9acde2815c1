//! `exed-cms`: command-line administration of site content and collections

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use cms_content::Snapshot;
use cms_core::{BackendKind, CmsConfig, CmsService, StorageKind};
use cms_reconcile::{ChangeSet, ReconciliationResult, SaveStatus};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("exed-cms")
        .version(cms_core::VERSION)
        .about("Content backend administration for the exec-ed site")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Path to config file (default: $EXED_CMS_CONFIG)"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("content")
                .about("Read and write singleton site content")
                .subcommand_required(true)
                .subcommand(
                    Command::new("get")
                        .about("Print stored content as JSON")
                        .arg(Arg::new("type").required(true).help("Content type")),
                )
                .subcommand(
                    Command::new("set")
                        .about("Store content from a JSON file")
                        .arg(Arg::new("type").required(true).help("Content type"))
                        .arg(
                            Arg::new("file")
                                .required(true)
                                .value_parser(value_parser!(PathBuf))
                                .help("JSON file, or - for stdin"),
                        ),
                )
                .subcommand(
                    Command::new("rm")
                        .about("Remove content from every key")
                        .arg(Arg::new("type").required(true).help("Content type")),
                ),
        )
        .subcommand(Command::new("keys").about("List content types and their storage keys"))
        .subcommand(
            Command::new("collection")
                .about("Inspect and save item collections")
                .subcommand_required(true)
                .subcommand(
                    Command::new("list")
                        .about("Print persisted items as JSON")
                        .arg(Arg::new("name").required(true).help("Collection name")),
                )
                .subcommand(
                    Command::new("sync")
                        .about("Save a working snapshot against the persisted collection")
                        .arg(Arg::new("name").required(true).help("Collection name"))
                        .arg(
                            Arg::new("working")
                                .long("working")
                                .required(true)
                                .value_parser(value_parser!(PathBuf))
                                .help("JSON array of items"),
                        ),
                )
                .subcommand(
                    Command::new("diff")
                        .about("Print the change set between two snapshots")
                        .arg(Arg::new("name").required(true).help("Collection name"))
                        .arg(
                            Arg::new("original")
                                .long("original")
                                .required(true)
                                .value_parser(value_parser!(PathBuf))
                                .help("JSON array of persisted items"),
                        )
                        .arg(
                            Arg::new("working")
                                .long("working")
                                .required(true)
                                .value_parser(value_parser!(PathBuf))
                                .help("JSON array of edited items"),
                        ),
                ),
        )
}

fn init_tracing(filter: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn required<'a, T>(args: &'a ArgMatches, name: &str) -> Result<&'a T>
where
    T: Clone + Send + Sync + 'static,
{
    args.get_one::<T>(name)
        .with_context(|| format!("missing argument <{name}>"))
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let text = read_input(path)?;
    Snapshot::from_json(&text).with_context(|| format!("invalid snapshot in {}", path.display()))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_change_set(change_set: &ChangeSet) -> Result<()> {
    print_json(&serde_json::json!({
        "created": change_set.created,
        "updated": change_set.updated,
        "deleted": change_set.deleted,
    }))
}

fn print_result(result: &ReconciliationResult) {
    println!(
        "{:?}: {} created, {} updated, {} deleted, {} failed",
        result.status(),
        result.created,
        result.updated,
        result.deleted,
        result.failures.len()
    );
    for failure in &result.failures {
        println!("  {} failed: {}", failure.operation, failure.error);
    }
    for item in &result.unmatched {
        if let Some(id) = &item.id {
            println!("  created {id} without a matching working item");
        }
    }
}

fn run_content(service: &CmsService, args: &ArgMatches) -> Result<()> {
    match args.subcommand() {
        Some(("get", sub)) => {
            let content_type = required::<String>(sub, "type")?;
            let value: serde_json::Value =
                service.read_content(content_type, serde_json::Value::Null);
            print_json(&value)
        }
        Some(("set", sub)) => {
            let content_type = required::<String>(sub, "type")?;
            let path = required::<PathBuf>(sub, "file")?;
            let payload: serde_json::Value = serde_json::from_str(&read_input(path)?)
                .with_context(|| format!("invalid JSON in {}", path.display()))?;

            let report = service.write_content(content_type, &payload)?;
            println!("Saved {content_type} to {}", report.written.join(", "));
            for (key, error) in &report.failed {
                println!("  {key} failed: {error}");
            }
            Ok(())
        }
        Some(("rm", sub)) => {
            let content_type = required::<String>(sub, "type")?;
            let report = service.remove_content(content_type)?;
            println!("Removed {content_type} from {} keys", report.written.len());
            Ok(())
        }
        _ => bail!("unknown content command"),
    }
}

async fn run_collection(service: &CmsService, args: &ArgMatches) -> Result<()> {
    match args.subcommand() {
        Some(("list", sub)) => {
            let name = required::<String>(sub, "name")?;
            print_json(&service.list_collection(name).await?)
        }
        Some(("sync", sub)) => {
            let name = required::<String>(sub, "name")?;
            let working = read_snapshot(required::<PathBuf>(sub, "working")?)?;

            let result = service.sync_collection(name, working).await?;
            print_result(&result);
            if result.status() == SaveStatus::Failed {
                bail!("no change to {name} was saved");
            }
            Ok(())
        }
        Some(("diff", sub)) => {
            let name = required::<String>(sub, "name")?;
            let original = read_snapshot(required::<PathBuf>(sub, "original")?)?;
            let working = read_snapshot(required::<PathBuf>(sub, "working")?)?;

            print_change_set(&service.diff_collection(name, &original, &working)?)
        }
        _ => bail!("unknown collection command"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let config = CmsConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))
        .context("failed to load configuration")?;
    init_tracing(&config.log_filter, matches.get_flag("log-json"));

    if config.storage.kind == StorageKind::Memory || config.backend == BackendKind::Memory {
        tracing::warn!("In-memory storage selected, changes last for this run only");
    }

    let service = CmsService::from_config(&config).await?;

    match matches.subcommand() {
        Some(("content", args)) => run_content(&service, args),
        Some(("keys", _)) => {
            for set in service.store().key_table().iter() {
                println!("{}: {}", set.content_type(), set.keys().join(", "));
            }
            Ok(())
        }
        Some(("collection", args)) => run_collection(&service, args).await,
        _ => bail!("unknown command"),
    }
}
