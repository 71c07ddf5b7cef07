mod config;
mod session;

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use snowcap_catalog::Edition;
use snowcap_core::{Blueprint, BlueprintConfig, SnowcapError};

use config::CliConfig;
use session::UnwiredSession;

/// snowcap plans and applies a declarative resource manifest against a
/// cloud data warehouse.
#[derive(Debug, Parser)]
#[clap(name = "snowcap", version)]
struct Cli {
    #[clap(flatten)]
    log_args: LogArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct LogArgs {
    /// Increase log verbosity; repeatable (-v, -vv, -vvv). Overridden by
    /// `RUST_LOG` when set.
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compute and print the plan without applying it.
    Plan(BlueprintArgs),
    /// Compute the plan and apply it, unless `--dry-run` is set.
    Apply(BlueprintArgs),
}

#[derive(Debug, Args)]
struct BlueprintArgs {
    /// Manifest YAML file(s); repeatable, merged per spec.md §4.3 step 1.
    #[clap(long = "manifest", required = true)]
    manifests: Vec<String>,

    /// `key=value` variable bindings for the manifest's `vars` spec;
    /// repeatable.
    #[clap(long = "vars", value_parser = parse_var)]
    vars: Vec<(String, serde_json::Value)>,

    /// Restrict the run to a blueprint scope root database.
    #[clap(long)]
    database: Option<String>,

    /// Restrict the run to a blueprint scope root schema (requires
    /// `--database`).
    #[clap(long)]
    schema: Option<String>,

    /// Additional sync_resources kinds to layer on top of the manifest's
    /// own `sync_resources` key.
    #[clap(long = "resources")]
    resources: Vec<String>,

    /// Print the plan but never execute any mutating statement, overriding
    /// the manifest's own `dry_run` key.
    #[clap(long)]
    dry_run: bool,

    /// Account locator to connect to; falls back to the config file.
    #[clap(long, env = "SNOWCAP_ACCOUNT_LOCATOR")]
    account_locator: Option<String>,

    /// Organization name, if the account is referenced org-scoped.
    #[clap(long, env = "SNOWCAP_ORG")]
    org: Option<String>,

    /// Warehouse edition the session is connected under.
    #[clap(long, value_enum, default_value = "standard")]
    edition: EditionArg,

    /// Roles the connecting session may `USE ROLE` into; repeatable.
    /// Falls back to the config file's `available_roles`.
    #[clap(long = "role")]
    roles: Vec<String>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EditionArg {
    Standard,
    Enterprise,
    BusinessCritical,
}

impl From<EditionArg> for Edition {
    fn from(value: EditionArg) -> Self {
        match value {
            EditionArg::Standard => Edition::Standard,
            EditionArg::Enterprise => Edition::Enterprise,
            EditionArg::BusinessCritical => Edition::BusinessCritical,
        }
    }
}

fn parse_var(s: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {s:?}"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn init_logging(log_args: &LogArgs) {
    let default_level = match log_args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("snowcap={default_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Builds a synthetic manifest document out of `--database`/`--schema`/
/// `--resources`, so they flow through the same merge-by-key path
/// (`doc::merge_documents`) as every other manifest source rather than
/// needing their own plumbing through `BlueprintConfig`. A scope root that
/// disagrees with the manifest's own `database`/`schema` key surfaces as the
/// same `ScalarConflict` compile error a second manifest file would.
fn scope_override_yaml(args: &BlueprintArgs) -> anyhow::Result<Option<String>> {
    if args.schema.is_some() && args.database.is_none() {
        anyhow::bail!("--schema requires --database");
    }
    if args.database.is_none() && args.resources.is_empty() {
        return Ok(None);
    }

    let mut doc = serde_yaml::Mapping::new();
    if let Some(database) = &args.database {
        doc.insert(
            serde_yaml::Value::String("database".to_string()),
            serde_yaml::Value::String(database.clone()),
        );
    }
    if let Some(schema) = &args.schema {
        doc.insert(
            serde_yaml::Value::String("schema".to_string()),
            serde_yaml::Value::String(schema.clone()),
        );
    }
    if !args.resources.is_empty() {
        let sequence = args.resources.iter().cloned().map(serde_yaml::Value::String).collect();
        doc.insert(
            serde_yaml::Value::String("sync_resources".to_string()),
            serde_yaml::Value::Sequence(sequence),
        );
    }
    Ok(Some(serde_yaml::to_string(&doc)?))
}

fn build_config(args: BlueprintArgs, file_config: &CliConfig) -> anyhow::Result<BlueprintConfig> {
    let account_locator = args
        .account_locator
        .or_else(|| file_config.account_locator.clone())
        .ok_or_else(|| anyhow::anyhow!("--account-locator is required (or set it in the config file)"))?;
    let org = args.org.or_else(|| file_config.org.clone());

    let yaml_sources: Vec<String> = args
        .manifests
        .iter()
        .map(|path| {
            std::fs::read_to_string(path)
                .map_err(|err| anyhow::anyhow!("reading manifest {path:?}: {err}"))
        })
        .collect::<anyhow::Result<_>>()?;

    let mut config = BlueprintConfig::new(account_locator, args.edition.into());
    if let Some(org) = org {
        config.session.org = Some(org);
    }
    for yaml in yaml_sources {
        config = config.with_yaml(yaml);
    }
    if let Some(overrides) = scope_override_yaml(&args)? {
        config = config.with_yaml(overrides);
    }
    for (key, value) in args.vars {
        config = config.with_input(key, value);
    }

    let roles: Vec<String> = if args.roles.is_empty() {
        file_config.available_roles.iter().cloned().collect()
    } else {
        args.roles
    };
    for role in roles {
        config = config.with_available_role(role);
    }
    if args.dry_run {
        config = config.with_dry_run_override(true);
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_args);

    let file_config = CliConfig::load()?;

    let (args, apply_after_plan) = match cli.command {
        Command::Plan(args) => (args, false),
        Command::Apply(args) => (args, true),
    };

    let role = args.roles.first().cloned().unwrap_or_else(|| "PUBLIC".to_string());
    let blueprint_config = build_config(args, &file_config)?;

    let session = Arc::new(UnwiredSession::new(role, "snowcap-cli"));
    let blueprint = Blueprint::new(blueprint_config, session);

    match run(&blueprint, apply_after_plan).await {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::error!(error = %err, "run failed");
            std::process::exit(err.exit_code());
        }
    }
}

async fn run(blueprint: &Blueprint, apply_after_plan: bool) -> Result<(), SnowcapError> {
    let output = blueprint.plan().await?;
    print_plan(&output.actions);

    if apply_after_plan {
        match blueprint.apply(&output).await? {
            Some(report) => {
                for statement in &report.executed {
                    println!("{}", statement.sql);
                }
            }
            None => println!("dry_run set, nothing applied"),
        }
    }

    Ok(())
}

fn print_plan(actions: &[snowcap_plan::Action]) {
    if actions.is_empty() {
        println!("no changes");
        return;
    }
    for action in actions {
        println!("{}", action.label());
    }
}
