use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use gearpack_api::{
    init_tracing, GearpackApi, RecommendRequest, RecommendationReport, TripStatus,
    DEFAULT_LOG_FILTER,
};
use gearpack_core::group_by_priority;
use serde_json::Value;

const CLI_CONTRACT_VERSION: &str = "cli.v1";

#[derive(Debug, Parser)]
#[command(name = "gp")]
#[command(about = "Gearpack packing recommendation CLI")]
struct Cli {
    #[arg(long, env = "GEARPACK_SNAPSHOT_DIR", default_value = "./snapshot")]
    snapshot: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Recommend(RecommendArgs),
    Trip {
        #[command(subcommand)]
        command: Box<TripCommand>,
    },
    Rules {
        #[command(subcommand)]
        command: Box<RulesCommand>,
    },
}

#[derive(Debug, Args)]
struct RecommendArgs {
    #[arg(long, conflicts_with = "request", required_unless_present = "request")]
    trip_id: Option<u64>,
    /// JSON file holding `{trip, owned_gear, catalog}`.
    #[arg(long)]
    request: Option<PathBuf>,
    /// Also emit the recommendations bucketed by priority.
    #[arg(long, default_value_t = false)]
    grouped: bool,
}

#[derive(Debug, Subcommand)]
enum TripCommand {
    List(TripListArgs),
    Show(TripShowArgs),
}

#[derive(Debug, Args)]
struct TripListArgs {
    #[arg(long, value_enum)]
    status: Option<StatusArg>,
}

#[derive(Debug, Args)]
struct TripShowArgs {
    #[arg(long)]
    trip_id: u64,
}

#[derive(Debug, Subcommand)]
enum RulesCommand {
    List,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StatusArg {
    Planned,
    InProgress,
    Completed,
}

impl StatusArg {
    fn into_trip_status(self) -> TripStatus {
        match self {
            Self::Planned => TripStatus::Planned,
            Self::InProgress => TripStatus::InProgress,
            Self::Completed => TripStatus::Completed,
        }
    }
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn main() -> Result<()> {
    init_tracing(DEFAULT_LOG_FILTER);
    let cli = Cli::parse();
    let api = GearpackApi::new(cli.snapshot);
    match cli.command {
        Command::Recommend(args) => run_recommend(&args, &api),
        Command::Trip { command } => run_trip(*command, &api),
        Command::Rules { command } => run_rules(*command),
    }
}

fn run_recommend(args: &RecommendArgs, api: &GearpackApi) -> Result<()> {
    let report = match (&args.request, args.trip_id) {
        (Some(path), _) => api.recommend(read_request(path)?)?,
        (None, Some(trip_id)) => api.recommend_for_trip(trip_id)?,
        (None, None) => anyhow::bail!("either --trip-id or --request is required"),
    };
    emit_json(report_value(&report, args.grouped)?)
}

fn run_trip(command: TripCommand, api: &GearpackApi) -> Result<()> {
    match command {
        TripCommand::List(args) => {
            let trips = api.list_trips(args.status.map(StatusArg::into_trip_status))?;
            emit_json(serde_json::json!({ "total": trips.len(), "trips": trips }))
        }
        TripCommand::Show(args) => {
            let trip = api.show_trip(args.trip_id)?;
            let duration_days = trip.duration_days()?;
            let mut value = serde_json::to_value(&trip).context("failed to serialize trip")?;
            if let Value::Object(object) = &mut value {
                object.insert("duration_days".to_string(), Value::from(duration_days));
            }
            emit_json(value)
        }
    }
}

fn run_rules(command: RulesCommand) -> Result<()> {
    match command {
        RulesCommand::List => {
            let rules = GearpackApi::rules();
            emit_json(serde_json::json!({
                "ruleset_version": gearpack_core::RULESET_VERSION,
                "total": rules.len(),
                "rules": rules,
            }))
        }
    }
}

fn read_request(path: &Path) -> Result<RecommendRequest> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("failed to read request file {}", path.display()))?;
    serde_json::from_str(&body)
        .with_context(|| format!("failed to parse request file {}", path.display()))
}

fn report_value(report: &RecommendationReport, grouped: bool) -> Result<Value> {
    let mut value = serde_json::to_value(report).context("failed to serialize report")?;
    if grouped {
        let groups = group_by_priority(&report.recommendations);
        tracing::debug!(
            high = groups.high.len(),
            medium = groups.medium.len(),
            low = groups.low.len(),
            "grouped recommendations by priority"
        );
        if let Value::Object(object) = &mut value {
            object.insert(
                "groups".to_string(),
                serde_json::to_value(&groups).context("failed to serialize priority groups")?,
            );
        }
    }
    Ok(value)
}
