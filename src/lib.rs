pub mod cli;
pub mod data;
pub mod dataset;
pub mod error;
pub mod export;
pub mod filter;
pub mod io_utils;
pub mod kpi;
pub mod loader;
pub mod schema;
pub mod schema_cmd;
pub mod session;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{BreakdownArgs, Cli, Commands, InputArgs, ReportArgs},
    kpi::GroupKey,
    loader::LoadOptions,
    schema::Schema,
    session::Session,
    table::Align,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sales_kpi", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Report(args) => handle_report(&args),
        Commands::Breakdown(args) => handle_breakdown(&args),
        Commands::Export(args) => export::execute(&args),
        Commands::Schema(args) => schema_cmd::execute(&args),
    }
}

/// Builds a session from the shared input flags and loads the dataset into it.
pub(crate) fn open_session(args: &InputArgs) -> Result<Session> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let schema_overrides = match &args.schema {
        Some(path) => Some(
            Schema::load(path).with_context(|| format!("Loading schema from {path:?}"))?,
        ),
        None => None,
    };
    info!(
        "Reading '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(delimiter)
    );

    let bytes = io_utils::read_input_bytes(&args.input)?;
    let mut session = Session::new(LoadOptions {
        delimiter,
        encoding,
        schema_overrides,
    });
    session
        .load(&bytes)
        .with_context(|| format!("Loading dataset {:?}", args.input))?;
    Ok(session)
}

fn handle_report(args: &ReportArgs) -> Result<()> {
    let session = open_session(&args.input)?;
    let kpis = session.kpis();
    println!("KPIs");
    print!("{}", table::render_kpi_table(&kpis));
    info!("Computed {} KPI(s)", kpis.len());

    let criteria = args.filters.criteria();
    if !criteria.is_empty() {
        let filtered = session.filtered_kpis(&criteria);
        println!();
        println!("Filtered KPIs");
        print!("{}", table::render_kpi_table(&filtered));
        info!("Computed {} filtered KPI(s)", filtered.len());
    }
    Ok(())
}

fn handle_breakdown(args: &BreakdownArgs) -> Result<()> {
    let session = open_session(&args.input)?;
    let group = GroupKey::from(args.by);
    let Some(report) = session.group_report(group) else {
        println!("No data available for '{}'.", group.column());
        return Ok(());
    };

    let rows = report
        .sales
        .iter()
        .map(|(key, sales)| {
            let profit = report
                .profit
                .as_ref()
                .and_then(|profit| profit.get(key))
                .map(|value| format!("{value:.2}"))
                .unwrap_or_default();
            vec![key.clone(), format!("{sales:.2}"), profit]
        })
        .collect::<Vec<_>>();
    table::print_table(
        &[group.column(), "sales", "profit"],
        &rows,
        &[Align::Left, Align::Right, Align::Right],
    );
    info!("Listed {} group(s) for '{}'", rows.len(), group.column());
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
