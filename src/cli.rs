use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{data::parse_naive_date, filter::FilterCriteria, kpi::GroupKey};

#[derive(Debug, Parser)]
#[command(author, version, about = "Compute sales KPIs from tabular datasets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compute and display KPIs, optionally for a filtered subset
    Report(ReportArgs),
    /// Show sales and profit per category, channel or region
    Breakdown(BreakdownArgs),
    /// Export KPIs as CSV, JSON, YAML or a text table
    Export(ExportArgs),
    /// Show resolved column types and missing expected columns
    Schema(SchemaArgs),
}

#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Input dataset (use '-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Field delimiter (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// YAML schema file overriding column types
    #[arg(short = 's', long = "schema")]
    pub schema: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Keep sales on or after this date
    #[arg(long = "from", value_parser = parse_date_arg)]
    pub from: Option<NaiveDate>,
    /// Keep sales on or before this date
    #[arg(long = "to", value_parser = parse_date_arg)]
    pub to: Option<NaiveDate>,
    /// Keep rows whose Product_Category matches exactly
    #[arg(long)]
    pub category: Option<String>,
    /// Keep rows whose Sales_Channel matches exactly
    #[arg(long)]
    pub channel: Option<String>,
}

impl FilterArgs {
    pub fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            from: self.from,
            to: self.to,
            category: self.category.clone(),
            channel: self.channel.clone(),
        }
    }
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub filters: FilterArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum GroupBy {
    Category,
    Channel,
    Region,
}

impl From<GroupBy> for GroupKey {
    fn from(value: GroupBy) -> Self {
        match value {
            GroupBy::Category => GroupKey::Category,
            GroupBy::Channel => GroupKey::Channel,
            GroupBy::Region => GroupKey::Region,
        }
    }
}

#[derive(Debug, Args)]
pub struct BreakdownArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Column to group by
    #[arg(long = "by", value_enum)]
    pub by: GroupBy,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    Yaml,
    Text,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub filters: FilterArgs,
    /// Output format
    #[arg(short = 'f', long = "format", value_enum, default_value = "csv")]
    pub format: ExportFormat,
    /// Output file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Write the resolved schema as YAML to this path
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_naive_date(value).map_err(|err| err.to_string())
}
