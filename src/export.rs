//! KPI export.
//!
//! Exports flatten the [`KpiMap`] into one row per leaf value, keeping the
//! map order. Breakdown entries become `"<metric> / <group>"` rows. Every
//! export ends with a `Report Date` row stamped from the local clock.

use std::{fmt, io::Write};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use log::info;
use serde::Serialize;

use crate::{
    cli::{ExportArgs, ExportFormat},
    io_utils,
    kpi::{KpiMap, KpiValue},
    table::{self, Align},
};

pub const REPORT_DATE: &str = "Report Date";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExportValue {
    Number(f64),
    Days(i64),
    Text(String),
}

impl fmt::Display for ExportValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportValue::Number(n) => write!(f, "{n:.2}"),
            ExportValue::Days(d) => write!(f, "{d}"),
            ExportValue::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub kpi: String,
    pub value: ExportValue,
}

impl ExportRow {
    fn new(kpi: impl Into<String>, value: ExportValue) -> Self {
        Self {
            kpi: kpi.into(),
            value,
        }
    }
}

pub fn flatten(kpis: &KpiMap) -> Vec<ExportRow> {
    let mut rows = Vec::with_capacity(kpis.len());
    for (label, value) in kpis {
        match value {
            KpiValue::Number(n) => rows.push(ExportRow::new(label, ExportValue::Number(*n))),
            KpiValue::Days(d) => rows.push(ExportRow::new(label, ExportValue::Days(*d))),
            KpiValue::Text(text) => {
                rows.push(ExportRow::new(label, ExportValue::Text(text.clone())))
            }
            KpiValue::Breakdown(groups) => {
                rows.extend(groups.iter().map(|(group, amount)| {
                    ExportRow::new(format!("{label} / {group}"), ExportValue::Number(*amount))
                }));
            }
        }
    }
    rows
}

/// Flattened KPIs followed by the generation timestamp.
pub fn report_rows(kpis: &KpiMap, generated_at: NaiveDateTime) -> Vec<ExportRow> {
    let mut rows = flatten(kpis);
    rows.push(ExportRow::new(
        REPORT_DATE,
        ExportValue::Text(generated_at.format("%d/%m/%Y %H:%M").to_string()),
    ));
    rows
}

pub fn write_report<W: Write>(
    mut writer: W,
    kpis: &KpiMap,
    format: ExportFormat,
    generated_at: NaiveDateTime,
) -> Result<()> {
    let rows = report_rows(kpis, generated_at);
    match format {
        ExportFormat::Csv => {
            let mut csv_writer = csv::Writer::from_writer(&mut writer);
            csv_writer.write_record(["KPI", "Value"])?;
            for row in &rows {
                csv_writer.write_record([row.kpi.as_str(), row.value.to_string().as_str()])?;
            }
            csv_writer.flush().context("Flushing CSV export")?;
        }
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, &rows).context("Writing JSON export")?;
            writeln!(writer)?;
        }
        ExportFormat::Yaml => {
            serde_yaml::to_writer(&mut writer, &rows).context("Writing YAML export")?;
        }
        ExportFormat::Text => {
            let rendered = table::render_table(
                &["KPI", "Value"],
                &table::flattened_rows(&rows),
                &[Align::Left, Align::Right],
            );
            writer.write_all(rendered.as_bytes())?;
        }
    }
    writer.flush().context("Flushing export output")?;
    Ok(())
}

pub fn execute(args: &ExportArgs) -> Result<()> {
    let session = crate::open_session(&args.input)?;
    let criteria = args.filters.criteria();
    let kpis = if criteria.is_empty() {
        session.kpis()
    } else {
        session.filtered_kpis(&criteria)
    };
    if kpis.is_empty() {
        info!("No KPIs could be computed; exporting the report date only");
    }
    let writer = io_utils::open_output(args.output.as_deref())?;
    write_report(writer, &kpis, args.format, Local::now().naive_local())
        .with_context(|| format!("Exporting {:?} report", args.format))?;
    if let Some(path) = &args.output {
        info!("Exported {} KPI(s) to {path:?}", kpis.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        kpi::compute_kpis,
        loader::{LoadOptions, load_dataset},
    };
    use chrono::NaiveDate;

    fn sample_kpis() -> KpiMap {
        let data = "Sale_Date,Product_Category,Sales_Amount\n2024-01-01,A,100\n2024-01-02,B,50\n";
        let table = load_dataset(data.as_bytes(), &LoadOptions::default())
            .expect("load")
            .table;
        compute_kpis(&table)
    }

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn flatten_expands_breakdowns_in_order() {
        let rows = flatten(&sample_kpis());
        let labels = rows.iter().map(|r| r.kpi.as_str()).collect::<Vec<_>>();
        assert_eq!(
            labels,
            vec![
                "Total Sales_Amount",
                "Mean Sales_Amount",
                "Max Sales_Amount",
                "Min Sales_Amount",
                "Period Analyzed",
                "Total Days",
                "Sales by Product_Category / A",
                "Sales by Product_Category / B",
            ]
        );
    }

    #[test]
    fn csv_export_formats_two_decimals_and_appends_date() {
        let mut buffer = Vec::new();
        write_report(&mut buffer, &sample_kpis(), ExportFormat::Csv, stamp()).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "KPI,Value");
        assert_eq!(lines[1], "Total Sales_Amount,150.00");
        assert!(lines.contains(&"Total Days,2"));
        assert_eq!(lines.last(), Some(&"Report Date,01/06/2024 09:30"));
    }

    #[test]
    fn json_export_keeps_numbers_numeric() {
        let mut buffer = Vec::new();
        write_report(&mut buffer, &sample_kpis(), ExportFormat::Json, stamp()).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        let rows = parsed.as_array().unwrap();
        assert_eq!(rows[0]["kpi"], "Total Sales_Amount");
        assert_eq!(rows[0]["value"], 150.0);
        assert_eq!(rows.last().unwrap()["kpi"], REPORT_DATE);
    }

    #[test]
    fn empty_map_exports_only_report_date() {
        let rows = report_rows(&KpiMap::default(), stamp());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kpi, REPORT_DATE);
    }
}
