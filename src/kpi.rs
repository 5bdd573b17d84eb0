//! KPI engine.
//!
//! [`compute_kpis`] turns a [`RecordTable`] into an ordered [`KpiMap`]. Every
//! metric family is a function that checks its own preconditions and returns
//! `None` when they are not met; the engine appends whatever is present in a
//! fixed order:
//!
//! 1. `Total`/`Mean`/`Max`/`Min` for every numeric column,
//! 2. the analyzed period and its length in days,
//! 3. revenue, cost and profit margin,
//! 4. sales and profit per category, channel and region/representative,
//! 5. month-over-month sales growth,
//! 6. average ticket per customer type.
//!
//! Cost figures use column sums (`Σ Unit_Cost × Σ Quantity_Sold`), both for
//! the totals and per group.

use std::{collections::BTreeMap, fmt};

use chrono::{Datelike, NaiveDate};
use indexmap::IndexMap;
use itertools::Itertools;
use log::debug;
use serde::Serialize;

use crate::{
    dataset::RecordTable,
    schema::{
        CUSTOMER_TYPE, ColumnType, PRODUCT_CATEGORY, QUANTITY_SOLD, REGION_AND_SALES_REP,
        SALE_DATE, SALES_AMOUNT, SALES_CHANNEL, UNIT_COST,
    },
};

pub const PERIOD_ANALYZED: &str = "Period Analyzed";
pub const TOTAL_DAYS: &str = "Total Days";
pub const TOTAL_REVENUE: &str = "Total Revenue";
pub const TOTAL_COST: &str = "Total Cost";
pub const PROFIT_MARGIN: &str = "Profit Margin (%)";
pub const MONTHLY_GROWTH: &str = "Monthly Sales Growth (%)";
pub const AVERAGE_TICKET: &str = "Average Ticket by Customer Type";

/// Group key to aggregate value, ordered by key.
pub type Breakdown = IndexMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KpiValue {
    Number(f64),
    Text(String),
    Days(i64),
    Breakdown(Breakdown),
}

impl KpiValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            KpiValue::Number(n) => Some(*n),
            KpiValue::Days(d) => Some(*d as f64),
            _ => None,
        }
    }

    pub fn as_breakdown(&self) -> Option<&Breakdown> {
        match self {
            KpiValue::Breakdown(groups) => Some(groups),
            _ => None,
        }
    }
}

/// Numbers render with two decimals, day counts as integers.
impl fmt::Display for KpiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KpiValue::Number(n) => write!(f, "{n:.2}"),
            KpiValue::Text(text) => f.write_str(text),
            KpiValue::Days(days) => write!(f, "{days}"),
            KpiValue::Breakdown(groups) => {
                let rendered = groups
                    .iter()
                    .map(|(key, value)| format!("{key}: {value:.2}"))
                    .join(", ");
                f.write_str(&rendered)
            }
        }
    }
}

/// Ordered mapping from KPI label to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct KpiMap {
    entries: IndexMap<String, KpiValue>,
}

impl KpiMap {
    pub fn get(&self, label: &str) -> Option<&KpiValue> {
        self.entries.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KpiValue)> {
        self.entries.iter().map(|(label, value)| (label.as_str(), value))
    }

    fn push(&mut self, label: impl Into<String>, value: KpiValue) {
        self.entries.insert(label.into(), value);
    }
}

impl<'a> IntoIterator for &'a KpiMap {
    type Item = (&'a String, &'a KpiValue);
    type IntoIter = indexmap::map::Iter<'a, String, KpiValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Categorical columns that get sales and profit breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Category,
    Channel,
    Region,
}

impl GroupKey {
    pub const ALL: [GroupKey; 3] = [GroupKey::Category, GroupKey::Channel, GroupKey::Region];

    pub fn column(self) -> &'static str {
        match self {
            GroupKey::Category => PRODUCT_CATEGORY,
            GroupKey::Channel => SALES_CHANNEL,
            GroupKey::Region => REGION_AND_SALES_REP,
        }
    }

    pub fn sales_label(self) -> String {
        format!("Sales by {}", self.column())
    }

    pub fn profit_label(self) -> String {
        format!("Profit by {}", self.column())
    }
}

pub fn compute_kpis(table: &RecordTable) -> KpiMap {
    let mut kpis = KpiMap::default();
    if table.is_empty() {
        return kpis;
    }

    for (label, value) in column_stats(table) {
        kpis.push(label, value);
    }

    match analyzed_period(table) {
        Some((first, last)) => {
            kpis.push(
                PERIOD_ANALYZED,
                KpiValue::Text(format!(
                    "{}–{}",
                    first.format("%d/%m/%Y"),
                    last.format("%d/%m/%Y")
                )),
            );
            kpis.push(
                TOTAL_DAYS,
                KpiValue::Days((last - first).num_days() + 1),
            );
        }
        None => debug!("Skipping period summary: no usable '{SALE_DATE}' values"),
    }

    match revenue_and_cost(table) {
        Some((revenue, cost)) => {
            kpis.push(TOTAL_REVENUE, KpiValue::Number(revenue));
            kpis.push(TOTAL_COST, KpiValue::Number(cost));
            if let Some(margin) = profit_margin(revenue, cost) {
                kpis.push(PROFIT_MARGIN, KpiValue::Number(margin));
            }
        }
        None => debug!("Skipping revenue summary: required columns missing, empty or out of range"),
    }

    for group in GroupKey::ALL {
        if let Some(sales) = sales_by(table, group) {
            kpis.push(group.sales_label(), KpiValue::Breakdown(sales));
            if let Some(profit) = profit_by(table, group) {
                kpis.push(group.profit_label(), KpiValue::Breakdown(profit));
            }
        } else {
            debug!("Skipping breakdowns by '{}'", group.column());
        }
    }

    if let Some(growth) = monthly_growth(table) {
        kpis.push(MONTHLY_GROWTH, KpiValue::Breakdown(growth));
    }

    if let Some(ticket) = average_ticket(table) {
        kpis.push(AVERAGE_TICKET, KpiValue::Breakdown(ticket));
    }

    kpis
}

fn present(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().collect()
}

fn has_values<T>(values: &[Option<T>]) -> bool {
    values.iter().any(Option::is_some)
}

/// Drops non-finite entries; `None` when nothing is left.
fn finite_breakdown(entries: impl IntoIterator<Item = (String, f64)>) -> Option<Breakdown> {
    let breakdown: Breakdown = entries
        .into_iter()
        .filter(|(_, value)| value.is_finite())
        .collect();
    (!breakdown.is_empty()).then_some(breakdown)
}

fn column_stats(table: &RecordTable) -> Vec<(String, KpiValue)> {
    let mut stats = Vec::new();
    for column in &table.schema().columns {
        if column.datatype != ColumnType::Number {
            continue;
        }
        let values = present(&table.numbers(&column.name).unwrap_or_default());
        if values.is_empty() {
            continue;
        }
        let name = &column.name;
        let total: f64 = values.iter().sum();
        if !total.is_finite() {
            debug!("Skipping stats for '{name}': total is out of range");
            continue;
        }
        let mean = total / values.len() as f64;
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        stats.push((format!("Total {name}"), KpiValue::Number(total)));
        stats.push((format!("Mean {name}"), KpiValue::Number(mean)));
        stats.push((format!("Max {name}"), KpiValue::Number(max)));
        stats.push((format!("Min {name}"), KpiValue::Number(min)));
    }
    stats
}

/// Earliest and latest sale date.
pub fn analyzed_period(table: &RecordTable) -> Option<(NaiveDate, NaiveDate)> {
    let dates = table.dates(SALE_DATE)?;
    let (first, last) = dates
        .iter()
        .flatten()
        .copied()
        .minmax()
        .into_option()?;
    Some((first, last))
}

/// Total revenue and the aggregate cost proxy `Σ Unit_Cost × Σ Quantity_Sold`.
pub fn revenue_and_cost(table: &RecordTable) -> Option<(f64, f64)> {
    let amounts = table.numbers(SALES_AMOUNT)?;
    let costs = table.numbers(UNIT_COST)?;
    let quantities = table.numbers(QUANTITY_SOLD)?;
    if !(has_values(&amounts) && has_values(&costs) && has_values(&quantities)) {
        return None;
    }
    let revenue: f64 = present(&amounts).iter().sum();
    let cost_sum: f64 = present(&costs).iter().sum();
    let quantity_sum: f64 = present(&quantities).iter().sum();
    let cost = cost_sum * quantity_sum;
    (revenue.is_finite() && cost.is_finite()).then_some((revenue, cost))
}

/// `(revenue - cost) / revenue` as a percentage; `None` for zero or
/// out-of-range revenue.
pub fn profit_margin(revenue: f64, cost: f64) -> Option<f64> {
    if !(revenue > 0.0 && revenue.is_finite()) {
        return None;
    }
    let margin = (revenue - cost) / revenue * 100.0;
    margin.is_finite().then_some(margin)
}

/// Sums `values` per key. Rows without a key are dropped; missing values
/// count as zero inside an existing group.
fn group_sums(keys: &[Option<String>], values: &[Option<f64>]) -> BTreeMap<String, f64> {
    let mut sums = BTreeMap::new();
    for (key, value) in keys.iter().zip(values) {
        if let Some(key) = key {
            *sums.entry(key.clone()).or_insert(0.0) += value.unwrap_or(0.0);
        }
    }
    sums
}

fn group_keys(table: &RecordTable, group: GroupKey) -> Option<Vec<Option<String>>> {
    let keys = table.keys(group.column())?;
    has_values(&keys).then_some(keys)
}

/// Σ Sales_Amount per group.
pub fn sales_by(table: &RecordTable, group: GroupKey) -> Option<Breakdown> {
    let keys = group_keys(table, group)?;
    let amounts = table.numbers(SALES_AMOUNT)?;
    if !has_values(&amounts) {
        return None;
    }
    finite_breakdown(group_sums(&keys, &amounts))
}

/// Per-group Σ Sales_Amount − Σ Unit_Cost × Σ Quantity_Sold.
pub fn profit_by(table: &RecordTable, group: GroupKey) -> Option<Breakdown> {
    let keys = group_keys(table, group)?;
    let amounts = table.numbers(SALES_AMOUNT)?;
    let costs = table.numbers(UNIT_COST)?;
    let quantities = table.numbers(QUANTITY_SOLD)?;
    if !has_values(&amounts) {
        return None;
    }
    let sales = group_sums(&keys, &amounts);
    let cost_sums = group_sums(&keys, &costs);
    let quantity_sums = group_sums(&keys, &quantities);
    finite_breakdown(sales.into_iter().map(|(key, sales)| {
        let cost = cost_sums.get(&key).copied().unwrap_or(0.0);
        let quantity = quantity_sums.get(&key).copied().unwrap_or(0.0);
        (key, sales - cost * quantity)
    }))
}

/// Σ Sales_Amount per calendar month, oldest first, keyed `YYYY-MM`.
pub fn monthly_sales(table: &RecordTable) -> Option<Breakdown> {
    let dates = table.dates(SALE_DATE)?;
    let amounts = table.numbers(SALES_AMOUNT)?;
    let mut buckets: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for (date, amount) in dates.iter().zip(&amounts) {
        if let Some(date) = date {
            *buckets.entry((date.year(), date.month())).or_insert(0.0) += amount.unwrap_or(0.0);
        }
    }
    finite_breakdown(
        buckets
            .into_iter()
            .map(|((year, month), total)| (format!("{year:04}-{month:02}"), total)),
    )
}

/// Percentage change of each month against the previous bucket. The first
/// bucket and any bucket following a zero-sales month are omitted.
pub fn monthly_growth(table: &RecordTable) -> Option<Breakdown> {
    let monthly = monthly_sales(table)?;
    finite_breakdown(
        monthly
            .iter()
            .tuple_windows()
            .filter(|((_, previous), _)| **previous != 0.0)
            .map(|((_, previous), (month, current))| {
                (month.clone(), (current / previous - 1.0) * 100.0)
            }),
    )
}

/// Mean Sales_Amount per customer type; groups without amounts are dropped.
pub fn average_ticket(table: &RecordTable) -> Option<Breakdown> {
    let keys = table.keys(CUSTOMER_TYPE)?;
    let amounts = table.numbers(SALES_AMOUNT)?;
    let mut totals: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for (key, amount) in keys.iter().zip(&amounts) {
        if let (Some(key), Some(amount)) = (key, amount) {
            let entry = totals.entry(key.clone()).or_insert((0.0, 0));
            entry.0 += amount;
            entry.1 += 1;
        }
    }
    finite_breakdown(
        totals
            .into_iter()
            .map(|(key, (sum, count))| (key, sum / count as f64)),
    )
}
