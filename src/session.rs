//! Explicit session context.
//!
//! A [`Session`] owns the one active dataset. Loading a new file replaces it;
//! KPIs are recomputed from it on every request.

use log::info;

use crate::{
    dataset::RecordTable,
    error::{LoadError, LoadWarning},
    filter::FilterCriteria,
    kpi::{self, Breakdown, GroupKey, KpiMap},
    loader::{self, LoadOptions},
};

#[derive(Debug, Default)]
pub struct Session {
    options: LoadOptions,
    table: Option<RecordTable>,
    warnings: Vec<LoadWarning>,
}

/// Sales and profit per group for one categorical column.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupReport {
    pub group: GroupKey,
    pub sales: Breakdown,
    pub profit: Option<Breakdown>,
}

impl Session {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            table: None,
            warnings: Vec::new(),
        }
    }

    /// Loads `bytes` as the active dataset.
    ///
    /// On failure the previously active dataset is discarded as well.
    pub fn load(&mut self, bytes: &[u8]) -> Result<&[LoadWarning], LoadError> {
        self.table = None;
        self.warnings.clear();
        let loaded = loader::load_dataset(bytes, &self.options)?;
        info!("Session dataset replaced ({} row(s))", loaded.table.len());
        self.table = Some(loaded.table);
        self.warnings = loaded.warnings;
        Ok(&self.warnings)
    }

    pub fn table(&self) -> Option<&RecordTable> {
        self.table.as_ref()
    }

    pub fn warnings(&self) -> &[LoadWarning] {
        &self.warnings
    }

    /// KPIs of the active dataset; empty when nothing is loaded.
    pub fn kpis(&self) -> KpiMap {
        self.table.as_ref().map(kpi::compute_kpis).unwrap_or_default()
    }

    pub fn filtered_kpis(&self, criteria: &FilterCriteria) -> KpiMap {
        self.table
            .as_ref()
            .map(|table| kpi::compute_kpis(&criteria.apply(table)))
            .unwrap_or_default()
    }

    pub fn group_report(&self, group: GroupKey) -> Option<GroupReport> {
        let table = self.table.as_ref()?;
        let sales = kpi::sales_by(table, group)?;
        Some(GroupReport {
            group,
            sales,
            profit: kpi::profit_by(table, group),
        })
    }
}
