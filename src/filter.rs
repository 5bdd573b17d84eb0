use chrono::NaiveDate;
use log::debug;

use crate::{
    data::Value,
    dataset::RecordTable,
    schema::{PRODUCT_CATEGORY, SALE_DATE, SALES_CHANNEL},
};

/// Row selection applied before recomputing KPIs.
///
/// The date range is inclusive on both ends and drops rows without a sale
/// date once either bound is set. Category and channel are exact matches.
/// Criteria naming a column the table does not have are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub category: Option<String>,
    pub channel: Option<String>,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.category.is_none() && self.channel.is_none()
    }

    pub fn apply(&self, table: &RecordTable) -> RecordTable {
        let schema = table.schema();
        let date_idx = schema
            .column_index(SALE_DATE)
            .filter(|_| self.from.is_some() || self.to.is_some());
        let category = self
            .category
            .as_deref()
            .and_then(|wanted| schema.column_index(PRODUCT_CATEGORY).map(|idx| (idx, wanted)));
        let channel = self
            .channel
            .as_deref()
            .and_then(|wanted| schema.column_index(SALES_CHANNEL).map(|idx| (idx, wanted)));

        let filtered = table.retain_rows(|row| {
            if let Some(idx) = date_idx {
                match row[idx].as_ref().and_then(Value::as_date) {
                    Some(date) if self.contains_date(date) => {}
                    _ => return false,
                }
            }
            [category, channel].into_iter().flatten().all(|(idx, wanted)| {
                row[idx]
                    .as_ref()
                    .is_some_and(|value| value.as_display() == wanted)
            })
        });
        debug!(
            "Filter kept {} of {} row(s)",
            filtered.len(),
            table.len()
        );
        filtered
    }

    fn contains_date(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}
