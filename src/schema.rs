//! Declared column types for sales datasets.
//!
//! The [`Schema`] is resolved once when a dataset is loaded and consulted by
//! every later stage instead of re-inspecting cell values. Expected sales
//! columns carry a fixed [`ColumnType`]; any other column is typed by
//! scanning its values unless a YAML schema file declares it. Overrides may
//! restate an expected column's type but never change it.

use std::{fmt, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::data::{is_placeholder, parse_number};

pub const PRODUCT_ID: &str = "Product_ID";
pub const SALE_DATE: &str = "Sale_Date";
pub const SALES_REP_REGION: &str = "Sales_Rep_Region";
pub const SALES_AMOUNT: &str = "Sales_Amount";
pub const QUANTITY_SOLD: &str = "Quantity_Sold";
pub const PRODUCT_CATEGORY: &str = "Product_Category";
pub const UNIT_COST: &str = "Unit_Cost";
pub const UNIT_PRICE: &str = "Unit_Price";
pub const CUSTOMER_TYPE: &str = "Customer_Type";
pub const DISCOUNT: &str = "Discount";
pub const PAYMENT_METHOD: &str = "Payment_Method";
pub const SALES_CHANNEL: &str = "Sales_Channel";
pub const REGION_AND_SALES_REP: &str = "Region_and_Sales_Rep";

pub const EXPECTED_COLUMNS: &[(&str, ColumnType)] = &[
    (PRODUCT_ID, ColumnType::Text),
    (SALE_DATE, ColumnType::Date),
    (SALES_REP_REGION, ColumnType::Text),
    (SALES_AMOUNT, ColumnType::Number),
    (QUANTITY_SOLD, ColumnType::Number),
    (PRODUCT_CATEGORY, ColumnType::Text),
    (UNIT_COST, ColumnType::Number),
    (UNIT_PRICE, ColumnType::Number),
    (CUSTOMER_TYPE, ColumnType::Text),
    (DISCOUNT, ColumnType::Number),
    (PAYMENT_METHOD, ColumnType::Text),
    (SALES_CHANNEL, ColumnType::Text),
    (REGION_AND_SALES_REP, ColumnType::Text),
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColumnType {
    #[serde(alias = "number", alias = "Float", alias = "Integer")]
    Number,
    #[serde(alias = "date")]
    Date,
    #[serde(alias = "text", alias = "String")]
    Text,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnType::Number => "Number",
            ColumnType::Date => "Date",
            ColumnType::Text => "Text",
        };
        f.write_str(label)
    }
}

pub fn expected_type(name: &str) -> Option<ColumnType> {
    EXPECTED_COLUMNS
        .iter()
        .find(|(expected, _)| *expected == name)
        .map(|(_, ty)| *ty)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub datatype: ColumnType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<ColumnMeta>,
}

impl Schema {
    /// Resolves the declared type of each header.
    ///
    /// Precedence is overrides, then the expected sales columns, then
    /// inference over `rows`. Run [`Schema::validate_overrides`] on the
    /// overrides first.
    pub fn resolve(headers: &[String], rows: &[Vec<String>], overrides: Option<&Schema>) -> Self {
        let columns = headers
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                let datatype = overrides
                    .and_then(|schema| schema.column(header))
                    .map(|column| column.datatype)
                    .or_else(|| expected_type(header))
                    .unwrap_or_else(|| infer_column_type(rows, idx));
                ColumnMeta {
                    name: header.clone(),
                    datatype,
                }
            })
            .collect();
        Schema { columns }
    }

    /// Fails when a column retypes one of the expected sales columns.
    pub fn validate_overrides(&self) -> Result<()> {
        for column in &self.columns {
            match expected_type(&column.name) {
                Some(expected) if expected != column.datatype => {
                    return Err(anyhow!(
                        "Schema override declares '{}' as {} but it must be {}",
                        column.name,
                        column.datatype,
                        expected
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Returns the column index when `name` exists with the given type.
    pub fn typed_index(&self, name: &str, datatype: ColumnType) -> Option<usize> {
        self.column_index(name)
            .filter(|idx| self.columns[*idx].datatype == datatype)
    }

    pub fn missing_expected_columns(&self) -> Vec<String> {
        EXPECTED_COLUMNS
            .iter()
            .filter(|(name, _)| !self.has_column(name))
            .map(|(name, _)| name.to_string())
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating schema file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing schema YAML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let reader = BufReader::new(file);
        let schema = serde_yaml::from_reader(reader).context("Parsing schema YAML")?;
        Ok(schema)
    }
}

fn infer_column_type(rows: &[Vec<String>], idx: usize) -> ColumnType {
    let mut seen_value = false;
    for row in rows {
        let raw = row.get(idx).map(|s| s.as_str()).unwrap_or("");
        if is_placeholder(raw) {
            continue;
        }
        if parse_number(raw).is_err() {
            return ColumnType::Text;
        }
        seen_value = true;
    }
    if seen_value {
        ColumnType::Number
    } else {
        ColumnType::Text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn expected_columns_keep_declared_types() {
        let headers = strings(&[SALE_DATE, SALES_AMOUNT, PRODUCT_ID]);
        let rows = vec![strings(&["garbage", "10", "42"])];
        let schema = Schema::resolve(&headers, &rows, None);
        assert_eq!(schema.columns[0].datatype, ColumnType::Date);
        assert_eq!(schema.columns[1].datatype, ColumnType::Number);
        assert_eq!(schema.columns[2].datatype, ColumnType::Text);
    }

    #[test]
    fn unknown_columns_are_inferred() {
        let headers = strings(&["Margin_Bucket", "Store"]);
        let rows = vec![strings(&["1.5", "North"]), strings(&["NA", "12"])];
        let schema = Schema::resolve(&headers, &rows, None);
        assert_eq!(schema.columns[0].datatype, ColumnType::Number);
        assert_eq!(schema.columns[1].datatype, ColumnType::Text);
    }

    #[test]
    fn entirely_empty_unknown_column_is_text() {
        let headers = strings(&["Notes"]);
        let rows = vec![strings(&[""]), strings(&["NA"])];
        let schema = Schema::resolve(&headers, &rows, None);
        assert_eq!(schema.columns[0].datatype, ColumnType::Text);
    }

    #[test]
    fn overrides_take_precedence_over_inference() {
        let overrides = Schema {
            columns: vec![ColumnMeta {
                name: "Store".to_string(),
                datatype: ColumnType::Text,
            }],
        };
        let headers = strings(&["Store"]);
        let rows = vec![strings(&["001"])];
        let schema = Schema::resolve(&headers, &rows, Some(&overrides));
        assert_eq!(schema.columns[0].datatype, ColumnType::Text);
    }

    #[test]
    fn overrides_cannot_retype_expected_columns() {
        let retyped = Schema {
            columns: vec![ColumnMeta {
                name: PRODUCT_ID.to_string(),
                datatype: ColumnType::Number,
            }],
        };
        let err = retyped.validate_overrides().unwrap_err();
        assert!(err.to_string().contains("'Product_ID' as Number"));

        let restated = Schema {
            columns: vec![
                ColumnMeta {
                    name: SALES_AMOUNT.to_string(),
                    datatype: ColumnType::Number,
                },
                ColumnMeta {
                    name: "Store".to_string(),
                    datatype: ColumnType::Date,
                },
            ],
        };
        assert!(restated.validate_overrides().is_ok());
    }

    #[test]
    fn missing_expected_columns_lists_absent_names_in_order() {
        let headers: Vec<String> = EXPECTED_COLUMNS
            .iter()
            .map(|(name, _)| name.to_string())
            .filter(|name| name != DISCOUNT && name != PRODUCT_ID)
            .collect();
        let schema = Schema::resolve(&headers, &[], None);
        assert_eq!(
            schema.missing_expected_columns(),
            vec![PRODUCT_ID.to_string(), DISCOUNT.to_string()]
        );
    }

    #[test]
    fn schema_yaml_accepts_lowercase_aliases() {
        let parsed: Schema =
            serde_yaml::from_str("columns:\n  - name: Score\n    datatype: number\n").unwrap();
        assert_eq!(parsed.columns[0].datatype, ColumnType::Number);
    }
}
