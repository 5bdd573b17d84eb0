use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::SchemaArgs,
    schema::expected_type,
    table::{self, Align},
};

pub fn execute(args: &SchemaArgs) -> Result<()> {
    let session = crate::open_session(&args.input)?;
    let Some(dataset) = session.table() else {
        return Ok(());
    };
    let schema = dataset.schema();

    let rows = schema
        .columns
        .iter()
        .map(|column| {
            let origin = if expected_type(&column.name).is_some() {
                "expected"
            } else {
                "extra"
            };
            vec![
                column.name.clone(),
                column.datatype.to_string(),
                origin.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&["column", "type", "origin"], &rows, &[Align::Left]);

    if session.warnings().is_empty() {
        println!("All expected columns present.");
    }
    for warning in session.warnings() {
        println!("{warning}");
    }

    if let Some(path) = &args.output {
        schema
            .save(path)
            .with_context(|| format!("Writing schema to {path:?}"))?;
        info!(
            "Schema with {} column(s) written to {path:?}",
            schema.columns.len()
        );
    }
    Ok(())
}
