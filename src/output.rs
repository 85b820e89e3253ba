//! CSV reports: per-year filtered rows, the tract rate table, and subset
//! aggregates.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::dataset::YearDataset;
use crate::filter::FilteredRow;
use crate::rates::types::{AggregateRecord, TractSeries};

pub const RATES_FILE: &str = "rates.csv";
pub const AGGREGATES_FILE: &str = "aggregates.csv";

/// Creates the output directory if it does not exist yet.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating output directory {}", dir.display()))
}

/// Path of the filtered export for `year`.
pub fn year_path(dir: &Path, year: i32) -> PathBuf {
    dir.join(format!("{}.csv", year))
}

/// Writes one year's filtered rows, header rows included, without a CSV header.
#[instrument(skip_all, fields(path = %path.display(), rows = rows.len()))]
pub fn write_year_rows(path: &Path, rows: &[FilteredRow]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    for row in rows {
        writer.write_record(row.fields())?;
    }
    writer.flush()?;

    debug!("Year export written");
    Ok(())
}

/// Writes every year's filtered export under `dir`, one blocking task per file.
pub async fn write_years(dir: &Path, data: &YearDataset) -> Result<()> {
    ensure_dir(dir)?;

    let mut tasks = Vec::new();
    for (&year, rows) in data {
        let path = year_path(dir, year);
        let rows = rows.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            write_year_rows(&path, &rows)
        }));
    }

    for task in tasks {
        task.await.context("write task panicked")??;
    }

    info!(years = data.len(), dir = %dir.display(), "Filtered extracts written");
    Ok(())
}

/// Lays the series out as a table: `tract` followed by the sorted column keys,
/// then one row per tract in first-seen order. Missing values are empty cells.
pub fn rates_table(series: &TractSeries) -> Vec<Vec<String>> {
    let cols = series.column_keys();

    let mut header = Vec::with_capacity(cols.len() + 1);
    header.push("tract".to_string());
    header.extend(cols.iter().cloned());

    let mut rows = vec![header];
    for (name, entry) in series.iter() {
        let mut row = Vec::with_capacity(cols.len() + 1);
        row.push(name.to_string());
        row.extend(cols.iter().map(|c| entry.cell(c).unwrap_or_default()));
        rows.push(row);
    }

    rows
}

/// Writes the tract rate table to `dir/rates.csv`.
#[instrument(skip_all, fields(dir = %dir.display(), tracts = series.len()))]
pub fn write_rates(dir: &Path, series: &TractSeries) -> Result<PathBuf> {
    ensure_dir(dir)?;
    let path = dir.join(RATES_FILE);

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(&path)
        .with_context(|| format!("creating {}", path.display()))?;

    for row in rates_table(series) {
        writer.write_record(&row)?;
    }
    writer.flush()?;

    info!(path = %path.display(), "Rates written");
    Ok(path)
}

/// Writes subset aggregates to `dir/aggregates.csv`.
#[instrument(skip_all, fields(dir = %dir.display(), records = records.len()))]
pub fn write_aggregates(dir: &Path, records: &[AggregateRecord]) -> Result<PathBuf> {
    ensure_dir(dir)?;
    let path = dir.join(AGGREGATES_FILE);

    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(&path)
        .with_context(|| format!("creating {}", path.display()))?;

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    info!(path = %path.display(), "Aggregates written");
    Ok(path)
}
