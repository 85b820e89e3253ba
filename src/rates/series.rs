use tracing::debug;

use crate::dataset::{YearDataset, data_rows};
use crate::rates::types::{TractSeries, delta_key, year_key};

/// Builds the per-tract foreign-born rate series across all years.
///
/// Years are visited in ascending order. For every data row the rate
/// `foreign / total` is stored under the year key, overwriting any earlier
/// value. When the tract has already been seen, the value currently stored
/// under the previous year's key minus the new rate is stored under
/// `"{year-1}-{year}"`. A tract with no value under `year-1` gets no delta for
/// that pair.
///
/// Zero populations yield non-finite rates which are kept as-is.
pub fn build_tract_series(data: &YearDataset) -> TractSeries {
    let mut series = TractSeries::default();

    for (&year, rows) in data {
        let prev_key = year_key(year - 1);
        let pair_key = delta_key(year - 1, year);
        let this_key = year_key(year);

        for row in data_rows(rows) {
            let rate = row.foreign_pop() / row.total_pop();

            let (entry, created) = series.entry_or_insert(row.name(), row.id(), row.id2());
            if !created {
                if let Some(prev) = entry.get(&prev_key) {
                    entry.values.insert(pair_key.clone(), prev - rate);
                }
            }

            entry.values.insert(this_key.clone(), rate);
        }

        debug!(year, tracts = series.len(), "Year folded into series");
    }

    series
}
