use std::collections::BTreeMap;
use tracing::debug;

use crate::dataset::{Dataset, YearDataset, data_rows};
use crate::error::AcsError;
use crate::filter::FilteredRow;
use crate::rates::subset::Subset;
use crate::rates::types::{AggregateRecord, AggregateTotals};

/// Sums total and foreign-born population per year over the data rows that
/// `accept` lets through.
pub fn build_aggregate_totals<F>(data: &YearDataset, accept: F) -> BTreeMap<i32, AggregateTotals>
where
    F: Fn(&FilteredRow) -> bool,
{
    let mut out = BTreeMap::new();

    for (&year, rows) in data {
        let mut totals = AggregateTotals::default();
        let mut counted = 0usize;

        for row in data_rows(rows).iter().filter(|r| accept(*r)) {
            totals.total += row.total_pop();
            totals.foreign += row.foreign_pop();
            counted += 1;
        }

        debug!(year, counted, total = totals.total, foreign = totals.foreign, "Year aggregated");
        out.insert(year, totals);
    }

    out
}

/// [`build_aggregate_totals`] over every data row.
pub fn aggregate_all(data: &YearDataset) -> BTreeMap<i32, AggregateTotals> {
    build_aggregate_totals(data, |_| true)
}

/// Totals for a named subset, resolved against the dataset's membership lists.
pub fn subset_totals(
    dataset: &Dataset,
    subset: Subset,
) -> Result<BTreeMap<i32, AggregateTotals>, AcsError> {
    let predicate = subset.predicate(&dataset.memberships)?;
    Ok(build_aggregate_totals(&dataset.years, |row| predicate.accepts(row)))
}

/// Report lines for each requested subset, in subset then year order.
pub fn aggregate_records(
    dataset: &Dataset,
    subsets: &[Subset],
) -> Result<Vec<AggregateRecord>, AcsError> {
    let mut records = Vec::new();
    for &subset in subsets {
        for (year, totals) in subset_totals(dataset, subset)? {
            records.push(AggregateRecord::new(subset, year, &totals));
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Memberships;

    fn header() -> FilteredRow {
        FilteredRow::new(vec!["header".into(); 15]).unwrap()
    }

    fn tract(id: &str, id2: &str, total: &str, foreign: &str) -> FilteredRow {
        let mut fields = vec!["0".to_string(); 15];
        fields[0] = id.to_string();
        fields[1] = id2.to_string();
        fields[2] = format!("Tract {}", id);
        fields[3] = total.to_string();
        fields[4] = foreign.to_string();
        FilteredRow::new(fields).unwrap()
    }

    fn dataset() -> Dataset {
        let mut years = YearDataset::new();
        years.insert(
            2010,
            vec![
                header(),
                header(),
                tract("u1", "r1", "100", "30"),
                tract("x1", "r2", "300", "10"),
            ],
        );
        years.insert(
            2011,
            vec![
                header(),
                header(),
                tract("u1", "r1", "200", "50"),
                tract("x1", "r2", "200", "10"),
            ],
        );

        Dataset {
            years,
            memberships: Memberships {
                urban: Some(["u1".to_string()].into_iter().collect()),
                within_radius: Some(["r1".to_string()].into_iter().collect()),
            },
        }
    }

    #[test]
    fn test_aggregate_all_skips_headers() {
        let totals = aggregate_all(&dataset().years);
        assert_eq!(
            totals[&2010],
            AggregateTotals {
                total: 400.0,
                foreign: 40.0
            }
        );
        assert_eq!(totals[&2010].rate(), 0.1);
    }

    #[test]
    fn test_urban_sums_only_urban_tracts() {
        let totals = subset_totals(&dataset(), Subset::Urban).unwrap();
        assert_eq!(totals[&2010].total, 100.0);
        assert_eq!(totals[&2010].foreign, 30.0);
        assert_eq!(totals[&2011].total, 200.0);
    }

    #[test]
    fn test_rural_and_outside_radius() {
        let ds = dataset();
        let rural = subset_totals(&ds, Subset::Rural).unwrap();
        let outside = subset_totals(&ds, Subset::OutsideRadius).unwrap();

        assert_eq!(rural[&2010].total, 300.0);
        assert_eq!(outside[&2011].foreign, 10.0);
    }

    #[test]
    fn test_empty_subset_year_still_reported() {
        let mut ds = dataset();
        ds.memberships.urban = Some(Default::default());

        let totals = subset_totals(&ds, Subset::Urban).unwrap();
        assert_eq!(totals.len(), 2);
        assert!(totals[&2010].rate().is_nan());
    }

    #[test]
    fn test_missing_membership_propagates() {
        let mut ds = dataset();
        ds.memberships.within_radius = None;
        assert!(aggregate_records(&ds, &[Subset::All, Subset::OutsideRadius]).is_err());
    }

    #[test]
    fn test_aggregate_records_order() {
        let records = aggregate_records(&dataset(), &[Subset::Urban, Subset::All]).unwrap();
        let keys: Vec<_> = records.iter().map(|r| (r.subset, r.year)).collect();
        assert_eq!(
            keys,
            vec![
                (Subset::Urban, 2010),
                (Subset::Urban, 2011),
                (Subset::All, 2010),
                (Subset::All, 2011)
            ]
        );
        assert_eq!(records[0].rate, 0.3);
    }
}
