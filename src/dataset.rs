//! The in-memory dataset every computation runs against.
//!
//! Built once by [`Dataset::load`] and read-only afterwards.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, instrument};

use crate::config::{MembershipSource, SourceManifest};
use crate::error::AcsError;
use crate::filter::FilteredRow;
use crate::source::{decode_source, load_membership};

/// Number of leading header/metadata rows in every DP02 extract.
pub const HEADER_ROWS: usize = 2;

/// Filtered rows per survey year, header rows included.
pub type YearDataset = BTreeMap<i32, Vec<FilteredRow>>;

/// Data rows of one year, i.e. everything after the [`HEADER_ROWS`].
pub fn data_rows(rows: &[FilteredRow]) -> &[FilteredRow] {
    rows.get(HEADER_ROWS..).unwrap_or_default()
}

/// Tract identifier sets used to partition tracts into geographic subsets.
#[derive(Debug, Default, Clone)]
pub struct Memberships {
    /// `id` values of urban tracts.
    pub urban: Option<HashSet<String>>,
    /// `id2` values of tracts inside the study radius.
    pub within_radius: Option<HashSet<String>>,
}

impl Memberships {
    pub fn urban(&self) -> Result<&HashSet<String>, AcsError> {
        self.urban
            .as_ref()
            .ok_or(AcsError::MissingMembership("urban"))
    }

    pub fn within_radius(&self) -> Result<&HashSet<String>, AcsError> {
        self.within_radius
            .as_ref()
            .ok_or(AcsError::MissingMembership("within_radius"))
    }
}

#[derive(Debug, Default, Clone)]
pub struct Dataset {
    pub years: YearDataset,
    pub memberships: Memberships,
}

impl Dataset {
    /// Decodes every source in `manifest` and loads the membership lists.
    ///
    /// Each source is decoded on its own blocking task; all of them are joined
    /// before the dataset is returned. The first failure aborts the load.
    #[instrument(skip_all, fields(years = manifest.years.len()))]
    pub async fn load(manifest: &SourceManifest) -> Result<Self> {
        let mut tasks = Vec::new();
        for (&year, path) in &manifest.years {
            let path = path.clone();
            tasks.push((
                year,
                tokio::task::spawn_blocking(move || decode_source(&path)),
            ));
        }

        let urban = spawn_membership(manifest.urban.clone());
        let within_radius = spawn_membership(manifest.within_radius.clone());

        let mut years = YearDataset::new();
        for (year, task) in tasks {
            let rows = task
                .await
                .context("decode task panicked")?
                .with_context(|| format!("loading {} extract", year))?;
            debug!(year, rows = rows.len(), "Year loaded");
            years.insert(year, rows);
        }

        let memberships = Memberships {
            urban: urban.await.context("membership task panicked")??,
            within_radius: within_radius.await.context("membership task panicked")??,
        };

        info!(
            years = years.len(),
            urban = memberships.urban.as_ref().map(HashSet::len),
            within_radius = memberships.within_radius.as_ref().map(HashSet::len),
            "Dataset loaded"
        );

        Ok(Dataset { years, memberships })
    }
}

fn spawn_membership(
    source: Option<MembershipSource>,
) -> tokio::task::JoinHandle<Result<Option<HashSet<String>>>> {
    tokio::task::spawn_blocking(move || {
        source
            .map(|m| load_membership(&m.path, m.column))
            .transpose()
    })
}
