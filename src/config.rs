//! Source manifest: which file holds which year, and where the membership
//! lists live.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::source;

/// A membership list file and the column holding the tract identifier.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MembershipSource {
    pub path: PathBuf,
    #[serde(default)]
    pub column: usize,
}

/// Everything needed to build a [`crate::dataset::Dataset`].
///
/// Stored as JSON on disk:
/// ```json
/// {
///   "years": {
///     "2010": "data/ACS_10_5YR_DP02.zip",
///     "2011": "data/ACS_11_5YR_DP02.zip"
///   },
///   "urban": { "path": "data/urban_tracts.csv", "column": 0 },
///   "within_radius": { "path": "data/radius_tracts.csv", "column": 1 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SourceManifest {
    pub years: BTreeMap<i32, PathBuf>,
    #[serde(default)]
    pub urban: Option<MembershipSource>,
    #[serde(default)]
    pub within_radius: Option<MembershipSource>,
}

impl SourceManifest {
    /// Loads a manifest from a JSON file. Relative paths inside it are
    /// resolved against the manifest's own directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        let mut manifest: SourceManifest = serde_json::from_str(&content)
            .with_context(|| format!("parsing manifest {}", path.display()))?;

        let base = path.parent().unwrap_or(Path::new("."));
        for p in manifest.years.values_mut() {
            *p = resolve(base, p);
        }
        for m in [&mut manifest.urban, &mut manifest.within_radius]
            .into_iter()
            .flatten()
        {
            m.path = resolve(base, &m.path);
        }

        Ok(manifest)
    }

    /// Builds a manifest by scanning `data_dir` for DP02 extracts.
    pub fn discover(data_dir: &Path) -> Result<Self> {
        Ok(SourceManifest {
            years: source::discover(data_dir)?,
            ..Default::default()
        })
    }

    pub fn with_urban(mut self, urban: Option<MembershipSource>) -> Self {
        if urban.is_some() {
            self.urban = urban;
        }
        self
    }

    pub fn with_within_radius(mut self, within_radius: Option<MembershipSource>) -> Self {
        if within_radius.is_some() {
            self.within_radius = within_radius;
        }
        self
    }
}

fn resolve(base: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}
