//! Locating and decoding DP02 extracts and membership lists on disk.
//!
//! Extracts may be zip archives (as published), gzipped CSV, or plain CSV.

use anyhow::{Context, Result, anyhow};
use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, instrument, warn};
use zip::ZipArchive;

use crate::error::AcsError;
use crate::filter::{FilteredRow, filter_row};

static EXTRACT_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^ACS_(\d\d)_5YR_DP02\.(zip|csv|csv\.gz)$").ok());

/// Maps an extract file name like `ACS_12_5YR_DP02.zip` to its survey year.
pub fn year_from_file_name(name: &str) -> Option<i32> {
    let caps = EXTRACT_NAME.as_ref()?.captures(name)?;
    caps[1].parse::<i32>().ok().map(|yy| 2000 + yy)
}

/// Scans `data_dir` for DP02 extracts and returns them keyed by year.
///
/// When several files map to the same year, the first in name order wins.
#[instrument(skip_all, fields(data_dir = %data_dir.display()))]
pub fn discover(data_dir: &Path) -> Result<BTreeMap<i32, PathBuf>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(data_dir)
        .with_context(|| format!("reading data directory {}", data_dir.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_file()
            && let Some(name) = entry.file_name().to_str()
        {
            names.push(name.to_string());
        }
    }
    names.sort();

    let mut sources = BTreeMap::new();
    for name in names {
        let Some(year) = year_from_file_name(&name) else {
            continue;
        };
        if sources.contains_key(&year) {
            warn!(year, file = %name, "Duplicate extract for year, ignoring");
            continue;
        }
        sources.insert(year, data_dir.join(&name));
    }

    debug!(count = sources.len(), "Extracts discovered");
    Ok(sources)
}

/// Decodes one extract into its filtered rows, header rows included.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn decode_source(path: &Path) -> Result<Vec<FilteredRow>> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let bytes = read_csv_bytes(path)?;

    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes.as_slice());

    let mut rows = Vec::new();
    // Invalid UTF-8 (older extracts carry Latin-1 place names) decodes lossily.
    for (i, result) in rdr.byte_records().enumerate() {
        let record = result.with_context(|| format!("parsing CSV in {}", file_name))?;
        let fields: Vec<_> = record.iter().map(String::from_utf8_lossy).collect();
        let row = filter_row(&fields).map_err(|e| match e {
            AcsError::MalformedRecord { fields, required } => AcsError::MalformedRow {
                source_name: file_name.clone(),
                row: i as u64 + 1,
                fields,
                required,
            },
            other => other,
        })?;
        rows.push(row);
    }

    debug!(rows = rows.len(), "Extract decoded");
    Ok(rows)
}

fn read_csv_bytes(path: &Path) -> Result<Vec<u8>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("zip") => read_zip_entry(path),
        Some("gz") => {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            let mut out = Vec::new();
            GzDecoder::new(file)
                .read_to_end(&mut out)
                .with_context(|| format!("decompressing {}", path.display()))?;
            Ok(out)
        }
        _ => fs::read(path).with_context(|| format!("reading {}", path.display())),
    }
}

/// Reads the CSV member of a zip archive: `<stem>.csv` if present, otherwise
/// the first `.csv` entry.
fn read_zip_entry(path: &Path) -> Result<Vec<u8>> {
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mut archive = ZipArchive::new(Cursor::new(data))
        .with_context(|| format!("opening zip archive {}", path.display()))?;

    let preferred = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|stem| format!("{}.csv", stem));

    let mut chosen = None;
    for idx in 0..archive.len() {
        let entry = archive.by_index(idx)?;
        let name = entry.name().rsplit('/').next().unwrap_or_default().to_string();
        if Some(&name) == preferred.as_ref() {
            chosen = Some(idx);
            break;
        }
        if chosen.is_none() && name.to_lowercase().ends_with(".csv") {
            chosen = Some(idx);
        }
    }

    let idx = chosen.ok_or_else(|| anyhow!("no CSV entry in {}", path.display()))?;
    let mut entry = archive.by_index(idx)?;
    debug!(entry = entry.name(), "Reading archive entry");

    let mut out = Vec::new();
    entry
        .read_to_end(&mut out)
        .with_context(|| format!("reading entry {} of {}", entry.name(), path.display()))?;
    Ok(out)
}

/// Loads a membership list: the non-empty values of `column` in a headered CSV.
#[instrument(skip_all, fields(path = %path.display(), column = column))]
pub fn load_membership(path: &Path, column: usize) -> Result<HashSet<String>> {
    let bytes = read_csv_bytes(path)?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes.as_slice());

    let mut ids = HashSet::new();
    for result in rdr.byte_records() {
        let record = result.with_context(|| format!("parsing {}", path.display()))?;
        if let Some(value) = record.get(column).map(String::from_utf8_lossy)
            && !value.trim().is_empty()
        {
            ids.insert(value.trim().to_string());
        }
    }

    debug!(ids = ids.len(), "Membership list loaded");
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn dp02_line(name: &str) -> String {
        let mut fields: Vec<String> = (0..383).map(|i| i.to_string()).collect();
        fields[2] = format!("\"{}\"", name);
        fields.join(",")
    }

    #[test]
    fn test_year_from_file_name() {
        assert_eq!(year_from_file_name("ACS_10_5YR_DP02.zip"), Some(2010));
        assert_eq!(year_from_file_name("ACS_14_5YR_DP02.csv"), Some(2014));
        assert_eq!(year_from_file_name("ACS_13_5YR_DP02.csv.gz"), Some(2013));
        assert_eq!(year_from_file_name("ACS_13_5YR_DP03.zip"), None);
        assert_eq!(year_from_file_name("notes.txt"), None);
    }

    #[test]
    fn test_discover_ignores_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ACS_11_5YR_DP02.csv"), "").unwrap();
        fs::write(dir.path().join("ACS_10_5YR_DP02.csv"), "").unwrap();
        fs::write(dir.path().join("README.md"), "").unwrap();

        let found = discover(dir.path()).unwrap();
        assert_eq!(found.keys().copied().collect::<Vec<_>>(), vec![2010, 2011]);
    }

    #[test]
    fn test_discover_first_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ACS_10_5YR_DP02.csv"), "").unwrap();
        fs::write(dir.path().join("ACS_10_5YR_DP02.zip"), "").unwrap();

        let found = discover(dir.path()).unwrap();
        assert_eq!(found[&2010], dir.path().join("ACS_10_5YR_DP02.csv"));
    }

    #[test]
    fn test_decode_plain_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ACS_10_5YR_DP02.csv");
        let content = format!("{}\n{}\n", dp02_line("Tract 1, Foo"), dp02_line("Tract 2"));
        fs::write(&path, content).unwrap();

        let rows = decode_source(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name(), "Tract 1, Foo");
        assert_eq!(rows[0].fields()[3], "343");
    }

    #[test]
    fn test_decode_gzip_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ACS_10_5YR_DP02.csv.gz");
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(dp02_line("Tract 9").as_bytes()).unwrap();
        fs::write(&path, enc.finish().unwrap()).unwrap();

        let rows = decode_source(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name(), "Tract 9");
    }

    #[test]
    fn test_decode_zip_prefers_matching_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ACS_12_5YR_DP02.zip");
        let mut zw = zip::ZipWriter::new(File::create(&path).unwrap());
        zw.start_file("other.csv", SimpleFileOptions::default()).unwrap();
        zw.write_all(dp02_line("Wrong").as_bytes()).unwrap();
        zw.start_file("ACS_12_5YR_DP02.csv", SimpleFileOptions::default())
            .unwrap();
        zw.write_all(dp02_line("Right").as_bytes()).unwrap();
        zw.finish().unwrap();

        let rows = decode_source(&path).unwrap();
        assert_eq!(rows[0].name(), "Right");
    }

    #[test]
    fn test_decode_zip_without_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ACS_12_5YR_DP02.zip");
        let mut zw = zip::ZipWriter::new(File::create(&path).unwrap());
        zw.start_file("metadata.txt", SimpleFileOptions::default())
            .unwrap();
        zw.write_all(b"hello").unwrap();
        zw.finish().unwrap();

        assert!(decode_source(&path).is_err());
    }

    #[test]
    fn test_decode_short_row_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ACS_10_5YR_DP02.csv");
        fs::write(&path, format!("{}\na,b,c\n", dp02_line("Tract 1"))).unwrap();

        let err = decode_source(&path).unwrap_err();
        let acs = err.downcast_ref::<AcsError>().unwrap();
        assert_eq!(
            acs,
            &AcsError::MalformedRow {
                source_name: "ACS_10_5YR_DP02.csv".into(),
                row: 2,
                fields: 3,
                required: 383,
            }
        );
    }

    #[test]
    fn test_decode_invalid_utf8_is_lossy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ACS_10_5YR_DP02.csv");
        let mut content = dp02_line("Do\u{0}a Ana County").into_bytes();
        let pos = content.iter().position(|&b| b == 0).unwrap();
        content[pos] = 0xf1;
        content.push(b'\n');
        content.extend_from_slice(dp02_line("Tract 2").as_bytes());
        fs::write(&path, content).unwrap();

        let rows = decode_source(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name(), "Do\u{FFFD}a Ana County");
        assert_eq!(rows[1].name(), "Tract 2");
    }

    #[test]
    fn test_load_membership_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urban.csv");
        fs::write(&path, b"geoid,name\n1400000US001,Do\xf1a\n".as_slice()).unwrap();

        let ids = load_membership(&path, 0).unwrap();
        assert!(ids.contains("1400000US001"));
    }

    #[test]
    fn test_decode_missing_file() {
        assert!(decode_source(Path::new("/nonexistent/ACS_10_5YR_DP02.zip")).is_err());
    }

    #[test]
    fn test_load_membership_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urban.csv");
        fs::write(&path, "name,geoid\nA,1400000US001\nB, 1400000US002 \nC,\n").unwrap();

        let ids = load_membership(&path, 1).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("1400000US002"));
    }
}
