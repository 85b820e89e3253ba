//! Column projection for raw DP02 records.

use crate::error::AcsError;

/// Raw column positions kept from every DP02 record, in output order.
///
/// | Raw index   | Meaning                          |
/// |-------------|----------------------------------|
/// | 0, 1        | tract ids (`GEO.id`, `GEO.id2`)  |
/// | 2           | tract display name               |
/// | 343         | total population                 |
/// | 371..=382   | citizenship status (minus 377)   |
pub const KEPT_COLUMNS: [usize; 15] = [
    0, 1, 2, 343, 371, 372, 373, 374, 375, 376, 378, 379, 380, 381, 382,
];

/// Minimum raw record length accepted by [`filter_row`].
pub const REQUIRED_FIELDS: usize = 383;

/// One DP02 record reduced to [`KEPT_COLUMNS`].
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredRow(Vec<String>);

impl FilteredRow {
    /// Wraps already-projected fields. The length must match [`KEPT_COLUMNS`].
    pub fn new(fields: Vec<String>) -> Result<Self, AcsError> {
        if fields.len() != KEPT_COLUMNS.len() {
            return Err(AcsError::MalformedRecord {
                fields: fields.len(),
                required: KEPT_COLUMNS.len(),
            });
        }
        Ok(Self(fields))
    }

    pub fn id(&self) -> &str {
        &self.0[0]
    }

    pub fn id2(&self) -> &str {
        &self.0[1]
    }

    pub fn name(&self) -> &str {
        &self.0[2]
    }

    pub fn total_pop(&self) -> f64 {
        parse_number(&self.0[3])
    }

    /// First citizenship column: the foreign-born count.
    pub fn foreign_pop(&self) -> f64 {
        parse_number(&self.0[4])
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }
}

/// Projects a raw record onto [`KEPT_COLUMNS`].
///
/// # Errors
///
/// Returns [`AcsError::MalformedRecord`] if the record has fewer than
/// [`REQUIRED_FIELDS`] fields.
pub fn filter_row<S: AsRef<str>>(raw: &[S]) -> Result<FilteredRow, AcsError> {
    if raw.len() < REQUIRED_FIELDS {
        return Err(AcsError::MalformedRecord {
            fields: raw.len(),
            required: REQUIRED_FIELDS,
        });
    }

    Ok(FilteredRow(
        KEPT_COLUMNS
            .iter()
            .map(|&i| raw[i].as_ref().to_string())
            .collect(),
    ))
}

/// Lenient numeric parse for census count fields.
///
/// Blank fields count as zero; anything else that does not parse (e.g. `(X)`
/// or `**`) becomes `NaN` and flows through the arithmetic unchanged. The only
/// spelling of infinity accepted is `Infinity` with an optional sign; `inf`
/// and `infinity` are `NaN`.
pub fn parse_number(field: &str) -> f64 {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => match trimmed {
            "Infinity" | "+Infinity" => f64::INFINITY,
            "-Infinity" => f64::NEG_INFINITY,
            _ => f64::NAN,
        },
    }
}
