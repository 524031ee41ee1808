//! Data Normalizer Module
//! Coerces the raw incident table into typed columns and prunes the
//! columns the analysis never reads. Produces a new DataFrame; the input
//! is never mutated.

use polars::prelude::*;
use thiserror::Error;

pub const OCCUR_DATE: &str = "OCCUR_DATE";
pub const MURDER_FLAG: &str = "STATISTICAL_MURDER_FLAG";

/// Source date format, e.g. "01/15/2020".
const DATE_FORMAT: &str = "%m/%d/%Y";

/// Open-world categorical columns: every distinct raw string becomes its
/// own level, unrecognized values included.
pub const CATEGORICAL_COLUMNS: [&str; 7] = [
    "BORO",
    "PERP_AGE_GROUP",
    "PERP_SEX",
    "PERP_RACE",
    "VIC_AGE_GROUP",
    "VIC_SEX",
    "VIC_RACE",
];

/// Columns outside the analytical scope, removed when present.
pub const DROPPED_COLUMNS: [&str; 6] = [
    "X_COORD_CD",
    "Y_COORD_CD",
    "Lon_Lat",
    "PRECINCT",
    "JURISDICTION_CODE",
    "LOCATION_DESC",
];

#[derive(Error, Debug)]
pub enum NormalizerError {
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// Row accounting for one normalization pass.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeReport {
    pub input_rows: usize,
    pub output_rows: usize,
    /// Rows whose occurrence date could not be parsed. Excluded, not fatal.
    pub excluded_rows: usize,
}

/// Normalize the raw table:
/// - `OCCUR_DATE` month/day/year text becomes a Date; unparseable rows are
///   excluded and counted in the report
/// - the seven categorical columns become Categorical
/// - the murder flag becomes Boolean
/// - out-of-scope columns are dropped
///
/// Each coercion only applies when the column is not already in its target
/// dtype, so the pass is idempotent.
pub fn normalize(df: &DataFrame) -> Result<(DataFrame, NormalizeReport), NormalizerError> {
    let input_rows = df.height();
    let schema = df.schema();

    let mut coercions: Vec<Expr> = Vec::new();
    if schema.get(OCCUR_DATE) == Some(&DataType::String) {
        let options = StrptimeOptions {
            format: Some(DATE_FORMAT.into()),
            strict: false,
            ..Default::default()
        };
        coercions.push(col(OCCUR_DATE).str().to_date(options));
    }
    if schema.get(MURDER_FLAG) == Some(&DataType::String) {
        coercions.push(
            col(MURDER_FLAG)
                .str()
                .to_lowercase()
                .eq(lit("true"))
                .alias(MURDER_FLAG),
        );
    }
    for name in CATEGORICAL_COLUMNS {
        if schema.get(name) == Some(&DataType::String) {
            coercions.push(col(name).cast(DataType::Categorical(None, Default::default())));
        }
    }

    let mut lf = df.clone().lazy();
    if !coercions.is_empty() {
        lf = lf.with_columns(coercions);
    }
    let out = lf.filter(col(OCCUR_DATE).is_not_null()).collect()?;
    let out = out.drop_many(DROPPED_COLUMNS.iter().copied());

    let output_rows = out.height();
    let excluded_rows = input_rows - output_rows;
    if excluded_rows > 0 {
        log::warn!("excluded {excluded_rows} rows with unparseable occurrence dates");
    }

    Ok((
        out,
        NormalizeReport {
            input_rows,
            output_rows,
            excluded_rows,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn raw_table() -> DataFrame {
        df!(
            OCCUR_DATE => ["01/15/2020", "02/02/2020", "13/45/2020"],
            "BORO" => ["BRONX", "BROOKLYN", "QUEENS"],
            MURDER_FLAG => ["true", "FALSE", "false"],
            "PERP_AGE_GROUP" => ["18-24", "UNKNOWN", "<18"],
            "PERP_SEX" => ["M", "U", "M"],
            "PERP_RACE" => ["BLACK", "UNKNOWN", "WHITE"],
            "VIC_AGE_GROUP" => ["25-44", "18-24", "65+"],
            "VIC_SEX" => ["M", "F", "M"],
            "VIC_RACE" => ["BLACK", "BLACK", "WHITE"],
            "Latitude" => [40.82, 40.67, 40.70],
            "Longitude" => [-73.91, -73.94, -73.80],
            "PRECINCT" => [44i32, 73, 103],
            "JURISDICTION_CODE" => [0i32, 0, 0],
            "LOCATION_DESC" => ["", "MULTI DWELL", ""],
            "X_COORD_CD" => [1000i64, 1001, 1002],
            "Y_COORD_CD" => [2000i64, 2001, 2002],
            "Lon_Lat" => ["POINT (-73.91 40.82)", "POINT (-73.94 40.67)", "POINT (-73.80 40.70)"],
        )
        .unwrap()
    }

    #[test]
    fn parses_dates_and_excludes_malformed_rows() {
        let (out, report) = normalize(&raw_table()).unwrap();
        assert_eq!(report.input_rows, 3);
        assert_eq!(report.excluded_rows, 1);
        assert_eq!(out.height(), 2);

        let dates = out.column(OCCUR_DATE).unwrap().date().unwrap();
        let first = NaiveDate::from_ymd_opt(2020, 1, 15).unwrap();
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        let expected_days = (first - epoch).num_days() as i32;
        assert_eq!(dates.get(0), Some(expected_days));
    }

    #[test]
    fn recodes_categoricals_and_flag() {
        let (out, _) = normalize(&raw_table()).unwrap();
        for name in CATEGORICAL_COLUMNS {
            assert!(
                matches!(out.column(name).unwrap().dtype(), DataType::Categorical(_, _)),
                "{name} should be categorical"
            );
        }
        let flags: Vec<_> = out
            .column(MURDER_FLAG)
            .unwrap()
            .bool()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(flags, vec![Some(true), Some(false)]);
    }

    #[test]
    fn drops_exactly_the_out_of_scope_columns() {
        let raw = raw_table();
        let (out, _) = normalize(&raw).unwrap();
        for name in DROPPED_COLUMNS {
            assert!(out.column(name).is_err(), "{name} should be dropped");
        }
        for name in raw.get_column_names() {
            if !DROPPED_COLUMNS.contains(&name.as_str()) {
                assert!(out.column(name).is_ok(), "{name} should survive");
            }
        }
    }

    #[test]
    fn normalizing_twice_is_a_no_op() {
        let (once, _) = normalize(&raw_table()).unwrap();
        let (twice, report) = normalize(&once).unwrap();
        assert_eq!(report.excluded_rows, 0);
        assert!(once.equals(&twice));
    }
}
