//! CSV Data Loader Module
//! Fetches the incident dataset over HTTP and parses it with Polars.

use polars::prelude::*;
use std::io::Cursor;
use thiserror::Error;

/// Columns the pipeline reads downstream. The source carries more; anything
/// beyond this set is either dropped by the normalizer or passed through.
pub const REQUIRED_COLUMNS: [&str; 11] = [
    "OCCUR_DATE",
    "BORO",
    "STATISTICAL_MURDER_FLAG",
    "PERP_AGE_GROUP",
    "PERP_SEX",
    "PERP_RACE",
    "VIC_AGE_GROUP",
    "VIC_SEX",
    "VIC_RACE",
    "Latitude",
    "Longitude",
];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("failed to retrieve {url}: {source}")]
    Retrieval {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to parse CSV: {0}")]
    Parse(#[from] PolarsError),
    #[error("source is missing expected columns: {0:?}")]
    MissingColumns(Vec<String>),
}

/// Fetch the CSV resource at `url` and parse it into a DataFrame.
/// One attempt, no retry; a one-shot report has nothing sensible to do
/// with a flaky source beyond reporting it.
pub fn fetch(url: &str) -> Result<DataFrame, LoaderError> {
    let retrieval = |source| LoaderError::Retrieval {
        url: url.to_string(),
        source,
    };

    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(retrieval)?;
    let body = response.bytes().map_err(retrieval)?;
    log::info!("retrieved {} bytes from {url}", body.len());

    parse_csv(&body)
}

/// Parse delimited text with a header row into a DataFrame and verify the
/// expected column set is present.
pub fn parse_csv(bytes: &[u8]) -> Result<DataFrame, LoaderError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?;

    let names = df.get_column_names();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|want| !names.iter().any(|have| have.as_str() == **want))
        .map(|s| s.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(LoaderError::MissingColumns(missing));
    }

    log::info!("parsed {} rows x {} columns", df.height(), df.width());
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_rows() {
        let csv = "\
OCCUR_DATE,BORO,STATISTICAL_MURDER_FLAG,PERP_AGE_GROUP,PERP_SEX,PERP_RACE,VIC_AGE_GROUP,VIC_SEX,VIC_RACE,Latitude,Longitude
01/15/2020,BRONX,false,18-24,M,BLACK,25-44,M,BLACK,40.82,-73.91
";
        let df = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.width(), 11);
    }

    #[test]
    fn rejects_missing_columns() {
        let csv = "OCCUR_DATE,BORO\n01/15/2020,BRONX\n";
        match parse_csv(csv.as_bytes()) {
            Err(LoaderError::MissingColumns(cols)) => {
                assert!(cols.contains(&"STATISTICAL_MURDER_FLAG".to_string()));
                assert!(!cols.contains(&"BORO".to_string()));
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(parse_csv(b""), Err(LoaderError::Parse(_))));
    }
}
