//! Aggregation Module
//! The three independent summarization passes over the normalized table.
//! Each pass is a pure function: it reads the table and returns a new,
//! typed aggregate; the table itself is never touched.

use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;

use super::normalizer::{MURDER_FLAG, OCCUR_DATE};

/// Level used for null categorical keys. A missing value is still a level,
/// never a reason to drop the row from the full table.
const UNKNOWN_LEVEL: &str = "UNKNOWN";

/// The five age ranges used for cross-tabulation, in canonical order.
pub const CANONICAL_AGE_BUCKETS: [&str; 5] = ["<18", "18-24", "25-44", "45-64", "65+"];

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// Closed set of known age ranges plus a fallback carrying whatever raw
/// string the source produced ("UNKNOWN", "(null)", "1020", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AgeBucket {
    Under18,
    Age18To24,
    Age25To44,
    Age45To64,
    Age65Plus,
    Other(String),
}

impl AgeBucket {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "<18" => AgeBucket::Under18,
            "18-24" => AgeBucket::Age18To24,
            "25-44" => AgeBucket::Age25To44,
            "45-64" => AgeBucket::Age45To64,
            "65+" => AgeBucket::Age65Plus,
            other => AgeBucket::Other(other.to_string()),
        }
    }

    /// Position in [`CANONICAL_AGE_BUCKETS`], `None` for the fallback.
    pub fn canonical_index(&self) -> Option<usize> {
        match self {
            AgeBucket::Under18 => Some(0),
            AgeBucket::Age18To24 => Some(1),
            AgeBucket::Age25To44 => Some(2),
            AgeBucket::Age45To64 => Some(3),
            AgeBucket::Age65Plus => Some(4),
            AgeBucket::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Borough {
    Bronx,
    Brooklyn,
    Manhattan,
    Queens,
    StatenIsland,
    Other(String),
}

impl Borough {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "BRONX" => Borough::Bronx,
            "BROOKLYN" => Borough::Brooklyn,
            "MANHATTAN" => Borough::Manhattan,
            "QUEENS" => Borough::Queens,
            "STATEN ISLAND" => Borough::StatenIsland,
            other => Borough::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Borough::Bronx => "BRONX",
            Borough::Brooklyn => "BROOKLYN",
            Borough::Manhattan => "MANHATTAN",
            Borough::Queens => "QUEENS",
            Borough::StatenIsland => "STATEN ISLAND",
            Borough::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Murder,
    OtherShooting,
}

impl Outcome {
    pub fn from_flag(murder: bool) -> Self {
        if murder {
            Outcome::Murder
        } else {
            Outcome::OtherShooting
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Murder => "murders",
            Outcome::OtherShooting => "other shootings",
        }
    }
}

/// One cell of the perpetrator x victim age cross-tabulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgePairCount {
    pub perp: AgeBucket,
    pub victim: AgeBucket,
    pub count: u32,
}

/// One borough's slice of the citywide total.
#[derive(Debug, Clone, PartialEq)]
pub struct BoroughShare {
    pub borough: Borough,
    pub count: u32,
    pub percent: f64,
    /// Running percentage sum up to and including this borough, minus half
    /// its own share. Angular label position on the pie chart.
    pub label_position: f64,
}

/// Incident count for one (month, outcome) pair present in the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyOutcome {
    pub month: NaiveDate,
    pub outcome: Outcome,
    pub count: u32,
}

/// Cross-tabulate perpetrator and victim age groups, keeping only pairs
/// where both sides fall in a canonical bucket. Sparse: absent pairs are
/// absent, not zero-filled. Ordered canonically on both axes.
pub fn age_pair_counts(table: &DataFrame) -> Result<Vec<AgePairCount>, AggregateError> {
    let grouped = table
        .clone()
        .lazy()
        .group_by([col("PERP_AGE_GROUP"), col("VIC_AGE_GROUP")])
        .agg([len().alias("count")])
        .with_columns([
            col("PERP_AGE_GROUP").cast(DataType::String),
            col("VIC_AGE_GROUP").cast(DataType::String),
        ])
        .collect()?;

    let perps = grouped.column("PERP_AGE_GROUP")?.str()?;
    let victims = grouped.column("VIC_AGE_GROUP")?.str()?;
    let counts = grouped.column("count")?.u32()?;

    let mut rows = Vec::new();
    for i in 0..grouped.height() {
        let perp = AgeBucket::parse(perps.get(i).unwrap_or(UNKNOWN_LEVEL));
        let victim = AgeBucket::parse(victims.get(i).unwrap_or(UNKNOWN_LEVEL));
        if perp.canonical_index().is_none() || victim.canonical_index().is_none() {
            continue;
        }
        rows.push(AgePairCount {
            perp,
            victim,
            count: counts.get(i).unwrap_or(0),
        });
    }
    rows.sort_by_key(|r| (r.perp.canonical_index(), r.victim.canonical_index()));
    Ok(rows)
}

/// Count incidents per borough and derive each borough's percentage share
/// plus the cumulative midpoint used for pie-slice labels. The running sum
/// is taken over boroughs in descending name order; the downstream chart
/// depends on that ordering for its angular layout.
pub fn borough_shares(table: &DataFrame) -> Result<Vec<BoroughShare>, AggregateError> {
    let grouped = table
        .clone()
        .lazy()
        .group_by([col("BORO")])
        .agg([len().alias("count")])
        .with_columns([col("BORO").cast(DataType::String)])
        .collect()?;

    let names = grouped.column("BORO")?.str()?;
    let counts = grouped.column("count")?.u32()?;

    let mut tallies: Vec<(String, u32)> = (0..grouped.height())
        .map(|i| {
            (
                names.get(i).unwrap_or(UNKNOWN_LEVEL).to_string(),
                counts.get(i).unwrap_or(0),
            )
        })
        .collect();
    tallies.sort_by(|a, b| b.0.cmp(&a.0));

    let total: u32 = tallies.iter().map(|(_, n)| n).sum();
    if total == 0 {
        return Ok(Vec::new());
    }

    let mut running = 0.0;
    let shares = tallies
        .into_iter()
        .map(|(name, count)| {
            let percent = count as f64 / total as f64 * 100.0;
            running += percent;
            BoroughShare {
                borough: Borough::parse(&name),
                count,
                percent,
                label_position: running - percent / 2.0,
            }
        })
        .collect();
    Ok(shares)
}

/// Count incidents per (month, outcome). The occurrence date is truncated
/// to the first day of its month; the murder flag is relabeled as one of
/// the two outcome labels. Sorted by month, then outcome label.
pub fn monthly_outcomes(table: &DataFrame) -> Result<Vec<MonthlyOutcome>, AggregateError> {
    let grouped = table
        .clone()
        .lazy()
        .select([
            col(OCCUR_DATE).dt().year().alias("year"),
            col(OCCUR_DATE).dt().month().cast(DataType::Int32).alias("month"),
            col(MURDER_FLAG),
        ])
        .group_by([col("year"), col("month"), col(MURDER_FLAG)])
        .agg([len().alias("count")])
        .collect()?;

    let years = grouped.column("year")?.i32()?;
    let months = grouped.column("month")?.i32()?;
    let flags = grouped.column(MURDER_FLAG)?.bool()?;
    let counts = grouped.column("count")?.u32()?;

    let mut rows = Vec::new();
    for i in 0..grouped.height() {
        let (Some(year), Some(month)) = (years.get(i), months.get(i)) else {
            continue;
        };
        let Some(month_start) = NaiveDate::from_ymd_opt(year, month as u32, 1) else {
            continue;
        };
        rows.push(MonthlyOutcome {
            month: month_start,
            outcome: Outcome::from_flag(flags.get(i).unwrap_or(false)),
            count: counts.get(i).unwrap_or(0),
        });
    }
    rows.sort_by(|a, b| (a.month, a.outcome.label()).cmp(&(b.month, b.outcome.label())));
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date_table(pairs: &[(&str, bool)]) -> DataFrame {
        let dates: Vec<&str> = pairs.iter().map(|(d, _)| *d).collect();
        let flags: Vec<bool> = pairs.iter().map(|(_, f)| *f).collect();
        let n = pairs.len();
        let raw = df!(
            OCCUR_DATE => dates,
            MURDER_FLAG => flags,
            "BORO" => vec!["BRONX"; n],
            "PERP_AGE_GROUP" => vec!["18-24"; n],
            "PERP_SEX" => vec!["M"; n],
            "PERP_RACE" => vec!["BLACK"; n],
            "VIC_AGE_GROUP" => vec!["18-24"; n],
            "VIC_SEX" => vec!["M"; n],
            "VIC_RACE" => vec!["BLACK"; n],
        )
        .unwrap();
        let (table, _) = crate::data::normalize(&raw).unwrap();
        table
    }

    fn age_table(rows: &[(&str, &str)]) -> DataFrame {
        let perps: Vec<&str> = rows.iter().map(|(p, _)| *p).collect();
        let victims: Vec<&str> = rows.iter().map(|(_, v)| *v).collect();
        df!(
            "PERP_AGE_GROUP" => perps,
            "VIC_AGE_GROUP" => victims,
        )
        .unwrap()
    }

    #[test]
    fn age_pairs_keep_only_canonical_buckets() {
        let table = age_table(&[
            ("18-24", "18-24"),
            ("18-24", "18-24"),
            ("18-24", "18-24"),
            ("<18", "65+"),
            ("UNKNOWN", "18-24"),
            ("UNKNOWN", "18-24"),
            ("UNKNOWN", "18-24"),
            ("UNKNOWN", "18-24"),
            ("UNKNOWN", "18-24"),
        ]);
        let rows = age_pair_counts(&table).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            AgePairCount {
                perp: AgeBucket::Under18,
                victim: AgeBucket::Age65Plus,
                count: 1
            }
        );
        assert_eq!(
            rows[1],
            AgePairCount {
                perp: AgeBucket::Age18To24,
                victim: AgeBucket::Age18To24,
                count: 3
            }
        );
    }

    #[test]
    fn age_pairs_are_canonically_ordered() {
        let table = age_table(&[("65+", "<18"), ("<18", "65+"), ("25-44", "25-44")]);
        let order: Vec<_> = age_pair_counts(&table)
            .unwrap()
            .into_iter()
            .map(|r| (r.perp.canonical_index(), r.victim.canonical_index()))
            .collect();
        assert_eq!(order, vec![(Some(0), Some(4)), (Some(2), Some(2)), (Some(4), Some(0))]);
    }

    #[test]
    fn borough_shares_sum_to_one_hundred() {
        let mut rows = vec!["BRONX"; 10];
        rows.extend(vec!["BROOKLYN"; 30]);
        let table = df!("BORO" => rows).unwrap();

        let shares = borough_shares(&table).unwrap();
        assert_eq!(shares.len(), 2);
        // descending name order: BROOKLYN first
        assert_eq!(shares[0].borough, Borough::Brooklyn);
        assert_eq!(shares[0].percent, 75.0);
        assert_eq!(shares[1].borough, Borough::Bronx);
        assert_eq!(shares[1].percent, 25.0);
        assert_eq!(shares[0].percent + shares[1].percent, 100.0);
        // cumulative midpoints: 75 - 37.5, then 100 - 12.5
        assert_eq!(shares[0].label_position, 37.5);
        assert_eq!(shares[1].label_position, 87.5);
    }

    #[test]
    fn borough_shares_of_empty_table_are_empty() {
        let table = df!("BORO" => Vec::<String>::new()).unwrap();
        assert!(borough_shares(&table).unwrap().is_empty());
    }

    #[test]
    fn monthly_outcomes_split_by_murder_flag() {
        let table = date_table(&[("03/05/2021", true), ("03/20/2021", false)]);
        let rows = monthly_outcomes(&table).unwrap();
        let march = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        assert_eq!(
            rows,
            vec![
                MonthlyOutcome {
                    month: march,
                    outcome: Outcome::Murder,
                    count: 1
                },
                MonthlyOutcome {
                    month: march,
                    outcome: Outcome::OtherShooting,
                    count: 1
                },
            ]
        );
        assert_eq!(rows[0].outcome.label(), "murders");
        assert_eq!(rows[1].outcome.label(), "other shootings");
    }
}
