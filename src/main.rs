//! Shooting Report - NYPD shooting incident EDA
//!
//! One-shot batch pipeline: fetch the public incident CSV, normalize it,
//! run the aggregation passes, print a summary and render the charts.

mod charts;
mod data;
mod stats;

use anyhow::Context;
use charts::ChartRenderer;

/// NYPD Shooting Incident Data (Historic), NYC Open Data.
const DATA_URL: &str =
    "https://data.cityofnewyork.us/api/views/833y-fsy8/rows.csv?accessType=DOWNLOAD";
const CHART_DIR: &str = "charts";

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let raw = data::fetch(DATA_URL).context("loading incident data")?;
    let (table, report) = data::normalize(&raw).context("normalizing incident data")?;

    println!(
        "{} of {} rows retained ({} excluded for unparseable dates)",
        report.output_rows, report.input_rows, report.excluded_rows
    );
    println!("{}", table.head(Some(5)));

    let age_pairs = data::age_pair_counts(&table).context("aggregating age groups")?;
    let boroughs = data::borough_shares(&table).context("aggregating boroughs")?;
    let monthly = data::monthly_outcomes(&table).context("aggregating monthly outcomes")?;

    for share in &boroughs {
        println!(
            "{:>14}: {:>6} incidents ({:.1}%)",
            share.borough.label(),
            share.count,
            share.percent
        );
    }

    let renderer = ChartRenderer::new(CHART_DIR).context("creating chart directory")?;
    let written = renderer
        .render_all(&table, &age_pairs, &boroughs, &monthly)
        .context("rendering charts")?;
    for path in written {
        println!("wrote {}", path.display());
    }

    Ok(())
}
