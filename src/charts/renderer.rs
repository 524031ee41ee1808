//! Static Chart Renderer
//! Draws the report's five figures to PNG files with plotters:
//! 1. Bubble grid of perpetrator x victim age groups
//! 2. Latitude/longitude scatter colored per borough
//! 3. Pie of borough shares, labels at the cumulative-midpoint angle
//! 4. Monthly counts per outcome with a least-squares line overlay
//! 5. The same series with a moving-average overlay

use chrono::{Duration, NaiveDate};
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::data::{AgePairCount, BoroughShare, MonthlyOutcome, Outcome, CANONICAL_AGE_BUCKETS};
use crate::stats::{CurveFit, LinearFit, MovingAverage};

const BUBBLE_COLOR: RGBColor = RGBColor(52, 152, 219);
const MURDER_COLOR: RGBColor = RGBColor(192, 57, 43);
const OTHER_COLOR: RGBColor = RGBColor(41, 128, 185);

/// Per-borough palette, one entry per slice/series in draw order.
const PALETTE: [RGBColor; 6] = [
    RGBColor(231, 76, 60),  // Red
    RGBColor(52, 152, 219), // Blue
    RGBColor(46, 204, 113), // Green
    RGBColor(155, 89, 182), // Purple
    RGBColor(243, 156, 18), // Orange
    RGBColor(96, 125, 139), // Blue Grey
];

const CHART_SIZE: (u32, u32) = (900, 700);
const PIE_SIZE: (u32, u32) = (800, 800);
const SMOOTHING_WINDOW: usize = 6;

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("drawing failed: {0}")]
    Draw(String),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for ChartError {
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        ChartError::Draw(err.to_string())
    }
}

/// Renders the report figures into a target directory.
pub struct ChartRenderer {
    out_dir: PathBuf,
}

impl ChartRenderer {
    pub fn new(out_dir: impl Into<PathBuf>) -> Result<Self, ChartError> {
        let out_dir = out_dir.into();
        std::fs::create_dir_all(&out_dir)?;
        Ok(Self { out_dir })
    }

    /// Draw every figure and return the written paths.
    pub fn render_all(
        &self,
        table: &DataFrame,
        age_pairs: &[AgePairCount],
        boroughs: &[BoroughShare],
        monthly: &[MonthlyOutcome],
    ) -> Result<Vec<PathBuf>, ChartError> {
        Ok(vec![
            self.age_bubble(age_pairs)?,
            self.borough_map(table)?,
            self.borough_pie(boroughs)?,
            self.monthly_trend(monthly, &LinearFit, "monthly_trend_linear.png", "linear trend")?,
            self.monthly_trend(
                monthly,
                &MovingAverage {
                    window: SMOOTHING_WINDOW,
                },
                "monthly_trend_smoothed.png",
                "smoothed trend",
            )?,
        ])
    }

    /// Bubble grid over the canonical age buckets, radius scaled by
    /// sqrt(count) so area tracks the count.
    pub fn age_bubble(&self, rows: &[AgePairCount]) -> Result<PathBuf, ChartError> {
        let path = self.out_dir.join("age_bubble.png");
        // The backend borrows the path; keep it scoped so the path can be
        // handed back once the file is written.
        {
            let root = BitMapBackend::new(&path, CHART_SIZE).into_drawing_area();
            root.fill(&WHITE)?;

            let max_count = rows.iter().map(|r| r.count).max().unwrap_or(1).max(1) as f64;

            let mut chart = ChartBuilder::on(&root)
                .caption("Incidents by perpetrator and victim age group", ("sans-serif", 24))
                .margin(20)
                .x_label_area_size(60)
                .y_label_area_size(80)
                .build_cartesian_2d(-0.5f64..4.5f64, -0.5f64..4.5f64)?;
            chart
                .configure_mesh()
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&bucket_axis_label)
                .y_label_formatter(&bucket_axis_label)
                .x_desc("Perpetrator age group")
                .y_desc("Victim age group")
                .draw()?;

            chart.draw_series(rows.iter().filter_map(|row| {
                let x = row.perp.canonical_index()? as f64;
                let y = row.victim.canonical_index()? as f64;
                let radius = (4.0 + 40.0 * (row.count as f64 / max_count).sqrt()) as i32;
                Some(Circle::new((x, y), radius, BUBBLE_COLOR.mix(0.5).filled()))
            }))?;

            root.present()?;
        }
        Ok(path)
    }

    /// Geographic scatter: one point per incident with coordinates, colored
    /// per borough. Stands in for a choropleth; no base map.
    pub fn borough_map(&self, table: &DataFrame) -> Result<PathBuf, ChartError> {
        let path = self.out_dir.join("borough_map.png");

        let located = table
            .clone()
            .lazy()
            .select([
                col("BORO").cast(DataType::String),
                col("Longitude"),
                col("Latitude"),
            ])
            .drop_nulls(None)
            .collect()?;

        let boros = located.column("BORO")?.str()?;
        let lons = located.column("Longitude")?.f64()?;
        let lats = located.column("Latitude")?.f64()?;

        let mut by_borough: BTreeMap<String, Vec<(f64, f64)>> = BTreeMap::new();
        for i in 0..located.height() {
            if let (Some(boro), Some(lon), Some(lat)) = (boros.get(i), lons.get(i), lats.get(i)) {
                by_borough.entry(boro.to_string()).or_default().push((lon, lat));
            }
        }

        let all = by_borough.values().flatten();
        let (mut lon_min, mut lon_max) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut lat_min, mut lat_max) = (f64::INFINITY, f64::NEG_INFINITY);
        for &(lon, lat) in all {
            lon_min = lon_min.min(lon);
            lon_max = lon_max.max(lon);
            lat_min = lat_min.min(lat);
            lat_max = lat_max.max(lat);
        }
        if !lon_min.is_finite() {
            // No located incidents; NYC bounding box keeps the axes sane.
            (lon_min, lon_max, lat_min, lat_max) = (-74.3, -73.7, 40.5, 40.9);
        }
        let lon_pad = ((lon_max - lon_min) * 0.05).max(0.01);
        let lat_pad = ((lat_max - lat_min) * 0.05).max(0.01);

        {
            let root = BitMapBackend::new(&path, CHART_SIZE).into_drawing_area();
            root.fill(&WHITE)?;
            let mut chart = ChartBuilder::on(&root)
                .caption("Incident locations by borough", ("sans-serif", 24))
                .margin(20)
                .x_label_area_size(50)
                .y_label_area_size(70)
                .build_cartesian_2d(
                    (lon_min - lon_pad)..(lon_max + lon_pad),
                    (lat_min - lat_pad)..(lat_max + lat_pad),
                )?;
            chart
                .configure_mesh()
                .x_desc("Longitude")
                .y_desc("Latitude")
                .draw()?;

            for (idx, (boro, points)) in by_borough.iter().enumerate() {
                let color = PALETTE[idx % PALETTE.len()];
                chart
                    .draw_series(
                        points
                            .iter()
                            .map(|&(lon, lat)| Circle::new((lon, lat), 2, color.mix(0.4).filled())),
                    )?
                    .label(boro.clone())
                    .legend(move |(x, y)| Circle::new((x + 8, y), 4, color.filled()));
            }
            chart
                .configure_series_labels()
                .background_style(&WHITE.mix(0.85))
                .border_style(&BLACK)
                .draw()?;

            root.present()?;
        }
        Ok(path)
    }

    /// Pie of borough shares. Slices start at 12 o'clock and run clockwise
    /// in the aggregate's order; each label sits at the slice's
    /// cumulative-midpoint angle carried in the aggregate itself.
    pub fn borough_pie(&self, shares: &[BoroughShare]) -> Result<PathBuf, ChartError> {
        let path = self.out_dir.join("borough_pie.png");
        {
            let root = BitMapBackend::new(&path, PIE_SIZE).into_drawing_area();
            root.fill(&WHITE)?;
            root.draw(&Text::new(
                "Incidents by borough",
                (20, 20),
                ("sans-serif", 24).into_font(),
            ))?;

            let center = (PIE_SIZE.0 as i32 / 2, PIE_SIZE.1 as i32 / 2);
            let radius = 280.0;

            let mut start_pct = 0.0;
            for (idx, share) in shares.iter().enumerate() {
                let color = PALETTE[idx % PALETTE.len()];

                // Triangle fan over the slice's arc, one vertex per degree.
                let steps = (share.percent * 3.6).ceil().max(2.0) as usize;
                let mut vertices = vec![center];
                for step in 0..=steps {
                    let pct = start_pct + share.percent * step as f64 / steps as f64;
                    vertices.push(polar_point(center, radius, pct));
                }
                root.draw(&Polygon::new(vertices, color.mix(0.9).filled()))?;

                let label_at = polar_point(center, radius * 0.65, share.label_position);
                root.draw(&Text::new(
                    format!("{} {:.1}%", share.borough.label(), share.percent),
                    label_at,
                    ("sans-serif", 18).into_font(),
                ))?;

                start_pct += share.percent;
            }

            root.present()?;
        }
        Ok(path)
    }

    /// Monthly counts per outcome as scatter + connecting lines, with a
    /// fitted overlay per outcome from the given fitter.
    fn monthly_trend(
        &self,
        monthly: &[MonthlyOutcome],
        fitter: &dyn CurveFit,
        file_name: &str,
        overlay_label: &str,
    ) -> Result<PathBuf, ChartError> {
        let path = self.out_dir.join(file_name);
        {
            let root = BitMapBackend::new(&path, CHART_SIZE).into_drawing_area();
            root.fill(&WHITE)?;

            // No months means nothing to plot; an empty canvas still gets
            // written so every figure the caller expects exists on disk.
            if let Some(first) = monthly.iter().map(|r| r.month).min() {
                let last = monthly.iter().map(|r| r.month).max().unwrap_or(first);
                let last = last + Duration::days(27); // room for the final month's point
                let max_count = monthly.iter().map(|r| r.count).max().unwrap_or(1) as f64;

                let mut chart = ChartBuilder::on(&root)
                    .caption("Shootings per month", ("sans-serif", 24))
                    .margin(20)
                    .x_label_area_size(50)
                    .y_label_area_size(60)
                    .build_cartesian_2d(first..last, 0.0..max_count * 1.1)?;
                chart
                    .configure_mesh()
                    .x_label_formatter(&|d: &NaiveDate| d.format("%Y-%m").to_string())
                    .x_desc("Month")
                    .y_desc("Incidents")
                    .draw()?;

                for (outcome, color) in [
                    (Outcome::Murder, MURDER_COLOR),
                    (Outcome::OtherShooting, OTHER_COLOR),
                ] {
                    let series: Vec<(NaiveDate, f64)> = monthly
                        .iter()
                        .filter(|r| r.outcome == outcome)
                        .map(|r| (r.month, r.count as f64))
                        .collect();
                    if series.is_empty() {
                        continue;
                    }

                    chart
                        .draw_series(LineSeries::new(series.iter().copied(), &color.mix(0.6)))?
                        .label(outcome.label())
                        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], &color));
                    chart.draw_series(
                        series
                            .iter()
                            .map(|&(month, count)| Circle::new((month, count), 3, color.filled())),
                    )?;

                    // Fit on days-since-first so the x axis stays a date axis.
                    let samples: Vec<(f64, f64)> = series
                        .iter()
                        .map(|&(month, count)| ((month - first).num_days() as f64, count))
                        .collect();
                    let fitted = fitter.fit(&samples);
                    chart
                        .draw_series(LineSeries::new(
                            fitted
                                .iter()
                                .map(|&(days, y)| (first + Duration::days(days as i64), y)),
                            color.stroke_width(3),
                        ))?
                        .label(format!("{} ({overlay_label})", outcome.label()))
                        .legend(move |(x, y)| {
                            PathElement::new(vec![(x, y), (x + 18, y)], color.stroke_width(3))
                        });
                }

                chart
                    .configure_series_labels()
                    .background_style(&WHITE.mix(0.85))
                    .border_style(&BLACK)
                    .draw()?;
            }

            root.present()?;
        }
        Ok(path)
    }
}

fn bucket_axis_label(value: &f64) -> String {
    let idx = value.round();
    if (value - idx).abs() < 1e-6 && (0.0..=4.0).contains(&idx) {
        CANONICAL_AGE_BUCKETS[idx as usize].to_string()
    } else {
        String::new()
    }
}

fn polar_point(center: (i32, i32), radius: f64, pct: f64) -> (i32, i32) {
    // 0% points straight up; percentages sweep clockwise.
    let angle = (pct / 100.0) * std::f64::consts::TAU - std::f64::consts::FRAC_PI_2;
    (
        center.0 + (radius * angle.cos()).round() as i32,
        center.1 + (radius * angle.sin()).round() as i32,
    )
}
