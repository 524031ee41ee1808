//! Data module - CSV retrieval, normalization and aggregation

mod aggregate;
mod loader;
mod normalizer;

pub use aggregate::{
    age_pair_counts, borough_shares, monthly_outcomes, AgeBucket, AgePairCount, Borough,
    BoroughShare, MonthlyOutcome, Outcome, CANONICAL_AGE_BUCKETS,
};
pub use loader::{fetch, parse_csv};
pub use normalizer::normalize;
