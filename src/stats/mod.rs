//! Stats module - trend fitting for the time-series presenters

mod trend;

pub use trend::{CurveFit, LinearFit, MovingAverage};
