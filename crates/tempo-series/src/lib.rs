mod error;
mod record;
mod registry;
mod series;

pub use error::SeriesError;
pub use record::{Record, now_ns};
pub use registry::{Registry, SeriesHandle};
pub use series::{TimeSeries, mean, mean_by_interval};
