use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum SeriesError {
    #[error("no records in series")]
    Empty,
}
