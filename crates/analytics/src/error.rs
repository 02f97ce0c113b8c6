use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error("Not enough data to perform calculation: {0}")]
    NotEnoughData(String),

    #[error("Unknown project '{0}'")]
    UnknownProject(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
