use thiserror::Error;

/// Problems with the data handed to the analysis core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SampleError {
    #[error("data sample is empty")]
    Empty,

    #[error(
        "data sample needs at least one numeric and one categorical field \
         (numeric: {numeric}, categorical: {categorical})"
    )]
    NoChartableFields { numeric: usize, categorical: usize },
}
