use thiserror::Error;

/// Rejected user input: CLI values, config values and run outcomes the CLI
/// reports as failures.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Header '{value}' is not of the form 'Name: Value'.")]
    InvalidHeaderFormat { value: String },
    #[error("Duration is empty.")]
    DurationEmpty,
    #[error("Duration '{value}' must start with a number.")]
    InvalidDurationFormat { value: String },
    #[error("Duration '{value}' has an invalid number: {source}")]
    InvalidDurationNumber {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Duration does not fit in 64 bits of seconds.")]
    DurationOverflow,
    #[error("Unknown duration unit '{unit}'; use ms, s, m or h.")]
    InvalidDurationUnit { unit: String },
    #[error("Duration must be greater than zero.")]
    DurationZero,
    #[error("Expected a value of at least {min}.")]
    ValueTooSmall { min: u64 },
    #[error("Not a number: {source}")]
    InvalidNumber {
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("No URL given; pass one on the command line or list `urls` in the config file.")]
    MissingUrl,
    #[error("{failed} of {total} request(s) failed.")]
    RequestsFailed { failed: usize, total: usize },
}
