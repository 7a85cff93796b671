use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::{CliArgs, parse_header};
use crate::error::ConfigError;

use super::types::ConfigFile;

/// Applies file values to CLI arguments the user did not pass explicitly.
///
/// # Errors
///
/// Returns an error when a config value is invalid.
pub fn apply_config(
    args: &mut CliArgs,
    matches: &ArgMatches,
    config: &ConfigFile,
) -> Result<(), ConfigError> {
    if !is_cli(matches, "workers")
        && let Some(workers) = config.workers
    {
        if workers == 0 {
            return Err(ConfigError::FieldMustBePositive { field: "workers" });
        }
        args.workers = workers;
    }

    if !is_cli(matches, "user_agent")
        && let Some(user_agent) = config.user_agent.as_ref()
    {
        args.user_agent.clone_from(user_agent);
    }

    if !is_cli(matches, "request_timeout")
        && let Some(timeout) = config.timeout.as_ref()
    {
        args.request_timeout = timeout.to_duration("timeout")?;
    }

    if !is_cli(matches, "connect_timeout")
        && let Some(timeout) = config.connect_timeout.as_ref()
    {
        args.connect_timeout = timeout.to_duration("connect_timeout")?;
    }

    if !is_cli(matches, "error_status")
        && let Some(status) = config.error_status
    {
        args.error_status = status;
    }

    if !is_cli(matches, "tick")
        && let Some(tick) = config.tick.as_ref()
    {
        args.tick = tick.to_duration("tick")?;
    }

    if !is_cli(matches, "method")
        && let Some(method) = config.method
    {
        args.method = method;
    }

    if !is_cli(matches, "headers")
        && let Some(headers) = config.headers.as_ref()
    {
        let mut parsed = Vec::with_capacity(headers.len());
        for header in headers {
            parsed.push(
                parse_header(header).map_err(|err| ConfigError::InvalidHeader { source: err })?,
            );
        }
        args.headers = parsed;
    }

    if !is_cli(matches, "urls")
        && let Some(urls) = config.urls.as_ref()
    {
        args.urls.clone_from(urls);
    }

    if !is_cli(matches, "download_dir")
        && let Some(dir) = config.download_dir.as_ref()
    {
        args.download_dir = Some(dir.clone());
    }

    Ok(())
}

fn is_cli(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}
