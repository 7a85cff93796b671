use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use clap::{ArgMatches, CommandFactory, FromArgMatches};
use tracing::{debug, error, info};

use tickhttp::args::{CliArgs, FetchMethod};
use tickhttp::client::{Callback, Client};
use tickhttp::config::{apply_config, load_config};
use tickhttp::error::{AppError, AppResult, ValidationError};
use tickhttp::request::Request;
use tickhttp::transport;

/// File name used when a URL has no usable last path segment.
const FALLBACK_FILE_NAME: &str = "index.html";

pub(crate) fn run() -> AppResult<()> {
    let (mut args, matches) = parse_args()?;
    if !tickhttp::logger::init_logging(args.verbose) {
        debug!("Logging was already initialized.");
    }

    if let Some(config) = load_config(args.config.as_deref())? {
        apply_config(&mut args, &matches, &config)?;
    }
    if args.urls.is_empty() {
        error!("Missing URL (pass at least one URL or set `urls` in config).");
        return Err(AppError::validation(ValidationError::MissingUrl));
    }
    let config = args.client_config();
    config.validate()?;

    transport::global_init();
    let result = Client::new(config)
        .map_err(AppError::from)
        .and_then(|client| fetch_all(client, &args));
    transport::global_cleanup()?;
    result
}

fn parse_args() -> AppResult<(CliArgs, ArgMatches)> {
    let matches = CliArgs::command().get_matches();
    let args = CliArgs::from_arg_matches(&matches)?;
    Ok((args, matches))
}

fn fetch_all(mut client: Client, args: &CliArgs) -> AppResult<()> {
    let mut requests = Vec::with_capacity(args.urls.len());
    for url in &args.urls {
        let request = Arc::new(build_request(url, args)?);
        for (name, value) in &args.headers {
            request.set_header(name.as_str(), value.as_str())?;
        }
        client.submit(
            &request,
            Some(Callback::detached(|request| {
                info!("{} finished: {}", request.url(), request.status());
            })),
        )?;
        requests.push(request);
    }

    while !requests.iter().all(|request| request.is_terminal()) {
        client.pump()?;
        thread::sleep(args.tick);
    }
    drop(client);

    let mut failed = 0_usize;
    for request in &requests {
        println!("{}", summary_line(request));
        if !request.is_success() {
            failed = failed.saturating_add(1);
        }
    }
    if failed > 0 {
        return Err(AppError::validation(ValidationError::RequestsFailed {
            failed,
            total: requests.len(),
        }));
    }
    Ok(())
}

fn build_request(url: &str, args: &CliArgs) -> AppResult<Request> {
    match (args.method, args.download_dir.as_ref()) {
        (FetchMethod::Get, Some(dir)) => Ok(Request::download(url, download_path(dir, url))?),
        (FetchMethod::Get, None) => Ok(Request::get(url)),
        (FetchMethod::Head, _) => Ok(Request::head(url)),
    }
}

fn download_path(dir: &Path, url: &str) -> PathBuf {
    let name = url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_owned))
        })
        .filter(|segment| !segment.is_empty())
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_owned());
    dir.join(name)
}

fn summary_line(request: &Request) -> String {
    let status = request
        .http_status()
        .map_or_else(|| "-".to_owned(), |status| status.to_string());
    let detail = match (request.failure(), request.payload()) {
        (Some(failure), _) => failure.to_string(),
        (None, Some(payload)) => payload.to_string(),
        (None, None) => String::new(),
    };
    format!(
        "{} {} {} {} {}",
        request.status(),
        status,
        request.method(),
        request.url(),
        detail
    )
    .trim_end()
    .to_owned()
}
