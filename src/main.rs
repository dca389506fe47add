//! Crawlview - Headless Page Loader
//!
//! Performs a single task and prints its result as JSON.

use std::cell::RefCell;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Duration;

use clap::Parser;
use crawlview::{Browser, BrowserConfig, BrowserError, NAME, Result, TaskResult, VERSION, form_body};
use log::{LevelFilter, info};

#[derive(Parser)]
#[command(name = "crawlview")]
#[command(about = "Load one page headlessly and print the rendered result as JSON")]
#[command(version)]
struct Cli {
    /// HTTP method: HEAD, GET, PUT, POST or DELETE
    method: String,

    /// Page to load
    url: String,

    /// Request header as `Name:Value`, may be repeated
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Form field as `key=value`, urlencoded into the request body
    #[arg(short, long = "data", value_parser = parse_field)]
    data: Vec<(String, String)>,

    /// Task deadline in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Re-issues of a transiently failing request
    #[arg(long)]
    max_retries: Option<u32>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Load images automatically
    #[arg(long)]
    images: bool,

    /// Execute page scripts
    #[arg(long)]
    javascript: bool,

    /// Enable debug logging, including request and reply dumps
    #[arg(short, long)]
    verbose: bool,
}

fn parse_header(raw: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected Name:Value, got '{}'", raw))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

fn parse_field(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    Ok((key.to_string(), value.to_string()))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbose {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.init();

    match run(cli) {
        Ok(result) => {
            let successful = result.successful;
            match serde_json::to_string_pretty(&result) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Failed to encode result: {}", e);
                    return ExitCode::FAILURE;
                }
            }
            if successful {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("{}: {}", NAME, e);
            ExitCode::from(2)
        }
    }
}

fn load_config(cli: &Cli) -> Result<BrowserConfig> {
    let mut config = match &cli.config {
        Some(path) => BrowserConfig::from_json_file(path)?,
        None => BrowserConfig::default(),
    };
    if let Some(secs) = cli.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    if let Some(retries) = cli.max_retries {
        config = config.with_max_request_retries(retries);
    }
    config.engine.images |= cli.images;
    config.engine.javascript |= cli.javascript;
    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> Result<TaskResult> {
    let config = load_config(&cli)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        info!("{} v{}", NAME, VERSION);

        let slot: Rc<RefCell<Option<TaskResult>>> = Rc::new(RefCell::new(None));
        let sink = slot.clone();
        let mut browser = Browser::with_http(config, move |result, handle| {
            *sink.borrow_mut() = Some(result);
            handle.shutdown(|| info!("Browser shut down."));
        })?;

        let body = (!cli.data.is_empty()).then(|| form_body(cli.data.iter().cloned()));
        browser.perform(&cli.method, &cli.url, cli.headers.iter().cloned(), body)?;
        browser.run().await;

        let result = slot.borrow_mut().take();
        result.ok_or(BrowserError::ShutDown)
    })
}
