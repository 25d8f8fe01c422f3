use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use bili_poll::{Error, PageDump, RecommendationPoller, Result, TagKeywords};
use bilibili_api::store::{CredentialStore, DEFAULT_COOKIE_FILE, JsonFileCredentialStore};
use bilibili_api::{BiliClient, ClientConfig, Credentials};
use clap::Parser;
use mimalloc::MiMalloc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Collect recommended Bilibili videos whose tags match a keyword list.
#[derive(Debug, Parser)]
#[command(name = "bili-poll", version, about)]
struct Args {
    /// Stop once this many videos have matched
    #[arg(long, default_value_t = 10)]
    max_results: usize,

    /// Maximum number of feed pages to fetch
    #[arg(long, default_value_t = 10)]
    max_polls: u32,

    /// File that receives one "title URL" line per match
    #[arg(short, long, default_value = "results.txt")]
    output: PathBuf,

    /// Credential file written by bili-login
    #[arg(long, env = "BILI_COOKIE_FILE", default_value = DEFAULT_COOKIE_FILE)]
    cookie_file: PathBuf,

    /// Comma-separated keywords replacing the built-in list
    #[arg(short, long)]
    keywords: Option<String>,

    /// Delay between feed pages in milliseconds
    #[arg(long, default_value_t = 0)]
    interval_ms: u64,

    /// Also save every fetched feed page as JSON into this directory
    #[arg(long, value_name = "DIR")]
    dump_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    init_logging(args.verbose, args.quiet);

    let keywords = match args.keywords.as_deref() {
        Some(list) => TagKeywords::parse(list)?,
        None => TagKeywords::default(),
    };

    let store = JsonFileCredentialStore::new(&args.cookie_file);
    let credentials = store.load().await.unwrap_or_else(|| {
        warn!(
            path = %args.cookie_file.display(),
            "No saved login; the feed will not be personalised"
        );
        Credentials::new()
    });

    let client = BiliClient::new(ClientConfig::default())?;
    let mut poller = RecommendationPoller::new(Arc::new(client), credentials, keywords)
        .with_interval(Duration::from_millis(args.interval_ms));
    if let Some(dir) = &args.dump_dir {
        poller = poller.with_dump(PageDump::new(dir));
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, writing what was found so far");
            ctrl_c.cancel();
        }
    });

    info!(
        max_results = args.max_results,
        max_polls = args.max_polls,
        keywords = poller.keywords().len(),
        "Polling recommendations"
    );
    let results = poller.poll(args.max_results, args.max_polls, &cancel).await;

    write_results(&args.output, &results).await?;
    info!(
        found = results.len(),
        path = %args.output.display(),
        "Results written"
    );
    Ok(())
}

async fn write_results(path: &Path, lines: &[String]) -> Result<()> {
    let mut body = String::new();
    for line in lines {
        body.push_str(line);
        body.push('\n');
    }
    tokio::fs::write(path, body)
        .await
        .map_err(|source| Error::WriteOutput {
            path: path.to_path_buf(),
            source,
        })
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_level(verbose))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["bili-poll"]).unwrap();
        assert_eq!(args.max_results, 10);
        assert_eq!(args.max_polls, 10);
        assert_eq!(args.output, PathBuf::from("results.txt"));
        assert_eq!(args.interval_ms, 0);
        assert!(args.keywords.is_none());
        assert!(args.dump_dir.is_none());
    }

    #[test]
    fn test_dump_dir_flag() {
        let args = Args::try_parse_from(["bili-poll", "--dump-dir", "api_responses"]).unwrap();
        assert_eq!(args.dump_dir, Some(PathBuf::from("api_responses")));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Args::try_parse_from(["bili-poll", "-v", "-q"]).is_err());
    }

    #[tokio::test]
    async fn test_write_results_one_line_each() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("results.txt");
        let lines = vec![
            "one https://www.bilibili.com/video/BV1".to_string(),
            "two https://www.bilibili.com/video/BV2".to_string(),
        ];

        write_results(&path, &lines).await.unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "one https://www.bilibili.com/video/BV1\ntwo https://www.bilibili.com/video/BV2\n"
        );
    }
}
