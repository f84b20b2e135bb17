use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use corners_finder::config::{query_from_env, Config};
use corners_finder::error::Result;
use corners_finder::pipeline::{run, RunOptions};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    // stdout carries the JSON result; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run_once(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run_once(cfg: Config) -> Result<()> {
    let (query, min_corner_lines) = query_from_env()?;
    info!(
        "Looking up corner markets for {query} (strategy={}, concurrency={}, min_lines={min_corner_lines})",
        cfg.odds_strategy,
        cfg.effective_concurrency(),
    );

    let opts = RunOptions {
        min_corner_lines,
        ..Default::default()
    };
    let (rows, _) = run(&cfg, query, &opts).await?;

    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
