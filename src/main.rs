mod db;
mod error;
mod http;
mod images;
mod logging;
mod model;
mod parser;
mod pipeline;
mod settings;
mod sitemap;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, info, trace, warn};

use crate::error::ScrapeError;
use crate::http::HttpClient;
use crate::images::ImageStore;
use crate::logging::DebugLevel;
use crate::settings::Settings;

#[derive(Parser)]
#[command(
    name = "kenshi_scraper",
    version,
    about = "Scrape Kenshi wiki weapon stats into a SQLite database"
)]
struct Cli {
    /// Console logging: off, on, or verbose (raw markup dumps)
    #[arg(
        short,
        long,
        value_enum,
        num_args = 0..=1,
        default_value = "off",
        default_missing_value = "on"
    )]
    debug: DebugLevel,

    /// Reserved; accepted and ignored
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            let code = e.downcast_ref::<ScrapeError>().map_or(2, ScrapeError::exit_code);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let t0 = Instant::now();
    let settings = Settings::load()?;
    logging::install(logging::build(cli.debug, &settings.log_dir)?)?;
    debug!(?settings, "settings loaded");
    if let Some(output) = &cli.output {
        debug!(path = %output.display(), "output path given; reserved, not used");
    }

    // Phase 1: discover weapon pages
    let client = Arc::new(HttpClient::new(&settings.user_agent)?);
    let urls = sitemap::fetch_weapon_urls(client.as_ref(), &settings.base_url).await?;
    if urls.is_empty() {
        return Err(ScrapeError::malformed(&settings.base_url, "weapon index lists no weapons").into());
    }

    // Phase 2: scrape pages and images
    let t_scrape = Instant::now();
    let images = Arc::new(ImageStore::new(&settings.images_dir));
    info!(dir = %images.dir().display(), "image directory");
    println!("Scraping {} weapon pages...", urls.len());
    let batch = pipeline::scrape_pages(
        client,
        images,
        urls,
        settings.concurrency(),
        cli.debug == DebugLevel::Off,
    )
    .await;
    println!(
        "Scraped {} pages ({} ok, {} errors) in {:.1}s",
        batch.total,
        batch.aggregate.weapon_count(),
        batch.failures.len(),
        t_scrape.elapsed().as_secs_f64()
    );
    for (url, e) in &batch.failures {
        println!("  skipped {}: {}", url, e);
    }
    if batch.aggregate.weapon_count() == 0 {
        return Err(ScrapeError::fetch(&settings.base_url, "every weapon page failed").into());
    }

    let mut aggregate = batch.aggregate;
    aggregate.apply_class_overrides();
    if cli.debug == DebugLevel::Verbose {
        match serde_json::to_string_pretty(&aggregate) {
            Ok(json) => trace!("aggregate:\n{}", json),
            Err(e) => warn!(error = %e, "could not serialize aggregate"),
        }
    }

    // Phase 3: reset and reload the store
    let conn = db::connect(&settings.db_path)
        .with_context(|| format!("Failed to open {}", settings.db_path.display()))?;
    db::ensure_schema(&conn)?;
    let stats = db::reload(&conn, &aggregate)?;
    println!(
        "Saved {} weapons, {} classes, {} qualities, {} images, {} variants.",
        stats.names, stats.classes, stats.qualities, stats.images, stats.weapons
    );

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_forms() {
        let cli = Cli::try_parse_from(["kenshi_scraper"]).unwrap();
        assert_eq!(cli.debug, DebugLevel::Off);
        assert!(cli.output.is_none());

        let cli = Cli::try_parse_from(["kenshi_scraper", "-d"]).unwrap();
        assert_eq!(cli.debug, DebugLevel::On);

        let cli = Cli::try_parse_from(["kenshi_scraper", "--debug", "verbose", "out.db"]).unwrap();
        assert_eq!(cli.debug, DebugLevel::Verbose);
        assert_eq!(cli.output, Some(PathBuf::from("out.db")));

        let cli = Cli::try_parse_from(["kenshi_scraper", "-d", "false"]).unwrap();
        assert_eq!(cli.debug, DebugLevel::Off);

        assert!(Cli::try_parse_from(["kenshi_scraper", "-d", "loud"]).is_err());
    }

    #[test]
    fn durations() {
        use std::time::Duration;
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }
}
