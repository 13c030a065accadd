use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::error::{Result, ScrapeError};
use crate::http::{self, Fetch};
use crate::images::ImageStore;
use crate::model::{weapon_name_from_url, Aggregate, RawVariantRecord};
use crate::parser;

/// Outcome of one page, sent from its worker to the collector.
struct PageResult {
    url: String,
    records: Result<Vec<RawVariantRecord>>,
    elapsed_ms: u64,
}

/// Everything the workers produced, once all of them are done.
pub struct Batch {
    pub aggregate: Aggregate,
    /// Sorted by URL.
    pub failures: Vec<(String, ScrapeError)>,
    pub total: usize,
}

/// Scrape every page concurrently and collect the records.
///
/// At most `concurrency` pages are in flight. A failing page is recorded and
/// skipped; it never cancels its siblings.
pub async fn scrape_pages<F>(
    fetcher: Arc<F>,
    images: Arc<ImageStore>,
    urls: Vec<String>,
    concurrency: usize,
    show_progress: bool,
) -> Batch
where
    F: Fetch + 'static,
{
    let total = urls.len();
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let pb = progress_bar(total, show_progress);

    // Channel: workers send results, this task aggregates them
    let (tx, mut rx) = tokio::sync::mpsc::channel::<PageResult>(concurrency * 2);

    for url in urls {
        let fetcher = Arc::clone(&fetcher);
        let images = Arc::clone(&images);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return;
            };
            let start = Instant::now();
            let records = scrape_page(fetcher.as_ref(), &images, &url).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            let _ = tx.send(PageResult { url, records, elapsed_ms }).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut aggregate = Aggregate::default();
    let mut failures = Vec::new();
    while let Some(result) = rx.recv().await {
        let name = weapon_name_from_url(&result.url);
        match result.records {
            Ok(records) => {
                info!(weapon = %name, variants = records.len(), ms = result.elapsed_ms, "page done");
                aggregate.insert(name, records);
            }
            Err(e) => {
                warn!(url = %result.url, error = %e, "page failed, skipped");
                failures.push((result.url, e));
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    failures.sort_by(|a, b| a.0.cmp(&b.0));
    info!(
        "Scraped {} pages ({} ok, {} errors)",
        total,
        aggregate.weapon_count(),
        failures.len()
    );

    Batch { aggregate, failures, total }
}

/// Fetch one weapon page, extract its variants, then fetch their images.
async fn scrape_page<F: Fetch>(fetcher: &F, images: &ImageStore, url: &str) -> Result<Vec<RawVariantRecord>> {
    info!("Name: {}", weapon_name_from_url(url));
    let html = http::get_text(fetcher, url).await?;
    let page = parser::process_page(url, &html)?;

    let mut records = Vec::with_capacity(page.variants.len());
    for draft in page.variants {
        let outcome = images.acquire(fetcher, &draft.image_file, &draft.image_url).await;
        records.push(RawVariantRecord::from_draft(draft, &page.class, &outcome));
    }
    Ok(records)
}

fn progress_bar(total: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::fake::FakeFetch;
    use crate::images::ImageOutcome;

    const KATANA: &str = "https://wiki.test/wiki/Katana";
    const HACKER: &str = "https://wiki.test/wiki/Hacker";
    const MISSING: &str = "https://wiki.test/wiki/Paladin%27s_Cross";
    const CATUN_IMG: &str =
        "https://static.wikia.nocookie.net/kenshi/images/1/1a/Katana_Catun.png/revision/latest?cb=20190101";

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    #[tokio::test]
    async fn pages_are_aggregated_and_failures_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let fetch = FakeFetch::default()
            .with(KATANA, 200, fixture("homemade"))
            .with(HACKER, 200, fixture("plain"))
            .with(CATUN_IMG, 200, "png");
        let images = Arc::new(ImageStore::new(tmp.path().join("images")));
        let urls = vec![KATANA.to_string(), MISSING.to_string(), HACKER.to_string()];

        let batch = scrape_pages(Arc::new(fetch), Arc::clone(&images), urls, 2, false).await;

        assert_eq!(batch.total, 3);
        assert_eq!(batch.aggregate.weapon_count(), 2);
        assert_eq!(batch.aggregate.variant_count(), 5);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].0, MISSING);
        assert!(matches!(batch.failures[0].1, ScrapeError::Fetch { .. }));

        let names: Vec<&str> = batch.aggregate.weapons().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Hacker", "Katana"]);
    }

    #[tokio::test]
    async fn records_carry_class_flag_and_image() {
        let tmp = tempfile::tempdir().unwrap();
        let fetch = FakeFetch::default()
            .with(KATANA, 200, fixture("homemade"))
            .with(CATUN_IMG, 200, "png");
        let images = ImageStore::new(tmp.path().join("images"));

        let records = scrape_page(&fetch, &images, KATANA).await.unwrap();

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.class == "Katana class"));
        assert_eq!(
            records.iter().map(|r| r.homemade).collect::<Vec<_>>(),
            vec![false, false, true]
        );
        let catun = tmp.path().join("images").join("Katana_Catun.png");
        assert_eq!(records[0].local_image.as_deref(), Some(catun.to_str().unwrap()));
        assert_eq!(records[1].local_image, None);

        // Second pass finds the image on disk and does not fetch it again.
        let again = images.acquire(&fetch, "Katana_Catun.png", CATUN_IMG).await;
        assert_eq!(again, ImageOutcome::AlreadyPresent(catun));
    }
}
