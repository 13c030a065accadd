use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::info;

use crate::error::Result;
use crate::http::{self, Fetch};

const WEAPONS_PATH: &str = "/wiki/Weapons";

/// Trailing links of the weapon list that are not weapons.
const NON_WEAPON_TAIL: usize = 14;

static WEAPON_LINKS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "table.navbox:nth-of-type(3) > tbody > tr > td > table > tbody > tr > td.navbox-list > div > a",
    )
    .unwrap()
});

static HEAVY_WEAPON_LINKS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "table.navbox:nth-of-type(3) > tbody > tr > td > table > tbody > tr > td.navbox-list \
         > table > tbody > tr > td > div > a",
    )
    .unwrap()
});

/// Fetch the wiki's weapon index and return every weapon page URL.
pub async fn fetch_weapon_urls<F: Fetch>(fetcher: &F, base_url: &str) -> Result<Vec<String>> {
    let index_url = format!("{}{}", base_url.trim_end_matches('/'), WEAPONS_PATH);
    info!("Fetching weapon index: {}", index_url);
    let html = http::get_text(fetcher, &index_url).await?;

    let urls = parse_weapon_index(base_url, &html);
    info!("Weapon pages found: {}", urls.len());
    Ok(urls)
}

/// Pull weapon links out of the index navbox, in page order, without duplicates.
pub fn parse_weapon_index(base_url: &str, html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let base = base_url.trim_end_matches('/');

    let standard: Vec<_> = document.select(&WEAPON_LINKS).collect();
    let keep = standard.len().saturating_sub(NON_WEAPON_TAIL);
    let heavy = document.select(&HEAVY_WEAPON_LINKS);

    let mut seen = HashSet::new();
    standard
        .into_iter()
        .take(keep)
        .chain(heavy)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| {
            if href.starts_with("http") {
                href.to_string()
            } else {
                format!("{}{}", base, href)
            }
        })
        .filter(|url| seen.insert(url.clone()))
        .collect()
}
