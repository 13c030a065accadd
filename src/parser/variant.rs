use std::collections::BTreeMap;
use std::sync::LazyLock;

use scraper::{ElementRef, Selector};
use tracing::{debug, trace};

use super::locate::Segment;
use super::stats::StatLines;
use super::tokens::TypedValue;
use crate::error::{Result, ScrapeError};

static IMAGE_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a.image").unwrap());
static SPAN: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

/// Image, name and class banner rows.
const HEADER_ROWS: usize = 3;

/// Everything a variant box yields before its image is fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantDraft {
    pub image_url: String,
    pub image_file: String,
    pub quality: String,
    pub homemade: bool,
    pub stats: BTreeMap<String, TypedValue>,
}

pub fn extract_variant(url: &str, segment: &Segment) -> Result<VariantDraft> {
    let node = segment.node;
    trace!(html = %node.html(), "variant markup");

    let image_url = node
        .select(&IMAGE_LINK)
        .next()
        .and_then(|a| a.value().attr("href"))
        .ok_or_else(|| ScrapeError::malformed(url, "variant has no image link"))?
        .to_string();
    let image_file = image_file_name(&image_url)
        .ok_or_else(|| ScrapeError::malformed(url, format!("unexpected image path {image_url}")))?;

    let quality = node
        .select(&SPAN)
        .next()
        .map(|span| quality_label(&span.text().collect::<String>()))
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ScrapeError::malformed(url, "variant has no quality label"))?;

    let rows = node.select(&ROW).skip(HEADER_ROWS).map(cell_texts);
    let stats: BTreeMap<String, TypedValue> = StatLines::new(rows).collect();

    debug!(%quality, image = %image_file, stats = stats.len(), homemade = segment.homemade, "variant");

    Ok(VariantDraft {
        image_url,
        image_file,
        quality,
        homemade: segment.homemade,
        stats,
    })
}

fn cell_texts(row: ElementRef) -> Vec<String> {
    row.select(&CELL).map(|td| td.text().collect()).collect()
}

/// `.../images/a/ab/Katana.png/revision/latest?cb=1` -> `Katana.png`
pub fn image_file_name(href: &str) -> Option<String> {
    let segments: Vec<&str> = href.split('/').collect();
    let name = segments.len().checked_sub(3).map(|i| segments[i])?;
    (!name.is_empty()).then(|| name.to_string())
}

/// `[#Mk III]` -> `Mk III`
pub fn quality_label(text: &str) -> String {
    let after_hash = text.split_once('#').map_or(text, |(_, rest)| rest);
    after_hash
        .trim_matches(|c: char| c == '#' || c == '[' || c == ']' || c.is_whitespace())
        .to_string()
}
