use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::error::{Result, ScrapeError};

/// Inline style of the bordered info-box that wraps one variant.
pub const VARIANT_STYLE: &str = "border: solid #553019 2px; margin: 0 0 0 0; line-height:1; \
font-size: 80%; background: #3e3834; color:#C0C0C0; width: 250px; padding: 0.3em; \
text-align: left; float:none; clear:none; display:inline-table;";

const HOMEMADE_ID: &str = "Homemade";

static FALLBACK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.mw-parser-output > table:not(.navbox)").unwrap());

pub struct Segment<'a> {
    pub node: ElementRef<'a>,
    pub homemade: bool,
}

pub struct PageSegments<'a> {
    /// Empty when the page shows no class.
    pub class: String,
    pub variants: Vec<Segment<'a>>,
}

/// Split a weapon page into its variant boxes, in document order.
///
/// With a `#Homemade` marker, styled boxes before it are standard variants
/// and boxes after it are homemade. Without one, every top-level
/// non-navigation table in the content area is a standard variant.
pub fn locate_variants<'a>(url: &str, document: &'a Html) -> Result<PageSegments<'a>> {
    let elements = move || document.root_element().descendants().filter_map(ElementRef::wrap);

    let has_marker = elements().any(|e| e.value().id() == Some(HOMEMADE_ID));

    let variants: Vec<Segment<'a>> = if has_marker {
        let mut past_marker = false;
        let mut found = Vec::new();
        for element in elements() {
            if element.value().id() == Some(HOMEMADE_ID) {
                past_marker = true;
            } else if element.value().attr("style") == Some(VARIANT_STYLE) {
                found.push(Segment {
                    node: element,
                    homemade: past_marker,
                });
            }
        }
        found
    } else {
        document
            .select(&FALLBACK_SELECTOR)
            .map(|node| Segment {
                node,
                homemade: false,
            })
            .collect()
    };

    let first = variants
        .first()
        .ok_or_else(|| ScrapeError::malformed(url, "no variant boxes found"))?;
    let class = read_class(document, first.node);

    Ok(PageSegments { class, variants })
}

/// Third `td` at or after the start of `start`, in document order, unwrapped
/// from its `[...]` banner.
fn read_class(document: &Html, start: ElementRef) -> String {
    let cell = document
        .root_element()
        .descendants()
        .skip_while(|n| n.id() != (*start).id())
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "td")
        .nth(2);

    match cell {
        Some(td) => td
            .text()
            .collect::<String>()
            .trim()
            .trim_matches(|c: char| c == '[' || c == ']')
            .trim()
            .to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> Html {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap();
        Html::parse_document(&html)
    }

    #[test]
    fn homemade_marker_splits_variants() {
        let doc = fixture("homemade");
        let page = locate_variants("test://homemade", &doc).unwrap();
        let flags: Vec<bool> = page.variants.iter().map(|s| s.homemade).collect();
        assert_eq!(flags, vec![false, false, true]);
        assert_eq!(page.class, "Katana class");
    }

    #[test]
    fn fallback_uses_top_level_tables() {
        let doc = fixture("plain");
        let page = locate_variants("test://plain", &doc).unwrap();
        assert_eq!(page.variants.len(), 2);
        assert!(page.variants.iter().all(|s| !s.homemade));
        assert_eq!(page.class, "Hackers");
    }

    #[test]
    fn missing_class_is_empty() {
        let doc = fixture("no_class");
        let page = locate_variants("test://no_class", &doc).unwrap();
        assert_eq!(page.variants.len(), 1);
        assert_eq!(page.class, "");
    }

    #[test]
    fn page_without_variants_is_malformed() {
        let doc = Html::parse_document("<html><body><p>nothing here</p></body></html>");
        let err = locate_variants("test://empty", &doc).err().unwrap();
        assert!(matches!(err, ScrapeError::MalformedPage { .. }));
    }
}
