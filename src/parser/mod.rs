pub mod locate;
pub mod stats;
pub mod tokens;
pub mod variant;

use scraper::Html;

use crate::error::Result;
use variant::VariantDraft;

pub struct ParsedPage {
    pub class: String,
    pub variants: Vec<VariantDraft>,
}

/// Two-step pipeline: page markup → variant boxes → variant drafts.
///
/// Synchronous: the parsed DOM is not `Send`, so it is dropped before the
/// caller awaits anything.
pub fn process_page(url: &str, html: &str) -> Result<ParsedPage> {
    let document = Html::parse_document(html);
    let segments = locate::locate_variants(url, &document)?;
    let variants = segments
        .variants
        .iter()
        .map(|segment| variant::extract_variant(url, segment))
        .collect::<Result<Vec<_>>>()?;

    Ok(ParsedPage {
        class: segments.class,
        variants,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(fixture: &str) -> ParsedPage {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", fixture)).unwrap();
        process_page(&format!("test://{}", fixture), &html).unwrap()
    }

    #[test]
    fn homemade_page_yields_three_variants() {
        let page = parse("homemade");
        assert_eq!(page.class, "Katana class");
        let flags: Vec<bool> = page.variants.iter().map(|v| v.homemade).collect();
        assert_eq!(flags, vec![false, false, true]);
        let qualities: Vec<&str> = page.variants.iter().map(|v| v.quality.as_str()).collect();
        assert_eq!(qualities, vec!["Catun No.1", "Edge Type 1", "Prototype"]);
        assert_eq!(
            page.variants[2].stats.get("blood_loss"),
            Some(&tokens::TypedValue::Percentage(-0.05))
        );
    }

    #[test]
    fn plain_page_is_all_standard() {
        let page = parse("plain");
        assert_eq!(page.variants.len(), 2);
        assert!(page.variants.iter().all(|v| !v.homemade));
        assert_eq!(page.variants[1].image_file, "Hacker_Mk2.png");
    }
}
