use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{info, warn};

use crate::images::ImageOutcome;
use crate::parser::tokens::TypedValue;
use crate::parser::variant::VariantDraft;

/// Page with no class on the wiki, and the class it is patched with.
pub const CLASS_OVERRIDES: &[(&str, &str)] = &[("Holed_Sabre", "Sabre class")];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawVariantRecord {
    pub image_url: String,
    /// `None` when the image could not be fetched.
    pub local_image: Option<String>,
    pub quality: String,
    /// Empty when the page has no class.
    pub class: String,
    pub homemade: bool,
    pub stats: BTreeMap<String, TypedValue>,
}

impl RawVariantRecord {
    pub fn from_draft(draft: VariantDraft, class: &str, image: &ImageOutcome) -> Self {
        RawVariantRecord {
            image_url: draft.image_url,
            local_image: image.path().map(|p| p.to_string_lossy().into_owned()),
            quality: draft.quality,
            class: class.to_string(),
            homemade: draft.homemade,
            stats: draft.stats,
        }
    }
}

/// `https://kenshi.fandom.com/wiki/Paladin%27s_Cross` -> `Paladin's_Cross`
pub fn weapon_name_from_url(url: &str) -> String {
    let last = url.trim_end_matches('/').rsplit('/').next().unwrap_or(url);
    urlencoding::decode(last)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| last.to_string())
}

/// Every record of a run, keyed by weapon name.
///
/// Sorted by name, variants in page order, so load order does not depend on
/// which page finished first.
#[derive(Debug, Default, Serialize)]
pub struct Aggregate {
    weapons: BTreeMap<String, Vec<RawVariantRecord>>,
}

pub struct LookupSets<'a> {
    pub names: BTreeSet<&'a str>,
    pub classes: BTreeSet<&'a str>,
    pub qualities: BTreeSet<&'a str>,
    pub images: BTreeSet<&'a str>,
}

impl Aggregate {
    pub fn insert(&mut self, name: String, records: Vec<RawVariantRecord>) {
        self.weapons.insert(name, records);
    }

    pub fn weapons(&self) -> impl Iterator<Item = (&str, &[RawVariantRecord])> {
        self.weapons.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    pub fn weapon_count(&self) -> usize {
        self.weapons.len()
    }

    pub fn variant_count(&self) -> usize {
        self.weapons.values().map(Vec::len).sum()
    }

    /// Patch the classes the wiki does not show. Anything still empty is
    /// left unknown.
    pub fn apply_class_overrides(&mut self) {
        for (name, class) in CLASS_OVERRIDES {
            if let Some(records) = self.weapons.get_mut(*name) {
                info!(weapon = name, class, "applying class override");
                for record in records.iter_mut() {
                    record.class = class.to_string();
                }
            }
        }
        for (name, records) in &self.weapons {
            if records.iter().any(|r| r.class.is_empty()) {
                warn!(weapon = %name, "weapon has no class");
            }
        }
    }

    pub fn lookup_sets(&self) -> LookupSets<'_> {
        let variants = || self.weapons.values().flatten();
        LookupSets {
            names: self.weapons.keys().map(String::as_str).collect(),
            classes: variants()
                .map(|r| r.class.as_str())
                .filter(|c| !c.is_empty())
                .collect(),
            qualities: variants().map(|r| r.quality.as_str()).collect(),
            images: variants().filter_map(|r| r.local_image.as_deref()).collect(),
        }
    }
}
