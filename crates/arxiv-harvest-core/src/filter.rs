//! Range and category filtering for parsed documents.
//!
//! The OAI `from`/`until` parameters select on last-modification datestamps,
//! so a page can contain papers created outside the requested window. This
//! module narrows a page to papers whose `created` date lies in the window,
//! optionally restricted to category prefixes such as `cs.`.

use crate::models::{HarvestWindow, NormalizedDocument};

/// Keep documents created inside `window` that match `category_prefixes`.
///
/// An empty prefix list disables the category filter. Order is preserved.
pub fn filter_documents(
    docs: Vec<NormalizedDocument>,
    window: &HarvestWindow,
    category_prefixes: &[String],
) -> Vec<NormalizedDocument> {
    docs.into_iter()
        .filter(|d| window.contains(&d.created))
        .filter(|d| matches_categories(d, category_prefixes))
        .collect()
}

/// True when any category starts with any prefix (case-sensitive), or when
/// no prefixes are given.
pub fn matches_categories(doc: &NormalizedDocument, prefixes: &[String]) -> bool {
    prefixes.is_empty()
        || doc
            .categories
            .iter()
            .any(|c| prefixes.iter().any(|p| c.starts_with(p.as_str())))
}
