pub mod cascade;
pub mod schema;
pub mod strategy;
pub mod text;

use scraper::Html;

use crate::record::FieldMap;
use cascade::FieldSpec;

/// Raw page → field map. Every schema field is present; misses are empty values.
pub fn process_page(html: &str, specs: &[FieldSpec]) -> FieldMap {
    let document = Html::parse_document(html);
    cascade::extract(&document, specs)
}
