//! Sample tariff catalog: two chapters, a handful of full codes

use hts_common::catalog::{enrich, CandidateIndex, CatalogRow, ChapterDescriptions};

pub const HORSE_MALE: &str = "0101.21.00.10";
pub const HORSE_SLAUGHTER: &str = "0101.29.00.10";
pub const SCREW_STAINLESS: &str = "7318.12.00.00";
pub const SCREW_SELF_TAPPING: &str = "7318.14.10.20";
pub const BOLT: &str = "7318.15.20.65";

pub fn sample_rows() -> Vec<CatalogRow> {
    vec![
        CatalogRow::new("0101", "Live horses, asses, mules and hinnies:", 0, ""),
        CatalogRow::new("", "Horses:", 1, ""),
        CatalogRow::new("0101.21.00", "Purebred breeding animals", 2, "Free"),
        CatalogRow::new(HORSE_MALE, "Males", 3, ""),
        CatalogRow::new("0101.29.00", "Other", 2, "Free"),
        CatalogRow::new(HORSE_SLAUGHTER, "Imported for immediate slaughter", 3, ""),
        CatalogRow::new("7318", "Screws, bolts, nuts and similar articles, of iron or steel:", 0, ""),
        CatalogRow::new("", "Threaded articles:", 1, ""),
        CatalogRow::new("7318.12.00", "Other wood screws", 2, ""),
        CatalogRow::new(SCREW_STAINLESS, "Of stainless steel", 3, "6.2%"),
        CatalogRow::new("7318.14.10", "Self-tapping screws", 2, "6.2%"),
        CatalogRow::new(SCREW_SELF_TAPPING, "Having shanks less than 6 mm in diameter", 3, ""),
        CatalogRow::new("7318.15.20", "Bolts and bolts and their nuts", 2, "Free"),
        CatalogRow::new(BOLT, "Other", 3, ""),
        CatalogRow::new("9801.00.10.00", "Products of the United States returned", 0, "Free"),
    ]
}

pub fn sample_index() -> CandidateIndex {
    let indexes = enrich(sample_rows(), &["98".to_string(), "99".to_string()])
        .expect("sample catalog is well formed");
    let chapters = ChapterDescriptions::new([
        ("01".to_string(), "Live animals".to_string()),
        ("73".to_string(), "Articles of iron or steel".to_string()),
    ]);
    CandidateIndex::new(indexes, chapters)
}
