//! Flavor profile classification.
//!
//! Counts keyword hits over a product's descriptive text and buckets the
//! result into six fixed categories. Keyword lists are bilingual
//! (English + Slovak) because the tracked shops publish tasting notes in
//! both languages.

use crate::models::Product;

pub struct FlavorCategory {
    pub key: &'static str,
    pub label: &'static str,
    keywords: &'static [&'static str],
}

pub const FLAVOR_CATEGORIES: [FlavorCategory; 6] = [
    FlavorCategory {
        key: "chocolate",
        label: "Chocolate / Dark",
        keywords: &[
            "chocolate", "cocoa", "cacao", "dark", "bitter", "caramel", "čokolád", "kakao",
            "kakaov", "karamel", "horká", "horkast", "tmav", "molasses", "brown sugar", "toffee",
            "fudge", "brownie",
        ],
    },
    FlavorCategory {
        key: "fruity",
        label: "Fruity",
        keywords: &[
            "fruity", "fruit", "berry", "citrus", "tropical", "peach", "apple", "cherry", "plum",
            "grape", "mango", "pineapple", "lemon", "orange", "lime", "grapefruit", "ovocn",
            "bobuľ", "brusn", "čern", "malín", "jahod", "slivk", "broskyn", "hrozn", "ananás",
            "citrón", "pomaranč", "fig", "red fruit", "stone fruit", "dried fruit",
        ],
    },
    FlavorCategory {
        key: "floral",
        label: "Floral",
        keywords: &[
            "floral", "flower", "jasmine", "rose", "lavender", "hibiscus", "florál", "kvetin",
            "jazmín", "ruža", "levanduľ",
        ],
    },
    FlavorCategory {
        key: "nutty",
        label: "Nutty",
        keywords: &[
            "nutty", "nut", "almond", "hazelnut", "walnut", "peanut", "pistachio", "orech",
            "mandľ", "lieskový", "vlašský", "marcipán", "marzipan",
        ],
    },
    FlavorCategory {
        key: "sweet",
        label: "Sweet / Honey",
        keywords: &[
            "sweet", "honey", "sugar", "cane", "syrup", "vanilla", "cream", "sladk", "med",
            "cukor", "vanilk", "krém", "lahodn", "jemn",
        ],
    },
    FlavorCategory {
        key: "spicy",
        label: "Spicy / Herbal",
        keywords: &[
            "spicy", "spice", "cinnamon", "pepper", "clove", "cardamom", "ginger", "korenist",
            "škorica", "pepř", "klinček", "zázvor", "bylink",
        ],
    },
];

/// Categories with at least one keyword hit, sorted by hit count descending.
/// Ties keep category definition order (the sort is stable).
pub fn classify(product: &Product) -> Vec<&'static str> {
    classify_text(&search_text(product))
}

pub fn classify_text(text: &str) -> Vec<&'static str> {
    let text = text.to_lowercase();

    let mut hits: Vec<(&'static str, usize)> = FLAVOR_CATEGORIES
        .iter()
        .filter_map(|category| {
            let count = category
                .keywords
                .iter()
                .filter(|kw| text.contains(&kw.to_lowercase()))
                .count();
            (count > 0).then_some((category.key, count))
        })
        .collect();

    hits.sort_by(|a, b| b.1.cmp(&a.1));
    hits.into_iter().map(|(key, _)| key).collect()
}

pub fn flavor_label(key: &str) -> &str {
    FLAVOR_CATEGORIES
        .iter()
        .find(|c| c.key == key)
        .map(|c| c.label)
        .unwrap_or(key)
}

/// True when the product matches the given flavor category (or no filter
/// was given).
pub fn matches_flavor(product: &Product, filter: Option<&str>) -> bool {
    match filter {
        None => true,
        Some(f) => classify(product).contains(&f),
    }
}

fn search_text(product: &Product) -> String {
    [
        Some(product.name.as_str()),
        product.tasting_notes.as_deref(),
        product.description.as_deref(),
        product.roast_level.as_deref(),
        product.variety.as_deref(),
        product.process.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ")
}
