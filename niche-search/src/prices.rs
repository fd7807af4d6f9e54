//! Brand price estimates (Uruguayan pesos)
//!
//! A small static table of retail ranges per brand. Lookups return the range
//! midpoint tagged as an estimate.

use niche_common::perfume::PriceConfidence;
use niche_common::PriceEstimate;

struct BrandPrice {
    brand: &'static str,
    min_uyu: u32,
    max_uyu: u32,
    source: &'static str,
}

const PRICES_UPDATED: &str = "2026-02-01";

const BRAND_PRICES: &[BrandPrice] = &[
    // Niche
    BrandPrice { brand: "Creed", min_uyu: 18000, max_uyu: 28000, source: "Duty Free Montevideo" },
    BrandPrice { brand: "Tom Ford", min_uyu: 12000, max_uyu: 22000, source: "Duty Free / Tienda Inglesa" },
    BrandPrice { brand: "Xerjoff", min_uyu: 15000, max_uyu: 25000, source: "Import estimate" },
    BrandPrice { brand: "Maison Francis Kurkdjian", min_uyu: 16000, max_uyu: 26000, source: "Import estimate" },
    BrandPrice { brand: "MFK", min_uyu: 16000, max_uyu: 26000, source: "Import estimate" },
    // Designer
    BrandPrice { brand: "Dior", min_uyu: 6500, max_uyu: 12000, source: "Duty Free / Ta-Ta" },
    BrandPrice { brand: "Chanel", min_uyu: 7000, max_uyu: 13000, source: "Duty Free / Tienda Inglesa" },
    BrandPrice { brand: "YSL", min_uyu: 5500, max_uyu: 10000, source: "Duty Free / Ta-Ta" },
    BrandPrice { brand: "Prada", min_uyu: 6000, max_uyu: 11000, source: "Duty Free / Tienda Inglesa" },
    BrandPrice { brand: "Versace", min_uyu: 4000, max_uyu: 7500, source: "Ta-Ta / Geant" },
    BrandPrice { brand: "Jean Paul Gaultier", min_uyu: 5000, max_uyu: 9000, source: "Duty Free / Ta-Ta" },
    BrandPrice { brand: "Dolce & Gabbana", min_uyu: 4500, max_uyu: 8500, source: "Ta-Ta / Duty Free" },
    // Middle Eastern
    BrandPrice { brand: "Lattafa", min_uyu: 1800, max_uyu: 3500, source: "MercadoLibre UY / Importers" },
    BrandPrice { brand: "Maison Alhambra", min_uyu: 1500, max_uyu: 3000, source: "MercadoLibre UY / Importers" },
    BrandPrice { brand: "Fragrance World", min_uyu: 1500, max_uyu: 3000, source: "MercadoLibre UY / Importers" },
    BrandPrice { brand: "Armaf", min_uyu: 2000, max_uyu: 4000, source: "MercadoLibre UY / Importers" },
    BrandPrice { brand: "Rasasi", min_uyu: 2000, max_uyu: 4500, source: "MercadoLibre UY / Importers" },
    BrandPrice { brand: "Rayhaan", min_uyu: 1500, max_uyu: 3000, source: "MercadoLibre UY / Importers" },
    BrandPrice { brand: "Bharara", min_uyu: 3000, max_uyu: 6000, source: "MercadoLibre UY / Importers" },
    // Latin American / Spanish
    BrandPrice { brand: "Zara", min_uyu: 1500, max_uyu: 3000, source: "Zara Uruguay" },
    BrandPrice { brand: "Natura", min_uyu: 1200, max_uyu: 2800, source: "Natura Uruguay" },
    BrandPrice { brand: "Halloween", min_uyu: 1800, max_uyu: 3500, source: "Ta-Ta / Pharmacies" },
    BrandPrice { brand: "Antonio Banderas", min_uyu: 1200, max_uyu: 2500, source: "Ta-Ta / Pharmacies" },
    BrandPrice { brand: "Adolfo Dominguez", min_uyu: 2500, max_uyu: 5000, source: "Tienda Inglesa / Duty Free" },
    BrandPrice { brand: "Jo Milano", min_uyu: 3000, max_uyu: 5500, source: "MercadoLibre UY / Importers" },
];

fn find(brand: &str) -> Option<&'static BrandPrice> {
    let brand = brand.trim();
    BRAND_PRICES.iter().find(|p| p.brand.eq_ignore_ascii_case(brand))
}

/// Estimated price for a brand, if the brand is in the table
pub fn lookup_price(brand: &str) -> Option<PriceEstimate> {
    find(brand).map(|entry| PriceEstimate {
        amount_uyu: (entry.min_uyu + entry.max_uyu + 1) / 2,
        source: entry.source.to_string(),
        last_updated: PRICES_UPDATED.to_string(),
        confidence: PriceConfidence::Estimate,
    })
}

/// Known (min, max) range for a brand
pub fn price_range(brand: &str) -> Option<(u32, u32)> {
    find(brand).map(|entry| (entry.min_uyu, entry.max_uyu))
}
