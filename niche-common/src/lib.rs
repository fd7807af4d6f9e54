//! # Niche Common Library
//!
//! Shared code for the niche catalog services including:
//! - Canonical perfume record and collection entry types
//! - Identity key derivation and field normalizers
//! - Configuration loading and root folder resolution
//! - SQLite persistence for catalog, collection, settings and the bulk dataset

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod normalize;
pub mod perfume;

pub use error::{Error, Result};
pub use identity::build_key;
pub use perfume::{
    AccordStrength, CollectionEntry, Concentration, DataSource, FragranceNote, Gender,
    NotePyramid, Occasion, OccasionScore, Perfume, PriceEstimate, Season, SeasonScore,
};
