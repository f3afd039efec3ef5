//! Supplier catalog lookup
//!
//! This module contains:
//! - The part record shown to the operator
//! - The `Catalog` seam the selection arbiter issues lookups through
//! - The Mouser search client (mouser.rs)

pub mod mouser;

use futures::future::BoxFuture;
use image::RgbaImage;
use thiserror::Error;

pub use mouser::MouserCatalog;

/// One quantity break of a price list
#[derive(Clone, Debug, PartialEq)]
pub struct PriceBreak {
    pub price: f64,
    pub quantity: u32,
}

/// Catalog data for one orderable part
#[derive(Clone, Debug, PartialEq)]
pub struct PartRecord {
    pub description: String,
    pub in_stock: u32,
    pub min_qty: u32,
    pub qty_multiples: u32,
    pub manufacturer: String,
    pub manufacturer_part_number: String,
    pub supplier_part_number: String,
    pub currency: String,
    pub price_breaks: Vec<PriceBreak>,
    pub packaging_options: Vec<String>,
    pub details_url: String,
    pub image_url: String,
    pub image: Option<RgbaImage>,
}

/// Why a lookup produced no record
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Payload does not carry the '[)>' header marker")]
    MissingHeader,

    #[error("Payload has no supplier part number field")]
    MissingPartNumber,

    #[error("No catalog API key configured")]
    MissingApiKey,

    #[error("API responded with status {0}")]
    Status(reqwest::StatusCode),

    #[error("API returned error(s): {0}")]
    Api(String),

    #[error("No matching parts found")]
    NoMatch,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Looks a decoded payload up in a supplier catalog.
///
/// Lookups are idempotent and single-attempt; every failure resolves to
/// `None`. The returned future owns everything it needs so it can be spawned.
pub trait Catalog: Send + Sync {
    fn lookup(&self, payload: Vec<u8>) -> BoxFuture<'static, Option<PartRecord>>;
}
