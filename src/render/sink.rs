//! Where composited frames and part data end up

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbaImage;

use crate::catalog::PartRecord;
use crate::session::{ArbiterState, SelectionArbiter};

/// Text fields shown next to the preview
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayFields {
    pub mode: String,
    pub status: String,
    pub payload: String,
    pub description: String,
    pub manufacturer: String,
    pub manufacturer_part_number: String,
    pub supplier_part_number: String,
    pub in_stock: String,
    pub min_qty: String,
    pub multiples: String,
    /// One line per price break, e.g. `10+ 0.301 EUR`
    pub prices: Vec<String>,
    pub packaging: String,
    pub details_url: String,
    /// None shows the photo placeholder
    pub photo: Option<RgbaImage>,
}

impl DisplayFields {
    /// Current field values; everything part related is blank without a record
    pub fn from_session(arbiter: &SelectionArbiter) -> Self {
        let status = match arbiter.state() {
            ArbiterState::Idle => "Waiting for a code",
            ArbiterState::AwaitingLookup => "Looking up...",
            ArbiterState::Displaying if arbiter.record().is_some() => "Found",
            ArbiterState::Displaying => "No data",
            ArbiterState::Terminated => "Stopped",
        };
        let mut fields = Self {
            mode: arbiter.mode().label().to_string(),
            status: status.to_string(),
            payload: arbiter
                .displayed()
                .map(|code| code.payload_text().escape_debug().to_string())
                .unwrap_or_default(),
            ..Default::default()
        };
        if let Some(record) = arbiter.record() {
            fields.fill(record);
        }
        fields
    }

    fn fill(&mut self, record: &PartRecord) {
        self.description = record.description.clone();
        self.manufacturer = record.manufacturer.clone();
        self.manufacturer_part_number = record.manufacturer_part_number.clone();
        self.supplier_part_number = record.supplier_part_number.clone();
        self.in_stock = record.in_stock.to_string();
        self.min_qty = record.min_qty.to_string();
        self.multiples = record.qty_multiples.to_string();
        self.prices = record
            .price_breaks
            .iter()
            .map(|brk| format!("{}+ {} {}", brk.quantity, brk.price, record.currency))
            .collect();
        self.packaging = record.packaging_options.join(", ");
        self.details_url = record.details_url.clone();
        self.photo = record.image.clone();
    }
}

impl fmt::Display for DisplayFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}] {}", self.mode, self.status)?;
        if !self.payload.is_empty() {
            writeln!(f, "  code: {}", self.payload)?;
        }
        if self.supplier_part_number.is_empty() {
            return Ok(());
        }
        writeln!(f, "  {} ({})", self.description, self.supplier_part_number)?;
        writeln!(
            f,
            "  {} {}",
            self.manufacturer, self.manufacturer_part_number
        )?;
        writeln!(
            f,
            "  stock {}, min {}, multiples of {}",
            self.in_stock, self.min_qty, self.multiples
        )?;
        for price in &self.prices {
            writeln!(f, "  {}", price)?;
        }
        if !self.packaging.is_empty() {
            writeln!(f, "  packaging: {}", self.packaging)?;
        }
        write!(f, "  {}", self.details_url)
    }
}

/// Receives the latest preview and field values
pub trait RenderSink {
    fn present(&mut self, frame: &RgbaImage, fields: &DisplayFields) -> Result<()>;
}

/// Writes the preview and photo as PNG files and logs field changes
pub struct HeadlessSink {
    preview_path: PathBuf,
    photo_path: PathBuf,
    last_fields: Option<DisplayFields>,
}

impl HeadlessSink {
    pub fn new(preview_path: impl Into<PathBuf>) -> Self {
        let preview_path = preview_path.into();
        let photo_path = preview_path.with_extension("photo.png");
        Self {
            preview_path,
            photo_path,
            last_fields: None,
        }
    }

    #[cfg(test)]
    pub fn preview_path(&self) -> &Path {
        &self.preview_path
    }

    #[cfg(test)]
    pub fn photo_path(&self) -> &Path {
        &self.photo_path
    }
}

/// Write through a temporary file so readers never see a partial PNG
fn write_png_atomic(img: &RgbaImage, path: &Path) -> Result<()> {
    let tmp = path.with_extension("tmp.png");
    img.save_with_format(&tmp, image::ImageFormat::Png)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move preview to {}", path.display()))?;
    Ok(())
}

impl RenderSink for HeadlessSink {
    fn present(&mut self, frame: &RgbaImage, fields: &DisplayFields) -> Result<()> {
        write_png_atomic(frame, &self.preview_path)?;

        if self.last_fields.as_ref() == Some(fields) {
            return Ok(());
        }
        log::info!("{}", fields);

        let photo_changed = self.last_fields.as_ref().map(|f| &f.photo) != Some(&fields.photo);
        if photo_changed {
            match &fields.photo {
                Some(photo) => write_png_atomic(photo, &self.photo_path)?,
                None => write_png_atomic(&super::image::photo_placeholder(), &self.photo_path)?,
            }
        }
        self.last_fields = Some(fields.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, PriceBreak};
    use crate::domain::{CodeGeometry, Polygon, Rect, Symbology};
    use crate::session::ViewportMapper;
    use futures::FutureExt;
    use futures::future::BoxFuture;
    use image::Rgba;
    use std::sync::Arc;

    struct FixedCatalog;

    impl Catalog for FixedCatalog {
        fn lookup(&self, _payload: Vec<u8>) -> BoxFuture<'static, Option<PartRecord>> {
            async {
                Some(PartRecord {
                    description: "MLCC 100nF".into(),
                    in_stock: 5000,
                    min_qty: 10,
                    qty_multiples: 10,
                    manufacturer: "Murata".into(),
                    manufacturer_part_number: "GRM188R71H104KA93D".into(),
                    supplier_part_number: "81-GRM188R71H104KA3D".into(),
                    currency: "EUR".into(),
                    price_breaks: vec![PriceBreak {
                        price: 0.018,
                        quantity: 10,
                    }],
                    packaging_options: vec!["Reel".into(), "Cut Tape".into()],
                    details_url: "https://example.invalid/part".into(),
                    image_url: String::new(),
                    image: None,
                })
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_fields_follow_lookup() {
        let mut arbiter = SelectionArbiter::new(Arc::new(FixedCatalog));
        let fields = DisplayFields::from_session(&arbiter);
        assert_eq!(fields.mode, "Auto");
        assert!(fields.description.is_empty());

        let code = CodeGeometry::new(
            b"[)>\x1e06\x1d1P81".to_vec(),
            Symbology::Datamatrix2D,
            Polygon::from(Rect::new(0, 0, 10, 10)),
        );
        arbiter.on_frame(ViewportMapper::fit(100, 100, 100, 100), vec![code]);
        assert_eq!(DisplayFields::from_session(&arbiter).status, "Looking up...");

        let record = arbiter.lookup_finished().await;
        arbiter.complete_lookup(record);
        let fields = DisplayFields::from_session(&arbiter);
        assert_eq!(fields.status, "Found");
        assert_eq!(fields.in_stock, "5000");
        assert_eq!(fields.prices, vec!["10+ 0.018 EUR"]);
        assert_eq!(fields.packaging, "Reel, Cut Tape");
        assert!(fields.payload.contains("1P81"));
        assert!(fields.to_string().contains("Murata"));
    }

    #[test]
    fn test_headless_sink_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = HeadlessSink::new(dir.path().join("preview.png"));
        let frame = RgbaImage::from_pixel(8, 4, Rgba([10, 20, 30, 255]));
        let fields = DisplayFields::default();

        sink.present(&frame, &fields).unwrap();
        let written = image::open(sink.preview_path()).unwrap().to_rgba8();
        assert_eq!(written, frame);
        assert!(sink.photo_path().exists());

        // Unchanged fields leave the photo alone
        std::fs::remove_file(sink.photo_path()).unwrap();
        sink.present(&frame, &fields).unwrap();
        assert!(!sink.photo_path().exists());
    }
}
