//! Detected code types shared by the worker and the front end

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::geometry::Polygon;

/// Family of machine-readable code encodings the station understands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbology {
    Datamatrix2D,
    Barcode128,
    QrCode,
}

impl Symbology {
    /// Map a linear/QR decoder's type tag to a symbology
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "CODE128" => Some(Symbology::Barcode128),
            "QRCODE" => Some(Symbology::QrCode),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Symbology::Datamatrix2D => "datamatrix",
            Symbology::Barcode128 => "barcode128",
            Symbology::QrCode => "qrcode",
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Symbology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "datamatrix" | "dm" => Ok(Symbology::Datamatrix2D),
            "barcode128" | "code128" | "128" => Ok(Symbology::Barcode128),
            "qrcode" | "qr" => Ok(Symbology::QrCode),
            other => Err(format!("unknown symbology '{other}'")),
        }
    }
}

/// Snapshot of which symbologies to scan for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbologySet {
    pub datamatrix: bool,
    pub barcode128: bool,
    pub qrcode: bool,
}

impl Default for SymbologySet {
    fn default() -> Self {
        Self {
            datamatrix: true,
            barcode128: true,
            qrcode: false,
        }
    }
}

impl SymbologySet {
    pub const NONE: SymbologySet = SymbologySet {
        datamatrix: false,
        barcode128: false,
        qrcode: false,
    };

    #[cfg(test)]
    pub const ALL: SymbologySet = SymbologySet {
        datamatrix: true,
        barcode128: true,
        qrcode: true,
    };

    pub fn contains(&self, symbology: Symbology) -> bool {
        match symbology {
            Symbology::Datamatrix2D => self.datamatrix,
            Symbology::Barcode128 => self.barcode128,
            Symbology::QrCode => self.qrcode,
        }
    }

    pub fn set(&mut self, symbology: Symbology, enabled: bool) {
        match symbology {
            Symbology::Datamatrix2D => self.datamatrix = enabled,
            Symbology::Barcode128 => self.barcode128 = enabled,
            Symbology::QrCode => self.qrcode = enabled,
        }
    }

    /// Flip one symbology, returning its new state
    pub fn toggle(&mut self, symbology: Symbology) -> bool {
        let enabled = !self.contains(symbology);
        self.set(symbology, enabled);
        enabled
    }

    /// The linear/QR decoder serves both of these in a single call
    pub fn wants_symbol_decoder(&self) -> bool {
        self.barcode128 || self.qrcode
    }
}

/// A code found in one frame: payload, symbology and outline in frame pixels
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeGeometry {
    pub payload: Vec<u8>,
    pub symbology: Symbology,
    pub polygon: Polygon,
}

impl CodeGeometry {
    pub fn new(payload: impl Into<Vec<u8>>, symbology: Symbology, polygon: Polygon) -> Self {
        Self {
            payload: payload.into(),
            symbology,
            polygon,
        }
    }

    /// Payload as text for tooltips and logs
    pub fn payload_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        self.polygon.contains(x, y)
    }
}
