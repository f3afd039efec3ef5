//! Mouser part search client
//!
//! Payloads follow ANSI MH10.8.2: a `[)>` header, then GS-separated fields
//! each starting with a data identifier. The `1P` field carries the supplier
//! part number that the search API is queried with.

use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use image::RgbaImage;
use serde::{Deserialize, Deserializer};

use super::{Catalog, CatalogError, PartRecord, PriceBreak};

pub const DEFAULT_BASE_URL: &str = "https://api.mouser.com/api/v1";

/// Header marker every supported payload carries
pub const HEADER_MARKER: &[u8] = b"[)>";

const GROUP_SEPARATOR: u8 = 0x1d;
const RECORD_SEPARATOR: u8 = 0x1e;
const END_OF_TRANSMISSION: u8 = 0x04;
const PART_NUMBER_ID: &[u8] = b"1P";

// The image CDN rejects requests without a browser user agent
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:127.0) Gecko/20100101 Firefox/127.0";

/// Pull the supplier part number out of a scanned payload
pub fn extract_part_number(payload: &[u8]) -> Result<String, CatalogError> {
    if !payload
        .windows(HEADER_MARKER.len())
        .any(|w| w == HEADER_MARKER)
    {
        return Err(CatalogError::MissingHeader);
    }

    payload
        .split(|b| *b == GROUP_SEPARATOR)
        .map(|field| {
            let end = field
                .iter()
                .rposition(|b| *b != RECORD_SEPARATOR && *b != END_OF_TRANSMISSION)
                .map_or(0, |i| i + 1);
            &field[..end]
        })
        .find_map(|field| field.strip_prefix(PART_NUMBER_ID))
        .filter(|pn| !pn.is_empty())
        .map(|pn| String::from_utf8_lossy(pn).into_owned())
        .ok_or(CatalogError::MissingPartNumber)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SearchResponse {
    #[serde(default)]
    errors: Vec<serde_json::Value>,
    #[serde(default)]
    search_results: Option<SearchResults>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct SearchResults {
    number_of_result: u32,
    parts: Vec<MouserPart>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MouserPart {
    #[serde(deserialize_with = "text")]
    pub description: String,
    #[serde(deserialize_with = "count")]
    pub availability_in_stock: u32,
    #[serde(deserialize_with = "count")]
    pub min: u32,
    #[serde(deserialize_with = "count")]
    pub mult: u32,
    #[serde(deserialize_with = "text")]
    pub manufacturer: String,
    #[serde(deserialize_with = "text")]
    pub manufacturer_part_number: String,
    #[serde(deserialize_with = "text")]
    pub mouser_part_number: String,
    pub price_breaks: Vec<MouserPriceBreak>,
    pub product_attributes: Vec<ProductAttribute>,
    #[serde(deserialize_with = "text")]
    pub product_detail_url: String,
    #[serde(deserialize_with = "text")]
    pub image_path: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MouserPriceBreak {
    #[serde(deserialize_with = "count")]
    pub quantity: u32,
    #[serde(deserialize_with = "text")]
    pub price: String,
    #[serde(deserialize_with = "text")]
    pub currency: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProductAttribute {
    #[serde(deserialize_with = "text")]
    pub attribute_name: String,
    #[serde(deserialize_with = "text")]
    pub attribute_value: String,
}

/// Counts arrive as numbers, numeric strings or strings like "1234 In Stock"
fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => n.min(u32::MAX as u64) as u32,
        Some(Raw::Text(s)) => {
            let digits: String = s
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
                .filter(char::is_ascii_digit)
                .collect();
            digits.parse().unwrap_or(0)
        }
        None => 0,
    })
}

fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Pick the part to show when a search returns several.
///
/// Parts with a minimum order quantity of zero are not orderable and are
/// dropped; of the rest the smallest minimum order quantity wins, earliest in
/// list order on ties. A lone result is taken as is.
pub fn select_part(parts: &[MouserPart]) -> Option<&MouserPart> {
    if let [only] = parts {
        return Some(only);
    }
    parts.iter().filter(|p| p.min > 0).min_by_key(|p| p.min)
}

/// Parse a localized price like "1,23 €" or "$0.456"
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    cleaned.parse().ok()
}

impl From<&MouserPart> for PartRecord {
    fn from(part: &MouserPart) -> Self {
        let price_breaks = part
            .price_breaks
            .iter()
            .filter_map(|brk| match parse_price(&brk.price) {
                Some(price) => Some(PriceBreak {
                    price,
                    quantity: brk.quantity,
                }),
                None => {
                    log::warn!("Skipping unparsable price '{}'", brk.price);
                    None
                }
            })
            .collect();

        PartRecord {
            description: part.description.clone(),
            in_stock: part.availability_in_stock,
            min_qty: part.min,
            qty_multiples: part.mult,
            manufacturer: part.manufacturer.clone(),
            manufacturer_part_number: part.manufacturer_part_number.clone(),
            supplier_part_number: part.mouser_part_number.clone(),
            currency: part
                .price_breaks
                .first()
                .map(|brk| brk.currency.clone())
                .unwrap_or_else(|| "N/A".to_string()),
            price_breaks,
            packaging_options: part
                .product_attributes
                .iter()
                .filter(|attr| attr.attribute_name == "Packaging")
                .map(|attr| attr.attribute_value.clone())
                .collect(),
            details_url: part.product_detail_url.clone(),
            image_url: part.image_path.clone(),
            image: None,
        }
    }
}

/// Mouser search API client
#[derive(Clone, Debug)]
pub struct MouserCatalog {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl MouserCatalog {
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        if api_key.is_none() {
            log::warn!("No catalog API key configured, lookups will return no data");
        }
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Search, arbitrate and fetch the photo for one payload
    pub async fn find_part(&self, payload: &[u8]) -> Result<PartRecord, CatalogError> {
        let part_number = extract_part_number(payload)?;
        let api_key = self.api_key.as_deref().ok_or(CatalogError::MissingApiKey)?;
        log::info!("Looking up supplier part number {}", part_number);

        let body = serde_json::json!({
            "SearchByPartRequest": { "mouserPartNumber": part_number }
        });
        let response = self
            .client
            .post(format!("{}/search/partnumber", self.base_url))
            .query(&[("apiKey", api_key)])
            .header("accept", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CatalogError::Status(response.status()));
        }
        let data: SearchResponse = response.json().await?;
        if !data.errors.is_empty() {
            return Err(CatalogError::Api(serde_json::Value::from(data.errors).to_string()));
        }

        let results = data.search_results.unwrap_or_default();
        if results.number_of_result == 0 || results.parts.is_empty() {
            return Err(CatalogError::NoMatch);
        }
        if results.parts.len() > 1 {
            log::info!("{} parts found, arbitrating", results.parts.len());
        }
        let part = select_part(&results.parts).ok_or(CatalogError::NoMatch)?;
        log::debug!("Selected part {:?}", part);

        let mut record = PartRecord::from(part);
        if !record.image_url.is_empty() {
            record.image = self.fetch_photo(&record.image_url).await;
        }
        Ok(record)
    }

    /// Fetch and decode the product photo; any failure leaves it absent
    async fn fetch_photo(&self, url: &str) -> Option<RgbaImage> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .header(reqwest::header::ACCEPT, "image/*")
            .send()
            .await
            .inspect_err(|e| log::warn!("Photo request failed: {}", e))
            .ok()?;
        if !response.status().is_success() {
            log::warn!("Photo request responded with {}", response.status());
            return None;
        }
        let bytes = response.bytes().await.ok()?;
        match image::load_from_memory(&bytes) {
            Ok(img) => Some(img.to_rgba8()),
            Err(e) => {
                log::warn!("Could not decode part photo: {}", e);
                None
            }
        }
    }
}

impl Catalog for MouserCatalog {
    fn lookup(&self, payload: Vec<u8>) -> BoxFuture<'static, Option<PartRecord>> {
        let catalog = self.clone();
        async move {
            match catalog.find_part(&payload).await {
                Ok(record) => Some(record),
                Err(err) => {
                    log::warn!("Part lookup failed: {}", err);
                    None
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const PAYLOAD: &[u8] = b"[)>\x1e06\x1dK12345\x1d14K001\x1d1P595-LM358DR\x1dQ10\x1e\x04";

    fn part(min: u32, mpn: &str) -> MouserPart {
        MouserPart {
            min,
            mouser_part_number: mpn.to_string(),
            ..Default::default()
        }
    }

    const SEARCH_JSON: &str = r#"{
        "Errors": [],
        "SearchResults": {
            "NumberOfResult": 1,
            "Parts": [{
                "Description": "Operational Amplifiers",
                "AvailabilityInStock": "1234",
                "Min": "1",
                "Mult": "1",
                "Manufacturer": "Texas Instruments",
                "ManufacturerPartNumber": "LM358DR",
                "MouserPartNumber": "595-LM358DR",
                "PriceBreaks": [
                    {"Quantity": 1, "Price": "0,42 €", "Currency": "EUR"},
                    {"Quantity": 10, "Price": "0,301 €", "Currency": "EUR"}
                ],
                "ProductAttributes": [
                    {"AttributeName": "Packaging", "AttributeValue": "Reel"},
                    {"AttributeName": "Packaging", "AttributeValue": "Cut Tape"},
                    {"AttributeName": "Standard Pack Qty", "AttributeValue": "2500"}
                ],
                "ProductDetailUrl": "https://www.mouser.com/ProductDetail/595-LM358DR",
                "ImagePath": null
            }]
        }
    }"#;

    #[test]
    fn test_extract_part_number() {
        assert_eq!(extract_part_number(PAYLOAD).unwrap(), "595-LM358DR");
    }

    #[test]
    fn test_extract_requires_header() {
        assert!(matches!(
            extract_part_number(b"1P595-LM358DR"),
            Err(CatalogError::MissingHeader)
        ));
    }

    #[test]
    fn test_extract_requires_part_field() {
        assert!(matches!(
            extract_part_number(b"[)>\x1e06\x1dK12345\x1e\x04"),
            Err(CatalogError::MissingPartNumber)
        ));
        assert!(matches!(
            extract_part_number(b"[)>\x1e06\x1d1P\x1e\x04"),
            Err(CatalogError::MissingPartNumber)
        ));
    }

    #[test]
    fn test_select_smallest_orderable_minimum() {
        let parts = [part(0, "a"), part(5, "b"), part(3, "c")];
        assert_eq!(select_part(&parts).unwrap().min, 3);
    }

    #[test]
    fn test_select_none_when_all_unavailable() {
        let parts = [part(0, "a"), part(0, "b")];
        assert!(select_part(&parts).is_none());
    }

    #[test]
    fn test_select_ties_keep_list_order() {
        let parts = [part(10, "reel"), part(1, "cut-tape"), part(1, "bulk")];
        assert_eq!(select_part(&parts).unwrap().mouser_part_number, "cut-tape");
    }

    #[test]
    fn test_select_single_result_taken_as_is() {
        let parts = [part(0, "only")];
        assert_eq!(select_part(&parts).unwrap().mouser_part_number, "only");
        assert!(select_part(&[]).is_none());
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("0,42 €"), Some(0.42));
        assert_eq!(parse_price("$1.50"), Some(1.5));
        assert_eq!(parse_price("n/a"), None);
    }

    #[test]
    fn test_record_mapping() {
        let data: SearchResponse = serde_json::from_str(SEARCH_JSON).unwrap();
        let results = data.search_results.unwrap();
        let record = PartRecord::from(select_part(&results.parts).unwrap());

        assert_eq!(record.description, "Operational Amplifiers");
        assert_eq!(record.in_stock, 1234);
        assert_eq!(record.min_qty, 1);
        assert_eq!(record.supplier_part_number, "595-LM358DR");
        assert_eq!(record.currency, "EUR");
        assert_eq!(
            record.price_breaks,
            vec![
                PriceBreak {
                    price: 0.42,
                    quantity: 1
                },
                PriceBreak {
                    price: 0.301,
                    quantity: 10
                },
            ]
        );
        assert_eq!(record.packaging_options, vec!["Reel", "Cut Tape"]);
        assert!(record.image_url.is_empty());
    }

    #[test]
    fn test_currency_defaults_without_price_breaks() {
        let record = PartRecord::from(&part(1, "x"));
        assert_eq!(record.currency, "N/A");
    }

    #[test]
    fn test_count_accepts_text_and_numbers() {
        let p: MouserPart =
            serde_json::from_str(r#"{"AvailabilityInStock": "2.500 In Stock", "Min": 5, "Mult": null}"#)
                .unwrap();
        assert_eq!(p.availability_in_stock, 2500);
        assert_eq!(p.min, 5);
        assert_eq!(p.mult, 0);
    }

    /// Serve one canned HTTP response on a local port
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&request[..end]).to_ascii_lowercase();
                    let length = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let reply = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_find_part_over_http() {
        let base = serve_once("200 OK", SEARCH_JSON).await;
        let catalog =
            MouserCatalog::new(Some("key".into()), base, Duration::from_secs(5)).unwrap();
        let record = catalog.lookup(PAYLOAD.to_vec()).await.unwrap();
        assert_eq!(record.manufacturer_part_number, "LM358DR");
        assert!(record.image.is_none());
    }

    #[tokio::test]
    async fn test_non_success_status_is_no_record() {
        let base = serve_once("503 Service Unavailable", "{}").await;
        let catalog =
            MouserCatalog::new(Some("key".into()), base, Duration::from_secs(5)).unwrap();
        assert!(matches!(
            catalog.find_part(PAYLOAD).await,
            Err(CatalogError::Status(_))
        ));
    }

    #[tokio::test]
    async fn test_api_errors_are_no_record() {
        let base = serve_once(
            "200 OK",
            r#"{"Errors": [{"Code": "Invalid", "Message": "Invalid unique identifier."}], "SearchResults": null}"#,
        )
        .await;
        let catalog =
            MouserCatalog::new(Some("key".into()), base, Duration::from_secs(5)).unwrap();
        assert!(matches!(
            catalog.find_part(PAYLOAD).await,
            Err(CatalogError::Api(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_results_is_no_match() {
        let base = serve_once(
            "200 OK",
            r#"{"Errors": [], "SearchResults": {"NumberOfResult": 0, "Parts": []}}"#,
        )
        .await;
        let catalog =
            MouserCatalog::new(Some("key".into()), base, Duration::from_secs(5)).unwrap();
        assert!(matches!(
            catalog.find_part(PAYLOAD).await,
            Err(CatalogError::NoMatch)
        ));
    }

    #[tokio::test]
    async fn test_headerless_payload_skips_network() {
        // Nothing listens on this port; reaching the network would fail differently
        let catalog = MouserCatalog::new(
            Some("key".into()),
            "http://127.0.0.1:9",
            Duration::from_secs(1),
        )
        .unwrap();
        assert!(matches!(
            catalog.find_part(b"lot-42").await,
            Err(CatalogError::MissingHeader)
        ));
        assert!(catalog.lookup(b"lot-42".to_vec()).await.is_none());
    }

    #[tokio::test]
    async fn test_missing_key_is_no_record() {
        let catalog =
            MouserCatalog::new(None, DEFAULT_BASE_URL, Duration::from_secs(1)).unwrap();
        assert!(matches!(
            catalog.find_part(PAYLOAD).await,
            Err(CatalogError::MissingApiKey)
        ));
    }
}
