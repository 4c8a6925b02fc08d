//! Product catalog
//!
//! The catalog is an ordered list of products. A product's position is the
//! join key into both embedding matrices and the lexical corpus, so the order
//! is fixed once a catalog is built and never changes afterwards.

use crate::error::{Result, VitrineError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

const DEFAULT_COLOR: &str = "multi";
const DEFAULT_MATERIAL: &str = "mixed";
const DEFAULT_SIZE: &str = "One Size";

/// A catalog item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Globally unique, stable identifier
    pub product_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Comma-joined free-text tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    /// Whole currency units, 0 when unknown
    #[serde(default)]
    pub price: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    /// Pipe- or comma-joined size list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    /// Pipe-joined additional images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_paths: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl Product {
    /// Create a product with only the required fields set
    pub fn new(product_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            title: title.into(),
            description: None,
            tags: None,
            price: 0,
            color: None,
            material: None,
            sizes: None,
            image_path: None,
            image_paths: None,
            store: None,
            source_url: None,
        }
    }

    /// Color, `"multi"` when absent
    pub fn color(&self) -> &str {
        self.color.as_deref().unwrap_or(DEFAULT_COLOR)
    }

    /// Material, `"mixed"` when absent
    pub fn material(&self) -> &str {
        self.material.as_deref().unwrap_or(DEFAULT_MATERIAL)
    }

    /// Individual sizes, `["One Size"]` when absent
    pub fn sizes(&self) -> Vec<&str> {
        let sizes: Vec<&str> = self
            .sizes
            .as_deref()
            .map(|s| {
                s.split(['|', ','])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        if sizes.is_empty() {
            vec![DEFAULT_SIZE]
        } else {
            sizes
        }
    }

    /// All image references, primary first
    pub fn images(&self) -> Vec<&str> {
        let mut images = Vec::new();
        if let Some(path) = self.image_path.as_deref().map(str::trim) {
            if !path.is_empty() {
                images.push(path);
            }
        }
        if let Some(paths) = self.image_paths.as_deref() {
            for path in paths.split('|').map(str::trim) {
                if !path.is_empty() && !images.contains(&path) {
                    images.push(path);
                }
            }
        }
        images
    }

    /// The image used for the visual embedding
    pub fn primary_image(&self) -> Option<&str> {
        self.images().into_iter().next()
    }

    /// Text fed to the text embedding model: title, description and tags
    pub fn embedding_text(&self) -> String {
        let mut parts = vec![self.title.as_str()];
        parts.extend(self.description.as_deref());
        parts.extend(self.tags.as_deref());
        parts.join(" ")
    }

    /// Text fed to the lexical index: embedding text plus color and material
    pub fn lexical_text(&self) -> String {
        let mut parts = vec![self.title.as_str()];
        parts.extend(self.description.as_deref());
        parts.extend(self.tags.as_deref());
        parts.extend(self.color.as_deref());
        parts.extend(self.material.as_deref());
        parts.join(" ")
    }

    /// Document scored by the reranker
    pub fn rerank_text(&self) -> String {
        format!(
            "{} {}",
            self.title,
            self.description.as_deref().unwrap_or_default()
        )
    }
}

/// Raw CSV row. Every column except the id is optional so partial exports load.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    product_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Option<String>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    material: Option<String>,
    #[serde(default)]
    sizes: Option<String>,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    image_path: Option<String>,
    #[serde(default)]
    image_paths: Option<String>,
    #[serde(default)]
    store: Option<String>,
    #[serde(default)]
    source_url: Option<String>,
}

impl CsvRecord {
    fn into_product(self) -> Product {
        Product {
            product_id: self.product_id.trim().to_string(),
            title: non_empty(self.title).unwrap_or_default(),
            description: non_empty(self.description),
            tags: non_empty(self.tags),
            price: parse_price(self.price.as_deref()),
            color: non_empty(self.color),
            material: non_empty(self.material),
            sizes: non_empty(self.sizes),
            image_path: non_empty(self.image_path),
            image_paths: non_empty(self.image_paths),
            store: non_empty(self.store),
            source_url: non_empty(self.source_url),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Prices arrive as integers or floats ("45", "45.0"); anything else is unknown
fn parse_price(raw: Option<&str>) -> u64 {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return 0;
    };
    raw.parse::<u64>().unwrap_or_else(|_| {
        raw.parse::<f64>()
            .ok()
            .filter(|p| p.is_finite() && *p > 0.0)
            .map(|p| p.trunc() as u64)
            .unwrap_or(0)
    })
}

/// Ordered product collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    /// Build a catalog, rejecting empty or duplicate product ids
    pub fn from_products(products: Vec<Product>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(products.len());
        for (row, product) in products.iter().enumerate() {
            if product.product_id.trim().is_empty() {
                return Err(VitrineError::Catalog(format!(
                    "Row {} has an empty product_id",
                    row
                )));
            }
            if !seen.insert(product.product_id.as_str()) {
                return Err(VitrineError::DuplicateProduct {
                    id: product.product_id.clone(),
                });
            }
        }

        Ok(Self { products })
    }

    /// Load a catalog from a CSV export with a header row
    pub fn load_csv(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VitrineError::Catalog(format!(
                "Catalog file not found: {}",
                path.display()
            )));
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Fields)
            .from_path(path)?;

        let mut products = Vec::new();
        for record in reader.deserialize::<CsvRecord>() {
            products.push(record?.into_product());
        }

        tracing::info!("Loaded {} products from {}", products.len(), path.display());

        Self::from_products(products)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Product at a row ordinal
    pub fn get(&self, row: usize) -> Option<&Product> {
        self.products.get(row)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.iter()
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let product = Product::new("p1", "Linen shirt");
        assert_eq!(product.color(), "multi");
        assert_eq!(product.material(), "mixed");
        assert_eq!(product.sizes(), vec!["One Size"]);
        assert_eq!(product.primary_image(), None);
    }

    #[test]
    fn test_sizes_split_on_pipe_and_comma() {
        let mut product = Product::new("p1", "Dress");
        product.sizes = Some("XS|S, M".to_string());
        assert_eq!(product.sizes(), vec!["XS", "S", "M"]);
    }

    #[test]
    fn test_primary_image_prefers_image_path() {
        let mut product = Product::new("p1", "Dress");
        product.image_paths = Some("/a.jpg|/b.jpg".to_string());
        assert_eq!(product.primary_image(), Some("/a.jpg"));

        product.image_path = Some("/main.jpg".to_string());
        assert_eq!(product.images(), vec!["/main.jpg", "/a.jpg", "/b.jpg"]);
    }

    #[test]
    fn test_text_fields_skip_missing() {
        let mut product = Product::new("p1", "Silk Scarf");
        product.tags = Some("accessory, silk".to_string());
        product.color = Some("red".to_string());

        assert_eq!(product.embedding_text(), "Silk Scarf accessory, silk");
        assert_eq!(product.lexical_text(), "Silk Scarf accessory, silk red");
        assert_eq!(product.rerank_text(), "Silk Scarf ");
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let products = vec![Product::new("p1", "A"), Product::new("p1", "B")];
        assert!(matches!(
            Catalog::from_products(products),
            Err(VitrineError::DuplicateProduct { .. })
        ));
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price(Some("45")), 45);
        assert_eq!(parse_price(Some("45.9")), 45);
        assert_eq!(parse_price(Some("")), 0);
        assert_eq!(parse_price(Some("n/a")), 0);
        assert_eq!(parse_price(None), 0);
    }

    #[test]
    fn test_load_csv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "product_id,title,description,tags,color,material,sizes,price,image_path"
        )
        .unwrap();
        writeln!(
            file,
            "p1,Red Dress,A flowing dress,\"dress, summer\",red,cotton,S|M,120,/img/p1.jpg"
        )
        .unwrap();
        writeln!(file, "p2,Wool Coat,,,,,,,").unwrap();

        let catalog = Catalog::load_csv(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);

        let first = catalog.get(0).unwrap();
        assert_eq!(first.tags.as_deref(), Some("dress, summer"));
        assert_eq!(first.price, 120);

        let second = catalog.get(1).unwrap();
        assert_eq!(second.description, None);
        assert_eq!(second.material(), "mixed");
    }
}
