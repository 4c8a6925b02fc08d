//! Bundle persistence
//!
//! A bundle directory holds the catalog, both embedding matrices (zstd
//! compressed), the lexical corpus and a metadata record carrying a BLAKE3
//! digest of every other file. Saving writes a complete staging directory
//! first and promotes it with renames, so readers never see a half-written
//! bundle on disk.

use super::{ArtifactBundle, BundleMetadata};
use crate::catalog::{Catalog, Product};
use crate::embedding::{KeywordIndex, VectorIndex};
use crate::error::{Result, VitrineError};
use ndarray::Array2;
use std::fs;
use std::path::{Path, PathBuf};

const CATALOG_FILE: &str = "catalog.json";
const TEXT_EMBEDDINGS_FILE: &str = "text_embeddings.bin.zst";
const IMAGE_EMBEDDINGS_FILE: &str = "image_embeddings.bin.zst";
const LEXICAL_FILE: &str = "lexical.json";
const METADATA_FILE: &str = "metadata.json";

const ZSTD_LEVEL: i32 = 3;
const MATRIX_HEADER_LEN: usize = 16;

/// Where bundles are loaded from and persisted to
pub trait BundleSource: Send + Sync {
    fn load(&self) -> Result<ArtifactBundle>;

    /// Persist `bundle` and return its metadata as written, checksums included
    fn persist(&self, bundle: &ArtifactBundle) -> Result<BundleMetadata>;

    /// Human readable location for logs
    fn describe(&self) -> String;
}

/// Bundle stored as a directory of artifact files
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl BundleSource for DirectorySource {
    fn load(&self) -> Result<ArtifactBundle> {
        ArtifactBundle::load(&self.dir)
    }

    fn persist(&self, bundle: &ArtifactBundle) -> Result<BundleMetadata> {
        bundle.save(&self.dir)
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

impl ArtifactBundle {
    /// Write the bundle to `dir`, replacing any bundle already there
    ///
    /// Returns the metadata record that was written, with the checksum of
    /// every artifact file filled in.
    pub fn save(&self, dir: &Path) -> Result<BundleMetadata> {
        let staging = sibling_path(dir, "staging")?;
        fs::create_dir_all(&staging).map_err(|e| {
            VitrineError::io(e, format!("Failed to create staging directory: {}", staging.display()))
        })?;

        let result = self
            .write_files(&staging)
            .and_then(|metadata| promote(&staging, dir).map(|_| metadata));
        if result.is_err() {
            let _ = fs::remove_dir_all(&staging);
        }
        let metadata = result?;

        tracing::info!(
            "Saved bundle with {} products to {}",
            self.len(),
            dir.display()
        );
        Ok(metadata)
    }

    fn write_files(&self, dir: &Path) -> Result<BundleMetadata> {
        let mut metadata = self.metadata.clone();
        metadata.checksums.clear();

        let catalog = serde_json::to_vec(self.catalog.products())
            .map_err(|e| VitrineError::json(e, "Failed to serialize catalog"))?;
        let lexical = serde_json::to_vec(self.keyword_index.documents())
            .map_err(|e| VitrineError::json(e, "Failed to serialize lexical corpus"))?;
        let text = encode_matrix(self.text_index.matrix())?;
        let image = encode_matrix(self.image_index.matrix())?;

        for (name, bytes) in [
            (CATALOG_FILE, catalog),
            (TEXT_EMBEDDINGS_FILE, text),
            (IMAGE_EMBEDDINGS_FILE, image),
            (LEXICAL_FILE, lexical),
        ] {
            metadata
                .checksums
                .insert(name.to_string(), blake3::hash(&bytes).to_hex().to_string());
            write_file(&dir.join(name), &bytes)?;
        }

        let bytes = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| VitrineError::json(e, "Failed to serialize metadata"))?;
        write_file(&dir.join(METADATA_FILE), &bytes)?;
        Ok(metadata)
    }

    /// Load and validate a bundle written by [`ArtifactBundle::save`]
    pub fn load(dir: &Path) -> Result<Self> {
        for name in [
            METADATA_FILE,
            CATALOG_FILE,
            TEXT_EMBEDDINGS_FILE,
            IMAGE_EMBEDDINGS_FILE,
            LEXICAL_FILE,
        ] {
            let path = dir.join(name);
            if !path.is_file() {
                return Err(VitrineError::ArtifactMissing { path });
            }
        }

        let metadata: BundleMetadata = serde_json::from_slice(&read_file(&dir.join(METADATA_FILE))?)
            .map_err(|e| VitrineError::json(e, "Failed to parse bundle metadata"))?;
        if metadata.schema_version != super::BUNDLE_SCHEMA_VERSION {
            return Err(VitrineError::ArtifactIntegrity(format!(
                "unsupported bundle schema version {}",
                metadata.schema_version
            )));
        }

        let catalog_bytes = read_verified(dir, CATALOG_FILE, &metadata)?;
        let products: Vec<Product> = serde_json::from_slice(&catalog_bytes)
            .map_err(|e| VitrineError::json(e, "Failed to parse catalog"))?;
        let catalog = Catalog::from_products(products)?;

        let text = decode_matrix(&read_verified(dir, TEXT_EMBEDDINGS_FILE, &metadata)?, TEXT_EMBEDDINGS_FILE)?;
        let image = decode_matrix(&read_verified(dir, IMAGE_EMBEDDINGS_FILE, &metadata)?, IMAGE_EMBEDDINGS_FILE)?;

        let documents: Vec<Vec<String>> =
            serde_json::from_slice(&read_verified(dir, LEXICAL_FILE, &metadata)?)
                .map_err(|e| VitrineError::json(e, "Failed to parse lexical corpus"))?;

        let bundle = Self::new(
            catalog,
            VectorIndex::from_matrix(text),
            VectorIndex::from_matrix(image),
            KeywordIndex::new(documents),
            metadata,
        )?;

        tracing::info!(
            "Loaded bundle from {}: {} products, text {}D, image {}D",
            dir.display(),
            bundle.len(),
            bundle.metadata.text_dim,
            bundle.metadata.img_dim
        );

        Ok(bundle)
    }
}

fn sibling_path(dir: &Path, label: &str) -> Result<PathBuf> {
    let name = dir
        .file_name()
        .ok_or_else(|| VitrineError::Config(format!("Invalid bundle directory: {}", dir.display())))?;
    Ok(dir.with_file_name(format!(
        "{}.{}-{}",
        name.to_string_lossy(),
        label,
        uuid::Uuid::new_v4().simple()
    )))
}

/// Move a fully written staging directory into place
fn promote(staging: &Path, dir: &Path) -> Result<()> {
    if let Some(parent) = dir.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            VitrineError::io(e, format!("Failed to create parent directory: {}", parent.display()))
        })?;
    }

    let previous = if dir.exists() {
        let backup = sibling_path(dir, "previous")?;
        fs::rename(dir, &backup).map_err(|e| {
            VitrineError::io(e, format!("Failed to move aside old bundle: {}", dir.display()))
        })?;
        Some(backup)
    } else {
        None
    };

    if let Err(e) = fs::rename(staging, dir) {
        if let Some(backup) = &previous {
            if let Err(restore) = fs::rename(backup, dir) {
                tracing::warn!(
                    "Failed to restore previous bundle from {}: {}",
                    backup.display(),
                    restore
                );
            }
        }
        return Err(VitrineError::io(
            e,
            format!("Failed to promote staging bundle to {}", dir.display()),
        ));
    }

    if let Some(backup) = previous {
        if let Err(e) = fs::remove_dir_all(&backup) {
            tracing::warn!("Failed to remove old bundle {}: {}", backup.display(), e);
        }
    }

    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes)
        .map_err(|e| VitrineError::io(e, format!("Failed to write artifact: {}", path.display())))
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path)
        .map_err(|e| VitrineError::io(e, format!("Failed to read artifact: {}", path.display())))
}

fn read_verified(dir: &Path, name: &str, metadata: &BundleMetadata) -> Result<Vec<u8>> {
    let bytes = read_file(&dir.join(name))?;

    let expected = metadata.checksums.get(name).ok_or_else(|| {
        VitrineError::ArtifactIntegrity(format!("No checksum recorded for {}", name))
    })?;
    let actual = blake3::hash(&bytes).to_hex().to_string();
    if *expected != actual {
        return Err(VitrineError::ArtifactIntegrity(format!(
            "Checksum mismatch for {}",
            name
        )));
    }

    Ok(bytes)
}

/// Row-major f32 matrix: u64 rows, u64 cols, then little-endian values
fn encode_matrix(matrix: &Array2<f32>) -> Result<Vec<u8>> {
    let mut raw = Vec::with_capacity(MATRIX_HEADER_LEN + matrix.len() * 4);
    raw.extend_from_slice(&(matrix.nrows() as u64).to_le_bytes());
    raw.extend_from_slice(&(matrix.ncols() as u64).to_le_bytes());
    for value in matrix.iter() {
        raw.extend_from_slice(&value.to_le_bytes());
    }

    zstd::encode_all(raw.as_slice(), ZSTD_LEVEL)
        .map_err(|e| VitrineError::io(e, "Failed to compress embedding matrix"))
}

fn decode_matrix(bytes: &[u8], name: &str) -> Result<Array2<f32>> {
    let raw = zstd::decode_all(bytes)
        .map_err(|e| VitrineError::io(e, format!("Failed to decompress {}", name)))?;

    let corrupt = |detail: &str| VitrineError::ArtifactIntegrity(format!("{}: {}", name, detail));

    if raw.len() < MATRIX_HEADER_LEN {
        return Err(corrupt("truncated header"));
    }
    let (header, body) = raw.split_at(MATRIX_HEADER_LEN);
    let rows = read_u64(&header[..8]) as usize;
    let cols = read_u64(&header[8..]) as usize;

    let expected = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| corrupt("matrix shape overflows"))?;
    if body.len() != expected {
        return Err(corrupt("body length does not match shape"));
    }

    let values: Vec<f32> = body
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Array2::from_shape_vec((rows, cols), values).map_err(|e| corrupt(&e.to_string()))
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}
