//! Process-wide holder of the active bundle
//!
//! Readers take an `Arc` snapshot and keep using it for the whole query, so a
//! swap never tears a request. Loading is single-flight: concurrent first
//! requests share one load, and when that load fails every caller that was
//! waiting on it receives the same error. The next request starts a fresh
//! attempt.

use super::{ArtifactBundle, BundleSource};
use crate::error::{Result, VitrineError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Default)]
struct LoadState {
    /// Attempt number and message of the most recent failed load
    last_failure: Option<(u64, String)>,
}

/// Snapshot of what the store is serving
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub loaded: bool,
    pub source: String,
    pub num_products: Option<usize>,
    pub built_at: Option<DateTime<Utc>>,
    pub load_attempts: u64,
}

pub struct BundleStore {
    source: Arc<dyn BundleSource>,
    active: RwLock<Option<Arc<ArtifactBundle>>>,
    /// Serializes loads and replacements
    gate: Mutex<LoadState>,
    attempts: AtomicU64,
}

impl BundleStore {
    pub fn new(source: Arc<dyn BundleSource>) -> Self {
        Self {
            source,
            active: RwLock::new(None),
            gate: Mutex::new(LoadState::default()),
            attempts: AtomicU64::new(0),
        }
    }

    /// Store already serving `bundle`
    pub fn with_bundle(source: Arc<dyn BundleSource>, bundle: ArtifactBundle) -> Self {
        let store = Self::new(source);
        store.install(Arc::new(bundle));
        store
    }

    /// The active bundle, if one has been loaded
    pub fn current(&self) -> Option<Arc<ArtifactBundle>> {
        self.active
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn install(&self, bundle: Arc<ArtifactBundle>) {
        *self
            .active
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(bundle);
    }

    /// Return the active bundle, loading it from the source on first use
    pub async fn get_or_load(&self) -> Result<Arc<ArtifactBundle>> {
        if let Some(bundle) = self.current() {
            return Ok(bundle);
        }

        let observed = self.attempts.load(Ordering::Acquire);
        let mut state = self.gate.lock().await;

        if let Some(bundle) = self.current() {
            return Ok(bundle);
        }

        // A load finished while we waited for the gate and it failed: that
        // was our load too, so report its error instead of retrying.
        if let Some((attempt, message)) = &state.last_failure {
            if *attempt > observed {
                return Err(VitrineError::BundleLoad(message.clone()));
            }
        }

        info!("Loading artifact bundle from {}", self.source.describe());

        let source = self.source.clone();
        let result = tokio::task::spawn_blocking(move || source.load())
            .await
            .map_err(|e| VitrineError::BundleLoad(format!("Load task failed: {}", e)))
            .and_then(|loaded| loaded);

        let attempt = self.attempts.fetch_add(1, Ordering::AcqRel) + 1;

        match result {
            Ok(bundle) => {
                let bundle = Arc::new(bundle);
                self.install(bundle.clone());
                state.last_failure = None;
                Ok(bundle)
            }
            Err(e) => {
                let message = e.to_string();
                warn!("Bundle load attempt {} failed: {}", attempt, message);
                state.last_failure = Some((attempt, message.clone()));
                Err(VitrineError::BundleLoad(message))
            }
        }
    }

    /// Persist `bundle` to the source and make it the active bundle
    ///
    /// Requests already holding the previous bundle finish on it; later
    /// requests see the new one.
    pub async fn replace(&self, bundle: ArtifactBundle) -> Result<Arc<ArtifactBundle>> {
        let mut state = self.gate.lock().await;

        let source = self.source.clone();
        let bundle = tokio::task::spawn_blocking(move || {
            let mut bundle = bundle;
            bundle.metadata = source.persist(&bundle)?;
            Ok::<_, VitrineError>(bundle)
        })
        .await
        .map_err(|e| VitrineError::Build(format!("Persist task failed: {}", e)))??;

        let bundle = Arc::new(bundle);
        self.install(bundle.clone());
        state.last_failure = None;

        info!(
            "Swapped in new bundle with {} products",
            bundle.len()
        );

        Ok(bundle)
    }

    pub fn status(&self) -> StoreStatus {
        let current = self.current();
        StoreStatus {
            loaded: current.is_some(),
            source: self.source.describe(),
            num_products: current.as_ref().map(|b| b.len()),
            built_at: current.as_ref().map(|b| b.metadata().built_at),
            load_attempts: self.attempts.load(Ordering::Acquire),
        }
    }
}
