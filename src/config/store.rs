//! The authoritative configuration store
//!
//! Single-writer, many-reader discipline: every mutator serializes on the
//! write lock and holds it across validate -> persist -> swap, so readers
//! never observe a partially mutated table and a failed mutation leaves
//! both memory and disk untouched.

use crate::config::{Config, EndpointConfig};
use crate::error::{Error, Result};
use crate::observer::{Event, ObserverHub};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Option<Config>>,
    observers: Arc<ObserverHub>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>, observers: Arc<ObserverHub>) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(None),
            observers,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration from disk and adopt it.
    ///
    /// If the file does not exist yet, the default configuration is written
    /// out first. Parse and validation failures leave the previously adopted
    /// configuration in place.
    pub async fn load(&self) -> Result<Config> {
        let mut current = self.current.write().await;

        let config = if self.path.exists() {
            let raw = fs::read_to_string(&self.path)?;
            let config: Config =
                serde_json::from_str(&raw).map_err(|e| Error::Decode(e.to_string()))?;
            config.validate()?;
            config
        } else {
            info!(path = %self.path.display(), "config file missing, writing defaults");
            let config = Config::default_config();
            persist(&self.path, &config)?;
            config
        };

        *current = Some(config.clone());
        drop(current);

        info!(path = %self.path.display(), endpoints = config.endpoints.len(), "configuration loaded");
        self.emit_updated(&config);
        Ok(config)
    }

    /// Deep-copied snapshot of the live configuration.
    pub async fn snapshot(&self) -> Result<Config> {
        self.current.read().await.clone().ok_or(Error::NotLoaded)
    }

    /// Validate, persist, and publish a full replacement configuration.
    pub async fn replace(&self, config: Config) -> Result<()> {
        config.validate()?;

        let mut current = self.current.write().await;
        persist(&self.path, &config)?;
        *current = Some(config.clone());
        drop(current);

        info!(endpoints = config.endpoints.len(), "configuration replaced");
        self.emit_updated(&config);
        Ok(())
    }

    /// Insert or overwrite a single endpoint.
    pub async fn upsert_endpoint(&self, path: &str, endpoint: EndpointConfig) -> Result<()> {
        if path.is_empty() {
            return Err(Error::invalid_config(
                "path",
                "endpoint path cannot be empty",
            ));
        }
        endpoint.validate(path)?;

        let mut current = self.current.write().await;
        let mut config = current.clone().ok_or(Error::NotLoaded)?;
        config.endpoints.insert(path.to_string(), endpoint);

        persist(&self.path, &config)?;
        *current = Some(config.clone());
        drop(current);

        info!(endpoint = path, "endpoint upserted");
        self.emit_updated(&config);
        Ok(())
    }

    /// Remove an endpoint. Removal of an absent path is a no-op success.
    pub async fn delete_endpoint(&self, path: &str) -> Result<()> {
        let mut current = self.current.write().await;
        let mut config = current.clone().ok_or(Error::NotLoaded)?;

        if config.endpoints.remove(path).is_none() {
            warn!(endpoint = path, "delete for unknown endpoint, treating as removed");
        }

        persist(&self.path, &config)?;
        *current = Some(config.clone());
        drop(current);

        info!(endpoint = path, "endpoint deleted");
        self.emit_updated(&config);
        Ok(())
    }

    fn emit_updated(&self, config: &Config) {
        match serde_json::to_value(config) {
            Ok(data) => self.observers.broadcast(Event::config_updated(data)),
            Err(e) => warn!("failed to encode config for broadcast: {}", e),
        }
    }
}

/// Atomic replace: write a temp file next to the target, then rename over it.
fn persist(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let encoded = serde_json::to_string_pretty(config)?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, encoded.as_bytes())?;
    fs::rename(&tmp, path)?;
    Ok(())
}
