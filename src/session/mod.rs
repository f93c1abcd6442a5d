
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::Config;
use crate::generator::GeneratorCache;
use crate::ingest;
use crate::jobinfo::JobInfo;
use crate::ollama::OllamaClient;
use crate::store;
use crate::{ColdreachError, Result};

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Deterministic store path for a session id.
///
/// Session ids are opaque caller-supplied strings that become part of a
/// directory name. Bytes outside `[A-Za-z0-9-]` are escaped as `_xx` hex,
/// which keeps the mapping injective: distinct ids never derive the same
/// store path.
#[inline]
pub fn store_path(config: &Config, session_id: &str) -> PathBuf {
    let mut sanitized = String::with_capacity(session_id.len());
    for byte in session_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            sanitized.push(byte as char);
        } else {
            sanitized.push('_');
            sanitized.push(HEX_DIGITS[usize::from(byte >> 4)] as char);
            sanitized.push(HEX_DIGITS[usize::from(byte & 0x0f)] as char);
        }
    }
    config.stores_dir().join(format!("portfolio_{}", sanitized))
}

/// Per-store read/write locks.
///
/// A mutating operation (ingest, delete) on a store must not run
/// concurrently with a read or another write to the same store; reads may
/// run concurrently with each other. Locks are created lazily per path.
#[derive(Default)]
struct StoreLocks {
    locks: Mutex<HashMap<PathBuf, Arc<RwLock<()>>>>,
}

impl StoreLocks {
    fn lock_for(&self, path: &Path) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            locks
                .entry(path.to_path_buf())
                .or_insert_with(|| Arc::new(RwLock::new(()))),
        )
    }
}

/// User-facing service surface over per-session portfolio stores.
///
/// Sessions are fully isolated: each owns an exclusive store directory, and
/// operations on one session never affect another's data.
pub struct PortfolioService {
    config: Config,
    client: OllamaClient,
    cache: GeneratorCache,
    locks: StoreLocks,
}

impl PortfolioService {
    #[inline]
    pub fn new(config: Config) -> Result<Self> {
        let client = OllamaClient::new(&config)
            .map_err(|e| ColdreachError::Config(format!("{:#}", e)))?;

        Ok(Self {
            config,
            client,
            cache: GeneratorCache::new(),
            locks: StoreLocks::default(),
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ingest raw portfolio text for a session; returns the chunk count
    #[inline]
    pub async fn setup_portfolio_text(&self, text: &str, session_id: &str) -> Result<usize> {
        let path = store_path(&self.config, session_id);
        let lock = self.locks.lock_for(&path);
        let _guard = lock.write().await;

        info!("Saving portfolio text for session {}", session_id);
        ingest::ingest_text(&self.config, &self.client, text, &path).await
    }

    /// Ingest a portfolio document (PDF or text file) for a session
    #[inline]
    pub async fn setup_portfolio_file(&self, file_path: &Path, session_id: &str) -> Result<usize> {
        let path = store_path(&self.config, session_id);
        let lock = self.locks.lock_for(&path);
        let _guard = lock.write().await;

        info!("Ingesting {:?} for session {}", file_path, session_id);
        ingest::ingest_file(&self.config, &self.client, file_path, &path).await
    }

    /// True once the session has at least one ingested chunk
    #[inline]
    pub async fn has_portfolio(&self, session_id: &str) -> bool {
        let path = store_path(&self.config, session_id);
        let lock = self.locks.lock_for(&path);
        let _guard = lock.read().await;

        store::exists(&path).await
    }

    /// Human-readable summary of the session's portfolio store
    #[inline]
    pub async fn portfolio_info(&self, session_id: &str) -> String {
        let path = store_path(&self.config, session_id);
        let lock = self.locks.lock_for(&path);
        let _guard = lock.read().await;

        let count = store::count(&path).await;
        if count == 0 {
            "No portfolio data available".to_string()
        } else {
            format!("Portfolio contains {} knowledge chunks", count)
        }
    }

    /// Generate a cold email for the session from a job URL or raw posting
    /// text, returning the extracted job info alongside the email
    #[inline]
    pub async fn generate_email(
        &self,
        job_input: &str,
        session_id: &str,
    ) -> Result<(JobInfo, String)> {
        let path = store_path(&self.config, session_id);
        let lock = self.locks.lock_for(&path);
        let _guard = lock.read().await;

        let generator = self.cache.get_or_create(&self.config, &path)?;
        generator.generate(job_input).await
    }

    /// Delete the session's store entirely; returns whether anything was
    /// removed. Idempotent.
    #[inline]
    pub async fn clear_portfolio(&self, session_id: &str) -> bool {
        let path = store_path(&self.config, session_id);
        let lock = self.locks.lock_for(&path);
        let _guard = lock.write().await;

        self.cache.invalidate(&path);
        debug!("Clearing portfolio for session {}", session_id);
        store::delete(&path)
    }
}
