//! Two-tier payload cache: an optional in-process map in front of one file
//! per key on disk.
//!
//! Payloads are stored verbatim (the raw JSON as received), so the cache
//! directory can be inspected or primed by hand. Entries are never evicted;
//! staleness is decided by age against a TTL at read time.
//!
//! An unreadable cache file is a miss, never an error.

use crate::domain::error::AdvisorError;
use crate::ports::clock_port::ClockPort;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

pub const CURRENT_PRICES_KEY: &str = "current_prices";

pub fn historical_key(coin_id: &str, days: u32) -> String {
    format!("{coin_id}_hist_{days}")
}

pub fn historical_batch_key(days: u32) -> String {
    format!("historical_prices_{days}")
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: String,
    written_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub payload: String,
    pub age: Duration,
}

pub struct Cache {
    dir: PathBuf,
    ttl: Duration,
    memory: Option<RwLock<HashMap<String, CacheEntry>>>,
    clock: Arc<dyn ClockPort>,
}

impl Cache {
    /// Disk-only cache.
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration, clock: Arc<dyn ClockPort>) -> Self {
        Self {
            dir: dir.into(),
            ttl,
            memory: None,
            clock,
        }
    }

    /// Adds a session-local memory tier; `put` then writes through to both.
    pub fn with_memory_tier(mut self) -> Self {
        self.memory = Some(RwLock::new(HashMap::new()));
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn has_memory_tier(&self) -> bool {
        self.memory.is_some()
    }

    /// Deterministic file name for a key; characters outside `[A-Za-z0-9._-]` become `_`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    pub fn get(&self, key: &str) -> Option<CacheHit> {
        let now = self.clock.now();

        if let Some(memory) = &self.memory {
            if let Some(entry) = memory.read().get(key) {
                debug!(key, "memory cache hit");
                return Some(CacheHit {
                    payload: entry.payload.clone(),
                    age: age_since(now, entry.written_at),
                });
            }
        }

        let entry = self.read_disk(key)?;
        debug!(key, "disk cache hit");
        let hit = CacheHit {
            payload: entry.payload.clone(),
            age: age_since(now, entry.written_at),
        };
        if let Some(memory) = &self.memory {
            memory.write().insert(key.to_string(), entry);
        }
        Some(hit)
    }

    /// Returns the entry only if it is no older than this cache's TTL.
    pub fn get_fresh(&self, key: &str) -> Option<CacheHit> {
        self.get(key).filter(|hit| hit.age <= self.ttl)
    }

    /// Missing entries count as expired.
    pub fn is_expired(&self, key: &str, ttl: Duration) -> bool {
        match self.get(key) {
            Some(hit) => hit.age > ttl,
            None => true,
        }
    }

    /// Writes through to memory (if present) and disk. The memory tier is
    /// updated even when the disk write fails.
    pub fn put(&self, key: &str, payload: &str) -> Result<(), AdvisorError> {
        if let Some(memory) = &self.memory {
            memory.write().insert(
                key.to_string(),
                CacheEntry {
                    payload: payload.to_string(),
                    written_at: self.clock.now(),
                },
            );
        }

        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension(format!(
            "json.{}.{}.tmp",
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, payload)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Drops a key from the memory tier only, e.g. after it decoded as corrupt.
    pub fn forget(&self, key: &str) {
        if let Some(memory) = &self.memory {
            memory.write().remove(key);
        }
    }

    fn read_disk(&self, key: &str) -> Option<CacheEntry> {
        let path = self.path_for(key);
        let payload = match fs::read_to_string(&path) {
            Ok(p) => p,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(key, path = %path.display(), error = %e, "unreadable cache file, treating as miss");
                return None;
            }
        };

        let written_at = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => DateTime::<Utc>::from(modified),
            Err(e) => {
                warn!(key, error = %e, "cache file has no modification time, treating as miss");
                return None;
            }
        };

        Some(CacheEntry {
            payload,
            written_at,
        })
    }
}

fn age_since(now: DateTime<Utc>, then: DateTime<Utc>) -> Duration {
    now.signed_duration_since(then).max(Duration::zero())
}
