/*!
 * Lease lock guarding one store directory.
 *
 * The `lock` sentinel is created atomically and holds a JSON lease naming
 * the holder and an expiry. A lease past its expiry belongs to a crashed
 * holder and may be taken over: the sentinel is first renamed aside, and
 * the takeover only goes ahead if the renamed file is still the expired
 * lease that was inspected. The guard removes the sentinel on drop.
 */

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::errors::{Result, StorageError};

pub const LOCK_FILE: &str = "lock";

/// Content of the lock sentinel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    fn new(lease_secs: u64) -> Self {
        let now = Utc::now();
        Self {
            holder: format!("{}@{}", Uuid::new_v4(), std::process::id()),
            acquired_at: now,
            expires_at: now + chrono::Duration::seconds(lease_secs as i64),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

enum Sentinel {
    Live(String),
    Stale { holder: String, text: String },
    Gone,
}

/// Held lock; released when dropped
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    lease: Lease,
}

impl LockGuard {
    /// Take the lock of the store rooted at `store_root`
    ///
    /// Fails with `LockConflict` while a live lease exists. An expired
    /// lease is replaced, once.
    pub fn acquire(store_root: &Path, lease_secs: u64) -> Result<Self> {
        let path = store_root.join(LOCK_FILE);
        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let lease = Lease::new(lease_secs);
                    file.write_all(serde_json::to_string(&lease)?.as_bytes())?;
                    file.sync_all()?;
                    debug!("Locked {:?} as {}", store_root, lease.holder);
                    return Ok(Self { path, lease });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    match inspect(&path, lease_secs)? {
                        Sentinel::Live(holder) => {
                            return Err(StorageError::LockConflict {
                                path: store_root.to_path_buf(),
                                holder,
                            });
                        }
                        Sentinel::Stale { holder, text } => {
                            warn!(
                                "Taking over expired lock on {:?} held by {}",
                                store_root, holder
                            );
                            if !claim_stale(&path, &text)? {
                                return Err(StorageError::LockConflict {
                                    path: store_root.to_path_buf(),
                                    holder: "unknown".to_string(),
                                });
                            }
                        }
                        Sentinel::Gone => {}
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StorageError::LockConflict {
            path: store_root.to_path_buf(),
            holder: "unknown".to_string(),
        })
    }

    pub fn lease(&self) -> &Lease {
        &self.lease
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Only remove the sentinel if it is still ours
        let ours = fs::read_to_string(&self.path)
            .ok()
            .and_then(|text| serde_json::from_str::<Lease>(&text).ok())
            .is_some_and(|lease| lease.holder == self.lease.holder);
        if ours {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!("Failed to release lock {:?}: {}", self.path, e);
            }
        }
    }
}

/// Whether a store currently has a live lock
pub fn is_locked(store_root: &Path, lease_secs: u64) -> Result<bool> {
    let path = store_root.join(LOCK_FILE);
    if !path.exists() {
        return Ok(false);
    }
    Ok(matches!(inspect(&path, lease_secs)?, Sentinel::Live(_)))
}

fn inspect(path: &Path, lease_secs: u64) -> Result<Sentinel> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        // Released between our create attempt and this read
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Sentinel::Gone),
        Err(e) => return Err(e.into()),
    };

    if let Ok(lease) = serde_json::from_str::<Lease>(&text) {
        return Ok(if lease.is_expired() {
            Sentinel::Stale {
                holder: lease.holder,
                text,
            }
        } else {
            Sentinel::Live(lease.holder)
        });
    }

    // Empty or foreign sentinel: judge it by age
    let modified = fs::metadata(path)?.modified()?;
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO);
    let holder = "unknown".to_string();
    if age > Duration::from_secs(lease_secs) {
        Ok(Sentinel::Stale { holder, text })
    } else {
        Ok(Sentinel::Live(holder))
    }
}

/// Move an expired sentinel out of the way
///
/// Returns `false` when the file found at `path` was no longer the one
/// inspected (another process took the lock over first); that file is put
/// back untouched.
fn claim_stale(path: &Path, seen: &str) -> Result<bool> {
    let claimed = path.with_file_name(format!("{}.stale.{}", LOCK_FILE, Uuid::new_v4()));
    match fs::rename(path, &claimed) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    }

    let text = fs::read_to_string(&claimed)?;
    if text == seen {
        fs::remove_file(&claimed)?;
        return Ok(true);
    }

    // hard_link never replaces a sentinel created in the meantime
    let restored = fs::hard_link(&claimed, path);
    fs::remove_file(&claimed)?;
    if let Err(e) = restored {
        warn!("Could not restore lock {:?} after a lost takeover: {}", path, e);
    }
    Ok(false)
}
