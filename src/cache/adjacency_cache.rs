//! Directory-backed adjacency cache.
//!
//! One pretty-printed JSON array of link titles per article, named by
//! [`cache_file_name`]. Records are written once and never rewritten; a record
//! is replaced on disk only by external deletion of the directory.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::task;

use crate::cache::LinkMemoryCache;
use crate::error::{Result, WikirouteError};
use crate::title::{cache_file_name, normalize_title, RECORD_EXTENSION};

/// Number of lock shards. Shards are picked by record file name, so titles
/// sharing a file always share a lock.
const LOCK_SHARDS: usize = 64;

/// Summary of the records currently in the cache directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub records: usize,
    pub total_links: usize,
    /// Files with the record extension that failed to parse.
    pub corrupt: usize,
}

struct Inner {
    dir: PathBuf,
    shards: Vec<Mutex<()>>,
    memory: Option<LinkMemoryCache>,
}

/// Persistent, write-once title -> links store shared by all fetch workers.
///
/// Cloning is cheap and every clone sees the same directory, locks and memory tier.
#[derive(Clone)]
pub struct AdjacencyCache {
    inner: Arc<Inner>,
}

impl AdjacencyCache {
    /// Open (creating if absent) the cache directory.
    ///
    /// `memory_capacity` bounds the in-memory LRU tier; 0 disables it.
    pub fn open<P: AsRef<Path>>(dir: P, memory_capacity: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| {
            WikirouteError::Cache(format!("cannot create {}: {}", dir.display(), e))
        })?;

        let memory = (memory_capacity > 0).then(|| LinkMemoryCache::new(memory_capacity));

        Ok(Self {
            inner: Arc::new(Inner {
                dir,
                shards: (0..LOCK_SHARDS).map(|_| Mutex::new(())).collect(),
                memory,
            }),
        })
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Path of the record file for `title`
    pub fn record_path(&self, title: &str) -> PathBuf {
        self.inner.dir.join(cache_file_name(&normalize_title(title)))
    }

    /// Look up the stored links for `title`. `Ok(None)` is a miss.
    pub async fn get(&self, title: &str) -> Result<Option<Arc<Vec<String>>>> {
        let title = normalize_title(title);

        if let Some(memory) = &self.inner.memory {
            if let Some(links) = memory.get(&title) {
                return Ok(Some(links));
            }
        }

        let inner = Arc::clone(&self.inner);
        task::spawn_blocking(move || -> Result<Option<Arc<Vec<String>>>> {
            let file_name = cache_file_name(&title);
            let path = inner.dir.join(&file_name);
            let found = {
                let _guard = inner.shard(&file_name).lock().unwrap();
                read_record(&path)?
            };

            Ok(found.map(|links| {
                let links = Arc::new(links);
                if let Some(memory) = &inner.memory {
                    memory.put(title, Arc::clone(&links));
                }
                links
            }))
        })
        .await
        .map_err(|e| WikirouteError::Cache(format!("cache read task failed: {}", e)))?
    }

    /// Store the links for `title` unless a record already exists.
    ///
    /// Returns `true` when this call wrote the record. Repeated calls for the
    /// same title are no-ops, so the first stored list is the one every later
    /// `get` sees.
    pub async fn put(&self, title: &str, links: &[String]) -> Result<bool> {
        let title = normalize_title(title);
        let links = Arc::new(links.to_vec());

        let inner = Arc::clone(&self.inner);
        task::spawn_blocking(move || -> Result<bool> {
            let file_name = cache_file_name(&title);
            let path = inner.dir.join(&file_name);
            let _guard = inner.shard(&file_name).lock().unwrap();

            if path.exists() {
                log::debug!("Cache record for '{}' already present, keeping it", title);
                return Ok(false);
            }

            write_record(&path, &links)?;
            if let Some(memory) = &inner.memory {
                memory.put(title, links);
            }
            Ok(true)
        })
        .await
        .map_err(|e| WikirouteError::Cache(format!("cache write task failed: {}", e)))?
    }

    /// Scan the cache directory and summarize its records
    pub async fn stats(&self) -> Result<CacheStats> {
        let dir = self.inner.dir.clone();
        task::spawn_blocking(move || -> Result<CacheStats> {
            let mut stats = CacheStats::default();
            let entries = std::fs::read_dir(&dir).map_err(|e| cache_io(&dir, e))?;

            for entry in entries {
                let path = entry.map_err(|e| cache_io(&dir, e))?.path();
                if !is_record_file(&path) {
                    continue;
                }
                match read_record(&path) {
                    Ok(Some(links)) => {
                        stats.records += 1;
                        stats.total_links += links.len();
                    }
                    Ok(None) => {}
                    Err(e) => {
                        log::warn!("{}", e);
                        stats.corrupt += 1;
                    }
                }
            }
            Ok(stats)
        })
        .await
        .map_err(|e| WikirouteError::Cache(format!("cache scan task failed: {}", e)))?
    }
}

impl Inner {
    fn shard(&self, file_name: &str) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        file_name.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }
}

fn cache_io(path: &Path, err: std::io::Error) -> WikirouteError {
    WikirouteError::Cache(format!("{}: {}", path.display(), err))
}

fn is_record_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(true, |n| n.starts_with('.'));
    !hidden && path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION)
}

fn read_record(path: &Path) -> Result<Option<Vec<String>>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(cache_io(path, e)),
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| WikirouteError::Cache(format!("corrupt record {}: {}", path.display(), e)))
}

/// Write via a hidden temp file + rename so no reader, in this process or
/// another, ever sees a half-written record.
fn write_record(path: &Path, links: &[String]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| WikirouteError::Cache(format!("bad record path {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

    let body = serde_json::to_string_pretty(links)?;
    std::fs::write(&tmp, body).map_err(|e| cache_io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        cache_io(path, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn titles(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_open_creates_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested").join("wikicache");
        let cache = AdjacencyCache::open(&dir, 0).unwrap();
        assert!(dir.is_dir());
        assert_eq!(cache.dir(), dir.as_path());
    }

    #[tokio::test]
    async fn test_get_miss() {
        let temp = TempDir::new().unwrap();
        let cache = AdjacencyCache::open(temp.path(), 8).unwrap();
        assert!(cache.get("Appel").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_round_trip_across_fresh_instances() {
        let temp = TempDir::new().unwrap();
        let links = titles(&["Zebra", "Apple", "Mango", "Apple tree"]);

        {
            let cache = AdjacencyCache::open(temp.path(), 8).unwrap();
            assert!(cache.put("Fruit", &links).await.unwrap());
        }

        // No shared memory tier: this reads the file written above
        let reopened = AdjacencyCache::open(temp.path(), 0).unwrap();
        let stored = reopened.get("Fruit").await.unwrap().unwrap();
        assert_eq!(stored.as_slice(), links.as_slice());
    }

    #[tokio::test]
    async fn test_record_is_human_readable_json_array() {
        let temp = TempDir::new().unwrap();
        let cache = AdjacencyCache::open(temp.path(), 0).unwrap();
        cache.put("AC/DC", &titles(&["Rock music"])).await.unwrap();

        let path = temp.path().join("AC_DC.json");
        assert_eq!(cache.record_path("AC/DC"), path);
        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<String> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, vec!["Rock music"]);
        assert!(content.contains('\n'));
    }

    #[tokio::test]
    async fn test_empty_list_is_a_hit() {
        let temp = TempDir::new().unwrap();
        let cache = AdjacencyCache::open(temp.path(), 0).unwrap();
        cache.put("Orphan", &[]).await.unwrap();
        let stored = cache.get("Orphan").await.unwrap();
        assert_eq!(stored.map(|l| l.len()), Some(0));
    }

    #[tokio::test]
    async fn test_put_is_write_once() {
        let temp = TempDir::new().unwrap();
        let cache = AdjacencyCache::open(temp.path(), 8).unwrap();

        assert!(cache.put("Banaan", &titles(&["Fruit"])).await.unwrap());
        assert!(!cache.put("Banaan", &titles(&["Something else"])).await.unwrap());

        let stored = cache.get("Banaan").await.unwrap().unwrap();
        assert_eq!(stored.as_slice(), ["Fruit"]);

        let fresh = AdjacencyCache::open(temp.path(), 0).unwrap();
        assert_eq!(fresh.get("Banaan").await.unwrap().unwrap().as_slice(), ["Fruit"]);
    }

    #[tokio::test]
    async fn test_keys_are_normalized() {
        let temp = TempDir::new().unwrap();
        let cache = AdjacencyCache::open(temp.path(), 0).unwrap();
        cache.put("new_york", &titles(&["USA"])).await.unwrap();
        assert!(cache.get("New york").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_an_error() {
        let temp = TempDir::new().unwrap();
        let cache = AdjacencyCache::open(temp.path(), 0).unwrap();
        std::fs::write(cache.record_path("Broken"), "[\"unterminated").unwrap();

        let err = cache.get("Broken").await.unwrap_err();
        assert!(matches!(err, WikirouteError::Cache(_)));
    }

    #[tokio::test]
    async fn test_concurrent_puts_same_title() {
        let temp = TempDir::new().unwrap();
        let cache = AdjacencyCache::open(temp.path(), 0).unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.put("Contested", &[format!("Link {}", i)]).await.unwrap()
            }));
        }
        let mut written = 0;
        for handle in handles {
            if handle.await.unwrap() {
                written += 1;
            }
        }

        assert_eq!(written, 1);
        let stored = cache.get("Contested").await.unwrap().unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].starts_with("Link "));
    }

    #[tokio::test]
    async fn test_concurrent_puts_of_colliding_file_names() {
        for _ in 0..50 {
            let temp = TempDir::new().unwrap();
            let cache = AdjacencyCache::open(temp.path(), 0).unwrap();

            let mut handles = Vec::new();
            for title in ["AC/DC", "AC:DC", "AC*DC", "AC|DC"] {
                let cache = cache.clone();
                handles.push(tokio::spawn(async move {
                    cache.put(title, &[format!("From {}", title)]).await
                }));
            }
            let mut written = 0;
            for handle in handles {
                if handle.await.unwrap().unwrap() {
                    written += 1;
                }
            }

            assert_eq!(written, 1);
            let stored = cache.get("AC:DC").await.unwrap().unwrap();
            assert_eq!(stored.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_stats() {
        let temp = TempDir::new().unwrap();
        let cache = AdjacencyCache::open(temp.path(), 0).unwrap();
        cache.put("A", &titles(&["B", "C"])).await.unwrap();
        cache.put("B", &titles(&["C"])).await.unwrap();
        cache.put("C", &[]).await.unwrap();
        std::fs::write(temp.path().join("junk.json"), "{").unwrap();
        std::fs::write(temp.path().join("notes.txt"), "ignored").unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(
            stats,
            CacheStats {
                records: 3,
                total_links: 3,
                corrupt: 1,
            }
        );
    }
}
