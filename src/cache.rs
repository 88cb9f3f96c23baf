use std::cell::Cell;
use std::env;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection};

use crate::document::{sha256_hex, Document};
use crate::rank::{extract_pairwise_response, RankError, Ranker, Winner};

pub const DEFAULT_CACHE_PATH: &str = "rank-files-cache.sqlite3";

pub fn default_cache_path() -> PathBuf {
    env::var("RANK_FILES_CACHE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CACHE_PATH))
}

/// Sqlite-backed key/value store for judgments that are expensive to repeat.
pub struct Cache {
    conn: Connection,
    total_hits: Cell<u64>,
}

impl Cache {
    /// Open or create a cache database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS cache_entry \
             (entry_key TEXT PRIMARY KEY, entry_value TEXT, timestamp INTEGER)",
            [],
        )?;
        Ok(Self {
            conn,
            total_hits: Cell::new(0),
        })
    }

    pub fn open_default() -> Result<Self, rusqlite::Error> {
        Self::open(default_cache_path())
    }

    pub fn put(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.conn.execute(
            "INSERT OR REPLACE INTO cache_entry (entry_key, entry_value, timestamp) \
             VALUES (?1, ?2, ?3)",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn fetch(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT entry_value FROM cache_entry WHERE entry_key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => {
                self.total_hits.set(self.total_hits.get() + 1);
                Ok(Some(row.get(0)?))
            }
            None => Ok(None),
        }
    }

    /// Fetches that found an entry since this cache was opened.
    pub fn total_hits(&self) -> u64 {
        self.total_hits.get()
    }
}

/// Ranker wrapper that reuses judgments keyed by criteria and content
/// digests, so a repeated pairing never pays for a second remote call.
///
/// Keys are `pairwise-v1:{sha256(criteria)}:{digest(first)}:{digest(second)}`;
/// the stored value is the same "1"/"2" token the remote judge produces, and
/// a corrupt entry fails exactly like a malformed remote response.
pub struct CachedRanker {
    inner: Box<dyn Ranker>,
    cache: Cache,
}

impl CachedRanker {
    pub fn new(inner: Box<dyn Ranker>, cache: Cache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    fn entry_key(
        criteria: &str,
        first: &dyn Document,
        second: &dyn Document,
    ) -> Result<String, RankError> {
        Ok(format!(
            "pairwise-v1:{}:{}:{}",
            sha256_hex(criteria.as_bytes()),
            first.digest()?,
            second.digest()?
        ))
    }
}

impl Ranker for CachedRanker {
    fn choose_better(
        &self,
        criteria: &str,
        first: &dyn Document,
        second: &dyn Document,
    ) -> Result<Winner, RankError> {
        let key = Self::entry_key(criteria, first, second)?;
        if let Some(value) = self.cache.fetch(&key)? {
            return extract_pairwise_response(first, second, &value);
        }
        let winner = self.inner.choose_better(criteria, first, second)?;
        let token = match winner {
            Winner::First => "1",
            Winner::Second => "2",
        };
        self.cache.put(&key, token)?;
        Ok(winner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::StrDocument;
    use std::fs;
    use std::rc::Rc;

    fn temp_cache(name: &str) -> (PathBuf, Cache) {
        let path = env::temp_dir().join(format!("rank-files-{}-{}.sqlite3", name, process_id()));
        let _ = fs::remove_file(&path);
        let cache = Cache::open(&path).unwrap();
        (path, cache)
    }

    fn process_id() -> u32 {
        std::process::id()
    }

    #[test]
    fn test_put_fetch_round_trip() {
        let (path, cache) = temp_cache("round-trip");
        assert_eq!(cache.fetch("missing").unwrap(), None);
        assert_eq!(cache.total_hits(), 0);
        cache.put("k", "1").unwrap();
        assert_eq!(cache.fetch("k").unwrap().as_deref(), Some("1"));
        cache.put("k", "2").unwrap();
        assert_eq!(cache.fetch("k").unwrap().as_deref(), Some("2"));
        assert_eq!(cache.total_hits(), 2);
        let _ = fs::remove_file(path);
    }

    /// Counts how often the wrapped judge actually runs.
    struct CountingRanker {
        calls: Rc<Cell<u64>>,
    }

    impl Ranker for CountingRanker {
        fn choose_better(
            &self,
            _criteria: &str,
            first: &dyn Document,
            second: &dyn Document,
        ) -> Result<Winner, RankError> {
            self.calls.set(self.calls.get() + 1);
            if first.read_text()? >= second.read_text()? {
                Ok(Winner::First)
            } else {
                Ok(Winner::Second)
            }
        }
    }

    #[test]
    fn test_cached_ranker_skips_repeat_judgments() {
        let (path, cache) = temp_cache("cached-ranker");
        let calls = Rc::new(Cell::new(0));
        let ranker = CachedRanker::new(
            Box::new(CountingRanker {
                calls: Rc::clone(&calls),
            }),
            cache,
        );
        let first = StrDocument::new("alpha");
        let second = StrDocument::new("beta");

        assert_eq!(
            ranker.choose_better("crit", &first, &second).unwrap(),
            Winner::Second
        );
        assert_eq!(calls.get(), 1);

        assert_eq!(
            ranker.choose_better("crit", &first, &second).unwrap(),
            Winner::Second
        );
        assert_eq!(calls.get(), 1);
        assert_eq!(ranker.cache().total_hits(), 1);

        // A different criteria is a different key.
        assert_eq!(
            ranker.choose_better("other", &first, &second).unwrap(),
            Winner::Second
        );
        assert_eq!(calls.get(), 2);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_corrupt_entry_fails_like_a_bad_response() {
        let (path, cache) = temp_cache("corrupt");
        let calls = Rc::new(Cell::new(0));
        let first = StrDocument::new("alpha");
        let second = StrDocument::new("beta");
        let key = CachedRanker::entry_key("crit", &first, &second).unwrap();
        cache.put(&key, "maybe").unwrap();

        let ranker = CachedRanker::new(
            Box::new(CountingRanker {
                calls: Rc::clone(&calls),
            }),
            cache,
        );
        let err = ranker.choose_better("crit", &first, &second).unwrap_err();
        assert!(matches!(err, RankError::InvalidResponse { .. }));
        assert_eq!(calls.get(), 0);
        let _ = fs::remove_file(path);
    }
}
