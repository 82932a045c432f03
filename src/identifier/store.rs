//! Set-code listing: fetched from the remote catalogue at most once per
//! refresh window and cached on disk.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::vocabulary::SetCodeVocabulary;
use crate::config::VocabularyConfig;
use crate::log;

/// On-disk cache of the set listing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedSetList {
    pub fetched_at: DateTime<Utc>,
    pub codes: Vec<String>,
}

impl CachedSetList {
    pub fn is_fresh(&self, now: DateTime<Utc>, refresh_hours: i64) -> bool {
        now.signed_duration_since(self.fetched_at) < Duration::hours(refresh_hours)
    }
}

#[derive(Deserialize)]
struct SetListing {
    data: Vec<SetEntry>,
}

#[derive(Deserialize)]
struct SetEntry {
    code: String,
}

/// Extracts the set codes from the catalogue's JSON listing.
pub fn parse_set_listing(json: &str) -> Result<Vec<String>> {
    let listing: SetListing = serde_json::from_str(json).context("Unexpected set listing format")?;
    Ok(listing.data.into_iter().map(|entry| entry.code).collect())
}

/// Returns the default cache file: `<user cache dir>/cardscan/set_codes.json`
pub fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cardscan")
        .join("set_codes.json")
}

pub struct VocabularyStore {
    cache_path: PathBuf,
    config: VocabularyConfig,
}

impl VocabularyStore {
    pub fn new(cache_path: PathBuf, config: VocabularyConfig) -> Self {
        Self { cache_path, config }
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn read_cache(&self) -> Result<Option<CachedSetList>> {
        if !self.cache_path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.cache_path)
            .with_context(|| format!("Failed to read {}", self.cache_path.display()))?;
        let cached = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", self.cache_path.display()))?;
        Ok(Some(cached))
    }

    pub fn write_cache(&self, cached: &CachedSetList) -> Result<()> {
        if let Some(parent) = self.cache_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(cached)?;
        fs::write(&self.cache_path, json)
            .with_context(|| format!("Failed to write {}", self.cache_path.display()))?;
        Ok(())
    }

    /// Downloads the current set listing.
    pub fn fetch_remote(&self) -> Result<Vec<String>> {
        log(&format!("Fetching set listing from {}", self.config.source_url));

        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(self.config.request_timeout_secs))
            .build()?;

        let response = client
            .get(&self.config.source_url)
            .header("User-Agent", "cardscan")
            .header("Accept", "application/json")
            .send()?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Failed to download set listing: HTTP {}",
                response.status()
            ));
        }

        let codes = parse_set_listing(&response.text()?)?;
        log(&format!("Downloaded {} set codes", codes.len()));
        Ok(codes)
    }

    /// Loads the vocabulary, refreshing from the network when the cache is
    /// stale (unless `offline`).
    pub fn load(&self, offline: bool) -> SetCodeVocabulary {
        if offline {
            self.load_with(Utc::now(), || Err(anyhow!("offline mode")))
        } else {
            self.load_with(Utc::now(), || self.fetch_remote())
        }
    }

    /// Cache policy with an injectable clock and fetcher.
    ///
    /// A fresh cache is used as is. Otherwise the listing is fetched and the
    /// cache rewritten; if that fails a stale cache is still better than
    /// nothing. With neither, the vocabulary is empty and no scan can parse.
    pub fn load_with<F>(&self, now: DateTime<Utc>, fetch: F) -> SetCodeVocabulary
    where
        F: FnOnce() -> Result<Vec<String>>,
    {
        let cached = match self.read_cache() {
            Ok(cached) => cached,
            Err(e) => {
                log(&format!("Ignoring unreadable set code cache: {:#}", e));
                None
            }
        };

        if let Some(cached) = &cached {
            if cached.is_fresh(now, self.config.refresh_hours) {
                log(&format!(
                    "Using cached set codes ({} codes, fetched {})",
                    cached.codes.len(),
                    cached.fetched_at.format("%Y-%m-%d %H:%M")
                ));
                return build_or_empty(&cached.codes);
            }
        }

        match fetch() {
            Ok(codes) => {
                let fresh = CachedSetList {
                    fetched_at: now,
                    codes,
                };
                if let Err(e) = self.write_cache(&fresh) {
                    log(&format!("Failed to cache set codes: {:#}", e));
                }
                build_or_empty(&fresh.codes)
            }
            Err(e) => match cached {
                Some(stale) => {
                    log(&format!(
                        "Set listing refresh failed ({:#}); using stale cache from {}",
                        e,
                        stale.fetched_at.format("%Y-%m-%d %H:%M")
                    ));
                    build_or_empty(&stale.codes)
                }
                None => {
                    log(&format!(
                        "Set listing unavailable ({:#}); identifiers cannot be parsed",
                        e
                    ));
                    SetCodeVocabulary::empty()
                }
            },
        }
    }

    /// Forces a refetch regardless of cache age.
    pub fn refresh(&self) -> Result<SetCodeVocabulary> {
        let codes = self.fetch_remote()?;
        let fresh = CachedSetList {
            fetched_at: Utc::now(),
            codes,
        };
        self.write_cache(&fresh)?;
        SetCodeVocabulary::new(&fresh.codes)
    }
}

fn build_or_empty(codes: &[String]) -> SetCodeVocabulary {
    SetCodeVocabulary::new(codes).unwrap_or_else(|e| {
        log(&format!("Failed to build set code matcher: {:#}", e));
        SetCodeVocabulary::empty()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::tempdir;

    const LISTING: &str = r#"{
        "object": "list",
        "has_more": false,
        "data": [
            { "object": "set", "code": "fdn", "name": "Foundations" },
            { "object": "set", "code": "mkm", "name": "Murders at Karlov Manor" }
        ]
    }"#;

    fn store_in(dir: &Path) -> VocabularyStore {
        VocabularyStore::new(dir.join("cache").join("sets.json"), VocabularyConfig::default())
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_parse_set_listing() {
        assert_eq!(parse_set_listing(LISTING).unwrap(), vec!["fdn", "mkm"]);
        assert!(parse_set_listing("{}").is_err());
    }

    #[test]
    fn test_freshness_window() {
        let cached = CachedSetList {
            fetched_at: now() - Duration::hours(23),
            codes: vec![],
        };
        assert!(cached.is_fresh(now(), 24));
        assert!(!cached.is_fresh(now() + Duration::hours(2), 24));
    }

    #[test]
    fn test_fetches_and_caches_when_no_cache() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let vocab = store.load_with(now(), || parse_set_listing(LISTING));
        assert_eq!(vocab.codes(), &["FDN", "MKM"]);

        let cached = store.read_cache().unwrap().unwrap();
        assert_eq!(cached.fetched_at, now());
        assert_eq!(cached.codes, vec!["fdn", "mkm"]);
    }

    #[test]
    fn test_fresh_cache_skips_fetch() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .write_cache(&CachedSetList {
                fetched_at: now() - Duration::hours(1),
                codes: vec!["DSK".to_string()],
            })
            .unwrap();

        let fetched = Cell::new(false);
        let vocab = store.load_with(now(), || {
            fetched.set(true);
            Ok(vec!["FDN".to_string()])
        });
        assert!(!fetched.get());
        assert_eq!(vocab.codes(), &["DSK"]);
    }

    #[test]
    fn test_stale_cache_is_refreshed() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .write_cache(&CachedSetList {
                fetched_at: now() - Duration::hours(30),
                codes: vec!["DSK".to_string()],
            })
            .unwrap();

        let vocab = store.load_with(now(), || Ok(vec!["FDN".to_string()]));
        assert_eq!(vocab.codes(), &["FDN"]);
        assert_eq!(store.read_cache().unwrap().unwrap().fetched_at, now());
    }

    #[test]
    fn test_stale_cache_used_when_fetch_fails() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .write_cache(&CachedSetList {
                fetched_at: now() - Duration::hours(30),
                codes: vec!["DSK".to_string()],
            })
            .unwrap();

        let vocab = store.load_with(now(), || Err(anyhow!("network down")));
        assert_eq!(vocab.codes(), &["DSK"]);
    }

    #[test]
    fn test_nothing_available_gives_empty_vocabulary() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let vocab = store.load_with(now(), || Err(anyhow!("network down")));
        assert!(vocab.is_empty());
        assert!(store.read_cache().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_cache_is_ignored() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        fs::create_dir_all(store.cache_path().parent().unwrap()).unwrap();
        fs::write(store.cache_path(), "garbage").unwrap();

        let vocab = store.load_with(now(), || Ok(vec!["MKM".to_string()]));
        assert_eq!(vocab.codes(), &["MKM"]);
    }
}
