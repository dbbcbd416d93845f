//! Per-store expiration: maximum entry count and maximum entry age.

use super::format_timestamp;
use super::stores::Store;
use crate::Error;
use crate::http::{Request, Response};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// Bounds applied to a store after every write.
///
/// Either bound may be absent. Eviction is by write order (oldest first),
/// not by size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ExpirationPolicy {
    #[serde(default)]
    pub max_entries: Option<usize>,
    #[serde(default)]
    pub max_age_seconds: Option<u64>,
}

impl ExpirationPolicy {
    pub const fn none() -> Self {
        Self { max_entries: None, max_age_seconds: None }
    }

    pub const fn max_entries(n: usize) -> Self {
        Self { max_entries: Some(n), max_age_seconds: None }
    }

    pub const fn max_age(seconds: u64) -> Self {
        Self { max_entries: None, max_age_seconds: Some(seconds) }
    }

    pub const fn with_max_age(mut self, seconds: u64) -> Self {
        self.max_age_seconds = Some(seconds);
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_entries.is_none() && self.max_age_seconds.is_none()
    }

    /// Entries written before this instant are expired.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.max_age_seconds.map(|secs| {
            i64::try_from(secs)
                .ok()
                .and_then(Duration::try_seconds)
                .and_then(|age| now.checked_sub_signed(age))
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        })
    }
}

impl Store {
    /// Apply the policy now. Returns the number of evicted entries.
    pub async fn expire(&self, policy: &ExpirationPolicy) -> Result<u64, Error> {
        self.expire_at(policy, Utc::now()).await
    }

    /// Apply the policy as of `now`: drop entries older than the age bound,
    /// then trim the oldest writes until the count bound holds.
    pub async fn expire_at(&self, policy: &ExpirationPolicy, now: DateTime<Utc>) -> Result<u64, Error> {
        if policy.is_unbounded() {
            return Ok(0);
        }

        let store = self.name.clone();
        let cutoff = policy.cutoff(now).map(format_timestamp);
        let max_entries = policy.max_entries.map(|n| n as i64);

        let deleted = self
            .db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                let mut deleted = 0usize;

                if let Some(cutoff) = cutoff {
                    deleted += tx.execute(
                        "DELETE FROM cache_entries WHERE store = ?1 AND stored_at < ?2",
                        params![store, cutoff],
                    )?;
                }

                if let Some(max) = max_entries {
                    let count: i64 =
                        tx.query_row("SELECT COUNT(*) FROM cache_entries WHERE store = ?1", params![store], |row| {
                            row.get(0)
                        })?;
                    if count > max {
                        deleted += tx.execute(
                            "DELETE FROM cache_entries WHERE store = ?1 AND key_hash IN (
                                SELECT key_hash FROM cache_entries WHERE store = ?1 ORDER BY seq ASC LIMIT ?2
                            )",
                            params![store, count - max],
                        )?;
                    }
                }

                tx.commit()?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)?;

        if deleted > 0 {
            tracing::debug!(store = %self.name, deleted, "expired cache entries");
        }
        Ok(deleted)
    }

    /// Match that treats entries past the age bound as misses and drops them.
    pub async fn match_fresh(&self, request: &Request, policy: &ExpirationPolicy) -> Result<Option<Response>, Error> {
        let Some(entry) = self.entry(request).await? else {
            return Ok(None);
        };

        if let Some(cutoff) = policy.cutoff(Utc::now())
            && entry.stored_at < format_timestamp(cutoff)
        {
            tracing::debug!(store = %self.name, url = %entry.url, "cached entry past max age");
            self.delete(request).await?;
            return Ok(None);
        }

        Ok(Some(entry.response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheDb;
    use url::Url;

    fn get(path: &str) -> Request {
        Request::get(Url::parse(&format!("https://app.test{path}")).unwrap())
    }

    #[test]
    fn test_policy_constructors() {
        assert!(ExpirationPolicy::none().is_unbounded());
        assert!(ExpirationPolicy::default().is_unbounded());
        let p = ExpirationPolicy::max_entries(60).with_max_age(30 * 24 * 60 * 60);
        assert_eq!(p.max_entries, Some(60));
        assert_eq!(p.max_age_seconds, Some(2_592_000));
        assert!(!p.is_unbounded());
    }

    #[test]
    fn test_cutoff() {
        let now = Utc::now();
        assert_eq!(ExpirationPolicy::max_entries(5).cutoff(now), None);
        assert_eq!(ExpirationPolicy::max_age(60).cutoff(now), Some(now - Duration::seconds(60)));
    }

    #[tokio::test]
    async fn test_max_entries_evicts_oldest() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("pages").await.unwrap();
        let policy = ExpirationPolicy::max_entries(3);

        for i in 0..4 {
            store.put(&get(&format!("/p{i}")), &Response::new(200, "x")).await.unwrap();
            store.expire(&policy).await.unwrap();
        }

        assert_eq!(store.len().await.unwrap(), 3);
        assert!(store.match_request(&get("/p0")).await.unwrap().is_none());
        for i in 1..4 {
            assert!(store.match_request(&get(&format!("/p{i}"))).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_refreshed_entry_survives_eviction() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("pages").await.unwrap();

        store.put(&get("/a"), &Response::new(200, "a")).await.unwrap();
        store.put(&get("/b"), &Response::new(200, "b")).await.unwrap();
        store.put(&get("/a"), &Response::new(200, "a2")).await.unwrap();
        store.put(&get("/c"), &Response::new(200, "c")).await.unwrap();

        let deleted = store.expire(&ExpirationPolicy::max_entries(2)).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store.match_request(&get("/b")).await.unwrap().is_none());
        assert!(store.match_request(&get("/a")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_max_age_evicts_old_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("images").await.unwrap();
        let now = Utc::now();

        store
            .put_at(&get("/old.png"), &Response::new(200, "o"), None, now - Duration::days(31))
            .await
            .unwrap();
        store
            .put_at(&get("/new.png"), &Response::new(200, "n"), None, now - Duration::days(1))
            .await
            .unwrap();

        let deleted = store.expire_at(&ExpirationPolicy::max_age(30 * 24 * 60 * 60), now).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.urls().await.unwrap(), vec!["https://app.test/new.png"]);
    }

    #[tokio::test]
    async fn test_match_fresh_drops_stale_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("fonts").await.unwrap();
        let req = get("/inter.woff2");
        store
            .put_at(&req, &Response::new(200, "f"), None, Utc::now() - Duration::seconds(120))
            .await
            .unwrap();

        assert!(store.match_fresh(&req, &ExpirationPolicy::none()).await.unwrap().is_some());
        assert!(store.match_fresh(&req, &ExpirationPolicy::max_age(60)).await.unwrap().is_none());
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_unbounded_policy_is_noop() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("google-fonts-stylesheets").await.unwrap();
        store.put(&get("/css"), &Response::new(200, "x")).await.unwrap();
        assert_eq!(store.expire(&ExpirationPolicy::none()).await.unwrap(), 0);
        assert_eq!(store.len().await.unwrap(), 1);
    }
}
