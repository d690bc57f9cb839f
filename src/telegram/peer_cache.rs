//! Chat id to peer cache, filled by full dialog scans.
//!
//! Scans are serialized: concurrent lookups that miss the cache queue on the
//! scan guard and re-check the cache once they hold it, so a burst of lookups
//! at startup pages the dialog list once instead of once per caller.

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::Mutex;
use tracing::debug;

use super::TransportError;

#[derive(Debug)]
pub(crate) struct PeerCache<E> {
    entries: Mutex<HashMap<i64, E>>,
    scan_guard: Mutex<()>,
}

impl<E> Default for PeerCache<E> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            scan_guard: Mutex::new(()),
        }
    }
}

impl<E: Clone> PeerCache<E> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn get(&self, chat_id: i64) -> Option<E> {
        self.entries.lock().await.get(&chat_id).cloned()
    }

    /// Records scanned peers, replacing stale entries.
    pub(crate) async fn extend(&self, scanned: impl IntoIterator<Item = (i64, E)>) {
        self.entries.lock().await.extend(scanned);
    }

    /// Returns the cached peer for `chat_id`, running `scan` on a miss.
    ///
    /// At most one scan runs at a time. A scan error is returned to the
    /// caller that ran it; waiting callers then run their own scan.
    pub(crate) async fn resolve<F, Fut>(&self, chat_id: i64, scan: F) -> Result<E, TransportError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<(i64, E)>, TransportError>>,
    {
        if let Some(entity) = self.get(chat_id).await {
            return Ok(entity);
        }

        let _scanning = self.scan_guard.lock().await;

        // Filled by a scan that finished while we waited
        if let Some(entity) = self.get(chat_id).await {
            return Ok(entity);
        }

        debug!("Peer {} not cached, scanning dialogs", chat_id);
        let scanned = scan().await?;
        let found = scanned
            .iter()
            .find(|(id, _)| *id == chat_id)
            .map(|(_, entity)| entity.clone());
        self.extend(scanned).await;

        found.ok_or(TransportError::NotFound(chat_id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// A dialog list of `-100` and `-200` that takes a second to page through.
    async fn slow_scan(scans: Arc<AtomicUsize>) -> Result<Vec<(i64, &'static str)>, TransportError> {
        scans.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(vec![(-100, "alpha"), (-200, "beta")])
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_scan() {
        let cache = Arc::new(PeerCache::new());
        let scans = Arc::new(AtomicUsize::new(0));

        let mut lookups = tokio::task::JoinSet::new();
        for chat_id in [-100, -200, -100, -200, -100] {
            let cache = Arc::clone(&cache);
            let scans = Arc::clone(&scans);
            lookups.spawn(async move { cache.resolve(chat_id, || slow_scan(scans)).await });
        }

        while let Some(joined) = lookups.join_next().await {
            assert!(joined.unwrap().is_ok());
        }
        assert_eq!(scans.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(-200).await, Some("beta"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_chat_is_not_found() {
        let cache = PeerCache::new();
        let scans = Arc::new(AtomicUsize::new(0));

        let result = cache.resolve(999_999, || slow_scan(Arc::clone(&scans))).await;
        assert!(matches!(result, Err(TransportError::NotFound(999_999))));

        // The scan still filled the cache for the chats it saw
        assert_eq!(cache.resolve(-100, || slow_scan(Arc::clone(&scans))).await, Ok("alpha"));
        assert_eq!(scans.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_scan_is_retried_by_next_caller() {
        let cache: PeerCache<&str> = PeerCache::new();

        let result = cache
            .resolve(-100, || async { Err(TransportError::RateLimited(5)) })
            .await;
        assert_eq!(result, Err(TransportError::RateLimited(5)));

        let scans = Arc::new(AtomicUsize::new(0));
        assert_eq!(cache.resolve(-100, || slow_scan(Arc::clone(&scans))).await, Ok("alpha"));
        assert_eq!(scans.load(Ordering::SeqCst), 1);
    }
}
