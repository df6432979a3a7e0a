//! Synthesized-audio cache with per-key single-flight.
//!
//! The key is a digest of the exact answer text and language, so repeated
//! questions re-serve the same clip without another synthesis call.
//! Concurrent misses on one key share a single synthesis via the slot's
//! `OnceCell`; distinct keys never contend. Filled slots are immutable.
//! Eviction is by capacity (oldest filled slots first) and optional age,
//! and never removes a slot whose synthesis is still running. A failed
//! synthesis leaves its slot empty so a later request can retry.

use anyhow::Result;
use bytes::Bytes;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

use crate::language::LanguageCode;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TtsKey([u8; 32]);

impl TtsKey {
    fn new(text: &str, language: LanguageCode) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(language.tag().as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Short hex prefix for log lines.
    fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

struct Slot {
    audio: OnceCell<Bytes>,
    created_at: Instant,
}

pub struct TtsCache {
    slots: Mutex<HashMap<TtsKey, Arc<Slot>>>,
    capacity: usize,
    max_age: Option<Duration>,
}

impl TtsCache {
    /// `capacity` of 0 means unbounded; `max_age` of None disables age
    /// eviction.
    pub fn new(capacity: usize, max_age: Option<Duration>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            capacity,
            max_age,
        }
    }

    /// Return the cached audio for `(text, language)`, running `synth` on a
    /// miss. Concurrent callers with the same key share one `synth` run.
    pub async fn get_or_synthesize<F, Fut>(
        &self,
        text: &str,
        language: LanguageCode,
        synth: F,
    ) -> Result<Bytes>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes>>,
    {
        let key = TtsKey::new(text, language);

        // Grab or create the slot under the map lock; the synthesis itself
        // runs outside it.
        let slot = {
            let mut slots = self.slots.lock();
            self.evict_aged(&mut slots);
            let slot = slots
                .entry(key.clone())
                .or_insert_with(|| {
                    Arc::new(Slot {
                        audio: OnceCell::new(),
                        created_at: Instant::now(),
                    })
                })
                .clone();
            self.evict_over_capacity(&mut slots);
            slot
        };

        let result = slot
            .audio
            .get_or_try_init(|| async {
                tracing::debug!("Synthesizing audio for key {}", key.short());
                synth().await
            })
            .await;

        match result {
            Ok(audio) => Ok(audio.clone()),
            Err(e) => {
                // Drop the empty slot so the failure doesn't pin a map entry,
                // unless another caller already replaced or filled it.
                let mut slots = self.slots.lock();
                if let Some(existing) = slots.get(&key) {
                    if Arc::ptr_eq(existing, &slot) && existing.audio.get().is_none() {
                        slots.remove(&key);
                    }
                }
                Err(e)
            }
        }
    }

    /// Number of slots, filled or in flight.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Whether a completed clip is cached for this text and language.
    pub fn contains(&self, text: &str, language: LanguageCode) -> bool {
        let key = TtsKey::new(text, language);
        self.slots
            .lock()
            .get(&key)
            .map(|slot| slot.audio.get().is_some())
            .unwrap_or(false)
    }

    fn evict_aged(&self, slots: &mut HashMap<TtsKey, Arc<Slot>>) {
        let Some(max_age) = self.max_age else {
            return;
        };
        slots.retain(|_, slot| {
            slot.audio.get().is_none() || slot.created_at.elapsed() <= max_age
        });
    }

    fn evict_over_capacity(&self, slots: &mut HashMap<TtsKey, Arc<Slot>>) {
        if self.capacity == 0 || slots.len() <= self.capacity {
            return;
        }

        // Oldest filled slots go first; in-flight slots are untouchable, so
        // the map can transiently exceed capacity while syntheses overlap.
        let mut filled: Vec<(TtsKey, Instant)> = slots
            .iter()
            .filter(|(_, slot)| slot.audio.get().is_some())
            .map(|(key, slot)| (key.clone(), slot.created_at))
            .collect();
        filled.sort_by_key(|(_, created_at)| *created_at);

        for (key, _) in filled {
            if slots.len() <= self.capacity {
                break;
            }
            slots.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_synth(
        count: Arc<AtomicUsize>,
        audio: &'static [u8],
    ) -> impl FnOnce() -> std::pin::Pin<Box<dyn Future<Output = Result<Bytes>> + Send>> {
        move || {
            Box::pin(async move {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(Bytes::from_static(audio))
            })
        }
    }

    #[tokio::test]
    async fn test_second_lookup_hits_without_synthesis() {
        let cache = TtsCache::new(8, None);
        let count = Arc::new(AtomicUsize::new(0));

        let a = cache
            .get_or_synthesize("hello", LanguageCode::En, counting_synth(count.clone(), b"mp3"))
            .await
            .unwrap();
        let b = cache
            .get_or_synthesize("hello", LanguageCode::En, counting_synth(count.clone(), b"mp3"))
            .await
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_coalesce_to_one_synthesis() {
        let cache = Arc::new(TtsCache::new(8, None));
        let count = Arc::new(AtomicUsize::new(0));

        let slow = |count: Arc<AtomicUsize>| {
            move || async move {
                count.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(Bytes::from_static(b"clip"))
            }
        };

        let c1 = cache.clone();
        let n1 = count.clone();
        let t1 = tokio::spawn(async move {
            c1.get_or_synthesize("same answer", LanguageCode::Hi, slow(n1)).await
        });
        let c2 = cache.clone();
        let n2 = count.clone();
        let t2 = tokio::spawn(async move {
            c2.get_or_synthesize("same answer", LanguageCode::Hi, slow(n2)).await
        });

        let a = t1.await.unwrap().unwrap();
        let b = t2.await.unwrap().unwrap();

        assert_eq!(a, b);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_coalesce() {
        let cache = TtsCache::new(8, None);
        let count = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_synthesize("answer", LanguageCode::En, counting_synth(count.clone(), b"en"))
            .await
            .unwrap();
        // Same text, different language: a different clip.
        cache
            .get_or_synthesize("answer", LanguageCode::Ta, counting_synth(count.clone(), b"ta"))
            .await
            .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_synthesis_is_not_cached() {
        let cache = TtsCache::new(8, None);
        let count = Arc::new(AtomicUsize::new(0));

        let n = count.clone();
        let err = cache
            .get_or_synthesize("flaky", LanguageCode::En, move || async move {
                n.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("backend down")
            })
            .await;
        assert!(err.is_err());
        assert!(cache.is_empty());

        // A later request retries and succeeds.
        let ok = cache
            .get_or_synthesize("flaky", LanguageCode::En, counting_synth(count.clone(), b"ok"))
            .await
            .unwrap();
        assert_eq!(ok, Bytes::from_static(b"ok"));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(cache.contains("flaky", LanguageCode::En));
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest_filled() {
        let cache = TtsCache::new(2, None);
        let count = Arc::new(AtomicUsize::new(0));

        for text in ["first", "second", "third"] {
            cache
                .get_or_synthesize(text, LanguageCode::En, counting_synth(count.clone(), b"x"))
                .await
                .unwrap();
            // Keep creation instants strictly ordered.
            std::thread::sleep(Duration::from_millis(2));
        }

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains("first", LanguageCode::En));
        assert!(cache.contains("third", LanguageCode::En));
    }

    #[tokio::test]
    async fn test_eviction_never_touches_in_flight_slots() {
        let cache = Arc::new(TtsCache::new(1, None));
        let count = Arc::new(AtomicUsize::new(0));

        let c = cache.clone();
        let n = count.clone();
        let in_flight = tokio::spawn(async move {
            c.get_or_synthesize("slow one", LanguageCode::Te, move || async move {
                n.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(60)).await;
                Ok(Bytes::from_static(b"slow"))
            })
            .await
        });

        // Let the slow synthesis start, then overfill the cache.
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache
            .get_or_synthesize("fast one", LanguageCode::Te, counting_synth(count.clone(), b"fast"))
            .await
            .unwrap();

        let slow = in_flight.await.unwrap().unwrap();
        assert_eq!(slow, Bytes::from_static(b"slow"));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(cache.contains("slow one", LanguageCode::Te));
    }

    #[tokio::test]
    async fn test_age_eviction_drops_stale_entries() {
        let cache = TtsCache::new(8, Some(Duration::from_millis(20)));
        let count = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_synthesize("stale", LanguageCode::En, counting_synth(count.clone(), b"old"))
            .await
            .unwrap();
        std::thread::sleep(Duration::from_millis(30));

        // Any access sweeps out entries past their age.
        cache
            .get_or_synthesize("fresh", LanguageCode::En, counting_synth(count.clone(), b"new"))
            .await
            .unwrap();

        assert!(!cache.contains("stale", LanguageCode::En));
        assert!(cache.contains("fresh", LanguageCode::En));
    }
}
