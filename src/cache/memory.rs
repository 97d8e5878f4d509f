//! In-process cache storage.
//!
//! Same contract as the Redis backend, including TTL expiry and glob key
//! matching. Used by tests and for simulating a cache outage.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::backend::{CacheBackend, CacheError, CacheResult};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// A thread-safe, TTL-aware map. Clones share storage.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    entries: Arc<DashMap<String, Entry>>,
    available: Arc<AtomicBool>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Simulate an outage: while unavailable every operation fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Whether a live entry exists, bypassing the availability switch.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.is_live(Instant::now()))
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.value().is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> CacheResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::Unavailable)
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.check()?;
        let now = Instant::now();
        let live = self
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone());
        if live.is_none() {
            self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        }
        Ok(live)
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        self.check()?;
        if ttl.is_zero() {
            return Err(CacheError::InvalidTtl);
        }
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> CacheResult<usize> {
        self.check()?;
        let now = Instant::now();
        let removed = keys
            .iter()
            .filter_map(|key| self.entries.remove(key))
            .filter(|(_, entry)| entry.is_live(now))
            .count();
        Ok(removed)
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        self.check()?;
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().is_live(now) && glob_match(pattern, e.key()))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn ping(&self) -> CacheResult<()> {
        self.check()
    }
}

/// Redis-style glob: `*`, `?`, `[abc]`, `[a-z]`, `[^a]` and `\` escapes.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    match_from(&pattern, &text)
}

fn match_from(pattern: &[char], text: &[char]) -> bool {
    let Some((&first, rest)) = pattern.split_first() else {
        return text.is_empty();
    };

    match first {
        '*' => (0..=text.len()).any(|skip| match_from(rest, &text[skip..])),
        '?' => !text.is_empty() && match_from(rest, &text[1..]),
        '[' => {
            let Some((&c, remaining)) = text.split_first() else {
                return false;
            };
            match class_match(rest, c) {
                Some((matched, after)) => matched && match_from(after, remaining),
                // Unterminated class: treat '[' literally.
                None => c == '[' && match_from(rest, remaining),
            }
        }
        '\\' if !rest.is_empty() => {
            !text.is_empty() && text[0] == rest[0] && match_from(&rest[1..], &text[1..])
        }
        literal => !text.is_empty() && text[0] == literal && match_from(rest, &text[1..]),
    }
}

/// Match `c` against a class body starting after `[`. Returns the result
/// and the pattern following `]`.
fn class_match(body: &[char], c: char) -> Option<(bool, &[char])> {
    let (negated, mut i) = match body.first() {
        Some('^') => (true, 1),
        _ => (false, 0),
    };
    let mut matched = false;

    while i < body.len() {
        match body[i] {
            ']' => return Some((matched != negated, &body[i + 1..])),
            '\\' if i + 1 < body.len() => {
                matched |= body[i + 1] == c;
                i += 2;
            }
            lo if i + 2 < body.len() && body[i + 1] == '-' && body[i + 2] != ']' => {
                let hi = body[i + 2];
                let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
                matched |= (lo..=hi).contains(&c);
                i += 3;
            }
            other => {
                matched |= other == c;
                i += 1;
            }
        }
    }
    None
}
