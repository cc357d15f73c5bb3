use std::collections::{HashMap, HashSet, VecDeque};

use crate::core::models::{MatchSet, ThreadKey};

/// Per-thread memory of the values already posted.
///
/// Unbounded by default: entries only grow for the life of the process. With
/// a limit, the thread whose last record is oldest is forgotten once the limit
/// is exceeded.
///
/// `filter_unseen` and `record` are separate calls so the caller can record
/// only after a post succeeds. The pair is not atomic; sharing one store
/// between concurrent handlers needs a lock around both calls.
#[derive(Debug, Default)]
pub struct ThreadContext {
    sent: HashMap<ThreadKey, HashSet<String>>,
    order: VecDeque<ThreadKey>,
    limit: Option<usize>,
}

impl ThreadContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit: limit.filter(|l| *l > 0),
            ..Self::default()
        }
    }

    /// The values of `matches` not yet recorded for `thread`, order kept.
    #[must_use]
    pub fn filter_unseen(&self, thread: &ThreadKey, matches: &MatchSet) -> MatchSet {
        match self.sent.get(thread) {
            Some(seen) => matches.iter().filter(|v| !seen.contains(*v)).collect(),
            None => matches.clone(),
        }
    }

    /// Records `values` as sent in `thread`. Already recorded values are ignored.
    pub fn record<I, S>(&mut self, thread: &ThreadKey, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.sent.contains_key(thread) {
            self.touch(thread);
        } else {
            self.sent.insert(thread.clone(), HashSet::new());
            self.order.push_back(thread.clone());
            self.evict_overflow(thread);
        }
        if let Some(seen) = self.sent.get_mut(thread) {
            seen.extend(values.into_iter().map(Into::into));
        }
    }

    #[must_use]
    pub fn is_recorded(&self, thread: &ThreadKey, value: &str) -> bool {
        self.sent.get(thread).is_some_and(|seen| seen.contains(value))
    }

    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.sent.len()
    }

    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    fn touch(&mut self, thread: &ThreadKey) {
        if self.limit.is_none() {
            return;
        }
        if let Some(pos) = self.order.iter().position(|t| t == thread)
            && let Some(key) = self.order.remove(pos)
        {
            self.order.push_back(key);
        }
    }

    fn evict_overflow(&mut self, keep: &ThreadKey) {
        let Some(limit) = self.limit else {
            return;
        };
        while self.sent.len() > limit {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if &oldest == keep {
                self.order.push_back(oldest);
                continue;
            }
            self.sent.remove(&oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(ts: &str) -> ThreadKey {
        ThreadKey::new(ts)
    }

    #[test]
    fn test_unknown_thread_passes_everything() {
        let store = ThreadContext::new();
        let matches: MatchSet = ["a", "b"].into_iter().collect();
        assert_eq!(store.filter_unseen(&key("1.0"), &matches), matches);
    }

    #[test]
    fn test_record_then_filter_keeps_order() {
        let mut store = ThreadContext::new();
        store.record(&key("1.0"), ["b"]);
        let matches: MatchSet = ["a", "b", "c"].into_iter().collect();
        let unseen = store.filter_unseen(&key("1.0"), &matches);
        assert_eq!(unseen.into_vec(), vec!["a", "c"]);
    }

    #[test]
    fn test_recording_twice_is_harmless() {
        let mut store = ThreadContext::new();
        store.record(&key("1.0"), ["a"]);
        store.record(&key("1.0"), ["a", "a"]);
        assert!(store.is_recorded(&key("1.0"), "a"));
        assert_eq!(store.thread_count(), 1);
    }

    #[test]
    fn test_limit_evicts_oldest_thread() {
        let mut store = ThreadContext::with_limit(Some(2));
        store.record(&key("1.0"), ["a"]);
        store.record(&key("2.0"), ["a"]);
        store.record(&key("3.0"), ["a"]);
        assert_eq!(store.thread_count(), 2);
        assert!(!store.is_recorded(&key("1.0"), "a"));
        assert!(store.is_recorded(&key("2.0"), "a"));
        assert!(store.is_recorded(&key("3.0"), "a"));
    }

    #[test]
    fn test_limit_keeps_recently_recorded_thread() {
        let mut store = ThreadContext::with_limit(Some(2));
        store.record(&key("1.0"), ["a"]);
        store.record(&key("2.0"), ["a"]);
        store.record(&key("1.0"), ["b"]);
        store.record(&key("3.0"), ["a"]);
        assert_eq!(store.thread_count(), 2);
        assert!(store.is_recorded(&key("1.0"), "a"));
        assert!(store.is_recorded(&key("1.0"), "b"));
        assert!(!store.is_recorded(&key("2.0"), "a"));
        assert!(store.is_recorded(&key("3.0"), "a"));
    }

    #[test]
    fn test_zero_limit_means_unbounded() {
        let store = ThreadContext::with_limit(Some(0));
        assert_eq!(store.limit(), None);
    }
}
