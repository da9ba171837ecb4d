use crate::domain::ServerEvent;
use dashmap::DashMap;
use std::sync::Arc;

/// Cached query identity, mirroring what the UI fetches from the REST API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Conversations,
    Messages { peer_id: i64 },
}

/// Generation counters per query key. Consumers remember the generation they
/// fetched at; a higher generation means the cached result is stale and must
/// be re-fetched. There is no optimistic merge of pushed messages.
#[derive(Debug, Default)]
pub struct QueryCache {
    generations: DashMap<QueryKey, u64>,
}

impl QueryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn generation(&self, key: &QueryKey) -> u64 {
        self.generations.get(key).map_or(0, |g| *g)
    }

    pub fn invalidate(&self, key: &QueryKey) {
        *self.generations.entry(key.clone()).or_insert(0) += 1;
        tracing::debug!(?key, "Invalidated cached query");
    }
}

/// Applies inbound relay events to the query cache. Only events involving the
/// current user touch the cache; everything else is ignored.
#[derive(Debug, Clone)]
pub struct CacheSynchronizer {
    cache: Arc<QueryCache>,
    user_id: i64,
}

impl CacheSynchronizer {
    #[must_use]
    pub const fn new(cache: Arc<QueryCache>, user_id: i64) -> Self {
        Self { cache, user_id }
    }

    pub fn apply(&self, event: &ServerEvent) {
        if let ServerEvent::NewMessage { message } = event
            && let Some(peer_id) = message.peer_of(self.user_id)
        {
            self.cache.invalidate(&QueryKey::Messages { peer_id });
            self.cache.invalidate(&QueryKey::Conversations);
        }
    }
}
