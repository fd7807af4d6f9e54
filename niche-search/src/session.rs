//! Stale-query guard
//!
//! The aggregator has no cancellation primitive. A session numbers every
//! query it starts; a result is only delivered when no newer query was
//! started while it was in flight. Sessions are scoped per client, so one
//! client's typing never supersedes another client's search.

use crate::aggregator::{SearchAggregator, SearchResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Most named client sessions kept at once
pub const MAX_CLIENT_SESSIONS: usize = 1024;

/// Identifies one query started through a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTicket {
    pub id: u64,
    pub query: String,
}

/// Result of a session search
#[derive(Debug)]
pub enum SessionOutcome {
    Current(SearchResult),
    /// A newer query was started before this one finished
    Superseded { query: String },
}

pub struct SearchSession {
    aggregator: Arc<SearchAggregator>,
    latest: AtomicU64,
}

impl SearchSession {
    pub fn new(aggregator: Arc<SearchAggregator>) -> Self {
        Self {
            aggregator,
            latest: AtomicU64::new(0),
        }
    }

    pub fn aggregator(&self) -> &SearchAggregator {
        &self.aggregator
    }

    /// Issue a ticket, making every earlier ticket stale
    pub fn begin(&self, query: &str) -> QueryTicket {
        let id = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        QueryTicket {
            id,
            query: query.to_string(),
        }
    }

    pub fn is_current(&self, ticket: &QueryTicket) -> bool {
        self.latest.load(Ordering::Acquire) == ticket.id
    }

    /// Run a query, discarding its result if a newer query started meanwhile
    pub async fn search(&self, query: &str, limit: usize) -> SessionOutcome {
        let ticket = self.begin(query);
        let result = self.aggregator.search_all(query, limit).await;

        if self.is_current(&ticket) && result.query == ticket.query {
            SessionOutcome::Current(result)
        } else {
            debug!(query = %ticket.query, ticket = ticket.id, "Discarding superseded search");
            SessionOutcome::Superseded {
                query: ticket.query,
            }
        }
    }
}

/// Per-client sessions sharing one aggregator
pub struct SearchSessions {
    aggregator: Arc<SearchAggregator>,
    clients: Mutex<HashMap<String, Arc<SearchSession>>>,
}

impl SearchSessions {
    pub fn new(aggregator: Arc<SearchAggregator>) -> Self {
        Self {
            aggregator,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn aggregator(&self) -> &SearchAggregator {
        &self.aggregator
    }

    /// Session for `client`; anonymous callers get a fresh session each time
    pub fn for_client(&self, client: Option<&str>) -> Arc<SearchSession> {
        let Some(client) = client else {
            return Arc::new(SearchSession::new(Arc::clone(&self.aggregator)));
        };
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = clients.get(client) {
            return Arc::clone(session);
        }
        if clients.len() >= MAX_CLIENT_SESSIONS {
            debug!(sessions = clients.len(), "Client session limit reached; clearing idle sessions");
            clients.retain(|_, session| Arc::strong_count(session) > 1);
        }
        let session = Arc::new(SearchSession::new(Arc::clone(&self.aggregator)));
        clients.insert(client.to_string(), Arc::clone(&session));
        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockProvider;
    use crate::providers::PerfumeProvider;

    fn session() -> SearchSession {
        let provider: Arc<dyn PerfumeProvider> = Arc::new(MockProvider::returning("A", vec![]));
        SearchSession::new(Arc::new(SearchAggregator::new(vec![provider])))
    }

    #[test]
    fn test_newer_ticket_supersedes() {
        let session = session();
        let first = session.begin("sau");
        assert!(session.is_current(&first));

        let second = session.begin("sauvage");
        assert!(!session.is_current(&first));
        assert!(session.is_current(&second));
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_uncontested_search_is_current() {
        let session = session();
        match session.search("sauvage", 5).await {
            SessionOutcome::Current(result) => assert_eq!(result.query, "sauvage"),
            SessionOutcome::Superseded { .. } => panic!("expected current result"),
        }
    }

    fn sessions() -> SearchSessions {
        let provider: Arc<dyn PerfumeProvider> = Arc::new(MockProvider::returning("A", vec![]));
        SearchSessions::new(Arc::new(SearchAggregator::new(vec![provider])))
    }

    #[test]
    fn test_clients_do_not_supersede_each_other() {
        let sessions = sessions();
        let first = sessions.for_client(Some("tab-1")).begin("sau");
        let other = sessions.for_client(Some("tab-2")).begin("rose");

        assert!(sessions.for_client(Some("tab-1")).is_current(&first));
        assert!(sessions.for_client(Some("tab-2")).is_current(&other));

        let newer = sessions.for_client(Some("tab-1")).begin("sauvage");
        assert!(!sessions.for_client(Some("tab-1")).is_current(&first));
        assert!(sessions.for_client(Some("tab-1")).is_current(&newer));
    }

    #[test]
    fn test_anonymous_sessions_are_independent() {
        let sessions = sessions();
        let a = sessions.for_client(None);
        let b = sessions.for_client(None);
        let ticket = a.begin("sau");
        b.begin("rose");
        assert!(a.is_current(&ticket));
    }
}
