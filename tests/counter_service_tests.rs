//! CounterService tests
//!
//! Counter semantics against the in-memory store: sequential and concurrent
//! increments, fresh reads, and failure reporting.

use std::collections::HashSet;
use std::sync::Arc;

use visitor_counter::errors::CounterError;
use visitor_counter::services::CounterService;
use visitor_counter::storage::{CounterStore, MemoryStore, UnavailableStore};

async fn fresh_service() -> (CounterService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let service = CounterService::new(store.clone());
    service.initialize().await.unwrap();
    (service, store)
}

// =============================================================================
// 基本计数
// =============================================================================

#[cfg(test)]
mod counting_tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_counter_reads_zero() {
        let (service, _) = fresh_service().await;
        assert_eq!(service.get_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_increment_returns_new_value() {
        let (service, _) = fresh_service().await;
        assert_eq!(service.increment().await.unwrap(), 1);
        assert_eq!(service.increment().await.unwrap(), 2);
        assert_eq!(service.get_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_sequential_increments_add_up() {
        let store = Arc::new(MemoryStore::with_count(40));
        let service = CounterService::new(store);

        for _ in 0..25 {
            service.increment().await.unwrap();
        }
        assert_eq!(service.get_count().await.unwrap(), 65);
    }

    #[tokio::test]
    async fn test_reads_do_not_mutate() {
        let (service, _) = fresh_service().await;
        service.increment().await.unwrap();

        for _ in 0..10 {
            assert_eq!(service.get_count().await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let (service, _) = fresh_service().await;
        service.increment().await.unwrap();
        service.increment().await.unwrap();

        service.initialize().await.unwrap();
        service.initialize().await.unwrap();

        assert_eq!(service.get_count().await.unwrap(), 2);
    }
}

// =============================================================================
// 并发计数
// =============================================================================

#[cfg(test)]
mod concurrency_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_lose_nothing() {
        let (service, _) = fresh_service().await;

        let handles: Vec<_> = (0..200)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.increment().await.unwrap() })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            assert!(seen.insert(handle.await.unwrap()), "duplicate count returned");
        }

        assert_eq!(seen.len(), 200);
        assert_eq!(service.get_count().await.unwrap(), 200);
        assert_eq!(*seen.iter().max().unwrap(), 200);
    }
}

// =============================================================================
// 错误处理
// =============================================================================

#[cfg(test)]
mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_uninitialized_store_is_reported_distinctly() {
        let service = CounterService::new(Arc::new(MemoryStore::new()));

        assert!(matches!(
            service.get_count().await,
            Err(CounterError::NotInitialized(_))
        ));
        assert!(matches!(
            service.increment().await,
            Err(CounterError::NotInitialized(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_operation() {
        let cause = CounterError::configuration("SUPABASE_URL is not set");
        let service = CounterService::new(Arc::new(UnavailableStore::new(cause.clone())));

        assert_eq!(service.initialize().await, Err(cause.clone()));
        assert_eq!(service.get_count().await, Err(cause.clone()));
        assert_eq!(service.increment().await, Err(cause));
        assert_eq!(service.backend_name(), "unavailable");
    }

    #[tokio::test]
    async fn test_increment_at_bigint_max_is_malformed() {
        let store = Arc::new(MemoryStore::with_count(i64::MAX as u64));
        let service = CounterService::new(store);

        assert!(matches!(
            service.increment().await,
            Err(CounterError::MalformedState(_))
        ));
        assert_eq!(service.get_count().await.unwrap(), i64::MAX as u64);
    }

    #[tokio::test]
    async fn test_visitor_log_does_not_touch_counter() {
        let (service, store) = fresh_service().await;
        service.increment().await.unwrap();

        let record = visitor_counter::storage::VisitorRecord::new("203.0.113.10");
        store.append_visitor(&record).await.unwrap();

        assert_eq!(service.get_count().await.unwrap(), 1);
        assert_eq!(store.visitors().len(), 1);
    }
}
