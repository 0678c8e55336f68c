//! HostedStorage tests against an in-process PostgREST stand-in
//!
//! The mock understands just the requests the adapter sends: table checks,
//! `select=count`, the seed upsert, the conditional PATCH, visitor inserts
//! and the `execute_sql` RPC.

use std::collections::{HashMap, HashSet};
use std::net::TcpListener;
use std::sync::Arc;

use actix_web::http::Method;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use parking_lot::Mutex;
use serde_json::{Value, json};

use visitor_counter::config::SupabaseConfig;
use visitor_counter::errors::CounterError;
use visitor_counter::storage::{CounterStore, HostedStorage, VisitorRecord};

const SERVICE_KEY: &str = "test-service-key";

#[derive(Default)]
struct MockState {
    counter_table: bool,
    visitor_table: bool,
    rpc_allowed: bool,
    count: Option<i64>,
    /// 下几次 PATCH 模拟被其他写入者抢先
    conflicts: u32,
    /// 每次 PATCH 都冲突
    always_conflict: bool,
    visitors: Vec<Value>,
    rpc_calls: Vec<String>,
    patch_calls: u32,
    unauthorized: u32,
}

type Shared = Arc<Mutex<MockState>>;

fn rows(state: &MockState) -> Value {
    match state.count {
        Some(count) => json!([{ "id": 1, "count": count }]),
        None => json!([]),
    }
}

async fn dispatch(
    req: HttpRequest,
    query: web::Query<HashMap<String, String>>,
    body: web::Bytes,
    state: web::Data<Shared>,
) -> HttpResponse {
    let mut state = state.lock();

    let bearer = format!("Bearer {}", SERVICE_KEY);
    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok());
    let authorized =
        header("apikey") == Some(SERVICE_KEY) && header("authorization") == Some(bearer.as_str());
    if !authorized {
        state.unauthorized += 1;
        return HttpResponse::Unauthorized().finish();
    }

    let path = req.path().to_string();
    match (req.method().clone(), path.as_str()) {
        (Method::GET, "/rest/v1/visitor_count") => {
            if !state.counter_table {
                return HttpResponse::NotFound().json(json!({ "message": "relation does not exist" }));
            }
            HttpResponse::Ok().json(rows(&state))
        }
        (Method::GET, "/rest/v1/visitor_info") => {
            if !state.visitor_table {
                return HttpResponse::NotFound().finish();
            }
            HttpResponse::Ok().json(json!([]))
        }
        (Method::POST, "/rest/v1/visitor_count") => {
            if !state.counter_table {
                return HttpResponse::NotFound().finish();
            }
            assert_eq!(query.get("on_conflict").map(String::as_str), Some("id"));
            if state.count.is_none() {
                state.count = Some(0);
            }
            HttpResponse::Created().finish()
        }
        (Method::PATCH, "/rest/v1/visitor_count") => {
            state.patch_calls += 1;
            let expected: i64 = query
                .get("count")
                .and_then(|c| c.strip_prefix("eq."))
                .and_then(|c| c.parse().ok())
                .unwrap();
            let new_count = serde_json::from_slice::<Value>(&body).unwrap()["count"]
                .as_i64()
                .unwrap();

            if state.always_conflict || state.conflicts > 0 {
                state.conflicts = state.conflicts.saturating_sub(1);
                // 别的写入者先加了一
                state.count = state.count.map(|c| c + 1);
                return HttpResponse::Ok().json(json!([]));
            }

            if state.count == Some(expected) {
                state.count = Some(new_count);
                HttpResponse::Ok().json(rows(&state))
            } else {
                HttpResponse::Ok().json(json!([]))
            }
        }
        (Method::POST, "/rest/v1/visitor_info") => {
            if !state.visitor_table {
                return HttpResponse::NotFound().finish();
            }
            let inserted: Vec<Value> = serde_json::from_slice(&body).unwrap();
            state.visitors.extend(inserted);
            HttpResponse::Created().finish()
        }
        (Method::POST, "/rest/v1/rpc/execute_sql") => {
            let sql = serde_json::from_slice::<Value>(&body).unwrap()["sql"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            state.rpc_calls.push(sql.clone());
            if !state.rpc_allowed {
                return HttpResponse::NotFound().json(json!({ "message": "function not found" }));
            }
            if sql.contains("EXISTS visitor_count ") {
                state.counter_table = true;
            } else if sql.contains("EXISTS visitor_info ") {
                state.visitor_table = true;
            }
            HttpResponse::Ok().json(Value::Null)
        }
        _ => HttpResponse::NotFound().finish(),
    }
}

/// Start the mock on an ephemeral port and return its base URL
fn start_mock(state: Shared) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .default_service(web::to(dispatch))
    })
    .workers(1)
    .listen(listener)
    .unwrap()
    .run();
    actix_rt::spawn(server);

    format!("http://127.0.0.1:{}", port)
}

fn mock_with(setup: impl FnOnce(&mut MockState)) -> (Shared, HostedStorage) {
    let mut state = MockState::default();
    setup(&mut state);
    let state = Arc::new(Mutex::new(state));
    let url = start_mock(state.clone());

    let storage = HostedStorage::new(&SupabaseConfig {
        url,
        service_key: SERVICE_KEY.to_string(),
        timeout_secs: 5,
        ..Default::default()
    })
    .unwrap();

    (state, storage)
}

fn ready_tables(state: &mut MockState) {
    state.counter_table = true;
    state.visitor_table = true;
}

// =============================================================================
// 初始化
// =============================================================================

#[cfg(test)]
mod init_tests {
    use super::*;

    #[actix_rt::test]
    async fn test_init_seeds_missing_row() {
        let (state, storage) = mock_with(ready_tables);

        storage.ensure_initialized().await.unwrap();

        assert_eq!(state.lock().count, Some(0));
        assert!(state.lock().rpc_calls.is_empty());
        assert_eq!(storage.read_count().await.unwrap(), 0);
        assert_eq!(state.lock().unauthorized, 0);
    }

    #[actix_rt::test]
    async fn test_init_keeps_existing_count() {
        let (state, storage) = mock_with(|s| {
            ready_tables(s);
            s.count = Some(120);
        });

        storage.ensure_initialized().await.unwrap();
        storage.ensure_initialized().await.unwrap();

        assert_eq!(state.lock().count, Some(120));
        assert_eq!(storage.read_count().await.unwrap(), 120);
    }

    #[actix_rt::test]
    async fn test_init_creates_tables_through_rpc() {
        let (state, storage) = mock_with(|s| s.rpc_allowed = true);

        storage.ensure_initialized().await.unwrap();

        let state = state.lock();
        assert!(state.counter_table);
        assert!(state.visitor_table);
        assert_eq!(state.rpc_calls.len(), 2);
        assert!(state.rpc_calls[0].starts_with("CREATE TABLE IF NOT EXISTS visitor_count"));
        assert!(state.rpc_calls[1].starts_with("CREATE TABLE IF NOT EXISTS visitor_info"));
        assert_eq!(state.count, Some(0));
    }

    #[actix_rt::test]
    async fn test_missing_counter_table_without_rpc_fails() {
        let (_state, storage) = mock_with(|_| {});

        assert!(matches!(
            storage.ensure_initialized().await,
            Err(CounterError::StorageUnavailable(_))
        ));
    }

    #[actix_rt::test]
    async fn test_missing_visitor_table_is_tolerated() {
        let (state, storage) = mock_with(|s| s.counter_table = true);

        storage.ensure_initialized().await.unwrap();

        assert_eq!(state.lock().count, Some(0));
        assert_eq!(state.lock().rpc_calls.len(), 1);
        assert_eq!(storage.increment().await.unwrap(), 1);
    }
}

// =============================================================================
// 递增
// =============================================================================

#[cfg(test)]
mod increment_tests {
    use super::*;

    #[actix_rt::test]
    async fn test_increment_without_row_is_not_initialized() {
        let (_state, storage) = mock_with(ready_tables);

        assert!(matches!(
            storage.increment().await,
            Err(CounterError::NotInitialized(_))
        ));
        assert!(matches!(
            storage.read_count().await,
            Err(CounterError::NotInitialized(_))
        ));
    }

    #[actix_rt::test]
    async fn test_increment_returns_new_value() {
        let (state, storage) = mock_with(|s| {
            ready_tables(s);
            s.count = Some(41);
        });

        assert_eq!(storage.increment().await.unwrap(), 42);
        assert_eq!(state.lock().count, Some(42));
    }

    #[actix_rt::test]
    async fn test_increment_retries_after_conflict() {
        let (state, storage) = mock_with(|s| {
            ready_tables(s);
            s.count = Some(10);
            s.conflicts = 2;
        });

        // 两次冲突各被别人加一，自己的那次得到 13
        assert_eq!(storage.increment().await.unwrap(), 13);

        let state = state.lock();
        assert_eq!(state.count, Some(13));
        assert_eq!(state.patch_calls, 3);
    }

    #[actix_rt::test]
    async fn test_increment_gives_up_after_retries() {
        let (state, storage) = mock_with(|s| {
            ready_tables(s);
            s.count = Some(0);
            s.always_conflict = true;
        });

        match storage.increment().await {
            Err(CounterError::StorageUnavailable(msg)) => {
                assert!(msg.contains("gave up"), "unexpected message: {}", msg)
            }
            other => panic!("expected StorageUnavailable, got {:?}", other),
        }

        let default_retries = SupabaseConfig::default().max_cas_retries;
        assert_eq!(state.lock().patch_calls, default_retries + 1);
    }

    #[actix_rt::test]
    async fn test_negative_count_is_malformed() {
        let (_state, storage) = mock_with(|s| {
            ready_tables(s);
            s.count = Some(-3);
        });

        assert!(matches!(
            storage.read_count().await,
            Err(CounterError::MalformedState(_))
        ));
        assert!(matches!(
            storage.increment().await,
            Err(CounterError::MalformedState(_))
        ));
    }

    #[actix_rt::test]
    async fn test_increment_at_bigint_max_is_malformed() {
        let (state, storage) = mock_with(|s| {
            ready_tables(s);
            s.count = Some(i64::MAX);
        });

        assert_eq!(storage.read_count().await.unwrap(), i64::MAX as u64);
        assert!(matches!(
            storage.increment().await,
            Err(CounterError::MalformedState(_))
        ));

        let state = state.lock();
        assert_eq!(state.patch_calls, 0);
        assert_eq!(state.count, Some(i64::MAX));
    }

    #[actix_rt::test]
    async fn test_concurrent_increments_are_unique() {
        let mut state = MockState::default();
        ready_tables(&mut state);
        state.count = Some(0);
        let state = Arc::new(Mutex::new(state));
        let url = start_mock(state.clone());

        let storage = Arc::new(
            HostedStorage::new(&SupabaseConfig {
                url,
                service_key: SERVICE_KEY.to_string(),
                max_cas_retries: 100,
                ..Default::default()
            })
            .unwrap(),
        );

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let storage = storage.clone();
                tokio::spawn(async move { storage.increment().await.unwrap() })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            assert!(seen.insert(handle.await.unwrap()));
        }

        assert_eq!(seen, (1..=10).collect::<HashSet<u64>>());
        assert_eq!(state.lock().count, Some(10));
    }
}

// =============================================================================
// 访客日志
// =============================================================================

#[cfg(test)]
mod visitor_log_tests {
    use super::*;

    #[actix_rt::test]
    async fn test_append_visitor_posts_record() {
        let (state, storage) = mock_with(|s| {
            ready_tables(s);
            s.count = Some(5);
        });

        let record = VisitorRecord::new("203.0.113.80").with_location(
            Some("Toronto".into()),
            Some("Ontario".into()),
            Some("CA".into()),
        );
        storage.append_visitor(&record).await.unwrap();

        let state = state.lock();
        assert_eq!(state.visitors.len(), 1);
        assert_eq!(state.visitors[0]["ip_address"], "203.0.113.80");
        assert_eq!(state.visitors[0]["city"], "Toronto");
        assert_eq!(state.visitors[0]["country"], "CA");
        assert!(state.visitors[0]["timestamp"].is_string());
        assert_eq!(state.count, Some(5));
    }

    #[actix_rt::test]
    async fn test_append_visitor_without_table_fails() {
        let (_state, storage) = mock_with(|s| s.counter_table = true);

        assert!(matches!(
            storage
                .append_visitor(&VisitorRecord::new("203.0.113.81"))
                .await,
            Err(CounterError::StorageUnavailable(_))
        ));
    }
}
