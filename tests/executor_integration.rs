//! Integration tests for request execution against a live HTTP server
//!
//! Covers cookie injection, chains, cycle bounding and concurrent
//! statistics updates.

use std::sync::Arc;

use repeater::cookies::StaticCookieProvider;
use repeater::executor::{ErrorKind, RequestExecutor, ReqwestDispatcher};
use repeater::storage::RequestUpdate;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

fn executor(store: Arc<repeater::Store>) -> RequestExecutor {
    let http = Arc::new(ReqwestDispatcher::new(None, None).expect("build http client"));
    RequestExecutor::new(store, http)
}

async fn chain(store: &repeater::Store, from: &str, to: &str) {
    store
        .update_request(
            from,
            RequestUpdate {
                chain_next_id: Some(Some(to.to_string())),
                ..Default::default()
            },
        )
        .await
        .expect("update chain");
}

#[tokio::test]
async fn test_execute_records_statistics_and_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(1)
        .mount(&server)
        .await;

    let (store, _tmp) = common::create_temp_store();
    let curl = format!("curl -X POST {}/api -d 'x=1'", server.uri());
    let request = common::add_request(&store, "create", &curl).await;

    let result = executor(store.clone()).execute(&request.id).await;
    assert!(result.success);
    assert_eq!(result.status_code, Some(201));
    assert_eq!(result.response_body.as_deref(), Some("created"));

    let stored = store.get_request(&request.id).await.unwrap().unwrap();
    assert_eq!(stored.statistics.execution_count, 1);
    assert_eq!(stored.statistics.success_count, 1);
    assert!(stored.last_executed_at.is_some());

    let history = store.get_history(Some(&request.id), None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status_code, Some(201));
    assert_eq!(history[0].method, "POST");
}

#[tokio::test]
async fn test_execute_server_error_is_unsuccessful() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (store, _tmp) = common::create_temp_store();
    let request = common::add_request(&store, "broken", &format!("curl {}/", server.uri())).await;

    let result = executor(store.clone()).execute(&request.id).await;
    assert!(!result.success);
    assert_eq!(result.status_code, Some(500));
    assert!(result.error_kind.is_none());

    let stored = store.get_request(&request.id).await.unwrap().unwrap();
    assert_eq!(stored.statistics.failure_count, 1);
}

#[tokio::test]
async fn test_live_cookies_replace_saved_values() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("cookie", "session=live; theme=dark"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (store, _tmp) = common::create_temp_store();
    let curl = format!(
        "curl {}/me -H 'Cookie: session=stale; theme=dark'",
        server.uri()
    );
    let request = common::add_request(&store, "me", &curl).await;
    store
        .update_request(
            &request.id,
            RequestUpdate {
                cookie_replace_list: Some(vec!["session".to_string()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let cookies = StaticCookieProvider::new().with_cookie("127.0.0.1", "session", "live");
    let result = executor(store)
        .with_cookie_provider(Arc::new(cookies))
        .execute(&request.id)
        .await;
    assert!(result.success, "{:?}", result.error);
}

#[tokio::test]
async fn test_chain_follows_on_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_string("payload"))
        .expect(1)
        .mount(&server)
        .await;

    let (store, _tmp) = common::create_temp_store();
    let login = common::add_request(&store, "login", &format!("curl {}/login", server.uri())).await;
    let data = common::add_request(&store, "data", &format!("curl {}/data", server.uri())).await;
    chain(&store, &login.id, &data.id).await;

    let result = executor(store).execute(&login.id).await;
    assert_eq!(result.chain_len(), 2);
    let next = result.chain_result.as_deref().unwrap();
    assert_eq!(next.request_id, data.id);
    assert_eq!(next.response_body.as_deref(), Some("payload"));
}

#[tokio::test]
async fn test_chain_not_followed_after_failure() {
    let server = MockServer::start().await;
    Mock::given(path("/first"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(path("/second"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (store, _tmp) = common::create_temp_store();
    let first = common::add_request(&store, "first", &format!("curl {}/first", server.uri())).await;
    let second =
        common::add_request(&store, "second", &format!("curl {}/second", server.uri())).await;
    chain(&store, &first.id, &second.id).await;

    let result = executor(store).execute(&first.id).await;
    assert!(!result.success);
    assert!(result.chain_result.is_none());
}

#[tokio::test]
async fn test_cyclic_chain_is_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(11)
        .mount(&server)
        .await;

    let (store, _tmp) = common::create_temp_store();
    let a = common::add_request(&store, "a", &format!("curl {}/a", server.uri())).await;
    let b = common::add_request(&store, "b", &format!("curl {}/b", server.uri())).await;
    chain(&store, &a.id, &b.id).await;
    chain(&store, &b.id, &a.id).await;

    let result = executor(store).execute(&a.id).await;
    assert_eq!(result.chain_len(), 12);
    let last = result.innermost();
    assert!(!last.success);
    assert_eq!(last.error_kind, Some(ErrorKind::ChainDepthExceeded));
}

#[tokio::test]
async fn test_concurrent_executions_lose_no_statistics() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (store, _tmp) = common::create_temp_store();
    let request = common::add_request(&store, "hot", &format!("curl {}/", server.uri())).await;
    let executor = Arc::new(executor(store.clone()));

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let executor = executor.clone();
            let id = request.id.clone();
            tokio::spawn(async move { executor.execute(&id).await })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().success);
    }

    let stored = store.get_request(&request.id).await.unwrap().unwrap();
    assert_eq!(stored.statistics.execution_count, 20);
    assert_eq!(stored.statistics.success_count, 20);
    assert_eq!(
        store.get_history(Some(&request.id), None).await.unwrap().len(),
        20
    );
}

#[tokio::test]
async fn test_unknown_request_reports_not_found() {
    let (store, _tmp) = common::create_temp_store();
    let result = executor(store).execute("missing").await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Request not found"));
    assert_eq!(result.error_kind, Some(ErrorKind::RequestNotFound));
}
