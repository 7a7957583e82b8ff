mod common;

use std::sync::Arc;

use serde_json::{json, Value};
use warp::http::StatusCode;
use warp::Filter;

use common::{build, doc, hit, MockChat, MockIndex, MockStore, MockWeb};
use hybrid_rag::api::routes;
use hybrid_rag::error::handle_rejection;
use hybrid_rag::middleware::query_limiter;
use hybrid_rag::pipeline::{HybridRag, Settings};

fn api(
    rag: HybridRag,
    per_minute: u32,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    routes(Arc::new(rag), query_limiter(per_minute)).recover(handle_rejection)
}

fn body_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn query_returns_answer_with_citations() {
    let chat = Arc::new(MockChat::new("hybrid").with_fragments(vec![Ok("Paris [Source 2]"), Ok(" and [Source 9].")]));
    let web = Arc::new(MockWeb::returning(vec![hit("Paris is the capital of France.", "http://x")]));
    let rag = build(chat, web, Arc::default(), Settings::default());
    rag.index().publish(Arc::new(MockIndex::new(vec![doc("d1", Some(5))]))).await;

    let res = warp::test::request()
        .method("POST")
        .path("/api/v1/query")
        .json(&json!({ "query": "capital of France?" }))
        .reply(&api(rag, 60))
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res.body());
    assert_eq!(body["mode"], "hybrid");
    assert_eq!(body["used_web_fallback"], true);
    assert_eq!(body["answer"], "Paris [Source 2] and [Source 9].");
    assert_eq!(body["citations"][0]["label"], "[Doc] manual.pdf (Pg 5)");
    assert_eq!(body["citations"][1]["label"], "[Web] Web Result");
    assert_eq!(body["citations"][1]["url"], "http://x");
    assert_eq!(body["unresolved_citations"], json!([9]));
}

#[tokio::test]
async fn query_honours_a_forced_mode() {
    let chat = Arc::new(MockChat::new("web"));
    let rag = build(chat.clone(), Arc::new(MockWeb::returning(vec![])), Arc::default(), Settings::default());
    rag.index().publish(Arc::new(MockIndex::new(vec![doc("d1", None)]))).await;

    let res = warp::test::request()
        .method("POST")
        .path("/api/v1/query")
        .json(&json!({ "query": "q", "mode": "document" }))
        .reply(&api(rag, 60))
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res.body());
    assert_eq!(body["mode"], "document");
    assert_eq!(body["used_web_fallback"], false);
    assert_eq!(chat.complete_calls(), 0);
}

#[tokio::test]
async fn query_without_evidence_returns_the_fixed_message() {
    let rag = build(
        Arc::new(MockChat::new("document")),
        Arc::new(MockWeb::returning(vec![])),
        Arc::default(),
        Settings::default(),
    );

    let res = warp::test::request()
        .method("POST")
        .path("/api/v1/query")
        .json(&json!({ "query": "q" }))
        .reply(&api(rag, 60))
        .await;

    let body = body_json(res.body());
    assert_eq!(body["answer"], hybrid_rag::agents::NO_EVIDENCE_MESSAGE);
    assert_eq!(body["citations"], json!([]));
}

#[tokio::test]
async fn blank_query_is_a_bad_request() {
    let rag = build(
        Arc::new(MockChat::new("hybrid")),
        Arc::new(MockWeb::returning(vec![])),
        Arc::default(),
        Settings::default(),
    );

    let res = warp::test::request()
        .method("POST")
        .path("/api/v1/query")
        .json(&json!({ "query": "   " }))
        .reply(&api(rag, 60))
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn broken_generation_is_a_bad_gateway_with_partial_text() {
    let chat = Arc::new(MockChat::new("document").with_fragments(vec![Ok("Partial"), Err("reset")]));
    let rag = build(chat, Arc::new(MockWeb::returning(vec![])), Arc::default(), Settings::default());
    rag.index().publish(Arc::new(MockIndex::new(vec![doc("d1", None)]))).await;

    let res = warp::test::request()
        .method("POST")
        .path("/api/v1/query")
        .json(&json!({ "query": "q" }))
        .reply(&api(rag, 60))
        .await;

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(res.body())["partial_answer"], "Partial");
}

#[tokio::test]
async fn queries_beyond_the_quota_are_throttled() {
    let rag = build(
        Arc::new(MockChat::new("document")),
        Arc::new(MockWeb::returning(vec![])),
        Arc::default(),
        Settings::default(),
    );
    let filter = api(rag, 1);

    let request = || {
        warp::test::request()
            .method("POST")
            .path("/api/v1/query")
            .json(&json!({ "query": "q" }))
    };
    assert_eq!(request().reply(&filter).await.status(), StatusCode::OK);
    assert_eq!(request().reply(&filter).await.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn stream_emits_evidence_tokens_then_done() {
    let chat = Arc::new(MockChat::new("document").with_fragments(vec![Ok("Hello"), Ok(" world")]));
    let rag = build(chat, Arc::new(MockWeb::returning(vec![])), Arc::default(), Settings::default());
    rag.index().publish(Arc::new(MockIndex::new(vec![doc("d1", None)]))).await;

    let res = warp::test::request()
        .method("POST")
        .path("/api/v1/query/stream")
        .json(&json!({ "query": "q" }))
        .reply(&api(rag, 60))
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    let text = String::from_utf8(res.body().to_vec()).unwrap();
    let evidence = text.find("event:evidence").unwrap();
    let first = text.find("data:Hello").unwrap();
    let second = text.find("data: world").unwrap();
    let done = text.find("event:done").unwrap();
    assert!(evidence < first && first < second && second < done);
    assert!(!text.contains("event:error"));
}

#[tokio::test]
async fn stream_ends_with_error_when_generation_breaks() {
    let chat = Arc::new(MockChat::new("document").with_fragments(vec![Ok("Half"), Err("reset")]));
    let rag = build(chat, Arc::new(MockWeb::returning(vec![])), Arc::default(), Settings::default());
    rag.index().publish(Arc::new(MockIndex::new(vec![doc("d1", None)]))).await;

    let res = warp::test::request()
        .method("POST")
        .path("/api/v1/query/stream")
        .json(&json!({ "query": "q" }))
        .reply(&api(rag, 60))
        .await;

    let text = String::from_utf8(res.body().to_vec()).unwrap();
    assert!(text.contains("data:Half"));
    assert!(text.contains("event:error"));
    assert!(!text.contains("event:done"));
}

#[tokio::test]
async fn stream_without_evidence_sends_a_single_message() {
    let rag = build(
        Arc::new(MockChat::new("document")),
        Arc::new(MockWeb::returning(vec![])),
        Arc::default(),
        Settings::default(),
    );

    let res = warp::test::request()
        .method("POST")
        .path("/api/v1/query/stream")
        .json(&json!({ "query": "q" }))
        .reply(&api(rag, 60))
        .await;

    let text = String::from_utf8(res.body().to_vec()).unwrap();
    assert!(text.contains("event:message"));
    assert!(text.contains("event:done"));
    assert!(!text.contains("event:token"));
}

#[tokio::test]
async fn index_publishes_a_new_version() {
    let store = Arc::new(MockStore::default());
    let rag = build(
        Arc::new(MockChat::new("document")),
        Arc::new(MockWeb::returning(vec![])),
        store.clone(),
        Settings::default(),
    );
    let filter = api(rag, 60);

    let res = warp::test::request()
        .method("POST")
        .path("/api/v1/index")
        .json(&json!({ "chunks": [doc("d1", Some(1)), doc("d2", None)] }))
        .reply(&filter)
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res.body());
    assert_eq!(body["version"], 1);
    assert_eq!(body["chunk_count"], 2);
    assert_eq!(store.persisted.lock().unwrap().as_ref().map(Vec::len), Some(2));
}

#[tokio::test]
async fn index_rejects_empty_and_invalid_batches() {
    let rag = build(
        Arc::new(MockChat::new("document")),
        Arc::new(MockWeb::returning(vec![])),
        Arc::default(),
        Settings::default(),
    );
    let filter = api(rag, 60);

    let empty = warp::test::request()
        .method("POST")
        .path("/api/v1/index")
        .json(&json!({ "chunks": [] }))
        .reply(&filter)
        .await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let mut blank = doc("blank", None);
    blank.content = " ".into();
    let invalid = warp::test::request()
        .method("POST")
        .path("/api/v1/index")
        .json(&json!({ "chunks": [blank] }))
        .reply(&filter)
        .await;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
}
