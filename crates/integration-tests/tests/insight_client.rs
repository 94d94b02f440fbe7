//! Integration tests for the insight client against a local mock endpoint.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use propfee_admin::db::MemoryStore;
use propfee_admin::insight::{
    INSIGHT_DISABLED, INSIGHT_EMPTY, INSIGHT_RATE_LIMITED, InsightClient, InsightProvider,
};
use propfee_admin::services::{DashboardState, InsightOutcome};
use propfee_integration_tests::{MockInsightServer, MockReply, eventually, two_collectors};

const API_KEY: &str = "sk-test-3f9a1c7e5b2d4086";

#[tokio::test]
async fn test_completion_text_is_returned() {
    let server =
        MockInsightServer::start(MockReply::Completion("  1. 加强催缴\n2. 表彰B  ".to_owned()))
            .await;
    let client = InsightClient::new(&server.config(Some(API_KEY))).unwrap();

    let text = client.summarize(&two_collectors()).await;
    assert_eq!(text, "1. 加强催缴\n2. 表彰B");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(
        request.authorization.as_deref(),
        Some(format!("Bearer {API_KEY}").as_str())
    );
    assert_eq!(request.body["model"], "deepseek-ai/DeepSeek-V3");
    assert_eq!(request.body["stream"], false);
    assert_eq!(request.body["messages"][0]["role"], "user");
    let prompt = request.body["messages"][0]["content"].as_str().unwrap();
    assert!(prompt.contains("住宅一部: 总额 250元"));
    assert!(prompt.contains("B (150元)"));
}

#[tokio::test]
async fn test_missing_key_makes_no_request() {
    let server = MockInsightServer::start(MockReply::Completion("unused".to_owned())).await;
    let client = InsightClient::new(&server.config(None)).unwrap();

    assert_eq!(client.summarize(&two_collectors()).await, INSIGHT_DISABLED);
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_rate_limit_status() {
    let server = MockInsightServer::start(MockReply::Status(
        429,
        json!({ "error": { "message": "quota exhausted" } }),
    ))
    .await;
    let client = InsightClient::new(&server.config(Some(API_KEY))).unwrap();

    assert_eq!(client.summarize(&two_collectors()).await, INSIGHT_RATE_LIMITED);
}

#[tokio::test]
async fn test_rate_limit_mentioned_in_error_text() {
    let server = MockInsightServer::start(MockReply::Status(
        400,
        json!({ "error": { "message": "upstream returned 429 Too Many Requests" } }),
    ))
    .await;
    let client = InsightClient::new(&server.config(Some(API_KEY))).unwrap();

    assert_eq!(client.summarize(&two_collectors()).await, INSIGHT_RATE_LIMITED);
}

#[tokio::test]
async fn test_server_error_message() {
    let server = MockInsightServer::start(MockReply::Status(
        500,
        json!({ "error": { "message": "boom" } }),
    ))
    .await;
    let client = InsightClient::new(&server.config(Some(API_KEY))).unwrap();

    assert_eq!(
        client.summarize(&two_collectors()).await,
        "暂时无法生成AI建议：请求失败 (500): boom"
    );
}

#[tokio::test]
async fn test_empty_completion() {
    let server = MockInsightServer::start(MockReply::Completion("   ".to_owned())).await;
    let client = InsightClient::new(&server.config(Some(API_KEY))).unwrap();

    assert_eq!(client.summarize(&two_collectors()).await, INSIGHT_EMPTY);
}

#[tokio::test]
async fn test_unreachable_endpoint_falls_back() {
    let mut config = MockInsightServer::start(MockReply::Completion(String::new()))
        .await
        .config(Some(API_KEY));
    config.api_url = "http://127.0.0.1:9/v1/chat/completions".to_owned();
    let client = InsightClient::new(&config).unwrap();

    let text = client.summarize(&two_collectors()).await;
    assert!(text.starts_with("暂时无法生成AI建议："), "got {text}");
}

#[tokio::test]
async fn test_refresh_while_busy_is_rejected() {
    let server = MockInsightServer::start(MockReply::Delayed(
        Duration::from_millis(300),
        "慢速建议".to_owned(),
    ))
    .await;
    let client = InsightClient::new(&server.config(Some(API_KEY))).unwrap();
    let state = DashboardState::new(
        Arc::new(MemoryStore::with_data(two_collectors())),
        Arc::new(client),
    );
    state.load().await.unwrap();

    let first = {
        let state = state.clone();
        tokio::spawn(async move { state.refresh_insight().await })
    };
    assert!(
        eventually(|| {
            let state = state.clone();
            async move { state.is_insight_busy() }
        })
        .await
    );

    assert_eq!(state.refresh_insight().await, InsightOutcome::Busy);

    assert_eq!(
        first.await.unwrap(),
        InsightOutcome::Updated("慢速建议".to_owned())
    );
    let insight = state.insight().await;
    assert_eq!(insight.text, "慢速建议");
    assert!(!insight.busy);
    assert_eq!(server.requests().len(), 1);
}
