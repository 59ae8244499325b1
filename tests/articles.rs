//! End-to-end tests against a running service.

use std::time::Duration;

use article_service::http::articles::{ARTICLE_ID, ARTICLE_TITLE};
use article_service::http::Article;
use opentelemetry::trace::SpanKind;

mod common;

use common::{attr, TestService};

#[tokio::test]
async fn test_welcome() {
    let service = TestService::start().await;

    let res = reqwest::get(service.url("/")).await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "welcome");

    let root = service.span("/");
    assert_eq!(root.span_kind, SpanKind::Server);
    assert_eq!(attr(&root, ARTICLE_ID), None);

    service.shutdown.trigger();
}

#[tokio::test]
async fn test_get_article() {
    let service = TestService::start().await;

    let res = reqwest::get(service.url("/articles")).await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers().get("content-type").unwrap(),
        "application/json"
    );
    let article: Article = res.json().await.unwrap();
    assert_eq!(
        article,
        Article {
            id: "1".into(),
            title: "はじめてのGo".into(),
            content: "Goは素晴らしいプログラミング言語です。".into(),
        }
    );

    service.shutdown.trigger();
}

#[tokio::test]
async fn test_article_spans() {
    let service = TestService::start().await;

    let res = reqwest::get(service.url("/articles")).await.unwrap();
    assert_eq!(res.status(), 200);

    let root = service.span("/articles");
    let child = service.span("getArticle");

    assert_eq!(attr(&root, ARTICLE_ID).as_deref(), Some("1"));
    assert_eq!(attr(&root, "url.path").as_deref(), Some("/articles"));
    assert_eq!(attr(&root, "url.scheme").as_deref(), Some("http"));
    assert_eq!(attr(&root, "http.request.method").as_deref(), Some("GET"));
    assert!(attr(&root, "request.id").is_some());

    assert_eq!(attr(&child, ARTICLE_ID).as_deref(), Some("1"));
    assert_eq!(attr(&child, ARTICLE_TITLE).as_deref(), Some("はじめてのGo"));
    assert_eq!(child.parent_span_id, root.span_context.span_id());
    assert_eq!(child.span_context.trace_id(), root.span_context.trace_id());

    // the child ends before the root
    assert!(child.end_time <= root.end_time);
    assert!(root.start_time <= child.start_time);

    service.shutdown.trigger();
}

#[tokio::test]
async fn test_query_string_gives_distinct_span_names() {
    let service = TestService::start().await;

    for target in ["/articles?x=1", "/articles?x=2"] {
        let res = reqwest::get(service.url(target)).await.unwrap();
        assert_eq!(res.status(), 200);
    }

    let first = service.span("/articles?x=1");
    let second = service.span("/articles?x=2");
    assert_ne!(first.name, second.name);
    assert_ne!(first.span_context.trace_id(), second.span_context.trace_id());
    assert_eq!(attr(&first, "url.path").as_deref(), Some("/articles"));

    service.shutdown.trigger();
}

#[tokio::test]
async fn test_unknown_route_is_traced() {
    let service = TestService::start().await;

    let res = reqwest::get(service.url("/missing")).await.unwrap();
    assert_eq!(res.status(), 404);

    let root = service.span("/missing");
    assert_eq!(attr(&root, "http.response.status_code").as_deref(), Some("404"));

    service.shutdown.trigger();
}

#[tokio::test]
async fn test_server_stops_on_shutdown() {
    let service = TestService::start().await;
    service.shutdown.trigger();

    let result = tokio::time::timeout(Duration::from_secs(5), service.handle)
        .await
        .expect("server did not stop");
    assert!(result.unwrap().is_ok());
}
