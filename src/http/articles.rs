//! Article endpoints.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use opentelemetry::trace::Span as _;
use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::observability::RequestContext;

pub const ARTICLE_ID: &str = "article.id";
pub const ARTICLE_TITLE: &str = "article.title";

/// A single article. Field names are serialized capitalized (`ID`, `Title`,
/// `Content`) and must stay that way for existing clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Content")]
    pub content: String,
}

impl Article {
    /// The only article the service knows about.
    pub fn first() -> Self {
        Self {
            id: "1".to_string(),
            title: "はじめてのGo".to_string(),
            content: "Goは素晴らしいプログラミング言語です。".to_string(),
        }
    }
}

/// `GET /`
pub async fn welcome() -> &'static str {
    "welcome"
}

/// `GET /articles`
///
/// Runs inside its own `getArticle` span and copies the article id onto the
/// request's root span.
pub async fn get_article(State(state): State<AppState>, cx: RequestContext) -> impl IntoResponse {
    let article = {
        // ended when dropped at the end of this block
        let mut span = cx.child_span(&state.tracer, "getArticle");

        let article = Article::first();
        span.set_attributes([
            KeyValue::new(ARTICLE_ID, article.id.clone()),
            KeyValue::new(ARTICLE_TITLE, article.title.clone()),
        ]);
        cx.enrich_root([KeyValue::new(ARTICLE_ID, article.id.clone())]);

        tracing::debug!(article_id = %article.id, "Article loaded");
        article
    };

    Json(article)
}
