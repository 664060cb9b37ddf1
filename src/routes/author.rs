use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::response::{paginated, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DashboardQuery {
    page: Option<u64>,
    per_page: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardArticle {
    id: String,
    title: String,
    category: Option<String>,
    created_at: DateTime<Utc>,
    total_views: u64,
}

/// The caller's live articles, newest first, each with lifetime views summed
/// from its daily rollups.
async fn dashboard(
    auth: AuthUser,
    Query(q): Query<DashboardQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let page = q.page.unwrap_or(1).max(1);
    let per_page = q.per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

    let articles = state.store().list_articles_by_author(&auth.user_id)?;
    let total = articles.len() as u64;
    let offset = usize::try_from((page - 1).saturating_mul(per_page)).unwrap_or(usize::MAX);

    let mut items = Vec::new();
    for article in articles.into_iter().skip(offset).take(per_page as usize) {
        let total_views = state.store().total_views(&article.id)?;
        items.push(DashboardArticle {
            id: article.id,
            title: article.title,
            category: article.category,
            created_at: article.created_at,
            total_views,
        });
    }

    Ok(paginated(items, total, page, per_page))
}
