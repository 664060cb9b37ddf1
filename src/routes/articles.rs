use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::utc_day;
use crate::auth::{AuthUser, MaybeReader};
use crate::constants::MAX_ANALYTICS_DAYS;
use crate::extractors::JsonBody;
use crate::middleware::read_limit::{extract_client_ip, ReadKey};
use crate::response::{created, ok, AppError};
use crate::state::AppState;
use crate::store::operations::articles::Article;
use crate::store::operations::daily_aggregates::DailyAggregate;

const TITLE_MAX_CHARS: usize = 150;
const CONTENT_MIN_CHARS: usize = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_article))
        .route("/:id", get(get_article).delete(delete_article))
        .route("/:id/analytics", get(article_analytics))
}

/// Public read. The response is decided before analytics is touched; the
/// limiter only decides whether this read is recorded.
async fn get_article(
    reader: MaybeReader,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let article = state
        .store()
        .get_article(&id)?
        .ok_or_else(|| AppError::not_found("Article not found"))?;
    if article.is_deleted() {
        return Err(AppError::gone("Article no longer available"));
    }

    let response = ok(article);

    let peer = connect_info.map(|ConnectInfo(addr)| addr.ip());
    let ip = extract_client_ip(&headers, state.config().trust_proxy, peer);
    let key = ReadKey::new(ip, reader.user_id.as_deref(), &id);
    if state.read_limiter().check(&key).await {
        state.recorder().record(&id, reader.user_id.as_deref());
    } else {
        tracing::debug!(article_id = %id, key = %key, "Read within limit window, not recorded");
    }

    Ok(response)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateArticleRequest {
    title: String,
    content: String,
    category: Option<String>,
}

impl CreateArticleRequest {
    fn validate(&self) -> Result<(), AppError> {
        let title_len = self.title.trim().chars().count();
        if title_len == 0 || title_len > TITLE_MAX_CHARS {
            return Err(AppError::bad_request(
                "VALIDATION_ERROR",
                "Title must be 1-150 characters",
            ));
        }
        if self.content.trim().chars().count() < CONTENT_MIN_CHARS {
            return Err(AppError::bad_request(
                "VALIDATION_ERROR",
                "Content must be at least 50 characters",
            ));
        }
        if self.category.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(AppError::bad_request(
                "VALIDATION_ERROR",
                "Category cannot be empty",
            ));
        }
        Ok(())
    }
}

async fn create_article(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateArticleRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let now = Utc::now();
    let article = Article {
        id: uuid::Uuid::new_v4().to_string(),
        author_id: auth.user_id,
        title: req.title.trim().to_string(),
        content: req.content,
        category: req.category.map(|c| c.trim().to_string()),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };
    state.store().create_article(&article)?;

    tracing::info!(article_id = %article.id, author_id = %article.author_id, "Article created");
    Ok(created(article))
}

fn owned_article(state: &AppState, auth: &AuthUser, id: &str) -> Result<Article, AppError> {
    let article = state
        .store()
        .get_article(id)?
        .ok_or_else(|| AppError::not_found("Article not found"))?;
    if article.author_id != auth.user_id {
        return Err(AppError::forbidden("Not the author of this article"));
    }
    Ok(article)
}

async fn delete_article(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    owned_article(&state, &auth, &id)?;
    let article = state.store().soft_delete_article(&id, Utc::now())?;
    tracing::info!(article_id = %id, "Article soft-deleted");
    Ok(ok(article))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DailyViews {
    date: NaiveDate,
    view_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ArticleAnalytics {
    article_id: String,
    total_views: u64,
    daily: Vec<DailyViews>,
}

impl ArticleAnalytics {
    /// `total_views` covers every rolled-up day; `daily` only the last
    /// `MAX_ANALYTICS_DAYS` calendar days up to `today`.
    fn from_aggregates(article_id: String, aggregates: Vec<DailyAggregate>, today: NaiveDate) -> Self {
        let total_views = aggregates.iter().map(|agg| agg.view_count).sum();
        let cutoff = today.checked_sub_days(Days::new(MAX_ANALYTICS_DAYS));
        let daily = aggregates
            .into_iter()
            .filter(|agg| cutoff.map_or(true, |cutoff| agg.date > cutoff))
            .map(|agg| DailyViews {
                date: agg.date,
                view_count: agg.view_count,
            })
            .collect();
        Self {
            article_id,
            total_views,
            daily,
        }
    }
}

/// Per-article view history for its author. Reads only the aggregates, so
/// today's figure lags until its task has been processed.
async fn article_analytics(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let article = owned_article(&state, &auth, &id)?;
    let aggregates = state.store().list_daily_aggregates(&article.id)?;
    Ok(ok(ArticleAnalytics::from_aggregates(
        article.id,
        aggregates,
        utc_day(Utc::now()),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(title: &str, content: &str, category: Option<&str>) -> CreateArticleRequest {
        CreateArticleRequest {
            title: title.to_string(),
            content: content.to_string(),
            category: category.map(str::to_string),
        }
    }

    #[test]
    fn validation_bounds() {
        let body = "x".repeat(50);
        assert!(request("Title", &body, None).validate().is_ok());
        assert!(request("  ", &body, None).validate().is_err());
        assert!(request(&"t".repeat(151), &body, None).validate().is_err());
        assert!(request("Title", "short", None).validate().is_err());
        assert!(request("Title", &body, Some(" ")).validate().is_err());
    }

    fn one_view_per_day(first: NaiveDate, days: u64) -> Vec<DailyAggregate> {
        (0..days)
            .map(|offset| DailyAggregate {
                article_id: "a1".to_string(),
                date: first + Days::new(offset),
                view_count: 1,
            })
            .collect()
    }

    #[test]
    fn total_views_is_sum_of_days() {
        let aggregates = (1..=3)
            .map(|d| DailyAggregate {
                article_id: "a1".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 3, d).unwrap(),
                view_count: u64::from(d) * 10,
            })
            .collect();
        let today = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let analytics = ArticleAnalytics::from_aggregates("a1".to_string(), aggregates, today);
        assert_eq!(analytics.total_views, 60);
        assert_eq!(analytics.daily.len(), 3);
    }

    #[test]
    fn total_views_counts_days_older_than_the_history_window() {
        let first = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let today = first + Days::new(399);
        let analytics =
            ArticleAnalytics::from_aggregates("a1".to_string(), one_view_per_day(first, 400), today);

        assert_eq!(analytics.total_views, 400);
        assert_eq!(analytics.daily.len(), 366);
        assert_eq!(analytics.daily.last().unwrap().date, today);
        assert_eq!(analytics.daily[0].date, today - Days::new(365));
    }

    #[test]
    fn history_window_is_by_calendar_date_not_row_count() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let mut aggregates = one_view_per_day(today - Days::new(500), 1);
        aggregates.extend(one_view_per_day(today - Days::new(10), 2));

        let analytics = ArticleAnalytics::from_aggregates("a1".to_string(), aggregates, today);
        assert_eq!(analytics.total_views, 3);
        let dates: Vec<_> = analytics.daily.iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![today - Days::new(10), today - Days::new(9)]);
    }
}
