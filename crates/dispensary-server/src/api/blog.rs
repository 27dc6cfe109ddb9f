use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::middleware::RequestId;

use super::extract::ApiPath;
use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct BlogPostItem {
    id: i64,
    title: String,
    slug: String,
    content: String,
    excerpt: Option<String>,
    category: String,
    author: String,
    featured_image: Option<String>,
    published_at: Option<DateTime<Utc>>,
    generated_by_ai: bool,
}

impl From<dispensary_db::BlogPostRow> for BlogPostItem {
    fn from(row: dispensary_db::BlogPostRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            content: row.content,
            excerpt: row.excerpt,
            category: row.category,
            author: row.author,
            featured_image: row.featured_image,
            published_at: row.published_at,
            generated_by_ai: row.generated_by_ai,
        }
    }
}

/// GET /api/v1/blog — published posts, newest first.
pub(super) async fn list_posts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<BlogPostItem>>>, ApiError> {
    let rows = dispensary_db::list_published_blog_posts(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        rows.into_iter().map(BlogPostItem::from).collect(),
        req_id,
    )))
}

/// GET /api/v1/blog/{slug}
pub(super) async fn get_post(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<ApiResponse<BlogPostItem>>, ApiError> {
    let row = dispensary_db::get_published_blog_post_by_slug(&state.pool, &slug)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(&req_id.0, "not_found", format!("blog post '{slug}' not found"))
        })?;

    Ok(Json(ApiResponse::new(BlogPostItem::from(row), req_id)))
}
