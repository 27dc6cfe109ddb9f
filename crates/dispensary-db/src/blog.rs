use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `blog_posts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BlogPostRow {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub category: String,
    pub author: String,
    pub featured_image: Option<String>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub generated_by_ai: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const BLOG_COLUMNS: &str = "id, title, slug, content, excerpt, category, author, featured_image, \
     published, published_at, generated_by_ai, created_at, updated_at";

/// Lists published posts, newest publication first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_published_blog_posts(pool: &PgPool) -> Result<Vec<BlogPostRow>, DbError> {
    let rows = sqlx::query_as::<_, BlogPostRow>(&format!(
        "SELECT {BLOG_COLUMNS} FROM blog_posts \
         WHERE published = true \
         ORDER BY published_at DESC NULLS LAST, id DESC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns a published post by slug. Drafts resolve to `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_published_blog_post_by_slug(
    pool: &PgPool,
    slug: &str,
) -> Result<Option<BlogPostRow>, DbError> {
    let row = sqlx::query_as::<_, BlogPostRow>(&format!(
        "SELECT {BLOG_COLUMNS} FROM blog_posts \
         WHERE slug = $1 AND published = true"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
