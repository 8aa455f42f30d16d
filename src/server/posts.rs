use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::content::PostItem;
use crate::post::{parse_date, Clock, Hashtags, Post, PostId, SystemClock, ValidationError};
use crate::server::{json::JsonBody, Result, ServerError, ServerRouter, ServerState};

pub fn routes() -> ServerRouter {
    Router::new()
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/search", get(search_posts))
        .route(
            "/api/posts/{id}",
            get(get_post).put(replace_post).delete(delete_post),
        )
}

#[derive(Deserialize, FromRequestParts)]
#[serde(transparent)]
#[from_request(via(Path), rejection(ServerError))]
struct PostIdPath(PostId);

/// Incoming post fields. Presence is checked by hand so a missing field is a
/// validation error rather than a JSON rejection.
///
/// On replace, `hashtags`, `category` and `items` left out of the request keep
/// their stored values; an empty `category` clears it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostPayload {
    title: Option<String>,
    #[serde(alias = "content")]
    body: Option<String>,
    date: Option<String>,
    hashtags: Option<Vec<String>>,
    category: Option<String>,
    items: Option<Vec<PostItem>>,
}

impl PostPayload {
    fn into_post(self, id: PostId, stored: Option<&Post>) -> Result<Post> {
        let title = present(self.title).ok_or(ValidationError::MissingTitle)?;
        let body = present(self.body).ok_or(ValidationError::MissingBody)?;
        let raw_date = present(self.date).ok_or(ValidationError::MissingDate)?;
        let date = parse_date(&raw_date).ok_or(ServerError::InvalidDate(raw_date))?;
        let hashtags = match self.hashtags {
            Some(tags) => tags.into_iter().collect::<Hashtags>(),
            None => stored.map(|post| post.hashtags.clone()).unwrap_or_default(),
        };
        let category = match self.category {
            Some(category) => present(Some(category)),
            None => stored.and_then(|post| post.category.clone()),
        };
        let items = match self.items {
            Some(items) => items,
            None => stored.map(|post| post.items.clone()).unwrap_or_default(),
        };
        Ok(Post {
            id,
            title,
            date,
            body,
            hashtags,
            category,
            items,
        })
    }
}

fn present(field: Option<String>) -> Option<String> {
    field
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    hashtag: Option<String>,
}

#[derive(Debug, Serialize)]
struct Message {
    message: String,
}

async fn list_posts(State(state): State<ServerState>) -> Json<Vec<Post>> {
    Json(state.repo.lock().list().to_vec())
}

async fn get_post(PostIdPath(id): PostIdPath, State(state): State<ServerState>) -> Result<Json<Post>> {
    let repo = state.repo.lock();
    let post = repo.get(id).cloned().ok_or(ServerError::PostNotFound(id))?;
    Ok(Json(post))
}

async fn create_post(
    State(state): State<ServerState>,
    JsonBody(payload): JsonBody<PostPayload>,
) -> Result<(StatusCode, Json<Post>)> {
    let mut post = payload.into_post(SystemClock.post_id(), None)?;
    let id = state.repo.lock().create(post.clone())?;
    post.id = id;
    tracing::info!(post_id = id, "created post");
    Ok((StatusCode::CREATED, Json(post)))
}

async fn replace_post(
    PostIdPath(id): PostIdPath,
    State(state): State<ServerState>,
    JsonBody(payload): JsonBody<PostPayload>,
) -> Result<Json<Post>> {
    let mut repo = state.repo.lock();
    let stored = repo.get(id).ok_or(ServerError::PostNotFound(id))?;
    let post = payload.into_post(id, Some(stored))?;
    repo.replace_by_id(id, post.clone())?;
    tracing::info!(post_id = id, "replaced post");
    Ok(Json(post))
}

async fn delete_post(
    PostIdPath(id): PostIdPath,
    State(state): State<ServerState>,
) -> Result<Json<Message>> {
    state.repo.lock().delete_by_id(id)?;
    tracing::info!(post_id = id, "deleted post");
    Ok(Json(Message {
        message: format!("Post {id} deleted"),
    }))
}

async fn search_posts(
    State(state): State<ServerState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Post>>> {
    let hashtag = present(params.hashtag).ok_or(ServerError::MissingHashtag)?;
    let repo = state.repo.lock();
    let hits = repo.search_by_hashtag(&hashtag).into_iter().cloned().collect();
    Ok(Json(hits))
}
