use crate::server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use futures::future::try_join_all;
use murmur_common::model::{
    Id,
    post::{LikeOutcome, Post, PostContent, PostMarker, WriteOutcome},
    user::{UserMarker, Username},
};
use murmur_db::{GuardedWrite, Store};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_post)
        .typed_get(get_post)
        .typed_put(update_post)
        .typed_delete(delete_post)
        .typed_put(toggle_like)
        .typed_get(get_profile_posts)
        .typed_get(get_timeline)
}

fn ensure_written(
    write: GuardedWrite<Post>,
    post: Id<PostMarker>,
    user: AuthenticatedUser,
) -> Result<()> {
    match write {
        GuardedWrite::Written(_) => Ok(()),
        GuardedWrite::NotAuthor => Err(ServerError::NotPostAuthor {
            post,
            user: user.user_id(),
        }),
        GuardedWrite::NotFound => Err(ServerError::PostByIdNotFound(post)),
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct CreatePostPath();

async fn create_post(
    CreatePostPath(): CreatePostPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(content): Json<PostContent>,
) -> Result<Json<Post>> {
    let post = store.create_post(user.user_id(), &content).await?;

    debug!(post = %post.id, user = %user.user_id(), "Created post");
    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<Post>> {
    let post = store
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}

async fn update_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(content): Json<PostContent>,
) -> Result<Json<WriteOutcome>> {
    let write = store.update_post(id, user.user_id(), &content).await?;
    ensure_written(write, id, user)?;

    debug!(post = %id, "Updated post");
    Ok(Json(WriteOutcome::Updated))
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<WriteOutcome>> {
    let write = store.delete_post(id, user.user_id()).await?;
    ensure_written(write, id, user)?;

    debug!(post = %id, "Deleted post");
    Ok(Json(WriteOutcome::Deleted))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/like", rejection(ServerError))]
struct LikePostPath {
    id: Id<PostMarker>,
}

async fn toggle_like(
    LikePostPath { id }: LikePostPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<LikeOutcome>> {
    let outcome = store
        .toggle_like(id, user.user_id())
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    debug!(post = %id, user = %user.user_id(), ?outcome, "Toggled like");
    Ok(Json(outcome))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/profile/{username}", rejection(ServerError))]
struct ProfilePostsPath {
    username: Username,
}

async fn get_profile_posts(
    ProfilePostsPath { username }: ProfilePostsPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<Vec<Post>>> {
    let Some(user) = store.fetch_user_by_username(&username).await? else {
        return Err(ServerError::UserByUsernameNotFound(username));
    };
    let posts = store.fetch_user_posts(user.id).await?;

    Ok(Json(posts))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/timeline/{user_id}", rejection(ServerError))]
struct TimelinePath {
    user_id: Id<UserMarker>,
}

/// The user's own posts, followed by the posts of everyone they follow.
///
/// Followed users are queried concurrently. Their posts are appended in follow order no matter
/// which query finishes first, and the first failing query fails the whole timeline.
async fn get_timeline(
    TimelinePath { user_id }: TimelinePath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<Vec<Post>>> {
    let user = store
        .fetch_user(user_id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(user_id))?;

    let mut timeline = store.fetch_user_posts(user.id).await?;
    let followed_posts = try_join_all(
        user.distinct_followings()
            .into_iter()
            .map(|followed| store.fetch_user_posts(followed)),
    )
    .await?;
    timeline.extend(followed_posts.into_iter().flatten());

    Ok(Json(timeline))
}
