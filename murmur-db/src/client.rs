use crate::{
    record::{AuthenticationRecord, PostRecord, UserRecord, id_to_column},
    store::{GuardedWrite, Result, Store},
};
use async_trait::async_trait;
use murmur_common::model::{
    Id,
    auth::{AuthTokenHash, Authentication},
    post::{LikeOutcome, Post, PostContent, PostMarker},
    user::{User, UserMarker, Username},
};
use sqlx::{PgPool, migrate::Migrator, query_as, query_scalar, types::Json};
use tracing::debug;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// [`Store`] backed by PostgreSQL.
#[derive(Clone, Debug)]
pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        debug!("Database migrations applied");
        Ok(())
    }

    async fn post_exists(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let exists = query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM posts.posts WHERE post_id = $1)",
        )
        .bind(id_to_column(post_id))
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}

#[async_trait]
impl Store for DbClient {
    async fn fetch_authentication(
        &self,
        token_hash: &AuthTokenHash,
    ) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT
                authentications.user_id,
                authentications.token_hash,
                authentications.created_at,
                authentications.expires_after_seconds
            FROM
                users.authentications
            WHERE
                authentications.token_hash = $1
            ",
        )
        .bind(token_hash.0.as_slice())
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.username,
                users.followings
            FROM
                users.users
            WHERE
                users.user_id = $1
            ",
        )
        .bind(id_to_column(user_id))
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.username,
                users.followings
            FROM
                users.users
            WHERE
                users.username = $1
            ",
        )
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn create_post(&self, author: Id<UserMarker>, content: &PostContent) -> Result<Post> {
        let record = query_as::<_, PostRecord>(
            "
            INSERT INTO posts.posts (user_id, content)
            VALUES ($1, $2)
            RETURNING post_id, user_id, content, likes, created_at, updated_at
            ",
        )
        .bind(id_to_column(author))
        .bind(Json(content.fields()))
        .fetch_one(&self.pool)
        .await?;

        Ok(Post::from(record))
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(
            "
            SELECT post_id, user_id, content, likes, created_at, updated_at
            FROM posts.posts
            WHERE post_id = $1
            ",
        )
        .bind(id_to_column(post_id))
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Post::from))
    }

    async fn fetch_user_posts(&self, author: Id<UserMarker>) -> Result<Vec<Post>> {
        let records = query_as::<_, PostRecord>(
            "
            SELECT post_id, user_id, content, likes, created_at, updated_at
            FROM posts.posts
            WHERE user_id = $1
            ORDER BY post_id
            ",
        )
        .bind(id_to_column(author))
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Post::from).collect())
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
        content: &PostContent,
    ) -> Result<GuardedWrite<Post>> {
        let record = query_as::<_, PostRecord>(
            "
            UPDATE posts.posts
            SET content = $3, updated_at = now()
            WHERE post_id = $1 AND user_id = $2
            RETURNING post_id, user_id, content, likes, created_at, updated_at
            ",
        )
        .bind(id_to_column(post_id))
        .bind(id_to_column(author))
        .bind(Json(content.fields()))
        .fetch_optional(&self.pool)
        .await?;

        match record {
            Some(record) => Ok(GuardedWrite::Written(Post::from(record))),
            None => Ok(GuardedWrite::rejected(self.post_exists(post_id).await?)),
        }
    }

    async fn delete_post(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
    ) -> Result<GuardedWrite<Post>> {
        let record = query_as::<_, PostRecord>(
            "
            DELETE FROM posts.posts
            WHERE post_id = $1 AND user_id = $2
            RETURNING post_id, user_id, content, likes, created_at, updated_at
            ",
        )
        .bind(id_to_column(post_id))
        .bind(id_to_column(author))
        .fetch_optional(&self.pool)
        .await?;

        match record {
            Some(record) => Ok(GuardedWrite::Written(Post::from(record))),
            None => Ok(GuardedWrite::rejected(self.post_exists(post_id).await?)),
        }
    }

    async fn toggle_like(
        &self,
        post_id: Id<PostMarker>,
        user: Id<UserMarker>,
    ) -> Result<Option<LikeOutcome>> {
        // RETURNING sees the row after the update, so membership there is the new state.
        let liked = query_scalar::<_, bool>(
            "
            UPDATE posts.posts
            SET
                likes = CASE
                    WHEN $2 = ANY(likes) THEN array_remove(likes, $2)
                    ELSE array_append(likes, $2)
                END,
                updated_at = now()
            WHERE post_id = $1
            RETURNING $2 = ANY(likes)
            ",
        )
        .bind(id_to_column(post_id))
        .bind(id_to_column(user))
        .fetch_optional(&self.pool)
        .await?;

        Ok(liked.map(|liked| LikeOutcome::toggled_from(!liked)))
    }
}
