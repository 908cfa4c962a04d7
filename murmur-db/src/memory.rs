//! An in-process [`Store`] for tests.

use crate::store::{GuardedWrite, Result, Store};
use async_trait::async_trait;
use murmur_common::model::{
    Id,
    auth::{AuthTokenHash, Authentication},
    post::{LikeOutcome, Post, PostContent, PostMarker},
    user::{User, UserMarker, Username},
};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Mutex, MutexGuard, PoisonError},
};
use time::OffsetDateTime;

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<Id<UserMarker>, User>,
    authentications: HashMap<AuthTokenHash, Authentication>,
    posts: BTreeMap<Id<PostMarker>, Post>,
    last_post_id: u64,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_user(&self, user: User) {
        self.state().users.insert(user.id, user);
    }

    pub fn insert_authentication(&self, authentication: Authentication) {
        self.state()
            .authentications
            .insert(authentication.token_hash.clone(), authentication);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn fetch_authentication(
        &self,
        token_hash: &AuthTokenHash,
    ) -> Result<Option<Authentication>> {
        Ok(self.state().authentications.get(token_hash).cloned())
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        Ok(self.state().users.get(&user_id).cloned())
    }

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>> {
        Ok(self
            .state()
            .users
            .values()
            .find(|user| user.username == *username)
            .cloned())
    }

    async fn create_post(&self, author: Id<UserMarker>, content: &PostContent) -> Result<Post> {
        let mut state = self.state();
        state.last_post_id += 1;

        let now = OffsetDateTime::now_utc();
        let post = Post {
            id: Id::new(state.last_post_id),
            user_id: author,
            content: content.clone(),
            likes: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        };
        state.posts.insert(post.id, post.clone());

        Ok(post)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        Ok(self.state().posts.get(&post_id).cloned())
    }

    async fn fetch_user_posts(&self, author: Id<UserMarker>) -> Result<Vec<Post>> {
        Ok(self
            .state()
            .posts
            .values()
            .filter(|post| post.is_owned_by(author))
            .cloned()
            .collect())
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
        content: &PostContent,
    ) -> Result<GuardedWrite<Post>> {
        let mut state = self.state();
        let Some(post) = state.posts.get_mut(&post_id) else {
            return Ok(GuardedWrite::NotFound);
        };
        if !post.is_owned_by(author) {
            return Ok(GuardedWrite::NotAuthor);
        }

        post.content = content.clone();
        post.updated_at = OffsetDateTime::now_utc();
        Ok(GuardedWrite::Written(post.clone()))
    }

    async fn delete_post(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
    ) -> Result<GuardedWrite<Post>> {
        let mut state = self.state();
        let Some(post) = state.posts.get(&post_id) else {
            return Ok(GuardedWrite::NotFound);
        };
        if !post.is_owned_by(author) {
            return Ok(GuardedWrite::NotAuthor);
        }

        Ok(state
            .posts
            .remove(&post_id)
            .map_or(GuardedWrite::NotFound, GuardedWrite::Written))
    }

    async fn toggle_like(
        &self,
        post_id: Id<PostMarker>,
        user: Id<UserMarker>,
    ) -> Result<Option<LikeOutcome>> {
        let mut state = self.state();
        let Some(post) = state.posts.get_mut(&post_id) else {
            return Ok(None);
        };

        // `insert` is false when the user was already in the set.
        let outcome = if post.likes.insert(user) {
            LikeOutcome::Liked
        } else {
            post.likes.remove(&user);
            LikeOutcome::Unliked
        };
        post.updated_at = OffsetDateTime::now_utc();

        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use crate::{GuardedWrite, Store, memory::MemoryStore};
    use murmur_common::model::{
        Id,
        post::{LikeOutcome, PostContent},
        user::{User, Username},
    };
    use serde_json::json;

    fn content(desc: &str) -> PostContent {
        serde_json::from_value(json!({ "desc": desc })).unwrap()
    }

    #[tokio::test]
    async fn ids_are_assigned_in_order() {
        let store = MemoryStore::new();

        let first = store.create_post(Id::new(1), &content("a")).await.unwrap();
        let second = store.create_post(Id::new(2), &content("b")).await.unwrap();
        let third = store.create_post(Id::new(1), &content("c")).await.unwrap();

        assert!(first.id < second.id && second.id < third.id);
        assert_eq!(
            store.fetch_user_posts(Id::new(1)).await.unwrap(),
            vec![first, third]
        );
    }

    #[tokio::test]
    async fn guarded_writes() {
        let store = MemoryStore::new();
        let post = store.create_post(Id::new(1), &content("a")).await.unwrap();

        assert_eq!(
            store.update_post(post.id, Id::new(2), &content("b")).await.unwrap(),
            GuardedWrite::NotAuthor
        );
        assert_eq!(
            store.update_post(Id::new(99), Id::new(1), &content("b")).await.unwrap(),
            GuardedWrite::NotFound
        );
        assert_eq!(
            store.delete_post(post.id, Id::new(2)).await.unwrap(),
            GuardedWrite::NotAuthor
        );
        assert_eq!(store.fetch_post(post.id).await.unwrap().unwrap().content, content("a"));

        let GuardedWrite::Written(updated) =
            store.update_post(post.id, Id::new(1), &content("b")).await.unwrap()
        else {
            panic!("author could not update own post");
        };
        assert_eq!(updated.content, content("b"));
        assert_eq!(updated.user_id, Id::new(1));

        assert!(matches!(
            store.delete_post(post.id, Id::new(1)).await.unwrap(),
            GuardedWrite::Written(_)
        ));
        assert_eq!(store.fetch_post(post.id).await.unwrap(), None);
        assert_eq!(
            store.delete_post(post.id, Id::new(1)).await.unwrap(),
            GuardedWrite::NotFound
        );
    }

    #[tokio::test]
    async fn toggling_a_like_twice_restores_the_set() {
        let store = MemoryStore::new();
        let post = store.create_post(Id::new(1), &content("a")).await.unwrap();

        assert_eq!(
            store.toggle_like(post.id, Id::new(9)).await.unwrap(),
            Some(LikeOutcome::Liked)
        );
        let liked = store.fetch_post(post.id).await.unwrap().unwrap();
        assert_eq!(liked.likes.into_iter().collect::<Vec<_>>(), vec![Id::new(9)]);

        assert_eq!(
            store.toggle_like(post.id, Id::new(9)).await.unwrap(),
            Some(LikeOutcome::Unliked)
        );
        assert!(store.fetch_post(post.id).await.unwrap().unwrap().likes.is_empty());

        assert_eq!(store.toggle_like(Id::new(99), Id::new(9)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn users_by_username() {
        let store = MemoryStore::new();
        let alice = User {
            id: Id::new(1),
            username: Username::new("alice".to_owned()).unwrap(),
            followings: vec![Id::new(2)],
        };
        store.insert_user(alice.clone());

        assert_eq!(
            store.fetch_user_by_username(&alice.username).await.unwrap(),
            Some(alice.clone())
        );
        assert_eq!(store.fetch_user(Id::new(1)).await.unwrap(), Some(alice));
        assert_eq!(
            store
                .fetch_user_by_username(&Username::new("bob".to_owned()).unwrap())
                .await
                .unwrap(),
            None
        );
    }
}
