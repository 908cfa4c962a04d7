use murmur_common::model::{
    Id, ModelValidationError,
    auth::Authentication,
    post::{Post, PostContent},
    user::{User, Username},
};
use serde_json::{Map, Value};
use sqlx::{FromRow, types::Json};
use time::{Duration, OffsetDateTime, PrimitiveDateTime};

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_id: i64,
    pub username: String,
    pub followings: Vec<i64>,
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct PostRecord {
    pub post_id: i64,
    pub user_id: i64,
    pub content: Json<Map<String, Value>>,
    pub likes: Vec<i64>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_id: i64,
    pub token_hash: Vec<u8>,
    pub created_at: PrimitiveDateTime,
    pub expires_after_seconds: Option<i64>,
}

fn id_from_column<Marker>(column: i64) -> Id<Marker> {
    column.cast_unsigned().into()
}

pub(crate) fn id_to_column<Marker>(id: Id<Marker>) -> i64 {
    id.get().cast_signed()
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: id_from_column(value.user_id),
            username: Username::new(value.username)?,
            followings: value.followings.into_iter().map(id_from_column).collect(),
        })
    }
}

impl From<PostRecord> for Post {
    fn from(value: PostRecord) -> Self {
        Self {
            id: id_from_column(value.post_id),
            user_id: id_from_column(value.user_id),
            content: PostContent::new(value.content.0),
            likes: value.likes.into_iter().map(id_from_column).collect(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: id_from_column(value.user_id),
            token_hash: value.token_hash.try_into()?,
            created_at: value.created_at.as_utc(),
            expires_after: value
                .expires_after_seconds
                .map(|seconds| Duration::seconds(seconds).try_into())
                .transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::record::{PostRecord, UserRecord, id_to_column};
    use murmur_common::model::{Id, ModelValidationError, post::Post, user::User};
    use serde_json::json;
    use sqlx::types::Json;
    use time::OffsetDateTime;

    #[test]
    fn post_from_record() {
        let record = PostRecord {
            post_id: 5,
            user_id: 1,
            content: Json(json!({ "desc": "hi", "img": "img.png" }).as_object().unwrap().clone()),
            likes: vec![3, 2, 3],
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };
        let post = Post::from(record);

        assert_eq!(post.id, Id::new(5));
        assert_eq!(post.user_id, Id::new(1));
        assert_eq!(post.content.get("desc"), Some(&json!("hi")));
        assert_eq!(post.content.get("img"), Some(&json!("img.png")));
        assert_eq!(post.likes.len(), 2);
    }

    #[test]
    fn invalid_users_are_rejected() {
        let user = UserRecord {
            user_id: 1,
            username: "a".to_owned(),
            followings: vec![],
        };
        assert!(matches!(
            User::try_from(user),
            Err(ModelValidationError::Username(_))
        ));
    }

    #[test]
    fn ids_keep_their_bits() {
        let id = Id::<()>::new(u64::MAX);
        assert_eq!(id_to_column(id), -1);
    }
}
