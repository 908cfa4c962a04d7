use crate::model::{Id, user::UserMarker};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use time::OffsetDateTime;

/// Keys owned by the store or the authenticated caller. Clients never get to write them.
pub const RESERVED_POST_KEYS: [&str; 9] = [
    "id",
    "_id",
    "user_id",
    "userId",
    "likes",
    "created_at",
    "createdAt",
    "updated_at",
    "updatedAt",
];

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub user_id: Id<UserMarker>,
    #[serde(flatten)]
    pub content: PostContent,
    pub likes: BTreeSet<Id<UserMarker>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Post {
    #[must_use]
    pub fn is_owned_by(&self, user: Id<UserMarker>) -> bool {
        self.user_id == user
    }
}

/// The fields of a post its author writes, kept as an opaque JSON object.
///
/// Any reserved key is dropped on construction, so content can be flattened into a [`Post`]
/// without shadowing the fields the store manages.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct PostContent(Map<String, Value>);

impl PostContent {
    #[must_use]
    pub fn new(mut fields: Map<String, Value>) -> Self {
        fields.retain(|key, _| !RESERVED_POST_KEYS.contains(&key.as_str()));
        Self(fields)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

impl Serialize for PostContent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PostContent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Map::deserialize(deserializer).map(PostContent::new)
    }
}

/// What a like toggle did to the caller's membership in a post's like set.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LikeOutcome {
    Liked,
    Unliked,
}

impl LikeOutcome {
    /// The outcome of toggling when the user's like was `was_liked` before.
    #[must_use]
    pub fn toggled_from(was_liked: bool) -> Self {
        if was_liked {
            LikeOutcome::Unliked
        } else {
            LikeOutcome::Liked
        }
    }
}

/// Confirmation of an author-only write.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    Updated,
    Deleted,
}
