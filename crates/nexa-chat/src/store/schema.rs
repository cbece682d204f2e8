//! Record types persisted in the application database blob.
//!
//! Field names are serialized in camelCase so the stored document keeps the
//! same layout across versions of the app.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::store::seed;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    /// Argon2 PHC string. Older stores may still hold plaintext here.
    pub password: String,
    pub avatar: String,
    #[serde(with = "lenient_timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: String,
    pub name: String,
    pub tagline: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub system_instruction: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallpaper: Option<String>,
    /// Username of the creator.
    #[serde(default)]
    pub creator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_id: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default = "default_chat_count")]
    pub chat_count: String,
    #[serde(default)]
    pub likes: u64,
    /// Epoch millis of the last exchange, used to order the feed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<i64>,
}

fn default_chat_count() -> String {
    "0".to_string()
}

impl Character {
    /// Ownership check. Legacy records only carry the creator's username.
    pub fn is_owned_by(&self, user: &User) -> bool {
        match self.creator_id.as_deref() {
            Some(creator_id) if creator_id == user.id => true,
            _ => self.creator == user.username,
        }
    }

    pub fn view_for(&self, viewer: Option<&User>) -> CharacterView {
        CharacterView {
            is_author: viewer.map(|u| self.is_owned_by(u)).unwrap_or(false),
            character: self.clone(),
        }
    }
}

/// A character as seen by one viewer. `is_author` is derived on read and
/// is never written back to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterView {
    pub character: Character,
    pub is_author: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub url: String,
}

impl Attachment {
    pub fn image(url: impl Into<String>) -> Self {
        Self { kind: AttachmentKind::Image, url: url.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub text: String,
    #[serde(with = "lenient_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_edited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
            is_edited: false,
            attachment: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_attachment(mut self, attachment: Option<Attachment>) -> Self {
        self.attachment = attachment;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Update,
    News,
    System,
}

impl NotificationKind {
    pub fn label(&self) -> &'static str {
        match self {
            NotificationKind::Update => "Update",
            NotificationKind::News => "News",
            NotificationKind::System => "System",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub date: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
}

/// Aggregate root. Every section defaults independently so a partially
/// written document still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDatabase {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default = "seed::characters")]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub chat_histories: HashMap<String, Vec<Message>>,
    #[serde(default = "seed::notifications")]
    pub notifications: Vec<Notification>,
}

impl Default for AppDatabase {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            characters: seed::characters(),
            chat_histories: HashMap::new(),
            notifications: seed::notifications(),
        }
    }
}

/// Composite key of one user's history with one character.
pub fn history_key(user_id: &str, character_id: &str) -> String {
    format!("{}_{}", user_id, character_id)
}

impl AppDatabase {
    pub fn find_user(&self, user_id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == user_id)
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<&User> {
        let email = email.to_lowercase();
        self.users.iter().find(|u| u.email.to_lowercase() == email)
    }

    pub fn email_taken(&self, email: &str) -> bool {
        self.find_user_by_email(email).is_some()
    }

    pub fn find_character(&self, character_id: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == character_id)
    }

    pub fn find_character_mut(&mut self, character_id: &str) -> Option<&mut Character> {
        self.characters.iter_mut().find(|c| c.id == character_id)
    }

    pub fn history(&self, user_id: &str, character_id: &str) -> &[Message] {
        self.chat_histories
            .get(&history_key(user_id, character_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn history_mut(&mut self, user_id: &str, character_id: &str) -> &mut Vec<Message> {
        self.chat_histories
            .entry(history_key(user_id, character_id))
            .or_default()
    }

    /// Replace a history and mark the character as active at `now_millis`.
    pub fn record_history(
        &mut self,
        user_id: &str,
        character_id: &str,
        messages: Vec<Message>,
        now_millis: i64,
    ) {
        self.chat_histories.insert(history_key(user_id, character_id), messages);
        self.touch_character(character_id, now_millis);
    }

    pub fn touch_character(&mut self, character_id: &str, now_millis: i64) {
        if let Some(character) = self.find_character_mut(character_id) {
            character.last_active = Some(now_millis);
        }
    }

    /// Drop every user's history with `character_id`.
    ///
    /// A key belongs to the character when it is exactly the composite key of
    /// a known user, or when everything after its first `_` equals the id.
    /// Ids that merely end in `_{character_id}` are left alone.
    pub fn remove_histories_for(&mut self, character_id: &str) -> usize {
        let known: HashSet<String> = self
            .users
            .iter()
            .map(|u| history_key(&u.id, character_id))
            .collect();
        let before = self.chat_histories.len();
        self.chat_histories.retain(|key, _| {
            let owned_by_character = known.contains(key)
                || key.split_once('_').map(|(_, rest)| rest == character_id).unwrap_or(false);
            !owned_by_character
        });
        before - self.chat_histories.len()
    }

    pub fn unread_notifications(&self) -> usize {
        self.notifications.iter().filter(|n| !n.is_read).count()
    }
}

/// Message timestamps are stored as RFC 3339 text. Numbers are read as epoch
/// millis. Anything unparseable is replaced by the load time so a single bad
/// record cannot discard the whole store; the message keeps its position in
/// the history.
pub(crate) mod lenient_timestamp {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};
    use tracing::warn;

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(parse(&raw).unwrap_or_else(|| {
            warn!("Unreadable timestamp {} in store, substituting load time", raw);
            Utc::now()
        }))
    }

    pub(crate) fn parse(raw: &serde_json::Value) -> Option<DateTime<Utc>> {
        match raw {
            serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(id: &str, username: &str) -> User {
        User {
            id: id.to_string(),
            email: format!("{}@example.com", username),
            username: username.to_string(),
            password: String::new(),
            avatar: String::new(),
            created_at: Utc::now(),
        }
    }

    fn character(creator: &str, creator_id: Option<&str>) -> Character {
        Character {
            id: "c1".to_string(),
            name: "Kira".to_string(),
            tagline: "Night courier".to_string(),
            description: String::new(),
            system_instruction: String::new(),
            avatar_url: String::new(),
            wallpaper: None,
            creator: creator.to_string(),
            creator_id: creator_id.map(str::to_string),
            is_public: false,
            chat_count: "0".to_string(),
            likes: 0,
            last_active: None,
        }
    }

    #[test]
    fn test_ownership_by_creator_id() {
        let owner = user("u1", "alice");
        let other = user("u2", "bob");
        let c = character("someone-else", Some("u1"));
        assert!(c.is_owned_by(&owner));
        assert!(!c.is_owned_by(&other));
    }

    #[test]
    fn test_ownership_falls_back_to_username_for_legacy_records() {
        let owner = user("u1", "alice");
        let c = character("alice", None);
        assert!(c.is_owned_by(&owner));
        assert!(!c.view_for(None).is_author);
        assert!(c.view_for(Some(&owner)).is_author);
    }

    #[test]
    fn test_is_author_is_not_serialized() {
        let owner = user("u1", "alice");
        let view = character("alice", Some("u1")).view_for(Some(&owner));
        let json = serde_json::to_value(&view.character).unwrap();
        assert!(json.get("isAuthor").is_none());
        assert_eq!(json["creatorId"], "u1");
    }

    #[test]
    fn test_legacy_is_author_key_is_ignored() {
        let raw = json!({
            "id": "c9", "name": "Old", "tagline": "t", "creator": "x",
            "isAuthor": true, "isPublic": true, "chatCount": "1.2k", "likes": 3
        });
        let c: Character = serde_json::from_value(raw).unwrap();
        assert_eq!(c.chat_count, "1.2k");
        assert!(c.is_public);
    }

    #[test]
    fn test_timestamp_accepts_rfc3339_and_millis() {
        let rfc = lenient_timestamp::parse(&json!("2024-05-01T10:00:00.000Z")).unwrap();
        let millis = lenient_timestamp::parse(&json!(1714557600000i64)).unwrap();
        assert_eq!(rfc, millis);
        assert!(lenient_timestamp::parse(&json!("not a date")).is_none());
        assert!(lenient_timestamp::parse(&json!(null)).is_none());
    }

    #[test]
    fn test_corrupt_timestamp_keeps_message() {
        let raw = json!({"id": "m1", "role": "user", "text": "hi", "timestamp": "garbage"});
        let before = Utc::now();
        let msg: Message = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.text, "hi");
        assert!(msg.timestamp >= before);
    }

    #[test]
    fn test_missing_sections_default_independently() {
        let db: AppDatabase = serde_json::from_value(json!({"users": []})).unwrap();
        assert_eq!(db.characters, seed::characters());
        assert_eq!(db.notifications, seed::notifications());
        assert!(db.chat_histories.is_empty());
    }

    #[test]
    fn test_email_lookup_ignores_case() {
        let mut db = AppDatabase::default();
        db.users.push(user("u1", "alice"));
        assert!(db.email_taken("ALICE@Example.com"));
        assert!(!db.email_taken("bob@example.com"));
    }

    #[test]
    fn test_history_key_format() {
        assert_eq!(history_key("u1", "c1"), "u1_c1");
    }

    #[test]
    fn test_record_history_stamps_character() {
        let mut db = AppDatabase::default();
        db.characters.push(character("alice", Some("u1")));
        db.record_history("u1", "c1", vec![Message::new(Role::User, "hi")], 42);
        assert_eq!(db.history("u1", "c1").len(), 1);
        assert_eq!(db.find_character("c1").unwrap().last_active, Some(42));
    }

    #[test]
    fn test_remove_histories_for_every_user() {
        let mut db = AppDatabase::default();
        db.history_mut("u1", "c1").push(Message::new(Role::User, "a"));
        db.history_mut("u2", "c1").push(Message::new(Role::User, "b"));
        db.history_mut("u1", "c10").push(Message::new(Role::User, "c"));
        assert_eq!(db.remove_histories_for("c1"), 2);
        assert_eq!(db.history("u1", "c10").len(), 1);
    }

    #[test]
    fn test_remove_histories_spares_ids_sharing_a_suffix() {
        let mut db = AppDatabase::default();
        db.users.push(user("u1", "alice"));
        db.users.push(user("legacy_7", "bob"));
        db.history_mut("u1", "c1").push(Message::new(Role::User, "a"));
        db.history_mut("legacy_7", "c1").push(Message::new(Role::User, "b"));
        db.history_mut("u1", "old_c1").push(Message::new(Role::User, "keep"));

        assert_eq!(db.remove_histories_for("c1"), 2);
        assert_eq!(db.history("u1", "old_c1").len(), 1);
        assert!(db.history("legacy_7", "c1").is_empty());
    }
}
