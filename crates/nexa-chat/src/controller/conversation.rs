//! One user's chat with one character: greeting, sending, editing,
//! regenerating and clearing, with every change written through the store.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::Confirm;
use crate::bridge::{ChatBridge, ChatSession};
use crate::error::SendError;
use crate::store::{AppStore, Attachment, Character, Message, Role, User};

pub const CLEAR_PROMPT: &str = "Clear the whole conversation history?";
pub const GREETING_ID: &str = "init";
const REGENERATE_SUFFIX: &str = " (Try again, differently)";

pub fn greeting(character: &Character) -> Message {
    Message::new(
        Role::Model,
        format!("*{} notices you.* {}", character.name, character.tagline),
    )
    .with_id(GREETING_ID)
}

fn fresh_start(character: &Character) -> Message {
    Message::new(
        Role::Model,
        format!("*{} looks at you again, as if seeing you for the first time.*", character.name),
    )
    .with_id(GREETING_ID)
}

/// Text handed to the model for a user turn.
fn outgoing_text(text: &str, attachment: Option<&Attachment>) -> String {
    match attachment {
        Some(_) => format!("[User sent an image] {}", text),
        None => text.to_string(),
    }
}

/// Clears the pending flag when the exchange ends, however it ends.
struct PendingGuard<'a>(&'a AtomicBool);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Conversation {
    store: Arc<AppStore>,
    bridge: Arc<ChatBridge>,
    user_id: String,
    character: Character,
    session: Mutex<ChatSession>,
    pending: AtomicBool,
}

impl Conversation {
    pub fn open(
        store: Arc<AppStore>,
        bridge: Arc<ChatBridge>,
        user: &User,
        character: &Character,
    ) -> anyhow::Result<Self> {
        let session = bridge.create_session(&character.system_instruction);
        if store.snapshot().history(&user.id, &character.id).is_empty() {
            let greeting = greeting(character);
            store.update(|db| {
                db.record_history(&user.id, &character.id, vec![greeting], Utc::now().timestamp_millis())
            })?;
            debug!("Greeted {} on behalf of {}", user.username, character.name);
        }
        Ok(Self {
            store,
            bridge,
            user_id: user.id.clone(),
            character: character.clone(),
            session: Mutex::new(session),
            pending: AtomicBool::new(false),
        })
    }

    pub fn character(&self) -> &Character {
        &self.character
    }

    pub fn messages(&self) -> Vec<Message> {
        self.store.snapshot().history(&self.user_id, &self.character.id).to_vec()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<PendingGuard<'_>, SendError> {
        if self.pending.swap(true, Ordering::AcqRel) {
            return Err(SendError::Busy);
        }
        Ok(PendingGuard(&self.pending))
    }

    fn append(&self, message: Message) -> anyhow::Result<()> {
        let user_id = &self.user_id;
        let character_id = &self.character.id;
        self.store.update(|db| {
            db.history_mut(user_id, character_id).push(message);
            db.touch_character(character_id, Utc::now().timestamp_millis());
        })?;
        Ok(())
    }

    async fn ask(&self, text: &str) -> Message {
        let reply = {
            let mut session = self.session.lock().await;
            self.bridge.send(&mut session, text).await
        };
        Message::new(Role::Model, reply)
    }

    /// Send a user turn and append the character's reply. Rejected while
    /// another exchange on this conversation is still in flight.
    pub async fn send(&self, text: &str, attachment: Option<Attachment>) -> Result<Message, SendError> {
        let text = text.trim();
        if text.is_empty() && attachment.is_none() {
            return Err(SendError::Empty);
        }
        let _pending = self.begin()?;

        let outgoing = outgoing_text(text, attachment.as_ref());
        self.append(Message::new(Role::User, text).with_attachment(attachment))?;

        let reply = self.ask(&outgoing).await;
        self.append(reply.clone())?;
        Ok(reply)
    }

    pub fn edit_message(&self, message_id: &str, text: &str) -> Result<(), SendError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SendError::Empty);
        }
        let user_id = &self.user_id;
        let character_id = &self.character.id;
        self.store.try_update(|db| -> Result<(), SendError> {
            let message = db
                .history_mut(user_id, character_id)
                .iter_mut()
                .find(|m| m.id == message_id && m.role == Role::User)
                .ok_or_else(|| SendError::NotEditable(message_id.to_string()))?;
            message.text = text.to_string();
            message.is_edited = true;
            Ok(())
        })??;
        Ok(())
    }

    /// Replace the trailing model reply with a fresh one.
    pub async fn regenerate(&self) -> Result<Message, SendError> {
        let _pending = self.begin()?;

        let history = self.messages();
        let ends_with_reply = history.last().map(|m| m.role == Role::Model).unwrap_or(false);
        if history.len() < 2 || !ends_with_reply {
            return Err(SendError::NothingToRegenerate);
        }
        let last_user = history
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .ok_or(SendError::NothingToRegenerate)?;
        let outgoing = format!(
            "{}{}",
            outgoing_text(&last_user.text, last_user.attachment.as_ref()),
            REGENERATE_SUFFIX
        );

        let user_id = &self.user_id;
        let character_id = &self.character.id;
        self.store.update(|db| {
            db.history_mut(user_id, character_id).pop();
        })?;
        info!("Regenerating last reply from {}", self.character.name);

        let reply = self.ask(&outgoing).await;
        self.append(reply.clone())?;
        Ok(reply)
    }

    /// Wipe the history and start a new session. Returns false when the
    /// user declines.
    pub async fn clear(&self, confirm: &dyn Confirm) -> Result<bool, SendError> {
        if !confirm.confirm(CLEAR_PROMPT) {
            return Ok(false);
        }
        let _pending = self.begin()?;

        *self.session.lock().await = self.bridge.create_session(&self.character.system_instruction);
        let start = fresh_start(&self.character);
        self.store.update(|db| {
            db.record_history(
                &self.user_id,
                &self.character.id,
                vec![start],
                Utc::now().timestamp_millis(),
            )
        })?;
        info!("Cleared conversation with {}", self.character.name);
        Ok(true)
    }

    pub fn set_wallpaper(&self, url: Option<String>) -> Result<(), SendError> {
        let character_id = &self.character.id;
        let (found, _) = self.store.update(|db| match db.find_character_mut(character_id) {
            Some(character) => {
                character.wallpaper = url;
                true
            }
            None => false,
        })?;
        if !found {
            warn!("Character {} disappeared before the wallpaper was saved", character_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::gemini::{BackendError, GenerateResponse, GenerationConfig};
    use crate::bridge::replies::RATE_LIMITED_REPLY;
    use crate::bridge::testing::ScriptedBackend;
    use crate::bridge::RetryPolicy;
    use crate::store::{seed, InMemoryKeyValueStore, PersistentStore};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn user() -> User {
        User {
            id: "u1".into(),
            email: "a@b.io".into(),
            username: "alice".into(),
            password: String::new(),
            avatar: String::new(),
            created_at: Utc::now(),
        }
    }

    fn store() -> Arc<AppStore> {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        Arc::new(AppStore::open(PersistentStore::new(kv)))
    }

    fn bridge(backend: ScriptedBackend) -> (Arc<ChatBridge>, Arc<ScriptedBackend>) {
        let backend = Arc::new(backend);
        let bridge = ChatBridge::new(
            backend.clone(),
            RetryPolicy::new(3, Duration::from_millis(1)),
            GenerationConfig { temperature: 1.15, top_k: 40, top_p: 0.95 },
            "English",
        );
        (Arc::new(bridge), backend)
    }

    fn open(backend: ScriptedBackend) -> (Conversation, Arc<AppStore>, Arc<ScriptedBackend>) {
        let store = store();
        let (bridge, backend) = bridge(backend);
        let character = seed::characters().remove(0);
        let conversation = Conversation::open(store.clone(), bridge, &user(), &character).unwrap();
        (conversation, store, backend)
    }

    #[test]
    fn test_open_greets_once() {
        let (conversation, store, _) = open(ScriptedBackend::new(vec![]));
        let messages = conversation.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, GREETING_ID);
        assert!(messages[0].text.starts_with(&format!("*{} notices you.*", conversation.character().name)));

        let (bridge, _) = bridge(ScriptedBackend::new(vec![]));
        let reopened = Conversation::open(store, bridge, &user(), conversation.character()).unwrap();
        assert_eq!(reopened.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_send_appends_both_turns() {
        let (conversation, store, _) = open(ScriptedBackend::echo_forever("*smiles*"));
        let reply = conversation.send("  hello  ", None).await.unwrap();
        assert_eq!(reply.text, "*smiles*");

        let messages = conversation.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].text, "hello");
        assert_eq!(messages[2].role, Role::Model);
        assert!(store
            .snapshot()
            .find_character(&conversation.character().id)
            .unwrap()
            .last_active
            .is_some());
    }

    #[tokio::test]
    async fn test_empty_send_rejected() {
        let (conversation, _, backend) = open(ScriptedBackend::new(vec![]));
        assert!(matches!(conversation.send("   ", None).await, Err(SendError::Empty)));
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_attachment_is_announced() {
        let (conversation, _, backend) = open(ScriptedBackend::echo_forever("*looks*"));
        conversation
            .send("", Some(Attachment::image("data:image/png;base64,AAAA")))
            .await
            .unwrap();
        let sent = backend.requests()[0].contents.last().unwrap().text();
        assert_eq!(sent, "[User sent an image] ");
        assert!(conversation.messages()[1].attachment.is_some());
    }

    #[tokio::test]
    async fn test_second_send_while_pending_is_busy() {
        let gate = Arc::new(Notify::new());
        let (conversation, _, backend) =
            open(ScriptedBackend::echo_forever("*answers*").gated(gate.clone()));

        let (first, second) = tokio::join!(conversation.send("one", None), async {
            tokio::task::yield_now().await;
            assert!(conversation.is_pending());
            let second = conversation.send("two", None).await;
            gate.notify_one();
            second
        });

        tokio_test::assert_ok!(first);
        assert!(matches!(second, Err(SendError::Busy)));
        assert!(!conversation.is_pending());
        assert_eq!(backend.requests().len(), 1);
        assert_eq!(conversation.messages().len(), 3);
    }

    #[tokio::test]
    async fn test_rate_limited_reply_lands_in_history() {
        let limited = || Err(BackendError::Status { status: 429, message: "quota".into() });
        let (conversation, _, _) = open(ScriptedBackend::new(vec![limited(), limited(), limited()]));
        let reply = conversation.send("hi", None).await.unwrap();
        assert_eq!(reply.text, RATE_LIMITED_REPLY);
        assert_eq!(conversation.messages().last().unwrap().text, RATE_LIMITED_REPLY);
    }

    #[tokio::test]
    async fn test_edit_only_user_messages() {
        let (conversation, _, _) = open(ScriptedBackend::echo_forever("ok"));
        conversation.send("helo", None).await.unwrap();
        let messages = conversation.messages();

        conversation.edit_message(&messages[1].id, "hello").unwrap();
        let edited = &conversation.messages()[1];
        assert_eq!(edited.text, "hello");
        assert!(edited.is_edited);

        assert!(matches!(
            conversation.edit_message(&messages[2].id, "nope"),
            Err(SendError::NotEditable(_))
        ));
        assert!(!conversation.messages()[2].is_edited);
    }

    #[tokio::test]
    async fn test_blank_edit_rejected() {
        let (conversation, _, _) = open(ScriptedBackend::echo_forever("ok"));
        conversation.send("original", None).await.unwrap();
        let id = conversation.messages()[1].id.clone();

        assert!(matches!(conversation.edit_message(&id, "   "), Err(SendError::Empty)));
        let kept = &conversation.messages()[1];
        assert_eq!(kept.text, "original");
        assert!(!kept.is_edited);

        conversation.edit_message(&id, "  trimmed  ").unwrap();
        assert_eq!(conversation.messages()[1].text, "trimmed");
    }

    #[tokio::test]
    async fn test_regenerate_replaces_trailing_reply() {
        let (conversation, _, backend) = open(ScriptedBackend::new(vec![
            Ok(GenerateResponse { text: "first".into(), ..Default::default() }),
            Ok(GenerateResponse { text: "second".into(), ..Default::default() }),
        ]));
        conversation.send("tell me a story", None).await.unwrap();
        let reply = conversation.regenerate().await.unwrap();
        assert_eq!(reply.text, "second");

        let messages = conversation.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].text, "second");
        let asked = backend.requests()[1].contents.last().unwrap().text();
        assert_eq!(asked, "tell me a story (Try again, differently)");
    }

    #[tokio::test]
    async fn test_regenerate_needs_an_exchange() {
        let (conversation, _, _) = open(ScriptedBackend::new(vec![]));
        assert!(matches!(conversation.regenerate().await, Err(SendError::NothingToRegenerate)));
        assert_eq!(conversation.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_requires_confirmation() {
        let (conversation, _, _) = open(ScriptedBackend::echo_forever("ok"));
        conversation.send("hi", None).await.unwrap();

        assert!(!conversation.clear(&|_: &str| false).await.unwrap());
        assert_eq!(conversation.messages().len(), 3);

        assert!(conversation.clear(&|_: &str| true).await.unwrap());
        let messages = conversation.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].text.contains("as if seeing you for the first time"));
    }

    #[test]
    fn test_wallpaper_is_saved_on_character() {
        let (conversation, store, _) = open(ScriptedBackend::new(vec![]));
        conversation.set_wallpaper(Some("https://example.com/bg.jpg".into())).unwrap();
        let db = store.snapshot();
        let character = db.find_character(&conversation.character().id).unwrap();
        assert_eq!(character.wallpaper.as_deref(), Some("https://example.com/bg.jpg"));
    }
}
