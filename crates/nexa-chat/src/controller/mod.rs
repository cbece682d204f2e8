// nexa-chat/crates/nexa-chat/src/controller/mod.rs

//! Application state machine: who is signed in, which screen is open and
//! every mutation of the database, each one persisted wholesale through
//! [`AppStore`].

pub mod conversation;
pub mod screen;

pub use conversation::Conversation;
pub use screen::{project, Screen, ViewState};

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::auth::{
    default_avatar_url, first_validation_message, hash_password, verify_password, LoginForm,
    PasswordCheck, RegisterForm,
};
use crate::bridge::ChatBridge;
use crate::error::ControllerError;
use crate::store::{AppStore, Character, CharacterView, Notification, User};
use crate::utils::TextUtils;

pub const LOGOUT_PROMPT: &str = "Are you sure you want to log out?";
pub const DELETE_PROMPT: &str = "Delete this character? This cannot be undone.";

/// Asks the user to approve a destructive action.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileTab {
    #[default]
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileStats {
    pub characters: usize,
    pub likes: u64,
}

/// Form contents for creating or editing a character.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharacterDraft {
    pub id: Option<String>,
    pub name: String,
    pub tagline: String,
    pub description: String,
    pub system_instruction: String,
    pub avatar_url: String,
    pub wallpaper: Option<String>,
    pub is_public: bool,
}

impl CharacterDraft {
    pub fn from_character(character: &Character) -> Self {
        Self {
            id: Some(character.id.clone()),
            name: character.name.clone(),
            tagline: character.tagline.clone(),
            description: character.description.clone(),
            system_instruction: character.system_instruction.clone(),
            avatar_url: character.avatar_url.clone(),
            wallpaper: character.wallpaper.clone(),
            is_public: character.is_public,
        }
    }
}

pub struct AppController {
    store: Arc<AppStore>,
    user: Option<User>,
    view: ViewState,
    selected: Option<String>,
    auth_error: Option<String>,
    search_query: String,
    profile_tab: ProfileTab,
}

impl AppController {
    /// Restore the persisted session, if it still names a known user.
    pub fn bootstrap(store: Arc<AppStore>) -> Self {
        let mut controller = Self {
            store,
            user: None,
            view: ViewState::Auth,
            selected: None,
            auth_error: None,
            search_query: String::new(),
            profile_tab: ProfileTab::default(),
        };

        if let Some(user_id) = controller.store.persistence().session_user_id() {
            match controller.store.snapshot().find_user(&user_id) {
                Some(user) => {
                    info!("Restored session for {}", user.username);
                    controller.user = Some(user.clone());
                    controller.view = ViewState::Home;
                }
                None => {
                    warn!("Session refers to unknown user {}, signing out", user_id);
                    if let Err(e) = controller.store.persistence().clear_session() {
                        warn!("Failed to clear stale session: {:#}", e);
                    }
                }
            }
        }
        controller
    }

    pub fn store(&self) -> &Arc<AppStore> {
        &self.store
    }

    pub fn current_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn selected_character_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn auth_error(&self) -> Option<&str> {
        self.auth_error.as_deref()
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn profile_tab(&self) -> ProfileTab {
        self.profile_tab
    }

    pub fn screen(&self) -> Screen {
        let db = self.store.snapshot();
        let selected = self.selected.as_deref().and_then(|id| db.find_character(id));
        project(self.view, self.user.as_ref(), selected, self.auth_error.as_deref())
    }

    fn require_user(&self) -> Result<&User, ControllerError> {
        self.user.as_ref().ok_or(ControllerError::NotSignedIn)
    }

    fn require_owned(&self, character_id: &str) -> Result<Character, ControllerError> {
        let user = self.require_user()?;
        let db = self.store.snapshot();
        let character = db
            .find_character(character_id)
            .ok_or_else(|| ControllerError::CharacterNotFound(character_id.to_string()))?;
        if !character.is_owned_by(user) {
            return Err(ControllerError::NotOwner(character_id.to_string()));
        }
        Ok(character.clone())
    }

    fn sign_in(&mut self, user: User) -> Result<(), ControllerError> {
        self.store.persistence().set_session_user_id(&user.id)?;
        info!("{} signed in", user.username);
        self.user = Some(user);
        self.auth_error = None;
        self.selected = None;
        self.view = ViewState::Home;
        Ok(())
    }

    fn fail_auth(&mut self, error: ControllerError) -> ControllerError {
        self.auth_error = Some(error.to_string());
        error
    }

    pub fn login(&mut self, email: &str, password: &str) -> Result<(), ControllerError> {
        let form = LoginForm::new(email, password);
        if form.validate().is_err() {
            return Err(self.fail_auth(ControllerError::InvalidCredentials));
        }

        let Some(user) = self.store.snapshot().find_user_by_email(&form.email).cloned() else {
            debug!("Login attempt for unknown email");
            return Err(self.fail_auth(ControllerError::InvalidCredentials));
        };

        let user = match verify_password(&user.password, &form.password) {
            PasswordCheck::Valid => user,
            PasswordCheck::ValidLegacy => {
                info!("Upgrading stored password for {} to a hash", user.username);
                let hashed = hash_password(&form.password)?;
                let user_id = user.id.clone();
                let (upgraded, _) = self.store.update(|db| {
                    let stored = db.users.iter_mut().find(|u| u.id == user_id);
                    stored.map(|u| {
                        u.password = hashed;
                        u.clone()
                    })
                })?;
                upgraded.unwrap_or(user)
            }
            PasswordCheck::Invalid => {
                return Err(self.fail_auth(ControllerError::InvalidCredentials));
            }
        };
        self.sign_in(user)
    }

    pub fn register(&mut self, email: &str, username: &str, password: &str) -> Result<(), ControllerError> {
        let form = RegisterForm::new(email, username, password);
        if let Err(errors) = form.validate() {
            let message = first_validation_message(&errors);
            return Err(self.fail_auth(ControllerError::Validation(message)));
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: form.email.clone(),
            username: form.username.clone(),
            password: hash_password(&form.password)?,
            avatar: default_avatar_url(&form.username),
            created_at: Utc::now(),
        };

        let outcome = self.store.try_update(|db| {
            if db.email_taken(&user.email) {
                return Err(ControllerError::DuplicateEmail);
            }
            db.users.push(user.clone());
            Ok(())
        })?;
        if let Err(e) = outcome {
            return Err(self.fail_auth(e));
        }
        info!("Registered new user {}", user.username);
        self.sign_in(user)
    }

    /// Returns false when the user declines.
    pub fn logout(&mut self, confirm: &dyn Confirm) -> Result<bool, ControllerError> {
        if !confirm.confirm(LOGOUT_PROMPT) {
            return Ok(false);
        }
        self.store.persistence().clear_session()?;
        if let Some(user) = self.user.take() {
            info!("{} signed out", user.username);
        }
        self.selected = None;
        self.view = ViewState::Auth;
        Ok(true)
    }

    pub fn set_search_query(&mut self, query: &str) {
        self.search_query = query.to_string();
    }

    /// Characters the viewer may open, filtered by the search query and
    /// most recently active first.
    pub fn feed(&self) -> Vec<CharacterView> {
        let db = self.store.snapshot();
        let viewer = self.user.as_ref();
        let query = self.search_query.trim();

        let mut visible: Vec<&Character> = db
            .characters
            .iter()
            .filter(|c| c.is_public || viewer.map(|u| c.is_owned_by(u)).unwrap_or(false))
            .filter(|c| {
                TextUtils::contains_ignore_case(&c.name, query)
                    || TextUtils::contains_ignore_case(&c.tagline, query)
            })
            .collect();
        visible.sort_by_key(|c| std::cmp::Reverse(c.last_active.unwrap_or(0)));
        visible.into_iter().map(|c| c.view_for(viewer)).collect()
    }

    pub fn my_characters(&self) -> Vec<CharacterView> {
        let Some(user) = self.user.as_ref() else {
            return Vec::new();
        };
        self.store
            .snapshot()
            .characters
            .iter()
            .filter(|c| c.is_owned_by(user))
            .map(|c| c.view_for(Some(user)))
            .collect()
    }

    /// Own characters on the selected profile tab.
    pub fn profile_characters(&self) -> Vec<CharacterView> {
        let public = self.profile_tab == ProfileTab::Public;
        self.my_characters()
            .into_iter()
            .filter(|v| v.character.is_public == public)
            .collect()
    }

    pub fn profile_stats(&self) -> ProfileStats {
        let mine = self.my_characters();
        ProfileStats {
            characters: mine.len(),
            likes: mine.iter().map(|v| v.character.likes).sum(),
        }
    }

    pub fn set_profile_tab(&mut self, tab: ProfileTab) {
        self.profile_tab = tab;
    }

    pub fn select_character(&mut self, character_id: &str) -> Result<(), ControllerError> {
        self.require_user()?;
        if self.store.snapshot().find_character(character_id).is_none() {
            return Err(ControllerError::CharacterNotFound(character_id.to_string()));
        }
        self.selected = Some(character_id.to_string());
        self.view = ViewState::Chat;
        Ok(())
    }

    pub fn back_from_chat(&mut self) {
        self.selected = None;
        self.view = ViewState::Home;
    }

    pub fn open_home(&mut self) {
        self.selected = None;
        self.view = ViewState::Home;
    }

    pub fn open_create(&mut self) {
        self.selected = None;
        self.view = ViewState::Create;
    }

    pub fn open_profile(&mut self) {
        self.selected = None;
        self.view = ViewState::Profile;
    }

    pub fn cancel_form(&mut self) {
        match self.view {
            ViewState::Create => self.view = ViewState::Home,
            ViewState::Edit => {
                self.selected = None;
                self.view = ViewState::Profile;
            }
            _ => {}
        }
    }

    pub fn edit_character(&mut self, character_id: &str) -> Result<(), ControllerError> {
        self.require_owned(character_id)?;
        self.selected = Some(character_id.to_string());
        self.view = ViewState::Edit;
        Ok(())
    }

    /// Create or replace a character from a form. New characters go to the
    /// front of the list; existing ones keep their position and counters.
    pub fn save_character(&mut self, draft: CharacterDraft) -> Result<Character, ControllerError> {
        let user = self.require_user()?.clone();
        let name = draft.name.trim().to_string();
        let tagline = draft.tagline.trim().to_string();
        if name.is_empty() {
            return Err(ControllerError::MissingField("name"));
        }
        if tagline.is_empty() {
            return Err(ControllerError::MissingField("tagline"));
        }

        let existing = match draft.id.as_deref() {
            Some(id) if self.store.snapshot().find_character(id).is_some() => {
                Some(self.require_owned(id)?)
            }
            _ => None,
        };

        let description = if TextUtils::is_blank(&draft.description) {
            tagline.clone()
        } else {
            draft.description.trim().to_string()
        };
        let system_instruction = if TextUtils::is_blank(&draft.system_instruction) {
            format!("You are {}. {}. Behave naturally.", name, description)
        } else {
            draft.system_instruction.trim().to_string()
        };
        let avatar_url = if TextUtils::is_blank(&draft.avatar_url) {
            default_avatar_url(&name)
        } else {
            draft.avatar_url.trim().to_string()
        };

        let character = Character {
            id: existing
                .as_ref()
                .map(|c| c.id.clone())
                .or(draft.id)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            name,
            tagline,
            description,
            system_instruction,
            avatar_url,
            wallpaper: draft.wallpaper,
            creator: user.username.clone(),
            creator_id: Some(user.id.clone()),
            is_public: draft.is_public,
            chat_count: existing.as_ref().map(|c| c.chat_count.clone()).unwrap_or_else(|| "0".to_string()),
            likes: existing.as_ref().map(|c| c.likes).unwrap_or(0),
            last_active: existing.as_ref().and_then(|c| c.last_active),
        };

        let saved = character.clone();
        self.store.update(|db| match db.find_character_mut(&character.id) {
            Some(slot) => *slot = character,
            None => db.characters.insert(0, character),
        })?;
        info!("Saved character {} ({})", saved.name, saved.id);

        self.selected = None;
        self.view = ViewState::Profile;
        Ok(saved)
    }

    /// Returns false when the user declines.
    pub fn delete_character(&mut self, character_id: &str, confirm: &dyn Confirm) -> Result<bool, ControllerError> {
        self.require_owned(character_id)?;
        if !confirm.confirm(DELETE_PROMPT) {
            return Ok(false);
        }
        let (removed_histories, _) = self.store.update(|db| {
            db.characters.retain(|c| c.id != character_id);
            db.remove_histories_for(character_id)
        })?;
        info!("Deleted character {} and {} chat histories", character_id, removed_histories);

        if self.selected.as_deref() == Some(character_id) {
            self.selected = None;
            self.view = ViewState::Profile;
        }
        Ok(true)
    }

    pub fn toggle_publish(&mut self, character_id: &str) -> Result<bool, ControllerError> {
        self.require_owned(character_id)?;
        let (is_public, _) = self.store.update(|db| {
            db.find_character_mut(character_id)
                .map(|c| {
                    c.is_public = !c.is_public;
                    c.is_public
                })
                .unwrap_or(false)
        })?;
        debug!("Character {} is now {}", character_id, if is_public { "public" } else { "private" });
        Ok(is_public)
    }

    pub fn update_character(&mut self, character: Character) -> Result<(), ControllerError> {
        self.require_user()?;
        let id = character.id.clone();
        self.store
            .try_update(|db| match db.find_character_mut(&id) {
                Some(slot) => {
                    *slot = character;
                    Ok(())
                }
                None => Err(ControllerError::CharacterNotFound(id.clone())),
            })??;
        Ok(())
    }

    pub fn update_chat_history(
        &mut self,
        character_id: &str,
        messages: Vec<crate::store::Message>,
    ) -> Result<(), ControllerError> {
        let user_id = self.require_user()?.id.clone();
        self.store.update(|db| {
            db.record_history(&user_id, character_id, messages, Utc::now().timestamp_millis())
        })?;
        Ok(())
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.store.snapshot().notifications.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.store.snapshot().unread_notifications()
    }

    pub fn mark_all_notifications_read(&mut self) -> Result<(), ControllerError> {
        self.store.update(|db| {
            for notification in db.notifications.iter_mut() {
                notification.is_read = true;
            }
        })?;
        Ok(())
    }

    /// Start (or resume) the conversation with the selected character.
    pub fn open_conversation(&self, bridge: Arc<ChatBridge>) -> Result<Conversation, ControllerError> {
        let user = self.require_user()?;
        let character_id = self
            .selected
            .as_deref()
            .ok_or_else(|| ControllerError::CharacterNotFound(String::new()))?;
        let db = self.store.snapshot();
        let character = db
            .find_character(character_id)
            .ok_or_else(|| ControllerError::CharacterNotFound(character_id.to_string()))?;
        Ok(Conversation::open(self.store.clone(), bridge, user, character)?)
    }
}
