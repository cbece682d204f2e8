use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::kv::KeyValueStore;
use super::schema::AppDatabase;

pub const DB_KEY: &str = "character_ai_nexa_db_v3";
pub const SESSION_KEY: &str = "character_ai_nexa_session_v3";

/// The database blob and the active session id, both kept in a
/// [`KeyValueStore`].
#[derive(Clone)]
pub struct PersistentStore {
    kv: Arc<dyn KeyValueStore>,
}

impl PersistentStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Never fails: a missing, unreadable or malformed blob yields the
    /// default database.
    pub fn load(&self) -> AppDatabase {
        let raw = match self.kv.get(DB_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                info!("No stored database found, starting from seed data");
                return AppDatabase::default();
            }
            Err(e) => {
                error!("Database load error: {:#}", e);
                return AppDatabase::default();
            }
        };

        match serde_json::from_str::<AppDatabase>(&raw) {
            Ok(db) => {
                debug!(
                    "Loaded database: {} users, {} characters, {} histories",
                    db.users.len(),
                    db.characters.len(),
                    db.chat_histories.len()
                );
                db
            }
            Err(e) => {
                warn!("Stored database is malformed ({}), falling back to seed data", e);
                AppDatabase::default()
            }
        }
    }

    pub fn save(&self, db: &AppDatabase) -> Result<()> {
        let json = serde_json::to_string(db).context("Failed to serialize database")?;
        self.kv.set(DB_KEY, &json).context("Failed to persist database")?;
        debug!("Persisted database ({} bytes)", json.len());
        Ok(())
    }

    pub fn session_user_id(&self) -> Option<String> {
        match self.kv.get(SESSION_KEY) {
            Ok(value) => value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()),
            Err(e) => {
                warn!("Failed to read session: {:#}", e);
                None
            }
        }
    }

    pub fn set_session_user_id(&self, user_id: &str) -> Result<()> {
        self.kv.set(SESSION_KEY, user_id).context("Failed to persist session")
    }

    pub fn clear_session(&self) -> Result<()> {
        self.kv.remove(SESSION_KEY).context("Failed to clear session")
    }
}
