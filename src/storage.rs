//! # Local Storage
//!
//! Everything Vox remembers between invocations, apart from the identity
//! itself, lives next to `config.toml` in the Vox home:
//!
//! ```text
//! $VOX_HOME/
//! ├── config.toml
//! ├── contacts.toml   name = "vox id"
//! ├── rooms.toml      "vox id" = "!room:server"
//! ├── history.toml    [conversations.<id>] with_contact + messages
//! └── sync_token      last `next_batch` from the homeserver
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A single message as exchanged between agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub from_vox_id: String,
    pub to_vox_id: String,
    /// RFC 3339, UTC, `Z` suffix. Compared as a string for ordering.
    pub timestamp: String,
    pub conversation_id: String,
    pub body: String,
}

/// An ordered exchange with one counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub conversation_id: String,
    pub with_contact: String,
    pub messages: Vec<Message>,
}

/// JSON shape printed by `vox inbox` and `vox conversation`.
#[derive(Debug, Serialize)]
pub struct ConversationRecord<'a> {
    pub conversation_id: &'a str,
    pub with: &'a str,
    pub messages: Vec<MessageRecord<'a>>,
}

#[derive(Debug, Serialize)]
pub struct MessageRecord<'a> {
    pub from: &'a str,
    pub body: &'a str,
    pub timestamp: &'a str,
}

impl Conversation {
    pub fn to_record(&self) -> ConversationRecord<'_> {
        ConversationRecord {
            conversation_id: &self.conversation_id,
            with: &self.with_contact,
            messages: self
                .messages
                .iter()
                .map(|m| MessageRecord {
                    from: &m.from_vox_id,
                    body: &m.body,
                    timestamp: &m.timestamp,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct History {
    #[serde(default)]
    conversations: BTreeMap<String, StoredConversation>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredConversation {
    with_contact: String,
    #[serde(default)]
    messages: Vec<Message>,
}

/// File-backed store rooted at a Vox home directory.
#[derive(Debug, Clone)]
pub struct Storage {
    home: PathBuf,
    contacts_file: PathBuf,
    rooms_file: PathBuf,
    history_file: PathBuf,
    sync_token_file: PathBuf,
}

impl Storage {
    /// Open (and create if needed) the store in `home`.
    pub fn open(home: &Path) -> Result<Self> {
        fs::create_dir_all(home)
            .with_context(|| format!("Failed to create Vox home: {}", home.display()))?;

        let storage = Self {
            home: home.to_path_buf(),
            contacts_file: home.join("contacts.toml"),
            rooms_file: home.join("rooms.toml"),
            history_file: home.join("history.toml"),
            sync_token_file: home.join("sync_token"),
        };
        storage.ensure_files()?;
        Ok(storage)
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    fn ensure_files(&self) -> Result<()> {
        for file in [&self.contacts_file, &self.rooms_file] {
            if !file.exists() {
                write_toml(file, &BTreeMap::<String, String>::new())?;
            }
        }
        if !self.history_file.exists() {
            write_toml(&self.history_file, &History::default())?;
        }
        Ok(())
    }

    // -- Contacts ----------------------------------------------------------

    /// Add or replace a contact.
    pub fn add_contact(&self, name: &str, vox_id: &str) -> Result<()> {
        let mut contacts = self.contacts()?;
        contacts.insert(name.to_string(), vox_id.to_string());
        write_toml(&self.contacts_file, &contacts)
    }

    /// All contacts, sorted by name.
    pub fn contacts(&self) -> Result<BTreeMap<String, String>> {
        read_toml(&self.contacts_file)
    }

    pub fn contact(&self, name: &str) -> Result<Option<String>> {
        Ok(self.contacts()?.remove(name))
    }

    /// Remove a contact. Returns whether it existed.
    pub fn remove_contact(&self, name: &str) -> Result<bool> {
        let mut contacts = self.contacts()?;
        if contacts.remove(name).is_none() {
            return Ok(false);
        }
        write_toml(&self.contacts_file, &contacts)?;
        Ok(true)
    }

    // -- Rooms -------------------------------------------------------------

    pub fn room(&self, vox_id: &str) -> Result<Option<String>> {
        let mut rooms: BTreeMap<String, String> = read_toml(&self.rooms_file)?;
        Ok(rooms.remove(vox_id))
    }

    pub fn set_room(&self, vox_id: &str, room_id: &str) -> Result<()> {
        let mut rooms: BTreeMap<String, String> = read_toml(&self.rooms_file)?;
        rooms.insert(vox_id.to_string(), room_id.to_string());
        write_toml(&self.rooms_file, &rooms)
    }

    // -- Sync token --------------------------------------------------------

    pub fn sync_token(&self) -> Result<Option<String>> {
        if !self.sync_token_file.exists() {
            return Ok(None);
        }
        let token = fs::read_to_string(&self.sync_token_file).with_context(|| {
            format!(
                "Failed to read sync token: {}",
                self.sync_token_file.display()
            )
        })?;
        let token = token.trim();
        Ok((!token.is_empty()).then(|| token.to_string()))
    }

    pub fn set_sync_token(&self, token: &str) -> Result<()> {
        fs::write(&self.sync_token_file, token).with_context(|| {
            format!(
                "Failed to write sync token: {}",
                self.sync_token_file.display()
            )
        })
    }

    pub fn clear_sync_token(&self) -> Result<()> {
        if self.sync_token_file.exists() {
            fs::remove_file(&self.sync_token_file).with_context(|| {
                format!(
                    "Failed to remove sync token: {}",
                    self.sync_token_file.display()
                )
            })?;
        }
        Ok(())
    }

    // -- History -----------------------------------------------------------

    /// Merge messages into a conversation's local history.
    ///
    /// Messages already present (same timestamp and body) are skipped; the
    /// stored list stays sorted by timestamp. The file is only rewritten when
    /// something was added.
    pub fn save_messages(
        &self,
        conversation_id: &str,
        with_contact: &str,
        messages: &[Message],
    ) -> Result<()> {
        let mut history: History = read_toml(&self.history_file)?;
        let conversation = history
            .conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| StoredConversation {
                with_contact: with_contact.to_string(),
                messages: Vec::new(),
            });

        let mut added = false;
        for message in messages {
            let duplicate = conversation
                .messages
                .iter()
                .any(|m| m.timestamp == message.timestamp && m.body == message.body);
            if !duplicate {
                conversation.messages.push(message.clone());
                added = true;
            }
        }

        if added {
            conversation
                .messages
                .sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
            write_toml(&self.history_file, &history)?;
        }
        Ok(())
    }

    pub fn history(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        let mut history: History = read_toml(&self.history_file)?;
        Ok(history
            .conversations
            .remove(conversation_id)
            .map(|stored| into_conversation(conversation_id.to_string(), stored)))
    }

    pub fn conversations(&self) -> Result<Vec<Conversation>> {
        let history: History = read_toml(&self.history_file)?;
        Ok(history
            .conversations
            .into_iter()
            .map(|(id, stored)| into_conversation(id, stored))
            .collect())
    }
}

fn into_conversation(conversation_id: String, stored: StoredConversation) -> Conversation {
    Conversation {
        conversation_id,
        with_contact: stored.with_contact,
        messages: stored.messages,
    }
}

fn read_toml<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let contents = toml::to_string(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, Storage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open(temp_dir.path()).unwrap();
        (temp_dir, storage)
    }

    fn message(timestamp: &str, body: &str) -> Message {
        Message {
            from_vox_id: "vox_user1".to_string(),
            to_vox_id: "vox_user2".to_string(),
            timestamp: timestamp.to_string(),
            conversation_id: "conv_abc123".to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_open_creates_files() {
        let (temp_dir, _storage) = open_temp();
        assert!(temp_dir.path().join("contacts.toml").exists());
        assert!(temp_dir.path().join("rooms.toml").exists());
        assert!(temp_dir.path().join("history.toml").exists());
        assert!(!temp_dir.path().join("sync_token").exists());
    }

    #[test]
    fn test_add_and_get_contact() {
        let (_temp_dir, storage) = open_temp();
        storage.add_contact("test_user", "vox_test123").unwrap();

        assert_eq!(
            storage.contacts().unwrap().get("test_user").map(String::as_str),
            Some("vox_test123")
        );
        assert_eq!(
            storage.contact("test_user").unwrap().as_deref(),
            Some("vox_test123")
        );
        assert_eq!(storage.contact("nonexistent").unwrap(), None);
    }

    #[test]
    fn test_add_contact_overwrites() {
        let (_temp_dir, storage) = open_temp();
        storage.add_contact("bob", "vox_old").unwrap();
        storage.add_contact("bob", "vox_new").unwrap();
        assert_eq!(storage.contact("bob").unwrap().as_deref(), Some("vox_new"));
        assert_eq!(storage.contacts().unwrap().len(), 1);
    }

    #[test]
    fn test_contact_names_needing_quotes() {
        let (_temp_dir, storage) = open_temp();
        storage.add_contact("my agent.v2", "@agent:vox.pm").unwrap();
        assert_eq!(
            storage.contact("my agent.v2").unwrap().as_deref(),
            Some("@agent:vox.pm")
        );
    }

    #[test]
    fn test_remove_contact() {
        let (_temp_dir, storage) = open_temp();
        storage.add_contact("test_user", "vox_test123").unwrap();

        assert!(storage.remove_contact("test_user").unwrap());
        assert!(!storage.contacts().unwrap().contains_key("test_user"));
        assert!(!storage.remove_contact("nonexistent").unwrap());
    }

    #[test]
    fn test_sync_token() {
        let (_temp_dir, storage) = open_temp();
        assert_eq!(storage.sync_token().unwrap(), None);

        storage.set_sync_token("test_token_123").unwrap();
        assert_eq!(
            storage.sync_token().unwrap().as_deref(),
            Some("test_token_123")
        );

        storage.clear_sync_token().unwrap();
        assert_eq!(storage.sync_token().unwrap(), None);
        // Clearing twice is fine
        storage.clear_sync_token().unwrap();
    }

    #[test]
    fn test_rooms() {
        let (_temp_dir, storage) = open_temp();
        assert_eq!(storage.room("@bob:vox.pm").unwrap(), None);
        storage.set_room("@bob:vox.pm", "!abc:vox.pm").unwrap();
        assert_eq!(
            storage.room("@bob:vox.pm").unwrap().as_deref(),
            Some("!abc:vox.pm")
        );
    }

    #[test]
    fn test_save_messages_dedup_and_sort() {
        let (_temp_dir, storage) = open_temp();
        storage
            .save_messages(
                "conv_abc123",
                "user2",
                &[
                    message("2025-01-01T12:05:00Z", "second"),
                    message("2025-01-01T12:00:00Z", "first"),
                ],
            )
            .unwrap();
        storage
            .save_messages(
                "conv_abc123",
                "ignored",
                &[message("2025-01-01T12:00:00Z", "first")],
            )
            .unwrap();

        let conversation = storage.history("conv_abc123").unwrap().unwrap();
        assert_eq!(conversation.with_contact, "user2");
        let bodies: Vec<_> = conversation.messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second"]);
    }

    #[test]
    fn test_history_missing() {
        let (_temp_dir, storage) = open_temp();
        assert!(storage.history("conv_nope").unwrap().is_none());
        assert!(storage.conversations().unwrap().is_empty());
    }

    #[test]
    fn test_conversations_lists_all() {
        let (_temp_dir, storage) = open_temp();
        storage
            .save_messages("conv_a", "alice", &[message("2025-01-01T00:00:00Z", "hi")])
            .unwrap();
        storage
            .save_messages("conv_b", "bob", &[message("2025-01-02T00:00:00Z", "yo")])
            .unwrap();

        let conversations = storage.conversations().unwrap();
        assert_eq!(conversations.len(), 2);
        assert_eq!(conversations[0].conversation_id, "conv_a");
        assert_eq!(conversations[1].with_contact, "bob");
    }

    #[test]
    fn test_conversation_record_json_shape() {
        let conversation = Conversation {
            conversation_id: "conv_abc123".to_string(),
            with_contact: "user2".to_string(),
            messages: vec![message("2025-01-01T12:00:00Z", "Hello, world!")],
        };

        let json = serde_json::to_value(conversation.to_record()).unwrap();
        assert_eq!(json["conversation_id"], "conv_abc123");
        assert_eq!(json["with"], "user2");
        assert_eq!(json["messages"][0]["from"], "vox_user1");
        assert_eq!(json["messages"][0]["body"], "Hello, world!");
        assert_eq!(json["messages"][0]["timestamp"], "2025-01-01T12:00:00Z");
        assert!(json["messages"][0].get("to").is_none());
    }

    #[test]
    fn test_corrupted_contacts_file() {
        let (temp_dir, storage) = open_temp();
        fs::write(temp_dir.path().join("contacts.toml"), "not = = valid").unwrap();
        let err = storage.contacts().unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
