//! # Vox Client
//!
//! [`VoxClient`] ties the identity ([`Config`]), local state ([`Storage`])
//! and a message [`Transport`] together behind the operations the CLI
//! exposes. Contact management only touches local files and works before
//! `vox init`; everything that speaks for the agent needs an identity.

use crate::config::Config;
use crate::error::{Result, VoxError};
use crate::matrix::{matrix_user_id, DirectoryEntry, MatrixBackend, Transport};
use crate::storage::{Conversation, Storage};
use anyhow::Context;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Prefix every Vox id carries.
pub const VOX_ID_PREFIX: &str = "vox_";

/// Summary printed by `vox status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub vox_id: String,
    pub homeserver: String,
    pub contacts: usize,
}

/// Vox id for a requested username, or a random one.
pub fn vox_id_for(username: Option<&str>) -> String {
    match username {
        Some(name) if name.starts_with(VOX_ID_PREFIX) => name.to_string(),
        Some(name) => format!("{VOX_ID_PREFIX}{name}"),
        None => format!("{VOX_ID_PREFIX}{:08x}", rand::random::<u32>()),
    }
}

pub struct VoxClient {
    home: PathBuf,
    storage: Storage,
    config: Option<Config>,
    transport: Option<Box<dyn Transport>>,
}

impl VoxClient {
    /// Client over the Vox home at `home`. Nothing is loaded until needed.
    pub fn open(home: &Path) -> Result<Self> {
        let storage = Storage::open(home)?;
        Ok(Self {
            home: home.to_path_buf(),
            storage,
            config: None,
            transport: None,
        })
    }

    /// Use `transport` instead of connecting to the homeserver.
    pub fn with_transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    fn config(&mut self) -> Result<&Config> {
        if self.config.is_none() {
            self.config = Some(Config::load(&self.home)?);
        }
        self.config
            .as_ref()
            .ok_or_else(|| VoxError::NotInitialized(self.home.clone()))
    }

    fn transport(&mut self) -> Result<&mut Box<dyn Transport>> {
        if self.transport.is_none() {
            let config = self.config()?.clone();
            let backend = MatrixBackend::new(config, self.storage.clone())?;
            self.transport = Some(Box::new(backend));
        }
        self.transport
            .as_mut()
            .ok_or_else(|| VoxError::Transport("No transport available".to_string()))
    }

    /// Create and persist a new identity, replacing any existing one.
    pub fn initialize(&mut self, username: Option<&str>) -> Result<String> {
        let vox_id = vox_id_for(username);
        let mut config = Config::new(&vox_id);
        if let Some(previous) = self.config.take().or_else(|| Config::load(&self.home).ok()) {
            config.demo = previous.demo;
        }

        let domain = config.server_domain();
        config.access_token = Some(format!("vox_token_{}", uuid::Uuid::new_v4().simple()));
        config.device_id = Some(format!(
            "device_{}",
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        ));
        config.user_id = Some(matrix_user_id(&vox_id, &domain));

        config.save(&self.home)?;
        tracing::info!(%vox_id, home = %self.home.display(), "identity initialized");
        self.config = Some(config);
        Ok(vox_id)
    }

    pub fn whoami(&mut self) -> Result<String> {
        Ok(self.config()?.vox_id.clone())
    }

    pub fn status(&mut self) -> Result<Status> {
        let contacts = self.storage.contacts()?.len();
        let config = self.config()?;
        Ok(Status {
            vox_id: config.vox_id.clone(),
            homeserver: config.homeserver.clone(),
            contacts,
        })
    }

    pub fn add_contact(&self, name: &str, vox_id: &str) -> Result<()> {
        self.storage
            .add_contact(name, vox_id)
            .with_context(|| format!("Failed to add contact '{name}'"))?;
        Ok(())
    }

    pub fn list_contacts(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.storage.contacts()?)
    }

    pub fn remove_contact(&self, name: &str) -> Result<bool> {
        Ok(self.storage.remove_contact(name)?)
    }

    /// Send `message` to the contact named `contact`; returns the
    /// conversation id. The sent message is kept in local history.
    pub async fn send_message(
        &mut self,
        contact: &str,
        message: &str,
        conversation_id: Option<&str>,
    ) -> Result<String> {
        self.config()?;
        let vox_id = self
            .storage
            .contact(contact)?
            .ok_or_else(|| VoxError::ContactNotFound(contact.to_string()))?;

        let sent = self
            .transport()?
            .send_message(&vox_id, message, conversation_id)
            .await?;
        self.storage.save_messages(
            &sent.conversation_id,
            contact,
            std::slice::from_ref(&sent),
        )?;
        Ok(sent.conversation_id)
    }

    pub async fn inbox(&mut self, from_contact: Option<&str>) -> Result<Vec<Conversation>> {
        self.transport()?.inbox(from_contact).await
    }

    /// Full history of a conversation, after pulling anything new.
    pub async fn conversation(&mut self, conversation_id: &str) -> Result<Conversation> {
        if let Err(e) = self.transport()?.inbox(None).await {
            tracing::warn!(error = %e, "sync failed, showing local history only");
        }
        self.storage
            .history(conversation_id)?
            .ok_or_else(|| VoxError::ConversationNotFound(conversation_id.to_string()))
    }

    pub async fn discover(&mut self, query: &str) -> Result<Vec<DirectoryEntry>> {
        self.transport()?.discover(query).await
    }

    pub async fn advertise(&mut self, description: &str) -> Result<()> {
        self.transport()?.advertise(description).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_vox_id_for_username() {
        assert_eq!(vox_id_for(Some("test_user")), "vox_test_user");
        assert_eq!(vox_id_for(Some("vox_already")), "vox_already");
    }

    #[test]
    fn test_vox_id_for_random() {
        let id = vox_id_for(None);
        assert!(id.starts_with("vox_"));
        assert_eq!(id.len(), 12);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_initialize_writes_config() {
        let temp_dir = TempDir::new().unwrap();
        let mut client = VoxClient::open(temp_dir.path()).unwrap();

        let vox_id = client.initialize(Some("test_user")).unwrap();
        assert_eq!(vox_id, "vox_test_user");

        let config = Config::load(temp_dir.path()).unwrap();
        assert_eq!(config.vox_id, "vox_test_user");
        assert_eq!(config.user_id.as_deref(), Some("@vox_test_user:vox.pm"));
        assert!(config.access_token.is_some());
        assert!(config.device_id.unwrap().starts_with("device_"));
    }

    #[test]
    fn test_whoami_before_init() {
        let temp_dir = TempDir::new().unwrap();
        let mut client = VoxClient::open(temp_dir.path()).unwrap();
        let err = client.whoami().unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_status_counts_contacts() {
        let temp_dir = TempDir::new().unwrap();
        let mut client = VoxClient::open(temp_dir.path()).unwrap();
        client.initialize(Some("me")).unwrap();
        client.add_contact("a", "vox_a").unwrap();
        client.add_contact("b", "vox_b").unwrap();

        let status = client.status().unwrap();
        assert_eq!(status.vox_id, "vox_me");
        assert_eq!(status.homeserver, "http://vox.pm:3338");
        assert_eq!(status.contacts, 2);
    }

    #[test]
    fn test_contacts_work_without_identity() {
        let temp_dir = TempDir::new().unwrap();
        let client = VoxClient::open(temp_dir.path()).unwrap();
        client.add_contact("bob", "vox_bob").unwrap();
        assert_eq!(client.list_contacts().unwrap().len(), 1);
        assert!(client.remove_contact("bob").unwrap());
        assert!(!client.remove_contact("bob").unwrap());
    }
}
