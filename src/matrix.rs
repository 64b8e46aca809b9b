//! # Matrix Transport
//!
//! Vox messages travel as ordinary `m.room.message` events on a Matrix
//! homeserver, one private room per counterpart. The Vox-specific envelope
//! rides along in the event content:
//!
//! ```json
//! {
//!   "msgtype": "m.text",
//!   "body": "Can you help me process this data?",
//!   "vox": {
//!     "from": "vox_demo_agent",
//!     "to": "vox_helper_bot",
//!     "timestamp": "2025-12-17T10:30:00Z",
//!     "conversation_id": "conv_abc123"
//!   }
//! }
//! ```
//!
//! The agent directory is a shared room, `#vox-directory:<server>`, where
//! `vox advertise` posts a `vox_directory` entry and `vox discover` reads
//! them back.

use crate::config::Config;
use crate::error::{Result, VoxError};
use crate::storage::{Conversation, Message, Storage};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

/// How far back `discover` reads the directory room.
const DIRECTORY_HISTORY_LIMIT: u32 = 200;

/// Local part of the directory room alias.
const DIRECTORY_ALIAS_NAME: &str = "vox-directory";

/// Everything the client needs from a message transport.
#[async_trait]
pub trait Transport: Send {
    /// Deliver `body` to `to`, starting a new conversation unless one is
    /// given. Returns the message as sent.
    async fn send_message(
        &mut self,
        to: &str,
        body: &str,
        conversation_id: Option<&str>,
    ) -> Result<Message>;

    /// Conversations with messages that arrived since the last call,
    /// optionally only those with the contact named `from_contact`.
    async fn inbox(&mut self, from_contact: Option<&str>) -> Result<Vec<Conversation>>;

    /// Directory entries whose id or description contains `query`.
    async fn discover(&mut self, query: &str) -> Result<Vec<DirectoryEntry>>;

    /// Publish this agent in the directory.
    async fn advertise(&mut self, description: &str) -> Result<()>;
}

/// One agent listed in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub vox_id: String,
    pub description: String,
}

/// Matrix id for a Vox id: kept as is when it already is one
/// (`@user:server`), otherwise `@<id>:<domain>`.
pub fn matrix_user_id(vox_id: &str, domain: &str) -> String {
    let is_matrix_id = vox_id
        .strip_prefix('@')
        .and_then(|rest| rest.split_once(':'))
        .is_some_and(|(local, server)| {
            !local.is_empty()
                && !server.is_empty()
                && !vox_id.contains(char::is_whitespace)
        });
    if is_matrix_id {
        vox_id.to_string()
    } else {
        format!("@{}:{}", vox_id, domain)
    }
}

/// Fresh conversation id, `conv_` plus eight hex digits.
pub fn new_conversation_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("conv_{}", &id[..8])
}

/// Current time as stored in messages.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct SyncResponse {
    next_batch: String,
    #[serde(default)]
    rooms: SyncRooms,
}

#[derive(Debug, Default, Deserialize)]
struct SyncRooms {
    #[serde(default)]
    join: BTreeMap<String, JoinedRoom>,
}

#[derive(Debug, Default, Deserialize)]
struct JoinedRoom {
    #[serde(default)]
    timeline: Timeline,
}

#[derive(Debug, Default, Deserialize)]
struct Timeline {
    #[serde(default)]
    events: Vec<RoomEvent>,
}

#[derive(Debug, Clone, Deserialize)]
struct RoomEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    origin_server_ts: i64,
    #[serde(default)]
    content: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    chunk: Vec<RoomEvent>,
}

#[derive(Debug, Deserialize)]
struct RoomIdResponse {
    room_id: String,
}

#[derive(Debug, Deserialize)]
struct MatrixErrorBody {
    #[serde(default)]
    errcode: String,
    #[serde(default)]
    error: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct VoxEnvelope {
    #[serde(default = "unknown")]
    from: String,
    #[serde(default = "unknown")]
    to: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default = "unknown")]
    conversation_id: String,
}

fn unknown() -> String {
    "unknown".to_string()
}

/// Vox messages carried by a room timeline, in timeline order.
fn parse_timeline(events: &[RoomEvent]) -> Vec<Message> {
    events
        .iter()
        .filter(|e| e.kind == "m.room.message")
        .filter_map(|e| {
            let envelope: VoxEnvelope =
                serde_json::from_value(e.content.get("vox")?.clone()).ok()?;
            let body = e.content.get("body")?.as_str()?.to_string();
            let timestamp = envelope.timestamp.unwrap_or_else(|| {
                chrono::DateTime::from_timestamp_millis(e.origin_server_ts)
                    .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
                    .unwrap_or_default()
            });
            Some(Message {
                from_vox_id: envelope.from,
                to_vox_id: envelope.to,
                timestamp,
                conversation_id: envelope.conversation_id,
                body,
            })
        })
        .collect()
}

/// Split a room's messages by conversation id, keeping first-seen order.
fn group_by_conversation(messages: Vec<Message>) -> Vec<(String, Vec<Message>)> {
    let mut groups: Vec<(String, Vec<Message>)> = Vec::new();
    for message in messages {
        match groups
            .iter_mut()
            .find(|(id, _)| *id == message.conversation_id)
        {
            Some((_, group)) => group.push(message),
            None => groups.push((message.conversation_id.clone(), vec![message])),
        }
    }
    groups
}

/// Name of whoever we are talking to: the first sender that is not us,
/// mapped back to a contact name when we know them.
fn counterpart(
    messages: &[Message],
    self_id: &str,
    contacts: &BTreeMap<String, String>,
    domain: &str,
) -> String {
    let self_matrix = matrix_user_id(self_id, domain);
    let Some(other) = messages
        .iter()
        .map(|m| m.from_vox_id.as_str())
        .find(|from| *from != self_id && matrix_user_id(from, domain) != self_matrix)
    else {
        return unknown();
    };

    let other_matrix = matrix_user_id(other, domain);
    contacts
        .iter()
        .find(|(_, id)| id.as_str() == other || matrix_user_id(id, domain) == other_matrix)
        .map_or_else(|| other.to_string(), |(name, _)| name.clone())
}

/// Directory entries in a `/messages` chunk (newest first), latest entry per
/// agent, filtered by a case-insensitive substring.
fn parse_directory(events: &[RoomEvent], query: &str) -> Vec<DirectoryEntry> {
    let query = query.to_lowercase();
    let mut seen = HashSet::new();
    events
        .iter()
        .filter(|e| e.kind == "m.room.message")
        .filter_map(|e| {
            serde_json::from_value::<DirectoryEntry>(e.content.get("vox_directory")?.clone()).ok()
        })
        .filter(|entry| seen.insert(entry.vox_id.clone()))
        .filter(|entry| {
            query.is_empty()
                || entry.vox_id.to_lowercase().contains(&query)
                || entry.description.to_lowercase().contains(&query)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// [`Transport`] over the Matrix client-server API (v3).
pub struct MatrixBackend {
    http: reqwest::Client,
    base: Url,
    config: Config,
    storage: Storage,
    sync_timeout: Duration,
}

impl MatrixBackend {
    pub fn new(config: Config, storage: Storage) -> Result<Self> {
        let base = Url::parse(&config.homeserver).map_err(|e| {
            VoxError::Other(anyhow::anyhow!(
                "Invalid homeserver URL '{}': {}",
                config.homeserver,
                e
            ))
        })?;
        let http = reqwest::Client::builder()
            .user_agent(format!("vox/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http,
            base,
            config,
            storage,
            sync_timeout: Duration::ZERO,
        })
    }

    /// Long-poll duration for inbox syncs. Zero returns immediately.
    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| VoxError::Transport(format!("Homeserver URL cannot be a base: {}", self.base)))?
            .pop_if_empty()
            .extend(["_matrix", "client", "v3"])
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.endpoint(segments)?;
        let builder = self.http.request(method, url);
        Ok(match &self.config.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let (errcode, detail) = match serde_json::from_str::<MatrixErrorBody>(&text) {
                Ok(body) if !body.errcode.is_empty() => {
                    let detail = format!("{}: {}", body.errcode, body.error);
                    (Some(body.errcode), detail)
                }
                _ => (None, text),
            };
            return Err(VoxError::Homeserver {
                status: status.as_u16(),
                errcode,
                detail,
            });
        }
        Ok(response.json::<T>().await?)
    }

    async fn sync(&self, since: Option<&str>) -> Result<SyncResponse> {
        let mut builder = self
            .request(Method::GET, &["sync"])?
            .query(&[("timeout", self.sync_timeout.as_millis().to_string())]);
        if let Some(since) = since {
            builder = builder.query(&[("since", since)]);
        }
        tracing::debug!(since = ?since, "syncing");
        self.execute(builder).await
    }

    async fn create_room(&self, body: &serde_json::Value) -> Result<String> {
        let builder = self.request(Method::POST, &["createRoom"])?.json(body);
        let created: RoomIdResponse = self.execute(builder).await?;
        Ok(created.room_id)
    }

    async fn invite(&self, room_id: &str, user_id: &str) -> Result<()> {
        let builder = self
            .request(Method::POST, &["rooms", room_id, "invite"])?
            .json(&json!({ "user_id": user_id }));
        let _: serde_json::Value = self.execute(builder).await?;
        Ok(())
    }

    async fn join(&self, room_or_alias: &str) -> Result<String> {
        let builder = self
            .request(Method::POST, &["join", room_or_alias])?
            .json(&json!({}));
        let joined: RoomIdResponse = self.execute(builder).await?;
        Ok(joined.room_id)
    }

    async fn send_event(&self, room_id: &str, content: &serde_json::Value) -> Result<()> {
        let txn_id = uuid::Uuid::new_v4().simple().to_string();
        let builder = self
            .request(
                Method::PUT,
                &["rooms", room_id, "send", "m.room.message", &txn_id],
            )?
            .json(content);
        let _: serde_json::Value = self.execute(builder).await?;
        Ok(())
    }

    async fn room_messages(&self, room_id: &str, limit: u32) -> Result<Vec<RoomEvent>> {
        let builder = self
            .request(Method::GET, &["rooms", room_id, "messages"])?
            .query(&[("dir", "b".to_string()), ("limit", limit.to_string())]);
        let messages: MessagesResponse = self.execute(builder).await?;
        Ok(messages.chunk)
    }

    /// Room shared with `vox_id`, created and cached on first use.
    async fn room_for(&self, vox_id: &str) -> Result<String> {
        if let Some(room_id) = self.storage.room(vox_id)? {
            return Ok(room_id);
        }

        let room_id = self
            .create_room(&json!({ "name": "Vox Chat", "preset": "private_chat" }))
            .await?;
        let invitee = matrix_user_id(vox_id, &self.config.server_domain());
        self.invite(&room_id, &invitee).await?;
        self.storage.set_room(vox_id, &room_id)?;
        tracing::info!(%room_id, %invitee, "created conversation room");
        Ok(room_id)
    }

    fn directory_alias(&self) -> String {
        format!("#{}:{}", DIRECTORY_ALIAS_NAME, self.config.server_domain())
    }

    /// Join the directory room. `None` when the alias does not exist yet.
    async fn join_directory(&self) -> Result<Option<String>> {
        match self.join(&self.directory_alias()).await {
            Ok(room_id) => Ok(Some(room_id)),
            Err(e) if e.is_matrix_error("M_NOT_FOUND") => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Directory room, created under its alias if nobody has yet.
    async fn directory_room(&self) -> Result<String> {
        if let Some(room_id) = self.join_directory().await? {
            return Ok(room_id);
        }
        let room_id = self
            .create_room(&json!({
                "name": "Vox Directory",
                "room_alias_name": DIRECTORY_ALIAS_NAME,
                "preset": "public_chat",
            }))
            .await?;
        tracing::info!(%room_id, alias = %self.directory_alias(), "created directory room");
        Ok(room_id)
    }
}

#[async_trait]
impl Transport for MatrixBackend {
    async fn send_message(
        &mut self,
        to: &str,
        body: &str,
        conversation_id: Option<&str>,
    ) -> Result<Message> {
        let conversation_id = conversation_id.map_or_else(new_conversation_id, str::to_string);
        let room_id = self.room_for(to).await?;

        let message = Message {
            from_vox_id: self.config.vox_id.clone(),
            to_vox_id: to.to_string(),
            timestamp: now_timestamp(),
            conversation_id,
            body: body.to_string(),
        };
        let envelope = VoxEnvelope {
            from: message.from_vox_id.clone(),
            to: message.to_vox_id.clone(),
            timestamp: Some(message.timestamp.clone()),
            conversation_id: message.conversation_id.clone(),
        };
        let content = json!({
            "msgtype": "m.text",
            "body": body,
            "vox": envelope,
        });

        self.send_event(&room_id, &content).await?;
        tracing::debug!(conversation_id = %message.conversation_id, %room_id, "message sent");
        Ok(message)
    }

    async fn inbox(&mut self, from_contact: Option<&str>) -> Result<Vec<Conversation>> {
        let since = self.storage.sync_token()?;
        let sync = self.sync(since.as_deref()).await?;
        let contacts = self.storage.contacts()?;
        let domain = self.config.server_domain();

        let mut conversations = Vec::new();
        for (room_id, room) in &sync.rooms.join {
            let messages = parse_timeline(&room.timeline.events);
            if messages.is_empty() {
                continue;
            }
            tracing::trace!(%room_id, count = messages.len(), "room has new messages");

            for (conversation_id, messages) in group_by_conversation(messages) {
                let with_contact = counterpart(&messages, &self.config.vox_id, &contacts, &domain);
                self.storage
                    .save_messages(&conversation_id, &with_contact, &messages)?;

                if from_contact.map_or(true, |name| name == with_contact) {
                    conversations.push(Conversation {
                        conversation_id,
                        with_contact,
                        messages,
                    });
                }
            }
        }

        self.storage.set_sync_token(&sync.next_batch)?;
        Ok(conversations)
    }

    async fn discover(&mut self, query: &str) -> Result<Vec<DirectoryEntry>> {
        let Some(room_id) = self.join_directory().await? else {
            tracing::debug!("no directory room yet");
            return Ok(Vec::new());
        };
        let events = self
            .room_messages(&room_id, DIRECTORY_HISTORY_LIMIT)
            .await?;
        Ok(parse_directory(&events, query))
    }

    async fn advertise(&mut self, description: &str) -> Result<()> {
        let room_id = self.directory_room().await?;
        let entry = DirectoryEntry {
            vox_id: self.config.vox_id.clone(),
            description: description.to_string(),
        };
        let content = json!({
            "msgtype": "m.notice",
            "body": format!("{}: {}", entry.vox_id, entry.description),
            "vox_directory": entry,
        });
        self.send_event(&room_id, &content).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    fn event(content: serde_json::Value) -> RoomEvent {
        RoomEvent {
            kind: "m.room.message".to_string(),
            origin_server_ts: 1_734_431_400_000,
            content,
        }
    }

    fn vox_event(from: &str, conv: &str, body: &str, ts: &str) -> RoomEvent {
        event(json!({
            "msgtype": "m.text",
            "body": body,
            "vox": { "from": from, "to": "x", "timestamp": ts, "conversation_id": conv }
        }))
    }

    #[test]
    fn test_matrix_user_id() {
        assert_eq!(matrix_user_id("vox_bob", "vox.pm"), "@vox_bob:vox.pm");
        assert_eq!(matrix_user_id("@assistant:vox.pm", "other.org"), "@assistant:vox.pm");
        assert_eq!(matrix_user_id("@missing_server", "vox.pm"), "@@missing_server:vox.pm");
    }

    #[test]
    fn test_new_conversation_id_shape() {
        let id = new_conversation_id();
        assert!(id.starts_with("conv_"));
        assert_eq!(id.len(), 13);
        assert!(id[5..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, new_conversation_id());
    }

    #[test]
    fn test_now_timestamp_is_utc_z() {
        let ts = now_timestamp();
        assert!(ts.ends_with('Z'), "{ts}");
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn test_parse_timeline_skips_foreign_events() {
        let events = vec![
            vox_event("vox_a", "conv_1", "hello", "2025-12-17T10:25:00Z"),
            event(json!({ "msgtype": "m.text", "body": "plain matrix message" })),
            RoomEvent {
                kind: "m.room.member".to_string(),
                origin_server_ts: 0,
                content: json!({ "membership": "join" }),
            },
        ];

        let messages = parse_timeline(&events);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].from_vox_id, "vox_a");
        assert_eq!(messages[0].conversation_id, "conv_1");
        assert_eq!(messages[0].body, "hello");
    }

    #[test]
    fn test_parse_timeline_fills_missing_fields() {
        let events = vec![event(json!({ "body": "hi", "vox": {} }))];
        let messages = parse_timeline(&events);
        assert_eq!(messages[0].from_vox_id, "unknown");
        assert_eq!(messages[0].conversation_id, "unknown");
        assert_eq!(messages[0].timestamp, "2024-12-17T10:30:00Z");
    }

    #[test]
    fn test_group_by_conversation() {
        let messages = parse_timeline(&[
            vox_event("a", "conv_1", "one", "t1"),
            vox_event("a", "conv_2", "two", "t2"),
            vox_event("b", "conv_1", "three", "t3"),
        ]);
        let groups = group_by_conversation(messages);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "conv_1");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "conv_2");
    }

    #[test]
    fn test_counterpart_resolves_contact_name() {
        let messages = parse_timeline(&[
            vox_event("vox_me", "c", "hi", "t1"),
            vox_event("vox_priya", "c", "hey", "t2"),
        ]);
        let mut contacts = BTreeMap::new();
        contacts.insert("priya".to_string(), "@vox_priya:vox.pm".to_string());

        assert_eq!(counterpart(&messages, "vox_me", &contacts, "vox.pm"), "priya");
        assert_eq!(
            counterpart(&messages, "vox_me", &BTreeMap::new(), "vox.pm"),
            "vox_priya"
        );
    }

    #[test]
    fn test_counterpart_only_self_is_unknown() {
        let messages = parse_timeline(&[vox_event("vox_me", "c", "hi", "t1")]);
        assert_eq!(
            counterpart(&messages, "@vox_me:vox.pm", &BTreeMap::new(), "vox.pm"),
            "unknown"
        );
    }

    #[test]
    fn test_parse_directory() {
        let entry = |id: &str, desc: &str| {
            event(json!({
                "msgtype": "m.notice",
                "body": "",
                "vox_directory": { "vox_id": id, "description": desc }
            }))
        };
        // Newest first, as /messages?dir=b returns them
        let events = vec![
            entry("vox_scheduler", "Books meetings"),
            entry("vox_analyst", "Crunches numbers"),
            entry("vox_scheduler", "old description"),
        ];

        let all = parse_directory(&events, "");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].description, "Books meetings");

        let found = parse_directory(&events, "NUMBERS");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].vox_id, "vox_analyst");

        assert!(parse_directory(&events, "nothing like this").is_empty());
    }

    #[test]
    fn test_sync_response_tolerates_missing_sections() {
        let sync: SyncResponse = serde_json::from_str(r#"{"next_batch": "s1"}"#).unwrap();
        assert_eq!(sync.next_batch, "s1");
        assert!(sync.rooms.join.is_empty());

        let sync: SyncResponse = serde_json::from_value(json!({
            "next_batch": "s2",
            "rooms": { "join": { "!r:vox.pm": { "timeline": { "events": [
                { "type": "m.room.message", "sender": "@a:vox.pm", "origin_server_ts": 1,
                  "content": { "body": "hi", "vox": { "from": "a", "conversation_id": "conv_1" } } }
            ] } } } }
        }))
        .unwrap();
        let room = &sync.rooms.join["!r:vox.pm"];
        assert_eq!(parse_timeline(&room.timeline.events).len(), 1);
    }

    #[test]
    fn test_endpoint_building() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open(temp_dir.path()).unwrap();
        let backend = MatrixBackend::new(Config::new("vox_me"), storage).unwrap();

        let url = backend.endpoint(&["rooms", "!abc:vox.pm", "invite"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://vox.pm:3338/_matrix/client/v3/rooms/!abc:vox.pm/invite"
        );

        let url = backend.endpoint(&["join", "#vox-directory:vox.pm"]).unwrap();
        assert!(url.as_str().ends_with("/join/%23vox-directory:vox.pm"));
    }

    // ── Homeserver round trips (httpmock) ──────────────────────────

    fn backend_for(server: &MockServer, home: &TempDir) -> MatrixBackend {
        let mut config = Config::new("vox_me");
        config.homeserver = server.base_url();
        config.access_token = Some("tok_123".to_string());
        let storage = Storage::open(home.path()).unwrap();
        MatrixBackend::new(config, storage).unwrap()
    }

    fn timeline_event(from: &str, conv: &str, body: &str) -> serde_json::Value {
        json!({
            "type": "m.room.message",
            "origin_server_ts": 1_734_431_400_000_i64,
            "content": {
                "msgtype": "m.text",
                "body": body,
                "vox": { "from": from, "to": "vox_me", "timestamp": "2025-12-17T10:30:00Z", "conversation_id": conv }
            }
        })
    }

    #[tokio::test]
    async fn test_inbox_saves_history_and_sync_token() {
        let server = MockServer::start_async().await;
        let home = TempDir::new().unwrap();
        let storage = Storage::open(home.path()).unwrap();
        storage.add_contact("priya", "vox_priya").unwrap();

        let first = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/_matrix/client/v3/sync")
                    .header("authorization", "Bearer tok_123")
                    .query_param("timeout", "0")
                    .query_param_missing("since");
                then.status(200).json_body(json!({
                    "next_batch": "s1",
                    "rooms": { "join": {
                        "!a:vox.pm": { "timeline": { "events": [
                            timeline_event("vox_priya", "conv_1", "Can you help?")
                        ] } },
                        "!b:vox.pm": { "timeline": { "events": [
                            timeline_event("vox_stranger", "conv_2", "hello")
                        ] } }
                    } }
                }));
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/_matrix/client/v3/sync")
                    .query_param("since", "s1");
                then.status(200).json_body(json!({ "next_batch": "s2" }));
            })
            .await;

        let mut backend = backend_for(&server, &home);
        let conversations = backend.inbox(Some("priya")).await.unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].conversation_id, "conv_1");
        assert_eq!(conversations[0].with_contact, "priya");
        assert_eq!(conversations[0].messages[0].body, "Can you help?");

        // Filtered-out conversations still reach history
        assert_eq!(storage.sync_token().unwrap().as_deref(), Some("s1"));
        let other = storage.history("conv_2").unwrap().unwrap();
        assert_eq!(other.with_contact, "vox_stranger");

        assert!(backend.inbox(None).await.unwrap().is_empty());
        assert_eq!(storage.sync_token().unwrap().as_deref(), Some("s2"));
        first.assert_calls_async(1).await;
        second.assert_calls_async(1).await;
    }

    #[tokio::test]
    async fn test_send_creates_room_once_and_caches_it() {
        let server = MockServer::start_async().await;
        let home = TempDir::new().unwrap();

        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/_matrix/client/v3/createRoom")
                    .body_includes("private_chat");
                then.status(200).json_body(json!({ "room_id": "!room:vox.pm" }));
            })
            .await;
        let invite = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/_matrix/client/v3/rooms/!room:vox.pm/invite")
                    .body_includes("@vox_bob:127.0.0.1");
                then.status(200).json_body(json!({}));
            })
            .await;
        let send = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path_includes("/rooms/!room:vox.pm/send/m.room.message/")
                    .body_includes("\"conversation_id\"");
                then.status(200).json_body(json!({ "event_id": "$ev" }));
            })
            .await;

        let mut backend = backend_for(&server, &home);
        let first = backend.send_message("vox_bob", "hi", None).await.unwrap();
        assert!(first.conversation_id.starts_with("conv_"));
        assert_eq!(first.from_vox_id, "vox_me");

        let reply = backend
            .send_message("vox_bob", "again", Some(&first.conversation_id))
            .await
            .unwrap();
        assert_eq!(reply.conversation_id, first.conversation_id);

        create.assert_calls_async(1).await;
        invite.assert_calls_async(1).await;
        send.assert_calls_async(2).await;
        let storage = Storage::open(home.path()).unwrap();
        assert_eq!(storage.room("vox_bob").unwrap().as_deref(), Some("!room:vox.pm"));
    }

    #[tokio::test]
    async fn test_error_status_carries_errcode() {
        let server = MockServer::start_async().await;
        let home = TempDir::new().unwrap();
        server
            .mock_async(|when, then| {
                when.method(GET).path("/_matrix/client/v3/sync");
                then.status(401).json_body(json!({
                    "errcode": "M_UNKNOWN_TOKEN",
                    "error": "Invalid access token"
                }));
            })
            .await;

        let mut backend = backend_for(&server, &home);
        let err = backend.inbox(None).await.unwrap_err();
        assert!(err.is_matrix_error("M_UNKNOWN_TOKEN"));
        assert_eq!(
            err.to_string(),
            "Transport error: HTTP 401: M_UNKNOWN_TOKEN: Invalid access token"
        );
        assert_eq!(err.exit_code(), 1);

        let storage = Storage::open(home.path()).unwrap();
        assert_eq!(storage.sync_token().unwrap(), None);
    }

    #[tokio::test]
    async fn test_error_status_without_matrix_body() {
        let server = MockServer::start_async().await;
        let home = TempDir::new().unwrap();
        server
            .mock_async(|when, then| {
                when.method(GET).path("/_matrix/client/v3/sync");
                then.status(502).body("bad gateway");
            })
            .await;

        let mut backend = backend_for(&server, &home);
        match backend.inbox(None).await.unwrap_err() {
            VoxError::Homeserver {
                status,
                errcode,
                detail,
            } => {
                assert_eq!(status, 502);
                assert_eq!(errcode, None);
                assert_eq!(detail, "bad gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_discover_without_directory_room_is_empty() {
        let server = MockServer::start_async().await;
        let home = TempDir::new().unwrap();
        let join = server
            .mock_async(|when, then| {
                when.method(POST).path_includes("/_matrix/client/v3/join/");
                then.status(404).json_body(json!({
                    "errcode": "M_NOT_FOUND",
                    "error": "Room alias not found"
                }));
            })
            .await;

        let mut backend = backend_for(&server, &home);
        assert!(backend.discover("scheduler").await.unwrap().is_empty());
        join.assert_calls_async(1).await;
    }

    #[tokio::test]
    async fn test_discover_reads_directory_room() {
        let server = MockServer::start_async().await;
        let home = TempDir::new().unwrap();
        server
            .mock_async(|when, then| {
                when.method(POST).path_includes("/_matrix/client/v3/join/");
                then.status(200).json_body(json!({ "room_id": "!dir:vox.pm" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/_matrix/client/v3/rooms/!dir:vox.pm/messages")
                    .query_param("dir", "b");
                then.status(200).json_body(json!({ "chunk": [
                    { "type": "m.room.message", "content": {
                        "msgtype": "m.notice", "body": "",
                        "vox_directory": { "vox_id": "vox_scheduler", "description": "Books meetings" } } },
                    { "type": "m.room.message", "content": {
                        "msgtype": "m.notice", "body": "",
                        "vox_directory": { "vox_id": "vox_analyst", "description": "Crunches numbers" } } }
                ] }));
            })
            .await;

        let mut backend = backend_for(&server, &home);
        let found = backend.discover("meetings").await.unwrap();
        assert_eq!(
            found,
            vec![DirectoryEntry {
                vox_id: "vox_scheduler".to_string(),
                description: "Books meetings".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_discover_propagates_other_join_errors() {
        let server = MockServer::start_async().await;
        let home = TempDir::new().unwrap();
        server
            .mock_async(|when, then| {
                when.method(POST).path_includes("/_matrix/client/v3/join/");
                then.status(403).json_body(json!({
                    "errcode": "M_FORBIDDEN",
                    "error": "You are banned"
                }));
            })
            .await;

        let mut backend = backend_for(&server, &home);
        let err = backend.discover("x").await.unwrap_err();
        assert!(err.is_matrix_error("M_FORBIDDEN"));
    }

    #[tokio::test]
    async fn test_advertise_creates_missing_directory_room() {
        let server = MockServer::start_async().await;
        let home = TempDir::new().unwrap();
        let join = server
            .mock_async(|when, then| {
                when.method(POST).path_includes("/_matrix/client/v3/join/");
                then.status(404).json_body(json!({
                    "errcode": "M_NOT_FOUND",
                    "error": "Room alias not found"
                }));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/_matrix/client/v3/createRoom")
                    .body_includes("\"room_alias_name\":\"vox-directory\"")
                    .body_includes("\"preset\":\"public_chat\"");
                then.status(200).json_body(json!({ "room_id": "!dir:vox.pm" }));
            })
            .await;
        let post = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path_includes("/rooms/!dir:vox.pm/send/m.room.message/")
                    .body_includes("Books meetings")
                    .body_includes("vox_directory");
                then.status(200).json_body(json!({ "event_id": "$ev" }));
            })
            .await;

        let mut backend = backend_for(&server, &home);
        backend.advertise("Books meetings").await.unwrap();
        join.assert_calls_async(1).await;
        create.assert_calls_async(1).await;
        post.assert_calls_async(1).await;
    }

    #[test]
    fn test_invalid_homeserver() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open(temp_dir.path()).unwrap();
        let mut config = Config::new("vox_me");
        config.homeserver = "not a url".to_string();
        assert!(MatrixBackend::new(config, storage).is_err());
    }
}
