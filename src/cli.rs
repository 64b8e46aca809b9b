//! # Command Line
//!
//! Argument definitions for the `vox` binary and [`CommandRunner`], which
//! executes everything except the interactive demo and writes the result to
//! any [`Write`]. Errors are returned, not printed; `main` turns them into a
//! `❌` line on stderr and the exit code from [`VoxError::exit_code`].
//!
//! [`VoxError::exit_code`]: crate::error::VoxError::exit_code

use crate::client::VoxClient;
use crate::clipboard::CopyHelper;
use crate::config::DemoSettings;
use crate::content::{DemoScript, SKILL_MD};
use crate::error::{Result, VoxError};
use crate::reveal::{advance_with, RevealTiming};
use crate::ui::render::PROMPT;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

/// Vox - agent-to-agent messaging
#[derive(Parser, Debug)]
#[command(name = "vox")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Agent-to-agent communication for AI agents", long_about = None)]
pub struct Cli {
    /// Vox home directory (defaults to $VOX_HOME or ~/.vox)
    #[arg(long, global = true, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Initialize Vox identity
    Init {
        /// Optional username for Vox ID
        #[arg(long)]
        username: Option<String>,
    },
    /// Get current Vox ID
    Whoami,
    /// Get Vox status
    Status,
    /// Manage contacts
    #[command(subcommand)]
    Contact(ContactCommand),
    /// Send a message to a contact
    Send {
        contact: String,
        message: String,
        /// Conversation ID for replies
        #[arg(long)]
        conv: Option<String>,
    },
    /// Get conversations with new messages
    Inbox {
        /// Filter messages from specific contact
        #[arg(long = "from")]
        from_contact: Option<String>,
    },
    /// Get full conversation history
    Conversation { conversation_id: String },
    /// Search for agents in directory
    Discover { query: String },
    /// List agent in public directory
    Advertise {
        /// Agent description
        #[arg(long)]
        description: String,
    },
    /// Play the typing terminal demo
    Demo {
        #[arg(long, value_enum, default_value = "cli")]
        script: DemoScript,
        /// Print to stdout instead of opening the full-screen UI
        #[arg(long)]
        plain: bool,
    },
    /// Print the agent skill file
    Skill {
        /// Also copy it to the clipboard
        #[arg(long)]
        copy: bool,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ContactCommand {
    /// Add a contact
    Add { name: String, vox_id: String },
    /// List all contacts
    List,
    /// Remove a contact
    Remove { name: String },
}

/// Text printed for a failed command.
pub fn error_line(err: &VoxError) -> String {
    if err.is_unexpected() {
        format!("❌ Error: {err:#}")
    } else {
        format!("❌ {err}")
    }
}

/// Contacts as aligned `name    vox_id` rows.
pub fn format_contacts<'a>(contacts: impl IntoIterator<Item = (&'a String, &'a String)>) -> Vec<String> {
    let contacts: Vec<_> = contacts.into_iter().collect();
    let width = contacts
        .iter()
        .map(|(name, _)| name.chars().count())
        .max()
        .unwrap_or(0);
    contacts
        .into_iter()
        .map(|(name, vox_id)| format!("{name:<width$}    {vox_id}"))
        .collect()
}

/// Write `text`, keeping only the first failure.
fn emit<W: Write>(out: &mut W, failure: &mut Option<std::io::Error>, text: &str) {
    if failure.is_none() {
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            *failure = Some(e);
        }
    }
}

/// Reveal `script` on `out` as plain text, one character at a time.
pub async fn play_plain<W: Write>(
    script: Vec<String>,
    timing: RevealTiming,
    out: &mut W,
) -> std::io::Result<()> {
    let mut failure = None;
    let mut shown_lines = 0;
    let mut shown_bytes = 0;

    emit(out, &mut failure, PROMPT);
    advance_with(script, timing, |revealer| {
        if revealer.committed().len() > shown_lines {
            let line = &revealer.committed()[shown_lines];
            emit(out, &mut failure, line.get(shown_bytes..).unwrap_or_default());
            emit(out, &mut failure, "\n");
            emit(out, &mut failure, PROMPT);
            shown_lines = revealer.committed().len();
            shown_bytes = 0;
        }
        let partial = revealer.partial();
        if partial.len() > shown_bytes {
            emit(out, &mut failure, &partial[shown_bytes..]);
            shown_bytes = partial.len();
        }
    })
    .await;
    emit(out, &mut failure, "\n");

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Runs non-interactive commands against a [`VoxClient`].
pub struct CommandRunner<W: Write> {
    pub client: VoxClient,
    pub copier: CopyHelper,
    pub demo: DemoSettings,
    pub out: W,
}

impl<W: Write> CommandRunner<W> {
    pub fn new(client: VoxClient, copier: CopyHelper, demo: DemoSettings, out: W) -> Self {
        Self {
            client,
            copier,
            demo,
            out,
        }
    }

    fn line(&mut self, text: impl std::fmt::Display) -> Result<()> {
        writeln!(self.out, "{text}").context("Failed to write output")?;
        Ok(())
    }

    fn json<T: serde::Serialize>(&mut self, value: &T) -> Result<()> {
        let text = serde_json::to_string_pretty(value).context("Failed to encode JSON")?;
        self.line(text)
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        tracing::debug!(?command, "running command");
        match command {
            Command::Init { username } => {
                let vox_id = self.client.initialize(username.as_deref())?;
                self.line(format!("✅ Vox ID: {vox_id}"))
            }
            Command::Whoami => {
                let vox_id = self.client.whoami()?;
                self.line(vox_id)
            }
            Command::Status => {
                let status = self.client.status()?;
                self.line(format!(
                    "Vox ID: {} | Homeserver: {} | Contacts: {}",
                    status.vox_id, status.homeserver, status.contacts
                ))
            }
            Command::Contact(ContactCommand::Add { name, vox_id }) => {
                self.client.add_contact(&name, &vox_id)?;
                self.line(format!("✅ Contact '{name}' added"))
            }
            Command::Contact(ContactCommand::List) => {
                let contacts = self.client.list_contacts()?;
                if contacts.is_empty() {
                    return self.line("No contacts found.");
                }
                for row in format_contacts(&contacts) {
                    self.line(row)?;
                }
                Ok(())
            }
            Command::Contact(ContactCommand::Remove { name }) => {
                if !self.client.remove_contact(&name)? {
                    return Err(VoxError::ContactNotFound(name));
                }
                self.line(format!("✅ Contact '{name}' removed"))
            }
            Command::Send {
                contact,
                message,
                conv,
            } => {
                let conv_id = self
                    .client
                    .send_message(&contact, &message, conv.as_deref())
                    .await?;
                self.line(format!("✅ Sent to {contact} ({conv_id})"))
            }
            Command::Inbox { from_contact } => {
                let conversations = self.client.inbox(from_contact.as_deref()).await?;
                let records: Vec<_> = conversations.iter().map(|c| c.to_record()).collect();
                self.json(&records)
            }
            Command::Conversation { conversation_id } => {
                let conversation = self.client.conversation(&conversation_id).await?;
                self.json(&conversation.to_record())
            }
            Command::Discover { query } => {
                let agents = self.client.discover(&query).await?;
                self.json(&agents)
            }
            Command::Advertise { description } => {
                self.client.advertise(&description).await?;
                self.line("✅ Listed in directory")
            }
            Command::Demo { script, .. } => {
                let timing = RevealTiming::new(self.demo.interval(), self.demo.pause());
                play_plain(script.script(), timing, &mut self.out)
                    .await
                    .context("Failed to write demo")?;
                Ok(())
            }
            Command::Skill { copy } => {
                self.line(SKILL_MD.trim_end())?;
                if copy {
                    if self.copier.copy(SKILL_MD) {
                        self.line("✅ Copied to clipboard")?;
                    } else {
                        tracing::warn!("no clipboard available");
                    }
                }
                Ok(())
            }
        }
    }
}
