//! Command handling against the write-through registry.
//!
//! [`Bot`] is the only owner of the [`Registry`]. Handlers run to completion
//! without suspending, so events applied one after another can never
//! interleave. Queue-rule failures become replies; only persistence failures
//! come back as `Err`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use baton_core::{
    KnownMembers, Member, MemberDirectory, MemberId, MemberRef, QueueError, RecruitmentStatus,
    Registry, RegistryError,
};

use crate::commands::{self, Command, ParseError, COMMAND_NAMES};
use crate::config::BotConfig;
use crate::error::BotError;

/// One outgoing chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Reply {
    Text {
        text: String,
    },
    Embed {
        title: String,
        description: String,
        footer: String,
    },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text { text: text.into() }
    }

    /// The visible body, whichever kind this is.
    pub fn body(&self) -> &str {
        match self {
            Reply::Text { text } => text,
            Reply::Embed { description, .. } => description,
        }
    }
}

/// A chat message relayed by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub author: Member,
    /// Host-platform administrator capability of the author.
    #[serde(default)]
    pub admin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<u64>,
    pub content: String,
}

/// Sent once the gateway has logged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<u64>,
    pub text: String,
    /// Persisted entries whose member is still unknown.
    pub unresolved: usize,
}

pub struct Bot {
    registry: Registry,
    directory: KnownMembers,
    config: BotConfig,
    handled: u64,
}

impl Bot {
    pub fn new(registry: Registry, directory: KnownMembers, config: BotConfig) -> Self {
        Self {
            registry,
            directory,
            config,
            handled: 0,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Gateway login: learn the member snapshot and resolve placeholders.
    pub fn on_ready(&mut self, members: Vec<Member>) -> Announcement {
        self.directory.extend(members);
        let resolved = self.registry.resolve_members(&self.directory);
        let unresolved = self
            .registry
            .queue()
            .iter()
            .filter(|entry| !entry.member.is_resolved())
            .count();
        tracing::info!(
            known = self.directory.len(),
            resolved,
            unresolved,
            "gateway ready"
        );
        Announcement {
            channel: self.config.announce_channel,
            text: "I just restarted!".to_string(),
            unresolved,
        }
    }

    /// Handle one message. Non-commands produce no replies.
    pub fn on_message(&mut self, message: &IncomingMessage) -> Result<Vec<Reply>, BotError> {
        self.directory.learn(message.author.clone());
        self.registry.observe(&message.author);

        let parsed = commands::parse(
            &message.content,
            &self.config.prefix,
            self.config.bot_member_id(),
        );
        let Some(parsed) = parsed else {
            return Ok(vec![]);
        };
        self.handled += 1;

        let command = match parsed {
            Ok(command) => command,
            Err(ParseError::Unknown(name)) => {
                return Ok(vec![Reply::text(format!(
                    "Unknown command `{name}`. Try `{}all_commands`.",
                    self.config.prefix
                ))])
            }
            Err(ParseError::MissingArgument { usage, .. }) => {
                return Ok(vec![Reply::text(format!(
                    "Usage: `{}{usage}`",
                    self.config.prefix
                ))])
            }
        };

        tracing::debug!(author = %message.author.id, ?command, "handling command");
        let reply = self.handle(&message.author, message.admin, command)?;
        Ok(vec![reply])
    }

    pub fn handle(&mut self, author: &Member, admin: bool, command: Command) -> Result<Reply, BotError> {
        match command {
            Command::SetStatus(label) => self.set_status(author, &label),
            Command::Join => self.set_status(author, "active"),
            Command::Ready => self.set_status(author, "ready"),
            Command::Leave => self.leave(author),
            Command::Display => Ok(self.display()),
            Command::Ping { status, message } => Ok(self.ping(author, &status, &message)),
            Command::RemoveFromQueue(target) => self.remove_from_queue(admin, &target),
            Command::UserFromId(raw) => Ok(self.user_from_id(&raw)),
            Command::AllCommands => Ok(Reply::text(COMMAND_NAMES.join(", "))),
        }
    }

    /// The file is rewritten whatever the outcome.
    fn set_status(&mut self, author: &Member, label: &str) -> Result<Reply, BotError> {
        let status = match label.parse::<RecruitmentStatus>() {
            Ok(status) => status,
            Err(err) => {
                self.registry.persist()?;
                return Ok(Reply::text(err.to_string()));
            }
        };

        match self.registry.set_status(author.clone(), Some(status)) {
            Ok(transition) => {
                tracing::info!(
                    member = %author.id,
                    previous = ?transition.previous,
                    status = %status,
                    "status updated"
                );
                Ok(Reply::text(format!(
                    "{author} is now {}.",
                    status.label().to_lowercase()
                )))
            }
            Err(RegistryError::Queue(err)) => {
                tracing::info!(member = %author.id, status = %status, error = %err, "status rejected");
                self.registry.persist()?;
                Ok(Reply::text(err.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn leave(&mut self, author: &Member) -> Result<Reply, BotError> {
        if !self.registry.queue().contains(author.id) {
            return Ok(Reply::text("You can't leave something you aren't a part of!"));
        }
        self.registry.remove(author.clone())?;
        tracing::info!(member = %author.id, "member left queue");
        Ok(Reply::text(format!("{author} has left the queue.")))
    }

    fn display(&self) -> Reply {
        Reply::Embed {
            title: "Current Recruiters".to_string(),
            description: self.registry.queue().render().to_string(),
            footer: format!("Project BATON: {}", self.config.version_label),
        }
    }

    fn ping(&self, author: &Member, status: &str, message: &str) -> Reply {
        let status = match status.parse::<RecruitmentStatus>() {
            Ok(status) => status,
            Err(err) => return Reply::text(err.to_string()),
        };
        let mentions: Vec<String> = self
            .registry
            .queue()
            .list_by_status(status)
            .map(MemberRef::mention)
            .collect();
        if mentions.is_empty() {
            return Reply::text(format!(
                "Nobody is {} right now.",
                status.label().to_lowercase()
            ));
        }

        let mut text = format!("{} -> {}", author.mention(), mentions.join(" "));
        if !message.is_empty() {
            text.push_str(": ");
            text.push_str(message);
        }
        Reply::text(text)
    }

    fn remove_from_queue(&mut self, admin: bool, target: &str) -> Result<Reply, BotError> {
        if !admin {
            return Ok(Reply::text(
                "You need administrator permission to remove members from the queue.",
            ));
        }
        let Ok(id) = target.parse::<MemberId>() else {
            return Ok(Reply::text(format!(
                "`{target}` is not a member mention or id."
            )));
        };

        let member = self.lookup(id);
        match self.registry.remove(member) {
            Ok(transition) => {
                tracing::info!(member = %id, "member removed by administrator");
                Ok(Reply::text(format!(
                    "{} has been removed from the queue.",
                    transition.member
                )))
            }
            Err(RegistryError::Queue(err @ QueueError::NotFound { .. })) => {
                Ok(Reply::text(format!("{err}.")))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn user_from_id(&self, raw: &str) -> Reply {
        match raw.parse::<MemberId>() {
            Ok(id) => match self.directory.lookup(id) {
                Some(member) => Reply::text(member.name),
                None => Reply::text(format!("No member with id {id} is known.")),
            },
            Err(_) => Reply::text(format!("`{raw}` is not a member id.")),
        }
    }

    /// Directory first, then whatever the queue holds for the id.
    fn lookup(&self, id: MemberId) -> MemberRef {
        self.directory
            .lookup(id)
            .map(MemberRef::Resolved)
            .or_else(|| self.registry.queue().entry(id).map(|entry| entry.member.clone()))
            .unwrap_or(MemberRef::Unresolved(id))
    }

    /// Snapshot for the `status` bridge command.
    pub fn status_payload(&self) -> Value {
        let queue = self.registry.queue();
        let entries: Vec<Value> = queue
            .iter()
            .map(|entry| {
                json!({
                    "id": entry.member.id(),
                    "name": entry.member.to_string(),
                    "status": entry.status.label(),
                    "resolved": entry.member.is_resolved(),
                })
            })
            .collect();
        json!({
            "registry_path": self.registry.path().display().to_string(),
            "active": queue.active_member().map(|m| m.to_string()),
            "entries": entries,
            "known_members": self.directory.len(),
            "commands_handled": self.handled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baton_core::EmptyDirectory;
    use tempfile::TempDir;

    fn alice() -> Member {
        Member::new(1, "alice")
    }
    fn bob() -> Member {
        Member::new(2, "bob")
    }

    fn bot(home: &TempDir) -> Bot {
        let path = home.path().join("recruiters.yaml");
        let registry = Registry::open(path, &EmptyDirectory).expect("open");
        Bot::new(registry, KnownMembers::new(), BotConfig::default())
    }

    fn say(bot: &mut Bot, author: Member, content: &str) -> String {
        let replies = bot
            .on_message(&IncomingMessage {
                author,
                admin: false,
                channel: None,
                content: content.to_string(),
            })
            .expect("handled");
        replies.iter().map(Reply::body).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn join_ready_leave_flow() {
        let home = TempDir::new().unwrap();
        let mut bot = bot(&home);

        assert_eq!(say(&mut bot, alice(), ".ready"), "alice is now ready.");
        assert_eq!(say(&mut bot, alice(), ".join"), "alice is now active.");
        assert_eq!(
            say(&mut bot, bob(), ".set_status ACTIVE"),
            "alice is already actively recruiting. Ask them to leave first."
        );
        assert_eq!(say(&mut bot, alice(), ".leave"), "alice has left the queue.");
        assert_eq!(
            say(&mut bot, alice(), ".leave"),
            "You can't leave something you aren't a part of!"
        );
        assert!(bot.registry().queue().is_empty());
    }

    #[test]
    fn invalid_status_lists_valid_labels_and_still_persists() {
        let home = TempDir::new().unwrap();
        let mut bot = bot(&home);
        std::fs::remove_file(bot.registry().path()).unwrap();

        assert_eq!(
            say(&mut bot, alice(), ".set_status leader"),
            "LEADER is not a valid status. Valid statuses are: READY, ACTIVE."
        );
        assert!(bot.registry().path().exists());
        assert!(bot.registry().queue().is_empty());
    }

    #[test]
    fn display_embed_highlights_active() {
        let home = TempDir::new().unwrap();
        let mut bot = bot(&home);
        say(&mut bot, alice(), ".join");
        say(&mut bot, bob(), ".ready");

        let replies = bot
            .on_message(&IncomingMessage {
                author: bob(),
                admin: false,
                channel: Some(5),
                content: ".display".into(),
            })
            .unwrap();
        match &replies[0] {
            Reply::Embed {
                title,
                description,
                footer,
            } => {
                assert_eq!(title, "Current Recruiters");
                assert!(description.contains("**alice: ACTIVE**"));
                assert!(description.contains("bob:\t\t\t\tREADY"));
                assert_eq!(footer, "Project BATON: A is for Alpha");
            }
            other => panic!("expected embed, got {other:?}"),
        }
    }

    #[test]
    fn ping_mentions_matching_members() {
        let home = TempDir::new().unwrap();
        let mut bot = bot(&home);
        say(&mut bot, alice(), ".ready");
        say(&mut bot, bob(), ".ready");

        assert_eq!(
            say(&mut bot, alice(), ".ping ready lets go"),
            "<@1> -> <@1> <@2>: lets go"
        );
        assert_eq!(say(&mut bot, alice(), ".ping active"), "Nobody is active right now.");
        assert!(say(&mut bot, alice(), ".ping leader").contains("Valid statuses are"));
    }

    #[test]
    fn remove_from_queue_requires_admin() {
        let home = TempDir::new().unwrap();
        let mut bot = bot(&home);
        say(&mut bot, bob(), ".join");

        let denied = bot.handle(&alice(), false, Command::RemoveFromQueue("<@2>".into())).unwrap();
        assert!(denied.body().contains("administrator"));
        assert!(bot.registry().queue().contains(bob().id));

        let removed = bot.handle(&alice(), true, Command::RemoveFromQueue("<@2>".into())).unwrap();
        assert_eq!(removed.body(), "bob has been removed from the queue.");
        assert!(bot.registry().queue().active_member().is_none());

        let missing = bot.handle(&alice(), true, Command::RemoveFromQueue("2".into())).unwrap();
        assert_eq!(missing.body(), "bob is not in the queue.");
    }

    #[test]
    fn on_ready_resolves_placeholders() {
        let home = TempDir::new().unwrap();
        let path = home.path().join("recruiters.yaml");
        std::fs::write(&path, "1: ACTIVE\n9: READY\n").unwrap();
        let registry = Registry::open(&path, &EmptyDirectory).unwrap();
        let mut bot = Bot::new(registry, KnownMembers::new(), BotConfig::default());

        let announcement = bot.on_ready(vec![alice()]);
        assert_eq!(announcement.text, "I just restarted!");
        assert_eq!(announcement.unresolved, 1);
        assert_eq!(
            bot.registry().queue().active_member().map(|m| m.to_string()),
            Some("alice".to_string())
        );
        assert_eq!(say(&mut bot, alice(), ".user_from_id 1"), "alice");
        assert_eq!(say(&mut bot, alice(), ".user_from_id 9"), "No member with id 9 is known.");
    }

    #[test]
    fn unknown_and_incomplete_commands_get_help() {
        let home = TempDir::new().unwrap();
        let mut bot = bot(&home);
        assert_eq!(
            say(&mut bot, alice(), ".dance"),
            "Unknown command `dance`. Try `.all_commands`."
        );
        assert_eq!(
            say(&mut bot, alice(), ".set_status"),
            "Usage: `.set_status <ready|active>`"
        );
        assert!(say(&mut bot, alice(), ".all_commands").starts_with("set_status, join"));
        assert_eq!(say(&mut bot, alice(), "just chatting"), "");
    }
}
