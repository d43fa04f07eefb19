//! Text command parsing.
//!
//! A message is a command when it starts with the configured prefix
//! (`.join`) or with a mention of the bot (`<@bot_id> join`). Arguments are
//! whitespace-separated; `ping` keeps everything after the status verbatim.

use baton_core::MemberId;

/// Every command the bot answers to, in `all_commands` order.
pub const COMMAND_NAMES: &[&str] = &[
    "set_status",
    "join",
    "ready",
    "leave",
    "display",
    "ping",
    "remove_from_queue",
    "user_from_id",
    "all_commands",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Raw label; validated against the status enumeration at dispatch.
    SetStatus(String),
    Join,
    Ready,
    Leave,
    Display,
    Ping { status: String, message: String },
    /// Mention or bare id of the member to remove.
    RemoveFromQueue(String),
    UserFromId(String),
    AllCommands,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Unknown(String),
    MissingArgument { command: &'static str, usage: &'static str },
}

/// Parse `content`. `None` if the message is not addressed to the bot.
pub fn parse(
    content: &str,
    prefix: &str,
    bot_id: Option<MemberId>,
) -> Option<Result<Command, ParseError>> {
    let body = strip_invocation(content.trim_start(), prefix, bot_id)?;
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let (name, rest) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };
    let first_arg = rest.split_whitespace().next();

    let command = match name {
        "set_status" => first_arg
            .map(|arg| Command::SetStatus(arg.to_string()))
            .ok_or(ParseError::MissingArgument {
                command: "set_status",
                usage: "set_status <ready|active>",
            }),
        "join" => Ok(Command::Join),
        "ready" => Ok(Command::Ready),
        "leave" => Ok(Command::Leave),
        "display" => Ok(Command::Display),
        "ping" => match rest.split_once(char::is_whitespace) {
            Some((status, message)) => Ok(Command::Ping {
                status: status.to_string(),
                message: message.trim().to_string(),
            }),
            None if !rest.is_empty() => Ok(Command::Ping {
                status: rest.to_string(),
                message: String::new(),
            }),
            None => Err(ParseError::MissingArgument {
                command: "ping",
                usage: "ping <ready|active> [message]",
            }),
        },
        "remove_from_queue" => first_arg
            .map(|arg| Command::RemoveFromQueue(arg.to_string()))
            .ok_or(ParseError::MissingArgument {
                command: "remove_from_queue",
                usage: "remove_from_queue <@member>",
            }),
        "user_from_id" => first_arg
            .map(|arg| Command::UserFromId(arg.to_string()))
            .ok_or(ParseError::MissingArgument {
                command: "user_from_id",
                usage: "user_from_id <id>",
            }),
        "all_commands" => Ok(Command::AllCommands),
        other => Err(ParseError::Unknown(other.to_string())),
    };
    Some(command)
}

fn strip_invocation<'a>(content: &'a str, prefix: &str, bot_id: Option<MemberId>) -> Option<&'a str> {
    if let Some(id) = bot_id {
        for mention in [format!("<@{id}>"), format!("<@!{id}>")] {
            if let Some(rest) = content.strip_prefix(mention.as_str()) {
                return Some(rest);
            }
        }
    }
    if prefix.is_empty() {
        return None;
    }
    content.strip_prefix(prefix)
}
