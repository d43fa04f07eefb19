//! `baton say --id <id> --name <name> [--admin] <message…>`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use baton_bot::{request_message, IncomingMessage, Reply};
use baton_core::Member;

/// Send a chat message to the running bot as a member.
#[derive(Args, Debug)]
pub struct SayArgs {
    /// Member id of the author.
    #[arg(long)]
    pub id: u64,

    /// Display name of the author.
    #[arg(long)]
    pub name: String,

    /// Author holds the administrator capability.
    #[arg(long)]
    pub admin: bool,

    /// Channel the message was posted in.
    #[arg(long)]
    pub channel: Option<u64>,

    /// Message text, e.g. `.join` or `.ping ready raid in 5`.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub message: Vec<String>,
}

impl SayArgs {
    pub fn run(self) -> Result<()> {
        let home = super::bot::home()?;
        let token = super::bot::read_token(&home)?;
        let message = IncomingMessage {
            author: Member::new(self.id, self.name),
            admin: self.admin,
            channel: self.channel,
            content: self.message.join(" "),
        };

        let replies = request_message(&home, token, message).context("failed to reach the bot")?;
        if replies.is_empty() {
            println!("{}", "(no reply)".bright_black());
        }
        for reply in replies {
            print_reply(&reply);
        }
        Ok(())
    }
}

fn print_reply(reply: &Reply) {
    match reply {
        Reply::Text { text } => println!("{text}"),
        Reply::Embed {
            title,
            description,
            footer,
        } => {
            println!("{}", title.bold());
            println!("{}", description.replace('\t', " "));
            println!("{}", footer.bright_black());
        }
    }
}
