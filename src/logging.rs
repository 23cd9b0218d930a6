//! Colored terminal output.
//!
//! Every line starts with a one-character tag: `*` for something that happened on Discord, `+`
//! for work the bot did on its own (saves, resets, backups) and `!` for failures which were logged
//! and dropped.

use crate::ledger::Rank;
use serenity::all::{ChannelId, GuildId, Http, User};
use std::io::IsTerminal;
use std::sync::{Arc, LazyLock};

pub enum Color {
    Default,
    Event,
    Internal,
    Error,
    User,
    Channel,
    Guild,
    Rank,
    Glue,
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        // Escape codes would end up verbatim in log files
        static COLORED: LazyLock<bool> = LazyLock::new(|| std::io::stdout().is_terminal());
        if !*COLORED {
            return Ok(());
        }

        f.write_str(match self {
            Color::Default => "\x1b[0m",
            Color::Event => "\x1b[33m",
            Color::Internal => "\x1b[35m",
            Color::Error => "\x1b[31m",
            Color::User => "\x1b[32m",
            Color::Channel => "\x1b[36m",
            Color::Guild => "\x1b[38;5;33m",
            Color::Rank => "\x1b[38;5;218m",
            Color::Glue => "\x1b[90m",
        })
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! log_tagged {
    ($print:ident, $color:ident, $tag:literal, $($args:tt)*) => {
        $print!(
            "{}{}{} {}",
            $crate::logging::Color::$color,
            $tag,
            $crate::logging::Color::Default,
            format_args!($($args)*)
        )
    };
}

/// Something happened on Discord
#[macro_export]
macro_rules! log_event {
    ($($args:tt)*) => {
        $crate::log_tagged!(println, Event, "*", $($args)*)
    };
}

/// The bot did something on its own, e.g. a scheduled save
#[macro_export]
macro_rules! log_internal {
    ($($args:tt)*) => {
        $crate::log_tagged!(println, Internal, "+", $($args)*)
    };
}

/// Something failed and was dropped
#[macro_export]
macro_rules! log_error {
    ($($args:tt)*) => {
        $crate::log_tagged!(eprintln, Error, "!", $($args)*)
    };
}

fn paint(color: Color, text: impl std::fmt::Display) -> String {
    format!("{}{}{}", color, text, Color::Default)
}

pub trait PrintColor {
    fn color(&self) -> String;
}

/// For things whose name needs a lookup
#[serenity::async_trait]
pub trait AsyncPrintColor {
    async fn color(&self, http: &Arc<Http>) -> String;
}

/// Field separator
pub struct Glue;

impl PrintColor for Glue {
    fn color(&self) -> String {
        paint(Color::Glue, ":")
    }
}

impl PrintColor for serenity::all::CurrentUser {
    fn color(&self) -> String {
        paint(Color::User, &self.name)
    }
}

/// Name plus id, since the ledger only knows the id
impl PrintColor for User {
    fn color(&self) -> String {
        paint(Color::User, format_args!("{} ({})", self.name, self.id))
    }
}

impl PrintColor for Rank {
    fn color(&self) -> String {
        paint(Color::Rank, self)
    }
}

#[serenity::async_trait]
impl AsyncPrintColor for ChannelId {
    async fn color(&self, http: &Arc<Http>) -> String {
        match self.name(http).await {
            Ok(name) => paint(Color::Channel, name),
            Err(_) => paint(Color::Channel, format_args!("<unknown-channel-{}>", self)),
        }
    }
}

#[serenity::async_trait]
impl AsyncPrintColor for Option<GuildId> {
    async fn color(&self, http: &Arc<Http>) -> String {
        let Some(guild_id) = self else {
            return paint(Color::Guild, "<direct-message>");
        };
        match guild_id.to_partial_guild(http).await {
            Ok(guild) => paint(Color::Guild, guild.name),
            Err(_) => paint(Color::Guild, format_args!("<unknown-guild-{}>", guild_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_print_like_the_leaderboard() {
        let printed = Rank::Ranked(2).color();
        assert!(printed.contains("#2"));
        assert!(Rank::NotRanked.color().contains("Not ranked"));
    }
}
