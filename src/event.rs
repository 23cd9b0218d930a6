use crate::{context::Context, log_error};
use serenity::all::{Message, Ready};

/// A Discord event
pub enum Event {
    Ready(Ready),
    Message(Message),
}

impl Event {
    // When an event occurs, iterate over all the plugins to see if any can/should handle it.
    pub async fn handle(self, ctx: Context<'_>) {
        for plugin in crate::plugin::plugins() {
            match plugin.handle(&ctx, &self).await {
                Ok(EventHandled::Yes) => return,
                Ok(EventHandled::No) => continue,
                Err(err) => log_error!("Error in plugin {}: {}", plugin.name(), err),
            }
        }
    }

    // Check if a message should be interpreted as a special bot command.
    //
    // These are prefixed with the configured command prefix, e. g. `!points @someone`.  Returns
    // the message and the arguments following the command.
    pub fn is_bot_cmd<'a>(&'a self, ctx: &Context, cmd: &str) -> Option<(&'a Message, Vec<&'a str>)> {
        let Event::Message(msg) = self else {
            return None;
        };

        let mut words = msg.content.split_ascii_whitespace();
        let name = words
            .next()?
            .strip_prefix(ctx.cfg.general.command_prefix.as_str())?;

        (name == cmd).then(|| (msg, words.collect()))
    }
}

pub enum EventHandled {
    Yes,
    No,
}
