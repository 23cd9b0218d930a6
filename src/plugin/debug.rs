use crate::{context::Context, event::*, log_event, logging::*, plugin::Plugin};
use anyhow::Result;
use serenity::all::Message;

/// Logs every event to stdout
pub struct Debug;

/// `guild:channel:author`
async fn origin(ctx: &Context<'_>, msg: &Message) -> String {
    let glue = Glue.color();
    format!(
        "{}{glue}{}{glue}{}",
        msg.guild_id.color(ctx.http).await,
        msg.channel_id.color(ctx.http).await,
        msg.author.color(),
    )
}

#[serenity::async_trait]
impl Plugin for Debug {
    fn name(&self) -> &'static str {
        "debug"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        match event {
            Event::Ready(ready) => log_event!(
                "Connected to {} server(s) as {}, counting invites with prefix `{}` for commands",
                ready.guilds.len(),
                ctx.cache.current_user().color(),
                ctx.cfg.general.command_prefix,
            ),
            Event::Message(msg) => log_event!("{} {}", origin(ctx, msg).await, msg.content),
        }

        Ok(EventHandled::No)
    }
}
