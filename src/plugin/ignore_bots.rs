use crate::{context::Context, event::*, plugin::Plugin};
use anyhow::Result;

/// Bots never earn points or run commands, including this one.
pub struct IgnoreBots;

#[serenity::async_trait]
impl Plugin for IgnoreBots {
    fn name(&self) -> &'static str {
        "ignore_bots"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, _ctx: &Context, event: &Event) -> Result<EventHandled> {
        match event {
            Event::Message(msg) if msg.author.bot => Ok(EventHandled::Yes),
            _ => Ok(EventHandled::No),
        }
    }
}
