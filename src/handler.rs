use crate::{
    bookkeeper::Bookkeeper, config::Config, context::Context, event::Event,
    invite::InviteFinder,
};
use serenity::all::{Message, Ready};
use std::sync::Arc;

/// Discord event handler
pub struct Handler {
    cfg: Config,
    keeper: Arc<Bookkeeper>,
    invites: InviteFinder,
}

impl<'a> Handler {
    pub fn new(cfg: Config, keeper: Arc<Bookkeeper>, invites: InviteFinder) -> Self {
        Self {
            cfg,
            keeper,
            invites,
        }
    }

    fn ctx(&'a self, discord_ctx: &'a serenity::all::Context) -> Context<'a> {
        Context {
            cfg: &self.cfg,
            keeper: &self.keeper,
            invites: &self.invites,
            cache: &discord_ctx.cache,
            http: &discord_ctx.http,
            cache_http: discord_ctx,
        }
    }
}

#[serenity::async_trait]
impl serenity::all::EventHandler for Handler {
    async fn ready(&self, discord_ctx: serenity::all::Context, ready: Ready) {
        Event::Ready(ready).handle(self.ctx(&discord_ctx)).await;
    }

    async fn message(&self, discord_ctx: serenity::all::Context, msg: Message) {
        Event::Message(msg).handle(self.ctx(&discord_ctx)).await;
    }
}
