use crate::{
    command::{self, SetChannels as Outcome},
    context::Context,
    event::*,
    helper::MessageHelper,
    log_error, log_event,
    logging::PrintColor,
    plugin::Plugin,
};
use anyhow::Result;

/// Admin command choosing a guild's summary and partner channels
pub struct SetChannels;

#[serenity::async_trait]
impl Plugin for SetChannels {
    fn name(&self) -> &'static str {
        "setchannels"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = &ctx.cfg.general.command_prefix;
        Some(format!(
            "`{}{} <log-channel> <partner-channel>` - choose where summaries go and where invites count (admin only)",
            prefix,
            self.name()
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()) else {
            return Ok(EventHandled::No);
        };
        let Some(guild_id) = msg.guild_id else {
            msg.reply(ctx.cache_http, "This command only works inside a server.")
                .await?;
            return Ok(EventHandled::Yes);
        };

        let is_admin = msg.is_from_admin(ctx);
        let outcome = {
            let mut ledger = ctx.keeper.ledger().write().await;
            command::set_channels(&mut ledger, guild_id, is_admin, &args)
        };

        let reply = match outcome {
            Outcome::Updated(channels) => {
                log_event!(
                    "{} set log channel {} and partner channel {}",
                    msg.author.color(),
                    channels.log_channel_id,
                    channels.target_channel_id,
                );
                if let Err(e) = ctx.keeper.persist().await {
                    log_error!("Could not save ledger: {}", e);
                }
                format!(
                    "Channels set.  Summaries go to <#{}>, invites count in <#{}>.",
                    channels.log_channel_id, channels.target_channel_id
                )
            }
            Outcome::Denied => "You do not have permission to use this command.".to_owned(),
            Outcome::Usage => format!(
                "Please give both the log channel and the partner channel.  Example: `{}{} <log-channel> <partner-channel>`",
                ctx.cfg.general.command_prefix,
                self.name()
            ),
        };

        msg.reply(ctx.cache_http, reply).await?;
        Ok(EventHandled::Yes)
    }
}
