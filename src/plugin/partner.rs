use crate::{
    command, context::Context, event::*, helper::user_key, log_error, log_event,
    logging::PrintColor, plugin::Plugin,
};
use anyhow::Result;
use serenity::all::{CreateEmbed, CreateMessage};

const COLOR_PARTNER: u32 = 0xF4BFC7;

/// Awards a point for every invite posted in a guild's partner channel
pub struct Partner;

#[serenity::async_trait]
impl Plugin for Partner {
    fn name(&self) -> &'static str {
        "partner"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Event::Message(msg) = event else {
            return Ok(EventHandled::No);
        };
        let Some(guild_id) = msg.guild_id else {
            return Ok(EventHandled::No);
        };
        let counts = command::counts_as_partner(
            ctx.keeper.guild_channels(guild_id).await,
            ctx.cfg.channels,
            msg.channel_id,
            &msg.content,
            ctx.invites,
        );
        if !counts {
            return Ok(EventHandled::No);
        }

        let standing = ctx.keeper.record_partner(&user_key(msg.author.id)).await;
        log_event!(
            "{} posted a partner invite, {} point(s) this week, weekly rank {}",
            msg.author.color(),
            standing.weekly_points,
            standing.weekly_rank.color(),
        );

        // The point stands even if this save fails; the periodic save retries.
        if let Err(e) = ctx.keeper.persist().await {
            log_error!("Could not save ledger: {}", e);
        }

        let embed = CreateEmbed::new()
            .color(COLOR_PARTNER)
            .title("Partner Successful!")
            .description(format!(
                "Thanks for the new partner <@{}>! >ᴗ<\n\
                 You earned 1 point.  Your points this week: {} 🏆\n\n\
                 **Weekly rank:** {}\n\n\
                 **All-time rank:** {}",
                msg.author.id, standing.weekly_points, standing.weekly_rank, standing.all_time_rank,
            ))
            .thumbnail(msg.author.face());

        msg.channel_id
            .send_message(
                ctx.cache_http,
                CreateMessage::new().reference_message(msg).embed(embed),
            )
            .await?;
        Ok(EventHandled::Yes)
    }
}
