use crate::{context::Context, event::*, helper::user_key, plugin::Plugin};
use anyhow::Result;
use serenity::all::{CreateEmbed, CreateMessage};

const COLOR_POINTS: u32 = 0x00FF00;

/// Shows someone's standing on both leaderboards
pub struct Points;

#[serenity::async_trait]
impl Plugin for Points {
    fn name(&self) -> &'static str {
        "points"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = &ctx.cfg.general.command_prefix;
        Some(format!(
            "`{}{} [@user]` - show weekly and all-time partner points",
            prefix,
            self.name()
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()) else {
            return Ok(EventHandled::No);
        };

        // Mentioned user if any, otherwise the author
        let user = msg.mentions.first().unwrap_or(&msg.author);
        let standing = ctx.keeper.standing(&user_key(user.id)).await;

        let embed = CreateEmbed::new()
            .color(COLOR_POINTS)
            .title("Points")
            .description(format!(
                "Points for <@{}>\n\n\
                 **Weekly points:** {}\n\
                 **Weekly rank:** {}\n\n\
                 **All-time points:** {}\n\
                 **All-time rank:** {}",
                user.id,
                standing.weekly_points,
                standing.weekly_rank,
                standing.all_time_points,
                standing.all_time_rank,
            ))
            .thumbnail(user.face());

        msg.channel_id
            .send_message(
                ctx.cache_http,
                CreateMessage::new().reference_message(msg).embed(embed),
            )
            .await?;
        Ok(EventHandled::Yes)
    }
}
