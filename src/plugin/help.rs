use crate::{context::Context, event::*, plugin::Plugin};
use anyhow::Result;
use serenity::all::{CreateEmbed, CreateMessage};

const COLOR_HELP: u32 = 0xF4BFC7;

/// Lists the usage line of every command plugin
pub struct Help;

#[serenity::async_trait]
impl Plugin for Help {
    fn name(&self) -> &'static str {
        "help"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(format!(
            "`{}{}` - show this help message",
            ctx.cfg.general.command_prefix,
            self.name()
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()) else {
            return Ok(EventHandled::No);
        };

        let mut lines = Vec::new();
        for plugin in crate::plugin::plugins() {
            lines.extend(plugin.usage(ctx).await);
        }
        lines.push("Post an invite in the partner channel to earn a point.".to_owned());

        let embed = CreateEmbed::new()
            .color(COLOR_HELP)
            .title("Commands")
            .description(lines.join("\n"));
        msg.channel_id
            .send_message(
                ctx.cache_http,
                CreateMessage::new().reference_message(msg).embed(embed),
            )
            .await?;
        Ok(EventHandled::Yes)
    }
}
