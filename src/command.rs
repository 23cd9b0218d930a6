//! Command logic which doesn't need a Discord connection.

use crate::{
    invite::InviteFinder,
    ledger::{GuildChannels, Ledger},
};
use serenity::all::{ChannelId, GuildId};

/// Result of the set-channels command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetChannels {
    Updated(GuildChannels),
    /// Caller is not an administrator
    Denied,
    /// Arguments missing or not channels
    Usage,
}

/// Accepts a raw id or a `<#id>` channel mention.
pub fn parse_channel(arg: &str) -> Option<ChannelId> {
    let id = arg
        .strip_prefix("<#")
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(arg);
    match id.parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(id) => Some(ChannelId::new(id)),
    }
}

/// `<log-channel> <target-channel>`: point the guild's summaries and partner counting at the
/// given channels.  Leaves the ledger untouched unless the result is `Updated`.
pub fn set_channels(
    ledger: &mut Ledger,
    guild_id: GuildId,
    caller_is_admin: bool,
    args: &[&str],
) -> SetChannels {
    if !caller_is_admin {
        return SetChannels::Denied;
    }

    let (Some(log), Some(target)) = (args.first(), args.get(1)) else {
        return SetChannels::Usage;
    };
    let (Some(log_channel_id), Some(target_channel_id)) = (parse_channel(log), parse_channel(target))
    else {
        return SetChannels::Usage;
    };

    let channels = GuildChannels {
        log_channel_id,
        target_channel_id,
    };
    ledger.set_guild_channels(guild_id, channels);
    SetChannels::Updated(channels)
}

/// Whether a guild message earns its author a point: it was posted in the guild's partner
/// channel and looks like an invite.  A guild's own channel settings take precedence over the
/// globally configured `fallback`; with neither, nothing counts.
pub fn counts_as_partner(
    guild_channels: Option<GuildChannels>,
    fallback: Option<GuildChannels>,
    channel_id: ChannelId,
    text: &str,
    invites: &InviteFinder,
) -> bool {
    match guild_channels.or(fallback) {
        Some(channels) => channels.target_channel_id == channel_id && invites.is_invite(text),
        None => false,
    }
}
