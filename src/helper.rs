//! Miscellaneous convenience methods

use crate::context::Context;

pub trait MessageHelper {
    fn is_from_admin(&self, ctx: &Context) -> bool;
}

impl MessageHelper for serenity::all::Message {
    /// Whether the author holds the Administrator permission in the message's guild.  Always
    /// false outside guilds or when the guild isn't cached.
    fn is_from_admin(&self, ctx: &Context) -> bool {
        self.author_permissions(ctx.cache)
            .is_some_and(|permissions| permissions.administrator())
    }
}

/// Ledger key for a Discord user
pub fn user_key(user_id: serenity::all::UserId) -> String {
    user_id.get().to_string()
}
