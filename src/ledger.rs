//! Weekly and all-time partner points, plus the per-guild channel configuration.
//!
//! Everything in here is plain in-memory state.  Sharing it across events is the job of
//! [`crate::bookkeeper::Bookkeeper`] and putting it on disk is the job of
//! [`crate::store::LedgerStore`].

use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};
use serenity::all::{ChannelId, GuildId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Placeholder used in place of an empty ranking
pub const NO_POINTS_YET: &str = "No points yet.";

/// Points per user, remembering the order in which users first scored.
///
/// The first-scored order is the tie-break when ranking: of two users with equal points, the one
/// who entered the map first ranks higher.  It survives a save/load cycle because the map is
/// serialized as a JSON object in that order and read back in document order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PointsMap {
    entries: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

/// Position of a user within a [`PointsMap`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rank {
    /// 1-based position, highest points first
    Ranked(usize),
    /// The user has no entry in the map
    NotRanked,
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Rank::Ranked(position) => write!(f, "#{}", position),
            Rank::NotRanked => write!(f, "Not ranked"),
        }
    }
}

impl PointsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, user: &str) -> Option<u64> {
        self.index.get(user).map(|&i| self.entries[i].1)
    }

    /// Points for display purposes.  Absent users show as zero.
    pub fn points(&self, user: &str) -> u64 {
        self.get(user).unwrap_or(0)
    }

    /// Add one point to `user`, returning their new total.
    pub fn increment(&mut self, user: &str) -> u64 {
        match self.index.get(user) {
            Some(&i) => {
                let points = &mut self.entries[i].1;
                *points = points.saturating_add(1);
                *points
            }
            None => {
                self.insert(user.to_owned(), 1);
                1
            }
        }
    }

    /// Set the points of `user`, appending them in first-scored order if new.
    fn insert(&mut self, user: String, points: u64) {
        match self.index.get(&user) {
            Some(&i) => self.entries[i].1 = points,
            None => {
                self.index.insert(user.clone(), self.entries.len());
                self.entries.push((user, points));
            }
        }
    }

    /// Entries in first-scored order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(user, points)| (user.as_str(), *points))
    }

    /// Entries ordered by descending points.  Ties keep first-scored order.
    pub fn ranked(&self) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self.iter().collect();
        // `sort_by` is stable, so equal totals stay in first-scored order.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    pub fn rank(&self, user: &str) -> Rank {
        if !self.index.contains_key(user) {
            return Rank::NotRanked;
        }

        self.ranked()
            .iter()
            .position(|(id, _)| *id == user)
            .map(|i| Rank::Ranked(i + 1))
            .unwrap_or(Rank::NotRanked)
    }

    /// `"<position>. <user>: <points>"` lines, or [`NO_POINTS_YET`] when empty.
    pub fn format_ranking(&self) -> String {
        self.format_ranking_with(
            |position, user, points| format!("{}. {}: {}", position, user, points),
            NO_POINTS_YET,
        )
    }

    /// Like [`PointsMap::format_ranking`], with caller-provided lines and placeholder.
    pub fn format_ranking_with<F>(&self, line: F, empty: &str) -> String
    where
        F: Fn(usize, &str, u64) -> String,
    {
        if self.is_empty() {
            return empty.to_owned();
        }

        self.ranked()
            .into_iter()
            .enumerate()
            .map(|(i, (user, points))| line(i + 1, user, points))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Serialize for PointsMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (user, points) in &self.entries {
            map.serialize_entry(user, points)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PointsMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PointsMapVisitor;

        impl<'de> Visitor<'de> for PointsMapVisitor {
            type Value = PointsMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of user ids to non-negative point counts")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<PointsMap, A::Error> {
                let mut map = PointsMap::new();
                while let Some((user, points)) = access.next_entry::<String, u64>()? {
                    map.insert(user, points);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(PointsMapVisitor)
    }
}

/// Channels the bot works with in one guild
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildChannels {
    /// Where weekly summaries are posted
    pub log_channel_id: ChannelId,
    /// Where partner invites are posted and counted
    pub target_channel_id: ChannelId,
}

pub type GuildConfig = BTreeMap<GuildId, GuildChannels>;

/// A user's points and ranks on both leaderboards
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Standing {
    pub weekly_points: u64,
    pub weekly_rank: Rank,
    pub all_time_points: u64,
    pub all_time_rank: Rank,
}

/// The authoritative bot state
#[derive(Clone, Debug, Default)]
pub struct Ledger {
    pub weekly: PointsMap,
    pub all_time: PointsMap,
    pub guilds: GuildConfig,
    /// Changed since the last snapshot was taken for saving
    dirty: bool,
}

impl Ledger {
    pub fn new(weekly: PointsMap, all_time: PointsMap, guilds: GuildConfig) -> Self {
        Self {
            weekly,
            all_time,
            guilds,
            dirty: false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Copy of the state for saving.  Clears the dirty flag.
    pub fn take_snapshot(&mut self) -> Ledger {
        self.dirty = false;
        self.clone()
    }

    /// Credit `user` with one partner post on both leaderboards.
    pub fn record_partner(&mut self, user: &str) -> Standing {
        self.weekly.increment(user);
        self.all_time.increment(user);
        self.dirty = true;
        self.standing(user)
    }

    pub fn standing(&self, user: &str) -> Standing {
        Standing {
            weekly_points: self.weekly.points(user),
            weekly_rank: self.weekly.rank(user),
            all_time_points: self.all_time.points(user),
            all_time_rank: self.all_time.rank(user),
        }
    }

    /// Start a new week.  The all-time leaderboard is kept.
    pub fn reset_weekly(&mut self) {
        self.weekly = PointsMap::new();
        self.dirty = true;
    }

    pub fn guild_channels(&self, guild_id: GuildId) -> Option<GuildChannels> {
        self.guilds.get(&guild_id).copied()
    }

    pub fn set_guild_channels(&mut self, guild_id: GuildId, channels: GuildChannels) {
        self.guilds.insert(guild_id, channels);
        self.dirty = true;
    }
}
