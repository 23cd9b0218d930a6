//! Timers: the periodic save and the weekly leaderboard reset.

use crate::{
    bookkeeper::Bookkeeper,
    ledger::{GuildChannels, PointsMap},
    log_error, log_internal,
};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Datelike, Local, NaiveTime, TimeDelta, TimeZone, Weekday};
use serenity::all::{ChannelId, CreateEmbed, CreateMessage, Http};
use std::{future::Future, str::FromStr, sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const COLOR_WEEKLY: u32 = 0xFFA500;
const COLOR_ALL_TIME: u32 = 0x0000FF;
const COLOR_NEW_WEEK: u32 = 0xF4BFC7;

/// A weekly point in time, local to whichever time zone it is evaluated in.
///
/// Parsed from a cron expression of the form `"<minute> <hour> * * <day-of-week>"`, where the
/// day of week is `0`-`7` with both `0` and `7` meaning Sunday.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeeklyAt {
    pub weekday: Weekday,
    pub time: NaiveTime,
}

impl FromStr for WeeklyAt {
    type Err = anyhow::Error;

    fn from_str(expr: &str) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        let &[minute, hour, day_of_month, month, day_of_week] = fields.as_slice() else {
            return Err(anyhow!("Expected 5 cron fields in `{}`", expr));
        };

        if day_of_month != "*" || month != "*" {
            return Err(anyhow!(
                "Only weekly schedules are supported, day of month and month must be `*` in `{}`",
                expr
            ));
        }

        let minute: u32 = minute
            .parse()
            .map_err(|_| anyhow!("Invalid minute `{}` in `{}`", minute, expr))?;
        let hour: u32 = hour
            .parse()
            .map_err(|_| anyhow!("Invalid hour `{}` in `{}`", hour, expr))?;
        let time = NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or(anyhow!("Time of day out of range in `{}`", expr))?;

        let weekday = match day_of_week {
            "0" | "7" => Weekday::Sun,
            "1" => Weekday::Mon,
            "2" => Weekday::Tue,
            "3" => Weekday::Wed,
            "4" => Weekday::Thu,
            "5" => Weekday::Fri,
            "6" => Weekday::Sat,
            _ => return Err(anyhow!("Invalid day of week `{}` in `{}`", day_of_week, expr)),
        };

        Ok(Self { weekday, time })
    }
}

impl WeeklyAt {
    /// The first trigger strictly after `now`, in `now`'s time zone.
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let tz = now.timezone();
        let today = now.date_naive();
        let mut days_ahead = (7 + self.weekday.num_days_from_sunday() as i64
            - today.weekday().num_days_from_sunday() as i64)
            % 7;

        loop {
            let local = (today + TimeDelta::days(days_ahead)).and_time(self.time);
            // Skipped by a DST change; fire once the clocks have moved on.
            let candidate = tz
                .from_local_datetime(&local)
                .earliest()
                .or_else(|| tz.from_local_datetime(&(local + TimeDelta::hours(1))).earliest());

            match candidate {
                Some(candidate) if candidate > *now => return candidate,
                _ => days_ahead += 7,
            }
        }
    }
}

/// Run `job` every `period`, starting one period from now.
pub fn run_every<F, Fut>(period: Duration, mut job: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            job().await;
        }
    })
}

/// Run `job` at every occurrence of `at` in the local time zone.
pub fn run_weekly<F, Fut>(at: WeeklyAt, job: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    run_weekly_with(at, Local::now, job)
}

/// Like [`run_weekly`], reading the wall clock from `clock`.
pub fn run_weekly_with<Tz, C, F, Fut>(at: WeeklyAt, clock: C, mut job: F) -> JoinHandle<()>
where
    Tz: TimeZone + Send + 'static,
    Tz::Offset: Send + std::fmt::Display,
    C: Fn() -> DateTime<Tz> + Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut last: Option<DateTime<Tz>> = None;

        loop {
            let now = clock();
            // Never fire twice for one trigger, even if the wall clock lags the timer.
            let from = match &last {
                Some(last) if *last > now => last.clone(),
                _ => now,
            };
            let next = at.next_after(&from);
            log_internal!("Next weekly reset at {}", next.format("%Y-%m-%d %H:%M %Z"));

            let wait = next
                .clone()
                .signed_duration_since(clock())
                .to_std()
                .unwrap_or_default();
            tokio::time::sleep(wait).await;
            last = Some(next);
            job().await;
        }
    })
}

/// One embed in a scheduled post
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Announcement {
    pub title: String,
    pub description: String,
    pub color: u32,
}

/// Where scheduled posts go
#[serenity::async_trait]
pub trait Outbox: Send + Sync {
    async fn announce(&self, channel_id: ChannelId, announcements: Vec<Announcement>) -> Result<()>;
}

#[serenity::async_trait]
impl Outbox for Http {
    async fn announce(&self, channel_id: ChannelId, announcements: Vec<Announcement>) -> Result<()> {
        let embeds = announcements
            .into_iter()
            .map(|a| {
                CreateEmbed::new()
                    .title(a.title)
                    .description(a.description)
                    .color(a.color)
            })
            .collect();

        channel_id
            .send_message(self, CreateMessage::new().embeds(embeds))
            .await?;
        Ok(())
    }
}

fn ranking(points: &PointsMap, empty: &str) -> String {
    points.format_ranking_with(
        |position, user, points| format!("{}. <@{}>: {} points", position, user, points),
        empty,
    )
}

/// Post the week's results, clear the weekly leaderboard and save.
///
/// `fallback` is the globally configured channel pair, used alongside per-guild settings.
pub async fn close_week(
    keeper: &Bookkeeper,
    outbox: &dyn Outbox,
    fallback: Option<GuildChannels>,
    announce_new_week: bool,
) {
    let closed = keeper.close_week().await;
    log_internal!("Closed the week with {} partner(s) on the board", closed.weekly.len());

    let mut destinations: Vec<GuildChannels> = closed.guilds.values().copied().collect();
    if let Some(fallback) = fallback {
        if !destinations.contains(&fallback) {
            destinations.push(fallback);
        }
    }

    let summary = vec![
        Announcement {
            title: "Weekly Partner Standings".to_owned(),
            description: ranking(&closed.weekly, "No partners this week."),
            color: COLOR_WEEKLY,
        },
        Announcement {
            title: "All-Time Partner Standings".to_owned(),
            description: ranking(&closed.all_time, "No partners yet."),
            color: COLOR_ALL_TIME,
        },
    ];
    for channels in &destinations {
        if let Err(e) = outbox
            .announce(channels.log_channel_id, summary.clone())
            .await
        {
            log_error!(
                "Could not post weekly summary to {}: {}",
                channels.log_channel_id,
                e
            );
        }
    }

    if let Err(e) = keeper.persist().await {
        log_error!("Could not save after the weekly reset: {}", e);
    }

    if !announce_new_week {
        return;
    }

    let notice = vec![Announcement {
        title: "A New Week Begins".to_owned(),
        description: "The weekly leaderboard has been reset.  Every partner counts again!"
            .to_owned(),
        color: COLOR_NEW_WEEK,
    }];
    for channels in &destinations {
        if let Err(e) = outbox
            .announce(channels.target_channel_id, notice.clone())
            .await
        {
            log_error!(
                "Could not post new week notice to {}: {}",
                channels.target_channel_id,
                e
            );
        }
    }
}

/// Start both timers for the lifetime of the process.
pub fn start(
    keeper: Arc<Bookkeeper>,
    outbox: Arc<dyn Outbox>,
    save_interval: Duration,
    weekly_reset: WeeklyAt,
    fallback: Option<GuildChannels>,
    announce_new_week: bool,
) -> (JoinHandle<()>, JoinHandle<()>) {
    let saver = {
        let keeper = keeper.clone();
        run_every(save_interval, move || {
            let keeper = keeper.clone();
            async move {
                match keeper.persist_if_dirty().await {
                    Ok(true) => log_internal!("Saved ledger"),
                    Ok(false) => {}
                    Err(e) => log_error!("Could not save ledger: {}", e),
                }
            }
        })
    };

    let resetter = run_weekly(weekly_reset, move || {
        let keeper = keeper.clone();
        let outbox = outbox.clone();
        async move {
            close_week(&keeper, outbox.as_ref(), fallback, announce_new_week).await;
        }
    });

    (saver, resetter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backup::BackupDispatcher, ledger::Rank, store::LedgerStore};
    use chrono::Utc;
    use serenity::all::GuildId;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    #[derive(Default)]
    struct RecordingOutbox {
        sent: Mutex<Vec<(ChannelId, Vec<Announcement>)>>,
    }

    #[serenity::async_trait]
    impl Outbox for RecordingOutbox {
        async fn announce(
            &self,
            channel_id: ChannelId,
            announcements: Vec<Announcement>,
        ) -> Result<()> {
            self.sent.lock().unwrap().push((channel_id, announcements));
            Ok(())
        }
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn parses_reference_schedule() {
        let at: WeeklyAt = "0 0 * * 0".parse().unwrap();
        assert_eq!(at.weekday, Weekday::Sun);
        assert_eq!(at.time, NaiveTime::from_hms_opt(0, 0, 0).unwrap());

        let at: WeeklyAt = "30 18 * * 5".parse().unwrap();
        assert_eq!(at.weekday, Weekday::Fri);
        assert_eq!(at.time, NaiveTime::from_hms_opt(18, 30, 0).unwrap());

        assert_eq!("0 0 * * 7".parse::<WeeklyAt>().unwrap().weekday, Weekday::Sun);
    }

    #[test]
    fn rejects_unsupported_schedules() {
        for expr in [
            "",
            "0 0 * *",
            "0 0 1 * 0",
            "0 0 * 6 0",
            "60 0 * * 0",
            "0 24 * * 0",
            "0 0 * * 8",
            "x 0 * * 0",
        ] {
            assert!(expr.parse::<WeeklyAt>().is_err(), "{}", expr);
        }
    }

    #[test]
    fn next_trigger_later_in_the_week() {
        let at: WeeklyAt = "0 0 * * 0".parse().unwrap();
        // A Wednesday
        let next = at.next_after(&utc("2026-10-14T15:00:00Z"));
        assert_eq!(next, utc("2026-10-18T00:00:00Z"));
    }

    #[test]
    fn next_trigger_is_strictly_after_now() {
        let at: WeeklyAt = "0 0 * * 0".parse().unwrap();
        let sunday_midnight = utc("2026-10-18T00:00:00Z");
        assert_eq!(at.next_after(&sunday_midnight), utc("2026-10-25T00:00:00Z"));
    }

    #[test]
    fn next_trigger_same_day_later() {
        let at: WeeklyAt = "30 18 * * 0".parse().unwrap();
        let next = at.next_after(&utc("2026-10-18T09:00:00Z"));
        assert_eq!(next, utc("2026-10-18T18:30:00Z"));
    }

    #[tokio::test(start_paused = true)]
    async fn run_every_waits_a_full_period_first() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let handle = run_every(Duration::from_secs(60), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn weekly_job_fires_once_per_trigger() {
        let at: WeeklyAt = "0 0 * * 0".parse().unwrap();
        // Saturday, one minute before the reset.  The clock never moves, like a wall clock
        // lagging behind the timer.
        let frozen = utc("2024-06-01T23:59:00Z");
        let (fired, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = run_weekly_with(at, move || frozen, move || {
            let fired = fired.clone();
            async move {
                let _ = fired.send(tokio::time::Instant::now());
            }
        });

        let start = tokio::time::Instant::now();
        let first = rx.recv().await.unwrap();
        assert_eq!(first - start, Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(rx.try_recv().is_err());

        let second = rx.recv().await.unwrap();
        assert_eq!(second - first, Duration::from_secs(7 * 24 * 3600 + 60));
        handle.abort();
    }

    #[tokio::test]
    async fn close_week_announces_resets_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let keeper = Bookkeeper::open(LedgerStore::new(dir.path()), BackupDispatcher::disabled())
            .await
            .unwrap();
        for user in ["1", "2", "2"] {
            keeper.record_partner(user).await;
        }
        let guild = GuildChannels {
            log_channel_id: ChannelId::new(10),
            target_channel_id: ChannelId::new(11),
        };
        keeper
            .ledger()
            .write()
            .await
            .set_guild_channels(GuildId::new(1), guild);
        let outbox = RecordingOutbox::default();

        close_week(&keeper, &outbox, None, true).await;

        let sent = outbox.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, ChannelId::new(10));
        assert_eq!(sent[0].1.len(), 2);
        assert_eq!(sent[0].1[0].description, "1. <@2>: 2 points\n2. <@1>: 1 points");
        assert_eq!(sent[0].1[1].description, "1. <@2>: 2 points\n2. <@1>: 1 points");
        assert_eq!(sent[1].0, ChannelId::new(11));

        let reopened = LedgerStore::new(dir.path()).load().await.unwrap();
        assert!(reopened.weekly.is_empty());
        assert_eq!(reopened.weekly.rank("2"), Rank::NotRanked);
        assert_eq!(reopened.all_time.get("2"), Some(2));
        assert_eq!(reopened.all_time.get("1"), Some(1));
    }

    #[tokio::test]
    async fn close_week_without_channels_still_resets() {
        let dir = tempfile::tempdir().unwrap();
        let keeper = Bookkeeper::open(LedgerStore::new(dir.path()), BackupDispatcher::disabled())
            .await
            .unwrap();
        keeper.record_partner("1").await;
        let outbox = RecordingOutbox::default();

        close_week(&keeper, &outbox, None, false).await;

        assert!(outbox.sent.lock().unwrap().is_empty());
        assert!(keeper.ledger().read().await.weekly.is_empty());
    }

    #[tokio::test]
    async fn fallback_channels_receive_summary_once() {
        let dir = tempfile::tempdir().unwrap();
        let keeper = Bookkeeper::open(LedgerStore::new(dir.path()), BackupDispatcher::disabled())
            .await
            .unwrap();
        let fallback = GuildChannels {
            log_channel_id: ChannelId::new(20),
            target_channel_id: ChannelId::new(21),
        };
        keeper
            .ledger()
            .write()
            .await
            .set_guild_channels(GuildId::new(1), fallback);
        let outbox = RecordingOutbox::default();

        close_week(&keeper, &outbox, Some(fallback), false).await;

        let sent = outbox.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1[0].description, "No partners this week.");
    }
}
