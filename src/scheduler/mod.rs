
use std::{str::FromStr, sync::Arc, time::Duration};

use chrono::{DateTime, FixedOffset, NaiveTime, TimeDelta, Timelike, Utc};
use thiserror::Error;
use tokio::time::MissedTickBehavior;

use crate::publisher::DealPublisher;

/// Why a schedule string was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// The entry has no `=`.
    #[error("Schedule entry '{0}' must look like HH:MM=N")]
    InvalidEntry(String),
    /// The time is not `HH:MM`.
    #[error("Invalid time of day '{0}'")]
    InvalidTime(String),
    /// The count is not a positive integer.
    #[error("Invalid offer count '{0}'")]
    InvalidCount(String),
    /// No entries at all.
    #[error("Schedule has no entries")]
    Empty,
}

/// A daily posting slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// Time of day in the scheduler's UTC offset.
    pub at: NaiveTime,
    /// Maximum number of offers posted in this slot.
    pub max_offers: usize,
    /// Message posted before the offers.
    pub preamble: Option<String>,
}

impl ScheduleEntry {
    /// Creates an entry with the greeting matching its time of day.
    pub fn new(at: NaiveTime, max_offers: usize) -> Self {
        Self { at, max_offers, preamble: Some(preamble_for(at).to_string()) }
    }
}

impl FromStr for ScheduleEntry {
    type Err = ScheduleError;

    /// Parses `HH:MM=N`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (time, count) =
            s.trim().split_once('=').ok_or_else(|| ScheduleError::InvalidEntry(s.to_string()))?;

        let at = NaiveTime::parse_from_str(time.trim(), "%H:%M")
            .map_err(|_| ScheduleError::InvalidTime(time.trim().to_string()))?;
        let max_offers = count
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ScheduleError::InvalidCount(count.trim().to_string()))?;

        Ok(Self::new(at, max_offers))
    }
}

fn preamble_for(at: NaiveTime) -> &'static str {
    match at.hour() {
        5..=11 => "☀️ <b>Bom dia!</b> Confira as ofertas de hoje:",
        12..=17 => "🎮 <b>Ofertas da tarde</b> fresquinhas para você:",
        _ => "🌙 <b>Ofertas da noite!</b> Aproveite antes que acabem:",
    }
}

/// Parses a comma separated list of `HH:MM=N` entries.
pub fn parse_schedule(s: &str) -> Result<Vec<ScheduleEntry>, ScheduleError> {
    let entries = s
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(ScheduleEntry::from_str)
        .collect::<Result<Vec<_>, _>>()?;

    if entries.is_empty() {
        return Err(ScheduleError::Empty);
    }
    Ok(entries)
}

/// First occurrence of `at` strictly after `after`, in the offset of
/// `after`.
pub fn next_occurrence(at: NaiveTime, after: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let offset = *after.offset();
    let local = after.date_naive().and_time(at);
    let utc = local - TimeDelta::seconds(offset.local_minus_utc().into());
    let candidate = DateTime::<FixedOffset>::from_naive_utc_and_offset(utc, offset);

    if candidate > after { candidate } else { candidate + TimeDelta::days(1) }
}

/// What the scheduler should do with an entry on this tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    /// Run the entry now.
    Fire(ScheduleEntry),
    /// The slot passed beyond the grace window (e.g. the process was
    /// suspended). It is not replayed.
    Missed {
        /// The skipped entry.
        entry: ScheduleEntry,
        /// When it should have fired.
        scheduled: DateTime<FixedOffset>,
    },
}

/// The next fire time of every entry.
#[derive(Debug, Clone)]
pub struct ScheduleState {
    slots: Vec<(DateTime<FixedOffset>, ScheduleEntry)>,
    grace: TimeDelta,
}

impl ScheduleState {
    /// Schedules every entry at its first occurrence after `now`.
    pub fn new(entries: Vec<ScheduleEntry>, now: DateTime<FixedOffset>, grace: TimeDelta) -> Self {
        let slots = entries.into_iter().map(|e| (next_occurrence(e.at, now), e)).collect();
        Self { slots, grace }
    }

    /// Upcoming fire times, in entry order.
    pub fn next_fires(&self) -> impl Iterator<Item = DateTime<FixedOffset>> + '_ {
        self.slots.iter().map(|(at, _)| *at)
    }

    /// Returns the entries that came due at `now` and moves each of them to
    /// its next occurrence after `now`.
    pub fn poll(&mut self, now: DateTime<FixedOffset>) -> Vec<Tick> {
        let mut ticks = Vec::new();

        for (next_fire, entry) in self.slots.iter_mut() {
            if *next_fire > now {
                continue;
            }

            if now - *next_fire > self.grace {
                ticks.push(Tick::Missed { entry: entry.clone(), scheduled: *next_fire });
            } else {
                ticks.push(Tick::Fire(entry.clone()));
            }
            *next_fire = next_occurrence(entry.at, now);
        }

        ticks
    }
}

/// Timing of the scheduler loop.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    /// Offset the schedule times are read in.
    pub utc_offset: FixedOffset,
    /// How often the schedule is checked.
    pub tick_interval: Duration,
    /// How late a slot may still fire. Should be at least one tick.
    pub grace: TimeDelta,
}

/// Posts offers at fixed times of day.
pub struct DealScheduler {
    publisher: Arc<DealPublisher>,
    entries: Vec<ScheduleEntry>,
    settings: SchedulerSettings,
}

impl DealScheduler {
    /// Creates a scheduler running `entries` through `publisher`.
    pub fn new(
        publisher: Arc<DealPublisher>,
        entries: Vec<ScheduleEntry>,
        settings: SchedulerSettings,
    ) -> Self {
        Self { publisher, entries, settings }
    }

    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.settings.utc_offset)
    }

    /// Runs the scheduler loop forever.
    pub async fn run(&self) {
        let mut state = ScheduleState::new(self.entries.clone(), self.now(), self.settings.grace);
        for (fire_at, entry) in state.next_fires().zip(&self.entries) {
            tracing::info!("Scheduled {} offers at {fire_at}", entry.max_offers);
        }

        let mut interval = tokio::time::interval(self.settings.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            for tick in state.poll(self.now()) {
                match tick {
                    Tick::Fire(entry) => self.fire(&entry).await,
                    Tick::Missed { entry, scheduled } => tracing::warn!(
                        "Missed scheduled run of {scheduled} ({} offers); skipping it",
                        entry.max_offers
                    ),
                }
            }
        }
    }

    async fn fire(&self, entry: &ScheduleEntry) {
        tracing::info!("Running scheduled send for {}", entry.at.format("%H:%M"));

        match self.publisher.publish_scheduled(entry.preamble.as_deref(), entry.max_offers).await {
            Ok(report) => tracing::info!(
                "Scheduled send finished: {} sent, {} failed, {} discovered",
                report.sent,
                report.failed,
                report.discovered
            ),
            Err(e) => tracing::error!("Scheduled send failed: {e}"),
        }
    }
}
