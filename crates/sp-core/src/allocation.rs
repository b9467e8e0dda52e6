//! Study time allocation.
//!
//! Spreads a fixed daily budget of study hours across subjects, one calendar
//! day at a time, from today until the last relevant deadline.
//!
//! # Algorithm Summary
//!
//! 1. Normalize subjects into [`StudyUnit`]s tracking remaining work
//! 2. Compute the horizon and the set of days off
//! 3. For each day, estimate hours-per-unit for every active subject, then
//!    hand out hours according to the [`ScheduleMode`]
//! 4. Merge the day's assignments by subject and round to 2 decimals
//!
//! A run is deterministic for a given variant: the variant seeds the single
//! random stream used by the estimator and the allocator.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::dates::{parse_date, round_hours};
use crate::estimate::{HoursPredictor, NO_DEADLINE_DAYS, estimate_unit_hours};
use crate::subject::{StudyUnit, SubjectInput, normalize_subjects};

/// Units of work at or below this are considered finished.
const EPS: f64 = 1e-6;

/// Smallest block of hours worth scheduling.
const MIN_ASSIGNMENT_HOURS: f64 = 0.25;

/// Minimum horizon past today when any subject has a deadline.
const MIN_HORIZON_DAYS: i64 = 7;

/// Horizon past today when no subject has a deadline.
const DEFAULT_HORIZON_DAYS: i64 = 30;

/// Alternate mode draws its picks from this many top-estimate subjects.
const ALTERNATE_POOL_SIZE: usize = 4;

/// Alternate mode schedules at most this many subjects per day.
const ALTERNATE_MAX_PICKS: usize = 2;

/// How a day's hours are handed out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleMode {
    /// Walk subjects by deadline-weighted priority until the day is full.
    #[default]
    Daily,
    /// Split the day between at most two subjects, rotating away from the last one.
    Alternate,
}

impl ScheduleMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Alternate => "alternate",
        }
    }
}

impl fmt::Display for ScheduleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScheduleMode {
    type Err = UnknownScheduleMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "alternate" => Ok(Self::Alternate),
            _ => Err(UnknownScheduleMode(s.to_string())),
        }
    }
}

/// Error type for unknown schedule mode strings.
#[derive(Debug, Clone)]
pub struct UnknownScheduleMode(String);

impl fmt::Display for UnknownScheduleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown schedule mode: {} (expected daily or alternate)", self.0)
    }
}

impl std::error::Error for UnknownScheduleMode {}

/// Knobs for a single planning run.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanConfig {
    /// Study hours available on each working day.
    pub daily_hours: f64,

    pub mode: ScheduleMode,

    /// Days off, as ISO or `YYYY-MM-DD` strings. Unparseable entries are ignored.
    pub unavailable_dates: Vec<String>,

    /// Random seed. `None` derives one from the current time.
    pub variant: Option<i64>,

    /// Leave Saturdays and Sundays empty.
    pub limit_weekends: bool,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            daily_hours: 5.0,
            mode: ScheduleMode::Daily,
            unavailable_dates: Vec::new(),
            variant: None,
            limit_weekends: false,
        }
    }
}

/// Hours given to one subject on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAssignment {
    pub subject: String,
    pub hours: f64,
}

/// ISO date → that day's assignments. Every day in the horizon is present.
pub type Timetable = BTreeMap<String, Vec<DailyAssignment>>;

/// A generated timetable and the variant that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutcome {
    pub timetable: Timetable,
    pub variant: i64,
}

/// Build a day-by-day study plan starting at `today`.
///
/// Never fails: blank subjects, bad dates, and predictor failures all degrade
/// gracefully. Returns an empty timetable when no subject survives normalization.
pub fn create_timetable(
    subjects: &[SubjectInput],
    config: &PlanConfig,
    predictor: Option<&dyn HoursPredictor>,
    today: NaiveDate,
) -> PlanOutcome {
    let variant = config
        .variant
        .unwrap_or_else(|| Utc::now().timestamp_millis());
    let units = normalize_subjects(subjects);
    let (timetable, _) = run_plan(units, config, predictor, today, variant);
    PlanOutcome { timetable, variant }
}

/// Last day of the planning horizon, inclusive.
pub fn horizon_end(units: &[StudyUnit], today: NaiveDate) -> NaiveDate {
    units
        .iter()
        .filter_map(|unit| unit.deadline)
        .max()
        .map_or(today + Duration::days(DEFAULT_HORIZON_DAYS), |latest| {
            latest.max(today + Duration::days(MIN_HORIZON_DAYS))
        })
}

#[allow(clippy::cast_sign_loss)]
const fn seed_for(variant: i64) -> u64 {
    variant as u64
}

fn run_plan(
    units: Vec<StudyUnit>,
    config: &PlanConfig,
    predictor: Option<&dyn HoursPredictor>,
    today: NaiveDate,
    variant: i64,
) -> (Timetable, Vec<StudyUnit>) {
    let mut timetable = Timetable::new();
    if units.is_empty() {
        tracing::debug!(variant, "no schedulable subjects");
        return (timetable, units);
    }

    let days_off: HashSet<NaiveDate> = config
        .unavailable_dates
        .iter()
        .filter_map(|s| parse_date(s))
        .collect();
    let last_day = horizon_end(&units, today);
    tracing::debug!(
        variant,
        subjects = units.len(),
        %today,
        %last_day,
        mode = %config.mode,
        "planning study timetable"
    );

    let mut allocator = DayAllocator::new(units, predictor, seed_for(variant), config);

    for day in today.iter_days().take_while(|day| *day <= last_day) {
        let day_off = days_off.contains(&day) || (config.limit_weekends && is_weekend(day));
        let slots = if day_off {
            Vec::new()
        } else {
            allocator.plan_day(day)
        };
        timetable.insert(day.format("%Y-%m-%d").to_string(), slots);
    }

    (timetable, allocator.units)
}

fn is_weekend(day: NaiveDate) -> bool {
    matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Per-run allocation state: the unit arena, the random stream, and the
/// subject that received the most recent assignment.
struct DayAllocator<'a, R> {
    units: Vec<StudyUnit>,
    predictor: Option<&'a dyn HoursPredictor>,
    rng: R,
    daily_hours: f64,
    mode: ScheduleMode,
    /// Carried across days, so a new day's first pick can be penalized for
    /// repeating yesterday's last subject.
    last_assigned: Option<usize>,
}

impl<'a> DayAllocator<'a, StdRng> {
    fn new(
        units: Vec<StudyUnit>,
        predictor: Option<&'a dyn HoursPredictor>,
        seed: u64,
        config: &PlanConfig,
    ) -> Self {
        let daily_hours = if config.daily_hours.is_finite() {
            config.daily_hours.max(0.0)
        } else {
            0.0
        };
        Self {
            units,
            predictor,
            rng: StdRng::seed_from_u64(seed),
            daily_hours,
            mode: config.mode,
            last_assigned: None,
        }
    }
}

impl<R: Rng> DayAllocator<'_, R> {
    fn is_last_assigned(&self, idx: usize) -> bool {
        self.last_assigned
            .is_some_and(|last| self.units[last].name == self.units[idx].name)
    }

    /// Plan one working day and return its merged assignments.
    fn plan_day(&mut self, day: NaiveDate) -> Vec<DailyAssignment> {
        let active: Vec<usize> = (0..self.units.len())
            .filter(|&idx| self.units[idx].units_left > EPS)
            .collect();
        if active.is_empty() {
            return Vec::new();
        }

        let mut scored = Vec::with_capacity(active.len());
        for idx in active {
            let unit_hours =
                estimate_unit_hours(&self.units[idx], day, self.predictor, &mut self.rng);
            scored.push((idx, unit_hours));
        }

        let mut slots = Vec::new();
        match self.mode {
            ScheduleMode::Daily => self.allocate_by_priority(day, &scored, &mut slots),
            ScheduleMode::Alternate => self.allocate_alternating(&scored, &mut slots),
        }
        merge_slots(slots)
    }

    /// Hand out the day's hours in descending priority order.
    #[allow(clippy::cast_precision_loss)]
    fn allocate_by_priority(
        &mut self,
        day: NaiveDate,
        scored: &[(usize, f64)],
        slots: &mut Vec<DailyAssignment>,
    ) {
        let mut ranked = Vec::with_capacity(scored.len());
        for &(idx, unit_hours) in scored {
            let unit = &self.units[idx];
            let days_left = unit.days_until_deadline(day).unwrap_or(NO_DEADLINE_DAYS);
            let urgency = 1.0 + (30 - days_left.min(30)).max(0) as f64 / 30.0;
            let priority = unit.weight * urgency * self.rng.random_range(0.9..1.1);
            ranked.push((idx, unit_hours, priority));
        }
        ranked.sort_by(|a, b| b.2.total_cmp(&a.2));

        let mut remaining = self.daily_hours;
        for (idx, unit_hours, _) in ranked {
            if remaining <= 0.0 {
                break;
            }
            if self.units[idx].units_left <= EPS {
                continue;
            }

            let penalty = if self.is_last_assigned(idx) {
                self.rng.random_range(0.4..0.8)
            } else {
                1.0
            };
            let assign = (unit_hours * penalty).min(remaining);
            if assign < MIN_ASSIGNMENT_HOURS {
                continue;
            }

            slots.push(DailyAssignment {
                subject: self.units[idx].name.clone(),
                hours: round_hours(assign),
            });
            remaining -= assign;
            // Consumption is measured against the unpenalized estimate.
            self.units[idx].consume(consumed_units(assign, unit_hours));
            self.last_assigned = Some(idx);
        }
    }

    /// Split the day between up to two high-estimate subjects, avoiding the
    /// last one scheduled when possible.
    #[allow(clippy::cast_precision_loss)]
    fn allocate_alternating(&mut self, scored: &[(usize, f64)], slots: &mut Vec<DailyAssignment>) {
        let mut by_estimate = scored.to_vec();
        by_estimate.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut pool: Vec<(usize, f64)> = by_estimate
            .iter()
            .take(ALTERNATE_POOL_SIZE)
            .copied()
            .collect();
        pool.shuffle(&mut self.rng);

        let mut picks: Vec<(usize, f64)> = pool
            .into_iter()
            .filter(|&(idx, _)| self.units[idx].units_left > EPS && !self.is_last_assigned(idx))
            .take(ALTERNATE_MAX_PICKS)
            .collect();
        if picks.is_empty() {
            picks.extend(by_estimate.first().copied());
        }

        let Some(&(final_pick, _)) = picks.last() else {
            return;
        };

        let share = self.daily_hours / picks.len() as f64;
        for &(idx, unit_hours) in &picks {
            let assign = share.min(unit_hours);
            if assign < MIN_ASSIGNMENT_HOURS {
                continue;
            }
            slots.push(DailyAssignment {
                subject: self.units[idx].name.clone(),
                hours: round_hours(assign),
            });
            self.units[idx].consume(consumed_units(assign, unit_hours));
        }
        self.last_assigned = Some(final_pick);
    }
}

fn consumed_units(hours: f64, unit_hours: f64) -> f64 {
    if unit_hours > EPS {
        hours / unit_hours
    } else {
        1.0
    }
}

/// Sum a day's assignments per subject, round, and drop empty entries.
/// Subjects keep the order of their first assignment.
fn merge_slots(slots: Vec<DailyAssignment>) -> Vec<DailyAssignment> {
    let mut merged: Vec<DailyAssignment> = Vec::with_capacity(slots.len());
    for slot in slots {
        match merged.iter_mut().find(|m| m.subject == slot.subject) {
            Some(existing) => existing.hours += slot.hours,
            None => merged.push(slot),
        }
    }

    merged
        .into_iter()
        .filter_map(|mut slot| {
            slot.hours = round_hours(slot.hours);
            (slot.hours > 0.0).then_some(slot)
        })
        .collect()
}
