//! Cron-driven report runs.
//!
//! [`CronSchedule`] understands the classic five-field syntax evaluated in UTC. [`Scheduler`]
//! sleeps until each fire time and runs the job on a worker thread; a fire time that arrives
//! while the previous run is still busy is skipped.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Duration, DurationRound, Timelike, Utc};
use log::{debug, error, info, warn};

use crate::error::{ReportError, Result};

/// Longest single sleep; the loop re-reads the clock after each one.
const MAX_SLEEP: StdDuration = StdDuration::from_secs(60);

/// Fire times further out than this are treated as "never".
const SEARCH_LIMIT_DAYS: i64 = 366 * 5;

/// Allowed values of one cron field, as a bit set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Field {
    bits: u64,
}

impl Field {
    fn parse(text: &str, name: &str, min: u32, max: u32) -> Result<Self> {
        let invalid = |detail: &str| {
            ReportError::Configuration(format!(
                "invalid cron {} field '{}': {}",
                name, text, detail
            ))
        };

        let mut bits = 0u64;
        for part in text.split(',') {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => {
                    let step: u32 = step.parse().map_err(|_| invalid("step is not a number"))?;
                    if step == 0 {
                        return Err(invalid("step must be positive"));
                    }
                    (range, step)
                }
                None => (part, 1),
            };

            let (start, end) = if range == "*" {
                (min, max)
            } else if let Some((start, end)) = range.split_once('-') {
                (
                    parse_value(start).ok_or_else(|| invalid("range start is not a number"))?,
                    parse_value(end).ok_or_else(|| invalid("range end is not a number"))?,
                )
            } else {
                let value = parse_value(range).ok_or_else(|| invalid("expected a number"))?;
                // `5/15` means "from 5 to the end in steps of 15".
                (value, if step > 1 { max } else { value })
            };

            if start < min || end > max || start > end {
                return Err(invalid(&format!("values must be within {}-{}", min, max)));
            }
            for value in (start..=end).step_by(step as usize) {
                bits |= 1 << value;
            }
        }

        Ok(Self { bits })
    }

    fn contains(self, value: u32) -> bool {
        self.bits & (1 << value) != 0
    }
}

fn parse_value(text: &str) -> Option<u32> {
    if text.is_empty() {
        return None;
    }
    text.parse().ok()
}

/// A five-field cron expression: minute, hour, day of month, month, day of week.
///
/// All fields must match for a minute to fire. Day of week accepts 0-7 where both 0 and 7 are
/// Sunday.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        let [minute, hour, day_of_month, month, day_of_week] = fields.as_slice() else {
            return Err(ReportError::Configuration(format!(
                "cron expression '{}' must have 5 fields, found {}",
                expression,
                fields.len()
            )));
        };

        let mut day_of_week = Field::parse(day_of_week, "day-of-week", 0, 7)?;
        if day_of_week.contains(7) {
            day_of_week.bits = (day_of_week.bits | 1) & !(1 << 7);
        }

        Ok(Self {
            expression: fields.join(" "),
            minute: Field::parse(minute, "minute", 0, 59)?,
            hour: Field::parse(hour, "hour", 0, 23)?,
            day_of_month: Field::parse(day_of_month, "day-of-month", 1, 31)?,
            month: Field::parse(month, "month", 1, 12)?,
            day_of_week,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    fn matches_day(&self, at: DateTime<Utc>) -> bool {
        self.month.contains(at.month())
            && self.day_of_month.contains(at.day())
            && self.day_of_week.contains(at.weekday().num_days_from_sunday())
    }

    /// Whether the minute containing `at` is a fire time.
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        self.matches_day(at) && self.hour.contains(at.hour()) && self.minute.contains(at.minute())
    }

    /// First fire time strictly after `after`, or `None` if there is none within five years.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut candidate = after.duration_trunc(Duration::minutes(1)).ok()? + Duration::minutes(1);
        let limit = after + Duration::days(SEARCH_LIMIT_DAYS);

        while candidate <= limit {
            if !self.matches_day(candidate) {
                candidate = candidate.duration_trunc(Duration::days(1)).ok()? + Duration::days(1);
            } else if !self.hour.contains(candidate.hour()) {
                candidate = candidate.duration_trunc(Duration::hours(1)).ok()? + Duration::hours(1);
            } else if !self.minute.contains(candidate.minute()) {
                candidate += Duration::minutes(1);
            } else {
                return Some(candidate);
            }
        }
        None
    }
}

impl FromStr for CronSchedule {
    type Err = ReportError;

    fn from_str(expression: &str) -> Result<Self> {
        Self::parse(expression)
    }
}

/// Clears the running flag when a run ends, even if the job panics.
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

type Job = dyn Fn(DateTime<Utc>) -> Result<()> + Send + Sync;

/// Runs a job at every fire time of a [`CronSchedule`], never more than one at a time.
pub struct Scheduler {
    schedule: CronSchedule,
    job: Arc<Job>,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new<F>(schedule: CronSchedule, job: F) -> Self
    where
        F: Fn(DateTime<Utc>) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            schedule,
            job: Arc::new(job),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn schedule(&self) -> &CronSchedule {
        &self.schedule
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs the job once on the calling thread.
    pub fn run_once(&self) -> Result<()> {
        let now = Utc::now();
        info!("Running report once at {}", now.format("%Y-%m-%d %H:%M UTC"));
        (self.job)(now)
    }

    /// Starts a run on a worker thread, or returns `None` if one is already active.
    pub fn trigger(&self, at: DateTime<Utc>) -> Option<JoinHandle<()>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(
                "Skipping run scheduled for {}: previous run still in progress",
                at.format("%Y-%m-%d %H:%M UTC")
            );
            return None;
        }

        let guard = RunGuard(Arc::clone(&self.running));
        let job = Arc::clone(&self.job);
        Some(thread::spawn(move || {
            let _guard = guard;
            info!("Scheduled run started for {}", at.format("%Y-%m-%d %H:%M UTC"));
            match job(at) {
                Ok(()) => info!("Scheduled run finished"),
                Err(err) => error!("Scheduled run failed: {}", err),
            }
        }))
    }

    /// Sleeps until each fire time and triggers the job. Returns only if no fire time remains.
    pub fn run_forever(&self) -> Result<()> {
        info!("Scheduler started with cron '{}' (UTC)", self.schedule.expression());
        loop {
            let now = Utc::now();
            let Some(next) = self.schedule.next_after(now) else {
                return Err(ReportError::Configuration(format!(
                    "cron expression '{}' never fires",
                    self.schedule.expression()
                )));
            };
            info!("Next run at {}", next.format("%Y-%m-%d %H:%M UTC"));
            sleep_until(next);
            // Worker threads are detached; the running flag tracks them.
            let _ = self.trigger(next);
        }
    }
}

fn sleep_until(target: DateTime<Utc>) {
    loop {
        let remaining = target - Utc::now();
        let Ok(remaining) = remaining.to_std() else {
            return;
        };
        if remaining.is_zero() {
            return;
        }
        debug!("Sleeping {}s until next run", remaining.as_secs());
        thread::sleep(remaining.min(MAX_SLEEP));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn default_fires_monday_nine() {
        let cron = CronSchedule::parse("0 9 * * 1").unwrap();
        // 2024-06-17 is a Monday.
        assert!(cron.matches(at(2024, 6, 17, 9, 0)));
        assert!(!cron.matches(at(2024, 6, 18, 9, 0)));
        assert!(!cron.matches(at(2024, 6, 17, 9, 1)));

        assert_eq!(cron.next_after(at(2024, 6, 14, 12, 0)), Some(at(2024, 6, 17, 9, 0)));
        assert_eq!(cron.next_after(at(2024, 6, 17, 9, 0)), Some(at(2024, 6, 24, 9, 0)));
    }

    #[test]
    fn steps_ranges_and_lists() {
        let cron = CronSchedule::parse("*/15 8-10 1,15 * *").unwrap();
        assert!(cron.matches(at(2024, 6, 15, 10, 45)));
        assert!(!cron.matches(at(2024, 6, 15, 11, 0)));
        assert!(!cron.matches(at(2024, 6, 14, 9, 0)));
        assert_eq!(cron.next_after(at(2024, 6, 1, 10, 50)), Some(at(2024, 6, 15, 8, 0)));
    }

    #[test]
    fn day_of_month_and_week_both_apply() {
        // 13th that is also a Friday.
        let cron = CronSchedule::parse("0 0 13 * 5").unwrap();
        assert_eq!(cron.next_after(at(2024, 1, 1, 0, 0)), Some(at(2024, 9, 13, 0, 0)));
    }

    #[test]
    fn sunday_is_zero_or_seven() {
        let sunday = at(2024, 6, 16, 6, 30);
        assert!(CronSchedule::parse("30 6 * * 0").unwrap().matches(sunday));
        assert!(CronSchedule::parse("30 6 * * 7").unwrap().matches(sunday));
        assert!(CronSchedule::parse("30 6 * * 5-7").unwrap().matches(sunday));
    }

    #[test]
    fn invalid_expressions_are_configuration_errors() {
        for expression in ["", "0 9 * *", "60 9 * * 1", "0 9 * * 8", "*/0 * * * *", "a b c d e", "5-1 * * * *"] {
            let err = CronSchedule::parse(expression).unwrap_err();
            assert!(matches!(err, ReportError::Configuration(_)), "{}", expression);
        }
        let every_minute: CronSchedule = "* * * * *".parse().unwrap();
        assert!(every_minute.matches(at(2024, 2, 29, 23, 59)));
    }

    #[test]
    fn impossible_dates_never_fire() {
        let cron = CronSchedule::parse("0 0 31 2 *").unwrap();
        assert_eq!(cron.next_after(at(2024, 1, 1, 0, 0)), None);
    }

    #[test]
    fn overlapping_trigger_is_skipped() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = std::sync::Mutex::new(release_rx);
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let scheduler = Scheduler::new(CronSchedule::parse("* * * * *").unwrap(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = release_rx.lock().unwrap().recv();
            Ok(())
        });

        let first = scheduler.trigger(at(2024, 6, 17, 9, 0)).expect("first run starts");
        assert!(scheduler.is_running());
        assert!(scheduler.trigger(at(2024, 6, 17, 9, 1)).is_none());

        release_tx.send(()).unwrap();
        first.join().unwrap();
        assert!(!scheduler.is_running());
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let second = scheduler.trigger(at(2024, 6, 17, 9, 2)).expect("idle again");
        release_tx.send(()).unwrap();
        second.join().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_job_releases_the_guard() {
        let scheduler = Scheduler::new(CronSchedule::parse("0 9 * * 1").unwrap(), |_| {
            Err(ReportError::Configuration("boom".to_string()))
        });
        scheduler.trigger(at(2024, 6, 17, 9, 0)).unwrap().join().unwrap();
        assert!(!scheduler.is_running());
        assert!(scheduler.run_once().is_err());
    }
}
