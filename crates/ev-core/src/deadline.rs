//! Deadline computation for expectation windows.
//!
//! A [`DeadlinePolicy`] turns a pattern and a point in time into the end of
//! the window that point falls in. Policies never read the wall clock; the
//! caller passes `now`, usually taken from a [`Clock`].

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::pattern::Pattern;
use crate::types::{Frequency, SourceType};

/// Computes the end of the expectation window containing `now`.
///
/// Implementations must be deterministic for a fixed `now`.
pub trait DeadlinePolicy: Send + Sync {
    fn deadline(&self, frequency: Frequency, pattern: &Pattern, now: DateTime<Utc>)
    -> DateTime<Utc>;
}

impl<F> DeadlinePolicy for F
where
    F: Fn(Frequency, &Pattern, DateTime<Utc>) -> DateTime<Utc> + Send + Sync,
{
    fn deadline(
        &self,
        frequency: Frequency,
        pattern: &Pattern,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        self(frequency, pattern, now)
    }
}

/// Calendar windows in a fixed time zone.
///
/// - Daily: 23:59:59 local time on the day containing `now`.
/// - Monthly: 23:59:59 local time on the last day of that month.
///
/// The deadline is always strictly after `now`. During the final second of
/// a window the following window is returned instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarPolicy {
    tz: Tz,
}

impl CalendarPolicy {
    pub const fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// End of the window containing the local date `day`.
    fn window_end(&self, frequency: Frequency, day: NaiveDate) -> DateTime<Utc> {
        end_of_local_day(self.tz, last_day_of_window(frequency, day))
    }
}

impl DeadlinePolicy for CalendarPolicy {
    fn deadline(
        &self,
        frequency: Frequency,
        _pattern: &Pattern,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let today = now.with_timezone(&self.tz).date_naive();
        let deadline = self.window_end(frequency, today);
        if deadline > now {
            return deadline;
        }
        // now falls in the final second of the window
        last_day_of_window(frequency, today)
            .succ_opt()
            .map_or(deadline, |next| self.window_end(frequency, next))
    }
}

fn last_day_of_window(frequency: Frequency, day: NaiveDate) -> NaiveDate {
    match frequency {
        Frequency::Daily => day,
        Frequency::Monthly => last_day_of_month(day),
    }
}

fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .unwrap_or(date)
}

/// Converts local 23:59:59 on `date` to UTC.
/// Handles DST ambiguity by picking the earlier time.
fn end_of_local_day(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let end = date
        .and_hms_opt(23, 59, 59)
        .expect("23:59:59 is a valid wall-clock time");
    resolve_local(tz, end).with_timezone(&Utc)
}

fn resolve_local(tz: Tz, local: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
        LocalResult::None => {
            // DST gap: use the offset in effect just before the jump
            let before = local - Duration::hours(1);
            tz.from_local_datetime(&before)
                .earliest()
                .map_or_else(|| tz.from_utc_datetime(&local), |dt| dt + Duration::hours(1))
        }
    }
}

/// Binds each source type to the policy that computes its deadlines.
pub struct SourcePolicies {
    base: Box<dyn DeadlinePolicy>,
    kafka: Box<dyn DeadlinePolicy>,
}

impl SourcePolicies {
    pub fn new(base: Box<dyn DeadlinePolicy>, kafka: Box<dyn DeadlinePolicy>) -> Self {
        Self { base, kafka }
    }

    /// Calendar windows in `tz` for every source type.
    pub fn calendar(tz: Tz) -> Self {
        Self::new(
            Box::new(CalendarPolicy::new(tz)),
            Box::new(CalendarPolicy::new(tz)),
        )
    }

    pub fn get(&self, source: SourceType) -> &dyn DeadlinePolicy {
        match source {
            SourceType::Base => self.base.as_ref(),
            SourceType::Kafka => self.kafka.as_ref(),
        }
    }

    /// Deadline of the window containing `now` for a record of `source`.
    pub fn deadline_for(
        &self,
        source: SourceType,
        frequency: Frequency,
        pattern: &Pattern,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        self.get(source).deadline(frequency, pattern, now)
    }
}

impl Default for SourcePolicies {
    fn default() -> Self {
        Self::calendar(Tz::UTC)
    }
}

/// Source of the current time for hosts.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
