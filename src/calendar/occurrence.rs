//! Occurrence arithmetic for recurring events.
//!
//! Every occurrence of an event shares its time-of-day, so all comparisons
//! here are on the date component only. Series have no end date.

use chrono::{Datelike, Days, NaiveDate};

use crate::model::event::{Event, Frequency, Recurrence};

/// Whether `candidate` is an occurrence of a recurring event.
///
/// Non-recurring events never match here; use [`occurs_on`] for those.
pub fn is_occurrence(event: &Event, candidate: NaiveDate) -> bool {
    match &event.recurrence {
        Some(recurrence) => recurrence_matches(recurrence, candidate),
        None => false,
    }
}

pub fn recurrence_matches(recurrence: &Recurrence, candidate: NaiveDate) -> bool {
    let original = recurrence.original_date;
    if candidate < original {
        return false;
    }

    match recurrence.frequency {
        Frequency::Weekly => (candidate - original).num_days() % 7 == 0,
        // A month without the anchor's day simply has no occurrence.
        Frequency::Monthly => candidate.day() == original.day(),
        Frequency::Yearly => candidate.month() == original.month() && candidate.day() == original.day(),
    }
}

/// Whether the event takes place on `date`, recurring or not.
pub fn occurs_on(event: &Event, date: NaiveDate) -> bool {
    if event.is_recurring() {
        is_occurrence(event, date)
    } else {
        event.date == date
    }
}

/// Ascending occurrence dates of `event` within `[range_start, range_end]`.
///
/// The returned iterator holds no cached state beyond its position; cloning
/// it or calling this again recomputes from the anchor.
pub fn occurrences_in_range(event: &Event, range_start: NaiveDate, range_end: NaiveDate) -> Occurrences {
    match &event.recurrence {
        Some(recurrence) => Occurrences::series(*recurrence, range_start, range_end),
        None => Occurrences::single(event.date, range_start, range_end),
    }
}

#[derive(Debug, Clone, Copy)]
enum Pattern {
    Once(NaiveDate),
    Series(Recurrence),
}

#[derive(Debug, Clone)]
pub struct Occurrences {
    pattern: Pattern,
    range_start: NaiveDate,
    range_end: NaiveDate,
    next_step: u32,
    done: bool,
}

impl Occurrences {
    fn single(date: NaiveDate, range_start: NaiveDate, range_end: NaiveDate) -> Self {
        Self {
            pattern: Pattern::Once(date),
            range_start,
            range_end,
            next_step: 0,
            done: range_start > range_end,
        }
    }

    fn series(recurrence: Recurrence, range_start: NaiveDate, range_end: NaiveDate) -> Self {
        Self {
            pattern: Pattern::Series(recurrence),
            range_start,
            range_end,
            next_step: first_step(&recurrence, range_start),
            done: range_start > range_end,
        }
    }
}

/// Number of whole steps from the anchor that can be skipped without
/// missing an occurrence on or after `range_start`.
fn first_step(recurrence: &Recurrence, range_start: NaiveDate) -> u32 {
    let original = recurrence.original_date;
    if range_start <= original {
        return 0;
    }

    let steps = match recurrence.frequency {
        Frequency::Weekly => ((range_start - original).num_days() + 6) / 7,
        Frequency::Monthly => month_index(range_start) - month_index(original),
        Frequency::Yearly => i64::from(range_start.year() - original.year()),
    };
    u32::try_from(steps.max(0)).unwrap_or(u32::MAX)
}

fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

/// Step `n` of a series: the earliest date the step's period can cover, and
/// the occurrence itself when the period contains the anchor's day.
fn step_dates(recurrence: &Recurrence, n: u32) -> Option<(NaiveDate, Option<NaiveDate>)> {
    let original = recurrence.original_date;
    match recurrence.frequency {
        Frequency::Weekly => {
            let date = original.checked_add_days(Days::new(u64::from(n) * 7))?;
            Some((date, Some(date)))
        }
        Frequency::Monthly => {
            let index = month_index(original) + i64::from(n);
            let year = i32::try_from(index.div_euclid(12)).ok()?;
            let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;
            let floor = NaiveDate::from_ymd_opt(year, month, 1)?;
            Some((floor, NaiveDate::from_ymd_opt(year, month, original.day())))
        }
        Frequency::Yearly => {
            let year = original.year().checked_add(i32::try_from(n).ok()?)?;
            let floor = NaiveDate::from_ymd_opt(year, original.month(), 1)?;
            Some((floor, NaiveDate::from_ymd_opt(year, original.month(), original.day())))
        }
    }
}

impl Iterator for Occurrences {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        if self.done {
            return None;
        }

        let recurrence = match self.pattern {
            Pattern::Once(date) => {
                self.done = true;
                return (self.range_start..=self.range_end)
                    .contains(&date)
                    .then_some(date);
            }
            Pattern::Series(recurrence) => recurrence,
        };

        loop {
            let Some((floor, date)) = step_dates(&recurrence, self.next_step) else {
                self.done = true;
                return None;
            };
            if floor > self.range_end {
                self.done = true;
                return None;
            }
            self.next_step = self.next_step.saturating_add(1);

            match date {
                Some(date) if date > self.range_end => {
                    self.done = true;
                    return None;
                }
                Some(date) if date >= self.range_start => return Some(date),
                _ => continue,
            }
        }
    }
}
