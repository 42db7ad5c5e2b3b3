//! Five-field cron expression parser and next-run solver (§4.9).
//!
//! Fields are `minute hour day-of-month month day-of-week`, evaluated in
//! UTC. Unlike the timezone-aware evaluator this design grows out of,
//! the spec's scheduled jobs carry no timezone field, so everything here
//! is UTC-only and considerably simpler — but it adds support for
//! stepped ranges (`N-M/S`, `*/S`) and standard cron OR-semantics
//! between day-of-month and day-of-week when both are restricted,
//! neither of which the earlier evaluator had.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

use gw_domain::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    minute: Field,
    hour: Field,
    dom: Field,
    month: Field,
    dow: Field,
    dom_restricted: bool,
    dow_restricted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    values: Vec<u32>,
}

impl Field {
    fn matches(&self, value: u32) -> bool {
        self.values.contains(&value)
    }
}

fn parse_field(raw: &str, min: u32, max: u32) -> Result<(Field, bool)> {
    let mut values = Vec::new();
    let mut restricted = false;

    for part in raw.split(',') {
        let (range_part, step) = match part.split_once('/') {
            Some((r, s)) => (
                r,
                s.parse::<u32>()
                    .map_err(|_| Error::InvalidParams(format!("invalid cron step '{s}'")))?,
            ),
            None => (part, 1),
        };

        if step == 0 {
            return Err(Error::InvalidParams("cron step cannot be 0".into()));
        }

        let (lo, hi) = if range_part == "*" {
            (min, max)
        } else {
            restricted = true;
            match range_part.split_once('-') {
                Some((a, b)) => {
                    let a: u32 = a
                        .parse()
                        .map_err(|_| Error::InvalidParams(format!("invalid cron field '{a}'")))?;
                    let b: u32 = b
                        .parse()
                        .map_err(|_| Error::InvalidParams(format!("invalid cron field '{b}'")))?;
                    (a, b)
                }
                None => {
                    let v: u32 = range_part
                        .parse()
                        .map_err(|_| Error::InvalidParams(format!("invalid cron field '{range_part}'")))?;
                    (v, v)
                }
            }
        };

        if lo < min || hi > max || lo > hi {
            return Err(Error::InvalidParams(format!(
                "cron field '{part}' out of range {min}-{max}"
            )));
        }

        let mut v = lo;
        while v <= hi {
            values.push(v);
            v += step;
        }
    }

    values.sort_unstable();
    values.dedup();
    Ok((Field { values }, restricted))
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(Error::InvalidParams(format!(
                "cron expression must have 5 fields, got {}",
                fields.len()
            )));
        }

        let (minute, _) = parse_field(fields[0], 0, 59)?;
        let (hour, _) = parse_field(fields[1], 0, 23)?;
        let (dom, dom_restricted) = parse_field(fields[2], 1, 31)?;
        let (month, _) = parse_field(fields[3], 1, 12)?;
        let (dow, dow_restricted) = parse_field(fields[4], 0, 7)?;

        Ok(Self {
            minute,
            hour,
            dom,
            month,
            dow,
            dom_restricted,
            dow_restricted,
        })
    }

    fn day_matches(&self, date: &DateTime<Utc>) -> bool {
        let dom_ok = self.dom.matches(date.day());
        // Sunday is both 0 and 7 in standard cron.
        let weekday = date.weekday().num_days_from_sunday();
        let dow_ok = self.dow.matches(weekday) || (weekday == 0 && self.dow.matches(7));

        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom_ok || dow_ok,
            _ => dom_ok && dow_ok,
        }
    }

    fn matches(&self, date: &DateTime<Utc>) -> bool {
        self.minute.matches(date.minute())
            && self.hour.matches(date.hour())
            && self.month.matches(date.month())
            && self.day_matches(date)
    }

    /// The next instant strictly after `after` at which this schedule
    /// fires, truncated to the minute (cron has no sub-minute
    /// resolution). Searches up to four years out before giving up —
    /// a schedule that never matches (e.g. Feb 30) would otherwise spin
    /// forever.
    pub fn next_after(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let mut candidate = (after + Duration::minutes(1))
            .with_second(0)
            .and_then(|d| d.with_nanosecond(0))
            .ok_or_else(|| Error::Internal("failed to normalize cron candidate".into()))?;

        let limit = after + Duration::days(366 * 4);
        while candidate < limit {
            if self.matches(&candidate) {
                return Ok(candidate);
            }
            candidate += Duration::minutes(1);
        }
        Err(Error::InvalidParams(
            "cron expression never matches within 4 years".into(),
        ))
    }
}

/// Human-readable (informational only — never parsed back) description
/// of a cron expression, used in `scheduler.describe` responses.
pub fn describe_cron(expr: &str) -> String {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return format!("invalid cron expression: {expr}");
    }
    let [minute, hour, dom, month, dow] = [fields[0], fields[1], fields[2], fields[3], fields[4]];

    if minute != "*" && hour != "*" && dom == "*" && month == "*" && dow == "*" {
        return format!("daily at {hour}:{minute:0>2}");
    }
    format!("minute={minute} hour={hour} day-of-month={dom} month={month} day-of-week={dow}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn every_minute() {
        let s = CronSchedule::parse("* * * * *").unwrap();
        let next = s.next_after(at(2026, 1, 1, 0, 0)).unwrap();
        assert_eq!(next, at(2026, 1, 1, 0, 1));
    }

    #[test]
    fn daily_at_fixed_time() {
        let s = CronSchedule::parse("30 9 * * *").unwrap();
        let next = s.next_after(at(2026, 1, 1, 8, 0)).unwrap();
        assert_eq!(next, at(2026, 1, 1, 9, 30));
    }

    #[test]
    fn rolls_to_next_day_when_time_passed() {
        let s = CronSchedule::parse("30 9 * * *").unwrap();
        let next = s.next_after(at(2026, 1, 1, 10, 0)).unwrap();
        assert_eq!(next, at(2026, 1, 2, 9, 30));
    }

    #[test]
    fn next_after_is_always_strictly_later() {
        let s = CronSchedule::parse("0 9 * * *").unwrap();
        let now = at(2026, 1, 1, 9, 0);
        let next = s.next_after(now).unwrap();
        assert!(next > now);
    }

    #[test]
    fn stepped_range_every_fifteen_minutes() {
        let s = CronSchedule::parse("*/15 * * * *").unwrap();
        let next = s.next_after(at(2026, 1, 1, 0, 1)).unwrap();
        assert_eq!(next, at(2026, 1, 1, 0, 15));
    }

    #[test]
    fn explicit_stepped_bounded_range() {
        let s = CronSchedule::parse("0-30/10 * * * *").unwrap();
        let next = s.next_after(at(2026, 1, 1, 0, 0)).unwrap();
        assert_eq!(next, at(2026, 1, 1, 0, 10));
    }

    #[test]
    fn comma_list() {
        let s = CronSchedule::parse("0,30 * * * *").unwrap();
        let next = s.next_after(at(2026, 1, 1, 0, 5)).unwrap();
        assert_eq!(next, at(2026, 1, 1, 0, 30));
    }

    #[test]
    fn dom_and_dow_both_restricted_is_or() {
        // Fires on the 1st of the month OR on Mondays.
        let s = CronSchedule::parse("0 0 1 * 1").unwrap();
        // Jan 1 2026 is a Thursday — matches via day-of-month.
        assert!(s.matches(&at(2026, 1, 1, 0, 0)));
        // Jan 5 2026 is a Monday — matches via day-of-week.
        assert!(s.matches(&at(2026, 1, 5, 0, 0)));
        // Jan 6 2026 is neither.
        assert!(!s.matches(&at(2026, 1, 6, 0, 0)));
    }

    #[test]
    fn sunday_matches_both_zero_and_seven() {
        let s = CronSchedule::parse("0 0 * * 0").unwrap();
        // Jan 4 2026 is a Sunday.
        assert!(s.matches(&at(2026, 1, 4, 0, 0)));
        let s7 = CronSchedule::parse("0 0 * * 7").unwrap();
        assert!(s7.matches(&at(2026, 1, 4, 0, 0)));
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(CronSchedule::parse("* * * *").is_err());
    }

    #[test]
    fn rejects_out_of_range_value() {
        assert!(CronSchedule::parse("60 * * * *").is_err());
    }

    #[test]
    fn rejects_zero_step() {
        assert!(CronSchedule::parse("*/0 * * * *").is_err());
    }

    #[test]
    fn describe_daily() {
        assert_eq!(describe_cron("30 9 * * *"), "daily at 9:30");
    }
}
