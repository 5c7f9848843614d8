//! Civil calendar arithmetic.
//!
//! Converts between a broken-down date-time ([`BrokenDownTime`]) and a signed
//! 32-bit count of seconds since 1970-01-01 00:00:00 ([`EpochTime`]). Times are
//! naive local time as kept by the RTC; no time zone or offset is applied.
//!
//! # Field policy
//!
//! - Month wraps modulo 12 and day-of-month wraps modulo the length of the
//!   (already wrapped) month. Both are silently normalized, never rejected.
//! - Seconds, minutes and hours must already be in range, otherwise
//!   [`CalendarError::InvalidTimeOfDay`] is returned.
//! - Years must lie in [`MIN_YEAR`]..=[`MAX_YEAR`].
//! - Weekday and day-of-year are derived fields: [`normalize`] recomputes
//!   them and every conversion ignores whatever the caller put there.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// Seconds elapsed since 1970-01-01 00:00:00.
pub type EpochTime = i32;

/// Calendar year of the epoch origin.
pub const EPOCH_YEAR: u16 = 1970;
/// First supported calendar year.
pub const MIN_YEAR: u16 = EPOCH_YEAR;
/// Last supported calendar year.
pub const MAX_YEAR: u16 = EPOCH_YEAR + 255;

const SECONDS_PER_MINUTE: u32 = 60;
const SECONDS_PER_HOUR: u32 = 3_600;
const SECONDS_PER_DAY: u32 = 86_400;
const SECONDS_PER_YEAR: u32 = 31_536_000;
const SECONDS_PER_LEAP_YEAR: u32 = 31_622_400;

// 1970-01-01 was a Thursday
const EPOCH_WEEKDAY: u32 = 4;

/// Day of the week, numbered from Sunday.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DayOfWeek {
    Sunday = 0,
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
}

impl TryFrom<u8> for DayOfWeek {
    type Error = CalendarError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(DayOfWeek::Sunday),
            1 => Ok(DayOfWeek::Monday),
            2 => Ok(DayOfWeek::Tuesday),
            3 => Ok(DayOfWeek::Wednesday),
            4 => Ok(DayOfWeek::Thursday),
            5 => Ok(DayOfWeek::Friday),
            6 => Ok(DayOfWeek::Saturday),
            _ => Err(CalendarError::InvalidField),
        }
    }
}

impl From<DayOfWeek> for u8 {
    fn from(v: DayOfWeek) -> Self {
        v as u8
    }
}

/// Errors raised for arguments outside their documented domain.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalendarError {
    /// Month index outside 0-11
    InvalidMonth(u8),
    /// Seconds, minutes or hours out of range
    InvalidTimeOfDay,
    /// A field does not fit the register it is destined for
    InvalidField,
    /// Year outside the supported range
    YearOutOfRange(i32),
    /// Seconds since the epoch outside the representable range
    EpochOutOfRange(i64),
    /// The fields do not form a valid calendar date
    InvalidDate,
}

/// A broken-down calendar date and time.
///
/// `mday`, `month` and `weekday` are zero-based. `year` is the absolute
/// calendar year.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BrokenDownTime {
    /// Seconds after the minute (0-59)
    pub seconds: u8,
    /// Minutes after the hour (0-59)
    pub minutes: u8,
    /// Hours since midnight (0-23)
    pub hours: u8,
    /// Day of the month (0-30)
    pub mday: u8,
    /// Month of the year (0-11)
    pub month: u8,
    /// Calendar year
    pub year: u16,
    /// Day of the week (0-6, Sunday = 0), derived
    pub weekday: u8,
    /// Day of the year (0-365), derived
    pub yday: u16,
}

impl BrokenDownTime {
    /// Creates a time from one-based civil fields, deriving weekday and
    /// day-of-year.
    ///
    /// # Errors
    ///
    /// Returns an error if `month` or `day` is zero, or if [`normalize`]
    /// rejects the remaining fields.
    pub fn from_ymd_hms(
        year: u16,
        month: u8,
        day: u8,
        hours: u8,
        minutes: u8,
        seconds: u8,
    ) -> Result<Self, CalendarError> {
        if month == 0 || day == 0 {
            return Err(CalendarError::InvalidDate);
        }
        normalize(&BrokenDownTime {
            seconds,
            minutes,
            hours,
            mday: day - 1,
            month: month - 1,
            year,
            weekday: 0,
            yday: 0,
        })
    }

    /// Day of the week as a [`DayOfWeek`].
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::InvalidField`] if `weekday` is above 6.
    pub fn day_of_week(&self) -> Result<DayOfWeek, CalendarError> {
        DayOfWeek::try_from(self.weekday)
    }

    /// Converts to a chrono `NaiveDateTime`.
    ///
    /// No wrapping is applied; the fields must already describe a real date.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::InvalidDate`] if the fields are not a valid
    /// date and time.
    pub fn to_naive_datetime(&self) -> Result<NaiveDateTime, CalendarError> {
        NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month) + 1,
            u32::from(self.mday) + 1,
        )
        .and_then(|d| {
            d.and_hms_opt(
                u32::from(self.hours),
                u32::from(self.minutes),
                u32::from(self.seconds),
            )
        })
        .ok_or(CalendarError::InvalidDate)
    }
}

impl TryFrom<&NaiveDateTime> for BrokenDownTime {
    type Error = CalendarError;

    fn try_from(datetime: &NaiveDateTime) -> Result<Self, Self::Error> {
        let year = u16::try_from(datetime.year())
            .ok()
            .filter(|y| (MIN_YEAR..=MAX_YEAR).contains(y))
            .ok_or(CalendarError::YearOutOfRange(datetime.year()))?;
        let narrow = |v: u32| u8::try_from(v).map_err(|_| CalendarError::InvalidDate);
        Ok(BrokenDownTime {
            seconds: narrow(datetime.second())?,
            minutes: narrow(datetime.minute())?,
            hours: narrow(datetime.hour())?,
            mday: narrow(datetime.day0())?,
            month: narrow(datetime.month0())?,
            year,
            weekday: narrow(datetime.weekday().num_days_from_sunday())?,
            yday: u16::try_from(datetime.ordinal0()).map_err(|_| CalendarError::InvalidDate)?,
        })
    }
}

/// Returns true if `year` is a Gregorian leap year.
#[must_use]
pub const fn is_leap_year(year: u16) -> bool {
    year % 400 == 0 || (year % 4 == 0 && year % 100 != 0)
}

/// Number of days in the zero-based `month`.
///
/// # Errors
///
/// Returns [`CalendarError::InvalidMonth`] if `month` is above 11.
pub fn days_in_month(month: u8, leap_year: bool) -> Result<u8, CalendarError> {
    match month {
        0 | 2 | 4 | 6 | 7 | 9 | 11 => Ok(31),
        1 => Ok(if leap_year { 29 } else { 28 }),
        3 | 5 | 8 | 10 => Ok(30),
        _ => Err(CalendarError::InvalidMonth(month)),
    }
}

fn check_year(year: u16) -> Result<(), CalendarError> {
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Ok(())
    } else {
        error!("year {} outside {}..={}", year, MIN_YEAR, MAX_YEAR);
        Err(CalendarError::YearOutOfRange(i32::from(year)))
    }
}

fn check_time_of_day(time: &BrokenDownTime) -> Result<(), CalendarError> {
    if time.seconds > 59 || time.minutes > 59 || time.hours > 23 {
        error!(
            "time of day {}:{}:{} out of range",
            time.hours, time.minutes, time.seconds
        );
        return Err(CalendarError::InvalidTimeOfDay);
    }
    Ok(())
}

/// Days from the epoch origin to January 1st of `year`.
fn days_before_year(year: u16) -> u32 {
    (EPOCH_YEAR..year)
        .map(|y| if is_leap_year(y) { 366 } else { 365 })
        .sum()
}

/// Days from January 1st to the first day of the zero-based `month`.
fn days_before_month(month: u8, leap_year: bool) -> Result<u16, CalendarError> {
    let mut days = 0;
    for m in 0..month {
        days += u16::from(days_in_month(m, leap_year)?);
    }
    Ok(days)
}

/// Zero-based day of the year for the date in `time`, without any wrapping.
///
/// # Errors
///
/// Returns [`CalendarError::InvalidMonth`] if the month is above 11.
pub fn day_of_year(time: &BrokenDownTime) -> Result<u16, CalendarError> {
    let leap_year = is_leap_year(time.year);
    days_in_month(time.month, leap_year)?;
    Ok(days_before_month(time.month, leap_year)? + u16::from(time.mday))
}

/// Returns a copy of `time` with month and day-of-month wrapped into range and
/// weekday and day-of-year recomputed.
///
/// # Errors
///
/// Returns an error if the time of day is out of range or the year is outside
/// [`MIN_YEAR`]..=[`MAX_YEAR`].
pub fn normalize(time: &BrokenDownTime) -> Result<BrokenDownTime, CalendarError> {
    check_time_of_day(time)?;
    check_year(time.year)?;

    let leap_year = is_leap_year(time.year);
    let month = time.month % 12;
    let mday = time.mday % days_in_month(month, leap_year)?;
    let yday = days_before_month(month, leap_year)? + u16::from(mday);
    let days = days_before_year(time.year) + u32::from(yday);

    Ok(BrokenDownTime {
        mday,
        month,
        weekday: weekday_from_days(days),
        yday,
        ..*time
    })
}

// Always < 7
#[allow(clippy::cast_possible_truncation)]
fn weekday_from_days(days: u32) -> u8 {
    ((days + EPOCH_WEEKDAY) % 7) as u8
}

/// Converts a broken-down time to seconds since the epoch.
///
/// Month and day-of-month are wrapped as described in the module docs; the
/// caller's weekday and day-of-year are ignored. Use [`normalize`] to obtain
/// the repaired fields.
///
/// # Errors
///
/// Returns an error if [`normalize`] rejects the time, or
/// [`CalendarError::EpochOutOfRange`] if the result does not fit an
/// [`EpochTime`].
pub fn to_epoch(time: &BrokenDownTime) -> Result<EpochTime, CalendarError> {
    let time = normalize(time)?;
    let days = days_before_year(time.year) + u32::from(time.yday);
    let seconds = i64::from(days) * i64::from(SECONDS_PER_DAY)
        + i64::from(time.hours) * i64::from(SECONDS_PER_HOUR)
        + i64::from(time.minutes) * i64::from(SECONDS_PER_MINUTE)
        + i64::from(time.seconds);
    EpochTime::try_from(seconds).map_err(|_| {
        error!("{}-{}-{} does not fit the epoch counter", time.year, time.month, time.mday);
        CalendarError::EpochOutOfRange(seconds)
    })
}

/// Converts seconds since the epoch to a broken-down time.
///
/// # Errors
///
/// Returns [`CalendarError::EpochOutOfRange`] for negative input.
// Every narrowing below is bounded by the division that precedes it.
#[allow(clippy::cast_possible_truncation)]
pub fn from_epoch(epoch: EpochTime) -> Result<BrokenDownTime, CalendarError> {
    let mut remaining =
        u32::try_from(epoch).map_err(|_| CalendarError::EpochOutOfRange(i64::from(epoch)))?;
    let weekday = weekday_from_days(remaining / SECONDS_PER_DAY);

    let mut year = EPOCH_YEAR;
    loop {
        let year_length = if is_leap_year(year) {
            SECONDS_PER_LEAP_YEAR
        } else {
            SECONDS_PER_YEAR
        };
        if remaining < year_length {
            break;
        }
        remaining -= year_length;
        year += 1;
    }
    let yday = (remaining / SECONDS_PER_DAY) as u16;

    let leap_year = is_leap_year(year);
    let mut month = 0;
    loop {
        let month_length = u32::from(days_in_month(month, leap_year)?) * SECONDS_PER_DAY;
        if remaining < month_length {
            break;
        }
        remaining -= month_length;
        month += 1;
    }

    let mday = (remaining / SECONDS_PER_DAY) as u8;
    remaining -= u32::from(mday) * SECONDS_PER_DAY;
    let hours = (remaining / SECONDS_PER_HOUR) as u8;
    remaining -= u32::from(hours) * SECONDS_PER_HOUR;
    let minutes = (remaining / SECONDS_PER_MINUTE) as u8;
    remaining -= u32::from(minutes) * SECONDS_PER_MINUTE;

    Ok(BrokenDownTime {
        seconds: remaining as u8,
        minutes,
        hours,
        mday,
        month,
        year,
        weekday,
        yday,
    })
}

/// Signed difference `later - earlier` in seconds, wrapping on overflow.
#[must_use]
pub const fn epoch_delta(later: EpochTime, earlier: EpochTime) -> i32 {
    later.wrapping_sub(earlier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(year: u16, month: u8, mday: u8, hours: u8, minutes: u8, seconds: u8) -> BrokenDownTime {
        BrokenDownTime {
            seconds,
            minutes,
            hours,
            mday,
            month,
            year,
            weekday: 0,
            yday: 0,
        }
    }

    fn chrono_timestamp(t: &BrokenDownTime) -> i64 {
        t.to_naive_datetime().unwrap().and_utc().timestamp()
    }

    #[test]
    fn test_leap_years() {
        assert!(is_leap_year(2000));
        assert!(is_leap_year(2024));
        assert!(is_leap_year(2096));
        assert!(!is_leap_year(1900));
        assert!(!is_leap_year(2100));
        assert!(!is_leap_year(2001));
        assert!(!is_leap_year(1970));
    }

    #[test]
    fn test_days_in_month_table() {
        let expected = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
        for (month, &days) in expected.iter().enumerate() {
            let month = month as u8;
            assert_eq!(days_in_month(month, false).unwrap(), days);
            let leap = if month == 1 { 29 } else { days };
            assert_eq!(days_in_month(month, true).unwrap(), leap);
        }
    }

    #[test]
    fn test_days_in_month_rejects_invalid_month() {
        assert_eq!(days_in_month(12, false), Err(CalendarError::InvalidMonth(12)));
        assert_eq!(days_in_month(255, true), Err(CalendarError::InvalidMonth(255)));
    }

    #[test]
    fn test_epoch_origin_is_thursday() {
        let t = from_epoch(0).unwrap();
        assert_eq!(t, time(1970, 0, 0, 0, 0, 0).with_derived(4, 0));
        assert_eq!(t.day_of_week().unwrap(), DayOfWeek::Thursday);
        assert_eq!(to_epoch(&time(1970, 0, 0, 0, 0, 0)).unwrap(), 0);
    }

    #[test]
    fn test_to_epoch_known_values() {
        assert_eq!(to_epoch(&time(2000, 0, 0, 0, 0, 0)).unwrap(), 946_684_800);
        assert_eq!(
            to_epoch(&time(2038, 0, 18, 3, 14, 7)).unwrap(),
            i32::MAX
        );
        let t = time(2024, 5, 14, 10, 15, 30);
        assert_eq!(i64::from(to_epoch(&t).unwrap()), chrono_timestamp(&t));
    }

    #[test]
    fn test_to_epoch_overflow() {
        assert_eq!(
            to_epoch(&time(2038, 0, 18, 3, 14, 8)),
            Err(CalendarError::EpochOutOfRange(i64::from(i32::MAX) + 1))
        );
        let t = time(2099, 11, 30, 23, 59, 59);
        assert_eq!(
            to_epoch(&t),
            Err(CalendarError::EpochOutOfRange(chrono_timestamp(&t)))
        );
    }

    #[test]
    fn test_from_epoch_rejects_negative() {
        assert_eq!(from_epoch(-1), Err(CalendarError::EpochOutOfRange(-1)));
    }

    #[test]
    fn test_normalize_derives_weekday_and_yday() {
        // June 15th 2024 was a Saturday, the 167th day of a leap year
        let mut t = time(2024, 5, 14, 10, 15, 30);
        t.weekday = 2;
        t.yday = 9;
        let n = normalize(&t).unwrap();
        assert_eq!(n.weekday, 6);
        assert_eq!(n.yday, 166);
        assert_eq!(n.day_of_week().unwrap(), DayOfWeek::Saturday);
        // the input is left untouched
        assert_eq!(t.weekday, 2);
        assert_eq!(t.yday, 9);
    }

    #[test]
    fn test_normalize_wraps_month_then_day() {
        // month 13 wraps to February; day 30 wraps modulo 29 in 2024
        let n = normalize(&time(2024, 13, 30, 0, 0, 0)).unwrap();
        assert_eq!(n.month, 1);
        assert_eq!(n.mday, 1);
        // in a common year February has 28 days
        let n = normalize(&time(2023, 1, 28, 0, 0, 0)).unwrap();
        assert_eq!(n.mday, 0);
        // the epoch is computed from the wrapped fields
        assert_eq!(
            to_epoch(&time(2024, 13, 30, 0, 0, 0)).unwrap(),
            to_epoch(&time(2024, 1, 1, 0, 0, 0)).unwrap()
        );
    }

    #[test]
    fn test_normalize_rejects_time_of_day() {
        assert_eq!(
            normalize(&time(2024, 0, 0, 24, 0, 0)),
            Err(CalendarError::InvalidTimeOfDay)
        );
        assert_eq!(
            normalize(&time(2024, 0, 0, 0, 60, 0)),
            Err(CalendarError::InvalidTimeOfDay)
        );
        assert_eq!(
            normalize(&time(2024, 0, 0, 0, 0, 60)),
            Err(CalendarError::InvalidTimeOfDay)
        );
    }

    #[test]
    fn test_year_range() {
        assert_eq!(
            normalize(&time(1969, 11, 30, 23, 59, 59)),
            Err(CalendarError::YearOutOfRange(1969))
        );
        assert_eq!(
            normalize(&time(MAX_YEAR + 1, 0, 0, 0, 0, 0)),
            Err(CalendarError::YearOutOfRange(i32::from(MAX_YEAR) + 1))
        );
        assert!(normalize(&time(MAX_YEAR, 11, 30, 23, 59, 59)).is_ok());
    }

    #[test]
    fn test_round_trip_through_epoch() {
        let samples = [
            time(1970, 0, 0, 0, 0, 0),
            time(1972, 1, 28, 12, 0, 0),
            time(1999, 11, 30, 23, 59, 59),
            time(2000, 1, 28, 6, 30, 15),
            time(2024, 5, 14, 10, 15, 30),
            time(2037, 11, 30, 23, 59, 59),
        ];
        for t in samples {
            let epoch = to_epoch(&t).unwrap();
            let back = from_epoch(epoch).unwrap();
            assert_eq!(back, normalize(&t).unwrap(), "epoch {epoch}");
        }
    }

    #[test]
    fn test_from_epoch_matches_chrono_daily() {
        // one sample per day with a moving time of day, 1970 through 2037
        let mut epoch: i32 = 0;
        while epoch < 2_145_916_800 {
            let t = from_epoch(epoch).unwrap();
            assert_eq!(chrono_timestamp(&t), i64::from(epoch));
            let dt = t.to_naive_datetime().unwrap();
            assert_eq!(u32::from(t.weekday), dt.weekday().num_days_from_sunday());
            assert_eq!(u32::from(t.yday), dt.ordinal0());
            assert_eq!(to_epoch(&t).unwrap(), epoch);
            epoch += 86_400 + 3_671;
        }
    }

    #[test]
    fn test_day_of_year() {
        assert_eq!(day_of_year(&time(2024, 0, 0, 0, 0, 0)).unwrap(), 0);
        assert_eq!(day_of_year(&time(2024, 5, 14, 0, 0, 0)).unwrap(), 166);
        assert_eq!(day_of_year(&time(2023, 11, 30, 0, 0, 0)).unwrap(), 364);
        assert_eq!(day_of_year(&time(2024, 11, 30, 0, 0, 0)).unwrap(), 365);
        assert_eq!(
            day_of_year(&time(2024, 12, 0, 0, 0, 0)),
            Err(CalendarError::InvalidMonth(12))
        );
    }

    #[test]
    fn test_epoch_delta() {
        assert_eq!(epoch_delta(100, 40), 60);
        assert_eq!(epoch_delta(40, 100), -60);
        assert_eq!(epoch_delta(i32::MIN, 1), i32::MAX);
    }

    #[test]
    fn test_from_ymd_hms() {
        let t = BrokenDownTime::from_ymd_hms(2024, 6, 15, 10, 15, 30).unwrap();
        assert_eq!(t.mday, 14);
        assert_eq!(t.month, 5);
        assert_eq!(t.weekday, 6);
        assert_eq!(t.yday, 166);
        assert_eq!(
            BrokenDownTime::from_ymd_hms(2024, 0, 15, 10, 15, 30),
            Err(CalendarError::InvalidDate)
        );
    }

    #[test]
    fn test_naive_datetime_bridge() {
        let dt = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_opt(23, 59, 58)
            .unwrap();
        let t = BrokenDownTime::try_from(&dt).unwrap();
        assert_eq!(t, normalize(&t).unwrap());
        assert_eq!(t.month, 1);
        assert_eq!(t.mday, 28);
        assert_eq!(t.to_naive_datetime().unwrap(), dt);

        let early = NaiveDate::from_ymd_opt(1969, 12, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(
            BrokenDownTime::try_from(&early),
            Err(CalendarError::YearOutOfRange(1969))
        );

        let ancient = NaiveDate::from_ymd_opt(-44, 3, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(
            BrokenDownTime::try_from(&ancient),
            Err(CalendarError::YearOutOfRange(-44))
        );

        let distant = NaiveDate::from_ymd_opt(70_000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(
            BrokenDownTime::try_from(&distant),
            Err(CalendarError::YearOutOfRange(70_000))
        );
    }

    impl BrokenDownTime {
        fn with_derived(mut self, weekday: u8, yday: u16) -> Self {
            self.weekday = weekday;
            self.yday = yday;
            self
        }
    }
}
