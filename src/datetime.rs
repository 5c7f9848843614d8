//! Time-keeping register snapshot of the MCP794xx.
//!
//! The device stores the current time in 7 consecutive registers, each a
//! packed BCD value sharing its byte with control or status bits:
//! - Seconds (+ oscillator start), Minutes, Hours (+ 12/24 select)
//! - Weekday (+ OSCRUN, PWRFAIL, VBATEN), Date, Month (+ LPYR), Year
//!
//! Weekday, date and month are one-based on the device and zero-based in
//! [`BrokenDownTime`]. The year register counts from 2000.

use crate::bcd::{decode_bcd, encode_bcd};
use crate::calendar::{day_of_year, BrokenDownTime, CalendarError};
use crate::{Date, Hours, Minutes, Month, Seconds, Weekday, Year};

/// Calendar year represented by a year register value of 00.
pub const DEVICE_BASE_YEAR: u16 = 2000;
/// Last calendar year the year register can hold.
pub const DEVICE_MAX_YEAR: u16 = DEVICE_BASE_YEAR + 99;

/// Raw contents of the 7 time-keeping registers.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct RtcDateTime {
    pub(crate) seconds: Seconds,
    pub(crate) minutes: Minutes,
    pub(crate) hours: Hours,
    pub(crate) weekday: Weekday,
    pub(crate) date: Date,
    pub(crate) month: Month,
    pub(crate) year: Year,
}

/// Encodes `value` as BCD after checking it against `max`.
pub(crate) fn make_bcd(value: u8, max: u8) -> Result<u8, CalendarError> {
    if value > max {
        error!("register value {} above {}", value, max);
        return Err(CalendarError::InvalidField);
    }
    Ok(encode_bcd(value))
}

impl RtcDateTime {
    /// Builds the register image for an already normalized `time`.
    ///
    /// The oscillator start bit is always set, so writing the image starts
    /// the clock. Status bits of the weekday register are left clear.
    pub(crate) fn from_time(time: &BrokenDownTime) -> Result<Self, CalendarError> {
        if !(DEVICE_BASE_YEAR..=DEVICE_MAX_YEAR).contains(&time.year) {
            error!(
                "year {} outside {}..={}",
                time.year, DEVICE_BASE_YEAR, DEVICE_MAX_YEAR
            );
            return Err(CalendarError::YearOutOfRange(i32::from(time.year)));
        }
        let year_offset =
            u8::try_from(time.year - DEVICE_BASE_YEAR).map_err(|_| CalendarError::InvalidField)?;

        let mut seconds = Seconds::default();
        seconds.set_bcd(make_bcd(time.seconds, 59)?);
        seconds.set_start_oscillator(true);

        let mut minutes = Minutes::default();
        minutes.set_bcd(make_bcd(time.minutes, 59)?);

        let mut hours = Hours::default();
        hours.set_bcd(make_bcd(time.hours, 23)?);

        let mut weekday = Weekday::default();
        weekday.set_weekday(make_bcd(time.weekday, 6)? + 1);

        let mut date = Date::default();
        date.set_bcd(make_bcd(time.mday.saturating_add(1), 31)?);

        let mut month = Month::default();
        month.set_bcd(make_bcd(time.month.saturating_add(1), 12)?);

        let mut year = Year::default();
        year.set_bcd(make_bcd(year_offset, 99)?);

        let raw = RtcDateTime {
            seconds,
            minutes,
            hours,
            weekday,
            date,
            month,
            year,
        };
        debug!("raw={:?}", raw);
        Ok(raw)
    }

    /// Decodes the register image.
    ///
    /// Control and status bits are stripped before BCD decoding. Register
    /// values of zero for the one-based fields read back as zero rather than
    /// wrapping. The weekday is taken from the device, the day of the year is
    /// derived from the date.
    pub(crate) fn into_time(self) -> Result<BrokenDownTime, CalendarError> {
        let mut time = BrokenDownTime {
            seconds: decode_bcd(self.seconds.bcd()),
            minutes: decode_bcd(self.minutes.bcd()),
            hours: decode_bcd(self.hours.bcd()),
            mday: decode_bcd(self.date.bcd()).saturating_sub(1),
            month: decode_bcd(self.month.bcd()).saturating_sub(1),
            year: DEVICE_BASE_YEAR + u16::from(decode_bcd(self.year.bcd())),
            weekday: self.weekday.weekday().saturating_sub(1),
            yday: 0,
        };
        time.yday = day_of_year(&time)?;
        Ok(time)
    }
}

impl From<[u8; 7]> for RtcDateTime {
    fn from(data: [u8; 7]) -> Self {
        RtcDateTime {
            seconds: Seconds(data[0]),
            minutes: Minutes(data[1]),
            hours: Hours(data[2]),
            weekday: Weekday(data[3]),
            date: Date(data[4]),
            month: Month(data[5]),
            year: Year(data[6]),
        }
    }
}

impl From<&RtcDateTime> for [u8; 7] {
    fn from(dt: &RtcDateTime) -> [u8; 7] {
        [
            dt.seconds.0,
            dt.minutes.0,
            dt.hours.0,
            dt.weekday.0,
            dt.date.0,
            dt.month.0,
            dt.year.0,
        ]
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for RtcDateTime {
    fn format(&self, f: defmt::Formatter) {
        let data: [u8; 7] = self.into();
        defmt::write!(f, "RtcDateTime({:x})", data);
    }
}
