//! Alarm configuration for the MCP794xx.
//!
//! The device has two identical alarms, each backed by six registers
//! (seconds, minutes, hours, weekday, date, month). Alarm 1's block sits 7
//! bytes above alarm 0's. The weekday register carries more than the weekday:
//!
//! | bit | field                                |
//! |-----|--------------------------------------|
//! | 7   | output polarity ([`AlarmMode`])      |
//! | 6:4 | compared fields ([`AlarmMask`])      |
//! | 3   | interrupt flag, set on a match       |
//! | 2:0 | day of week (1-7)                    |
//!
//! Each alarm is switched on and off through its own enable bit in the
//! control register (bit 4 for alarm 0, bit 5 for alarm 1).

use crate::calendar::{BrokenDownTime, CalendarError};
use crate::datetime::make_bcd;
use crate::{AlarmMask, AlarmMode, AlarmWeekday, RegAddr};

/// Selects one of the two alarms.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Alarm {
    /// Alarm 0, registers 0x0A-0x0F
    Alarm0,
    /// Alarm 1, registers 0x11-0x16
    Alarm1,
}

impl Alarm {
    /// Distance of this alarm's registers from alarm 0's.
    #[must_use]
    pub const fn register_offset(self) -> u8 {
        match self {
            Alarm::Alarm0 => 0x00,
            Alarm::Alarm1 => 0x07,
        }
    }
}

/// Requested state of one alarm.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmConfig {
    /// Which alarm to configure
    pub alarm: Alarm,
    /// Output polarity
    pub mode: AlarmMode,
    /// Enable bit in the control register
    pub enabled: bool,
    /// Fields compared against the current time
    pub mask: AlarmMask,
    /// Match time. `None` leaves the match registers alone and only clears
    /// the interrupt flag before updating the enable bit.
    pub target: Option<BrokenDownTime>,
}

/// Register image of one alarm's six match registers.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct AlarmRegisters {
    seconds: u8,
    minutes: u8,
    hours: u8,
    weekday: AlarmWeekday,
    date: u8,
    month: u8,
}

impl AlarmRegisters {
    /// Builds the match registers for `target`.
    ///
    /// The target is not normalized: its weekday is what a weekday match
    /// compares against, so every field is only range-checked. The interrupt
    /// flag is written as zero.
    pub(crate) fn from_target(
        target: &BrokenDownTime,
        mode: AlarmMode,
        mask: AlarmMask,
    ) -> Result<Self, CalendarError> {
        let mut weekday = AlarmWeekday::default();
        weekday.set_mode(mode);
        weekday.set_mask(mask);
        weekday.set_weekday(make_bcd(target.weekday, 6)? + 1);

        Ok(Self {
            seconds: make_bcd(target.seconds, 59)?,
            minutes: make_bcd(target.minutes, 59)?,
            hours: make_bcd(target.hours, 23)?,
            weekday,
            date: make_bcd(target.mday.saturating_add(1), 31)?,
            month: make_bcd(target.month.saturating_add(1), 12)?,
        })
    }

    /// The (register, value) writes for `alarm`, in register order.
    pub(crate) fn writes(&self, alarm: Alarm) -> [(u8, u8); 6] {
        [
            (RegAddr::Alarm0Seconds.for_alarm(alarm), self.seconds),
            (RegAddr::Alarm0Minutes.for_alarm(alarm), self.minutes),
            (RegAddr::Alarm0Hours.for_alarm(alarm), self.hours),
            (RegAddr::Alarm0Weekday.for_alarm(alarm), self.weekday.into()),
            (RegAddr::Alarm0Date.for_alarm(alarm), self.date),
            (RegAddr::Alarm0Month.for_alarm(alarm), self.month),
        ]
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AlarmRegisters {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "AlarmRegisters {{ {:x} {:x} {:x} {} {:x} {:x} }}",
            self.seconds,
            self.minutes,
            self.hours,
            self.weekday,
            self.date,
            self.month
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::normalize;

    fn target() -> BrokenDownTime {
        normalize(&BrokenDownTime {
            seconds: 5,
            minutes: 45,
            hours: 23,
            mday: 30,
            month: 11,
            year: 2024,
            weekday: 0,
            yday: 0,
        })
        .unwrap()
    }

    #[test]
    fn test_alarm_register_image() {
        // 2024-12-31 was a Tuesday
        let regs = AlarmRegisters::from_target(&target(), AlarmMode::And, AlarmMask::All).unwrap();
        assert_eq!(
            regs.writes(Alarm::Alarm0),
            [
                (0x0A, 0x05),
                (0x0B, 0x45),
                (0x0C, 0x23),
                (0x0D, 0x70 | 3),
                (0x0E, 0x31),
                (0x0F, 0x12),
            ]
        );
    }

    #[test]
    fn test_alarm1_nor_hour_packing() {
        let regs = AlarmRegisters::from_target(&target(), AlarmMode::Nor, AlarmMask::Hour).unwrap();
        let writes = regs.writes(Alarm::Alarm1);
        assert_eq!(writes[0].0, 0x11);
        assert_eq!(writes[5].0, 0x16);
        assert_eq!(writes[3], (0x14, 0x80 | (0b010 << 4) | 3));
        assert!(!regs.weekday.triggered());
    }

    #[test]
    fn test_weekday_is_taken_from_target() {
        let mut t = target();
        t.weekday = 5;
        let regs = AlarmRegisters::from_target(&t, AlarmMode::And, AlarmMask::Weekday).unwrap();
        assert_eq!(regs.weekday.weekday(), 6);
        assert_eq!(regs.weekday.mask(), AlarmMask::Weekday);
    }

    #[test]
    fn test_out_of_range_target_is_rejected() {
        let mut t = target();
        t.hours = 24;
        assert_eq!(
            AlarmRegisters::from_target(&t, AlarmMode::And, AlarmMask::All),
            Err(CalendarError::InvalidField)
        );
        let mut t = target();
        t.weekday = 7;
        assert_eq!(
            AlarmRegisters::from_target(&t, AlarmMode::And, AlarmMask::All),
            Err(CalendarError::InvalidField)
        );
        let mut t = target();
        t.month = 12;
        assert_eq!(
            AlarmRegisters::from_target(&t, AlarmMode::And, AlarmMask::All),
            Err(CalendarError::InvalidField)
        );
    }

    #[test]
    fn test_register_offsets() {
        assert_eq!(Alarm::Alarm0.register_offset(), 0x00);
        assert_eq!(Alarm::Alarm1.register_offset(), 0x07);
    }
}
