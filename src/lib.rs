//! Platform-agnostic driver for the MCP794xx real-time clock/calendar family.
//!
//! The MCP794xx packages a battery-backed RTC with 64 bytes of SRAM, 128 bytes
//! of EEPROM and a protected unique-ID block behind two I2C addresses. This
//! crate provides:
//!
//! - byte access to the four memory blocks ([`Block`])
//! - a small civil calendar ([`calendar`]) converting between
//!   [`BrokenDownTime`] and a 32-bit epoch counter
//! - time keeping, alarms, backup supply control and multi-function pin setup
//!
//! All bus traffic goes through the `embedded-hal` 1.0 [`I2c`] trait. With the
//! `async` feature an equivalent driver over `embedded-hal-async` lives in
//! [`asynch`].
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp794xx::{BrokenDownTime, MCP794xx};
//!
//! let mut rtc = MCP794xx::new(i2c);
//! let now = BrokenDownTime::from_ymd_hms(2024, 6, 15, 10, 15, 30)?;
//! rtc.write_time(&now)?;
//! rtc.set_backup_supply(true)?;
//!
//! let time = rtc.read_time()?;
//! let epoch = rtc.time()?;
//! ```
//!
//! # Concurrency
//!
//! Read-modify-write sequences (alarm, output and backup supply setup) take two
//! bus transactions and are not atomic. Share a driver between contexts only
//! behind a lock that serializes whole calls.
#![no_std]

#[macro_use]
mod fmt;

pub mod alarm;
#[cfg(feature = "async")]
pub mod asynch;
pub mod bcd;
pub mod calendar;
mod datetime;
pub mod registers;

use chrono::NaiveDateTime;
use embedded_hal::i2c::I2c;

pub use crate::alarm::{Alarm, AlarmConfig};
use crate::alarm::AlarmRegisters;
pub use crate::calendar::{
    epoch_delta, from_epoch, normalize, to_epoch, BrokenDownTime, CalendarError, DayOfWeek,
    EpochTime,
};
pub use crate::datetime::{DEVICE_BASE_YEAR, DEVICE_MAX_YEAR};
use crate::datetime::RtcDateTime;
pub use crate::registers::*;

/// Multi-function pin configuration.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputConfig {
    /// Drive a square wave instead of a static level
    pub square_wave: bool,
    /// Static output level, used when `square_wave` is false and no alarm is
    /// enabled
    pub level: bool,
    /// Square wave frequency, used when `square_wave` is true
    pub frequency: SquareWaveFrequency,
}

impl OutputConfig {
    // ALM1EN, ALM0EN and EXTOSC survive an output change
    const PRESERVED_CONTROL_BITS: u8 = 0x38;

    /// Applies this configuration on top of the current control register.
    #[must_use]
    pub fn apply(&self, control: Control) -> Control {
        let mut control = Control(u8::from(control) & Self::PRESERVED_CONTROL_BITS);
        control.set_output_level(self.level);
        control.set_square_wave(self.square_wave);
        control.set_square_wave_frequency(self.frequency);
        control
    }
}

/// Errors returned by the driver.
#[derive(Debug)]
pub enum MCP794xxError<I2CE> {
    /// The bus transaction failed; the operation may be retried
    I2c(I2CE),
    /// A caller-supplied or decoded value is out of range
    Calendar(CalendarError),
}

impl<I2CE> From<I2CE> for MCP794xxError<I2CE> {
    fn from(e: I2CE) -> Self {
        MCP794xxError::I2c(e)
    }
}

// Seconds through year, the registers a read_time snapshot is built from
pub(crate) const fn is_time_register(block: Block, register: u8) -> bool {
    matches!(block, Block::Clock) && register <= RegAddr::Year as u8
}

/// MCP794xx real-time clock driver.
pub struct MCP794xx<I2C: I2c> {
    i2c: I2C,
    last_read: Option<BrokenDownTime>,
}

// Generates typed accessors for single clock block registers
macro_rules! set_and_get_register {
    ($(($name:ident, $regaddr:expr, $typ:ty)),+) => {
        $(
            paste::paste! {
                #[doc = concat!("Reads the ", stringify!($name), " register.")]
                pub fn $name(&mut self) -> Result<$typ, MCP794xxError<I2C::Error>> {
                    Ok(<$typ>::from(self.read_register(Block::Clock, $regaddr as u8)?))
                }

                #[doc = concat!("Writes the ", stringify!($name), " register.")]
                pub fn [< set_ $name >](&mut self, value: $typ) -> Result<(), MCP794xxError<I2C::Error>> {
                    self.write_register(Block::Clock, $regaddr as u8, value.into())
                }
            }
        )+
    };
}

// Generates read_<block>/write_<block> shorthands
macro_rules! block_access {
    ($(($name:ident, $block:expr)),+) => {
        $(
            paste::paste! {
                #[doc = concat!("Reads one byte of the ", stringify!($name), " block.")]
                pub fn [< read_ $name >](&mut self, address: u8) -> Result<u8, MCP794xxError<I2C::Error>> {
                    self.read_register($block, address)
                }

                #[doc = concat!("Writes one byte of the ", stringify!($name), " block.")]
                pub fn [< write_ $name >](&mut self, address: u8, data: u8) -> Result<(), MCP794xxError<I2C::Error>> {
                    self.write_register($block, address, data)
                }
            }
        )+
    };
}

impl<I2C: I2c> MCP794xx<I2C> {
    /// Creates a driver on `i2c`. The device addresses are fixed.
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            last_read: None,
        }
    }

    /// Consumes the driver and returns the bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// The time returned by the last [`read_time`](Self::read_time).
    ///
    /// Cleared by any write to the seconds through year registers, so it is
    /// only valid until the next read or write of the clock.
    #[must_use]
    pub fn last_read(&self) -> Option<&BrokenDownTime> {
        self.last_read.as_ref()
    }

    /// Reads one byte at `address` within `block`.
    ///
    /// The address is masked to the width of the block.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if the bus transaction fails.
    pub fn read_register(
        &mut self,
        block: Block,
        address: u8,
    ) -> Result<u8, MCP794xxError<I2C::Error>> {
        let target = RegisterAddress::resolve(block, address);
        let mut data = [0];
        self.i2c
            .write_read(target.device, &[target.register], &mut data)?;
        trace!("read {:?} {:#x} = {:#x}", block, target.register, data[0]);
        Ok(data[0])
    }

    /// Writes one byte at `address` within `block`.
    ///
    /// Writes to [`Block::Uid`] are preceded by the unlock sequence. A write to
    /// any time-keeping register clears [`last_read`](Self::last_read).
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if a bus transaction fails.
    pub fn write_register(
        &mut self,
        block: Block,
        address: u8,
        data: u8,
    ) -> Result<(), MCP794xxError<I2C::Error>> {
        let target = RegisterAddress::resolve(block, address);
        if block.write_protected() {
            self.unlock_uid()?;
        }
        if is_time_register(block, target.register) {
            self.last_read = None;
        }
        trace!("write {:?} {:#x} = {:#x}", block, target.register, data);
        self.i2c.write(target.device, &[target.register, data])?;
        Ok(())
    }

    fn unlock_uid(&mut self) -> Result<(), MCP794xxError<I2C::Error>> {
        for key in UID_UNLOCK_SEQUENCE {
            self.i2c
                .write(CLOCK_DEVICE_ADDRESS, &[RegAddr::EeUnlock as u8, key])?;
        }
        Ok(())
    }

    block_access!(
        (ram, Block::Ram),
        (eeprom, Block::Eeprom),
        (uid, Block::Uid)
    );

    set_and_get_register!(
        (seconds, RegAddr::Seconds, Seconds),
        (minutes, RegAddr::Minutes, Minutes),
        (hours, RegAddr::Hours, Hours),
        (weekday, RegAddr::Weekday, Weekday),
        (date, RegAddr::Date, Date),
        (month, RegAddr::Month, Month),
        (year, RegAddr::Year, Year),
        (control, RegAddr::Control, Control)
    );

    /// Reads the weekday register of `alarm`.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if the bus transaction fails.
    pub fn alarm_weekday(
        &mut self,
        alarm: Alarm,
    ) -> Result<AlarmWeekday, MCP794xxError<I2C::Error>> {
        let register = RegAddr::Alarm0Weekday.for_alarm(alarm);
        Ok(AlarmWeekday(self.read_register(Block::Clock, register)?))
    }

    /// Writes the weekday register of `alarm`.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if the bus transaction fails.
    pub fn set_alarm_weekday(
        &mut self,
        alarm: Alarm,
        value: AlarmWeekday,
    ) -> Result<(), MCP794xxError<I2C::Error>> {
        let register = RegAddr::Alarm0Weekday.for_alarm(alarm);
        self.write_register(Block::Clock, register, value.into())
    }

    /// Reads the current time.
    ///
    /// The seven time-keeping registers are read one at a time, seconds
    /// first. The weekday is the one stored on the device; the day of the
    /// year is derived from the date.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] on a bus failure, or
    /// [`MCP794xxError::Calendar`] if the month register holds garbage.
    pub fn read_time(&mut self) -> Result<BrokenDownTime, MCP794xxError<I2C::Error>> {
        let data = self.read_raw_time()?;
        let time = RtcDateTime::from(data)
            .into_time()
            .map_err(MCP794xxError::Calendar)?;
        debug!("read time {:?}", time);
        self.last_read = Some(time);
        Ok(time)
    }

    /// Writes `time` to the clock and starts the oscillator.
    ///
    /// The time is normalized first, so month and day-of-month wrap and the
    /// weekday and day of the year are recomputed. The backup supply enable
    /// bit is kept and the power-fail flag is cleared. Returns the time that
    /// was actually written.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::Calendar`] before any write if the time cannot
    /// be stored (time of day out of range, year outside 2000-2099), or
    /// [`MCP794xxError::I2c`] on a bus failure.
    pub fn write_time(
        &mut self,
        time: &BrokenDownTime,
    ) -> Result<BrokenDownTime, MCP794xxError<I2C::Error>> {
        let time = normalize(time).map_err(MCP794xxError::Calendar)?;
        let mut raw = RtcDateTime::from_time(&time).map_err(MCP794xxError::Calendar)?;

        let current = self.weekday()?;
        raw.weekday.set_backup_supply(current.backup_supply());
        debug!("write time {:?}", time);

        let data: [u8; 7] = (&raw).into();
        self.write_raw_time(&data)?;
        Ok(time)
    }

    /// Reads the seven time-keeping registers as stored, status bits included.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if a bus transaction fails.
    pub fn read_raw_time(&mut self) -> Result<[u8; 7], MCP794xxError<I2C::Error>> {
        let mut data = [0; 7];
        for (register, byte) in (RegAddr::Seconds as u8..).zip(data.iter_mut()) {
            *byte = self.read_register(Block::Clock, register)?;
        }
        Ok(data)
    }

    /// Writes the seven time-keeping registers verbatim, seconds first.
    ///
    /// Nothing is validated or normalized. Invalidates [`last_read`](Self::last_read).
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if a bus transaction fails.
    pub fn write_raw_time(&mut self, data: &[u8; 7]) -> Result<(), MCP794xxError<I2C::Error>> {
        for (register, value) in (RegAddr::Seconds as u8..).zip(data.iter().copied()) {
            self.write_register(Block::Clock, register, value)?;
        }
        Ok(())
    }

    /// Reads the current time as seconds since 1970-01-01.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] on a bus failure, or
    /// [`MCP794xxError::Calendar`] if the time cannot be converted.
    pub fn time(&mut self) -> Result<EpochTime, MCP794xxError<I2C::Error>> {
        let time = self.read_time()?;
        to_epoch(&time).map_err(MCP794xxError::Calendar)
    }

    /// Sets the clock from seconds since 1970-01-01.
    ///
    /// # Errors
    ///
    /// See [`write_time`](Self::write_time). Negative values are rejected.
    pub fn set_time_epoch(&mut self, epoch: EpochTime) -> Result<(), MCP794xxError<I2C::Error>> {
        let time = from_epoch(epoch).map_err(MCP794xxError::Calendar)?;
        self.write_time(&time)?;
        Ok(())
    }

    /// Reads the current time as a chrono `NaiveDateTime`.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] on a bus failure, or
    /// [`MCP794xxError::Calendar`] if the registers do not hold a valid date.
    pub fn datetime(&mut self) -> Result<NaiveDateTime, MCP794xxError<I2C::Error>> {
        let time = self.read_time()?;
        time.to_naive_datetime().map_err(MCP794xxError::Calendar)
    }

    /// Sets the clock from a chrono `NaiveDateTime`.
    ///
    /// # Errors
    ///
    /// See [`write_time`](Self::write_time).
    pub fn set_datetime(
        &mut self,
        datetime: &NaiveDateTime,
    ) -> Result<(), MCP794xxError<I2C::Error>> {
        let time = BrokenDownTime::try_from(datetime).map_err(MCP794xxError::Calendar)?;
        self.write_time(&time)?;
        Ok(())
    }

    /// Whether the oscillator is running and stable.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if the bus transaction fails.
    pub fn is_oscillator_running(&mut self) -> Result<bool, MCP794xxError<I2C::Error>> {
        Ok(self.weekday()?.oscillator_running())
    }

    /// Whether primary power was lost since the time was last written.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if the bus transaction fails.
    pub fn has_power_failed(&mut self) -> Result<bool, MCP794xxError<I2C::Error>> {
        Ok(self.weekday()?.power_failed())
    }

    /// Enables or disables the backup supply input and its switchover logic.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if a bus transaction fails.
    pub fn set_backup_supply(&mut self, enable: bool) -> Result<(), MCP794xxError<I2C::Error>> {
        let mut weekday = self.weekday()?;
        weekday.set_backup_supply(enable);
        debug!("backup supply {}", enable);
        self.set_weekday(weekday)
    }

    /// Sets or clears the enable bit of `alarm` in the control register.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if a bus transaction fails.
    pub fn set_alarm_enable(
        &mut self,
        alarm: Alarm,
        enable: bool,
    ) -> Result<(), MCP794xxError<I2C::Error>> {
        let mut control = self.control()?;
        control.set_alarm_enable(alarm, enable);
        self.set_control(control)
    }

    /// Configures an alarm.
    ///
    /// With a target, all six match registers are written (which also clears
    /// the interrupt flag). Without one, only the interrupt flag is cleared.
    /// The alarm's enable bit is updated last.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::Calendar`] before any write if a target field
    /// is out of range, or [`MCP794xxError::I2c`] on a bus failure.
    pub fn configure_alarm(
        &mut self,
        config: &AlarmConfig,
    ) -> Result<(), MCP794xxError<I2C::Error>> {
        debug!("configure alarm {:?}", config);
        match &config.target {
            Some(target) => {
                let registers = AlarmRegisters::from_target(target, config.mode, config.mask)
                    .map_err(MCP794xxError::Calendar)?;
                for (register, value) in registers.writes(config.alarm) {
                    self.write_register(Block::Clock, register, value)?;
                }
            }
            None => {
                let mut weekday = self.alarm_weekday(config.alarm)?;
                weekday.set_triggered(false);
                self.set_alarm_weekday(config.alarm, weekday)?;
            }
        }
        self.set_alarm_enable(config.alarm, config.enabled)
    }

    /// Whether `alarm` has matched since its flag was last cleared.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if the bus transaction fails.
    pub fn is_alarm_triggered(&mut self, alarm: Alarm) -> Result<bool, MCP794xxError<I2C::Error>> {
        Ok(self.alarm_weekday(alarm)?.triggered())
    }

    /// Clears the interrupt flag of `alarm` and sets its enable bit to
    /// `reenable`.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if a bus transaction fails.
    pub fn clear_alarm(
        &mut self,
        alarm: Alarm,
        reenable: bool,
    ) -> Result<(), MCP794xxError<I2C::Error>> {
        self.set_alarm_enable(alarm, reenable)?;
        let mut weekday = self.alarm_weekday(alarm)?;
        weekday.set_triggered(false);
        self.set_alarm_weekday(alarm, weekday)
    }

    /// Configures the multi-function pin.
    ///
    /// Alarm enables and the oscillator source are preserved, coarse trim is
    /// switched off.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if a bus transaction fails.
    pub fn configure_output(
        &mut self,
        config: &OutputConfig,
    ) -> Result<(), MCP794xxError<I2C::Error>> {
        let control = config.apply(self.control()?);
        debug!("control: {:?}", control);
        self.set_control(control)
    }
}
