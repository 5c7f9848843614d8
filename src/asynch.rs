//! Async implementation of the MCP794xx driver.
//!
//! This module provides the same interface as the blocking
//! [`MCP794xx`](crate::MCP794xx) over `embedded-hal-async` traits. It is only
//! available when the `async` feature is enabled. Register packing is shared
//! with the blocking driver, so both issue identical bus transactions.
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp794xx::asynch::MCP794xx;
//!
//! let mut rtc = MCP794xx::new(i2c);
//! rtc.set_backup_supply(true).await?;
//! let now = rtc.read_time().await?;
//! ```

use chrono::NaiveDateTime;
use embedded_hal_async::i2c::I2c;
use paste::paste;

use crate::alarm::AlarmRegisters;
use crate::datetime::RtcDateTime;
use crate::is_time_register;
use crate::{
    from_epoch, normalize, to_epoch, Alarm, AlarmConfig, AlarmWeekday, Block, BrokenDownTime,
    Control, Date, EpochTime, Hours, MCP794xxError, Minutes, Month, OutputConfig, RegAddr,
    RegisterAddress, Seconds, Weekday, Year, CLOCK_DEVICE_ADDRESS, UID_UNLOCK_SEQUENCE,
};

/// MCP794xx real-time clock async driver.
pub struct MCP794xx<I2C: I2c> {
    i2c: I2C,
    last_read: Option<BrokenDownTime>,
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

    /// The time returned by the last [`read_time`](Self::read_time), cleared
    /// by every time write.
    #[must_use]
    pub fn last_read(&self) -> Option<&BrokenDownTime> {
        self.last_read.as_ref()
    }

    /// Reads one byte at `address` within `block`.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if the bus transaction fails.
    pub async fn read_register(
        &mut self,
        block: Block,
        address: u8,
    ) -> Result<u8, MCP794xxError<I2C::Error>> {
        let target = RegisterAddress::resolve(block, address);
        let mut data = [0];
        self.i2c
            .write_read(target.device, &[target.register], &mut data)
            .await?;
        trace!("read {:?} {:#x} = {:#x}", block, target.register, data[0]);
        Ok(data[0])
    }

    /// Writes one byte at `address` within `block`, unlocking the unique-ID
    /// block first when needed. Time-keeping register writes clear
    /// [`last_read`](Self::last_read).
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if a bus transaction fails.
    pub async fn write_register(
        &mut self,
        block: Block,
        address: u8,
        data: u8,
    ) -> Result<(), MCP794xxError<I2C::Error>> {
        let target = RegisterAddress::resolve(block, address);
        if block.write_protected() {
            for key in UID_UNLOCK_SEQUENCE {
                self.i2c
                    .write(CLOCK_DEVICE_ADDRESS, &[RegAddr::EeUnlock as u8, key])
                    .await?;
            }
        }
        if is_time_register(block, target.register) {
            self.last_read = None;
        }
        trace!("write {:?} {:#x} = {:#x}", block, target.register, data);
        self.i2c
            .write(target.device, &[target.register, data])
            .await?;
        Ok(())
    }

    /// Reads the weekday register of `alarm`.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if the bus transaction fails.
    pub async fn alarm_weekday(
        &mut self,
        alarm: Alarm,
    ) -> Result<AlarmWeekday, MCP794xxError<I2C::Error>> {
        let register = RegAddr::Alarm0Weekday.for_alarm(alarm);
        Ok(AlarmWeekday(self.read_register(Block::Clock, register).await?))
    }

    /// Writes the weekday register of `alarm`.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if the bus transaction fails.
    pub async fn set_alarm_weekday(
        &mut self,
        alarm: Alarm,
        value: AlarmWeekday,
    ) -> Result<(), MCP794xxError<I2C::Error>> {
        let register = RegAddr::Alarm0Weekday.for_alarm(alarm);
        self.write_register(Block::Clock, register, value.into())
            .await
    }

    /// Reads the current time, one register at a time.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] on a bus failure, or
    /// [`MCP794xxError::Calendar`] if the month register holds garbage.
    pub async fn read_time(&mut self) -> Result<BrokenDownTime, MCP794xxError<I2C::Error>> {
        let data = self.read_raw_time().await?;
        let time = RtcDateTime::from(data)
            .into_time()
            .map_err(MCP794xxError::Calendar)?;
        debug!("read time {:?}", time);
        self.last_read = Some(time);
        Ok(time)
    }

    /// Normalizes and writes `time`, starting the oscillator. Returns the time
    /// that was actually written.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::Calendar`] before any write if the time cannot
    /// be stored, or [`MCP794xxError::I2c`] on a bus failure.
    pub async fn write_time(
        &mut self,
        time: &BrokenDownTime,
    ) -> Result<BrokenDownTime, MCP794xxError<I2C::Error>> {
        let time = normalize(time).map_err(MCP794xxError::Calendar)?;
        let mut raw = RtcDateTime::from_time(&time).map_err(MCP794xxError::Calendar)?;

        let current = self.weekday().await?;
        raw.weekday.set_backup_supply(current.backup_supply());
        debug!("write time {:?}", time);

        let data: [u8; 7] = (&raw).into();
        self.write_raw_time(&data).await?;
        Ok(time)
    }

    /// Reads the seven time-keeping registers as stored.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if a bus transaction fails.
    pub async fn read_raw_time(&mut self) -> Result<[u8; 7], MCP794xxError<I2C::Error>> {
        let mut data = [0; 7];
        for (register, byte) in (RegAddr::Seconds as u8..).zip(data.iter_mut()) {
            *byte = self.read_register(Block::Clock, register).await?;
        }
        Ok(data)
    }

    /// Writes the seven time-keeping registers verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if a bus transaction fails.
    pub async fn write_raw_time(
        &mut self,
        data: &[u8; 7],
    ) -> Result<(), MCP794xxError<I2C::Error>> {
        for (register, value) in (RegAddr::Seconds as u8..).zip(data.iter().copied()) {
            self.write_register(Block::Clock, register, value).await?;
        }
        Ok(())
    }

    /// Reads the current time as seconds since 1970-01-01.
    ///
    /// # Errors
    ///
    /// See [`read_time`](Self::read_time).
    pub async fn time(&mut self) -> Result<EpochTime, MCP794xxError<I2C::Error>> {
        let time = self.read_time().await?;
        to_epoch(&time).map_err(MCP794xxError::Calendar)
    }

    /// Sets the clock from seconds since 1970-01-01.
    ///
    /// # Errors
    ///
    /// See [`write_time`](Self::write_time). Negative values are rejected.
    pub async fn set_time_epoch(
        &mut self,
        epoch: EpochTime,
    ) -> Result<(), MCP794xxError<I2C::Error>> {
        let time = from_epoch(epoch).map_err(MCP794xxError::Calendar)?;
        self.write_time(&time).await?;
        Ok(())
    }

    /// Reads the current time as a chrono `NaiveDateTime`.
    ///
    /// # Errors
    ///
    /// See [`read_time`](Self::read_time).
    pub async fn datetime(&mut self) -> Result<NaiveDateTime, MCP794xxError<I2C::Error>> {
        let time = self.read_time().await?;
        time.to_naive_datetime().map_err(MCP794xxError::Calendar)
    }

    /// Sets the clock from a chrono `NaiveDateTime`.
    ///
    /// # Errors
    ///
    /// See [`write_time`](Self::write_time).
    pub async fn set_datetime(
        &mut self,
        datetime: &NaiveDateTime,
    ) -> Result<(), MCP794xxError<I2C::Error>> {
        let time = BrokenDownTime::try_from(datetime).map_err(MCP794xxError::Calendar)?;
        self.write_time(&time).await?;
        Ok(())
    }

    /// Whether the oscillator is running and stable.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if the bus transaction fails.
    pub async fn is_oscillator_running(&mut self) -> Result<bool, MCP794xxError<I2C::Error>> {
        Ok(self.weekday().await?.oscillator_running())
    }

    /// Whether primary power was lost since the time was last written.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if the bus transaction fails.
    pub async fn has_power_failed(&mut self) -> Result<bool, MCP794xxError<I2C::Error>> {
        Ok(self.weekday().await?.power_failed())
    }

    /// Enables or disables the backup supply input.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if a bus transaction fails.
    pub async fn set_backup_supply(
        &mut self,
        enable: bool,
    ) -> Result<(), MCP794xxError<I2C::Error>> {
        let mut weekday = self.weekday().await?;
        weekday.set_backup_supply(enable);
        debug!("backup supply {}", enable);
        self.set_weekday(weekday).await
    }

    /// Sets or clears the enable bit of `alarm`.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if a bus transaction fails.
    pub async fn set_alarm_enable(
        &mut self,
        alarm: Alarm,
        enable: bool,
    ) -> Result<(), MCP794xxError<I2C::Error>> {
        let mut control = self.control().await?;
        control.set_alarm_enable(alarm, enable);
        self.set_control(control).await
    }

    /// Configures an alarm. See [`crate::MCP794xx::configure_alarm`].
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::Calendar`] before any write if a target field
    /// is out of range, or [`MCP794xxError::I2c`] on a bus failure.
    pub async fn configure_alarm(
        &mut self,
        config: &AlarmConfig,
    ) -> Result<(), MCP794xxError<I2C::Error>> {
        debug!("configure alarm {:?}", config);
        match &config.target {
            Some(target) => {
                let registers = AlarmRegisters::from_target(target, config.mode, config.mask)
                    .map_err(MCP794xxError::Calendar)?;
                for (register, value) in registers.writes(config.alarm) {
                    self.write_register(Block::Clock, register, value).await?;
                }
            }
            None => {
                let mut weekday = self.alarm_weekday(config.alarm).await?;
                weekday.set_triggered(false);
                self.set_alarm_weekday(config.alarm, weekday).await?;
            }
        }
        self.set_alarm_enable(config.alarm, config.enabled).await
    }

    /// Whether `alarm` has matched since its flag was last cleared.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if the bus transaction fails.
    pub async fn is_alarm_triggered(
        &mut self,
        alarm: Alarm,
    ) -> Result<bool, MCP794xxError<I2C::Error>> {
        Ok(self.alarm_weekday(alarm).await?.triggered())
    }

    /// Clears the interrupt flag of `alarm` and sets its enable bit to
    /// `reenable`.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if a bus transaction fails.
    pub async fn clear_alarm(
        &mut self,
        alarm: Alarm,
        reenable: bool,
    ) -> Result<(), MCP794xxError<I2C::Error>> {
        self.set_alarm_enable(alarm, reenable).await?;
        let mut weekday = self.alarm_weekday(alarm).await?;
        weekday.set_triggered(false);
        self.set_alarm_weekday(alarm, weekday).await
    }

    /// Configures the multi-function pin.
    ///
    /// # Errors
    ///
    /// Returns [`MCP794xxError::I2c`] if a bus transaction fails.
    pub async fn configure_output(
        &mut self,
        config: &OutputConfig,
    ) -> Result<(), MCP794xxError<I2C::Error>> {
        let control = config.apply(self.control().await?);
        debug!("control: {:?}", control);
        self.set_control(control).await
    }
}

// Block shorthands and typed clock register accessors
macro_rules! impl_register_access {
    (
        blocks: [$(($block_name:ident, $block:expr)),+],
        registers: [$(($name:ident, $regaddr:expr, $typ:ty)),+]
    ) => {
        impl<I2C: I2c> MCP794xx<I2C> {
            $(
                paste! {
                    #[doc = concat!("Reads one byte of the ", stringify!($block_name), " block.")]
                    pub async fn [<read_ $block_name>](&mut self, address: u8) -> Result<u8, MCP794xxError<I2C::Error>> {
                        self.read_register($block, address).await
                    }

                    #[doc = concat!("Writes one byte of the ", stringify!($block_name), " block.")]
                    pub async fn [<write_ $block_name>](&mut self, address: u8, data: u8) -> Result<(), MCP794xxError<I2C::Error>> {
                        self.write_register($block, address, data).await
                    }
                }
            )+
            $(
                paste! {
                    #[doc = concat!("Reads the ", stringify!($name), " register.")]
                    pub async fn $name(&mut self) -> Result<$typ, MCP794xxError<I2C::Error>> {
                        Ok(<$typ>::from(self.read_register(Block::Clock, $regaddr as u8).await?))
                    }

                    #[doc = concat!("Writes the ", stringify!($name), " register.")]
                    pub async fn [<set_ $name>](&mut self, value: $typ) -> Result<(), MCP794xxError<I2C::Error>> {
                        self.write_register(Block::Clock, $regaddr as u8, value.into()).await
                    }
                }
            )+
        }
    }
}

impl_register_access!(
    blocks: [(ram, Block::Ram), (eeprom, Block::Eeprom), (uid, Block::Uid)],
    registers: [
        (seconds, RegAddr::Seconds, Seconds),
        (minutes, RegAddr::Minutes, Minutes),
        (hours, RegAddr::Hours, Hours),
        (weekday, RegAddr::Weekday, Weekday),
        (date, RegAddr::Date, Date),
        (month, RegAddr::Month, Month),
        (year, RegAddr::Year, Year),
        (control, RegAddr::Control, Control)
    ]
);
