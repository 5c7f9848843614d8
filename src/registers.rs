//! Register definitions and bitfield structures for the MCP794xx RTC.
//!
//! The package answers on two I2C addresses. The clock/control registers and
//! the battery-backed SRAM live behind [`CLOCK_DEVICE_ADDRESS`], the EEPROM and
//! the factory unique-ID block behind [`EEPROM_DEVICE_ADDRESS`]. A
//! (block, relative address) pair is resolved into a physical
//! [`RegisterAddress`] by [`RegisterAddress::resolve`].

use bitfield::bitfield;

use crate::alarm::Alarm;

/// 7-bit I2C address of the clock and SRAM (0xDE/0xDF on the wire).
pub const CLOCK_DEVICE_ADDRESS: u8 = 0x6F;
/// 7-bit I2C address of the EEPROM and unique-ID block (0xAE/0xAF on the wire).
pub const EEPROM_DEVICE_ADDRESS: u8 = 0x57;

/// Unlock sequence written to [`RegAddr::EeUnlock`] before a unique-ID write.
pub const UID_UNLOCK_SEQUENCE: [u8; 2] = [0x55, 0xAA];

/// Clock block register addresses.
#[allow(unused)]
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegAddr {
    /// Seconds register with oscillator start bit
    Seconds = 0x00,
    /// Minutes register (0-59)
    Minutes = 0x01,
    /// Hours register (0-23)
    Hours = 0x02,
    /// Weekday register with status and battery control bits
    Weekday = 0x03,
    /// Date register (1-31)
    Date = 0x04,
    /// Month register (1-12) with leap year flag
    Month = 0x05,
    /// Year register (0-99)
    Year = 0x06,
    /// Control register
    Control = 0x07,
    /// Oscillator digital trim
    OscTrim = 0x08,
    /// Unique-ID unlock register
    EeUnlock = 0x09,
    /// Alarm 0 seconds
    Alarm0Seconds = 0x0A,
    /// Alarm 0 minutes
    Alarm0Minutes = 0x0B,
    /// Alarm 0 hours
    Alarm0Hours = 0x0C,
    /// Alarm 0 weekday, mask, polarity and interrupt flag
    Alarm0Weekday = 0x0D,
    /// Alarm 0 date
    Alarm0Date = 0x0E,
    /// Alarm 0 month
    Alarm0Month = 0x0F,
    /// Alarm 1 seconds
    Alarm1Seconds = 0x11,
    /// Alarm 1 minutes
    Alarm1Minutes = 0x12,
    /// Alarm 1 hours
    Alarm1Hours = 0x13,
    /// Alarm 1 weekday, mask, polarity and interrupt flag
    Alarm1Weekday = 0x14,
    /// Alarm 1 date
    Alarm1Date = 0x15,
    /// Alarm 1 month
    Alarm1Month = 0x16,
    /// Power-down timestamp minutes
    PowerDownMinutes = 0x18,
    /// Power-down timestamp hours
    PowerDownHours = 0x19,
    /// Power-down timestamp date
    PowerDownDate = 0x1A,
    /// Power-down timestamp month
    PowerDownMonth = 0x1B,
    /// Power-up timestamp minutes
    PowerUpMinutes = 0x1C,
    /// Power-up timestamp hours
    PowerUpHours = 0x1D,
    /// Power-up timestamp date
    PowerUpDate = 0x1E,
    /// Power-up timestamp month
    PowerUpMonth = 0x1F,
}

impl RegAddr {
    /// Returns the register of `alarm`'s block that corresponds to this alarm
    /// 0 register. Alarm 1 registers sit 7 bytes above alarm 0.
    #[must_use]
    pub(crate) fn for_alarm(self, alarm: Alarm) -> u8 {
        self as u8 + alarm.register_offset()
    }
}

/// Logical memory blocks of the device.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Block {
    /// Time-keeping, control and alarm registers (0x00-0x1F)
    Clock,
    /// Battery-backed SRAM (64 bytes at 0x20)
    Ram,
    /// EEPROM (128 bytes)
    Eeprom,
    /// Protected unique-ID block (8 bytes at 0xF0)
    Uid,
}

impl Block {
    /// Mask applied to relative addresses in this block.
    #[must_use]
    pub const fn address_mask(self) -> u8 {
        match self {
            Block::Clock => 0x1F,
            Block::Ram => 0x3F,
            Block::Eeprom => 0x7F,
            Block::Uid => 0x07,
        }
    }

    /// Offset added to the masked relative address.
    #[must_use]
    pub const fn base(self) -> u8 {
        match self {
            Block::Clock | Block::Eeprom => 0x00,
            Block::Ram => 0x20,
            Block::Uid => 0xF0,
        }
    }

    /// I2C address of the device that holds this block.
    #[must_use]
    pub const fn device_address(self) -> u8 {
        match self {
            Block::Clock | Block::Ram => CLOCK_DEVICE_ADDRESS,
            Block::Eeprom | Block::Uid => EEPROM_DEVICE_ADDRESS,
        }
    }

    /// Whether writes must be preceded by the unlock sequence.
    #[must_use]
    pub const fn write_protected(self) -> bool {
        matches!(self, Block::Uid)
    }
}

/// A resolved physical register location.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterAddress {
    /// 7-bit I2C device address
    pub device: u8,
    /// Absolute register address on that device
    pub register: u8,
}

impl RegisterAddress {
    /// Resolves a relative address inside `block`.
    ///
    /// Out-of-range addresses wrap silently through the block mask.
    #[must_use]
    pub const fn resolve(block: Block, address: u8) -> Self {
        Self {
            device: block.device_address(),
            register: (address & block.address_mask()) + block.base(),
        }
    }
}

/// Multi-function pin square wave frequency.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SquareWaveFrequency {
    /// 1 Hz
    Hz1 = 0b00,
    /// 4.096 kHz
    Hz4096 = 0b01,
    /// 8.192 kHz
    Hz8192 = 0b10,
    /// 32.768 kHz
    Hz32768 = 0b11,
}
impl From<u8> for SquareWaveFrequency {
    /// Creates a `SquareWaveFrequency` from the two frequency select bits.
    fn from(v: u8) -> Self {
        match v & 0b11 {
            0b00 => SquareWaveFrequency::Hz1,
            0b01 => SquareWaveFrequency::Hz4096,
            0b10 => SquareWaveFrequency::Hz8192,
            _ => SquareWaveFrequency::Hz32768,
        }
    }
}
impl From<SquareWaveFrequency> for u8 {
    fn from(v: SquareWaveFrequency) -> Self {
        v as u8
    }
}

/// Fields compared by an alarm.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmMask {
    /// Seconds match
    Second = 0b000,
    /// Minutes match
    Minute = 0b001,
    /// Hours match
    Hour = 0b010,
    /// Day of week match
    Weekday = 0b011,
    /// Date match
    Date = 0b100,
    /// Seconds, minutes, hours, day of week, date and month match
    All = 0b111,
}
impl From<u8> for AlarmMask {
    /// Creates an `AlarmMask` from the three mask bits. The reserved
    /// encodings 0b101 and 0b110 read back as [`AlarmMask::All`].
    fn from(v: u8) -> Self {
        match v & 0b111 {
            0b000 => AlarmMask::Second,
            0b001 => AlarmMask::Minute,
            0b010 => AlarmMask::Hour,
            0b011 => AlarmMask::Weekday,
            0b100 => AlarmMask::Date,
            _ => AlarmMask::All,
        }
    }
}
impl From<AlarmMask> for u8 {
    fn from(v: AlarmMask) -> Self {
        v as u8
    }
}

/// How the alarm output combines with the general purpose output level.
///
/// `And` drives the pin low on a match (active low), `Nor` drives it high
/// (active high).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmMode {
    /// Active-low output
    And = 0,
    /// Active-high output
    Nor = 1,
}
impl AlarmMode {
    /// Alias of [`AlarmMode::And`].
    pub const ACTIVE_LOW: AlarmMode = AlarmMode::And;
    /// Alias of [`AlarmMode::Nor`].
    pub const ACTIVE_HIGH: AlarmMode = AlarmMode::Nor;
}
impl From<u8> for AlarmMode {
    fn from(v: u8) -> Self {
        if v & 1 == 0 {
            AlarmMode::And
        } else {
            AlarmMode::Nor
        }
    }
}
impl From<AlarmMode> for u8 {
    fn from(v: AlarmMode) -> Self {
        v as u8
    }
}

// This macro generates the From<u8> and Into<u8> implementations for the
// register type
macro_rules! from_register_u8 {
    ($typ:ty) => {
        impl From<u8> for $typ {
            fn from(v: u8) -> Self {
                paste::paste!([< $typ >](v))
            }
        }
        impl From<$typ> for u8 {
            fn from(v: $typ) -> Self {
                v.0
            }
        }
    };
}

bitfield! {
    /// Seconds register (0-59) with oscillator start bit.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Seconds(u8);
    impl Debug;
    /// Start oscillator (ST)
    pub start_oscillator, set_start_oscillator: 7;
    /// BCD seconds
    pub bcd, set_bcd: 6, 0;
}
from_register_u8!(Seconds);

bitfield! {
    /// Minutes register (0-59).
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Minutes(u8);
    impl Debug;
    /// BCD minutes
    pub bcd, set_bcd: 6, 0;
}
from_register_u8!(Minutes);

bitfield! {
    /// Hours register, always used in 24-hour format by this driver.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Hours(u8);
    impl Debug;
    /// 12-hour format select
    pub twelve_hour, set_twelve_hour: 6;
    /// BCD hours (24-hour format)
    pub bcd, set_bcd: 5, 0;
}
from_register_u8!(Hours);

bitfield! {
    /// Weekday register (1-7) with oscillator status, power-fail flag and
    /// battery enable.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Weekday(u8);
    impl Debug;
    /// Oscillator running and stable (OSCRUN, read-only)
    pub oscillator_running, _: 5;
    /// Primary power was lost (PWRFAIL)
    pub power_failed, set_power_failed: 4;
    /// Backup supply enable (VBATEN)
    pub backup_supply, set_backup_supply: 3;
    /// Day of week (1-7)
    pub weekday, set_weekday: 2, 0;
}
from_register_u8!(Weekday);

bitfield! {
    /// Date register (1-31).
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Date(u8);
    impl Debug;
    /// BCD date
    pub bcd, set_bcd: 5, 0;
}
from_register_u8!(Date);

bitfield! {
    /// Month register (1-12) with leap year flag.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Month(u8);
    impl Debug;
    /// Current year is a leap year (LPYR, read-only)
    pub leap_year, _: 5;
    /// BCD month
    pub bcd, set_bcd: 4, 0;
}
from_register_u8!(Month);

bitfield! {
    /// Year register (0-99).
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Year(u8);
    impl Debug;
    /// BCD year
    pub bcd, set_bcd: 7, 0;
}
from_register_u8!(Year);

bitfield! {
    /// Control register.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Control(u8);
    impl Debug;
    /// MFP static output level (OUT)
    pub output_level, set_output_level: 7;
    /// Square wave output enable (SQWEN)
    pub square_wave, set_square_wave: 6;
    /// Alarm 1 enable (ALM1EN)
    pub alarm1_enable, set_alarm1_enable: 5;
    /// Alarm 0 enable (ALM0EN)
    pub alarm0_enable, set_alarm0_enable: 4;
    /// External oscillator input (EXTOSC)
    pub external_oscillator, set_external_oscillator: 3;
    /// Coarse trim mode (CRSTRIM)
    pub coarse_trim, set_coarse_trim: 2;
    /// Square wave frequency select (SQWFS)
    pub from into SquareWaveFrequency, square_wave_frequency, set_square_wave_frequency: 1, 0;
}
from_register_u8!(Control);

bitfield! {
    /// Alarm weekday register: polarity, mask, interrupt flag and weekday.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct AlarmWeekday(u8);
    impl Debug;
    /// Output polarity (ALMPOL)
    pub from into AlarmMode, mode, set_mode: 7, 7;
    /// Compared fields (ALMMSK)
    pub from into AlarmMask, mask, set_mask: 6, 4;
    /// Alarm matched (ALMIF)
    pub triggered, set_triggered: 3;
    /// Day of week (1-7)
    pub weekday, set_weekday: 2, 0;
}
from_register_u8!(AlarmWeekday);

impl Control {
    /// Whether `alarm` is enabled.
    #[must_use]
    pub fn alarm_enable(&self, alarm: Alarm) -> bool {
        match alarm {
            Alarm::Alarm0 => self.alarm0_enable(),
            Alarm::Alarm1 => self.alarm1_enable(),
        }
    }

    /// Enables or disables `alarm`, leaving every other bit untouched.
    pub fn set_alarm_enable(&mut self, alarm: Alarm, enable: bool) {
        match alarm {
            Alarm::Alarm0 => self.set_alarm0_enable(enable),
            Alarm::Alarm1 => self.set_alarm1_enable(enable),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Weekday {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Weekday({}", self.weekday());
        if self.oscillator_running() {
            defmt::write!(f, ", OSCRUN");
        }
        if self.power_failed() {
            defmt::write!(f, ", PWRFAIL");
        }
        if self.backup_supply() {
            defmt::write!(f, ", VBATEN");
        }
        defmt::write!(f, ")");
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Control {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Control(OUT={}", self.output_level());
        if self.square_wave() {
            defmt::write!(f, ", square wave {}", self.square_wave_frequency());
        }
        if self.alarm0_enable() {
            defmt::write!(f, ", ALM0EN");
        }
        if self.alarm1_enable() {
            defmt::write!(f, ", ALM1EN");
        }
        if self.external_oscillator() {
            defmt::write!(f, ", EXTOSC");
        }
        if self.coarse_trim() {
            defmt::write!(f, ", CRSTRIM");
        }
        defmt::write!(f, ")");
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AlarmWeekday {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "AlarmWeekday({}, {}, day {}",
            self.mode(),
            self.mask(),
            self.weekday()
        );
        if self.triggered() {
            defmt::write!(f, ", ALMIF");
        }
        defmt::write!(f, ")");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_clock_block() {
        assert_eq!(
            RegisterAddress::resolve(Block::Clock, RegAddr::Control as u8),
            RegisterAddress {
                device: CLOCK_DEVICE_ADDRESS,
                register: 0x07
            }
        );
        // wraps through the 5-bit mask
        assert_eq!(RegisterAddress::resolve(Block::Clock, 0x21).register, 0x01);
    }

    #[test]
    fn test_resolve_ram_block() {
        let addr = RegisterAddress::resolve(Block::Ram, 0x21);
        assert_eq!(addr.device, CLOCK_DEVICE_ADDRESS);
        assert_eq!(addr.register, (0x21 & 0x3F) + 0x20);
        assert_eq!(RegisterAddress::resolve(Block::Ram, 0x3F).register, 0x5F);
        assert_eq!(RegisterAddress::resolve(Block::Ram, 0x40).register, 0x20);
    }

    #[test]
    fn test_resolve_eeprom_block() {
        let addr = RegisterAddress::resolve(Block::Eeprom, 0x7F);
        assert_eq!(addr.device, EEPROM_DEVICE_ADDRESS);
        assert_eq!(addr.register, 0x7F);
        assert_eq!(RegisterAddress::resolve(Block::Eeprom, 0x80).register, 0x00);
    }

    #[test]
    fn test_resolve_uid_block() {
        let addr = RegisterAddress::resolve(Block::Uid, 0x02);
        assert_eq!(addr.device, EEPROM_DEVICE_ADDRESS);
        assert_eq!(addr.register, (0x02 & 0x07) + 0xF0);
        assert_eq!(RegisterAddress::resolve(Block::Uid, 0x0F).register, 0xF7);
        assert!(Block::Uid.write_protected());
        assert!(!Block::Eeprom.write_protected());
        assert!(!Block::Clock.write_protected());
        assert!(!Block::Ram.write_protected());
    }

    #[test]
    fn test_alarm_register_offsets() {
        assert_eq!(RegAddr::Alarm0Weekday.for_alarm(Alarm::Alarm0), 0x0D);
        assert_eq!(
            RegAddr::Alarm0Weekday.for_alarm(Alarm::Alarm1),
            RegAddr::Alarm1Weekday as u8
        );
        assert_eq!(
            RegAddr::Alarm0Month.for_alarm(Alarm::Alarm1),
            RegAddr::Alarm1Month as u8
        );
    }

    #[test]
    fn test_seconds_register_conversions() {
        let seconds = Seconds::from(0xD9);
        assert!(seconds.start_oscillator());
        assert_eq!(seconds.bcd(), 0x59);
        assert_eq!(u8::from(seconds), 0xD9);

        let mut seconds = Seconds::default();
        seconds.set_bcd(0x30);
        seconds.set_start_oscillator(true);
        assert_eq!(u8::from(seconds), 0xB0);
    }

    #[test]
    fn test_hours_register_conversions() {
        let hours = Hours::from(0x23);
        assert!(!hours.twelve_hour());
        assert_eq!(hours.bcd(), 0x23);

        let hours = Hours::from(0x72);
        assert!(hours.twelve_hour());
    }

    #[test]
    fn test_weekday_register_conversions() {
        let weekday = Weekday::from(0x2F);
        assert!(weekday.oscillator_running());
        assert!(!weekday.power_failed());
        assert!(weekday.backup_supply());
        assert_eq!(weekday.weekday(), 7);

        let weekday = Weekday::from(0x11);
        assert!(!weekday.oscillator_running());
        assert!(weekday.power_failed());
        assert!(!weekday.backup_supply());
        assert_eq!(weekday.weekday(), 1);
    }

    #[test]
    fn test_month_register_conversions() {
        let month = Month::from(0x32);
        assert!(month.leap_year());
        assert_eq!(month.bcd(), 0x12);
        let month = Month::from(0x06);
        assert!(!month.leap_year());
        assert_eq!(month.bcd(), 0x06);
    }

    #[test]
    fn test_control_register_conversions() {
        let control = Control::from(0xFF);
        assert!(control.output_level());
        assert!(control.square_wave());
        assert!(control.alarm1_enable());
        assert!(control.alarm0_enable());
        assert!(control.external_oscillator());
        assert!(control.coarse_trim());
        assert_eq!(
            control.square_wave_frequency(),
            SquareWaveFrequency::Hz32768
        );

        let mut control = Control::from(0x00);
        control.set_square_wave_frequency(SquareWaveFrequency::Hz4096);
        control.set_alarm_enable(Alarm::Alarm1, true);
        assert_eq!(u8::from(control), 0x21);
        assert!(control.alarm_enable(Alarm::Alarm1));
        assert!(!control.alarm_enable(Alarm::Alarm0));
        control.set_alarm_enable(Alarm::Alarm1, false);
        assert_eq!(u8::from(control), 0x01);
    }

    #[test]
    fn test_alarm_weekday_register_conversions() {
        let mut reg = AlarmWeekday::default();
        reg.set_mode(AlarmMode::Nor);
        reg.set_mask(AlarmMask::Hour);
        reg.set_weekday(7);
        assert_eq!(u8::from(reg), 0x80 | (0b010 << 4) | 7);

        let reg = AlarmWeekday::from(0x7B);
        assert_eq!(reg.mode(), AlarmMode::And);
        assert_eq!(reg.mask(), AlarmMask::All);
        assert!(reg.triggered());
        assert_eq!(reg.weekday(), 3);
    }

    #[test]
    fn test_enum_conversions() {
        assert_eq!(SquareWaveFrequency::from(0b10), SquareWaveFrequency::Hz8192);
        assert_eq!(u8::from(SquareWaveFrequency::Hz32768), 0b11);
        assert_eq!(AlarmMask::from(0b100), AlarmMask::Date);
        assert_eq!(AlarmMask::from(0b101), AlarmMask::All);
        assert_eq!(u8::from(AlarmMask::Weekday), 0b011);
        assert_eq!(AlarmMode::ACTIVE_HIGH, AlarmMode::Nor);
        assert_eq!(AlarmMode::ACTIVE_LOW, AlarmMode::And);
        assert_eq!(AlarmMode::from(1), AlarmMode::Nor);
    }
}
