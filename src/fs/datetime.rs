//! Packed FAT date and time fields.
//!
//! Time: bits 15-11 hour, 10-5 minute, 4-0 seconds / 2.
//! Date: bits 15-9 years since 1980, 8-5 month, 4-0 day.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct FatDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl FatDate {
    pub fn decode(date: u16) -> Self {
        FatDate {
            year: 1980 + ((date >> 9) & 0x7F),
            month: ((date >> 5) & 0x0F) as u8,
            day: (date & 0x1F) as u8,
        }
    }
}

impl fmt::Display for FatDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct FatTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl FatTime {
    pub fn decode(time: u16) -> Self {
        FatTime {
            hour: ((time >> 11) & 0x1F) as u8,
            minute: ((time >> 5) & 0x3F) as u8,
            second: ((time & 0x1F) * 2) as u8,
        }
    }
}

impl fmt::Display for FatTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct FatDateTime {
    pub date: FatDate,
    pub time: FatTime,
}

impl FatDateTime {
    pub fn decode(date: u16, time: u16) -> Self {
        FatDateTime { date: FatDate::decode(date), time: FatTime::decode(time) }
    }

    /// Creation stamps carry an extra 0..199 count of 10ms units.
    pub fn decode_with_tenths(date: u16, time: u16, tenths: u8) -> Self {
        let mut stamp = Self::decode(date, time);
        stamp.time.second = stamp.time.second.saturating_add(tenths / 100);
        stamp
    }
}

impl fmt::Display for FatDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_packed_fields() {
        // 2024-03-15 13:45:30
        let date = ((2024 - 1980) << 9) | (3 << 5) | 15;
        let time = (13 << 11) | (45 << 5) | 15;
        let stamp = FatDateTime::decode(date, time);
        assert_eq!(stamp.date, FatDate { year: 2024, month: 3, day: 15 });
        assert_eq!(stamp.time, FatTime { hour: 13, minute: 45, second: 30 });
        assert_eq!(stamp.to_string(), "2024-03-15 13:45:30");
    }

    #[test]
    fn tenths_add_odd_second() {
        let time = 15; // 30 seconds
        let stamp = FatDateTime::decode_with_tenths(0x21, time, 150);
        assert_eq!(stamp.time.second, 31);
        assert_eq!(stamp.date.to_string(), "1980-01-01");
    }
}
