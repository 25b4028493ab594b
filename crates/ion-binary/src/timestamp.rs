//! Ion timestamps: a UTC instant with a precision and an optional local offset.

use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Timelike, Utc};

use crate::error::{IonError, IonResult};

/// How many fields of a timestamp are significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimestampPrecision {
    Year,
    Month,
    Day,
    Minute,
    Second,
    /// Fractional seconds with 1..=9 digits.
    Fraction(u8),
}

impl TimestampPrecision {
    /// Whether the time-of-day is present, which is also when an offset applies.
    pub fn has_time(self) -> bool {
        self >= TimestampPrecision::Minute
    }
}

/// An Ion timestamp.
///
/// Fields past the precision are always zero (or one, for month and day).
/// `offset_minutes` is `None` for an unknown local offset (`-00:00`) and for
/// date-only precisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Timestamp {
    utc: NaiveDateTime,
    offset_minutes: Option<i32>,
    precision: TimestampPrecision,
}

const MAX_OFFSET_MINUTES: i32 = 24 * 60;

impl Timestamp {
    /// Builds a timestamp from its UTC fields, truncating everything below
    /// `precision`.
    pub fn new(
        utc: NaiveDateTime,
        offset_minutes: Option<i32>,
        precision: TimestampPrecision,
    ) -> IonResult<Self> {
        if !(1..=9999).contains(&utc.year()) {
            return Err(IonError::InvalidTimestamp);
        }
        if let TimestampPrecision::Fraction(digits) = precision {
            if !(1..=9).contains(&digits) {
                return Err(IonError::InvalidTimestamp);
            }
        }
        let offset_minutes = if precision.has_time() {
            match offset_minutes {
                Some(m) if m.abs() >= MAX_OFFSET_MINUTES => return Err(IonError::InvalidTimestamp),
                other => other,
            }
        } else {
            None
        };
        let utc = truncate(utc, precision).ok_or(IonError::InvalidTimestamp)?;
        Ok(Self {
            utc,
            offset_minutes,
            precision,
        })
    }

    /// Year precision.
    pub fn with_year(year: i32) -> IonResult<Self> {
        Self::with_ymd(year, 1, 1, TimestampPrecision::Year)
    }

    /// Year, month or day precision.
    pub fn with_ymd(year: i32, month: u32, day: u32, precision: TimestampPrecision) -> IonResult<Self> {
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or(IonError::InvalidTimestamp)?;
        let utc = date.and_hms_opt(0, 0, 0).ok_or(IonError::InvalidTimestamp)?;
        Self::new(utc, None, precision.min(TimestampPrecision::Day))
    }

    /// A timestamp at the finest precision that preserves `value` exactly.
    pub fn from_datetime(value: DateTime<FixedOffset>) -> IonResult<Self> {
        let nanos = value.nanosecond().min(999_999_999);
        let precision = match nanos {
            0 => TimestampPrecision::Second,
            n => TimestampPrecision::Fraction(fraction_digits(n)),
        };
        Self::with_precision(value, precision)
    }

    pub fn with_precision(value: DateTime<FixedOffset>, precision: TimestampPrecision) -> IonResult<Self> {
        let offset = value.offset().local_minus_utc() / 60;
        Self::new(value.naive_utc(), Some(offset), precision)
    }

    pub fn precision(&self) -> TimestampPrecision {
        self.precision
    }

    /// Local offset in minutes; `None` when unknown.
    pub fn offset_minutes(&self) -> Option<i32> {
        self.offset_minutes
    }

    /// UTC fields.
    pub fn utc(&self) -> NaiveDateTime {
        self.utc
    }

    /// Fractional seconds as `(digits, coefficient)`, e.g. `.120` is `(3, 120)`.
    pub fn fraction(&self) -> Option<(u8, u32)> {
        match self.precision {
            TimestampPrecision::Fraction(digits) => {
                let scale = 10u32.pow(9 - digits as u32);
                Some((digits, self.utc.nanosecond() / scale))
            }
            _ => None,
        }
    }

    /// The instant with its local offset; an unknown offset maps to UTC.
    pub fn to_datetime(&self) -> DateTime<FixedOffset> {
        let offset = self
            .offset_minutes
            .and_then(|m| FixedOffset::east_opt(m * 60))
            .unwrap_or_else(|| Utc.fix());
        offset.from_utc_datetime(&self.utc)
    }
}

fn truncate(utc: NaiveDateTime, precision: TimestampPrecision) -> Option<NaiveDateTime> {
    let date = utc.date();
    let (month, day) = match precision {
        TimestampPrecision::Year => (1, 1),
        TimestampPrecision::Month => (date.month(), 1),
        _ => (date.month(), date.day()),
    };
    let date = NaiveDate::from_ymd_opt(date.year(), month, day)?;
    let time = utc.time();
    let nanos = time.nanosecond().min(999_999_999);
    match precision {
        TimestampPrecision::Year | TimestampPrecision::Month | TimestampPrecision::Day => date.and_hms_opt(0, 0, 0),
        TimestampPrecision::Minute => date.and_hms_opt(time.hour(), time.minute(), 0),
        TimestampPrecision::Second => date.and_hms_opt(time.hour(), time.minute(), time.second()),
        TimestampPrecision::Fraction(digits) => {
            let scale = 10u32.pow(9 - digits as u32);
            date.and_hms_nano_opt(time.hour(), time.minute(), time.second(), nanos / scale * scale)
        }
    }
}

/// Digits needed to show `nanos` without trailing zeros.
fn fraction_digits(mut nanos: u32) -> u8 {
    let mut digits = 9;
    while digits > 1 && nanos % 10 == 0 {
        nanos /= 10;
        digits -= 1;
    }
    digits
}

impl fmt::Display for Timestamp {
    /// Ion text form, e.g. `2000-11T`, `2000-11-11`, `2000-11-11T11:11:11.5+01:00`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let local = self.to_datetime().naive_local();
        match self.precision {
            TimestampPrecision::Year => return write!(f, "{:04}T", local.year()),
            TimestampPrecision::Month => return write!(f, "{:04}-{:02}T", local.year(), local.month()),
            TimestampPrecision::Day => {
                return write!(f, "{:04}-{:02}-{:02}", local.year(), local.month(), local.day())
            }
            _ => {}
        }
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}",
            local.year(),
            local.month(),
            local.day(),
            local.hour(),
            local.minute()
        )?;
        if self.precision >= TimestampPrecision::Second {
            write!(f, ":{:02}", local.second())?;
        }
        if let Some((digits, coefficient)) = self.fraction() {
            write!(f, ".{:0width$}", coefficient, width = digits as usize)?;
        }
        match self.offset_minutes {
            None => f.write_str("-00:00"),
            Some(0) => f.write_str("Z"),
            Some(m) => {
                let sign = if m < 0 { '-' } else { '+' };
                write!(f, "{}{:02}:{:02}", sign, m.abs() / 60, m.abs() % 60)
            }
        }
    }
}
