//! Calendar hierarchy parsing (`YYYY/MM/DD`, `YYYY-MM`, `YYYY-MM-DD ...`)

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::error::WalkError;

static FULL_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})(?:-(\d{1,2})(?:-(\d{1,2}))?)?(?:$|[^\d-])").expect("calendar token regex")
});

static SHORT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})(?:$|[^\d])").expect("calendar token regex"));

/// A date known to year, month or day precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CalendarDate {
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl CalendarDate {
    #[must_use]
    pub const fn year(year: i32) -> Self {
        Self {
            year,
            month: None,
            day: None,
        }
    }

    #[must_use]
    pub const fn month(year: i32, month: u32) -> Self {
        Self {
            year,
            month: Some(month),
            day: None,
        }
    }

    #[must_use]
    pub const fn day(year: i32, month: u32, day: u32) -> Self {
        Self {
            year,
            month: Some(month),
            day: Some(day),
        }
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.day.is_some()
    }

    /// First day covered by this date.
    #[must_use]
    pub fn to_naive(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month.unwrap_or(1), self.day.unwrap_or(1))
    }

    /// Last day covered by this date.
    #[must_use]
    pub fn last_naive(&self) -> Option<NaiveDate> {
        match (self.month, self.day) {
            (Some(m), Some(d)) => NaiveDate::from_ymd_opt(self.year, m, d),
            (Some(12), None) => NaiveDate::from_ymd_opt(self.year, 12, 31),
            (Some(m), None) => NaiveDate::from_ymd_opt(self.year, m + 1, 1)?.pred_opt(),
            (None, _) => NaiveDate::from_ymd_opt(self.year, 12, 31),
        }
    }

    /// Parse a complete `YYYY`, `YYYY-MM` or `YYYY-MM-DD` string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let caps = FULL_TOKEN.captures(s)?;
        let end = caps.get(3).or_else(|| caps.get(2)).or_else(|| caps.get(1))?.end();
        if end != s.len() {
            return None;
        }
        let year = caps[1].parse().ok()?;
        let month = caps.get(2).map(|m| m.as_str().parse()).transpose().ok()?;
        let day = caps.get(3).map(|d| d.as_str().parse()).transpose().ok()?;
        Self { year, month, day }.validate().ok()
    }

    fn validate(self) -> Result<Self, String> {
        if let Some(m) = self.month
            && !(1..=12).contains(&m)
        {
            return Err(format!("month {m} out of range"));
        }
        if self.to_naive().is_none() {
            return Err(format!("{self} is not a valid date"));
        }
        Ok(self)
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.year)?;
        if let Some(m) = self.month {
            write!(f, "-{m:02}")?;
        }
        if let Some(d) = self.day {
            write!(f, "-{d:02}")?;
        }
        Ok(())
    }
}

/// Outcome of parsing one calendar segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSegment {
    pub date: CalendarDate,
    /// Set when the segment disagreed with its parents; `date` is then the
    /// best available reading.
    pub mismatch: Option<String>,
}

/// Parse a `YYYY` / `YYYY-MM` / `YYYY-MM-DD` token, or a bare `MM` / `DD`
/// continuing the parent's date.
///
/// # Errors
/// Returns `WalkError::InvalidCalendar` when the name carries no usable date.
pub fn parse_segment(
    name: &str,
    parent: Option<CalendarDate>,
    path: &Path,
) -> Result<ParsedSegment, WalkError> {
    let invalid = |reason: String| WalkError::InvalidCalendar {
        path: path.to_path_buf(),
        reason,
    };

    if let Some(caps) = FULL_TOKEN.captures(name) {
        let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
        let year = caps[1].parse::<i32>().map_err(|e| invalid(e.to_string()))?;
        let own = CalendarDate {
            year,
            month: num(2),
            day: num(3),
        }
        .validate()
        .map_err(invalid)?;
        return Ok(reconcile(own, parent));
    }

    if let Some(caps) = SHORT_TOKEN.captures(name) {
        let n: u32 = caps[1].parse().map_err(|e: std::num::ParseIntError| invalid(e.to_string()))?;
        let Some(parent) = parent else {
            return Err(invalid("no year above this segment".to_string()));
        };
        let date = match (parent.month, parent.day) {
            (None, _) => CalendarDate::month(parent.year, n),
            (Some(m), None) => CalendarDate::day(parent.year, m, n),
            (Some(_), Some(_)) => {
                return Ok(ParsedSegment {
                    date: parent,
                    mismatch: Some(format!("date {parent} is already complete")),
                });
            }
        };
        return date
            .validate()
            .map(|date| ParsedSegment { date, mismatch: None })
            .map_err(invalid);
    }

    Err(invalid("expected YYYY, YYYY-MM, YYYY-MM-DD, MM or DD".to_string()))
}

fn reconcile(own: CalendarDate, parent: Option<CalendarDate>) -> ParsedSegment {
    let Some(parent) = parent else {
        return ParsedSegment {
            date: own,
            mismatch: None,
        };
    };
    if own.year != parent.year {
        return ParsedSegment {
            date: own,
            mismatch: Some(format!("year {} below {}", own.year, parent)),
        };
    }
    match (parent.month, own.month) {
        (Some(pm), Some(om)) if pm != om => ParsedSegment {
            date: own,
            mismatch: Some(format!("month {om:02} below {parent}")),
        },
        (Some(_), None) => ParsedSegment {
            date: parent,
            mismatch: Some(format!("missing month below {parent}")),
        },
        _ => match (parent.day, own.day) {
            (Some(pd), Some(od)) if pd != od => ParsedSegment {
                date: own,
                mismatch: Some(format!("day {od:02} below {parent}")),
            },
            (Some(_), None) => ParsedSegment {
                date: parent,
                mismatch: Some(format!("missing day below {parent}")),
            },
            _ => ParsedSegment {
                date: own,
                mismatch: None,
            },
        },
    }
}
