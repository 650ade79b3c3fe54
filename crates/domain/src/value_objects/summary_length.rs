//! Requested summary length

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Length target for a summary: a named preset or an explicit character count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Long,
    Xl,
    Xxl,
    Chars(u32),
}

impl SummaryLength {
    /// Smallest explicit character target accepted
    pub const MIN_CHARS: u32 = 50;

    /// Approximate number of output characters to aim for
    pub const fn target_chars(&self) -> u32 {
        match self {
            Self::Short => 900,
            Self::Medium => 1_800,
            Self::Long => 4_200,
            Self::Xl => 9_000,
            Self::Xxl => 17_000,
            Self::Chars(n) => *n,
        }
    }
}

impl fmt::Display for SummaryLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short => f.write_str("short"),
            Self::Medium => f.write_str("medium"),
            Self::Long => f.write_str("long"),
            Self::Xl => f.write_str("xl"),
            Self::Xxl => f.write_str("xxl"),
            Self::Chars(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for SummaryLength {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_ascii_lowercase();
        match trimmed.as_str() {
            "short" | "s" => Ok(Self::Short),
            "medium" | "m" => Ok(Self::Medium),
            "long" | "l" => Ok(Self::Long),
            "xl" => Ok(Self::Xl),
            "xxl" => Ok(Self::Xxl),
            other => {
                let digits = other.strip_suffix("chars").unwrap_or(other).trim();
                match digits.parse::<u32>() {
                    Ok(n) if n >= Self::MIN_CHARS => Ok(Self::Chars(n)),
                    _ => Err(DomainError::InvalidLength(s.to_string())),
                }
            },
        }
    }
}

impl TryFrom<String> for SummaryLength {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SummaryLength> for String {
    fn from(value: SummaryLength) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_presets() {
        assert_eq!("short".parse::<SummaryLength>().unwrap(), SummaryLength::Short);
        assert_eq!("XL".parse::<SummaryLength>().unwrap(), SummaryLength::Xl);
    }

    #[test]
    fn parses_explicit_chars() {
        assert_eq!(
            "1500".parse::<SummaryLength>().unwrap(),
            SummaryLength::Chars(1500)
        );
        assert_eq!(
            "600chars".parse::<SummaryLength>().unwrap(),
            SummaryLength::Chars(600)
        );
    }

    #[test]
    fn rejects_tiny_or_garbage() {
        assert!("10".parse::<SummaryLength>().is_err());
        assert!("enormous".parse::<SummaryLength>().is_err());
    }

    #[test]
    fn default_is_medium() {
        assert_eq!(SummaryLength::default(), SummaryLength::Medium);
        assert_eq!(SummaryLength::default().target_chars(), 1_800);
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&SummaryLength::Chars(700)).unwrap();
        assert_eq!(json, "\"700\"");
        let parsed: SummaryLength = serde_json::from_str("\"long\"").unwrap();
        assert_eq!(parsed, SummaryLength::Long);
    }
}
