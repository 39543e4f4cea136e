use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Bar granularity for historical series.
///
/// The string form is the Yahoo-style code used on the HTTP API and in
/// downloaded file names (`1d`, `1wk`, `1mo`, `5m`, ...).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Interval {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Intraday(IntradayStep),
}

/// Intraday bar width.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntradayStep {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    SixtyMinutes,
}

impl Interval {
    /// Canonical code (`1d`, `1wk`, `1mo`, `1m`, `5m`, `15m`, `30m`, `60m`).
    pub fn code(&self) -> &'static str {
        match self {
            Self::Daily => "1d",
            Self::Weekly => "1wk",
            Self::Monthly => "1mo",
            Self::Intraday(IntradayStep::OneMinute) => "1m",
            Self::Intraday(IntradayStep::FiveMinutes) => "5m",
            Self::Intraday(IntradayStep::FifteenMinutes) => "15m",
            Self::Intraday(IntradayStep::ThirtyMinutes) => "30m",
            Self::Intraday(IntradayStep::SixtyMinutes) => "60m",
        }
    }

    pub fn is_intraday(&self) -> bool {
        matches!(self, Self::Intraday(_))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error returned for an interval code outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown interval: {0}")]
pub struct UnknownInterval(pub String);

impl FromStr for Interval {
    type Err = UnknownInterval;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let interval = match s.trim().to_ascii_lowercase().as_str() {
            "1d" => Self::Daily,
            "1wk" | "1w" => Self::Weekly,
            "1mo" => Self::Monthly,
            "1m" => Self::Intraday(IntradayStep::OneMinute),
            "5m" => Self::Intraday(IntradayStep::FiveMinutes),
            "15m" => Self::Intraday(IntradayStep::FifteenMinutes),
            "30m" => Self::Intraday(IntradayStep::ThirtyMinutes),
            "60m" | "1h" => Self::Intraday(IntradayStep::SixtyMinutes),
            _ => return Err(UnknownInterval(s.to_string())),
        };
        Ok(interval)
    }
}

impl TryFrom<String> for Interval {
    type Error = UnknownInterval;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.code().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_calendar_intervals() {
        assert_eq!("1d".parse::<Interval>().unwrap(), Interval::Daily);
        assert_eq!("1wk".parse::<Interval>().unwrap(), Interval::Weekly);
        assert_eq!("1mo".parse::<Interval>().unwrap(), Interval::Monthly);
    }

    #[test]
    fn test_parse_intraday_aliases() {
        assert_eq!(
            "1h".parse::<Interval>().unwrap(),
            Interval::Intraday(IntradayStep::SixtyMinutes)
        );
        assert_eq!(
            "60m".parse::<Interval>().unwrap(),
            Interval::Intraday(IntradayStep::SixtyMinutes)
        );
        assert_eq!(
            " 5M ".parse::<Interval>().unwrap(),
            Interval::Intraday(IntradayStep::FiveMinutes)
        );
    }

    #[test]
    fn test_parse_unknown() {
        let err = "3d".parse::<Interval>().unwrap_err();
        assert_eq!(err, UnknownInterval("3d".to_string()));
        assert_eq!(err.to_string(), "Unknown interval: 3d");
    }

    #[test]
    fn test_code_matches_parse() {
        for code in ["1d", "1wk", "1mo", "1m", "5m", "15m", "30m", "60m"] {
            assert_eq!(code.parse::<Interval>().unwrap().code(), code);
        }
    }

    #[test]
    fn test_serde_uses_code() {
        let json = serde_json::to_string(&Interval::Weekly).unwrap();
        assert_eq!(json, "\"1wk\"");
        let parsed: Interval = serde_json::from_str("\"15m\"").unwrap();
        assert_eq!(parsed, Interval::Intraday(IntradayStep::FifteenMinutes));
    }
}
