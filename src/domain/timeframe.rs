use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::NamingError;

/// Sampling interval of a kline archive. Each variant owns exactly one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeFrame {
    Minute1,
    Minute3,
    Minute5,
    Minute15,
    Minute30,
    Hour1,
    Hour2,
    Hour4,
    Hour6,
    Hour8,
    Hour12,
    Day1,
    Day3,
    Week1,
    Month1,
}

/// Static description of a timeframe: its archive token and its table.
#[derive(Debug)]
pub struct TimeFrameSpec {
    pub interval: &'static str,
    pub table: &'static str,
}

// Indexed by `TimeFrame as usize`; order must follow the enum declaration.
static SPECS: [TimeFrameSpec; 15] = [
    TimeFrameSpec { interval: "1m", table: "minute_1" },
    TimeFrameSpec { interval: "3m", table: "minute_3" },
    TimeFrameSpec { interval: "5m", table: "minute_5" },
    TimeFrameSpec { interval: "15m", table: "minute_15" },
    TimeFrameSpec { interval: "30m", table: "minute_30" },
    TimeFrameSpec { interval: "1h", table: "hour_1" },
    TimeFrameSpec { interval: "2h", table: "hour_2" },
    TimeFrameSpec { interval: "4h", table: "hour_4" },
    TimeFrameSpec { interval: "6h", table: "hour_6" },
    TimeFrameSpec { interval: "8h", table: "hour_8" },
    TimeFrameSpec { interval: "12h", table: "hour_12" },
    TimeFrameSpec { interval: "1d", table: "day_1" },
    TimeFrameSpec { interval: "3d", table: "day_3" },
    TimeFrameSpec { interval: "1w", table: "week_1" },
    TimeFrameSpec { interval: "1mo", table: "month_1" },
];

impl TimeFrame {
    /// Every timeframe in declaration order, shortest interval first.
    pub const ALL: [TimeFrame; 15] = [
        TimeFrame::Minute1,
        TimeFrame::Minute3,
        TimeFrame::Minute5,
        TimeFrame::Minute15,
        TimeFrame::Minute30,
        TimeFrame::Hour1,
        TimeFrame::Hour2,
        TimeFrame::Hour4,
        TimeFrame::Hour6,
        TimeFrame::Hour8,
        TimeFrame::Hour12,
        TimeFrame::Day1,
        TimeFrame::Day3,
        TimeFrame::Week1,
        TimeFrame::Month1,
    ];

    pub fn spec(self) -> &'static TimeFrameSpec {
        &SPECS[self as usize]
    }

    /// Interval token as it appears in archive names (e.g. `1h`, `1mo`)
    pub fn interval(self) -> &'static str {
        self.spec().interval
    }

    /// Name of the kline table holding this timeframe's records
    pub fn table_name(self) -> &'static str {
        self.spec().table
    }

    /// Resolve an interval token. Matching is exact: `1M` or `1H` are rejected.
    pub fn from_interval(token: &str) -> Option<TimeFrame> {
        TimeFrame::ALL
            .into_iter()
            .find(|tf| tf.interval() == token)
    }
}

impl FromStr for TimeFrame {
    type Err = NamingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeFrame::from_interval(s).ok_or_else(|| NamingError::UnrecognizedTimeframe {
            token: s.to_string(),
        })
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.interval())
    }
}
