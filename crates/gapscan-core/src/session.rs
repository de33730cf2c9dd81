//! Market session classification for the US equity trading day.
//!
//! The classifier is a pure function of wall-clock time: no transitions are
//! stored, every call is independent. Provider-reported market state takes
//! precedence over this classifier; the fetcher falls back here only when
//! the provider value is absent or unrecognized.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::{Date, Month, OffsetDateTime, UtcOffset, Weekday};

/// Coarse classification of the exchange-local trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketSession {
    Weekend,
    /// 04:00-09:30 exchange-local time.
    PreMarket,
    /// 09:30-16:00 exchange-local time.
    Regular,
    /// 16:00-20:00 exchange-local time.
    AfterHours,
    /// 20:00-04:00 exchange-local time.
    Closed,
}

impl MarketSession {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weekend => "WEEKEND",
            Self::PreMarket => "PRE_MARKET",
            Self::Regular => "REGULAR",
            Self::AfterHours => "AFTER_HOURS",
            Self::Closed => "CLOSED",
        }
    }

    pub const fn is_extended_hours(self) -> bool {
        matches!(self, Self::PreMarket | Self::AfterHours)
    }
}

impl Display for MarketSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exchange timezone handling for NYSE/NASDAQ (US Eastern).
///
/// The `time` crate carries no tz database, so the post-2007 US DST rule is
/// applied directly: UTC-4 from the second Sunday of March 02:00 local to
/// the first Sunday of November 02:00 local, UTC-5 otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExchangeClock;

impl ExchangeClock {
    /// Convert a UTC instant to exchange-local time.
    pub fn to_local(&self, now_utc: OffsetDateTime) -> OffsetDateTime {
        now_utc.to_offset(self.offset_for(now_utc))
    }

    fn offset_for(&self, now_utc: OffsetDateTime) -> UtcOffset {
        let standard = UtcOffset::from_hms(-5, 0, 0).expect("EST offset is valid");
        let daylight = UtcOffset::from_hms(-4, 0, 0).expect("EDT offset is valid");

        // Evaluate the DST window against standard time; the one-hour error
        // band around the 02:00 switch is irrelevant for session purposes
        // (markets are closed at 02:00 on Sunday).
        let local_standard = now_utc.to_offset(standard);
        let date = local_standard.date();

        let dst_start = nth_weekday_of_month(date.year(), Month::March, Weekday::Sunday, 2);
        let dst_end = nth_weekday_of_month(date.year(), Month::November, Weekday::Sunday, 1);

        if date > dst_start && date < dst_end {
            daylight
        } else if date == dst_start || date == dst_end {
            let switch_hour = 2;
            let in_dst = (date == dst_start && local_standard.hour() >= switch_hour)
                || (date == dst_end && local_standard.hour() < switch_hour);
            if in_dst {
                daylight
            } else {
                standard
            }
        } else {
            standard
        }
    }
}

/// Find the nth given weekday of a month, e.g. the second Sunday of March.
fn nth_weekday_of_month(year: i32, month: Month, weekday: Weekday, nth: u8) -> Date {
    let mut date = Date::from_calendar_date(year, month, 1).expect("first of month is valid");
    let mut seen = 0;
    loop {
        if date.weekday() == weekday {
            seen += 1;
            if seen == nth {
                return date;
            }
        }
        date = date.next_day().expect("date range is valid");
    }
}

/// Classify a UTC instant into a market session. Weekday check takes
/// precedence over time-of-day.
pub fn classify(now_utc: OffsetDateTime, clock: &ExchangeClock) -> MarketSession {
    let local = clock.to_local(now_utc);

    if matches!(local.weekday(), Weekday::Saturday | Weekday::Sunday) {
        return MarketSession::Weekend;
    }

    let minutes = u32::from(local.hour()) * 60 + u32::from(local.minute());
    match minutes {
        m if (4 * 60..9 * 60 + 30).contains(&m) => MarketSession::PreMarket,
        m if (9 * 60 + 30..16 * 60).contains(&m) => MarketSession::Regular,
        m if (16 * 60..20 * 60).contains(&m) => MarketSession::AfterHours,
        _ => MarketSession::Closed,
    }
}

/// Session metadata recorded alongside each cache commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub session: MarketSession,
    /// Exchange-local time string, e.g. "2026-08-21 14:03:11 ET".
    pub current_time_et: String,
    pub is_trading_day: bool,
}

impl SessionMeta {
    pub fn capture(now_utc: OffsetDateTime, clock: &ExchangeClock) -> Self {
        let session = classify(now_utc, clock);
        let local = clock.to_local(now_utc);
        let current_time_et = format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02} ET",
            local.year(),
            u8::from(local.month()),
            local.day(),
            local.hour(),
            local.minute(),
            local.second()
        );

        Self {
            session,
            current_time_et,
            is_trading_day: session != MarketSession::Weekend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn weekday_check_takes_precedence() {
        // Saturday 2026-08-22 14:00 UTC (10:00 ET, would be REGULAR on a weekday).
        let session = classify(datetime!(2026-08-22 14:00 UTC), &ExchangeClock);
        assert_eq!(session, MarketSession::Weekend);
    }

    #[test]
    fn classifies_session_boundaries_in_summer() {
        // August is EDT (UTC-4).
        let clock = ExchangeClock;
        let cases = [
            (datetime!(2026-08-21 07:59 UTC), MarketSession::Closed), // 03:59 ET
            (datetime!(2026-08-21 08:00 UTC), MarketSession::PreMarket), // 04:00 ET
            (datetime!(2026-08-21 13:29 UTC), MarketSession::PreMarket), // 09:29 ET
            (datetime!(2026-08-21 13:30 UTC), MarketSession::Regular), // 09:30 ET
            (datetime!(2026-08-21 19:59 UTC), MarketSession::Regular), // 15:59 ET
            (datetime!(2026-08-21 20:00 UTC), MarketSession::AfterHours), // 16:00 ET
            (datetime!(2026-08-21 23:59 UTC), MarketSession::AfterHours), // 19:59 ET
            (datetime!(2026-08-22 00:00 UTC), MarketSession::Closed), // Fri 20:00 ET
        ];

        for (instant, expected) in cases {
            assert_eq!(classify(instant, &clock), expected, "at {instant}");
        }
    }

    #[test]
    fn winter_uses_standard_offset() {
        // January is EST (UTC-5): 14:30 UTC = 09:30 ET.
        let session = classify(datetime!(2026-01-05 14:30 UTC), &ExchangeClock);
        assert_eq!(session, MarketSession::Regular);
        // 14:29 UTC = 09:29 ET is still pre-market.
        let session = classify(datetime!(2026-01-05 14:29 UTC), &ExchangeClock);
        assert_eq!(session, MarketSession::PreMarket);
    }

    #[test]
    fn dst_boundaries_flip_the_offset() {
        // 2026 DST starts Sunday March 8 and ends Sunday November 1.
        // Monday March 9: EDT, so 13:30 UTC = 09:30 ET.
        assert_eq!(
            classify(datetime!(2026-03-09 13:30 UTC), &ExchangeClock),
            MarketSession::Regular
        );
        // Monday November 2: back to EST, 13:30 UTC = 08:30 ET.
        assert_eq!(
            classify(datetime!(2026-11-02 13:30 UTC), &ExchangeClock),
            MarketSession::PreMarket
        );
    }

    #[test]
    fn session_meta_captures_local_time() {
        let meta = SessionMeta::capture(datetime!(2026-08-21 14:03:11 UTC), &ExchangeClock);
        assert_eq!(meta.session, MarketSession::Regular);
        assert_eq!(meta.current_time_et, "2026-08-21 10:03:11 ET");
        assert!(meta.is_trading_day);
    }
}
