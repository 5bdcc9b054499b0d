//! Dashboard metric cards: a value normalized against its limit.

use roster_core::{RosterError, RosterResult};
use serde::Serialize;

pub const USERS_LIMIT: f64 = 100.0;
pub const POSTS_LIMIT: f64 = 300.0;
pub const RESPONSE_LIMIT_SECS: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increase,
    Decrease,
}

impl Trend {
    pub fn arrow(&self) -> &'static str {
        match self {
            Trend::Increase => "↑",
            Trend::Decrease => "↓",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCard {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub limit: f64,
    pub change: String,
    pub trend: Trend,
}

impl MetricCard {
    pub fn new(name: &str, value: f64, unit: &str, limit: f64, change: String, trend: Trend) -> RosterResult<Self> {
        if limit.is_nan() || limit <= 0.0 {
            return Err(RosterError::InvalidArgument(format!("metric {} needs a positive limit, got {}", name, limit)));
        }
        Ok(Self { name: name.to_string(), value, unit: unit.to_string(), limit, change, trend })
    }

    /// Value as a percentage of the limit; may exceed 100.
    pub fn percentage(&self) -> f64 { self.value / self.limit * 100.0 }

    /// Progress bar width, clamped to `[0, 100]`.
    pub fn bar_width(&self) -> f64 { self.percentage().clamp(0.0, 100.0) }

    pub fn display_value(&self) -> String {
        if self.unit.is_empty() {
            format!("{}", self.value.round() as i64)
        } else {
            format!("{:.2}{}", self.value, self.unit)
        }
    }
}

fn count_card(name: &str, count: usize, limit: f64) -> RosterResult<MetricCard> {
    let pct = (count as f64 / limit * 100.0).round() as i64;
    MetricCard::new(name, count as f64, "", limit, format!("+{}%", pct), Trend::Increase)
}

/// The three dashboard cards. For response time lower is better, so headroom
/// under the limit counts as an improvement.
pub fn overview(users: usize, posts: usize, response_secs: f64) -> RosterResult<Vec<MetricCard>> {
    let headroom = ((1.0 - response_secs / RESPONSE_LIMIT_SECS) * 100.0).round() as i64;
    let (change, trend) = if headroom >= 0 {
        (format!("-{}%", headroom), Trend::Increase)
    } else {
        (format!("+{}%", -headroom), Trend::Decrease)
    };
    Ok(vec![
        MetricCard::new("API Response", response_secs, "s", RESPONSE_LIMIT_SECS, change, trend)?,
        count_card("Total Users", users, USERS_LIMIT)?,
        count_card("Total Posts", posts, POSTS_LIMIT)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_and_clamp() {
        let c = MetricCard::new("Total Posts", 450.0, "", 300.0, "+150%".into(), Trend::Increase).unwrap();
        assert_eq!(c.percentage(), 150.0);
        assert_eq!(c.bar_width(), 100.0);
        assert_eq!(c.display_value(), "450");
    }

    #[test]
    fn non_positive_limit_is_rejected() {
        assert!(matches!(MetricCard::new("x", 1.0, "", 0.0, String::new(), Trend::Increase), Err(RosterError::InvalidArgument(_))));
        assert!(MetricCard::new("x", 1.0, "", -3.0, String::new(), Trend::Increase).is_err());
        assert!(MetricCard::new("x", 1.0, "", f64::NAN, String::new(), Trend::Increase).is_err());
    }

    #[test]
    fn overview_matches_dashboard_limits() {
        let cards = overview(10, 100, 1.5).unwrap();
        assert_eq!(cards.len(), 3);
        assert_eq!(cards[0].display_value(), "1.50s");
        assert_eq!(cards[0].change, "-25%");
        assert_eq!(cards[0].trend, Trend::Increase);
        assert_eq!(cards[1].change, "+10%");
        assert_eq!(cards[1].percentage(), 10.0);
        assert_eq!(cards[2].change, "+33%");
        assert_eq!(cards[2].bar_width().round(), 33.0);
    }

    #[test]
    fn slow_response_is_a_decline() {
        let cards = overview(0, 0, 3.0).unwrap();
        assert_eq!(cards[0].change, "+50%");
        assert_eq!(cards[0].trend, Trend::Decrease);
        assert_eq!(cards[0].bar_width(), 100.0);
    }
}
