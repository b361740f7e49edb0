//! Analysis knobs shared by the CLI and the API server.

use crate::churn::ChurnParams;
use clap::Args;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LONG_STUCK_THRESHOLD_DAYS: i64 = 30;
pub const DEFAULT_HISTOGRAM_BUCKET_WIDTH_DAYS: i64 = 7;
pub const DEFAULT_TOP_USERS: usize = 20;
pub const DEFAULT_CHURN_THRESHOLD_DAYS: i64 = 30;
pub const DEFAULT_QUICK_CHURN_WINDOW_DAYS: i64 = 7;

/// Accepted churn thresholds, in days.
pub const CHURN_THRESHOLD_RANGE: std::ops::RangeInclusive<i64> = 7..=90;

#[derive(Debug, Clone, PartialEq, Eq, Args, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Orders stuck strictly longer than this many days count as long-stuck
    #[arg(long, default_value_t = DEFAULT_LONG_STUCK_THRESHOLD_DAYS)]
    pub long_stuck_threshold_days: i64,

    /// Width of the days-stuck histogram buckets
    #[arg(long, default_value_t = DEFAULT_HISTOGRAM_BUCKET_WIDTH_DAYS)]
    pub histogram_bucket_width_days: i64,

    /// Number of accounts listed in the top-users ranking
    #[arg(long, default_value_t = DEFAULT_TOP_USERS)]
    pub top_users: usize,

    /// Days without an order after which an account counts as churned
    #[arg(long, default_value_t = DEFAULT_CHURN_THRESHOLD_DAYS,
          value_parser = clap::value_parser!(i64).range(CHURN_THRESHOLD_RANGE))]
    pub churn_threshold_days: i64,

    /// Window for "last order soon after first stuck order"
    #[arg(long, default_value_t = DEFAULT_QUICK_CHURN_WINDOW_DAYS)]
    pub quick_churn_window_days: i64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            long_stuck_threshold_days: DEFAULT_LONG_STUCK_THRESHOLD_DAYS,
            histogram_bucket_width_days: DEFAULT_HISTOGRAM_BUCKET_WIDTH_DAYS,
            top_users: DEFAULT_TOP_USERS,
            churn_threshold_days: DEFAULT_CHURN_THRESHOLD_DAYS,
            quick_churn_window_days: DEFAULT_QUICK_CHURN_WINDOW_DAYS,
        }
    }
}

impl AnalysisConfig {
    pub fn churn_params(&self) -> ChurnParams {
        ChurnParams {
            churn_threshold_days: self.churn_threshold_days,
            quick_churn_window_days: self.quick_churn_window_days,
        }
    }

    /// Clamp a churn threshold that did not come through the CLI parser.
    pub fn clamp_churn_threshold(days: i64) -> i64 {
        days.clamp(*CHURN_THRESHOLD_RANGE.start(), *CHURN_THRESHOLD_RANGE.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        config: AnalysisConfig,
    }

    #[test]
    fn test_defaults_match_flags() {
        let cli = Cli::try_parse_from(["prog"]).unwrap();
        assert_eq!(cli.config, AnalysisConfig::default());
        assert_eq!(cli.config.churn_params(), ChurnParams::default());
    }

    #[test]
    fn test_churn_threshold_range() {
        let cli = Cli::try_parse_from(["prog", "--churn-threshold-days", "90"]).unwrap();
        assert_eq!(cli.config.churn_threshold_days, 90);
        assert!(Cli::try_parse_from(["prog", "--churn-threshold-days", "6"]).is_err());
        assert!(Cli::try_parse_from(["prog", "--churn-threshold-days", "91"]).is_err());
        assert_eq!(AnalysisConfig::clamp_churn_threshold(3), 7);
        assert_eq!(AnalysisConfig::clamp_churn_threshold(45), 45);
    }

    #[test]
    fn test_cli_bounds_follow_range_constant() {
        let parse = |days: i64| {
            let value = days.to_string();
            Cli::try_parse_from(["prog", "--churn-threshold-days", value.as_str()])
                .map(|cli| cli.config.churn_threshold_days)
        };
        let (low, high) = (*CHURN_THRESHOLD_RANGE.start(), *CHURN_THRESHOLD_RANGE.end());
        assert_eq!(parse(low).unwrap(), low);
        assert_eq!(parse(high).unwrap(), high);
        assert!(parse(low - 1).is_err());
        assert!(parse(high + 1).is_err());
        assert_eq!(AnalysisConfig::clamp_churn_threshold(high + 1), high);
    }
}
