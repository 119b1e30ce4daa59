//! # ParkPulse Queries
//!
//! The read side: ranking queries over the five canonical periods, chart
//! queries in Chart.js shape, and the heatmap reshape. The contract is
//! that every period reports the same metric definitions; TODAY is served
//! by the hybrid of completed hourly aggregates plus a raw tail for the
//! in-progress hour.

pub mod charts;
pub mod heatmap;
pub mod period;
pub mod rankings;
pub mod today;
pub mod trend;
pub mod types;

pub use charts::{ChartDataset, ChartResponse};
pub use heatmap::{HeatmapEntity, HeatmapResponse};
pub use period::{last_month_range, last_week_range, yesterday_pacific, PeriodRange};
pub use rankings::{
    park_downtime_rankings, park_wait_rankings, ride_downtime_rankings, ride_wait_rankings,
    RankingOptions,
};
pub use today::{
    combine_park_today, combine_ride_today, today_park_stats, today_ride_stats, TodayParkStats,
    TodayRideStats, TodayWindows,
};
pub use types::{ParkDowntimeRow, ParkWaitTimeRow, RideDowntimeRow, RideWaitTimeRow};
