//! Summary statistics and charts over the persisted host set

mod charts;
mod summary;

pub use charts::{
    pie_chart, ChartRenderer, FRESHNESS_CHART, OS_CHART, SOURCE_CHART, SUMMARY_FILE,
};
pub use summary::{os_family, parse_last_seen, HostSummary};
