pub const ARTICLES: &str = "articles";
pub const READ_EVENTS: &str = "read_events";
pub const DAILY_AGGREGATES: &str = "daily_aggregates";
pub const ANALYTICS_TASKS: &str = "analytics_tasks";
pub const META: &str = "meta";

// Secondary index trees
pub const READ_EVENTS_BY_TIME: &str = "read_events_by_time";
