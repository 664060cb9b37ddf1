pub mod analytics_tasks;
pub mod articles;
pub mod daily_aggregates;
pub mod read_events;
