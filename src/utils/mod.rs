pub mod time;

// Re-export time utilities
pub use time::{current_time, time_since, Clock, ManualClock, SystemClock};
