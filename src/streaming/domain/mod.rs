pub mod activity;
pub mod parser;

pub use activity::{Activity, ActivityCategory, ActivityType};
pub use parser::{ActivityExtractor, PushActivityParser};
