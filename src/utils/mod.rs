pub mod time;

pub use time::{format_timestamp, parse_timestamp, slugify, start_of_day};
