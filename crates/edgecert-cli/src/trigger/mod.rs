//! Ways a renewal run gets started while serving.

mod http;
mod schedule;

pub use http::{configure_routes, TriggerState};
pub use schedule::{parse_schedule, run_schedule};
