pub mod config;
pub mod job;
pub mod sim;
pub mod simulator;
pub mod utils;

pub use self::job::{Job, JobError, PreparedJob};
pub use self::simulator::{SimError, Simulator};
pub use self::utils::report::RunReport;
