pub mod scheduler;
pub mod sweeper;
pub mod transcoder;
