//! Port traits: the seams between the pipeline and the outside world.

pub mod config_port;
pub mod remote_port;
pub mod report_port;
