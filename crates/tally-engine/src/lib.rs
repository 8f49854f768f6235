pub mod actions;
pub mod config;
pub mod dates;
pub mod download;
pub mod pages;
pub mod poll;
pub mod portal;
pub mod sequence;
pub mod slot;
pub mod workflow;

pub use tally_common::{error, report};
