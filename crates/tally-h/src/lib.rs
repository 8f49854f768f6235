pub mod cdp;
pub mod dom;
pub mod fetch;
pub mod network;
pub mod portal;

pub use portal::{HeadlessOptions, HeadlessPortal};
