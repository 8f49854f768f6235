pub mod catalog;
pub mod error;
pub mod locator;
pub mod report;

pub use catalog::{ReportFormat, ReportStatus, ReportTab, ReportType};
pub use error::portal_error::PortalError;
pub use locator::Locator;
pub use report::{ReportDescriptor, ReportError};
