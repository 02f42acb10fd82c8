//! Redaction: locating validated identifiers on a page and covering them.
//!
//! The [`Redactor`] ties the pieces together. It flattens page text, runs
//! the pattern catalog and validators, finds each match on the page with
//! [`locate`], turns the geometry into [`MaskRegion`]s with [`regions_for`]
//! and commits them through the page.

mod engine;
mod locate;
mod mask;
mod options;
mod report;

pub use engine::{flatten, Redactor};
pub use locate::{locate, GroupHit, Located, LINE_BREAK_HEIGHT};
pub use mask::{masked_display, regions_for, Fill, FillStyle, MaskRegion};
pub use options::{PageSelection, RedactOptions};
pub use report::{DocumentReport, Finding, PageReport};
