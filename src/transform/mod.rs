//! Transformation stages, leaf to root.
//!
//! - [`sanitize`] - noise stripping and field typing
//! - [`fiscal`] - fiscal-period labels to calendar-dated hour columns
//! - [`aggregate`] - month/quarter/fiscal-year hour sums and FTE
//! - [`wbs`] - WBS hierarchy level keys
//! - [`category`] - resource category left join
//! - [`pipeline`] - the orchestrator tying the stages together

pub mod aggregate;
pub mod category;
pub mod fiscal;
pub mod pipeline;
pub mod sanitize;
pub mod wbs;
