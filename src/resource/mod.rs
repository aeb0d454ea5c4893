//! Resource abstraction layer
//!
//! Shared building blocks used by every reconciler.
//!
//! # Architecture
//!
//! - [`fetcher`] - Accumulates paginated AWS responses behind one page stream
//! - [`diff`] - Computes missing and stale resources from defined vs existing sets
//!
//! # Example
//!
//! ```ignore
//! use ecspress::resource::{collect_all, Diff};
//!
//! let ecs = &*cloud.ecs;
//! let existing = collect_all(|token| ecs.list_services("main", token)).await?;
//! let diff = Diff::between(&defined, &existing.into_iter().collect());
//! ```

pub mod diff;
pub mod fetcher;

pub use diff::Diff;
pub use fetcher::{collect_all, pages, Page};
