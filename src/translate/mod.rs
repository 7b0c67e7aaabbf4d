//! The Graphite↔Prometheus translation kernel.
//!
//! Everything here is pure, per-request computation shared by all three
//! daemons: glob compilation, target conversion, query rewriting and the
//! dense-frame arithmetic of the render path.

pub mod frame;
pub mod glob;
pub mod query;
pub mod target;

pub use frame::{align_to_request, fill_dense, select_step, Frame, DEFAULT_MAX_DATA_POINTS};
pub use glob::{glob_to_regex, GlobError};
pub use query::convert_query;
pub use target::{build_selector, convert_target, label_name, metric_to_target, next_level};
