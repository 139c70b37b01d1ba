//! Per-source emission buffers
//!
//! Every flow and effector renders into its own `FieldBuffer` covering only
//! the cells near its geometry. Buffers are merged with `FieldBuffer::combine`
//! and then applied to the domain grids.

pub mod bounds;
pub mod field_buffer;

pub use bounds::{clamp_bounds_in_domain, DomainLimits};
pub use field_buffer::{add_if_lower, FieldBuffer, FieldSlab};
