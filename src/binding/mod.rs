//! Resource Binder: semantic binding table, bind group cache and pipeline
//! layout aggregation.

mod binder;
mod group;
pub mod layout;
pub mod table;
pub mod value;

pub use binder::{AggregateLayout, Binder, BufferInfo};
pub use layout::{BindingKind, GroupLayout};
pub use table::{BindingEntry, BindingTable};
pub use value::UniformValue;
