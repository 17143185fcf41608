//! The gaussmeter device adapter.
//!
//! - [`Gaussmeter`]: typed reads and settings over a [`Transport`](crate::adapters::Transport)
//! - [`interface`]: the attribute/command table and name-keyed dispatch used
//!   by a remote-control layer

pub mod gaussmeter;
pub mod interface;

pub use gaussmeter::{Gaussmeter, Observed};
pub use interface::{
    AttributeDescriptor, AttributeValue, CommandDescriptor, DataType, InterfaceTable,
};
