//! The system façade and its supporting pieces: asynchronous delegate
//! dispatch, call-occurrence resolution, and path-normalizing query
//! forwarding.

mod call_resolver;
mod delegate;
mod facade;
mod path_queries;

pub use delegate::{AsyncIndexDelegate, IndexSystemDelegate, UnitOutOfDateHint};
pub use facade::{IndexSystem, SystemOptions};
