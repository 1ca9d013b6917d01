//! DNS module (SRV resolution)

mod resolver;

pub use resolver::{select_target, SrvResolver, SrvTarget};
