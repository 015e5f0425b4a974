//! IPv4 address planning.
//!
//! Every address in a blueprint (link subnets, router IDs, originated
//! prefixes) comes out of an [`AddressPool`]. Pools are plain owned values:
//! each generation run builds fresh ones and drops them when the blueprint
//! is complete, so identical inputs always yield identical addresses.

pub mod pool;

pub use pool::{link_local_peer, AddressPool};
