//! Routing graph.
//!
//! Endpoints are named byte streams. Routes connect a source endpoint, or every endpoint
//! matching a pattern, to a tree of filters and destination endpoints. [Router] turns the
//! route table into a live graph of [Destination] and [crate::filters::FilterNode] nodes per
//! source, and again for every client a server endpoint accepts.
mod compiler;
mod destination;
mod registry;
mod spec;

pub use compiler::{Graph, Router};
pub use destination::Destination;
pub use registry::{is_pattern, EndpointStore, NameMatcher, PATTERN_PREFIX};
pub use spec::{Route, RouteSpec, RouteTable};
