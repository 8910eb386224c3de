//! Remote trace service
//!
//! Provides the client for the backend that lists subnetworks, traces,
//! generates schematic diagrams and exports them:
//! - `envelope`: textual response unwrapping and error detection
//! - `transport`: raw HTTP exchange (reqwest)
//! - `client`: typed operations on top of the transport

pub mod client;
pub mod envelope;
pub mod transport;

pub use client::{DEFAULT_LOCATION_ID, TraceService, TraceServiceClient};
pub use transport::{HttpTransport, Transport};

#[cfg(test)]
pub use client::MockTraceService;
