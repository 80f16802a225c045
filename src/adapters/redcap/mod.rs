//! REDCap registry adapter
//!
//! The [`RecordSink`] trait the batch driver uploads through, and its
//! REDCap API implementation.

pub mod client;
pub mod sink;

pub use client::RedcapClient;
pub use sink::RecordSink;
