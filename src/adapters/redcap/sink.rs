//! Upload sink abstraction

use crate::core::codebook::FlatRecord;
use crate::domain::Result;
use async_trait::async_trait;

/// Destination of the flat registry records
///
/// The batch driver calls [`import_records`](RecordSink::import_records)
/// exactly once per run with the complete list. Any error aborts the run.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Imports all records and returns the number the registry accepted
    async fn import_records(&self, records: &[FlatRecord]) -> Result<usize>;

    /// Human readable destination, used in log output
    fn destination(&self) -> &str;
}
