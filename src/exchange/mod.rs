//! Exchange engine
//!
//! Export: data store -> serializer -> codec -> transport.
//! Import: transport -> codec -> serializer (version gate, checksum) ->
//! merge resolver -> data store, one collection at a time.

mod engine;
mod options;
mod outcome;

pub use engine::{export_file_name, ExchangeEngine};
pub use options::{ExportOptions, ImportOptions};
pub use outcome::{ExportReceipt, ExportedSnapshot, ImportOutcome};
