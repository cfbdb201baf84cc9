// Test Helpers Module - In-memory collaborators
//
// Fakes for the archive and the send transport so the engine can be driven
// end to end without a real archive. Used by unit tests, the integration
// tests under tests/, and the crate-level quick start.

pub mod archive;
pub mod transport;

pub use archive::InMemoryArchive;
pub use transport::{RecordingTransport, SendRecord};
