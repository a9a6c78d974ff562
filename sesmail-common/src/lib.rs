pub mod envelope;
pub mod logging;

pub use envelope::Envelope;
pub use tracing;
