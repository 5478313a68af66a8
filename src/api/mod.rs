pub mod envelope;

pub use envelope::{classify, Envelope, Outcome};
