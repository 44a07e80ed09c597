//! Library surface for the contact ingest worker binary, split out so
//! integration tests can drive the consumer and processor without going
//! through `main`.

pub mod blob;
pub mod consumer;
pub mod csv_decoder;
pub mod error;
pub mod processor;
pub mod queue;
pub mod validator;

pub use blob::{BlobError, BlobStore, InMemoryBlobStore, S3BlobStore};
pub use consumer::Consumer;
pub use processor::JobProcessor;
pub use queue::{InMemoryMessageQueue, Message, MessageQueue, QueueError, SqsMessageQueue};
