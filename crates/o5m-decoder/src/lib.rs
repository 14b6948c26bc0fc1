#![warn(clippy::pedantic)]

mod body;
mod cursor;
mod input;

pub mod decoder;
pub mod delta;
pub mod error;
pub mod factory;
pub mod producer;
pub mod reference_table;

pub use decoder::{
    CollectSink, Decoded, O5mDecoder, ReaderOptions, Sink, SinkClosed, DEFAULT_BUFFER_CAPACITY,
    DEFAULT_QUEUE_DEPTH, NODE_SIZE_ESTIMATE, RELATION_SIZE_ESTIMATE, WAY_SIZE_ESTIMATE,
};
pub use delta::DeltaDecoder;
pub use error::DecodeError;
pub use factory::{create_reader, register_builtin_formats, register_parser};
pub use producer::{spawn, O5mReader};
pub use reference_table::ReferenceTable;
