//! Process-wide format registry.
//!
//! Maps a file-format tag to a parser constructor. Registration happens
//! through an explicit initialisation call from program startup instead
//! of a static-initialisation side effect, so there is no ordering to
//! reason about.

use std::collections::HashMap;
use std::io::Read;
use std::sync::{Mutex, OnceLock};

use crate::decoder::ReaderOptions;
use crate::error::DecodeError;
use crate::producer::{self, O5mReader};

/// The upstream byte source handed to a parser constructor.
pub type BoxedInput = Box<dyn Read + Send + 'static>;

/// A registered parser constructor: takes the input and the reader
/// options and returns a running producer handle.
pub type ParserConstructor = fn(BoxedInput, ReaderOptions) -> Result<O5mReader, DecodeError>;

fn registry() -> &'static Mutex<HashMap<&'static str, ParserConstructor>> {
    static REGISTRY: OnceLock<Mutex<HashMap<&'static str, ParserConstructor>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

fn lock() -> std::sync::MutexGuard<'static, HashMap<&'static str, ParserConstructor>> {
    registry().lock().unwrap_or_else(|e| e.into_inner())
}

/// Register a parser constructor under a format tag, replacing any
/// earlier registration for the same tag.
pub fn register_parser(tag: &'static str, constructor: ParserConstructor) {
    lock().insert(tag, constructor);
}

/// Register the built-in formats. Call once during program startup;
/// calling again is harmless.
pub fn register_builtin_formats() {
    register_parser("o5m", |input, options| producer::spawn(input, options));
}

/// Spawn a producer for the given format tag.
///
/// # Errors
///
/// [`DecodeError::UnknownFormat`] when no constructor is registered for
/// the tag; otherwise whatever the constructor reports.
pub fn create_reader(
    tag: &str,
    input: BoxedInput,
    options: ReaderOptions,
) -> Result<O5mReader, DecodeError> {
    let constructor = lock()
        .get(tag)
        .copied()
        .ok_or_else(|| DecodeError::UnknownFormat(tag.to_string()))?;
    constructor(input, options)
}
