//! PDF writing.
//!
//! Only what incremental updates need: deterministic object serialization.

mod object_serializer;

pub use object_serializer::ObjectSerializer;
