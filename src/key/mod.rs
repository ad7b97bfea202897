//! Key Module
//!
//! Primary key schema, values, and the comparable byte encoding used as the
//! hash index key.
//!
//! ## Encoding
//! ```text
//! ┌────────────────────┬────────────────────┬─────┬──────────────────┐
//! │ Column 0           │ Column 1           │ ... │ Column N-1       │
//! └────────────────────┴────────────────────┴─────┴──────────────────┘
//!
//! Boolean            1 byte (0 or 1)
//! Integers / dates   big-endian, sign bit flipped
//! Varchar (last)     raw bytes
//! Varchar (other)    0x00 escaped as 0x00 0x01, terminated by 0x00 0x00
//! ```
//!
//! Byte-wise comparison of two encoded keys matches the column-by-column
//! comparison of the original values, and distinct rows always produce
//! distinct encodings.

mod codec;
mod value;

pub use codec::{decode_key, encode_key, encode_keys};
pub use value::{KeyColumn, KeySchema, KeyType, KeyValue};
