//! A streaming XML text writer.
//!
//! [`XmlTextWriter`] writes XML one construct at a time into an
//! [`XmlOutputBuffer`] and only ever produces well-formed output: calls
//! that would break the document structure fail with an
//! [`XmlWriterError`], and namespace declarations are emitted, reused or
//! generated as needed.

#![warn(unused_assignments)]
#![warn(unused_mut)]
#![warn(unused_imports)]
#![warn(unused_labels)]
#![warn(unused_parens)]
#![warn(unused_variables)]

pub mod chvalid;
pub mod encoding;
pub mod error;
mod escape;
pub mod io;
pub mod names;
pub mod writer;

pub use encoding::{XmlCharEncodingHandler, find_encoding_handler};
pub use error::{MarkupKind, Result, XmlWriterError};
pub use io::XmlOutputBuffer;
pub use writer::{
    Formatting, Token, WriteState, WriterState, XmlSpace, XmlTextWriter, XmlWriterSettings,
};

/// The namespace bound to the `xml` prefix.
pub const XML_XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
/// The namespace of `xmlns` attributes. Nothing can be bound to it.
pub const XML_XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";
