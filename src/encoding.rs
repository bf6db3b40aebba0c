//! Output character encodings.
//!
//! The writer works on UTF-8 strings internally. When the sink expects
//! another encoding, an [`XmlCharEncodingHandler`] converts the text right
//! before it is handed to the sink.

use std::fmt::Display;

use encoding_rs::{EncoderResult, Encoding, UTF_8};

pub struct XmlCharEncodingHandler {
    encoding: &'static Encoding,
    encoder: encoding_rs::Encoder,
}

impl XmlCharEncodingHandler {
    /// Encode `src` and append the result to `dst`.
    ///
    /// `last` must be set on the final call so that stateful encodings can
    /// emit their trailing sequence.
    ///
    /// Returns the number of bytes of `src` consumed. If a character
    /// cannot be represented in the target encoding, the output up to that
    /// character is kept and `EncodingError::Unmappable` is returned.
    pub fn encode(
        &mut self,
        src: &str,
        dst: &mut Vec<u8>,
        last: bool,
    ) -> Result<usize, EncodingError> {
        if self.encoding == UTF_8 {
            dst.extend_from_slice(src.as_bytes());
            return Ok(src.len());
        }

        let start = dst.len();
        let mut read = 0;
        loop {
            let reserve = self
                .encoder
                .max_buffer_length_from_utf8_without_replacement(src.len() - read)
                .unwrap_or(4 * (src.len() - read) + 16);
            dst.reserve(reserve);
            let (res, r) =
                self.encoder
                    .encode_from_utf8_to_vec_without_replacement(&src[read..], dst, last);
            read += r;
            match res {
                EncoderResult::InputEmpty => return Ok(read),
                EncoderResult::OutputFull => continue,
                EncoderResult::Unmappable(c) => {
                    return Err(EncodingError::Unmappable {
                        read,
                        write: dst.len() - start,
                        c,
                    });
                }
            }
        }
    }

    /// The canonical name of the target encoding, as written into the XML
    /// declaration.
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }
}

impl From<&'static Encoding> for XmlCharEncodingHandler {
    fn from(value: &'static Encoding) -> Self {
        let encoding = value.output_encoding();
        Self {
            encoding,
            encoder: encoding.new_encoder(),
        }
    }
}

impl std::fmt::Debug for XmlCharEncodingHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlCharEncodingHandler")
            .field("name", &self.name())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum EncodingError {
    /// A UTF-8 character `c` cannot map any codepoints of the target encoding.
    ///
    /// The input has been consumed up to `read` bytes, `c` included, and
    /// `write` bytes have been appended to the output.
    Unmappable { read: usize, write: usize, c: char },
}

impl Display for EncodingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unmappable { read, write, c } => {
                write!(
                    f,
                    "Unmappable character '{c}' (read: {read}, write: {write})"
                )
            }
        }
    }
}

impl std::error::Error for EncodingError {}

/// Search the encoding handler for `name`.
///
/// Any label known to the WHATWG Encoding Standard is accepted. Encodings
/// that are decode-only (UTF-16 for instance) are mapped to their output
/// encoding.
#[doc(alias = "xmlFindCharEncodingHandler")]
pub fn find_encoding_handler(name: &str) -> Option<XmlCharEncodingHandler> {
    Encoding::for_label(name.trim().as_bytes()).map(XmlCharEncodingHandler::from)
}
