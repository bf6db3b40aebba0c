use std::{
    fs::File,
    io::{self, Write, stdout},
    path::Path,
};

use log::debug;

use crate::encoding::{EncodingError, XmlCharEncodingHandler};

use super::MINLEN;

/// A buffered output channel.
///
/// Text is accumulated as encoded bytes and handed to the sink once more
/// than `MINLEN` bytes are pending, or on an explicit flush.
pub struct XmlOutputBuffer<'a> {
    context: Box<dyn Write + 'a>,
    encoder: Option<XmlCharEncodingHandler>,
    buffer: Vec<u8>,
    written: usize,
}

impl<'a> XmlOutputBuffer<'a> {
    /// Create a buffered output on top of `writer`.
    ///
    /// If `encoder` is `None`, the output is UTF-8 and no encoding is
    /// declared by the writer.
    #[doc(alias = "xmlOutputBufferCreateIO")]
    pub fn from_writer(writer: impl Write + 'a, encoder: Option<XmlCharEncodingHandler>) -> Self {
        Self {
            context: Box::new(writer),
            encoder,
            buffer: Vec::with_capacity(MINLEN),
            written: 0,
        }
    }

    /// Create a buffered output for the file at `path`.
    /// `-` means the standard output.
    #[doc(alias = "xmlOutputBufferCreateFilename")]
    pub fn from_uri(
        path: impl AsRef<Path>,
        encoder: Option<XmlCharEncodingHandler>,
    ) -> io::Result<Self> {
        let path = path.as_ref();
        if path.as_os_str() == "-" {
            return Ok(Self::from_writer(stdout(), encoder));
        }
        let file = File::create(path)?;
        Ok(Self::from_writer(file, encoder))
    }

    /// The name of the output encoding, if an encoder is attached.
    pub fn encoding(&self) -> Option<&'static str> {
        self.encoder.as_ref().map(|encoder| encoder.name())
    }

    /// Write `s` to the output buffer.
    /// Characters the output encoding cannot represent are written as
    /// decimal character references.
    ///
    /// Returns the number of bytes of `s` consumed.
    #[doc(alias = "xmlOutputBufferWriteString")]
    pub fn write_str(&mut self, s: &str) -> io::Result<usize> {
        self.encode(s, false)?;
        if self.buffer.len() >= MINLEN {
            self.flush_buffer()?;
        }
        Ok(s.len())
    }

    fn encode(&mut self, mut src: &str, last: bool) -> io::Result<()> {
        let Some(encoder) = self.encoder.as_mut() else {
            self.buffer.extend_from_slice(src.as_bytes());
            return Ok(());
        };
        loop {
            match encoder.encode(src, &mut self.buffer, last) {
                Ok(_) => return Ok(()),
                Err(EncodingError::Unmappable { read, c, .. }) => {
                    src = &src[read..];
                    let charref = format!("&#{};", c as u32);
                    // character references are plain ASCII
                    if let Err(err) = encoder.encode(&charref, &mut self.buffer, false) {
                        debug!("output conversion failed: {err}");
                        return Err(io::Error::new(io::ErrorKind::InvalidData, err));
                    }
                }
            }
        }
    }

    fn flush_buffer(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.context.write_all(&self.buffer)?;
            self.written = self.written.saturating_add(self.buffer.len());
            self.buffer.clear();
        }
        Ok(())
    }

    /// Push all pending bytes to the sink and flush it.
    #[doc(alias = "xmlOutputBufferFlush")]
    pub fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer()?;
        self.context.flush()
    }

    /// Terminate the encoder state and flush everything.
    ///
    /// Nothing should be written after this call.
    #[doc(alias = "xmlOutputBufferClose")]
    pub fn finish(&mut self) -> io::Result<()> {
        self.encode("", true)?;
        self.flush()
    }

    /// Total number of bytes pushed to the sink so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Number of encoded bytes not yet pushed to the sink.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

impl Drop for XmlOutputBuffer<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            debug!("failed to flush the output buffer: {err}");
        }
    }
}
