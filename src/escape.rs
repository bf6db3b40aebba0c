//! Escaping of character data and attribute values.

use std::io;

use crate::{chvalid::XmlCharValid, io::XmlOutputBuffer};

/// Escapes text on its way to the output.
///
/// While an attribute value is open, the configured quote character and
/// line breaks are escaped too, and the unescaped value can be cached so
/// that `xml:lang`, `xml:space` and namespace declarations can be
/// interpreted once the attribute is closed.
#[derive(Debug)]
pub(crate) struct TextEncoder {
    in_attribute: bool,
    quote_char: char,
    cache_attr_value: bool,
    attr_value: String,
}

impl TextEncoder {
    pub(crate) fn new(quote_char: char) -> Self {
        Self {
            in_attribute: false,
            quote_char,
            cache_attr_value: false,
            attr_value: String::new(),
        }
    }

    pub(crate) fn set_quote_char(&mut self, quote_char: char) {
        self.quote_char = quote_char;
    }

    pub(crate) fn start_attribute(&mut self, cache_attr_value: bool) {
        self.in_attribute = true;
        self.cache_attr_value = cache_attr_value;
        self.attr_value.clear();
    }

    pub(crate) fn end_attribute(&mut self) {
        self.in_attribute = false;
        self.cache_attr_value = false;
    }

    /// The unescaped value of the last cached attribute.
    pub(crate) fn attribute_value(&self) -> &str {
        &self.attr_value
    }

    fn escape(&self, c: char) -> Option<&'static str> {
        match c {
            '<' => Some("&lt;"),
            '>' => Some("&gt;"),
            '&' => Some("&amp;"),
            '"' if self.in_attribute && self.quote_char == '"' => Some("&quot;"),
            '\'' if self.in_attribute && self.quote_char == '\'' => Some("&apos;"),
            _ => None,
        }
    }

    fn needs_char_ref(&self, c: char) -> bool {
        match c {
            '\t' | '\n' => self.in_attribute,
            '\r' => true,
            c => !c.is_xml_char(),
        }
    }

    /// Write `text`, escaping markup characters.
    #[doc(alias = "xmlEscapeContent")]
    pub(crate) fn write(&mut self, out: &mut XmlOutputBuffer, text: &str) -> io::Result<()> {
        if self.cache_attr_value {
            self.attr_value.push_str(text);
        }

        let mut last = 0;
        for (i, c) in text.char_indices() {
            let charref;
            let escaped = if let Some(escaped) = self.escape(c) {
                escaped
            } else if self.needs_char_ref(c) {
                charref = char_ref(c);
                charref.as_str()
            } else {
                continue;
            };
            if last < i {
                out.write_str(&text[last..i])?;
            }
            out.write_str(escaped)?;
            last = i + c.len_utf8();
        }
        if last < text.len() {
            out.write_str(&text[last..])?;
        }
        Ok(())
    }

    /// Write `text` as is.
    pub(crate) fn write_raw(&mut self, out: &mut XmlOutputBuffer, text: &str) -> io::Result<()> {
        if self.cache_attr_value {
            self.attr_value.push_str(text);
        }
        out.write_str(text)?;
        Ok(())
    }

    pub(crate) fn write_entity_ref(
        &mut self,
        out: &mut XmlOutputBuffer,
        name: &str,
    ) -> io::Result<()> {
        if self.cache_attr_value {
            self.attr_value.push('&');
            self.attr_value.push_str(name);
            self.attr_value.push(';');
        }
        out.write_str("&")?;
        out.write_str(name)?;
        out.write_str(";")?;
        Ok(())
    }

    pub(crate) fn write_char_entity(
        &mut self,
        out: &mut XmlOutputBuffer,
        c: char,
    ) -> io::Result<()> {
        if self.cache_attr_value {
            self.attr_value.push(c);
        }
        out.write_str(&char_ref(c))?;
        Ok(())
    }
}

fn char_ref(c: char) -> String {
    format!("&#x{:X};", c as u32)
}
