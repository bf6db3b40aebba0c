//! Provide the streaming XML text writer.
//!
//! [`XmlTextWriter`] emits one construct per call and refuses any call that
//! would make the output ill-formed. Constructs that are still open when the
//! next one is requested are completed automatically: writing content closes
//! a pending start tag, starting a second attribute closes the first one,
//! and so on.
//!
//! ```
//! use xmltw::{XmlOutputBuffer, XmlTextWriter};
//!
//! let mut buf = vec![];
//! let mut writer = XmlTextWriter::new(XmlOutputBuffer::from_writer(&mut buf, None));
//! writer.start_element(None, "root", None).unwrap();
//! writer.write_attribute_string(None, "id", None, "1").unwrap();
//! writer.write_string("hi").unwrap();
//! writer.end_element().unwrap();
//! writer.close().unwrap();
//! drop(writer);
//! assert_eq!(buf, br#"<root id="1">hi</root>"#);
//! ```

mod binary;
mod namespace;
mod settings;
mod state;
mod tag;

use std::iter::repeat_n;

use log::{debug, warn};

pub use settings::{Formatting, XmlWriterSettings};
pub use state::{Token, WriteState, WriterState};
pub use tag::XmlSpace;

use crate::{
    XML_XML_NAMESPACE, XML_XMLNS_NAMESPACE,
    chvalid::XmlCharValid,
    error::{MarkupKind, Result, XmlWriterError},
    escape::TextEncoder,
    io::XmlOutputBuffer,
    names::{check_name, validate_nmtoken},
};

use binary::{Base64Encoder, encode_bin_hex};
use namespace::NamespaceStack;
use state::StateTable;
use tag::{NamespaceState, TagStack};

/// Attributes whose value changes the writer's scope information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecialAttribute {
    None,
    XmlLang,
    XmlSpace,
    XmlNs,
}

pub struct XmlTextWriter<'a> {
    out: XmlOutputBuffer<'a>,
    encoder: TextEncoder,
    base64: Base64Encoder,
    // a base64 payload may have leftover bytes
    flush: bool,
    stack: TagStack,
    nsstack: NamespaceStack,
    state: WriterState,
    last_token: Option<Token>,
    table: StateTable,
    namespaces: bool,
    formatting: Formatting,
    indentation: usize,
    indent_char: char,
    quote_char: char,
    special_attr: SpecialAttribute,
    // local name of the `xmlns:*` attribute being written
    prefix_for_xmlns: Option<String>,
}

impl<'a> XmlTextWriter<'a> {
    /// Create a new writer with the default settings.
    #[doc(alias = "xmlNewTextWriter")]
    pub fn new(out: XmlOutputBuffer<'a>) -> Self {
        let settings = XmlWriterSettings::default();
        Self {
            out,
            encoder: TextEncoder::new(settings.quote_char),
            base64: Base64Encoder::new(),
            flush: false,
            stack: TagStack::new(),
            nsstack: NamespaceStack::new(),
            state: WriterState::Start,
            last_token: None,
            table: StateTable::Fragment,
            namespaces: settings.namespaces,
            formatting: settings.formatting,
            indentation: settings.indentation,
            indent_char: settings.indent_char,
            quote_char: settings.quote_char,
            special_attr: SpecialAttribute::None,
            prefix_for_xmlns: None,
        }
    }

    /// Create a new writer configured by `settings`.
    pub fn with_settings(out: XmlOutputBuffer<'a>, settings: XmlWriterSettings) -> Result<Self> {
        let mut writer = Self::new(out);
        writer.set_quote_char(settings.quote_char)?;
        writer.namespaces = settings.namespaces;
        writer.formatting = settings.formatting;
        writer.indentation = settings.indentation;
        writer.indent_char = settings.indent_char;
        Ok(writer)
    }

    /// The current configuration.
    pub fn settings(&self) -> XmlWriterSettings {
        XmlWriterSettings {
            namespaces: self.namespaces,
            formatting: self.formatting,
            indentation: self.indentation,
            indent_char: self.indent_char,
            quote_char: self.quote_char,
        }
    }

    pub fn namespaces(&self) -> bool {
        self.namespaces
    }

    /// Enable or disable namespace support.
    ///
    /// Only possible before anything has been written.
    pub fn set_namespaces(&mut self, namespaces: bool) -> Result<()> {
        if self.state != WriterState::Start {
            return Err(XmlWriterError::SettingLocked);
        }
        self.namespaces = namespaces;
        Ok(())
    }

    pub fn formatting(&self) -> Formatting {
        self.formatting
    }

    pub fn set_formatting(&mut self, formatting: Formatting) {
        self.formatting = formatting;
    }

    pub fn indentation(&self) -> usize {
        self.indentation
    }

    /// Set the number of indent characters written per level.
    #[doc(alias = "xmlTextWriterSetIndent")]
    pub fn set_indentation(&mut self, indentation: usize) {
        self.indentation = indentation;
    }

    pub fn indent_char(&self) -> char {
        self.indent_char
    }

    #[doc(alias = "xmlTextWriterSetIndentString")]
    pub fn set_indent_char(&mut self, indent_char: char) {
        self.indent_char = indent_char;
    }

    pub fn quote_char(&self) -> char {
        self.quote_char
    }

    /// Set the character used for quoting attributes.
    ///
    /// Only `"` and `'` are accepted, and the character cannot be changed
    /// while an attribute value is open.
    #[doc(alias = "xmlTextWriterSetQuoteChar")]
    pub fn set_quote_char(&mut self, quote_char: char) -> Result<()> {
        if quote_char != '"' && quote_char != '\'' {
            return Err(XmlWriterError::InvalidQuoteChar { c: quote_char });
        }
        if matches!(self.state, WriterState::Attribute | WriterState::AttrOnly) {
            return Err(XmlWriterError::SettingLocked);
        }
        self.quote_char = quote_char;
        self.encoder.set_quote_char(quote_char);
        Ok(())
    }

    /// The state of the writer as seen from outside.
    pub fn write_state(&self) -> WriteState {
        self.state.into()
    }

    /// The innermost `xml:space` in scope.
    pub fn xml_space(&self) -> XmlSpace {
        self.stack.xml_space()
    }

    /// The innermost `xml:lang` in scope.
    pub fn xml_lang(&self) -> Option<&str> {
        self.stack.xml_lang()
    }

    /// Find the prefix bound to `ns` in the current scope.
    ///
    /// The empty string is returned if `ns` is the default namespace.
    pub fn lookup_prefix(&self, ns: &str) -> Option<&str> {
        if self.stack.top().default_ns == ns
            && self.stack.top().default_ns_state != NamespaceState::Uninitialized
        {
            return Some("");
        }
        self.nsstack.find_prefix(ns)
    }

    fn quote(&self) -> &'static str {
        if self.quote_char == '\'' { "'" } else { "\"" }
    }

    fn indented(&self) -> bool {
        self.formatting == Formatting::Indented
    }

    /// Run a public operation. Any failure puts the writer into the error
    /// state, and nothing can be written anymore once the writer is closed.
    fn guarded<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.state == WriterState::Closed {
            return Err(XmlWriterError::WriterClosed);
        }
        f(self).inspect_err(|err| self.writer_err(err))
    }

    /// Handle a writer error.
    #[doc(alias = "xmlWriterErrMsg")]
    fn writer_err(&mut self, err: &XmlWriterError) {
        debug!("xml writer error in state {}: {err}", self.state);
        if self.state != WriterState::Closed {
            self.state = WriterState::Error;
        }
    }

    /// Move the state machine by `token`, completing whatever the new token
    /// requires to be closed first.
    fn advance(&mut self, token: Token) -> Result<()> {
        match self.state {
            WriterState::Closed => return Err(XmlWriterError::WriterClosed),
            WriterState::Error => {
                return Err(XmlWriterError::InvalidTransition {
                    token,
                    state: WriterState::Error,
                });
            }
            _ => {}
        }

        let mut new_state = self.table.next(token, self.state);
        if new_state == WriterState::Error {
            return Err(XmlWriterError::InvalidTransition {
                token,
                state: self.state,
            });
        }

        if token != Token::Base64 && self.flush {
            self.flush_encoders()?;
        }

        let mut token = token;
        match token {
            Token::Doctype => {
                if self.indented() && self.state != WriterState::Start {
                    self.indent(false)?;
                }
            }
            Token::StartElement
            | Token::Comment
            | Token::ProcessingInstruction
            | Token::CData => {
                if self.state == WriterState::Attribute {
                    self.write_end_attribute_quote()?;
                    self.write_end_start_tag(false)?;
                } else if self.state == WriterState::Element {
                    self.write_end_start_tag(false)?;
                }
                if token == Token::CData {
                    self.stack.top_mut().mixed = true;
                } else if self.indented() && self.state != WriterState::Start {
                    self.indent(false)?;
                }
            }
            Token::EndElement | Token::LongEndElement => {
                if self.state == WriterState::Attribute {
                    self.write_end_attribute_quote()?;
                }
                if self.state == WriterState::Content {
                    token = Token::LongEndElement;
                } else {
                    self.write_end_start_tag(token == Token::EndElement)?;
                }
                if self.table == StateTable::Document && self.stack.depth() == 1 {
                    new_state = WriterState::Epilog;
                }
            }
            Token::StartAttribute => {
                if self.state == WriterState::Attribute {
                    self.write_end_attribute_quote()?;
                    self.out.write_str(" ")?;
                } else if self.state == WriterState::Element {
                    self.out.write_str(" ")?;
                }
            }
            Token::EndAttribute => self.write_end_attribute_quote()?,
            Token::Whitespace | Token::Content | Token::RawData | Token::Base64 => {
                if self.state == WriterState::Element && self.last_token != Some(Token::Content) {
                    self.write_end_start_tag(false)?;
                }
                if new_state == WriterState::Content {
                    self.stack.top_mut().mixed = true;
                }
            }
        }

        self.state = new_state;
        self.last_token = Some(token);
        Ok(())
    }

    fn flush_encoders(&mut self) -> Result<()> {
        let mut rest = String::new();
        self.base64.flush(&mut rest);
        self.encoder.write_raw(&mut self.out, &rest)?;
        self.flush = false;
        Ok(())
    }

    fn indent(&mut self, before_end_element: bool) -> Result<()> {
        let depth = self.stack.depth();
        if depth == 0 {
            self.out.write_str("\n")?;
        } else if !self.stack.top().mixed {
            let level = if before_end_element { depth - 1 } else { depth };
            let mut buf = String::with_capacity(1 + level * self.indentation);
            buf.push('\n');
            buf.extend(repeat_n(self.indent_char, level * self.indentation));
            self.out.write_str(&buf)?;
        }
        Ok(())
    }

    /// Close the start tag of the top element, writing the namespace
    /// declarations it still owes first.
    fn write_end_start_tag(&mut self, empty: bool) -> Result<()> {
        let quote = self.quote();
        let mark = self.stack.top().ns_mark;
        let pending = self
            .nsstack
            .scope(mark)
            .rev()
            .filter(|&(i, b)| !b.declared && self.nsstack.lookup(&b.prefix) == Some(i))
            .map(|(i, _)| i)
            .collect::<Vec<_>>();

        self.encoder.start_attribute(false);
        for &i in &pending {
            let binding = &self.nsstack[i];
            self.out.write_str(" xmlns:")?;
            self.encoder.write(&mut self.out, &binding.prefix)?;
            self.out.write_str("=")?;
            self.out.write_str(quote)?;
            self.encoder.write(&mut self.out, &binding.uri)?;
            self.out.write_str(quote)?;
        }
        for i in pending {
            self.nsstack.set_declared(i);
        }

        if self.stack.depth() > 0 {
            let top = self.stack.top();
            if top.default_ns != self.stack.parent().default_ns
                && top.default_ns_state == NamespaceState::DeclaredPendingWrite
            {
                self.out.write_str(" xmlns=")?;
                self.out.write_str(quote)?;
                self.encoder.write(&mut self.out, &top.default_ns)?;
                self.out.write_str(quote)?;
                self.stack.top_mut().default_ns_state = NamespaceState::DeclaredWritten;
            }
        }
        self.encoder.end_attribute();

        self.out.write_str(if empty { " />" } else { ">" })?;
        Ok(())
    }

    fn write_end_attribute_quote(&mut self) -> Result<()> {
        if self.special_attr != SpecialAttribute::None {
            self.handle_special_attribute()?;
        }
        self.encoder.end_attribute();
        let quote = self.quote();
        self.out.write_str(quote)?;
        Ok(())
    }

    fn handle_special_attribute(&mut self) -> Result<()> {
        let value = self.encoder.attribute_value().to_owned();
        match std::mem::replace(&mut self.special_attr, SpecialAttribute::None) {
            SpecialAttribute::XmlLang => self.stack.top_mut().xml_lang = Some(value),
            SpecialAttribute::XmlSpace => {
                let space = match value.trim_matches(|c: char| c.is_xml_blank_char()) {
                    "default" => XmlSpace::Default,
                    "preserve" => XmlSpace::Preserve,
                    _ => return Err(XmlWriterError::InvalidXmlSpaceValue { value }),
                };
                self.stack.top_mut().xml_space = space;
            }
            SpecialAttribute::XmlNs => {
                let prefix = self.prefix_for_xmlns.take();
                verify_prefix_xml(prefix.as_deref(), &value)?;
                // a top-level declaration has no element to scope it
                if self.stack.depth() > 0 {
                    self.push_namespace(prefix.as_deref(), &value, true)?;
                }
            }
            SpecialAttribute::None => {}
        }
        Ok(())
    }

    /// Bind `prefix` (`None` for the default namespace) to `ns` in the
    /// scope of the top element.
    ///
    /// `declared` is set when the declaration is written by the caller as
    /// an `xmlns` attribute.
    fn push_namespace(&mut self, prefix: Option<&str>, ns: &str, declared: bool) -> Result<()> {
        if ns == XML_XMLNS_NAMESPACE
            || (ns == XML_XML_NAMESPACE && prefix != Some("xml"))
            || prefix == Some("xmlns")
        {
            return Err(XmlWriterError::ReservedPrefixMisuse {
                prefix: prefix.unwrap_or_default().to_owned(),
                namespace: ns.to_owned(),
            });
        }

        let Some(prefix) = prefix else {
            let top = self.stack.top_mut();
            match top.default_ns_state {
                NamespaceState::Uninitialized | NamespaceState::InScopeNotDeclared => {
                    top.default_ns = ns.to_owned();
                }
                NamespaceState::DeclaredPendingWrite | NamespaceState::DeclaredWritten => {
                    if top.default_ns != ns {
                        return Err(XmlWriterError::NamespaceConflict {
                            prefix: String::new(),
                            namespace: ns.to_owned(),
                        });
                    }
                }
            }
            if declared {
                top.default_ns_state = NamespaceState::DeclaredWritten;
            } else if top.default_ns_state != NamespaceState::DeclaredWritten {
                top.default_ns_state = NamespaceState::DeclaredPendingWrite;
            }
            return Ok(());
        };

        if ns.is_empty() {
            return Err(XmlWriterError::EmptyNamespacePrefix {
                prefix: prefix.to_owned(),
            });
        }

        match self.nsstack.lookup(prefix) {
            Some(i) if self.nsstack[i].uri == ns => {
                if declared {
                    self.nsstack.set_declared(i);
                }
            }
            _ => {
                // names already written in this start tag must keep their
                // namespace
                if self.prefix_in_use(prefix) {
                    return Err(XmlWriterError::NamespaceConflict {
                        prefix: prefix.to_owned(),
                        namespace: ns.to_owned(),
                    });
                }
                self.nsstack.push(prefix, ns, declared);
            }
        }
        Ok(())
    }

    /// Check whether `prefix` is bound by the open start tag or already
    /// written in it.
    fn prefix_in_use(&self, prefix: &str) -> bool {
        let top = self.stack.top();
        self.stack.depth() > 0
            && (self.nsstack.lookup_in_scope(prefix, top.ns_mark).is_some()
                || top.prefix.as_deref() == Some(prefix)
                || top.used_prefixes.iter().any(|p| p == prefix))
    }

    /// Generate a prefix that is not bound yet.
    fn generate_prefix(&mut self) -> String {
        let depth = self.stack.depth();
        loop {
            let top = self.stack.top_mut();
            top.prefix_count += 1;
            let candidate = format!("d{depth}p{}", top.prefix_count);
            if self.nsstack.lookup(&candidate).is_none() {
                return candidate;
            }
        }
    }

    /// Write the XML declaration and switch to single document mode.
    ///
    /// `standalone` writes `standalone="yes"` or `standalone="no"`.
    #[doc(alias = "xmlTextWriterStartDocument")]
    pub fn start_document(&mut self, standalone: Option<bool>) -> Result<()> {
        self.guarded(|w| {
            match w.state {
                WriterState::Start => {}
                WriterState::Error => {
                    return Err(XmlWriterError::InvalidTransition {
                        token: Token::ProcessingInstruction,
                        state: WriterState::Error,
                    });
                }
                state if w.table == StateTable::Document => {
                    debug!("XML declaration requested in state {state}");
                    return Err(XmlWriterError::DuplicateXmlDeclaration);
                }
                state => {
                    return Err(XmlWriterError::InvalidTransition {
                        token: Token::ProcessingInstruction,
                        state,
                    });
                }
            }

            w.table = StateTable::Document;
            w.state = WriterState::Prolog;
            w.last_token = Some(Token::ProcessingInstruction);

            let quote = w.quote();
            let mut decl = format!("<?xml version={quote}1.0{quote}");
            if let Some(encoding) = w.out.encoding() {
                decl.push_str(&format!(" encoding={quote}{encoding}{quote}"));
            }
            if let Some(standalone) = standalone {
                let value = if standalone { "yes" } else { "no" };
                decl.push_str(&format!(" standalone={quote}{value}{quote}"));
            }
            decl.push_str("?>");
            w.out.write_str(&decl)?;
            Ok(())
        })
    }

    /// Close every open attribute and element and flush the output.
    ///
    /// Afterwards the writer accepts a new document or fragment.
    #[doc(alias = "xmlTextWriterEndDocument")]
    pub fn end_document(&mut self) -> Result<()> {
        self.guarded(|w| {
            if w.state == WriterState::Error
                || (w.table == StateTable::Document
                    && matches!(w.state, WriterState::Prolog | WriterState::PostDtd))
            {
                return Err(XmlWriterError::DocumentIncomplete);
            }
            w.auto_complete_all()?;
            // forget whatever top-level attributes left on the root scope
            w.nsstack.pop_to(1);
            w.stack = TagStack::new();
            w.table = StateTable::Fragment;
            w.state = WriterState::Start;
            w.last_token = None;
            w.out.flush()?;
            Ok(())
        })
    }

    fn auto_complete_all(&mut self) -> Result<()> {
        if self.flush {
            self.flush_encoders()?;
        }
        if self.state == WriterState::AttrOnly {
            self.advance(Token::EndAttribute)?;
        }
        while self.stack.depth() > 0 {
            self.write_end_element(false)?;
        }
        Ok(())
    }

    /// Write a DOCTYPE declaration.
    #[doc(alias = "xmlTextWriterWriteDTD")]
    pub fn write_doc_type(
        &mut self,
        name: &str,
        pubid: Option<&str>,
        sysid: Option<&str>,
        subset: Option<&str>,
    ) -> Result<()> {
        self.guarded(|w| {
            if !check_name(name, false, w.namespaces) {
                return Err(XmlWriterError::InvalidName {
                    name: name.to_owned(),
                });
            }
            let mut decl = format!("<!DOCTYPE {name}");
            if let Some(pubid) = pubid {
                let pq = w.literal_quote(pubid)?;
                let sysid = sysid.unwrap_or_default();
                let sq = w.literal_quote(sysid)?;
                decl.push_str(&format!(" PUBLIC {pq}{pubid}{pq} {sq}{sysid}{sq}"));
            } else if let Some(sysid) = sysid {
                let sq = w.literal_quote(sysid)?;
                decl.push_str(&format!(" SYSTEM {sq}{sysid}{sq}"));
            }
            if let Some(subset) = subset {
                decl.push('[');
                decl.push_str(subset);
                decl.push(']');
            }
            decl.push('>');

            w.advance(Token::Doctype)?;
            w.out.write_str(&decl)?;
            Ok(())
        })
    }

    fn literal_quote(&self, literal: &str) -> Result<&'static str> {
        let quote = self.quote();
        if !literal.contains(quote) {
            return Ok(quote);
        }
        let other = if quote == "\"" { "'" } else { "\"" };
        if literal.contains(other) {
            return Err(XmlWriterError::InvalidDocTypeLiteral {
                literal: literal.to_owned(),
            });
        }
        Ok(other)
    }

    /// Start an element.
    ///
    /// - `prefix` without `ns` must already be bound.
    /// - `ns` without `prefix` reuses the prefix bound to `ns`, or makes
    ///   `ns` the default namespace of the element.
    /// - Both bind `prefix` to `ns` for the element and its descendants.
    ///
    /// The element name itself is not validated.
    #[doc(alias = "xmlTextWriterStartElementNS")]
    pub fn start_element(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        ns: Option<&str>,
    ) -> Result<()> {
        self.guarded(|w| w.start_element_impl(prefix, local_name, ns))
    }

    fn start_element_impl(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        ns: Option<&str>,
    ) -> Result<()> {
        if local_name.is_empty() {
            return Err(XmlWriterError::InvalidName {
                name: String::new(),
            });
        }
        if !self.namespaces
            && (prefix.is_some_and(|p| !p.is_empty()) || ns.is_some_and(|ns| !ns.is_empty()))
        {
            return Err(XmlWriterError::NamespacesDisabled);
        }
        if prefix == Some("xmlns") {
            return Err(XmlWriterError::ReservedPrefixMisuse {
                prefix: "xmlns".to_owned(),
                namespace: ns.unwrap_or_default().to_owned(),
            });
        }

        self.advance(Token::StartElement)?;
        self.stack.push(self.nsstack.len());

        let mut prefix = prefix.map(str::to_owned);
        if self.namespaces {
            match ns {
                None => {
                    if let Some(p) = prefix.as_deref().filter(|p| !p.is_empty()) {
                        if self.nsstack.lookup(p).is_none() {
                            return Err(XmlWriterError::UndeclaredPrefix {
                                prefix: p.to_owned(),
                            });
                        }
                    }
                }
                Some(ns) => match prefix.as_deref() {
                    None => match self.nsstack.find_prefix(ns).map(str::to_owned) {
                        Some(defined) => prefix = Some(defined),
                        None => self.push_namespace(None, ns, false)?,
                    },
                    Some("") => self.push_namespace(None, ns, false)?,
                    Some(p) if ns.is_empty() => {
                        return Err(XmlWriterError::EmptyNamespacePrefix {
                            prefix: p.to_owned(),
                        });
                    }
                    Some(p) => {
                        verify_prefix_xml(Some(p), ns)?;
                        self.push_namespace(Some(p), ns, false)?;
                    }
                },
            }
        }
        let prefix = prefix.filter(|p| !p.is_empty());

        let mut tag = String::with_capacity(1 + local_name.len());
        tag.push('<');
        if let Some(prefix) = prefix.as_deref() {
            tag.push_str(prefix);
            tag.push(':');
        }
        tag.push_str(local_name);
        self.out.write_str(&tag)?;

        let top = self.stack.top_mut();
        top.name = local_name.to_owned();
        top.prefix = prefix;
        Ok(())
    }

    /// Close the current element, as `<x />` if it has no content.
    #[doc(alias = "xmlTextWriterEndElement")]
    pub fn end_element(&mut self) -> Result<()> {
        self.guarded(|w| w.write_end_element(false))
    }

    /// Close the current element, always with a separate end tag.
    #[doc(alias = "xmlTextWriterFullEndElement")]
    pub fn full_end_element(&mut self) -> Result<()> {
        self.guarded(|w| w.write_end_element(true))
    }

    fn write_end_element(&mut self, long_format: bool) -> Result<()> {
        if self.stack.depth() == 0 && !matches!(self.state, WriterState::Error) {
            return Err(XmlWriterError::NoOpenElement);
        }
        self.advance(if long_format {
            Token::LongEndElement
        } else {
            Token::EndElement
        })?;

        if self.last_token == Some(Token::LongEndElement) {
            if self.indented() {
                self.indent(true)?;
            }
            let top = self.stack.top();
            let mut tag = String::with_capacity(3 + top.name.len());
            tag.push_str("</");
            if let Some(prefix) = top.prefix.as_deref() {
                tag.push_str(prefix);
                tag.push(':');
            }
            tag.push_str(&top.name);
            tag.push('>');
            self.out.write_str(&tag)?;
        }

        if let Some(tag) = self.stack.pop() {
            self.nsstack.pop_to(tag.ns_mark);
        }
        Ok(())
    }

    /// Start an attribute.
    ///
    /// `xml:lang`, `xml:space` and `xmlns`/`xmlns:*` attributes update the
    /// scope of the current element once they are closed. An attribute in
    /// a namespace always gets a prefix, generated if none is bound.
    #[doc(alias = "xmlTextWriterStartAttributeNS")]
    pub fn start_attribute(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        ns: Option<&str>,
    ) -> Result<()> {
        self.guarded(|w| w.start_attribute_impl(prefix, local_name, ns))
    }

    fn start_attribute_impl(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        ns: Option<&str>,
    ) -> Result<()> {
        if local_name.is_empty() {
            return Err(XmlWriterError::InvalidName {
                name: String::new(),
            });
        }
        if !self.namespaces
            && (prefix.is_some_and(|p| !p.is_empty()) || ns.is_some_and(|ns| !ns.is_empty()))
        {
            return Err(XmlWriterError::NamespacesDisabled);
        }

        self.advance(Token::StartAttribute)?;
        self.special_attr = SpecialAttribute::None;
        self.prefix_for_xmlns = None;

        let mut prefix = prefix.filter(|p| !p.is_empty()).map(str::to_owned);
        if self.namespaces {
            if prefix.is_none() {
                if ns == Some(XML_XMLNS_NAMESPACE) && local_name != "xmlns" {
                    prefix = Some("xmlns".to_owned());
                } else if ns == Some(XML_XML_NAMESPACE) {
                    prefix = Some("xml".to_owned());
                }
            }
            match prefix.as_deref() {
                Some("xml") => {
                    if let Some(ns) = ns.filter(|&ns| !ns.is_empty() && ns != XML_XML_NAMESPACE) {
                        return Err(XmlWriterError::ReservedPrefixMisuse {
                            prefix: "xml".to_owned(),
                            namespace: ns.to_owned(),
                        });
                    }
                    self.special_attr = match local_name {
                        "lang" => SpecialAttribute::XmlLang,
                        "space" => SpecialAttribute::XmlSpace,
                        _ => SpecialAttribute::None,
                    };
                }
                Some("xmlns") => {
                    if let Some(ns) = ns.filter(|&ns| !ns.is_empty() && ns != XML_XMLNS_NAMESPACE)
                    {
                        return Err(XmlWriterError::ReservedPrefixMisuse {
                            prefix: "xmlns".to_owned(),
                            namespace: ns.to_owned(),
                        });
                    }
                    self.prefix_for_xmlns = Some(local_name.to_owned());
                    self.special_attr = SpecialAttribute::XmlNs;
                }
                None if local_name == "xmlns" => {
                    if let Some(ns) = ns.filter(|&ns| !ns.is_empty() && ns != XML_XMLNS_NAMESPACE)
                    {
                        return Err(XmlWriterError::ReservedPrefixMisuse {
                            prefix: "xmlns".to_owned(),
                            namespace: ns.to_owned(),
                        });
                    }
                    self.special_attr = SpecialAttribute::XmlNs;
                }
                _ => match ns {
                    None => {
                        if let Some(p) = prefix.as_deref() {
                            if self.nsstack.lookup(p).is_none() {
                                return Err(XmlWriterError::UndeclaredPrefix {
                                    prefix: p.to_owned(),
                                });
                            }
                        }
                    }
                    Some("") => prefix = None,
                    Some(ns) => {
                        verify_prefix_xml(prefix.as_deref(), ns)?;
                        // no start tag can carry the declaration
                        if self.stack.depth() == 0 {
                            return Err(XmlWriterError::UndeclaredNamespace {
                                namespace: ns.to_owned(),
                            });
                        }
                        // a prefix already used by this start tag cannot be
                        // rebound for an attribute
                        if prefix.as_deref().is_some_and(|p| self.prefix_in_use(p)) {
                            prefix = None;
                        }
                        let defined = self.nsstack.find_prefix(ns).map(str::to_owned);
                        match (prefix.take(), defined) {
                            (None, Some(defined)) => prefix = Some(defined),
                            (Some(p), Some(defined)) if p == defined => prefix = Some(defined),
                            (p, _) => {
                                let p = match p {
                                    Some(p) => p,
                                    None => self.generate_prefix(),
                                };
                                self.push_namespace(Some(&p), ns, false)?;
                                prefix = Some(p);
                            }
                        }
                    }
                },
            }
        } else {
            self.special_attr = match local_name {
                "xml:lang" => SpecialAttribute::XmlLang,
                "xml:space" => SpecialAttribute::XmlSpace,
                _ => SpecialAttribute::None,
            };
        }

        let quote = self.quote();
        let mut name = String::with_capacity(local_name.len() + 2);
        if let Some(prefix) = prefix {
            name.push_str(&prefix);
            name.push(':');
            if self.stack.depth() > 0 && prefix != "xml" && prefix != "xmlns" {
                self.stack.top_mut().used_prefixes.push(prefix);
            }
        }
        name.push_str(local_name);
        self.out.write_str(&name)?;
        self.out.write_str("=")?;
        self.out.write_str(quote)?;
        self.encoder
            .start_attribute(self.special_attr != SpecialAttribute::None);
        Ok(())
    }

    /// Close the current attribute.
    #[doc(alias = "xmlTextWriterEndAttribute")]
    pub fn end_attribute(&mut self) -> Result<()> {
        self.guarded(|w| w.advance(Token::EndAttribute))
    }

    /// Write a complete attribute.
    #[doc(alias = "xmlTextWriterWriteAttributeNS")]
    pub fn write_attribute_string(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        ns: Option<&str>,
        value: &str,
    ) -> Result<()> {
        self.start_attribute(prefix, local_name, ns)?;
        self.write_string(value)?;
        self.end_attribute()
    }

    /// Write a complete element with optional text content.
    #[doc(alias = "xmlTextWriterWriteElementNS")]
    pub fn write_element_string(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        ns: Option<&str>,
        value: Option<&str>,
    ) -> Result<()> {
        self.start_element(prefix, local_name, ns)?;
        if let Some(value) = value {
            self.write_string(value)?;
        }
        self.end_element()
    }

    /// Write a CDATA section.
    #[doc(alias = "xmlTextWriterWriteCDATA")]
    pub fn write_cdata(&mut self, text: &str) -> Result<()> {
        self.guarded(|w| {
            if text.contains("]]>") {
                return Err(XmlWriterError::InvalidCommentOrCDataOrPIContent {
                    kind: MarkupKind::CData,
                });
            }
            w.advance(Token::CData)?;
            w.out.write_str("<![CDATA[")?;
            w.encoder.write_raw(&mut w.out, text)?;
            w.out.write_str("]]>")?;
            Ok(())
        })
    }

    /// Write a comment.
    #[doc(alias = "xmlTextWriterWriteComment")]
    pub fn write_comment(&mut self, text: &str) -> Result<()> {
        self.guarded(|w| {
            if text.contains("--") || text.ends_with('-') {
                return Err(XmlWriterError::InvalidCommentOrCDataOrPIContent {
                    kind: MarkupKind::Comment,
                });
            }
            w.advance(Token::Comment)?;
            w.out.write_str("<!--")?;
            w.encoder.write_raw(&mut w.out, text)?;
            w.out.write_str("-->")?;
            Ok(())
        })
    }

    /// Write a processing instruction.
    ///
    /// The `xml` target is reserved for the XML declaration, which is
    /// written by [`XmlTextWriter::start_document`] or as the very first
    /// construct of a fragment.
    #[doc(alias = "xmlTextWriterWritePI")]
    pub fn write_processing_instruction(&mut self, name: &str, text: &str) -> Result<()> {
        self.guarded(|w| {
            if text.contains("?>") {
                return Err(XmlWriterError::InvalidCommentOrCDataOrPIContent {
                    kind: MarkupKind::ProcessingInstruction,
                });
            }
            if name.eq_ignore_ascii_case("xml")
                && (w.table == StateTable::Document || w.state != WriterState::Start)
            {
                return Err(XmlWriterError::DuplicateXmlDeclaration);
            }
            if !check_name(name, false, w.namespaces) {
                return Err(XmlWriterError::InvalidName {
                    name: name.to_owned(),
                });
            }
            w.advance(Token::ProcessingInstruction)?;
            w.out.write_str("<?")?;
            w.out.write_str(name)?;
            if !text.is_empty() {
                w.out.write_str(" ")?;
                w.encoder.write_raw(&mut w.out, text)?;
            }
            w.out.write_str("?>")?;
            Ok(())
        })
    }

    /// Write an entity reference, `&name;`.
    #[doc(alias = "xmlTextWriterWriteEntityRef")]
    pub fn write_entity_ref(&mut self, name: &str) -> Result<()> {
        self.guarded(|w| {
            if !check_name(name, false, w.namespaces) {
                return Err(XmlWriterError::InvalidName {
                    name: name.to_owned(),
                });
            }
            w.advance(Token::Content)?;
            w.encoder.write_entity_ref(&mut w.out, name)?;
            Ok(())
        })
    }

    /// Write a hexadecimal character reference for `codepoint`.
    #[doc(alias = "xmlTextWriterWriteCharEntity")]
    pub fn write_char_entity(&mut self, codepoint: u32) -> Result<()> {
        self.guarded(|w| {
            let Some(c) = char::from_u32(codepoint).filter(|c| c.is_xml_char()) else {
                return Err(XmlWriterError::InvalidCharacter { codepoint });
            };
            w.advance(Token::Content)?;
            w.encoder.write_char_entity(&mut w.out, c)?;
            Ok(())
        })
    }

    /// Write a character reference for a UTF-16 surrogate pair.
    pub fn write_surrogate_char_entity(&mut self, low: u16, high: u16) -> Result<()> {
        self.guarded(|w| {
            if !(0xD800..=0xDBFF).contains(&high) {
                return Err(XmlWriterError::InvalidCharacter {
                    codepoint: high as u32,
                });
            }
            if !(0xDC00..=0xDFFF).contains(&low) {
                return Err(XmlWriterError::InvalidCharacter {
                    codepoint: low as u32,
                });
            }
            let codepoint = 0x10000 + (((high as u32) - 0xD800) << 10) + ((low as u32) - 0xDC00);
            let Some(c) = char::from_u32(codepoint) else {
                return Err(XmlWriterError::InvalidCharacter { codepoint });
            };
            w.advance(Token::Content)?;
            w.encoder.write_char_entity(&mut w.out, c)?;
            Ok(())
        })
    }

    /// Write white space. Anything but XML blanks is refused.
    #[doc(alias = "xmlTextWriterWriteWhitespace")]
    pub fn write_whitespace(&mut self, text: &str) -> Result<()> {
        self.guarded(|w| {
            if !text.chars().all(|c| c.is_xml_blank_char()) {
                return Err(XmlWriterError::InvalidWhitespace);
            }
            w.advance(Token::Whitespace)?;
            w.encoder.write(&mut w.out, text)?;
            Ok(())
        })
    }

    /// Write escaped text.
    #[doc(alias = "xmlTextWriterWriteString")]
    pub fn write_string(&mut self, text: &str) -> Result<()> {
        self.guarded(|w| {
            if text.is_empty() {
                return Ok(());
            }
            w.advance(Token::Content)?;
            w.encoder.write(&mut w.out, text)?;
            Ok(())
        })
    }

    /// Write escaped text from a character buffer.
    pub fn write_chars(&mut self, buffer: &[char]) -> Result<()> {
        let text = buffer.iter().collect::<String>();
        self.write_string(&text)
    }

    /// Write text as is, without any escaping.
    #[doc(alias = "xmlTextWriterWriteRaw")]
    pub fn write_raw(&mut self, text: &str) -> Result<()> {
        self.guarded(|w| {
            w.advance(Token::RawData)?;
            w.encoder.write_raw(&mut w.out, text)?;
            Ok(())
        })
    }

    /// Write a character buffer as is, without any escaping.
    #[doc(alias = "xmlTextWriterWriteRawLen")]
    pub fn write_raw_chars(&mut self, buffer: &[char]) -> Result<()> {
        let text = buffer.iter().collect::<String>();
        self.write_raw(&text)
    }

    /// Write `data` encoded in base64.
    ///
    /// Consecutive calls produce the encoding of the concatenated data.
    #[doc(alias = "xmlTextWriterWriteBase64")]
    pub fn write_base64(&mut self, data: &[u8]) -> Result<()> {
        self.guarded(|w| {
            w.advance(Token::Base64)?;
            let mut text = String::new();
            w.base64.encode(data, &mut text);
            w.encoder.write_raw(&mut w.out, &text)?;
            w.flush = true;
            Ok(())
        })
    }

    /// Write `data` encoded in uppercase hexadecimal.
    #[doc(alias = "xmlTextWriterWriteBinHex")]
    pub fn write_bin_hex(&mut self, data: &[u8]) -> Result<()> {
        self.guarded(|w| {
            w.advance(Token::Content)?;
            let mut text = String::with_capacity(data.len() * 2);
            encode_bin_hex(data, &mut text);
            w.encoder.write_raw(&mut w.out, &text)?;
            Ok(())
        })
    }

    /// Write a name as text, after checking it is a valid XML name.
    pub fn write_name(&mut self, name: &str) -> Result<()> {
        self.guarded(|w| {
            if !check_name(name, false, w.namespaces) {
                return Err(XmlWriterError::InvalidName {
                    name: name.to_owned(),
                });
            }
            w.advance(Token::Content)?;
            w.encoder.write(&mut w.out, name)?;
            Ok(())
        })
    }

    /// Write a name token as text.
    pub fn write_nm_token(&mut self, name: &str) -> Result<()> {
        self.guarded(|w| {
            if !validate_nmtoken(name) {
                return Err(XmlWriterError::InvalidName {
                    name: name.to_owned(),
                });
            }
            w.advance(Token::Content)?;
            w.encoder.write(&mut w.out, name)?;
            Ok(())
        })
    }

    /// Write `prefix:local_name` where `prefix` is the prefix bound to `ns`.
    ///
    /// Inside an attribute value a prefix is declared for `ns` if needed.
    /// Elsewhere `ns` must already have a prefix.
    pub fn write_qualified_name(&mut self, local_name: &str, ns: Option<&str>) -> Result<()> {
        self.guarded(|w| {
            if !check_name(local_name, true, w.namespaces) {
                return Err(XmlWriterError::InvalidName {
                    name: local_name.to_owned(),
                });
            }
            let ns = ns.filter(|ns| !ns.is_empty());
            if !w.namespaces && ns.is_some() {
                return Err(XmlWriterError::NamespacesDisabled);
            }
            w.advance(Token::Content)?;

            if let Some(ns) = ns.filter(|&ns| w.namespaces && ns != w.stack.top().default_ns) {
                let prefix = match w.nsstack.find_prefix(ns).map(str::to_owned) {
                    Some(prefix) => prefix,
                    None => {
                        if w.state != WriterState::Attribute {
                            return Err(XmlWriterError::UndeclaredNamespace {
                                namespace: ns.to_owned(),
                            });
                        }
                        let prefix = w.generate_prefix();
                        w.push_namespace(Some(&prefix), ns, false)?;
                        prefix
                    }
                };
                w.encoder.write(&mut w.out, &prefix)?;
                w.encoder.write(&mut w.out, ":")?;
                if w.state == WriterState::Attribute {
                    w.stack.top_mut().used_prefixes.push(prefix);
                }
            }
            w.encoder.write(&mut w.out, local_name)?;
            Ok(())
        })
    }

    /// Flush the output.
    #[doc(alias = "xmlTextWriterFlush")]
    pub fn flush(&mut self) -> Result<()> {
        self.guarded(|w| {
            w.out.flush()?;
            Ok(())
        })
    }

    /// Complete every open construct, flush the output and close the writer.
    ///
    /// Errors while completing the document are logged and ignored. Closing
    /// a closed writer does nothing.
    #[doc(alias = "xmlFreeTextWriter")]
    pub fn close(&mut self) -> Result<()> {
        if self.state == WriterState::Closed {
            return Ok(());
        }
        if let Err(err) = self.auto_complete_all() {
            warn!("document left incomplete on close: {err}");
        }
        self.state = WriterState::Closed;
        self.out.finish()?;
        Ok(())
    }
}

impl Drop for XmlTextWriter<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("failed to close the writer: {err}");
        }
    }
}

/// Refuse binding a prefix starting with `xml` to anything but the XML
/// namespace.
fn verify_prefix_xml(prefix: Option<&str>, ns: &str) -> Result<()> {
    if let Some(prefix) = prefix {
        if prefix.len() == 3
            && prefix.eq_ignore_ascii_case("xml")
            && ns != XML_XML_NAMESPACE
        {
            return Err(XmlWriterError::ReservedPrefixMisuse {
                prefix: prefix.to_owned(),
                namespace: ns.to_owned(),
            });
        }
    }
    Ok(())
}
