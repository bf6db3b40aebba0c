use std::{
    cell::RefCell,
    io::{self, Write},
    rc::Rc,
};

use xmltw::{
    Formatting, MarkupKind, Token, WriteState, WriterState, XmlOutputBuffer, XmlTextWriter,
    XmlWriterError, XmlWriterSettings, find_encoding_handler,
};

/// A sink that can be inspected while a writer still holds it.
#[derive(Clone, Default)]
struct SharedSink(Rc<RefCell<Vec<u8>>>);

impl SharedSink {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct BrokenSink;

impl Write for BrokenSink {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::other("broken pipe"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::other("broken pipe"))
    }
}

fn write_with(
    settings: XmlWriterSettings,
    f: impl FnOnce(&mut XmlTextWriter) -> xmltw::Result<()>,
) -> String {
    let mut buf = vec![];
    {
        let out = XmlOutputBuffer::from_writer(&mut buf, None);
        let mut writer = XmlTextWriter::with_settings(out, settings).unwrap();
        f(&mut writer).unwrap();
        writer.close().unwrap();
    }
    String::from_utf8(buf).unwrap()
}

fn write(f: impl FnOnce(&mut XmlTextWriter) -> xmltw::Result<()>) -> String {
    write_with(XmlWriterSettings::default(), f)
}

#[test]
fn element_with_attribute_and_text() {
    let out = write(|w| {
        w.start_element(None, "root", None)?;
        w.write_attribute_string(None, "id", None, "1")?;
        w.write_string("hi")?;
        w.end_element()
    });
    assert_eq!(out, r#"<root id="1">hi</root>"#);
}

#[test]
fn second_attribute_closes_the_first() {
    let out = write(|w| {
        w.start_element(None, "a", None)?;
        w.start_attribute(None, "x", None)?;
        w.write_string("1")?;
        w.start_attribute(None, "y", None)?;
        w.write_string("2")?;
        w.end_element()
    });
    assert_eq!(out, r#"<a x="1" y="2" />"#);
}

#[test]
fn full_end_element_never_self_closes() {
    let out = write(|w| {
        w.start_element(None, "a", None)?;
        w.full_end_element()
    });
    assert_eq!(out, "<a></a>");
}

#[test]
fn invalid_comments_are_rejected() {
    for text in ["a--b", "a-"] {
        let sink = SharedSink::default();
        let mut writer = XmlTextWriter::new(XmlOutputBuffer::from_writer(sink.clone(), None));
        let err = writer.write_comment(text).unwrap_err();
        assert!(matches!(
            err,
            XmlWriterError::InvalidCommentOrCDataOrPIContent {
                kind: MarkupKind::Comment
            }
        ));
        assert_eq!(writer.write_state(), WriteState::Error);
        writer.close().unwrap();
        assert_eq!(sink.contents(), "");
    }
}

#[test]
fn invalid_cdata_and_pi_content() {
    let mut buf = vec![];
    let mut writer = XmlTextWriter::new(XmlOutputBuffer::from_writer(&mut buf, None));
    assert!(matches!(
        writer.write_cdata("a]]>b"),
        Err(XmlWriterError::InvalidCommentOrCDataOrPIContent {
            kind: MarkupKind::CData
        })
    ));

    let mut buf = vec![];
    let mut writer = XmlTextWriter::new(XmlOutputBuffer::from_writer(&mut buf, None));
    assert!(matches!(
        writer.write_processing_instruction("pi", "a?>"),
        Err(XmlWriterError::InvalidCommentOrCDataOrPIContent {
            kind: MarkupKind::ProcessingInstruction
        })
    ));
}

#[test]
fn closed_writer_rejects_every_call() {
    let sink = SharedSink::default();
    let mut writer = XmlTextWriter::new(XmlOutputBuffer::from_writer(sink.clone(), None));
    writer.start_element(None, "a", None).unwrap();
    writer.close().unwrap();
    let written = sink.contents();
    assert_eq!(written, "<a />");
    assert_eq!(writer.write_state(), WriteState::Closed);

    assert!(matches!(writer.write_string("x"), Err(XmlWriterError::WriterClosed)));
    assert!(matches!(writer.write_string(""), Err(XmlWriterError::WriterClosed)));
    assert!(matches!(
        writer.start_element(None, "b", None),
        Err(XmlWriterError::WriterClosed)
    ));
    assert!(matches!(writer.end_element(), Err(XmlWriterError::WriterClosed)));
    assert!(matches!(writer.write_base64(b"x"), Err(XmlWriterError::WriterClosed)));
    assert!(matches!(writer.flush(), Err(XmlWriterError::WriterClosed)));
    assert!(matches!(writer.end_document(), Err(XmlWriterError::WriterClosed)));
    assert_eq!(writer.write_state(), WriteState::Closed);
    writer.close().unwrap();
    drop(writer);
    assert_eq!(sink.contents(), written);
}

#[test]
fn close_completes_open_constructs() {
    let out = write(|w| {
        w.start_element(None, "a", None)?;
        w.start_element(None, "b", None)?;
        w.start_attribute(None, "x", None)?;
        w.write_string("1")
    });
    assert_eq!(out, r#"<a><b x="1" /></a>"#);
}

#[test]
fn drop_closes_the_writer() {
    let sink = SharedSink::default();
    {
        let mut writer = XmlTextWriter::new(XmlOutputBuffer::from_writer(sink.clone(), None));
        writer.start_element(None, "a", None).unwrap();
        writer.write_string("t").unwrap();
    }
    assert_eq!(sink.contents(), "<a>t</a>");
}

#[test]
fn close_after_error_keeps_what_was_written() {
    let sink = SharedSink::default();
    let mut writer = XmlTextWriter::new(XmlOutputBuffer::from_writer(sink.clone(), None));
    writer.start_element(None, "a", None).unwrap();
    writer.write_string("t").unwrap();
    assert!(writer.write_whitespace("x").is_err());
    writer.close().unwrap();
    assert_eq!(sink.contents(), "<a>t");
}

#[test]
fn single_document() {
    let out = write(|w| {
        w.start_document(Some(true))?;
        w.write_doc_type("html", None, None, None)?;
        w.start_element(None, "html", None)?;
        w.end_element()?;
        w.write_comment("x")?;
        let err = w.start_element(None, "second", None).unwrap_err();
        assert!(matches!(
            err,
            XmlWriterError::InvalidTransition {
                token: Token::StartElement,
                state: WriterState::Epilog
            }
        ));
        Ok(())
    });
    assert_eq!(
        out,
        r#"<?xml version="1.0" standalone="yes"?><!DOCTYPE html><html /><!--x-->"#
    );
}

#[test]
fn document_mode_rules() {
    let mut buf = vec![];
    let mut writer = XmlTextWriter::new(XmlOutputBuffer::from_writer(&mut buf, None));
    writer.start_document(None).unwrap();
    assert_eq!(writer.write_state(), WriteState::Prolog);
    assert!(matches!(
        writer.start_document(None),
        Err(XmlWriterError::DuplicateXmlDeclaration)
    ));

    let mut buf = vec![];
    let mut writer = XmlTextWriter::new(XmlOutputBuffer::from_writer(&mut buf, None));
    writer.start_document(None).unwrap();
    assert!(matches!(
        writer.write_processing_instruction("xml", "version='1.0'"),
        Err(XmlWriterError::DuplicateXmlDeclaration)
    ));

    let mut buf = vec![];
    let mut writer = XmlTextWriter::new(XmlOutputBuffer::from_writer(&mut buf, None));
    writer.start_document(None).unwrap();
    assert!(matches!(
        writer.write_string("text"),
        Err(XmlWriterError::InvalidTransition {
            token: Token::Content,
            state: WriterState::Prolog
        })
    ));

    let mut buf = vec![];
    let mut writer = XmlTextWriter::new(XmlOutputBuffer::from_writer(&mut buf, None));
    writer.start_document(None).unwrap();
    assert!(matches!(
        writer.end_document(),
        Err(XmlWriterError::DocumentIncomplete)
    ));
}

#[test]
fn end_document_returns_to_fragment_mode() {
    let out = write(|w| {
        w.start_document(None)?;
        w.start_element(None, "r", None)?;
        w.end_document()?;
        assert_eq!(w.write_state(), WriteState::Start);
        w.start_element(None, "s", None)?;
        w.end_element()?;
        w.start_element(None, "t", None)?;
        w.end_document()
    });
    assert_eq!(out, r#"<?xml version="1.0"?><r /><s /><t />"#);
}

#[test]
fn fragment_xml_pi_only_at_start() {
    let out = write(|w| {
        w.write_processing_instruction("xml", "version=\"1.0\"")?;
        w.start_element(None, "a", None)?;
        assert!(matches!(
            w.write_processing_instruction("XML", ""),
            Err(XmlWriterError::DuplicateXmlDeclaration)
        ));
        Ok(())
    });
    // the failed call leaves the writer in the error state, so close cannot
    // complete the element
    assert_eq!(out, r#"<?xml version="1.0"?><a"#);
}

#[test]
fn indentation() {
    let out = write_with(XmlWriterSettings::indented(), |w| {
        w.start_element(None, "a", None)?;
        w.start_element(None, "b", None)?;
        w.write_element_string(None, "c", None, None)?;
        w.end_element()?;
        w.start_element(None, "m", None)?;
        w.write_string("t")?;
        w.write_element_string(None, "i", None, Some("x"))?;
        w.end_element()?;
        w.end_element()
    });
    assert_eq!(out, "<a>\n  <b>\n    <c />\n  </b>\n  <m>t<i>x</i></m>\n</a>");
}

#[test]
fn indentation_with_custom_char() {
    let settings = XmlWriterSettings {
        formatting: Formatting::Indented,
        indentation: 1,
        indent_char: '\t',
        ..Default::default()
    };
    let out = write_with(settings, |w| {
        w.write_comment(" c ")?;
        w.start_element(None, "a", None)?;
        w.write_element_string(None, "b", None, None)?;
        w.end_element()
    });
    assert_eq!(out, "<!-- c -->\n<a>\n\t<b />\n</a>");
}

#[test]
fn escaping() {
    let out = write(|w| {
        w.start_element(None, "a", None)?;
        w.write_attribute_string(None, "v", None, "\"x'\n<")?;
        w.write_string("<&>\"\r")?;
        w.end_element()
    });
    assert_eq!(out, "<a v=\"&quot;x'&#xA;&lt;\">&lt;&amp;&gt;\"&#xD;</a>");

    let settings = XmlWriterSettings {
        quote_char: '\'',
        ..Default::default()
    };
    let out = write_with(settings, |w| {
        w.start_element(None, "a", None)?;
        w.write_attribute_string(None, "v", None, "\"'")?;
        w.end_element()
    });
    assert_eq!(out, "<a v='\"&apos;' />");
}

#[test]
fn raw_and_references() {
    let out = write(|w| {
        w.start_element(None, "a", None)?;
        w.write_raw("<b/>")?;
        w.write_entity_ref("nbsp")?;
        w.write_char_entity(0x3042)?;
        w.write_surrogate_char_entity(0xDE00, 0xD83D)?;
        w.write_raw_chars(&['&', 'x'])?;
        w.write_chars(&['&', 'y'])?;
        w.end_element()
    });
    assert_eq!(out, "<a><b/>&nbsp;&#x3042;&#x1F600;&x&amp;y</a>");
}

#[test]
fn invalid_characters() {
    let mut buf = vec![];
    let mut writer = XmlTextWriter::new(XmlOutputBuffer::from_writer(&mut buf, None));
    assert!(matches!(
        writer.write_char_entity(0xD800),
        Err(XmlWriterError::InvalidCharacter { codepoint: 0xD800 })
    ));

    let mut buf = vec![];
    let mut writer = XmlTextWriter::new(XmlOutputBuffer::from_writer(&mut buf, None));
    assert!(matches!(
        writer.write_surrogate_char_entity(0xD800, 0xDC00),
        Err(XmlWriterError::InvalidCharacter { codepoint: 0xDC00 })
    ));
}

#[test]
fn names_and_tokens() {
    let out = write(|w| {
        w.start_element(None, "a", None)?;
        w.write_name("p:local")?;
        w.write_string(" ")?;
        w.write_nm_token("1.5")?;
        w.end_element()
    });
    assert_eq!(out, "<a>p:local 1.5</a>");

    let mut buf = vec![];
    let mut writer = XmlTextWriter::new(XmlOutputBuffer::from_writer(&mut buf, None));
    assert!(matches!(
        writer.write_name("1a"),
        Err(XmlWriterError::InvalidName { .. })
    ));

    let mut buf = vec![];
    let mut writer = XmlTextWriter::new(XmlOutputBuffer::from_writer(&mut buf, None));
    assert!(matches!(
        writer.write_entity_ref("a b"),
        Err(XmlWriterError::InvalidName { .. })
    ));
}

#[test]
fn whitespace_only() {
    let out = write(|w| {
        w.write_whitespace(" \t\n")?;
        w.write_element_string(None, "a", None, None)
    });
    assert_eq!(out, " \t\n<a />");

    let mut buf = vec![];
    let mut writer = XmlTextWriter::new(XmlOutputBuffer::from_writer(&mut buf, None));
    assert!(matches!(
        writer.write_whitespace(" x"),
        Err(XmlWriterError::InvalidWhitespace)
    ));
}

#[test]
fn binary_payloads() {
    let out = write(|w| {
        w.start_element(None, "a", None)?;
        for chunk in [&b"hel"[..], b"lo wor", b"ld"] {
            w.write_base64(chunk)?;
        }
        w.end_element()?;
        w.start_element(None, "b", None)?;
        w.write_bin_hex(&[0xDE, 0xAD, 0x0F])?;
        w.end_element()
    });
    assert_eq!(out, "<a>aGVsbG8gd29ybGQ=</a><b>DEAD0F</b>");
}

#[test]
fn base64_in_attribute_is_flushed_before_closing() {
    let out = write(|w| {
        w.start_element(None, "a", None)?;
        w.start_attribute(None, "data", None)?;
        w.write_base64(b"ab")?;
        w.end_attribute()?;
        w.end_element()
    });
    assert_eq!(out, r#"<a data="YWI=" />"#);
}

#[test]
fn xml_space_values() {
    let mut buf = vec![];
    let mut writer = XmlTextWriter::new(XmlOutputBuffer::from_writer(&mut buf, None));
    writer.start_element(None, "a", None).unwrap();
    let err = writer
        .write_attribute_string(Some("xml"), "space", None, "keep")
        .unwrap_err();
    assert!(matches!(err, XmlWriterError::InvalidXmlSpaceValue { value } if value == "keep"));
    assert_eq!(writer.write_state(), WriteState::Error);
}

#[test]
fn top_level_attribute() {
    let out = write(|w| {
        w.start_attribute(None, "a", None)?;
        assert_eq!(w.write_state(), WriteState::Attribute);
        w.write_string("v")?;
        w.end_attribute()?;
        assert_eq!(w.write_state(), WriteState::Content);
        Ok(())
    });
    assert_eq!(out, r#"a="v""#);
}

#[test]
fn attribute_after_content_is_refused() {
    let mut buf = vec![];
    let mut writer = XmlTextWriter::new(XmlOutputBuffer::from_writer(&mut buf, None));
    writer.start_element(None, "a", None).unwrap();
    writer.write_string("x").unwrap();
    assert!(matches!(
        writer.start_attribute(None, "b", None),
        Err(XmlWriterError::InvalidTransition {
            token: Token::StartAttribute,
            state: WriterState::Content
        })
    ));
}

#[test]
fn doctype_literals() {
    let out = write(|w| {
        w.write_doc_type(
            "d",
            Some("-//X//\"1\""),
            Some("d.dtd"),
            Some("<!ENTITY e 'x'>"),
        )?;
        w.write_element_string(None, "d", None, None)
    });
    assert_eq!(
        out,
        r#"<!DOCTYPE d PUBLIC '-//X//"1"' "d.dtd"[<!ENTITY e 'x'>]><d />"#
    );

    let mut buf = vec![];
    let mut writer = XmlTextWriter::new(XmlOutputBuffer::from_writer(&mut buf, None));
    assert!(matches!(
        writer.write_doc_type("d", None, Some("a'b\"c"), None),
        Err(XmlWriterError::InvalidDocTypeLiteral { .. })
    ));
}

#[test]
fn output_encoding() {
    let mut buf = vec![];
    {
        let out = XmlOutputBuffer::from_writer(&mut buf, find_encoding_handler("iso-8859-1"));
        let mut writer = XmlTextWriter::new(out);
        writer.start_document(None).unwrap();
        writer.write_element_string(None, "a", None, Some("\u{E9}\u{3042}")).unwrap();
        writer.close().unwrap();
    }
    assert_eq!(
        buf,
        b"<?xml version=\"1.0\" encoding=\"windows-1252\"?><a>\xE9&#12354;</a>"
    );
}

#[test]
fn sink_errors_poison_the_writer() {
    let mut writer = XmlTextWriter::new(XmlOutputBuffer::from_writer(BrokenSink, None));
    writer.start_element(None, "a", None).unwrap();
    let err = writer.flush().unwrap_err();
    assert!(err.is_io());
    assert_eq!(writer.write_state(), WriteState::Error);
    assert!(writer.close().is_err());
    assert_eq!(writer.write_state(), WriteState::Closed);
}
