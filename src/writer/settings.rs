/// Whether the writer indents child elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Formatting {
    #[default]
    None,
    Indented,
}

/// Initial configuration of an [`XmlTextWriter`](crate::XmlTextWriter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlWriterSettings {
    /// Namespace support. Can only be changed before anything is written.
    pub namespaces: bool,
    pub formatting: Formatting,
    /// Number of `indent_char` written per level when indenting.
    pub indentation: usize,
    pub indent_char: char,
    /// Quote character around attribute values, `"` or `'`.
    pub quote_char: char,
}

impl Default for XmlWriterSettings {
    fn default() -> Self {
        Self {
            namespaces: true,
            formatting: Formatting::None,
            indentation: 2,
            indent_char: ' ',
            quote_char: '"',
        }
    }
}

impl XmlWriterSettings {
    /// Settings producing indented output with the default indentation.
    pub fn indented() -> Self {
        Self {
            formatting: Formatting::Indented,
            ..Default::default()
        }
    }
}
