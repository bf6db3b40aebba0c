//! Error type shared by every fallible writer operation.

use std::{error::Error, fmt::Display, io};

use crate::writer::{Token, WriterState};

/// Markup constructs whose content is written verbatim and therefore
/// has to be checked for forbidden terminators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupKind {
    Comment,
    CData,
    ProcessingInstruction,
}

impl Display for MarkupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Comment => write!(f, "comment"),
            Self::CData => write!(f, "CDATA section"),
            Self::ProcessingInstruction => write!(f, "processing instruction"),
        }
    }
}

#[derive(Debug)]
pub enum XmlWriterError {
    /// `token` cannot be written while the writer is in `state`.
    InvalidTransition { token: Token, state: WriterState },
    /// A prefix was used without a namespace and nothing binds it.
    UndeclaredPrefix { prefix: String },
    /// A qualified name was requested for a namespace that has no prefix
    /// and a new prefix cannot be declared in the current state.
    UndeclaredNamespace { namespace: String },
    /// Misuse of `xml`, `xmlns` or of their reserved namespace URIs.
    ReservedPrefixMisuse { prefix: String, namespace: String },
    /// The default namespace of an element was declared twice with
    /// different URIs.
    NamespaceConflict { prefix: String, namespace: String },
    /// A non-empty prefix cannot be bound to the empty namespace.
    EmptyNamespacePrefix { prefix: String },
    /// A prefix or namespace was passed while namespace support is off.
    NamespacesDisabled,
    InvalidName { name: String },
    InvalidCommentOrCDataOrPIContent { kind: MarkupKind },
    InvalidWhitespace,
    InvalidXmlSpaceValue { value: String },
    InvalidCharacter { codepoint: u32 },
    /// A DOCTYPE literal contains both kinds of quote characters.
    InvalidDocTypeLiteral { literal: String },
    DuplicateXmlDeclaration,
    WriterClosed,
    NoOpenElement,
    DocumentIncomplete,
    InvalidQuoteChar { c: char },
    /// A setting cannot be changed in the current writer state.
    SettingLocked,
    Io(io::Error),
}

impl XmlWriterError {
    /// Check whether this error was raised by the underlying sink.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

impl Display for XmlWriterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTransition { token, state } => {
                write!(f, "Token {token} in state {state} would result in an invalid XML document")
            }
            Self::UndeclaredPrefix { prefix } => {
                write!(f, "An undefined prefix is in use: '{prefix}'")
            }
            Self::UndeclaredNamespace { namespace } => {
                write!(f, "The namespace '{namespace}' is not defined")
            }
            Self::ReservedPrefixMisuse { prefix, namespace } => {
                write!(
                    f,
                    "The prefix '{prefix}' cannot be bound to the namespace '{namespace}'"
                )
            }
            Self::NamespaceConflict { prefix, namespace } => {
                if prefix.is_empty() {
                    write!(
                        f,
                        "The default namespace cannot be redefined to '{namespace}' within the same start element tag"
                    )
                } else {
                    write!(
                        f,
                        "The prefix '{prefix}' cannot be redefined to '{namespace}' within the same start element tag"
                    )
                }
            }
            Self::EmptyNamespacePrefix { prefix } => {
                write!(f, "Cannot use a prefix '{prefix}' with an empty namespace")
            }
            Self::NamespacesDisabled => {
                write!(f, "Cannot set the namespace if Namespaces is 'false'")
            }
            Self::InvalidName { name } => write!(f, "Invalid name character in '{name}'"),
            Self::InvalidCommentOrCDataOrPIContent { kind } => write!(f, "Invalid {kind} content"),
            Self::InvalidWhitespace => {
                write!(f, "Only white space characters should be used")
            }
            Self::InvalidXmlSpaceValue { value } => {
                write!(f, "'{value}' is an invalid xml:space value")
            }
            Self::InvalidCharacter { codepoint } => {
                write!(f, "Invalid character U+{codepoint:04X}")
            }
            Self::InvalidDocTypeLiteral { literal } => {
                write!(f, "The literal '{literal}' contains both kinds of quotes")
            }
            Self::DuplicateXmlDeclaration => {
                write!(f, "The XML declaration can only be written once at the start of a document")
            }
            Self::WriterClosed => write!(f, "The writer is closed"),
            Self::NoOpenElement => write!(f, "There was no XML start tag open"),
            Self::DocumentIncomplete => write!(f, "The document is not complete"),
            Self::InvalidQuoteChar { c } => {
                write!(f, "Invalid quote character '{c}', only '\"' and '\\'' are allowed")
            }
            Self::SettingLocked => {
                write!(f, "The setting cannot be changed once writing has started")
            }
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl Error for XmlWriterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for XmlWriterError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

pub type Result<T> = std::result::Result<T, XmlWriterError>;
