//! Writer states, tokens and the transition tables between them.

use std::fmt::Display;

/// Internal state of the autocomplete state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Nothing has been written yet.
    Start,
    /// Inside the prolog, before any DOCTYPE or element.
    Prolog,
    /// After a DOCTYPE, before the root element.
    PostDtd,
    /// Inside an open start tag.
    Element,
    /// Inside an attribute value of an open start tag.
    Attribute,
    /// Inside element content.
    Content,
    /// Inside a top-level attribute written without an element.
    AttrOnly,
    /// After the root element.
    Epilog,
    /// A previous call failed. Only closing is possible.
    Error,
    /// The writer has been closed.
    Closed,
}

impl WriterState {
    fn column(self) -> Option<usize> {
        match self {
            Self::Start => Some(0),
            Self::Prolog => Some(1),
            Self::PostDtd => Some(2),
            Self::Element => Some(3),
            Self::Attribute => Some(4),
            Self::Content => Some(5),
            Self::AttrOnly => Some(6),
            Self::Epilog => Some(7),
            Self::Error | Self::Closed => None,
        }
    }
}

impl Display for WriterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The kind of construct a writer call is about to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    ProcessingInstruction,
    Doctype,
    Comment,
    CData,
    StartElement,
    EndElement,
    LongEndElement,
    StartAttribute,
    EndAttribute,
    Content,
    Base64,
    RawData,
    Whitespace,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The coarse, externally observable state of a writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    Start,
    Prolog,
    Element,
    Attribute,
    Content,
    Error,
    Closed,
}

impl From<WriterState> for WriteState {
    fn from(value: WriterState) -> Self {
        match value {
            WriterState::Start => Self::Start,
            WriterState::Prolog | WriterState::PostDtd => Self::Prolog,
            WriterState::Element => Self::Element,
            WriterState::Attribute | WriterState::AttrOnly => Self::Attribute,
            WriterState::Content | WriterState::Epilog => Self::Content,
            WriterState::Error => Self::Error,
            WriterState::Closed => Self::Closed,
        }
    }
}

/// Which transition table drives the writer.
///
/// The fragment table is the default and accepts any sequence of
/// well-formed fragments. The document table is selected by writing the
/// XML declaration and enforces a single root element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum StateTable {
    #[default]
    Fragment,
    Document,
}

use WriterState::{
    AttrOnly as AO, Attribute as AT, Content as CT, Element as EL, Epilog as EP, Error as ER,
    PostDtd as PD, Prolog as PR,
};

// Columns: Start, Prolog, PostDtd, Element, Attribute, Content, AttrOnly, Epilog.
// Rows follow the declaration order of `Token`.
const FRAGMENT_TABLE: [[WriterState; 8]; 13] = [
    /* ProcessingInstruction */ [PR, PR, PD, CT, CT, CT, ER, EP],
    /* Doctype               */ [PD, PD, ER, ER, ER, ER, ER, ER],
    /* Comment               */ [PR, PR, PD, CT, CT, CT, ER, EP],
    /* CData                 */ [CT, CT, ER, CT, CT, CT, ER, EP],
    /* StartElement          */ [EL, EL, EL, EL, EL, EL, ER, EL],
    /* EndElement            */ [ER, ER, ER, CT, CT, CT, ER, ER],
    /* LongEndElement        */ [ER, ER, ER, CT, CT, CT, ER, ER],
    /* StartAttribute        */ [AO, ER, ER, AT, AT, ER, ER, ER],
    /* EndAttribute          */ [ER, ER, ER, ER, EL, ER, EP, ER],
    /* Content               */ [CT, CT, ER, CT, AT, CT, AO, EP],
    /* Base64                */ [CT, CT, ER, CT, AT, CT, AO, EP],
    /* RawData               */ [PR, PR, PD, CT, AT, CT, AO, EP],
    /* Whitespace            */ [PR, PR, PD, CT, AT, CT, AO, EP],
];

const DOCUMENT_TABLE: [[WriterState; 8]; 13] = [
    /* ProcessingInstruction */ [ER, PR, PD, CT, CT, CT, ER, EP],
    /* Doctype               */ [ER, PD, ER, ER, ER, ER, ER, ER],
    /* Comment               */ [ER, PR, PD, CT, CT, CT, ER, EP],
    /* CData                 */ [ER, ER, ER, CT, CT, CT, ER, ER],
    /* StartElement          */ [ER, EL, EL, EL, EL, EL, ER, ER],
    /* EndElement            */ [ER, ER, ER, CT, CT, CT, ER, ER],
    /* LongEndElement        */ [ER, ER, ER, CT, CT, CT, ER, ER],
    /* StartAttribute        */ [ER, ER, ER, AT, AT, ER, ER, ER],
    /* EndAttribute          */ [ER, ER, ER, ER, EL, ER, ER, ER],
    /* Content               */ [ER, ER, ER, CT, AT, CT, ER, ER],
    /* Base64                */ [ER, ER, ER, CT, AT, CT, ER, ER],
    /* RawData               */ [ER, PR, PD, CT, AT, CT, ER, EP],
    /* Whitespace            */ [ER, PR, PD, CT, AT, CT, ER, EP],
];

impl StateTable {
    /// Look up the state reached by writing `token` in `state`.
    ///
    /// `WriterState::Error` means the transition is not allowed.
    pub(crate) fn next(self, token: Token, state: WriterState) -> WriterState {
        let Some(column) = state.column() else {
            return WriterState::Error;
        };
        let table = match self {
            Self::Fragment => &FRAGMENT_TABLE,
            Self::Document => &DOCUMENT_TABLE,
        };
        table[token as usize][column]
    }
}
