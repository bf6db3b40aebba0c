//! Per-element bookkeeping.

/// How far the default namespace of an element has been materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum NamespaceState {
    /// No default namespace has been set on this element or its ancestors.
    #[default]
    Uninitialized,
    /// Inherited from an ancestor, nothing to write.
    InScopeNotDeclared,
    /// Set on this element, `xmlns="..."` has to be written when the start
    /// tag is closed.
    DeclaredPendingWrite,
    /// Written explicitly as an `xmlns` attribute.
    DeclaredWritten,
}

/// The value of the innermost `xml:space` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XmlSpace {
    #[default]
    None,
    Default,
    Preserve,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TagInfo {
    pub(crate) name: String,
    pub(crate) prefix: Option<String>,
    pub(crate) default_ns: String,
    pub(crate) default_ns_state: NamespaceState,
    pub(crate) xml_space: XmlSpace,
    pub(crate) xml_lang: Option<String>,
    /// Number of namespace bindings when the element was opened.
    pub(crate) ns_mark: usize,
    pub(crate) prefix_count: usize,
    /// Prefixes written on the attributes of the start tag.
    pub(crate) used_prefixes: Vec<String>,
    pub(crate) mixed: bool,
}

impl TagInfo {
    fn new(ns_mark: usize) -> Self {
        Self {
            ns_mark,
            ..Default::default()
        }
    }
}

/// Stack of open elements.
///
/// Index 0 holds a sentinel standing for "no open element", so that the
/// top of the stack always exists.
#[derive(Debug)]
pub(crate) struct TagStack {
    tags: Vec<TagInfo>,
}

impl TagStack {
    pub(crate) fn new() -> Self {
        Self {
            tags: vec![TagInfo::new(0)],
        }
    }

    /// Number of open elements.
    pub(crate) fn depth(&self) -> usize {
        self.tags.len() - 1
    }

    pub(crate) fn top(&self) -> &TagInfo {
        &self.tags[self.tags.len() - 1]
    }

    pub(crate) fn top_mut(&mut self) -> &mut TagInfo {
        let last = self.tags.len() - 1;
        &mut self.tags[last]
    }

    /// The element enclosing the top one, or the sentinel.
    pub(crate) fn parent(&self) -> &TagInfo {
        &self.tags[self.tags.len().saturating_sub(2)]
    }

    /// Open a new element, inheriting the default namespace and the mixed
    /// content flag of its parent.
    pub(crate) fn push(&mut self, ns_mark: usize) -> &mut TagInfo {
        let parent = self.top();
        let mut tag = TagInfo::new(ns_mark);
        tag.default_ns = parent.default_ns.clone();
        if parent.default_ns_state != NamespaceState::Uninitialized {
            tag.default_ns_state = NamespaceState::InScopeNotDeclared;
        }
        tag.mixed = parent.mixed;
        self.tags.push(tag);
        self.top_mut()
    }

    /// Close the top element. The sentinel is never removed.
    pub(crate) fn pop(&mut self) -> Option<TagInfo> {
        if self.depth() == 0 {
            return None;
        }
        self.tags.pop()
    }

    pub(crate) fn xml_space(&self) -> XmlSpace {
        self.tags
            .iter()
            .rev()
            .map(|tag| tag.xml_space)
            .find(|&space| space != XmlSpace::None)
            .unwrap_or_default()
    }

    pub(crate) fn xml_lang(&self) -> Option<&str> {
        self.tags.iter().rev().find_map(|tag| tag.xml_lang.as_deref())
    }
}
