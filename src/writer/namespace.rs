//! Namespace scope manager.

use std::{collections::HashMap, ops::Index};

use log::trace;

use crate::XML_XML_NAMESPACE;

/// Number of bindings that are searched linearly. Beyond this, lookups go
/// through a hash index.
pub(crate) const MAX_NAMESPACES_WALK_COUNT: usize = 16;

#[derive(Debug, Clone)]
pub(crate) struct NamespaceBinding {
    pub(crate) prefix: String,
    pub(crate) uri: String,
    /// Whether the declaration is already in the output, or does not need
    /// to be written at all.
    pub(crate) declared: bool,
    /// The binding of the same prefix hidden by this one.
    /// Only maintained while the hash index is active.
    shadowed: Option<usize>,
}

/// Append-only stack of prefixed namespace bindings.
///
/// Elements remember the length of the stack when they are opened and
/// truncate it back to that mark when they are closed.
#[derive(Debug)]
pub(crate) struct NamespaceStack {
    bindings: Vec<NamespaceBinding>,
    index: Option<HashMap<String, usize>>,
}

impl NamespaceStack {
    /// Create a stack holding only the implicit `xml` binding.
    pub(crate) fn new() -> Self {
        let mut stack = Self {
            bindings: vec![],
            index: None,
        };
        stack.push("xml", XML_XML_NAMESPACE, true);
        stack
    }

    pub(crate) fn len(&self) -> usize {
        self.bindings.len()
    }

    #[cfg(test)]
    pub(crate) fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    /// Push a binding and return its index.
    pub(crate) fn push(&mut self, prefix: &str, uri: &str, declared: bool) -> usize {
        let index = self.bindings.len();
        self.bindings.push(NamespaceBinding {
            prefix: prefix.to_owned(),
            uri: uri.to_owned(),
            declared,
            shadowed: None,
        });

        if let Some(map) = self.index.as_mut() {
            Self::index_binding(map, &mut self.bindings, index);
        } else if self.bindings.len() > MAX_NAMESPACES_WALK_COUNT {
            let mut map = HashMap::with_capacity(self.bindings.len() * 2);
            for i in 0..self.bindings.len() {
                Self::index_binding(&mut map, &mut self.bindings, i);
            }
            trace!("namespace index built over {} bindings", self.bindings.len());
            self.index = Some(map);
        }
        index
    }

    fn index_binding(map: &mut HashMap<String, usize>, bindings: &mut [NamespaceBinding], i: usize) {
        let binding = &mut bindings[i];
        binding.shadowed = map.insert(binding.prefix.clone(), i);
    }

    pub(crate) fn set_declared(&mut self, index: usize) {
        self.bindings[index].declared = true;
    }

    /// Index of the newest binding of `prefix`.
    pub(crate) fn lookup(&self, prefix: &str) -> Option<usize> {
        match &self.index {
            Some(map) => map.get(prefix).copied(),
            None => self.bindings.iter().rposition(|b| b.prefix == prefix),
        }
    }

    /// Index of the newest binding of `prefix` pushed at or after `mark`.
    pub(crate) fn lookup_in_scope(&self, prefix: &str, mark: usize) -> Option<usize> {
        match &self.index {
            Some(map) => map.get(prefix).copied().filter(|&i| i >= mark),
            None => self.bindings[mark..]
                .iter()
                .rposition(|b| b.prefix == prefix)
                .map(|i| i + mark),
        }
    }

    /// The prefix currently resolving to `uri`, preferring newer bindings.
    pub(crate) fn find_prefix(&self, uri: &str) -> Option<&str> {
        self.bindings
            .iter()
            .enumerate()
            .rev()
            .find(|&(i, b)| b.uri == uri && self.lookup(&b.prefix) == Some(i))
            .map(|(_, b)| b.prefix.as_str())
    }

    /// Bindings pushed at or after `mark`, with their indices.
    pub(crate) fn scope(
        &self,
        mark: usize,
    ) -> impl DoubleEndedIterator<Item = (usize, &NamespaceBinding)> {
        self.bindings.iter().enumerate().skip(mark)
    }

    /// Remove every binding pushed at or after `mark`.
    pub(crate) fn pop_to(&mut self, mark: usize) {
        if mark >= self.bindings.len() {
            return;
        }
        if let Some(map) = self.index.as_mut() {
            for binding in self.bindings[mark..].iter().rev() {
                match binding.shadowed {
                    Some(prev) => {
                        if let Some(slot) = map.get_mut(&binding.prefix) {
                            *slot = prev;
                        }
                    }
                    None => {
                        map.remove(&binding.prefix);
                    }
                }
            }
        }
        self.bindings.truncate(mark);
    }
}

impl Index<usize> for NamespaceStack {
    type Output = NamespaceBinding;

    fn index(&self, index: usize) -> &Self::Output {
        &self.bindings[index]
    }
}
