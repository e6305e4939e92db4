use std::collections::HashMap;

use cranelift_entity::{entity_impl, PrimaryMap};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct StrId(u32);

entity_impl! { StrId }

/// Interner for identifier names and string literals. One pool serves one
/// parser instance; everything matched against it is compared by [`StrId`].
#[derive(Default)]
pub struct StringPool {
    strings: PrimaryMap<StrId, Box<str>>,
    index: HashMap<Box<str>, StrId>,
}

impl StringPool {
    pub fn new() -> StringPool {
        StringPool::default()
    }

    pub fn intern(&mut self, text: &str) -> StrId {
        if let Some(&id) = self.index.get(text) {
            return id;
        }
        let id = self.strings.push(text.into());
        self.index.insert(text.into(), id);
        id
    }

    /// Looks a string up without interning it.
    pub fn lookup(&self, text: &str) -> Option<StrId> {
        self.index.get(text).copied()
    }

    pub fn get(&self, id: StrId) -> &str {
        &self.strings[id]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.len() == 0
    }
}
