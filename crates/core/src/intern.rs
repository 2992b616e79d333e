//! String interning: the linchpin that makes `Value` string equality a
//! pointer comparison. `Interner` wraps a `Table` used purely as a string
//! *set* (the `Value` half of each entry is always `Nil`) plus the `Heap`
//! every freshly allocated string is registered into.

use std::rc::Rc;

use crate::object::{Heap, Obj, ObjString, hash_string};
use crate::table::Table;
use crate::value::Value;

#[derive(Debug, Default)]
pub struct Interner {
    strings: Table,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical `ObjString` for `chars`, copying the text
    /// into a fresh allocation only if no equal string is already
    /// interned.
    pub fn copy_string(&mut self, heap: &mut Heap, chars: &str) -> Rc<ObjString> {
        let hash = hash_string(chars.as_bytes());
        if let Some(existing) = self.strings.find_string(chars, hash) {
            return existing;
        }
        let interned = Rc::new(ObjString::new(chars.to_string()));
        self.register(heap, interned)
    }

    /// Like `copy_string`, but takes ownership of an already-built
    /// `String` instead of copying the bytes again — used when the
    /// caller just built the text itself (e.g. string concatenation) and
    /// would otherwise discard it on an intern hit.
    pub fn take_string(&mut self, heap: &mut Heap, chars: String) -> Rc<ObjString> {
        let hash = hash_string(chars.as_bytes());
        if let Some(existing) = self.strings.find_string(&chars, hash) {
            return existing;
        }
        let interned = Rc::new(ObjString { chars, hash });
        self.register(heap, interned)
    }

    fn register(&mut self, heap: &mut Heap, interned: Rc<ObjString>) -> Rc<ObjString> {
        self.strings.set(interned.clone(), Value::Nil);
        heap.track(Obj::String(interned.clone()));
        interned
    }
}
