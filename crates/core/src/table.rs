//! Open-addressing hash table with linear probing, used both as the
//! string intern table and as the VM's globals table.
//!
//! Keys are interned strings; values are `Value`. A slot's state is
//! encoded exactly like the spec describes it: a key of `None` paired with
//! `Value::Bool(true)` is a tombstone (previously occupied, now deleted);
//! a key of `None` paired with `Value::Nil` is a truly empty slot that was
//! never occupied. Lookups must pass through tombstones to find a live
//! entry further down the probe sequence; inserts are free to reuse them.

use std::rc::Rc;

use crate::object::ObjString;
use crate::value::Value;

const INITIAL_CAPACITY: usize = 8;
const MAX_LOAD: f64 = 0.75;

#[derive(Debug, Clone)]
struct Entry {
    key: Option<Rc<ObjString>>,
    value: Value,
}

impl Entry {
    fn empty() -> Self {
        Entry {
            key: None,
            value: Value::Nil,
        }
    }

    fn is_tombstone(&self) -> bool {
        self.key.is_none() && matches!(self.value, Value::Bool(true))
    }
}

#[derive(Debug, Default)]
pub struct Table {
    entries: Vec<Entry>,
    /// Live entries *and* tombstones — kept conservative so the growth
    /// check doesn't let tombstones silently starve the probe sequence.
    count: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Finds the slot for `key`: either the slot already holding it, the
    /// first tombstone seen along the probe sequence, or the first truly
    /// empty slot — whichever comes first, preferring a reusable
    /// tombstone over a fresh empty slot when both are seen before a
    /// match.
    fn find_entry(entries: &[Entry], key: &Rc<ObjString>) -> usize {
        let capacity = entries.len();
        let mut index = key.hash as usize % capacity;
        let mut tombstone: Option<usize> = None;
        loop {
            let entry = &entries[index];
            match &entry.key {
                None if entry.is_tombstone() => {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                None => {
                    return tombstone.unwrap_or(index);
                }
                Some(k) if Rc::ptr_eq(k, key) => return index,
                Some(_) => {}
            }
            index = (index + 1) % capacity;
        }
    }

    fn grow(&mut self, new_capacity: usize) {
        let mut new_entries = vec![Entry::empty(); new_capacity];
        let mut new_count = 0;
        for entry in self.entries.drain(..) {
            if let Some(key) = entry.key {
                let index = Self::find_entry(&new_entries, &key);
                new_entries[index] = Entry {
                    key: Some(key),
                    value: entry.value,
                };
                new_count += 1;
            }
        }
        self.entries = new_entries;
        self.count = new_count;
    }

    /// Inserts or overwrites `key`. Returns `true` if this filled a slot
    /// that had never been occupied before (a fresh key), `false` if it
    /// overwrote an existing entry or reused a tombstone.
    pub fn set(&mut self, key: Rc<ObjString>, value: Value) -> bool {
        if self.entries.is_empty() {
            self.grow(INITIAL_CAPACITY);
        } else if (self.count + 1) as f64 > self.capacity() as f64 * MAX_LOAD {
            self.grow(self.capacity() * 2);
        }

        let index = Self::find_entry(&self.entries, &key);
        let is_new_key = self.entries[index].key.is_none();
        if is_new_key && !self.entries[index].is_tombstone() {
            self.count += 1;
        }
        self.entries[index] = Entry {
            key: Some(key),
            value,
        };
        is_new_key
    }

    pub fn get(&self, key: &Rc<ObjString>) -> Option<&Value> {
        if self.entries.is_empty() {
            return None;
        }
        let index = Self::find_entry(&self.entries, key);
        self.entries[index].key.as_ref()?;
        Some(&self.entries[index].value)
    }

    /// Converts the slot into a tombstone. Returns `false` if the key was
    /// not present.
    pub fn delete(&mut self, key: &Rc<ObjString>) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let index = Self::find_entry(&self.entries, key);
        if self.entries[index].key.is_none() {
            return false;
        }
        self.entries[index] = Entry {
            key: None,
            value: Value::Bool(true),
        };
        true
    }

    /// Bulk-copies every live (non-tombstone) entry from `self` into `to`.
    pub fn add_all(&self, to: &mut Table) {
        for entry in &self.entries {
            if let Some(key) = &entry.key {
                to.set(key.clone(), entry.value.clone());
            }
        }
    }

    /// The linchpin of interning: finds an existing `ObjString` with this
    /// exact text, if one is already registered. Must keep walking through
    /// tombstones — stopping there would let a deleted slot mask a live
    /// match further down the probe sequence — but must stop at a truly
    /// empty slot, since nothing past it was ever inserted on this probe
    /// chain.
    pub fn find_string(&self, chars: &str, hash: u32) -> Option<Rc<ObjString>> {
        if self.entries.is_empty() {
            return None;
        }
        let capacity = self.entries.len();
        let mut index = hash as usize % capacity;
        loop {
            let entry = &self.entries[index];
            match &entry.key {
                None if !entry.is_tombstone() => return None,
                None => {}
                Some(k) => {
                    if k.hash == hash && k.chars.len() == chars.len() && k.chars == chars {
                        return Some(k.clone());
                    }
                }
            }
            index = (index + 1) % capacity;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjString;

    fn key(s: &str) -> Rc<ObjString> {
        Rc::new(ObjString::new(s.to_string()))
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut table = Table::new();
        let k = key("name");
        assert!(table.set(k.clone(), Value::Number(1.0)));
        assert_eq!(table.get(&k), Some(&Value::Number(1.0)));
    }

    #[test]
    fn delete_then_get_reports_absent() {
        let mut table = Table::new();
        let k = key("name");
        table.set(k.clone(), Value::Number(1.0));
        assert!(table.delete(&k));
        assert_eq!(table.get(&k), None);
    }

    #[test]
    fn set_after_delete_reuses_tombstone_and_is_found() {
        let mut table = Table::new();
        let k = key("name");
        table.set(k.clone(), Value::Number(1.0));
        table.delete(&k);
        assert!(table.set(k.clone(), Value::Number(2.0)));
        assert_eq!(table.get(&k), Some(&Value::Number(2.0)));
    }

    #[test]
    fn lookup_passes_through_tombstones_to_later_match() {
        // Force several keys into the same small table so some share a
        // probe chain, delete the first, and confirm the second is still
        // reachable.
        let mut table = Table::new();
        let keys: Vec<_> = (0..20).map(|i| key(&format!("k{i}"))).collect();
        for (i, k) in keys.iter().enumerate() {
            table.set(k.clone(), Value::Number(i as f64));
        }
        table.delete(&keys[0]);
        for (i, k) in keys.iter().enumerate().skip(1) {
            assert_eq!(table.get(k), Some(&Value::Number(i as f64)));
        }
    }

    #[test]
    fn find_string_matches_by_content_not_identity() {
        let mut table = Table::new();
        let k = key("hello");
        let hash = k.hash;
        table.set(k.clone(), Value::Nil);
        let found = table.find_string("hello", hash).expect("should find");
        assert!(Rc::ptr_eq(&found, &k));
    }

    #[test]
    fn find_string_does_not_match_past_truly_empty_slot() {
        let table = Table::new();
        assert!(table.find_string("anything", 0).is_none());
    }

    #[test]
    fn grows_past_load_factor() {
        let mut table = Table::new();
        let keys: Vec<_> = (0..100).map(|i| key(&format!("k{i}"))).collect();
        for (i, k) in keys.iter().enumerate() {
            table.set(k.clone(), Value::Number(i as f64));
        }
        for (i, k) in keys.iter().enumerate() {
            assert_eq!(table.get(k), Some(&Value::Number(i as f64)));
        }
    }
}
