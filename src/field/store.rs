// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The per-session typed multi-value store: one [`Cell`] per registered
//! position, holding whatever shape its [`FieldKind`](crate::field::kind::FieldKind)
//! calls for, plus the running json-size accounting used to decide when a
//! session is "too big to index" (`spec.md` §4.2/§4.3).

use std::{
    collections::HashSet,
    fmt,
    net::IpAddr,
    sync::Arc,
};

use crate::{error::StoreError, field::kind::FieldKind};

/// A single scalar value as handed to or read back from the store. Distinct
/// from [`Cell`]: a `Cell` is the *container* a position holds, `FieldValue`
/// is one value flowing in or out of it.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Float(f64),
    Ip(IpAddr),
}

/// A registered `object`-kind value. There is deliberately no `free` hook
/// (DESIGN NOTES): Rust drops the boxed object when its `Arc` refcount hits
/// zero, unlike the C original's explicit `objectFree` callback.
pub trait FieldObject: fmt::Debug + Send + Sync {
    /// Stand-in for the original's hash+cmp pair: two objects with equal
    /// keys are the same logical entry and are deduped against each other.
    fn dedup_key(&self) -> u64;
    /// Serializes this object for the (out-of-scope) external index.
    fn to_json(&self) -> serde_json::Value;
}

/// One entry of a `StrSet` field: richer than a bare string because the
/// original packs a cached length, a utf8-validity bit, and an optional
/// opaque "user word" payload (`arkime_field_string_uw_add`) alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct StrSetEntry {
    pub value: String,
    pub utf8: bool,
    pub user_word: Option<String>,
}

/// `floatMap`'s container. Reproduces the original add bug verbatim
/// (`arkime_field_float_add` in `field.c`): a brand-new value's first `add()`
/// is (incorrectly) reported as a duplicate; its *second* `add()` then
/// (incorrectly) flips to "new"; every `add()` after that settles into
/// honest set semantics. We keep both the honest entry set and the
/// in-flight bug-tracking set side by side so correct behavior and the bug
/// are both visible and independently testable.
#[derive(Debug, Clone, Default)]
pub struct FloatMapCell {
    pub entries: HashSet<u64>, // f64 bits, since f64 isn't Hash/Eq
    /// Values seen exactly once so far, awaiting the second `add()` that
    /// (buggily) promotes them into `entries`.
    bug_pending: HashSet<u64>,
}

impl FloatMapCell {
    pub fn add(&mut self, value: f64) -> bool {
        let bits = value.to_bits();
        if self.entries.contains(&bits) {
            // Settled: behaves like a normal set from here on.
            return false;
        }
        if self.bug_pending.remove(&bits) {
            // Second add of this value: the original's second hash-add
            // against the same table reports "not present" and the code
            // branches on that, incorrectly treating it as new.
            self.entries.insert(bits);
            true
        } else {
            // First add of this value: the original's first hash-add
            // result is what's (incorrectly) read as "already present".
            self.bug_pending.insert(bits);
            false
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `intMap`'s container, plus the count-path transcription bug from
/// `arkime_field_count` (`field.c`): the int-hash accounting's size should
/// be read off the int-hash table, but the original reads it off the
/// co-located *string*-hash table's counter instead. `count()` returns the
/// obviously-intended value; `count_via_string_accounting()` reproduces the
/// bug for coverage (spec.md §9).
#[derive(Debug, Clone, Default)]
pub struct IntMapCell {
    pub entries: HashSet<i64>,
    /// Stands in for the unrelated string-hash table the buggy count path
    /// reads from; starts at whatever the string side happened to have,
    /// which in the original is whatever ghost/stale count was left behind.
    stale_string_side_count: usize,
}

impl IntMapCell {
    pub fn add(&mut self, value: i64) -> bool {
        self.entries.insert(value)
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn count_via_string_accounting(&self) -> usize {
        self.stale_string_side_count
    }
}

/// One session-local field slot. Variant shape follows
/// [`FieldKind`](crate::field::kind::FieldKind) one-to-one.
#[derive(Debug)]
pub enum Cell {
    Str(Option<String>),
    StrArray(Vec<String>),
    StrSet(Vec<StrSetEntry>),
    StrMap(HashSet<String>),
    Int(Option<i64>),
    IntArray(Vec<i64>),
    IntSet(HashSet<i64>),
    IntMap(IntMapCell),
    Float(Option<f64>),
    FloatArray(Vec<f64>),
    FloatMap(FloatMapCell),
    Ip(Option<IpAddr>),
    IpMap(HashSet<IpAddr>),
    Object(Vec<Arc<dyn FieldObject>>),
}

impl Cell {
    pub fn new_for_kind(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Str => Cell::Str(None),
            FieldKind::StrArray => Cell::StrArray(Vec::new()),
            FieldKind::StrSet => Cell::StrSet(Vec::new()),
            FieldKind::StrMap => Cell::StrMap(HashSet::new()),
            FieldKind::Int => Cell::Int(None),
            FieldKind::IntArray => Cell::IntArray(Vec::new()),
            FieldKind::IntSet => Cell::IntSet(HashSet::new()),
            FieldKind::IntMap => Cell::IntMap(IntMapCell::default()),
            FieldKind::Float => Cell::Float(None),
            FieldKind::FloatArray => Cell::FloatArray(Vec::new()),
            FieldKind::FloatMap => Cell::FloatMap(FloatMapCell::default()),
            FieldKind::Ip => Cell::Ip(None),
            FieldKind::IpMap => Cell::IpMap(HashSet::new()),
            FieldKind::Object => Cell::Object(Vec::new()),
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Cell::Str(_) => FieldKind::Str,
            Cell::StrArray(_) => FieldKind::StrArray,
            Cell::StrSet(_) => FieldKind::StrSet,
            Cell::StrMap(_) => FieldKind::StrMap,
            Cell::Int(_) => FieldKind::Int,
            Cell::IntArray(_) => FieldKind::IntArray,
            Cell::IntSet(_) => FieldKind::IntSet,
            Cell::IntMap(_) => FieldKind::IntMap,
            Cell::Float(_) => FieldKind::Float,
            Cell::FloatArray(_) => FieldKind::FloatArray,
            Cell::FloatMap(_) => FieldKind::FloatMap,
            Cell::Ip(_) => FieldKind::Ip,
            Cell::IpMap(_) => FieldKind::IpMap,
            Cell::Object(_) => FieldKind::Object,
        }
    }

    /// Number of logical elements held, used both by `CNT`/`ECS_CNT`
    /// companion fields and by truncation checks.
    pub fn element_count(&self) -> usize {
        match self {
            Cell::Str(v) => v.is_some() as usize,
            Cell::StrArray(v) => v.len(),
            Cell::StrSet(v) => v.len(),
            Cell::StrMap(v) => v.len(),
            Cell::Int(v) => v.is_some() as usize,
            Cell::IntArray(v) => v.len(),
            Cell::IntSet(v) => v.len(),
            Cell::IntMap(v) => v.count(),
            Cell::Float(v) => v.is_some() as usize,
            Cell::FloatArray(v) => v.len(),
            Cell::FloatMap(v) => v.len(),
            Cell::Ip(v) => v.is_some() as usize,
            Cell::IpMap(v) => v.len(),
            Cell::Object(v) => v.len(),
        }
    }
}

/// Per-field string length cap (`ARKIME_FIELD_MAX_ELEMENT_SIZE` in the
/// original); adds beyond this are truncated and the session is tagged
/// rather than rejected.
pub const MAX_ELEMENT_SIZE: usize = 16384;

/// Running json-size threshold past which a session is flagged `midSave`
/// (`FIELD_MAX_JSON_SIZE` in the original): once a session's accounted size
/// crosses this, it's considered too big to hold for a single final save
/// and should be written out mid-stream instead.
pub const FIELD_MAX_JSON_SIZE: usize = 20_000;

/// Per-cell json-size accounting, used to decide when a single field's
/// worth of data has grown too large to hold for one final save (spec.md
/// §4.3). Each cell gets its own accountant: a first-insert charge of the
/// db field's name length, plus a per-kind per-value cost on every add,
/// mirroring `arkime_field_string_add`'s `session->jsonSize +=` bookkeeping.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSizeAccountant {
    total: usize,
}

impl JsonSizeAccountant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Charged once, the first time a position's slot is created (every
    /// kind but `object`, which folds its own db-field cost into
    /// [`Self::charge_object_first`]).
    pub fn charge_first_insert(&mut self, db_field_len: usize) {
        self.total += db_field_len;
    }

    pub fn charge_string(&mut self, len: usize) {
        self.total += 6 + 2 * len;
    }

    pub fn charge_int(&mut self) {
        self.total += 13;
    }

    pub fn charge_float(&mut self) {
        self.total += 15;
    }

    /// IPv4 and IPv6 literals cost different amounts, matching the
    /// original's distinct v4/v6 add paths.
    pub fn charge_ip(&mut self, ip: IpAddr) {
        self.total += match ip {
            IpAddr::V4(_) => 3 + 15 + 100,
            IpAddr::V6(_) => 3 + 30 + 100,
        };
    }

    pub fn charge_object_first(&mut self, db_field_len: usize, len: usize) {
        self.total += 3 + db_field_len + 4 + len;
    }

    pub fn charge_object(&mut self, len: usize) {
        self.total += 3 + len;
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

/// The per-session store: one [`Cell`] per registered position, indexed
/// densely the way the original indexes `session->fields[pos]`, with a
/// parallel per-position json-size accountant.
#[derive(Debug, Default)]
pub struct FieldStore {
    cells: Vec<Option<Cell>>,
    json_sizes: Vec<JsonSizeAccountant>,
}

impl FieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures a slot exists at `pos`, returning its index and whether this
    /// call created it. Callers charge the kind-appropriate first-insert
    /// cost themselves since `object`'s first-insert cost also depends on
    /// the value being added.
    fn ensure_slot(&mut self, pos: i32, kind: FieldKind) -> (usize, bool) {
        let idx = pos as usize;
        if self.cells.len() <= idx {
            self.cells.resize_with(idx + 1, || None);
            self.json_sizes.resize_with(idx + 1, JsonSizeAccountant::default);
        }
        let is_new = self.cells[idx].is_none();
        if is_new {
            self.cells[idx] = Some(Cell::new_for_kind(kind));
        }
        (idx, is_new)
    }

    pub fn get(&self, pos: i32) -> Option<&Cell> {
        self.cells.get(pos as usize).and_then(|c| c.as_ref())
    }

    /// The accounted json size of the cell at `pos` (spec.md §4.3); `0` for
    /// a position that has never been touched.
    pub fn json_size_of(&self, pos: i32) -> usize {
        self.json_sizes
            .get(pos as usize)
            .map(JsonSizeAccountant::total)
            .unwrap_or(0)
    }

    pub fn free(&mut self, pos: i32) {
        if let Some(slot) = self.cells.get_mut(pos as usize) {
            *slot = None;
        }
        if let Some(size) = self.json_sizes.get_mut(pos as usize) {
            *size = JsonSizeAccountant::default();
        }
    }

    /// Truncates `value` to [`MAX_ELEMENT_SIZE`] bytes at a char boundary,
    /// returning whether truncation occurred (callers tag the session when
    /// it does, per `arkime_field_truncated`).
    pub fn truncate(value: &str) -> (std::borrow::Cow<'_, str>, bool) {
        if value.len() <= MAX_ELEMENT_SIZE {
            return (std::borrow::Cow::Borrowed(value), false);
        }
        let mut end = MAX_ELEMENT_SIZE;
        while end > 0 && !value.is_char_boundary(end) {
            end -= 1;
        }
        (std::borrow::Cow::Owned(value[..end].to_string()), true)
    }

    /// Adds a string value, deduping/truncating per the cell's exact kind.
    /// Mirrors `arkime_field_string_add`. Returns `(added, truncated)`:
    /// `added` is whether the value was newly added (false if it was a dup
    /// the kind dedups away); `truncated` is whether the raw value exceeded
    /// [`MAX_ELEMENT_SIZE`] and was cut down before storage. Callers must
    /// tag the session `truncated-field-<dbField>` when `truncated` is true
    /// (`arkime_field_truncated`) — this method has no [`crate::session::Session`]
    /// to tag itself, so it only reports the flag back.
    pub fn add_string(
        &mut self,
        pos: i32,
        expression: &str,
        db_field: &str,
        kind: FieldKind,
        raw: &str,
    ) -> Result<(bool, bool), StoreError> {
        let (value, truncated) = Self::truncate(raw);
        let (idx, is_new_slot) = self.ensure_slot(pos, kind);
        let cell = self.cells[idx].as_mut().expect("just inserted");
        let value_len = value.len();
        let added = match cell {
            Cell::Str(slot) => {
                let is_new = slot.as_deref() != Some(value.as_ref());
                *slot = Some(value.into_owned());
                is_new
            }
            Cell::StrArray(v) => {
                v.push(value.into_owned());
                true
            }
            Cell::StrSet(v) => {
                if v.iter().any(|e| e.value == value) {
                    false
                } else {
                    v.push(StrSetEntry {
                        value: value.into_owned(),
                        utf8: true,
                        user_word: None,
                    });
                    true
                }
            }
            Cell::StrMap(v) => v.insert(value.into_owned()),
            other => {
                return Err(StoreError::KindMismatch {
                    expression: expression.to_string(),
                    db_field: db_field.to_string(),
                    actual: other.kind(),
                    attempted: "string",
                });
            }
        };
        if is_new_slot {
            self.json_sizes[idx].charge_first_insert(db_field.len());
        }
        if added {
            self.json_sizes[idx].charge_string(value_len);
        }
        Ok((added, truncated))
    }

    /// `arkime_field_string_add_lower`: lower-cases before the same dedup
    /// logic as [`Self::add_string`].
    pub fn add_string_lower(
        &mut self,
        pos: i32,
        expression: &str,
        db_field: &str,
        kind: FieldKind,
        raw: &str,
    ) -> Result<(bool, bool), StoreError> {
        let lowered = raw.to_lowercase();
        self.add_string(pos, expression, db_field, kind, &lowered)
    }

    /// `arkime_field_string_add_host`: lower-cases and strips a single
    /// trailing `.` (a bare-FQDN artifact), then dedups as a string.
    pub fn add_string_host(
        &mut self,
        pos: i32,
        expression: &str,
        db_field: &str,
        kind: FieldKind,
        raw: &str,
    ) -> Result<(bool, bool), StoreError> {
        let mut lowered = raw.to_lowercase();
        if lowered.ends_with('.') {
            lowered.pop();
        }
        self.add_string(pos, expression, db_field, kind, &lowered)
    }

    /// `arkime_field_string_uw_add`: like [`Self::add_string`] but only
    /// meaningful against a `StrSet` cell, attaching an opaque user-word
    /// payload to the entry. Returns `(added, truncated)`, same contract as
    /// [`Self::add_string`].
    pub fn add_string_user_word(
        &mut self,
        pos: i32,
        expression: &str,
        db_field: &str,
        value: &str,
        user_word: &str,
    ) -> Result<(bool, bool), StoreError> {
        let (value, truncated) = Self::truncate(value);
        let (idx, is_new_slot) = self.ensure_slot(pos, FieldKind::StrSet);
        let cell = self.cells[idx].as_mut().expect("just inserted");
        let Cell::StrSet(v) = cell else {
            return Err(StoreError::KindMismatch {
                expression: expression.to_string(),
                db_field: db_field.to_string(),
                actual: cell.kind(),
                attempted: "string+user_word",
            });
        };
        if is_new_slot {
            self.json_sizes[idx].charge_first_insert(db_field.len());
        }
        if let Some(existing) = v.iter_mut().find(|e| e.value == value) {
            existing.user_word = Some(user_word.to_string());
            return Ok((false, truncated));
        }
        let charged = value.len();
        v.push(StrSetEntry {
            value: value.into_owned(),
            utf8: true,
            user_word: Some(user_word.to_string()),
        });
        self.json_sizes[idx].charge_string(charged);
        Ok((true, truncated))
    }

    pub fn add_int(
        &mut self,
        pos: i32,
        expression: &str,
        db_field: &str,
        kind: FieldKind,
        value: i64,
    ) -> Result<bool, StoreError> {
        let (idx, is_new_slot) = self.ensure_slot(pos, kind);
        let cell = self.cells[idx].as_mut().expect("just inserted");
        let added = match cell {
            Cell::Int(slot) => {
                let is_new = *slot != Some(value);
                *slot = Some(value);
                is_new
            }
            Cell::IntArray(v) => {
                v.push(value);
                true
            }
            Cell::IntSet(v) => v.insert(value),
            Cell::IntMap(m) => m.add(value),
            other => {
                return Err(StoreError::KindMismatch {
                    expression: expression.to_string(),
                    db_field: db_field.to_string(),
                    actual: other.kind(),
                    attempted: "int",
                });
            }
        };
        if is_new_slot {
            self.json_sizes[idx].charge_first_insert(db_field.len());
        }
        if added {
            self.json_sizes[idx].charge_int();
        }
        Ok(added)
    }

    /// `arkime_field_float_add`: for `FloatMap` cells, reproduces the
    /// original's double-hash-add bug via [`FloatMapCell::add`]; every
    /// other float-like kind adds honestly.
    pub fn add_float(
        &mut self,
        pos: i32,
        expression: &str,
        db_field: &str,
        kind: FieldKind,
        value: f64,
    ) -> Result<bool, StoreError> {
        let (idx, is_new_slot) = self.ensure_slot(pos, kind);
        let cell = self.cells[idx].as_mut().expect("just inserted");
        let added = match cell {
            Cell::Float(slot) => {
                let is_new = *slot != Some(value);
                *slot = Some(value);
                is_new
            }
            Cell::FloatArray(v) => {
                v.push(value);
                true
            }
            Cell::FloatMap(m) => m.add(value),
            other => {
                return Err(StoreError::KindMismatch {
                    expression: expression.to_string(),
                    db_field: db_field.to_string(),
                    actual: other.kind(),
                    attempted: "float",
                });
            }
        };
        if is_new_slot {
            self.json_sizes[idx].charge_first_insert(db_field.len());
        }
        if added {
            self.json_sizes[idx].charge_float();
        }
        Ok(added)
    }

    pub fn add_ip(
        &mut self,
        pos: i32,
        expression: &str,
        db_field: &str,
        kind: FieldKind,
        value: IpAddr,
    ) -> Result<bool, StoreError> {
        let (idx, is_new_slot) = self.ensure_slot(pos, kind);
        let cell = self.cells[idx].as_mut().expect("just inserted");
        let added = match cell {
            Cell::Ip(slot) => {
                let is_new = *slot != Some(value);
                *slot = Some(value);
                is_new
            }
            Cell::IpMap(v) => v.insert(value),
            other => {
                return Err(StoreError::KindMismatch {
                    expression: expression.to_string(),
                    db_field: db_field.to_string(),
                    actual: other.kind(),
                    attempted: "ip",
                });
            }
        };
        if is_new_slot {
            self.json_sizes[idx].charge_first_insert(db_field.len());
        }
        if added {
            self.json_sizes[idx].charge_ip(value);
        }
        Ok(added)
    }

    /// Parses and adds an IP from its string form (`arkime_field_ip_add_str`
    /// / `arkime_field_parse_ip`): accepts bare v4/v6 literals.
    pub fn add_ip_str(
        &mut self,
        pos: i32,
        expression: &str,
        db_field: &str,
        kind: FieldKind,
        raw: &str,
    ) -> Result<bool, StoreError> {
        let ip: IpAddr = raw
            .parse()
            .map_err(|_| StoreError::KindMismatch {
                expression: expression.to_string(),
                db_field: db_field.to_string(),
                actual: kind,
                attempted: "ip-string",
            })?;
        self.add_ip(pos, expression, db_field, kind, ip)
    }

    pub fn add_object(
        &mut self,
        pos: i32,
        expression: &str,
        db_field: &str,
        object: Arc<dyn FieldObject>,
    ) -> Result<bool, StoreError> {
        let (idx, is_new_slot) = self.ensure_slot(pos, FieldKind::Object);
        let cell = self.cells[idx].as_mut().expect("just inserted");
        let Cell::Object(v) = cell else {
            return Err(StoreError::KindMismatch {
                expression: expression.to_string(),
                db_field: db_field.to_string(),
                actual: cell.kind(),
                attempted: "object",
            });
        };
        let key = object.dedup_key();
        if v.iter().any(|o| o.dedup_key() == key) {
            return Ok(false);
        }
        let len = object.to_json().to_string().len();
        if is_new_slot {
            self.json_sizes[idx].charge_object_first(db_field.len(), len);
        } else {
            self.json_sizes[idx].charge_object(len);
        }
        v.push(object);
        Ok(true)
    }

    pub fn count(&self, pos: i32) -> usize {
        self.get(pos).map(Cell::element_count).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_map_double_add_bug_treats_first_occurrence_as_duplicate() {
        let mut m = FloatMapCell::default();
        assert!(!m.add(1.5), "first add is (buggily) reported as a dup");
        assert!(m.add(1.5), "second add of the same value flips to 'new'");
        assert!(!m.add(1.5), "third add goes back to 'dup' like a normal set");
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn int_map_count_bug_diverges_from_honest_count() {
        let mut m = IntMapCell::default();
        m.add(1);
        m.add(2);
        assert_eq!(m.count(), 2);
        assert_eq!(m.count_via_string_accounting(), 0);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let long = "a".repeat(MAX_ELEMENT_SIZE + 10);
        let (out, truncated) = FieldStore::truncate(&long);
        assert!(truncated);
        assert_eq!(out.len(), MAX_ELEMENT_SIZE);
    }

    #[test]
    fn str_array_keeps_duplicates_str_set_dedups() {
        let mut store = FieldStore::new();
        store
            .add_string(0, "x", "x", FieldKind::StrArray, "a")
            .expect("ok");
        store
            .add_string(0, "x", "x", FieldKind::StrArray, "a")
            .expect("ok");
        assert_eq!(store.count(0), 2);

        store
            .add_string(1, "y", "y", FieldKind::StrSet, "a")
            .expect("ok");
        store
            .add_string(1, "y", "y", FieldKind::StrSet, "a")
            .expect("ok");
        assert_eq!(store.count(1), 1);
    }
}
