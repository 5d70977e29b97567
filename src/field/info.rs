// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `FieldInfo`: the process-wide, (mostly) immutable-after-registration
//! record that describes one field. See `spec.md` §3 "FieldInfo" and
//! DESIGN NOTES "Pointer-keyed global hash tables with open typing".

use std::{
    fmt,
    sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering},
};

use crate::{field::kind::FieldKind, session::Session};

/// A field's position. Non-negative positions are real slots; `UNSET` marks
/// a schema-only entry that hasn't been promoted to a real slot yet.
pub const UNSET_POS: i32 = -1;

/// A getter for an *internal* (computed) field: reads some piece of session
/// state and returns it as a boxed [`FieldValue`](crate::field::store::FieldValue).
pub type GetCb =
    std::sync::Arc<dyn Fn(&Session) -> Option<crate::field::store::FieldValue> + Send + Sync>;

/// Hooks for a registered `object` field kind. Unlike the C original there
/// is no `free` callback: Rust's ownership frees the boxed object when the
/// session's cell is dropped.
#[derive(Clone)]
pub struct ObjectHooks {
    /// Dedup key used in place of a hash+cmp pair; two objects with the same
    /// key are considered the same entry.
    pub key_of: std::sync::Arc<dyn Fn(&dyn crate::field::store::FieldObject) -> u64 + Send + Sync>,
    /// Serializes an object for the (external, out of scope) emitter.
    pub save: std::sync::Arc<
        dyn Fn(&dyn crate::field::store::FieldObject) -> serde_json::Value + Send + Sync,
    >,
}

/// Options recognized by [`crate::field::registry::FieldRegistry::define`].
/// Replaces the C varargs `"category", value, "transform", value, ..., NULL`
/// convention (DESIGN NOTES) with a record whose fields are exactly the
/// finite set spec.md enumerates.
#[derive(Debug, Clone, Default)]
pub struct DefineOptions {
    pub category: Option<String>,
    pub transform: Option<String>,
    pub aliases: Option<String>,
}

/// Process-wide, immutable-after-registration description of one field.
///
/// A few bits are mutable even after registration (`ruleEnabled`, the
/// `DISABLED` flag bit, and `pos` itself for schema-only fields promoted
/// later) and are therefore stored as atomics rather than behind a lock,
/// per DESIGN NOTES.
pub struct FieldInfo {
    pub expression: String,
    /// Db-side field name, with the group prefix (if any) stripped.
    pub db_field: String,
    /// The full, unsplit db-side name (`dbGroup` + `.` + `db_field`).
    pub db_field_full: String,
    pub db_group: Option<String>,
    db_group_num: AtomicU32,
    /// Schema-side free-form strings.
    pub kind_str: String,
    pub category: Option<String>,
    pub transform: Option<String>,
    pub aliases: Option<String>,
    pub help: String,
    pub friendly: String,
    pub group: String,

    pub kind: FieldKind,
    flags: AtomicU32,
    pos: AtomicI32,
    rule_enabled: AtomicBool,

    /// If set, this is a synthetic count-companion field; its value at
    /// serialization time is the element count of the parent position.
    pub cnt_for_pos: Option<i32>,

    pub object_hooks: Option<ObjectHooks>,
    pub get_cb: Option<GetCb>,
}

impl fmt::Debug for FieldInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldInfo")
            .field("expression", &self.expression)
            .field("db_field_full", &self.db_field_full)
            .field("kind", &self.kind)
            .field("pos", &self.pos())
            .field("flags", &self.flags())
            .finish()
    }
}

impl FieldInfo {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        group: impl Into<String>,
        kind_str: impl Into<String>,
        expression: impl Into<String>,
        friendly: impl Into<String>,
        db_field_full: impl Into<String>,
        help: impl Into<String>,
        kind: FieldKind,
        flags: FieldFlags,
        opts: DefineOptions,
    ) -> Self {
        let full = db_field_full.into();
        // Mirrors the original's in-place pointer split on the first `.`:
        // everything before it is the db group, the rest is the bare
        // db-side field name.
        let (db_group, db_field) = match full.split_once('.') {
            Some((group, field)) => (Some(group.to_string()), field.to_string()),
            None => (None, full.clone()),
        };
        Self {
            expression: expression.into(),
            db_field,
            db_field_full: full,
            db_group,
            db_group_num: AtomicU32::new(0),
            kind_str: kind_str.into(),
            category: opts.category,
            transform: opts.transform,
            aliases: opts.aliases,
            help: help.into(),
            friendly: friendly.into(),
            group: group.into(),
            kind,
            flags: AtomicU32::new(flags.bits()),
            pos: AtomicI32::new(UNSET_POS),
            rule_enabled: AtomicBool::new(false),
            cnt_for_pos: None,
            object_hooks: None,
            get_cb: None,
        }
    }

    pub fn pos(&self) -> i32 {
        self.pos.load(Ordering::Acquire)
    }

    pub fn set_pos(&self, pos: i32) {
        self.pos.store(pos, Ordering::Release);
    }

    /// Atomically allocate the next position from a shared counter,
    /// returning the position this field should use. Mirrors
    /// `ARKIME_THREAD_INCROLD(config.maxDbField)`.
    pub fn cas_pos_if_unset(&self, new_pos: i32) -> bool {
        self.pos
            .compare_exchange(UNSET_POS, new_pos, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn flags(&self) -> FieldFlags {
        FieldFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    pub fn set_flags(&self, flags: FieldFlags) {
        self.flags.store(flags.bits(), Ordering::Release);
    }

    pub fn is_disabled(&self) -> bool {
        self.flags().contains(FieldFlags::DISABLED)
    }

    pub fn rule_enabled(&self) -> bool {
        self.rule_enabled.load(Ordering::Acquire)
    }

    pub fn set_rule_enabled(&self, enabled: bool) {
        self.rule_enabled.store(enabled, Ordering::Release);
    }

    pub fn db_field_len(&self) -> usize {
        self.db_field.len()
    }

    pub fn db_group_num(&self) -> u32 {
        self.db_group_num.load(Ordering::Acquire)
    }

    pub fn set_db_group_num(&self, num: u32) {
        self.db_group_num.store(num, Ordering::Release);
    }
}

pub use crate::field::kind::FieldFlags;
