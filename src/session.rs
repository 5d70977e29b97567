// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `Session`: the per-flow state that the field store, field operations,
//! and parser dispatch all operate on. Grounded on `ArkimeSession_t`'s
//! control fields in `field.c`/`packet.c` (only the subset this crate's
//! scope touches is modeled — see `spec.md` §6 Non-goals).

use std::{
    collections::HashSet,
    net::IpAddr,
    sync::Arc,
};

use crate::{
    error::StoreError,
    field::{
        info::FieldInfo,
        kind::FieldKind,
        ops::DropScope,
        registry::FieldRegistry,
        store::{FieldObject, FieldStore, FIELD_MAX_JSON_SIZE},
    },
    rules::RuleHook,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct TcpFlags {
    pub syn: bool,
    pub syn_ack: bool,
    pub ack: bool,
    pub psh: bool,
    pub rst: bool,
    pub fin: bool,
    pub urg: bool,
}

/// One flow's worth of state. Owns the field store and the control flags
/// that Field Operations' pseudo-fields mutate.
pub struct Session {
    registry: Arc<FieldRegistry>,
    rule_hook: Arc<dyn RuleHook>,

    pub store: FieldStore,

    pub stop_spi: bool,
    pub stop_saving: u32,
    pub min_saving: u8,
    pub stop_yara: bool,
    /// Set once the store's accounted json size crosses
    /// [`FIELD_MAX_JSON_SIZE`]; sticky for the life of the session, mirroring
    /// `session->midSave` in the original (spec.md's serialization
    /// accountant).
    pub mid_save: bool,
    pub packets: [u64; 2],
    pub databytes: [u64; 2],
    pub tags: HashSet<String>,
    pub protocols: HashSet<&'static str>,
    pub drop_hash: Vec<(DropScope, i64)>,

    pub ip_src: Option<IpAddr>,
    pub ip_dst: Option<IpAddr>,
    pub port_src: Option<u16>,
    pub port_dst: Option<u16>,
    pub tcp_flags: TcpFlags,

    community_id: std::cell::RefCell<Option<String>>,
    deferred_free: Vec<Box<dyn FnOnce() + Send>>,
}

impl Session {
    pub fn new(registry: Arc<FieldRegistry>, rule_hook: Arc<dyn RuleHook>) -> Self {
        Self {
            registry,
            rule_hook,
            store: FieldStore::new(),
            stop_spi: false,
            stop_saving: 0,
            min_saving: 0,
            stop_yara: false,
            mid_save: false,
            packets: [0, 0],
            databytes: [0, 0],
            tags: HashSet::new(),
            protocols: HashSet::new(),
            drop_hash: Vec::new(),
            ip_src: None,
            ip_dst: None,
            port_src: None,
            port_dst: None,
            tcp_flags: TcpFlags::default(),
            community_id: std::cell::RefCell::new(None),
            deferred_free: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Arc<FieldRegistry> {
        &self.registry
    }

    pub fn registry_field_info(&self, pos: i32) -> Option<Arc<FieldInfo>> {
        self.registry.field_info(pos)
    }

    pub fn registry_min_internal_field(&self) -> Option<i32> {
        Some(self.registry.min_internal_field())
    }

    /// `arkime_session_has_protocol`.
    pub fn has_protocol(&self, tag: &str) -> bool {
        self.protocols.contains(tag)
    }

    /// `arkime_session_add_protocol`.
    pub fn add_protocol(&mut self, tag: &'static str) {
        self.protocols.insert(tag);
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    /// Raises [`Self::mid_save`] once the touched cell's accounted json size
    /// crosses [`FIELD_MAX_JSON_SIZE`]. Checked per-position after every
    /// store mutation that can grow it; never cleared once set.
    fn check_mid_save(&mut self, pos: i32) {
        if self.store.json_size_of(pos) > FIELD_MAX_JSON_SIZE {
            self.mid_save = true;
        }
    }

    /// Wraps [`FieldStore::add_string`], tagging `truncated-field-<db_field>`
    /// when the value was cut down and updating [`Self::mid_save`].
    pub fn add_string(
        &mut self,
        pos: i32,
        expression: &str,
        db_field: &str,
        kind: FieldKind,
        raw: &str,
    ) -> Result<bool, StoreError> {
        let (added, truncated) = self.store.add_string(pos, expression, db_field, kind, raw)?;
        if truncated {
            self.add_tag(format!("truncated-field-{db_field}"));
        }
        self.check_mid_save(pos);
        Ok(added)
    }

    /// Wraps [`FieldStore::add_string_lower`]; see [`Self::add_string`].
    pub fn add_string_lower(
        &mut self,
        pos: i32,
        expression: &str,
        db_field: &str,
        kind: FieldKind,
        raw: &str,
    ) -> Result<bool, StoreError> {
        let (added, truncated) = self
            .store
            .add_string_lower(pos, expression, db_field, kind, raw)?;
        if truncated {
            self.add_tag(format!("truncated-field-{db_field}"));
        }
        self.check_mid_save(pos);
        Ok(added)
    }

    /// Wraps [`FieldStore::add_string_host`]; see [`Self::add_string`].
    pub fn add_string_host(
        &mut self,
        pos: i32,
        expression: &str,
        db_field: &str,
        kind: FieldKind,
        raw: &str,
    ) -> Result<bool, StoreError> {
        let (added, truncated) = self
            .store
            .add_string_host(pos, expression, db_field, kind, raw)?;
        if truncated {
            self.add_tag(format!("truncated-field-{db_field}"));
        }
        self.check_mid_save(pos);
        Ok(added)
    }

    /// Wraps [`FieldStore::add_string_user_word`]; see [`Self::add_string`].
    pub fn add_string_user_word(
        &mut self,
        pos: i32,
        expression: &str,
        db_field: &str,
        value: &str,
        user_word: &str,
    ) -> Result<bool, StoreError> {
        let (added, truncated) = self
            .store
            .add_string_user_word(pos, expression, db_field, value, user_word)?;
        if truncated {
            self.add_tag(format!("truncated-field-{db_field}"));
        }
        self.check_mid_save(pos);
        Ok(added)
    }

    /// Wraps [`FieldStore::add_int`], updating [`Self::mid_save`].
    pub fn add_int(
        &mut self,
        pos: i32,
        expression: &str,
        db_field: &str,
        kind: FieldKind,
        value: i64,
    ) -> Result<bool, StoreError> {
        let added = self.store.add_int(pos, expression, db_field, kind, value)?;
        self.check_mid_save(pos);
        Ok(added)
    }

    /// Wraps [`FieldStore::add_float`], updating [`Self::mid_save`].
    pub fn add_float(
        &mut self,
        pos: i32,
        expression: &str,
        db_field: &str,
        kind: FieldKind,
        value: f64,
    ) -> Result<bool, StoreError> {
        let added = self
            .store
            .add_float(pos, expression, db_field, kind, value)?;
        self.check_mid_save(pos);
        Ok(added)
    }

    /// Wraps [`FieldStore::add_ip`], updating [`Self::mid_save`].
    pub fn add_ip(
        &mut self,
        pos: i32,
        expression: &str,
        db_field: &str,
        kind: FieldKind,
        value: IpAddr,
    ) -> Result<bool, StoreError> {
        let added = self.store.add_ip(pos, expression, db_field, kind, value)?;
        self.check_mid_save(pos);
        Ok(added)
    }

    /// Wraps [`FieldStore::add_ip_str`], updating [`Self::mid_save`].
    pub fn add_ip_str(
        &mut self,
        pos: i32,
        expression: &str,
        db_field: &str,
        kind: FieldKind,
        raw: &str,
    ) -> Result<bool, StoreError> {
        let added = self
            .store
            .add_ip_str(pos, expression, db_field, kind, raw)?;
        self.check_mid_save(pos);
        Ok(added)
    }

    /// Wraps [`FieldStore::add_object`], updating [`Self::mid_save`].
    pub fn add_object(
        &mut self,
        pos: i32,
        expression: &str,
        db_field: &str,
        object: Arc<dyn FieldObject>,
    ) -> Result<bool, StoreError> {
        let added = self.store.add_object(pos, expression, db_field, object)?;
        self.check_mid_save(pos);
        Ok(added)
    }

    /// Registers a cleanup closure to run at [`Self::finish`], mirroring
    /// `arkime_free_later`'s "free function attached at enqueue time"
    /// contract (used by the `communityId` getter's memoization).
    pub fn defer_free(&mut self, f: impl FnOnce() + Send + 'static) {
        self.deferred_free.push(Box::new(f));
    }

    /// Memoized community-id string, computed on first read and cached for
    /// the life of the session (`arkime_field_getcb_community_id`'s
    /// caching behavior).
    pub fn community_id_cached(&self) -> Option<String> {
        self.community_id.borrow().clone()
    }

    pub fn set_community_id_cache(&self, value: String) {
        *self.community_id.borrow_mut() = Some(value);
    }

    /// Runs every deferred-free closure and drops them. Called when a
    /// session is torn down.
    pub fn finish(&mut self) {
        for f in self.deferred_free.drain(..) {
            f();
        }
    }

    pub fn rule_hook(&self) -> &Arc<dyn RuleHook> {
        &self.rule_hook
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for f in self.deferred_free.drain(..) {
            f();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{field::registry::FieldRegistry, field::DefineOptions, rules::NullRuleHook};

    fn new_session() -> Session {
        let registry = FieldRegistry::new().expect("registry");
        Session::new(registry, Arc::new(NullRuleHook))
    }

    #[test]
    fn truncated_string_add_tags_session() {
        let mut session = new_session();
        let pos = session
            .registry()
            .define(
                "general",
                "string",
                "test.long",
                "Test Long",
                "test.long",
                "help",
                FieldKind::Str,
                crate::field::kind::FieldFlags::empty(),
                DefineOptions::default(),
            )
            .expect("define");
        let long = "a".repeat(crate::field::store::MAX_ELEMENT_SIZE + 1);
        session
            .add_string(pos, "test.long", "test.long", FieldKind::Str, &long)
            .expect("add");
        assert!(session.tags.contains("truncated-field-test.long"));
    }

    #[test]
    fn short_string_add_does_not_tag_session() {
        let mut session = new_session();
        let pos = session
            .registry()
            .define(
                "general",
                "string",
                "test.short",
                "Test Short",
                "test.short",
                "help",
                FieldKind::Str,
                crate::field::kind::FieldFlags::empty(),
                DefineOptions::default(),
            )
            .expect("define");
        session
            .add_string(pos, "test.short", "test.short", FieldKind::Str, "fine")
            .expect("add");
        assert!(session.tags.is_empty());
    }

    #[test]
    fn mid_save_raises_once_json_size_crosses_threshold() {
        let mut session = new_session();
        let pos = session
            .registry()
            .define(
                "general",
                "string",
                "test.big",
                "Test Big",
                "test.big",
                "help",
                FieldKind::StrArray,
                crate::field::kind::FieldFlags::empty(),
                DefineOptions::default(),
            )
            .expect("define");
        assert!(!session.mid_save);
        let chunk = "x".repeat(1000);
        for _ in 0..25 {
            session
                .add_string(pos, "test.big", "test.big", FieldKind::StrArray, &chunk)
                .expect("add");
        }
        assert!(session.mid_save);
    }
}
