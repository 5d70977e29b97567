// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The process-wide field registry: interns field expressions and db names
//! into dense positions, partitioned the way `field.c` partitions
//! `config.fields[]` (see `spec.md` §3 "Position Spaces").

use std::sync::{
    atomic::{AtomicI32, AtomicU32, Ordering},
    Arc,
};

use dashmap::DashMap;

use crate::{
    error::RegistryError,
    field::{
        info::{DefineOptions, FieldInfo, GetCb, UNSET_POS},
        kind::{FieldFlags, FieldKind},
        ops::PseudoField,
    },
    schema::{NullSchemaSink, SchemaSink},
};

/// Total number of real field positions available, mirroring
/// `ARKIME_FIELDS_DB_MAX`/`FIELDS_MAX` in the original. Must be a power of
/// two so the dense `Vec<Option<Cell>>` backing store never needs a sparse
/// fallback.
pub const FIELDS_MAX: u32 = 4096;

/// The registry's two parallel name indices plus the monotonically moving
/// `maxDbField`/`minInternalField` boundary.
///
/// `by_db` and `by_expression` are `DashMap`s rather than a single
/// `RwLock<HashMap>` for the same reason the teacher's
/// `ClientConnection` keeps its per-ITT channel table in a `DashMap`: many
/// concurrent readers (every packet on every worker thread doing a field
/// lookup) should never block each other, and writes (field registration)
/// only happen at startup/config-reload.
pub struct FieldRegistry {
    by_expression: DashMap<String, i32>,
    by_db: DashMap<String, i32>,
    infos: DashMap<i32, Arc<FieldInfo>>,
    /// Schema-only `FieldInfo`s installed by [`Self::define_json`]: known to
    /// exist (and resolvable by expression/db name to the `-1` sentinel in
    /// `by_expression`/`by_db`) but not yet promoted to a real position.
    /// Keyed by expression since many such entries can share the `-1`
    /// sentinel position simultaneously.
    schema_only: DashMap<String, Arc<FieldInfo>>,
    groups: DashMap<String, u32>,
    next_group_num: AtomicU32,
    max_db_field: AtomicI32,
    min_internal_field: AtomicI32,
    schema_sink: Arc<dyn SchemaSink>,
}

impl FieldRegistry {
    /// Builds a fresh registry with the internal computed-field getters and
    /// pseudo-field expressions pre-registered, mirroring
    /// `arkime_field_init`. Schema-change notifications go nowhere; use
    /// [`Self::with_schema_sink`] to wire in a real external-index
    /// collaborator.
    pub fn new() -> Result<Arc<Self>, RegistryError> {
        Self::with_schema_sink(Arc::new(NullSchemaSink))
    }

    /// Like [`Self::new`], but notifies `sink` of every `define`/`defineJson`
    /// registration and schema-level update, mirroring the external-index
    /// writes `arkime_field_define` performs alongside the in-memory ones.
    pub fn with_schema_sink(sink: Arc<dyn SchemaSink>) -> Result<Arc<Self>, RegistryError> {
        if !FIELDS_MAX.is_power_of_two() {
            return Err(RegistryError::FieldsMaxNotPowerOfTwo(FIELDS_MAX));
        }
        let registry = Arc::new(Self {
            by_expression: DashMap::new(),
            by_db: DashMap::new(),
            infos: DashMap::new(),
            schema_only: DashMap::new(),
            groups: DashMap::new(),
            next_group_num: AtomicU32::new(1),
            max_db_field: AtomicI32::new(0),
            min_internal_field: AtomicI32::new(FIELDS_MAX as i32),
            schema_sink: sink,
        });
        registry.register_pseudo_fields();
        crate::field::internal::register_internal_getters(&registry);
        Ok(registry)
    }

    fn register_pseudo_fields(&self) {
        let pseudo = [
            ("dontSaveSPI", PseudoField::StopSpi),
            ("_dontSaveSPI", PseudoField::StopSpi),
            ("_maxPacketsToSave", PseudoField::StopPcap),
            ("_minPacketsBeforeSavingSPI", PseudoField::MinSave),
            ("_dropBySrc", PseudoField::DropSrc),
            ("_dropByDst", PseudoField::DropDst),
            ("_dropBySession", PseudoField::DropSession),
            ("_dontCheckYara", PseudoField::StopYara),
        ];
        for (expr, field) in pseudo {
            self.by_expression
                .insert(expr.to_string(), pseudo_sentinel(field));
        }
    }

    pub fn pseudo_field(&self, expression: &str) -> Option<PseudoField> {
        PseudoField::from_expression(expression)
    }

    /// `arkime_field_group_num`: interns a group name, capping at 64 bytes
    /// the way `ArkimeFieldInfo_t.group` (a fixed `char[64]`) does.
    pub fn group_num(&self, group: &str) -> Result<u32, RegistryError> {
        if group.len() >= 64 {
            return Err(RegistryError::GroupNameTooLong(group.to_string()));
        }
        if let Some(existing) = self.groups.get(group) {
            return Ok(*existing);
        }
        let num = self.next_group_num.fetch_add(1, Ordering::AcqRel);
        self.groups.insert(group.to_string(), num);
        Ok(num)
    }

    /// Registers a real field and assigns it the next ordinary position
    /// (`config.maxDbField++`), unifying by `db_field` if one with the same
    /// db name is already registered (`arkime_field_define`'s unify path).
    pub fn define(
        &self,
        group: &str,
        kind_str: &str,
        expression: &str,
        friendly: &str,
        db_field_full: &str,
        help: &str,
        kind: FieldKind,
        flags: FieldFlags,
        opts: DefineOptions,
    ) -> Result<i32, RegistryError> {
        if db_field_full.ends_with("-term") {
            return Err(RegistryError::TermfieldDbSuffix(db_field_full.to_string()));
        }

        if let Some(existing_pos) = self.by_db.get(db_field_full).map(|p| *p) {
            self.by_expression.insert(expression.to_string(), existing_pos);

            if let Some(existing_info) = self.infos.get(&existing_pos).map(|e| Arc::clone(&e)) {
                // A FAKE re-definition of a field that's already positioned
                // (e.g. a companion re-declared by a second config source)
                // is a no-op: the original registration wins.
                if flags.contains(FieldFlags::FAKE) && existing_info.pos() >= 0 {
                    return Ok(existing_pos);
                }

                if flags.contains(FieldFlags::DISABLED) {
                    existing_info.set_flags(existing_info.flags() | FieldFlags::DISABLED);
                }

                if existing_info.kind != kind {
                    tracing::warn!(
                        expression = %expression,
                        db_field = %db_field_full,
                        existing_kind = ?existing_info.kind,
                        redefined_kind = ?kind,
                        "field redefined with a mismatched kind; keeping the original registration"
                    );
                }

                let category_changed = opts.category != existing_info.category;
                let transform_changed = opts.transform != existing_info.transform;
                let aliases_changed = opts.aliases != existing_info.aliases;
                if category_changed || transform_changed || aliases_changed {
                    let updated = self.overwrite_info(
                        &existing_info,
                        group,
                        kind_str,
                        expression,
                        friendly,
                        db_field_full,
                        help,
                        opts,
                    );
                    self.infos.insert(existing_pos, Arc::clone(&updated));
                    self.schema_sink.update_field(&updated);
                }
            }

            return Ok(existing_pos);
        }

        let _ = self.group_num(group)?;
        let info = Arc::new(FieldInfo::new(
            group,
            kind_str,
            expression,
            friendly,
            db_field_full,
            help,
            kind,
            flags,
            opts,
        ));

        let pos = self.max_db_field.fetch_add(1, Ordering::AcqRel);
        let min_internal = self.min_internal_field.load(Ordering::Acquire);
        if pos >= min_internal {
            return Err(RegistryError::PositionSpaceExhausted {
                max_db_field: pos as u32,
                min_internal_field: min_internal as u32,
            });
        }
        info.set_pos(pos);

        self.infos.insert(pos, Arc::clone(&info));
        self.by_db.insert(db_field_full.to_string(), pos);
        self.by_expression.insert(expression.to_string(), pos);
        self.schema_sink.define_field(&info);

        if flags.contains(FieldFlags::CNT) {
            self.define_count_companion(db_field_full, pos, flags.contains(FieldFlags::ECS_CNT))?;
        }

        if kind.is_ip_like() || flags.contains(FieldFlags::IPPRE) {
            self.define_ip_geo_companions(expression, db_field_full, flags.contains(FieldFlags::IPPRE))?;
        }

        Ok(pos)
    }

    /// Rebuilds a [`FieldInfo`] with new schema-side strings (category,
    /// transform, aliases, help, friendly name) while preserving the parts
    /// of the original registration that must survive a re-`define`: its
    /// position, flags, rule-enabled bit and any getter/object hooks.
    #[allow(clippy::too_many_arguments)]
    fn overwrite_info(
        &self,
        existing: &Arc<FieldInfo>,
        group: &str,
        kind_str: &str,
        expression: &str,
        friendly: &str,
        db_field_full: &str,
        help: &str,
        opts: DefineOptions,
    ) -> Arc<FieldInfo> {
        let mut info = FieldInfo::new(
            group,
            kind_str,
            expression,
            friendly,
            db_field_full,
            help,
            existing.kind,
            existing.flags(),
            opts,
        );
        info.set_pos(existing.pos());
        info.set_rule_enabled(existing.rule_enabled());
        info.cnt_for_pos = existing.cnt_for_pos;
        info.object_hooks = existing.object_hooks.clone();
        info.get_cb = existing.get_cb.clone();
        Arc::new(info)
    }

    /// Synthesizes the `<base>GEO`/`<base>ASN`/`<base>RIR` companion fields
    /// `arkime_field_define` attaches to every IP-kind field (field.c's
    /// GEO/ASN/RIR block), skipping any companion whose expression is
    /// already registered.
    fn define_ip_geo_companions(
        &self,
        expression: &str,
        db_field_full: &str,
        ippre: bool,
    ) -> Result<(), RegistryError> {
        let suffix = expression.rsplit('.').next().unwrap_or(expression);
        let companions: [(&str, String); 3] = if ippre {
            [
                ("GEO", format!("country.{suffix}")),
                ("ASN", format!("asn.{suffix}")),
                ("RIR", format!("rir.{suffix}")),
            ]
        } else {
            [
                ("GEO", format!("{expression}.country")),
                ("ASN", format!("{expression}.asn")),
                ("RIR", format!("{expression}.rir")),
            ]
        };

        for (db_suffix, companion_expr) in companions {
            if self.by_expression.contains_key(&companion_expr) {
                continue;
            }
            let companion_db = format!("{db_field_full}{db_suffix}");
            if let Some(existing_pos) = self.by_db.get(&companion_db).map(|p| *p) {
                self.by_expression.insert(companion_expr, existing_pos);
                continue;
            }

            let pos = self.max_db_field.fetch_add(1, Ordering::AcqRel);
            let min_internal = self.min_internal_field.load(Ordering::Acquire);
            if pos >= min_internal {
                return Err(RegistryError::PositionSpaceExhausted {
                    max_db_field: pos as u32,
                    min_internal_field: min_internal as u32,
                });
            }
            let info = Arc::new(FieldInfo::new(
                "general",
                "string",
                &companion_expr,
                &companion_expr,
                &companion_db,
                "ip geo-enrichment companion",
                FieldKind::Str,
                FieldFlags::FAKE,
                DefineOptions::default(),
            ));
            info.set_pos(pos);
            self.infos.insert(pos, info);
            self.by_db.insert(companion_db, pos);
            self.by_expression.insert(companion_expr, pos);
        }
        Ok(())
    }

    fn define_count_companion(
        &self,
        parent_db_field: &str,
        parent_pos: i32,
        _ecs: bool,
    ) -> Result<(), RegistryError> {
        let cnt_db = format!("{parent_db_field}Cnt");
        let cnt_expr = format!("{parent_db_field}.cnt");
        let pos = self.max_db_field.fetch_add(1, Ordering::AcqRel);
        let min_internal = self.min_internal_field.load(Ordering::Acquire);
        if pos >= min_internal {
            return Err(RegistryError::PositionSpaceExhausted {
                max_db_field: pos as u32,
                min_internal_field: min_internal as u32,
            });
        }
        let info = Arc::new(FieldInfo::new(
            "general",
            "integer",
            &cnt_expr,
            &cnt_expr,
            &cnt_db,
            "count companion",
            FieldKind::Int,
            FieldFlags::FAKE,
            DefineOptions::default(),
        ));
        info.set_pos(pos);
        self.infos.insert(pos, info);
        self.by_db.insert(cnt_db, pos);
        self.by_expression.insert(cnt_expr, pos);
        let _ = parent_pos;
        Ok(())
    }

    /// Registers an internal (computed, read-only) field at a position
    /// allocated *downward* from `FIELDS_MAX`, mirroring
    /// `arkime_field_by_exp_add_internal`.
    pub fn by_exp_add_internal(
        &self,
        expression: &str,
        kind: FieldKind,
        get_cb: GetCb,
    ) -> i32 {
        let pos = self.min_internal_field.fetch_sub(1, Ordering::AcqRel) - 1;
        let mut info = FieldInfo::new(
            "general",
            "internal",
            expression,
            expression,
            expression,
            "internal computed field",
            kind,
            FieldFlags::NODB,
            DefineOptions::default(),
        );
        info.set_pos(pos);
        info.get_cb = Some(get_cb);
        self.infos.insert(pos, Arc::new(info));
        self.by_expression.insert(expression.to_string(), pos);
        pos
    }

    pub fn by_db(&self, db_field: &str) -> Option<i32> {
        self.by_db.get(db_field).map(|p| *p)
    }

    /// `arkime_field_by_exp`: looks up a position by expression. A schema-only
    /// entry installed via [`Self::define_json`] (recorded as `pos == -1`)
    /// is promoted to a real session-side slot on first use here, the way
    /// the original assigns a position lazily the first time a pcap session
    /// actually needs to store a value for a field the index schema already
    /// knows about.
    pub fn by_exp(&self, expression: &str) -> Option<i32> {
        let pos = *self.by_expression.get(expression)?;
        if pos != UNSET_POS {
            return Some(pos);
        }
        self.promote_schema_only(expression)
    }

    /// Promotes a `pos == -1` schema-only entry to a real position, picking
    /// the session-side container kind from its schema `kind` string
    /// (`integer`/`seconds` → `IntMap`, `ip` → `IpMap`, else `StrMap`), per
    /// [`FieldKind::from_schema_kind`].
    fn promote_schema_only(&self, expression: &str) -> Option<i32> {
        let schema_info = self.schema_only.get(expression).map(|e| Arc::clone(&e))?;
        let kind = FieldKind::from_schema_kind(&schema_info.kind_str);

        let pos = self.max_db_field.fetch_add(1, Ordering::AcqRel);
        let min_internal = self.min_internal_field.load(Ordering::Acquire);
        if pos >= min_internal {
            self.max_db_field.fetch_sub(1, Ordering::AcqRel);
            return None;
        }

        let promoted = FieldInfo::new(
            schema_info.group.clone(),
            schema_info.kind_str.clone(),
            expression,
            schema_info.friendly.clone(),
            schema_info.db_field_full.clone(),
            schema_info.help.clone(),
            kind,
            schema_info.flags(),
            DefineOptions {
                category: schema_info.category.clone(),
                transform: schema_info.transform.clone(),
                aliases: schema_info.aliases.clone(),
            },
        );
        promoted.set_pos(pos);
        let promoted = Arc::new(promoted);

        self.infos.insert(pos, promoted);
        self.by_expression.insert(expression.to_string(), pos);
        self.by_db.insert(schema_info.db_field_full.clone(), pos);
        self.schema_only.remove(expression);
        Some(pos)
    }

    /// Installs or updates a schema-only `FieldInfo` from an external-index
    /// entry (`arkime_field_define_json`'s role: turning an Elasticsearch
    /// field-capabilities hit into an unpositioned `FieldInfo`). The entry's
    /// position stays `-1` until the first [`Self::by_exp`] lookup promotes
    /// it to a real slot.
    pub fn define_json(
        &self,
        expression: &str,
        json_blob: &serde_json::Value,
    ) -> Result<(), RegistryError> {
        // Legacy dotted `http.request-`/`http.response-` names were folded
        // into the bracketed `http.request.headers.*` form; any schema
        // entry still carrying the old prefix is dropped, not installed.
        if expression.starts_with("http.request-") || expression.starts_with("http.response-") {
            self.by_expression.remove(expression);
            self.by_db.remove(expression);
            self.schema_only.remove(expression);
            return Ok(());
        }

        let group = json_blob
            .get("group")
            .and_then(|v| v.as_str())
            .unwrap_or("general");
        let db_field_full = json_blob
            .get("dbField2")
            .and_then(|v| v.as_str())
            .or_else(|| json_blob.get("fieldECS").and_then(|v| v.as_str()))
            .ok_or(RegistryError::MissingKey("dbField2"))?;
        let kind_str = json_blob
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("string");
        let category = json_blob
            .get("category")
            .and_then(|v| v.as_str())
            .map(String::from);
        let transform = json_blob
            .get("transform")
            .and_then(|v| v.as_str())
            .map(String::from);
        let aliases = json_blob
            .get("aliases")
            .and_then(|v| v.as_str())
            .map(String::from);
        let disabled = json_blob
            .get("disabled")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let mut flags = FieldFlags::empty();
        if disabled {
            flags |= FieldFlags::DISABLED;
        }

        let info = Arc::new(FieldInfo::new(
            group,
            kind_str,
            expression,
            expression,
            db_field_full,
            "",
            FieldKind::from_schema_kind(kind_str),
            flags,
            DefineOptions {
                category,
                transform,
                aliases,
            },
        ));

        self.schema_only.insert(expression.to_string(), info);
        self.by_expression.insert(expression.to_string(), UNSET_POS);
        self.by_db.insert(db_field_full.to_string(), UNSET_POS);
        Ok(())
    }

    /// Parses a `key:value;key:value;…` field-definition line — the config
    /// grammar `arkime_field_define_text` accepts — and registers the
    /// result via [`Self::define`]. Recognizes `field`, `kind`, `db`,
    /// `friendly`, `help`, `category`, `transform`, `aliases`, `disabled`,
    /// `fake`, `cnt`, `ecscnt` and `ippre`.
    pub fn define_text(&self, spec: &str) -> Result<i32, RegistryError> {
        let mut field: Option<&str> = None;
        let mut kind_str: Option<&str> = None;
        let mut db: Option<&str> = None;
        let mut friendly: Option<&str> = None;
        let mut help: Option<&str> = None;
        let mut category: Option<String> = None;
        let mut transform: Option<String> = None;
        let mut aliases: Option<String> = None;
        let mut flags = FieldFlags::empty();

        for pair in spec.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let Some((key, value)) = pair.split_once(':') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            let truthy = value == "true" || value == "1";
            match key {
                "field" => field = Some(value),
                "kind" => kind_str = Some(value),
                "db" => db = Some(value),
                "friendly" => friendly = Some(value),
                "help" => help = Some(value),
                "category" => category = Some(value.to_string()),
                "transform" => transform = Some(value.to_string()),
                "aliases" => aliases = Some(value.to_string()),
                "disabled" if truthy => flags |= FieldFlags::DISABLED,
                "fake" if truthy => flags |= FieldFlags::FAKE,
                "cnt" | "count" if truthy => flags |= FieldFlags::CNT,
                "ecscnt" if truthy => flags |= FieldFlags::ECS_CNT,
                "ippre" if truthy => flags |= FieldFlags::IPPRE,
                _ => {}
            }
        }

        let expression = field.ok_or(RegistryError::MissingKey("field"))?;
        let kind_str = kind_str.ok_or(RegistryError::MissingKey("kind"))?;

        // `db`-absent is only legal when the expression is already a known
        // field; otherwise the expression itself doubles as the db name.
        let db_field_full = match db {
            Some(db) => db,
            None => {
                if let Some(pos) = self.by_exp(expression) {
                    return Ok(pos);
                }
                expression
            }
        };

        let group = expression
            .split_once('.')
            .map(|(g, _)| g)
            .unwrap_or("general");

        self.define(
            group,
            kind_str,
            expression,
            friendly.unwrap_or(expression),
            db_field_full,
            help.unwrap_or(""),
            FieldKind::from_schema_kind(kind_str),
            flags,
            DefineOptions {
                category,
                transform,
                aliases,
            },
        )
    }

    pub fn field_info(&self, pos: i32) -> Option<Arc<FieldInfo>> {
        self.infos.get(&pos).map(|e| Arc::clone(&e))
    }

    pub fn max_db_field(&self) -> i32 {
        self.max_db_field.load(Ordering::Acquire)
    }

    pub fn min_internal_field(&self) -> i32 {
        self.min_internal_field.load(Ordering::Acquire)
    }
}

/// Internal encoding so pseudo-field expressions can live in the same
/// `by_expression` map as real fields without colliding with real
/// positions; callers should prefer [`FieldRegistry::pseudo_field`] to
/// re-derive the [`PseudoField`] from the *expression string* rather than
/// decoding this sentinel, which exists only to keep `by_exp` total.
fn pseudo_sentinel(field: PseudoField) -> i32 {
    match field {
        PseudoField::StopSpi => -2,
        PseudoField::StopPcap => -3,
        PseudoField::MinSave => -4,
        PseudoField::DropSrc => -5,
        PseudoField::DropDst => -6,
        PseudoField::DropSession => -7,
        PseudoField::StopYara => -8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingSink {
        updates: Mutex<Vec<String>>,
    }

    impl SchemaSink for RecordingSink {
        fn define_field(&self, _info: &Arc<FieldInfo>) {}
        fn update_field(&self, info: &Arc<FieldInfo>) {
            self.updates.lock().unwrap().push(info.expression.clone());
        }
        fn delete_field(&self, _expression: &str) {}
    }

    #[test]
    fn define_assigns_increasing_positions() {
        let reg = FieldRegistry::new().expect("registry");
        let p0 = reg
            .define(
                "general",
                "string",
                "test.a",
                "Test A",
                "test.a",
                "help",
                FieldKind::Str,
                FieldFlags::empty(),
                DefineOptions::default(),
            )
            .expect("define");
        let p1 = reg
            .define(
                "general",
                "string",
                "test.b",
                "Test B",
                "test.b",
                "help",
                FieldKind::Str,
                FieldFlags::empty(),
                DefineOptions::default(),
            )
            .expect("define");
        assert!(p1 > p0);
    }

    #[test]
    fn define_unifies_by_db_field() {
        let reg = FieldRegistry::new().expect("registry");
        let p0 = reg
            .define(
                "general",
                "string",
                "test.a",
                "Test A",
                "test.shared",
                "help",
                FieldKind::Str,
                FieldFlags::empty(),
                DefineOptions::default(),
            )
            .expect("define");
        let p1 = reg
            .define(
                "general",
                "string",
                "test.alias",
                "Test Alias",
                "test.shared",
                "help",
                FieldKind::Str,
                FieldFlags::empty(),
                DefineOptions::default(),
            )
            .expect("define");
        assert_eq!(p0, p1);
        assert_eq!(reg.by_exp("test.alias"), Some(p0));
    }

    #[test]
    fn internal_fields_are_allocated_downward_from_fields_max() {
        let reg = FieldRegistry::new().expect("registry");
        let before = reg.min_internal_field();
        let pos = reg.by_exp_add_internal(
            "test.internal",
            FieldKind::Int,
            std::sync::Arc::new(|_session| None),
        );
        assert!(pos < before);
        assert_eq!(reg.by_exp("test.internal"), Some(pos));
    }

    #[test]
    fn define_propagates_disabled_flag_on_redefine() {
        let reg = FieldRegistry::new().expect("registry");
        let pos = reg
            .define(
                "general",
                "string",
                "test.a",
                "Test A",
                "test.shared2",
                "help",
                FieldKind::Str,
                FieldFlags::empty(),
                DefineOptions::default(),
            )
            .expect("define");
        reg.define(
            "general",
            "string",
            "test.alias2",
            "Test Alias",
            "test.shared2",
            "help",
            FieldKind::Str,
            FieldFlags::DISABLED,
            DefineOptions::default(),
        )
        .expect("define");
        let info = reg.field_info(pos).expect("info");
        assert!(info.is_disabled());
    }

    #[test]
    fn define_overwrites_category_and_notifies_sink() {
        let sink = Arc::new(RecordingSink::default());
        let reg = FieldRegistry::with_schema_sink(sink.clone()).expect("registry");
        reg.define(
            "general",
            "string",
            "test.a",
            "Test A",
            "test.shared3",
            "help",
            FieldKind::Str,
            FieldFlags::empty(),
            DefineOptions::default(),
        )
        .expect("define");
        reg.define(
            "general",
            "string",
            "test.alias3",
            "Test Alias",
            "test.shared3",
            "help",
            FieldKind::Str,
            FieldFlags::empty(),
            DefineOptions {
                category: Some("network".to_string()),
                ..Default::default()
            },
        )
        .expect("define");
        assert_eq!(*sink.updates.lock().unwrap(), vec!["test.alias3".to_string()]);
    }

    #[test]
    fn define_ip_field_synthesizes_geo_companions() {
        let reg = FieldRegistry::new().expect("registry");
        reg.define(
            "general",
            "ip",
            "ip.src",
            "Source IP",
            "src.ip",
            "help",
            FieldKind::Ip,
            FieldFlags::empty(),
            DefineOptions::default(),
        )
        .expect("define");
        assert!(reg.by_exp("ip.src.country").is_some());
        assert!(reg.by_exp("ip.src.asn").is_some());
        assert!(reg.by_exp("ip.src.rir").is_some());
        assert_eq!(reg.by_db("src.ipGEO"), reg.by_exp("ip.src.country"));
    }

    #[test]
    fn define_json_installs_schema_only_entry_promoted_on_by_exp() {
        let reg = FieldRegistry::new().expect("registry");
        let blob = serde_json::json!({
            "group": "http",
            "dbField2": "http.customHeader",
            "type": "string",
        });
        reg.define_json("http.customHeader", &blob).expect("define_json");
        assert_eq!(reg.by_db("http.customHeader"), Some(UNSET_POS));
        let pos = reg.by_exp("http.customHeader").expect("promoted");
        assert!(pos >= 0);
        assert_eq!(reg.by_db("http.customHeader"), Some(pos));
    }

    #[test]
    fn define_json_drops_legacy_http_dash_prefix() {
        let reg = FieldRegistry::new().expect("registry");
        let blob = serde_json::json!({"dbField2": "http.request-foo", "type": "string"});
        reg.define_json("http.request-foo", &blob).expect("define_json");
        assert!(reg.by_exp("http.request-foo").is_none());
    }

    #[test]
    fn define_text_parses_grammar_and_registers() {
        let reg = FieldRegistry::new().expect("registry");
        let pos = reg
            .define_text("field:test.texty;kind:integer;db:test.texty;friendly:Texty")
            .expect("define_text");
        assert!(pos >= 0);
        assert_eq!(reg.by_exp("test.texty"), Some(pos));
    }

    #[test]
    fn define_text_rejects_termfield_db_suffix() {
        let reg = FieldRegistry::new().expect("registry");
        let err = reg
            .define_text("field:test.term;kind:string;db:test.term-term")
            .unwrap_err();
        assert!(matches!(err, RegistryError::TermfieldDbSuffix(_)));
    }
}
