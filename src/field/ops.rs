// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Field operations: a small declarative "set this field, maybe" engine
//! that classifiers and parsers build up and then replay against a
//! session. Grounded on `arkime_field_ops_*` in `field.c`.

use crate::{field::kind::FieldKind, session::Session};

/// Pseudo-field targets: negative sentinel positions that, instead of
/// addressing a real [`crate::field::info::FieldInfo`] slot, mutate a
/// control flag directly on the [`Session`]. Mirrors
/// `ARKIME_FIELD_SPECIAL_*` in `field.c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoField {
    StopSpi,
    StopPcap,
    MinSave,
    DropSrc,
    DropDst,
    DropSession,
    StopYara,
}

impl PseudoField {
    pub fn from_expression(expr: &str) -> Option<Self> {
        match expr {
            "dontSaveSPI" | "_dontSaveSPI" => Some(PseudoField::StopSpi),
            "_maxPacketsToSave" => Some(PseudoField::StopPcap),
            "_minPacketsBeforeSavingSPI" => Some(PseudoField::MinSave),
            "_dropBySrc" => Some(PseudoField::DropSrc),
            "_dropByDst" => Some(PseudoField::DropDst),
            "_dropBySession" => Some(PseudoField::DropSession),
            "_dontCheckYara" => Some(PseudoField::StopYara),
            _ => None,
        }
    }

    /// Clamp applied when an op targeting this pseudo-field is parsed
    /// (`arkime_field_ops_add_match`'s per-case min/max clamp).
    pub fn clamp(self, value: i64) -> i64 {
        let (lo, hi) = match self {
            PseudoField::StopSpi | PseudoField::StopYara => (0, 1),
            PseudoField::StopPcap => (0, 0xffff),
            PseudoField::MinSave => (0, 0xff),
            PseudoField::DropSrc | PseudoField::DropDst | PseudoField::DropSession => {
                (0, i64::MAX)
            }
        };
        value.clamp(lo, hi)
    }
}

/// Where a [`FieldOp`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpTarget {
    /// A real, registered field slot.
    Real(i32),
    /// A session control-flag pseudo-field.
    Special(PseudoField),
}

/// How an int-valued op should be gated against the field's current value,
/// parsed from a leading `<`, `>`, `=`, `min `, `max `, or bare digits
/// (`arkime_field_ops_int_parse`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntGate {
    Set,
    SetIfMore,
    SetIfLess,
}

impl IntGate {
    /// `arkime_field_ops_should_run_int_op`: whether an op with this gate
    /// and target int `target` should fire against the field/flag's
    /// current `current` value.
    pub fn should_run(self, target: i64, current: i64) -> bool {
        match self {
            IntGate::Set => target != current,
            IntGate::SetIfMore => target > current,
            IntGate::SetIfLess => target < current,
        }
    }
}

/// Parses an op's int grammar (`arkime_field_ops_int_parse`): `<N`, `>N`,
/// `=N`, `min N`, `max N`, or bare `N` (parse failures default to `0`, the
/// way `atoi` would).
pub fn parse_int_op(value: &str) -> (IntGate, i64) {
    let atoi = |s: &str| s.trim().parse::<i64>().unwrap_or(0);
    let mut chars = value.chars();
    match chars.next() {
        Some('<') => (IntGate::SetIfLess, atoi(&value[1..])),
        Some('>') => (IntGate::SetIfMore, atoi(&value[1..])),
        Some('=') => (IntGate::Set, atoi(&value[1..])),
        Some('m') if value.len() >= 5 && value.starts_with("min ") => {
            (IntGate::SetIfLess, atoi(&value[4..]))
        }
        Some('m') if value.len() >= 5 && value.starts_with("max ") => {
            (IntGate::SetIfMore, atoi(&value[4..]))
        }
        Some('m') => (IntGate::Set, 0),
        _ => (IntGate::Set, atoi(value)),
    }
}

/// The payload carried by one op, chosen by the target field's kind at
/// construction time (`arkime_field_ops_add_match`'s per-type switch).
#[derive(Debug, Clone)]
pub enum OpValue {
    Int { gate: IntGate, value: i64 },
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone)]
pub struct FieldOp {
    pub target: OpTarget,
    /// Present only when this op was produced by a classifier match and
    /// needs remapping through `custom-fields-remap` at run time.
    pub match_pos: Option<i32>,
    pub value: OpValue,
}

/// An ordered batch of [`FieldOp`]s, e.g. everything a classifier wants set
/// once its magic bytes match. Mirrors `ArkimeFieldOps_t`.
#[derive(Debug, Clone, Default)]
pub struct FieldOps {
    ops: Vec<FieldOp>,
}

impl FieldOps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// `arkime_field_ops_add`: appends a plain (non-match) op.
    pub fn add_int(&mut self, target: OpTarget, raw: &str) {
        self.add_int_match(target, raw, None);
    }

    pub fn add_str(&mut self, target: OpTarget, value: impl Into<String>) {
        self.ops.push(FieldOp {
            target,
            match_pos: None,
            value: OpValue::Str(value.into()),
        });
    }

    pub fn add_float(&mut self, target: OpTarget, value: f64) {
        self.ops.push(FieldOp {
            target,
            match_pos: None,
            value: OpValue::Float(value),
        });
    }

    /// `arkime_field_ops_add_match`: appends an op that may be remapped by
    /// a later classifier match position.
    pub fn add_int_match(&mut self, target: OpTarget, raw: &str, match_pos: Option<i32>) {
        let (gate, mut value) = parse_int_op(raw);
        if let OpTarget::Special(p) = target {
            value = p.clamp(value);
        }
        self.ops.push(FieldOp {
            target,
            match_pos,
            value: OpValue::Int { gate, value },
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldOp> {
        self.ops.iter()
    }
}

/// Table produced by `custom-fields-remap`: `remap[pos][match_pos] ->
/// new_pos`. A `FieldOp` whose `match_pos` is `Some` and which has an entry
/// here gets redirected before running.
#[derive(Debug, Default)]
pub struct FieldOpsRemap {
    table: std::collections::HashMap<(i32, i32), i32>,
}

impl FieldOpsRemap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, old_pos: i32, match_pos: i32, new_pos: i32) {
        self.table.insert((old_pos, match_pos), new_pos);
    }

    pub fn resolve(&self, pos: i32, match_pos: i32) -> i32 {
        *self.table.get(&(pos, match_pos)).unwrap_or(&pos)
    }
}

/// Runs `ops` against `session`, consulting `remap` to redirect `Real`
/// targets that came from a classifier match. Mirrors
/// `arkime_field_ops_run_match`; [`run`] is the `matchPos == -1` case.
pub fn run_match(session: &mut Session, ops: &FieldOps, remap: &FieldOpsRemap) {
    for op in ops.iter() {
        match op.target {
            OpTarget::Special(pseudo) => apply_pseudo(session, pseudo, &op.value),
            OpTarget::Real(mut pos) => {
                if let Some(match_pos) = op.match_pos {
                    pos = remap.resolve(pos, match_pos);
                }
                if session.registry_min_internal_field().is_some_and(|min| pos >= min) {
                    // Internal fields cannot be set via ops (ALW TODO upstream too).
                    continue;
                }
                apply_real(session, pos, &op.value);
            }
        }
    }
}

pub fn run(session: &mut Session, ops: &FieldOps) {
    run_match(session, ops, &FieldOpsRemap::default());
}

fn apply_pseudo(session: &mut Session, pseudo: PseudoField, value: &OpValue) {
    let OpValue::Int { gate, value } = value else {
        return;
    };
    match pseudo {
        PseudoField::StopSpi => {
            if gate.should_run(*value, session.stop_spi as i64) {
                session.stop_spi = *value != 0;
            }
        }
        PseudoField::StopPcap => {
            if gate.should_run(*value, session.stop_saving as i64) {
                session.stop_saving = *value as u32;
                if session.packets[0] + session.packets[1] >= u64::from(session.stop_saving) {
                    session.tags.insert("truncated-pcap".to_string());
                }
            }
        }
        PseudoField::MinSave => {
            if gate.should_run(*value, session.min_saving as i64) {
                session.min_saving = *value as u8;
            }
        }
        PseudoField::StopYara => {
            if gate.should_run(*value, session.stop_yara as i64) {
                session.stop_yara = *value != 0;
            }
        }
        PseudoField::DropSrc => session.drop_hash.push((DropScope::Src, *value)),
        PseudoField::DropDst => session.drop_hash.push((DropScope::Dst, *value)),
        PseudoField::DropSession => session.drop_hash.push((DropScope::Session, *value)),
    }
}

/// `arkime_packet_drophash_add`'s scope argument, named instead of the
/// original's bare `0`/`1`/`-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropScope {
    Src,
    Dst,
    Session,
}

fn apply_real(session: &mut Session, pos: i32, value: &OpValue) {
    let Some(info) = session.registry_field_info(pos) else {
        return;
    };
    let kind = info.kind;
    let expression = info.expression.clone();
    let db_field = info.db_field.clone();
    match (kind, value) {
        (FieldKind::Int, OpValue::Int { gate, value }) => {
            let current = session
                .store
                .get(pos)
                .and_then(|c| match c {
                    crate::field::store::Cell::Int(v) => *v,
                    _ => None,
                })
                .unwrap_or(0);
            if session.store.count(pos) == 0 || gate.should_run(*value, current) {
                let _ = session.add_int(pos, &expression, &db_field, kind, *value);
            }
        }
        (
            FieldKind::IntArray | FieldKind::IntSet | FieldKind::IntMap,
            OpValue::Int { value, .. },
        ) => {
            let _ = session.add_int(pos, &expression, &db_field, kind, *value);
        }
        (FieldKind::Float | FieldKind::FloatArray | FieldKind::FloatMap, OpValue::Float(v)) => {
            let _ = session.add_float(pos, &expression, &db_field, kind, *v);
        }
        (FieldKind::Ip | FieldKind::IpMap, OpValue::Str(s)) => {
            let _ = session.add_ip_str(pos, &expression, &db_field, kind, s);
        }
        (
            FieldKind::Str | FieldKind::StrArray | FieldKind::StrSet | FieldKind::StrMap,
            OpValue::Str(s),
        ) => {
            let _ = session.add_string(pos, &expression, &db_field, kind, s);
        }
        (FieldKind::Object, _) => {
            // Unsupported, matches the original's empty case.
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gates() {
        assert_eq!(parse_int_op("<5"), (IntGate::SetIfLess, 5));
        assert_eq!(parse_int_op(">5"), (IntGate::SetIfMore, 5));
        assert_eq!(parse_int_op("=5"), (IntGate::Set, 5));
        assert_eq!(parse_int_op("min 5"), (IntGate::SetIfLess, 5));
        assert_eq!(parse_int_op("max 5"), (IntGate::SetIfMore, 5));
        assert_eq!(parse_int_op("5"), (IntGate::Set, 5));
        assert_eq!(parse_int_op("mq"), (IntGate::Set, 0));
    }

    #[test]
    fn pseudo_field_clamp_bounds() {
        assert_eq!(PseudoField::StopSpi.clamp(5), 1);
        assert_eq!(PseudoField::StopSpi.clamp(-1), 0);
        assert_eq!(PseudoField::StopPcap.clamp(100_000), 0xffff);
    }

    #[test]
    fn recognizes_pseudo_field_expressions() {
        assert_eq!(
            PseudoField::from_expression("dontSaveSPI"),
            Some(PseudoField::StopSpi)
        );
        assert_eq!(PseudoField::from_expression("not-a-pseudo"), None);
    }
}
