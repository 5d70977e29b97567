// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The closed set of field kinds (`spec.md` §3) and the bit flags that
//! modify how the registry and store treat a given field.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// The closed enum of storage shapes a field can take.
///
/// Map-like variants (`StrMap`, `IntMap`, `FloatMap`, `IpMap`) differ from
/// their set-like counterparts only in implementation trade-off: map-like
/// values hold bare key bindings, set-like values hold richer entries
/// (length, utf8 flag, opaque user-word). We keep them distinct rather than
/// collapsing them, since `StrSet` is used for exactly one case
/// (`addStringUserWord`) that needs the extra per-entry payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Str,
    StrArray,
    StrSet,
    StrMap,
    Int,
    IntArray,
    IntSet,
    IntMap,
    Float,
    FloatArray,
    FloatMap,
    Ip,
    IpMap,
    Object,
}

impl FieldKind {
    /// Maps the schema-side `kind:` string (`integer`, `seconds`, `ip`,
    /// `float`, …) to the session-side container type used when a field is
    /// promoted from "known but unpositioned" to "real", per
    /// `arkime_field_by_exp`'s promotion rule in `field.c`.
    pub fn from_schema_kind(kind: &str) -> Self {
        match kind {
            "integer" | "seconds" => FieldKind::IntMap,
            "ip" => FieldKind::IpMap,
            "float" => FieldKind::FloatMap,
            _ => FieldKind::StrMap,
        }
    }

    pub fn is_string_like(self) -> bool {
        matches!(
            self,
            FieldKind::Str | FieldKind::StrArray | FieldKind::StrSet | FieldKind::StrMap
        )
    }

    pub fn is_int_like(self) -> bool {
        matches!(
            self,
            FieldKind::Int | FieldKind::IntArray | FieldKind::IntSet | FieldKind::IntMap
        )
    }

    pub fn is_float_like(self) -> bool {
        matches!(self, FieldKind::Float | FieldKind::FloatArray | FieldKind::FloatMap)
    }

    pub fn is_ip_like(self) -> bool {
        matches!(self, FieldKind::Ip | FieldKind::IpMap)
    }
}

bitflags! {
    /// Mirrors the `ARKIME_FIELD_FLAG_*` bit set in `field.c`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldFlags: u32 {
        const DISABLED         = 0b0000_0000_0001;
        const CNT               = 0b0000_0000_0010;
        const LINKED_SESSIONS   = 0b0000_0000_0100;
        const FORCE_UTF8        = 0b0000_0000_1000;
        const FAKE              = 0b0000_0001_0000;
        const NODB              = 0b0000_0010_0000;
        const IPPRE             = 0b0000_0100_0000;
        const ECS_CNT           = 0b0000_1000_0000;
        const DIFF_FROM_LAST    = 0b0001_0000_0000;
        const NOSAVE            = 0b0010_0000_0000;
    }
}

impl Default for FieldFlags {
    fn default() -> Self {
        FieldFlags::empty()
    }
}
