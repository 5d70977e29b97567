// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The external index/schema boundary (`spec.md` §6): whatever system
//! stores field definitions durably and serves them back for search/UI is
//! out of scope for this crate. `SchemaSink` is the local collaborator
//! interface a caller wires in to observe registrations.

use std::sync::Arc;

use crate::field::info::FieldInfo;

pub trait SchemaSink: std::fmt::Debug + Send + Sync {
    fn define_field(&self, info: &Arc<FieldInfo>);
    fn update_field(&self, info: &Arc<FieldInfo>);
    fn delete_field(&self, expression: &str);
}

/// No-op default, used whenever nothing downstream cares about schema
/// change notifications.
#[derive(Debug, Default)]
pub struct NullSchemaSink;

impl SchemaSink for NullSchemaSink {
    fn define_field(&self, _info: &Arc<FieldInfo>) {}
    fn update_field(&self, _info: &Arc<FieldInfo>) {}
    fn delete_field(&self, _expression: &str) {}
}

/// Records calls via `tracing`, useful for tests and the demo binary.
#[derive(Debug, Default)]
pub struct LoggingSchemaSink;

impl SchemaSink for LoggingSchemaSink {
    fn define_field(&self, info: &Arc<FieldInfo>) {
        tracing::info!(expression = %info.expression, db_field = %info.db_field_full, "define_field");
    }

    fn update_field(&self, info: &Arc<FieldInfo>) {
        tracing::info!(expression = %info.expression, "update_field");
    }

    fn delete_field(&self, expression: &str) {
        tracing::info!(expression, "delete_field");
    }
}
