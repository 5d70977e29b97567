// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Error taxonomy for the field registry / dispatch core.
//!
//! Fatal startup and logic errors (position-space exhaustion, `FIELDS_MAX`
//! overflow, type-mismatched adds) are modeled as [`RegistryError`] /
//! [`StoreError`] and are expected to terminate the process the way the
//! original `LOGEXIT` macro does — callers should treat them as
//! unrecoverable rather than retry. Per-packet parse failures are *not*
//! represented here: those are session tags and boolean returns, per
//! `spec.md` §7.

use thiserror::Error;

/// Fatal errors raised while registering fields, all of which indicate a
/// misconfigured schema or an exhausted position space rather than bad
/// packet data.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(
        "position space exhausted: maxDbField ({max_db_field}) would cross \
         minInternalField ({min_internal_field})"
    )]
    PositionSpaceExhausted {
        max_db_field: u32,
        min_internal_field: u32,
    },

    #[error("termfield db name '{0}' must not end with '-term'")]
    TermfieldDbSuffix(String),

    #[error("field definition text is missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("group name '{0}' is too long")]
    GroupNameTooLong(String),

    #[error("dbField '{0}' was never defined")]
    UnknownDbField(String),

    #[error("expression '{0}' was never defined")]
    UnknownExpression(String),

    #[error("FIELDS_MAX ({0}) is not a power of two")]
    FieldsMaxNotPowerOfTwo(u32),
}

/// Fatal errors raised by the session field store, all of which indicate a
/// programmer bug (wrong add-kind for a field's declared type) rather than
/// a data-dependent failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(
        "field {expression} (db: {db_field}) is kind {actual:?}, tried to add \
         a {attempted} value"
    )]
    KindMismatch {
        expression: String,
        db_field: String,
        actual: crate::field::kind::FieldKind,
        attempted: &'static str,
    },

    #[error("position {0} has no registered FieldInfo")]
    UnregisteredPosition(i32),
}
