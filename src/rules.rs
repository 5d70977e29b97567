// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The rule engine boundary. This crate does not compile or evaluate
//! rules; it only calls out to one whenever a field gets a value, the way
//! `arkime_rules_run_field_set` is called from `arkime_field_string_add`
//! and friends in `field.c`. Callers that don't have a rule engine wired
//! in get [`NullRuleHook`].

use crate::{field::store::FieldValue, session::Session};

/// Invoked whenever a field add completes, so an external rule engine can
/// react (tag the session, fire a pseudo-field op, …). Mirrors
/// `arkime_rules_run_field_set`'s call site, not its implementation.
pub trait RuleHook: std::fmt::Debug + Send + Sync {
    fn on_field_set(&self, session: &mut Session, pos: i32, value: &FieldValue);
}

/// The default hook when no rule engine is configured.
#[derive(Debug, Default)]
pub struct NullRuleHook;

impl RuleHook for NullRuleHook {
    fn on_field_set(&self, _session: &mut Session, _pos: i32, _value: &FieldValue) {}
}
