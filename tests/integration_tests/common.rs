// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, sync::Arc};

use netfield_core::{
    field::FieldRegistry,
    parsers::sip::{self, SipFields},
    rules::NullRuleHook,
    session::Session,
};

pub fn load_fixture(name: &str) -> Vec<u8> {
    let path = format!("tests/fixtures/{name}");
    fs::read(&path).unwrap_or_else(|e| panic!("reading fixture {path}: {e}"))
}

pub fn new_session_with_sip() -> (Session, SipFields) {
    let registry = FieldRegistry::new().expect("registry");
    let fields = sip::define_fields(&registry).expect("define sip fields");
    (Session::new(registry, Arc::new(NullRuleHook)), fields)
}
