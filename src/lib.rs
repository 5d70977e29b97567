// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Field registry, per-session typed field store, field-operations engine,
//! and classifier/parser dispatch for a packet-capture pipeline, with SIP
//! as the worked exemplar protocol parser.

pub mod cfg;
pub mod dispatch;
pub mod error;
pub mod field;
pub mod parsers;
pub mod rules;
pub mod schema;
pub mod session;
