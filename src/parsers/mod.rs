// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Protocol parsers. SIP is the only one implemented here; it stands in
//! for the dozens of protocol parsers the original ships, as the worked
//! exemplar for how a parser plugs into classifier/parser dispatch.

pub mod sip;
