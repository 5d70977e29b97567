// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use netfield_core::{
    field::FieldRegistry,
    field::ops::{run, FieldOps, OpTarget, PseudoField},
    rules::NullRuleHook,
    session::Session,
};
use std::sync::Arc;

fn session() -> Session {
    let registry = FieldRegistry::new().expect("registry");
    Session::new(registry, Arc::new(NullRuleHook))
}

#[test]
fn stop_spi_op_sets_session_flag() {
    let mut s = session();
    assert!(!s.stop_spi);

    let mut ops = FieldOps::new();
    ops.add_int(OpTarget::Special(PseudoField::StopSpi), "1");
    run(&mut s, &ops);

    assert!(s.stop_spi);
}

#[test]
fn stop_pcap_tags_truncated_when_already_over_threshold() {
    let mut s = session();
    s.packets = [10, 0];

    let mut ops = FieldOps::new();
    ops.add_int(OpTarget::Special(PseudoField::StopPcap), "5");
    run(&mut s, &ops);

    assert_eq!(s.stop_saving, 5);
    assert!(s.tags.contains("truncated-pcap"));
}

#[test]
fn min_save_respects_set_if_less_gate() {
    let mut s = session();
    s.min_saving = 10;

    let mut ops = FieldOps::new();
    // "min 20" means set-if-less(20); current is 10, 20 < 10 is false, so no change.
    ops.add_int(OpTarget::Special(PseudoField::MinSave), "min 20");
    run(&mut s, &ops);
    assert_eq!(s.min_saving, 10);

    let mut ops2 = FieldOps::new();
    ops2.add_int(OpTarget::Special(PseudoField::MinSave), "min 5");
    run(&mut s, &ops2);
    assert_eq!(s.min_saving, 5);
}

#[test]
fn stop_pcap_clamps_to_u16_max() {
    let mut s = session();
    let mut ops = FieldOps::new();
    ops.add_int(OpTarget::Special(PseudoField::StopPcap), "999999");
    run(&mut s, &ops);
    assert_eq!(s.stop_saving, 0xffff);
}
