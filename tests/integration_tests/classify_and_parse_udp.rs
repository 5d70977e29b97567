// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use netfield_core::{
    dispatch::{ClassifierRegistry, ParserChain},
    parsers::sip,
};

use crate::integration_tests::common::{load_fixture, new_session_with_sip};

#[test]
fn udp_invite_is_classified_and_fields_are_populated() {
    let (mut session, fields) = new_session_with_sip();
    let mut classifiers = ClassifierRegistry::new();
    sip::register(&mut classifiers, fields);

    let data = load_fixture("sip_invite.txt");
    let mut chain = ParserChain::new();
    let protocol = classifiers.classify_udp(&mut session, &data, 0, &mut chain);
    assert_eq!(protocol, Some("sip"));
    assert!(session.has_protocol("sip"));

    chain.feed(&mut session, &data, 0);

    assert_eq!(session.store.count(fields.method), 1);
    assert_eq!(session.store.count(fields.from), 1);
    assert_eq!(session.store.count(fields.to), 1);
    assert_eq!(session.store.count(fields.call_id), 1);
    // "Alice" from the From header, plus the Authorization username.
    assert_eq!(session.store.count(fields.user), 2);
    assert_eq!(session.store.count(fields.user_agent), 1);
}

#[test]
fn second_packet_on_same_session_is_not_reclassified() {
    let (mut session, fields) = new_session_with_sip();
    let mut classifiers = ClassifierRegistry::new();
    sip::register(&mut classifiers, fields);

    let data = load_fixture("sip_invite.txt");
    let mut chain = ParserChain::new();
    classifiers.classify_udp(&mut session, &data, 0, &mut chain);

    let second = classifiers.classify_udp(&mut session, &data, 0, &mut chain);
    assert_eq!(second, None, "already-tagged session should not reclassify");
}
