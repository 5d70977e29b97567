// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use netfield_core::{
    dispatch::{ClassifierRegistry, ParserChain, CLIENT},
    parsers::sip,
};

use crate::integration_tests::common::{load_fixture, new_session_with_sip};

#[test]
fn response_split_across_two_tcp_chunks_is_reassembled() {
    let (mut session, fields) = new_session_with_sip();
    let mut classifiers = ClassifierRegistry::new();
    sip::register(&mut classifiers, fields);

    let data = load_fixture("sip_response_200.txt");
    let split = data.len() / 2;
    let (first, second) = data.split_at(split);

    let mut chain = ParserChain::new();
    classifiers.classify_tcp(&mut session, first, CLIENT, &mut chain);
    assert!(!chain.is_empty(), "first chunk already carries the SIP/2.0 marker");

    chain.feed(&mut session, first, CLIENT);
    chain.feed(&mut session, second, CLIENT);

    assert_eq!(session.store.count(fields.status_code), 1);
    assert_eq!(session.store.count(fields.call_id), 1);
}

#[test]
fn tcp_parser_registers_once_and_unregisters_after_too_many_iterations() {
    let (mut session, fields) = new_session_with_sip();
    let mut classifiers = ClassifierRegistry::new();
    sip::register(&mut classifiers, fields);

    let data = load_fixture("sip_register_compact.txt");
    let mut chain = ParserChain::new();
    classifiers.classify_tcp(&mut session, &data, CLIENT, &mut chain);
    assert!(!chain.is_empty());

    for _ in 0..205 {
        chain.feed(&mut session, b"x", CLIENT);
    }
    assert!(
        chain.is_empty(),
        "parser should unregister after exceeding its iteration guard"
    );
}
