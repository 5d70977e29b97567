// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Classifier registry: each transport (UDP/TCP) keeps an ordered list of
//! classifiers that get a shot at a session's first packet(s); the first
//! one whose magic-byte/content check matches registers a parser onto the
//! session and (usually) tags it with a protocol name. Mirrors
//! `arkime_parsers_classifier_add`/the `*_classify` callback convention in
//! `sip.c` and friends.

use crate::{dispatch::parser::ParserChain, session::Session};

/// One registered classifier. `try_classify` returns whether it engaged;
/// a classifier that engages is expected to have registered a parser onto
/// `chain` itself (mirroring the original's classify callback doing its
/// own `arkime_parsers_register` call).
pub trait Classifier: Send + Sync {
    fn name(&self) -> &'static str;
    fn try_classify(
        &self,
        session: &mut Session,
        data: &[u8],
        which: usize,
        chain: &mut ParserChain,
    ) -> bool;
}

#[derive(Default)]
pub struct ClassifierRegistry {
    udp: Vec<Box<dyn Classifier>>,
    tcp: Vec<Box<dyn Classifier>>,
}

impl ClassifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_udp(&mut self, classifier: Box<dyn Classifier>) {
        self.udp.push(classifier);
    }

    pub fn register_tcp(&mut self, classifier: Box<dyn Classifier>) {
        self.tcp.push(classifier);
    }

    /// Runs every UDP classifier against one packet's data until one
    /// engages, returning its name.
    pub fn classify_udp(
        &self,
        session: &mut Session,
        data: &[u8],
        which: usize,
        chain: &mut ParserChain,
    ) -> Option<&'static str> {
        self.udp
            .iter()
            .find(|c| c.try_classify(session, data, which, chain))
            .map(|c| c.name())
    }

    pub fn classify_tcp(
        &self,
        session: &mut Session,
        data: &[u8],
        which: usize,
        chain: &mut ParserChain,
    ) -> Option<&'static str> {
        self.tcp
            .iter()
            .find(|c| c.try_classify(session, data, which, chain))
            .map(|c| c.name())
    }
}

/// Case-insensitive substring search within the first `limit` bytes,
/// mirroring `arkime_memstr`/`arkime_memcasestr`'s bounded scan used by
/// classifiers that only sniff a prefix of the packet.
pub fn memcasestr(haystack: &[u8], needle: &[u8], limit: usize) -> bool {
    let bound = haystack.len().min(limit);
    if needle.is_empty() || bound < needle.len() {
        return false;
    }
    haystack[..bound]
        .windows(needle.len())
        .any(|w| w.eq_ignore_ascii_case(needle))
}
