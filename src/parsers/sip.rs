// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! SIP (RFC 3261) parser — the worked exemplar protocol parser. Ported
//! directly from `original_source/capture/parsers/sip.c`.

use crate::{
    dispatch::{
        buffer::{ParserBuffer, CLIENT},
        classifier::{memcasestr, Classifier},
        parser::{ParserAction, ParserChain, SessionParser},
    },
    field::{kind::FieldFlags, registry::FieldRegistry, DefineOptions, FieldKind},
    session::Session,
};

/// The field positions this parser writes to, resolved once at
/// registration time the way the original caches them in file-local
/// globals (`methodField`, `statusCodeField`, …) set by
/// `arkime_parser_init`.
#[derive(Debug, Clone, Copy)]
pub struct SipFields {
    pub method: i32,
    pub status_code: i32,
    pub call_id: i32,
    pub from: i32,
    pub to: i32,
    pub user_agent: i32,
    pub via: i32,
    pub contact: i32,
    pub user: i32,
}

/// `arkime_parser_init`'s SIP-specific field registrations.
pub fn define_fields(registry: &FieldRegistry) -> Result<SipFields, crate::error::RegistryError> {
    let method = registry.define(
        "sip",
        "termfield",
        "sip.method",
        "Method",
        "sip.method",
        "SIP method (INVITE, BYE, REGISTER, etc.)",
        FieldKind::StrMap,
        FieldFlags::CNT,
        DefineOptions::default(),
    )?;
    let status_code = registry.define(
        "sip",
        "integer",
        "sip.statuscode",
        "Status Code",
        "sip.statuscode",
        "SIP response status codes",
        FieldKind::IntMap,
        FieldFlags::CNT,
        DefineOptions::default(),
    )?;
    let call_id = registry.define(
        "sip",
        "termfield",
        "sip.callid",
        "Call ID",
        "sip.callid",
        "SIP Call-ID header",
        FieldKind::StrMap,
        FieldFlags::CNT,
        DefineOptions::default(),
    )?;
    let from = registry.define(
        "sip",
        "termfield",
        "sip.from",
        "From",
        "sip.from",
        "SIP From header",
        FieldKind::StrMap,
        FieldFlags::CNT,
        DefineOptions::default(),
    )?;
    let to = registry.define(
        "sip",
        "termfield",
        "sip.to",
        "To",
        "sip.to",
        "SIP To header",
        FieldKind::StrMap,
        FieldFlags::CNT,
        DefineOptions::default(),
    )?;
    let user_agent = registry.define(
        "sip",
        "termfield",
        "sip.user-agent",
        "User-Agent",
        "sip.useragent",
        "SIP User-Agent header",
        FieldKind::StrMap,
        FieldFlags::CNT,
        DefineOptions::default(),
    )?;
    let via = registry.define(
        "sip",
        "termfield",
        "sip.via",
        "Via",
        "sip.via",
        "SIP Via header",
        FieldKind::StrMap,
        FieldFlags::CNT,
        DefineOptions::default(),
    )?;
    let contact = registry.define(
        "sip",
        "termfield",
        "sip.contact",
        "Contact",
        "sip.contact",
        "SIP Contact header",
        FieldKind::StrMap,
        FieldFlags::CNT,
        DefineOptions::default(),
    )?;
    let user = registry.define(
        "sip",
        "termfield",
        "sip.user",
        "User",
        "sip.user",
        "SIP user extracted from From/To/Authorization",
        FieldKind::StrMap,
        FieldFlags::CNT,
        DefineOptions::default(),
    )?;

    Ok(SipFields {
        method,
        status_code,
        call_id,
        from,
        to,
        user_agent,
        via,
        contact,
        user,
    })
}

const PROTOCOL_TAG: &str = "sip";
const MAX_TCP_ITERATIONS: u32 = 200;

/// `sip_find_line`: returns `(bytes_consumed, line_len)`, or `None` if no
/// line terminator was found. Accepts both CRLF and bare LF.
fn find_line(data: &[u8]) -> Option<(usize, usize)> {
    for i in 0..data.len() {
        if data[i] == b'\r' && i + 1 < data.len() && data[i + 1] == b'\n' {
            return Some((i + 2, i));
        }
        if data[i] == b'\n' {
            return Some((i + 1, i));
        }
    }
    None
}

/// `sip_is_method`: first-character dispatch over the exact method set the
/// original recognizes.
fn is_method(method: &[u8]) -> bool {
    match method.first() {
        Some(b'A') => method == b"ACK",
        Some(b'B') => method == b"BYE",
        Some(b'C') => method == b"CANCEL",
        Some(b'I') => method == b"INVITE" || method == b"INFO",
        Some(b'M') => method == b"MESSAGE",
        Some(b'N') => method == b"NOTIFY",
        Some(b'O') => method == b"OPTIONS",
        Some(b'P') => method == b"PRACK",
        Some(b'R') => method == b"REGISTER" || method == b"REFER",
        Some(b'S') => method == b"SUBSCRIBE",
        Some(b'U') => method == b"UPDATE",
        _ => false,
    }
}

/// `sip_extract_user`: scans for `sip:`/`sips:` case-insensitively, then a
/// user token terminated by `@`, stopping early on `>`, `;`, or space.
fn extract_user(session: &mut Session, fields: &SipFields, value: &[u8]) {
    let lower_idx = value
        .windows(4)
        .position(|w| w.eq_ignore_ascii_case(b"sip:"));
    let (start, skip) = match lower_idx {
        Some(i) => (i, 4),
        None => {
            let Some(i) = value.windows(5).position(|w| w.eq_ignore_ascii_case(b"sips:")) else {
                return;
            };
            (i, 5)
        }
    };
    let rest = &value[start + skip..];
    if rest.is_empty() {
        return;
    }
    let mut user_len = 0;
    for (i, &b) in rest.iter().enumerate() {
        if b == b'@' {
            user_len = i;
            break;
        }
        if b == b'>' || b == b';' || b == b' ' {
            break;
        }
    }
    if user_len > 0 {
        if let Ok(s) = std::str::from_utf8(&rest[..user_len]) {
            let _ = session.add_string(fields.user, "sip.user", "sip.user", FieldKind::StrMap, s);
        }
    }
}

/// `sip_parse_header`: parses one header line, dispatching on either a
/// full name or the RFC 3261 compact single-letter form. Returns
/// `Content-Length`'s value when that header is the one parsed.
fn parse_header(session: &mut Session, fields: &SipFields, line: &[u8]) -> Option<i64> {
    let colon = line.iter().position(|&b| b == b':')?;
    if colon == 0 {
        return None;
    }
    let mut value_start = colon + 1;
    while value_start < line.len() && (line[value_start] == b' ' || line[value_start] == b'\t') {
        value_start += 1;
    }
    if value_start >= line.len() {
        return None;
    }
    let name = &line[..colon];
    let value = &line[value_start..];
    let value_str = String::from_utf8_lossy(value);

    let eq_ci = |a: &[u8], b: &str| a.eq_ignore_ascii_case(b.as_bytes());

    if (colon == 7 && eq_ci(name, "Call-ID")) || (colon == 1 && matches!(name[0], b'i' | b'I')) {
        let _ = session.add_string(
            fields.call_id,
            "sip.callid",
            "sip.callid",
            FieldKind::StrMap,
            &value_str,
        );
    } else if (colon == 4 && eq_ci(name, "From")) || (colon == 1 && matches!(name[0], b'f' | b'F')) {
        let _ = session.add_string(
            fields.from,
            "sip.from",
            "sip.from",
            FieldKind::StrMap,
            &value_str,
        );
        extract_user(session, fields, value);
    } else if (colon == 2 && eq_ci(name, "To")) || (colon == 1 && matches!(name[0], b't' | b'T')) {
        let _ = session.add_string(fields.to, "sip.to", "sip.to", FieldKind::StrMap, &value_str);
        extract_user(session, fields, value);
    } else if colon == 10 && eq_ci(name, "User-Agent") {
        let _ = session.add_string(
            fields.user_agent,
            "sip.user-agent",
            "sip.useragent",
            FieldKind::StrMap,
            &value_str,
        );
    } else if (colon == 3 && eq_ci(name, "Via")) || (colon == 1 && matches!(name[0], b'v' | b'V')) {
        let _ = session.add_string(
            fields.via,
            "sip.via",
            "sip.via",
            FieldKind::StrMap,
            &value_str,
        );
    } else if (colon == 7 && eq_ci(name, "Contact")) || (colon == 1 && matches!(name[0], b'm' | b'M'))
    {
        let _ = session.add_string(
            fields.contact,
            "sip.contact",
            "sip.contact",
            FieldKind::StrMap,
            &value_str,
        );
    } else if colon == 13 && eq_ci(name, "Authorization") {
        if let Some(pos) = find_ci(value, b"username=\"") {
            let after = &value[pos + 10..];
            if let Some(end) = after.iter().position(|&b| b == b'"') {
                if let Ok(s) = std::str::from_utf8(&after[..end]) {
                    let _ =
                        session.add_string(fields.user, "sip.user", "sip.user", FieldKind::StrMap, s);
                }
            }
        }
    } else if (colon == 14 && eq_ci(name, "Content-Length"))
        || (colon == 1 && matches!(name[0], b'l' | b'L'))
    {
        return value_str.trim().parse::<i64>().ok().or(Some(0));
    }

    None
}

fn find_ci(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| haystack[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

/// `sip_parse_request`: "METHOD uri SIP/2.0".
fn parse_request(session: &mut Session, fields: &SipFields, line: &[u8]) -> bool {
    let limit = line.len().min(20);
    let Some(method_end) = line[..limit].iter().position(|&b| b == b' ') else {
        return false;
    };
    if method_end == 0 {
        return false;
    }
    let method = &line[..method_end];
    if !is_method(method) {
        return false;
    }
    if line.len() < method_end + 10 {
        return false;
    }
    if !memcasestr(line, b"SIP/2.0", line.len()) {
        return false;
    }
    if let Ok(s) = std::str::from_utf8(method) {
        let _ = session.add_string(fields.method, "sip.method", "sip.method", FieldKind::StrMap, s);
    }
    true
}

/// `sip_parse_response`: "SIP/2.0 200 OK".
fn parse_response(session: &mut Session, fields: &SipFields, line: &[u8]) -> bool {
    if line.len() < 12 {
        return false;
    }
    if &line[..8] != b"SIP/2.0 " {
        return false;
    }
    let rest = String::from_utf8_lossy(&line[8..]);
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if let Ok(code) = digits.parse::<i64>() {
        if (100..700).contains(&code) {
            let _ = session.add_int(
                fields.status_code,
                "sip.statuscode",
                "sip.statuscode",
                FieldKind::IntMap,
                code,
            );
        }
    }
    true
}

/// `sip_process`: walks header lines up to (not including) the blank line
/// ending the headers, returning the effective Content-Length (0 if
/// absent) and whether the first line was a status line.
fn process(session: &mut Session, fields: &SipFields, data: &[u8]) -> (i64, bool) {
    let mut offset = 0usize;
    let mut is_first = true;
    let mut content_length = 0i64;
    let mut is_response = false;

    while offset < data.len() {
        let Some((consumed, line_len)) = find_line(&data[offset..]) else {
            break;
        };
        if line_len == 0 {
            break;
        }
        let line = &data[offset..offset + line_len];

        if is_first {
            is_first = false;
            if line_len >= 7 && &line[..7] == b"SIP/2.0" {
                parse_response(session, fields, line);
                is_response = true;
            } else {
                parse_request(session, fields, line);
            }
        } else if let Some(cl) = parse_header(session, fields, line) {
            content_length = cl;
        }

        offset += consumed;
    }

    (content_length, is_response)
}

/// UDP path: one packet is one complete message (`sip_udp_parser`).
pub struct SipUdpParser {
    fields: SipFields,
}

impl SessionParser for SipUdpParser {
    fn parse(&mut self, session: &mut Session, data: &[u8], _which: usize) -> ParserAction {
        process(session, &self.fields, data);
        ParserAction::Continue
    }
}

/// TCP path: accumulates bytes per direction until a double-CRLF closes a
/// message's headers, processes it, then skips any body bytes
/// `Content-Length` named. Mirrors `sip_tcp_parser`.
pub struct SipTcpParser {
    fields: SipFields,
    buf: ParserBuffer,
}

impl SipTcpParser {
    pub fn new(fields: SipFields) -> Self {
        Self {
            fields,
            buf: ParserBuffer::new(),
        }
    }
}

impl SessionParser for SipTcpParser {
    fn parse(&mut self, session: &mut Session, data: &[u8], which: usize) -> ParserAction {
        self.buf.append(which, data);

        while self.buf.len(which) > 4 {
            let bytes = self.buf.bytes(which);
            let end_pos = bytes
                .windows(4)
                .position(|w| w == b"\r\n\r\n")
                .map(|i| i + 4);
            let Some(end_pos) = end_pos else {
                break;
            };

            let message = bytes[..end_pos].to_vec();
            let (content_length, is_response) = process(session, &self.fields, &message);
            if is_response {
                self.buf.server_which = Some(which);
            }

            self.buf.del(which, end_pos);
            if content_length > 0 {
                self.buf.skip(which, content_length as usize);
            }
        }

        self.buf.version += 1;
        if self.buf.version > MAX_TCP_ITERATIONS {
            return ParserAction::Unregister;
        }
        ParserAction::Continue
    }
}

/// Shared classify predicate: not already tagged, at least 12 bytes, and a
/// `SIP/2.0` substring within the first 200 bytes (`sip_udp_classify`/
/// `sip_tcp_classify`).
fn should_classify(session: &Session, data: &[u8]) -> bool {
    if session.has_protocol(PROTOCOL_TAG) {
        return false;
    }
    if data.len() < 12 {
        return false;
    }
    memcasestr(data, b"SIP/2.0", data.len().min(200))
}

pub struct SipUdpClassifier {
    fields: SipFields,
}

impl SipUdpClassifier {
    pub fn new(fields: SipFields) -> Self {
        Self { fields }
    }
}

impl Classifier for SipUdpClassifier {
    fn name(&self) -> &'static str {
        PROTOCOL_TAG
    }

    fn try_classify(
        &self,
        session: &mut Session,
        data: &[u8],
        _which: usize,
        chain: &mut ParserChain,
    ) -> bool {
        if !should_classify(session, data) {
            return false;
        }
        session.add_protocol(PROTOCOL_TAG);
        chain.register(Box::new(SipUdpParser {
            fields: self.fields,
        }));
        true
    }
}

pub struct SipTcpClassifier {
    fields: SipFields,
}

impl SipTcpClassifier {
    pub fn new(fields: SipFields) -> Self {
        Self { fields }
    }
}

impl Classifier for SipTcpClassifier {
    fn name(&self) -> &'static str {
        PROTOCOL_TAG
    }

    fn try_classify(
        &self,
        session: &mut Session,
        data: &[u8],
        _which: usize,
        chain: &mut ParserChain,
    ) -> bool {
        if !should_classify(session, data) {
            return false;
        }
        session.add_protocol(PROTOCOL_TAG);
        chain.register(Box::new(SipTcpParser::new(self.fields)));
        true
    }
}

/// Registers both classifiers onto `registry`, mirroring the effect of
/// `arkime_parser_init` wiring `sip_udp_classify`/`sip_tcp_classify` into
/// the dispatcher at startup.
pub fn register(
    classifiers: &mut crate::dispatch::ClassifierRegistry,
    fields: SipFields,
) {
    classifiers.register_udp(Box::new(SipUdpClassifier::new(fields)));
    classifiers.register_tcp(Box::new(SipTcpClassifier::new(fields)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        field::registry::FieldRegistry,
        rules::NullRuleHook,
    };
    use std::sync::Arc;

    fn session_with_fields() -> (Session, SipFields) {
        let registry = FieldRegistry::new().expect("registry");
        let fields = define_fields(&registry).expect("define");
        (Session::new(registry, Arc::new(NullRuleHook)), fields)
    }

    #[test]
    fn recognizes_invite_request_line() {
        let (mut session, fields) = session_with_fields();
        let msg = b"INVITE sip:bob@example.com SIP/2.0\r\nFrom: <sip:alice@example.com>\r\nTo: <sip:bob@example.com>\r\nCall-ID: abc123\r\nContent-Length: 0\r\n\r\n";
        process(&mut session, &fields, msg);
        assert_eq!(session.store.count(fields.method), 1);
        assert_eq!(session.store.count(fields.call_id), 1);
        assert_eq!(session.store.count(fields.user), 2);
    }

    #[test]
    fn recognizes_response_status_code() {
        let (mut session, fields) = session_with_fields();
        let msg = b"SIP/2.0 200 OK\r\nCall-ID: abc123\r\n\r\n";
        let (_, is_response) = process(&mut session, &fields, msg);
        assert!(is_response);
        assert_eq!(session.store.count(fields.status_code), 1);
    }

    #[test]
    fn compact_header_forms_are_recognized() {
        let (mut session, fields) = session_with_fields();
        let msg = b"INVITE sip:bob@example.com SIP/2.0\r\ni: compact-call-id\r\nf: <sip:alice@example.com>\r\nt: <sip:bob@example.com>\r\nv: SIP/2.0/UDP host\r\nm: <sip:alice@1.2.3.4>\r\nl: 0\r\n\r\n";
        process(&mut session, &fields, msg);
        assert_eq!(session.store.count(fields.call_id), 1);
        assert_eq!(session.store.count(fields.via), 1);
        assert_eq!(session.store.count(fields.contact), 1);
    }

    #[test]
    fn tcp_parser_gives_up_after_too_many_iterations() {
        let (mut session, fields) = session_with_fields();
        let mut parser = SipTcpParser::new(fields);
        let mut last = ParserAction::Continue;
        for _ in 0..=MAX_TCP_ITERATIONS {
            last = parser.parse(&mut session, b"x", CLIENT);
        }
        assert_eq!(last, ParserAction::Unregister);
    }

    #[test]
    fn classifier_requires_sip_marker_and_min_length() {
        let (mut session, fields) = session_with_fields();
        let classifier = SipUdpClassifier::new(fields);
        let mut chain = ParserChain::new();
        assert!(!classifier.try_classify(&mut session, b"short", CLIENT, &mut chain));
        assert!(classifier.try_classify(
            &mut session,
            b"OPTIONS sip:x SIP/2.0\r\n\r\n",
            CLIENT,
            &mut chain
        ));
        assert!(session.has_protocol("sip"));
        assert!(!chain.is_empty());
    }
}
