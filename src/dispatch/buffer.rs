// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-direction growable byte buffers a TCP-reassembling parser uses to
//! hold partial messages across packet boundaries. Mirrors
//! `ArkimeParserBuf_t`/`arkime_parser_buf_*` in `field.c`'s parser support
//! code.

use bytes::BytesMut;

/// Which side of the connection a chunk came from, matching the `which`
/// (0/1) convention the original parser callbacks use.
pub const CLIENT: usize = 0;
pub const SERVER: usize = 1;

#[derive(Debug, Default)]
pub struct ParserBuffer {
    buf: [BytesMut; 2],
    /// Set once a full response has been seen on a side, so later code can
    /// tell client traffic from server traffic without re-parsing
    /// (`sip->serverWhich` in `sip_tcp_parser`).
    pub server_which: Option<usize>,
    /// Counts parser invocations; a parser gives up past some bound to
    /// avoid spinning forever on malformed/adversarial input (`sip->version
    /// > 200` in `sip_tcp_parser`).
    pub version: u32,
}

impl ParserBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, which: usize, data: &[u8]) {
        self.buf[which].extend_from_slice(data);
    }

    pub fn len(&self, which: usize) -> usize {
        self.buf[which].len()
    }

    pub fn is_empty(&self, which: usize) -> bool {
        self.buf[which].is_empty()
    }

    pub fn bytes(&self, which: usize) -> &[u8] {
        &self.buf[which]
    }

    /// Removes the first `n` bytes (a consumed message) from the front of
    /// the buffer, shifting the remainder down. Mirrors
    /// `arkime_parser_buf_del`.
    pub fn del(&mut self, which: usize, n: usize) {
        let n = n.min(self.buf[which].len());
        let _ = self.buf[which].split_to(n);
    }

    /// Drops `n` bytes of body content the caller doesn't want parsed
    /// (e.g. a SIP message body sized by `Content-Length`). Mirrors
    /// `arkime_parser_buf_skip`.
    pub fn skip(&mut self, which: usize, n: usize) {
        self.del(which, n);
    }
}
