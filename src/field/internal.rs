// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Internal computed fields: read-only getters installed at registry
//! startup, ported from the `arkime_field_getcb_*` callbacks registered in
//! `arkime_field_init` (`field.c`).

use std::sync::Arc;

use crate::{
    field::{kind::FieldKind, registry::FieldRegistry, store::FieldValue},
    session::Session,
};

fn getter(
    f: impl Fn(&Session) -> Option<FieldValue> + Send + Sync + 'static,
) -> crate::field::info::GetCb {
    Arc::new(f)
}

pub fn register_internal_getters(registry: &Arc<FieldRegistry>) {
    registry.by_exp_add_internal(
        "ip.src",
        FieldKind::Ip,
        getter(|s| s.ip_src.map(FieldValue::Ip)),
    );
    registry.by_exp_add_internal(
        "ip.dst",
        FieldKind::Ip,
        getter(|s| s.ip_dst.map(FieldValue::Ip)),
    );
    registry.by_exp_add_internal(
        "port.src",
        FieldKind::Int,
        getter(|s| s.port_src.map(|p| FieldValue::Int(p as i64))),
    );
    registry.by_exp_add_internal(
        "port.dst",
        FieldKind::Int,
        getter(|s| s.port_dst.map(|p| FieldValue::Int(p as i64))),
    );

    registry.by_exp_add_internal(
        "tcpflags.syn",
        FieldKind::Int,
        getter(|s| Some(FieldValue::Int(s.tcp_flags.syn as i64))),
    );
    registry.by_exp_add_internal(
        "tcpflags.syn-ack",
        FieldKind::Int,
        getter(|s| Some(FieldValue::Int(s.tcp_flags.syn_ack as i64))),
    );
    registry.by_exp_add_internal(
        "tcpflags.ack",
        FieldKind::Int,
        getter(|s| Some(FieldValue::Int(s.tcp_flags.ack as i64))),
    );
    registry.by_exp_add_internal(
        "tcpflags.psh",
        FieldKind::Int,
        getter(|s| Some(FieldValue::Int(s.tcp_flags.psh as i64))),
    );
    registry.by_exp_add_internal(
        "tcpflags.rst",
        FieldKind::Int,
        getter(|s| Some(FieldValue::Int(s.tcp_flags.rst as i64))),
    );
    registry.by_exp_add_internal(
        "tcpflags.fin",
        FieldKind::Int,
        getter(|s| Some(FieldValue::Int(s.tcp_flags.fin as i64))),
    );
    registry.by_exp_add_internal(
        "tcpflags.urg",
        FieldKind::Int,
        getter(|s| Some(FieldValue::Int(s.tcp_flags.urg as i64))),
    );

    registry.by_exp_add_internal(
        "packets.src",
        FieldKind::Int,
        getter(|s| Some(FieldValue::Int(s.packets[0] as i64))),
    );
    registry.by_exp_add_internal(
        "packets.dst",
        FieldKind::Int,
        getter(|s| Some(FieldValue::Int(s.packets[1] as i64))),
    );
    registry.by_exp_add_internal(
        "databytes.src",
        FieldKind::Int,
        getter(|s| Some(FieldValue::Int(s.databytes[0] as i64))),
    );
    registry.by_exp_add_internal(
        "databytes.dst",
        FieldKind::Int,
        getter(|s| Some(FieldValue::Int(s.databytes[1] as i64))),
    );

    registry.by_exp_add_internal(
        "communityId",
        FieldKind::Str,
        getter(|s| Some(FieldValue::Str(community_id(s)))),
    );

    registry.by_exp_add_internal(
        "ip.dst:port",
        FieldKind::Str,
        getter(|s| ip_port_string(s)),
    );
    registry.by_exp_add_internal(
        "dst.ip:port",
        FieldKind::Str,
        getter(|s| ip_port_string(s)),
    );
}

/// `ip.dst:port`/`dst.ip:port`'s shared getter. The original's C
/// implementation formats into a fixed `sizeof(ipstr)` buffer sized off a
/// pointer rather than the address's own max width, truncating long
/// formatted addresses (spec.md §9). `String` has no such bug; this models
/// the intended, buffer-length-explicit version.
fn ip_port_string(s: &Session) -> Option<FieldValue> {
    let ip = s.ip_dst?;
    let port = s.port_dst?;
    Some(FieldValue::Str(format!("{ip}:{port}")))
}

/// Stand-in for RFC-style community-id flow hashing
/// (`arkime_field_getcb_community_id`): the real algorithm (base64 of a
/// SHA1 over a canonicalized 5-tuple) is out of scope here (spec.md §1,
/// "the GeoIP/OUI/community-id *computation* itself... stay out of
/// scope"); this returns a stable, order-independent placeholder so
/// callers can exercise the getter/caching plumbing.
fn community_id(s: &Session) -> String {
    if let Some(cached) = s.community_id_cached() {
        return cached;
    }
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    let (lo, hi) = match (s.ip_src, s.ip_dst) {
        (Some(a), Some(b)) if a <= b => (a, b),
        (Some(a), Some(b)) => (b, a),
        _ => (
            s.ip_src.unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)),
            s.ip_dst.unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)),
        ),
    };
    lo.hash(&mut hasher);
    hi.hash(&mut hasher);
    let mut ports = [s.port_src.unwrap_or(0), s.port_dst.unwrap_or(0)];
    ports.sort_unstable();
    ports.hash(&mut hasher);
    let id = format!("1:{:016x}", hasher.finish());
    s.set_community_id_cache(id.clone());
    id
}
