// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Context, Result};
use netfield_core::{
    cfg::{cli::resolve_config_path, config::RegistryConfig, logger::init_logger},
    dispatch::{ClassifierRegistry, ParserChain},
    field::FieldRegistry,
    parsers::sip,
    rules::NullRuleHook,
    session::Session,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _init_logger = init_logger("tests/config_logger.yaml")?;

    let cfg = resolve_config_path("demos/config.registry.yaml")
        .and_then(RegistryConfig::load_from_file)
        .unwrap_or_else(|err| {
            tracing::warn!(%err, "falling back to default registry config");
            RegistryConfig::default()
        });
    info!(fields_max = cfg.fields.fields_max, "registry config loaded");

    let registry = FieldRegistry::new().context("building field registry")?;
    let sip_fields = sip::define_fields(&registry).context("registering sip fields")?;

    let mut classifiers = ClassifierRegistry::new();
    sip::register(&mut classifiers, sip_fields);

    let mut session = Session::new(Arc::clone(&registry), Arc::new(NullRuleHook));
    let mut chain = ParserChain::new();

    let packet = b"INVITE sip:bob@example.com SIP/2.0\r\n\
From: \"Alice\" <sip:alice@example.com>\r\n\
To: <sip:bob@example.com>\r\n\
Call-ID: abc123@example.com\r\n\
Via: SIP/2.0/UDP pc.example.com\r\n\
Content-Length: 0\r\n\r\n";

    if let Some(protocol) = classifiers.classify_udp(&mut session, packet, 0, &mut chain) {
        info!(protocol, "packet classified");
    }
    chain.feed(&mut session, packet, 0);

    info!(
        method_count = session.store.count(sip_fields.method),
        call_id_count = session.store.count(sip_fields.call_id),
        "demo session populated"
    );

    Ok(())
}
