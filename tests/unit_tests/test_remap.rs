// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use netfield_core::field::ops::FieldOpsRemap;

#[test]
fn resolve_falls_back_to_original_pos_when_unmapped() {
    let remap = FieldOpsRemap::new();
    assert_eq!(remap.resolve(5, 0), 5);
}

#[test]
fn resolve_redirects_when_an_entry_exists() {
    let mut remap = FieldOpsRemap::new();
    remap.insert(5, 2, 9);
    assert_eq!(remap.resolve(5, 2), 9);
    assert_eq!(remap.resolve(5, 3), 5);
}
