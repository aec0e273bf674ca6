// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    seconds      = { 5, "5s" },
    minutes      = { 125, "2m" },
    hours_flat   = { 7200, "2h" },
    hours_mixed  = { 5400, "1h30m" },
    days         = { 259200, "3d" },
)]
fn formats_elapsed(secs: u64, expected: &str) {
    assert_eq!(format_elapsed(secs), expected);
}

#[test]
fn formats_elapsed_ms() {
    assert_eq!(format_elapsed_ms(5500), "5s");
    assert_eq!(format_elapsed_ms(125_000), "2m");
}
