// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test data generators for abuse simulation.

use std::net::{IpAddr, Ipv4Addr};

/// Generate a pool of IP-derived identifiers.
pub fn generate_ip_identifiers(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            format!("ip:{}", IpAddr::V4(Ipv4Addr::new(10, a, b, c)))
        })
        .collect()
}

/// Generate a pool of account-derived identifiers.
pub fn generate_user_identifiers(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("user:{:06}", i)).collect()
}

/// Identifiers scoped to one protected endpoint.
pub fn generate_endpoint_identifiers(base: &[String], endpoint: &str) -> Vec<String> {
    base.iter().map(|id| format!("{}|{}", id, endpoint)).collect()
}

/// Identifiers the HTTP surface must refuse.
pub fn generate_hostile_identifiers(max_len: usize) -> Vec<String> {
    vec![
        // Blank
        String::new(),
        "   ".to_string(),
        "\t".to_string(),
        // Oversized
        "a".repeat(max_len + 1),
        format!("ip:{}", "9".repeat(max_len)),
        // Control characters
        "ip:1.2.3.4\n".to_string(),
        "user:abc\0".to_string(),
        "user:\u{1b}[31mred".to_string(),
        "ip:1.2.3.4\r\nX-Injected: 1".to_string(),
    ]
}
