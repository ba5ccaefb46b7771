// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Sliding-window checks over recorded admission times.

use std::time::Duration;
use tokio::time::Instant;

/// Largest number of instants falling in any half-open window `(t - window, t]`.
pub fn max_in_window(times: &[Instant], window: Duration) -> usize {
    let mut sorted = times.to_vec();
    sorted.sort();

    let mut start = 0;
    let mut max = 0;
    for end in 0..sorted.len() {
        while sorted[end].duration_since(sorted[start]) >= window {
            start += 1;
        }
        max = max.max(end - start + 1);
    }
    max
}

#[test]
fn test_max_in_window() {
    let base = Instant::now();
    let ms = Duration::from_millis;
    let times = [base, base + ms(10), base + ms(1010), base + ms(1015)];

    assert_eq!(max_in_window(&times, ms(1000)), 2);
    assert_eq!(max_in_window(&times, ms(1006)), 3);
    assert_eq!(max_in_window(&[], ms(1000)), 0);
}
