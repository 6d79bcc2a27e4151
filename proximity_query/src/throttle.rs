// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Staggered query cadence.

/// Whether a query throttled to every `update_per_tick` ticks runs on `tick`.
///
/// `update_per_tick == 0` runs every tick. Otherwise the query runs when
/// `(tick + entity_id) % update_per_tick == 0`, so entities with different ids
/// spread over different ticks instead of spiking together.
#[inline]
pub fn should_run(tick: u64, entity_id: u32, update_per_tick: u32) -> bool {
    if update_per_tick == 0 {
        return true;
    }
    tick.wrapping_add(u64::from(entity_id)) % u64::from(update_per_tick) == 0
}
