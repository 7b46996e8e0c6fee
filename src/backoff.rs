/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Backoff policy shared by the readiness prober and the write retries.
//!
//! Write retries use a jittered delay sampled uniformly from
//! `[0, base * 2^attempt)` so that a pool of workers throttled at the same
//! moment does not retry in lockstep. The readiness prober is a single
//! sequential poller, so it uses the deterministic variant instead.

use std::time::Duration;

/// A delay sampled uniformly from `[0, base * 2^attempt)`.
pub(crate) fn jittered(rng: &mut fastrand::Rng, attempt: u32, base: Duration) -> Duration {
    let cap = (base.as_millis() as u64) << attempt.min(32);
    Duration::from_millis(rng.u64(0..cap.max(1)))
}

/// The deterministic table-poll delay: `2 << attempt` seconds.
///
/// With the default budget of 8 attempts this waits for the table for about
/// 254 seconds in the worst case.
pub(crate) fn poll_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64 << attempt.min(32))
}

/// Whether the attempt budget is spent.
///
/// The boundary is `attempt > max_attempts - 2`: both backoff users perform
/// at most `max_attempts - 1` sleeps before their final failing check. This
/// exact boundary is part of the retry contract.
pub(crate) fn exhausted(attempt: u32, max_attempts: u32) -> bool {
    attempt + 2 > max_attempts
}
