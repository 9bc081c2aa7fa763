//! Memory Safety Gate (spec §4.6 / C6): before starting a Local backend, estimates whether
//! the running fleet plus the candidate risks exceeding available physical memory.

use thiserror::Error;

/// Runtime overhead multiplier applied to a weights file's on-disk size to estimate the
/// backend's working-set size (spec §4.6 step 2).
const WORKING_SET_MULTIPLIER: f64 = 1.1;

/// Fraction of available physical memory the fleet may occupy before the gate refuses.
const MAX_MEMORY_FRACTION: f64 = 0.9;

#[derive(Debug, Error)]
pub enum MemoryGateError {
    #[error(
        "memory gate denied: would allocate {would_allocate} bytes, {available} bytes available, \
         {backends_running} backend(s) already running"
    )]
    Denied {
        would_allocate: u64,
        available: u64,
        backends_running: usize,
    },
}

/// Estimates a backend's working-set size from its weights file's on-disk size.
pub fn estimate_working_set(weights_file_bytes: u64) -> u64 {
    (weights_file_bytes as f64 * WORKING_SET_MULTIPLIER) as u64
}

/// Checks whether starting a backend whose weights file is `candidate_bytes` is safe given
/// the weights sizes of `running_bytes` (one entry per currently-running Local backend) and
/// the system's available physical memory. Returns `Ok(())` if safe, `Err` otherwise.
///
/// `force=true` bypasses the check entirely (spec §4.6 step 4 "Callers may pass force=true").
pub fn check(
    system: &sysinfo::System,
    candidate_bytes: u64,
    running_bytes: &[u64],
    force: bool,
) -> Result<(), MemoryGateError> {
    if force {
        return Ok(());
    }
    let would_allocate: u64 = running_bytes
        .iter()
        .copied()
        .chain(std::iter::once(candidate_bytes))
        .map(estimate_working_set)
        .sum();
    let available = system.available_memory();
    let budget = (available as f64 * MAX_MEMORY_FRACTION) as u64;
    if would_allocate > budget {
        return Err(MemoryGateError::Denied {
            would_allocate,
            available,
            backends_running: running_bytes.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysinfo::System;

    fn fake_system_with_available(bytes: u64) -> System {
        // sysinfo has no public constructor for a fixed available_memory value; tests that
        // need a deterministic budget call `check`'s math directly instead of going through
        // a live `System`.
        let _ = bytes;
        System::new()
    }

    #[test]
    fn estimate_applies_multiplier() {
        assert_eq!(estimate_working_set(100), 110);
    }

    #[test]
    fn force_bypasses_check() {
        let system = fake_system_with_available(0);
        assert!(check(&system, u64::MAX / 2, &[], true).is_ok());
    }

    #[test]
    fn memory_gate_scenario_two_20gb_backends_24gb_available() {
        const GB: u64 = 1024 * 1024 * 1024;
        let candidate = 20 * GB;
        let running = vec![20 * GB];
        let would_allocate: u64 = running
            .iter()
            .copied()
            .chain(std::iter::once(candidate))
            .map(estimate_working_set)
            .sum();
        let available = 24 * GB;
        let budget = (available as f64 * MAX_MEMORY_FRACTION) as u64;
        assert!(would_allocate > budget, "44GB*1.1 should exceed 90% of 24GB");
    }
}
