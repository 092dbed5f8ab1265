//! Shared helpers for device-backed tests

#![allow(dead_code)]

use raystream::device::{Session, SessionOptions};

/// Acquire any adapter, software included. `None` skips the calling test.
pub fn try_session() -> Option<Session> {
    let options = SessionOptions {
        backends: wgpu::Backends::all(),
        allow_fallback: true,
        ..SessionOptions::default()
    };
    match Session::new(&options) {
        Ok(session) => Some(session),
        Err(e) => {
            eprintln!("Skipping: no GPU adapter ({e})");
            None
        }
    }
}

/// Deterministic 0/1 pattern with a given density in percent.
pub fn flags(n: usize, density: u32, seed: u32) -> Vec<u32> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            u32::from((state >> 8) % 100 < density)
        })
        .collect()
}

/// Reference exclusive scan and total.
pub fn exclusive_scan(values: &[u32]) -> (Vec<u32>, u32) {
    let mut acc = 0;
    let scan = values
        .iter()
        .map(|v| {
            let out = acc;
            acc += v;
            out
        })
        .collect();
    (scan, acc)
}
