//! Counter-based random number generation.
//!
//! Transport events draw their randomness from a stateless bijection
//! `(counter, key) -> [u64; 4]` so that the four uniforms of any event depend
//! only on `(particle_key, master_key, counter)` and never on scheduling.
//! The mixing function is Threefry-4x64 with 20 rounds; the key layout puts
//! the global particle id in the first key word and the per-step master key
//! in the second.

/// Key-schedule parity constant of the Threefish family.
const SKEIN_KS_PARITY: u64 = 0x1BD1_1BDA_A9FC_1A22;

/// Per-round rotation amounts, repeating with period eight.
const ROTATIONS: [[u32; 2]; 8] = [
    [14, 16],
    [52, 57],
    [23, 40],
    [5, 37],
    [25, 33],
    [46, 12],
    [58, 22],
    [32, 32],
];

const ROUNDS: usize = 20;

/// Scale that maps a `u64` onto `[0, 1)`.
const FACTOR: f64 = 1.0 / 18_446_744_073_709_551_616.0;
/// Bias that keeps the mapped value away from an exact zero, so that
/// `-ln(r)` is always finite.
const HALF_FACTOR: f64 = 0.5 * FACTOR;

/// Applies the Threefry-4x64 bijection to `counter` under `key`.
///
/// Identical inputs produce identical outputs on every platform and in any
/// invocation order; distinct keys produce streams that are non-overlapping
/// in practice.
#[must_use]
pub fn threefry4x64(counter: [u64; 4], key: [u64; 4]) -> [u64; 4] {
    let mut ks = [0_u64; 5];
    ks[4] = SKEIN_KS_PARITY;
    for (slot, &word) in ks.iter_mut().zip(&key) {
        *slot = word;
    }
    for &word in &key {
        ks[4] ^= word;
    }

    let mut x = [
        counter[0].wrapping_add(ks[0]),
        counter[1].wrapping_add(ks[1]),
        counter[2].wrapping_add(ks[2]),
        counter[3].wrapping_add(ks[3]),
    ];

    for round in 0..ROUNDS {
        let [r0, r1] = ROTATIONS[round % 8];

        // even rounds mix the word pairs (0,1)/(2,3), odd rounds (0,3)/(2,1)
        if round % 2 == 0 {
            x[0] = x[0].wrapping_add(x[1]);
            x[1] = x[1].rotate_left(r0) ^ x[0];
            x[2] = x[2].wrapping_add(x[3]);
            x[3] = x[3].rotate_left(r1) ^ x[2];
        } else {
            x[0] = x[0].wrapping_add(x[3]);
            x[3] = x[3].rotate_left(r0) ^ x[0];
            x[2] = x[2].wrapping_add(x[1]);
            x[1] = x[1].rotate_left(r1) ^ x[2];
        }

        if round % 4 == 3 {
            let injection = round / 4 + 1;
            for (word, slot) in x.iter_mut().enumerate() {
                *slot = slot.wrapping_add(ks[(injection + word) % 5]);
            }
            x[3] = x[3].wrapping_add(injection as u64);
        }
    }

    x
}

/// Returns the four uniform doubles in `(0, 1)` for one event.
///
/// The counter occupies the first counter word; `particle_key` and
/// `master_key` occupy the first two key words. All remaining words are
/// zero.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn uniforms(particle_key: u64, master_key: u64, counter: u64) -> [f64; 4] {
    let raw = threefry4x64([counter, 0, 0, 0], [particle_key, master_key, 0, 0]);
    raw.map(|bits| (bits as f64).mul_add(FACTOR, HALF_FACTOR))
}
