/// Derive an independent 64-bit seed for stream `index` of a master seed.
///
/// SplitMix64 finalizer over `master ^ (index * golden_gamma)`; adjacent
/// indices land far apart so per-trial generators do not correlate.
#[inline]
pub fn mix_seed(master: u64, index: u64) -> u64 {
    let mut z = master ^ index.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
