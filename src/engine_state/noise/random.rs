/// Multiply-with-carry pseudo-random stream.
///
/// Two 16-bit lag generators are combined into one 32-bit output. The stream is
/// fully determined by its seed, which makes it suitable for lattice gradients and
/// per-chunk tree placement.
#[derive(Debug, Clone)]
pub struct Noise {
    w: u32,
    z: u32,
}

impl Noise {
    /// Creates a stream from `seed`.
    pub fn new(seed: u32) -> Self {
        Self {
            w: 123_456_789u32.wrapping_add(seed),
            z: 987_654_321u32.wrapping_sub(seed),
        }
    }

    /// Next raw 32-bit value.
    pub fn next_int(&mut self) -> u32 {
        self.w = 18_000u32
            .wrapping_mul(self.w & 0xffff)
            .wrapping_add(self.w >> 16);
        self.z = 36_969u32
            .wrapping_mul(self.z & 0xffff)
            .wrapping_add(self.z >> 16);
        (self.z << 16).wrapping_add(self.w & 0xffff)
    }

    /// Next value in `[0, 1)`.
    pub fn next_float(&mut self) -> f64 {
        f64::from(self.next_int()) / 4_294_967_296.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = Noise::new(42);
        let mut b = Noise::new(42);
        for _ in 0..64 {
            assert_eq!(a.next_int(), b.next_int());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = Noise::new(1);
        let mut b = Noise::new(2);
        let same = (0..32).filter(|_| a.next_int() == b.next_int()).count();
        assert!(same < 32, "streams for different seeds should not coincide");
    }

    #[test]
    fn floats_stay_in_unit_interval() {
        let mut noise = Noise::new(0xdead_beef);
        for _ in 0..10_000 {
            let value = noise.next_float();
            assert!((0.0..1.0).contains(&value), "{value} outside [0, 1)");
        }
    }
}
