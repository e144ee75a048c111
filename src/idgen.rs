//! Random 64-bit identifier generation, used for both span ids and (when no
//! trace context was extracted) trace ids.

use rand::RngCore;

pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> u64;
}

/// The default [`IdGenerator`], backed by `rand`'s thread-local RNG. Rerolls
/// on the rare `0`, since a zero id means "unset" throughout this crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn generate(&self) -> u64 {
        loop {
            let candidate = rand::thread_rng().next_u64();
            if candidate != 0 {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_generates_zero() {
        let gen = RandomIdGenerator;
        for _ in 0..1000 {
            assert_ne!(gen.generate(), 0);
        }
    }
}
