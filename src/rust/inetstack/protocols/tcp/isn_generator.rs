// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use crate::inetstack::protocols::tcp::SeqNumber;
use ::rand::{
    rngs::SmallRng,
    Rng,
    SeedableRng,
};

/// Draws initial sequence numbers uniformly from `[1, range]`.
pub struct IsnGenerator {
    rng: SmallRng,
    range: u32,
}

impl IsnGenerator {
    pub fn new(seed: u64, range: u32) -> Self {
        assert!(range > 0);
        Self {
            rng: SmallRng::seed_from_u64(seed),
            range,
        }
    }

    pub fn generate(&mut self) -> SeqNumber {
        SeqNumber::from(self.rng.gen_range(1..=self.range))
    }
}

#[cfg(test)]
mod tests {
    use super::IsnGenerator;
    use ::anyhow::Result;

    #[test]
    fn isn_stays_in_range() -> Result<()> {
        let mut isn_generator: IsnGenerator = IsnGenerator::new(42, 1000);
        for _ in 0..10_000 {
            let isn: u32 = isn_generator.generate().into();
            assert!((1..=1000).contains(&isn));
        }
        Ok(())
    }
}
