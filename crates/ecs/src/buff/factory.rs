use std::time::Duration;

use orbis_common::WorldConfig;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{
    BuffData, BuffKind, Chromatic, ColorTransitionLaw, Hasty, PermanentBuff, TimedBuff,
    UpdatingBuff,
};

/// Turns [`BuffData`] into running buffs.
///
/// Seeds for randomized buffs are drawn from one generator, so a factory built
/// with the same seed produces the same sequence of buffs.
#[derive(Debug, Clone)]
pub struct BuffFactory {
    hasty_ratio: f64,
    hasty_duration: Duration,
    color_law: ColorTransitionLaw,
    seeds: ChaCha8Rng,
}

impl BuffFactory {
    pub fn new(config: &WorldConfig, seed: u64) -> Self {
        Self {
            hasty_ratio: config.hasty_boost_ratio,
            hasty_duration: config.hasty_duration(),
            color_law: ColorTransitionLaw::default(),
            seeds: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn with_color_law(mut self, law: ColorTransitionLaw) -> Self {
        self.color_law = law;
        self
    }

    pub fn hasty_duration(&self) -> Duration {
        self.hasty_duration
    }

    pub fn create_hasty(&self) -> TimedBuff<Hasty> {
        TimedBuff::new(Hasty::new(self.hasty_ratio), self.hasty_duration)
    }

    pub fn create_chromatic(&mut self) -> PermanentBuff<Chromatic> {
        PermanentBuff::new(Chromatic::new(self.color_law, self.seeds.next_u64()))
    }

    /// `None` for [`BuffKind::None`].
    pub fn create(&mut self, data: BuffData) -> Option<Box<dyn UpdatingBuff>> {
        match data.kind {
            BuffKind::None => None,
            BuffKind::Hasty => Some(Box::new(self.create_hasty())),
            BuffKind::Chromatic => Some(Box::new(self.create_chromatic())),
        }
    }
}

/// Picks which buff an opened chest grants.
#[derive(Debug, Clone)]
pub struct BuffStrategy {
    rng: ChaCha8Rng,
}

impl BuffStrategy {
    const GRANTABLE: [BuffKind; 2] = [BuffKind::Chromatic, BuffKind::Hasty];

    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn next_buff(&mut self) -> BuffData {
        let index = self.rng.gen_range(0..Self::GRANTABLE.len());
        BuffData::new(Self::GRANTABLE[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_creates_nothing() {
        let mut factory = BuffFactory::new(&WorldConfig::default(), 1);
        assert!(factory.create(BuffData::NONE).is_none());
    }

    #[test]
    fn creates_named_buffs() {
        let mut factory = BuffFactory::new(&WorldConfig::default(), 1);
        let hasty = factory.create(BuffData::new(BuffKind::Hasty)).unwrap();
        let chromatic = factory.create(BuffData::new(BuffKind::Chromatic)).unwrap();
        assert_eq!(hasty.name(), "hasty");
        assert_eq!(chromatic.name(), "chromatic");
        assert!(!hasty.is_expired());
    }

    #[test]
    fn hasty_uses_configured_duration() {
        let factory = BuffFactory::new(&WorldConfig::default(), 1);
        let hasty = factory.create_hasty();
        assert_eq!(hasty.duration(), Duration::from_millis(108_000));
        assert_eq!(hasty.effect().ratio(), 1.4);
    }

    #[test]
    fn strategy_never_grants_none() {
        let mut strategy = BuffStrategy::new(5);
        for _ in 0..100 {
            assert!(!strategy.next_buff().is_none());
        }
    }
}
