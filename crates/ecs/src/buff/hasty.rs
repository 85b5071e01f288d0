use super::BuffEffect;
use crate::component::Motion;

/// Multiplies movement speed by a fixed ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hasty {
    ratio: f64,
}

impl Hasty {
    pub const DEFAULT_RATIO: f64 = 1.4;

    pub fn new(ratio: f64) -> Self {
        Self { ratio }
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }
}

impl Default for Hasty {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RATIO)
    }
}

impl BuffEffect for Hasty {
    type Target = Motion;

    fn name(&self) -> &'static str {
        "hasty"
    }

    fn set(&mut self, target: &mut Motion) {
        target.speed_boost_ratio *= self.ratio;
    }

    fn unset(&mut self, target: &mut Motion) {
        target.speed_boost_ratio /= self.ratio;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boosts_and_restores() {
        let mut motion = Motion::default();
        let mut hasty = Hasty::default();
        hasty.set(&mut motion);
        assert_eq!(motion.speed_boost_ratio, 1.4);
        hasty.unset(&mut motion);
        assert_eq!(motion.speed_boost_ratio, 1.0);
    }

    #[test]
    fn stacked_boosts_multiply() {
        let mut motion = Motion::default();
        let mut a = Hasty::new(2.0);
        let mut b = Hasty::new(1.5);
        a.set(&mut motion);
        b.set(&mut motion);
        assert_eq!(motion.speed_boost_ratio, 3.0);
        a.unset(&mut motion);
        assert_eq!(motion.speed_boost_ratio, 1.5);
        b.unset(&mut motion);
        assert_eq!(motion.speed_boost_ratio, 1.0);
    }

    #[test]
    fn repeated_cycles_do_not_drift() {
        let mut motion = Motion::default();
        let mut hasty = Hasty::default();
        for _ in 0..1000 {
            hasty.set(&mut motion);
            hasty.unset(&mut motion);
        }
        assert_eq!(motion.speed_boost_ratio, 1.0);
    }
}
