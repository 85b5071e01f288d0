use orbis_common::FrameTime;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::BuffEffect;
use crate::component::Display;

/// Ticks skipped between two color changes.
const UPDATE_SKIP_PERIOD: u32 = 2;

/// Randomness parameters of one color channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTransitionLaw {
    /// Channel change per tick, as a `[min, max]` range.
    pub speed: (f64, f64),
    /// Probability of pausing after each step.
    pub pause_probability: f64,
    /// Pause length in milliseconds, as a `[min, max]` range.
    pub pause_ms: (f64, f64),
}

impl Default for ColorTransitionLaw {
    fn default() -> Self {
        Self {
            speed: (0.5, 2.0),
            pause_probability: 0.01,
            pause_ms: (500.0, 2_000.0),
        }
    }
}

/// One color channel moving back and forth inside `[MIN_VALUE, MAX_VALUE]`.
#[derive(Debug, Clone)]
pub struct BouncingColorTransition {
    law: ColorTransitionLaw,
    value: f64,
    velocity: f64,
    pause_ms: f64,
}

impl BouncingColorTransition {
    pub const MIN_VALUE: f64 = 64.0;
    pub const MAX_VALUE: f64 = 255.0;

    pub fn new<R: Rng + ?Sized>(law: ColorTransitionLaw, rng: &mut R) -> Self {
        let value = rng.gen_range(Self::MIN_VALUE..=Self::MAX_VALUE).round();
        let speed = rng.gen_range(law.speed.0..=law.speed.1);
        let velocity = if rng.gen_bool(0.5) { speed } else { -speed };
        Self {
            law,
            value,
            velocity,
            pause_ms: 0.0,
        }
    }

    pub fn value(&self) -> u8 {
        self.value.round() as u8
    }

    pub fn tick<R: Rng + ?Sized>(&mut self, time: &FrameTime, rng: &mut R) {
        let skip = f64::from(UPDATE_SKIP_PERIOD);
        self.pause_ms -= time.elapsed.as_secs_f64() * 1_000.0 * skip;
        if self.pause_ms > 0.0 {
            return;
        }

        self.value += self.velocity * skip;
        if self.value > Self::MAX_VALUE {
            self.value = Self::MAX_VALUE;
            self.velocity = -rng.gen_range(self.law.speed.0..=self.law.speed.1);
        } else if self.value < Self::MIN_VALUE {
            self.value = Self::MIN_VALUE;
            self.velocity = rng.gen_range(self.law.speed.0..=self.law.speed.1);
        }

        if rng.gen_bool(self.law.pause_probability) {
            self.pause_ms = rng.gen_range(self.law.pause_ms.0..=self.law.pause_ms.1);
        }
    }
}

/// Keeps changing a display's color while attached; restores it when removed.
#[derive(Debug, Clone)]
pub struct Chromatic {
    red: BouncingColorTransition,
    green: BouncingColorTransition,
    blue: BouncingColorTransition,
    rng: ChaCha8Rng,
    skipped: u32,
    original_color: Option<u32>,
}

impl Chromatic {
    pub fn new(law: ColorTransitionLaw, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Self {
            red: BouncingColorTransition::new(law, &mut rng),
            green: BouncingColorTransition::new(law, &mut rng),
            blue: BouncingColorTransition::new(law, &mut rng),
            rng,
            skipped: 0,
            original_color: None,
        }
    }

    /// Current color as 0xRRGGBB.
    pub fn color(&self) -> u32 {
        u32::from(self.red.value()) << 16
            | u32::from(self.green.value()) << 8
            | u32::from(self.blue.value())
    }
}

impl BuffEffect for Chromatic {
    type Target = Display;

    fn name(&self) -> &'static str {
        "chromatic"
    }

    fn set(&mut self, target: &mut Display) {
        self.original_color = Some(target.color);
    }

    fn update(&mut self, target: &mut Display, time: &FrameTime) {
        if self.skipped < UPDATE_SKIP_PERIOD {
            self.skipped += 1;
            return;
        }
        self.skipped = 0;

        self.red.tick(time, &mut self.rng);
        self.green.tick(time, &mut self.rng);
        self.blue.tick(time, &mut self.rng);
        target.color = self.color();
    }

    fn unset(&mut self, target: &mut Display) {
        if let Some(color) = self.original_color.take() {
            target.color = color;
        }
    }
}
