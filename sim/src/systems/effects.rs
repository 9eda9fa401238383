//! Visual effects and end-of-tick pruning.

use crate::components::Position;
use crate::config::SimConfig;
use crate::systems::combat::Rockets;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    Explosion,
    Smoke,
}

impl EffectKind {
    /// Animation frames in the sprite sheet.
    pub fn frames(&self) -> u32 {
        match self {
            EffectKind::Explosion => 9,
            EffectKind::Smoke => 4,
        }
    }
}

/// A short-lived animation at a fixed position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub kind: EffectKind,
    pub position: Position,
    /// Ticks elapsed since the effect started.
    pub age: u32,
    /// Ticks each animation frame is shown.
    pub frame_ticks: u32,
}

impl Effect {
    pub fn new(kind: EffectKind, position: Position, frame_ticks: u32) -> Self {
        Self {
            kind,
            position,
            age: 0,
            frame_ticks: frame_ticks.max(1),
        }
    }

    pub fn tick(&mut self) {
        self.age = self.age.saturating_add(1);
    }

    /// Sprite frame to draw, clamped to the last frame.
    pub fn frame(&self) -> u32 {
        (self.age / self.frame_ticks).min(self.kind.frames() - 1)
    }

    pub fn done(&self) -> bool {
        self.age >= self.kind.frames() * self.frame_ticks
    }
}

/// Explosions and smoke plumes in spawn order.
#[derive(Resource, Debug, Default, Clone)]
pub struct Effects {
    pub explosions: Vec<Effect>,
    pub smokes: Vec<Effect>,
}

impl Effects {
    pub fn explosion(&mut self, position: Position, config: &SimConfig) {
        self.explosions
            .push(Effect::new(EffectKind::Explosion, position, config.explosion_frame_ticks));
    }

    pub fn smoke(&mut self, position: Position, config: &SimConfig) {
        self.smokes
            .push(Effect::new(EffectKind::Smoke, position, config.smoke_frame_ticks));
    }

    pub fn len(&self) -> usize {
        self.explosions.len() + self.smokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Advances every effect and drops finished effects and spent rockets.
///
/// `retain` keeps survivors in their original order.
pub fn prune_system(mut effects: ResMut<Effects>, mut rockets: ResMut<Rockets>) {
    let effects = &mut *effects;
    for effect in effects.explosions.iter_mut().chain(effects.smokes.iter_mut()) {
        effect.tick();
    }
    effects.explosions.retain(|e| !e.done());
    effects.smokes.retain(|e| !e.done());
    rockets.0.retain(|r| r.active);
}
