//! ECS Components for the tank battle simulation.
//!
//! Tanks are entities assembled from the components below. Rockets,
//! effects and particle beams live in plain arenas (see `systems`) because
//! their order matters to pruning and drawing.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::ops::{Add, AddAssign, Mul, Sub};

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// 2D position on the battlefield (x grows right, y grows down).
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        self.distance_sq(other).sqrt()
    }

    pub fn distance_sq(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit vector in the same direction, or zero for a (near) zero vector.
    pub fn normalized(&self) -> Self {
        let len = self.length();
        if len < 0.0001 {
            Self::default()
        } else {
            Self {
                x: self.x / len,
                y: self.y / len,
            }
        }
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Position {
    fn add_assign(&mut self, rhs: Position) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Position {
    type Output = Position;

    fn mul(self, rhs: f32) -> Position {
        Position::new(self.x * rhs, self.y * rhs)
    }
}

/// Displacement applied during the last tick (tanks) or per tick (rockets).
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
}

impl Velocity {
    pub fn new(vx: f32, vy: f32) -> Self {
        Self { vx, vy }
    }

    pub fn magnitude(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }

    /// Heading in radians, `None` when not moving.
    pub fn heading(&self) -> Option<f32> {
        if self.magnitude() < 0.0001 {
            None
        } else {
            Some(self.vy.atan2(self.vx))
        }
    }
}

// ============================================================================
// IDENTITY COMPONENTS
// ============================================================================

/// Unique identifier for a tank.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TankId(pub u32);

/// Faction/side identifier.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    #[default]
    Blue,
    Red,
}

impl Faction {
    pub fn opponent(&self) -> Faction {
        match self {
            Faction::Blue => Faction::Red,
            Faction::Red => Faction::Blue,
        }
    }
}

// ============================================================================
// COMBAT COMPONENTS
// ============================================================================

/// Integer hit points. A tank with no health left is inactive.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

impl Health {
    pub fn new(max: i32) -> Self {
        Self { current: max, max }
    }

    pub fn fraction(&self) -> f32 {
        if self.max <= 0 {
            0.0
        } else {
            (self.current as f32 / self.max as f32).clamp(0.0, 1.0)
        }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0
    }

    /// Apply damage, clamping at zero.
    /// Returns `true` only for the hit that destroys the tank.
    pub fn hit(&mut self, amount: i32) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.current = (self.current - amount.max(0)).max(0);
        !self.is_alive()
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Static tank parameters.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TankStats {
    pub collision_radius: f32,
    /// Units per unit of delta time.
    pub max_speed: f32,
}

impl Default for TankStats {
    fn default() -> Self {
        Self {
            collision_radius: 3.0,
            max_speed: 1.0,
        }
    }
}

/// Countdown until the tank may fire again.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Reload {
    pub timer: f32,
}

impl Reload {
    pub fn new(timer: f32) -> Self {
        Self { timer }
    }

    pub fn tick(&mut self, dt: f32) {
        if self.timer > 0.0 {
            self.timer -= dt;
        }
    }

    pub fn is_ready(&self) -> bool {
        self.timer <= 0.0
    }

    pub fn reset(&mut self, reload_time: f32) {
        self.timer = reload_time;
    }
}

/// Separation accumulated by the collision pass, consumed by movement.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct PushForce {
    pub dx: f32,
    pub dy: f32,
}

impl PushForce {
    pub fn add(&mut self, direction: Position) {
        self.dx += direction.x;
        self.dy += direction.y;
    }

    pub fn take(&mut self) -> Position {
        let push = Position::new(self.dx, self.dy);
        *self = Self::default();
        push
    }
}

// ============================================================================
// NAVIGATION COMPONENTS
// ============================================================================

/// Waypoints from pathfinding, consumed front to back.
#[derive(Component, Debug, Clone, Default)]
pub struct Route {
    waypoints: VecDeque<Position>,
}

impl Route {
    pub fn new(waypoints: impl IntoIterator<Item = Position>) -> Self {
        Self {
            waypoints: waypoints.into_iter().collect(),
        }
    }

    pub fn next(&self) -> Option<Position> {
        self.waypoints.front().copied()
    }

    /// Drop the waypoint just reached.
    pub fn advance(&mut self) -> Option<Position> {
        self.waypoints.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }
}

/// Point on the faction's destination line this tank paths toward.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Destination {
    pub x: f32,
    pub y: f32,
}

impl Destination {
    pub fn point(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

// ============================================================================
// BUNDLE HELPERS
// ============================================================================

/// Bundle for spawning a complete tank entity.
#[derive(Bundle, Debug, Clone, Default)]
pub struct TankBundle {
    pub id: TankId,
    pub faction: Faction,
    pub position: Position,
    pub velocity: Velocity,
    pub health: Health,
    pub stats: TankStats,
    pub reload: Reload,
    pub push: PushForce,
    pub route: Route,
    pub destination: Destination,
}

impl TankBundle {
    pub fn new(id: u32, faction: Faction, position: Position, destination: Destination) -> Self {
        Self {
            id: TankId(id),
            faction,
            position,
            destination,
            ..Default::default()
        }
    }

    pub fn with_stats(mut self, max_health: i32, stats: TankStats, initial_reload: f32) -> Self {
        self.health = Health::new(max_health);
        self.stats = stats;
        self.reload = Reload::new(initial_reload);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_clamps_at_zero_and_deactivates() {
        let mut health = Health::new(100);
        assert!(!health.hit(60));
        assert_eq!(health.current, 40);
        assert!(health.hit(60));
        assert_eq!(health.current, 0);
        assert!(!health.is_alive());

        // Further hits neither go negative nor report a second kill.
        assert!(!health.hit(500));
        assert_eq!(health.current, 0);
    }

    #[test]
    fn test_negative_damage_does_not_heal() {
        let mut health = Health::new(100);
        health.hit(-50);
        assert_eq!(health.current, 100);
    }

    #[test]
    fn test_reload_countdown() {
        let mut reload = Reload::new(2.0);
        reload.tick(1.0);
        assert!(!reload.is_ready());
        reload.tick(1.0);
        assert!(reload.is_ready());
        reload.reset(200.0);
        assert!(!reload.is_ready());
    }

    #[test]
    fn test_route_consumed_front_to_back() {
        let mut route = Route::new([Position::new(1.0, 0.0), Position::new(2.0, 0.0)]);
        assert_eq!(route.next(), Some(Position::new(1.0, 0.0)));
        route.advance();
        assert_eq!(route.next(), Some(Position::new(2.0, 0.0)));
        route.advance();
        assert!(route.is_empty());
        assert_eq!(route.next(), None);
    }

    #[test]
    fn test_normalized_zero_vector() {
        assert_eq!(Position::default().normalized(), Position::default());
        let n = Position::new(3.0, 4.0).normalized();
        assert!((n.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_faction_opponent() {
        assert_eq!(Faction::Blue.opponent(), Faction::Red);
        assert_eq!(Faction::Red.opponent(), Faction::Blue);
    }
}
