//! Status Effects
//!
//! Time-bound modifiers (slow, stun) attached to an entity.
//! Expiry is lazy: effects stay in the store until `purge_expired` runs
//! during the owner's update, but every query ignores expired entries.

use serde::{Serialize, Deserialize};

/// Kind of status effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    /// Movement speed multiplied by `1 - magnitude`.
    Slow,
    /// No movement and no actions.
    Stun,
}

/// Payload carried by an ability or projectile that applies a status effect on hit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    /// Effect kind
    pub kind: StatusKind,
    /// Strength (slow fraction for `Slow`, ignored for `Stun`)
    pub magnitude: f32,
    /// Duration in seconds
    pub duration: f64,
}

impl StatusPayload {
    /// Instantiate the payload as an effect applied at `now`.
    pub fn apply_at(&self, now: f64) -> StatusEffect {
        StatusEffect {
            kind: self.kind,
            magnitude: self.magnitude,
            duration: self.duration,
            applied_at: now,
        }
    }
}

/// An applied status effect.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusEffect {
    /// Effect kind
    pub kind: StatusKind,
    /// Strength
    pub magnitude: f32,
    /// Duration in seconds
    pub duration: f64,
    /// World clock time the effect was applied
    pub applied_at: f64,
}

impl StatusEffect {
    /// Expired once `now - applied_at >= duration`.
    #[inline]
    pub fn is_expired(&self, now: f64) -> bool {
        now - self.applied_at >= self.duration
    }
}

/// Per-entity set of status effects.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatusEffects {
    effects: Vec<StatusEffect>,
}

impl StatusEffects {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an effect. Effects of the same kind stack independently;
    /// queries pick the strongest active one.
    pub fn apply(&mut self, effect: StatusEffect) {
        self.effects.push(effect);
    }

    /// Drop every expired effect. Returns how many were removed.
    pub fn purge_expired(&mut self, now: f64) -> usize {
        let before = self.effects.len();
        self.effects.retain(|e| !e.is_expired(now));
        before - self.effects.len()
    }

    /// True if an unexpired stun is present.
    pub fn is_stunned(&self, now: f64) -> bool {
        self.active(now).any(|e| e.kind == StatusKind::Stun)
    }

    /// Movement multiplier from slows: `1 - magnitude` of the strongest
    /// active slow, clamped to `[0, 1]`. Returns 1.0 when not slowed.
    pub fn speed_multiplier(&self, now: f64) -> f32 {
        let strongest = self
            .active(now)
            .filter(|e| e.kind == StatusKind::Slow)
            .map(|e| e.magnitude)
            .fold(0.0_f32, f32::max);
        (1.0 - strongest).clamp(0.0, 1.0)
    }

    /// Active (unexpired) effects.
    pub fn active(&self, now: f64) -> impl Iterator<Item = &StatusEffect> {
        self.effects.iter().filter(move |e| !e.is_expired(now))
    }

    /// Number of stored effects, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

/// Multiplier with an expiry, used for support-enemy buffs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimedBuff {
    /// Multiplier while active
    pub multiplier: f32,
    /// World clock time the buff stops applying
    pub expires_at: f64,
}

impl TimedBuff {
    /// Multiplier at `now` (1.0 once expired).
    #[inline]
    pub fn value(buff: Option<TimedBuff>, now: f64) -> f32 {
        match buff {
            Some(b) if now < b.expires_at => b.multiplier,
            _ => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slow(magnitude: f32, duration: f64, at: f64) -> StatusEffect {
        StatusEffect { kind: StatusKind::Slow, magnitude, duration, applied_at: at }
    }

    fn stun(duration: f64, at: f64) -> StatusEffect {
        StatusEffect { kind: StatusKind::Stun, magnitude: 1.0, duration, applied_at: at }
    }

    #[test]
    fn test_expiry_boundary() {
        let effect = slow(0.5, 2.0, 10.0);
        assert!(!effect.is_expired(11.999));
        // Exactly at applied_at + duration counts as expired
        assert!(effect.is_expired(12.0));
    }

    #[test]
    fn test_strongest_slow_wins() {
        let mut store = StatusEffects::new();
        store.apply(slow(0.2, 5.0, 0.0));
        store.apply(slow(0.6, 1.0, 0.0));

        assert!((store.speed_multiplier(0.5) - 0.4).abs() < 1e-6);
        // Strong slow expired, weak one remains
        assert!((store.speed_multiplier(1.5) - 0.8).abs() < 1e-6);
        assert_eq!(store.speed_multiplier(10.0), 1.0);
    }

    #[test]
    fn test_slow_magnitude_clamped() {
        let mut store = StatusEffects::new();
        store.apply(slow(1.7, 5.0, 0.0));
        assert_eq!(store.speed_multiplier(1.0), 0.0);
    }

    #[test]
    fn test_stun_and_purge() {
        let mut store = StatusEffects::new();
        store.apply(stun(1.0, 3.0));
        assert!(store.is_stunned(3.5));
        assert!(!store.is_stunned(4.0));

        // Lazy purge: still stored until purged
        assert_eq!(store.len(), 1);
        assert_eq!(store.purge_expired(4.0), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_timed_buff_value() {
        let buff = Some(TimedBuff { multiplier: 1.5, expires_at: 10.0 });
        assert_eq!(TimedBuff::value(buff, 9.0), 1.5);
        assert_eq!(TimedBuff::value(buff, 10.0), 1.0);
        assert_eq!(TimedBuff::value(None, 0.0), 1.0);
    }
}
