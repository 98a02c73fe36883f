//! Debounced alert state machine: wraps instantaneous health into a
//! publishable level.

use super::HealthLevel;

/// Default consecutive-tick requirements for raising and clearing.
pub const DEFAULT_K_UP: u32 = 3;
pub const DEFAULT_K_DOWN: u32 = 3;

/// Debounces health transitions. Raising out of OK requires `k_up`
/// consecutive non-OK ticks; returning to OK requires `k_down`
/// consecutive OK ticks. Confirmed high-trust critical evidence (an
/// OOM, or a mount predicted full within minutes) escalates to
/// CRITICAL immediately.
pub struct AlertStateMachine {
    published: HealthLevel,
    k_up: u32,
    k_down: u32,
    non_ok_streak: u32,
    ok_streak: u32,
}

impl Default for AlertStateMachine {
    fn default() -> Self {
        Self::new(DEFAULT_K_UP, DEFAULT_K_DOWN)
    }
}

impl AlertStateMachine {
    pub fn new(k_up: u32, k_down: u32) -> Self {
        Self {
            published: HealthLevel::Ok,
            k_up: k_up.max(1),
            k_down: k_down.max(1),
            non_ok_streak: 0,
            ok_streak: 0,
        }
    }

    /// Current published level.
    pub fn published(&self) -> HealthLevel {
        self.published
    }

    /// Feeds one tick's instantaneous level; returns the published
    /// level after debouncing. `escalate` short-circuits the up
    /// debounce for confirmed critical evidence.
    pub fn update(&mut self, instant: HealthLevel, escalate: bool) -> HealthLevel {
        if escalate {
            self.published = HealthLevel::Critical;
            self.non_ok_streak = 0;
            self.ok_streak = 0;
            return self.published;
        }

        if instant == HealthLevel::Ok {
            self.ok_streak += 1;
            self.non_ok_streak = 0;
            if self.published != HealthLevel::Ok && self.ok_streak >= self.k_down {
                self.published = HealthLevel::Ok;
            }
        } else {
            self.non_ok_streak += 1;
            self.ok_streak = 0;
            if self.published == HealthLevel::Ok {
                if self.non_ok_streak >= self.k_up {
                    self.published = instant;
                }
            } else {
                // Already raised: level moves freely between non-OK states
                self.published = instant;
            }
        }

        self.published
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_blip_never_publishes() {
        let mut sm = AlertStateMachine::default();
        assert_eq!(sm.update(HealthLevel::Ok, false), HealthLevel::Ok);
        assert_eq!(sm.update(HealthLevel::Critical, false), HealthLevel::Ok);
        assert_eq!(sm.update(HealthLevel::Ok, false), HealthLevel::Ok);
        assert_eq!(sm.update(HealthLevel::Ok, false), HealthLevel::Ok);
    }

    #[test]
    fn raises_after_k_up_ticks() {
        let mut sm = AlertStateMachine::default();
        assert_eq!(sm.update(HealthLevel::Degraded, false), HealthLevel::Ok);
        assert_eq!(sm.update(HealthLevel::Degraded, false), HealthLevel::Ok);
        assert_eq!(sm.update(HealthLevel::Degraded, false), HealthLevel::Degraded);
    }

    #[test]
    fn clears_after_k_down_ticks() {
        let mut sm = AlertStateMachine::default();
        for _ in 0..3 {
            sm.update(HealthLevel::Critical, false);
        }
        assert_eq!(sm.published(), HealthLevel::Critical);

        assert_eq!(sm.update(HealthLevel::Ok, false), HealthLevel::Critical);
        assert_eq!(sm.update(HealthLevel::Ok, false), HealthLevel::Critical);
        assert_eq!(sm.update(HealthLevel::Ok, false), HealthLevel::Ok);
    }

    #[test]
    fn ok_interruption_resets_the_up_streak() {
        let mut sm = AlertStateMachine::default();
        sm.update(HealthLevel::Degraded, false);
        sm.update(HealthLevel::Degraded, false);
        sm.update(HealthLevel::Ok, false);
        sm.update(HealthLevel::Degraded, false);
        sm.update(HealthLevel::Degraded, false);
        assert_eq!(sm.published(), HealthLevel::Ok);
        assert_eq!(sm.update(HealthLevel::Degraded, false), HealthLevel::Degraded);
    }

    #[test]
    fn escalation_bypasses_debounce() {
        let mut sm = AlertStateMachine::default();
        assert_eq!(sm.update(HealthLevel::Degraded, true), HealthLevel::Critical);
    }

    #[test]
    fn raised_level_tracks_instant_changes() {
        let mut sm = AlertStateMachine::default();
        for _ in 0..3 {
            sm.update(HealthLevel::Degraded, false);
        }
        assert_eq!(sm.update(HealthLevel::Critical, false), HealthLevel::Critical);
        assert_eq!(sm.update(HealthLevel::Degraded, false), HealthLevel::Degraded);
    }
}
