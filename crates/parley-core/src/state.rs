//! Shared helper state: the enable flag, the active persona and the dedupe
//! claims.
//!
//! Both concurrent tasks hold an `Arc<HelperState>`; all mutation goes
//! through the methods below.

use crate::config::Persona;
use crate::message::Fingerprint;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

#[derive(Debug, Default)]
struct Claims {
    last: Option<Fingerprint>,
    seen: HashSet<Fingerprint>,
}

/// Enabled flag, persona and the fingerprints of every processed incoming
/// message.
#[derive(Debug, Default)]
pub struct HelperState {
    enabled: AtomicBool,
    persona: RwLock<Persona>,
    claims: Mutex<Claims>,
}

impl HelperState {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            persona: RwLock::new(Persona::default()),
            claims: Mutex::new(Claims::default()),
        }
    }

    pub fn with_persona(self, persona: Persona) -> Self {
        self.set_persona(persona);
        self
    }

    /// Persona used for the next generated reply.
    pub fn persona(&self) -> Persona {
        *self.persona.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Switch persona and return the previous one.
    pub fn set_persona(&self, persona: Persona) -> Persona {
        let mut current = self.persona.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *current, persona)
    }

    pub fn get_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Flip the enabled flag and return the new value.
    pub fn toggle(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::SeqCst)
    }

    /// Set the enabled flag and return the previous value.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::SeqCst)
    }

    /// Record `fingerprint` as processed.
    ///
    /// Returns `true` exactly once per fingerprint for the process lifetime.
    pub fn try_claim(&self, fingerprint: &Fingerprint) -> bool {
        let mut claims = self.claims.lock().unwrap_or_else(|e| e.into_inner());
        if !claims.seen.insert(fingerprint.clone()) {
            return false;
        }
        claims.last = Some(fingerprint.clone());
        true
    }

    /// The most recently claimed fingerprint.
    pub fn last_claimed(&self) -> Option<Fingerprint> {
        self.claims
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last
            .clone()
    }

    pub fn claimed_count(&self) -> usize {
        self.claims
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .seen
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, Sender};
    use std::sync::Arc;

    fn fp(text: &str) -> Fingerprint {
        Fingerprint::of(&[Message::new(Sender::Peer, text)], 0).unwrap()
    }

    #[test]
    fn test_starts_with_requested_flag() {
        assert!(!HelperState::new(false).get_enabled());
        assert!(HelperState::new(true).get_enabled());
    }

    #[test]
    fn test_toggle_returns_new_value_and_twice_restores() {
        let state = HelperState::new(false);
        assert!(state.toggle());
        assert!(state.get_enabled());
        assert!(!state.toggle());
        assert!(!state.get_enabled());
    }

    #[test]
    fn test_set_enabled_returns_previous() {
        let state = HelperState::new(false);
        assert!(!state.set_enabled(true));
        assert!(state.set_enabled(true));
        assert!(state.get_enabled());
    }

    #[test]
    fn test_persona_switch_returns_previous() {
        let state = HelperState::new(true).with_persona(Persona::Friendly);
        assert_eq!(state.persona(), Persona::Friendly);
        assert_eq!(state.set_persona(Persona::Flirty), Persona::Friendly);
        assert_eq!(state.persona(), Persona::Flirty);
        assert_eq!(HelperState::default().persona(), Persona::Default);
    }

    #[test]
    fn test_claim_once() {
        let state = HelperState::default();
        let a = fp("are you free tonight?");
        assert!(state.try_claim(&a));
        assert!(!state.try_claim(&a));
        assert_eq!(state.last_claimed(), Some(a));
    }

    #[test]
    fn test_claim_never_repeats_after_other_claims() {
        let state = HelperState::default();
        let a = fp("a");
        let b = fp("b");
        assert!(state.try_claim(&a));
        assert!(state.try_claim(&b));
        assert!(!state.try_claim(&a));
        assert_eq!(state.last_claimed(), Some(b));
        assert_eq!(state.claimed_count(), 2);
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        let state = Arc::new(HelperState::default());
        let target = fp("race");
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let state = state.clone();
                let target = target.clone();
                std::thread::spawn(move || state.try_claim(&target))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_concurrent_toggles_even_count_restores() {
        let state = Arc::new(HelperState::new(true));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                std::thread::spawn(move || {
                    state.toggle();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(state.get_enabled());
    }
}
