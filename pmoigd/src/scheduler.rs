//! Cadencement des cycles de réconciliation ("leaky bucket").
//!
//! Un cycle n'est lancé que si `interval` s'est écoulé depuis la dernière
//! tentative. Un échec recule l'horodatage d'une demi-période seulement, ce
//! qui rapproche la tentative suivante ; après
//! [`MAX_UPDATES_WITH_NO_EFFECT`] échecs consécutifs le client repart de zéro.

use std::time::Duration;

/// Nombre d'échecs consécutifs avant le repli.
pub const MAX_UPDATES_WITH_NO_EFFECT: u32 = 6;

#[derive(Debug, Default, Clone)]
pub struct UpdateScheduler {
    last_attempt: Option<Duration>,
    consecutive_failures: u32,
}

impl UpdateScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vrai si un cycle doit être lancé à `now`. Le premier appel l'est toujours.
    pub fn is_due(&self, now: Duration, interval: Duration) -> bool {
        match self.last_attempt {
            None => true,
            Some(last) => now.saturating_sub(last) >= interval,
        }
    }

    pub fn record_success(&mut self, now: Duration) {
        self.last_attempt = Some(now);
        self.consecutive_failures = 0;
    }

    /// Enregistre un échec.
    ///
    /// Retourne `true` quand le seuil est atteint ; le compteur est alors remis
    /// à zéro et l'appelant doit déclencher le repli.
    pub fn record_failure(&mut self, now: Duration, interval: Duration) -> bool {
        let base = self
            .last_attempt
            .unwrap_or_else(|| now.saturating_sub(interval));
        self.last_attempt = Some(base + interval / 2);
        self.consecutive_failures += 1;

        if self.consecutive_failures >= MAX_UPDATES_WITH_NO_EFFECT {
            self.consecutive_failures = 0;
            return true;
        }
        false
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_attempt(&self) -> Option<Duration> {
        self.last_attempt
    }
}
