//! Regenerating pixel budget.
//!
//! The balance is never stepped by a timer. It is recomputed on read from the last
//! authoritative anchor: `min(capacity, anchor + elapsed / regen_seconds)`.

use serde::Serialize;

use crate::api::types::Millis;

/// Partial authoritative energy values. Absent fields keep their previous value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnergyCorrection {
    pub energy: Option<f64>,
    pub capacity: Option<u32>,
    pub regen_seconds: Option<f64>,
    /// Server time the energy value was computed at. Defaults to receipt time.
    pub updated_at: Option<Millis>,
}

/// Values shown by the host's energy indicator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyDisplay {
    /// Whole units currently regenerated.
    pub current: u32,
    pub capacity: u32,
    /// `current` minus staged pixels.
    pub available: u32,
    /// `mm:ss` until the next unit, or None at capacity.
    pub countdown: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnergyLedger {
    anchor_balance: f64,
    anchor_at: Millis,
    capacity: u32,
    regen_seconds: f64,
    synced: bool,
}

impl EnergyLedger {
    /// An empty ledger. Nothing can be staged until the first server correction arrives.
    pub fn new(capacity: u32, regen_seconds: f64) -> Self {
        Self {
            anchor_balance: 0.0,
            anchor_at: 0.0,
            capacity,
            regen_seconds,
            synced: false,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn regen_seconds(&self) -> f64 {
        self.regen_seconds
    }

    /// Whether at least one authoritative value has been applied.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Time of the current anchor.
    pub fn anchor_at(&self) -> Millis {
        self.anchor_at
    }

    pub fn balance(&self, now: Millis) -> f64 {
        if !self.synced {
            return 0.0;
        }
        let elapsed_secs = ((now - self.anchor_at) / 1000.0).max(0.0);
        let regenerated = if self.regen_seconds > 0.0 {
            elapsed_secs / self.regen_seconds
        } else {
            0.0
        };
        (self.anchor_balance + regenerated).min(self.capacity as f64).max(0.0)
    }

    /// `floor(balance)`: how many pixels may be staged in total.
    pub fn whole_units(&self, now: Millis) -> usize {
        self.balance(now).floor() as usize
    }

    /// Whole units not already claimed by staged pixels.
    pub fn available(&self, now: Millis, staged: usize) -> usize {
        self.whole_units(now).saturating_sub(staged)
    }

    /// Seconds until the next whole unit, or None at capacity.
    pub fn seconds_until_next(&self, now: Millis) -> Option<f64> {
        let balance = self.balance(now);
        if balance >= self.capacity as f64 || self.regen_seconds <= 0.0 {
            return None;
        }
        Some((1.0 - balance.fract()) * self.regen_seconds)
    }

    /// Reset the anchor from an authoritative value. Returns true if anything changed.
    pub fn apply(&mut self, correction: EnergyCorrection, now: Millis) -> bool {
        let before = self.clone();
        let capacity = correction.capacity.filter(|c| *c != self.capacity);
        let regen = correction
            .regen_seconds
            .filter(|r| r.is_finite() && *r > 0.0 && *r != self.regen_seconds);
        let has_energy = correction.energy.is_some_and(|e| e.is_finite());
        if self.synced && !has_energy && (capacity.is_some() || regen.is_some()) {
            // Parameter-only change: keep the current balance, new rate and cap apply from now.
            self.anchor_balance = self.balance(now);
            self.anchor_at = now;
        }
        if let Some(capacity) = capacity {
            self.capacity = capacity;
        }
        if let Some(regen) = regen {
            self.regen_seconds = regen;
        }
        if let Some(energy) = correction.energy.filter(|e| e.is_finite()) {
            self.anchor_balance = energy.max(0.0);
            self.anchor_at = correction.updated_at.filter(|t| t.is_finite()).unwrap_or(now);
            self.synced = true;
        }
        *self != before
    }

    pub fn display(&self, now: Millis, staged: usize) -> EnergyDisplay {
        let current = self.whole_units(now) as u32;
        EnergyDisplay {
            current,
            capacity: self.capacity,
            available: current.saturating_sub(staged as u32),
            countdown: self.seconds_until_next(now).map(format_countdown),
        }
    }
}

/// Format seconds as `mm:ss`, rounding up to the next whole second.
pub fn format_countdown(seconds: f64) -> String {
    let total = seconds.max(0.0).ceil() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn synced(balance: f64, capacity: u32, regen: f64) -> EnergyLedger {
        let mut ledger = EnergyLedger::new(capacity, regen);
        ledger.apply(
            EnergyCorrection { energy: Some(balance), updated_at: Some(0.0), ..Default::default() },
            0.0,
        );
        ledger
    }

    #[test]
    fn unsynced_ledger_is_empty() {
        let ledger = EnergyLedger::new(10, 60.0);
        assert!(!ledger.is_synced());
        assert_eq!(ledger.whole_units(1_000_000.0), 0);
    }

    #[test]
    fn regenerates_one_unit_per_period() {
        let ledger = synced(2.0, 10, 60.0);
        assert!((ledger.balance(60_000.0) - 3.0).abs() < 1e-9);
        assert_eq!(ledger.whole_units(59_999.0), 2);
        assert_eq!(ledger.whole_units(60_000.0), 3);
    }

    #[test]
    fn regeneration_clamps_to_capacity() {
        let ledger = synced(2.0, 2, 60.0);
        assert_eq!(ledger.balance(60_000.0), 2.0);
        let ledger = synced(2.0, 5, 60.0);
        assert_eq!(ledger.balance(10_000_000.0), 5.0);
    }

    #[test]
    fn correction_resets_anchor() {
        let mut ledger = synced(2.0, 10, 60.0);
        assert!(ledger.apply(EnergyCorrection { energy: Some(0.5), ..Default::default() }, 120_000.0));
        assert!((ledger.balance(120_000.0) - 0.5).abs() < 1e-9);
        assert!((ledger.balance(150_000.0) - 1.0).abs() < 1e-9);
        assert_eq!(ledger.capacity(), 10);
    }

    #[test]
    fn absent_fields_keep_previous_values() {
        let mut ledger = synced(4.0, 10, 60.0);
        assert!(ledger.apply(EnergyCorrection { capacity: Some(20), ..Default::default() }, 0.0));
        assert_eq!(ledger.capacity(), 20);
        assert_eq!(ledger.regen_seconds(), 60.0);
        assert_eq!(ledger.anchor_at(), 0.0);
        assert!(!ledger.apply(EnergyCorrection { energy: Some(f64::NAN), ..Default::default() }, 30_000.0));
        assert!(!ledger.apply(EnergyCorrection { capacity: Some(20), ..Default::default() }, 30_000.0));
        assert_eq!(ledger.anchor_at(), 0.0);
    }

    #[test]
    fn capacity_raise_does_not_refill() {
        let mut ledger = synced(5.0, 5, 60.0);
        let hour = 3_600_000.0;
        assert_eq!(ledger.balance(hour), 5.0);
        ledger.apply(EnergyCorrection { capacity: Some(20), ..Default::default() }, hour);
        assert_eq!(ledger.capacity(), 20);
        assert_eq!(ledger.balance(hour), 5.0);
        assert!((ledger.balance(hour + 60_000.0) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn faster_regen_applies_from_now() {
        let mut ledger = synced(0.0, 100, 60.0);
        let ten_minutes = 600_000.0;
        assert!((ledger.balance(ten_minutes) - 10.0).abs() < 1e-9);
        ledger.apply(EnergyCorrection { regen_seconds: Some(6.0), ..Default::default() }, ten_minutes);
        assert!((ledger.balance(ten_minutes) - 10.0).abs() < 1e-9);
        assert!((ledger.balance(ten_minutes + 60_000.0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn capacity_drop_clamps_current_balance() {
        let mut ledger = synced(8.0, 10, 60.0);
        ledger.apply(EnergyCorrection { capacity: Some(3), ..Default::default() }, 0.0);
        assert_eq!(ledger.balance(0.0), 3.0);
        ledger.apply(EnergyCorrection { capacity: Some(10), ..Default::default() }, 0.0);
        assert_eq!(ledger.balance(0.0), 3.0);
    }

    #[test]
    fn future_anchor_does_not_go_backwards() {
        let mut ledger = EnergyLedger::new(10, 60.0);
        ledger.apply(EnergyCorrection { energy: Some(3.0), updated_at: Some(5_000.0), ..Default::default() }, 0.0);
        assert_eq!(ledger.balance(0.0), 3.0);
    }

    #[test]
    fn display_subtracts_staged() {
        let ledger = synced(3.5, 10, 60.0);
        let display = ledger.display(0.0, 2);
        assert_eq!(display.current, 3);
        assert_eq!(display.available, 1);
        assert_eq!(display.countdown.as_deref(), Some("00:30"));
        assert_eq!(synced(10.0, 10, 60.0).display(0.0, 0).countdown, None);
    }

    #[test]
    fn countdown_format() {
        assert_eq!(format_countdown(0.2), "00:01");
        assert_eq!(format_countdown(61.0), "01:01");
        assert_eq!(format_countdown(600.0), "10:00");
    }

    proptest! {
        #[test]
        fn regeneration_is_monotonic(
            start in 0.0f64..20.0,
            capacity in 1u32..30,
            regen in 1.0f64..600.0,
            t1 in 0.0f64..1e7,
            dt in 0.0f64..1e7,
        ) {
            let ledger = synced(start, capacity, regen);
            let b1 = ledger.balance(t1);
            let b2 = ledger.balance(t1 + dt);
            prop_assert!(b2 >= b1);
            prop_assert!(b2 <= capacity as f64);
        }
    }
}
