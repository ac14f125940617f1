//! Authoritative lobby price and its bounded history.

use std::collections::VecDeque;

use rust_decimal::Decimal;

use crate::models::TradeDirection;

/// Prices on either side of a settled trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub before: Decimal,
    pub after: Decimal,
}

impl Settlement {
    pub fn change(&self) -> Decimal {
        self.after - self.before
    }
}

/// Current price plus a FIFO history whose last element is always `current`.
#[derive(Debug, Clone)]
pub struct PriceLedger {
    current: Decimal,
    floor: Decimal,
    history: VecDeque<Decimal>,
    capacity: usize,
}

impl PriceLedger {
    pub fn new(initial: Decimal, floor: Decimal, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let current = initial.max(floor);
        let mut history = VecDeque::with_capacity(capacity);
        history.push_back(current);

        Self {
            current,
            floor,
            history,
            capacity,
        }
    }

    pub fn current(&self) -> Decimal {
        self.current
    }

    /// History from oldest to newest.
    pub fn history(&self) -> Vec<Decimal> {
        self.history.iter().copied().collect()
    }

    #[cfg(test)]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Move the price by `volume` in the trade's direction, never below the floor.
    pub fn apply_trade(&mut self, direction: TradeDirection, volume: i64) -> Settlement {
        let before = self.current;
        let after = before
            .checked_add(Decimal::from(direction.signed(volume)))
            .unwrap_or(Decimal::MAX)
            .max(self.floor);

        self.current = after;
        self.history.push_back(after);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }

        Settlement { before, after }
    }
}
