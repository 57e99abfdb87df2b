//! Bounded rolling window of recent prices

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::{EngineError, Result};
use crate::instrument::Cadence;

/// A single observed price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl PriceSample {
    /// Rejects non-finite and non-positive prices
    pub fn new(price: f64, timestamp: DateTime<Utc>) -> Result<Self> {
        if !price.is_finite() || price <= 0.0 {
            return Err(EngineError::InvalidPrice(price));
        }
        Ok(Self { price, timestamp })
    }
}

/// Time-ordered buffer that evicts the oldest sample once full
#[derive(Debug, Clone)]
pub struct PriceWindow {
    samples: VecDeque<PriceSample>,
    capacity: usize,
}

impl PriceWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn for_cadence(cadence: Cadence) -> Self {
        Self::new(cadence.profile().window_capacity)
    }

    pub fn push(&mut self, sample: PriceSample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Most recent `k` prices, oldest first
    pub fn last_n(&self, k: usize) -> Vec<f64> {
        let skip = self.samples.len().saturating_sub(k);
        self.samples.iter().skip(skip).map(|s| s.price).collect()
    }

    pub fn latest(&self) -> Option<&PriceSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &PriceSample> {
        self.samples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(price: f64, offset: i64) -> PriceSample {
        let base = DateTime::parse_from_rfc3339("2024-03-05T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        PriceSample::new(price, base + Duration::seconds(offset)).unwrap()
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut window = PriceWindow::new(100);
        for i in 0..107 {
            window.push(sample(1000.0 + i as f64, i));
            assert!(window.len() <= 100);
        }

        assert_eq!(window.len(), 100);
        let prices = window.last_n(100);
        assert_eq!(prices.first(), Some(&1007.0));
        assert_eq!(prices.last(), Some(&1106.0));
        assert!(prices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_last_n_clamps() {
        let mut window = PriceWindow::new(10);
        window.push(sample(1.0, 0));
        window.push(sample(2.0, 1));
        window.push(sample(3.0, 2));

        assert_eq!(window.last_n(2), vec![2.0, 3.0]);
        assert_eq!(window.last_n(50), vec![1.0, 2.0, 3.0]);
        assert_eq!(window.latest().map(|s| s.price), Some(3.0));
    }

    #[test]
    fn test_clear() {
        let mut window = PriceWindow::for_cadence(Cadence::Standard);
        window.push(sample(5.0, 0));
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.capacity(), 100);
    }

    #[test]
    fn test_rejects_bad_prices() {
        let now = Utc::now();
        assert!(PriceSample::new(f64::NAN, now).is_err());
        assert_eq!(PriceSample::new(0.0, now), Err(EngineError::InvalidPrice(0.0)));
        assert!(PriceSample::new(-3.5, now).is_err());
    }
}
