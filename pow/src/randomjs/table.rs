//! Weighted choice tables
//!
//! Every production point of the generator draws from one of these tables.
//! A draw consumes exactly one `gen_f64` from the random source, so the
//! sequence of choices is fully determined by the key.

use core::str::FromStr;

use crate::randomjs::blake2b::RandomSource;
use crate::randomjs::error::TableError;

/// One labeled alternative
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedChoice<T> {
    pub value: T,
    pub weight: f64,
}

/// Reusable weighted sampler
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedTable<T> {
    items: Vec<WeightedChoice<T>>,
    total: f64,
}

impl<T> Default for WeightedTable<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0.0,
        }
    }
}

impl<T: Copy> WeightedTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an alternative
    pub fn add(&mut self, value: T, weight: f64) -> Result<(), TableError> {
        if !weight.is_finite() || weight <= 0.0 {
            return Err(TableError::InvalidWeight(weight));
        }
        self.items.push(WeightedChoice { value, weight });
        self.total += weight;
        Ok(())
    }

    /// Build a table from `(value, weight)` pairs
    pub fn from_pairs(pairs: &[(T, f64)]) -> Result<Self, TableError> {
        let mut table = Self::new();
        for &(value, weight) in pairs {
            table.add(value, weight)?;
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn choices(&self) -> &[WeightedChoice<T>] {
        &self.items
    }

    /// Pick a value proportionally to its weight
    pub fn choose<R: RandomSource + ?Sized>(&self, rng: &mut R) -> Result<T, TableError> {
        self.choose_where(rng, |_| true)
    }

    /// Pick among the alternatives accepted by `eligible`.
    ///
    /// The draw is taken even when only one alternative qualifies so the
    /// random sequence does not depend on the filter outcome.
    pub fn choose_where<R, F>(&self, rng: &mut R, eligible: F) -> Result<T, TableError>
    where
        R: RandomSource + ?Sized,
        F: Fn(T) -> bool,
    {
        let total: f64 = self
            .items
            .iter()
            .filter(|c| eligible(c.value))
            .map(|c| c.weight)
            .sum();
        if total <= 0.0 {
            return Err(TableError::EmptyTable);
        }

        let mut point = rng.gen_f64() * total;
        let mut last = None;
        for choice in self.items.iter().filter(|c| eligible(c.value)) {
            if point < choice.weight {
                return Ok(choice.value);
            }
            point -= choice.weight;
            last = Some(choice.value);
        }
        // Floating point residue lands on the last eligible entry
        last.ok_or(TableError::EmptyTable)
    }
}

impl<T: Copy + FromStr> WeightedTable<T> {
    /// Add an alternative of an enumerated domain by name
    pub fn add_named(&mut self, name: &str, weight: f64) -> Result<(), TableError> {
        let value = name
            .parse::<T>()
            .map_err(|_| TableError::Parse(name.to_string()))?;
        self.add(value, weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::randomjs::blake2b::Blake2Generator;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Letter {
        A,
        B,
    }

    impl FromStr for Letter {
        type Err = ();

        fn from_str(s: &str) -> Result<Self, ()> {
            match s {
                "A" => Ok(Letter::A),
                "B" => Ok(Letter::B),
                _ => Err(()),
            }
        }
    }

    #[test]
    fn test_distribution_one_to_three() {
        let table = WeightedTable::from_pairs(&[(Letter::A, 1.0), (Letter::B, 3.0)]).unwrap();
        let mut rng = Blake2Generator::new(b"distribution");
        let draws = 10_000;
        let b_count = (0..draws)
            .filter(|_| table.choose(&mut rng).unwrap() == Letter::B)
            .count();
        // Expected 7500, stddev ~43
        assert!((7200..=7800).contains(&b_count), "b_count = {}", b_count);
    }

    #[test]
    fn test_empty_table() {
        let table: WeightedTable<Letter> = WeightedTable::new();
        let mut rng = Blake2Generator::new(b"empty");
        assert_eq!(table.choose(&mut rng), Err(TableError::EmptyTable));
        assert_eq!(table.choose(&mut rng), Err(TableError::EmptyTable));
    }

    #[test]
    fn test_invalid_weights() {
        let mut table = WeightedTable::new();
        assert_eq!(table.add(Letter::A, 0.0), Err(TableError::InvalidWeight(0.0)));
        assert_eq!(table.add(Letter::A, -1.0), Err(TableError::InvalidWeight(-1.0)));
        assert!(table.add(Letter::A, f64::NAN).is_err());
        assert!(table.add(Letter::A, f64::INFINITY).is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn test_add_named() {
        let mut table: WeightedTable<Letter> = WeightedTable::new();
        table.add_named("B", 2.0).unwrap();
        assert_eq!(
            table.add_named("C", 1.0),
            Err(TableError::Parse("C".to_string()))
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_choose_where_filters() {
        let table = WeightedTable::from_pairs(&[(Letter::A, 100.0), (Letter::B, 1.0)]).unwrap();
        let mut rng = Blake2Generator::new(b"filter");
        for _ in 0..50 {
            assert_eq!(table.choose_where(&mut rng, |l| l == Letter::B), Ok(Letter::B));
        }
        assert_eq!(
            table.choose_where(&mut rng, |_| false),
            Err(TableError::EmptyTable)
        );
    }
}
