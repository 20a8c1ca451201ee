//! Virtual numbers: validation and collision-free allocation.
//!
//! A virtual number is `+999`, a 3-digit area and a 6-digit subscriber,
//! e.g. `+999001234567`. Area `000` is reserved for system use.

use crate::error::NumberError;
use crate::providers::{AvailableNumber, NumberFeature};
use number_store::{NumberDb, ProviderName};
use rand::Rng;
use std::collections::HashSet;
use tracing::{debug, instrument};

pub const VIRTUAL_PREFIX: &str = "+999";
pub const VIRTUAL_COUNTRY: &str = "999";
pub const VIRTUAL_NUMBER_LENGTH: usize = 13;
pub const RESERVED_AREA: &str = "000";

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// Candidates generated per requested number.
const CANDIDATE_FACTOR: usize = 3;
/// Draw attempts per wanted candidate before giving up on uniqueness.
const ATTEMPT_FACTOR: usize = 10;

pub fn is_virtual_number(number: &str) -> bool {
    number.starts_with(VIRTUAL_PREFIX)
}

/// Check the format of a virtual number. The reserved area is only
/// accepted when `allow_reserved` is set.
pub fn validate_virtual_number(number: &str, allow_reserved: bool) -> Result<(), NumberError> {
    if !is_virtual_number(number) {
        return Err(NumberError::Validation(format!(
            "virtual number must start with {}: {}",
            VIRTUAL_PREFIX, number
        )));
    }
    if number.len() != VIRTUAL_NUMBER_LENGTH {
        return Err(NumberError::Validation(format!(
            "virtual number must be {} characters: {}",
            VIRTUAL_NUMBER_LENGTH, number
        )));
    }
    if !number[1..].bytes().all(|b| b.is_ascii_digit()) {
        return Err(NumberError::Validation(format!(
            "virtual number must contain only digits after '+': {}",
            number
        )));
    }

    let area = &number[VIRTUAL_PREFIX.len()..VIRTUAL_PREFIX.len() + 3];
    if area == RESERVED_AREA && !allow_reserved {
        return Err(NumberError::Validation(format!(
            "virtual number is in the reserved range: {}",
            number
        )));
    }

    Ok(())
}

/// Up to `count` distinct random virtual numbers outside the reserved
/// area. Returns fewer when uniqueness can't be reached within a bounded
/// number of draws.
pub fn generate_candidates<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<String> {
    let mut seen = HashSet::with_capacity(count);
    let mut candidates = Vec::with_capacity(count);

    for _ in 0..count.saturating_mul(ATTEMPT_FACTOR) {
        if candidates.len() == count {
            break;
        }
        let area: u32 = rng.gen_range(1..=999);
        let subscriber: u32 = rng.gen_range(0..=999_999);
        let candidate = format!("{}{:03}{:06}", VIRTUAL_PREFIX, area, subscriber);
        if seen.insert(candidate.clone()) {
            candidates.push(candidate);
        }
    }

    candidates
}

/// Hands out virtual numbers not held by any live record.
#[derive(Clone)]
pub struct VirtualNumberAllocator {
    db: NumberDb,
}

impl VirtualNumberAllocator {
    pub fn new(db: NumberDb) -> Self {
        Self { db }
    }

    /// Up to `limit` free virtual numbers. A single round of candidates
    /// is drawn; taken ones are dropped rather than replaced, so fewer
    /// than `limit` may come back.
    #[instrument(skip(self))]
    pub async fn available(&self, limit: u32) -> Result<Vec<AvailableNumber>, NumberError> {
        let limit = match limit {
            0 => DEFAULT_LIMIT,
            n => n.min(MAX_LIMIT),
        } as usize;

        let candidates = generate_candidates(&mut rand::thread_rng(), limit * CANDIDATE_FACTOR);
        let taken: HashSet<String> = self
            .db
            .get_existing_numbers(&candidates)
            .await?
            .into_iter()
            .collect();

        debug!(
            "Generated {} virtual candidates, {} already taken",
            candidates.len(),
            taken.len()
        );

        Ok(candidates
            .into_iter()
            .filter(|c| !taken.contains(c))
            .take(limit)
            .map(|number| AvailableNumber {
                number,
                provider_name: ProviderName::None,
                country: VIRTUAL_COUNTRY.to_string(),
                region: String::new(),
                postal_code: String::new(),
                features: vec![NumberFeature::Voice],
            })
            .collect())
    }
}
