use rand::Rng;

use crate::domain::errors::WalletError;
use crate::domain::models::ChangeStrategy;

/// Split `satoshis` of change over `count` destinations under the given
/// strategy. The returned amounts always sum to exactly `satoshis` and
/// every destination gets at least one satoshi.
pub fn split_change(
    satoshis: u64,
    count: u32,
    strategy: ChangeStrategy,
) -> Result<Vec<u64>, WalletError> {
    let count = count.max(1) as u64;
    // Not enough satoshis to give every destination one; collapse
    let count = count.min(satoshis.max(1));

    match strategy {
        ChangeStrategy::Default => Ok(split_even(satoshis, count)),
        ChangeStrategy::Random => Ok(split_random(satoshis, count)),
        ChangeStrategy::Nominations => Err(WalletError::ChangeStrategyNotImplemented),
    }
}

fn split_even(satoshis: u64, count: u64) -> Vec<u64> {
    let share = satoshis / count;
    let remainder = satoshis % count;
    let mut amounts = vec![share; count as usize];
    // The last destination absorbs the rounding remainder
    if let Some(last) = amounts.last_mut() {
        *last += remainder;
    }
    amounts
}

/// Each destination gets between 0.75x and 1.25x of the even share, the
/// last one takes whatever remains so the total is exact.
fn split_random(satoshis: u64, count: u64) -> Vec<u64> {
    let mut rng = rand::thread_rng();
    let share = (satoshis / count) as f64;
    let mut amounts = Vec::with_capacity(count as usize);
    let mut remaining = satoshis;

    for i in 0..count {
        let left_after_this = count - i - 1;
        if left_after_this == 0 {
            amounts.push(remaining);
            break;
        }
        let factor: f64 = rng.gen_range(0.75..1.25);
        let want = (share * factor).round().max(1.0) as u64;
        // Leave at least one satoshi for each remaining destination
        let cap = remaining.saturating_sub(left_after_this).max(1);
        let amount = want.min(cap);
        amounts.push(amount);
        remaining -= amount;
    }

    amounts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_split_is_exact() {
        let amounts = split_change(1000, 3, ChangeStrategy::Default).unwrap();
        assert_eq!(amounts.len(), 3);
        assert_eq!(amounts.iter().sum::<u64>(), 1000);
        // The rounding remainder lands on the last destination
        assert_eq!(amounts, vec![333, 333, 334]);
    }

    #[test]
    fn random_split_is_exact_and_positive() {
        for _ in 0..50 {
            let amounts = split_change(10_000, 4, ChangeStrategy::Random).unwrap();
            assert_eq!(amounts.len(), 4);
            assert_eq!(amounts.iter().sum::<u64>(), 10_000);
            assert!(amounts.iter().all(|&a| a > 0), "got {:?}", amounts);
        }
    }

    #[test]
    fn collapses_when_satoshis_are_scarce() {
        let amounts = split_change(2, 5, ChangeStrategy::Default).unwrap();
        assert_eq!(amounts.iter().sum::<u64>(), 2);
        assert!(amounts.len() <= 2);
    }

    #[test]
    fn nominations_fails_fast() {
        assert!(matches!(
            split_change(1000, 2, ChangeStrategy::Nominations),
            Err(WalletError::ChangeStrategyNotImplemented)
        ));
    }
}
