//! Block subsidy schedule.

use crate::params::NetworkParams;

/// Halves every `halving_interval` blocks; floors to zero once halved past
/// 64 times (the shift would otherwise be undefined behavior).
pub fn block_subsidy(height: u32, params: &NetworkParams) -> u64 {
    let halvings = height / params.halving_interval;
    if halvings >= 64 {
        return 0;
    }
    params.initial_reward >> halvings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halves_on_schedule() {
        let params = NetworkParams::mainnet();
        let first = block_subsidy(0, &params);
        let after_one_halving = block_subsidy(params.halving_interval, &params);
        assert_eq!(after_one_halving, first / 2);
    }

    #[test]
    fn floors_to_zero_eventually() {
        let params = NetworkParams::mainnet();
        let far_future = params.halving_interval.saturating_mul(65);
        assert_eq!(block_subsidy(far_future, &params), 0);
    }
}
