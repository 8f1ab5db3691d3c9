use crate::api::{BetType, Odds};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Odds of a market nobody has bet on yet.
pub const BASELINE_ODDS: Odds = Odds {
    before: dec!(2.50),
    exact: dec!(50.00),
    after: dec!(1.80),
};

/// Lowest and highest multiplier a bet type can be priced at.
pub fn bounds(bet_type: BetType) -> (Decimal, Decimal) {
    match bet_type {
        BetType::Before => (dec!(1.50), dec!(4.00)),
        BetType::Exact => (dec!(10.00), dec!(100.00)),
        BetType::After => (dec!(1.20), dec!(3.00)),
    }
}

/// Money staked per bet type, read from the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stakes {
    pub before: Decimal,
    pub exact: Decimal,
    pub after: Decimal,
    pub count: u32,
}
impl Stakes {
    pub fn get(&self, bet_type: BetType) -> Decimal {
        match bet_type {
            BetType::Before => self.before,
            BetType::Exact => self.exact,
            BetType::After => self.after,
        }
    }
    pub fn add(&mut self, bet_type: BetType, amount: Decimal) {
        match bet_type {
            BetType::Before => self.before += amount,
            BetType::Exact => self.exact += amount,
            BetType::After => self.after += amount,
        }
        self.count += 1;
    }
    pub fn total(&self) -> Decimal {
        self.before + self.exact + self.after
    }
}

/// Prices every bet type from the pool and its own stake.
///
/// An unstaked type keeps its baseline. Otherwise the multiplier is
/// `pool / stake`, truncated to two decimals and clamped to the type's bounds.
pub fn compute_odds(pool: Decimal, stakes: &Stakes) -> Odds {
    Odds {
        before: price(BetType::Before, pool, stakes.before),
        exact: price(BetType::Exact, pool, stakes.exact),
        after: price(BetType::After, pool, stakes.after),
    }
}
fn price(bet_type: BetType, pool: Decimal, stake: Decimal) -> Decimal {
    if stake.is_zero() {
        return BASELINE_ODDS.get(bet_type);
    }
    let (min, max) = bounds(bet_type);
    let raw = (pool / stake).round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let mut odds = raw.clamp(min, max);
    odds.rescale(2);
    odds
}
/// Amount times odds, truncated to cents so rounding never inflates a payout.
pub fn potential_payout(amount: Decimal, odds: Decimal) -> Decimal {
    let mut payout = (amount * odds).round_dp_with_strategy(2, RoundingStrategy::ToZero);
    payout.rescale(2);
    payout
}

#[cfg(test)]
mod test {
    use super::*;

    fn stakes(before: Decimal, exact: Decimal, after: Decimal) -> Stakes {
        Stakes {
            before,
            exact,
            after,
            count: 0,
        }
    }

    #[test]
    fn empty_market_uses_baseline() {
        let odds = compute_odds(Decimal::ZERO, &Stakes::default());
        assert_eq!(odds, BASELINE_ODDS);
        assert_eq!(odds.before.to_string(), "2.50");
        assert_eq!(odds.exact.to_string(), "50.00");
        assert_eq!(odds.after.to_string(), "1.80");
    }
    #[test]
    fn unstaked_types_keep_their_prior() {
        let odds = compute_odds(dec!(150.00), &stakes(dec!(150.00), dec!(0), dec!(0)));
        assert_eq!(odds.before, dec!(1.50));
        assert_eq!(odds.exact, dec!(50.00));
        assert_eq!(odds.after, dec!(1.80));
    }
    #[test]
    fn odds_are_clamped() {
        let odds = compute_odds(
            dec!(10000.00),
            &stakes(dec!(10.00), dec!(9980.00), dec!(10.00)),
        );
        assert_eq!(odds.before, dec!(4.00));
        assert_eq!(odds.exact, dec!(10.00));
        assert_eq!(odds.after, dec!(3.00));

        let odds = compute_odds(
            dec!(100000.00),
            &stakes(dec!(99000.00), dec!(1.00), dec!(999.00)),
        );
        assert_eq!(odds.exact, dec!(100.00));
    }
    #[test]
    fn pool_over_stake_inside_bounds() {
        let odds = compute_odds(dec!(300.00), &stakes(dec!(100.00), dec!(10.00), dec!(190.00)));
        assert_eq!(odds.before, dec!(3.00));
        assert_eq!(odds.exact, dec!(30.00));
        // 300 / 190 = 1.5789.. truncated
        assert_eq!(odds.after, dec!(1.57));
    }
    #[test]
    fn more_stake_never_raises_own_odds_nor_lowers_others() {
        let mut current = stakes(dec!(40.00), dec!(5.00), dec!(60.00));
        let mut odds = compute_odds(current.total(), &current);
        for (bet_type, amount) in [
            (BetType::Before, dec!(25.00)),
            (BetType::Exact, dec!(1.00)),
            (BetType::After, dec!(300.00)),
            (BetType::Before, dec!(9999.99)),
            (BetType::Exact, dec!(3.50)),
        ] {
            current.add(bet_type, amount);
            let next = compute_odds(current.total(), &current);
            assert!(next.get(bet_type) <= odds.get(bet_type));
            for other in BetType::ALL.into_iter().filter(|t| *t != bet_type) {
                assert!(next.get(other) >= odds.get(other));
            }
            odds = next;
        }
    }
    #[test]
    fn payout_is_truncated_to_cents() {
        assert_eq!(potential_payout(dec!(100.00), dec!(50.00)), dec!(5000.00));
        assert_eq!(potential_payout(dec!(33.33), dec!(1.57)).to_string(), "52.32");
    }
}
