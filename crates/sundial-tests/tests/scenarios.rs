//! Reference scenarios exercised through the fully wired protocol rather
//! than engine-level stubs.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use sundial_core::constants::{INITIAL_POOL_SHARES, UNIT};
use sundial_core::error::RewardError;
use sundial_tests::helpers::*;

// ---- trading ----

#[test]
fn balanced_pool_prices_small_swaps_near_par() {
    let mut p = Protocol::new();
    p.bootstrap_pool(ALICE, 100 * UNIT, 100 * UNIT);
    let base = p.base_token();

    let first = p
        .market
        .swap_exact_in(&mut p.forge, BOB, base, 10 * UNIT, 0)
        .unwrap();
    assert!(first > 9 * UNIT && first < 10 * UNIT, "first = {first}");

    // Same input again moves along the curve: strictly fewer claims out.
    let second = p
        .market
        .swap_exact_in(&mut p.forge, BOB, base, 10 * UNIT, 0)
        .unwrap();
    assert!(second < first, "second = {second}, first = {first}");

    // Reserves stay positive no matter how many swaps land.
    let (yield_left, base_left) = p.market.reserves();
    assert!(yield_left > 0 && base_left > 0);
}

#[test]
fn repeated_swaps_never_drain_a_reserve() {
    let mut p = Protocol::new();
    p.bootstrap_pool(ALICE, 100 * UNIT, 100 * UNIT);
    let base = p.base_token();

    for _ in 0..40 {
        p.market
            .swap_exact_in(&mut p.forge, BOB, base, 10 * UNIT, 0)
            .unwrap();
    }
    let (yield_left, _) = p.market.reserves();
    assert!(yield_left > 0);
}

#[test]
fn fee_bearing_swaps_grow_the_weighted_invariant() {
    let mut p = Protocol::new();
    p.bootstrap_pool(ALICE, 100 * UNIT, 100 * UNIT);
    let base = p.base_token();

    let invariant = |p: &Protocol| -> f64 {
        let (by, bb) = p.market.reserves();
        let (wy, wb) = p.market.weights();
        wy as f64 * (by as f64).ln() + wb as f64 * (bb as f64).ln()
    };

    let before = invariant(&p);
    p.market
        .swap_exact_in(&mut p.forge, BOB, base, 10 * UNIT, 0)
        .unwrap();
    let after = invariant(&p);
    // The fee kept in the pool pushes the curve outward.
    assert!(after > before, "after = {after}, before = {before}");
}

// ---- staking ----

#[test]
fn stake_units_weight_balance_by_time_held() {
    let mut p = Protocol::new();
    p.bootstrap_pool(ALICE, 100 * UNIT, 100 * UNIT);
    let shares = INITIAL_POOL_SHARES;

    // Full balance for the first half of epoch 1, half for the rest.
    p.rewards.stake(p.key, ALICE, shares).unwrap();
    p.clock.set(ANCHOR + EPOCH / 2);
    p.rewards.withdraw(p.key, ALICE, shares / 2).unwrap();
    p.clock.set(ANCHOR + EPOCH);

    let half = u128::from(EPOCH / 2);
    let expected = shares * half + (shares / 2) * half;
    assert_eq!(p.rewards.user_stake_units(p.key, ALICE, 1), expected);
    assert_eq!(p.rewards.total_stake_units(p.key, 1), expected);
    assert_eq!(p.balance(p.market.share_token(), ALICE), shares / 2);
}

#[test]
fn withdrawn_shares_stop_earning_immediately() {
    let mut p = Protocol::new();
    p.bootstrap_pool(ALICE, 100 * UNIT, 100 * UNIT);

    p.rewards.stake(p.key, ALICE, INITIAL_POOL_SHARES).unwrap();
    p.clock.set(ANCHOR + EPOCH / 4);
    p.rewards.withdraw(p.key, ALICE, INITIAL_POOL_SHARES).unwrap();
    p.clock.set(ANCHOR + EPOCH);

    let quarter = u128::from(EPOCH / 4);
    assert_eq!(
        p.rewards.user_stake_units(p.key, ALICE, 1),
        INITIAL_POOL_SHARES * quarter
    );
}

// ---- funding ----

#[test]
fn top_up_credits_future_epochs_exactly() {
    let mut p = Protocol::new();
    let before: Vec<_> = (2..=5).map(|e| p.rewards.funding_for(e)).collect();

    p.rewards
        .top_up_rewards(FUNDER, &[2, 3, 4, 5], &[10 * UNIT; 4])
        .unwrap();
    for (i, e) in (2..=5).enumerate() {
        assert_eq!(p.rewards.funding_for(e), before[i] + 10 * UNIT);
    }
    assert_eq!(p.balance(sundial_core::types::TokenId::Reward, REWARD_VAULT), 40 * UNIT);
}

#[test]
fn top_up_rejects_epochs_already_started() {
    let mut p = Protocol::new();

    // Epoch 5 is still ahead: accepted.
    p.rewards.top_up_rewards(FUNDER, &[5], &[10 * UNIT]).unwrap();

    // Once it has begun, the same call is refused.
    p.clock.set(ANCHOR + 4 * EPOCH + 1);
    assert_eq!(
        p.rewards
            .top_up_rewards(FUNDER, &[5], &[10 * UNIT])
            .unwrap_err(),
        RewardError::InvalidEpochId
    );
    assert_eq!(p.rewards.funding_for(5), 10 * UNIT);
}

// ---- randomized journeys ----

#[test]
fn random_trading_conserves_every_token_supply() {
    let mut p = Protocol::new();
    p.bootstrap_pool(ALICE, 100 * UNIT, 100 * UNIT);
    p.forge.tokenize(p.key, 500 * UNIT, ALICE, ALICE).unwrap();
    p.forge.tokenize(p.key, 500 * UNIT, BOB, BOB).unwrap();
    let base = p.base_token();
    let xyt = p.xyt();
    let base_supply = p.ledger.checked_supply(base);
    let xyt_supply = p.ledger.checked_supply(xyt);

    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let amount = u128::from(rng.gen_range(1u32..=5)) * UNIT;
        let token = if rng.gen_bool(0.5) { base } else { xyt };
        let _ = p.market.swap_exact_in(&mut p.forge, BOB, token, amount, 0);
        if rng.gen_bool(0.2) {
            let _ = p.market.add_liquidity_dual(&mut p.forge, ALICE, amount, amount);
        }
        if rng.gen_bool(0.2) {
            let _ = p.market.remove_liquidity_dual(&mut p.forge, ALICE, amount, 0, 0);
        }
        p.clock.advance(3600);
    }

    // Trading moves tokens around; only the forge may mint or burn them.
    assert_eq!(p.ledger.checked_supply(base), base_supply);
    assert_eq!(p.ledger.checked_supply(xyt), xyt_supply);
    let (b_y, b_b) = p.market.reserves();
    assert!(b_y > 0 && b_b > 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_affordable_swap_stays_within_the_quote_bounds(
        amount in UNIT..(30 * UNIT),
    ) {
        let mut p = Protocol::new();
        p.bootstrap_pool(ALICE, 100 * UNIT, 100 * UNIT);
        let base = p.base_token();
        let out = p
            .market
            .swap_exact_in(&mut p.forge, BOB, base, amount, 0)
            .unwrap();
        // Never at or above par on a balanced pool, never zero.
        prop_assert!(out > 0);
        prop_assert!(out < amount);
    }
}
