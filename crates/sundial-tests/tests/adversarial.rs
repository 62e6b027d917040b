//! Hostile-path coverage: pause and lock propagation across engines,
//! over-redemption attempts, a misbehaving yield source, and the
//! emergency exits.

use sundial_core::constants::{INITIAL_POOL_SHARES, RONE, UNIT};
use sundial_core::error::{ForgeError, LedgerError, MarketError, RewardError};
use sundial_core::types::PauseScope;
use sundial_tests::helpers::*;

// ---- pause propagation ----

#[test]
fn forge_pause_stops_market_traffic_too() {
    let mut p = Protocol::new();
    p.bootstrap_pool(ALICE, 100 * UNIT, 100 * UNIT);
    let base = p.base_token();

    p.authority.pause(PauseScope::Forge(p.key));
    // The market cannot checkpoint its interest while the forge is down.
    assert_eq!(
        p.market
            .swap_exact_in(&mut p.forge, BOB, base, UNIT, 0)
            .unwrap_err(),
        MarketError::Forge(ForgeError::ContractPaused)
    );

    p.authority.unpause(PauseScope::Forge(p.key));
    p.market
        .swap_exact_in(&mut p.forge, BOB, base, UNIT, 0)
        .unwrap();
}

#[test]
fn market_pause_leaves_the_forge_running() {
    let mut p = Protocol::new();
    p.bootstrap_pool(ALICE, 100 * UNIT, 100 * UNIT);
    let base = p.base_token();

    p.authority.pause(PauseScope::Market(MARKET));
    assert_eq!(
        p.market
            .swap_exact_in(&mut p.forge, BOB, base, UNIT, 0)
            .unwrap_err(),
        MarketError::ContractPaused
    );
    // Splitting and merging claims is a separate scope.
    p.forge.tokenize(p.key, UNIT, BOB, BOB).unwrap();
    p.forge.redeem_underlying(p.key, UNIT, BOB, BOB).unwrap();
}

// ---- over-redemption ----

#[test]
fn positions_cannot_be_overdrawn() {
    let mut p = Protocol::new();
    p.forge.tokenize(p.key, 10 * UNIT, ALICE, ALICE).unwrap();

    assert_eq!(
        p.forge
            .redeem_underlying(p.key, 11 * UNIT, ALICE, ALICE)
            .unwrap_err(),
        ForgeError::Ledger(LedgerError::InsufficientBalance)
    );
    assert_eq!(
        p.forge
            .transfer_yield(p.key, ALICE, BOB, 11 * UNIT)
            .unwrap_err(),
        ForgeError::Ledger(LedgerError::InsufficientBalance)
    );
    // Nothing moved.
    assert_eq!(p.balance(p.xyt(), ALICE), 10 * UNIT);
}

#[test]
fn liquidity_and_stake_exits_are_bounded_by_holdings() {
    let mut p = Protocol::new();
    p.bootstrap_pool(ALICE, 100 * UNIT, 100 * UNIT);

    // More shares than exist at all.
    assert_eq!(
        p.market
            .remove_liquidity_dual(&mut p.forge, ALICE, INITIAL_POOL_SHARES + 1, 0, 0)
            .unwrap_err(),
        MarketError::InsufficientLiquidity
    );
    // Shares that exist, held by somebody else.
    assert_eq!(
        p.market
            .remove_liquidity_dual(&mut p.forge, BOB, INITIAL_POOL_SHARES / 2, 0, 0)
            .unwrap_err(),
        MarketError::Ledger(LedgerError::InsufficientBalance)
    );

    p.rewards.stake(p.key, ALICE, INITIAL_POOL_SHARES).unwrap();
    assert_eq!(
        p.rewards
            .withdraw(p.key, ALICE, INITIAL_POOL_SHARES + 1)
            .unwrap_err(),
        RewardError::Ledger(LedgerError::InsufficientBalance)
    );
}

// ---- misbehaving yield source ----

#[test]
fn index_regression_is_clamped_at_the_high_water_mark() {
    let mut p = Protocol::new();
    p.forge.tokenize(p.key, 100 * UNIT, ALICE, ALICE).unwrap();

    p.source.grow_to(RONE + RONE / 4);
    assert_eq!(p.forge.redeem_due_interest(p.key, ALICE).unwrap(), 25 * UNIT);

    // The source reports a lower index. Interest holds at zero instead of
    // going negative, and the forge keeps serving calls.
    p.source.force_index(RONE);
    p.clock.advance(3600);
    assert_eq!(p.forge.due_interest(p.key, ALICE), 0);
    assert_eq!(p.forge.redeem_due_interest(p.key, ALICE).unwrap(), 0);

    // Recovery accrues from the clamped mark, not from the dip.
    p.source.force_index(RONE + RONE / 4);
    p.source.grow_to(RONE + RONE / 2);
    assert_eq!(p.forge.redeem_due_interest(p.key, ALICE).unwrap(), 20 * UNIT);
}

// ---- expiry ----

#[test]
fn expiry_closes_every_mutating_path_except_the_exit() {
    let mut p = Protocol::new();
    p.bootstrap_pool(ALICE, 100 * UNIT, 100 * UNIT);
    p.forge.tokenize(p.key, 50 * UNIT, BOB, BOB).unwrap();
    let base = p.base_token();

    p.clock.set(EXPIRY);
    assert_eq!(
        p.forge.tokenize(p.key, UNIT, BOB, BOB).unwrap_err(),
        ForgeError::ContractExpired
    );
    assert_eq!(
        p.forge.redeem_due_interest(p.key, BOB).unwrap_err(),
        ForgeError::ContractExpired
    );
    assert_eq!(
        p.market
            .swap_exact_in(&mut p.forge, BOB, base, UNIT, 0)
            .unwrap_err(),
        MarketError::ContractExpired
    );
    assert_eq!(
        p.market
            .add_liquidity_dual(&mut p.forge, ALICE, UNIT, UNIT)
            .unwrap_err(),
        MarketError::ContractExpired
    );
    assert_eq!(
        p.market
            .remove_liquidity_dual(&mut p.forge, ALICE, UNIT, 0, 0)
            .unwrap_err(),
        MarketError::ContractExpired
    );

    // The one door left open.
    assert_eq!(
        p.forge.redeem_after_expiry(p.key, BOB, BOB).unwrap(),
        50 * UNIT
    );
}

// ---- emergency exits ----

#[test]
fn locked_forge_sweeps_its_vault_once() {
    let mut p = Protocol::new();
    p.forge.tokenize(p.key, 100 * UNIT, ALICE, ALICE).unwrap();

    // Without a lock the emergency path is closed.
    assert_eq!(p.forge.set_emergency_mode(p.key).unwrap_err(), ForgeError::NotLocked);

    p.authority.lock(PauseScope::Forge(p.key), CAROL);
    assert_eq!(
        p.forge.tokenize(p.key, UNIT, ALICE, ALICE).unwrap_err(),
        ForgeError::ContractLocked
    );

    p.forge.set_emergency_mode(p.key).unwrap();
    let swept = p.forge.withdraw_emergency(p.key).unwrap();
    assert_eq!(swept, 100 * UNIT);
    assert_eq!(p.balance(p.yb(), CAROL), 10_100 * UNIT);
    assert_eq!(
        p.forge.withdraw_emergency(p.key).unwrap_err(),
        ForgeError::EmergencySpent
    );
}

#[test]
fn locked_market_hands_reserves_to_the_recipient() {
    let mut p = Protocol::new();
    p.bootstrap_pool(ALICE, 100 * UNIT, 100 * UNIT);
    let base = p.base_token();

    p.authority.lock(PauseScope::Market(MARKET), CAROL);
    assert_eq!(
        p.market
            .swap_exact_in(&mut p.forge, BOB, base, UNIT, 0)
            .unwrap_err(),
        MarketError::ContractLocked
    );

    p.market.set_emergency_mode().unwrap();
    let (yield_out, base_out) = p.market.withdraw_emergency().unwrap();
    assert_eq!(yield_out, 100 * UNIT);
    assert_eq!(base_out, 100 * UNIT);
    assert_eq!(p.balance(p.xyt(), CAROL), 100 * UNIT);
    assert_eq!(p.market.reserves(), (0, 0));
}

#[test]
fn locked_reward_pool_returns_stakes_and_unspent_funding() {
    let mut p = Protocol::new();
    p.bootstrap_pool(ALICE, 100 * UNIT, 100 * UNIT);
    p.rewards.stake(p.key, ALICE, INITIAL_POOL_SHARES).unwrap();
    p.rewards.top_up_rewards(FUNDER, &[2], &[50 * UNIT]).unwrap();

    p.authority.lock(PauseScope::Rewards(MARKET), CAROL);
    assert_eq!(
        p.rewards.stake(p.key, BOB, UNIT).unwrap_err(),
        RewardError::ContractLocked
    );

    p.rewards.set_emergency_mode(p.key).unwrap();
    let (shares, rewards) = p.rewards.withdraw_emergency(p.key).unwrap();
    assert_eq!(shares, INITIAL_POOL_SHARES);
    assert_eq!(rewards, 50 * UNIT);
    assert_eq!(p.balance(p.market.share_token(), CAROL), INITIAL_POOL_SHARES);
    assert_eq!(
        p.rewards.withdraw_emergency(p.key).unwrap_err(),
        RewardError::EmergencySpent
    );
}
