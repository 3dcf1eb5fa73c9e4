//! Integration test: conservation over the production curve and SQLite.
//!
//! Random checkpoint sequences never attribute more than the emission, and
//! a lone holder's ledger always matches its pool, across split changes.

use proptest::prelude::*;
use tidal_integration_tests::{admin, schedule, staking_owner, vault, vault_owner, Harness, BASE_TIME, MONTH};
use tidal_rewards::Shares;
use tidal_types::{Address, Beneficiary, PoolId, StakeId};

const END: u64 = BASE_TIME + 120 * MONTH;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_lone_holder_matches_pool(
        steps in proptest::collection::vec(
            (1u64..(4 * MONTH), proptest::option::of(0u64..=100)),
            1..8,
        ),
    ) {
        let mut h = Harness::new(schedule(BASE_TIME, END), (100, 50), &[100, 50]);
        let pool = PoolId::Vault(vault(2));
        let holder = Beneficiary::Depositor(Address::repeat(0x0d));
        h.distributor
            .checkpoint(&vault_owner(2), &pool, &holder, Shares::ZERO, BASE_TIME)
            .expect("open");

        let mut now = BASE_TIME;
        let mut credited = 0u128;
        for (step, staking_weight) in steps {
            now += step;
            if let Some(staking_weight) = staking_weight {
                h.distributor
                    .set_split(&admin(), 100, staking_weight, now)
                    .expect("split");
            }
            credited += h
                .distributor
                .checkpoint(&vault_owner(2), &pool, &holder, Shares::new(9, 9), now)
                .expect("checkpoint")
                .beneficiary_delta;
        }

        let state = h
            .distributor
            .pool_rewards_state(&pool)
            .expect("query")
            .expect("opened");
        prop_assert_eq!(state.total_emitted, credited);
        // Vault 2 never gets more than 50/150 of the emission.
        prop_assert!(credited <= h.emission(BASE_TIME, now) * 50 / 150);
    }

    #[test]
    fn prop_pools_never_exceed_emission(
        times in proptest::collection::vec(BASE_TIME..(BASE_TIME + 24 * MONTH), 1..10),
    ) {
        let mut h = Harness::new(schedule(BASE_TIME, END), (100, 50), &[100, 50]);
        let stake = Beneficiary::Stake(StakeId(1));
        let depositor = Beneficiary::Depositor(Address::repeat(0x0d));

        let mut times = times;
        times.sort_unstable();
        for (i, now) in times.iter().enumerate() {
            match i % 3 {
                0 => h.distributor.checkpoint(&staking_owner(), &PoolId::Staking, &stake, Shares::new(1, 1), *now),
                n => {
                    let n = n as u8;
                    h.distributor.checkpoint(&vault_owner(n), &PoolId::Vault(vault(n)), &depositor, Shares::new(1, 2), *now)
                }
            }
            .expect("checkpoint");
        }

        let last = times.last().copied().unwrap_or(BASE_TIME);
        let mut attributed = 0u128;
        for pool in [PoolId::Staking, PoolId::Vault(vault(1)), PoolId::Vault(vault(2))] {
            if let Some(state) = h.distributor.pool_rewards_state(&pool).expect("query") {
                attributed += state.total_emitted;
            }
        }
        prop_assert!(attributed <= h.emission(BASE_TIME, last));
    }
}
