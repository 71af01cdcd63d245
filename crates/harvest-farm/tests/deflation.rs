//! Integration tests with deflationary deposit tokens
//!
//! Both staking tokens burn 1% of every transfer. The farm must credit
//! positions with what custody actually received, keep rewards solvent
//! across a second pool joining mid-stream, an emergency exit, a top-up and
//! the farm closing.

use harvest_core::{AccountId, Amount, BlockNumber, FarmError, ManualClock, MemoryToken};
use harvest_farm::{Farm, FarmParams, FarmPhase};
use std::sync::Arc;

const START: BlockNumber = 100;

struct Harness {
    clock: ManualClock,
    farm: Farm,
    reward: MemoryToken,
    lp: MemoryToken,
    lp2: MemoryToken,
    custody: AccountId,
    owner: AccountId,
    alice: AccountId,
    bob: AccountId,
    carl: AccountId,
}

impl Harness {
    /// 100 per block from block 100, pool 0 on a taxed token, 10_000 funded
    fn new() -> Self {
        let clock = ManualClock::new(0);
        let custody = AccountId::from_label("farm");
        let owner = AccountId::from_label("owner");
        let alice = AccountId::from_label("alice");
        let bob = AccountId::from_label("bob");
        let carl = AccountId::from_label("carl");

        let reward = MemoryToken::new("GAX");
        reward.mint(&owner, 1_000_000);
        let lp = MemoryToken::with_tax("MLPD", 1);
        let lp2 = MemoryToken::with_tax("MLPD2", 1);
        lp.mint(&alice, 5_000);
        lp.mint(&bob, 500);
        lp.mint(&carl, 2_000);
        lp2.mint(&alice, 1_000);
        lp2.mint(&carl, 800);

        let mut farm = Farm::new(
            owner,
            Arc::new(clock.clone()),
            FarmParams::new(Arc::new(reward.vault(custody)), 100, START, owner),
        )
        .unwrap();
        farm.add_pool(&owner, Arc::new(lp.vault(custody)), 15, 0, 0)
            .unwrap();
        clock.advance_to(1);
        farm.fund(&owner, 10_000).unwrap();

        Self {
            clock,
            farm,
            reward,
            lp,
            lp2,
            custody,
            owner,
            alice,
            bob,
            carl,
        }
    }

    fn at(&self, offset: BlockNumber) {
        self.clock.advance_to(START + offset);
    }

    fn pending(&self, pool: usize) -> [Amount; 3] {
        [self.alice, self.bob, self.carl].map(|a| self.farm.pending(pool, &a).unwrap())
    }

    fn total_pending(&self) -> Amount {
        self.farm.total_pending().unwrap()
    }

    /// Walks the full timeline up to block START + 150 (before the
    /// emergency exit)
    fn before_emergency() -> Self {
        let mut h = Self::new();
        h.clock.advance_to(2);
        h.farm.deposit(&h.alice, 0, 1_500).unwrap();
        h.clock.advance_to(3);
        h.farm.deposit(&h.bob, 0, 500).unwrap();
        h.at(30);
        h.farm.deposit(&h.carl, 0, 2_000).unwrap();
        h.at(70);
        h.farm.withdraw(&h.alice, 0, 1_485).unwrap();
        h.at(80);
        h.farm.withdraw(&h.carl, 0, 1_500).unwrap();
        h.at(81);
        h.farm.fund(&h.owner, 8_000).unwrap();
        h.at(100);
        h.farm
            .add_pool(&h.owner, Arc::new(h.lp2.vault(h.custody)), 5, 0, 0)
            .unwrap();
        h.at(110);
        h.farm.deposit(&h.carl, 1, 500).unwrap();
        h.at(120);
        h.farm.deposit(&h.alice, 1, 1_000).unwrap();
        h.at(150);
        h.farm.withdraw(&h.carl, 1, 200).unwrap();
        h
    }
}

mod single_pool_tests {
    use super::*;

    #[test]
    fn test_deposits_credit_received_amount() {
        let mut h = Harness::new();
        assert_eq!(h.farm.end_block(), START + 100);

        h.clock.advance_to(2);
        let receipt = h.farm.deposit(&h.alice, 0, 1_500).unwrap();
        assert_eq!(receipt.principal, 1_485);
        h.clock.advance_to(3);
        h.farm.deposit(&h.bob, 0, 500).unwrap();

        assert_eq!(h.lp.balance_of(&h.custody), 1_980);
        assert_eq!(h.farm.pool_info(0).unwrap().total_staked, 1_980);
        assert_eq!(h.farm.deposited(0, &h.alice), 1_485);
        assert_eq!(h.farm.deposited(0, &h.bob), 495);
        assert_eq!(h.total_pending(), 0);
    }

    #[test]
    fn test_accrual_with_taxed_stakes() {
        let mut h = Harness::new();
        h.clock.advance_to(2);
        h.farm.deposit(&h.alice, 0, 1_500).unwrap();
        h.clock.advance_to(3);
        h.farm.deposit(&h.bob, 0, 500).unwrap();

        h.at(10);
        assert_eq!(h.total_pending(), 1_000);
        assert_eq!(h.pending(0), [749, 249, 0]);

        h.at(30);
        h.farm.deposit(&h.carl, 0, 2_000).unwrap();
        assert_eq!(h.farm.deposited(0, &h.carl), 1_980);
        assert_eq!(h.total_pending(), 3_000);
        assert_eq!(h.pending(0), [2_249, 749, 0]);

        h.at(50);
        assert_eq!(h.total_pending(), 5_000);
        assert_eq!(h.pending(0), [2_999, 999, 1_000]);

        h.at(70);
        h.farm.withdraw(&h.alice, 0, 1_485).unwrap();
        assert_eq!(h.reward.balance_of(&h.alice), 3_749);
        assert_eq!(h.lp.balance_of(&h.alice), 4_971);
        assert_eq!(h.total_pending(), 3_251);
        assert_eq!(h.pending(0), [0, 1_249, 2_000]);

        h.at(80);
        h.farm.withdraw(&h.carl, 0, 1_500).unwrap();
        assert_eq!(h.reward.balance_of(&h.carl), 2_800);
        assert_eq!(h.lp.balance_of(&h.carl), 1_485);
        assert_eq!(h.farm.deposited(0, &h.carl), 480);
        assert_eq!(h.total_pending(), 1_451);
        assert_eq!(h.pending(0), [0, 1_449, 0]);

        assert_eq!(
            h.farm.withdraw(&h.carl, 0, 600),
            Err(FarmError::InsufficientDeposit {
                pool: 0,
                requested: 600,
                deposited: 480
            })
        );
    }
}

mod multi_pool_tests {
    use super::*;

    #[test]
    fn test_second_pool_takes_quarter_of_emission() {
        let mut h = Harness::new();
        h.clock.advance_to(2);
        h.farm.deposit(&h.alice, 0, 1_500).unwrap();
        h.clock.advance_to(3);
        h.farm.deposit(&h.bob, 0, 500).unwrap();
        h.at(30);
        h.farm.deposit(&h.carl, 0, 2_000).unwrap();
        h.at(70);
        h.farm.withdraw(&h.alice, 0, 1_485).unwrap();
        h.at(80);
        h.farm.withdraw(&h.carl, 0, 1_500).unwrap();

        h.at(81);
        assert_eq!(h.farm.fund(&h.owner, 8_000).unwrap(), START + 180);

        h.at(100);
        h.farm
            .add_pool(&h.owner, Arc::new(h.lp2.vault(h.custody)), 5, 0, 0)
            .unwrap();
        assert_eq!(h.farm.total_alloc_point(), 20);
        assert_eq!(h.total_pending(), 3_451);
        assert_eq!(h.pending(0), [0, 2_465, 984]);
        assert_eq!(h.pending(1), [0, 0, 0]);

        h.at(110);
        h.farm.deposit(&h.carl, 1, 500).unwrap();
        assert_eq!(h.lp.balance_of(&h.custody), 975);
        assert_eq!(h.lp2.balance_of(&h.custody), 495);
        assert_eq!(h.total_pending(), 4_451);
        assert_eq!(h.pending(0), [0, 2_846, 1_353]);
        assert_eq!(h.pending(1), [0, 0, 0]);

        h.at(120);
        h.farm.deposit(&h.alice, 1, 1_000).unwrap();
        assert_eq!(h.lp2.balance_of(&h.custody), 1_485);
        assert_eq!(h.farm.deposited(1, &h.alice), 990);
        assert_eq!(h.total_pending(), 5_451);
        assert_eq!(h.pending(0), [0, 3_226, 1_723]);
        assert_eq!(h.pending(1), [0, 0, 249]);

        h.at(140);
        assert_eq!(h.total_pending(), 7_451);
        assert_eq!(h.pending(0), [0, 3_988, 2_461]);
        assert_eq!(h.pending(1), [334, 0, 416]);

        h.at(150);
        h.farm.withdraw(&h.carl, 1, 200).unwrap();
        assert_eq!(h.reward.balance_of(&h.carl), 3_299);
        assert_eq!(h.lp2.balance_of(&h.carl), 498);
        assert_eq!(h.lp2.balance_of(&h.custody), 1_285);
        assert_eq!(h.farm.deposited(1, &h.carl), 295);
        assert_eq!(h.total_pending(), 7_952);
        assert_eq!(h.pending(0), [0, 4_369, 2_830]);
        assert_eq!(h.pending(1), [500, 0, 0]);
    }

    #[test]
    fn test_emergency_exit_spreads_forfeit_to_pool() {
        let mut h = Harness::before_emergency();

        h.at(160);
        let receipt = h.farm.emergency_withdraw(&h.carl, 1).unwrap();
        assert_eq!(receipt.principal, 295);
        assert_eq!(receipt.forfeited, 58);
        assert_eq!(h.lp2.balance_of(&h.carl), 791);
        assert_eq!(h.reward.balance_of(&h.carl), 3_299);
        assert_eq!(h.lp2.balance_of(&h.custody), 990);
        assert_eq!(h.farm.deposited(1, &h.carl), 0);
        assert_eq!(h.total_pending(), 8_952);
        assert_eq!(h.pending(0), [0, 4_749, 3_200]);
        assert_eq!(h.pending(1), [750, 0, 0]);

        h.at(180);
        assert_eq!(h.total_pending(), 10_952);
        assert_eq!(h.pending(0), [0, 5_511, 3_938]);
        assert_eq!(h.pending(1), [1_250, 0, 0]);
    }

    #[test]
    fn test_closed_farm_settles_out() {
        let mut h = Harness::before_emergency();
        h.at(160);
        h.farm.emergency_withdraw(&h.carl, 1).unwrap();

        h.at(200);
        assert_eq!(h.farm.phase(), FarmPhase::Closed);
        assert_eq!(h.total_pending(), 10_952);
        assert_eq!(h.pending(0), [0, 5_511, 3_938]);
        assert_eq!(h.pending(1), [1_250, 0, 0]);
        assert_eq!(
            h.farm.fund(&h.owner, 10_000),
            Err(FarmError::FarmClosed {
                current: START + 200,
                end: START + 180
            })
        );

        h.at(201);
        h.farm.withdraw(&h.alice, 1, 990).unwrap();
        h.at(202);
        h.farm.withdraw(&h.bob, 0, 495).unwrap();
        h.at(203);
        h.farm.withdraw(&h.carl, 0, 480).unwrap();

        assert_eq!(h.reward.balance_of(&h.alice), 4_999);
        assert_eq!(h.lp.balance_of(&h.alice), 4_971);
        assert_eq!(h.lp2.balance_of(&h.alice), 981);
        assert_eq!(h.reward.balance_of(&h.bob), 5_511);
        assert_eq!(h.lp.balance_of(&h.bob), 491);
        assert_eq!(h.reward.balance_of(&h.carl), 7_237);
        assert_eq!(h.lp.balance_of(&h.carl), 1_961);
        assert_eq!(h.lp2.balance_of(&h.carl), 791);

        // truncation leftovers stay in custody, unclaimable
        assert_eq!(h.total_pending(), 253);
        assert_eq!(h.reward.balance_of(&h.custody), 253);
        assert_eq!(h.lp.balance_of(&h.custody), 0);
        assert_eq!(h.lp2.balance_of(&h.custody), 0);
    }
}
