//! End-to-end pipeline scenarios: bootstrap, block commits, protocol
//! activation and head reverts against a small two-baker chain.

use serde_json::{json, Value};

use tzindex::address::Address;
use tzindex::entity::{
    AccountKind, BlockEvents, PeriodKind, ProtoConstants, RightKind, RightStatus,
};
use tzindex::ids::AccountId;
use tzindex::{GenesisAccount, GenesisConfig, Mutez, ProtocolHandler, RawBlock, Severity, WriteOp};

const ALICE: &str = "tz1alice";
const BOB: &str = "tz1bob";
const CAROL: &str = "tz1carol";

const ALICE_BALANCE: u64 = 1_000_000_000;
const BOB_BALANCE: u64 = 500_000_000;
const CAROL_BALANCE: u64 = 100_000_000;

fn constants() -> ProtoConstants {
    ProtoConstants {
        blocks_per_cycle: 8,
        snapshots_per_cycle: 4,
        preserved_cycles: 2,
        attesters_per_block: 4,
        baking_rounds: 2,
        block_reward: Mutez(1_000_000),
        block_bonus_per_slot: Mutez(1_000),
        attestation_reward_per_slot: Mutez(500),
        nonce_revelation_reward: Mutez(125_000),
        lb_subsidy: Mutez(333_000),
        double_baking_slash_percent: 5,
        double_attesting_slash_percent: 50,
        accuser_reward_percent: 50,
        frozen_deposit_percent: 0,
        time_between_blocks: 8,
        blocks_per_voting_period: 16,
        dictator: None,
    }
}

fn genesis() -> GenesisConfig {
    GenesisConfig {
        hash: "BK0".into(),
        protocol_hash: "PtTest1".into(),
        timestamp: 1000,
        constants: constants(),
        accounts: vec![
            GenesisAccount {
                address: Address::new(ALICE),
                balance: Mutez(ALICE_BALANCE),
                baker: true,
                delegate: None,
            },
            GenesisAccount {
                address: Address::new(BOB),
                balance: Mutez(BOB_BALANCE),
                baker: true,
                delegate: None,
            },
            GenesisAccount {
                address: Address::new(CAROL),
                balance: Mutez(CAROL_BALANCE),
                baker: false,
                delegate: Some(Address::new(ALICE)),
            },
        ],
        seed: [7u8; 32],
    }
}

fn bootstrapped() -> ProtocolHandler {
    let mut handler = ProtocolHandler::new();
    handler.bootstrap(&genesis()).unwrap();
    handler
}

fn block_json(level: i32, manager_ops: Value) -> Value {
    json!({
        "hash": format!("BK{}", level),
        "header": {
            "level": level,
            "proto": 0,
            "predecessor": format!("BK{}", level - 1),
            "timestamp": 1000 + level as i64,
            "payload_round": 0
        },
        "metadata": {
            "protocol": "PtTest1",
            "next_protocol": "PtTest1",
            "baker": ALICE,
            "proposer": ALICE
        },
        "operations": [[], [], [], manager_ops]
    })
}

fn empty_block(level: i32) -> RawBlock {
    RawBlock::from_value(block_json(level, json!([]))).unwrap()
}

fn balance_of(handler: &ProtocolHandler, address: &str) -> Mutez {
    handler
        .cache()
        .accounts
        .find(&Address::new(address))
        .expect("account exists")
        .balance
}

fn id_of(handler: &ProtocolHandler, address: &str) -> AccountId {
    handler
        .cache()
        .accounts
        .find(&Address::new(address))
        .expect("account exists")
        .id
}

#[test]
fn bootstrap_seeds_the_rights_window() {
    let handler = bootstrapped();
    assert_eq!(handler.head_level(), 0);
    // preserved_cycles + 1 cycles materialized ahead
    for cycle in 0..=2 {
        assert!(handler.cache().cycles.contains_key(&cycle));
    }
    assert!(!handler.cache().cycles.contains_key(&3));
    let stats = handler.cache().statistics_at(0).unwrap();
    assert_eq!(
        stats.total_minted,
        Mutez(ALICE_BALANCE + BOB_BALANCE + CAROL_BALANCE)
    );
}

#[test]
fn transaction_block_moves_value_and_fees() {
    let mut handler = bootstrapped();
    let block = RawBlock::from_value(block_json(
        1,
        json!([{
            "hash": "opCarolToBob",
            "contents": [{
                "kind": "transaction",
                "source": CAROL,
                "fee": 1000,
                "counter": 1,
                "destination": BOB,
                "amount": 5_000_000,
                "metadata": { "operation_result": { "status": "applied" } }
            }]
        }]),
    ))
    .unwrap();

    let writes = handler.process(&block).unwrap();
    assert!(writes.contains(&WriteOp::InsertBlock { level: 1 }));

    assert_eq!(handler.head_level(), 1);
    assert_eq!(
        balance_of(&handler, CAROL),
        Mutez(CAROL_BALANCE - 5_000_000 - 1000)
    );
    assert_eq!(balance_of(&handler, BOB), Mutez(BOB_BALANCE + 5_000_000));
    // fee plus the legacy round-0 block reward land on the baker
    assert_eq!(
        balance_of(&handler, ALICE),
        Mutez(ALICE_BALANCE + 1000 + 1_000_000)
    );

    let head = handler.cache().block(1).unwrap();
    assert_eq!(head.fees, Mutez(1000));
    assert_eq!(head.reward, Mutez(1_000_000));

    // supply conservation: only the block reward was minted
    let stats = handler.cache().statistics_at(1).unwrap();
    let genesis_total = Mutez(ALICE_BALANCE + BOB_BALANCE + CAROL_BALANCE);
    assert_eq!(stats.total_minted, (genesis_total + Mutez(1_000_000)).unwrap());
    assert_eq!(stats.total_burned, Mutez::zero());
}

#[test]
fn revert_restores_the_exact_prior_state() {
    let mut handler = bootstrapped();
    let block = RawBlock::from_value(block_json(
        1,
        json!([{
            "hash": "opCarolToBob",
            "contents": [{
                "kind": "transaction",
                "source": CAROL,
                "fee": 1000,
                "counter": 1,
                "destination": BOB,
                "amount": 5_000_000,
                "metadata": { "operation_result": { "status": "applied" } }
            }]
        }]),
    ))
    .unwrap();
    let alice = id_of(&handler, ALICE);
    let bob = id_of(&handler, BOB);
    let alice_cycle = handler.cache().baker_cycle(0, alice).unwrap().clone();
    let bob_cycle = handler.cache().baker_cycle(0, bob).unwrap().clone();

    handler.process(&block).unwrap();
    assert_eq!(handler.cache().op_ids.peek(), 1);

    let writes = handler.revert_head().unwrap();
    assert!(writes.contains(&WriteOp::DeleteBlock { level: 1 }));

    assert_eq!(handler.head_level(), 0);
    assert_eq!(balance_of(&handler, ALICE), Mutez(ALICE_BALANCE));
    assert_eq!(balance_of(&handler, BOB), Mutez(BOB_BALANCE));
    assert_eq!(balance_of(&handler, CAROL), Mutez(CAROL_BALANCE));
    assert!(handler.cache().operations.is_empty());
    assert_eq!(handler.cache().op_ids.peek(), 0);
    assert!(handler.cache().statistics_at(1).is_err());
    assert!(!handler.cache().snapshot_balances.contains_key(&1));
    // per-cycle expectations are restored bit for bit, counts and
    // priced rewards alike
    assert_eq!(handler.cache().baker_cycle(0, alice).unwrap(), &alice_cycle);
    assert_eq!(handler.cache().baker_cycle(0, bob).unwrap(), &bob_cycle);
}

#[test]
fn stale_block_is_an_uncertain_rejection() {
    let mut handler = bootstrapped();
    let mut value = block_json(1, json!([]));
    value["header"]["predecessor"] = json!("BKsomewhereelse");
    let block = RawBlock::from_value(value).unwrap();
    let err = handler.process(&block).unwrap_err();
    assert_eq!(err.severity(), Severity::Rejected { certain: false });
    // nothing was committed
    assert_eq!(handler.head_level(), 0);
}

#[test]
fn cycle_rollover_loads_and_unloads_the_future_cycle() {
    let mut handler = bootstrapped();
    for level in 1..=9 {
        handler.process(&empty_block(level)).unwrap();
    }
    // level 9 began cycle 1; cycle 3 materialized from a cycle-0 snapshot
    let head = handler.cache().block(9).unwrap();
    assert!(head.events.contains(BlockEvents::CYCLE_BEGIN));
    assert!(handler.cache().cycles.contains_key(&3));
    let snapshot = handler.cache().cycle(3).unwrap().snapshot_level.unwrap();
    assert!((1..=8).contains(&snapshot));
    // every right of cycle 3 sits inside its own level window (25..=32)
    for level in 25..=32 {
        let rights = handler.cache().rights.at_level(level);
        assert!(!rights.is_empty());
        assert!(rights.iter().all(|r| r.cycle == 3));
    }

    let writes = handler.revert_head().unwrap();
    assert!(writes.contains(&WriteOp::DeleteRights { cycle: 3 }));
    assert_eq!(handler.head_level(), 8);
    assert!(!handler.cache().cycles.contains_key(&3));
    for level in 25..=32 {
        assert!(handler.cache().rights.at_level(level).is_empty());
    }
}

#[test]
fn empty_proposal_period_rolls_into_a_new_epoch() {
    let mut handler = bootstrapped();
    for level in 1..=16 {
        handler.process(&empty_block(level)).unwrap();
    }
    let period = handler.cache().voting.current_period().unwrap();
    assert_eq!(period.index, 1);
    assert_eq!(period.epoch, 1);
    assert_eq!(period.kind, PeriodKind::Proposal);
    assert_eq!(period.first_level, 17);

    handler.revert_head().unwrap();
    let period = handler.cache().voting.current_period().unwrap();
    assert_eq!(period.index, 0);
    assert_eq!(period.epoch, 0);
}

#[test]
fn activation_migrates_and_reverts_cleanly() {
    let mut handler = bootstrapped();
    let mut value = block_json(1, json!([]));
    value["header"]["proto"] = json!(12);
    value["metadata"]["protocol"] = json!("PtIthaca12");
    value["metadata"]["next_protocol"] = json!("PtIthaca12");
    value["metadata"]["balance_updates"] = json!([
        { "account": CAROL, "change": 1_000 }
    ]);
    let block = RawBlock::from_value(value).unwrap();
    handler.process(&block).unwrap();

    let proto = handler.cache().current_protocol().unwrap();
    assert_eq!(proto.code.0, 12);
    assert_eq!(proto.hash, "PtIthaca12");
    assert_eq!(proto.first_level, 1);
    let genesis_proto = handler
        .cache()
        .protocol(tzindex::ids::ProtoCode(0))
        .unwrap();
    assert_eq!(genesis_proto.last_level, Some(0));
    // the migration invoice was minted, on top of the fixed block reward
    assert_eq!(balance_of(&handler, CAROL), Mutez(CAROL_BALANCE + 1_000));
    let head = handler.cache().block(1).unwrap();
    assert!(head.events.contains(BlockEvents::PROTOCOL_BEGIN));

    handler.revert_head().unwrap();
    assert_eq!(handler.head_level(), 0);
    let proto = handler.cache().current_protocol().unwrap();
    assert_eq!(proto.code.0, 0);
    assert_eq!(proto.last_level, None);
    assert_eq!(balance_of(&handler, CAROL), Mutez(CAROL_BALANCE));
}

#[test]
fn staged_hooks_defer_derived_state() {
    let mut handler = bootstrapped();
    // level 1 is a snapshot point; its measurement rows belong to the
    // after-commit batch, so the commit batch can be flushed first
    let commit = handler.commit(&empty_block(1)).unwrap();
    assert!(commit.contains(&WriteOp::InsertBlock { level: 1 }));
    assert!(!commit.contains(&WriteOp::BulkInsertSnapshotBalances { level: 1 }));
    let after = handler.after_commit().unwrap();
    assert!(after.contains(&WriteOp::BulkInsertSnapshotBalances { level: 1 }));

    let before = handler.before_revert().unwrap();
    assert!(before.contains(&WriteOp::DeleteSnapshotBalances { level: 1 }));
    let revert = handler.revert().unwrap();
    assert!(revert.contains(&WriteOp::DeleteBlock { level: 1 }));
    assert_eq!(handler.head_level(), 0);
    assert!(!handler.cache().snapshot_balances.contains_key(&1));
}

#[test]
fn self_delegation_upgrades_a_user_and_reverts() {
    let mut handler = bootstrapped();
    let alice = id_of(&handler, ALICE);
    let (alice_staking, alice_delegated, alice_delegators) = {
        let a = handler.cache().accounts.get(alice).unwrap();
        (a.staking_balance, a.delegated_balance, a.delegators_count)
    };

    let block = RawBlock::from_value(block_json(
        1,
        json!([{
            "hash": "opCarolRegisters",
            "contents": [{
                "kind": "delegation",
                "source": CAROL,
                "fee": 1000,
                "counter": 1,
                "delegate": CAROL,
                "metadata": { "operation_result": { "status": "applied" } }
            }]
        }]),
    ))
    .unwrap();
    handler.process(&block).unwrap();

    let carol = handler
        .cache()
        .accounts
        .find(&Address::new(CAROL))
        .unwrap();
    assert_eq!(carol.kind, AccountKind::Delegate);
    assert_eq!(carol.delegate, None);
    assert_eq!(carol.activation_level, Some(1));
    assert_eq!(carol.counter, 1);
    assert_eq!(carol.balance, Mutez(CAROL_BALANCE - 1000));
    assert_eq!(carol.staking_balance, Mutez(CAROL_BALANCE - 1000));
    let a = handler.cache().accounts.get(alice).unwrap();
    assert_eq!(a.delegators_count, alice_delegators - 1);

    handler.revert_head().unwrap();
    let carol = handler
        .cache()
        .accounts
        .find(&Address::new(CAROL))
        .unwrap();
    assert_eq!(carol.kind, AccountKind::User);
    assert_eq!(carol.delegate, Some(alice));
    assert_eq!(carol.delegation_level, Some(0));
    assert_eq!(carol.activation_level, None);
    assert_eq!(carol.counter, 0);
    assert_eq!(carol.balance, Mutez(CAROL_BALANCE));
    assert_eq!(carol.staking_balance, Mutez::zero());
    let a = handler.cache().accounts.get(alice).unwrap();
    assert_eq!(a.staking_balance, alice_staking);
    assert_eq!(a.delegated_balance, alice_delegated);
    assert_eq!(a.delegators_count, alice_delegators);
}

#[test]
fn double_baking_slashes_at_the_accused_cycle() {
    let mut handler = bootstrapped();
    let alice = id_of(&handler, ALICE);
    let bob = id_of(&handler, BOB);

    // bob freezes a deposit first so there is something to slash
    let stake = RawBlock::from_value(block_json(
        1,
        json!([{
            "hash": "opBobStake",
            "contents": [{
                "kind": "transaction",
                "source": BOB,
                "fee": 0,
                "counter": 1,
                "destination": BOB,
                "amount": 100_000_000,
                "parameters": { "entrypoint": "stake", "value": {} },
                "metadata": { "operation_result": { "status": "applied" } }
            }]
        }]),
    ))
    .unwrap();
    handler.process(&stake).unwrap();
    assert_eq!(
        handler.cache().accounts.get(bob).unwrap().frozen_deposit,
        Mutez(100_000_000)
    );

    let mut value = block_json(2, json!([]));
    value["operations"][2] = json!([{
        "hash": "opEvidence",
        "contents": [{
            "kind": "double_baking_evidence",
            "accused_level": 1,
            "metadata": { "offender": BOB }
        }]
    }]);
    let evidence = RawBlock::from_value(value).unwrap();
    handler.process(&evidence).unwrap();

    // 5 percent of the deposit, half of that to the accusing baker
    let b = handler.cache().accounts.get(bob).unwrap();
    assert_eq!(b.frozen_deposit, Mutez(95_000_000));
    assert_eq!(
        balance_of(&handler, ALICE),
        Mutez(ALICE_BALANCE + 2 * 1_000_000 + 2_500_000)
    );
    let bc = handler.cache().baker_cycle(0, bob).unwrap();
    assert_eq!(bc.double_baking_losses, Mutez(5_000_000));
    let bc = handler.cache().baker_cycle(0, alice).unwrap();
    assert_eq!(bc.double_baking_rewards, Mutez(2_500_000));
    let stats = handler.cache().statistics_at(2).unwrap();
    assert_eq!(stats.total_burned, Mutez(5_000_000));
    assert_eq!(stats.total_frozen, Mutez(95_000_000));

    handler.revert_head().unwrap();
    let b = handler.cache().accounts.get(bob).unwrap();
    assert_eq!(b.frozen_deposit, Mutez(100_000_000));
    assert_eq!(balance_of(&handler, ALICE), Mutez(ALICE_BALANCE + 1_000_000));
    let bc = handler.cache().baker_cycle(0, bob).unwrap();
    assert_eq!(bc.double_baking_losses, Mutez::zero());
    let bc = handler.cache().baker_cycle(0, alice).unwrap();
    assert_eq!(bc.double_baking_rewards, Mutez::zero());
}

#[test]
fn rights_realization_marks_realized_and_missed() {
    let mut handler = bootstrapped();
    let alice = id_of(&handler, ALICE);
    let bob = id_of(&handler, BOB);
    handler.process(&empty_block(1)).unwrap();

    // the committee stored at level 2 attests level 1; include one
    // member's endorsement and leave the rest out
    let (attester, attester_addr, slots) = {
        let right = handler
            .cache()
            .rights
            .at_level(2)
            .iter()
            .find(|r| r.kind == RightKind::Attestation)
            .expect("committee cached");
        let account = handler.cache().accounts.get(right.baker).unwrap();
        (right.baker, format!("{}", account.address), right.slots.unwrap())
    };
    let mut value = block_json(2, json!([]));
    value["operations"][0] = json!([{
        "hash": "opAttest",
        "contents": [{
            "kind": "endorsement",
            "level": 1,
            "metadata": { "delegate": attester_addr, "slots": slots }
        }]
    }]);
    let block = RawBlock::from_value(value).unwrap();
    handler.process(&block).unwrap();

    for right in handler.cache().rights.at_level(2) {
        assert_ne!(right.status, RightStatus::Future);
        if right.kind == RightKind::Attestation {
            if right.baker == attester {
                assert_eq!(right.status, RightStatus::Realized);
            } else {
                assert_eq!(right.status, RightStatus::Missed);
            }
        }
    }
    // every committee slot is accounted for, attested or missed
    let (attested, missed) = [alice, bob].iter().fold((0, 0), |(a, m), baker| {
        let bc = handler.cache().baker_cycle(0, *baker).unwrap();
        (a + bc.attestations, m + bc.missed_attestations)
    });
    assert_eq!(attested, slots as i32);
    assert_eq!(attested + missed, 4);

    handler.revert_head().unwrap();
    assert!(handler
        .cache()
        .rights
        .at_level(2)
        .iter()
        .all(|r| r.status == RightStatus::Future));
    for baker in [alice, bob] {
        let bc = handler.cache().baker_cycle(0, baker).unwrap();
        assert_eq!(bc.attestations, 0);
        assert_eq!(bc.missed_attestations, 0);
    }
}

#[test]
fn absent_attesters_without_deposit_are_uncovered() {
    let mut config = genesis();
    config.constants.frozen_deposit_percent = 10;
    let mut handler = ProtocolHandler::new();
    handler.bootstrap(&config).unwrap();
    handler.process(&empty_block(1)).unwrap();
    handler.process(&empty_block(2)).unwrap();

    let committee: Vec<_> = handler
        .cache()
        .rights
        .at_level(2)
        .iter()
        .filter(|r| r.kind == RightKind::Attestation)
        .collect();
    assert!(!committee.is_empty());
    for right in committee {
        assert_eq!(right.status, RightStatus::Uncovered);
    }
}
