//! Property-based tests using proptest.
//!
//! These check the lock algebra, value conservation of built and executed
//! transactions, determinism of vote tallying and monotonic chain time.

use crate::generators::test_node_id;
use crate::harness::*;
use camino_state::{ChainView, OptionalExt};
use camino_types::{
    AddressState, Id, LockIds, LockState, LockedOutput, NodeId, Output, OutputOwners, Proposal,
    ProposalState, ShortId, Tx, UnsignedTx, Validator, PRIMARY_NETWORK_ID,
};
use proptest::prelude::*;

// ============================================================================
// Proptest Strategies
// ============================================================================

fn arb_short_id() -> impl Strategy<Value = ShortId> {
    prop::array::uniform20(any::<u8>()).prop_map(ShortId)
}

/// Non-empty 32-byte IDs.
fn arb_lock_id() -> impl Strategy<Value = Id> {
    prop::array::uniform32(any::<u8>())
        .prop_filter("non-empty", |bytes| bytes.iter().any(|b| *b != 0))
        .prop_map(Id)
}

fn arb_lock_state() -> impl Strategy<Value = LockState> {
    prop_oneof![
        Just(LockState::UNLOCKED),
        Just(LockState::DEPOSITED),
        Just(LockState::BONDED),
        Just(LockState::DEPOSITED_BONDED),
    ]
}

fn arb_owners() -> impl Strategy<Value = OutputOwners> {
    prop::collection::vec(arb_short_id(), 1..4).prop_flat_map(|addrs| {
        let owners = OutputOwners::new(1, addrs);
        let len = owners.addrs.len() as u32;
        (1..=len).prop_map(move |threshold| OutputOwners {
            threshold,
            ..owners.clone()
        })
    })
}

fn arb_plain_output() -> impl Strategy<Value = Output> {
    (1u64..u64::MAX, arb_owners()).prop_map(|(amount, owners)| Output::transfer(amount, owners))
}

/// Plain or locked outputs whose lock IDs are real transaction IDs.
fn arb_output() -> impl Strategy<Value = Output> {
    (
        arb_plain_output(),
        prop::option::of(arb_lock_id()),
        prop::option::of(arb_lock_id()),
    )
        .prop_map(|(plain, deposit, bond)| {
            let ids = LockIds::new(deposit.unwrap_or(Id::EMPTY), bond.unwrap_or(Id::EMPTY));
            if ids.is_locked() {
                Output::Locked(LockedOutput::new(ids, plain))
            } else {
                plain
            }
        })
}

fn is_single_wrapped(out: &Output) -> bool {
    match out {
        Output::Transfer(_) => true,
        Output::Locked(locked) => matches!(*locked.out, Output::Transfer(_)),
    }
}

// ============================================================================
// Lock Algebra Property Tests
// ============================================================================

proptest! {
    /// Unlocking what was just locked restores a plain output.
    #[test]
    fn prop_lock_unlock_round_trip(out in arb_plain_output(), state in arb_lock_state()) {
        let locked = out.clone().lock(state);
        prop_assert_eq!(locked.lock_state(), state);
        prop_assert_eq!(locked.unlock(state), out);
    }

    /// Locking with flags the output does not hold is undone by unlocking them.
    #[test]
    fn prop_round_trip_keeps_other_locks(out in arb_output(), state in arb_lock_state()) {
        let held = out.lock_state();
        let fresh = LockState::from_bits(state.bits() & !held.bits()).unwrap();
        let relocked = out.clone().lock(fresh).unlock(fresh);
        prop_assert_eq!(relocked, out);
    }

    /// Repeated locking never nests lock wrappers.
    #[test]
    fn prop_lock_never_nests(
        out in arb_output(),
        first in arb_lock_state(),
        second in arb_lock_state(),
    ) {
        let held = out.lock_state();
        let amount = out.amount();
        let locked = out.lock(first).lock(second);
        prop_assert!(is_single_wrapped(&locked));
        prop_assert_eq!(locked.lock_state(), held.union(first).union(second));
        prop_assert_eq!(locked.amount(), amount);
        prop_assert!(locked.verify().is_ok());
    }

    /// Fixing placeholders leaves no placeholder and keeps the state.
    #[test]
    fn prop_fix_resolves_placeholders(
        out in arb_output(),
        state in arb_lock_state(),
        tx_id in arb_lock_id(),
    ) {
        let locked = out.lock(state);
        let before = locked.lock_state();
        let fixed = locked.fix_lock_ids(tx_id);
        let ids = fixed.lock_ids();
        prop_assert_ne!(ids.deposit_tx_id, Id::THIS_TX);
        prop_assert_ne!(ids.bond_tx_id, Id::THIS_TX);
        prop_assert_eq!(fixed.lock_state(), before);
    }
}

// ============================================================================
// Conservation Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Inputs of a built transfer cover its outputs plus the fee, and
    /// executing it burns exactly the fee from the supply.
    #[test]
    fn prop_transfer_conserves_value(
        amount in 1u64..FUNDS / 2,
        recipient in arb_short_id(),
    ) {
        let chain = TestChain::new(1);
        let payer = chain.applicant;
        prop_assume!(recipient != payer);
        let fee = chain.view().base_fee();
        let supply = chain.view().current_supply();

        let tx = chain.build(payer, |w| w.base(OutputOwners::single(recipient), amount));
        let common = tx.unsigned.common().unwrap();
        let consumed: u64 = common.ins.iter().map(|i| i.input.amount()).sum();
        let produced: u64 = common.outs.iter().map(|o| o.out.amount()).sum();
        prop_assert_eq!(consumed, produced + fee);

        chain.issue(&tx).unwrap();
        prop_assert_eq!(chain.view().current_supply(), supply - fee);
        prop_assert_eq!(chain.balance(&recipient).unlocked, amount);
        prop_assert_eq!(chain.balance(&payer).unlocked, FUNDS - amount - fee);
    }
}

// ============================================================================
// Vote Tallying Property Tests
// ============================================================================

fn tally(total: u32, options: usize, votes: &[u32]) -> ProposalState {
    let proposal = Proposal::BaseFee {
        start: 0,
        end: 10,
        options: (1..=options as u64).collect(),
    };
    let mut state = ProposalState::new(&proposal, ShortId([0xEE; 20]), total);
    for (i, option) in votes.iter().enumerate() {
        state = state.add_vote(ShortId([i as u8 + 1; 20]), *option).unwrap();
    }
    state
}

fn arb_votes() -> impl Strategy<Value = (u32, usize, Vec<u32>)> {
    (1u32..12, 2usize..=3).prop_flat_map(|(total, options)| {
        (
            Just(total),
            Just(options),
            prop::collection::vec(0..options as u32, 0..=total as usize),
        )
    })
}

proptest! {
    /// The outcome depends only on the tally, not on when it is computed
    /// or in which order the votes arrived.
    #[test]
    fn prop_vote_outcome_is_deterministic((total, options, votes) in arb_votes()) {
        let first = tally(total, options, &votes);
        let again = tally(total, options, &votes);
        let mut reversed_votes = votes.clone();
        reversed_votes.reverse();
        let reversed = tally(total, options, &reversed_votes);

        for other in [&again, &reversed] {
            prop_assert_eq!(first.is_successful(), other.is_successful());
            prop_assert_eq!(first.winning_option(), other.winning_option());
            prop_assert_eq!(first.can_finish_early(), other.can_finish_early());
        }
    }

    /// A successful proposal wins with a strict majority of a quorum, and an
    /// early finish never picks a different winner than the final tally.
    #[test]
    fn prop_success_requires_majority((total, options, votes) in arb_votes()) {
        let state = tally(total, options, &votes);
        if let Some(winner) = state.winning_option() {
            let weight = state.options[winner as usize].weight;
            prop_assert!(2 * state.votes_cast() > total);
            prop_assert!(2 * weight > state.votes_cast());
        }

        if state.can_finish_early() && state.votes_cast() < total {
            let leader = state.most_voted().map(|(index, _)| index);
            let rest = total as usize - votes.len();
            for option in 0..options as u32 {
                let mut all = votes.clone();
                all.extend(std::iter::repeat(option).take(rest));
                prop_assert_eq!(tally(total, options, &all).most_voted().map(|(i, _)| i), leader);
            }
        }
    }
}

// ============================================================================
// Chain Time Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Accepted chain time only moves forward; advancing to a time not after
    /// the current one is always rejected.
    #[test]
    fn prop_chain_time_is_monotonic(steps in prop::collection::vec(-50i64..200, 1..12)) {
        let chain = TestChain::new(1);
        chain.clock.set(GENESIS_TIME + 10_000);

        for step in steps {
            let current = chain.timestamp();
            let time = current.saturating_add_signed(step);
            let tx = Tx::system(UnsignedTx::AdvanceTime { time });
            match chain.blocks.verify_proposal(&tx) {
                Ok(outcome) => {
                    prop_assert!(time > current);
                    chain.blocks.accept(&outcome.on_commit).unwrap();
                    prop_assert_eq!(chain.timestamp(), time);
                }
                Err(_) => {
                    prop_assert!(time <= current);
                    prop_assert_eq!(chain.timestamp(), current);
                }
            }
        }
    }
}

// ============================================================================
// Staker Set Property Tests
// ============================================================================

#[derive(Debug, Clone)]
enum StakerAction {
    /// Admin flips `NODE_DEFERRED` on the applicant (0) or the first member (1).
    ToggleDeferred(usize),
    /// Move chain time forward by this many seconds.
    Advance(u64),
}

fn arb_staker_action() -> impl Strategy<Value = StakerAction> {
    prop_oneof![
        (0usize..2).prop_map(StakerAction::ToggleDeferred),
        (1u64..40).prop_map(StakerAction::Advance),
    ]
}

/// Where a primary validator of `node_id` currently sits.
#[derive(Debug, PartialEq, Eq)]
enum StakerSet {
    Pending,
    Current,
    Deferred,
}

fn staker_set(chain: &TestChain, node_id: &NodeId) -> StakerSet {
    let view = chain.view();
    let pending = view.get_pending_staker(&PRIMARY_NETWORK_ID, node_id).optional().unwrap();
    let current = view.get_current_staker(&PRIMARY_NETWORK_ID, node_id).optional().unwrap();
    let deferred = view.get_deferred_staker(&PRIMARY_NETWORK_ID, node_id).optional().unwrap();
    match (pending, current, deferred) {
        (Some(_), None, None) => StakerSet::Pending,
        (None, Some(_), None) => StakerSet::Current,
        (None, None, Some(_)) => StakerSet::Deferred,
        other => panic!("node {} held by {:?}", node_id, other),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Each validator sits in exactly one staker set, and a validator whose
    /// owner is deferred is never current, whether it was current or still
    /// pending when the flag was set.
    #[test]
    fn prop_staker_sets_respect_deferral(
        actions in prop::collection::vec(arb_staker_action(), 1..12),
    ) {
        let chain = TestChain::new(3);
        let applicant = chain.applicant;
        let applicant_node = NodeId([77u8; 20]);
        let start = GENESIS_TIME + 20;
        chain
            .submit(applicant, |w| w.register_node(NodeId::EMPTY, applicant_node, applicant))
            .unwrap();
        let validator = Validator {
            node_id: applicant_node,
            start,
            end: start + 31_536,
            weight: chain.config.validator_bond_amount,
        };
        chain
            .submit(applicant, |w| w.add_validator(validator, OutputOwners::single(applicant)))
            .unwrap();

        let tracked = [
            (applicant, applicant_node, start),
            (chain.members[0], test_node_id(0), GENESIS_TIME),
        ];
        for action in actions {
            match action {
                StakerAction::ToggleDeferred(index) => {
                    let (owner, _, _) = tracked[index];
                    let deferred = chain
                        .view()
                        .address_state(&owner)
                        .unwrap()
                        .contains(AddressState::NODE_DEFERRED);
                    chain
                        .submit(chain.admin, |w| {
                            w.address_state(owner, AddressState::BIT_NODE_DEFERRED, deferred, chain.admin)
                        })
                        .unwrap();
                }
                StakerAction::Advance(seconds) => {
                    chain.advance_to(chain.timestamp() + seconds).unwrap();
                }
            }

            for (owner, node_id, start) in tracked {
                let deferred = chain
                    .view()
                    .address_state(&owner)
                    .unwrap()
                    .contains(AddressState::NODE_DEFERRED);
                let started = chain.timestamp() >= start;
                let expected = match (started, deferred) {
                    (false, _) => StakerSet::Pending,
                    (true, false) => StakerSet::Current,
                    (true, true) => StakerSet::Deferred,
                };
                prop_assert_eq!(staker_set(&chain, &node_id), expected);
            }
        }
    }
}
