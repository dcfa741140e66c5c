//! # Property-Based Tests
//!
//! Verification tests using proptest.
//!
//! These tests ensure the completion arithmetic and snapshot encoding
//! stay deterministic and bounded for arbitrary inputs.

use proptest::collection::vec;
use proptest::prelude::*;
use trellis_core::{
    CompletionSignal, Evaluator, FieldName, FieldValue, SEQUENCE, Stage, StageAggregator,
    StageProgress, SubFormId, SubFormState, Weight, WizardSession, snapshot_from_bytes,
    snapshot_to_bytes,
};

fn form(required: usize, filled: usize) -> SubFormState {
    let mut form =
        SubFormState::with_required((0..required).map(|i| FieldName::new(format!("field_{}", i))));
    for i in 0..filled.min(required) {
        form.set_value(FieldName::new(format!("field_{}", i)), FieldValue::text("v"))
            .expect("set");
    }
    form
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Earned contribution never exceeds the sub-form's weight.
    #[test]
    fn contribution_never_exceeds_weight(
        required in 1usize..8,
        filled in 0usize..8,
        weight_bp in 0u16..=10_000,
    ) {
        let weight = Weight::new(weight_bp);
        let earned = Evaluator::contribution_bp(&form(required, filled), weight);

        prop_assert!(earned <= weight.bp());
    }

    /// A fully filled sub-form earns exactly its weight, for any weight.
    #[test]
    fn full_fill_earns_exact_weight(
        required in 1usize..8,
        weight_bp in 0u16..=10_000,
    ) {
        let weight = Weight::new(weight_bp);
        let earned = Evaluator::contribution_bp(&form(required, required), weight);

        prop_assert_eq!(earned, weight.bp());
    }

    /// Filling one more field never lowers the contribution.
    #[test]
    fn contribution_monotonic_in_filled(
        required in 2usize..8,
        filled in 0usize..7,
        weight_bp in 0u16..=10_000,
    ) {
        let filled = filled.min(required - 1);
        let weight = Weight::new(weight_bp);

        let before = Evaluator::contribution_bp(&form(required, filled), weight);
        let after = Evaluator::contribution_bp(&form(required, filled + 1), weight);

        prop_assert!(after >= before);
    }

    /// Stage signals clamp at 100.00% even for overweight plans.
    #[test]
    fn stage_signal_clamps_to_full(weights in vec(0u16..=10_000, 1..6)) {
        let forms: Vec<SubFormState> = weights.iter().map(|_| form(1, 1)).collect();
        let parts = forms.iter().zip(weights.iter().map(|bp| Weight::new(*bp)));

        let signal = StageAggregator::stage_signal(parts);

        prop_assert!(signal.basis_points <= 10_000);
        let sum: u32 = weights.iter().map(|bp| u32::from(*bp)).sum();
        prop_assert_eq!(signal.is_complete(), sum >= 10_000);
    }

    /// Aggregation result does not depend on sub-form order.
    #[test]
    fn aggregation_order_independent(
        fills in vec((1usize..5, 0usize..5, 0u16..=5_000), 1..5)
    ) {
        let forms: Vec<(SubFormState, Weight)> = fills
            .iter()
            .map(|(required, filled, bp)| (form(*required, *filled), Weight::new(*bp)))
            .collect();

        let forward = StageAggregator::stage_signal(forms.iter().map(|(f, w)| (f, *w)));
        let reverse = StageAggregator::stage_signal(forms.iter().rev().map(|(f, w)| (f, *w)));

        prop_assert_eq!(forward, reverse);
    }

    /// Completion transitions fire exactly on false<->true flips.
    #[test]
    fn transition_only_on_flips(prev_bp in 0u16..=10_000, cur_bp in 0u16..=10_000) {
        let prev = CompletionSignal::from_basis_points(prev_bp);
        let cur = CompletionSignal::from_basis_points(cur_bp);

        let transition = StageAggregator::transition(prev, cur);

        prop_assert_eq!(transition.is_some(), prev.is_complete() != cur.is_complete());
    }

    /// Overall progress stays within the basis-point scale.
    #[test]
    fn overall_progress_bounded(signals in vec(0u16..=10_000, 5)) {
        let mut progress = StageProgress::new();
        for (stage, bp) in SEQUENCE.iter().zip(signals.iter()) {
            let _ = progress.apply(*stage, CompletionSignal::from_basis_points(*bp));
        }

        prop_assert!(progress.overall_basis_points() <= 10_000);
    }

    /// Snapshot encoding round-trips bit-exactly for arbitrary edits.
    #[test]
    fn snapshot_roundtrip_bit_exact(
        edits in vec((0usize..5, 0usize..4, "[a-zA-Z0-9 ]{0,16}"), 0..30)
    ) {
        let mut session = WizardSession::new();
        for (stage_index, field_index, value) in &edits {
            let stage = SEQUENCE[*stage_index];
            let plan = &stage.blueprint()[0];
            let field = plan.required[*field_index % plan.required.len()];
            session
                .set_field(
                    stage,
                    &SubFormId::new(plan.id),
                    FieldName::new(field),
                    FieldValue::text(value.as_str()),
                )
                .expect("set field");
        }

        let snapshot = session.snapshot();
        let bytes = snapshot_to_bytes(&snapshot).expect("encode");
        let decoded = snapshot_from_bytes(&bytes).expect("decode");
        prop_assert_eq!(&decoded, &snapshot);

        // Same snapshot, same bytes.
        let again = snapshot_to_bytes(&snapshot).expect("encode again");
        prop_assert_eq!(bytes, again);
    }

    /// A fresh wizard cannot be lured past its first incomplete stage.
    #[test]
    fn jump_storm_cannot_skip_gating(jumps in vec(0usize..5, 0..20)) {
        let mut session = WizardSession::new();
        for jump in &jumps {
            let _ = session.go_to(SEQUENCE[*jump]);
        }

        prop_assert_eq!(session.active_stage(), Some(Stage::FundPosition));
    }
}
