//! Property tests for questionnaire pairing, answer progress and fill planning

use permit_core::pipeline::fill::plan_fill;
use permit_core::pipeline::progress::advance;
use permit_core::pipeline::synthesis::pair_questions;
use permit_core::{InputKind, PermitField, Question, RawField, SessionStatus};
use proptest::prelude::*;

fn question(name: &str, step: Option<u32>) -> Question {
    Question {
        field_name: name.to_string(),
        question: format!("What is the {}?", name),
        helper: String::new(),
        input_type: InputKind::Text,
        dropdown_options: None,
        step_number: step,
    }
}

fn field_strategy() -> impl Strategy<Value = PermitField> {
    (
        "[A-Za-z ]{1,12}",
        proptest::option::of("[A-Za-z0-9 ]{0,8}"),
        proptest::option::of((1u32..5, 0.0f64..100.0, 0.0f64..100.0)),
        1u32..50,
    )
        .prop_map(|(name, answer, position, step)| PermitField {
            id: format!("f-{}", step),
            session_id: "s-1".to_string(),
            field_name: name,
            question: String::new(),
            helper: String::new(),
            input_type: InputKind::Text,
            dropdown_options: Vec::new(),
            step_number: step,
            answer,
            page_number: position.map(|(page, _, _)| page),
            x_position: position.map(|(_, x, _)| x),
            y_position: position.map(|(_, _, y)| y),
        })
}

proptest! {
    /// Whatever ordinals the model sends, steps come out as 1..=N in field order
    #[test]
    fn paired_steps_are_contiguous(
        names in proptest::collection::vec("[A-Za-z_]{1,10}", 0..30),
        model_steps in proptest::collection::vec(proptest::option::of(0u32..100), 30),
    ) {
        let fields: Vec<RawField> = names.iter().map(|n| RawField::named(n.as_str())).collect();
        let questions: Vec<Question> = names
            .iter()
            .zip(&model_steps)
            .map(|(n, step)| question(n, *step))
            .collect();

        let planned = pair_questions(&fields, questions).unwrap();

        let steps: Vec<u32> = planned.iter().map(|p| p.step_number).collect();
        let expected: Vec<u32> = (1..=names.len() as u32).collect();
        prop_assert_eq!(steps, expected);
        for (plan, raw) in planned.iter().zip(&fields) {
            prop_assert_eq!(&plan.field_name, &raw.name);
        }
    }

    /// A question count that differs from the field count is rejected
    #[test]
    fn mismatched_question_count_is_rejected(fields in 1usize..20, missing in 1usize..5) {
        let raw: Vec<RawField> = (0..fields).map(|i| RawField::named(format!("f{}", i))).collect();
        let questions: Vec<Question> = (0..fields.saturating_sub(missing))
            .map(|i| question(&format!("f{}", i), None))
            .collect();
        prop_assert!(pair_questions(&raw, questions).is_err());
    }

    /// Status is completed exactly when the cursor moves past the last step
    /// or the session was already exported
    #[test]
    fn progress_completes_only_past_last_step(
        total in 1u32..200,
        step in 1u32..200,
        exported in any::<bool>(),
    ) {
        let progress = advance(step, total, exported);
        prop_assert_eq!(progress.current_step, step + 1);
        if exported || step >= total {
            prop_assert_eq!(progress.status, SessionStatus::Completed);
        } else {
            prop_assert_eq!(progress.status, SessionStatus::InProgress);
        }
    }

    /// Every non-blank answer is routed to exactly one strategy
    #[test]
    fn fill_plan_partitions_answers(fields in proptest::collection::vec(field_strategy(), 0..25)) {
        let plan = plan_fill(&fields);

        let answered: Vec<&PermitField> = fields
            .iter()
            .filter(|f| f.answer.as_deref().is_some_and(|a| !a.trim().is_empty()))
            .collect();
        let positioned = answered.iter().filter(|f| f.position().is_some()).count();

        prop_assert_eq!(plan.named.len() + plan.overlays.len(), answered.len());
        prop_assert_eq!(plan.overlays.len(), positioned);
        for overlay in &plan.overlays {
            prop_assert!((0.0..=100.0).contains(&overlay.x));
            prop_assert!((0.0..=100.0).contains(&overlay.y));
            prop_assert_eq!(overlay.size, 10);
        }
    }
}
