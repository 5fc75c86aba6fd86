//! Questionnaire synthesis from raw field names

use crate::error::PipelineError;
use crate::prompts::{questionnaire_prompt, SYNTHESIS_MAX_TOKENS};
use crate::response::parse_reply;
use crate::services::{CompletionRequest, TextCompletion};
use crate::types::{FieldPosition, InputKind, NewField, Question, RawField};

/// A questionnaire step ready to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedField {
    pub field_name: String,
    pub question: String,
    pub helper: String,
    pub input_type: InputKind,
    pub dropdown_options: Vec<String>,
    /// 1-based, contiguous across the questionnaire
    pub step_number: u32,
    pub position: Option<FieldPosition>,
}

impl PlannedField {
    pub fn to_new_field(&self, session_id: &str) -> NewField {
        NewField {
            session_id: session_id.to_string(),
            field_name: self.field_name.clone(),
            question: self.question.clone(),
            helper: self.helper.clone(),
            input_type: self.input_type,
            dropdown_options: self.dropdown_options.clone(),
            step_number: self.step_number,
            page_number: self.position.map(|p| p.page),
            x_position: self.position.map(|p| p.x),
            y_position: self.position.map(|p| p.y),
        }
    }
}

/// Pair model questions with the raw fields they were generated from.
///
/// Pairing is positional. The raw field name is kept as the fill key and
/// step ordinals are reassigned as 1..=N regardless of what the model sent.
pub fn pair_questions(
    fields: &[RawField],
    questions: Vec<Question>,
) -> Result<Vec<PlannedField>, PipelineError> {
    if questions.len() != fields.len() {
        return Err(PipelineError::Synthesis(format!(
            "expected {} questions, model returned {}",
            fields.len(),
            questions.len()
        )));
    }

    let planned = fields
        .iter()
        .zip(questions)
        .enumerate()
        .map(|(index, (raw, q))| {
            if q.field_name != raw.name {
                tracing::debug!(
                    "Model renamed field {:?} to {:?}; keeping the original",
                    raw.name,
                    q.field_name
                );
            }
            let options: Vec<String> = q
                .dropdown_options
                .unwrap_or_default()
                .into_iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
            // A dropdown with nothing to choose from is asked as free text
            let (input_type, dropdown_options) = match q.input_type {
                InputKind::Dropdown if options.is_empty() => (InputKind::Text, Vec::new()),
                InputKind::Dropdown => (InputKind::Dropdown, options),
                other => (other, Vec::new()),
            };
            PlannedField {
                field_name: raw.name.clone(),
                question: q.question.trim().to_string(),
                helper: q.helper.trim().to_string(),
                input_type,
                dropdown_options,
                step_number: index as u32 + 1,
                position: raw.position,
            }
        })
        .collect();

    Ok(planned)
}

/// Ask the model for one question per field.
///
/// An unparseable or mis-sized reply fails the whole upload.
pub async fn synthesize_questions(
    llm: &dyn TextCompletion,
    jurisdiction: &str,
    fields: &[RawField],
) -> Result<Vec<PlannedField>, PipelineError> {
    if fields.is_empty() {
        return Ok(Vec::new());
    }

    let names: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
    let request = CompletionRequest {
        prompt: questionnaire_prompt(jurisdiction, &names),
        max_tokens: SYNTHESIS_MAX_TOKENS,
        document: None,
    };

    let reply = llm.complete(&request).await?;
    let questions: Vec<Question> = parse_reply(&reply).map_err(|e| {
        tracing::error!("Unparseable questionnaire reply: {}", e);
        PipelineError::Synthesis(format!("Failed to parse AI response: {}", e))
    })?;

    let planned = pair_questions(fields, questions)?;
    tracing::info!("Synthesized {} questions", planned.len());
    Ok(planned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn question(name: &str, kind: InputKind, options: Option<Vec<&str>>, step: u32) -> Question {
        Question {
            field_name: name.to_string(),
            question: format!("What is the {}?", name),
            helper: " Required by the municipality. ".to_string(),
            input_type: kind,
            dropdown_options: options.map(|o| o.into_iter().map(String::from).collect()),
            step_number: Some(step),
        }
    }

    #[test]
    fn test_steps_are_renumbered_contiguously() {
        let fields = vec![RawField::named("a"), RawField::named("b"), RawField::named("c")];
        let questions = vec![
            question("a", InputKind::Text, None, 7),
            question("b", InputKind::Date, None, 7),
            question("c", InputKind::Number, None, 2),
        ];
        let planned = pair_questions(&fields, questions).unwrap();
        let steps: Vec<u32> = planned.iter().map(|p| p.step_number).collect();
        assert_eq!(steps, vec![1, 2, 3]);
        assert_eq!(planned[0].helper, "Required by the municipality.");
    }

    #[test]
    fn test_positions_follow_raw_fields() {
        let position = FieldPosition {
            page: 1,
            x: 20.0,
            y: 45.0,
        };
        let fields = vec![RawField {
            name: "Lot".into(),
            field_type: None,
            position: Some(position),
        }];
        let planned =
            pair_questions(&fields, vec![question("Lot number", InputKind::Text, None, 1)])
                .unwrap();
        assert_eq!(planned[0].position, Some(position));
        assert_eq!(planned[0].field_name, "Lot");

        let row = planned[0].to_new_field("s1");
        assert_eq!(row.page_number, Some(1));
        assert_eq!(row.x_position, Some(20.0));
        assert_eq!(row.y_position, Some(45.0));
    }

    #[test]
    fn test_choices_only_kept_for_dropdowns() {
        let fields = vec![RawField::named("type"), RawField::named("name"), RawField::named("zone")];
        let questions = vec![
            question("type", InputKind::Dropdown, Some(vec!["Deck", " ", "Shed"]), 1),
            question("name", InputKind::Text, Some(vec!["ignored"]), 2),
            question("zone", InputKind::Dropdown, Some(vec![]), 3),
        ];
        let planned = pair_questions(&fields, questions).unwrap();
        assert_eq!(planned[0].dropdown_options, vec!["Deck", "Shed"]);
        assert!(planned[1].dropdown_options.is_empty());
        assert_eq!(planned[2].input_type, InputKind::Text);
    }

    #[test]
    fn test_count_mismatch_is_synthesis_error() {
        let fields = vec![RawField::named("a"), RawField::named("b")];
        let err =
            pair_questions(&fields, vec![question("a", InputKind::Text, None, 1)]).unwrap_err();
        assert!(matches!(err, PipelineError::Synthesis(_)));
    }
}
