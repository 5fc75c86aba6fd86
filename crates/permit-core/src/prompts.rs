//! Prompts sent to the language model.
//!
//! Every prompt asks for bare JSON; [`crate::response`] tolerates the
//! occasional code fence anyway.

/// Token budget for the visual field-inference call
pub const OCR_MAX_TOKENS: u32 = 2000;

/// Token budget for questionnaire synthesis
pub const SYNTHESIS_MAX_TOKENS: u32 = 4000;

/// Token budget for title/locality detection
pub const METADATA_MAX_TOKENS: u32 = 200;

/// Number of field names shown to the metadata prompt
pub const METADATA_FIELD_SAMPLE: usize = 10;

/// Ask the model to locate fillable areas on a flat (non-form) document.
pub fn field_inference_prompt(jurisdiction: &str) -> String {
    format!(
        r#"This is a {jurisdiction} permit document. Identify all fields that need to be filled in.
Return a JSON array only, no other text. Each item:
{{"field_name": "raw field name", "field_type": "text|date|number|dropdown", "x": 0, "y": 0, "page": 1}}
Use x/y as approximate percentage positions (0-100) on the page. Pages are numbered from 1."#
    )
}

/// Ask the model to turn raw field names into a questionnaire.
pub fn questionnaire_prompt(jurisdiction: &str, field_names: &[String]) -> String {
    let names = serde_json::to_string(field_names).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"You are processing a {jurisdiction} permit document.
Here are the raw field names extracted from the permit: {names}

For each field, return a JSON array with exactly one object per field, in the same order. Each object must have:
- field_name: the original field name exactly
- question: plain-language question to ask a {jurisdiction} resident (e.g. "What is the civic address of the property?")
- helper: 1-2 sentence explanation of what this field means and why it is required, written for the {jurisdiction} context. Use local spelling.
- input_type: one of "text", "date", "number", "dropdown"
- dropdown_options: array of strings if input_type is dropdown, otherwise null
- step_number: integer starting at 1

Return ONLY a valid JSON array, no markdown, no explanation."#
    )
}

/// Ask the model for the document title and issuing locality.
pub fn metadata_prompt(jurisdiction: &str, field_names: &[String]) -> String {
    let sample = &field_names[..field_names.len().min(METADATA_FIELD_SAMPLE)];
    let names = serde_json::to_string(sample).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"This is a {jurisdiction} permit. Based on these field names: {names}
Return JSON only: {{"permit_name": "...", "municipality": "..."}}
If you cannot determine, use "{jurisdiction} Permit" and "Unknown" respectively."#
    )
}
