//! Parsing and validation of model-generated multiple-choice questions

use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::study::{Mcq, MCQ_OPTION_COUNT};

use super::prompt::strip_think;

/// Parse raw model output into at most `limit` validated questions.
///
/// Output that holds no JSON array is `UnparseableOutput`; an array whose
/// items do not match the question shape is `InvalidOutput`.
pub fn parse_mcqs(raw: &str, limit: usize) -> Result<Vec<Mcq>> {
    let value = extract_json_array(raw)?;
    let Value::Array(items) = value else {
        return Err(Error::UnparseableOutput("expected a JSON array".to_string()));
    };
    if items.is_empty() {
        return Err(Error::InvalidOutput("model returned no questions".to_string()));
    }

    let mut questions = items
        .iter()
        .enumerate()
        .map(|(i, item)| validate_item(i, item))
        .collect::<Result<Vec<_>>>()?;

    if questions.len() > limit {
        tracing::debug!("Model returned {} questions, keeping {}", questions.len(), limit);
        questions.truncate(limit);
    }
    Ok(questions)
}

/// Locate and parse the outermost `[ ... ]` in model output
fn extract_json_array(raw: &str) -> Result<Value> {
    let text = strip_think(raw);
    let text = strip_code_fences(&text);

    let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) else {
        return Err(Error::UnparseableOutput("no JSON array in model output".to_string()));
    };
    if end < start {
        return Err(Error::UnparseableOutput("no JSON array in model output".to_string()));
    }

    serde_json::from_str(&text[start..=end])
        .map_err(|e| Error::UnparseableOutput(format!("invalid JSON: {}", e)))
}

fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn validate_item(index: usize, item: &Value) -> Result<Mcq> {
    let invalid = |what: &str| Error::InvalidOutput(format!("question {}: {}", index + 1, what));

    let object = item.as_object().ok_or_else(|| invalid("not an object"))?;

    let question = object
        .get("question")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| invalid("missing or empty \"question\""))?;

    let options = object
        .get("options")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("missing \"options\" array"))?;
    if options.len() != MCQ_OPTION_COUNT {
        return Err(invalid(&format!(
            "expected {} options, got {}",
            MCQ_OPTION_COUNT,
            options.len()
        )));
    }
    let options = options
        .iter()
        .map(|o| o.as_str().map(|s| s.trim().to_string()))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| invalid("options must be strings"))?;

    let correct_answer = object
        .get("correct_answer")
        .and_then(Value::as_u64)
        .ok_or_else(|| invalid("\"correct_answer\" must be a non-negative integer"))? as usize;
    if correct_answer >= MCQ_OPTION_COUNT {
        return Err(invalid(&format!(
            "\"correct_answer\" {} is out of range 0..{}",
            correct_answer, MCQ_OPTION_COUNT
        )));
    }

    let explanation = object
        .get("explanation")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing \"explanation\""))?;

    Ok(Mcq {
        question: question.to_string(),
        options,
        correct_answer,
        explanation: explanation.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(correct: i64) -> String {
        format!(
            r#"{{"question": "What is a tensor?", "options": ["a", "b", "c", "d"], "correct_answer": {}, "explanation": "because"}}"#,
            correct
        )
    }

    fn array(n: usize) -> String {
        format!("[{}]", vec![item(1); n].join(","))
    }

    #[test]
    fn test_parses_fenced_output_with_think_block() {
        let raw = format!("<think>planning...</think>\nHere you go:\n```json\n{}\n```", array(5));
        let questions = parse_mcqs(&raw, 5).unwrap();
        assert_eq!(questions.len(), 5);
        assert_eq!(questions[0].options.len(), 4);
        assert_eq!(questions[0].correct_answer, 1);
    }

    #[test]
    fn test_truncates_over_generation() {
        assert_eq!(parse_mcqs(&array(8), 5).unwrap().len(), 5);
    }

    #[test]
    fn test_keeps_under_generation() {
        assert_eq!(parse_mcqs(&array(3), 5).unwrap().len(), 3);
    }

    #[test]
    fn test_no_array_is_unparseable() {
        let err = parse_mcqs("Sorry, I cannot help with that.", 5).unwrap_err();
        assert!(matches!(err, Error::UnparseableOutput(_)));
        let err = parse_mcqs("[not json at all]", 5).unwrap_err();
        assert!(matches!(err, Error::UnparseableOutput(_)));
    }

    #[test]
    fn test_out_of_range_answer_is_invalid() {
        let err = parse_mcqs(&format!("[{}]", item(4)), 5).unwrap_err();
        assert!(matches!(err, Error::InvalidOutput(_)));
        let err = parse_mcqs(&format!("[{}]", item(-1)), 5).unwrap_err();
        assert!(matches!(err, Error::InvalidOutput(_)));
    }

    #[test]
    fn test_wrong_option_count_is_invalid() {
        let raw = r#"[{"question": "Q", "options": ["a", "b", "c"], "correct_answer": 0, "explanation": "e"}]"#;
        assert!(matches!(parse_mcqs(raw, 5).unwrap_err(), Error::InvalidOutput(_)));
    }

    #[test]
    fn test_missing_field_is_invalid() {
        let raw = r#"[{"question": "Q", "options": ["a", "b", "c", "d"], "correct_answer": 0}]"#;
        assert!(matches!(parse_mcqs(raw, 5).unwrap_err(), Error::InvalidOutput(_)));
    }

    #[test]
    fn test_empty_array_is_invalid() {
        assert!(matches!(parse_mcqs("[]", 5).unwrap_err(), Error::InvalidOutput(_)));
    }
}
