use crate::error::{Error, Result};
use crate::models::question::QuestionContent;

/// Content rules shared by question creation and every new version.
pub fn validate_question_content(content: &QuestionContent) -> Result<()> {
    if content.title.trim().is_empty() {
        return Err(Error::Validation("title must not be empty".to_string()));
    }
    if content.options.is_empty() {
        return Err(Error::Validation("at least one option is required".to_string()));
    }
    if let Some(idx) = content.options.iter().position(|o| o.trim().is_empty()) {
        return Err(Error::Validation(format!("option {} is blank", idx)));
    }
    validate_option_index(content.correct_option, content.options.len())
        .map_err(|_| {
            Error::Validation(format!(
                "correct option {} is out of range for {} options",
                content.correct_option,
                content.options.len()
            ))
        })
}

/// Checks `index` addresses one of `option_count` options.
pub fn validate_option_index(index: i32, option_count: usize) -> Result<()> {
    let in_range = usize::try_from(index)
        .map(|i| i < option_count)
        .unwrap_or(false);
    if !in_range {
        return Err(Error::Validation(format!(
            "option {} is out of range 0..{}",
            index, option_count
        )));
    }
    Ok(())
}

pub fn validate_test_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Validation("test name must not be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(options: &[&str], correct: i32) -> QuestionContent {
        QuestionContent {
            title: "Capitals".into(),
            body: "Capital of France?".into(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_option: correct,
        }
    }

    #[test]
    fn accepts_well_formed_question() {
        assert!(validate_question_content(&content(&["Paris", "Lyon"], 1)).is_ok());
    }

    #[test]
    fn rejects_empty_options() {
        let err = validate_question_content(&content(&[], 0)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn rejects_correct_index_out_of_bounds() {
        assert!(validate_question_content(&content(&["A", "B"], 2)).is_err());
        assert!(validate_question_content(&content(&["A", "B"], -1)).is_err());
    }

    #[test]
    fn rejects_blank_title_and_blank_option() {
        let mut c = content(&["A", "B"], 0);
        c.title = "  ".into();
        assert!(validate_question_content(&c).is_err());
        assert!(validate_question_content(&content(&["A", " "], 0)).is_err());
    }

    #[test]
    fn option_index_bounds() {
        assert!(validate_option_index(0, 1).is_ok());
        assert!(validate_option_index(3, 4).is_ok());
        assert!(validate_option_index(4, 4).is_err());
        assert!(validate_option_index(-1, 4).is_err());
        assert!(validate_option_index(0, 0).is_err());
    }

    #[test]
    fn test_name_must_not_be_blank() {
        assert!(validate_test_name("Midterm").is_ok());
        assert!(validate_test_name("").is_err());
    }
}
