pub mod attempt_service;
pub mod grading_service;
pub mod question_service;
pub mod test_service;
