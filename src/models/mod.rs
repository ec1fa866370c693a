pub mod answer;
pub mod attempt;
pub mod identity;
pub mod question;
