pub mod analytics;
pub mod backup;
pub mod classes;
pub mod coach;
pub mod core;
pub mod exams;
pub mod results;
pub mod students;
