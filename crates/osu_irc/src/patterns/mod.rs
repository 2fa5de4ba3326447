pub mod base;
pub mod lobby;
