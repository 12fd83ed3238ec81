pub mod prefs;
pub mod tasks;
