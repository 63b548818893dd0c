pub mod catalog;
pub mod db;
pub mod history;
pub mod matcher;
pub mod models;
pub mod preferences;
pub mod ranker;
pub mod service;
pub mod undo;
pub mod validation;
