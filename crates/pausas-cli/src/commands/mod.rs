pub mod config;
pub mod exercises;
pub mod history;
pub mod run;
pub mod timer;
