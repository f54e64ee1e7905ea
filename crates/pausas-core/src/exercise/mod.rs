//! Exercises shown during a break.

mod catalog;
mod rotation;

pub use catalog::{Catalog, Difficulty, Exercise, ExerciseCategory};
pub use rotation::{
    recent_exercises_key, ExerciseRotation, DEFAULT_BREAK_EXERCISES, RECENT_WINDOW,
};
