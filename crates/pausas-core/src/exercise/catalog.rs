//! Exercise catalog.
//!
//! The built-in set gives every category enough variety for the rotation to
//! avoid repeats across consecutive breaks. A custom catalog can be loaded
//! from TOML with the same shape.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, CoreError, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseCategory {
    Visual,
    NeckShoulders,
    HandsWrists,
    Back,
}

impl ExerciseCategory {
    /// Selection order for a break.
    pub const ALL: [ExerciseCategory; 4] = [
        ExerciseCategory::Visual,
        ExerciseCategory::NeckShoulders,
        ExerciseCategory::HandsWrists,
        ExerciseCategory::Back,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ExerciseCategory::Visual => "Eye health",
            ExerciseCategory::NeckShoulders => "Neck and shoulders",
            ExerciseCategory::HandsWrists => "Hands and wrists",
            ExerciseCategory::Back => "Back",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Moderate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub category: ExerciseCategory,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub total_duration_seconds: u64,
    #[serde(default)]
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub exercises: Vec<Exercise>,
}

impl Catalog {
    pub fn new(exercises: Vec<Exercise>) -> Self {
        Self { exercises }
    }

    pub fn in_category(&self, category: ExerciseCategory) -> impl Iterator<Item = &Exercise> {
        self.exercises.iter().filter(move |e| e.category == category)
    }

    pub fn find(&self, id: &str) -> Option<&Exercise> {
        self.exercises.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    /// Parse a TOML catalog (`[[exercises]]` tables).
    pub fn from_toml_str(content: &str) -> Result<Self, CoreError> {
        let catalog: Catalog = toml::from_str(content).map_err(|e| ConfigError::InvalidValue {
            key: "exercises".into(),
            message: e.to_string(),
        })?;
        if catalog.is_empty() {
            return Err(ValidationError::EmptyCollection("exercise catalog".into()).into());
        }
        Ok(catalog)
    }

    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// The catalog bundled with the app: five exercises per category.
    pub fn builtin() -> Self {
        use Difficulty::*;
        use ExerciseCategory::*;

        let entries: [(&str, ExerciseCategory, &str, &str, u64, Difficulty); 20] = [
            ("vis-20-20-20", Visual, "20-20-20 rule", "Look at something 6 m away for 20 seconds.", 20, Easy),
            ("vis-palming", Visual, "Palming", "Cup warm palms over closed eyes and breathe.", 60, Easy),
            ("vis-figure-eight", Visual, "Figure eight", "Trace a large sideways eight with your eyes.", 45, Easy),
            ("vis-near-far", Visual, "Near and far focus", "Alternate focus between your thumb and a distant point.", 60, Easy),
            ("vis-blink", Visual, "Conscious blinking", "Blink slowly and fully twenty times.", 30, Easy),
            ("neck-tilt", NeckShoulders, "Lateral neck tilt", "Bring ear toward shoulder, hold, switch sides.", 60, Easy),
            ("neck-rotation", NeckShoulders, "Neck rotation", "Turn the head slowly to look over each shoulder.", 45, Easy),
            ("shoulder-rolls", NeckShoulders, "Shoulder rolls", "Roll shoulders backwards in wide circles.", 30, Easy),
            ("chin-tuck", NeckShoulders, "Chin tuck", "Glide the chin straight back, hold five seconds.", 45, Moderate),
            ("upper-trap-stretch", NeckShoulders, "Upper trapezius stretch", "Gently pull the head diagonally forward.", 60, Moderate),
            ("wrist-flexor", HandsWrists, "Wrist flexor stretch", "Extend the arm, palm up, pull fingers back.", 45, Easy),
            ("wrist-extensor", HandsWrists, "Wrist extensor stretch", "Extend the arm, palm down, press the hand down.", 45, Easy),
            ("finger-spread", HandsWrists, "Finger spread", "Open fingers wide, then make a soft fist.", 30, Easy),
            ("wrist-circles", HandsWrists, "Wrist circles", "Rotate both wrists in slow circles each way.", 30, Easy),
            ("prayer-stretch", HandsWrists, "Prayer stretch", "Press palms together and lower them toward the waist.", 45, Moderate),
            ("seated-twist", Back, "Seated twist", "Rotate the torso holding the chair back.", 60, Easy),
            ("cat-cow-seated", Back, "Seated cat-cow", "Alternate arching and rounding the spine.", 60, Easy),
            ("standing-extension", Back, "Standing back extension", "Hands on hips, lean gently backwards.", 30, Moderate),
            ("side-bend", Back, "Side bend", "Reach one arm overhead and lean to the side.", 45, Easy),
            ("forward-fold", Back, "Seated forward fold", "Let the chest fall toward the knees and breathe.", 45, Easy),
        ];

        Self::new(
            entries
                .into_iter()
                .map(|(id, category, name, description, secs, difficulty)| Exercise {
                    id: id.to_string(),
                    category,
                    name: name.to_string(),
                    description: description.to_string(),
                    total_duration_seconds: secs,
                    difficulty,
                })
                .collect(),
        )
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn builtin_has_five_per_category_and_unique_ids() {
        let catalog = Catalog::builtin();
        for category in ExerciseCategory::ALL {
            assert_eq!(catalog.in_category(category).count(), 5, "{category:?}");
        }
        let ids: HashSet<_> = catalog.exercises.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), catalog.len());
    }

    #[test]
    fn parses_toml_catalog() {
        let content = r#"
            [[exercises]]
            id = "custom-1"
            category = "hands_wrists"
            name = "Custom"
            total_duration_seconds = 40
        "#;
        let catalog = Catalog::from_toml_str(content).unwrap();
        assert_eq!(catalog.len(), 1);
        let ex = catalog.find("custom-1").unwrap();
        assert_eq!(ex.category, ExerciseCategory::HandsWrists);
        assert_eq!(ex.difficulty, Difficulty::Easy);
    }

    #[test]
    fn rejects_empty_catalog() {
        assert!(Catalog::from_toml_str("exercises = []").is_err());
    }
}
