use clap::Subcommand;
use pausas_core::{Catalog, ExerciseCategory};

#[derive(Subcommand)]
pub enum ExercisesAction {
    /// List the exercise catalog
    List {
        /// Only this category (visual, neck_shoulders, hands_wrists, back)
        #[arg(long)]
        category: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: ExercisesAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ExercisesAction::List { category, json } => {
            let catalog = Catalog::builtin();
            let filter = category
                .map(|raw| parse_category(&raw))
                .transpose()?;
            let exercises: Vec<_> = catalog
                .exercises
                .iter()
                .filter(|e| filter.map_or(true, |c| e.category == c))
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&exercises)?);
                return Ok(());
            }
            for category in ExerciseCategory::ALL {
                let in_category: Vec<_> =
                    exercises.iter().filter(|e| e.category == category).collect();
                if in_category.is_empty() {
                    continue;
                }
                println!("{}", category.label());
                for exercise in in_category {
                    println!(
                        "  {:<24} {:>3}s  {}",
                        exercise.id, exercise.total_duration_seconds, exercise.name
                    );
                }
            }
        }
    }
    Ok(())
}

fn parse_category(raw: &str) -> Result<ExerciseCategory, String> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| format!("unknown category: {raw}"))
}
