use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Model,
}

/// One turn of conversation. Immutable once appended; the whole history is
/// reset wholesale on logout.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: UserRole,
    pub text: String,
    pub image: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub recipe_data: Option<Recipe>,
    pub meal_plan_data: Option<MealPlan>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub item: String,
    pub amount: String,
    /// Cooking-mode checkbox state. Never trusted from model output.
    #[serde(default)]
    pub is_done: bool,
    pub substitution: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub instruction: String,
    pub tip: Option<String>,
    pub timer_seconds: Option<u32>,
    #[serde(default)]
    pub is_completed: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum BudgetTier {
    Low,
    Medium,
    High,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    pub title: String,
    pub description: String,
    pub calories: Option<String>,
    pub time: String,
    pub difficulty: Difficulty,
    pub ingredients: Vec<Ingredient>,
    pub steps: Vec<Step>,
    pub tags: Vec<String>,
    pub emoji: String,
    pub budget: Option<BudgetTier>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum MealKind {
    Breakfast,
    Lunch,
    Dinner,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MealSlot {
    pub meal: MealKind,
    pub recipe: Recipe,
}

/// Per-day mutable annotation, applied client-side on a cloned plan.
/// Never sent back to the model.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOverride {
    pub is_skipped: bool,
    pub custom_time: Option<String>, // e.g. "20:00"
    pub rescue_note: Option<String>, // tip for perishables on a skipped day
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DayPlan {
    pub day: u32,
    pub slots: Vec<MealSlot>,
    pub schedule_override: Option<ScheduleOverride>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroceryCategory {
    pub category: String,
    pub items: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MealPlan {
    pub id: String,
    pub title: String,
    pub personalisation_proof: String,
    pub days: Vec<DayPlan>,
    pub total_budget_estimate: String,
    pub grocery_list: Vec<GroceryCategory>,
    pub cooking_sequence: Vec<String>,
    pub is_fallback: bool,
}

impl MealPlan {
    /// Set a custom cooking time for one day. Callers clone the plan first so
    /// the cached original stays untouched.
    pub fn set_day_time(&mut self, day_index: usize, time: &str) {
        if let Some(day) = self.days.get_mut(day_index) {
            day.schedule_override
                .get_or_insert_with(ScheduleOverride::default)
                .custom_time = Some(time.to_string());
        }
    }

    /// Toggle a day's skipped flag. Skipping generates a rescue note for the
    /// day's perishables; un-skipping clears it. Custom time is preserved.
    pub fn toggle_day_skip(&mut self, day_index: usize) {
        let Some(day) = self.days.get_mut(day_index) else {
            return;
        };
        let skipped = !day
            .schedule_override
            .as_ref()
            .is_some_and(|o| o.is_skipped);

        let rescue_note = if skipped {
            let perishables = day
                .slots
                .first()
                .map(|slot| {
                    slot.recipe
                        .ingredients
                        .iter()
                        .take(3)
                        .map(|i| i.item.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| "fresh produce".to_string());
            Some(format!(
                "Freeze: {}. Use remaining veggies in Day {} salad.",
                perishables,
                day_index + 2
            ))
        } else {
            None
        };

        let prev = day.schedule_override.take().unwrap_or_default();
        day.schedule_override = Some(ScheduleOverride {
            is_skipped: skipped,
            rescue_note,
            ..prev
        });
    }
}

/// Merge a freshly generated recipe into the user's saved collection,
/// deduplicated by identity, newest first.
pub fn merge_recipe(collection: &mut Vec<Recipe>, recipe: Recipe) {
    if collection.iter().any(|r| r.id == recipe.id) {
        return;
    }
    collection.insert(0, recipe);
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Diet {
    Omnivore,
    Vegetarian,
    Vegan,
    Pescatarian,
    Keto,
    Paleo,
    Mediterranean,
    #[serde(rename = "Gluten-Free")]
    GlutenFree,
    #[serde(rename = "Low-Carb")]
    LowCarb,
    Balanced,
}

impl fmt::Display for Diet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Diet::Omnivore => "Omnivore",
            Diet::Vegetarian => "Vegetarian",
            Diet::Vegan => "Vegan",
            Diet::Pescatarian => "Pescatarian",
            Diet::Keto => "Keto",
            Diet::Paleo => "Paleo",
            Diet::Mediterranean => "Mediterranean",
            Diet::GlutenFree => "Gluten-Free",
            Diet::LowCarb => "Low-Carb",
            Diet::Balanced => "Balanced",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum CityType {
    Metro,
    Town,
    Village,
}

impl fmt::Display for CityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CityType::Metro => "Metro",
            CityType::Town => "Town",
            CityType::Village => "Village",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ShoppingFrequency {
    Daily,
    #[serde(rename = "Every 2 Days")]
    EveryTwoDays,
    Weekly,
}

/// Supplied by the onboarding flow; read-only input to the generation core.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub diet: Diet,
    pub allergies: Vec<String>,
    pub budget: String, // e.g. "₹500"
    pub city_type: CityType,
    pub kitchen_setup: Vec<String>, // e.g., ["Stove", "Mixer"]
    pub cooking_time_per_meal: String, // e.g., "30 mins"
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub cooking_slot: String, // e.g., "19:00" (24h format)
    pub shopping_frequency: ShoppingFrequency,
    pub reminder_enabled: bool,
}

/// Per-turn output consumed by the chat renderer: prose plus an optional
/// interactive card.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub text: String,
    pub recipe: Option<Recipe>,
    pub meal_plan: Option<MealPlan>,
}
