use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{
    BudgetTier, DayPlan, Difficulty, GroceryCategory, Ingredient, MealKind, MealPlan, MealSlot,
    Recipe, Step,
};

/// A model payload after classification but before defaulting. Every field is
/// optional; nothing from the network is trusted.
#[derive(Debug)]
pub enum RawPayload {
    Recipe(PartialRecipe),
    MealPlan(PartialMealPlan),
    Unrecognized,
}

/// A fully defaulted domain object ready for the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredPayload {
    Recipe(Recipe),
    MealPlan(MealPlan),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialRecipe {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub calories: Option<String>,
    pub time: Option<String>,
    pub difficulty: Option<String>,
    pub budget: Option<String>,
    pub emoji: Option<String>,
    pub tags: Option<Vec<String>>,
    pub ingredients: Option<Vec<PartialIngredient>>,
    pub steps: Option<Vec<PartialStep>>,
}

// Completion flags are intentionally not read: they are always forced false.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialIngredient {
    pub item: Option<String>,
    pub amount: Option<String>,
    pub substitution: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialStep {
    pub instruction: Option<String>,
    pub tip: Option<String>,
    pub timer_seconds: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialMealPlan {
    pub id: Option<String>,
    pub title: Option<String>,
    pub personalisation_proof: Option<String>,
    pub total_budget_estimate: Option<String>,
    pub is_fallback: Option<bool>,
    pub grocery_list: Option<Vec<PartialGroceryCategory>>,
    pub cooking_sequence: Option<Vec<String>>,
    pub days: Option<Vec<PartialDayPlan>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialGroceryCategory {
    pub category: Option<String>,
    pub items: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialDayPlan {
    pub day: Option<u32>,
    pub slots: Option<Vec<PartialMealSlot>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialMealSlot {
    pub meal: Option<String>,
    pub recipe: Option<PartialRecipe>,
}

/// Decide what an untyped payload represents: a `days` array or an explicit
/// plan tag means meal plan, a `steps` field or recipe tag means recipe,
/// anything else carries no structured payload.
pub fn classify(value: Value) -> RawPayload {
    let (is_plan, is_recipe) = match value.as_object() {
        Some(obj) => {
            let tag = obj.get("type").and_then(Value::as_str);
            (
                tag == Some("meal_plan") || obj.get("days").is_some_and(Value::is_array),
                tag == Some("recipe") || obj.contains_key("steps"),
            )
        }
        None => return RawPayload::Unrecognized,
    };

    // A shape mismatch inside the payload degrades to an empty partial rather
    // than an error; a malformed turn still yields a minimally valid object.
    if is_plan {
        RawPayload::MealPlan(serde_json::from_value(value).unwrap_or_default())
    } else if is_recipe {
        RawPayload::Recipe(serde_json::from_value(value).unwrap_or_default())
    } else {
        RawPayload::Unrecognized
    }
}

/// Classify and fully default in one step. `None` means "plain conversational
/// reply, no structured payload".
pub fn normalize(value: Value) -> Option<StructuredPayload> {
    match classify(value) {
        RawPayload::Recipe(partial) => Some(StructuredPayload::Recipe(normalize_recipe(partial))),
        RawPayload::MealPlan(partial) => {
            Some(StructuredPayload::MealPlan(normalize_meal_plan(partial)))
        }
        RawPayload::Unrecognized => None,
    }
}

pub fn normalize_recipe(partial: PartialRecipe) -> Recipe {
    Recipe {
        id: partial.id.unwrap_or_else(fresh_id),
        title: partial.title.unwrap_or_default(),
        description: partial.description.unwrap_or_default(),
        calories: partial.calories,
        time: partial.time.unwrap_or_default(),
        difficulty: parse_difficulty(partial.difficulty.as_deref()),
        ingredients: partial
            .ingredients
            .unwrap_or_default()
            .into_iter()
            .map(|i| Ingredient {
                item: i.item.unwrap_or_default(),
                amount: i.amount.unwrap_or_default(),
                is_done: false,
                substitution: i.substitution,
            })
            .collect(),
        steps: partial
            .steps
            .unwrap_or_default()
            .into_iter()
            .map(|s| Step {
                instruction: s.instruction.unwrap_or_default(),
                tip: s.tip,
                timer_seconds: s.timer_seconds,
                is_completed: false,
            })
            .collect(),
        tags: partial.tags.unwrap_or_default(),
        emoji: partial.emoji.unwrap_or_else(|| "🍽️".to_string()),
        budget: parse_budget(partial.budget.as_deref()),
    }
}

pub fn normalize_meal_plan(partial: PartialMealPlan) -> MealPlan {
    let days = partial
        .days
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, day)| DayPlan {
            day: day.day.unwrap_or(index as u32 + 1),
            slots: day
                .slots
                .unwrap_or_default()
                .into_iter()
                .map(|slot| MealSlot {
                    meal: parse_meal(slot.meal.as_deref()),
                    recipe: normalize_recipe(slot.recipe.unwrap_or_default()),
                })
                .collect(),
            schedule_override: None,
        })
        .collect();

    MealPlan {
        id: partial.id.unwrap_or_else(fresh_id),
        title: partial.title.unwrap_or_default(),
        personalisation_proof: partial.personalisation_proof.unwrap_or_default(),
        days,
        total_budget_estimate: partial
            .total_budget_estimate
            .unwrap_or_else(|| "Calculated at market rates".to_string()),
        grocery_list: partial
            .grocery_list
            .unwrap_or_default()
            .into_iter()
            .map(|g| GroceryCategory {
                category: g.category.unwrap_or_default(),
                items: g.items.unwrap_or_default(),
            })
            .collect(),
        cooking_sequence: partial.cooking_sequence.unwrap_or_default(),
        is_fallback: partial.is_fallback.unwrap_or(false),
    }
}

fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

fn parse_difficulty(label: Option<&str>) -> Difficulty {
    match label.map(str::to_lowercase).as_deref() {
        Some("easy") => Difficulty::Easy,
        Some("hard") => Difficulty::Hard,
        _ => Difficulty::Medium,
    }
}

fn parse_budget(label: Option<&str>) -> Option<BudgetTier> {
    match label.map(str::to_lowercase).as_deref() {
        Some("low") => Some(BudgetTier::Low),
        Some("medium") => Some(BudgetTier::Medium),
        Some("high") => Some(BudgetTier::High),
        _ => None,
    }
}

fn parse_meal(label: Option<&str>) -> MealKind {
    match label.map(str::to_lowercase).as_deref() {
        Some("breakfast") => MealKind::Breakfast,
        Some("lunch") => MealKind::Lunch,
        _ => MealKind::Dinner,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn recipe_without_ingredients_gets_empty_sequence() {
        let value = json!({
            "type": "recipe",
            "steps": [{"instruction": "x", "isCompleted": true}]
        });

        let Some(StructuredPayload::Recipe(recipe)) = normalize(value) else {
            panic!("expected recipe");
        };
        assert_eq!(recipe.ingredients, vec![]);
        assert_eq!(recipe.steps[0].instruction, "x");
        assert!(!recipe.steps[0].is_completed); // model state never trusted
        assert!(!recipe.id.is_empty());
        assert_eq!(recipe.tags, Vec::<String>::new());
    }

    #[test]
    fn steps_field_alone_classifies_as_recipe() {
        let value = json!({"steps": []});
        assert!(matches!(
            normalize(value),
            Some(StructuredPayload::Recipe(_))
        ));
    }

    #[test]
    fn days_array_alone_classifies_as_meal_plan() {
        let Some(StructuredPayload::MealPlan(plan)) = normalize(json!({"days": []})) else {
            panic!("expected meal plan");
        };
        assert!(!plan.id.is_empty());
        assert_eq!(plan.grocery_list, vec![]);
        assert_eq!(plan.cooking_sequence, Vec::<String>::new());
        assert_eq!(plan.total_budget_estimate, "Calculated at market rates");
        assert!(!plan.is_fallback);
    }

    #[test]
    fn explicit_type_tags_win_without_shape_hints() {
        assert!(matches!(
            normalize(json!({"type": "meal_plan"})),
            Some(StructuredPayload::MealPlan(_))
        ));
        assert!(matches!(
            normalize(json!({"type": "recipe"})),
            Some(StructuredPayload::Recipe(_))
        ));
    }

    #[test]
    fn unrecognized_shapes_yield_none() {
        assert_eq!(normalize(json!({})), None);
        assert_eq!(normalize(json!({"hello": "world"})), None);
        assert_eq!(normalize(json!(42)), None);
        assert_eq!(normalize(json!(["days"])), None);
        // `days` that is not an array is not a plan hint
        assert_eq!(normalize(json!({"days": "three"})), None);
    }

    #[test]
    fn tagged_plan_with_malformed_days_degrades_to_empty_plan() {
        let Some(StructuredPayload::MealPlan(plan)) =
            normalize(json!({"type": "meal_plan", "days": "three"}))
        else {
            panic!("expected meal plan");
        };
        assert_eq!(plan.days, vec![]);
    }

    #[test]
    fn nested_plan_recipes_are_normalized_too() {
        let value = json!({
            "type": "meal_plan",
            "days": [{
                "slots": [{
                    "meal": "breakfast",
                    "recipe": {
                        "title": "Masala Oats",
                        "ingredients": [{"item": "Oats", "amount": "1 cup", "isDone": true}],
                        "steps": [{"instruction": "Boil", "isCompleted": true}]
                    }
                }, {
                    "meal": "brunch"
                }]
            }]
        });

        let Some(StructuredPayload::MealPlan(plan)) = normalize(value) else {
            panic!("expected meal plan");
        };
        let day = &plan.days[0];
        assert_eq!(day.day, 1); // missing day index defaults to position
        assert_eq!(day.slots[0].meal, MealKind::Breakfast);
        assert!(!day.slots[0].recipe.ingredients[0].is_done);
        assert!(!day.slots[0].recipe.steps[0].is_completed);
        // unknown meal label and missing recipe still produce a valid slot
        assert_eq!(day.slots[1].meal, MealKind::Dinner);
        assert_eq!(day.slots[1].recipe.ingredients, vec![]);
    }

    #[test]
    fn difficulty_and_budget_labels_are_lenient() {
        assert_eq!(parse_difficulty(Some("hard")), Difficulty::Hard);
        assert_eq!(parse_difficulty(Some("EASY")), Difficulty::Easy);
        assert_eq!(parse_difficulty(Some("extreme")), Difficulty::Medium);
        assert_eq!(parse_difficulty(None), Difficulty::Medium);

        assert_eq!(parse_budget(Some("Low")), Some(BudgetTier::Low));
        assert_eq!(parse_budget(Some("luxury")), None);
        assert_eq!(parse_budget(None), None);
    }

    #[test]
    fn missing_substitution_is_tolerated() {
        let value = json!({
            "type": "recipe",
            "ingredients": [{"item": "Oats", "amount": "1 cup"}],
            "steps": []
        });

        let Some(StructuredPayload::Recipe(recipe)) = normalize(value) else {
            panic!("expected recipe");
        };
        assert_eq!(recipe.ingredients[0].substitution, None);
    }

    #[test]
    fn model_supplied_ids_are_preserved() {
        let value = json!({"type": "recipe", "id": "unique_id_1", "steps": []});
        let Some(StructuredPayload::Recipe(recipe)) = normalize(value) else {
            panic!("expected recipe");
        };
        assert_eq!(recipe.id, "unique_id_1");
    }
}
