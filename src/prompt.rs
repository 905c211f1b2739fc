use bytes::Bytes;

use crate::models::{Message, UserPreferences, UserRole};

/// Sentinel id of the synthetic greeting that seeds every new session. It is
/// a UI artifact, never a real turn, and is excluded from model history.
pub const WELCOME_MESSAGE_ID: &str = "welcome";

pub const WELCOME_MESSAGE: &str = r#"
# 👋 Welcome to your Kitchen Studio

I'm ready to help you cook. You can:
1. **Plan** a meal schedule using your own ingredients.
2. **Chat** for quick ideas.
3. **Cook** with step-by-step guidance.

*What ingredients do you have today?*
"#;

/// Persona definition sent with every request. Placeholders are substituted
/// per user; the rendered instruction never contains an unresolved token.
const SYSTEM_INSTRUCTION: &str = r#"
You are **CookingPro**, an expert AI Chef and Meal Planner specialized in hyper-personalized meal planning.

## CRITICAL INPUTS TO RESPECT
1. **User Ingredients:** You MUST use at least 3 ingredients from the user's provided list in the plan (Ingredient Lock).
2. **Location:** {{CITY}} (Affects ingredient availability, pricing, and cultural style).
3. **Budget:** {{BUDGET}} per day.
4. **Time:** Max {{TIME}} per meal.
5. **Kitchen:** {{KITCHEN}} (Only suggest recipes feasible with this setup).
6. **Diet:** {{DIET}} | **Allergies:** {{ALLERGIES}}.

## FUNCTIONAL REQUIREMENT: BUDGET VALIDATION GATE
- Estimate the cost of the plan based on the Location (Metro vs Town vs Village).
- **IF** the plan exceeds {{BUDGET}}, generate 2 **Fallback Plans** instead (Cheaper alternatives using local staples) and mark `isFallback: true`.
- **IF** feasible, generate the standard plan.

## OUTPUT FORMATS

### CASE 1: MEAL PLAN JSON
When asked for a plan (multiple meals/days), return a Markdown summary followed by this **Strict JSON Block**:

```json
{
  "type": "meal_plan",
  "title": "3-Day Plan",
  "personalisationProof": "Based on your Town location, ₹500 budget, and available Spinach & Paneer...",
  "totalBudgetEstimate": "₹450 - ₹500",
  "isFallback": false,
  "groceryList": [
    { "category": "Produce", "items": ["Onions", "Tomatoes"] },
    { "category": "Dairy", "items": ["Milk"] }
  ],
  "cookingSequence": [
    "Morning: Chop vegetables for Lunch and Dinner",
    "Evening: Soak beans for tomorrow"
  ],
  "days": [
    {
      "day": 1,
      "slots": [
        {
          "meal": "Breakfast",
          "recipe": {
            "id": "unique_id_1",
            "title": "Masala Oats",
            "description": "Savory oats with veggies",
            "emoji": "🥣",
            "time": "15 mins",
            "calories": "300 kcal",
            "difficulty": "Easy",
            "budget": "Low",
            "ingredients": [
               { "item": "Oats", "amount": "1 cup", "isDone": false, "substitution": "Dalia" }
            ],
            "steps": [
               { "instruction": "Boil water...", "tip": "Add salt early", "timerSeconds": 300, "isCompleted": false }
            ],
            "tags": ["Breakfast", "Quick"]
          }
        }
      ]
    }
  ]
}
```

### CASE 2: SINGLE RECIPE JSON
When asked for a specific recipe, a single dish, or "what should I cook", return a Markdown summary followed by this **Strict JSON Block**:

```json
{
  "type": "recipe",
  "title": "Recipe Title",
  "description": "A mouth-watering description.",
  "emoji": "🍛",
  "time": "30 mins",
  "calories": "450 kcal",
  "difficulty": "Medium",
  "budget": "Medium",
  "tags": ["Dinner", "Spicy"],
  "ingredients": [
    { "item": "Ingredient 1", "amount": "Qty", "isDone": false, "substitution": "Alternative" }
  ],
  "steps": [
    { "instruction": "Detailed step 1...", "tip": "Chef's secret tip", "timerSeconds": 0, "isCompleted": false },
    { "instruction": "Detailed step 2...", "tip": "", "timerSeconds": 600, "isCompleted": false }
  ]
}
```

## ITERATION HOOKS (OPTIMIZATION)
If the user asks to "Optimise for [Taste | Protein | Cheapest | Fastest]", adjust the recipes accordingly:
- **Taste:** Focus on spices, fats, and rich flavors.
- **Protein:** Maximize legumes, dairy, meat, soy.
- **Cheapest:** Use seasonal local veg, reduced processed items.
- **Fastest:** One-pot meals, raw assemblies, pressure cooker recipes.

## GENERAL RULES
- **Substitutions:** Every ingredient MUST have a `substitution` field.
- **Structure:** Always include the JSON block at the very end of your response.
"#;

// Placeholder fallbacks for unset or absent preferences.
const DEFAULT_DIET: &str = "Balanced";
const DEFAULT_ALLERGIES: &str = "None";
const DEFAULT_BUDGET: &str = "Flexible";
const DEFAULT_CITY: &str = "Metro";
const DEFAULT_KITCHEN: &str = "Standard";
const DEFAULT_TIME: &str = "45 mins";

/// One provider-agnostic turn of the outbound request. An attached image is
/// carried as binary content next to the text, never merged into it.
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: UserRole,
    pub text: String,
    pub image: Option<Bytes>,
}

/// Assembles the outbound request: persona instruction, per-turn context
/// header, and conversation history.
pub struct PromptBuilder<'a> {
    preferences: Option<&'a UserPreferences>,
    zen_mode: bool,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(preferences: Option<&'a UserPreferences>, zen_mode: bool) -> Self {
        Self {
            preferences,
            zen_mode,
        }
    }

    /// Render the system instruction with every placeholder resolved.
    pub fn system_instruction(&self) -> String {
        let p = self.preferences;

        let diet = p
            .map(|p| p.diet.to_string())
            .unwrap_or_else(|| DEFAULT_DIET.to_string());
        let allergies = p
            .map(|p| join_or(&p.allergies, DEFAULT_ALLERGIES))
            .unwrap_or_else(|| DEFAULT_ALLERGIES.to_string());
        let budget = p
            .map(|p| p.budget.clone())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_BUDGET.to_string());
        let city = p
            .map(|p| p.city_type.to_string())
            .unwrap_or_else(|| DEFAULT_CITY.to_string());
        let kitchen = p
            .map(|p| join_or(&p.kitchen_setup, DEFAULT_KITCHEN))
            .unwrap_or_else(|| DEFAULT_KITCHEN.to_string());
        let time = p
            .map(|p| p.cooking_time_per_meal.clone())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TIME.to_string());

        SYSTEM_INSTRUCTION
            .replace("{{DIET}}", &diet)
            .replace("{{ALLERGIES}}", &allergies)
            .replace("{{BUDGET}}", &budget)
            .replace("{{CITY}}", &city)
            .replace("{{KITCHEN}}", &kitchen)
            .replace("{{TIME}}", &time)
    }

    /// Short context block prepended to the outgoing user turn. Travels with
    /// the per-turn content, not the persona definition.
    pub fn context_header(&self) -> String {
        let mut header = String::new();
        if self.zen_mode {
            header.push_str("[MODE: ZEN CHEF - CALM, SOOTHING, MINIMAL]. ");
        }
        if let Some(p) = self.preferences {
            header.push_str(&format!(
                "\n[USER CONTEXT]\n- Diet: {}\n- Allergies: {}\n- Location: {}\n- Kitchen: {}\n",
                p.diet,
                join_or(&p.allergies, DEFAULT_ALLERGIES),
                p.city_type,
                p.kitchen_setup.join(", "),
            ));
        }
        header
    }

    /// Build the ordered turn list: prior history minus the synthetic
    /// greeting, then the new user turn with context header and any image.
    pub fn turns(&self, history: &[Message], text: &str, image: Option<Bytes>) -> Vec<Turn> {
        let mut turns: Vec<Turn> = history
            .iter()
            .filter(|m| m.id != WELCOME_MESSAGE_ID)
            .map(|m| Turn {
                role: m.role,
                text: m.text.clone(),
                image: None,
            })
            .collect();

        turns.push(Turn {
            role: UserRole::User,
            text: format!("{}{}", self.context_header(), text),
            image,
        });
        turns
    }
}

fn join_or(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}
