// ABOUTME: Logged meals with optional AI-derived nutrition analysis
// ABOUTME: Analysis carries calorie and macro estimates produced by the insight provider
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

string_enum! {
    /// Meal category
    pub enum MealType {
        /// Morning meal
        Breakfast => "breakfast",
        /// Midday meal
        Lunch => "lunch",
        /// Evening meal
        Dinner => "dinner",
        /// Anything in between
        Snack => "snack",
    }
}

/// Estimated nutrition for one meal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionAnalysis {
    /// Estimated calories (kcal)
    pub calories: f64,
    /// Protein in grams
    pub protein_g: f64,
    /// Carbohydrates in grams
    pub carbs_g: f64,
    /// Fat in grams
    pub fat_g: f64,
    /// Short remarks (e.g. "high sodium")
    #[serde(default)]
    pub notes: Option<String>,
    /// When the analysis was produced
    pub analyzed_at: DateTime<Utc>,
}

/// A logged meal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DietEntry {
    /// Unique identifier
    pub id: Uuid,
    /// Elder
    pub elder_id: Uuid,
    /// Meal category
    pub meal_type: MealType,
    /// What was eaten
    pub description: String,
    /// When it was eaten
    pub eaten_at: DateTime<Utc>,
    /// Who logged it
    pub logged_by: Uuid,
    /// Nutrition estimate, once analysed
    pub analysis: Option<NutritionAnalysis>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}
