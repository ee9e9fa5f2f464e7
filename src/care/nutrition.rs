// ABOUTME: Daily nutrition totals from analyzed diet entries and parsing of AI nutrition estimates
// ABOUTME: Averages cover only days with at least one analyzed meal
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};
use crate::models::{DietEntry, NutritionAnalysis};

/// Totals for one elder-local day
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyNutrition {
    /// Elder-local date
    pub date: NaiveDate,
    /// Meals logged
    pub meals: u32,
    /// Meals with an analysis
    pub analyzed_meals: u32,
    /// Calories from analyzed meals
    pub calories: f64,
    /// Protein grams
    pub protein_g: f64,
    /// Carbohydrate grams
    pub carbs_g: f64,
    /// Fat grams
    pub fat_g: f64,
}

/// Diet summary over a window
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionSummary {
    /// One row per day with at least one meal, oldest first
    pub days: Vec<DailyNutrition>,
    /// Mean calories over days with analyzed meals
    pub average_daily_calories: Option<f64>,
    /// Entries without analysis
    pub unanalyzed_entries: u32,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Group entries by elder-local day and total their analyses
#[must_use]
pub fn summarize(entries: &[DietEntry], offset: FixedOffset) -> NutritionSummary {
    let mut days: BTreeMap<NaiveDate, DailyNutrition> = BTreeMap::new();
    let mut unanalyzed_entries = 0;

    for entry in entries {
        let date = entry.eaten_at.with_timezone(&offset).date_naive();
        let day = days.entry(date).or_insert_with(|| DailyNutrition {
            date,
            meals: 0,
            analyzed_meals: 0,
            calories: 0.0,
            protein_g: 0.0,
            carbs_g: 0.0,
            fat_g: 0.0,
        });
        day.meals += 1;
        match &entry.analysis {
            Some(analysis) => {
                day.analyzed_meals += 1;
                day.calories += analysis.calories;
                day.protein_g += analysis.protein_g;
                day.carbs_g += analysis.carbs_g;
                day.fat_g += analysis.fat_g;
            }
            None => unanalyzed_entries += 1,
        }
    }

    let days: Vec<DailyNutrition> = days
        .into_values()
        .map(|day| DailyNutrition {
            calories: round1(day.calories),
            protein_g: round1(day.protein_g),
            carbs_g: round1(day.carbs_g),
            fat_g: round1(day.fat_g),
            ..day
        })
        .collect();

    let analyzed: Vec<f64> = days
        .iter()
        .filter(|day| day.analyzed_meals > 0)
        .map(|day| day.calories)
        .collect();
    let average_daily_calories = (!analyzed.is_empty())
        .then(|| round1(analyzed.iter().sum::<f64>() / analyzed.len() as f64));

    NutritionSummary {
        days,
        average_daily_calories,
        unanalyzed_entries,
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEstimate {
    calories: f64,
    #[serde(alias = "protein")]
    protein_g: f64,
    #[serde(alias = "carbs", alias = "carbohydrates")]
    carbs_g: f64,
    #[serde(alias = "fat")]
    fat_g: f64,
    #[serde(default)]
    notes: Option<String>,
}

/// Prompt asking the model for a JSON nutrition estimate
#[must_use]
pub fn analysis_prompt(description: &str, meal_type: &str) -> String {
    format!(
        "Estimate the nutrition content of this {meal_type} eaten by an older adult: \"{description}\".\n\
         Respond with only a JSON object with numeric fields calories, proteinG, carbsG, fatG \
         and a short string field notes. Do not give medical advice."
    )
}

/// Parse a model reply into a nutrition analysis
///
/// Accepts a bare JSON object or one wrapped in prose or code fences.
///
/// # Errors
///
/// Returns an external-service error when no usable estimate is present.
pub fn parse_analysis(reply: &str, analyzed_at: DateTime<Utc>) -> AppResult<NutritionAnalysis> {
    let invalid = || {
        AppError::external_service("nutrition analysis", "Model reply was not a usable estimate")
    };
    let start = reply.find('{').ok_or_else(invalid)?;
    let end = reply.rfind('}').ok_or_else(invalid)?;
    if end < start {
        return Err(invalid());
    }
    let raw: RawEstimate = serde_json::from_str(&reply[start..=end]).map_err(|_| invalid())?;

    let values = [raw.calories, raw.protein_g, raw.carbs_g, raw.fat_g];
    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(invalid());
    }
    Ok(NutritionAnalysis {
        calories: round1(raw.calories),
        protein_g: round1(raw.protein_g),
        carbs_g: round1(raw.carbs_g),
        fat_g: round1(raw.fat_g),
        notes: raw.notes.filter(|n| !n.trim().is_empty()),
        analyzed_at,
    })
}
