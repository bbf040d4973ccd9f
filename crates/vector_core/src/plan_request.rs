//! crates/vector_core/src/plan_request.rs
//!
//! Turns a workout configuration into the request handed to the generative
//! provider: the instruction text carrying the binding generation rules, the
//! user prompt, and the response schema the provider must conform to.
//!
//! The builder is pure. Identical inputs always produce identical requests.

use crate::domain::{Equipment, MuscleSelection, TimeOption};
use serde_json::Value;
use std::fmt::Write as _;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const GENERATION_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_WORK_SECONDS_PER_SET: u32 = 45;
pub const DEFAULT_EXERCISES_PER_SUB_REGION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("At least one muscle group must be selected")]
    NoMuscleGroups,
}

//=========================================================================================
// Response Schema
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    Object,
    Array,
    String,
    Integer,
}

/// A provider-neutral description of the JSON shape a response must have.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: SchemaType,
    pub description: Option<String>,
    /// Object properties, in declaration order.
    pub properties: Vec<(String, SchemaNode)>,
    pub items: Option<Box<SchemaNode>>,
    pub required: Vec<String>,
    /// Required fields that are requested from the provider but may still be
    /// absent from a response.
    pub tolerated_missing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {reason}")]
pub struct SchemaViolation {
    pub path: String,
    pub reason: String,
}

impl SchemaNode {
    fn leaf(kind: SchemaType, description: &str) -> Self {
        Self {
            kind,
            description: Some(description.to_string()),
            properties: Vec::new(),
            items: None,
            required: Vec::new(),
            tolerated_missing: Vec::new(),
        }
    }

    pub fn string(description: &str) -> Self {
        Self::leaf(SchemaType::String, description)
    }

    pub fn integer(description: &str) -> Self {
        Self::leaf(SchemaType::Integer, description)
    }

    pub fn array(items: SchemaNode, description: &str) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::leaf(SchemaType::Array, description)
        }
    }

    /// Builds an object node; every listed property is required.
    pub fn object(properties: Vec<(&str, SchemaNode)>) -> Self {
        let required = properties.iter().map(|(name, _)| name.to_string()).collect();
        Self {
            kind: SchemaType::Object,
            description: None,
            properties: properties
                .into_iter()
                .map(|(name, node)| (name.to_string(), node))
                .collect(),
            items: None,
            required,
            tolerated_missing: Vec::new(),
        }
    }

    /// Keeps `name` required in the request but accepts responses without it.
    pub fn tolerate_missing(mut self, name: &str) -> Self {
        self.tolerated_missing.push(name.to_string());
        self
    }

    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }

    /// Checks `value` against this node and reports the first mismatch.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        self.check(value, "$")
    }

    fn check(&self, value: &Value, path: &str) -> Result<(), SchemaViolation> {
        let violation = |reason: &str| SchemaViolation {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        match self.kind {
            SchemaType::Object => {
                let object = value.as_object().ok_or_else(|| violation("expected an object"))?;
                for name in &self.required {
                    if self.tolerated_missing.contains(name) {
                        continue;
                    }
                    match object.get(name) {
                        None | Some(Value::Null) => {
                            return Err(SchemaViolation {
                                path: format!("{path}.{name}"),
                                reason: "missing required field".to_string(),
                            })
                        }
                        Some(_) => {}
                    }
                }
                for (name, node) in &self.properties {
                    if let Some(field) = object.get(name).filter(|v| !v.is_null()) {
                        node.check(field, &format!("{path}.{name}"))?;
                    }
                }
                Ok(())
            }
            SchemaType::Array => {
                let entries = value.as_array().ok_or_else(|| violation("expected an array"))?;
                if let Some(items) = &self.items {
                    for (i, entry) in entries.iter().enumerate() {
                        items.check(entry, &format!("{path}[{i}]"))?;
                    }
                }
                Ok(())
            }
            SchemaType::String => {
                if value.is_string() {
                    Ok(())
                } else {
                    Err(violation("expected a string"))
                }
            }
            SchemaType::Integer => {
                if value.is_i64() || value.is_u64() {
                    Ok(())
                } else {
                    Err(violation("expected an integer"))
                }
            }
        }
    }
}

/// The schema every generated workout must follow.
pub fn workout_response_schema() -> SchemaNode {
    let exercise = SchemaNode::object(vec![
        ("name", SchemaNode::string("Name of the exercise (e.g. 'Incline Bench Press')")),
        ("sets", SchemaNode::integer("Number of sets")),
        (
            "repsOrDuration",
            SchemaNode::string("Reps (e.g. '12') or duration (e.g. '45s')"),
        ),
        ("restSeconds", SchemaNode::integer("Rest between sets in seconds")),
        (
            "formGuidance",
            SchemaNode::string("Technique cue naming the targeted sub-region"),
        ),
        ("equipment", SchemaNode::string("Equipment needed")),
        (
            "visualTag",
            SchemaNode::string("Short prompt for an image generator"),
        ),
    ])
    .tolerate_missing("visualTag");

    SchemaNode::object(vec![
        (
            "exercises",
            SchemaNode::array(exercise, "Exercises in execution order"),
        ),
        (
            "estimatedCalories",
            SchemaNode::integer("Estimated total calories burned for the session"),
        ),
    ])
}

//=========================================================================================
// Request
//=========================================================================================

/// How the instruction text tells the provider to size the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumePolicy {
    /// Fit the session into the window using `sets × (work + rest)`.
    TimeBudget { work_seconds_per_set: u32 },
    /// A fixed number of exercises per sub-region, trimming sets to fit the window.
    PerSubRegion { exercises_per_sub_region: u32 },
}

impl Default for VolumePolicy {
    fn default() -> Self {
        VolumePolicy::TimeBudget {
            work_seconds_per_set: DEFAULT_WORK_SECONDS_PER_SET,
        }
    }
}

impl VolumePolicy {
    pub fn work_seconds_per_set(&self) -> u32 {
        match self {
            VolumePolicy::TimeBudget { work_seconds_per_set } => *work_seconds_per_set,
            VolumePolicy::PerSubRegion { .. } => DEFAULT_WORK_SECONDS_PER_SET,
        }
    }
}

/// Everything the provider needs for one structured generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub system_instruction: String,
    pub prompt: String,
    pub response_schema: SchemaNode,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct PlanRequestBuilder {
    model: String,
    temperature: f32,
    volume: VolumePolicy,
}

impl Default for PlanRequestBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

impl PlanRequestBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: GENERATION_TEMPERATURE,
            volume: VolumePolicy::default(),
        }
    }

    pub fn with_volume_policy(mut self, volume: VolumePolicy) -> Self {
        self.volume = volume;
        self
    }

    pub fn volume_policy(&self) -> VolumePolicy {
        self.volume
    }

    pub fn build(
        &self,
        equipment: Equipment,
        muscles: &MuscleSelection,
        time: TimeOption,
    ) -> Result<GenerationRequest, RequestError> {
        if muscles.is_empty() {
            return Err(RequestError::NoMuscleGroups);
        }

        Ok(GenerationRequest {
            model: self.model.clone(),
            system_instruction: self.system_instruction(equipment, time),
            prompt: user_prompt(equipment, muscles, time),
            response_schema: workout_response_schema(),
            temperature: self.temperature,
        })
    }

    fn system_instruction(&self, equipment: Equipment, time: TimeOption) -> String {
        let work = self.volume.work_seconds_per_set();
        let coverage = match self.volume {
            VolumePolicy::TimeBudget { .. } => {
                "Give each sub-region at least one distinct exercise.".to_string()
            }
            VolumePolicy::PerSubRegion {
                exercises_per_sub_region,
            } => format!(
                "Give each sub-region exactly {exercises_per_sub_region} distinct exercises."
            ),
        };
        let reduction = match self.volume {
            VolumePolicy::TimeBudget { .. } => "remove sets or whole exercises",
            VolumePolicy::PerSubRegion { .. } => "remove sets",
        };

        format!(
            "You are Vector, an anatomical workout engine. Design one training session that \
isolates the anatomical sub-regions of the requested muscle groups.

BINDING RULES:
1. SUB-REGION COVERAGE: Split every selected muscle group into its anatomical sub-regions \
(for example Chest -> upper/clavicular, middle/sternal, lower/costal). {coverage}
2. TIME BUDGET: The whole session must fit inside {minutes} minutes ({seconds} seconds). \
Compute total_seconds = sum over every set of ({work} seconds of work + that exercise's restSeconds). \
If the plan would run over, {reduction}. Never exceed the window.
3. EQUIPMENT: Use '{equipment}' only. Every exercise's equipment field must come from '{equipment}'.
4. FORM CUES: Every formGuidance must name the specific sub-region the exercise biases.
5. VISUAL TAG: Give every exercise a visualTag, a 3-5 word prompt for an image generator.
6. CALORIES: Estimate the total calories burned as estimatedCalories.

Respond with JSON that matches the response schema. No conversational text.",
            minutes = time.minutes(),
            seconds = time.seconds(),
        )
    }
}

fn user_prompt(equipment: Equipment, muscles: &MuscleSelection, time: TimeOption) -> String {
    let mut prompt = String::from("GENERATE WORKOUT:\n");
    let _ = writeln!(prompt, "- Equipment: {equipment}");
    let _ = writeln!(prompt, "- Target anatomy: {muscles}");
    for muscle in muscles.iter() {
        let _ = writeln!(prompt, "  - {muscle}: {}", muscle.sub_regions().join(", "));
    }
    let _ = writeln!(prompt, "- Time window: {} minutes", time.minutes());
    prompt.push_str("\nSegment the anatomy and generate the session.");
    prompt
}
