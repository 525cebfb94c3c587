//! Catalog of RunPod-backed generation models.
//!
//! Each model maps to one serverless endpoint configured per user in the
//! `runpod` settings service. The catalog drives submission validation,
//! RunPod payload construction and credit accounting.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::media::MediaType;

/// Maximum prompt length accepted by any model.
pub const MAX_PROMPT_LEN: usize = 4000;

/// Inclusive pixel range for `width` / `height` options.
pub const MIN_DIMENSION: i64 = 64;
pub const MAX_DIMENSION: i64 = 2048;

/// Inclusive range for the `steps` option.
pub const MAX_STEPS: i64 = 100;

/// A media input a model consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Image,
    Video,
    Audio,
}

impl InputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }

    /// Key under which the input reference is passed to the RunPod worker.
    pub fn payload_key(self) -> &'static str {
        match self {
            Self::Image => "image_url",
            Self::Video => "video_url",
            Self::Audio => "audio_url",
        }
    }
}

/// A default option value. Kept as a small enum so the catalog can be `static`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamDefault {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(&'static str),
}

impl ParamDefault {
    fn to_json(self) -> Value {
        match self {
            Self::Int(v) => Value::from(v),
            Self::Float(v) => Value::from(v),
            Self::Bool(v) => Value::from(v),
            Self::Str(v) => Value::from(v),
        }
    }
}

/// Static description of a generation model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Media type of the job result.
    pub output: MediaType,
    pub requires_prompt: bool,
    /// Inputs that must be supplied with every submission.
    pub inputs: &'static [InputKind],
    /// Key in the `runpod` settings service holding the endpoint id.
    pub endpoint_setting: &'static str,
    /// Credits charged per second of RunPod execution time.
    pub credits_per_second: f64,
    /// Serialized as a JSON object of option name to default value.
    #[serde(serialize_with = "serialize_defaults")]
    pub defaults: &'static [(&'static str, ParamDefault)],
}

fn serialize_defaults<S: serde::Serializer>(
    defaults: &&'static [(&'static str, ParamDefault)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;

    let mut map = serializer.serialize_map(Some(defaults.len()))?;
    for (key, value) in defaults.iter() {
        map.serialize_entry(key, value)?;
    }
    map.end()
}

static CATALOG: &[ModelSpec] = &[
    ModelSpec {
        id: "flux-krea",
        name: "FLUX Krea",
        description: "Text-to-image generation",
        output: MediaType::Image,
        requires_prompt: true,
        inputs: &[],
        endpoint_setting: "endpoint_flux_krea",
        credits_per_second: 0.00044,
        defaults: &[
            ("width", ParamDefault::Int(1024)),
            ("height", ParamDefault::Int(1024)),
            ("steps", ParamDefault::Int(28)),
            ("guidance", ParamDefault::Float(3.5)),
            ("seed", ParamDefault::Int(-1)),
        ],
    },
    ModelSpec {
        id: "qwen-image-edit",
        name: "Qwen Image Edit",
        description: "Instruction-based image editing",
        output: MediaType::Image,
        requires_prompt: true,
        inputs: &[InputKind::Image],
        endpoint_setting: "endpoint_qwen_image_edit",
        credits_per_second: 0.00044,
        defaults: &[
            ("steps", ParamDefault::Int(4)),
            ("guidance", ParamDefault::Float(1.0)),
            ("seed", ParamDefault::Int(-1)),
        ],
    },
    ModelSpec {
        id: "wan22",
        name: "WAN 2.2",
        description: "Image-to-video generation",
        output: MediaType::Video,
        requires_prompt: true,
        inputs: &[InputKind::Image],
        endpoint_setting: "endpoint_wan22",
        credits_per_second: 0.00076,
        defaults: &[
            ("width", ParamDefault::Int(480)),
            ("height", ParamDefault::Int(832)),
            ("length", ParamDefault::Int(81)),
            ("steps", ParamDefault::Int(10)),
            ("cfg", ParamDefault::Float(2.0)),
            ("seed", ParamDefault::Int(-1)),
        ],
    },
    ModelSpec {
        id: "infinite-talk",
        name: "InfiniteTalk",
        description: "Talking-head video from a portrait and an audio track",
        output: MediaType::Video,
        requires_prompt: false,
        inputs: &[InputKind::Image, InputKind::Audio],
        endpoint_setting: "endpoint_infinite_talk",
        credits_per_second: 0.00076,
        defaults: &[
            ("width", ParamDefault::Int(512)),
            ("height", ParamDefault::Int(512)),
            ("prompt", ParamDefault::Str("A person talking naturally")),
        ],
    },
    ModelSpec {
        id: "video-upscale",
        name: "Video Upscale",
        description: "Upscale and interpolate an existing video",
        output: MediaType::Video,
        requires_prompt: false,
        inputs: &[InputKind::Video],
        endpoint_setting: "endpoint_video_upscale",
        credits_per_second: 0.00044,
        defaults: &[
            ("scale", ParamDefault::Float(2.0)),
            ("interpolate", ParamDefault::Bool(false)),
        ],
    },
    ModelSpec {
        id: "mmaudio",
        name: "MMAudio",
        description: "Soundtrack generation for a video",
        output: MediaType::Audio,
        requires_prompt: true,
        inputs: &[InputKind::Video],
        endpoint_setting: "endpoint_mmaudio",
        credits_per_second: 0.00031,
        defaults: &[
            ("duration", ParamDefault::Float(8.0)),
            ("seed", ParamDefault::Int(-1)),
        ],
    },
];

/// All supported models, in display order.
pub fn catalog() -> &'static [ModelSpec] {
    CATALOG
}

/// Look up a model by id.
pub fn find_model(id: &str) -> Option<&'static ModelSpec> {
    CATALOG.iter().find(|m| m.id == id)
}

/// Look up a model by id, returning a validation error for unknown ids.
pub fn require_model(id: &str) -> Result<&'static ModelSpec, CoreError> {
    find_model(id).ok_or_else(|| {
        let known: Vec<&str> = CATALOG.iter().map(|m| m.id).collect();
        CoreError::Validation(format!(
            "Unknown model_id '{id}'. Must be one of: {}",
            known.join(", ")
        ))
    })
}

/// References to the media inputs of a submission (URLs or storage keys).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputFiles {
    pub image: Option<String>,
    pub video: Option<String>,
    pub audio: Option<String>,
}

impl InputFiles {
    pub fn get(&self, kind: InputKind) -> Option<&str> {
        let value = match kind {
            InputKind::Image => &self.image,
            InputKind::Video => &self.video,
            InputKind::Audio => &self.audio,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }
}

/// Validate a submission against the model's requirements.
pub fn validate_generation(
    model: &ModelSpec,
    prompt: Option<&str>,
    inputs: &InputFiles,
    options: &Value,
) -> Result<(), CoreError> {
    let prompt = prompt.map(str::trim).unwrap_or("");
    if model.requires_prompt && prompt.is_empty() {
        return Err(CoreError::Validation(format!(
            "Model '{}' requires a prompt",
            model.id
        )));
    }
    if prompt.chars().count() > MAX_PROMPT_LEN {
        return Err(CoreError::Validation(format!(
            "Prompt too long: {} chars (max {MAX_PROMPT_LEN})",
            prompt.chars().count()
        )));
    }

    for kind in model.inputs {
        if inputs.get(*kind).is_none() {
            return Err(CoreError::Validation(format!(
                "Model '{}' requires {} input",
                model.id,
                kind.as_str()
            )));
        }
    }

    let options = match options {
        Value::Null => return Ok(()),
        Value::Object(map) => map,
        _ => {
            return Err(CoreError::Validation(
                "options must be a JSON object".to_string(),
            ))
        }
    };

    for key in ["width", "height"] {
        if let Some(v) = int_option(options, key)? {
            if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&v) || v % 8 != 0 {
                return Err(CoreError::Validation(format!(
                    "{key} must be a multiple of 8 between {MIN_DIMENSION} and {MAX_DIMENSION}, got {v}"
                )));
            }
        }
    }
    if let Some(steps) = int_option(options, "steps")? {
        if !(1..=MAX_STEPS).contains(&steps) {
            return Err(CoreError::Validation(format!(
                "steps must be between 1 and {MAX_STEPS}, got {steps}"
            )));
        }
    }
    if let Some(seed) = int_option(options, "seed")? {
        if seed < -1 {
            return Err(CoreError::Validation(format!(
                "seed must be -1 (random) or a non-negative integer, got {seed}"
            )));
        }
    }
    for key in ["duration", "length"] {
        if let Some(n) = number_option(options, key)? {
            if !n.is_finite() || n <= 0.0 {
                return Err(CoreError::Validation(format!(
                    "{key} must be a positive number"
                )));
            }
        }
    }
    Ok(())
}

/// Read an optional integer option, rejecting non-integer values.
fn int_option(options: &Map<String, Value>, key: &str) -> Result<Option<i64>, CoreError> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| CoreError::Validation(format!("{key} must be an integer"))),
    }
}

/// Read an optional numeric option. `null` counts as absent, like in
/// [`int_option`].
fn number_option(options: &Map<String, Value>, key: &str) -> Result<Option<f64>, CoreError> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| CoreError::Validation(format!("{key} must be a positive number"))),
    }
}

/// Build the RunPod `input` object: model defaults, then user options,
/// then the prompt and input references.
pub fn build_runpod_input(
    model: &ModelSpec,
    prompt: Option<&str>,
    options: &Value,
    inputs: &InputFiles,
) -> Value {
    let mut input = Map::new();
    for (key, default) in model.defaults {
        input.insert((*key).to_string(), default.to_json());
    }
    if let Some(obj) = options.as_object() {
        for (key, value) in obj {
            if !value.is_null() {
                input.insert(key.clone(), value.clone());
            }
        }
    }
    if let Some(p) = prompt.map(str::trim).filter(|p| !p.is_empty()) {
        input.insert("prompt".to_string(), Value::from(p));
    }
    for kind in [InputKind::Image, InputKind::Video, InputKind::Audio] {
        if let Some(reference) = inputs.get(kind) {
            input.insert(kind.payload_key().to_string(), Value::from(reference));
        }
    }
    Value::Object(input)
}

/// Credits charged for a completed job, rounded to 6 decimal places.
pub fn job_cost(model: &ModelSpec, execution_ms: i64) -> f64 {
    let secs = execution_ms.max(0) as f64 / 1000.0;
    (secs * model.credits_per_second * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn image_input() -> InputFiles {
        InputFiles {
            image: Some("uploads/u1/a.png".into()),
            ..Default::default()
        }
    }

    #[test]
    fn catalog_ids_are_unique_and_resolvable() {
        let mut ids: Vec<&str> = catalog().iter().map(|m| m.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), catalog().len());
        for id in ids {
            assert!(find_model(id).is_some());
        }
    }

    #[test]
    fn defaults_serialize_as_object() {
        let value = serde_json::to_value(require_model("flux-krea").unwrap()).unwrap();
        assert_eq!(value["defaults"]["steps"], json!(28));
        assert_eq!(value["defaults"]["guidance"], json!(3.5));
        assert_eq!(value["output"], json!("image"));
    }

    #[test]
    fn unknown_model_is_validation_error() {
        assert_matches!(require_model("sdxl"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn prompt_required_for_text_models() {
        let model = require_model("flux-krea").unwrap();
        let err = validate_generation(model, Some("   "), &InputFiles::default(), &Value::Null);
        assert_matches!(err, Err(CoreError::Validation(msg)) if msg.contains("requires a prompt"));
        assert!(validate_generation(model, Some("a cat"), &InputFiles::default(), &Value::Null).is_ok());
    }

    #[test]
    fn missing_inputs_rejected() {
        let model = require_model("infinite-talk").unwrap();
        let err = validate_generation(model, None, &image_input(), &Value::Null);
        assert_matches!(err, Err(CoreError::Validation(msg)) if msg.contains("audio"));

        let both = InputFiles {
            audio: Some("uploads/u1/v.wav".into()),
            ..image_input()
        };
        assert!(validate_generation(model, None, &both, &Value::Null).is_ok());
    }

    #[test]
    fn blank_input_reference_counts_as_missing() {
        let model = require_model("wan22").unwrap();
        let inputs = InputFiles {
            image: Some(" ".into()),
            ..Default::default()
        };
        assert!(validate_generation(model, Some("walk"), &inputs, &Value::Null).is_err());
    }

    #[test]
    fn dimension_rules() {
        let model = require_model("flux-krea").unwrap();
        let ok = json!({ "width": 768, "height": 1344 });
        assert!(validate_generation(model, Some("x"), &InputFiles::default(), &ok).is_ok());

        for bad in [json!({ "width": 770 }), json!({ "height": 32 }), json!({ "width": 4096 }), json!({ "width": "wide" })] {
            assert!(
                validate_generation(model, Some("x"), &InputFiles::default(), &bad).is_err(),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn steps_seed_duration_rules() {
        let model = require_model("mmaudio").unwrap();
        let inputs = InputFiles {
            video: Some("v.mp4".into()),
            ..Default::default()
        };
        assert!(validate_generation(model, Some("rain"), &inputs, &json!({ "steps": 0 })).is_err());
        assert!(validate_generation(model, Some("rain"), &inputs, &json!({ "seed": -2 })).is_err());
        assert!(validate_generation(model, Some("rain"), &inputs, &json!({ "duration": 0 })).is_err());
        assert!(validate_generation(model, Some("rain"), &inputs, &json!({ "seed": -1, "duration": 4.5 })).is_ok());
    }

    #[test]
    fn null_options_count_as_absent() {
        let model = require_model("mmaudio").unwrap();
        let inputs = InputFiles {
            video: Some("v.mp4".into()),
            ..Default::default()
        };
        let options = json!({ "duration": null, "length": null, "steps": null, "width": null });
        assert!(validate_generation(model, Some("rain"), &inputs, &options).is_ok());
        assert_matches!(
            validate_generation(model, Some("rain"), &inputs, &json!({ "duration": "8" })),
            Err(CoreError::Validation(msg)) if msg.contains("duration")
        );
    }

    #[test]
    fn options_must_be_object() {
        let model = require_model("flux-krea").unwrap();
        assert!(validate_generation(model, Some("x"), &InputFiles::default(), &json!([1, 2])).is_err());
    }

    #[test]
    fn runpod_input_merges_defaults_options_and_inputs() {
        let model = require_model("wan22").unwrap();
        let input = build_runpod_input(
            model,
            Some("  a dancer  "),
            &json!({ "steps": 20, "seed": null }),
            &image_input(),
        );
        assert_eq!(input["prompt"], "a dancer");
        assert_eq!(input["steps"], 20);
        assert_eq!(input["seed"], -1);
        assert_eq!(input["width"], 480);
        assert_eq!(input["image_url"], "uploads/u1/a.png");
        assert!(input.get("audio_url").is_none());
    }

    #[test]
    fn default_prompt_kept_when_none_given() {
        let model = require_model("infinite-talk").unwrap();
        let input = build_runpod_input(model, None, &Value::Null, &InputFiles::default());
        assert_eq!(input["prompt"], "A person talking naturally");
    }

    #[test]
    fn cost_scales_with_execution_time() {
        let model = require_model("flux-krea").unwrap();
        assert_eq!(job_cost(model, 0), 0.0);
        assert_eq!(job_cost(model, -50), 0.0);
        assert!((job_cost(model, 10_000) - 0.0044).abs() < 1e-9);
    }
}
