//! Bundle/step data model (spec §3) plus the load-time validation that
//! doesn't require executing anything: unique names, shape exclusivity, and
//! forward-reference-only ordering.
//!
//! Steps are deserialized from TOML, a step list with named steps, per-step
//! conditions, and `${...}` cross-references between them.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Strategy for combining step output file contents (C8 Merge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    Concat,
    Union,
    Dedupe,
}

impl Default for MergeStrategy {
    fn default() -> Self {
        Self::Concat
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeSpec {
    pub inputs: Vec<String>,
    #[serde(default)]
    pub strategy: MergeStrategy,
}

/// Strategy for tallying step outcomes (C8 Vote).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteStrategy {
    Majority,
    Unanimous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteSpec {
    pub inputs: Vec<String>,
    pub strategy: VoteStrategy,
}

/// A single step in a bundle. Deliberately flat (rather than an enum) so
/// TOML deserialization doesn't need an internally-tagged representation —
/// [`Step::shape`] classifies the step after the fact instead of relying on
/// a tagged union.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub effort: Option<String>,
    #[serde(default)]
    pub budget_usd: Option<f64>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, rename = "if")]
    pub if_expr: Option<String>,
    #[serde(default)]
    pub then: Option<Box<Step>>,
    #[serde(default, rename = "else")]
    pub else_step: Option<Box<Step>>,
    #[serde(default)]
    pub parallel: Option<Vec<Step>>,
    #[serde(default)]
    pub merge: Option<MergeSpec>,
    #[serde(default)]
    pub vote: Option<VoteSpec>,
}

/// The dispatcher's classification of a step's shape (spec C9, §3 "shape
/// exclusivity").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepShape {
    Tool,
    Parallel,
    Merge,
    Vote,
    Conditional,
    Unknown,
}

impl Step {
    /// Classify this step's shape. `then` takes precedence — a step with a
    /// `then` branch is the conditional-wrapper shape regardless of any
    /// other field also being set (those belong on the nested `then`/`else`
    /// steps instead, enforced by [`validate_shape_exclusivity`]).
    pub fn shape(&self) -> StepShape {
        if self.then.is_some() {
            StepShape::Conditional
        } else if self.parallel.as_ref().is_some_and(|p| !p.is_empty()) {
            StepShape::Parallel
        } else if self.merge.is_some() {
            StepShape::Merge
        } else if self.vote.is_some() {
            StepShape::Vote
        } else if self.tool.is_some() {
            StepShape::Tool
        } else {
            StepShape::Unknown
        }
    }
}

/// An input declared by a bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSpec {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bundle {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub inputs: HashMap<String, InputSpec>,
    pub steps: Vec<Step>,
}

/// Parse a bundle definition from TOML text and run the load-time
/// validation in one step, so callers never hold a bundle that hasn't
/// already been checked for structural mistakes.
#[derive(Debug, thiserror::Error)]
pub enum LoadBundleError {
    #[error("parsing bundle definition: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Validation(#[from] BundleValidationError),
}

pub fn load_bundle(contents: &str) -> Result<Bundle, LoadBundleError> {
    let bundle: Bundle = toml::from_str(contents)?;
    validate_bundle(&bundle)?;
    Ok(bundle)
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BundleValidationError {
    #[error("duplicate step name '{0}'")]
    DuplicateStepName(String),
    #[error("step '{0}' mixes {1} with a `then`/`parallel`/`merge`/`vote` shape")]
    ShapeNotExclusive(String, &'static str),
    #[error("step '{0}' references step '{1}' which is not declared earlier in the bundle")]
    ForwardReference(String, String),
}

/// Validate a bundle's static structure: unique step names, shape
/// exclusivity, and that every `${steps.<name>...}` reference (in `prompt`,
/// `if`, or merge/vote `inputs`) names a step declared strictly earlier.
///
/// Cycle detection is unnecessary by construction: the bundle language only
/// allows referencing earlier steps, so a linear forward-reference check is
/// equivalent to topological validation (spec §9, "Cyclic graphs").
pub fn validate_bundle(bundle: &Bundle) -> Result<(), BundleValidationError> {
    let mut seen: HashSet<String> = HashSet::new();
    for step in &bundle.steps {
        if !seen.insert(step.name.clone()) {
            return Err(BundleValidationError::DuplicateStepName(step.name.clone()));
        }
        validate_shape_exclusivity(step)?;
        for referenced in referenced_step_names(step) {
            if !seen.contains(&referenced) {
                return Err(BundleValidationError::ForwardReference(
                    step.name.clone(),
                    referenced,
                ));
            }
        }
    }
    Ok(())
}

fn validate_shape_exclusivity(step: &Step) -> Result<(), BundleValidationError> {
    if step.then.is_some() {
        let has_other = step.parallel.as_ref().is_some_and(|p| !p.is_empty())
            || step.merge.is_some()
            || step.vote.is_some()
            || step.tool.is_some();
        if has_other {
            return Err(BundleValidationError::ShapeNotExclusive(step.name.clone(), "then"));
        }
    }
    Ok(())
}

/// Collect every step name referenced via `${steps.<name>...}` in `prompt`,
/// `if`, or (for merge/vote steps) the `inputs` list — the only places a
/// step can name another step.
fn referenced_step_names(step: &Step) -> Vec<String> {
    let mut names = Vec::new();
    for text in [step.prompt.as_deref(), step.if_expr.as_deref()].into_iter().flatten() {
        names.extend(extract_step_refs(text));
    }
    if let Some(merge) = &step.merge {
        for input in &merge.inputs {
            names.extend(extract_step_refs(input));
        }
    }
    if let Some(vote) = &step.vote {
        for input in &vote.inputs {
            names.extend(extract_step_refs(input));
        }
    }
    names
}

/// Extract step names from every `${steps.<name>.` occurrence in `text`.
fn extract_step_refs(text: &str) -> Vec<String> {
    const MARKER: &str = "${steps.";
    let mut names = Vec::new();
    let mut search_from = 0usize;
    while let Some(rel) = text[search_from..].find(MARKER) {
        let start = search_from + rel + MARKER.len();
        let rest = &text[start..];
        let end = rest.find(['.', '}']).unwrap_or(rest.len());
        if end > 0 {
            names.push(rest[..end].to_string());
        }
        search_from = start + end.max(1);
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_step(name: &str) -> Step {
        Step {
            name: name.to_string(),
            tool: Some("claude-code".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn classifies_tool_step() {
        assert_eq!(tool_step("a").shape(), StepShape::Tool);
    }

    #[test]
    fn classifies_parallel_step() {
        let step = Step {
            name: "p".into(),
            parallel: Some(vec![tool_step("a")]),
            ..Default::default()
        };
        assert_eq!(step.shape(), StepShape::Parallel);
    }

    #[test]
    fn empty_parallel_list_is_not_parallel_shape() {
        let step = Step {
            name: "p".into(),
            parallel: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(step.shape(), StepShape::Unknown);
    }

    #[test]
    fn classifies_conditional_step_even_with_tool_set() {
        let step = Step {
            name: "c".into(),
            tool: Some("codex".into()),
            then: Some(Box::new(tool_step("inner"))),
            ..Default::default()
        };
        assert_eq!(step.shape(), StepShape::Conditional);
    }

    #[test]
    fn no_recognized_fields_is_unknown() {
        let step = Step {
            name: "mystery".into(),
            ..Default::default()
        };
        assert_eq!(step.shape(), StepShape::Unknown);
    }

    #[test]
    fn duplicate_names_rejected() {
        let bundle = Bundle {
            name: "b".into(),
            steps: vec![tool_step("a"), tool_step("a")],
            ..Default::default()
        };
        assert_eq!(
            validate_bundle(&bundle),
            Err(BundleValidationError::DuplicateStepName("a".into()))
        );
    }

    #[test]
    fn forward_reference_rejected() {
        let mut second = tool_step("b");
        second.prompt = Some("use ${steps.c.output_ref}".to_string());
        let bundle = Bundle {
            name: "b".into(),
            steps: vec![tool_step("a"), second],
            ..Default::default()
        };
        assert_eq!(
            validate_bundle(&bundle),
            Err(BundleValidationError::ForwardReference("b".into(), "c".into()))
        );
    }

    #[test]
    fn backward_reference_is_fine() {
        let mut second = tool_step("b");
        second.prompt = Some("use ${steps.a.output_ref}".to_string());
        let bundle = Bundle {
            name: "b".into(),
            steps: vec![tool_step("a"), second],
            ..Default::default()
        };
        assert!(validate_bundle(&bundle).is_ok());
    }

    #[test]
    fn merge_and_vote_inputs_are_checked_too() {
        let merge_step = Step {
            name: "m".into(),
            merge: Some(MergeSpec {
                inputs: vec!["${steps.missing.output_ref}".to_string()],
                strategy: MergeStrategy::Concat,
            }),
            ..Default::default()
        };
        let bundle = Bundle {
            name: "b".into(),
            steps: vec![tool_step("a"), merge_step],
            ..Default::default()
        };
        assert!(matches!(
            validate_bundle(&bundle),
            Err(BundleValidationError::ForwardReference(_, _))
        ));
    }

    #[test]
    fn load_bundle_parses_and_validates_toml() {
        let toml_text = r#"
            name = "demo"

            [[steps]]
            name = "build"
            tool = "claude-code"
            prompt = "do the thing"
        "#;
        let bundle = load_bundle(toml_text).unwrap();
        assert_eq!(bundle.name, "demo");
        assert_eq!(bundle.steps.len(), 1);
    }

    #[test]
    fn load_bundle_surfaces_validation_errors() {
        let toml_text = r#"
            name = "demo"

            [[steps]]
            name = "a"
            tool = "claude-code"

            [[steps]]
            name = "a"
            tool = "claude-code"
        "#;
        assert!(matches!(load_bundle(toml_text), Err(LoadBundleError::Validation(_))));
    }

    #[test]
    fn then_mixed_with_tool_at_top_level_is_rejected() {
        let step = Step {
            name: "c".into(),
            tool: Some("codex".into()),
            then: Some(Box::new(tool_step("inner"))),
            ..Default::default()
        };
        // `then` + `tool` both set is allowed structurally (then wins the
        // shape classification) but validate_shape_exclusivity should still
        // flag it as a load-time mistake.
        let bundle = Bundle {
            name: "b".into(),
            steps: vec![step],
            ..Default::default()
        };
        assert!(matches!(
            validate_bundle(&bundle),
            Err(BundleValidationError::ShapeNotExclusive(_, "then"))
        ));
    }
}
