//! Task matrix expansion.
//!
//! Crosses every variation axis into an ordered list of [`TaskSpec`]s. Axis
//! order, outermost first, is model, style reference, composition reference,
//! prompt, iteration. Sequence numbers follow that order starting at zero.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::param::ParamString;
use crate::error::VariationError;

/// Smallest accepted iteration count.
pub const MIN_ITERATIONS: u32 = 1;

/// Largest accepted iteration count.
pub const MAX_ITERATIONS: u32 = 4;

/// One concrete combination of axis values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Position in the expansion; stable across identical inputs.
    pub sequence: usize,
    /// Model identifier.
    pub model: String,
    /// Style reference path or URL, if any.
    pub style_reference: Option<String>,
    /// Composition reference path or URL, if any.
    pub composition_reference: Option<String>,
    /// Prompt with every bracket block substituted.
    pub prompt: String,
    /// Option chosen for each prompt block, in block order.
    pub prompt_choices: Vec<String>,
    /// 1-based iteration index.
    pub iteration: u32,
}

impl fmt::Display for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} model={} prompt={:?} iteration={}",
            self.sequence, self.model, self.prompt, self.iteration
        )?;
        if let Some(style) = &self.style_reference {
            write!(f, " style_reference={}", style)?;
        }
        if let Some(composition) = &self.composition_reference {
            write!(f, " composition_reference={}", composition)?;
        }
        Ok(())
    }
}

/// Raw, possibly bracketed, parameters of one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariationInputs {
    pub prompt: String,
    pub model: String,
    pub style_reference: Option<String>,
    pub composition_reference: Option<String>,
    pub iterations: u32,
}

impl VariationInputs {
    /// Creates inputs for `prompt` with one iteration and no references.
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            style_reference: None,
            composition_reference: None,
            iterations: 1,
        }
    }

    /// Sets the style reference parameter.
    pub fn with_style_reference(mut self, value: impl Into<String>) -> Self {
        self.style_reference = Some(value.into());
        self
    }

    /// Sets the composition reference parameter.
    pub fn with_composition_reference(mut self, value: impl Into<String>) -> Self {
        self.composition_reference = Some(value.into());
        self
    }

    /// Sets the number of iterations per combination.
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }
}

/// Size of each axis of an expanded matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AxisSizes {
    pub models: usize,
    pub style_references: usize,
    pub composition_references: usize,
    pub prompts: usize,
    pub iterations: usize,
}

impl AxisSizes {
    /// Product of all axis sizes.
    pub fn total(&self) -> usize {
        self.models
            * self.style_references
            * self.composition_references
            * self.prompts
            * self.iterations
    }
}

/// The full, ordered cross product of a batch's axes.
#[derive(Debug, Clone)]
pub struct TaskMatrix {
    tasks: Vec<TaskSpec>,
    axes: AxisSizes,
}

impl TaskMatrix {
    /// Expands `inputs` without rewriting model names.
    ///
    /// # Errors
    ///
    /// Fails fast with [`VariationError`] before any task is produced.
    pub fn expand(inputs: &VariationInputs) -> Result<Self, VariationError> {
        Self::expand_with(inputs, |model| model.to_string())
    }

    /// Expands `inputs`, passing every model option through `normalize_model`.
    pub fn expand_with<F>(inputs: &VariationInputs, normalize_model: F) -> Result<Self, VariationError>
    where
        F: Fn(&str) -> String,
    {
        if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&inputs.iterations) {
            return Err(VariationError::InvalidVariationCount {
                parameter: "iterations".to_string(),
                count: inputs.iterations,
                min: MIN_ITERATIONS,
                max: MAX_ITERATIONS,
            });
        }

        let models: Vec<String> = ParamString::parse("model", &inputs.model)?
            .expand()
            .into_iter()
            .map(|expansion| normalize_model(expansion.text.trim()))
            .collect();
        let style_references = reference_axis("style_reference", inputs.style_reference.as_deref())?;
        let composition_references = reference_axis(
            "composition_reference",
            inputs.composition_reference.as_deref(),
        )?;
        let prompts = ParamString::parse("prompt", &inputs.prompt)?.expand();

        let axes = AxisSizes {
            models: models.len(),
            style_references: style_references.len(),
            composition_references: composition_references.len(),
            prompts: prompts.len(),
            iterations: inputs.iterations as usize,
        };

        let mut tasks = Vec::with_capacity(axes.total());
        for model in &models {
            for style in &style_references {
                for composition in &composition_references {
                    for prompt in &prompts {
                        for iteration in 1..=inputs.iterations {
                            tasks.push(TaskSpec {
                                sequence: tasks.len(),
                                model: model.clone(),
                                style_reference: style.clone(),
                                composition_reference: composition.clone(),
                                prompt: prompt.text.clone(),
                                prompt_choices: prompt.choices.clone(),
                                iteration,
                            });
                        }
                    }
                }
            }
        }

        Ok(Self { tasks, axes })
    }

    /// The expanded tasks in sequence order.
    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    /// Consumes the matrix, returning its tasks.
    pub fn into_tasks(self) -> Vec<TaskSpec> {
        self.tasks
    }

    /// Per-axis sizes.
    pub fn axes(&self) -> AxisSizes {
        self.axes
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// A missing or blank reference contributes a single `None` element.
fn reference_axis(
    parameter: &str,
    value: Option<&str>,
) -> Result<Vec<Option<String>>, VariationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(vec![None]),
        Some(raw) => Ok(ParamString::parse(parameter, raw)?
            .expand()
            .into_iter()
            .map(|expansion| Some(expansion.text.trim().to_string()))
            .collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_models_outer_prompts_inner() {
        let inputs = VariationInputs::new("a [cat,dog]", "[image3,image4]");
        let matrix = TaskMatrix::expand(&inputs).expect("should expand");

        let pairs: Vec<(&str, &str)> = matrix
            .tasks()
            .iter()
            .map(|t| (t.model.as_str(), t.prompt.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("image3", "a cat"),
                ("image3", "a dog"),
                ("image4", "a cat"),
                ("image4", "a dog"),
            ]
        );
        assert!(matrix.tasks().iter().all(|t| t.iteration == 1));
    }

    #[test]
    fn test_size_is_product_of_axes() {
        let inputs = VariationInputs::new("[a,b,c] [x,y]", "[m1,m2]")
            .with_style_reference("[s1.png,s2.png]")
            .with_composition_reference("c.png")
            .with_iterations(3);
        let matrix = TaskMatrix::expand(&inputs).expect("should expand");

        assert_eq!(matrix.len(), 6 * 2 * 2 * 3);
        assert_eq!(matrix.axes().total(), matrix.len());
        assert_eq!(
            matrix.axes(),
            AxisSizes {
                models: 2,
                style_references: 2,
                composition_references: 1,
                prompts: 6,
                iterations: 3,
            }
        );
    }

    #[test]
    fn test_sequence_numbers_are_positions() {
        let inputs = VariationInputs::new("[a,b]", "m").with_iterations(2);
        let matrix = TaskMatrix::expand(&inputs).expect("should expand");

        for (index, task) in matrix.tasks().iter().enumerate() {
            assert_eq!(task.sequence, index);
        }
        let iterations: Vec<u32> = matrix.tasks().iter().map(|t| t.iteration).collect();
        assert_eq!(iterations, vec![1, 2, 1, 2]);
    }

    #[test]
    fn test_reference_axes_order() {
        let inputs = VariationInputs::new("p", "m")
            .with_style_reference("[s1,s2]")
            .with_composition_reference("[c1,c2]");
        let matrix = TaskMatrix::expand(&inputs).expect("should expand");

        let refs: Vec<(Option<&str>, Option<&str>)> = matrix
            .tasks()
            .iter()
            .map(|t| {
                (
                    t.style_reference.as_deref(),
                    t.composition_reference.as_deref(),
                )
            })
            .collect();
        assert_eq!(
            refs,
            vec![
                (Some("s1"), Some("c1")),
                (Some("s1"), Some("c2")),
                (Some("s2"), Some("c1")),
                (Some("s2"), Some("c2")),
            ]
        );
    }

    #[test]
    fn test_missing_references_are_none() {
        let matrix = TaskMatrix::expand(&VariationInputs::new("p", "m").with_style_reference("  "))
            .expect("should expand");
        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix.tasks()[0].style_reference, None);
        assert_eq!(matrix.tasks()[0].composition_reference, None);
    }

    #[test]
    fn test_iteration_bounds() {
        for bad in [0, 5] {
            let err = TaskMatrix::expand(&VariationInputs::new("p", "m").with_iterations(bad))
                .expect_err("out of range iterations should fail");
            assert!(matches!(
                err,
                VariationError::InvalidVariationCount { count, .. } if count == bad
            ));
        }
        for good in MIN_ITERATIONS..=MAX_ITERATIONS {
            assert!(TaskMatrix::expand(&VariationInputs::new("p", "m").with_iterations(good)).is_ok());
        }
    }

    #[test]
    fn test_empty_axis_aborts_expansion() {
        let err = TaskMatrix::expand(&VariationInputs::new("a [cat,dog]", "[]"))
            .expect_err("empty model list should fail");
        assert!(matches!(err, VariationError::EmptyVariationAxis { ref parameter, .. } if parameter == "model"));
    }

    #[test]
    fn test_model_normalizer_applied() {
        let inputs = VariationInputs::new("p", "[image4, ultra]");
        let matrix = TaskMatrix::expand_with(&inputs, |m| format!("{m}_x")).expect("should expand");
        let models: Vec<&str> = matrix.tasks().iter().map(|t| t.model.as_str()).collect();
        assert_eq!(models, vec!["image4_x", "ultra_x"]);
    }

    #[test]
    fn test_prompt_choices_recorded() {
        let matrix = TaskMatrix::expand(&VariationInputs::new("[a,b] and [c,d]", "m"))
            .expect("should expand");
        assert_eq!(matrix.tasks()[3].prompt_choices, vec!["b", "d"]);
        assert_eq!(matrix.tasks()[3].prompt, "b and d");
    }

    #[test]
    fn test_display_includes_parameters() {
        let task = TaskSpec {
            sequence: 3,
            model: "image3".to_string(),
            style_reference: Some("ref.png".to_string()),
            composition_reference: None,
            prompt: "a cat".to_string(),
            prompt_choices: vec!["cat".to_string()],
            iteration: 2,
        };
        let rendered = task.to_string();
        assert!(rendered.starts_with("#3 model=image3"));
        assert!(rendered.contains("\"a cat\""));
        assert!(rendered.contains("style_reference=ref.png"));
        assert!(!rendered.contains("composition_reference"));
    }

    #[test]
    fn test_expansion_is_reproducible() {
        let inputs = VariationInputs::new("[a,b] [c,d]", "[m1,m2]").with_iterations(2);
        let first = TaskMatrix::expand(&inputs).expect("should expand").into_tasks();
        let second = TaskMatrix::expand(&inputs).expect("should expand").into_tasks();
        assert_eq!(first, second);
    }
}
