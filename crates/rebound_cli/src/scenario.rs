//! Scripted gesture scenarios

use anyhow::{bail, Context, Result};
use rebound_refresh::RefreshPhase;
use serde::Deserialize;
use std::path::Path;

/// A sequence of gesture steps replayed against one list
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    /// Initial height of the scrollable content beyond the viewport
    #[serde(default)]
    pub scrollable_height: f32,
    pub steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Load a scenario from JSON text.
    pub fn from_json(input: &str) -> Result<Self> {
        let scenario: Self = serde_json::from_str(input)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load a scenario from file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::from_json(&raw)
    }

    fn validate(&self) -> Result<()> {
        let mut pressed = false;
        for (index, step) in self.steps.iter().enumerate() {
            match step {
                ScenarioStep::Press if pressed => {
                    bail!("step {index}: press while already pressed")
                }
                ScenarioStep::Press => pressed = true,
                ScenarioStep::Release if !pressed => {
                    bail!("step {index}: release without a press")
                }
                ScenarioStep::Release => pressed = false,
                ScenarioStep::Drag { .. } | ScenarioStep::Hold { .. } if !pressed => {
                    bail!("step {index}: {} outside a press", step.name())
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// One scripted step. Distances are pull distances in logical pixels, so the
/// same script works for either pull direction.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Manipulation starts
    Press,
    /// Move linearly to a pull distance
    Drag { to: f32, over_ms: u64 },
    /// Keep the current pull distance
    Hold { ms: u64 },
    /// Manipulation completes
    Release,
    /// Let frames run without a manipulation
    Wait { ms: u64 },
    /// The list content changed height
    ResizeContent { height: f32 },
    ExpectPhase { phase: RefreshPhase },
    ExpectRefreshes { count: usize },
}

impl ScenarioStep {
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioStep::Press => "press",
            ScenarioStep::Drag { .. } => "drag",
            ScenarioStep::Hold { .. } => "hold",
            ScenarioStep::Release => "release",
            ScenarioStep::Wait { .. } => "wait",
            ScenarioStep::ResizeContent { .. } => "resize_content",
            ScenarioStep::ExpectPhase { .. } => "expect_phase",
            ScenarioStep::ExpectRefreshes { .. } => "expect_refreshes",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_steps() {
        let scenario = Scenario::from_json(
            r#"{
                "name": "pull and release",
                "steps": [
                    { "type": "press" },
                    { "type": "drag", "to": 60.0, "over_ms": 120 },
                    { "type": "hold", "ms": 50 },
                    { "type": "drag", "to": 0.0, "over_ms": 160 },
                    { "type": "release" },
                    { "type": "expect_phase", "phase": "loading" },
                    { "type": "wait", "ms": 3000 },
                    { "type": "expect_refreshes", "count": 1 }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(scenario.steps.len(), 8);
        assert_eq!(scenario.scrollable_height, 0.0);
        assert!(matches!(
            scenario.steps[5],
            ScenarioStep::ExpectPhase {
                phase: RefreshPhase::Loading
            }
        ));
    }

    #[test]
    fn test_rejects_drag_without_press() {
        let err = Scenario::from_json(
            r#"{ "steps": [ { "type": "drag", "to": 10.0, "over_ms": 16 } ] }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("drag outside a press"));
    }

    #[test]
    fn test_rejects_unknown_step() {
        assert!(Scenario::from_json(r#"{ "steps": [ { "type": "fling" } ] }"#).is_err());
    }
}
