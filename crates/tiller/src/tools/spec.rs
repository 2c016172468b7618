//! Structured tool descriptions with usage guidance.
//!
//! Sandbox tools describe themselves through a [`ToolSpec`] rather than a
//! hand-written string. The spec renders (via `Display`) into the
//! description carried by a [`ToolDef`], one labelled section per line:
//!
//! ```text
//! Read a file.
//! When to use: ...
//! When NOT to use: ...
//! Examples:
//!   - Input: read_file(path='Cargo.toml') → [package] ...
//! Output format: ...
//! Disambiguation:
//!   - Need matching lines only: Use 'search' instead: ...
//! ```
//!
//! Empty sections are left out.

use std::fmt;

use crate::ToolDef;

/// A structured tool specification.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    /// Imperative one-liner, rendered with a trailing period.
    pub purpose: String,
    pub when_to_use: String,
    pub when_not_to_use: String,
    /// JSON Schema of the arguments object.
    pub parameters: serde_json::Value,
    pub examples: Vec<UsageExample>,
    pub output_format: String,
    pub confusions: Vec<Confusion>,
}

/// A sample call and what it returns.
#[derive(Debug, Clone)]
pub struct UsageExample {
    pub call: String,
    pub result: String,
}

/// A situation where the model tends to pick this tool but another one fits.
#[derive(Debug, Clone)]
pub struct Confusion {
    pub scenario: String,
    pub use_instead: String,
    pub reason: String,
}

impl ToolSpec {
    /// Start a spec with an empty object schema and `Plain text` output.
    pub fn builder(name: impl Into<String>) -> ToolSpecBuilder {
        let name = name.into();
        ToolSpecBuilder {
            spec: ToolSpec {
                purpose: name.clone(),
                name,
                when_to_use: String::new(),
                when_not_to_use: String::new(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
                examples: Vec::new(),
                output_format: "Plain text".to_string(),
                confusions: Vec::new(),
            },
        }
    }

    pub fn to_description(&self) -> String {
        self.to_string()
    }

    pub fn to_tool_def(&self) -> ToolDef {
        ToolDef::new(
            self.name.clone(),
            self.to_description(),
            self.parameters.clone(),
        )
    }
}

impl fmt::Display for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.", self.purpose)?;
        for (label, text) in [
            ("When to use", &self.when_to_use),
            ("When NOT to use", &self.when_not_to_use),
        ] {
            if !text.is_empty() {
                write!(f, "\n{label}: {text}")?;
            }
        }
        if !self.examples.is_empty() {
            f.write_str("\nExamples:")?;
            for ex in &self.examples {
                write!(f, "\n  - Input: {} → {}", ex.call, ex.result)?;
            }
        }
        if !self.output_format.is_empty() {
            write!(f, "\nOutput format: {}", self.output_format)?;
        }
        if !self.confusions.is_empty() {
            f.write_str("\nDisambiguation:")?;
            for c in &self.confusions {
                write!(
                    f,
                    "\n  - {}: Use '{}' instead: {}",
                    c.scenario, c.use_instead, c.reason
                )?;
            }
        }
        Ok(())
    }
}

/// Builder for [`ToolSpec`]. Every field has a default, so `build` cannot
/// fail.
pub struct ToolSpecBuilder {
    spec: ToolSpec,
}

impl ToolSpecBuilder {
    pub fn purpose(mut self, purpose: impl Into<String>) -> Self {
        self.spec.purpose = purpose.into();
        self
    }

    pub fn when_to_use(mut self, when: impl Into<String>) -> Self {
        self.spec.when_to_use = when.into();
        self
    }

    pub fn when_not_to_use(mut self, when_not: impl Into<String>) -> Self {
        self.spec.when_not_to_use = when_not.into();
        self
    }

    pub fn parameters(mut self, schema: serde_json::Value) -> Self {
        self.spec.parameters = schema;
        self
    }

    /// Use the schema derived from the typed argument struct the tool
    /// deserializes into.
    pub fn parameters_for<T: schemars::JsonSchema>(self) -> Self {
        self.parameters(crate::json_schema_for::<T>())
    }

    pub fn example(mut self, call: impl Into<String>, result: impl Into<String>) -> Self {
        self.spec.examples.push(UsageExample {
            call: call.into(),
            result: result.into(),
        });
        self
    }

    pub fn output_format(mut self, format: impl Into<String>) -> Self {
        self.spec.output_format = format.into();
        self
    }

    pub fn disambiguate(
        mut self,
        scenario: impl Into<String>,
        use_instead: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        self.spec.confusions.push(Confusion {
            scenario: scenario.into(),
            use_instead: use_instead.into(),
            reason: reason.into(),
        });
        self
    }

    pub fn to_tool_def(self) -> ToolDef {
        self.spec.to_tool_def()
    }

    pub fn build(self) -> ToolSpec {
        self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SandboxConfig;
    use crate::tools::{ToolSet, names};

    #[test]
    fn sections_render_in_fixed_order() {
        let desc = ToolSpec::builder(names::LIST_DIR)
            .disambiguate("Looking for a symbol", names::SEARCH, "search reads contents")
            .output_format("One entry per line")
            .example("list_dir(path='src')", "lib.rs")
            .when_not_to_use("When you know the file")
            .when_to_use("When exploring")
            .purpose("List a directory")
            .build()
            .to_description();

        let positions: Vec<usize> = [
            "List a directory.",
            "\nWhen to use: When exploring",
            "\nWhen NOT to use: When you know the file",
            "\nExamples:\n  - Input: list_dir(path='src') → lib.rs",
            "\nOutput format: One entry per line",
            "\nDisambiguation:\n  - Looking for a symbol: Use 'search' instead: search reads contents",
        ]
        .iter()
        .map(|section| desc.find(section).unwrap_or_else(|| panic!("missing {section:?} in {desc}")))
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{desc}");
    }

    #[test]
    fn bare_spec_renders_name_and_default_output() {
        let spec = ToolSpec::builder("bare").build();
        assert_eq!(spec.to_description(), "bare.\nOutput format: Plain text");
        assert_eq!(spec.parameters["type"], "object");
    }

    #[test]
    fn tool_def_carries_typed_schema() {
        #[derive(serde::Deserialize, schemars::JsonSchema)]
        #[allow(dead_code)]
        struct Args {
            path: String,
        }
        let def = ToolSpec::builder(names::READ_FILE)
            .purpose("Read a file")
            .parameters_for::<Args>()
            .to_tool_def();
        assert_eq!(def.function.name, "read_file");
        assert_eq!(def.function.parameters["required"][0], "path");
    }

    #[test]
    fn sandbox_disambiguation_points_at_real_tools() {
        let dir = tempfile::tempdir().unwrap();
        let tools = ToolSet::sandbox(&SandboxConfig::default().with_workdir(dir.path())).unwrap();
        for def in tools.definitions() {
            for chunk in def.function.description.split("Use '").skip(1) {
                let named = chunk.split('\'').next().unwrap_or_default();
                assert!(
                    names::ALL.contains(&named),
                    "{} refers to unknown tool '{named}'",
                    def.function.name
                );
            }
        }
    }
}
