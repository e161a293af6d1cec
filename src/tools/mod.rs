//! Skill catalog adapter
//!
//! Turns the mediator's skill descriptors into the tool specs handed to the
//! model backend. The catalog is built once per run and never refreshed.

pub mod schema;

use serde_json::Value;

use crate::mediator::SkillDescriptor;

/// A tool as offered to the model; `name` is the skill name unchanged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&SkillDescriptor> for ToolSpec {
    fn from(skill: &SkillDescriptor) -> Self {
        Self {
            name: skill.name.clone(),
            description: skill.description.clone(),
            parameters: skill.input_schema.clone(),
        }
    }
}

/// Ordered set of tools available for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCatalog {
    tools: Vec<ToolSpec>,
}

impl ToolCatalog {
    /// Adapt validated descriptors, keeping the mediator's order
    pub fn from_skills(skills: &[SkillDescriptor]) -> Self {
        Self {
            tools: skills.iter().map(ToolSpec::from).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|tool| tool.name == name)
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::schema::{object_schema, string_prop};
    use super::*;
    use pretty_assertions::assert_eq;

    fn lookup() -> SkillDescriptor {
        SkillDescriptor::new(
            "lookup",
            "Look up a record",
            object_schema()
                .property("x", string_prop("Record key"), true)
                .build(),
        )
    }

    #[test]
    fn test_adapt_keeps_name_and_schema() {
        let skill = lookup();
        let spec = ToolSpec::from(&skill);

        assert_eq!(spec.name, skill.name);
        assert_eq!(spec.description, "Look up a record");
        assert_eq!(spec.parameters, skill.input_schema);
    }

    #[test]
    fn test_adapt_is_pure() {
        let skill = lookup();
        assert_eq!(ToolSpec::from(&skill), ToolSpec::from(&skill));
        assert_eq!(
            ToolCatalog::from_skills(&[skill.clone()]),
            ToolCatalog::from_skills(&[skill])
        );
    }

    #[test]
    fn test_catalog_lookup_and_order() {
        let notes = SkillDescriptor::new("notes", "", object_schema().build());
        let catalog = ToolCatalog::from_skills(&[notes, lookup()]);

        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("lookup"));
        assert!(!catalog.contains("missing"));
        assert_eq!(catalog.specs()[0].name, "notes");
        assert_eq!(catalog.specs()[1].description, "Look up a record");
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = ToolCatalog::from_skills(&[]);
        assert!(catalog.is_empty());
        assert_eq!(catalog, ToolCatalog::default());
    }
}
