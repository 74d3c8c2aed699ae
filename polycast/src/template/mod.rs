//! Template registry.
//!
//! Built-in presets are seeded on construction and can never be removed;
//! user templates follow them in creation order.

use tracing::info;

use crate::domain::{
    EncodingSettings, OutputTemplate, StreamOrientation, StreamingService, builtin_templates,
};
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: Vec<OutputTemplate>,
}

impl TemplateRegistry {
    /// A registry holding only the built-in presets.
    pub fn with_builtins() -> Self {
        Self {
            templates: builtin_templates(),
        }
    }

    /// Create a custom template.
    pub fn create(
        &mut self,
        name: impl Into<String>,
        service: StreamingService,
        orientation: StreamOrientation,
        encoding: EncodingSettings,
    ) -> Result<&OutputTemplate> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::validation("Template name must not be empty"));
        }
        let template = OutputTemplate::custom(name, service, orientation, encoding);
        info!(template_id = %template.id, name = %template.name, "Created template");
        self.insert_custom(template)
    }

    /// Add an already-built custom template, keeping its id.
    pub fn insert_custom(&mut self, mut template: OutputTemplate) -> Result<&OutputTemplate> {
        if self.get(&template.id).is_some() {
            return Err(Error::validation(format!(
                "Template id '{}' already exists",
                template.id
            )));
        }
        template.is_builtin = false;
        self.templates.push(template);
        Ok(&self.templates[self.templates.len() - 1])
    }

    /// Delete a custom template. Built-ins are immutable.
    pub fn delete(&mut self, id: &str) -> Result<OutputTemplate> {
        let position = self
            .templates
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| Error::not_found("Template", id))?;
        if self.templates[position].is_builtin {
            return Err(Error::validation(format!(
                "Built-in template '{}' cannot be deleted",
                self.templates[position].name
            )));
        }
        let removed = self.templates.remove(position);
        info!(template_id = %removed.id, "Deleted template");
        Ok(removed)
    }

    pub fn get(&self, id: &str) -> Option<&OutputTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn get_at(&self, index: usize) -> Option<&OutputTemplate> {
        self.templates.get(index)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutputTemplate> {
        self.templates.iter()
    }

    /// User-defined templates only; these are what gets persisted.
    pub fn customs(&self) -> impl Iterator<Item = &OutputTemplate> {
        self.templates.iter().filter(|t| !t.is_builtin)
    }

    /// Drop every custom template.
    pub(crate) fn clear_customs(&mut self) {
        self.templates.retain(|t| t.is_builtin);
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
