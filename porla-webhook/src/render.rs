//! Payload rendering.
//!
//! The template engine sits behind [`PayloadRenderer`] so it can be swapped
//! without touching the dispatcher or the pipeline. Event data is bound as
//! structured JSON values, so templates see objects and numbers rather than
//! pre-formatted strings.

use minijinja::{Environment, UndefinedBehavior, Value};
use porla_common::Variables;

use crate::error::RenderError;

/// Turns a payload template and the event's variables into a request body.
pub trait PayloadRenderer: Send + Sync {
    /// Render `template` with `variables` bound.
    ///
    /// # Errors
    ///
    /// Returns the engine's diagnostic if the template fails to compile or
    /// evaluate.
    fn render(&self, template: &str, variables: &Variables) -> Result<String, RenderError>;
}

/// The default engine: Jinja-style templates with a `tojson` filter.
///
/// ```text
/// {"event": {{ event_name|tojson }}, "name": {{ torrent.name|tojson }}}
/// ```
///
/// Undefined variables are errors, so a template written for one event
/// fails loudly instead of posting half-empty JSON for another.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateRenderer;

impl PayloadRenderer for TemplateRenderer {
    fn render(&self, template: &str, variables: &Variables) -> Result<String, RenderError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        env.render_str(template, Value::from_serialize(variables))
            .map_err(|e| RenderError::new(e.to_string()))
    }
}
