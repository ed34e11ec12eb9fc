use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use thin_agent_model::{ModelTool, ToolCallRequest, ToolCallResult};
use tracing::Instrument;

use crate::tool::Tool;
use crate::tool::object::{ToolObject, ToolObjectImpl};
use crate::tool::{Error, ToolResult};

/// An object that manages toolset and handles requests from the model.
#[derive(Default)]
pub(crate) struct Manager {
    tools: HashMap<String, Arc<dyn ToolObject>>,
}

impl Manager {
    /// Registers a tool, replacing any tool with the same name.
    pub fn add_tool<T: Tool>(&mut self, tool: T) {
        let name = tool.name().to_owned();
        if self
            .tools
            .insert(name.clone(), Arc::new(ToolObjectImpl(tool)))
            .is_some()
        {
            warn!("tool {name} registered twice, keeping the last one");
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Returns the tool definitions, sorted by name so that requests are
    /// stable between runs.
    pub fn definitions(&self) -> Vec<ModelTool> {
        let mut definitions: Vec<_> = self
            .tools
            .values()
            .map(|tool| ModelTool {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.parameter_schema().clone(),
            })
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Runs one tool call to completion.
    ///
    /// Failures are not propagated, they become the content of the result
    /// so that the model can react to them.
    pub async fn call(&self, req: ToolCallRequest) -> ToolCallResult {
        let ToolCallRequest {
            id,
            name,
            arguments,
        } = req;
        let span = info_span!("tool call", tool = %name, id = %id);

        let result = match self.tools.get(&name) {
            Some(tool) => {
                trace!(parent: &span, "arguments: {arguments}");
                Arc::clone(tool).execute(arguments).instrument(span.clone()).await
            }
            None => {
                warn!(parent: &span, "model called an unknown tool");
                Err(Error::not_found().with_reason(format!("no tool named `{name}`")))
            }
        };

        ToolCallResult {
            id,
            content: render_result(result, &span),
        }
    }
}

fn render_result(result: ToolResult, span: &tracing::Span) -> String {
    match result {
        Ok(content) => content,
        Err(err) => {
            debug!(parent: span, "tool failed: {err}");
            json!({ "success": false, "error": err.to_string() }).to_string()
        }
    }
}
