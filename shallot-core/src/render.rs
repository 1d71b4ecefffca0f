// Template rendering hand-off

use crate::Error;
use crate::response::ResponseWriter;
use http::StatusCode;
use http::header::{CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use serde_json::Value;

/// A request to render `template` with `data`.
///
/// Returning one from a handler hands it to whatever [`Renderer`] is bound in
/// the container as `dyn Renderer`.
#[derive(Debug, Clone)]
pub struct Render {
    pub template: String,
    pub data: Value,
    pub status: Option<StatusCode>,
}

impl Render {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            data: Value::Null,
            status: None,
        }
    }

    /// Attach serializable data.
    pub fn data<T: Serialize>(mut self, data: &T) -> Result<Self, Error> {
        self.data = serde_json::to_value(data).map_err(|e| Error::Render(e.to_string()))?;
        Ok(self)
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }
}

/// Turns a [`Render`] into response bytes.
pub trait Renderer: Send + Sync {
    fn render(&self, render: &Render, response: &ResponseWriter) -> Result<(), Error>;
}

/// Renders the data as JSON and ignores the template name.
#[derive(Debug, Clone, Default)]
pub struct JsonRenderer {
    pub pretty: bool,
}

impl Renderer for JsonRenderer {
    fn render(&self, render: &Render, response: &ResponseWriter) -> Result<(), Error> {
        let body = if self.pretty {
            serde_json::to_vec_pretty(&render.data)
        } else {
            serde_json::to_vec(&render.data)
        }
        .map_err(|e| Error::Render(e.to_string()))?;

        response.set_header(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        response.write_header(render.status.unwrap_or(StatusCode::OK))?;
        response.write(&body)?;
        Ok(())
    }
}
