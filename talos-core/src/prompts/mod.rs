//! Named, versioned prompt templates with `{placeholder}` substitution.
//!
//! Templates live at `<root>/<name>/<version>.txt`, with a legacy
//! fallback at `<root>/<name>.txt`. Placeholders are `{identifier}`;
//! literal braces are written `{{` and `}}`. Rendering a placeholder with
//! no binding is a configuration error, not something to paper over.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt template '{name}' version '{version}' not found under {root:?}")]
    NotFound {
        name: String,
        version: String,
        root: PathBuf,
    },
    #[error("failed to read prompt template from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("prompt template '{name}' references unbound placeholder '{placeholder}'")]
    MissingPlaceholder { name: String, placeholder: String },
    #[error("prompt template '{name}' has an unterminated placeholder")]
    UnterminatedPlaceholder { name: String },
}

pub struct PromptLibrary {
    root: PathBuf,
}

impl PromptLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Load the `name`/`version` template and render it with the given
    /// bindings.
    pub fn load(
        &self,
        name: &str,
        version: &str,
        vars: &[(&str, &str)],
    ) -> Result<String, PromptError> {
        let versioned = self.root.join(name).join(format!("{version}.txt"));
        let legacy = self.root.join(format!("{name}.txt"));

        let path = if versioned.exists() {
            versioned
        } else if legacy.exists() {
            legacy
        } else {
            return Err(PromptError::NotFound {
                name: name.to_string(),
                version: version.to_string(),
                root: self.root.clone(),
            });
        };

        debug!(name, version, path = %path.display(), "loading prompt template");
        let template = read_template(&path)?;
        render(&template, name, vars)
    }
}

fn read_template(path: &Path) -> Result<String, PromptError> {
    fs::read_to_string(path).map_err(|source| PromptError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn render(template: &str, name: &str, vars: &[(&str, &str)]) -> Result<String, PromptError> {
    let mut output = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                output.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                output.push('}');
            }
            '{' => {
                let mut placeholder = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(inner) => placeholder.push(inner),
                        None => {
                            return Err(PromptError::UnterminatedPlaceholder {
                                name: name.to_string(),
                            });
                        }
                    }
                }
                let value = vars
                    .iter()
                    .find(|(key, _)| *key == placeholder)
                    .map(|(_, value)| *value)
                    .ok_or_else(|| PromptError::MissingPlaceholder {
                        name: name.to_string(),
                        placeholder: placeholder.clone(),
                    })?;
                output.push_str(value);
            }
            other => output.push(other),
        }
    }

    Ok(output)
}
