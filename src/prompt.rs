// src/prompt.rs

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, ScanError};

/// The extraction prompt shipped with the crate.
const RECEIPT_TEMPLATE: &str = include_str!("../prompts/receipt.txt");

/// Placeholders look like `{context}`: a bare identifier in braces.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid placeholder regex"));

/// Template store boundary: resolve a template name to its source text.
pub trait TemplateStore: Send + Sync {
    fn load(&self, name: &str) -> Result<String>;
}

/// The templates compiled into the crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedTemplates;

impl TemplateStore for EmbeddedTemplates {
    fn load(&self, name: &str) -> Result<String> {
        match name {
            "receipt" => Ok(RECEIPT_TEMPLATE.to_string()),
            other => Err(ScanError::TemplateNotFound(other.to_string())),
        }
    }
}

/// Templates read from `<dir>/<name>.txt`, for overriding the shipped
/// prompts without recompiling.
#[derive(Debug, Clone)]
pub struct FsTemplateStore {
    dir: PathBuf,
}

impl FsTemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> FsTemplateStore {
        FsTemplateStore { dir: dir.into() }
    }
}

impl TemplateStore for FsTemplateStore {
    fn load(&self, name: &str) -> Result<String> {
        let path = self.dir.join(format!("{name}.txt"));
        fs::read_to_string(&path).map_err(|_| ScanError::TemplateNotFound(name.to_string()))
    }
}

/// Load the named template and substitute every placeholder from `context`.
///
/// A placeholder with no matching context key is an error — a silently
/// empty substitution would send the model a prompt with a hole in it.
pub fn render(
    store: &dyn TemplateStore,
    name: &str,
    context: &HashMap<String, String>,
) -> Result<String> {
    let source = store.load(name)?;

    for caps in PLACEHOLDER.captures_iter(&source) {
        let key = &caps[1];
        if !context.contains_key(key) {
            return Err(ScanError::MissingContextKey {
                template: name.to_string(),
                key: key.to_string(),
            });
        }
    }

    Ok(PLACEHOLDER
        .replace_all(&source, |caps: &regex::Captures| context[&caps[1]].clone())
        .into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(key: &str, value: &str) -> HashMap<String, String> {
        HashMap::from([(key.to_string(), value.to_string())])
    }

    #[test]
    fn test_renders_context_into_receipt_template() {
        let prompt = render(&EmbeddedTemplates, "receipt", &context("context", "hello world")).unwrap();
        assert!(prompt.contains("hello world"));
        assert!(!prompt.contains("{context}"));
    }

    #[test]
    fn test_unknown_template_fails() {
        let err = render(&EmbeddedTemplates, "warranty", &HashMap::new()).unwrap_err();
        assert!(matches!(err, ScanError::TemplateNotFound(name) if name == "warranty"));
    }

    #[test]
    fn test_missing_context_key_fails() {
        let err = render(&EmbeddedTemplates, "receipt", &HashMap::new()).unwrap_err();
        assert!(matches!(
            err,
            ScanError::MissingContextKey { key, .. } if key == "context"
        ));
    }

    #[test]
    fn test_schema_braces_are_not_placeholders() {
        // The shipped template contains a JSON schema block; only the
        // single {context} placeholder should need a context key.
        let prompt = render(&EmbeddedTemplates, "receipt", &context("context", "x")).unwrap();
        assert!(prompt.contains("\"totalAmount\""));
    }

    #[test]
    fn test_fs_store_loads_and_misses() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("greeting.txt"), "hi {name}!").unwrap();

        let store = FsTemplateStore::new(dir.path());
        let prompt = render(&store, "greeting", &context("name", "Helge")).unwrap();
        assert_eq!(prompt, "hi Helge!");

        let err = render(&store, "missing", &HashMap::new()).unwrap_err();
        assert!(matches!(err, ScanError::TemplateNotFound(_)));
    }
}
