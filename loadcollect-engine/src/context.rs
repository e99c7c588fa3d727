use loadcollect_common::{CollectError, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Identity of the experiment whose action is being run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExperimentRef {
    pub namespace: String,
    pub name: String,
}

impl ExperimentRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into() }
    }
}

impl fmt::Display for ExperimentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Everything a task needs to know about the run it belongs to. Passed explicitly
/// to every task.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub experiment: ExperimentRef,
    /// Values substituted for `{{ key }}` placeholders in task inputs.
    pub tags: BTreeMap<String, String>,
}

impl ExecutionContext {
    pub fn new(experiment: ExperimentRef) -> Self {
        Self { experiment, tags: BTreeMap::new() }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Replace every `{{ key }}` (or `{{ .key }}`) in `template` with its tag value.
    ///
    /// An unknown key or an unterminated placeholder is a configuration error.
    pub fn interpolate(&self, template: &str) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find("{{") {
            out.push_str(&rest[..open]);
            let after_open = &rest[open + 2..];
            let close = after_open.find("}}").ok_or_else(|| {
                CollectError::Config(format!("unterminated placeholder in {template:?}"))
            })?;
            let key = after_open[..close].trim();
            let key = key.strip_prefix('.').unwrap_or(key);
            let value = self
                .tags
                .get(key)
                .ok_or_else(|| CollectError::Config(format!("unknown tag {key:?} in {template:?}")))?;
            out.push_str(value);
            rest = &after_open[close + 2..];
        }

        out.push_str(rest);
        Ok(out)
    }
}
