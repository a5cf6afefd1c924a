use std::{fmt::Write, path::Path, sync::LazyLock};

use indoc::formatdoc;
use regex::{Captures, Regex};
use serde::Deserialize;
use toml::Value;

use crate::{Config, error::Error};

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*env\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("env placeholder regex is valid")
});

pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())?;
    parse(&content)
}

pub fn parse(content: &str) -> crate::Result<Config> {
    let mut raw_config: Value = toml::from_str(content)?;

    expand_dynamic_strings(&mut Vec::new(), &mut raw_config)?;

    let config = Config::deserialize(raw_config)?;
    validate(&config)?;

    Ok(config)
}

pub(crate) fn validate(config: &Config) -> crate::Result<()> {
    let empty_override = config
        .models
        .override_model
        .as_deref()
        .is_some_and(|model| model.trim().is_empty());

    if empty_override {
        let message = formatdoc! {r#"
            The model override cannot be empty. Either remove it or name an upstream model:

              [models]
              override = "anthropic/claude-sonnet-4.5"
        "#};

        return Err(Error::Validation(message.trim_end().to_string()));
    }

    if let Err(err) = url::Url::parse(&config.upstream.base_url) {
        return Err(Error::Validation(format!(
            "Invalid upstream base_url '{}': {err}",
            config.upstream.base_url
        )));
    }

    if config.upstream.timeout.is_zero() {
        return Err(Error::Validation("Upstream timeout must be greater than zero".to_string()));
    }

    Ok(())
}

fn expand_dynamic_strings<'a>(path: &mut Vec<Result<&'a str, usize>>, value: &'a mut Value) -> crate::Result<()> {
    match value {
        Value::String(s) => {
            if let Some(expanded) = expand_env(s).map_err(|reason| Error::EnvVarSubstitution {
                path: render_path(path),
                reason,
            })? {
                *s = expanded;
            }
        }
        Value::Array(values) => {
            for (i, value) in values.iter_mut().enumerate() {
                path.push(Err(i));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Table(map) => {
            for (key, value) in map {
                path.push(Ok(key.as_str()));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Datetime(_) => (),
    }

    Ok(())
}

/// Replaces every `{{ env.NAME }}` in the string. Returns `None` when nothing was referenced.
fn expand_env(input: &str) -> Result<Option<String>, String> {
    if !ENV_VAR.is_match(input) {
        return Ok(None);
    }

    let mut missing = None;

    let expanded = ENV_VAR.replace_all(input, |captures: &Captures<'_>| {
        let name = &captures[1];

        std::env::var(name).unwrap_or_else(|_| {
            missing.get_or_insert_with(|| name.to_string());
            String::new()
        })
    });

    match missing {
        Some(name) => Err(format!("environment variable not found: `{name}`")),
        None => Ok(Some(expanded.into_owned())),
    }
}

fn render_path(path: &[Result<&str, usize>]) -> String {
    let mut p = String::new();

    for segment in path {
        match segment {
            Ok(s) => {
                p.push_str(s);
                p.push('.');
            }
            Err(i) => {
                let _ = write!(p, "[{i}]");
            }
        }
    }

    if p.ends_with('.') {
        p.pop();
    }

    p
}
