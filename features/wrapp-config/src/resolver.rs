use serde_yaml::Value;

use crate::errors::ConfigError;

/// Supplies values for `@name(key#default)` placeholders in the config document
///
/// ```yaml
/// http:
///   port: "@env(HTTP_PORT#8080)"
/// ```
pub trait Resolver {
    /// The placeholder name this resolver answers to
    fn name(&self) -> &str;

    /// The value for `key`, `None` falls back to the placeholder's default
    fn value(&self, key: &str) -> Option<String>;
}

/// Resolves `@env(NAME#default)` from environment variables
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvResolver;

impl Resolver for EnvResolver {
    fn name(&self) -> &str {
        "env"
    }

    fn value(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Replaces placeholders in every string of the document
pub(crate) fn resolve_document(
    document: &mut Value,
    resolvers: &[Box<dyn Resolver>],
) -> Result<(), ConfigError> {
    match document {
        Value::String(text) => {
            if let Some(resolved) = resolve_text(text, resolvers)? {
                *document = resolved;
            }
        }
        Value::Sequence(items) => {
            for item in items {
                resolve_document(item, resolvers)?;
            }
        }
        Value::Mapping(mapping) => {
            for (_, value) in mapping.iter_mut() {
                resolve_document(value, resolvers)?;
            }
        }
        Value::Tagged(tagged) => resolve_document(&mut tagged.value, resolvers)?,
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
    Ok(())
}

/// `None` if the text holds no placeholder
///
/// A text that is a single placeholder becomes a number or bool when the value reads as one.
fn resolve_text(text: &str, resolvers: &[Box<dyn Resolver>]) -> Result<Option<Value>, ConfigError> {
    let mut resolved = text.to_string();
    let mut replaced = 0;
    let mut whole = false;

    for resolver in resolvers {
        let prefix = format!("@{}(", resolver.name());
        let mut output = String::with_capacity(resolved.len());
        let mut rest = resolved.as_str();

        while let Some(start) = rest.find(&prefix) {
            let argument = &rest[start + prefix.len()..];
            let Some(end) = argument.find(')') else {
                break;
            };

            let (key, default) = match argument[..end].split_once('#') {
                Some((key, default)) => (key, Some(default)),
                None => (&argument[..end], None),
            };
            let value = match (resolver.value(key), default) {
                (Some(value), _) => value,
                (None, Some(default)) => default.to_string(),
                (None, None) => {
                    return Err(ConfigError::Unresolved {
                        resolver: resolver.name().to_string(),
                        key: key.to_string(),
                    })
                }
            };

            whole = replaced == 0 && start == 0 && end + 1 == argument.len();
            output.push_str(&rest[..start]);
            output.push_str(&value);
            rest = &argument[end + 1..];
            replaced += 1;
        }

        output.push_str(rest);
        resolved = output;
    }

    if replaced == 0 {
        return Ok(None);
    }
    if replaced == 1 && whole {
        if let Ok(scalar @ (Value::Number(_) | Value::Bool(_))) =
            serde_yaml::from_str::<Value>(&resolved)
        {
            return Ok(Some(scalar));
        }
    }
    Ok(Some(Value::String(resolved)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    struct Vault(HashMap<&'static str, &'static str>);

    impl Resolver for Vault {
        fn name(&self) -> &str {
            "vault"
        }

        fn value(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|value| value.to_string())
        }
    }

    fn resolvers() -> Vec<Box<dyn Resolver>> {
        vec![
            Box::new(Vault(HashMap::from([("db/password", "hunter2"), ("db/port", "5432")]))),
            Box::new(EnvResolver),
        ]
    }

    #[test]
    fn placeholders_inside_text_are_replaced() {
        let resolved = resolve_text("postgres://app:@vault(db/password)@db", &resolvers()).unwrap();
        assert_eq!(resolved, Some(Value::String("postgres://app:hunter2@db".into())));
    }

    #[test]
    fn whole_placeholder_keeps_its_scalar_type() {
        let resolved = resolve_text("@vault(db/port)", &resolvers()).unwrap();
        assert_eq!(resolved, Some(Value::Number(5432.into())));

        let resolved = resolve_text("@env(WRAPP_CONFIG_TEST_UNSET#true)", &resolvers()).unwrap();
        assert_eq!(resolved, Some(Value::Bool(true)));
    }

    #[test]
    fn missing_value_falls_back_to_default() {
        let resolved = resolve_text("@env(WRAPP_CONFIG_TEST_UNSET#DEV)", &resolvers()).unwrap();
        assert_eq!(resolved, Some(Value::String("DEV".into())));
    }

    #[test]
    fn missing_value_without_default_fails() {
        let result = resolve_text("@vault(db/user)", &resolvers());
        assert!(matches!(
            result,
            Err(ConfigError::Unresolved { resolver, key }) if resolver == "vault" && key == "db/user"
        ));
    }

    #[test]
    fn plain_text_is_left_alone() {
        assert_eq!(resolve_text("user@example.com", &resolvers()).unwrap(), None);
        assert_eq!(resolve_text("@env(UNCLOSED", &resolvers()).unwrap(), None);
    }

    #[test]
    fn nested_values_are_resolved() {
        let mut document: Value =
            serde_yaml::from_str("db:\n  hosts: ['@vault(db/port)', plain]\n").unwrap();
        resolve_document(&mut document, &resolvers()).unwrap();

        let expected: Value = serde_yaml::from_str("db:\n  hosts: [5432, plain]\n").unwrap();
        assert_eq!(document, expected);
    }
}
