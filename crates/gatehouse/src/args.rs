//! named argument schema and parsing for operations.

use std::collections::BTreeMap;

use crate::error::Error;
use crate::Result;

/// one named argument an operation accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    /// name without the leading `--`.
    pub name: &'static str,
    /// short help line.
    pub help: &'static str,
    /// whether the argument must be given.
    pub required: bool,
    /// whether the argument is a value-less switch.
    pub flag: bool,
    /// permitted values, empty meaning anything.
    pub allowed: &'static [&'static str],
    /// value used when the argument is absent.
    pub default: Option<&'static str>,
}

impl ArgSpec {
    /// a required `--name value` argument.
    pub const fn required(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            required: true,
            flag: false,
            allowed: &[],
            default: None,
        }
    }

    /// an optional `--name value` argument.
    pub const fn optional(name: &'static str, help: &'static str) -> Self {
        Self {
            required: false,
            ..Self::required(name, help)
        }
    }

    /// an optional `--name` switch.
    pub const fn flag(name: &'static str, help: &'static str) -> Self {
        Self {
            flag: true,
            ..Self::optional(name, help)
        }
    }

    /// restrict the permitted values.
    pub const fn allowed(mut self, values: &'static [&'static str]) -> Self {
        self.allowed = values;
        self
    }

    /// value used when the argument is absent.
    pub const fn default_value(mut self, value: &'static str) -> Self {
        self.default = Some(value);
        self
    }
}

/// parsed arguments of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments {
    values: BTreeMap<String, String>,
}

impl Arguments {
    /// parse `tokens` against `specs`.
    ///
    /// every problem is collected and reported in one validation error.
    /// `help` or `?` as the first token asks for the usage text.
    pub fn parse(specs: &[ArgSpec], tokens: &[String], usage: &str) -> Result<Self> {
        if matches!(tokens.first().map(String::as_str), Some("help" | "?" | "--help")) {
            return Err(Error::MissingArguments(usage.to_string()));
        }

        let mut values = BTreeMap::new();
        let mut problems = Vec::new();
        let mut iter = tokens.iter().peekable();

        while let Some(token) = iter.next() {
            let Some(raw) = token.strip_prefix("--") else {
                problems.push(format!("unexpected argument {token:?}"));
                continue;
            };
            let (name, inline) = match raw.split_once('=') {
                Some((name, value)) => (name, Some(value.to_string())),
                None => (raw, None),
            };
            let Some(spec) = specs.iter().find(|s| s.name == name) else {
                problems.push(format!("unknown argument --{name}"));
                continue;
            };

            let value = if spec.flag {
                if inline.is_some() {
                    problems.push(format!("--{name} takes no value"));
                    continue;
                }
                "true".to_string()
            } else if let Some(value) = inline {
                value
            } else {
                match iter.next_if(|next| !next.starts_with("--")) {
                    Some(value) => value.clone(),
                    None => {
                        problems.push(format!("--{name} needs a value"));
                        continue;
                    }
                }
            };

            if !spec.allowed.is_empty() && !spec.allowed.contains(&value.as_str()) {
                problems.push(format!(
                    "--{name} must be one of {}, got {value:?}",
                    spec.allowed.join(", ")
                ));
                continue;
            }
            values.insert(name.to_string(), value);
        }

        let mut missing = Vec::new();
        for spec in specs {
            if values.contains_key(spec.name) {
                continue;
            }
            match spec.default {
                Some(default) => {
                    values.insert(spec.name.to_string(), default.to_string());
                }
                None if spec.required => missing.push(format!("--{}", spec.name)),
                None => {}
            }
        }

        if !missing.is_empty() {
            problems.push(format!("missing required arguments: {}", missing.join(", ")));
            return Err(Error::MissingArguments(format!("{}\n{usage}", problems.join(" ; "))));
        }
        if !problems.is_empty() {
            return Err(Error::Validation(problems.join(" ; ")));
        }
        Ok(Self { values })
    }

    /// build arguments directly, for callers that already hold the values.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// value of an argument, if given or defaulted.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// value of an argument the schema marks as required.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| Error::MissingArguments(format!("missing required argument --{name}")))
    }

    /// whether a switch was given.
    pub fn flag(&self, name: &str) -> bool {
        self.get(name) == Some("true")
    }
}

/// render the usage text of an operation.
pub fn usage(name: &str, description: &str, specs: &[ArgSpec]) -> String {
    let mut out = format!("usage: {name}");
    for spec in specs {
        let shown = if spec.flag {
            format!("--{}", spec.name)
        } else {
            format!("--{} <{}>", spec.name, spec.name)
        };
        if spec.required {
            out.push_str(&format!(" {shown}"));
        } else {
            out.push_str(&format!(" [{shown}]"));
        }
    }
    out.push_str(&format!("\n\n{description}\n"));
    for spec in specs {
        out.push_str(&format!("  --{:<14} {}", spec.name, spec.help));
        if !spec.allowed.is_empty() {
            out.push_str(&format!(" ({})", spec.allowed.join("|")));
        }
        if let Some(default) = spec.default {
            out.push_str(&format!(" [default: {default}]"));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: &[ArgSpec] = &[
        ArgSpec::required("group", "group name"),
        ArgSpec::required("account", "account name"),
        ArgSpec::optional("role", "role").allowed(&["member", "owner"]).default_value("member"),
        ArgSpec::flag("force", "skip checks"),
    ];

    fn tokens(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_parse_values_flags_and_defaults() {
        let args = Arguments::parse(SPECS, &tokens("--group ops --account=bob --force"), "").unwrap();
        assert_eq!(args.get("group"), Some("ops"));
        assert_eq!(args.get("account"), Some("bob"));
        assert_eq!(args.get("role"), Some("member"));
        assert!(args.flag("force"));
    }

    #[test]
    fn test_all_problems_reported_together() {
        let err = Arguments::parse(SPECS, &tokens("--group ops --role king --bogus stray"), "")
            .unwrap_err();
        let Error::MissingArguments(text) = err else {
            panic!("expected missing arguments, got {err:?}");
        };
        assert!(text.contains("--role must be one of"));
        assert!(text.contains("unknown argument --bogus"));
        assert!(text.contains("missing required arguments: --account"));
        assert!(text.contains(" ; "));
    }

    #[test]
    fn test_invalid_value_is_validation_error() {
        let err = Arguments::parse(SPECS, &tokens("--group ops --account bob --role king"), "")
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_help_returns_usage() {
        let text = usage("group member add", "add a member", SPECS);
        let err = Arguments::parse(SPECS, &tokens("?"), &text).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("usage: group member add --group <group>"));
    }

    #[test]
    fn test_missing_value() {
        let err = Arguments::parse(SPECS, &tokens("--account bob --group"), "").unwrap_err();
        assert!(err.to_string().contains("--group needs a value"));
    }
}
