//! Job spec grammar
//!
//! A job spec is the serialized identity of a single invocation:
//! `NAME[:PARAMS]` where PARAMS is a comma-separated list of positional
//! tokens followed by `key=value` tokens. Values may be bare, single-
//! or double-quoted; quotes protect commas and spaces.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// Parameter names with reserved meaning, stripped before dispatch.
/// The heartbeat override keeps its historical wire name for
/// compatibility with specs produced by older deployments.
pub const TASK_ID_PARAM: &str = "task_id";
pub const HEARTBEAT_ID_PARAM: &str = "cronitor_id";

/// Parsed job spec: job name plus positional and named arguments.
///
/// Named arguments are kept sorted by key so that formatting a parsed
/// spec is deterministic and `parse . format` is the identity on
/// canonical specs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub name: String,
    pub args: Vec<String>,
    pub kwargs: BTreeMap<String, String>,
}

impl JobSpec {
    pub fn parse(spec: &str) -> Result<Self> {
        let (name, params) = match spec.split_once(':') {
            Some((name, params)) => (name, params),
            None => (spec, ""),
        };
        if name.is_empty() {
            return Err(Error::InvalidParams(format!(
                "job spec {spec:?} has an empty job name"
            )));
        }
        let (args, kwargs) = if params.is_empty() {
            (Vec::new(), BTreeMap::new())
        } else {
            parse_params(params)?
        };
        Ok(Self {
            name: name.to_string(),
            args,
            kwargs,
        })
    }

    /// Remove and return a reserved named argument.
    pub fn take_kwarg(&mut self, key: &str) -> Option<String> {
        self.kwargs.remove(key)
    }
}

impl fmt::Display for JobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        let mut tokens: Vec<String> = self.args.iter().map(|a| quote_value(a)).collect();
        tokens.extend(
            self.kwargs
                .iter()
                .map(|(k, v)| format!("{}={}", k, quote_value(v))),
        );
        if !tokens.is_empty() {
            write!(f, ":{}", tokens.join(","))?;
        }
        Ok(())
    }
}

/// Filter argument accepted by fleet operations: either a PID or a
/// (possibly partial) job spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Pid(u32),
    Spec(JobSpec),
}

impl Selector {
    pub fn parse(job_spec_or_pid: &str) -> Result<Self> {
        if !job_spec_or_pid.is_empty() && job_spec_or_pid.bytes().all(|b| b.is_ascii_digit()) {
            let pid = job_spec_or_pid
                .parse()
                .map_err(|_| Error::InvalidParams(format!("invalid PID {job_spec_or_pid:?}")))?;
            Ok(Selector::Pid(pid))
        } else {
            Ok(Selector::Spec(JobSpec::parse(job_spec_or_pid)?))
        }
    }
}

/// Convert a params string into positional and named arguments.
pub fn parse_params(params: &str) -> Result<(Vec<String>, BTreeMap<String, String>)> {
    let mut args = Vec::new();
    let mut kwargs = BTreeMap::new();
    for token in split_tokens(params) {
        let Token { start, end, text } = token;
        let err = |message: &str| {
            Error::InvalidParams(format!(
                "in chars {start}-{end} `{text}`: {message}",
                text = text.trim()
            ))
        };

        let (key, raw_value) = split_key(&text);
        let mut value = raw_value.trim();
        if value.is_empty() {
            return Err(err("implicit empty value, use explicit `\"\"` instead"));
        }
        if value.matches('"').count() % 2 == 1 || value.matches('\'').count() % 2 == 1 {
            return Err(err("unbalanced quotes"));
        }
        let bytes = value.as_bytes();
        if value.len() >= 2
            && bytes[0] == bytes[value.len() - 1]
            && (bytes[0] == b'"' || bytes[0] == b'\'')
        {
            value = &value[1..value.len() - 1];
        }

        match key {
            None => {
                if !kwargs.is_empty() {
                    return Err(err("positional argument after named arguments"));
                }
                args.push(value.to_string());
            }
            Some(key) => {
                let key = key.trim();
                if key.is_empty() {
                    return Err(err("empty named argument"));
                }
                if kwargs.contains_key(key) {
                    return Err(err("duplicated named argument"));
                }
                kwargs.insert(key.to_string(), value.to_string());
            }
        }
    }
    Ok((args, kwargs))
}

struct Token {
    start: usize,
    end: usize,
    text: String,
}

/// Split a params string on commas that are not inside quotes.
fn split_tokens(params: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    for (i, ch) in params.char_indices() {
        match quote {
            Some(q) if ch == q => {
                quote = None;
                current.push(ch);
            }
            Some(_) => current.push(ch),
            None => match ch {
                '"' | '\'' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                ',' => {
                    tokens.push(Token {
                        start,
                        end: i,
                        text: std::mem::take(&mut current),
                    });
                    start = i + ch.len_utf8();
                }
                _ => current.push(ch),
            },
        }
    }
    tokens.push(Token {
        start,
        end: params.len(),
        text: current,
    });
    tokens
}

/// Split an optional `key =` prefix off a token. The key must be a run
/// of word characters or dashes; anything else means the whole token is
/// a positional value.
fn split_key(token: &str) -> (Option<&str>, &str) {
    let mut in_quote: Option<char> = None;
    for (i, ch) in token.char_indices() {
        match in_quote {
            Some(q) if ch == q => in_quote = None,
            Some(_) => {}
            None => match ch {
                '"' | '\'' => in_quote = Some(ch),
                '=' => {
                    let key = &token[..i];
                    if key
                        .trim()
                        .chars()
                        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
                    {
                        return (Some(key), &token[i + 1..]);
                    }
                    return (None, token);
                }
                _ => {}
            },
        }
    }
    (None, token)
}

fn quote_value(value: &str) -> String {
    if value.contains('"') {
        format!("'{value}'")
    } else if value.is_empty() || value.contains([',', ' ', '\'']) {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kwargs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_bare_name() {
        let spec = JobSpec::parse("Sleep").unwrap();
        assert_eq!(spec.name, "Sleep");
        assert!(spec.args.is_empty());
        assert!(spec.kwargs.is_empty());
    }

    #[test]
    fn parses_positional_then_named() {
        let spec = JobSpec::parse("Report:2024-01-01,verbose,format=csv").unwrap();
        assert_eq!(spec.args, vec!["2024-01-01", "verbose"]);
        assert_eq!(spec.kwargs, kwargs(&[("format", "csv")]));
    }

    #[test]
    fn quoted_values_protect_commas() {
        let spec = JobSpec::parse("C:a=1,b=\"x,y\"").unwrap();
        assert_eq!(spec.name, "C");
        assert!(spec.args.is_empty());
        assert_eq!(spec.kwargs, kwargs(&[("a", "1"), ("b", "x,y")]));
    }

    #[test]
    fn single_quotes_work_like_double_quotes() {
        let spec = JobSpec::parse("C:msg='hello, world'").unwrap();
        assert_eq!(spec.kwargs, kwargs(&[("msg", "hello, world")]));
    }

    #[test]
    fn explicit_empty_value_is_allowed() {
        let spec = JobSpec::parse("C:note=\"\"").unwrap();
        assert_eq!(spec.kwargs, kwargs(&[("note", "")]));
    }

    #[test]
    fn implicit_empty_value_is_rejected() {
        let err = JobSpec::parse("C:a=1,,b=2").unwrap_err();
        assert!(err.to_string().contains("implicit empty value"), "{err}");
    }

    #[test]
    fn positional_after_named_is_rejected() {
        let err = JobSpec::parse("C:a=1,stray").unwrap_err();
        assert!(err.to_string().contains("positional argument"), "{err}");
    }

    #[test]
    fn duplicated_key_is_rejected() {
        let err = JobSpec::parse("C:a=1,a=2").unwrap_err();
        assert!(err.to_string().contains("duplicated"), "{err}");
    }

    #[test]
    fn empty_key_is_rejected() {
        let err = JobSpec::parse("C:=2").unwrap_err();
        assert!(err.to_string().contains("empty named argument"), "{err}");
    }

    #[test]
    fn unbalanced_quote_is_rejected() {
        let err = JobSpec::parse("C:a=\"oops").unwrap_err();
        assert!(err.to_string().contains("unbalanced"), "{err}");
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(JobSpec::parse("").is_err());
        assert!(JobSpec::parse(":a=1").is_err());
    }

    #[test]
    fn format_round_trips_canonical_specs() {
        for canonical in [
            "Sleep",
            "Sleep:seconds=1",
            "Report:2024-01-01,format=csv,verbose=1",
            "C:a=1,b=\"x,y\"",
        ] {
            let spec = JobSpec::parse(canonical).unwrap();
            assert_eq!(spec.to_string(), canonical);
            assert_eq!(JobSpec::parse(&spec.to_string()).unwrap(), spec);
        }
    }

    #[test]
    fn take_kwarg_strips_reserved_params() {
        let mut spec = JobSpec::parse("C:task_id=17,x=1").unwrap();
        assert_eq!(spec.take_kwarg(TASK_ID_PARAM).as_deref(), Some("17"));
        assert!(!spec.kwargs.contains_key(TASK_ID_PARAM));
        assert_eq!(spec.kwargs, kwargs(&[("x", "1")]));
    }

    #[test]
    fn selector_distinguishes_pid_from_spec() {
        assert_eq!(Selector::parse("1234").unwrap(), Selector::Pid(1234));
        match Selector::parse("Sleep:seconds=1").unwrap() {
            Selector::Spec(spec) => assert_eq!(spec.name, "Sleep"),
            other => panic!("expected spec selector, got {other:?}"),
        }
    }
}
