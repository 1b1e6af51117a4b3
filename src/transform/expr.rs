use anyhow::{Context, Result, anyhow, bail};
use evalexpr::{
    ContextWithMutableVariables, EvalexprError, HashMapContext, Node, Value as EvalValue,
    build_operator_tree,
};
use log::debug;

use crate::{
    data::{Value, normalize_column_name, value_to_evalexpr},
    transform::{RowContext, TransformConfig},
};

/// Functions a `calculate` expression may call. Everything else the
/// evaluator knows about (string helpers, type checks) is rejected when the
/// expression is compiled.
pub const ALLOWED_FUNCTIONS: &[&str] = &[
    "min",
    "max",
    "floor",
    "round",
    "ceil",
    "math::abs",
    "math::sqrt",
    "math::pow",
    "if",
];

/// Identifier bound to the mapped cell itself, unless a column already claims
/// that normalized name.
pub const CURRENT_VALUE: &str = "value";

#[derive(Debug, Clone)]
pub struct CompiledExpression {
    source: String,
    tree: Node,
    variables: Vec<String>,
}

impl PartialEq for CompiledExpression {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl CompiledExpression {
    pub fn compile(source: &str) -> Result<Self> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            bail!("Expression is empty");
        }
        let tree: Node = build_operator_tree(&float_literals(trimmed))
            .map_err(anyhow::Error::from)
            .with_context(|| format!("Parsing expression '{trimmed}'"))?;

        if let Some(name) = tree
            .iter_function_identifiers()
            .find(|name| !ALLOWED_FUNCTIONS.contains(name))
        {
            bail!("Function '{name}' is not allowed in expressions");
        }
        if let Some(name) = tree.iter_write_variable_identifiers().next() {
            bail!("Assignment to '{name}' is not allowed in expressions");
        }

        let mut variables: Vec<String> = Vec::new();
        for name in tree.iter_read_variable_identifiers() {
            if !variables.iter().any(|known| known == name) {
                variables.push(name.to_string());
            }
        }
        debug!("Compiled expression '{trimmed}' reading {variables:?}");
        Ok(Self {
            source: trimmed.to_string(),
            tree,
            variables,
        })
    }

    pub fn from_config(config: &TransformConfig) -> Result<Self> {
        let expression = config
            .get("expression")
            .ok_or_else(|| anyhow!("calculate config requires an 'expression'"))?;
        let source = expression
            .as_str()
            .ok_or_else(|| anyhow!("calculate 'expression' must be a string"))?;
        Self::compile(source)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Evaluates against one row. Missing or null inputs, division by zero
    /// and non-finite results all produce `Null`; other evaluation errors are
    /// returned.
    pub fn evaluate(&self, current: &Value, row: &RowContext) -> Result<Value> {
        let mut context = HashMapContext::new();
        for name in &self.variables {
            let bound = match row.lookup(name) {
                Some(value) => value,
                None if normalize_column_name(name) == CURRENT_VALUE => current,
                None => {
                    debug!("Expression '{}' references unknown field '{name}'", self.source);
                    return Ok(Value::Null);
                }
            };
            if bound.is_null() {
                return Ok(Value::Null);
            }
            context
                .set_value(name.clone(), value_to_evalexpr(bound))
                .map_err(anyhow::Error::from)
                .with_context(|| format!("Binding field '{name}'"))?;
        }

        match self.tree.eval_with_context(&context) {
            Ok(result) => from_evalexpr(result),
            Err(EvalexprError::DivisionError { .. } | EvalexprError::ModulationError { .. }) => {
                Ok(Value::Null)
            }
            Err(err) => Err(anyhow::Error::from(err))
                .with_context(|| format!("Evaluating expression '{}'", self.source)),
        }
    }
}

/// Rewrites bare integer literals as floats (`1` becomes `1.0`) so that
/// arithmetic never truncates. Digits inside identifiers, decimals and
/// string literals are left alone.
fn float_literals(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len() + 8);
    let mut in_string = false;
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if in_string {
            out.push(ch);
            if ch == '\\' {
                if let Some(next) = chars.get(i + 1) {
                    out.push(*next);
                    i += 1;
                }
            } else if ch == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        if ch == '"' {
            in_string = true;
            out.push(ch);
            i += 1;
            continue;
        }

        let starts_word = i == 0 || !is_word_char(chars[i - 1]);
        if ch.is_ascii_digit() && starts_word {
            let end = chars[i..]
                .iter()
                .position(|c| !c.is_ascii_digit())
                .map_or(chars.len(), |offset| i + offset);
            out.extend(&chars[i..end]);
            let integral = chars.get(end).is_none_or(|next| !is_word_char(*next));
            if integral {
                out.push_str(".0");
            }
            i = end;
            continue;
        }
        out.push(ch);
        i += 1;
    }
    out
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | ':' | '.')
}

fn from_evalexpr(value: EvalValue) -> Result<Value> {
    let converted = match value {
        EvalValue::Empty => Value::Null,
        EvalValue::Boolean(b) => Value::Boolean(b),
        EvalValue::String(s) => Value::String(s),
        EvalValue::Int(i) => Value::Number(i as f64),
        EvalValue::Float(f) if f.is_finite() => Value::Number(f),
        EvalValue::Float(_) => Value::Null,
        other => bail!("Expression produced unsupported value {other:?}"),
    };
    Ok(converted)
}
