//! Turning `call` command-line arguments into JSON-RPC params.

use eyre::WrapErr;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct ParamMode {
    pub json: bool,
    pub csv: bool,
    pub parse_numbers: bool,
}

/// Build the params array for a raw `call`.
pub fn parse_call_params(params: &[String], mode: ParamMode) -> eyre::Result<Value> {
    params
        .iter()
        .map(|param| parse_param(param, mode))
        .collect::<eyre::Result<Vec<_>>>()
        .map(Value::Array)
}

fn parse_param(param: &str, mode: ParamMode) -> eyre::Result<Value> {
    if mode.json {
        return serde_json::from_str(param)
            .wrap_err_with(|| format!("param `{param}` is not valid JSON"));
    }
    if mode.csv && param.contains(',') {
        return Ok(Value::Array(param.split(',').map(csv_cell).collect()));
    }
    if mode.parse_numbers {
        if let Some(number) = parse_number(param) {
            return Ok(number);
        }
    }
    Ok(Value::String(param.to_owned()))
}

/// CSV cells become booleans and numbers where they look like one.
fn csv_cell(cell: &str) -> Value {
    let cell = cell.trim();
    match cell.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => parse_number(cell).unwrap_or_else(|| Value::String(cell.to_owned())),
    }
}

/// Plain digit strings become integers; digits with one dot become floats.
fn parse_number(s: &str) -> Option<Value> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    match digits.matches('.').count() {
        0 => s.parse::<i64>().ok().map(Value::from),
        1 if !digits.starts_with('.') && !digits.ends_with('.') => {
            s.parse::<f64>().ok().and_then(serde_json::Number::from_f64).map(Value::Number)
        }
        _ => None,
    }
}
