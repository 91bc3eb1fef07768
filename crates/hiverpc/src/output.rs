//! JSON rendering for command output.

use std::collections::BTreeMap;
use std::io::Write;

use hiverpc_core::{Account, Amount};
use serde_json::{Map, Value};

use crate::cli::DecimalCast;

#[derive(Debug, Clone, Copy)]
pub struct Printer {
    pub raw: bool,
    pub decimal_cast: DecimalCast,
}

impl Printer {
    pub fn print(&self, value: &Value) -> eyre::Result<()> {
        let text = if self.raw {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{text}")?;
        stdout.flush()?;
        Ok(())
    }

    pub fn amount(&self, amount: &Amount) -> Value {
        let text = amount.value.to_string();
        match self.decimal_cast {
            DecimalCast::Str => Value::String(text),
            DecimalCast::Float => text
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map_or(Value::String(text), Value::Number),
        }
    }

    pub fn balances(&self, balances: &BTreeMap<String, Amount>) -> Value {
        let map: Map<String, Value> = balances
            .iter()
            .map(|(symbol, amount)| (symbol.clone(), self.amount(amount)))
            .collect();
        Value::Object(map)
    }

    /// The node's account object with a `balances` map added.
    pub fn account(&self, account: &Account) -> Value {
        let mut value = account.raw.clone();
        if let Value::Object(map) = &mut value {
            map.insert("balances".to_owned(), self.balances(&account.balances));
        }
        value
    }
}
