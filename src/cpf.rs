use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CPF_LEN: usize = 11;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpfError {
    #[error("CPF must have exactly 11 digits, got {0}")]
    WrongLength(usize),
}

/// ASCII digits of `input`, at most eleven.
pub fn digits(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).take(CPF_LEN).collect()
}

/// Applies the `000.000.000-00` mask to whatever digits have been typed so
/// far, so a partial input gets a partial mask.
pub fn format_cpf(input: &str) -> String {
    let d = digits(input);
    let mut out = String::with_capacity(14);
    for (i, c) in d.chars().enumerate() {
        match i {
            3 | 6 => out.push('.'),
            9 => out.push('-'),
            _ => {}
        }
        out.push(c);
    }
    out
}

/// A CPF held in normalized eleven-digit form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cpf(String);

impl Cpf {
    pub fn parse(input: &str) -> Result<Self, CpfError> {
        let all: String = input.chars().filter(char::is_ascii_digit).collect();
        if all.len() != CPF_LEN {
            return Err(CpfError::WrongLength(all.len()));
        }
        Ok(Cpf(all))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cpf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Cpf {
    type Error = CpfError;

    fn try_from(s: String) -> Result<Self, CpfError> {
        Cpf::parse(&s)
    }
}

impl From<Cpf> for String {
    fn from(cpf: Cpf) -> String {
        cpf.0
    }
}
