use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const NANOS_SCALE: u32 = 9;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Currency amount split into whole `units` and a `nanos` fraction
/// (10^-9 of a unit), both carrying the same sign.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    pub currency_code: String,
    #[serde(default)]
    pub units: i64,
    #[serde(default)]
    pub nanos: i32,
}

impl Money {
    pub fn new(currency_code: impl Into<String>, units: i64, nanos: i32) -> Self {
        Self { currency_code: currency_code.into(), units, nanos }
    }

    pub fn amount(&self) -> Decimal {
        Decimal::from(self.units) + Decimal::new(i64::from(self.nanos), NANOS_SCALE)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub picture: String,
    #[serde(rename = "priceUsd")]
    pub price: Money,
    #[serde(default)]
    pub categories: Vec<String>,
}
