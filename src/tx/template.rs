//! Contract-call template shared by every transaction in a batch

use serde::{Deserialize, Serialize};

/// Typed contract-call argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ArgValue {
    Uint(u64),
    Int(i64),
    Bool(bool),
    Principal(String),
    Buffer(#[serde(with = "hex::serde")] Vec<u8>),
    StringAscii(String),
}

/// Immutable transaction template.
///
/// Every transaction in a batch is built from the same template; only the
/// nonce differs and is injected per attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSpec {
    pub contract_address: String,
    pub contract_name: String,
    pub function_name: String,
    #[serde(default)]
    pub args: Vec<ArgValue>,
    /// Fee in micro-units
    pub fee: u64,
}

impl TransactionSpec {
    pub fn new(
        contract_address: impl Into<String>,
        contract_name: impl Into<String>,
        function_name: impl Into<String>,
        args: Vec<ArgValue>,
        fee: u64,
    ) -> Self {
        Self {
            contract_address: contract_address.into(),
            contract_name: contract_name.into(),
            function_name: function_name.into(),
            args,
            fee,
        }
    }

    /// Fully qualified contract identifier, `address.name`
    pub fn contract_id(&self) -> String {
        format!("{}.{}", self.contract_address, self.contract_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_json_shape() {
        let spec = TransactionSpec::new(
            "SP2N00STXH4K1GBPHC5AM62BP4AJ7STS4XJXCD2D4",
            "bit-token",
            "mint",
            vec![ArgValue::Uint(1), ArgValue::Buffer(vec![0xde, 0xad])],
            4000,
        );

        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["args"][0]["type"], "uint");
        assert_eq!(json["args"][1]["value"], "dead");
        assert_eq!(
            spec.contract_id(),
            "SP2N00STXH4K1GBPHC5AM62BP4AJ7STS4XJXCD2D4.bit-token"
        );
    }
}
