//! Built-in demonstration tools
//!
//! `addTwoNumbers` and `subtractTwoNumbers` back the local-model program;
//! `getStockPrice` backs the hosted-model program and returns a static quote.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::logging::SharedLogger;
use crate::types::{ParameterSchema, SchemaType, ToolDeclaration};

use super::handler::{number_arg, string_arg, FnHandler, ToolResult};
use super::registry::{RegistryResult, ToolRegistry};

/// Price returned by the mock quote service
pub const MOCK_STOCK_PRICE: f64 = 150.25;

fn two_numbers() -> ParameterSchema {
    ParameterSchema::object()
        .required("a", SchemaType::Number, "The first number")
        .required("b", SchemaType::Number, "The second number")
}

pub fn add_declaration() -> ToolDeclaration {
    ToolDeclaration::new("addTwoNumbers", "Add two numbers together").with_parameters(two_numbers())
}

pub fn subtract_declaration() -> ToolDeclaration {
    ToolDeclaration::new("subtractTwoNumbers", "Subtract two numbers").with_parameters(two_numbers())
}

pub fn stock_price_declaration() -> ToolDeclaration {
    ToolDeclaration::new(
        "getStockPrice",
        "Get the current stock price for a given company symbol",
    )
    .with_parameters(ParameterSchema::object().required(
        "symbol",
        SchemaType::String,
        "The stock symbol (e.g., AAPL for Apple)",
    ))
}

/// Render a number as an integer when it has no fractional part
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

pub fn add_two_numbers(arguments: Value) -> ToolResult<Value> {
    let a = number_arg(&arguments, "a")?;
    let b = number_arg(&arguments, "b")?;
    Ok(number_value(a + b))
}

pub fn subtract_two_numbers(arguments: Value) -> ToolResult<Value> {
    let a = number_arg(&arguments, "a")?;
    let b = number_arg(&arguments, "b")?;
    Ok(number_value(a - b))
}

/// Static quote for any symbol
pub fn get_stock_price(arguments: Value) -> ToolResult<Value> {
    let symbol = string_arg(&arguments, "symbol")?;
    Ok(json!({
        "symbol": symbol.to_uppercase(),
        "price": MOCK_STOCK_PRICE,
        "currency": "USD",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Registry with `addTwoNumbers` and `subtractTwoNumbers`
pub fn arithmetic_registry(logger: SharedLogger) -> RegistryResult<ToolRegistry> {
    ToolRegistry::new(logger)
        .with_tool(add_declaration(), Arc::new(FnHandler::new(add_two_numbers)))?
        .with_tool(
            subtract_declaration(),
            Arc::new(FnHandler::new(subtract_two_numbers)),
        )
}

/// Registry with `getStockPrice`
pub fn stock_registry(logger: SharedLogger) -> RegistryResult<ToolRegistry> {
    ToolRegistry::new(logger).with_tool(
        stock_price_declaration(),
        Arc::new(FnHandler::new(get_stock_price)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use crate::tools::ToolError;

    #[test]
    fn test_arithmetic() {
        assert_eq!(add_two_numbers(json!({ "a": 2, "b": 3 })), Ok(json!(5)));
        assert_eq!(subtract_two_numbers(json!({ "a": 3, "b": 1 })), Ok(json!(2)));
        assert_eq!(add_two_numbers(json!({ "a": 0.5, "b": 0.25 })), Ok(json!(0.75)));
        assert!(matches!(
            subtract_two_numbers(json!({ "a": 3 })),
            Err(ToolError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_stock_price_quote() {
        let quote = get_stock_price(json!({ "symbol": "aapl" })).unwrap();

        assert_eq!(quote["symbol"], "AAPL");
        assert_eq!(quote["price"], json!(150.25));
        assert_eq!(quote["currency"], "USD");
        let ts = quote["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn test_registries() {
        let math = arithmetic_registry(Arc::new(NoOpLogger)).unwrap();
        assert_eq!(math.names(), vec!["addTwoNumbers", "subtractTwoNumbers"]);

        let stock = stock_registry(Arc::new(NoOpLogger)).unwrap();
        assert_eq!(stock.names(), vec!["getStockPrice"]);
        assert!(stock
            .get("getStockPrice")
            .unwrap()
            .declaration
            .parameters
            .is_required("symbol"));
    }
}
