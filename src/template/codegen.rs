use super::tokenizer::Token;
use crate::constants::{params, OUTPUT_VAR};

/// Encodes arbitrary text as a routine string literal.
fn string_literal(text: &str) -> String {
    serde_json::Value::from(text).to_string()
}

/// Generates the inner routine code for a token sequence.
///
/// Every token becomes one line that appends to the output accumulator,
/// except code statements, which are copied verbatim so that blocks can open
/// in one marker and close in a later one.
///
/// # Arguments
/// * `tokens` - Tokens in source order
///
/// # Returns
/// * `String` - Routine source ending with `return` of the accumulator
pub fn generate(tokens: &[Token]) -> String {
    let mut code = format!("let {OUTPUT_VAR} = \"\";\n");
    for token in tokens {
        match token {
            Token::Text(text) => {
                code.push_str(&format!("{OUTPUT_VAR} += {};\n", string_literal(text)));
            }
            Token::EscapedOutput(expr) => {
                code.push_str(&format!("{OUTPUT_VAR} += {}({expr});\n", params::ESCAPE));
            }
            Token::RawOutput(expr) => {
                code.push_str(&format!("{OUTPUT_VAR} += ({expr});\n"));
            }
            Token::CodeStatement(stmt) => {
                code.push_str(stmt);
                code.push('\n');
            }
        }
    }
    code.push_str(&format!("return {OUTPUT_VAR};\n"));
    code
}

/// Wraps inner code so free identifiers resolve against the data object.
pub fn default_wrapper(inner: &str) -> String {
    format!("with ({}) {{\n{inner}}}\n", params::DATA)
}
