//! Content-stream operator alphabet.
//!
//! Content streams are a postfix language: operands precede a short
//! operator keyword. The alphabet is closed; operand arity is dispatched
//! by operator (a few color operators accept several arities).

use crate::object::Value;

/// One `(operator, operands...)` record from a content stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentOp {
    /// Operator keyword, e.g. `cm`, `re`, `Do`
    pub operator: String,
    /// Operand values in source order
    pub operands: Vec<Value>,
}

impl ContentOp {
    /// Build a record.
    pub fn new(operator: impl Into<String>, operands: Vec<Value>) -> Self {
        ContentOp {
            operator: operator.into(),
            operands,
        }
    }

    /// Operand `i` as a number, if present.
    pub fn number(&self, i: usize) -> Option<f64> {
        self.operands.get(i).and_then(Value::as_number)
    }
}

impl std::fmt::Display for ContentOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.operator, self.operands.len())
    }
}

/// Accepted operand counts for an operator; `None` for operators outside
/// the closed alphabet.
pub fn operator_arities(operator: &str) -> Option<&'static [usize]> {
    let arities: &'static [usize] = match operator {
        "b" | "b*" | "B" | "B*" | "BI" | "BT" | "EI" | "EMC" | "ET" | "f" | "f*" | "F" | "h"
        | "ID" | "n" | "q" | "Q" | "s" | "S" | "T*" | "W" | "W*" => &[0],
        "BMC" | "cs" | "CS" | "Do" | "g" | "G" | "gs" | "i" | "j" | "J" | "M" | "MP" | "ri"
        | "sh" | "Tc" | "Tj" | "TJ" | "TL" | "Tr" | "Ts" | "Tw" | "Tz" | "w" => &[1],
        "BDC" | "d" | "d0" | "DP" | "l" | "m" | "Td" | "TD" | "Tf" => &[2],
        "rg" | "RG" => &[3],
        "k" | "K" | "re" | "v" | "y" => &[4],
        "c" | "cm" | "d1" | "Tm" => &[6],
        "sc" | "SC" | "scn" | "SCN" => &[1, 3, 4],
        _ => return None,
    };
    Some(arities)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_arities() {
        assert_eq!(operator_arities("q"), Some(&[0usize][..]));
        assert_eq!(operator_arities("cm"), Some(&[6usize][..]));
        assert_eq!(operator_arities("re"), Some(&[4usize][..]));
        assert_eq!(operator_arities("scn"), Some(&[1usize, 3, 4][..]));
        assert_eq!(operator_arities("TJ"), Some(&[1usize][..]));
    }

    #[test]
    fn test_unknown_operator() {
        assert_eq!(operator_arities("XYZ"), None);
        assert_eq!(operator_arities("true"), None);
    }

    #[test]
    fn test_content_op_number_accessor() {
        let op = ContentOp::new("re", vec![
            Value::Integer(1),
            Value::Real(2.5),
        ]);
        assert_eq!(op.number(0), Some(1.0));
        assert_eq!(op.number(1), Some(2.5));
        assert_eq!(op.number(2), None);
    }
}
