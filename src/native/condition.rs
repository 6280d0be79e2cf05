// Mon Feb 16 2026 - Alex

use crate::native::rules::{ExternalValue, YrMatch};
use serde::{Deserialize, Serialize};

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl Comparison {
    pub fn to_yara(&self) -> &'static str {
        match self {
            Comparison::Equal => "==",
            Comparison::NotEqual => "!=",
            Comparison::LessThan => "<",
            Comparison::LessEqual => "<=",
            Comparison::GreaterThan => ">",
            Comparison::GreaterEqual => ">=",
        }
    }

    fn holds(&self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Comparison::Equal => ord == Equal,
            Comparison::NotEqual => ord != Equal,
            Comparison::LessThan => ord == Less,
            Comparison::LessEqual => ord != Greater,
            Comparison::GreaterThan => ord == Greater,
            Comparison::GreaterEqual => ord != Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arithmetic {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Left-hand side of `of`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Quantifier {
    All,
    Any,
    None,
    Count(Box<Expr>),
}

/// Condition expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(Vec<u8>),
    Filesize,
    /// `$a`
    StringFound(u32),
    /// `$a at E`
    StringAt(u32, Box<Expr>),
    /// `$a in (E..E)`
    StringIn(u32, Box<Expr>, Box<Expr>),
    /// `#a`
    StringCount(u32),
    /// `@a[i]`
    StringOffset(u32, Box<Expr>),
    /// `!a[i]`
    StringLength(u32, Box<Expr>),
    /// `N of ($a, $b)`
    Of(Quantifier, Vec<u32>),
    Rule(u32),
    External(u32),
    /// Module field such as `tests.module_data`
    Field(Vec<String>),
    /// Module function such as `console.log(..)`
    Call(Vec<String>, Vec<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Compare(Comparison, Box<Expr>, Box<Expr>),
    Arith(Arithmetic, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(Vec<u8>),
}

impl Value {
    pub fn is_true(&self) -> bool {
        match self {
            Value::Undefined => false,
            Value::Bool(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(t) => !t.is_empty(),
        }
    }

    fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            Value::Bool(b) => Some(*b as i64 as f64),
            _ => None,
        }
    }
}

impl From<&ExternalValue> for Value {
    fn from(value: &ExternalValue) -> Self {
        match value {
            ExternalValue::Integer(i) => Value::Integer(*i),
            ExternalValue::Float(f) => Value::Float(*f),
            ExternalValue::Boolean(b) => Value::Bool(*b),
            ExternalValue::String(s) => Value::Text(s.as_bytes().to_vec()),
        }
    }
}

/// Everything a condition can observe while it is being evaluated.
pub trait EvalContext {
    fn file_size(&self) -> Option<u64>;
    fn matches(&self, string_idx: u32) -> &[YrMatch];
    fn rule_result(&self, rule_idx: u32) -> bool;
    fn external(&self, idx: u32) -> Value;
    fn field(&self, path: &[String]) -> Value;
    fn call(&mut self, path: &[String], args: Vec<Value>) -> Value;
}

pub fn evaluate(expr: &Expr, ctx: &mut dyn EvalContext) -> Value {
    match expr {
        Expr::Bool(b) => Value::Bool(*b),
        Expr::Integer(i) => Value::Integer(*i),
        Expr::Float(f) => Value::Float(*f),
        Expr::Text(t) => Value::Text(t.clone()),
        Expr::Filesize => match ctx.file_size() {
            Some(size) => Value::Integer(size as i64),
            None => Value::Undefined,
        },
        Expr::StringFound(idx) => Value::Bool(!ctx.matches(*idx).is_empty()),
        Expr::StringAt(idx, at) => match evaluate(at, ctx).as_integer() {
            Some(at) => Value::Bool(ctx.matches(*idx).iter().any(|m| m.absolute() == at)),
            None => Value::Undefined,
        },
        Expr::StringIn(idx, lo, hi) => {
            let lo = evaluate(lo, ctx).as_integer();
            let hi = evaluate(hi, ctx).as_integer();
            match (lo, hi) {
                (Some(lo), Some(hi)) => Value::Bool(
                    ctx.matches(*idx)
                        .iter()
                        .any(|m| (lo..=hi).contains(&m.absolute())),
                ),
                _ => Value::Undefined,
            }
        }
        Expr::StringCount(idx) => Value::Integer(ctx.matches(*idx).len() as i64),
        Expr::StringOffset(idx, nth) | Expr::StringLength(idx, nth) => {
            let nth = match evaluate(nth, ctx).as_integer() {
                Some(n) if n >= 1 => n as usize,
                _ => return Value::Undefined,
            };
            match ctx.matches(*idx).get(nth - 1) {
                Some(m) if matches!(expr, Expr::StringOffset(..)) => Value::Integer(m.absolute()),
                Some(m) => Value::Integer(m.match_length as i64),
                None => Value::Undefined,
            }
        }
        Expr::Of(quantifier, set) => {
            let found = set.iter().filter(|&&idx| !ctx.matches(idx).is_empty()).count() as i64;
            let needed = match quantifier {
                Quantifier::All => set.len() as i64,
                Quantifier::Any => 1,
                Quantifier::None => return Value::Bool(found == 0),
                Quantifier::Count(n) => match evaluate(n, ctx).as_integer() {
                    Some(n) => n,
                    None => return Value::Undefined,
                },
            };
            Value::Bool(found >= needed)
        }
        Expr::Rule(idx) => Value::Bool(ctx.rule_result(*idx)),
        Expr::External(idx) => ctx.external(*idx),
        Expr::Field(path) => ctx.field(path),
        Expr::Call(path, args) => {
            let args = args.iter().map(|a| evaluate(a, ctx)).collect();
            ctx.call(path, args)
        }
        Expr::Not(inner) => match evaluate(inner, ctx) {
            Value::Undefined => Value::Undefined,
            v => Value::Bool(!v.is_true()),
        },
        Expr::And(a, b) => {
            if !evaluate(a, ctx).is_true() {
                return Value::Bool(false);
            }
            Value::Bool(evaluate(b, ctx).is_true())
        }
        Expr::Or(a, b) => {
            if evaluate(a, ctx).is_true() {
                return Value::Bool(true);
            }
            Value::Bool(evaluate(b, ctx).is_true())
        }
        Expr::Neg(inner) => match evaluate(inner, ctx) {
            Value::Integer(i) => Value::Integer(i.wrapping_neg()),
            Value::Float(f) => Value::Float(-f),
            _ => Value::Undefined,
        },
        Expr::Compare(op, a, b) => {
            let a = evaluate(a, ctx);
            let b = evaluate(b, ctx);
            compare(*op, &a, &b)
        }
        Expr::Arith(op, a, b) => {
            let a = evaluate(a, ctx);
            let b = evaluate(b, ctx);
            arith(*op, &a, &b)
        }
    }
}

fn compare(op: Comparison, a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Undefined, _) | (_, Value::Undefined) => Value::Undefined,
        (Value::Text(x), Value::Text(y)) => Value::Bool(op.holds(x.cmp(y))),
        (Value::Float(_), _) | (_, Value::Float(_)) => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => match x.partial_cmp(&y) {
                Some(ord) => Value::Bool(op.holds(ord)),
                None => Value::Bool(false),
            },
            _ => Value::Undefined,
        },
        _ => match (a.as_integer(), b.as_integer()) {
            (Some(x), Some(y)) => Value::Bool(op.holds(x.cmp(&y))),
            _ => Value::Undefined,
        },
    }
}

fn arith(op: Arithmetic, a: &Value, b: &Value) -> Value {
    if let (Value::Integer(x), Value::Integer(y)) = (a, b) {
        let result = match op {
            Arithmetic::Add => x.checked_add(*y),
            Arithmetic::Sub => x.checked_sub(*y),
            Arithmetic::Mul => x.checked_mul(*y),
            Arithmetic::Div => x.checked_div(*y),
            Arithmetic::Mod => x.checked_rem(*y),
        };
        return result.map(Value::Integer).unwrap_or(Value::Undefined);
    }

    match (a.as_float(), b.as_float()) {
        (Some(x), Some(y)) => match op {
            Arithmetic::Add => Value::Float(x + y),
            Arithmetic::Sub => Value::Float(x - y),
            Arithmetic::Mul => Value::Float(x * y),
            Arithmetic::Div if y != 0.0 => Value::Float(x / y),
            _ => Value::Undefined,
        },
        _ => Value::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        hits: Vec<Vec<YrMatch>>,
        size: Option<u64>,
    }

    impl EvalContext for Fixture {
        fn file_size(&self) -> Option<u64> {
            self.size
        }
        fn matches(&self, string_idx: u32) -> &[YrMatch] {
            &self.hits[string_idx as usize]
        }
        fn rule_result(&self, _rule_idx: u32) -> bool {
            true
        }
        fn external(&self, _idx: u32) -> Value {
            Value::Integer(7)
        }
        fn field(&self, _path: &[String]) -> Value {
            Value::Undefined
        }
        fn call(&mut self, _path: &[String], _args: Vec<Value>) -> Value {
            Value::Bool(true)
        }
    }

    fn hit(base: i64, offset: i64) -> YrMatch {
        YrMatch { base, offset, match_length: 3, data: b"abc".to_vec(), xor_key: 0 }
    }

    fn boxed(e: Expr) -> Box<Expr> {
        Box::new(e)
    }

    #[test]
    fn test_string_at_uses_absolute_offset() {
        let mut ctx = Fixture { hits: vec![vec![hit(32, 0)], vec![]], size: None };
        let expr = Expr::StringAt(0, boxed(Expr::Integer(32)));
        assert_eq!(evaluate(&expr, &mut ctx), Value::Bool(true));
        let expr = Expr::StringAt(0, boxed(Expr::Integer(0)));
        assert_eq!(evaluate(&expr, &mut ctx), Value::Bool(false));
    }

    #[test]
    fn test_of_quantifiers() {
        let mut ctx = Fixture { hits: vec![vec![hit(0, 0)], vec![]], size: None };
        assert!(evaluate(&Expr::Of(Quantifier::Any, vec![0, 1]), &mut ctx).is_true());
        assert!(!evaluate(&Expr::Of(Quantifier::All, vec![0, 1]), &mut ctx).is_true());
        assert!(!evaluate(&Expr::Of(Quantifier::None, vec![0, 1]), &mut ctx).is_true());
        let two = Expr::Of(Quantifier::Count(boxed(Expr::Integer(2))), vec![0, 1]);
        assert!(!evaluate(&two, &mut ctx).is_true());
    }

    #[test]
    fn test_undefined_filesize_is_false() {
        let mut ctx = Fixture { hits: vec![], size: None };
        let expr = Expr::Compare(Comparison::GreaterEqual, boxed(Expr::Filesize), boxed(Expr::Integer(0)));
        assert_eq!(evaluate(&expr, &mut ctx), Value::Undefined);
        let expr = Expr::Not(boxed(expr));
        assert!(!evaluate(&expr, &mut ctx).is_true());
    }

    #[test]
    fn test_arithmetic() {
        let mut ctx = Fixture { hits: vec![], size: Some(10) };
        let expr = Expr::Arith(Arithmetic::Div, boxed(Expr::Filesize), boxed(Expr::Integer(0)));
        assert_eq!(evaluate(&expr, &mut ctx), Value::Undefined);
        let expr = Expr::Arith(Arithmetic::Mod, boxed(Expr::Filesize), boxed(Expr::Integer(4)));
        assert_eq!(evaluate(&expr, &mut ctx), Value::Integer(2));
        let expr = Expr::Compare(Comparison::Equal, boxed(Expr::External(0)), boxed(Expr::Float(7.0)));
        assert!(evaluate(&expr, &mut ctx).is_true());
    }
}
