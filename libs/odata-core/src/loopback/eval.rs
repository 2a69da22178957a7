use std::cmp::Ordering;

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc};

use super::{Instruction, LambdaProgram};
use crate::ast::{LambdaKind, PropertyPath, Value};
use crate::metadata::Property;
use crate::registry::{BinaryOperator, Function, UnaryOperator};
use crate::Error;

enum Operand {
    Scalar(Value),
    List(Vec<Value>),
}

/// Stack machine evaluating a compiled program against one record.
pub(super) struct Machine<'a> {
    root: &'a serde_json::Value,
    searchable: &'a [Property],
    scopes: Vec<(&'a str, &'a serde_json::Value)>,
}

impl<'a> Machine<'a> {
    pub(super) fn new(root: &'a serde_json::Value, searchable: &'a [Property]) -> Self {
        Self {
            root,
            searchable,
            scopes: Vec::new(),
        }
    }

    pub(super) fn run(&mut self, program: &'a [Instruction]) -> Result<Value, Error> {
        let mut stack: Vec<Operand> = Vec::new();
        for instruction in program {
            let result = match instruction {
                Instruction::Push(value) => Operand::Scalar(value.clone()),
                Instruction::Load(path) => Operand::Scalar(self.load(path)?),
                Instruction::Binary(BinaryOperator::In) => {
                    let list = pop_list(&mut stack)?;
                    let left = pop_scalar(&mut stack)?;
                    Operand::Scalar(membership(&left, &list)?)
                }
                Instruction::Binary(op) => {
                    let right = pop_scalar(&mut stack)?;
                    let left = pop_scalar(&mut stack)?;
                    Operand::Scalar(binary(*op, left, right)?)
                }
                Instruction::NullCheck { negated } => {
                    pop_scalar(&mut stack)?;
                    let left = pop_scalar(&mut stack)?;
                    Operand::Scalar(Value::Bool(left.is_null() != *negated))
                }
                Instruction::Unary(op) => {
                    let operand = pop_scalar(&mut stack)?;
                    Operand::Scalar(unary(*op, operand)?)
                }
                Instruction::MakeList(len) => {
                    let mut items = Vec::with_capacity(*len);
                    for _ in 0..*len {
                        items.push(pop_scalar(&mut stack)?);
                    }
                    items.reverse();
                    Operand::List(items)
                }
                Instruction::Call(function, argc) => {
                    let mut args = Vec::with_capacity(*argc);
                    for _ in 0..*argc {
                        args.push(pop_scalar(&mut stack)?);
                    }
                    args.reverse();
                    Operand::Scalar(call(*function, args)?)
                }
                Instruction::Lambda(lambda) => Operand::Scalar(self.lambda(lambda)?),
                Instruction::SearchTerm(term) => Operand::Scalar(self.search_term(term)?),
            };
            stack.push(result);
        }
        let value = pop_scalar(&mut stack)?;
        if !stack.is_empty() {
            return Err(Error::TypeMismatch("expression left unused operands".to_owned()));
        }
        Ok(value)
    }

    fn scope(&self, variable: &str) -> Result<&'a serde_json::Value, Error> {
        self.scopes
            .iter()
            .rev()
            .find(|(name, _)| *name == variable)
            .map(|(_, record)| *record)
            .ok_or_else(|| Error::TypeMismatch(format!("lambda variable '{variable}' is not in scope")))
    }

    /// Follow `segments` from `start`; `None` when a hop is missing or null.
    fn walk(start: &'a serde_json::Value, segments: &[String]) -> Option<&'a serde_json::Value> {
        let mut current = start;
        for segment in segments {
            current = current.get(segment.as_str()).filter(|v| !v.is_null())?;
        }
        Some(current)
    }

    fn load(&self, path: &PropertyPath) -> Result<Value, Error> {
        let start = match &path.variable {
            Some(variable) => self.scope(variable)?,
            None => self.root,
        };
        let Some(owner) = Self::walk(start, &path.navigation) else {
            return Ok(Value::Null);
        };
        let raw = owner.get(path.property.name()).unwrap_or(&serde_json::Value::Null);
        path.property.primitive_type().read_json(raw)
    }

    fn lambda(&mut self, lambda: &'a LambdaProgram) -> Result<Value, Error> {
        let start = match &lambda.owner {
            Some(owner) => self.scope(owner)?,
            None => self.root,
        };
        let members: &'a [serde_json::Value] = Self::walk(start, &lambda.path)
            .and_then(|owner| owner.get(lambda.navigation.as_str()))
            .and_then(serde_json::Value::as_array)
            .map_or(&[][..], Vec::as_slice);

        let (Some(variable), Some(body)) = (&lambda.variable, &lambda.body) else {
            return Ok(Value::Bool(!members.is_empty()));
        };
        for member in members {
            self.scopes.push((variable.as_str(), member));
            let outcome = self.run(body);
            self.scopes.pop();
            match (lambda.kind, outcome?) {
                (LambdaKind::Any, Value::Bool(true)) => return Ok(Value::Bool(true)),
                (LambdaKind::All, Value::Bool(false)) => return Ok(Value::Bool(false)),
                (_, Value::Bool(_) | Value::Null) => {}
                (_, other) => {
                    return Err(Error::TypeMismatch(format!(
                        "lambda body must be boolean, got {}",
                        other.kind_name()
                    )));
                }
            }
        }
        Ok(Value::Bool(lambda.kind == LambdaKind::All))
    }

    /// ASCII case-insensitive containment over every searchable property.
    fn search_term(&self, term: &str) -> Result<Value, Error> {
        let needle = term.to_ascii_lowercase();
        let mut result = Some(false);
        for property in self.searchable {
            let raw = self.root.get(property.name()).unwrap_or(&serde_json::Value::Null);
            let hit = match property.primitive_type().read_json(raw)? {
                Value::Null => None,
                Value::String(s) => Some(s.to_ascii_lowercase().contains(&needle)),
                Value::Number(n) => Some(n.to_string().contains(&needle)),
                other => Some(other.to_string().to_ascii_lowercase().contains(&needle)),
            };
            result = kleene_or(result, hit);
        }
        Ok(from_truth(result))
    }
}

fn pop_scalar(stack: &mut Vec<Operand>) -> Result<Value, Error> {
    match stack.pop() {
        Some(Operand::Scalar(value)) => Ok(value),
        Some(Operand::List(_)) => Err(Error::TypeMismatch("list used as a single value".to_owned())),
        None => Err(Error::TypeMismatch("missing operand".to_owned())),
    }
}

fn pop_list(stack: &mut Vec<Operand>) -> Result<Vec<Value>, Error> {
    match stack.pop() {
        Some(Operand::List(items)) => Ok(items),
        _ => Err(Error::TypeMismatch("'in' requires a list".to_owned())),
    }
}

fn truth(value: &Value) -> Result<Option<bool>, Error> {
    match value {
        Value::Bool(b) => Ok(Some(*b)),
        Value::Null => Ok(None),
        other => Err(Error::TypeMismatch(format!("expected boolean, got {}", other.kind_name()))),
    }
}

fn from_truth(truth: Option<bool>) -> Value {
    truth.map_or(Value::Null, Value::Bool)
}

fn kleene_and(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn kleene_or(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

/// `None` when either side is null.
fn compare(left: &Value, right: &Value) -> Result<Option<Ordering>, Error> {
    let ordering = match (left, right) {
        (Value::Null, _) | (_, Value::Null) => return Ok(None),
        (Value::Number(a), Value::Number(b)) => a.cmp(b),
        (Value::String(a), Value::String(b)) => a.as_bytes().cmp(b.as_bytes()),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Uuid(a), Value::Uuid(b)) => a.cmp(b),
        (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
        (Value::Date(a), Value::Date(b)) => a.cmp(b),
        (Value::Time(a), Value::Time(b)) => a.cmp(b),
        (a, b) => {
            return Err(Error::TypeMismatch(format!(
                "cannot compare {} with {}",
                a.kind_name(),
                b.kind_name()
            )));
        }
    };
    Ok(Some(ordering))
}

/// Sort comparator: nulls first, incomparable values tie.
pub(super) fn sort_order(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (a, b) => compare(a, b).ok().flatten().unwrap_or(Ordering::Equal),
    }
}

fn is_zero(n: &BigDecimal) -> bool {
    *n == BigDecimal::from(0)
}

fn binary(op: BinaryOperator, left: Value, right: Value) -> Result<Value, Error> {
    match op {
        BinaryOperator::And => Ok(from_truth(kleene_and(truth(&left)?, truth(&right)?))),
        BinaryOperator::Or => Ok(from_truth(kleene_or(truth(&left)?, truth(&right)?))),
        BinaryOperator::Eq
        | BinaryOperator::Ne
        | BinaryOperator::Gt
        | BinaryOperator::Ge
        | BinaryOperator::Lt
        | BinaryOperator::Le => {
            let Some(ordering) = compare(&left, &right)? else {
                return Ok(Value::Null);
            };
            let result = match op {
                BinaryOperator::Eq => ordering == Ordering::Equal,
                BinaryOperator::Ne => ordering != Ordering::Equal,
                BinaryOperator::Gt => ordering == Ordering::Greater,
                BinaryOperator::Ge => ordering != Ordering::Less,
                BinaryOperator::Lt => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            };
            Ok(Value::Bool(result))
        }
        BinaryOperator::In => Err(Error::TypeMismatch("'in' requires a list".to_owned())),
        BinaryOperator::Add
        | BinaryOperator::Sub
        | BinaryOperator::Mul
        | BinaryOperator::Div
        | BinaryOperator::DivBy
        | BinaryOperator::Mod => arithmetic(op, left, right),
    }
}

fn arithmetic(op: BinaryOperator, left: Value, right: Value) -> Result<Value, Error> {
    let (a, b) = match (left, right) {
        (Value::Null, _) | (_, Value::Null) => return Ok(Value::Null),
        (Value::Number(a), Value::Number(b)) => (a, b),
        (a, b) => {
            return Err(Error::TypeMismatch(format!(
                "operator '{op}' cannot be applied to {} and {}",
                a.kind_name(),
                b.kind_name()
            )));
        }
    };
    let result = match op {
        BinaryOperator::Add => a + b,
        BinaryOperator::Sub => a - b,
        BinaryOperator::Mul => a * b,
        _ if is_zero(&b) => return Ok(Value::Null),
        BinaryOperator::Div => (a / b).with_scale(0),
        BinaryOperator::DivBy => a / b,
        _ => a % b,
    };
    Ok(Value::Number(result))
}

/// SQL `IN`: true on a match, unknown when the left side or any member is null.
fn membership(left: &Value, items: &[Value]) -> Result<Value, Error> {
    if left.is_null() {
        return Ok(Value::Null);
    }
    let mut saw_null = false;
    for item in items {
        match compare(left, item)? {
            Some(Ordering::Equal) => return Ok(Value::Bool(true)),
            Some(_) => {}
            None => saw_null = true,
        }
    }
    Ok(if saw_null { Value::Null } else { Value::Bool(false) })
}

fn unary(op: UnaryOperator, operand: Value) -> Result<Value, Error> {
    match (op, operand) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOperator::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOperator::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
        (op, other) => Err(Error::TypeMismatch(format!(
            "operator '{op}' cannot be applied to {}",
            other.kind_name()
        ))),
    }
}

fn count(n: usize) -> Value {
    Value::Number(BigDecimal::from(u64::try_from(n).unwrap_or(u64::MAX)))
}

fn char_offset(value: &BigDecimal) -> usize {
    value
        .to_i64()
        .map_or(0, |n| usize::try_from(n.max(0)).unwrap_or(usize::MAX))
}

fn half() -> BigDecimal {
    BigDecimal::from(1) / BigDecimal::from(2)
}

fn floor(n: &BigDecimal) -> BigDecimal {
    let truncated = n.with_scale(0);
    if truncated > *n { truncated - BigDecimal::from(1) } else { truncated }
}

fn ceiling(n: &BigDecimal) -> BigDecimal {
    let truncated = n.with_scale(0);
    if truncated < *n { truncated + BigDecimal::from(1) } else { truncated }
}

/// Half away from zero.
fn round(n: &BigDecimal) -> BigDecimal {
    if *n < BigDecimal::from(0) {
        ceiling(&(n - half()))
    } else {
        floor(&(n + half()))
    }
}

fn fractional(nanos: u32) -> Value {
    Value::Number(BigDecimal::from(nanos) / BigDecimal::from(1_000_000_000))
}

fn max_datetime() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|d| d.and_hms_nano_opt(23, 59, 59, 999_999_999))
        .map_or(DateTime::<Utc>::MAX_UTC, |dt| dt.and_utc())
}

fn min_datetime() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_or(DateTime::<Utc>::MIN_UTC, |dt| dt.and_utc())
}

fn call(function: Function, args: Vec<Value>) -> Result<Value, Error> {
    match function {
        Function::Now => return Ok(Value::DateTime(Utc::now())),
        Function::MaxDateTime => return Ok(Value::DateTime(max_datetime())),
        Function::MinDateTime => return Ok(Value::DateTime(min_datetime())),
        _ => {}
    }
    if args.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }
    let value = match (function, args.as_slice()) {
        (Function::Contains, [Value::String(s), Value::String(p)]) => Value::Bool(s.contains(p.as_str())),
        (Function::StartsWith, [Value::String(s), Value::String(p)]) => Value::Bool(s.starts_with(p.as_str())),
        (Function::EndsWith, [Value::String(s), Value::String(p)]) => Value::Bool(s.ends_with(p.as_str())),
        (Function::Length, [Value::String(s)]) => count(s.chars().count()),
        (Function::IndexOf, [Value::String(s), Value::String(p)]) => match s.find(p.as_str()) {
            Some(byte) => count(s[..byte].chars().count()),
            None => Value::Number(BigDecimal::from(-1)),
        },
        (Function::Substring, [Value::String(s), Value::Number(start)]) => {
            Value::String(s.chars().skip(char_offset(start)).collect())
        }
        (Function::Substring, [Value::String(s), Value::Number(start), Value::Number(len)]) => {
            Value::String(s.chars().skip(char_offset(start)).take(char_offset(len)).collect())
        }
        (Function::Concat, [Value::String(a), Value::String(b)]) => Value::String(format!("{a}{b}")),
        (Function::ToLower, [Value::String(s)]) => Value::String(s.to_lowercase()),
        (Function::ToUpper, [Value::String(s)]) => Value::String(s.to_uppercase()),
        (Function::Trim, [Value::String(s)]) => Value::String(s.trim_matches(' ').to_owned()),
        (Function::MatchesPattern, [Value::String(s), Value::String(pattern)]) => {
            let regex = regex::Regex::new(pattern)
                .map_err(|e| Error::InvalidFilter(format!("invalid pattern '{pattern}': {e}")))?;
            Value::Bool(regex.is_match(s))
        }
        (Function::Year, [Value::DateTime(dt)]) => Value::Number(dt.year().into()),
        (Function::Year, [Value::Date(d)]) => Value::Number(d.year().into()),
        (Function::Month, [Value::DateTime(dt)]) => Value::Number(dt.month().into()),
        (Function::Month, [Value::Date(d)]) => Value::Number(d.month().into()),
        (Function::Day, [Value::DateTime(dt)]) => Value::Number(dt.day().into()),
        (Function::Day, [Value::Date(d)]) => Value::Number(d.day().into()),
        (Function::Hour, [Value::DateTime(dt)]) => Value::Number(dt.hour().into()),
        (Function::Hour, [Value::Time(t)]) => Value::Number(t.hour().into()),
        (Function::Minute, [Value::DateTime(dt)]) => Value::Number(dt.minute().into()),
        (Function::Minute, [Value::Time(t)]) => Value::Number(t.minute().into()),
        (Function::Second, [Value::DateTime(dt)]) => Value::Number(dt.second().into()),
        (Function::Second, [Value::Time(t)]) => Value::Number(t.second().into()),
        (Function::FractionalSeconds, [Value::DateTime(dt)]) => fractional(dt.nanosecond()),
        (Function::FractionalSeconds, [Value::Time(t)]) => fractional(t.nanosecond()),
        (Function::Date, [Value::DateTime(dt)]) => Value::Date(dt.date_naive()),
        (Function::Time, [Value::DateTime(dt)]) => Value::Time(dt.time()),
        (Function::Round, [Value::Number(n)]) => Value::Number(round(n)),
        (Function::Floor, [Value::Number(n)]) => Value::Number(floor(n)),
        (Function::Ceiling, [Value::Number(n)]) => Value::Number(ceiling(n)),
        (function, args) => {
            let kinds: Vec<&str> = args.iter().map(Value::kind_name).collect();
            return Err(Error::TypeMismatch(format!(
                "{function}() cannot be applied to ({})",
                kinds.join(", ")
            )));
        }
    };
    Ok(value)
}
