//! In-memory query target.
//!
//! [`LoopbackTarget`] listens to expression events and compiles them into a postfix
//! program that is evaluated against JSON records. Evaluation follows SQL three-valued
//! logic so a record is accepted exactly when the SQL target's `WHERE` clause would
//! accept the equivalent row. The target also keeps a readable trace of the events it
//! received.

mod eval;
mod source;

pub use source::InMemoryEntitySet;

use crate::ast::{Lambda, LambdaKind, Node, PropertyPath, Value};
use crate::error::NotImplementedError;
use crate::event::{Emit, Event, ExpressionListener};
use crate::metadata::{EntityType, Property};
use crate::registry::{BinaryOperator, Function, UnaryOperator};
use crate::Error;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Instruction {
    Push(Value),
    Load(PropertyPath),
    Binary(BinaryOperator),
    /// `eq null` / `ne null`: pops the null literal and tests the left operand.
    NullCheck { negated: bool },
    Unary(UnaryOperator),
    MakeList(usize),
    Call(Function, usize),
    Lambda(Box<LambdaProgram>),
    SearchTerm(String),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct LambdaProgram {
    pub(crate) kind: LambdaKind,
    pub(crate) owner: Option<String>,
    pub(crate) path: Vec<String>,
    pub(crate) navigation: String,
    pub(crate) variable: Option<String>,
    pub(crate) body: Option<Vec<Instruction>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Filter,
    Search,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GroupOperator {
    Binary(BinaryOperator),
    NullCheck { negated: bool },
}

#[derive(Debug)]
enum Frame {
    Group {
        operator: Option<GroupOperator>,
        list: Option<usize>,
    },
    Unary(UnaryOperator),
}

/// Listener compiling expression events into an in-memory evaluator.
#[derive(Debug)]
pub struct LoopbackTarget {
    mode: Mode,
    searchable: Vec<Property>,
    program: Vec<Instruction>,
    frames: Vec<Frame>,
    pending_list: Option<usize>,
    trace: Vec<String>,
}

impl LoopbackTarget {
    /// Target for `$filter` and `$orderby` expressions.
    #[must_use]
    pub fn filter() -> Self {
        Self::with_mode(Mode::Filter, Vec::new())
    }

    /// Target for `$search`; terms match the searchable properties of `entity_type`.
    #[must_use]
    pub fn search(entity_type: &EntityType) -> Self {
        Self::with_mode(Mode::Search, entity_type.searchable_properties().cloned().collect())
    }

    fn with_mode(mode: Mode, searchable: Vec<Property>) -> Self {
        Self {
            mode,
            searchable,
            program: Vec::new(),
            frames: Vec::new(),
            pending_list: None,
            trace: Vec::new(),
        }
    }

    /// Space-separated trace of the events received so far.
    #[must_use]
    pub fn trace(&self) -> String {
        self.trace.join(" ")
    }

    /// Compile `node` and return the evaluator.
    ///
    /// # Errors
    /// Returns `NotImplementedError` for constructs this target cannot evaluate.
    pub fn compile(mut self, node: &Node) -> Result<LoopbackExpression, Error> {
        node.compute(&mut self)?;
        if !self.frames.is_empty() {
            return Err(NotImplementedError("unbalanced expression events".to_owned()).into());
        }
        let trace = self.trace();
        tracing::trace!(trace = %trace, instructions = self.program.len(), "compiled loopback expression");
        Ok(LoopbackExpression {
            program: self.program,
            searchable: self.searchable,
            trace,
        })
    }

    fn start_group(&mut self) {
        self.frames.push(Frame::Group {
            operator: None,
            list: self.pending_list.take(),
        });
        self.trace.push("(".to_owned());
    }

    fn end_group(&mut self) -> Result<(), Error> {
        let Some(Frame::Group { operator, list }) = self.frames.pop() else {
            return Err(NotImplementedError("group end without a matching start".to_owned()).into());
        };
        if let Some(len) = list {
            self.program.push(Instruction::MakeList(len));
        }
        match operator {
            Some(GroupOperator::Binary(op)) => self.program.push(Instruction::Binary(op)),
            Some(GroupOperator::NullCheck { negated }) => {
                self.program.push(Instruction::NullCheck { negated });
            }
            None => {}
        }
        if let Some(Frame::Unary(op)) = self.frames.last() {
            let op = *op;
            self.frames.pop();
            self.program.push(Instruction::Unary(op));
        }
        self.trace.push(")".to_owned());
        Ok(())
    }

    fn binary_operator(&mut self, operator: BinaryOperator, left: &Node, right: &Node) -> Result<Emit, Error> {
        if self.mode == Mode::Search && !operator.is_logical() {
            return Ok(Emit::NotHandled);
        }
        let is_null = matches!(right.ungrouped(), Node::Literal(Value::Null));
        let group_operator = match operator {
            BinaryOperator::Eq if is_null => GroupOperator::NullCheck { negated: false },
            BinaryOperator::Ne if is_null => GroupOperator::NullCheck { negated: true },
            BinaryOperator::In => {
                let Node::List(items) = right.ungrouped() else {
                    return Ok(Emit::NotHandled);
                };
                self.pending_list = Some(items.len());
                GroupOperator::Binary(operator)
            }
            BinaryOperator::Div if !(left.is_integral() && right.is_integral()) => {
                GroupOperator::Binary(BinaryOperator::DivBy)
            }
            _ => GroupOperator::Binary(operator),
        };
        let Some(Frame::Group { operator: slot, .. }) = self.frames.last_mut() else {
            return Ok(Emit::NotHandled);
        };
        *slot = Some(group_operator);
        self.trace.push(self.operator_label(operator.symbol()));
        Ok(Emit::Handled)
    }

    fn operator_label(&self, symbol: &str) -> String {
        match self.mode {
            Mode::Filter => symbol.to_owned(),
            Mode::Search => symbol.to_uppercase(),
        }
    }

    fn lambda(&mut self, lambda: &Lambda) -> Result<Emit, Error> {
        if self.mode == Mode::Search {
            return Ok(Emit::NotHandled);
        }
        let outer_program = std::mem::take(&mut self.program);
        let outer_frames = std::mem::take(&mut self.frames);

        let mut head = String::new();
        if let Some(owner) = &lambda.owner {
            head.push_str(owner);
            head.push('/');
        }
        for segment in &lambda.path {
            head.push_str(segment);
            head.push('/');
        }
        head.push_str(&lambda.navigation);
        head.push('/');
        head.push_str(lambda.kind.keyword());
        head.push('(');
        self.trace.push(head);
        if let Some(variable) = &lambda.variable {
            self.trace.push(format!("{variable}:"));
        }
        if let Some(body) = &lambda.body {
            body.compute(self)?;
        }
        self.trace.push(")".to_owned());

        let body_program = std::mem::replace(&mut self.program, outer_program);
        self.frames = outer_frames;
        self.program.push(Instruction::Lambda(Box::new(LambdaProgram {
            kind: lambda.kind,
            owner: lambda.owner.clone(),
            path: lambda.path.clone(),
            navigation: lambda.navigation.clone(),
            variable: lambda.variable.clone(),
            body: lambda.body.as_ref().map(|_| body_program),
        })));
        Ok(Emit::HandledAndStop)
    }
}

impl ExpressionListener for LoopbackTarget {
    fn on_event(&mut self, event: Event<'_>) -> Result<Emit, Error> {
        match event {
            Event::StartGroup => self.start_group(),
            Event::EndGroup => self.end_group()?,
            Event::Operator(Node::Binary {
                operator,
                left,
                right,
            }) => return self.binary_operator(*operator, left, right),
            Event::Operator(Node::Unary { operator, .. }) => {
                if self.mode == Mode::Search && *operator != UnaryOperator::Not {
                    return Ok(Emit::NotHandled);
                }
                self.frames.push(Frame::Unary(*operator));
                self.trace.push(self.operator_label(operator.symbol()));
            }
            Event::Operator(Node::Lambda(lambda)) => return self.lambda(lambda),
            Event::Operator(_) | Event::LambdaVariable(_) => return Ok(Emit::NotHandled),
            Event::StartFunction(call) => {
                if self.mode == Mode::Search {
                    return Ok(Emit::NotHandled);
                }
                self.trace.push(format!("{}(", call.function));
            }
            Event::ArgumentSeparator => self.trace.push(",".to_owned()),
            Event::EndFunction(call) => {
                self.program
                    .push(Instruction::Call(call.function, call.arguments.len()));
                self.trace.push(")".to_owned());
            }
            Event::Literal(value) => match (self.mode, value) {
                (Mode::Search, Value::String(term)) => {
                    if self.searchable.is_empty() {
                        return Ok(Emit::NotHandled);
                    }
                    self.trace.push(search_term_label(term));
                    self.program.push(Instruction::SearchTerm(term.clone()));
                }
                (Mode::Search, _) => return Ok(Emit::NotHandled),
                (Mode::Filter, value) => {
                    self.trace.push(value.to_string());
                    self.program.push(Instruction::Push(value.clone()));
                }
            },
            Event::Property(path) => {
                if self.mode == Mode::Search {
                    return Ok(Emit::NotHandled);
                }
                self.trace.push(path.to_string());
                self.program.push(Instruction::Load(path.clone()));
            }
        }
        Ok(Emit::Handled)
    }
}

/// Bare words print as-is; anything else prints as a quoted phrase.
fn search_term_label(term: &str) -> String {
    let bare = !term.is_empty()
        && !term
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '(' | ')'))
        && !matches!(term, "AND" | "OR" | "NOT");
    if bare {
        term.to_owned()
    } else {
        format!("\"{}\"", term.replace('"', "\"\""))
    }
}

/// Compiled expression ready to evaluate against JSON records.
#[derive(Clone, Debug, PartialEq)]
pub struct LoopbackExpression {
    program: Vec<Instruction>,
    searchable: Vec<Property>,
    trace: String,
}

impl LoopbackExpression {
    /// Compile a `$filter` or `$orderby` expression.
    ///
    /// # Errors
    /// Returns `NotImplementedError` for unsupported constructs.
    pub fn filter(node: &Node) -> Result<Self, Error> {
        LoopbackTarget::filter().compile(node)
    }

    /// Compile a `$search` expression over the searchable properties of `entity_type`.
    ///
    /// # Errors
    /// Returns `NotImplementedError` when the type has no searchable properties.
    pub fn search(node: &Node, entity_type: &EntityType) -> Result<Self, Error> {
        LoopbackTarget::search(entity_type).compile(node)
    }

    #[must_use]
    pub fn trace(&self) -> &str {
        &self.trace
    }

    /// Evaluate to a value; `Value::Null` stands for SQL `UNKNOWN` in boolean context.
    ///
    /// # Errors
    /// Returns `Error::TypeMismatch` when operand types are incompatible or stored data
    /// does not match the declared property types.
    pub fn evaluate(&self, record: &serde_json::Value) -> Result<Value, Error> {
        eval::Machine::new(record, &self.searchable).run(&self.program)
    }

    /// `true` only when the expression evaluates to boolean `true`.
    ///
    /// # Errors
    /// See [`LoopbackExpression::evaluate`].
    pub fn accepts(&self, record: &serde_json::Value) -> Result<bool, Error> {
        Ok(matches!(self.evaluate(record)?, Value::Bool(true)))
    }
}
