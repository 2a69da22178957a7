//! Event protocol between an expression tree and a query target.
//!
//! [`Node::compute`] walks the tree and hands each structural event to an
//! [`ExpressionListener`]. The listener answers every event with an [`Emit`]:
//!
//! - `NotHandled`: the target cannot express the construct; the walk fails with
//!   [`NotImplementedError`].
//! - `Handled`: the target wrote its part; the walk continues.
//! - `HandledAndStop`: the target wrote the rest of the node itself (usually by calling
//!   `compute` on the children it needs). The node skips its remaining traversal and
//!   only closes delimiters it had already opened.

use crate::ast::{FunctionCall, Node, PropertyPath, Value};
use crate::error::NotImplementedError;
use crate::Error;

#[derive(Clone, Copy, Debug)]
pub enum Event<'a> {
    StartGroup,
    EndGroup,
    StartFunction(&'a FunctionCall),
    ArgumentSeparator,
    EndFunction(&'a FunctionCall),
    /// A binary, unary or lambda node, emitted at its operator position.
    Operator(&'a Node),
    Literal(&'a Value),
    Property(&'a PropertyPath),
    LambdaVariable(&'a str),
}

impl Event<'_> {
    /// Human-readable name of the construct, used in `NotImplementedError`.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Event::StartGroup | Event::EndGroup => "grouping".to_owned(),
            Event::ArgumentSeparator => "argument list".to_owned(),
            Event::StartFunction(call) | Event::EndFunction(call) => {
                format!("function '{}'", call.function)
            }
            Event::Operator(Node::Binary { operator, .. }) => format!("operator '{operator}'"),
            Event::Operator(Node::Unary { operator, .. }) => format!("operator '{operator}'"),
            Event::Operator(Node::Lambda(lambda)) => format!("lambda '{}'", lambda.kind.keyword()),
            Event::Operator(other) => format!("expression '{other}'"),
            Event::Literal(value) => format!("{} literal", value.kind_name()),
            Event::Property(path) => format!("property '{path}'"),
            Event::LambdaVariable(name) => format!("lambda variable '{name}'"),
        }
    }
}

/// Tri-state answer to an emitted event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Emit {
    NotHandled,
    Handled,
    HandledAndStop,
}

/// A query target consuming expression events.
pub trait ExpressionListener {
    /// # Errors
    /// Implementations return errors for constructs they reject outright; answering
    /// `Emit::NotHandled` produces a `NotImplementedError` instead.
    fn on_event(&mut self, event: Event<'_>) -> Result<Emit, Error>;
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

fn emit(listener: &mut dyn ExpressionListener, event: Event<'_>) -> Result<Flow, Error> {
    match listener.on_event(event)? {
        Emit::NotHandled => Err(NotImplementedError(event.describe()).into()),
        Emit::Handled => Ok(Flow::Continue),
        Emit::HandledAndStop => Ok(Flow::Stop),
    }
}

fn compute_separated(items: &[Node], listener: &mut dyn ExpressionListener) -> Result<(), Error> {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            emit(listener, Event::ArgumentSeparator)?;
        }
        item.compute(listener)?;
    }
    Ok(())
}

impl Node {
    /// Emit this node and its children to `listener`.
    ///
    /// # Errors
    /// Returns `NotImplementedError` when the listener answers `NotHandled`, or any error
    /// the listener itself raises.
    pub fn compute(&self, listener: &mut dyn ExpressionListener) -> Result<(), Error> {
        match self {
            Node::Binary { left, right, .. } => {
                emit(listener, Event::StartGroup)?;
                left.compute(listener)?;
                if emit(listener, Event::Operator(self))? == Flow::Continue {
                    right.compute(listener)?;
                }
                emit(listener, Event::EndGroup)?;
            }
            Node::Unary { operand, .. } => {
                if emit(listener, Event::Operator(self))? == Flow::Continue {
                    emit(listener, Event::StartGroup)?;
                    operand.compute(listener)?;
                    emit(listener, Event::EndGroup)?;
                }
            }
            Node::Lambda(lambda) => {
                if emit(listener, Event::Operator(self))? == Flow::Continue {
                    emit(listener, Event::StartGroup)?;
                    if let Some(body) = &lambda.body {
                        body.compute(listener)?;
                    }
                    emit(listener, Event::EndGroup)?;
                }
            }
            Node::Function(call) => {
                if emit(listener, Event::StartFunction(call))? == Flow::Continue {
                    compute_separated(&call.arguments, listener)?;
                    emit(listener, Event::EndFunction(call))?;
                }
            }
            Node::List(items) => {
                emit(listener, Event::StartGroup)?;
                compute_separated(items, listener)?;
                emit(listener, Event::EndGroup)?;
            }
            Node::Group(inner) if inner.is_self_delimiting() => inner.compute(listener)?,
            Node::Group(inner) => {
                emit(listener, Event::StartGroup)?;
                inner.compute(listener)?;
                emit(listener, Event::EndGroup)?;
            }
            Node::Literal(value) => {
                emit(listener, Event::Literal(value))?;
            }
            Node::Property(path) => {
                emit(listener, Event::Property(path))?;
            }
            Node::LambdaVariable(name) => {
                emit(listener, Event::LambdaVariable(name))?;
            }
        }
        Ok(())
    }
}
