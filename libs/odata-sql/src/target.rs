//! Expression listener writing SQL.
//!
//! [`SqlTarget`] receives the events of a `$filter`, `$orderby` or `$search` tree and
//! appends the equivalent SQL to a [`SqlBuffer`]. Literals are always bound as
//! parameters, except `NULL`. Constructs a dialect cannot express are answered with
//! `Emit::NotHandled`, which fails the walk with a `NotImplementedError`.

use bigdecimal::ToPrimitive;
use odata_core::ast::{FunctionCall, Lambda, LambdaKind, Node, PropertyPath, Value};
use odata_core::error::{MetadataError, NotImplementedError};
use odata_core::metadata::{EntitySet, EntityType, Model, NavigationProperty, PrimitiveType, Property};
use odata_core::registry::{BinaryOperator, Function, UnaryOperator};
use odata_core::{Emit, Error, Event, ExpressionListener};

use crate::buffer::SqlBuffer;
use crate::dialect::{Dialect, like_escape, like_pattern};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Filter,
    Search,
}

/// Table alias in scope for property references.
#[derive(Debug)]
struct Scope<'m> {
    variable: Option<String>,
    alias: String,
    entity_type: &'m EntityType,
}

pub struct SqlTarget<'m, 'b> {
    buffer: &'b mut SqlBuffer,
    model: &'m Model,
    mode: Mode,
    root: Scope<'m>,
    lambdas: Vec<Scope<'m>>,
    searchable: Vec<&'m Property>,
}

impl<'m, 'b> SqlTarget<'m, 'b> {
    /// Target for `$filter` and `$orderby` expressions over `entity_set`.
    ///
    /// # Errors
    /// Returns `MetadataError::UnknownEntityType` when the set's type is not in `model`.
    pub fn filter(model: &'m Model, entity_set: &'m EntitySet, buffer: &'b mut SqlBuffer) -> Result<Self, Error> {
        Self::new(model, entity_set, buffer, Mode::Filter)
    }

    /// Target for `$search`: each term matches any searchable property of the set.
    ///
    /// # Errors
    /// Returns `MetadataError::UnknownEntityType` when the set's type is not in `model`.
    pub fn search(model: &'m Model, entity_set: &'m EntitySet, buffer: &'b mut SqlBuffer) -> Result<Self, Error> {
        Self::new(model, entity_set, buffer, Mode::Search)
    }

    fn new(model: &'m Model, entity_set: &'m EntitySet, buffer: &'b mut SqlBuffer, mode: Mode) -> Result<Self, Error> {
        let entity_type = model
            .entity_type(entity_set.entity_type())
            .ok_or_else(|| MetadataError::UnknownEntityType(entity_set.entity_type().to_owned()))?;
        Ok(Self {
            buffer,
            model,
            mode,
            root: Scope {
                variable: None,
                alias: entity_set.source_name().to_owned(),
                entity_type,
            },
            lambdas: Vec::new(),
            searchable: entity_type.searchable_properties().collect(),
        })
    }

    /// Append the SQL for `node`.
    ///
    /// # Errors
    /// Returns `NotImplementedError` for constructs the dialect cannot express.
    pub fn write(&mut self, node: &Node) -> Result<(), Error> {
        node.compute(self)
    }

    fn dialect(&self) -> Dialect {
        self.buffer.dialect()
    }

    fn filter_event(&mut self, event: Event<'_>) -> Result<Emit, Error> {
        match event {
            Event::StartGroup => self.buffer.push("("),
            Event::EndGroup => self.buffer.push(")"),
            Event::ArgumentSeparator => self.buffer.push(", "),
            Event::StartFunction(call) => {
                self.function(call)?;
                return Ok(Emit::HandledAndStop);
            }
            Event::EndFunction(_) => {}
            Event::Operator(Node::Binary {
                operator,
                left,
                right,
            }) => {
                let sql = binary_sql(self.dialect(), *operator, left, right);
                self.buffer.push(sql);
            }
            Event::Operator(Node::Unary { operator, .. }) => self.buffer.push(match operator {
                UnaryOperator::Not => "NOT ",
                UnaryOperator::Negate => "-",
            }),
            Event::Operator(Node::Lambda(lambda)) => {
                self.lambda(lambda)?;
                return Ok(Emit::HandledAndStop);
            }
            Event::Literal(value) => self.literal(value)?,
            Event::Property(path) => self.property(path)?,
            Event::Operator(_) | Event::LambdaVariable(_) => return Ok(Emit::NotHandled),
        }
        Ok(Emit::Handled)
    }

    fn search_event(&mut self, event: Event<'_>) -> Result<Emit, Error> {
        match event {
            Event::StartGroup => self.buffer.push("("),
            Event::EndGroup => self.buffer.push(")"),
            Event::Operator(Node::Binary {
                operator: BinaryOperator::And,
                ..
            }) => self.buffer.push(" AND "),
            Event::Operator(Node::Binary {
                operator: BinaryOperator::Or,
                ..
            }) => self.buffer.push(" OR "),
            Event::Operator(Node::Unary {
                operator: UnaryOperator::Not,
                ..
            }) => self.buffer.push("NOT "),
            Event::Literal(Value::String(term)) if !self.searchable.is_empty() => self.search_term(term),
            _ => return Ok(Emit::NotHandled),
        }
        Ok(Emit::Handled)
    }

    /// `(col1 LIKE ? OR col2 LIKE ? ...)` over every searchable property.
    fn search_term(&mut self, term: &str) {
        let dialect = self.dialect();
        let pattern = format!("%{}%", like_escape(term));
        self.buffer.push("(");
        for (i, property) in self.searchable.iter().enumerate() {
            if i > 0 {
                self.buffer.push(" OR ");
            }
            let cast = dialect == Dialect::Postgres && property.primitive_type() != PrimitiveType::String;
            if cast {
                self.buffer.push("CAST(");
            }
            self.buffer.push_column(&self.root.alias, property.source_name());
            if cast {
                self.buffer.push(" AS TEXT)");
            }
            self.buffer.push(dialect.search_like());
            self.buffer.bind(sea_orm::Value::String(Some(Box::new(pattern.clone()))));
            self.buffer.push(dialect.like_escape_clause());
        }
        self.buffer.push(")");
    }

    fn literal(&mut self, value: &Value) -> Result<(), Error> {
        match value {
            Value::Null => self.buffer.push("NULL"),
            other => self.buffer.bind(coerce(other)?),
        }
        Ok(())
    }

    fn scope(&self, variable: Option<&str>) -> Result<(String, &'m EntityType), Error> {
        let Some(name) = variable else {
            return Ok((self.root.alias.clone(), self.root.entity_type));
        };
        self.lambdas
            .iter()
            .rev()
            .find(|scope| scope.variable.as_deref() == Some(name))
            .map(|scope| (scope.alias.clone(), scope.entity_type))
            .ok_or_else(|| NotImplementedError(format!("lambda variable '{name}' outside its lambda")).into())
    }

    fn property(&mut self, path: &PropertyPath) -> Result<(), Error> {
        let (alias, entity_type) = self.scope(path.variable.as_deref())?;
        self.property_through(&alias, entity_type, &path.navigation, &path.property)
    }

    /// Each navigation hop becomes a correlated scalar subquery.
    fn property_through(
        &mut self,
        alias: &str,
        entity_type: &'m EntityType,
        hops: &[String],
        property: &Property,
    ) -> Result<(), Error> {
        let Some((first, rest)) = hops.split_first() else {
            self.buffer.push_column(alias, property.source_name());
            return Ok(());
        };
        let navigation = navigation_property(entity_type, first)?;
        let (target_type, target_set) = self.navigation_target(navigation)?;
        let target_alias = format!("{alias}_{first}");
        self.buffer.push("(SELECT ");
        self.property_through(&target_alias, target_type, rest, property)?;
        self.buffer.push(" FROM ");
        self.buffer.push_identifier(target_set.source_name());
        self.buffer.push(" AS ");
        self.buffer.push_identifier(&target_alias);
        self.buffer.push(" WHERE ");
        self.join(navigation, entity_type, alias, target_type, &target_alias)?;
        self.buffer.push(")");
        Ok(())
    }

    fn navigation_target(&self, navigation: &NavigationProperty) -> Result<(&'m EntityType, &'m EntitySet), Error> {
        let target_type = self
            .model
            .entity_type(navigation.target())
            .ok_or_else(|| MetadataError::UnknownEntityType(navigation.target().to_owned()))?;
        let target_set = self.model.entity_set_for_type(navigation.target()).ok_or_else(|| {
            NotImplementedError(format!("navigation '{}' to a type without entity set", navigation.name()))
        })?;
        Ok((target_type, target_set))
    }

    /// `target.ref = owner.local` for every referential constraint.
    fn join(
        &mut self,
        navigation: &NavigationProperty,
        owner_type: &EntityType,
        owner_alias: &str,
        target_type: &EntityType,
        target_alias: &str,
    ) -> Result<(), Error> {
        if navigation.constraints().is_empty() {
            return Err(NotImplementedError(format!(
                "navigation '{}' without referential constraints",
                navigation.name()
            ))
            .into());
        }
        for (i, constraint) in navigation.constraints().iter().enumerate() {
            if i > 0 {
                self.buffer.push(" AND ");
            }
            let local = constraint_property(navigation, owner_type, &constraint.property)?;
            let referenced = constraint_property(navigation, target_type, &constraint.referenced_property)?;
            self.buffer.push_column(target_alias, referenced.source_name());
            self.buffer.push(" = ");
            self.buffer.push_column(owner_alias, local.source_name());
        }
        Ok(())
    }

    /// `any` becomes `EXISTS (... AND body)`, `all` becomes `NOT EXISTS (... AND NOT body)`.
    fn lambda(&mut self, lambda: &Lambda) -> Result<(), Error> {
        if !lambda.path.is_empty() {
            return Err(NotImplementedError(format!("lambda through single-valued navigation '{lambda}'")).into());
        }
        let (owner_alias, owner_type) = self.scope(lambda.owner.as_deref())?;
        let navigation = navigation_property(owner_type, &lambda.navigation)?;
        let (target_type, target_set) = self.navigation_target(navigation)?;
        let alias = lambda.variable.clone().unwrap_or_else(|| lambda.navigation.clone());
        let all = lambda.kind == LambdaKind::All;

        self.buffer.push(if all {
            "NOT EXISTS (SELECT 1 FROM "
        } else {
            "EXISTS (SELECT 1 FROM "
        });
        self.buffer.push_identifier(target_set.source_name());
        self.buffer.push(" AS ");
        self.buffer.push_identifier(&alias);
        self.buffer.push(" WHERE ");
        self.join(navigation, owner_type, &owner_alias, target_type, &alias)?;
        if let Some(body) = &lambda.body {
            self.buffer.push(if all { " AND NOT (" } else { " AND (" });
            self.lambdas.push(Scope {
                variable: lambda.variable.clone(),
                alias,
                entity_type: target_type,
            });
            let written = body.compute(self);
            self.lambdas.pop();
            written?;
            self.buffer.push(")");
        }
        self.buffer.push(")");
        Ok(())
    }

    /// Dialect templates first; `contains`, `startswith` and `endswith` fall back to
    /// `LIKE` with a literal pattern.
    fn function(&mut self, call: &FunctionCall) -> Result<(), Error> {
        if let Some(template) = self.dialect().function_template(call.function, call.arguments.len()) {
            return self.render(template, &call.arguments);
        }
        if let [subject, needle] = call.arguments.as_slice()
            && let Node::Literal(Value::String(needle)) = needle.ungrouped()
            && let Some(pattern) = like_pattern(call.function, needle)
        {
            let like = self.dialect().like_operator();
            let escape = self.dialect().like_escape_clause();
            self.buffer.push("(");
            subject.compute(self)?;
            self.buffer.push(like);
            self.buffer.bind(sea_orm::Value::String(Some(Box::new(pattern))));
            self.buffer.push(escape);
            self.buffer.push(")");
            return Ok(());
        }
        if matches!(call.function, Function::Contains | Function::StartsWith | Function::EndsWith) {
            return Err(NotImplementedError(format!("function '{}' with a non-literal pattern", call.function)).into());
        }
        Err(NotImplementedError(format!("function '{}'", call.function)).into())
    }

    /// Write `template`, computing the argument named by each `{n}`.
    fn render(&mut self, template: &str, arguments: &[Node]) -> Result<(), Error> {
        let malformed = || NotImplementedError(format!("function template '{template}'"));
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            self.buffer.push(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(malformed)?;
            let index: usize = after[..close].parse().map_err(|_| malformed())?;
            arguments.get(index).ok_or_else(malformed)?.compute(self)?;
            rest = &after[close + 1..];
        }
        self.buffer.push(rest);
        Ok(())
    }
}

impl ExpressionListener for SqlTarget<'_, '_> {
    fn on_event(&mut self, event: Event<'_>) -> Result<Emit, Error> {
        match self.mode {
            Mode::Filter => self.filter_event(event),
            Mode::Search => self.search_event(event),
        }
    }
}

fn binary_sql(dialect: Dialect, operator: BinaryOperator, left: &Node, right: &Node) -> &'static str {
    let null_right = matches!(right.ungrouped(), Node::Literal(Value::Null));
    match operator {
        BinaryOperator::Eq if null_right => " IS ",
        BinaryOperator::Ne if null_right => " IS NOT ",
        BinaryOperator::Or => " OR ",
        BinaryOperator::And => " AND ",
        BinaryOperator::Eq => " = ",
        BinaryOperator::Ne => " <> ",
        BinaryOperator::In => " IN ",
        BinaryOperator::Gt => " > ",
        BinaryOperator::Ge => " >= ",
        BinaryOperator::Lt => " < ",
        BinaryOperator::Le => " <= ",
        BinaryOperator::Add => " + ",
        BinaryOperator::Sub => " - ",
        BinaryOperator::Mul => " * ",
        BinaryOperator::Div if left.is_integral() && right.is_integral() => dialect.integer_division(),
        BinaryOperator::Div | BinaryOperator::DivBy => " * 1.0 / ",
        BinaryOperator::Mod => " % ",
    }
}

fn navigation_property<'t>(entity_type: &'t EntityType, name: &str) -> Result<&'t NavigationProperty, Error> {
    entity_type.navigation_property(name).ok_or_else(|| {
        NotImplementedError(format!(
            "navigation '{name}' on entity type '{}'",
            entity_type.identifier()
        ))
        .into()
    })
}

fn constraint_property<'t>(
    navigation: &NavigationProperty,
    entity_type: &'t EntityType,
    name: &str,
) -> Result<&'t Property, Error> {
    entity_type.property(name).ok_or_else(|| {
        MetadataError::UnknownConstraintProperty {
            navigation: navigation.name().to_owned(),
            entity_type: entity_type.identifier().to_owned(),
            property: name.to_owned(),
        }
        .into()
    })
}

/* ---------- coercion ---------- */

/// Bindable value for a non-null literal. Integer literals bind as `BigInt`,
/// other numbers as `Double`.
///
/// # Errors
/// Returns `Error::TypeMismatch` for numbers outside the range of `f64`.
pub fn coerce(value: &Value) -> Result<sea_orm::Value, Error> {
    Ok(match value {
        Value::Null => sea_orm::Value::String(None),
        Value::Bool(b) => sea_orm::Value::Bool(Some(*b)),
        Value::Number(n) => {
            if value.is_integer()
                && let Some(i) = n.to_i64()
            {
                sea_orm::Value::BigInt(Some(i))
            } else {
                let f = n
                    .to_f64()
                    .filter(|f| f.is_finite())
                    .ok_or_else(|| Error::TypeMismatch(format!("number {n} cannot be bound")))?;
                sea_orm::Value::Double(Some(f))
            }
        }
        Value::Uuid(u) => sea_orm::Value::Uuid(Some(Box::new(*u))),
        Value::DateTime(dt) => sea_orm::Value::ChronoDateTimeUtc(Some(Box::new(*dt))),
        Value::Date(d) => sea_orm::Value::ChronoDate(Some(Box::new(*d))),
        Value::Time(t) => sea_orm::Value::ChronoTime(Some(Box::new(*t))),
        Value::String(s) => sea_orm::Value::String(Some(Box::new(s.clone()))),
    })
}
