use crate::color::ConstantColor;
use crate::context::EvaluationContext;
use crate::error::{LessError, LessResult, Position};
use crate::model::Selector;
use crate::value::{ConstantNumber, ConstantValue, Operator};
use std::fmt::{self, Display};

/// 值表达式。求值从不原地修改，总是返回新的表达式，通常已归约为常量或字面量。
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExprKind,
    pub position: Option<Position>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Constant(ConstantValue),
    Literal(String),
    Variable(String),
    /// 空格、逗号分隔的序列，分隔符本身以字面量保存。
    List(Vec<Expression>),
    Function {
        name: String,
        args: Vec<Expression>,
    },
    /// `.sel['prop']` 或 `#ns[@var]`。
    Accessor {
        selector: Selector,
        property: String,
        is_variable: bool,
    },
    Binary {
        op: Operator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            position: None,
        }
    }

    pub fn with_position(mut self, position: Option<Position>) -> Self {
        self.position = position;
        self
    }

    pub fn constant<V: Into<ConstantValue>>(value: V) -> Self {
        Self::new(ExprKind::Constant(value.into()))
    }

    pub fn number(value: f64, unit: Option<&str>) -> Self {
        Self::constant(ConstantNumber::new(value, unit))
    }

    pub fn literal<S: Into<String>>(text: S) -> Self {
        Self::new(ExprKind::Literal(text.into()))
    }

    pub fn variable<S: Into<String>>(name: S) -> Self {
        Self::new(ExprKind::Variable(name.into()))
    }

    pub fn list(items: Vec<Expression>) -> Self {
        Self::new(ExprKind::List(items))
    }

    pub fn function<S: Into<String>>(name: S, args: Vec<Expression>) -> Self {
        Self::new(ExprKind::Function {
            name: name.into(),
            args,
        })
    }

    pub fn accessor(selector: Selector, property: String, is_variable: bool) -> Self {
        Self::new(ExprKind::Accessor {
            selector,
            property,
            is_variable,
        })
    }

    pub fn binary(op: Operator, left: Expression, right: Expression) -> Self {
        let position = left.position;
        Self::new(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
        .with_position(position)
    }

    /// 一元负号按 `-1 * x` 建模。
    pub fn negate(operand: Expression) -> Self {
        let position = operand.position;
        Self::binary(
            Operator::Multiply,
            Expression::number(-1.0, None).with_position(position),
            operand,
        )
    }

    /// 常量值；颜色关键字字面量会被识别成颜色。
    pub fn as_constant(&self) -> Option<ConstantValue> {
        match &self.kind {
            ExprKind::Constant(value) => Some(value.clone()),
            ExprKind::Literal(text) => ConstantColor::keyword(text.trim()).map(ConstantValue::Color),
            _ => None,
        }
    }

    /// 列表中的逗号或空白分隔符。
    pub fn is_separator(&self) -> bool {
        match &self.kind {
            ExprKind::Literal(text) => {
                let trimmed = text.trim();
                trimmed.is_empty() || trimmed == ","
            }
            _ => false,
        }
    }

    pub fn evaluate(&self, context: &EvaluationContext<'_>) -> LessResult<Expression> {
        match &self.kind {
            ExprKind::Constant(_) | ExprKind::Literal(_) => Ok(self.clone()),
            ExprKind::Variable(name) => self.evaluate_variable(name, context),
            ExprKind::List(items) => {
                let mut evaluated = Vec::with_capacity(items.len());
                for item in items {
                    evaluated.push(item.evaluate(context)?);
                }
                if evaluated.len() == 1 {
                    return Ok(evaluated.remove(0));
                }
                let text: String = evaluated.iter().map(|item| item.to_string()).collect();
                Ok(Expression::literal(text).with_position(self.position))
            }
            ExprKind::Function { name, args } => context
                .functions()
                .evaluate(name, args, context)
                .map(|value| value.with_position(self.position))
                .map_err(|err| err.at(self.position)),
            ExprKind::Accessor {
                selector,
                property,
                is_variable,
            } => self.evaluate_accessor(selector, property, *is_variable, context),
            ExprKind::Binary { op, left, right } => {
                let left = left.evaluate(context)?;
                let right = right.evaluate(context)?;
                match (left.as_constant(), right.as_constant()) {
                    (Some(l), Some(r)) => l
                        .apply(*op, &r)
                        .map(|value| Expression::constant(value).with_position(self.position))
                        .map_err(|err| err.at(left.position.or(self.position))),
                    _ => Ok(Expression::binary(*op, left, right).with_position(self.position)),
                }
            }
        }
    }

    fn evaluate_variable(
        &self,
        name: &str,
        context: &EvaluationContext<'_>,
    ) -> LessResult<Expression> {
        if context.is_resolving(name) {
            return Err(LessError::CyclicVariableReference(name.to_string()).at(self.position));
        }
        let found = context
            .variable(name)
            .ok_or_else(|| LessError::UndefinedVariable(name.to_string()).at(self.position))?;
        let frame = context.resolving_frame(name);
        let inner = context.with_resolving(&frame);
        found.evaluate(&inner).map_err(|err| err.at(self.position))
    }

    fn evaluate_accessor(
        &self,
        selector: &Selector,
        property: &str,
        is_variable: bool,
        context: &EvaluationContext<'_>,
    ) -> LessResult<Expression> {
        let matches = context.rule_sets(selector);
        let rule_set = match matches.as_slice() {
            [] => {
                return Err(
                    LessError::UndefinedAccessorTarget(selector.to_string()).at(self.position)
                )
            }
            [single] => *single,
            many => {
                return Err(LessError::AmbiguousAccessorTarget {
                    selector: selector.to_string(),
                    count: many.len(),
                }
                .at(self.position))
            }
        };
        let missing = || {
            LessError::UndefinedAccessorProperty {
                selector: selector.to_string(),
                property: if is_variable {
                    format!("@{property}")
                } else {
                    property.to_string()
                },
            }
            .at(self.position)
        };
        let scope = context.child(&rule_set.container);
        if is_variable {
            let value = rule_set.container.variable(property).ok_or_else(missing)?;
            return value.evaluate(&scope).map_err(|err| err.at(self.position));
        }
        let declaration = rule_set.declaration(property).ok_or_else(missing)?;
        let mut evaluated = Vec::with_capacity(declaration.values.len());
        for value in &declaration.values {
            evaluated.push(value.evaluate(&scope).map_err(|err| err.at(self.position))?);
        }
        if evaluated.len() == 1 {
            return Ok(evaluated.remove(0));
        }
        let text: String = evaluated.iter().map(|item| item.to_string()).collect();
        Ok(Expression::literal(text.trim()).with_position(self.position))
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Constant(value) => value.fmt(f),
            ExprKind::Literal(text) => f.write_str(text),
            ExprKind::Variable(name) => write!(f, "@{name}"),
            ExprKind::List(items) => items.iter().try_for_each(|item| item.fmt(f)),
            ExprKind::Function { name, args } => {
                write!(f, "{name}(")?;
                let mut first = true;
                for arg in args.iter().filter(|arg| !arg.is_separator()) {
                    if !first {
                        f.write_str(", ")?;
                    }
                    arg.fmt(f)?;
                    first = false;
                }
                f.write_str(")")
            }
            ExprKind::Accessor {
                selector,
                property,
                is_variable,
            } => {
                if *is_variable {
                    write!(f, "{selector}[@{property}]")
                } else {
                    write!(f, "{selector}['{property}']")
                }
            }
            ExprKind::Binary { op, left, right } => {
                write!(f, "{left} {} {right}", op.symbol())
            }
        }
    }
}

impl From<ConstantValue> for Expression {
    fn from(value: ConstantValue) -> Self {
        Expression::constant(value)
    }
}
