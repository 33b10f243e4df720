use crate::color::ConstantColor;
use crate::error::{LessError, LessResult};
use std::fmt::{self, Display};

/// 四则运算符。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '-',
            Operator::Multiply => '*',
            Operator::Divide => '/',
        }
    }

    fn apply(self, left: f64, right: f64) -> f64 {
        match self {
            Operator::Add => left + right,
            Operator::Subtract => left - right,
            Operator::Multiply => left * right,
            Operator::Divide => left / right,
        }
    }
}

/// 带可选单位的数值，例如 `5px`、`.5em`、`10%`。
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantNumber {
    value: f64,
    unit: Option<String>,
}

impl ConstantNumber {
    pub fn new(value: f64, unit: Option<&str>) -> Self {
        Self {
            value,
            unit: unit.filter(|u| !u.is_empty()).map(str::to_string),
        }
    }

    pub fn unitless(value: f64) -> Self {
        Self { value, unit: None }
    }

    /// 单位从最后一个数字或小数点之后开始：`3.em` → 3 em，`.5` → 0.5。
    pub fn parse(text: &str) -> Option<Self> {
        let split = text
            .char_indices()
            .filter(|(_, ch)| ch.is_ascii_digit() || *ch == '.')
            .map(|(idx, ch)| idx + ch.len_utf8())
            .last()?;
        let value: f64 = text[..split].parse().ok()?;
        Some(Self::new(value, Some(&text[split..])))
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn is_unitless(&self) -> bool {
        self.unit.is_none()
    }

    pub fn is_compatible(&self, other: &ConstantNumber) -> bool {
        match (&self.unit, &other.unit) {
            (None, _) | (_, None) => true,
            (Some(left), Some(right)) => left == right,
        }
    }

    pub fn add(&self, other: &ConstantNumber) -> LessResult<ConstantNumber> {
        self.apply(Operator::Add, other)
    }

    pub fn subtract(&self, other: &ConstantNumber) -> LessResult<ConstantNumber> {
        self.apply(Operator::Subtract, other)
    }

    pub fn multiply(&self, other: &ConstantNumber) -> LessResult<ConstantNumber> {
        self.apply(Operator::Multiply, other)
    }

    pub fn divide(&self, other: &ConstantNumber) -> LessResult<ConstantNumber> {
        self.apply(Operator::Divide, other)
    }

    pub fn apply(&self, op: Operator, other: &ConstantNumber) -> LessResult<ConstantNumber> {
        if !self.is_compatible(other) {
            return Err(unit_mismatch(self, other));
        }
        if op == Operator::Divide && other.value == 0.0 {
            return Err(LessError::DivideByZero);
        }
        Ok(ConstantNumber {
            value: op.apply(self.value, other.value),
            unit: self.unit.clone().or_else(|| other.unit.clone()),
        })
    }
}

impl Display for ConstantNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = (self.value * 1000.0).round() / 1000.0;
        if rounded == 0.0 {
            return f.write_str("0");
        }
        let text = rounded.to_string();
        let text = if let Some(rest) = text.strip_prefix("0.") {
            format!(".{rest}")
        } else if let Some(rest) = text.strip_prefix("-0.") {
            format!("-.{rest}")
        } else {
            text
        };
        f.write_str(&text)?;
        if let Some(unit) = &self.unit {
            f.write_str(unit)?;
        }
        Ok(())
    }
}

/// 可以参与运算的常量：数值或颜色。
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Number(ConstantNumber),
    Color(ConstantColor),
}

impl ConstantValue {
    pub fn add(&self, other: &ConstantValue) -> LessResult<ConstantValue> {
        self.apply(Operator::Add, other)
    }

    pub fn subtract(&self, other: &ConstantValue) -> LessResult<ConstantValue> {
        self.apply(Operator::Subtract, other)
    }

    pub fn multiply(&self, other: &ConstantValue) -> LessResult<ConstantValue> {
        self.apply(Operator::Multiply, other)
    }

    pub fn divide(&self, other: &ConstantValue) -> LessResult<ConstantValue> {
        self.apply(Operator::Divide, other)
    }

    pub fn apply(&self, op: Operator, other: &ConstantValue) -> LessResult<ConstantValue> {
        match (self, other) {
            (ConstantValue::Number(left), ConstantValue::Number(right)) => {
                left.apply(op, right).map(ConstantValue::Number)
            }
            (ConstantValue::Number(number), ConstantValue::Color(color))
                if op == Operator::Multiply && number.is_unitless() =>
            {
                Ok(ConstantValue::Color(
                    color.combine([number.value; 3], |c, n| c * n),
                ))
            }
            (ConstantValue::Number(_), ConstantValue::Color(_)) => {
                Err(unit_mismatch(self, other))
            }
            (ConstantValue::Color(color), ConstantValue::Number(number)) => {
                if !number.is_unitless() {
                    return Err(unit_mismatch(self, other));
                }
                if op == Operator::Divide && number.value == 0.0 {
                    return Err(LessError::DivideByZero);
                }
                Ok(ConstantValue::Color(
                    color.combine([number.value; 3], |c, n| op.apply(c, n)),
                ))
            }
            (ConstantValue::Color(left), ConstantValue::Color(right)) => {
                let operands = right.channels();
                if op == Operator::Divide && operands.contains(&0.0) {
                    return Err(LessError::DivideByZero);
                }
                Ok(ConstantValue::Color(
                    left.combine(operands, |c, n| op.apply(c, n)),
                ))
            }
        }
    }
}

impl Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Number(number) => number.fmt(f),
            ConstantValue::Color(color) => color.fmt(f),
        }
    }
}

impl From<ConstantNumber> for ConstantValue {
    fn from(value: ConstantNumber) -> Self {
        ConstantValue::Number(value)
    }
}

impl From<ConstantColor> for ConstantValue {
    fn from(value: ConstantColor) -> Self {
        ConstantValue::Color(value)
    }
}

fn unit_mismatch<L: Display, R: Display>(left: &L, right: &R) -> LessError {
    LessError::UnitMismatch {
        left: left.to_string(),
        right: right.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn px(value: f64) -> ConstantNumber {
        ConstantNumber::new(value, Some("px"))
    }

    #[test]
    fn add_then_subtract_restores_value() {
        let pairs = [
            (px(3.0), px(2.5)),
            (px(-1.25), ConstantNumber::unitless(4.0)),
            (ConstantNumber::unitless(7.0), ConstantNumber::new(0.3, Some("em"))),
        ];
        for (a, b) in pairs {
            let result = a.add(&b).and_then(|sum| sum.subtract(&b)).unwrap();
            assert!((result.value() - a.value()).abs() < 1e-9);
            assert_eq!(result.unit(), a.unit().or(b.unit()));
        }
    }

    #[test]
    fn incompatible_units_fail() {
        let err = px(3.0).add(&ConstantNumber::new(2.0, Some("em"))).unwrap_err();
        assert_eq!(
            err,
            LessError::UnitMismatch {
                left: "3px".into(),
                right: "2em".into()
            }
        );
        assert_eq!(err.to_string(), "Unit mismatch: 3px 2em");
    }

    #[test]
    fn division_by_zero_fails() {
        assert_eq!(px(3.0).divide(&px(0.0)), Err(LessError::DivideByZero));
        assert_eq!(px(3.0).divide(&px(2.0)).unwrap(), px(1.5));
    }

    #[test]
    fn parse_and_format() {
        assert_eq!(ConstantNumber::parse("5px").unwrap().to_string(), "5px");
        assert_eq!(ConstantNumber::parse(".5px").unwrap().to_string(), ".5px");
        assert_eq!(ConstantNumber::parse("3.em").unwrap(), ConstantNumber::new(3.0, Some("em")));
        assert_eq!(ConstantNumber::parse("-0.5").unwrap().to_string(), "-.5");
        assert_eq!(ConstantNumber::parse("10%").unwrap().unit(), Some("%"));
        assert_eq!(ConstantNumber::parse("px"), None);
        assert_eq!(px(0.0).to_string(), "0");
        assert_eq!(px(1.23456).to_string(), "1.235px");
        assert_eq!(px(2.5000).to_string(), "2.5px");
        assert_eq!(px(0.0004).to_string(), "0");
    }

    #[test]
    fn number_times_color_scales_channels() {
        let three = ConstantValue::Number(ConstantNumber::unitless(3.0));
        let dark = ConstantValue::Color(ConstantColor::from_rgb(0x111111));
        let light = ConstantValue::Color(ConstantColor::from_rgb(0xaaaaaa));
        assert_eq!(
            three.multiply(&dark).unwrap(),
            ConstantValue::Color(ConstantColor::from_rgb(0x333333))
        );
        assert_eq!(
            three.multiply(&light).unwrap(),
            ConstantValue::Color(ConstantColor::from_rgb(0xffffff))
        );
        assert_eq!(dark.multiply(&three), three.multiply(&dark));
    }

    #[test]
    fn number_with_color_otherwise_mismatch() {
        let dark = ConstantValue::Color(ConstantColor::from_rgb(0x111111));
        let sized = ConstantValue::Number(px(2.0));
        assert!(matches!(
            sized.multiply(&dark),
            Err(LessError::UnitMismatch { .. })
        ));
        assert!(matches!(
            dark.add(&sized),
            Err(LessError::UnitMismatch { .. })
        ));
        assert!(matches!(
            ConstantValue::Number(ConstantNumber::unitless(1.0)).add(&dark),
            Err(LessError::UnitMismatch { .. })
        ));
    }

    #[test]
    fn color_arithmetic_is_component_wise() {
        let left = ConstantValue::Color(ConstantColor::from_rgb(0x102030));
        let right = ConstantValue::Color(ConstantColor::from_rgb(0x010203));
        assert_eq!(
            left.add(&right).unwrap(),
            ConstantValue::Color(ConstantColor::from_rgb(0x112233))
        );
        assert_eq!(
            right.subtract(&left).unwrap(),
            ConstantValue::Color(ConstantColor::from_rgb(0x000000))
        );
        let ten = ConstantValue::Number(ConstantNumber::unitless(16.0));
        assert_eq!(
            left.add(&ten).unwrap(),
            ConstantValue::Color(ConstantColor::from_rgb(0x203040))
        );
        assert_eq!(
            left.divide(&ConstantValue::Number(ConstantNumber::unitless(0.0))),
            Err(LessError::DivideByZero)
        );
    }
}
