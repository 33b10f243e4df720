use crate::color::{alpha_value, rgb_channel, ConstantColor, Hsl};
use crate::context::EvaluationContext;
use crate::error::{LessError, LessResult};
use crate::expression::{ExprKind, Expression};
use crate::utils::{unquote, url_encode};
use crate::value::{ConstantNumber, ConstantValue};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fmt;

static FORMAT_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%[sdaSDA]").expect("格式化占位符正则必须合法"));

/// 内置或自定义的 CSS 函数，参数已经求值且去掉了分隔符。
pub trait CssFunction {
    fn call(&self, name: &str, args: &[Expression]) -> LessResult<Expression>;
}

impl<F> CssFunction for F
where
    F: Fn(&str, &[Expression]) -> LessResult<Expression>,
{
    fn call(&self, name: &str, args: &[Expression]) -> LessResult<Expression> {
        self(name, args)
    }
}

type BoxedFunction = Box<dyn CssFunction + Send + Sync>;

/// 函数名到实现的有序映射。
pub struct FunctionRegistry {
    functions: IndexMap<String, BoxedFunction>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.functions.keys()).finish()
    }
}

impl FunctionRegistry {
    /// 注册全部内置函数。
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("%", format_string);
        registry.register("e", escape);
        registry.register("lighten", |name: &str, args: &[Expression]| {
            adjust_hsl(name, args, |hsl, amount| hsl.lightness += amount)
        });
        registry.register("darken", |name: &str, args: &[Expression]| {
            adjust_hsl(name, args, |hsl, amount| hsl.lightness -= amount)
        });
        registry.register("saturate", |name: &str, args: &[Expression]| {
            adjust_hsl(name, args, |hsl, amount| hsl.saturation += amount)
        });
        registry.register("desaturate", |name: &str, args: &[Expression]| {
            adjust_hsl(name, args, |hsl, amount| hsl.saturation -= amount)
        });
        registry.register("spin", spin);
        registry.register("grayscale", grayscale);
        registry.register("greyscale", grayscale);
        registry.register("argb", argb);
        registry.register("fade", fade);
        registry.register("overlay", overlay);
        registry.register("rgb", rgb);
        registry.register("rgba", rgb);
        registry.register("hsl", hsl);
        registry.register("hsla", hsl);
        registry
    }

    pub fn empty() -> Self {
        Self {
            functions: IndexMap::new(),
        }
    }

    /// 注册或覆盖同名函数。
    pub fn register<S, F>(&mut self, name: S, function: F)
    where
        S: Into<String>,
        F: CssFunction + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Box::new(function));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// 先求值全部参数并跳过分隔符，再分派；未知函数原样输出为 `name(args)`。
    pub fn evaluate(
        &self,
        name: &str,
        args: &[Expression],
        context: &EvaluationContext<'_>,
    ) -> LessResult<Expression> {
        let mut evaluated = Vec::with_capacity(args.len());
        for arg in args.iter().filter(|arg| !arg.is_separator()) {
            evaluated.push(arg.evaluate(context)?);
        }
        match self.functions.get(name) {
            Some(function) => {
                tracing::trace!(function = name, args = evaluated.len(), "calling function");
                function.call(name, &evaluated)
            }
            None => Ok(Expression::function(name, evaluated)),
        }
    }
}

fn expect_arity(name: &str, args: &[Expression], allowed: &[usize]) -> LessResult<()> {
    if allowed.contains(&args.len()) {
        Ok(())
    } else {
        Err(LessError::function(format!(
            "Invalid number of arguments for function '{name}'"
        )))
    }
}

fn argument_error(name: &str, index: usize, expected: &str, arg: &Expression) -> LessError {
    LessError::function(format!(
        "Argument {} for function '{name}' must be {expected}: {arg}",
        index + 1
    ))
    .at(arg.position)
}

fn color_arg(name: &str, args: &[Expression], index: usize) -> LessResult<ConstantColor> {
    let arg = &args[index];
    match arg.as_constant() {
        Some(ConstantValue::Color(color)) => Ok(color),
        _ => Err(argument_error(name, index, "a color", arg)),
    }
}

fn number_arg(name: &str, args: &[Expression], index: usize) -> LessResult<ConstantNumber> {
    let arg = &args[index];
    match arg.as_constant() {
        Some(ConstantValue::Number(number)) => Ok(number),
        _ => Err(argument_error(name, index, "a number", arg)),
    }
}

/// 百分比参数：接受 `10%` 或无单位的 `10`，返回 0..1 的比例。
fn percentage_arg(name: &str, args: &[Expression], index: usize) -> LessResult<f64> {
    let arg = &args[index];
    match arg.as_constant() {
        Some(ConstantValue::Number(number)) if matches!(number.unit(), None | Some("%")) => {
            Ok(number.value() / 100.0)
        }
        _ => Err(argument_error(name, index, "a percentage", arg)),
    }
}

fn adjust_hsl<F>(name: &str, args: &[Expression], adjust: F) -> LessResult<Expression>
where
    F: Fn(&mut Hsl, f64),
{
    expect_arity(name, args, &[2])?;
    let color = color_arg(name, args, 0)?;
    let amount = percentage_arg(name, args, 1)?;
    let mut hsl = color.to_hsl();
    adjust(&mut hsl, amount);
    hsl.saturation = hsl.saturation.clamp(0.0, 1.0);
    hsl.lightness = hsl.lightness.clamp(0.0, 1.0);
    Ok(Expression::constant(ConstantColor::from_hsl(
        hsl,
        color.alpha(),
    )))
}

fn spin(name: &str, args: &[Expression]) -> LessResult<Expression> {
    expect_arity(name, args, &[2])?;
    let color = color_arg(name, args, 0)?;
    let degrees = number_arg(name, args, 1)?;
    if !matches!(degrees.unit(), None | Some("deg")) {
        return Err(argument_error(name, 1, "a number", &args[1]));
    }
    let mut hsl = color.to_hsl();
    hsl.hue = (hsl.hue + degrees.value()).rem_euclid(360.0);
    Ok(Expression::constant(ConstantColor::from_hsl(
        hsl,
        color.alpha(),
    )))
}

fn grayscale(name: &str, args: &[Expression]) -> LessResult<Expression> {
    expect_arity(name, args, &[1])?;
    let color = color_arg(name, args, 0)?;
    let mut hsl = color.to_hsl();
    hsl.saturation = 0.0;
    Ok(Expression::constant(ConstantColor::from_hsl(
        hsl,
        color.alpha(),
    )))
}

fn argb(name: &str, args: &[Expression]) -> LessResult<Expression> {
    expect_arity(name, args, &[1])?;
    let color = color_arg(name, args, 0)?;
    Ok(Expression::literal(color.to_argb()))
}

fn fade(name: &str, args: &[Expression]) -> LessResult<Expression> {
    expect_arity(name, args, &[2])?;
    let color = color_arg(name, args, 0)?;
    let amount = percentage_arg(name, args, 1)?;
    Ok(Expression::constant(color.fade(amount)))
}

fn overlay(name: &str, args: &[Expression]) -> LessResult<Expression> {
    expect_arity(name, args, &[2])?;
    let top = color_arg(name, args, 0)?;
    let bottom = color_arg(name, args, 1)?;
    Ok(Expression::constant(top.overlay(bottom)))
}

fn is_percent(number: &ConstantNumber) -> bool {
    number.unit() == Some("%")
}

fn rgb(name: &str, args: &[Expression]) -> LessResult<Expression> {
    expect_arity(name, args, &[3, 4])?;
    let mut channels = [0u8; 3];
    for (index, channel) in channels.iter_mut().enumerate() {
        let number = number_arg(name, args, index)?;
        *channel = rgb_channel(number.value(), is_percent(&number));
    }
    let alpha = if args.len() == 4 {
        let number = number_arg(name, args, 3)?;
        alpha_value(number.value(), is_percent(&number))
    } else {
        1.0
    };
    let [r, g, b] = channels;
    Ok(Expression::constant(
        ConstantColor::new(r, g, b).with_alpha(alpha),
    ))
}

fn hsl(name: &str, args: &[Expression]) -> LessResult<Expression> {
    expect_arity(name, args, &[3, 4])?;
    let hue = number_arg(name, args, 0)?;
    let saturation = number_arg(name, args, 1)?;
    let lightness = number_arg(name, args, 2)?;
    let alpha = if args.len() == 4 {
        let number = number_arg(name, args, 3)?;
        alpha_value(number.value(), is_percent(&number))
    } else {
        1.0
    };
    Ok(Expression::constant(ConstantColor::from_hsl_components(
        hue.value(),
        saturation.value(),
        lightness.value(),
        alpha,
    )))
}

/// `e("...")`：去掉引号原样输出。
fn escape(name: &str, args: &[Expression]) -> LessResult<Expression> {
    expect_arity(name, args, &[1])?;
    let text = args[0].to_string();
    match unquote(&text) {
        Some((_, inner)) => Ok(Expression::literal(inner)),
        None => Ok(Expression::literal(text)),
    }
}

/// `%("fmt", args...)`：`%s %d %a` 依次替换参数，大写形式额外做 URL 编码。
fn format_string(name: &str, args: &[Expression]) -> LessResult<Expression> {
    let Some(first) = args.first() else {
        return Err(LessError::function(format!(
            "Invalid number of arguments for function '{name}'"
        )));
    };
    let template = first.to_string();
    let (quote, body) = match unquote(&template) {
        Some(parts) => parts,
        None => return Err(argument_error(name, 0, "a string", first)),
    };
    let mut rest = args[1..].iter();
    let replaced = FORMAT_PLACEHOLDER.replace_all(body, |caps: &Captures<'_>| {
        let placeholder = &caps[0];
        let Some(arg) = rest.next() else {
            return placeholder.to_string();
        };
        let rendered = arg.to_string();
        let value = match (&arg.kind, placeholder) {
            (ExprKind::Literal(_), "%s" | "%S") => unquote(&rendered)
                .map_or_else(|| rendered.clone(), |(_, inner)| inner.to_string()),
            _ => rendered,
        };
        if placeholder.chars().nth(1).is_some_and(|ch| ch.is_ascii_uppercase()) {
            url_encode(&value)
        } else {
            value
        }
    });
    Ok(Expression::literal(format!("{quote}{replaced}{quote}")))
}
