use std::fmt::{self, Display};
use std::io::Write;
use thiserror::Error;

/// 源码位置：行号从 1 开始，列号从 0 开始。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}]", self.line, self.column)
    }
}

/// 编译过程中统一的错误类型。
///
/// 诊断文本保持英文，方便与既有 LESS 工具链的输出对照。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LessError {
    #[error("Unit mismatch: {left} {right}")]
    UnitMismatch { left: String, right: String },
    #[error("Division by zero.")]
    DivideByZero,
    #[error("Undefined variable: @{0}")]
    UndefinedVariable(String),
    #[error("Cyclic variable reference: @{0}")]
    CyclicVariableReference(String),
    #[error("Undefined mixin: {0}")]
    UndefinedMixinReference(String),
    #[error("Recursive mixin reference: {0}")]
    RecursiveMixinReference(String),
    #[error("Mixin argument mismatch. Expected maximum of {expected} but got {actual}.")]
    MixinArgumentMismatch { expected: usize, actual: usize },
    #[error("{0}")]
    Function(String),
    #[error("Undefined accessor target: {0}")]
    UndefinedAccessorTarget(String),
    #[error("Ambiguous accessor target: {selector} matches {count} rule sets")]
    AmbiguousAccessorTarget { selector: String, count: usize },
    #[error("Undefined accessor property: {selector}[{property}]")]
    UndefinedAccessorProperty { selector: String, property: String },
    #[error("Import error: \"{target}\": {reason}")]
    Import { target: String, reason: String },
    #[error("{message}")]
    Parse { message: String },
    #[error("{0}")]
    Io(String),
    #[error("{position} - {source}")]
    Positioned {
        position: Position,
        source: Box<LessError>,
    },
    #[error("{} error(s) reported:\n{}", errors.len(), errors.join("\n"))]
    Compile { errors: Vec<String> },
}

pub type LessResult<T> = Result<T, LessError>;

impl LessError {
    pub fn parse<S: Into<String>>(message: S, position: Position) -> Self {
        LessError::Parse {
            message: message.into(),
        }
        .at(Some(position))
    }

    pub fn function<S: Into<String>>(message: S) -> Self {
        LessError::Function(message.into())
    }

    /// 附加源码位置；已经带位置的错误保持不变，保证报告的是最内层节点的位置。
    pub fn at(self, position: Option<Position>) -> Self {
        match (self, position) {
            (err @ LessError::Positioned { .. }, _) => err,
            (err @ LessError::Compile { .. }, _) => err,
            (err, Some(position)) => LessError::Positioned {
                position,
                source: Box::new(err),
            },
            (err, None) => err,
        }
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            LessError::Positioned { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// 去掉位置包装后的错误本体。
    pub fn kind(&self) -> &LessError {
        match self {
            LessError::Positioned { source, .. } => source.kind(),
            other => other,
        }
    }
}

/// 错误汇集端：编译各阶段把诊断交给它，自身只负责计数与呈现。
pub trait ErrorHandler {
    fn handle_error(&mut self, message: &str, cause: Option<&LessError>);

    fn error_count(&self) -> usize;

    /// 诊断前缀，通常是正在编译的文件名。
    fn set_context(&mut self, context: Option<String>);

    fn context(&self) -> Option<&str>;

    fn report(&mut self, error: &LessError) {
        self.handle_error(&error.to_string(), Some(error));
    }
}

fn format_message(context: Option<&str>, message: &str) -> String {
    match context {
        Some(context) if !context.is_empty() => format!("{context} {message}"),
        _ => message.to_string(),
    }
}

/// 在内存中收集所有诊断，`compile` 用它把错误汇总成 [`LessError::Compile`]。
#[derive(Debug, Default)]
pub struct CollectingErrorHandler {
    context: Option<String>,
    messages: Vec<String>,
    errors: Vec<LessError>,
}

impl CollectingErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn errors(&self) -> &[LessError] {
        &self.errors
    }

    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }
}

impl ErrorHandler for CollectingErrorHandler {
    fn handle_error(&mut self, message: &str, cause: Option<&LessError>) {
        self.messages
            .push(format_message(self.context.as_deref(), message));
        if let Some(cause) = cause {
            self.errors.push(cause.clone());
        }
    }

    fn error_count(&self) -> usize {
        self.messages.len()
    }

    fn set_context(&mut self, context: Option<String>) {
        self.context = context;
    }

    fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}

/// 逐行写出诊断，格式为 `{context} [line:column] - message`。
pub struct WriterErrorHandler<W: Write> {
    writer: W,
    context: Option<String>,
    count: usize,
}

impl<W: Write> WriterErrorHandler<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            context: None,
            count: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ErrorHandler for WriterErrorHandler<W> {
    fn handle_error(&mut self, message: &str, _cause: Option<&LessError>) {
        self.count += 1;
        let line = format_message(self.context.as_deref(), message);
        if let Err(err) = writeln!(self.writer, "{line}") {
            tracing::warn!(error = %err, "failed to write diagnostic");
        }
    }

    fn error_count(&self) -> usize {
        self.count
    }

    fn set_context(&mut self, context: Option<String>) {
        self.context = context;
    }

    fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}
