//! lesscss_engine 库入口，提供面向 Rust 与 Node.js 的 LESS 编译能力。
//! 内部分为三个阶段：解析（Parser）→ 语义变换（Transformer）→ CSS 序列化（Serializer）。
//! 任一阶段报告了错误，后续阶段都会跳过。

mod color;
mod context;
mod error;
mod expression;
mod functions;
mod importer;
mod model;
mod parser;
mod serializer;
mod transformer;
mod utils;
mod value;

pub use crate::color::{ConstantColor, Hsl};
pub use crate::context::{EvaluationContext, ResolvingFrame, RuleSetContainer, VariableContainer};
pub use crate::error::{
    CollectingErrorHandler, ErrorHandler, LessError, LessResult, Position, WriterErrorHandler,
};
pub use crate::expression::{ExprKind, Expression};
pub use crate::functions::{CssFunction, FunctionRegistry};
pub use crate::importer::ImportResolver;
pub use crate::model::{
    Arguments, BodyElement, BodyElementContainer, Declaration, DeclarationElement, Keyframes,
    Media, MixinReference, Page, RuleSet, Selector, StyleSheet,
};
pub use crate::parser::LessParser;
pub use crate::serializer::Serializer;
pub use crate::transformer::Transformer;
pub use crate::value::{ConstantNumber, ConstantValue, Operator};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// LESS 编译配置。
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// 是否输出压缩后的 CSS。
    pub minify: bool,
    /// 当前源文件所在目录，用于解析相对 @import。
    pub current_dir: Option<PathBuf>,
    /// 额外的检索目录。
    pub include_paths: Vec<PathBuf>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            minify: false,
            current_dir: None,
            include_paths: Vec::new(),
        }
    }
}

impl CompileOptions {
    fn resolves_imports(&self) -> bool {
        self.current_dir.is_some() || !self.include_paths.is_empty()
    }
}

/// 编译器：持有配置与函数注册表，可以反复编译多份源码。
#[derive(Debug)]
pub struct Compiler {
    options: CompileOptions,
    functions: FunctionRegistry,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompileOptions::default())
    }
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            functions: FunctionRegistry::new(),
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// 注册自定义函数或覆盖内置函数。
    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    /// 解析、变换并写出 CSS。
    ///
    /// 诊断全部交给 `handler`；某阶段新增了错误时跳过后续阶段，但仍然返回 `Ok`。
    /// 只有写出失败才返回 `Err`。
    pub fn compile_to<W: Write + ?Sized>(
        &self,
        input: &str,
        output: &mut W,
        handler: &mut dyn ErrorHandler,
    ) -> LessResult<()> {
        let baseline = handler.error_count();

        let mut resolver = self
            .options
            .resolves_imports()
            .then(|| ImportResolver::new(&self.options.include_paths));
        let parsed = match resolver.as_mut() {
            Some(resolver) => {
                LessParser::with_imports(resolver, self.options.current_dir.as_deref())
                    .parse(input)
            }
            None => LessParser::new().parse(input),
        };
        if let Some(resolver) = resolver.as_mut() {
            for diagnostic in resolver.take_diagnostics() {
                handler.report(&diagnostic);
            }
        }
        let source = match parsed {
            Ok(sheet) => sheet,
            Err(err) => {
                tracing::warn!(error = %err, "parse failed");
                handler.report(&err);
                return Ok(());
            }
        };
        if handler.error_count() > baseline {
            tracing::debug!("skipping transform after parse diagnostics");
            return Ok(());
        }

        let mut transformer = Transformer::new(&self.functions);
        let resolved = transformer.transform_stylesheet(&source);
        for diagnostic in transformer.take_diagnostics() {
            handler.report(&diagnostic);
        }
        if handler.error_count() > baseline {
            tracing::debug!("skipping serialization after transform diagnostics");
            return Ok(());
        }

        let css = Serializer::new(self.options.minify).to_css(&resolved);
        output
            .write_all(css.as_bytes())
            .map_err(|err| LessError::Io(format!("Failed to write CSS output: {err}")))?;
        tracing::debug!(bytes = css.len(), "css written");
        Ok(())
    }

    /// 编译为字符串，任何诊断都会汇总成 [`LessError::Compile`]。
    pub fn compile(&self, source: &str) -> LessResult<String> {
        self.compile_with_context(source, None)
    }

    fn compile_with_context(&self, source: &str, context: Option<String>) -> LessResult<String> {
        let mut handler = CollectingErrorHandler::new();
        handler.set_context(context);
        let mut css = Vec::new();
        self.compile_to(source, &mut css, &mut handler)?;
        if handler.error_count() > 0 {
            return Err(LessError::Compile {
                errors: handler.into_messages(),
            });
        }
        String::from_utf8(css).map_err(|err| LessError::Io(err.to_string()))
    }
}

/// 编译 LESS 源码为 CSS 文本。
///
/// # 参数
/// * `source` - 待编译的 LESS 字符串
/// * `options` - 编译配置
pub fn compile(source: &str, options: CompileOptions) -> LessResult<String> {
    Compiler::new(options).compile(source)
}

/// 从文件路径编译 LESS，自动处理 @import；诊断以文件名为前缀。
pub fn compile_file<P: AsRef<Path>>(path: P, mut options: CompileOptions) -> LessResult<String> {
    let path = path.as_ref();
    let source = fs::read_to_string(path)
        .map_err(|err| LessError::Io(format!("Failed to read '{}': {err}", path.display())))?;
    if let Some(parent) = path.parent() {
        if options.current_dir.is_none() {
            options.current_dir = Some(parent.to_path_buf());
        }
        if options.include_paths.is_empty() {
            options.include_paths.push(parent.to_path_buf());
        }
    }
    let context = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    Compiler::new(options).compile_with_context(&source, context)
}

#[cfg(feature = "node")]
use napi::{Error, Result};
#[cfg(feature = "node")]
use napi_derive::napi;

/// Node.js 侧的编译选项对象。
#[cfg(feature = "node")]
#[napi(object)]
pub struct JsCompileOptions {
    /// 是否压缩输出 CSS。
    pub minify: Option<bool>,
    /// 源文件路径，用于解析 @import。
    pub filename: Option<String>,
    /// 额外的 @import 检索目录。
    pub include_paths: Option<Vec<String>>,
}

/// 暴露给 Node.js 的编译函数。
#[cfg(feature = "node")]
#[napi]
pub fn compile_less(source: String, options: Option<JsCompileOptions>) -> Result<String> {
    let opt = options.unwrap_or(JsCompileOptions {
        minify: None,
        filename: None,
        include_paths: None,
    });
    let mut compile_options = CompileOptions {
        minify: opt.minify.unwrap_or(false),
        include_paths: opt
            .include_paths
            .unwrap_or_default()
            .into_iter()
            .map(PathBuf::from)
            .collect(),
        ..CompileOptions::default()
    };
    let mut context = None;
    if let Some(filename) = opt.filename {
        let path = PathBuf::from(&filename);
        if let Some(parent) = path.parent() {
            let dir = parent.to_path_buf();
            compile_options.current_dir = Some(dir.clone());
            compile_options.include_paths.push(dir);
        }
        context = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
    }
    Compiler::new(compile_options)
        .compile_with_context(&source, context)
        .map_err(|err| Error::from_reason(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn minified() -> CompileOptions {
        CompileOptions {
            minify: true,
            ..CompileOptions::default()
        }
    }

    #[test]
    fn compile_basic_variable() {
        let src = r"@base: #111;
body {
  color: @base;
}";
        let css = compile(src, CompileOptions::default()).unwrap();
        assert_eq!(css, "body {\n  color: #111;\n}");
    }

    #[test]
    fn compile_nested_selectors() {
        let src = r".btn {
  color: #fff;
  &:hover {
    color: #000;
  }
}";
        let css = compile(src, CompileOptions::default()).unwrap();
        assert!(css.contains(".btn:hover {\n  color: #000;\n}"));
    }

    #[test]
    fn compile_important_flag() {
        let src = r"@base: 10px;
.box {
  margin: @base !important;
}";
        let css = compile(src, minified()).unwrap();
        assert_eq!(css, ".box{margin:10px!important}");
    }

    #[test]
    fn compile_arithmetic_expression() {
        let src = r"@base: 10px;
.box {
  width: @base + 5px;
  padding: (@base * 2);
}";
        let css = compile(src, CompileOptions::default()).unwrap();
        assert!(css.contains("width: 15px;"));
        assert!(css.contains("padding: 20px;"));
    }

    #[test]
    fn compile_multiple_arithmetic_segments() {
        let src = r"@spacing: 12px;
.box {
  padding: (@spacing * 0.75) (@spacing * 1.5);
}";
        let css = compile(src, CompileOptions::default()).unwrap();
        assert!(css.contains("padding: 9px 18px;"));
    }

    #[test]
    fn compile_color_functions() {
        let src = r"@brand: #336699;
.btn {
  background: lighten(@brand, 20%);
  border-color: darken(@brand, 10%);
  color: fade(#ffffff, 40%);
}";
        let css = compile(src, CompileOptions::default()).unwrap();
        assert!(css.contains("background: #69c;"));
        assert!(css.contains("border-color: #264d73;"));
        assert!(css.contains("color: rgba(255, 255, 255, 0.4);"));
    }

    #[test]
    fn compile_mixin_with_default() {
        let src = r".shadow(@blur: 4px) {
  box-shadow: 0 0 @blur rgba(0, 0, 0, 0.2);
}

.panel {
  .shadow();
}

.toast {
  .shadow(8px);
}";
        let css = compile(src, CompileOptions::default()).unwrap();
        assert!(css.contains(".panel {\n  box-shadow: 0 0 4px rgba(0, 0, 0, 0.2);\n}"));
        assert!(css.contains(".toast {\n  box-shadow: 0 0 8px rgba(0, 0, 0, 0.2);\n}"));
        assert!(!css.contains(".shadow"));
    }

    #[test]
    fn compile_import_statement() {
        let src = r#"@import "reset.css";
@color: #000;
body {
  color: @color;
}"#;
        let pretty = compile(src, CompileOptions::default()).unwrap();
        assert_eq!(pretty, "@import \"reset.css\";\n\nbody {\n  color: #000;\n}");

        let minified = compile(src, minified()).unwrap();
        assert_eq!(minified, "@import \"reset.css\";\nbody{color:#000}");
    }

    #[test]
    fn diagnostics_stop_the_pipeline() {
        let src = ".a { width: @missing; }\n.b { height: @gone; }";
        let compiler = Compiler::default();
        let mut handler = CollectingErrorHandler::new();
        let mut output = Vec::new();
        compiler.compile_to(src, &mut output, &mut handler).unwrap();
        assert!(output.is_empty());
        assert_eq!(
            handler.messages(),
            &[
                "[1:12] - Undefined variable: @missing".to_string(),
                "[2:13] - Undefined variable: @gone".to_string(),
            ]
        );
    }

    #[test]
    fn parse_errors_skip_the_transform() {
        let compiler = Compiler::default();
        let mut handler = CollectingErrorHandler::new();
        let mut output = Vec::new();
        compiler
            .compile_to(".a { color: red;", &mut output, &mut handler)
            .unwrap();
        assert_eq!(handler.error_count(), 1);
        assert!(output.is_empty());
    }

    #[test]
    fn compile_error_summarises_messages() {
        let err = compile(".a { width: 1px + 1em; }", CompileOptions::default()).unwrap_err();
        assert_eq!(
            err,
            LessError::Compile {
                errors: vec!["[1:12] - Unit mismatch: 1px 1em".to_string()],
            }
        );
    }

    #[test]
    fn custom_functions_are_dispatched() {
        let mut compiler = Compiler::new(minified());
        compiler
            .functions_mut()
            .register("double", |_: &str, args: &[Expression]| {
                match args.first().and_then(Expression::as_constant) {
                    Some(ConstantValue::Number(number)) => {
                        Ok(Expression::number(number.value() * 2.0, number.unit()))
                    }
                    _ => Err(LessError::function("double expects a number")),
                }
            });
        let css = compiler.compile(".a { width: double(4px); }").unwrap();
        assert_eq!(css, ".a{width:8px}");
    }
}
