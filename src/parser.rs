use crate::color::ConstantColor;
use crate::error::{LessError, LessResult, Position};
use crate::expression::Expression;
use crate::importer::ImportResolver;
use crate::model::{
    Arguments, BodyElement, BodyElementContainer, Declaration, DeclarationElement, Keyframes,
    Media, MixinReference, Page, RuleSet, Selector, StyleSheet,
};
use crate::utils::collapse_whitespace;
use crate::value::{ConstantNumber, Operator};
use std::path::{Path, PathBuf};

/// LESS 解析器，直接构造变换前的模型树，每个节点都带有源码位置。
///
/// 配置了 [`ImportResolver`] 时，`@import` 的 LESS 文件在解析阶段就地展开。
pub struct LessParser<'r> {
    imports: Option<&'r mut ImportResolver>,
    current_dir: Option<PathBuf>,
}

impl Default for LessParser<'_> {
    fn default() -> Self {
        Self {
            imports: None,
            current_dir: None,
        }
    }
}

impl<'r> LessParser<'r> {
    pub fn new() -> Self {
        Self::default()
    }

    /// `current_dir` 是被解析文件所在目录，相对导入从这里开始查找。
    pub fn with_imports(resolver: &'r mut ImportResolver, current_dir: Option<&Path>) -> Self {
        Self {
            imports: Some(resolver),
            current_dir: current_dir.map(Path::to_path_buf),
        }
    }

    pub fn parse(&mut self, input: &str) -> LessResult<StyleSheet> {
        let mut cursor = Cursor::new(input);
        let mut sheet = StyleSheet::new();

        loop {
            cursor.skip_whitespace_and_comments();
            if cursor.is_eof() {
                break;
            }

            if cursor.starts_with('@') {
                self.parse_top_level_at_rule(&mut cursor, &mut sheet)?;
                continue;
            }

            if cursor.lookahead_is_mixin_definition() {
                let mixin = self.parse_mixin_definition(&mut cursor)?;
                sheet.container.add_body_element(BodyElement::RuleSet(mixin));
                continue;
            }

            if cursor.lookahead_is_mixin_call() {
                return Err(LessError::parse(
                    "Mixin calls are only allowed inside rule sets",
                    cursor.location(),
                ));
            }

            let rule_set = self.parse_rule_set(&mut cursor)?;
            sheet.container.add_body_element(BodyElement::RuleSet(rule_set));
        }

        Ok(sheet)
    }

    fn parse_top_level_at_rule(
        &mut self,
        cursor: &mut Cursor<'_>,
        sheet: &mut StyleSheet,
    ) -> LessResult<()> {
        if cursor.lookahead_is_variable_decl() {
            let (name, value) = self.parse_variable(cursor)?;
            sheet.container.set_variable(name, value);
            return Ok(());
        }

        let start = cursor.location();
        let keyword = cursor.peek_at_keyword().to_ascii_lowercase();
        match keyword.as_str() {
            "import" => self.parse_import(cursor, sheet),
            "charset" => {
                cursor.consume_at_keyword();
                let value = cursor.read_until(';')?;
                cursor.expect_char(';')?;
                sheet.charset = Some(value.trim().to_string());
                Ok(())
            }
            "media" => {
                let media = self.parse_media(cursor)?;
                sheet.container.add_body_element(BodyElement::Media(media));
                Ok(())
            }
            "page" => {
                let page = self.parse_page(cursor)?;
                sheet.container.add_body_element(BodyElement::Page(page));
                Ok(())
            }
            name if name == "keyframes" || name.ends_with("-keyframes") => {
                let keyframes = self.parse_keyframes(cursor)?;
                sheet
                    .container
                    .add_body_element(BodyElement::Keyframes(keyframes));
                Ok(())
            }
            _ if cursor.lookahead_is_block_at_rule() => {
                let rule_set = self.parse_at_rule_set(cursor)?;
                sheet.container.add_body_element(BodyElement::RuleSet(rule_set));
                Ok(())
            }
            _ => Err(LessError::parse(
                format!("Unsupported at-rule '@{keyword}'"),
                start,
            )),
        }
    }

    fn parse_import(&mut self, cursor: &mut Cursor<'_>, sheet: &mut StyleSheet) -> LessResult<()> {
        let start = cursor.location();
        cursor.consume_at_keyword();
        let spec = cursor.read_until(';')?;
        cursor.expect_char(';')?;

        let mut remainder = spec.trim();
        let mut options = Vec::new();
        if remainder.starts_with('(') {
            let end = remainder
                .find(')')
                .ok_or_else(|| LessError::parse("Incomplete @import options", start))?;
            options = remainder[1..end]
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|option| !option.is_empty())
                .map(str::to_ascii_lowercase)
                .collect();
            remainder = remainder[end + 1..].trim_start();
        }

        let path = extract_import_path(remainder);
        let is_css = options.iter().any(|option| option == "css")
            || path.as_deref().map_or(true, |target| target.ends_with(".css"));

        if !is_css {
            if let (Some(target), Some(resolver)) = (&path, self.imports.as_deref_mut()) {
                if let Some(imported) = resolver.import(target, self.current_dir.as_deref(), start)
                {
                    merge_stylesheet(sheet, imported);
                }
                return Ok(());
            }
        }

        sheet.imports.push(format!("@import {remainder};"));
        Ok(())
    }

    fn parse_variable(&self, cursor: &mut Cursor<'_>) -> LessResult<(String, Expression)> {
        let start = cursor.location();
        cursor.expect_char('@')?;
        let name = cursor.read_identifier();
        cursor.skip_whitespace_and_comments();
        cursor.expect_char(':')?;
        let value = parse_value(cursor, &[';', '}'])?;
        cursor.consume_if(';');
        Ok((name, single_or_list(value.items, start)))
    }

    fn parse_rule_set(&self, cursor: &mut Cursor<'_>) -> LessResult<RuleSet> {
        let start = cursor.location();
        let prelude = cursor.read_block_prelude()?;
        let selectors = split_top_level(&prelude, ',')
            .iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .map(Selector::new)
            .collect::<Vec<_>>();

        if selectors.is_empty() {
            return Err(LessError::parse("Missing selector", start));
        }

        cursor.expect_char('{')?;
        let mut rule_set = RuleSet::new(selectors);
        rule_set.position = Some(start);
        self.parse_block(
            cursor,
            &mut rule_set.declarations,
            &mut rule_set.container,
            true,
        )?;
        Ok(rule_set)
    }

    /// 顶层的其他块级 at-rule（例如 `@font-face`）按普通规则集处理。
    fn parse_at_rule_set(&self, cursor: &mut Cursor<'_>) -> LessResult<RuleSet> {
        let start = cursor.location();
        let name = cursor.consume_at_keyword();
        let prelude = collapse_whitespace(&cursor.read_block_prelude()?);
        cursor.expect_char('{')?;
        let selector = if prelude.is_empty() {
            format!("@{name}")
        } else {
            format!("@{name} {prelude}")
        };
        let mut rule_set = RuleSet::new(vec![Selector::new(selector)]);
        rule_set.position = Some(start);
        self.parse_block(
            cursor,
            &mut rule_set.declarations,
            &mut rule_set.container,
            true,
        )?;
        Ok(rule_set)
    }

    fn parse_media(&self, cursor: &mut Cursor<'_>) -> LessResult<Media> {
        let start = cursor.location();
        cursor.consume_at_keyword();
        let query = cursor.read_block_prelude()?;
        cursor.expect_char('{')?;
        let mediums = split_top_level(&query, ',')
            .iter()
            .map(|medium| collapse_whitespace(medium))
            .filter(|medium| !medium.is_empty())
            .collect();
        let mut media = Media {
            mediums,
            container: BodyElementContainer::new(),
            position: Some(start),
        };
        self.parse_element_body(cursor, &mut media.container)?;
        Ok(media)
    }

    fn parse_page(&self, cursor: &mut Cursor<'_>) -> LessResult<Page> {
        let start = cursor.location();
        cursor.consume_at_keyword();
        let pseudo = collapse_whitespace(&cursor.read_block_prelude()?);
        cursor.expect_char('{')?;
        let mut page = Page {
            pseudo: (!pseudo.is_empty()).then_some(pseudo),
            declarations: Vec::new(),
            container: BodyElementContainer::new(),
            position: Some(start),
        };
        self.parse_block(cursor, &mut page.declarations, &mut page.container, false)?;
        Ok(page)
    }

    fn parse_keyframes(&self, cursor: &mut Cursor<'_>) -> LessResult<Keyframes> {
        let start = cursor.location();
        let keyword = cursor.consume_at_keyword();
        let name = collapse_whitespace(&cursor.read_block_prelude()?);
        cursor.expect_char('{')?;
        let mut keyframes = Keyframes {
            keyword,
            name,
            container: BodyElementContainer::new(),
            position: Some(start),
        };
        self.parse_element_body(cursor, &mut keyframes.container)?;
        Ok(keyframes)
    }

    /// @media 与 @keyframes 的主体：只允许变量、mixin 定义、@page 与规则集。
    fn parse_element_body(
        &self,
        cursor: &mut Cursor<'_>,
        container: &mut BodyElementContainer,
    ) -> LessResult<()> {
        loop {
            cursor.skip_whitespace_and_comments();
            let start = cursor.location();
            match cursor.peek_char() {
                Some('}') => {
                    cursor.advance_char();
                    return Ok(());
                }
                None => return Err(LessError::parse("Missing closing '}'", start)),
                _ => {}
            }

            if cursor.starts_with('@') {
                if cursor.lookahead_is_variable_decl() {
                    let (name, value) = self.parse_variable(cursor)?;
                    container.set_variable(name, value);
                    continue;
                }
                if cursor.peek_at_keyword().eq_ignore_ascii_case("page") {
                    let page = self.parse_page(cursor)?;
                    container.add_body_element(BodyElement::Page(page));
                    continue;
                }
                return Err(nested_at_rule(cursor, start));
            }

            if cursor.lookahead_is_mixin_definition() {
                let mixin = self.parse_mixin_definition(cursor)?;
                container.add_body_element(BodyElement::RuleSet(mixin));
                continue;
            }

            if cursor.lookahead_is_mixin_call() {
                return Err(LessError::parse(
                    "Mixin calls are only allowed inside rule sets",
                    start,
                ));
            }

            let rule_set = self.parse_rule_set(cursor)?;
            container.add_body_element(BodyElement::RuleSet(rule_set));
        }
    }

    /// 规则集与 @page 的主体，`allow_nested` 控制是否接受嵌套规则集。
    fn parse_block(
        &self,
        cursor: &mut Cursor<'_>,
        declarations: &mut Vec<DeclarationElement>,
        container: &mut BodyElementContainer,
        allow_nested: bool,
    ) -> LessResult<()> {
        loop {
            cursor.skip_whitespace_and_comments();
            let start = cursor.location();
            match cursor.peek_char() {
                Some('}') => {
                    cursor.advance_char();
                    return Ok(());
                }
                None => return Err(LessError::parse("Missing closing '}'", start)),
                _ => {}
            }

            if cursor.starts_with('@') {
                if cursor.lookahead_is_variable_decl() {
                    let (name, value) = self.parse_variable(cursor)?;
                    container.set_variable(name, value);
                    continue;
                }
                return Err(nested_at_rule(cursor, start));
            }

            if cursor.lookahead_is_mixin_definition() {
                if !allow_nested {
                    return Err(LessError::parse("Mixin definitions are not allowed here", start));
                }
                let mixin = self.parse_mixin_definition(cursor)?;
                container.add_body_element(BodyElement::RuleSet(mixin));
                continue;
            }

            if cursor.lookahead_is_mixin_call() {
                let reference = self.parse_mixin_call(cursor)?;
                declarations.push(DeclarationElement::MixinReference(reference));
                continue;
            }

            match cursor.detect_body_kind() {
                Some(BodyKind::Declaration) => {
                    let declaration = self.parse_declaration(cursor)?;
                    declarations.push(DeclarationElement::Declaration(declaration));
                }
                Some(BodyKind::NestedRule) if allow_nested => {
                    let nested = self.parse_rule_set(cursor)?;
                    container.add_body_element(BodyElement::RuleSet(nested));
                }
                Some(BodyKind::NestedRule) => {
                    return Err(LessError::parse("Nested rule sets are not allowed here", start));
                }
                None => {
                    return Err(LessError::parse(
                        "Expected a declaration or a nested rule set",
                        start,
                    ))
                }
            }
        }
    }

    fn parse_declaration(&self, cursor: &mut Cursor<'_>) -> LessResult<Declaration> {
        let start = cursor.location();
        let property = cursor.read_property_name();
        if property.is_empty() {
            return Err(LessError::parse("Expected a property name", start));
        }
        cursor.skip_whitespace_and_comments();
        cursor.expect_char(':')?;
        let value = parse_value(cursor, &[';', '}'])?;
        cursor.consume_if(';');

        Ok(Declaration {
            property,
            values: value.items,
            important: value.important,
            position: Some(start),
        })
    }

    fn parse_mixin_definition(&self, cursor: &mut Cursor<'_>) -> LessResult<RuleSet> {
        let start = cursor.location();
        let name = cursor.read_mixin_name()?;
        cursor.skip_whitespace_and_comments();
        let params = self.parse_mixin_params(cursor)?;
        cursor.skip_whitespace_and_comments();
        // 守卫条件不参与求值，直接跳过
        if cursor.starts_with_keyword("when") {
            cursor.match_str("when");
            cursor.skip_guard_condition();
        }
        cursor.expect_char('{')?;

        let mut rule_set = RuleSet::new(vec![Selector::new(name)]);
        rule_set.params = Some(params);
        rule_set.position = Some(start);
        self.parse_block(
            cursor,
            &mut rule_set.declarations,
            &mut rule_set.container,
            true,
        )?;
        Ok(rule_set)
    }

    fn parse_mixin_params(&self, cursor: &mut Cursor<'_>) -> LessResult<Arguments> {
        let mut params = Arguments::new();
        cursor.expect_char('(')?;
        loop {
            cursor.skip_whitespace_and_comments();
            if cursor.consume_if(')') {
                break;
            }
            let start = cursor.location();
            cursor.expect_char('@')?;
            let name = cursor.read_identifier();
            if name.is_empty() {
                return Err(LessError::parse("Expected a mixin parameter name", start));
            }
            cursor.skip_whitespace_and_comments();
            let default = if cursor.consume_if(':') {
                let value = parse_value(cursor, &[',', ';', ')'])?;
                Some(single_or_list(value.items, start))
            } else {
                None
            };
            params.insert(name, default);
            cursor.skip_whitespace_and_comments();
            match cursor.advance_char() {
                Some(',') | Some(';') => {}
                Some(')') => break,
                _ => {
                    return Err(LessError::parse(
                        "Expected ',' or ')' in mixin parameters",
                        cursor.location(),
                    ))
                }
            }
        }
        Ok(params)
    }

    fn parse_mixin_call(&self, cursor: &mut Cursor<'_>) -> LessResult<MixinReference> {
        let start = cursor.location();
        let name = cursor.read_mixin_name()?;
        cursor.skip_whitespace_and_comments();
        let mut arguments = Vec::new();
        if cursor.consume_if('(') {
            loop {
                cursor.skip_whitespace_and_comments();
                if cursor.consume_if(')') {
                    break;
                }
                let at = cursor.location();
                let value = parse_value(cursor, &[',', ';', ')'])?;
                arguments.push(single_or_list(value.items, at));
                match cursor.advance_char() {
                    Some(',') | Some(';') => {}
                    Some(')') => break,
                    _ => {
                        return Err(LessError::parse(
                            "Expected ',' or ')' in mixin arguments",
                            cursor.location(),
                        ))
                    }
                }
            }
        }
        cursor.skip_whitespace_and_comments();
        cursor.consume_if(';');

        Ok(MixinReference {
            selector: Selector::new(name),
            arguments,
            position: Some(start),
        })
    }
}

fn nested_at_rule(cursor: &Cursor<'_>, start: Position) -> LessError {
    LessError::parse(
        format!("Nested at-rule '@{}' is not supported", cursor.peek_at_keyword()),
        start,
    )
}

/// 导入的样式表按出现位置并入当前样式表。
fn merge_stylesheet(sheet: &mut StyleSheet, imported: StyleSheet) {
    if sheet.charset.is_none() {
        sheet.charset = imported.charset;
    }
    sheet.imports.extend(imported.imports);
    for (name, value) in imported.container.variables() {
        sheet.container.set_variable(name.clone(), value.clone());
    }
    for element in imported.container.body_elements() {
        sheet.container.add_body_element(element.clone());
    }
}

fn extract_import_path(input: &str) -> Option<String> {
    let trimmed = input.trim();
    let first = trimmed.chars().next()?;
    if first == '"' || first == '\'' {
        let end = trimmed[1..].find(first)?;
        return Some(trimmed[1..1 + end].to_string());
    }
    if trimmed.starts_with("url(") {
        return None;
    }
    trimmed
        .split_whitespace()
        .next()
        .map(|token| token.trim_end_matches(';').to_string())
        .filter(|token| !token.is_empty())
}

/// 按顶层分隔符切分，括号与引号内的分隔符保持原样。
fn split_top_level(input: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for ch in input.chars() {
        match (quote, ch) {
            (Some(open), _) if ch == open => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => depth = depth.saturating_sub(1),
            (None, _) if ch == separator && depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    parts.push(current);
    parts
}

fn single_or_list(mut items: Vec<Expression>, position: Position) -> Expression {
    match items.len() {
        0 => Expression::literal("").with_position(Some(position)),
        1 => items.remove(0),
        _ => Expression::list(items).with_position(Some(position)),
    }
}

struct ParsedValue {
    items: Vec<Expression>,
    important: bool,
}

/// 读取到顶层终止符为止的值；终止符本身不消费。
fn parse_value(cursor: &mut Cursor<'_>, terminators: &[char]) -> LessResult<ParsedValue> {
    let lexed = lex_value(cursor, terminators)?;
    let mut stream = TokenStream {
        tokens: lexed.tokens,
        index: 0,
        depth: 0,
        end: lexed.end,
    };
    let items = stream.parse_list(&[])?;
    Ok(ParsedValue {
        items,
        important: lexed.important,
    })
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(String),
    Color(String),
    Variable(String),
    Str(String),
    Escaped(String),
    Ident(String),
    /// 函数名，左括号已经消费。
    Function(String),
    /// `url()`、`calc()` 等按原文保留的调用。
    Raw(String),
    Accessor {
        selector: String,
        property: String,
        is_variable: bool,
    },
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Other(String),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    position: Position,
    space_before: bool,
}

struct LexedValue {
    tokens: Vec<Token>,
    important: bool,
    end: Position,
}

fn lex_value(cursor: &mut Cursor<'_>, terminators: &[char]) -> LessResult<LexedValue> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut important = false;

    loop {
        let before = cursor.offset();
        cursor.skip_whitespace_and_comments();
        let space_before = cursor.offset() != before;
        let position = cursor.location();

        let Some(ch) = cursor.peek_char() else {
            if depth > 0 {
                return Err(LessError::parse("Missing closing ')'", position));
            }
            break;
        };
        if depth == 0 && terminators.contains(&ch) {
            break;
        }
        if ch == '{' || ch == '}' {
            return Err(LessError::parse(format!("Unexpected '{ch}' in value"), position));
        }
        if ch == '!' {
            cursor.advance_char();
            cursor.skip_whitespace();
            if cursor.starts_with_keyword("important") {
                cursor.match_str("important");
                important = true;
            } else {
                tokens.push(Token {
                    kind: TokenKind::Other("!".into()),
                    position,
                    space_before,
                });
            }
            continue;
        }

        let kind = cursor.lex_token()?;
        match kind {
            TokenKind::LParen | TokenKind::Function(_) => depth += 1,
            TokenKind::RParen if depth == 0 => {
                return Err(LessError::parse("Unexpected ')'", position));
            }
            TokenKind::RParen => depth -= 1,
            _ => {}
        }
        tokens.push(Token {
            kind,
            position,
            space_before,
        });
    }

    Ok(LexedValue {
        tokens,
        important,
        end: cursor.location(),
    })
}

/// 值的递归下降解析：列表 → 加减 → 乘除 → 一元负号 → 基本项。
struct TokenStream {
    tokens: Vec<Token>,
    index: usize,
    depth: usize,
    end: Position,
}

impl TokenStream {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned()?;
        self.index += 1;
        Some(token)
    }

    /// 当前记号之后是否有空白；值的末尾视为有。
    fn space_after(&self) -> bool {
        self.tokens
            .get(self.index + 1)
            .map_or(true, |token| token.space_before)
    }

    fn next_is_spaced(&self) -> bool {
        self.peek().is_some_and(|token| token.space_before)
    }

    fn parse_list(&mut self, stops: &[TokenKind]) -> LessResult<Vec<Expression>> {
        let mut items = Vec::new();
        let mut separated = true;
        while let Some(token) = self.peek() {
            if stops.contains(&token.kind) {
                break;
            }
            let space_before = token.space_before;
            let separator = match token.kind {
                TokenKind::Comma => Some(","),
                TokenKind::Slash => Some("/"),
                _ => None,
            };
            if let Some(symbol) = separator {
                if symbol == "/" && space_before && !separated {
                    items.push(Expression::literal(" "));
                }
                self.advance();
                items.push(Expression::literal(symbol));
                if self.next_is_spaced() {
                    items.push(Expression::literal(" "));
                }
                separated = true;
                continue;
            }
            if space_before && !separated {
                items.push(Expression::literal(" "));
            }
            items.push(self.parse_additive()?);
            separated = false;
        }
        Ok(items)
    }

    fn parse_additive(&mut self) -> LessResult<Expression> {
        let mut left = self.parse_multiplicative()?;
        while let Some(token) = self.peek() {
            let op = match token.kind {
                TokenKind::Plus => Operator::Add,
                // `a -b` 是两个列表项，`a - b` 与 `a-b` 才是减法
                TokenKind::Minus if token.space_before == self.space_after() => Operator::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expression::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> LessResult<Expression> {
        let mut left = self.parse_unary()?;
        while let Some(token) = self.peek() {
            let op = match token.kind {
                TokenKind::Star => Operator::Multiply,
                // 括号外不带两侧空白的 `/` 是简写分隔符，例如 `12px/1.5`
                TokenKind::Slash
                    if self.depth > 0 || (token.space_before && self.space_after()) =>
                {
                    Operator::Divide
                }
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expression::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> LessResult<Expression> {
        if !matches!(self.peek().map(|token| &token.kind), Some(TokenKind::Minus)) {
            return self.parse_primary();
        }
        let Some(minus) = self.advance() else {
            return Err(LessError::parse("Unexpected end of value", self.end));
        };
        if let Some(Token {
            kind: TokenKind::Number(text),
            space_before: false,
            ..
        }) = self.peek()
        {
            let text = format!("-{text}");
            self.advance();
            return number_expression(&text, minus.position);
        }
        let operand = self.parse_unary()?;
        Ok(Expression::negate(operand).with_position(Some(minus.position)))
    }

    fn parse_primary(&mut self) -> LessResult<Expression> {
        let Some(token) = self.advance() else {
            return Err(LessError::parse("Unexpected end of value", self.end));
        };
        let position = Some(token.position);
        let expression = match token.kind {
            TokenKind::Number(text) => return number_expression(&text, token.position),
            TokenKind::Color(text) => match ConstantColor::parse(&text) {
                Some(color) => Expression::constant(color),
                None => Expression::literal(text),
            },
            TokenKind::Variable(name) => Expression::variable(name),
            TokenKind::Str(text)
            | TokenKind::Escaped(text)
            | TokenKind::Ident(text)
            | TokenKind::Raw(text)
            | TokenKind::Other(text) => Expression::literal(text),
            TokenKind::Accessor {
                selector,
                property,
                is_variable,
            } => Expression::accessor(Selector::new(selector), property, is_variable),
            TokenKind::Function(name) => {
                self.depth += 1;
                let args = self.parse_arguments()?;
                self.depth -= 1;
                Expression::function(name, args)
            }
            TokenKind::LParen => {
                self.depth += 1;
                let mut items = self.parse_list(&[TokenKind::RParen])?;
                self.expect_close()?;
                self.depth -= 1;
                if items.len() == 1 {
                    return Ok(items.remove(0));
                }
                let mut wrapped = Vec::with_capacity(items.len() + 2);
                wrapped.push(Expression::literal("("));
                wrapped.extend(items);
                wrapped.push(Expression::literal(")"));
                Expression::list(wrapped)
            }
            TokenKind::RParen => Expression::literal(")"),
            TokenKind::Comma => Expression::literal(","),
            TokenKind::Plus => Expression::literal("+"),
            TokenKind::Minus => Expression::literal("-"),
            TokenKind::Star => Expression::literal("*"),
            TokenKind::Slash => Expression::literal("/"),
        };
        Ok(expression.with_position(position))
    }

    /// 逗号分隔的函数参数，单项参数直接保留，多项参数组成列表。
    fn parse_arguments(&mut self) -> LessResult<Vec<Expression>> {
        let mut args = Vec::new();
        loop {
            let Some(token) = self.peek() else {
                return Err(LessError::parse("Missing closing ')'", self.end));
            };
            let start = token.position;
            let closes = matches!(token.kind, TokenKind::RParen);
            if closes || matches!(token.kind, TokenKind::Comma) {
                self.advance();
                if closes {
                    return Ok(args);
                }
                continue;
            }
            let items = self.parse_list(&[TokenKind::Comma, TokenKind::RParen])?;
            args.push(single_or_list(items, start));
        }
    }

    fn expect_close(&mut self) -> LessResult<()> {
        match self.advance() {
            Some(Token {
                kind: TokenKind::RParen,
                ..
            }) => Ok(()),
            Some(token) => Err(LessError::parse("Expected ')'", token.position)),
            None => Err(LessError::parse("Missing closing ')'", self.end)),
        }
    }
}

fn number_expression(text: &str, position: Position) -> LessResult<Expression> {
    ConstantNumber::parse(text)
        .map(|number| Expression::constant(number).with_position(Some(position)))
        .ok_or_else(|| LessError::parse(format!("Invalid number '{text}'"), position))
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '-' || ch == '_'
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

/// 按原文保留、不对参数求值的函数。
fn is_raw_call(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    matches!(lower.as_str(), "url" | "var" | "expression") || lower.ends_with("calc")
}

/// 带行列号的输入游标，提供字符读取、向前查看与值的词法切分。
#[derive(Clone)]
struct Cursor<'a> {
    source: &'a str,
    offset: usize,
    line: usize,
    column: usize,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            offset: 0,
            line: 1,
            column: 0,
        }
    }

    fn location(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn offset(&self) -> usize {
        self.offset
    }

    fn is_eof(&self) -> bool {
        self.offset >= self.source.len()
    }

    fn rest(&self) -> &'a str {
        &self.source[self.offset..]
    }

    fn starts_with(&self, ch: char) -> bool {
        self.peek_char() == Some(ch)
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn consume_if(&mut self, expect: char) -> bool {
        if self.starts_with(expect) {
            self.advance_char();
            true
        } else {
            false
        }
    }

    fn expect_char(&mut self, expect: char) -> LessResult<()> {
        let position = self.location();
        match self.advance_char() {
            Some(ch) if ch == expect => Ok(()),
            Some(ch) => Err(LessError::parse(
                format!("Expected '{expect}' but found '{ch}'"),
                position,
            )),
            None => Err(LessError::parse(format!("Expected '{expect}'"), position)),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.advance_char();
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            self.skip_whitespace();
            if !self.consume_comment() {
                break;
            }
        }
    }

    fn consume_comment(&mut self) -> bool {
        if self.match_str("//") {
            while let Some(ch) = self.advance_char() {
                if ch == '\n' {
                    break;
                }
            }
            true
        } else if self.match_str("/*") {
            while !self.is_eof() && !self.match_str("*/") {
                self.advance_char();
            }
            true
        } else {
            false
        }
    }

    fn match_str(&mut self, prefix: &str) -> bool {
        if !self.rest().starts_with(prefix) {
            return false;
        }
        for _ in prefix.chars() {
            self.advance_char();
        }
        true
    }

    fn starts_with_keyword(&self, keyword: &str) -> bool {
        let rest = self.rest();
        rest.starts_with(keyword)
            && !rest[keyword.len()..]
                .chars()
                .next()
                .is_some_and(is_ident_char)
    }

    fn skip_guard_condition(&mut self) {
        let mut depth = 0usize;
        while let Some(ch) = self.peek_char() {
            match ch {
                '{' if depth == 0 => break,
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.advance_char();
        }
    }

    /// `-` 只有后面仍是标识符字符时才算作标识符的一部分，`@a-@b` 因此是减法。
    fn read_identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(ch) = self.peek_char() {
            let accept = match ch {
                '-' => self.peek_next().is_some_and(is_ident_char),
                _ => ch.is_alphanumeric() || ch == '_',
            };
            if !accept {
                break;
            }
            ident.push(ch);
            self.advance_char();
        }
        ident
    }

    fn read_property_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(ch) = self.peek_char() {
            if matches!(ch, ':' | ';' | '{' | '}') {
                break;
            }
            name.push(ch);
            self.advance_char();
        }
        name.trim().to_string()
    }

    fn read_until(&mut self, end: char) -> LessResult<String> {
        let mut result = String::new();
        while let Some(ch) = self.peek_char() {
            if ch == end {
                return Ok(result);
            }
            result.push(ch);
            self.advance_char();
        }
        Err(LessError::parse(format!("Expected '{end}'"), self.location()))
    }

    /// 读取到顶层 `{` 之前的文本；中途遇到 `;` 或 `}` 视为语法错误。
    fn read_block_prelude(&mut self) -> LessResult<String> {
        let mut result = String::new();
        let mut depth = 0usize;
        while let Some(ch) = self.peek_char() {
            match ch {
                '{' if depth == 0 => return Ok(result.trim().to_string()),
                ';' | '}' if depth == 0 => break,
                '(' | '[' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                '"' | '\'' => {
                    result.push_str(&self.read_quoted()?);
                    continue;
                }
                _ => {}
            }
            result.push(ch);
            self.advance_char();
        }
        Err(LessError::parse("Expected '{'", self.location()))
    }

    /// 读取带引号的字符串，返回值包含引号本身。
    fn read_quoted(&mut self) -> LessResult<String> {
        let start = self.location();
        let Some(quote) = self.advance_char() else {
            return Err(LessError::parse("Expected a string", start));
        };
        let mut text = String::from(quote);
        while let Some(ch) = self.advance_char() {
            text.push(ch);
            if ch == '\\' {
                if let Some(escaped) = self.advance_char() {
                    text.push(escaped);
                }
                continue;
            }
            if ch == quote {
                return Ok(text);
            }
        }
        Err(LessError::parse("Unterminated string", start))
    }

    fn peek_at_keyword(&self) -> String {
        self.clone().consume_at_keyword()
    }

    fn consume_at_keyword(&mut self) -> String {
        self.consume_if('@');
        self.read_identifier()
    }

    fn lookahead_is_variable_decl(&self) -> bool {
        let mut lookahead = self.clone();
        if !lookahead.consume_if('@') || lookahead.read_identifier().is_empty() {
            return false;
        }
        lookahead.skip_whitespace_and_comments();
        if !lookahead.consume_if(':') {
            return false;
        }
        // `@page :first {` 之类的块级 at-rule 会在 `;` 之前遇到 `{`。
        lookahead.read_block_prelude().is_err()
    }

    fn lookahead_is_block_at_rule(&self) -> bool {
        let mut lookahead = self.clone();
        if lookahead.consume_at_keyword().is_empty() {
            return false;
        }
        lookahead.read_block_prelude().is_ok()
    }

    /// 跳过已经消费了左括号的括号组，返回是否正常闭合。
    fn skip_balanced(&mut self) -> bool {
        let mut depth = 1usize;
        while let Some(ch) = self.advance_char() {
            match ch {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }

    fn lookahead_is_mixin_definition(&self) -> bool {
        let mut lookahead = self.clone();
        if lookahead.read_mixin_name().is_err() {
            return false;
        }
        lookahead.skip_whitespace_and_comments();
        if !lookahead.consume_if('(') || !lookahead.skip_balanced() {
            return false;
        }
        lookahead.skip_whitespace_and_comments();
        if lookahead.starts_with_keyword("when") {
            lookahead.match_str("when");
            lookahead.skip_guard_condition();
        }
        lookahead.starts_with('{')
    }

    fn lookahead_is_mixin_call(&self) -> bool {
        let mut lookahead = self.clone();
        if lookahead.read_mixin_name().is_err() {
            return false;
        }
        lookahead.skip_whitespace_and_comments();
        if lookahead.consume_if('(') {
            if !lookahead.skip_balanced() {
                return false;
            }
            lookahead.skip_whitespace_and_comments();
        }
        matches!(lookahead.peek_char(), Some(';') | Some('}'))
    }

    fn read_mixin_name(&mut self) -> LessResult<String> {
        let start = self.location();
        let prefix = match self.peek_char() {
            Some(ch @ ('.' | '#')) => ch,
            _ => return Err(LessError::parse("Expected a mixin name", start)),
        };
        self.advance_char();
        let ident = self.read_identifier();
        if ident.is_empty() {
            return Err(LessError::parse("Invalid mixin name", start));
        }
        Ok(format!("{prefix}{ident}"))
    }

    /// 向前查看判断接下来是声明还是嵌套规则集。
    fn detect_body_kind(&self) -> Option<BodyKind> {
        let mut iter = self.clone();
        let mut saw_colon = false;
        while let Some(ch) = iter.peek_char() {
            match ch {
                '{' => return Some(BodyKind::NestedRule),
                ';' => return Some(BodyKind::Declaration),
                '}' => break,
                ':' => saw_colon = true,
                '"' | '\'' => {
                    if iter.read_quoted().is_err() {
                        break;
                    }
                    continue;
                }
                _ => {}
            }
            iter.advance_char();
        }
        saw_colon.then_some(BodyKind::Declaration)
    }

    fn lex_token(&mut self) -> LessResult<TokenKind> {
        let position = self.location();
        let Some(ch) = self.peek_char() else {
            return Err(LessError::parse("Unexpected end of input", position));
        };
        let next = self.peek_next();
        let kind = match ch {
            '0'..='9' => self.read_number(),
            '.' if next.is_some_and(|c| c.is_ascii_digit()) => self.read_number(),
            '.' if next.is_some_and(is_ident_start) => {
                self.advance_char();
                let selector = format!(".{}", self.read_identifier());
                if self.starts_with('[') {
                    self.read_accessor(selector)?
                } else {
                    TokenKind::Ident(selector)
                }
            }
            '#' => {
                self.advance_char();
                let mut word = String::new();
                while let Some(c) = self.peek_char().filter(|c| is_ident_char(*c)) {
                    word.push(c);
                    self.advance_char();
                }
                if self.starts_with('[') {
                    self.read_accessor(format!("#{word}"))?
                } else if matches!(word.len(), 3 | 6 | 8)
                    && word.chars().all(|c| c.is_ascii_hexdigit())
                {
                    TokenKind::Color(format!("#{word}"))
                } else {
                    TokenKind::Ident(format!("#{word}"))
                }
            }
            '@' => {
                self.advance_char();
                let name = self.read_identifier();
                if name.is_empty() {
                    return Err(LessError::parse("Expected a variable name", position));
                }
                TokenKind::Variable(name)
            }
            '"' | '\'' => TokenKind::Str(self.read_quoted()?),
            '~' if matches!(next, Some('"') | Some('\'')) => {
                self.advance_char();
                let quoted = self.read_quoted()?;
                TokenKind::Escaped(quoted[1..quoted.len() - 1].to_string())
            }
            '%' if next == Some('(') => {
                self.advance_char();
                self.advance_char();
                TokenKind::Function("%".into())
            }
            '(' => {
                self.advance_char();
                TokenKind::LParen
            }
            ')' => {
                self.advance_char();
                TokenKind::RParen
            }
            ',' => {
                self.advance_char();
                TokenKind::Comma
            }
            '+' => {
                self.advance_char();
                TokenKind::Plus
            }
            '*' => {
                self.advance_char();
                TokenKind::Star
            }
            '/' => {
                self.advance_char();
                TokenKind::Slash
            }
            '-' if next.is_some_and(|c| is_ident_start(c) || c == '-') => self.read_word()?,
            '-' => {
                self.advance_char();
                TokenKind::Minus
            }
            c if is_ident_start(c) => self.read_word()?,
            _ => {
                self.advance_char();
                TokenKind::Other(ch.to_string())
            }
        };
        Ok(kind)
    }

    fn read_number(&mut self) -> TokenKind {
        let mut text = String::new();
        while let Some(ch) = self.peek_char() {
            let accept = ch.is_ascii_digit()
                || (ch == '.' && self.peek_next().is_some_and(|c| c.is_ascii_digit()));
            if !accept {
                break;
            }
            text.push(ch);
            self.advance_char();
        }
        self.read_exponent(&mut text);
        if self.consume_if('%') {
            text.push('%');
        } else {
            while let Some(ch) = self.peek_char().filter(char::is_ascii_alphabetic) {
                text.push(ch);
                self.advance_char();
            }
        }
        TokenKind::Number(text)
    }

    /// 科学计数法的指数部分。`e` 之后必须是数字（可带符号），否则 `e` 属于单位，如 `2em`。
    fn read_exponent(&mut self, text: &mut String) {
        let mut rest = self.rest().chars();
        if !matches!(rest.next(), Some('e' | 'E')) {
            return;
        }
        let prefix_len = match (rest.next(), rest.next()) {
            (Some(c), _) if c.is_ascii_digit() => 1,
            (Some('+' | '-'), Some(c)) if c.is_ascii_digit() => 2,
            _ => return,
        };
        for _ in 0..prefix_len {
            if let Some(ch) = self.advance_char() {
                text.push(ch);
            }
        }
        while let Some(ch) = self.peek_char().filter(char::is_ascii_digit) {
            text.push(ch);
            self.advance_char();
        }
    }

    /// 标识符，或紧跟左括号时的函数调用。
    fn read_word(&mut self) -> LessResult<TokenKind> {
        let start = self.location();
        let name = self.read_identifier();
        if !self.starts_with('(') {
            return Ok(TokenKind::Ident(name));
        }
        if !is_raw_call(&name) {
            self.advance_char();
            return Ok(TokenKind::Function(name));
        }
        let mut text = name;
        let mut depth = 0usize;
        while let Some(ch) = self.peek_char() {
            if ch == '"' || ch == '\'' {
                text.push_str(&self.read_quoted()?);
                continue;
            }
            text.push(ch);
            self.advance_char();
            match ch {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(TokenKind::Raw(text));
                    }
                }
                _ => {}
            }
        }
        Err(LessError::parse("Missing closing ')'", start))
    }

    fn read_accessor(&mut self, selector: String) -> LessResult<TokenKind> {
        let start = self.location();
        self.expect_char('[')?;
        self.skip_whitespace();
        let (property, is_variable) = match self.peek_char() {
            Some('@') => {
                self.advance_char();
                (self.read_identifier(), true)
            }
            Some('"' | '\'') => {
                let quoted = self.read_quoted()?;
                (quoted[1..quoted.len() - 1].to_string(), false)
            }
            _ => (self.read_identifier(), false),
        };
        self.skip_whitespace();
        self.expect_char(']')?;
        if property.is_empty() {
            return Err(LessError::parse("Expected a property name in accessor", start));
        }
        Ok(TokenKind::Accessor {
            selector,
            property,
            is_variable,
        })
    }
}

enum BodyKind {
    Declaration,
    NestedRule,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::ExprKind;
    use crate::model::declarations_use_mixins;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> StyleSheet {
        LessParser::new().parse(source).unwrap()
    }

    fn first_rule_set(sheet: &StyleSheet) -> &RuleSet {
        sheet.container.child_rule_sets().next().unwrap()
    }

    fn declaration_values(source: &str) -> Vec<Expression> {
        let sheet = parse(&format!(".a {{ prop: {source}; }}"));
        let values = first_rule_set(&sheet)
            .plain_declarations()
            .next()
            .unwrap()
            .values
            .clone();
        values
    }

    #[test]
    fn parses_variables_rule_sets_and_positions() {
        let sheet = parse("@base: 10px;\n\n.box {\n  width: @base;\n}\n");
        assert_eq!(
            sheet.container.variable("base"),
            Some(&Expression::number(10.0, Some("px")).with_position(Some(Position::new(1, 7))))
        );
        let rule_set = first_rule_set(&sheet);
        assert_eq!(rule_set.position, Some(Position::new(3, 0)));
        let declaration = rule_set.plain_declarations().next().unwrap();
        assert_eq!(declaration.property, "width");
        assert_eq!(declaration.position, Some(Position::new(4, 2)));
        assert_eq!(
            declaration.values[0].position,
            Some(Position::new(4, 9))
        );
    }

    #[test]
    fn minus_depends_on_spacing() {
        let binary = declaration_values("10px-5px");
        assert_eq!(binary.len(), 1);
        assert!(matches!(binary[0].kind, ExprKind::Binary { op: Operator::Subtract, .. }));

        let spaced = declaration_values("10px - 5px");
        assert_eq!(spaced.len(), 1);

        let list = declaration_values("0 -5px");
        let rendered: String = list.iter().map(|item| item.to_string()).collect();
        assert_eq!(rendered, "0 -5px");
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn slash_is_literal_outside_parentheses() {
        let shorthand = declaration_values("12px/1.5 Arial");
        let rendered: String = shorthand.iter().map(|item| item.to_string()).collect();
        assert_eq!(rendered, "12px/1.5 Arial");

        let division = declaration_values("(12px/2)");
        assert!(matches!(division[0].kind, ExprKind::Binary { op: Operator::Divide, .. }));
    }

    #[test]
    fn commas_and_functions() {
        let values = declaration_values("lighten(#336699, 20%), url(a.png) no-repeat");
        let rendered: String = values.iter().map(|item| item.to_string()).collect();
        assert_eq!(rendered, "lighten(#369, 20%), url(a.png) no-repeat");
        assert!(matches!(&values[0].kind, ExprKind::Function { name, args } if name == "lighten" && args.len() == 2));
    }

    #[test]
    fn important_flag_is_extracted() {
        let sheet = parse(".a { color: red !important; }");
        let declaration = first_rule_set(&sheet).plain_declarations().next().unwrap();
        assert!(declaration.important);
        assert_eq!(declaration.value_text(), "red");
    }

    #[test]
    fn accessors_and_escapes() {
        let values = declaration_values("#defaults[@width] .box['color'] ~\"raw\"");
        assert!(matches!(
            &values[0].kind,
            ExprKind::Accessor { selector, property, is_variable: true }
                if selector.as_str() == "#defaults" && property == "width"
        ));
        assert!(matches!(
            &values[2].kind,
            ExprKind::Accessor { is_variable: false, .. }
        ));
        assert_eq!(values[4], Expression::literal("raw").with_position(values[4].position));
    }

    #[test]
    fn mixin_definitions_and_calls() {
        let sheet = parse(".m(@a: 1; @b) when (@a > 0) { width: @a; }\n.x { .m(2, 3); .plain; }");
        let rules: Vec<&RuleSet> = sheet.container.child_rule_sets().collect();
        let params = rules[0].params.as_ref().unwrap();
        assert_eq!(params.keys().collect::<Vec<_>>(), ["a", "b"]);
        assert!(params["a"].is_some());
        assert!(params["b"].is_none());

        let calls: Vec<&MixinReference> = rules[1]
            .declarations
            .iter()
            .filter_map(|element| match element {
                DeclarationElement::MixinReference(reference) => Some(reference),
                DeclarationElement::Declaration(_) => None,
            })
            .collect();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].selector.as_str(), ".m");
        assert_eq!(calls[0].arguments.len(), 2);
        assert_eq!(calls[1].selector.as_str(), ".plain");
        assert!(declarations_use_mixins(&rules[1].declarations));
        assert!(!declarations_use_mixins(&rules[0].declarations));
    }

    #[test]
    fn nested_rules_with_pseudo_selectors() {
        let sheet = parse(".a { color: red; &:hover, .b { color: blue; } }");
        let rule_set = first_rule_set(&sheet);
        assert_eq!(rule_set.plain_declarations().count(), 1);
        let nested: Vec<&RuleSet> = rule_set.container.child_rule_sets().collect();
        assert_eq!(nested[0].selector_text(", "), "&:hover, .b");
    }

    #[test]
    fn at_rules_build_dedicated_nodes() {
        let sheet = parse(
            "@charset \"UTF-8\";\n@import url(reset.css);\n@media screen, print { .a { top: 0; } }\n@page :first { margin: 1in; }\n@-webkit-keyframes spin { from { left: 0; } }\n@font-face { font-family: x; }",
        );
        assert_eq!(sheet.charset.as_deref(), Some("\"UTF-8\""));
        assert_eq!(sheet.imports, ["@import url(reset.css);"]);
        let elements = sheet.body_elements();
        assert!(matches!(&elements[0], BodyElement::Media(media) if media.mediums == ["screen", "print"]));
        assert!(matches!(&elements[1], BodyElement::Page(page) if page.pseudo.as_deref() == Some(":first")));
        assert!(matches!(
            &elements[2],
            BodyElement::Keyframes(keyframes) if keyframes.keyword == "-webkit-keyframes" && keyframes.name == "spin"
        ));
        assert!(matches!(&elements[3], BodyElement::RuleSet(rule_set) if rule_set.selector_text(",") == "@font-face"));
    }

    #[test]
    fn page_pseudo_is_not_a_variable() {
        let sheet = parse("@page :first { margin: 1in; }\n@gap : 2px;\n@media print { @page :left { margin: @gap; } }");
        assert!(sheet.container.variable("page").is_none());
        assert!(sheet.container.variable("gap").is_some());
        let elements = sheet.body_elements();
        assert!(matches!(&elements[0], BodyElement::Page(page) if page.pseudo.as_deref() == Some(":first")));
        let BodyElement::Media(media) = &elements[1] else {
            panic!("expected @media, got {:?}", elements[1]);
        };
        assert!(matches!(
            &media.container.body_elements()[0],
            BodyElement::Page(page) if page.pseudo.as_deref() == Some(":left")
        ));
    }

    #[test]
    fn numbers_with_exponents() {
        let values = declaration_values("1e3 2em 1.5e2px 2.5e-1px 3E+1");
        let rendered: String = values.iter().map(|item| item.to_string()).collect();
        assert_eq!(rendered, "1000 2em 150px .25px 30");
        assert_eq!(values.len(), 9);
        assert_eq!(
            values[6],
            Expression::number(0.25, Some("px")).with_position(values[6].position)
        );
    }

    #[test]
    fn less_imports_pass_through_without_resolver() {
        let sheet = parse("@import \"mixins\";");
        assert_eq!(sheet.imports, ["@import \"mixins\";"]);
    }

    #[test]
    fn comments_are_skipped() {
        let sheet = parse("// line\n/* block */ .a { /* inside */ color: red; // tail\n }");
        let rule_set = first_rule_set(&sheet);
        assert_eq!(rule_set.plain_declarations().next().unwrap().value_text(), "red");
    }

    #[test]
    fn errors_carry_positions() {
        let err = LessParser::new().parse(".a {\n  color: red;\n").unwrap_err();
        assert_eq!(err.to_string(), "[3:0] - Missing closing '}'");

        let err = LessParser::new()
            .parse(".a {\n  @media print { .b { top: 0; } }\n}")
            .unwrap_err();
        assert_eq!(err.position(), Some(Position::new(2, 2)));
        assert!(err.to_string().contains("Nested at-rule '@media'"));

        let err = LessParser::new().parse(".m(1);").unwrap_err();
        assert!(matches!(err.kind(), LessError::Parse { .. }));
    }
}
