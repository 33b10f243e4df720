use crate::error::Position;
use crate::expression::Expression;
use crate::utils::collapse_whitespace;
use indexmap::IndexMap;
use std::fmt::{self, Display};

/// 选择器文本，空白已规范化，可作为规则集查找的键。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    value: String,
}

impl Selector {
    pub fn new<S: AsRef<str>>(value: S) -> Self {
        Self {
            value: collapse_whitespace(value.as_ref()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// 父子选择器合并：含 `&` 时替换为父选择器，否则以后代组合符连接。
    pub fn combine(&self, child: &Selector) -> Selector {
        if child.value.contains('&') {
            Selector::new(child.value.replace('&', &self.value))
        } else {
            Selector::new(format!("{} {}", self.value, child.value))
        }
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// 样式表、@media、@keyframes、@page 与规则集共用的容器：
/// 有序的子元素、变量表，以及选择器到规则集下标的派生索引。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodyElementContainer {
    variables: IndexMap<String, Expression>,
    body_elements: Vec<BodyElement>,
    rule_set_index: IndexMap<Selector, Vec<usize>>,
}

impl BodyElementContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variables(&self) -> &IndexMap<String, Expression> {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&Expression> {
        self.variables.get(name)
    }

    /// 同名变量后写覆盖先写。
    pub fn set_variable<S: Into<String>>(&mut self, name: S, value: Expression) {
        self.variables.insert(name.into(), value);
    }

    pub fn body_elements(&self) -> &[BodyElement] {
        &self.body_elements
    }

    pub fn add_body_element(&mut self, element: BodyElement) {
        if let BodyElement::RuleSet(rule_set) = &element {
            let index = self.body_elements.len();
            for selector in &rule_set.selectors {
                self.rule_set_index
                    .entry(selector.clone())
                    .or_default()
                    .push(index);
            }
        }
        self.body_elements.push(element);
    }

    pub fn rule_sets(&self, selector: &Selector) -> Vec<&RuleSet> {
        self.rule_set_index
            .get(selector)
            .map(|indices| {
                indices
                    .iter()
                    .filter_map(|idx| match self.body_elements.get(*idx) {
                        Some(BodyElement::RuleSet(rule_set)) => Some(rule_set),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn child_rule_sets(&self) -> impl Iterator<Item = &RuleSet> {
        self.body_elements.iter().filter_map(|element| match element {
            BodyElement::RuleSet(rule_set) => Some(rule_set),
            _ => None,
        })
    }
}

/// 样式表、@media、@keyframes 中可以出现的子元素。
#[derive(Debug, Clone, PartialEq)]
pub enum BodyElement {
    RuleSet(RuleSet),
    Media(Media),
    Page(Page),
    Keyframes(Keyframes),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleSheet {
    pub charset: Option<String>,
    /// 原样输出的 CSS `@import` 语句。
    pub imports: Vec<String>,
    pub container: BodyElementContainer,
}

impl StyleSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body_elements(&self) -> &[BodyElement] {
        self.container.body_elements()
    }
}

/// mixin 形参：有序的名称到默认值映射，插入顺序即参数位置。
pub type Arguments = IndexMap<String, Option<Expression>>;

/// 规则集；带 `params` 时同时是 mixin 定义。
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    pub selectors: Vec<Selector>,
    pub params: Option<Arguments>,
    pub declarations: Vec<DeclarationElement>,
    pub container: BodyElementContainer,
    pub position: Option<Position>,
}

impl RuleSet {
    pub fn new(selectors: Vec<Selector>) -> Self {
        Self {
            selectors,
            params: None,
            declarations: Vec::new(),
            container: BodyElementContainer::new(),
            position: None,
        }
    }

    pub fn is_mixin(&self) -> bool {
        self.params.is_some()
    }

    /// 可以接收 `count` 个实参的 mixin 或普通规则集。
    pub fn accepts(&self, count: usize) -> bool {
        match &self.params {
            Some(params) => count <= params.len(),
            None => count == 0,
        }
    }

    /// 同名属性取最后一个。
    pub fn declaration(&self, property: &str) -> Option<&Declaration> {
        self.declarations.iter().rev().find_map(|element| match element {
            DeclarationElement::Declaration(decl) if decl.property == property => Some(decl),
            _ => None,
        })
    }

    pub fn plain_declarations(&self) -> impl Iterator<Item = &Declaration> {
        plain_declarations(&self.declarations)
    }

    pub fn selector_text(&self, separator: &str) -> String {
        self.selectors
            .iter()
            .map(Selector::as_str)
            .collect::<Vec<_>>()
            .join(separator)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Media {
    pub mediums: Vec<String>,
    pub container: BodyElementContainer,
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub pseudo: Option<String>,
    pub declarations: Vec<DeclarationElement>,
    pub container: BodyElementContainer,
    pub position: Option<Position>,
}

impl Page {
    pub fn plain_declarations(&self) -> impl Iterator<Item = &Declaration> {
        plain_declarations(&self.declarations)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Keyframes {
    /// 保留厂商前缀，例如 `-webkit-keyframes`。
    pub keyword: String,
    pub name: String,
    pub container: BodyElementContainer,
    pub position: Option<Position>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclarationElement {
    Declaration(Declaration),
    MixinReference(MixinReference),
}

/// 属性声明；值由字面片段与表达式依次拼接而成。
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub values: Vec<Expression>,
    pub important: bool,
    pub position: Option<Position>,
}

impl Declaration {
    pub fn new<S: Into<String>>(property: S, values: Vec<Expression>) -> Self {
        Self {
            property: property.into(),
            values,
            important: false,
            position: None,
        }
    }

    pub fn value_text(&self) -> String {
        self.values.iter().map(|value| value.to_string()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MixinReference {
    pub selector: Selector,
    pub arguments: Vec<Expression>,
    pub position: Option<Position>,
}

pub(crate) fn declarations_use_mixins(elements: &[DeclarationElement]) -> bool {
    elements
        .iter()
        .any(|element| matches!(element, DeclarationElement::MixinReference(_)))
}

fn plain_declarations(elements: &[DeclarationElement]) -> impl Iterator<Item = &Declaration> {
    elements.iter().filter_map(|element| match element {
        DeclarationElement::Declaration(decl) => Some(decl),
        DeclarationElement::MixinReference(_) => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_combination() {
        let parent = Selector::new(".a");
        assert_eq!(parent.combine(&Selector::new(".b")).as_str(), ".a .b");
        assert_eq!(parent.combine(&Selector::new("&:hover")).as_str(), ".a:hover");
        assert_eq!(parent.combine(&Selector::new("& + &")).as_str(), ".a + .a");
        assert_eq!(Selector::new("  .x \n  > .y ").as_str(), ".x > .y");
    }

    #[test]
    fn container_indexes_rule_sets_by_selector() {
        let mut container = BodyElementContainer::new();
        container.add_body_element(BodyElement::RuleSet(RuleSet::new(vec![
            Selector::new(".a"),
            Selector::new(".b"),
        ])));
        container.add_body_element(BodyElement::Media(Media::default()));
        let mut overload = RuleSet::new(vec![Selector::new(".a")]);
        overload.params = Some(Arguments::new());
        container.add_body_element(BodyElement::RuleSet(overload));

        assert_eq!(container.rule_sets(&Selector::new(".a")).len(), 2);
        assert_eq!(container.rule_sets(&Selector::new(".b")).len(), 1);
        assert!(container.rule_sets(&Selector::new(".c")).is_empty());
        assert_eq!(container.child_rule_sets().count(), 2);
    }

    #[test]
    fn variables_last_write_wins() {
        let mut container = BodyElementContainer::new();
        container.set_variable("a", Expression::literal("1"));
        container.set_variable("a", Expression::literal("2"));
        assert_eq!(container.variables().len(), 1);
        assert_eq!(container.variable("a"), Some(&Expression::literal("2")));
    }

    #[test]
    fn rule_set_accepts_by_arity() {
        let mut mixin = RuleSet::new(vec![Selector::new(".m")]);
        let mut params = Arguments::new();
        params.insert("a".into(), None);
        params.insert("b".into(), Some(Expression::literal("2")));
        mixin.params = Some(params);
        assert!(mixin.accepts(0));
        assert!(mixin.accepts(2));
        assert!(!mixin.accepts(3));
        assert!(RuleSet::new(vec![Selector::new(".plain")]).accepts(0));
        assert!(!RuleSet::new(vec![Selector::new(".plain")]).accepts(1));
    }
}
