use crate::expression::Expression;
use crate::functions::FunctionRegistry;
use crate::model::{BodyElementContainer, RuleSet, Selector};
use indexmap::IndexMap;

/// 变量查找端。
pub trait VariableContainer {
    fn variable(&self, name: &str) -> Option<&Expression>;
}

/// 规则集查找端，用于 mixin 与访问器。
pub trait RuleSetContainer {
    fn rule_sets(&self, selector: &Selector) -> Vec<&RuleSet>;
}

impl VariableContainer for BodyElementContainer {
    fn variable(&self, name: &str) -> Option<&Expression> {
        BodyElementContainer::variable(self, name)
    }
}

impl RuleSetContainer for BodyElementContainer {
    fn rule_sets(&self, selector: &Selector) -> Vec<&RuleSet> {
        BodyElementContainer::rule_sets(self, selector)
    }
}

impl VariableContainer for IndexMap<String, Expression> {
    fn variable(&self, name: &str) -> Option<&Expression> {
        self.get(name)
    }
}

/// 正在求值的变量链，用来发现循环引用。
#[derive(Debug, Clone, Copy)]
pub struct ResolvingFrame<'a> {
    name: &'a str,
    parent: Option<&'a ResolvingFrame<'a>>,
}

impl<'a> ResolvingFrame<'a> {
    fn contains(&self, name: &str) -> bool {
        self.name == name || self.parent.is_some_and(|parent| parent.contains(name))
    }
}

/// 不可变的作用域链节点：本地未命中时委托给父节点。
///
/// 只借用已经构造完成的容器，按值复制开销很小。
#[derive(Clone, Copy)]
pub struct EvaluationContext<'a> {
    variables: Option<&'a dyn VariableContainer>,
    rule_sets: Option<&'a dyn RuleSetContainer>,
    parent: Option<&'a EvaluationContext<'a>>,
    functions: &'a FunctionRegistry,
    resolving: Option<&'a ResolvingFrame<'a>>,
}

impl<'a> EvaluationContext<'a> {
    pub fn root(functions: &'a FunctionRegistry) -> Self {
        Self {
            variables: None,
            rule_sets: None,
            parent: None,
            functions,
            resolving: None,
        }
    }

    pub fn new(
        variables: &'a dyn VariableContainer,
        rule_sets: &'a dyn RuleSetContainer,
        functions: &'a FunctionRegistry,
    ) -> Self {
        Self {
            variables: Some(variables),
            rule_sets: Some(rule_sets),
            parent: None,
            functions,
            resolving: None,
        }
    }

    /// 以 `self` 为父节点、`container` 为本地作用域的子上下文。
    pub fn child<'b>(&'b self, container: &'b BodyElementContainer) -> EvaluationContext<'b>
    where
        'a: 'b,
    {
        EvaluationContext {
            variables: Some(container),
            rule_sets: Some(container),
            parent: Some(self),
            functions: self.functions,
            resolving: self.resolving,
        }
    }

    pub fn functions(&self) -> &'a FunctionRegistry {
        self.functions
    }

    pub fn variable(&self, name: &str) -> Option<&'a Expression> {
        self.variables
            .and_then(|variables| variables.variable(name))
            .or_else(|| self.parent.and_then(|parent| parent.variable(name)))
    }

    /// 返回由内向外第一个非空的匹配结果，内层作用域完全遮蔽外层。
    pub fn rule_sets(&self, selector: &Selector) -> Vec<&'a RuleSet> {
        let local = self
            .rule_sets
            .map(|container| container.rule_sets(selector))
            .unwrap_or_default();
        if !local.is_empty() {
            return local;
        }
        self.parent
            .map(|parent| parent.rule_sets(selector))
            .unwrap_or_default()
    }

    pub fn is_resolving(&self, name: &str) -> bool {
        self.resolving.is_some_and(|frame| frame.contains(name))
    }

    pub fn resolving_frame<'b>(&self, name: &'b str) -> ResolvingFrame<'b>
    where
        'a: 'b,
    {
        ResolvingFrame {
            name,
            parent: self.resolving,
        }
    }

    /// 把 `frame` 压入正在求值的变量链。
    pub fn with_resolving<'b>(&self, frame: &'b ResolvingFrame<'b>) -> EvaluationContext<'b>
    where
        'a: 'b,
    {
        EvaluationContext {
            variables: self.variables,
            rule_sets: self.rule_sets,
            parent: self.parent,
            functions: self.functions,
            resolving: Some(frame),
        }
    }
}
