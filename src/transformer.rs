use crate::context::EvaluationContext;
use crate::error::{LessError, Position};
use crate::functions::FunctionRegistry;
use crate::model::{
    declarations_use_mixins, BodyElement, BodyElementContainer, Declaration, DeclarationElement,
    Keyframes, Media, MixinReference, Page, RuleSet, Selector, StyleSheet,
};
use std::mem;

/// 第二阶段缓冲区中的声明：来自源码的尚待求值，来自 mixin 展开的已经求值。
enum PendingDeclaration<'s> {
    Source(&'s Declaration),
    Resolved(Declaration),
}

/// 把解析得到的模型树变换为完全求值的样式表。
///
/// 输入从不被修改，每个容器都生成新的节点；错误按工作单元收集，
/// 出错的变量或声明保留原始表达式，其余部分继续处理。
pub struct Transformer<'f> {
    functions: &'f FunctionRegistry,
    diagnostics: Vec<LessError>,
    mixin_stack: Vec<Selector>,
}

impl<'f> Transformer<'f> {
    pub fn new(functions: &'f FunctionRegistry) -> Self {
        Self {
            functions,
            diagnostics: Vec::new(),
            mixin_stack: Vec::new(),
        }
    }

    pub fn diagnostics(&self) -> &[LessError] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<LessError> {
        mem::take(&mut self.diagnostics)
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub fn transform_stylesheet(&mut self, source: &StyleSheet) -> StyleSheet {
        let root = EvaluationContext::root(self.functions);
        let mut dest = StyleSheet {
            charset: source.charset.clone(),
            imports: source.imports.clone(),
            container: BodyElementContainer::new(),
        };
        self.resolve_variables(&source.container, &mut dest.container, &root);
        // 以源样式表为父作用域，后面才定义的 mixin 同样可见
        let source_scope = root.child(&source.container);
        self.transform_body(&source.container, &mut dest.container, &source_scope);
        tracing::debug!(
            elements = dest.container.body_elements().len(),
            errors = self.diagnostics.len(),
            "stylesheet transformed"
        );
        dest
    }

    /// 按元素种类分派，返回替换该元素的零个或多个元素。
    pub fn transform_body_element(
        &mut self,
        element: &BodyElement,
        context: &EvaluationContext<'_>,
    ) -> Vec<BodyElement> {
        match element {
            BodyElement::RuleSet(rule_set) => self
                .transform_rule_set(rule_set, context)
                .into_iter()
                .map(BodyElement::RuleSet)
                .collect(),
            BodyElement::Media(media) => vec![BodyElement::Media(self.transform_media(media, context))],
            BodyElement::Page(page) => vec![BodyElement::Page(self.transform_page(page, context))],
            BodyElement::Keyframes(keyframes) => {
                vec![BodyElement::Keyframes(
                    self.transform_keyframes(keyframes, context),
                )]
            }
        }
    }

    /// 规则集本身在前，随后是展平后的后代规则集。
    pub fn transform_rule_set(
        &mut self,
        source: &RuleSet,
        context: &EvaluationContext<'_>,
    ) -> Vec<RuleSet> {
        if source.is_mixin() {
            return vec![source.clone()];
        }
        let dest = self.expand_rule_set(source, context);
        let nested = self.flatten_nested(&dest, context);
        let mut output = Vec::with_capacity(nested.len() + 1);
        output.push(dest);
        output.extend(nested);
        output
    }

    pub fn transform_media(&mut self, source: &Media, context: &EvaluationContext<'_>) -> Media {
        let mut dest = Media {
            mediums: source.mediums.clone(),
            container: BodyElementContainer::new(),
            position: source.position,
        };
        self.resolve_variables(&source.container, &mut dest.container, context);
        self.transform_body(&source.container, &mut dest.container, context);
        dest
    }

    pub fn transform_page(&mut self, source: &Page, context: &EvaluationContext<'_>) -> Page {
        let mut dest = Page {
            pseudo: source.pseudo.clone(),
            declarations: Vec::new(),
            container: BodyElementContainer::new(),
            position: source.position,
        };
        self.resolve_variables(&source.container, &mut dest.container, context);
        self.resolve_declarations(
            &source.declarations,
            &source.container,
            &mut dest.declarations,
            &mut dest.container,
            context,
        );
        dest
    }

    pub fn transform_keyframes(
        &mut self,
        source: &Keyframes,
        context: &EvaluationContext<'_>,
    ) -> Keyframes {
        let mut dest = Keyframes {
            keyword: source.keyword.clone(),
            name: source.name.clone(),
            container: BodyElementContainer::new(),
            position: source.position,
        };
        self.resolve_variables(&source.container, &mut dest.container, context);
        self.transform_body(&source.container, &mut dest.container, context);
        dest
    }

    /// 变量与声明求值，不展平子规则集；子规则集原样留在结果的 body 中。
    fn expand_rule_set(&mut self, source: &RuleSet, context: &EvaluationContext<'_>) -> RuleSet {
        let mut dest = RuleSet {
            selectors: source.selectors.clone(),
            params: None,
            declarations: Vec::new(),
            container: BodyElementContainer::new(),
            position: source.position,
        };
        self.resolve_variables(&source.container, &mut dest.container, context);
        for element in source.container.body_elements() {
            dest.container.add_body_element(element.clone());
        }
        self.resolve_declarations(
            &source.declarations,
            &source.container,
            &mut dest.declarations,
            &mut dest.container,
            context,
        );
        dest
    }

    fn resolve_variables(
        &mut self,
        source: &BodyElementContainer,
        dest: &mut BodyElementContainer,
        context: &EvaluationContext<'_>,
    ) {
        let scope = context.child(source);
        for (name, value) in source.variables() {
            match value.evaluate(&scope) {
                Ok(evaluated) => dest.set_variable(name.clone(), evaluated),
                Err(err) => {
                    self.report(err, value.position);
                    dest.set_variable(name.clone(), value.clone());
                }
            }
        }
    }

    /// 样式表、@media、@keyframes 的单趟变换：每个元素都在目标容器之上求值，
    /// 因此能看到已经求值的变量和此前变换好的规则集。
    fn transform_body(
        &mut self,
        source: &BodyElementContainer,
        dest: &mut BodyElementContainer,
        parent: &EvaluationContext<'_>,
    ) {
        for element in source.body_elements() {
            let produced = {
                let scope = parent.child(dest);
                self.transform_body_element(element, &scope)
            };
            for element in produced {
                dest.add_body_element(element);
            }
        }
    }

    fn resolve_declarations(
        &mut self,
        source: &[DeclarationElement],
        source_container: &BodyElementContainer,
        declarations: &mut Vec<DeclarationElement>,
        container: &mut BodyElementContainer,
        context: &EvaluationContext<'_>,
    ) {
        if !declarations_use_mixins(source) {
            let scope = context.child(source_container);
            for element in source {
                if let DeclarationElement::Declaration(declaration) = element {
                    let evaluated = self.evaluate_declaration(declaration, &scope);
                    declarations.push(DeclarationElement::Declaration(evaluated));
                }
            }
            return;
        }

        let mut buffer = Vec::with_capacity(source.len());
        for element in source {
            match element {
                DeclarationElement::Declaration(declaration) => {
                    buffer.push(PendingDeclaration::Source(declaration));
                }
                DeclarationElement::MixinReference(reference) => {
                    let Some(expanded) =
                        self.expand_mixin(reference, source_container, container, context)
                    else {
                        continue;
                    };
                    for (name, value) in expanded.container.variables() {
                        container.set_variable(name.clone(), value.clone());
                    }
                    buffer.extend(
                        expanded
                            .plain_declarations()
                            .cloned()
                            .map(PendingDeclaration::Resolved),
                    );
                    for nested in expanded.container.child_rule_sets() {
                        container.add_body_element(BodyElement::RuleSet(nested.clone()));
                    }
                }
            }
        }

        let scope = context.child(container);
        for pending in buffer {
            let declaration = match pending {
                PendingDeclaration::Source(declaration) => {
                    self.evaluate_declaration(declaration, &scope)
                }
                PendingDeclaration::Resolved(declaration) => declaration,
            };
            declarations.push(DeclarationElement::Declaration(declaration));
        }
    }

    /// 查找、绑定并展开一次 mixin 调用，返回已经求值的副本。
    fn expand_mixin(
        &mut self,
        reference: &MixinReference,
        source_container: &BodyElementContainer,
        container: &BodyElementContainer,
        context: &EvaluationContext<'_>,
    ) -> Option<RuleSet> {
        if self.mixin_stack.contains(&reference.selector) {
            self.report(
                LessError::RecursiveMixinReference(reference.selector.to_string()),
                reference.position,
            );
            return None;
        }

        let count = reference.arguments.len();
        let mixin = {
            let lookup = context.child(source_container);
            let candidates = lookup.rule_sets(&reference.selector);
            candidates
                .iter()
                .find(|candidate| candidate.accepts(count))
                .or_else(|| candidates.first())
                .map(|found| (*found).clone())
        };
        let Some(mut mixin) = mixin else {
            self.report(
                LessError::UndefinedMixinReference(reference.selector.to_string()),
                reference.position,
            );
            return None;
        };

        let expected = mixin.params.as_ref().map_or(0, |params| params.len());
        if count > expected {
            self.report(
                LessError::MixinArgumentMismatch {
                    expected,
                    actual: count,
                },
                reference.position,
            );
            return None;
        }

        let caller = context.child(container);
        let mut arguments = Vec::with_capacity(count);
        for argument in &reference.arguments {
            match argument.evaluate(&caller) {
                Ok(value) => arguments.push(value),
                Err(err) => {
                    self.report(err, reference.position);
                    return None;
                }
            }
        }

        if let Some(params) = mixin.params.take() {
            let mut supplied = arguments.into_iter();
            for (name, default) in params {
                if let Some(value) = supplied.next().or(default) {
                    mixin.container.set_variable(name, value);
                }
            }
        }

        tracing::trace!(mixin = %reference.selector, arguments = count, "expanding mixin");
        self.mixin_stack.push(reference.selector.clone());
        let expanded = self.expand_rule_set(&mixin, &caller);
        self.mixin_stack.pop();
        Some(expanded)
    }

    /// 变换目标规则集的直接子规则集，并把选择器换成父子组合。
    fn flatten_nested(&mut self, dest: &RuleSet, context: &EvaluationContext<'_>) -> Vec<RuleSet> {
        let scope = context.child(&dest.container);
        let mut output = Vec::new();
        for child in dest.container.child_rule_sets() {
            if child.is_mixin() {
                continue;
            }
            for mut produced in self.transform_rule_set(child, &scope) {
                produced.selectors = combine_selectors(&dest.selectors, &produced.selectors);
                output.push(produced);
            }
        }
        output
    }

    fn evaluate_declaration(
        &mut self,
        source: &Declaration,
        context: &EvaluationContext<'_>,
    ) -> Declaration {
        let mut values = Vec::with_capacity(source.values.len());
        for value in &source.values {
            match value.evaluate(context) {
                Ok(evaluated) => values.push(evaluated),
                Err(err) => {
                    self.report(err, source.position);
                    values.push(value.clone());
                }
            }
        }
        Declaration {
            property: source.property.clone(),
            values,
            important: source.important,
            position: source.position,
        }
    }

    fn report(&mut self, err: LessError, fallback: Option<Position>) {
        let err = err.at(fallback);
        tracing::warn!(error = %err, "transform error");
        self.diagnostics.push(err);
    }
}

fn combine_selectors(parents: &[Selector], children: &[Selector]) -> Vec<Selector> {
    parents
        .iter()
        .flat_map(|parent| children.iter().map(move |child| parent.combine(child)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LessParser;
    use pretty_assertions::assert_eq;

    fn transform(source: &str) -> (StyleSheet, Vec<LessError>) {
        let functions = FunctionRegistry::new();
        let sheet = LessParser::new().parse(source).unwrap();
        let mut transformer = Transformer::new(&functions);
        let output = transformer.transform_stylesheet(&sheet);
        (output, transformer.take_diagnostics())
    }

    fn rule_sets(sheet: &StyleSheet) -> Vec<&RuleSet> {
        sheet.container.child_rule_sets().collect()
    }

    fn declarations(rule_set: &RuleSet) -> Vec<(String, String)> {
        rule_set
            .plain_declarations()
            .map(|decl| (decl.property.clone(), decl.value_text()))
            .collect()
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn mixin_binds_arguments_and_defaults() {
        let (sheet, errors) = transform(
            ".m(@a: 1, @b: 2) { width: @a; height: @b; }\n.x { .m(5); }",
        );
        assert!(errors.is_empty(), "{errors:?}");
        let rules = rule_sets(&sheet);
        assert!(rules[0].is_mixin());
        assert_eq!(rules[1].selector_text(", "), ".x");
        assert_eq!(
            declarations(rules[1]),
            pairs(&[("width", "5"), ("height", "2")])
        );
    }

    #[test]
    fn nested_rule_sets_are_flattened() {
        let (sheet, errors) = transform(".a { .b { color: red; } }");
        assert!(errors.is_empty());
        let rules = rule_sets(&sheet);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].selector_text(", "), ".a .b");
        assert_eq!(declarations(rules[1]), pairs(&[("color", "red")]));
    }

    #[test]
    fn selector_lists_form_a_cartesian_product() {
        let (sheet, _) = transform(".a, .b { &:hover, .c { top: 0; } }");
        let rules = rule_sets(&sheet);
        assert_eq!(
            rules[1].selector_text(", "),
            ".a:hover, .a .c, .b:hover, .b .c"
        );
    }

    #[test]
    fn too_many_mixin_arguments_are_rejected() {
        let (_, errors) = transform(".m(@a) { width: @a; }\n.x { .m(1, 2, 3); }");
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].kind(),
            &LessError::MixinArgumentMismatch {
                expected: 1,
                actual: 3
            }
        );
    }

    #[test]
    fn undefined_variables_are_reported_per_occurrence() {
        let (sheet, errors) = transform(
            ".a { width: @missing; }\n.b { height: @missing; color: blue; }",
        );
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|err| err.kind() == &LessError::UndefinedVariable("missing".into())));
        assert_eq!(errors[0].position().map(|pos| pos.line), Some(1));
        assert_eq!(errors[1].position().map(|pos| pos.line), Some(2));
        let rules = rule_sets(&sheet);
        assert_eq!(declarations(rules[1])[1], ("color".to_string(), "blue".to_string()));
    }

    #[test]
    fn mixins_can_be_referenced_before_definition() {
        let (sheet, errors) = transform(".x { .later; }\n.later { margin: 1px; }");
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(declarations(rule_sets(&sheet)[0]), pairs(&[("margin", "1px")]));
    }

    #[test]
    fn mixins_calling_mixins_expand_recursively() {
        let (sheet, errors) = transform(
            ".inner(@c) { color: @c; }\n.outer(@c: red) { .inner(@c); border: 1px; }\n.x { .outer(blue); }",
        );
        assert!(errors.is_empty(), "{errors:?}");
        let x = rule_sets(&sheet)[2];
        assert_eq!(declarations(x), pairs(&[("color", "blue"), ("border", "1px")]));
    }

    #[test]
    fn mixin_nested_rules_are_promoted_under_the_caller() {
        let (sheet, errors) = transform(
            ".m() { a { text-decoration: none; } }\n.nav { .m(); }",
        );
        assert!(errors.is_empty(), "{errors:?}");
        let rules = rule_sets(&sheet);
        let selectors: Vec<String> = rules.iter().map(|rule| rule.selector_text(", ")).collect();
        assert_eq!(selectors, [".m", ".nav", ".nav a"]);
    }

    #[test]
    fn self_referencing_mixin_is_reported() {
        let (_, errors) = transform(".loop { .loop; color: red; }\n.x { .loop; }");
        assert!(errors
            .iter()
            .any(|err| matches!(err.kind(), LessError::RecursiveMixinReference(_))));
    }

    #[test]
    fn unknown_mixin_is_reported() {
        let (_, errors) = transform(".x { .nope; }");
        assert_eq!(
            errors[0].kind(),
            &LessError::UndefinedMixinReference(".nope".into())
        );
    }

    #[test]
    fn argument_named_like_parameter_resolves_in_caller() {
        let (sheet, errors) = transform(
            "@size: 3px;\n.m(@size) { width: @size; }\n.x { .m(@size); }",
        );
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(declarations(rule_sets(&sheet)[1]), pairs(&[("width", "3px")]));
    }

    #[test]
    fn media_and_keyframes_resolve_inner_values() {
        let (sheet, errors) = transform(
            "@w: 10px;\n@media screen { .a { width: @w * 2; } }\n@keyframes spin { from { left: @w; } }",
        );
        assert!(errors.is_empty(), "{errors:?}");
        let elements = sheet.body_elements();
        let BodyElement::Media(media) = &elements[0] else {
            panic!("expected media");
        };
        let inner: Vec<&RuleSet> = media.container.child_rule_sets().collect();
        assert_eq!(declarations(inner[0]), pairs(&[("width", "20px")]));
        let BodyElement::Keyframes(keyframes) = &elements[1] else {
            panic!("expected keyframes");
        };
        let frame: Vec<&RuleSet> = keyframes.container.child_rule_sets().collect();
        assert_eq!(declarations(frame[0]), pairs(&[("left", "10px")]));
    }

    #[test]
    fn inner_scope_shadows_outer_variables() {
        let (sheet, errors) = transform("@c: red;\n.a { @c: blue; color: @c; .b { color: @c; } }\n.z { color: @c; }");
        assert!(errors.is_empty());
        let rules = rule_sets(&sheet);
        assert_eq!(declarations(rules[0]), pairs(&[("color", "blue")]));
        assert_eq!(declarations(rules[1]), pairs(&[("color", "blue")]));
        assert_eq!(declarations(rules[2]), pairs(&[("color", "red")]));
    }
}
