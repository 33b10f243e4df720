use crate::model::{BodyElement, Declaration, Keyframes, Media, Page, RuleSet, StyleSheet};
use crate::utils::{collapse_whitespace, indent};

/// 负责将变换完成的样式表转换为最终 CSS 文本。
///
/// mixin 定义与没有声明的规则集不会输出；规则集的嵌套子元素已经被展平，同样跳过。
pub struct Serializer {
    minify: bool,
}

impl Serializer {
    pub fn new(minify: bool) -> Self {
        Self { minify }
    }

    pub fn to_css(&self, stylesheet: &StyleSheet) -> String {
        if self.minify {
            self.render_minified(stylesheet)
        } else {
            self.render_pretty(stylesheet)
        }
    }

    fn header_lines(stylesheet: &StyleSheet) -> Vec<String> {
        stylesheet
            .charset
            .iter()
            .map(|charset| format!("@charset {charset};"))
            .chain(stylesheet.imports.iter().map(|import| import.trim().to_string()))
            .collect()
    }

    fn render_pretty(&self, stylesheet: &StyleSheet) -> String {
        let mut output = String::new();
        let header = Self::header_lines(stylesheet);
        for line in &header {
            output.push_str(line);
            output.push('\n');
        }
        let blocks: Vec<String> = stylesheet
            .body_elements()
            .iter()
            .filter_map(|element| self.render_element_pretty(element, 0))
            .collect();
        if !header.is_empty() && !blocks.is_empty() {
            output.push('\n');
        }
        output.push_str(&blocks.join("\n"));
        output.trim().to_string()
    }

    fn render_minified(&self, stylesheet: &StyleSheet) -> String {
        let mut output = String::new();
        for line in Self::header_lines(stylesheet) {
            output.push_str(&line);
            output.push('\n');
        }
        for element in stylesheet.body_elements() {
            if let Some(rendered) = self.render_element_minified(element) {
                output.push_str(&rendered);
            }
        }
        while output.ends_with('\n') {
            output.pop();
        }
        output
    }

    fn format_declaration(&self, decl: &Declaration) -> String {
        let mut result = format!("{}: {}", decl.property.trim(), decl.value_text().trim());
        if decl.important {
            result.push_str(" !important");
        }
        result.push(';');
        result
    }

    fn format_declaration_minified(&self, decl: &Declaration) -> String {
        let mut result = format!(
            "{}:{}",
            decl.property.trim(),
            collapse_whitespace(&decl.value_text())
        );
        if decl.important {
            result.push_str("!important");
        }
        result
    }

    fn render_element_pretty(&self, element: &BodyElement, level: usize) -> Option<String> {
        match element {
            BodyElement::RuleSet(rule_set) => self.render_rule_pretty(rule_set, level),
            BodyElement::Media(media) => self.render_media_pretty(media, level),
            BodyElement::Page(page) => self.render_page_pretty(page, level),
            BodyElement::Keyframes(keyframes) => self.render_keyframes_pretty(keyframes, level),
        }
    }

    fn render_declarations_pretty<'d>(
        &self,
        prelude: &str,
        declarations: impl Iterator<Item = &'d Declaration>,
        level: usize,
    ) -> Option<String> {
        let mut body = String::new();
        for decl in declarations {
            body.push_str(&indent(level + 1));
            body.push_str(&self.format_declaration(decl));
            body.push('\n');
        }
        if body.is_empty() {
            return None;
        }
        Some(format!(
            "{pad}{prelude} {{\n{body}{pad}}}\n",
            pad = indent(level)
        ))
    }

    fn render_rule_pretty(&self, rule: &RuleSet, level: usize) -> Option<String> {
        if rule.is_mixin() {
            return None;
        }
        self.render_declarations_pretty(
            &rule.selector_text(", "),
            rule.plain_declarations(),
            level,
        )
    }

    fn render_page_pretty(&self, page: &Page, level: usize) -> Option<String> {
        let prelude = match &page.pseudo {
            Some(pseudo) => format!("@page {pseudo}"),
            None => "@page".to_string(),
        };
        self.render_declarations_pretty(&prelude, page.plain_declarations(), level)
    }

    fn render_group_pretty<'e>(
        &self,
        prelude: &str,
        children: impl Iterator<Item = &'e BodyElement>,
        level: usize,
    ) -> Option<String> {
        let body: String = children
            .filter_map(|child| self.render_element_pretty(child, level + 1))
            .collect();
        if body.is_empty() {
            return None;
        }
        Some(format!(
            "{pad}{prelude} {{\n{body}{pad}}}\n",
            pad = indent(level)
        ))
    }

    fn render_media_pretty(&self, media: &Media, level: usize) -> Option<String> {
        let prelude = format!("@media {}", media.mediums.join(", "));
        self.render_group_pretty(&prelude, media.container.body_elements().iter(), level)
    }

    fn render_keyframes_pretty(&self, keyframes: &Keyframes, level: usize) -> Option<String> {
        let prelude = format!("@{} {}", keyframes.keyword, keyframes.name);
        self.render_group_pretty(&prelude, keyframes.container.body_elements().iter(), level)
    }

    fn render_element_minified(&self, element: &BodyElement) -> Option<String> {
        match element {
            BodyElement::RuleSet(rule_set) if rule_set.is_mixin() => None,
            BodyElement::RuleSet(rule_set) => {
                self.render_declarations_minified(&rule_set.selector_text(","), rule_set.plain_declarations())
            }
            BodyElement::Media(media) => self.render_group_minified(
                &format!("@media {}", media.mediums.join(",")),
                media.container.body_elements().iter(),
            ),
            BodyElement::Page(page) => {
                let prelude = match &page.pseudo {
                    Some(pseudo) => format!("@page {pseudo}"),
                    None => "@page".to_string(),
                };
                self.render_declarations_minified(&prelude, page.plain_declarations())
            }
            BodyElement::Keyframes(keyframes) => self.render_group_minified(
                &format!("@{} {}", keyframes.keyword, keyframes.name),
                keyframes.container.body_elements().iter(),
            ),
        }
    }

    fn render_declarations_minified<'d>(
        &self,
        prelude: &str,
        declarations: impl Iterator<Item = &'d Declaration>,
    ) -> Option<String> {
        let body = declarations
            .map(|decl| self.format_declaration_minified(decl))
            .collect::<Vec<_>>();
        if body.is_empty() {
            return None;
        }
        Some(format!("{prelude}{{{}}}", body.join(";")))
    }

    fn render_group_minified<'e>(
        &self,
        prelude: &str,
        children: impl Iterator<Item = &'e BodyElement>,
    ) -> Option<String> {
        let body: String = children
            .filter_map(|child| self.render_element_minified(child))
            .collect();
        if body.is_empty() {
            return None;
        }
        Some(format!("{prelude}{{{body}}}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expression;
    use crate::model::{Arguments, BodyElementContainer, DeclarationElement, Selector};
    use pretty_assertions::assert_eq;

    fn rule(selectors: &[&str], declarations: &[(&str, &str)]) -> RuleSet {
        let mut rule_set = RuleSet::new(selectors.iter().map(Selector::new).collect());
        for (property, value) in declarations {
            rule_set
                .declarations
                .push(DeclarationElement::Declaration(Declaration::new(
                    *property,
                    vec![Expression::literal(*value)],
                )));
        }
        rule_set
    }

    fn sheet(elements: Vec<BodyElement>) -> StyleSheet {
        let mut sheet = StyleSheet::new();
        for element in elements {
            sheet.container.add_body_element(element);
        }
        sheet
    }

    #[test]
    fn pretty_output_separates_rules_with_blank_lines() {
        let mut important = rule(&[".b"], &[("color", "red")]);
        if let DeclarationElement::Declaration(decl) = &mut important.declarations[0] {
            decl.important = true;
        }
        let stylesheet = sheet(vec![
            BodyElement::RuleSet(rule(&[".a", ".c"], &[("margin", "0 auto"), ("top", "1px")])),
            BodyElement::RuleSet(important),
        ]);
        assert_eq!(
            Serializer::new(false).to_css(&stylesheet),
            ".a, .c {\n  margin: 0 auto;\n  top: 1px;\n}\n\n.b {\n  color: red !important;\n}"
        );
        assert_eq!(
            Serializer::new(true).to_css(&stylesheet),
            ".a,.c{margin:0 auto;top:1px}.b{color:red!important}"
        );
    }

    #[test]
    fn mixins_and_empty_rules_are_not_written() {
        let mut mixin = rule(&[".m"], &[("width", "1px")]);
        mixin.params = Some(Arguments::new());
        let stylesheet = sheet(vec![
            BodyElement::RuleSet(mixin),
            BodyElement::RuleSet(rule(&[".empty"], &[])),
            BodyElement::RuleSet(rule(&[".x"], &[("width", "1px")])),
        ]);
        assert_eq!(
            Serializer::new(false).to_css(&stylesheet),
            ".x {\n  width: 1px;\n}"
        );
    }

    #[test]
    fn at_rules_wrap_their_bodies() {
        let mut media_body = BodyElementContainer::new();
        media_body.add_body_element(BodyElement::RuleSet(rule(&[".a"], &[("top", "0")])));
        let media = Media {
            mediums: vec!["screen".into(), "print".into()],
            container: media_body,
            position: None,
        };
        let mut page = Page {
            pseudo: Some(":first".into()),
            ..Page::default()
        };
        page.declarations
            .push(DeclarationElement::Declaration(Declaration::new(
                "margin",
                vec![Expression::literal("1in")],
            )));
        let mut frames = BodyElementContainer::new();
        frames.add_body_element(BodyElement::RuleSet(rule(&["from"], &[("left", "0")])));
        let keyframes = Keyframes {
            keyword: "keyframes".into(),
            name: "spin".into(),
            container: frames,
            position: None,
        };
        let mut stylesheet = sheet(vec![
            BodyElement::Media(media),
            BodyElement::Page(page),
            BodyElement::Keyframes(keyframes),
            BodyElement::Media(Media::default()),
        ]);
        stylesheet.charset = Some("\"UTF-8\"".into());
        stylesheet.imports.push("@import url(reset.css);".into());

        assert_eq!(
            Serializer::new(false).to_css(&stylesheet),
            "@charset \"UTF-8\";\n@import url(reset.css);\n\n@media screen, print {\n  .a {\n    top: 0;\n  }\n}\n\n@page :first {\n  margin: 1in;\n}\n\n@keyframes spin {\n  from {\n    left: 0;\n  }\n}"
        );
        assert_eq!(
            Serializer::new(true).to_css(&stylesheet),
            "@charset \"UTF-8\";\n@import url(reset.css);\n@media screen,print{.a{top:0}}@page :first{margin:1in}@keyframes spin{from{left:0}}"
        );
    }
}
