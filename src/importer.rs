use crate::error::{LessError, Position};
use crate::model::StyleSheet;
use crate::parser::LessParser;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// `@import` 解析器：按当前目录与检索目录查找文件，缓存源码并检测循环导入。
///
/// 导入失败不会中断解析，错误以诊断的形式积累，由编译入口统一上报。
#[derive(Debug, Default)]
pub struct ImportResolver {
    include_paths: Vec<PathBuf>,
    cache: HashMap<PathBuf, String>,
    stack: Vec<PathBuf>,
    diagnostics: Vec<LessError>,
}

impl ImportResolver {
    pub fn new(include_paths: &[PathBuf]) -> Self {
        Self {
            include_paths: include_paths.to_vec(),
            ..Self::default()
        }
    }

    pub fn diagnostics(&self) -> &[LessError] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<LessError> {
        std::mem::take(&mut self.diagnostics)
    }

    /// 解析并返回被导入的样式表；失败时记录诊断并返回 `None`。
    pub fn import(
        &mut self,
        target: &str,
        current_dir: Option<&Path>,
        position: Position,
    ) -> Option<StyleSheet> {
        let candidates = self.candidates(target, current_dir);
        let Some(resolved) = candidates.iter().find_map(|candidate| find_existing(candidate))
        else {
            let tried = candidates
                .first()
                .map_or_else(|| PathBuf::from(target), PathBuf::clone);
            self.fail(
                target,
                format!("File '{}' does not exist", tried.display()),
                position,
            );
            return None;
        };

        if self.stack.contains(&resolved) {
            self.fail(
                target,
                format!("Cyclic import of '{}'", resolved.display()),
                position,
            );
            return None;
        }

        let content = match self.load(&resolved) {
            Ok(content) => content,
            Err(reason) => {
                self.fail(target, reason, position);
                return None;
            }
        };

        tracing::debug!(path = %resolved.display(), "importing stylesheet");
        self.stack.push(resolved.clone());
        let parent = resolved.parent().map(Path::to_path_buf);
        let parsed = LessParser::with_imports(self, parent.as_deref()).parse(&content);
        self.stack.pop();

        match parsed {
            Ok(sheet) => Some(sheet),
            Err(err) => {
                let err = attach_path(err, &resolved);
                tracing::warn!(error = %err, "failed to parse imported stylesheet");
                self.diagnostics.push(err);
                None
            }
        }
    }

    fn candidates(&self, target: &str, current_dir: Option<&Path>) -> Vec<PathBuf> {
        let raw = Path::new(target);
        if raw.is_absolute() {
            return vec![raw.to_path_buf()];
        }
        current_dir
            .into_iter()
            .chain(self.include_paths.iter().map(PathBuf::as_path))
            .map(|base| base.join(raw))
            .collect()
    }

    fn load(&mut self, path: &Path) -> Result<String, String> {
        if let Some(cached) = self.cache.get(path) {
            return Ok(cached.clone());
        }
        let content = fs::read_to_string(path)
            .map_err(|err| format!("Failed to read '{}': {err}", path.display()))?;
        self.cache.insert(path.to_path_buf(), content.clone());
        Ok(content)
    }

    fn fail(&mut self, target: &str, reason: String, position: Position) {
        let err = LessError::Import {
            target: target.to_string(),
            reason,
        }
        .at(Some(position));
        tracing::warn!(error = %err, "import failed");
        self.diagnostics.push(err);
    }
}

/// 没有扩展名时补上 `.less` 再试一次。
fn find_existing(candidate: &Path) -> Option<PathBuf> {
    let mut attempts = vec![candidate.to_path_buf()];
    if candidate.extension().is_none() {
        attempts.push(candidate.with_extension("less"));
    }
    attempts
        .into_iter()
        .find(|attempt| attempt.is_file())
        .map(|found| found.canonicalize().unwrap_or(found))
}

fn attach_path(err: LessError, path: &Path) -> LessError {
    if let LessError::Parse { message } = err.kind() {
        return LessError::Parse {
            message: format!("{message} (in {})", path.display()),
        }
        .at(err.position());
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "lesscss-engine-{name}-{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(dir: &Path, name: &str, content: &str) {
        let mut file = fs::File::create(dir.join(name)).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn missing_file_is_a_diagnostic() {
        let dir = scratch_dir("missing");
        let mut resolver = ImportResolver::new(&[]);
        let imported = resolver.import("bogus.less", Some(&dir), Position::new(1, 0));
        assert!(imported.is_none());
        let diagnostics = resolver.take_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].position(), Some(Position::new(1, 0)));
        assert!(diagnostics[0]
            .to_string()
            .starts_with("[1:0] - Import error: \"bogus.less\": File '"));
        assert!(diagnostics[0].to_string().ends_with("bogus.less' does not exist"));
    }

    #[test]
    fn resolves_extensionless_targets_and_nested_imports() {
        let dir = scratch_dir("nested");
        write(&dir, "colors.less", "@brand: #336699;");
        write(&dir, "theme.less", "@import \"colors\";\n.theme { color: @brand; }");
        let mut resolver = ImportResolver::new(&[]);
        let sheet = resolver
            .import("theme", Some(&dir), Position::new(1, 0))
            .unwrap();
        assert!(resolver.diagnostics().is_empty());
        assert!(sheet.container.variable("brand").is_some());
        assert_eq!(sheet.container.child_rule_sets().count(), 1);
    }

    #[test]
    fn include_paths_are_searched() {
        let dir = scratch_dir("include");
        write(&dir, "shared.less", ".shared { margin: 0; }");
        let mut resolver = ImportResolver::new(&[dir]);
        let sheet = resolver.import("shared.less", None, Position::new(2, 0));
        assert!(sheet.is_some());
    }

    #[test]
    fn cyclic_imports_are_reported() {
        let dir = scratch_dir("cycle");
        write(&dir, "a.less", "@import \"b.less\";");
        write(&dir, "b.less", "@import \"a.less\";");
        let mut resolver = ImportResolver::new(&[]);
        let sheet = resolver.import("a.less", Some(&dir), Position::new(1, 0));
        assert!(sheet.is_some());
        let diagnostics = resolver.take_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].to_string().contains("Cyclic import"));
    }

    #[test]
    fn parse_errors_name_the_imported_file() {
        let dir = scratch_dir("broken");
        write(&dir, "broken.less", ".a { color: red;");
        let mut resolver = ImportResolver::new(&[]);
        assert!(resolver
            .import("broken.less", Some(&dir), Position::new(1, 0))
            .is_none());
        let diagnostics = resolver.take_diagnostics();
        assert!(diagnostics[0].to_string().contains("broken.less"));
        assert!(matches!(diagnostics[0].kind(), LessError::Parse { .. }));
    }
}
