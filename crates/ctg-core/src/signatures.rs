use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;

/// Given a file's contents and the paths of files it depends on (already
/// resolved by the upstream dependency graph), produces a compact textual
/// signature per dependency for inclusion in LLM prompts.
///
/// Depth is always 1: callers that need transitive context must pass in the
/// already-expanded dependency list. A missing or unparseable dependency
/// yields an empty signature rather than failing the whole resolution --
/// prompt context degrades gracefully.
pub struct DependencySignatureResolver;

impl DependencySignatureResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve signatures for `dependencies`, reading each file's contents
    /// via `read_file`. Returns one entry per dependency path, in input order.
    pub fn resolve(
        &self,
        dependencies: &[PathBuf],
        read_file: impl Fn(&Path) -> Option<String>,
    ) -> HashMap<PathBuf, String> {
        let mut signatures = HashMap::with_capacity(dependencies.len());
        for dep in dependencies {
            let signature = read_file(dep)
                .map(|content| extract_signature(&content))
                .unwrap_or_default();
            signatures.insert(dep.clone(), signature);
        }
        signatures
    }
}

impl Default for DependencySignatureResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts public declaration signatures from source text: function/method
/// headers and class/struct declarations, one per line, comments and bodies
/// stripped. Language-agnostic on purpose -- this is a best-effort context
/// hint for the LLM, not a real parser.
pub fn extract_signature(content: &str) -> String {
    let patterns: Vec<Regex> = vec![
        Regex::new(r"^\s*(pub\s+)?(async\s+)?fn\s+\w+\s*\([^)]*\)").unwrap(),
        Regex::new(r"^\s*(public|private|protected)\s+[\w<>\[\],\s]+\s+\w+\s*\([^)]*\)\s*\{?")
            .unwrap(),
        Regex::new(r"^\s*def\s+\w+\s*\([^)]*\)\s*:?").unwrap(),
        Regex::new(r"^\s*func\s+(\([^)]*\)\s*)?\w+\s*\([^)]*\)").unwrap(),
        Regex::new(r"^\s*(pub\s+)?(struct|class|enum|interface|trait)\s+\w+").unwrap(),
    ];

    content
        .lines()
        .filter(|line| patterns.iter().any(|p| p.is_match(line)))
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_rust_function_signatures() {
        let content = "fn private_helper() {}\npub fn compute_total(items: &[Item]) -> f64 {\n    0.0\n}\n";
        let sig = extract_signature(content);
        assert!(sig.contains("pub fn compute_total(items: &[Item]) -> f64 {"));
        assert!(sig.contains("fn private_helper() {}"));
    }

    #[test]
    fn extracts_python_def_signatures() {
        let content = "class Invoice:\n    def total(self, items):\n        return sum(items)\n";
        let sig = extract_signature(content);
        assert!(sig.contains("class Invoice:"));
        assert!(sig.contains("def total(self, items):"));
    }

    #[test]
    fn missing_dependency_yields_empty_signature() {
        let resolver = DependencySignatureResolver::new();
        let deps = vec![PathBuf::from("/repo/missing.py")];
        let signatures = resolver.resolve(&deps, |_| None);
        assert_eq!(signatures.get(Path::new("/repo/missing.py")).unwrap(), "");
    }
}
