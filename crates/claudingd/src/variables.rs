//! Prompt template variables.
//!
//! Substitution runs in three passes, each feeding the next: static
//! placeholders, `{test-run-last}`, then `{file:<path>}` injection. Lookup
//! failures become bracketed markers in the text; resolution itself never
//! fails.

use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use tracing::debug;

pub const MAX_INJECTED_FILE_BYTES: u64 = 100 * 1024;
pub const NO_TEST_RUN_MARKER: &str = "[Error: no test-run files found]";

const TEST_RUN_PREFIX: &str = "test-run-";
const TEST_RUN_SUFFIX: &str = ".txt";

static FILE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{file:([^{}]+)\}").expect("file placeholder pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableContext {
    pub feature_name: String,
    pub worktree: PathBuf,
    pub project_root: PathBuf,
    pub working_directory: PathBuf,
    /// Searched for `test-run-*.txt`.
    pub outputs_dir: PathBuf,
}

/// Memoizing resolver. Create one per run, or call [`clear_cache`] when the
/// files behind it may have changed.
///
/// [`clear_cache`]: VariableResolver::clear_cache
#[derive(Debug, Default)]
pub struct VariableResolver {
    file_cache: HashMap<PathBuf, String>,
    pattern_cache: HashMap<PathBuf, Option<PathBuf>>,
}

impl VariableResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_cache(&mut self) {
        self.file_cache.clear();
        self.pattern_cache.clear();
    }

    pub fn resolve(&mut self, template: &str, context: &VariableContext) -> String {
        let text = resolve_static(template, context);
        let text = self.resolve_patterns(&text, context);
        self.resolve_files(&text, context)
    }

    /// Newest `test-run-*.txt` in the outputs directory.
    pub fn latest_test_run(&mut self, context: &VariableContext) -> Option<PathBuf> {
        self.pattern_cache
            .entry(context.outputs_dir.clone())
            .or_insert_with(|| {
                latest_matching(&context.outputs_dir, TEST_RUN_PREFIX, TEST_RUN_SUFFIX)
            })
            .clone()
    }

    fn resolve_patterns(&mut self, text: &str, context: &VariableContext) -> String {
        if !text.contains("{test-run-last}") {
            return text.to_string();
        }
        let replacement = match self.latest_test_run(context) {
            Some(path) => path.display().to_string(),
            None => NO_TEST_RUN_MARKER.to_string(),
        };
        text.replace("{test-run-last}", &replacement)
    }

    fn resolve_files(&mut self, text: &str, context: &VariableContext) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in FILE_PLACEHOLDER.captures_iter(text) {
            let (Some(whole), Some(raw_path)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&text[last..whole.start()]);
            out.push_str(&self.file_content(raw_path.as_str().trim(), context));
            last = whole.end();
        }
        out.push_str(&text[last..]);
        out
    }

    fn file_content(&mut self, raw_path: &str, context: &VariableContext) -> String {
        let path = Path::new(raw_path);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            context.worktree.join(path)
        };

        if let Some(cached) = self.file_cache.get(&path) {
            return cached.clone();
        }
        match read_capped(&path) {
            Ok(content) => {
                self.file_cache.insert(path, content.clone());
                content
            }
            Err(marker) => {
                debug!(path = %path.display(), "file placeholder not injected: {marker}");
                marker
            }
        }
    }
}

fn resolve_static(template: &str, context: &VariableContext) -> String {
    template
        .replace("{feature-name}", &context.feature_name)
        .replace(
            "{working-directory}",
            &context.working_directory.display().to_string(),
        )
        .replace("{worktree}", &context.worktree.display().to_string())
        .replace("{root}", &context.project_root.display().to_string())
}

fn read_capped(path: &Path) -> Result<String, String> {
    let meta = fs::metadata(path)
        .map_err(|err| format!("[Error: could not read {}: {err}]", path.display()))?;
    if meta.len() > MAX_INJECTED_FILE_BYTES {
        return Err(format!(
            "[Error: {} is {} bytes, over the {} byte limit]",
            path.display(),
            meta.len(),
            MAX_INJECTED_FILE_BYTES
        ));
    }
    let bytes =
        fs::read(path).map_err(|err| format!("[Error: could not read {}: {err}]", path.display()))?;
    // The file may have grown between metadata and read.
    if bytes.len() as u64 > MAX_INJECTED_FILE_BYTES {
        return Err(format!(
            "[Error: {} is over the {} byte limit]",
            path.display(),
            MAX_INJECTED_FILE_BYTES
        ));
    }
    String::from_utf8(bytes).map_err(|_| format!("[Error: {} is not valid UTF-8]", path.display()))
}

/// Most recently modified file in `dir` named `{prefix}*{suffix}`.
pub fn latest_matching(dir: &Path, prefix: &str, suffix: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    entries
        .flatten()
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with(prefix) && name.ends_with(suffix)
        })
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            Some((modified, entry.path()))
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, path)| path)
}
