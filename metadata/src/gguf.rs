//! GGUF repo/file detection and base-repo inference (spec §4.4).
//!
//! The suffix-stripping regexes mirror the reference implementation's own
//! `infer_base_model_from_gguf_repo`, which strips a quantisation tail off
//! the repo name to recover the repo that holds the plain tokenizer/config
//! for the same model family.

use regex::Regex;
use std::sync::LazyLock;

static QUANT_SUFFIX_RES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)-?(qat-)?q\d+[_-]?[k0-9]*-?gguf$").unwrap(),
        Regex::new(r"(?i)-?gguf$").unwrap(),
        Regex::new(r"(?i)-?int\d+-?gguf$").unwrap(),
    ]
});

static QUANT_HINT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)q\d+(_\d+)?").unwrap());

/// A **GGUF repo**: contains a `/`, doesn't start with `/`, doesn't end
/// with `.gguf`, and its name contains "gguf" case-insensitively.
pub fn is_gguf_repo(model_id: &str) -> bool {
    model_id.contains('/')
        && !model_id.starts_with('/')
        && !model_id.to_lowercase().ends_with(".gguf")
        && model_id.to_lowercase().contains("gguf")
}

/// A **direct GGUF path**: ends with `.gguf`.
pub fn is_gguf_path(model_id: &str) -> bool {
    model_id.to_lowercase().ends_with(".gguf")
}

/// For a direct path `owner/file.gguf` (exactly one slash), the tokenizer/
/// config source is the `owner` prefix. Returns `None` for anything else
/// (e.g. a bare filename with no owner).
pub fn tokenizer_source_for_direct_path(model_id: &str) -> Option<String> {
    let parts: Vec<&str> = model_id.split('/').collect();
    if parts.len() == 2 && !parts[0].is_empty() {
        Some(parts[0].to_string())
    } else {
        None
    }
}

/// Pick the `*.gguf` candidate whose filename contains the quantisation
/// hint extracted from the repo name (e.g. `q4_0` from
/// `owner/name-q4_0-gguf`); falls back to the first `.gguf` file found.
pub fn pick_gguf_file(files: &[String], repo_id: &str) -> Option<String> {
    let gguf_files: Vec<&String> = files.iter().filter(|f| f.to_lowercase().ends_with(".gguf")).collect();
    if gguf_files.is_empty() {
        return None;
    }

    if let Some(hint) = QUANT_HINT_RE.find_iter(repo_id).last() {
        let hint = hint.as_str().to_lowercase();
        if let Some(matched) = gguf_files.iter().find(|f| f.to_lowercase().contains(&hint)) {
            return Some((*matched).clone());
        }
    }

    Some(gguf_files[0].clone())
}

/// Strip a quantisation tail off a GGUF repo name to recover the base repo
/// holding the tokenizer/config for the model family (spec §4.4 step 5).
pub fn infer_base_repo(repo_id: &str) -> String {
    for re in QUANT_SUFFIX_RES.iter() {
        if re.is_match(repo_id) {
            return re.replace(repo_id, "").to_string();
        }
    }
    repo_id.to_string()
}
