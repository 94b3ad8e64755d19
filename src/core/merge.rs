//! Combines several extracted packages into one content tree.
//!
//! Squirrel scripts get a per-source prefix on their file names and on every global they
//! declare, so packages cannot clobber each other's globals. Each original script name
//! becomes an include file that loads every prefixed variant. Config files are merged by
//! command name, first writer wins.

use crate::models::session::MergeSourceState;
use crate::utils::file::FileUtils;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::fs::{self, OpenOptions};
use std::io::Write;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Globals that are known to collide between popular script libraries.
const SEEDED_GLOBALS: [&str; 5] = [
    "ppmod_portals_p_anchor",
    "ppmod_portals_r_anchor",
    "ppmod_eyes",
    "pplayer_eyes",
    "pplayer_ent_",
];

const SQUIRREL_KEYWORDS: &[&str] = &[
    "break", "case", "catch", "class", "clone", "continue", "const", "default", "delegate",
    "delete", "else", "enum", "extends", "for", "foreach", "function", "if", "in", "local",
    "null", "resume", "return", "switch", "this", "throw", "try", "typeof", "while", "parent",
    "yield", "constructor", "vargc", "vargv", "instanceof", "true", "false", "static", "_set",
    "_get", "_newslot", "_delslot", "_add", "_sub", "_mul", "_div", "_modulo", "_unm",
    "_typeof", "_cmp", "_call", "_cloned", "_nexti", "_tostring", "_inherited", "_newmember",
];

const INCLUDE_CALL: &str = "IncludeScript(\"";

/// Prepended once to every generated include file so one broken script
/// doesn't take the whole include chain down with it.
const COMPILESTRING_PATCH: &str = "if (typeof compilestring == \"native function\") {\n  local _compilestring = compilestring;\n  ::compilestring <- function (str):(_compilestring) {\n    return function (...):(str, _compilestring) {\n      try { return _compilestring(str)() } catch (e) { printl(e) }\n    };\n  };\n}\n\n";

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

pub struct Merger;

impl Merger {
    /// Merges `sources` into `destination` in order. Each source directory is consumed.
    /// Problems with individual files are logged and skipped.
    pub fn merge_sources(sources: &[Utf8PathBuf], destination: &Utf8Path) -> Vec<MergeSourceState> {
        let mut states = Vec::with_capacity(sources.len());

        for (i, source) in sources.iter().enumerate() {
            let mut state = Self::new_state(i + 1);

            if !source.is_dir() {
                warn!(%source, "Merge error, missing source directory");
                states.push(state);
                continue;
            }

            Self::merge_source(source, destination, &mut state);
            if let Err(e) = FileUtils::remove_dir_if_exists(source) {
                warn!(%source, "Merge error, failed to remove source directory: {e}");
            }
            Self::replace_script_globals(&state);

            debug!(
                prefix = %state.merge_prefix,
                globals = state.script_globals.len(),
                scripts = state.script_files.len(),
                "Merged source"
            );
            states.push(state);
        }

        states
    }

    fn new_state(index: usize) -> MergeSourceState {
        MergeSourceState {
            index,
            merge_prefix: format!("sppmerge{index}_"),
            script_globals: SEEDED_GLOBALS.iter().map(|s| s.to_string()).collect(),
            script_files: Vec::new(),
        }
    }

    fn merge_source(source: &Utf8Path, destination: &Utf8Path, state: &mut MergeSourceState) {
        let walker = WalkDir::new(source).min_depth(1).sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Merge error, unreadable entry: {e}");
                    continue;
                }
            };
            let Some(path) = Utf8Path::from_path(entry.path()) else {
                warn!(path = %entry.path().display(), "Merge error, non UTF-8 path");
                continue;
            };
            let Ok(relative) = path.strip_prefix(source) else {
                continue;
            };
            let dest_path = destination.join(relative);

            if entry.file_type().is_dir() {
                if let Err(e) = fs::create_dir_all(&dest_path) {
                    warn!(%dest_path, "Merge error, unable to create directory: {e}");
                }
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            match path.extension() {
                Some("cfg" | "rc") if dest_path.exists() => Self::merge_config_file(path, &dest_path),
                Some("nut") => Self::process_script_file(path, &dest_path, state),
                // Save files prevent the merged content from loading.
                Some("sav") => continue,
                _ => {
                    if let Err(e) = FileUtils::move_path(path, &dest_path) {
                        warn!(%path, "Merge error, unable to move file: {e}");
                    }
                }
            }
        }
    }

    fn process_script_file(source: &Utf8Path, destination: &Utf8Path, state: &mut MergeSourceState) {
        let script = read_string(source);
        state.script_globals.extend(extract_globals(&script));

        let Some(file_name) = source.file_name() else {
            return;
        };
        let renamed_name = format!("{}{file_name}", state.merge_prefix);
        let renamed_path = destination.with_file_name(&renamed_name);
        if let Err(e) = FileUtils::move_path(source, &renamed_path) {
            warn!(%source, "Merge error, unable to move script: {e}");
            return;
        }

        state.script_files.push(destination.to_owned());

        let mut include = format!("try {{ IncludeScript(\"{renamed_name}\") }} catch (e) {{ printl(e) }}\n");
        if !destination.exists() {
            include.insert_str(0, COMPILESTRING_PATCH);
        }

        let appended = OpenOptions::new()
            .create(true)
            .append(true)
            .open(destination)
            .and_then(|mut f| f.write_all(include.as_bytes()));
        if let Err(e) = appended {
            warn!(%destination, "Merge error, unable to append to script include file: {e}");
        }
    }

    /// Appends source lines whose command is not already set in `destination`.
    fn merge_config_file(source: &Utf8Path, destination: &Utf8Path) {
        let existing = read_string(destination);
        let incoming = read_string(source);

        let merged = merge_config(&existing, &incoming);
        if merged.len() == existing.len() {
            return;
        }

        let appended = OpenOptions::new()
            .append(true)
            .open(destination)
            .and_then(|mut f| f.write_all(merged[existing.len()..].as_bytes()));
        if let Err(e) = appended {
            warn!(%destination, "Merge error, unable to append to config file: {e}");
        }
    }

    fn replace_script_globals(state: &MergeSourceState) {
        let bases: Vec<String> = state
            .script_files
            .iter()
            .filter_map(|f| f.file_name())
            .map(|name| name.split('.').next().unwrap_or(name).to_string())
            .collect();

        for file in &state.script_files {
            let Some(file_name) = file.file_name() else {
                continue;
            };
            let renamed_path = file.with_file_name(format!("{}{file_name}", state.merge_prefix));
            let mut script = read_string(&renamed_path);

            for global in &state.script_globals {
                script = rename_global(&script, global, &state.merge_prefix);
            }
            for base in &bases {
                script = redirect_includes(&script, base, &state.merge_prefix);
            }

            if let Err(e) = fs::write(&renamed_path, script) {
                warn!(%renamed_path, "Merge error, unable to write file: {e}");
            }
        }
    }
}

fn read_string(path: &Utf8Path) -> String {
    fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_else(|e| {
            warn!(%path, "Merge error, unable to read file: {e}");
            String::new()
        })
}

/// Identifier ending right before `pos`, skipping blanks first.
fn name_before(line: &str, pos: usize) -> &str {
    let head = line[..pos].trim_end_matches(is_blank);
    let start = head
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_name_char(*c))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(head.len());
    &head[start..]
}

/// Identifier starting at `pos`, skipping blanks first.
fn name_after(line: &str, pos: usize) -> &str {
    let tail = line[pos..].trim_start_matches(is_blank);
    let end = tail
        .char_indices()
        .find(|(_, c)| !is_name_char(*c))
        .map(|(i, _)| i)
        .unwrap_or(tail.len());
    &tail[..end]
}

/// Names assigned with `<-` or declared with `class`, minus anything that also
/// shows up as a `.member` access in the same script.
pub fn extract_globals(script: &str) -> BTreeSet<String> {
    let keywords: HashSet<&str> = SQUIRREL_KEYWORDS.iter().copied().collect();
    let mut globals = BTreeSet::new();

    for raw in script.split('\n') {
        let line = match raw.find("//") {
            Some(comment) => &raw[..comment],
            None => raw,
        };

        let mut name = line.find("<-").map(|p| name_before(line, p)).unwrap_or_default();
        if name.is_empty() {
            name = line
                .find("class ")
                .map(|p| name_after(line, p + "class ".len()))
                .unwrap_or_default();
        }

        if !name.is_empty() && !keywords.contains(name) {
            globals.insert(name.to_string());
        }
    }

    globals.retain(|name| !has_member_access(script, name));
    globals
}

fn has_member_access(script: &str, name: &str) -> bool {
    Regex::new(&format!(r"\.{}\b", regex::escape(name)))
        .map(|re| re.is_match(script))
        .unwrap_or(false)
}

/// Prefixes whole-word occurrences of `global`, except on a line after an include call.
pub fn rename_global(script: &str, global: &str, prefix: &str) -> String {
    if global.is_empty() {
        return script.to_string();
    }

    let mut out = String::with_capacity(script.len());
    let mut copied = 0;

    for (pos, _) in script.match_indices(global) {
        let before = script[..pos].chars().next_back();
        let after = script[pos + global.len()..].chars().next();
        if before.is_some_and(is_name_char) || after.is_some_and(is_name_char) {
            continue;
        }

        let line_start = script[..pos].rfind('\n').map(|i| i as isize).unwrap_or(-1);
        let include_at = script[..pos].rfind(INCLUDE_CALL).map(|i| i as isize).unwrap_or(-1);
        if line_start < include_at {
            continue;
        }

        out.push_str(&script[copied..pos]);
        out.push_str(prefix);
        out.push_str(global);
        copied = pos + global.len();
    }

    out.push_str(&script[copied..]);
    out
}

/// Points `IncludeScript("base"` and `IncludeScript("base.nut"` at the prefixed file.
pub fn redirect_includes(script: &str, base: &str, prefix: &str) -> String {
    let replacement = format!("{INCLUDE_CALL}{prefix}{base}\"");
    script
        .replace(&format!("{INCLUDE_CALL}{base}\""), &replacement)
        .replace(&format!("{INCLUDE_CALL}{base}.nut\""), &replacement)
}

fn command_of(line: &str) -> Option<&str> {
    line.split_whitespace().next()
}

/// Returns `existing` with every line of `incoming` whose command it lacks appended.
pub fn merge_config(existing: &str, incoming: &str) -> String {
    let commands: HashSet<&str> = existing
        .split('\n')
        .filter(|line| !line.starts_with("//"))
        .filter_map(command_of)
        .collect();

    let mut merged = existing.to_string();
    for line in incoming.split('\n') {
        if line.starts_with("//") {
            continue;
        }
        match command_of(line) {
            Some(command) if !commands.contains(command) => {}
            _ => continue,
        }
        merged.push('\n');
        merged.push_str(line);
    }
    merged
}
