use crate::domain::model::{Manifest, Requirement, VersionSpecifier};
use crate::utils::error::{BootstrapError, Result};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

const NAME_PATTERN: &str = r"^([A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[([^\]]*)\])?\s*(.*)$";
const SPECIFIER_PATTERN: &str = r"^(===|==|!=|~=|>=|<=|>|<)\s*([A-Za-z0-9][A-Za-z0-9.*+!_-]*)$";

fn patterns() -> Result<&'static (Regex, Regex)> {
    static PATTERNS: OnceLock<(Regex, Regex)> = OnceLock::new();
    if let Some(patterns) = PATTERNS.get() {
        return Ok(patterns);
    }
    let compiled = (
        Regex::new(NAME_PATTERN).map_err(|e| BootstrapError::config(e.to_string()))?,
        Regex::new(SPECIFIER_PATTERN).map_err(|e| BootstrapError::config(e.to_string()))?,
    );
    Ok(PATTERNS.get_or_init(|| compiled))
}

/// Reads and parses a dependency manifest from disk.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => BootstrapError::ManifestMissing {
            path: path.to_path_buf(),
        },
        _ => BootstrapError::IoError(e),
    })?;
    parse_manifest(&content)
}

/// Parses newline-separated package identifiers, optionally versioned.
///
/// Blank lines and `#` comments are skipped. Lines starting with `-` are
/// installer options and are kept verbatim in [`Manifest::directives`].
pub fn parse_manifest(content: &str) -> Result<Manifest> {
    let mut manifest = Manifest::default();
    let mut seen = HashSet::new();

    for (line_no, line) in logical_lines(content) {
        if line.is_empty() {
            continue;
        }

        if line.starts_with('-') {
            tracing::debug!("Manifest line {} is an installer option: {}", line_no, line);
            manifest.directives.push(line);
            continue;
        }

        let requirement = parse_requirement(line_no, &line)?;
        if !seen.insert(requirement.normalized_name()) {
            return Err(BootstrapError::InvalidRequirement {
                line: line_no,
                content: line,
                reason: format!("duplicate requirement for '{}'", requirement.name),
            });
        }
        manifest.requirements.push(requirement);
    }

    Ok(manifest)
}

/// 以 `\` 結尾的行與下一行合併，回傳起始行號與去掉註解後的內容
fn logical_lines(content: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (index, raw) in content.lines().enumerate() {
        let part = strip_comment(raw).trim();
        let (start, mut joined) = pending.take().unwrap_or((index + 1, String::new()));
        if !joined.is_empty() && !part.is_empty() {
            joined.push(' ');
        }

        match part.strip_suffix('\\') {
            Some(head) => {
                joined.push_str(head.trim_end());
                pending = Some((start, joined));
            }
            None => {
                joined.push_str(part);
                lines.push((start, joined));
            }
        }
    }
    if let Some(last) = pending {
        lines.push(last);
    }

    lines
}

// 行內註解需要前面有空白，避免誤切 URL 片段
fn strip_comment(line: &str) -> &str {
    if line.trim_start().starts_with('#') {
        return "";
    }
    match line.find(" #").or_else(|| line.find("\t#")) {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn parse_requirement(line_no: usize, line: &str) -> Result<Requirement> {
    let (name_re, spec_re) = patterns()?;
    let invalid = |reason: &str| BootstrapError::InvalidRequirement {
        line: line_no,
        content: line.to_string(),
        reason: reason.to_string(),
    };

    // 每個套件自己的安裝選項（例如 --hash）留給安裝程式處理
    let line = match line.find(" --") {
        Some(pos) => {
            tracing::debug!("Manifest line {} carries options: {}", line_no, &line[pos + 1..]);
            line[..pos].trim_end()
        }
        None => line,
    };

    // 直接參照的 URL 本身可能含 ';'，marker 前必須有空白
    let marker_split = if line.contains('@') {
        line.split_once(" ;")
    } else {
        line.split_once(';')
    };
    let (body, marker) = match marker_split {
        Some((body, marker)) => {
            let marker = marker.trim();
            if marker.is_empty() {
                return Err(invalid("empty environment marker"));
            }
            (body.trim(), Some(marker.to_string()))
        }
        None => (line, None),
    };

    let caps = name_re
        .captures(body)
        .ok_or_else(|| invalid("not a valid package name"))?;
    let name = caps[1].to_string();

    let extras = match caps.get(2) {
        Some(m) => {
            let extras: Vec<String> = m
                .as_str()
                .split(',')
                .map(|e| e.trim().to_string())
                .collect();
            if extras.iter().any(|e| e.is_empty()) {
                return Err(invalid("empty extra"));
            }
            extras
        }
        None => Vec::new(),
    };

    let rest = caps.get(3).map(|m| m.as_str().trim()).unwrap_or("");
    let mut specifiers = Vec::new();
    let mut url = None;
    if let Some(reference) = rest.strip_prefix('@') {
        let reference = reference.trim();
        if reference.is_empty() || reference.contains(char::is_whitespace) {
            return Err(invalid("direct reference needs a single URL after '@'"));
        }
        url = Some(reference.to_string());
    } else if !rest.is_empty() {
        for part in rest.split(',') {
            let spec = spec_re
                .captures(part.trim())
                .ok_or_else(|| invalid("unrecognised version specifier"))?;
            specifiers.push(VersionSpecifier {
                op: spec[1].to_string(),
                version: spec[2].to_string(),
            });
        }
    }

    Ok(Requirement {
        name,
        extras,
        specifiers,
        url,
        marker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pinned_and_bare_requirements() {
        let manifest = parse_manifest("flask==2.0.0\ngunicorn\n\n# tooling\nrequests >= 2.25, < 3\n").unwrap();

        assert_eq!(manifest.requirements.len(), 3);
        assert_eq!(manifest.requirements[0].name, "flask");
        assert_eq!(manifest.requirements[0].pinned_version(), Some("2.0.0"));
        assert!(manifest.requirements[1].specifiers.is_empty());
        assert_eq!(manifest.requirements[2].to_string(), "requests>=2.25,<3");
    }

    #[test]
    fn test_parse_extras_markers_and_comments() {
        let manifest = parse_manifest(
            "uvicorn[standard, watch]~=0.20  # server\npywin32==306; sys_platform == \"win32\"\n",
        )
        .unwrap();

        let uvicorn = &manifest.requirements[0];
        assert_eq!(uvicorn.extras, vec!["standard".to_string(), "watch".to_string()]);
        assert_eq!(uvicorn.specifiers[0].op, "~=");

        let pywin = &manifest.requirements[1];
        assert_eq!(pywin.marker.as_deref(), Some("sys_platform == \"win32\""));
        assert_eq!(pywin.pinned_version(), Some("306"));
    }

    #[test]
    fn test_installer_options_pass_through() {
        let manifest = parse_manifest("--index-url https://pypi.example/simple\n-r base.txt\nflask\n").unwrap();
        assert_eq!(manifest.directives.len(), 2);
        assert_eq!(manifest.requirements.len(), 1);
    }

    #[test]
    fn test_invalid_lines_report_line_number() {
        let err = parse_manifest("flask==2.0.0\n!!!\n").unwrap_err();
        match err {
            BootstrapError::InvalidRequirement { line, content, .. } => {
                assert_eq!(line, 2);
                assert_eq!(content, "!!!");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(parse_manifest("flask=2.0.0").is_err());
        assert!(parse_manifest("flask[]").is_err());
        assert!(parse_manifest("flask==").is_err());
    }

    #[test]
    fn test_direct_reference_requirements() {
        let manifest = parse_manifest(
            "mypkg @ https://example.com/mypkg-1.0.tar.gz\n\
             tool[cli]@git+https://example.com/tool.git@v2 ; python_version >= \"3.8\"\n",
        )
        .unwrap();

        let mypkg = &manifest.requirements[0];
        assert_eq!(mypkg.name, "mypkg");
        assert_eq!(mypkg.url.as_deref(), Some("https://example.com/mypkg-1.0.tar.gz"));
        assert!(mypkg.specifiers.is_empty());
        assert_eq!(mypkg.to_string(), "mypkg @ https://example.com/mypkg-1.0.tar.gz");

        let tool = &manifest.requirements[1];
        assert_eq!(tool.extras, vec!["cli".to_string()]);
        assert_eq!(tool.url.as_deref(), Some("git+https://example.com/tool.git@v2"));
        assert_eq!(tool.marker.as_deref(), Some("python_version >= \"3.8\""));

        assert!(parse_manifest("mypkg @").is_err());
    }

    #[test]
    fn test_continuation_lines_are_joined() {
        let manifest = parse_manifest(
            "flask==2.0.0 \\\n    --hash=sha256:aaaa \\\n    --hash=sha256:bbbb\n\
             gunicorn==20.1.0\n",
        )
        .unwrap();

        assert_eq!(manifest.requirements.len(), 2);
        assert_eq!(manifest.requirements[0].to_string(), "flask==2.0.0");
        assert_eq!(manifest.requirements[1].name, "gunicorn");

        // 錯誤回報的是邏輯行的起始行號
        let err = parse_manifest("flask==2.0.0\nbad name \\\n  --hash=sha256:cc\n").unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidRequirement { line: 2, .. }));
    }

    #[test]
    fn test_duplicate_requirements_are_rejected() {
        let err = parse_manifest("Flask==2.0.0\nflask==2.1.0\n").unwrap_err();
        assert!(err.to_string().contains("duplicate requirement"));
    }

    #[test]
    fn test_empty_manifest_is_valid() {
        let manifest = parse_manifest("\n# nothing yet\n").unwrap();
        assert!(manifest.requirements.is_empty());
    }

    #[test]
    fn test_load_missing_manifest() {
        let err = load_manifest(Path::new("/nonexistent/requirements.txt")).unwrap_err();
        assert!(matches!(err, BootstrapError::ManifestMissing { .. }));
    }
}
