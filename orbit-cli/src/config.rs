//! CLI 配置
//!
//! 项目文件 `orbit.json`（可选）加上命令行覆盖项

use orbit_config::{LogLevel, ProjectConfig};
use std::path::{Path, PathBuf};

/// 读取项目文件；文件不存在时使用默认配置
pub fn load_project(path: &Path) -> Result<ProjectConfig, String> {
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }
    let content =
        std::fs::read_to_string(path).map_err(|e| format!("无法读取 '{}': {}", path.display(), e))?;
    ProjectConfig::from_json_str(&content).map_err(|e| format!("解析 '{}' 失败: {}", path.display(), e))
}

/// 命令行上覆盖项目文件的选项
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub debug: Option<bool>,
    pub dump_bytecode: bool,
    pub log_level: Option<LogLevel>,
}

impl Overrides {
    pub fn apply(&self, project: &mut ProjectConfig) {
        if let Some(debug) = self.debug {
            project.compiler.emit_debug_info = Some(debug);
        }
        if self.dump_bytecode {
            project.compiler.dump_bytecode = true;
        }
        if let Some(level) = self.log_level {
            project.logging.global = level;
        }
    }
}

/// 入口脚本：命令行参数优先，其次是项目文件的 `entry`（相对于项目文件所在目录）
pub fn resolve_entry(script: Option<&Path>, config_path: &Path, project: &ProjectConfig) -> Option<PathBuf> {
    if let Some(script) = script {
        return Some(script.to_path_buf());
    }
    let entry = project.entry.as_deref().filter(|e| !e.is_empty())?;
    let base_dir = config_path.parent().unwrap_or(Path::new("."));
    Some(base_dir.join(entry))
}

/// `--set` 的值
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Literal {
    /// 按 int → float → bool/null → 字符串 的顺序解析
    pub fn parse(text: &str) -> Self {
        if let Ok(n) = text.parse::<i64>() {
            return Literal::Int(n);
        }
        if let Ok(f) = text.parse::<f64>() {
            if f.is_finite() {
                return Literal::Float(f);
            }
        }
        match text {
            "true" => Literal::Bool(true),
            "false" => Literal::Bool(false),
            "null" => Literal::Null,
            _ => Literal::Text(text.to_string()),
        }
    }
}

/// 解析 `NAME=VALUE`
pub fn parse_assignment(arg: &str) -> Result<(String, Literal), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("'{arg}' 不是 NAME=VALUE 形式"))?;
    let name = name.trim();
    let valid = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(format!("'{name}' 不是合法的变量名"));
    }
    Ok((name.to_string(), Literal::parse(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_project_file_is_default() {
        let project = load_project(Path::new("/definitely/not/here/orbit.json")).unwrap();
        assert_eq!(project, ProjectConfig::default());
    }

    #[test]
    fn test_load_project_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orbit.json");
        std::fs::write(&path, r#"{ "entry": "src/main.orb", "logging": { "global": "debug" } }"#).unwrap();

        let project = load_project(&path).unwrap();
        assert_eq!(project.logging.global, LogLevel::Debug);
        assert_eq!(
            resolve_entry(None, &path, &project),
            Some(dir.path().join("src/main.orb"))
        );
        assert_eq!(
            resolve_entry(Some(Path::new("other.orb")), &path, &project),
            Some(PathBuf::from("other.orb"))
        );
    }

    #[test]
    fn test_malformed_project_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orbit.json");
        std::fs::write(&path, "{ entry").unwrap();
        assert!(load_project(&path).unwrap_err().contains("解析"));
    }

    #[test]
    fn test_overrides() {
        let mut project = ProjectConfig::default();
        Overrides {
            debug: Some(false),
            dump_bytecode: true,
            log_level: Some(LogLevel::Trace),
        }
        .apply(&mut project);
        assert_eq!(project.compiler.emit_debug_info, Some(false));
        assert!(project.compiler.dump_bytecode);
        assert_eq!(project.logging.global, LogLevel::Trace);
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("n=3").unwrap(), ("n".to_string(), Literal::Int(3)));
        assert_eq!(parse_assignment("ratio=0.5").unwrap().1, Literal::Float(0.5));
        assert_eq!(parse_assignment("on=true").unwrap().1, Literal::Bool(true));
        assert_eq!(parse_assignment("x=null").unwrap().1, Literal::Null);
        assert_eq!(parse_assignment("s=a=b").unwrap().1, Literal::Text("a=b".to_string()));
        assert_eq!(parse_assignment("inf=inf").unwrap().1, Literal::Text("inf".to_string()));
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("9lives=1").is_err());
    }
}
