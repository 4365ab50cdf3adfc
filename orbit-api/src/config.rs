//! API 层配置
//!
//! 执行配置 RunConfig：编译选项 + 执行限制，显式传给 [`Context`](crate::Context)

use orbit_config::{CompilerConfig, LimitConfig, ProjectConfig};

/// Execution configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunConfig {
    /// Whether to disassemble compiled code to the debug log
    pub dump_bytecode: bool,
    /// Compiler configuration
    pub compiler: CompilerConfig,
    /// Execution limits
    pub limits: LimitConfig,
}

impl RunConfig {
    /// 从项目文件构建
    pub fn from_project(project: &ProjectConfig) -> Self {
        Self {
            dump_bytecode: project.compiler.dump_bytecode,
            compiler: project.compiler.clone(),
            limits: project.limits.clone(),
        }
    }

    pub fn with_limits(mut self, limits: LimitConfig) -> Self {
        self.limits = limits;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_run_config() {
        let cfg = RunConfig::default();
        assert!(!cfg.dump_bytecode);
        assert_eq!(cfg.compiler.emit_debug_info, None);
        assert_eq!(cfg.limits.max_stack_size, 10240);
        assert_eq!(cfg.limits.max_call_depth, 256);
    }

    #[test]
    fn test_from_project() {
        let project = ProjectConfig::from_json_str(
            r#"{ "compiler": { "dump_bytecode": true }, "limits": { "max_call_depth": 32 } }"#,
        )
        .unwrap();
        let cfg = RunConfig::from_project(&project);
        assert!(cfg.dump_bytecode);
        assert_eq!(cfg.limits.max_call_depth, 32);
    }
}
