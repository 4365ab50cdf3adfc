//! 编译会话
//!
//! 把一份源码（以及它 include 的文件）编译为可执行的入口函数。
//! 错误不以返回值传出，而是交给 [`Delegate::report_error`]，
//! 失败时返回 `None`。

use super::bytecode::Proto;
use super::compiler::{CodeGen, CompileError};
use super::delegate::{Delegate, EngineError, EngineErrorKind, SourcePosition};
use crate::compiler::parser::{parse, ParserError, Stmt, StmtKind};
use std::collections::HashSet;
use std::rc::Rc;
use tracing::{debug, trace};

/// include 嵌套层数上限
const MAX_INCLUDE_DEPTH: usize = 64;

/// 编译结果
#[derive(Debug, Clone)]
pub struct Program {
    /// 入口函数
    pub entry: Rc<Proto>,
    /// 参与编译的文件 ID（按首次出现的顺序，根文件在前）
    pub files: Vec<u32>,
}

impl Program {
    /// 反汇编整个程序
    pub fn disassemble(&self) -> String {
        self.entry.disassemble()
    }
}

/// 编译会话
pub struct Compiler<'d> {
    delegate: &'d dyn Delegate,
    predeclared: Vec<String>,
}

impl<'d> Compiler<'d> {
    pub fn new(delegate: &'d dyn Delegate) -> Self {
        Self {
            delegate,
            predeclared: Vec::new(),
        }
    }

    /// 声明宿主已经绑定的全局名字，脚本可以不写 `extern` 直接引用
    pub fn declare_global(&mut self, name: impl Into<String>) {
        self.predeclared.push(name.into());
    }

    /// 编译源码。`debug` 为 true 时生成行号表
    pub fn run(&mut self, source: &str, file_id: u32, debug: bool) -> Option<Program> {
        match self.compile(source, file_id, debug) {
            Ok(program) => Some(program),
            Err(error) => {
                debug!(target: "orbit::compiler", error = %error, "Compilation failed");
                self.delegate.report_error(error);
                None
            }
        }
    }

    fn compile(&self, source: &str, file_id: u32, debug: bool) -> Result<Program, EngineError> {
        let module = parse(source, file_id).map_err(|e| syntax_error(&e))?;

        let mut seen = HashSet::from([file_id]);
        let mut files = vec![file_id];
        let mut statements = Vec::with_capacity(module.statements.len());
        self.expand(module.statements, &mut seen, &mut files, &mut statements, 0)?;

        let mut codegen = CodeGen::new(debug);
        for name in &self.predeclared {
            codegen.declare_global(name.clone());
        }
        let entry = codegen
            .compile_program(&statements, file_id)
            .map_err(|e| semantic_error(&e))?;

        debug!(
            target: "orbit::compiler",
            file_id,
            files = files.len(),
            ops = entry.chunk.code.len(),
            "Compilation succeeded"
        );
        Ok(Program { entry, files })
    }

    /// 原地展开顶层 include；同一文件只展开一次
    fn expand(
        &self,
        statements: Vec<Stmt>,
        seen: &mut HashSet<u32>,
        files: &mut Vec<u32>,
        out: &mut Vec<Stmt>,
        depth: usize,
    ) -> Result<(), EngineError> {
        for stmt in statements {
            let pos = stmt.pos;
            let name = match stmt.kind {
                StmtKind::Include(name) => name,
                kind => {
                    out.push(Stmt::new(kind, pos));
                    continue;
                }
            };

            let position = SourcePosition {
                file_id: pos.file_id,
                line: pos.line,
                column: pos.column,
            };
            if depth >= MAX_INCLUDE_DEPTH {
                return Err(EngineError::new(EngineErrorKind::Io, format!("Include nesting too deep at '{name}'")).at(position));
            }
            let Some(loaded) = self.delegate.load_file(&name) else {
                return Err(EngineError::new(EngineErrorKind::Io, format!("Unable to load file {name}")).at(position));
            };
            if !seen.insert(loaded.file_id) {
                trace!(target: "orbit::compiler", file = %name, "Skipping file already included");
                continue;
            }
            files.push(loaded.file_id);
            trace!(target: "orbit::compiler", file = %name, file_id = loaded.file_id, "Including file");

            let module = parse(&loaded.source, loaded.file_id).map_err(|e| syntax_error(&e))?;
            self.expand(module.statements, seen, files, out, depth + 1)?;
        }
        Ok(())
    }
}

fn syntax_error(error: &ParserError) -> EngineError {
    let mut engine_error = EngineError::new(EngineErrorKind::Syntax, error.to_string());
    if let (Some(line), Some(column)) = (error.line(), error.column()) {
        engine_error = engine_error.at(SourcePosition {
            file_id: error.file_id(),
            line,
            column,
        });
    }
    engine_error
}

fn semantic_error(error: &CompileError) -> EngineError {
    EngineError::new(EngineErrorKind::Semantic, error.to_string()).at(SourcePosition {
        file_id: error.pos.file_id,
        line: error.pos.line,
        column: error.pos.column,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::delegate::LoadedFile;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct TestDelegate {
        files: HashMap<String, (String, u32)>,
        errors: RefCell<Vec<EngineError>>,
    }

    impl Delegate for TestDelegate {
        fn report_error(&self, error: EngineError) {
            self.errors.borrow_mut().push(error);
        }

        fn load_file(&self, name: &str) -> Option<LoadedFile> {
            self.files.get(name).map(|(source, file_id)| LoadedFile {
                source: source.clone(),
                file_id: *file_id,
            })
        }
    }

    #[test]
    fn test_successful_compile() {
        let delegate = TestDelegate::default();
        let program = Compiler::new(&delegate).run("var x = 1", 0, false).unwrap();
        assert_eq!(program.files, vec![0]);
        assert!(delegate.errors.borrow().is_empty());
        assert!(program.disassemble().contains("$main"));
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let delegate = TestDelegate::default();
        assert!(Compiler::new(&delegate).run("var = 1", 0, false).is_none());
        let errors = delegate.errors.borrow();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, EngineErrorKind::Syntax);
        assert_eq!(errors[0].position.map(|p| p.line), Some(1));
    }

    #[test]
    fn test_semantic_error_is_reported() {
        let delegate = TestDelegate::default();
        assert!(Compiler::new(&delegate).run("\nprint(1)", 0, false).is_none());
        let errors = delegate.errors.borrow();
        assert_eq!(errors[0].kind, EngineErrorKind::Semantic);
        assert!(errors[0].message.contains("print"));
        assert_eq!(errors[0].position.map(|p| p.line), Some(2));
    }

    #[test]
    fn test_predeclared_global() {
        let delegate = TestDelegate::default();
        let mut compiler = Compiler::new(&delegate);
        compiler.declare_global("print");
        assert!(compiler.run("print(1)", 0, false).is_some());
    }

    #[test]
    fn test_include_is_expanded_once() {
        let mut delegate = TestDelegate::default();
        delegate
            .files
            .insert("lib.orb".to_string(), ("func helper() { return 1 }".to_string(), 1));
        let program = Compiler::new(&delegate)
            .run("include \"lib.orb\"\ninclude \"lib.orb\"\nvar x = helper()", 0, false)
            .unwrap();
        assert_eq!(program.files, vec![0, 1]);
    }

    #[test]
    fn test_missing_include_is_io_error() {
        let delegate = TestDelegate::default();
        assert!(Compiler::new(&delegate).run("include \"nope.orb\"", 0, false).is_none());
        let errors = delegate.errors.borrow();
        assert_eq!(errors[0].kind, EngineErrorKind::Io);
        assert!(errors[0].message.contains("nope.orb"));
    }

    #[test]
    fn test_syntax_error_in_included_file_carries_its_id() {
        let mut delegate = TestDelegate::default();
        delegate
            .files
            .insert("bad.orb".to_string(), ("\n\nvar = ".to_string(), 7));
        assert!(Compiler::new(&delegate).run("include \"bad.orb\"", 0, false).is_none());
        let errors = delegate.errors.borrow();
        assert_eq!(errors[0].position.map(|p| (p.file_id, p.line)), Some((7, 3)));
    }
}
