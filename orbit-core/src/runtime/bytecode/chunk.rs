//! 字节码块实现

use super::{Constant, OpCode};
use std::fmt::Write;

/// 调试行号信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineInfo {
    pub file_id: u32,
    pub line: u32,
}

/// 字节码块
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    /// 指令
    pub code: Vec<OpCode>,
    /// 常量池
    pub constants: Vec<Constant>,
    /// 行号信息（开启调试信息时与 code 一一对应，否则为空）
    pub lines: Vec<LineInfo>,
    debug: bool,
}

impl Chunk {
    /// 创建新的字节码块
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            ..Self::default()
        }
    }

    pub fn has_debug_info(&self) -> bool {
        self.debug
    }

    /// 写入指令，返回其下标
    pub fn write(&mut self, op: OpCode, file_id: u32, line: u32) -> usize {
        self.code.push(op);
        if self.debug {
            self.lines.push(LineInfo { file_id, line });
        }
        self.code.len() - 1
    }

    /// 添加常量（整数与字符串去重），返回索引
    pub fn add_constant(&mut self, constant: Constant) -> Option<u16> {
        let dedupe = matches!(constant, Constant::Int(_) | Constant::Str(_));
        if dedupe {
            if let Some(i) = self.constants.iter().position(|c| *c == constant) {
                return u16::try_from(i).ok();
            }
        }
        let index = u16::try_from(self.constants.len()).ok()?;
        self.constants.push(constant);
        Some(index)
    }

    /// 修补跳转指令的目标
    pub fn patch_jump(&mut self, at: usize, target: usize) {
        if let Some(op) = self.code.get_mut(at) {
            *op = match *op {
                OpCode::Jump(_) => OpCode::Jump(target),
                OpCode::JumpIfFalse(_) => OpCode::JumpIfFalse(target),
                OpCode::JumpIfFalseOrPop(_) => OpCode::JumpIfFalseOrPop(target),
                OpCode::JumpIfTrueOrPop(_) => OpCode::JumpIfTrueOrPop(target),
                OpCode::ForIter { seq, .. } => OpCode::ForIter { seq, exit: target },
                other => other,
            };
        }
    }

    /// 指令对应的行号
    pub fn line_at(&self, ip: usize) -> Option<LineInfo> {
        self.lines.get(ip).copied()
    }

    /// 反汇编
    pub fn disassemble(&self, name: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "== {name} ==");
        for (i, op) in self.code.iter().enumerate() {
            let line = match self.line_at(i) {
                Some(info) => format!("{:>4}", info.line),
                None => "   |".to_string(),
            };
            let _ = write!(out, "{i:04} {line} {op:?}");
            match op {
                OpCode::Constant(idx)
                | OpCode::DefineGlobal(idx)
                | OpCode::GetGlobal(idx)
                | OpCode::SetGlobal(idx)
                | OpCode::GetProperty(idx)
                | OpCode::SetProperty(idx)
                | OpCode::Invoke(idx, _) => {
                    if let Some(c) = self.constants.get(*idx as usize) {
                        let _ = write!(out, "    ; {}", describe_constant(c));
                    }
                }
                _ => {}
            }
            out.push('\n');
        }
        out
    }
}

fn describe_constant(constant: &Constant) -> String {
    match constant {
        Constant::Int(n) => n.to_string(),
        Constant::Float(f) => f.to_string(),
        Constant::Str(s) => format!("'{s}'"),
        Constant::Function(p) => format!("<func {}>", p.name),
        Constant::Class(c) => format!("<class {}>", c.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_constants_are_deduplicated() {
        let mut chunk = Chunk::new(false);
        let a = chunk.add_constant(Constant::Str(Rc::from("x"))).unwrap();
        let b = chunk.add_constant(Constant::Str(Rc::from("x"))).unwrap();
        let c = chunk.add_constant(Constant::Int(1)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(chunk.constants.len(), 2);
    }

    #[test]
    fn test_lines_only_with_debug() {
        let mut chunk = Chunk::new(false);
        chunk.write(OpCode::Null, 0, 3);
        assert!(chunk.line_at(0).is_none());

        let mut chunk = Chunk::new(true);
        chunk.write(OpCode::Null, 2, 3);
        assert_eq!(chunk.line_at(0), Some(LineInfo { file_id: 2, line: 3 }));
    }

    #[test]
    fn test_patch_jump() {
        let mut chunk = Chunk::new(false);
        let at = chunk.write(OpCode::JumpIfFalse(usize::MAX), 0, 1);
        chunk.write(OpCode::Pop, 0, 1);
        chunk.patch_jump(at, 2);
        assert_eq!(chunk.code[at], OpCode::JumpIfFalse(2));
    }

    #[test]
    fn test_disassemble_shows_constant_names() {
        let mut chunk = Chunk::new(true);
        let idx = chunk.add_constant(Constant::Str(Rc::from("answer"))).unwrap();
        chunk.write(OpCode::GetGlobal(idx), 0, 7);
        let text = chunk.disassemble("main");
        assert!(text.contains("== main =="));
        assert!(text.contains("'answer'"));
        assert!(text.contains("   7"));
    }
}
