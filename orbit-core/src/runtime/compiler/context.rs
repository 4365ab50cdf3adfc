//! 编译期上下文：函数状态、局部变量、循环信息

use crate::compiler::parser::Pos;
use crate::runtime::bytecode::chunk::Chunk;
use crate::runtime::bytecode::UpvalueDesc;
use std::collections::HashSet;

/// 局部变量信息
#[derive(Debug, Clone)]
pub struct Local {
    pub name: String,
    pub depth: usize,
    pub is_initialized: bool,
    /// 槽位中存放的是捕获单元而不是值
    pub boxed: bool,
}

/// 正在编译的函数种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionType {
    /// 顶层脚本
    Script,
    Function,
    /// 类方法，槽位 0 为 self
    Method,
}

/// 循环信息（break/continue 使用）
#[derive(Debug, Clone)]
pub struct LoopState {
    /// continue 的跳转目标
    pub start: usize,
    /// 进入循环体前的作用域深度
    pub depth: usize,
    /// 待回填的 break 跳转
    pub breaks: Vec<usize>,
}

/// 单个函数的编译状态
#[derive(Debug)]
pub struct FunctionState {
    pub name: String,
    pub kind: FunctionType,
    pub arity: u8,
    pub chunk: Chunk,
    pub locals: Vec<Local>,
    pub upvalues: Vec<UpvalueDesc>,
    pub scope_depth: usize,
    /// 函数体内含有闭包时，所有局部变量都装箱
    pub boxed: bool,
    pub loops: Vec<LoopState>,
    pub file_id: u32,
    /// 当前正在编译的源码位置
    pub pos: Pos,
}

impl FunctionState {
    pub fn new(name: &str, kind: FunctionType, pos: Pos, boxed: bool, debug: bool) -> Self {
        let slot0 = match kind {
            FunctionType::Method => "self",
            _ => "",
        };
        Self {
            name: name.to_string(),
            kind,
            arity: 0,
            chunk: Chunk::new(debug),
            locals: vec![Local {
                name: slot0.to_string(),
                depth: 0,
                is_initialized: true,
                boxed: false,
            }],
            upvalues: Vec::new(),
            scope_depth: if kind == FunctionType::Script { 0 } else { 1 },
            boxed,
            loops: Vec::new(),
            file_id: pos.file_id,
            pos,
        }
    }
}

/// 正在编译的类：方法内可以省略 `self.` 访问这些成员
#[derive(Debug, Clone, Default)]
pub struct ClassScope {
    pub name: String,
    pub members: HashSet<String>,
}
