//! 字节码定义
//!
//! 指令直接携带操作数（枚举变体），跳转目标为绝对指令下标。

pub mod chunk;

use chunk::Chunk;
use std::fmt::Write;
use std::rc::Rc;

/// 指令集
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    // ===== 常量 =====
    Constant(u16),
    Null,
    True,
    False,
    Pop,

    // ===== 变量 =====
    GetLocal(u8),
    SetLocal(u8),
    /// 把局部变量槽位装箱为捕获单元
    BoxLocal(u8),
    GetBoxed(u8),
    SetBoxed(u8),
    GetUpvalue(u8),
    SetUpvalue(u8),
    DefineGlobal(u16),
    GetGlobal(u16),
    SetGlobal(u16),

    // ===== 成员与索引 =====
    GetProperty(u16),
    SetProperty(u16),
    GetIndex,
    SetIndex,

    // ===== 运算 =====
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Negate,
    Not,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    // ===== 控制流 =====
    Jump(usize),
    /// 弹出条件，为假时跳转
    JumpIfFalse(usize),
    /// 栈顶为假时保留并跳转，否则弹出（`&&`）
    JumpIfFalseOrPop(usize),
    /// 栈顶为真时保留并跳转，否则弹出（`||`）
    JumpIfTrueOrPop(usize),
    /// for-in 迭代：`seq` 槽位存放被迭代对象，`seq + 1` 存放下标
    ForIter { seq: u8, exit: usize },

    // ===== 调用 =====
    Call(u8),
    /// 方法调用：成员名常量 + 参数个数
    Invoke(u16, u8),
    Closure(u16),
    Class(u16),
    Return,
    Throw,

    // ===== 构造 =====
    BuildList(u16),
    BuildMap(u16),
    BuildRange { inclusive: bool },
}

/// 常量池条目
#[derive(Debug, Clone)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Function(Rc<Proto>),
    Class(Rc<ClassProto>),
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Constant::Int(a), Constant::Int(b)) => a == b,
            (Constant::Float(a), Constant::Float(b)) => a.to_bits() == b.to_bits(),
            (Constant::Str(a), Constant::Str(b)) => a == b,
            (Constant::Function(a), Constant::Function(b)) => Rc::ptr_eq(a, b),
            (Constant::Class(a), Constant::Class(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// 捕获描述：来自外层函数的局部槽位，或外层函数自己的 upvalue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpvalueDesc {
    pub from_parent_local: bool,
    pub index: u8,
}

/// 编译后的函数原型
#[derive(Debug, Clone)]
pub struct Proto {
    pub name: Rc<str>,
    pub arity: u8,
    pub chunk: Chunk,
    pub upvalues: Vec<UpvalueDesc>,
    pub file_id: u32,
}

impl Proto {
    /// 反汇编自身以及常量池中嵌套的函数和类
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        self.disassemble_into(&mut out);
        out
    }

    fn disassemble_into(&self, out: &mut String) {
        let name = if self.name.is_empty() { "<anonymous>" } else { &self.name };
        out.push_str(&self.chunk.disassemble(name));
        for constant in &self.chunk.constants {
            match constant {
                Constant::Function(proto) => proto.disassemble_into(out),
                Constant::Class(class) => {
                    let _ = writeln!(out, "== class {} ==", class.name);
                    for method in class.methods.iter().chain(class.initializer.iter()) {
                        method.disassemble_into(out);
                    }
                }
                _ => {}
            }
        }
    }
}

/// 编译后的类原型：运行 `Class` 指令时据此创建类对象
#[derive(Debug, Clone)]
pub struct ClassProto {
    pub name: Rc<str>,
    pub has_super: bool,
    pub ivars: Vec<Rc<str>>,
    pub methods: Vec<Rc<Proto>>,
    /// 实例变量初始化函数（`$init`），没有带初始值的变量时为 None
    pub initializer: Option<Rc<Proto>>,
}

/// 类中存放实例变量初始化函数的成员名
pub const IVAR_INITIALIZER: &str = "$init";
