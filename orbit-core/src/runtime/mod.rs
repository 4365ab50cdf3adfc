//! Orbit 运行时 (Runtime 层)
//!
//! 字节码编译器与虚拟机：
//! - `Value` / `Object`：值模型与堆对象
//! - `Heap`：对象竞技场，随 VM 一起释放
//! - `compiler`：AST → 字节码，以及 include 展开
//! - `Vm`：可重入的栈式虚拟机
//! - `Delegate`：宿主回调（错误、文件加载、原生函数桥接）

// ==================== 值与对象 ====================

pub mod heap;
pub mod object;
pub mod value;

// ==================== 字节码与编译 ====================

pub mod bytecode;
pub mod compiler;
pub mod session;

// ==================== 执行 ====================

pub mod delegate;
pub mod operators;
pub mod vm;
