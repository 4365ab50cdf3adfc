//! 变量解析和管理

use super::context::{FunctionState, Local};
use super::error::CompileErrorKind;
use crate::runtime::bytecode::UpvalueDesc;

/// 局部变量数量上限（槽位用 u8 寻址）
const MAX_LOCALS: usize = 256;
const MAX_UPVALUES: usize = 256;

/// 变量解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    /// 局部变量槽位，`boxed` 表示槽位中是捕获单元
    Local { slot: u8, boxed: bool },
    Upvalue(u8),
}

/// 进入新作用域
pub fn begin_scope(state: &mut FunctionState) {
    state.scope_depth += 1;
}

/// 退出作用域，返回弹出的变量数量
pub fn end_scope(state: &mut FunctionState) -> usize {
    state.scope_depth -= 1;

    let mut popped = 0;
    while let Some(local) = state.locals.last() {
        if local.depth <= state.scope_depth {
            break;
        }
        state.locals.pop();
        popped += 1;
    }
    popped
}

/// 比 `depth` 更深的局部变量个数（break/continue 需要弹出它们）
pub fn locals_above(state: &FunctionState, depth: usize) -> usize {
    state
        .locals
        .iter()
        .rev()
        .take_while(|local| local.depth > depth)
        .count()
}

/// 添加局部变量，返回其在栈中的索引
pub fn add_local(state: &mut FunctionState, name: &str) -> Result<u8, CompileErrorKind> {
    if state.locals.len() >= MAX_LOCALS {
        return Err(CompileErrorKind::TooManyLocals);
    }

    // 同作用域内不能重复声明（隐藏变量名为空格开头，不参与检查）
    if !name.starts_with(' ') {
        for local in state.locals.iter().rev() {
            if local.depth < state.scope_depth {
                break;
            }
            if local.name == name {
                return Err(CompileErrorKind::VariableAlreadyExists(name.to_string()));
            }
        }
    }

    state.locals.push(Local {
        name: name.to_string(),
        depth: state.scope_depth,
        is_initialized: false,
        boxed: false,
    });
    Ok((state.locals.len() - 1) as u8)
}

/// 标记最后一个变量为已初始化
pub fn mark_initialized(state: &mut FunctionState, boxed: bool) {
    if let Some(local) = state.locals.last_mut() {
        local.is_initialized = true;
        local.boxed = boxed;
    }
}

/// 在当前函数的局部变量表中查找
pub fn resolve_local(state: &FunctionState, name: &str) -> Option<(u8, bool)> {
    if name.is_empty() {
        return None;
    }
    state
        .locals
        .iter()
        .enumerate()
        .rev()
        .find(|(_, local)| local.is_initialized && local.name == name)
        .map(|(i, local)| (i as u8, local.boxed))
}

/// 添加 upvalue 描述，返回其索引
pub fn add_upvalue(
    state: &mut FunctionState,
    from_parent_local: bool,
    index: u8,
) -> Result<u8, CompileErrorKind> {
    let desc = UpvalueDesc {
        from_parent_local,
        index,
    };
    if let Some(i) = state.upvalues.iter().position(|u| *u == desc) {
        return Ok(i as u8);
    }
    if state.upvalues.len() >= MAX_UPVALUES {
        return Err(CompileErrorKind::TooManyUpvalues);
    }
    state.upvalues.push(desc);
    Ok((state.upvalues.len() - 1) as u8)
}

/// 递归解析 upvalue：`level` 是函数状态栈中当前函数的位置
pub fn resolve_upvalue(
    states: &mut [FunctionState],
    level: usize,
    name: &str,
) -> Result<Option<u8>, CompileErrorKind> {
    if level == 0 {
        return Ok(None);
    }
    let parent = level - 1;

    // 1. 外层函数的局部变量（一定已装箱）
    if let Some((slot, boxed)) = resolve_local(&states[parent], name) {
        if boxed {
            return add_upvalue(&mut states[level], true, slot).map(Some);
        }
        return Ok(None);
    }

    // 2. 外层函数自己的 upvalue
    match resolve_upvalue(states, parent, name)? {
        Some(index) => add_upvalue(&mut states[level], false, index).map(Some),
        None => Ok(None),
    }
}

/// 统一变量解析：Local 或 Upvalue
pub fn resolve_variable(
    states: &mut [FunctionState],
    name: &str,
) -> Result<Option<Variable>, CompileErrorKind> {
    let level = states.len() - 1;
    if let Some((slot, boxed)) = resolve_local(&states[level], name) {
        return Ok(Some(Variable::Local { slot, boxed }));
    }
    Ok(resolve_upvalue(states, level, name)?.map(Variable::Upvalue))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parser::Pos;
    use crate::runtime::compiler::context::FunctionType;

    fn state(kind: FunctionType, boxed: bool) -> FunctionState {
        FunctionState::new("f", kind, Pos::default(), boxed, false)
    }

    #[test]
    fn test_add_and_resolve_local() {
        let mut s = state(FunctionType::Function, false);
        let slot = add_local(&mut s, "x").unwrap();
        assert_eq!(slot, 1);
        assert_eq!(resolve_local(&s, "x"), None);
        mark_initialized(&mut s, false);
        assert_eq!(resolve_local(&s, "x"), Some((1, false)));
    }

    #[test]
    fn test_duplicate_in_same_scope() {
        let mut s = state(FunctionType::Function, false);
        add_local(&mut s, "x").unwrap();
        mark_initialized(&mut s, false);
        assert_eq!(
            add_local(&mut s, "x"),
            Err(CompileErrorKind::VariableAlreadyExists("x".to_string()))
        );
        begin_scope(&mut s);
        assert!(add_local(&mut s, "x").is_ok());
    }

    #[test]
    fn test_end_scope_pops_inner_locals() {
        let mut s = state(FunctionType::Function, false);
        begin_scope(&mut s);
        add_local(&mut s, "a").unwrap();
        add_local(&mut s, "b").unwrap();
        assert_eq!(locals_above(&s, 1), 2);
        assert_eq!(end_scope(&mut s), 2);
        assert_eq!(s.locals.len(), 1);
    }

    #[test]
    fn test_self_resolves_only_in_methods() {
        let method = state(FunctionType::Method, false);
        assert_eq!(resolve_local(&method, "self"), Some((0, false)));
        let func = state(FunctionType::Function, false);
        assert_eq!(resolve_local(&func, "self"), None);
    }

    #[test]
    fn test_upvalue_chain() {
        let mut outer = state(FunctionType::Function, true);
        add_local(&mut outer, "x").unwrap();
        mark_initialized(&mut outer, true);
        let middle = state(FunctionType::Function, true);
        let inner = state(FunctionType::Function, false);
        let mut states = vec![outer, middle, inner];

        let var = resolve_variable(&mut states, "x").unwrap();
        assert_eq!(var, Some(Variable::Upvalue(0)));
        assert_eq!(
            states[1].upvalues,
            vec![UpvalueDesc { from_parent_local: true, index: 1 }]
        );
        assert_eq!(
            states[2].upvalues,
            vec![UpvalueDesc { from_parent_local: false, index: 0 }]
        );
    }

    #[test]
    fn test_too_many_locals() {
        let mut s = state(FunctionType::Function, false);
        for i in 0..255 {
            add_local(&mut s, &format!("v{i}")).unwrap();
        }
        assert_eq!(add_local(&mut s, "overflow"), Err(CompileErrorKind::TooManyLocals));
    }
}
