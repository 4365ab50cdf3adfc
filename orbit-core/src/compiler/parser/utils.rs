use crate::compiler::lexer::token_kind::OrbitTokenKind;

/// 运算符优先级（数值越大结合越紧），非二元运算符返回 0
///
/// 赋值 < || < && < 相等 < 比较 < 区间 < 加减 < 乘除
pub fn get_precedence(kind: OrbitTokenKind) -> i32 {
    use OrbitTokenKind::*;
    match kind {
        OrOr => 10,
        AndAnd => 20,
        DoubleEqual | ExclamationEqual => 30,
        LessThan | LessThanEqual | GreaterThan | GreaterThanEqual => 40,
        DotDotDot | DotDotLess => 50,
        Plus | Minus => 60,
        Asterisk | Slash | Percent => 70,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_order() {
        use OrbitTokenKind::*;
        assert!(get_precedence(Asterisk) > get_precedence(Plus));
        assert!(get_precedence(Plus) > get_precedence(DotDotDot));
        assert!(get_precedence(DotDotDot) > get_precedence(LessThan));
        assert!(get_precedence(AndAnd) > get_precedence(OrOr));
        assert_eq!(get_precedence(Equal), 0);
    }
}
