use super::super::lexer::token_kind::OrbitTokenKind;
use super::error::{ErrorLocation, ParseResult, ParserError, ParserErrorKind};
use super::expr::{BinaryOp, Expr, ExprKind, FuncDecl, UnaryOp};
use super::stmt::{ClassDecl, ClassVar, ExternKind, Module, Pos, Stmt, StmtKind};
use super::utils::get_precedence;
use crate::kit::lexer::{Lexer, Token};
use std::rc::Rc;
use tracing::debug;

/// 参数/实参数量上限
const MAX_ARITY: usize = 255;

/// 词法 + 语法分析一个源文件
pub fn parse(source: &str, file_id: u32) -> ParseResult<Module> {
    let tokens = Lexer::new(source)
        .tokenize()
        .map_err(|e| ParserError::from_lex(&e, file_id))?;
    debug!(target: "orbit::parser", file_id, tokens = tokens.len(), "Parsing source");
    Parser::new(tokens, file_id).parse()
}

pub struct Parser {
    tokens: Vec<Token<OrbitTokenKind>>,
    current: usize,
    file_id: u32,
    /// 当前嵌套深度（0 表示顶层）
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token<OrbitTokenKind>>, file_id: u32) -> Self {
        Self {
            tokens,
            current: 0,
            file_id,
            depth: 0,
        }
    }

    /// 解析整个模块
    pub fn parse(&mut self) -> ParseResult<Module> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if self.match_token(OrbitTokenKind::Semicolon) {
                continue;
            }
            statements.push(self.parse_declaration()?);
        }
        Ok(Module { statements })
    }

    // ==================== token 工具 ====================

    fn peek_token(&self) -> Option<&Token<OrbitTokenKind>> {
        self.tokens.get(self.current)
    }

    fn peek_kind(&self, offset: usize) -> Option<OrbitTokenKind> {
        self.tokens.get(self.current + offset).map(|t| t.kind)
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }

    /// 消费当前token并返回它
    fn advance(&mut self) -> Option<Token<OrbitTokenKind>> {
        let token = self.tokens.get(self.current).cloned();
        if token.is_some() {
            self.current += 1;
        }
        token
    }

    /// 检查当前token是否为指定类型
    fn check(&self, kind: OrbitTokenKind) -> bool {
        self.peek_kind(0) == Some(kind)
    }

    /// 匹配并消费指定类型的token
    fn match_token(&mut self, kind: OrbitTokenKind) -> bool {
        if self.check(kind) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    /// 当前token的位置（文件末尾时取最后一个 token）
    fn current_pos(&self) -> Pos {
        let token = self
            .tokens
            .get(self.current)
            .or_else(|| self.tokens.last());
        match token {
            Some(t) => self.pos_of(t),
            None => Pos {
                file_id: self.file_id,
                line: 1,
                column: 1,
            },
        }
    }

    fn pos_of(&self, token: &Token<OrbitTokenKind>) -> Pos {
        Pos {
            file_id: self.file_id,
            line: token.span.start.line as u32,
            column: token.span.start.column as u32,
        }
    }

    /// 创建“期望 X”错误
    fn error_expected(&self, expected: &str) -> ParserError {
        match self.peek_token() {
            Some(token) => {
                let found = match &token.text {
                    Some(text) if token.kind != OrbitTokenKind::LiteralString => text.clone(),
                    _ => token.kind.to_string(),
                };
                ParserError::at(
                    ParserErrorKind::UnexpectedToken {
                        found,
                        expected: expected.to_string(),
                    },
                    self.pos_of(token),
                )
            }
            None => ParserError {
                kind: ParserErrorKind::UnexpectedEndOfInput {
                    expected: expected.to_string(),
                },
                location: ErrorLocation::Eof {
                    file_id: self.file_id,
                },
            },
        }
    }

    /// 期望并消费指定类型的token，否则返回错误
    fn expect(&mut self, kind: OrbitTokenKind) -> ParseResult<Token<OrbitTokenKind>> {
        if self.check(kind) {
            self.advance()
                .ok_or_else(|| self.error_expected(&format!("'{kind}'")))
        } else {
            Err(self.error_expected(&format!("'{kind}'")))
        }
    }

    /// 期望一个标识符，返回其名称
    fn expect_identifier(&mut self) -> ParseResult<String> {
        if self.check(OrbitTokenKind::Identifier) {
            if let Some(token) = self.advance() {
                return Ok(token.text.unwrap_or_default());
            }
        }
        Err(self.error_expected("identifier"))
    }

    fn top_level_only(&self, what: &'static str) -> ParseResult<()> {
        if self.depth > 0 {
            Err(ParserError::at(
                ParserErrorKind::TopLevelOnly(what),
                self.current_pos(),
            ))
        } else {
            Ok(())
        }
    }

    // ==================== 声明 ====================

    fn parse_declaration(&mut self) -> ParseResult<Stmt> {
        let pos = self.current_pos();
        let stmt = match self.peek_kind(0) {
            Some(OrbitTokenKind::Var) => self.parse_var_declaration()?,
            Some(OrbitTokenKind::Func) if self.peek_kind(1) == Some(OrbitTokenKind::Identifier) => {
                self.advance();
                let decl = self.parse_function_rest(pos)?;
                Stmt::new(StmtKind::FuncDecl(Rc::new(decl)), pos)
            }
            Some(OrbitTokenKind::Class) => {
                self.top_level_only("class declaration")?;
                self.parse_class()?
            }
            Some(OrbitTokenKind::Extern) => {
                self.top_level_only("extern declaration")?;
                self.parse_extern()?
            }
            Some(OrbitTokenKind::Include) => {
                self.top_level_only("include")?;
                self.advance();
                let token = self.expect(OrbitTokenKind::LiteralString)?;
                Stmt::new(StmtKind::Include(token.text.unwrap_or_default()), pos)
            }
            _ => return self.parse_statement(),
        };
        self.match_token(OrbitTokenKind::Semicolon);
        Ok(stmt)
    }

    /// var name (= expr)?
    fn parse_var_declaration(&mut self) -> ParseResult<Stmt> {
        let pos = self.current_pos();
        self.expect(OrbitTokenKind::Var)?;
        let name = self.expect_identifier()?;
        let initializer = if self.match_token(OrbitTokenKind::Equal) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Stmt::new(StmtKind::VarDecl { name, initializer }, pos))
    }

    /// 解析 `func` 之后的部分：name(params) { body }
    fn parse_function_rest(&mut self, pos: Pos) -> ParseResult<FuncDecl> {
        let name = self.expect_identifier()?;
        self.parse_function_body(name, pos)
    }

    /// (params) { body }
    fn parse_function_body(&mut self, name: String, pos: Pos) -> ParseResult<FuncDecl> {
        self.expect(OrbitTokenKind::LeftParenthesis)?;
        let mut params = Vec::new();
        if !self.check(OrbitTokenKind::RightParenthesis) {
            loop {
                if params.len() >= MAX_ARITY {
                    return Err(ParserError::at(
                        ParserErrorKind::TooMany("parameters"),
                        self.current_pos(),
                    ));
                }
                params.push(self.expect_identifier()?);
                if !self.match_token(OrbitTokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(OrbitTokenKind::RightParenthesis)?;

        self.depth += 1;
        let body = self.parse_block_statements();
        self.depth -= 1;

        Ok(FuncDecl {
            name,
            params,
            body: body?,
            pos,
        })
    }

    /// class Name (: Super)? { var ...; func ...(){} }
    fn parse_class(&mut self) -> ParseResult<Stmt> {
        let pos = self.current_pos();
        self.expect(OrbitTokenKind::Class)?;
        let name = self.expect_identifier()?;
        let superclass = if self.match_token(OrbitTokenKind::Colon) {
            Some(self.expect_identifier()?)
        } else {
            None
        };

        self.expect(OrbitTokenKind::LeftCurlyBrace)?;
        let mut vars = Vec::new();
        let mut methods = Vec::new();
        while !self.check(OrbitTokenKind::RightCurlyBrace) {
            let member_pos = self.current_pos();
            match self.peek_kind(0) {
                Some(OrbitTokenKind::Semicolon) => {
                    self.advance();
                }
                Some(OrbitTokenKind::Var) => {
                    self.advance();
                    let var_name = self.expect_identifier()?;
                    let initializer = if self.match_token(OrbitTokenKind::Equal) {
                        self.depth += 1;
                        let init = self.parse_expression();
                        self.depth -= 1;
                        Some(init?)
                    } else {
                        None
                    };
                    vars.push(ClassVar {
                        name: var_name,
                        initializer,
                        pos: member_pos,
                    });
                }
                Some(OrbitTokenKind::Func) => {
                    self.advance();
                    methods.push(Rc::new(self.parse_function_rest(member_pos)?));
                }
                _ => return Err(self.error_expected("'var', 'func' or '}' in class body")),
            }
        }
        self.expect(OrbitTokenKind::RightCurlyBrace)?;

        Ok(Stmt::new(
            StmtKind::ClassDecl(Rc::new(ClassDecl {
                name,
                superclass,
                vars,
                methods,
                pos,
            })),
            pos,
        ))
    }

    /// extern var|func|class name
    fn parse_extern(&mut self) -> ParseResult<Stmt> {
        let pos = self.current_pos();
        self.expect(OrbitTokenKind::Extern)?;
        let kind = match self.peek_kind(0) {
            Some(OrbitTokenKind::Var) => ExternKind::Var,
            Some(OrbitTokenKind::Func) => ExternKind::Func,
            Some(OrbitTokenKind::Class) => ExternKind::Class,
            _ => return Err(self.error_expected("'var', 'func' or 'class'")),
        };
        self.advance();
        let name = self.expect_identifier()?;
        Ok(Stmt::new(StmtKind::Extern { name, kind }, pos))
    }

    // ==================== 语句 ====================

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let pos = self.current_pos();
        let kind = match self.peek_kind(0) {
            Some(OrbitTokenKind::LeftCurlyBrace) => {
                self.depth += 1;
                let statements = self.parse_block_statements();
                self.depth -= 1;
                StmtKind::Block(statements?)
            }
            Some(OrbitTokenKind::Semicolon) => {
                self.advance();
                return Ok(Stmt::new(StmtKind::Empty, pos));
            }
            Some(OrbitTokenKind::If) => self.parse_if()?,
            Some(OrbitTokenKind::While) => {
                self.advance();
                self.expect(OrbitTokenKind::LeftParenthesis)?;
                let condition = self.parse_expression()?;
                self.expect(OrbitTokenKind::RightParenthesis)?;
                let body = Box::new(self.parse_nested_statement()?);
                StmtKind::While { condition, body }
            }
            Some(OrbitTokenKind::For) => {
                self.advance();
                self.expect(OrbitTokenKind::LeftParenthesis)?;
                self.match_token(OrbitTokenKind::Var);
                let variable = self.expect_identifier()?;
                self.expect(OrbitTokenKind::In)?;
                let iterable = self.parse_expression()?;
                self.expect(OrbitTokenKind::RightParenthesis)?;
                let body = Box::new(self.parse_nested_statement()?);
                StmtKind::For {
                    variable,
                    iterable,
                    body,
                }
            }
            Some(OrbitTokenKind::Return) => {
                self.advance();
                let value = match self.peek_kind(0) {
                    None
                    | Some(OrbitTokenKind::Semicolon)
                    | Some(OrbitTokenKind::RightCurlyBrace) => None,
                    _ => Some(self.parse_expression()?),
                };
                StmtKind::Return(value)
            }
            Some(OrbitTokenKind::Break) => {
                self.advance();
                StmtKind::Break
            }
            Some(OrbitTokenKind::Continue) => {
                self.advance();
                StmtKind::Continue
            }
            Some(OrbitTokenKind::Throw) => {
                self.advance();
                StmtKind::Throw(self.parse_expression()?)
            }
            _ => StmtKind::Expr(self.parse_expression()?),
        };
        self.match_token(OrbitTokenKind::Semicolon);
        Ok(Stmt::new(kind, pos))
    }

    /// 控制流语句的主体（增加嵌套深度）
    fn parse_nested_statement(&mut self) -> ParseResult<Stmt> {
        self.depth += 1;
        let stmt = self.parse_declaration();
        self.depth -= 1;
        stmt
    }

    /// if (cond) stmt (else stmt)?
    fn parse_if(&mut self) -> ParseResult<StmtKind> {
        self.expect(OrbitTokenKind::If)?;
        self.expect(OrbitTokenKind::LeftParenthesis)?;
        let condition = self.parse_expression()?;
        self.expect(OrbitTokenKind::RightParenthesis)?;
        let then_branch = Box::new(self.parse_nested_statement()?);
        let else_branch = if self.match_token(OrbitTokenKind::Else) {
            Some(Box::new(self.parse_nested_statement()?))
        } else {
            None
        };
        Ok(StmtKind::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    /// { declaration* }
    fn parse_block_statements(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(OrbitTokenKind::LeftCurlyBrace)?;
        let mut statements = Vec::new();
        while !self.check(OrbitTokenKind::RightCurlyBrace) {
            if self.is_at_end() {
                return Err(self.error_expected("'}'"));
            }
            if self.match_token(OrbitTokenKind::Semicolon) {
                continue;
            }
            statements.push(self.parse_declaration()?);
        }
        self.expect(OrbitTokenKind::RightCurlyBrace)?;
        Ok(statements)
    }

    // ==================== 表达式 ====================

    /// 解析表达式（赋值优先级最低，右结合）
    pub fn parse_expression(&mut self) -> ParseResult<Expr> {
        let target = self.parse_binary(0)?;
        if self.check(OrbitTokenKind::Equal) {
            let pos = self.current_pos();
            self.advance();
            if !target.is_assignable() {
                return Err(ParserError::at(
                    ParserErrorKind::InvalidAssignmentTarget,
                    pos,
                ));
            }
            let value = self.parse_expression()?;
            let target_pos = target.pos;
            return Ok(Expr::new(
                ExprKind::Assign {
                    target: Box::new(target),
                    value: Box::new(value),
                },
                target_pos,
            ));
        }
        Ok(target)
    }

    /// Pratt 解析二元运算（左结合）
    fn parse_binary(&mut self, min_precedence: i32) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;

        while let Some(kind) = self.peek_kind(0) {
            let precedence = get_precedence(kind);
            if precedence <= min_precedence {
                break;
            }
            let pos = self.current_pos();
            self.advance();
            let right = Box::new(self.parse_binary(precedence)?);
            let left_box = Box::new(left);

            let expr_kind = match kind {
                OrbitTokenKind::AndAnd | OrbitTokenKind::OrOr => ExprKind::Logical {
                    left: left_box,
                    and: kind == OrbitTokenKind::AndAnd,
                    right,
                },
                OrbitTokenKind::DotDotDot | OrbitTokenKind::DotDotLess => ExprKind::Range {
                    from: left_box,
                    to: right,
                    inclusive: kind == OrbitTokenKind::DotDotDot,
                },
                _ => ExprKind::Binary {
                    left: left_box,
                    op: binary_op(kind).ok_or_else(|| self.error_expected("operator"))?,
                    right,
                },
            };
            left = Expr::new(expr_kind, pos);
        }

        Ok(left)
    }

    /// 解析一元表达式
    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let pos = self.current_pos();
        let op = match self.peek_kind(0) {
            Some(OrbitTokenKind::Minus) => UnaryOp::Neg,
            Some(OrbitTokenKind::Exclamation) => UnaryOp::Not,
            _ => {
                let primary = self.parse_primary()?;
                return self.parse_postfix(primary);
            }
        };
        self.advance();
        let operand = Box::new(self.parse_unary()?);
        Ok(Expr::new(ExprKind::Unary { op, operand }, pos))
    }

    /// 后缀：调用、成员访问、索引
    fn parse_postfix(&mut self, mut expr: Expr) -> ParseResult<Expr> {
        loop {
            let pos = self.current_pos();
            if self.match_token(OrbitTokenKind::LeftParenthesis) {
                let arguments = self.parse_arguments(OrbitTokenKind::RightParenthesis)?;
                expr = Expr::new(
                    ExprKind::Call {
                        callee: Box::new(expr),
                        arguments,
                    },
                    pos,
                );
            } else if self.match_token(OrbitTokenKind::Dot) {
                let member = self.expect_identifier()?;
                expr = Expr::new(
                    ExprKind::Member {
                        object: Box::new(expr),
                        member,
                    },
                    pos,
                );
            } else if self.match_token(OrbitTokenKind::LeftSquareBracket) {
                let index = self.parse_expression()?;
                self.expect(OrbitTokenKind::RightSquareBracket)?;
                expr = Expr::new(
                    ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    pos,
                );
            } else {
                return Ok(expr);
            }
        }
    }

    /// 逗号分隔的表达式列表，消费结尾的 `close`
    fn parse_arguments(&mut self, close: OrbitTokenKind) -> ParseResult<Vec<Expr>> {
        let mut arguments = Vec::new();
        while !self.check(close) {
            if arguments.len() >= MAX_ARITY {
                return Err(ParserError::at(
                    ParserErrorKind::TooMany("arguments"),
                    self.current_pos(),
                ));
            }
            arguments.push(self.parse_expression()?);
            if !self.match_token(OrbitTokenKind::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Ok(arguments)
    }

    /// 解析基础表达式
    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let pos = self.current_pos();
        let Some(token) = self.peek_token().cloned() else {
            return Err(self.error_expected("expression"));
        };

        let kind = match token.kind {
            OrbitTokenKind::LiteralInteger => {
                self.advance();
                let text = token.text.unwrap_or_default();
                let value = text
                    .parse::<i64>()
                    .map_err(|_| ParserError::at(ParserErrorKind::InvalidNumberFormat(text), pos))?;
                ExprKind::LiteralInt(value)
            }
            OrbitTokenKind::LiteralFloat => {
                self.advance();
                let text = token.text.unwrap_or_default();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| ParserError::at(ParserErrorKind::InvalidNumberFormat(text), pos))?;
                ExprKind::LiteralFloat(value)
            }
            OrbitTokenKind::LiteralString => {
                self.advance();
                ExprKind::LiteralString(token.text.unwrap_or_default())
            }
            OrbitTokenKind::True => {
                self.advance();
                ExprKind::LiteralTrue
            }
            OrbitTokenKind::False => {
                self.advance();
                ExprKind::LiteralFalse
            }
            OrbitTokenKind::Null => {
                self.advance();
                ExprKind::LiteralNull
            }
            OrbitTokenKind::SelfKw => {
                self.advance();
                ExprKind::SelfRef
            }
            OrbitTokenKind::Identifier => {
                self.advance();
                ExprKind::VarRef(token.text.unwrap_or_default())
            }
            OrbitTokenKind::LeftParenthesis => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(OrbitTokenKind::RightParenthesis)?;
                return Ok(inner);
            }
            OrbitTokenKind::LeftSquareBracket => {
                self.advance();
                self.parse_collection()?
            }
            OrbitTokenKind::Func => {
                self.advance();
                self.depth += 1;
                let decl = self.parse_function_body(String::new(), pos);
                self.depth -= 1;
                ExprKind::Lambda(Rc::new(decl?))
            }
            _ => return Err(self.error_expected("expression")),
        };
        Ok(Expr::new(kind, pos))
    }

    /// `[` 之后：列表 `[a, b]`、map `["k": v]` 或空 map `[:]`
    fn parse_collection(&mut self) -> ParseResult<ExprKind> {
        if self.match_token(OrbitTokenKind::RightSquareBracket) {
            return Ok(ExprKind::LiteralList(Vec::new()));
        }
        if self.check(OrbitTokenKind::Colon)
            && self.peek_kind(1) == Some(OrbitTokenKind::RightSquareBracket)
        {
            self.advance();
            self.advance();
            return Ok(ExprKind::LiteralMap(Vec::new()));
        }

        let first = self.parse_expression()?;
        if !self.match_token(OrbitTokenKind::Colon) {
            let mut elements = vec![first];
            if self.match_token(OrbitTokenKind::Comma) {
                elements.extend(self.parse_arguments(OrbitTokenKind::RightSquareBracket)?);
            } else {
                self.expect(OrbitTokenKind::RightSquareBracket)?;
            }
            return Ok(ExprKind::LiteralList(elements));
        }

        let mut entries = vec![(first, self.parse_expression()?)];
        while self.match_token(OrbitTokenKind::Comma) {
            if self.check(OrbitTokenKind::RightSquareBracket) {
                break;
            }
            let key = self.parse_expression()?;
            self.expect(OrbitTokenKind::Colon)?;
            let value = self.parse_expression()?;
            entries.push((key, value));
        }
        self.expect(OrbitTokenKind::RightSquareBracket)?;
        Ok(ExprKind::LiteralMap(entries))
    }
}

fn binary_op(kind: OrbitTokenKind) -> Option<BinaryOp> {
    use OrbitTokenKind::*;
    Some(match kind {
        Plus => BinaryOp::Add,
        Minus => BinaryOp::Sub,
        Asterisk => BinaryOp::Mul,
        Slash => BinaryOp::Div,
        Percent => BinaryOp::Mod,
        DoubleEqual => BinaryOp::Equal,
        ExclamationEqual => BinaryOp::NotEqual,
        LessThan => BinaryOp::Less,
        LessThanEqual => BinaryOp::LessEqual,
        GreaterThan => BinaryOp::Greater,
        GreaterThanEqual => BinaryOp::GreaterEqual,
        _ => return None,
    })
}
