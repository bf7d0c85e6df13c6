use ember_common::{LineIndex, Span};
use ember_lexer::{Lexer, Token, TokenKind};

use crate::ast::*;
use crate::error::ParseError;
use crate::type_spec::TypeSpec;

/// Recursive-descent parser with Pratt-style expression parsing. Produces
/// a plain owned `Program`; there is no lossless CST here — the grammar
/// is small enough that a classic hand-rolled parser is the right tool,
/// matching the spec's framing of parsing as a thin collaborator rather
/// than a core component.
pub struct Parser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
    ids: NodeIdGen,
    lines: LineIndex,
    _src: &'src str,
}

pub fn parse(src: &str) -> (Program, Vec<ParseError>) {
    let (tokens, lex_errors) = Lexer::new(src).tokenize();
    let mut parser = Parser {
        tokens,
        pos: 0,
        errors: lex_errors
            .into_iter()
            .map(|e| ParseError::new(e.to_string(), e.span))
            .collect(),
        ids: NodeIdGen::default(),
        lines: LineIndex::new(src),
        _src: src,
    };
    let program = parser.parse_program();
    (program, parser.errors)
}

impl<'src> Parser<'src> {
    fn parse_program(&mut self) -> Program {
        let mut stmts = Vec::new();
        while !self.at(TokenKind::Eof) {
            match self.parse_top_level_stmt() {
                Some(s) => stmts.push(s),
                None => {
                    self.bump(); // skip one token and retry, for recovery
                }
            }
        }
        Program { stmts }
    }

    // ---- statements ---------------------------------------------------

    fn parse_top_level_stmt(&mut self) -> Option<StmtNode> {
        self.parse_stmt()
    }

    fn parse_stmt(&mut self) -> Option<StmtNode> {
        let line = self.current_line();
        let id = self.ids.next();
        let kind = match self.peek_kind() {
            TokenKind::KwLet => self.parse_decl(true)?,
            TokenKind::KwVar => self.parse_decl(false)?,
            TokenKind::KwFunc => StmtKind::FuncDef(self.parse_func_def()?),
            TokenKind::KwStruct => StmtKind::TypeDef(self.parse_type_def(false)?),
            TokenKind::KwClass => StmtKind::TypeDef(self.parse_type_def(true)?),
            TokenKind::KwExtern => StmtKind::ExternBlock(self.parse_extern_block()?),
            TokenKind::KwBreak => {
                self.bump();
                let value = self.parse_optional_trailing_expr();
                self.eat_semi();
                StmtKind::Break(value)
            }
            TokenKind::KwContinue => {
                self.bump();
                let value = self.parse_optional_trailing_expr();
                self.eat_semi();
                StmtKind::Continue(value)
            }
            TokenKind::KwReturn => {
                self.bump();
                let value = self.parse_optional_trailing_expr();
                self.eat_semi();
                StmtKind::Return(value)
            }
            _ => {
                let expr = self.parse_expr()?;
                self.eat_semi();
                StmtKind::Expr(expr)
            }
        };
        Some(StmtNode { id, line, kind })
    }

    /// `break`/`continue`/`return` may optionally carry a value unless the
    /// statement terminator (`;` or `}`) follows immediately.
    fn parse_optional_trailing_expr(&mut self) -> Option<ExprNode> {
        if self.at(TokenKind::Semicolon) || self.at(TokenKind::RBrace) || self.at(TokenKind::Eof) {
            None
        } else {
            self.parse_expr()
        }
    }

    fn eat_semi(&mut self) {
        if self.at(TokenKind::Semicolon) {
            self.bump();
        }
    }

    fn parse_decl(&mut self, is_const: bool) -> Option<StmtKind> {
        self.bump(); // let/var
        let name = self.expect_ident()?;
        let type_spec = if self.at(TokenKind::Colon) {
            self.bump();
            Some(self.parse_type_spec()?)
        } else {
            None
        };
        let value = if self.at(TokenKind::Eq) {
            self.bump();
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.eat_semi();
        Some(StmtKind::Decl {
            name,
            is_const,
            type_spec,
            value,
        })
    }

    fn parse_func_def(&mut self) -> Option<FuncDef> {
        self.bump(); // func
        let name = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.at(TokenKind::RParen) {
            let pname = self.expect_ident()?;
            self.expect(TokenKind::Colon)?;
            let type_spec = self.parse_type_spec()?;
            params.push(Param {
                name: pname,
                type_spec,
            });
            if self.at(TokenKind::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        let return_type = if self.at(TokenKind::Colon) {
            self.bump();
            Some(self.parse_type_spec()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        Some(FuncDef {
            name,
            params,
            return_type,
            body,
        })
    }

    fn parse_type_def(&mut self, is_class: bool) -> Option<TypeDef> {
        self.bump(); // struct/class
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.at(TokenKind::RBrace) {
            let is_weak = if self.at(TokenKind::KwWeak) {
                self.bump();
                true
            } else {
                false
            };
            // `var`/`let` optionally precede a class field to mark mutability;
            // bare fields in a struct default to mutable, non-const.
            let is_const = if self.at(TokenKind::KwLet) {
                self.bump();
                true
            } else {
                if self.at(TokenKind::KwVar) {
                    self.bump();
                }
                false
            };
            let fname = self.expect_ident()?;
            let type_spec = if self.at(TokenKind::Colon) {
                self.bump();
                Some(self.parse_type_spec()?)
            } else {
                None
            };
            let default = if self.at(TokenKind::Eq) {
                self.bump();
                Some(self.parse_expr()?)
            } else {
                None
            };
            self.eat_semi();
            if self.at(TokenKind::Comma) {
                self.bump();
            }
            fields.push(StructFieldDef {
                name: fname,
                type_spec,
                is_const,
                is_weak,
                default,
            });
        }
        self.expect(TokenKind::RBrace)?;
        Some(TypeDef {
            name,
            is_class,
            fields,
        })
    }

    fn parse_extern_block(&mut self) -> Option<Vec<ExternItem>> {
        self.bump(); // extern
        self.expect(TokenKind::LBrace)?;
        let mut items = Vec::new();
        while !self.at(TokenKind::RBrace) {
            match self.peek_kind() {
                TokenKind::KwFunc => {
                    self.bump();
                    let name = self.expect_ident()?;
                    self.expect(TokenKind::LParen)?;
                    let mut params = Vec::new();
                    while !self.at(TokenKind::RParen) {
                        let pname = self.expect_ident()?;
                        self.expect(TokenKind::Colon)?;
                        let type_spec = self.parse_type_spec()?;
                        params.push(Param {
                            name: pname,
                            type_spec,
                        });
                        if self.at(TokenKind::Comma) {
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                    let return_type = if self.at(TokenKind::Colon) {
                        self.bump();
                        Some(self.parse_type_spec()?)
                    } else {
                        None
                    };
                    self.eat_semi();
                    items.push(ExternItem::Func {
                        name,
                        params,
                        return_type,
                    });
                }
                TokenKind::KwVar | TokenKind::KwLet => {
                    let is_let = self.at(TokenKind::KwLet);
                    self.bump();
                    let name = self.expect_ident()?;
                    self.expect(TokenKind::Colon)?;
                    let type_spec = self.parse_type_spec()?;
                    self.eat_semi();
                    items.push(if is_let {
                        ExternItem::Let { name, type_spec }
                    } else {
                        ExternItem::Var { name, type_spec }
                    });
                }
                _ => {
                    self.error_here("expected 'func', 'var', or 'let' in extern block");
                    self.bump();
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        Some(items)
    }

    fn parse_block(&mut self) -> Option<Block> {
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            if let Some(mut stmt) = self.parse_stmt() {
                // A trailing bare if/while/for with no following statement
                // is the block's value; mark it value-form (open question a).
                if self.at(TokenKind::RBrace) {
                    if let StmtKind::Expr(expr) = &mut stmt.kind {
                        mark_value_form(expr);
                    }
                }
                stmts.push(stmt);
            }
        }
        self.expect(TokenKind::RBrace)?;
        Some(Block { stmts })
    }

    // ---- expressions (Pratt) ------------------------------------------

    fn parse_expr(&mut self) -> Option<ExprNode> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Option<ExprNode> {
        let line = self.current_line();
        let lhs = self.parse_or()?;
        let compound_op = match self.peek_kind() {
            TokenKind::Eq => None,
            TokenKind::PlusEq => Some(BinOpKind::Add),
            TokenKind::MinusEq => Some(BinOpKind::Sub),
            TokenKind::StarEq => Some(BinOpKind::Mul),
            TokenKind::SlashEq => Some(BinOpKind::Div),
            TokenKind::PercentEq => Some(BinOpKind::Rem),
            _ => return Some(lhs),
        };
        self.bump();
        let rhs = self.parse_assignment()?;
        let id = self.ids.next();
        let kind = match compound_op {
            None => ExprKind::Assign {
                target: Box::new(lhs),
                value: Box::new(rhs),
            },
            Some(op) => ExprKind::CompoundAssign {
                op,
                target: Box::new(lhs),
                value: Box::new(rhs),
            },
        };
        Some(ExprNode { id, line, kind })
    }

    fn parse_or(&mut self) -> Option<ExprNode> {
        self.parse_binop_level(Self::parse_and, &[(TokenKind::OrOr, BinOpKind::Or)])
    }

    fn parse_and(&mut self) -> Option<ExprNode> {
        self.parse_binop_level(Self::parse_equality, &[(TokenKind::AndAnd, BinOpKind::And)])
    }

    fn parse_equality(&mut self) -> Option<ExprNode> {
        self.parse_binop_level(
            Self::parse_comparison,
            &[
                (TokenKind::EqEq, BinOpKind::Eq),
                (TokenKind::NotEq, BinOpKind::NotEq),
            ],
        )
    }

    fn parse_comparison(&mut self) -> Option<ExprNode> {
        self.parse_binop_level(
            Self::parse_additive,
            &[
                (TokenKind::Lt, BinOpKind::Lt),
                (TokenKind::Gt, BinOpKind::Gt),
                (TokenKind::LtEq, BinOpKind::LtEq),
                (TokenKind::GtEq, BinOpKind::GtEq),
            ],
        )
    }

    fn parse_additive(&mut self) -> Option<ExprNode> {
        self.parse_binop_level(
            Self::parse_multiplicative,
            &[
                (TokenKind::Plus, BinOpKind::Add),
                (TokenKind::Minus, BinOpKind::Sub),
            ],
        )
    }

    fn parse_multiplicative(&mut self) -> Option<ExprNode> {
        self.parse_binop_level(
            Self::parse_unary,
            &[
                (TokenKind::Star, BinOpKind::Mul),
                (TokenKind::Slash, BinOpKind::Div),
                (TokenKind::Percent, BinOpKind::Rem),
            ],
        )
    }

    fn parse_binop_level(
        &mut self,
        mut next: impl FnMut(&mut Self) -> Option<ExprNode>,
        ops: &[(TokenKind, BinOpKind)],
    ) -> Option<ExprNode> {
        let mut lhs = next(self)?;
        loop {
            let Some((_, op)) = ops.iter().find(|(tk, _)| self.at(tk.clone())) else {
                break;
            };
            let line = lhs.line;
            self.bump();
            let rhs = next(self)?;
            let id = self.ids.next();
            lhs = ExprNode {
                id,
                line,
                kind: ExprKind::Binary {
                    op: *op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            };
        }
        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<ExprNode> {
        let line = self.current_line();
        let op = match self.peek_kind() {
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Plus => Some(UnOp::Pos),
            TokenKind::Bang => Some(UnOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let operand = self.parse_unary()?;
            let id = self.ids.next();
            return Some(ExprNode {
                id,
                line,
                kind: ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
            });
        }
        if matches!(self.peek_kind(), TokenKind::PlusPlus | TokenKind::MinusMinus) {
            let op = if self.at(TokenKind::PlusPlus) {
                IncDecOp::Inc
            } else {
                IncDecOp::Dec
            };
            self.bump();
            let target = self.parse_unary()?;
            let id = self.ids.next();
            return Some(ExprNode {
                id,
                line,
                kind: ExprKind::IncDec {
                    op,
                    prefix: true,
                    target: Box::new(target),
                },
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Option<ExprNode> {
        let mut expr = self.parse_primary()?;
        loop {
            let line = expr.line;
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.bump();
                    let field = self.expect_ident()?;
                    let id = self.ids.next();
                    expr = ExprNode {
                        id,
                        line,
                        kind: ExprKind::FieldAccess {
                            object: Box::new(expr),
                            field,
                        },
                    };
                }
                TokenKind::LBracket => {
                    self.bump();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket)?;
                    let id = self.ids.next();
                    expr = ExprNode {
                        id,
                        line,
                        kind: ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                    };
                }
                TokenKind::Question => {
                    self.bump();
                    let id = self.ids.next();
                    expr = ExprNode {
                        id,
                        line,
                        kind: ExprKind::OptionalCheck {
                            operand: Box::new(expr),
                        },
                    };
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let op = if self.at(TokenKind::PlusPlus) {
                        IncDecOp::Inc
                    } else {
                        IncDecOp::Dec
                    };
                    self.bump();
                    let id = self.ids.next();
                    expr = ExprNode {
                        id,
                        line,
                        kind: ExprKind::IncDec {
                            op,
                            prefix: false,
                            target: Box::new(expr),
                        },
                    };
                }
                _ => break,
            }
        }
        Some(expr)
    }

    fn parse_primary(&mut self) -> Option<ExprNode> {
        let line = self.current_line();
        let id = self.ids.next();
        match self.peek_kind() {
            TokenKind::Int(v) => {
                self.bump();
                Some(ExprNode {
                    id,
                    line,
                    kind: ExprKind::Int(v),
                })
            }
            TokenKind::Float(v) => {
                self.bump();
                Some(ExprNode {
                    id,
                    line,
                    kind: ExprKind::Float(v),
                })
            }
            TokenKind::Str(s) => {
                self.bump();
                Some(ExprNode {
                    id,
                    line,
                    kind: ExprKind::Str(s),
                })
            }
            TokenKind::Char(c) => {
                self.bump();
                Some(ExprNode {
                    id,
                    line,
                    kind: ExprKind::Char(c),
                })
            }
            TokenKind::KwTrue => {
                self.bump();
                Some(ExprNode {
                    id,
                    line,
                    kind: ExprKind::Bool(true),
                })
            }
            TokenKind::KwFalse => {
                self.bump();
                Some(ExprNode {
                    id,
                    line,
                    kind: ExprKind::Bool(false),
                })
            }
            TokenKind::LParen => self.parse_paren_or_tuple(id, line),
            TokenKind::LBrace => self.parse_object_literal(id, line),
            TokenKind::LBracket => self.parse_array_or_hash_literal(id, line),
            TokenKind::KwIf => self.parse_if(true),
            TokenKind::KwWhile => self.parse_while(true),
            TokenKind::KwFor => self.parse_for(true),
            TokenKind::Ident(_) => self.parse_ident_or_call(id, line),
            _ => {
                self.error_here("expected an expression");
                None
            }
        }
    }

    fn parse_ident_or_call(&mut self, id: NodeId, line: u32) -> Option<ExprNode> {
        let name = self.expect_ident()?;
        if self.at(TokenKind::LParen) {
            self.bump();
            let mut args = Vec::new();
            while !self.at(TokenKind::RParen) {
                args.push(self.parse_arg()?);
                if self.at(TokenKind::Comma) {
                    self.bump();
                } else {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
            Some(ExprNode {
                id,
                line,
                kind: ExprKind::Call { callee: name, args },
            })
        } else {
            Some(ExprNode {
                id,
                line,
                kind: ExprKind::Ident(name),
            })
        }
    }

    fn parse_arg(&mut self) -> Option<Arg> {
        // `name: value` named argument vs. a plain positional expression.
        // Disambiguate by look-ahead: Ident followed by Colon is named.
        if let TokenKind::Ident(name) = self.peek_kind() {
            if self.peek_kind_at(1) == TokenKind::Colon {
                self.bump();
                self.bump();
                let value = self.parse_expr()?;
                return Some(Arg {
                    name: Some(name),
                    value,
                });
            }
        }
        let value = self.parse_expr()?;
        Some(Arg { name: None, value })
    }

    fn parse_paren_or_tuple(&mut self, id: NodeId, line: u32) -> Option<ExprNode> {
        self.bump(); // (
        let mut items = Vec::new();
        while !self.at(TokenKind::RParen) {
            items.push(self.parse_expr()?);
            if self.at(TokenKind::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        if items.len() == 1 {
            Some(items.into_iter().next().unwrap())
        } else {
            Some(ExprNode {
                id,
                line,
                kind: ExprKind::Tuple(items),
            })
        }
    }

    fn parse_object_literal(&mut self, id: NodeId, line: u32) -> Option<ExprNode> {
        self.bump(); // {
        let mut fields = Vec::new();
        while !self.at(TokenKind::RBrace) {
            let name = self.expect_ident()?;
            self.expect(TokenKind::Colon)?;
            let value = self.parse_expr()?;
            fields.push((name, value));
            if self.at(TokenKind::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Some(ExprNode {
            id,
            line,
            kind: ExprKind::ObjectLiteral(fields),
        })
    }

    fn parse_array_or_hash_literal(&mut self, id: NodeId, line: u32) -> Option<ExprNode> {
        self.bump(); // [
        if self.at(TokenKind::Colon) {
            // `[:]` empty hash, possibly typed: `[:]:K,V`
            self.bump();
            self.expect(TokenKind::RBracket)?;
            if self.at(TokenKind::Colon) {
                self.bump();
                let key = self.expect_ident()?;
                self.expect(TokenKind::Comma)?;
                let val = self.expect_ident()?;
                return Some(ExprNode {
                    id,
                    line,
                    kind: ExprKind::TypedEmptyHash(key, val),
                });
            }
            return Some(ExprNode {
                id,
                line,
                kind: ExprKind::HashLiteral(Vec::new()),
            });
        }
        if self.at(TokenKind::RBracket) {
            self.bump();
            if self.at(TokenKind::Colon) {
                self.bump();
                let elem = self.expect_ident()?;
                return Some(ExprNode {
                    id,
                    line,
                    kind: ExprKind::TypedEmptyArray(elem),
                });
            }
            return Some(ExprNode {
                id,
                line,
                kind: ExprKind::ArrayLiteral(Vec::new()),
            });
        }
        let first = self.parse_expr()?;
        if self.at(TokenKind::Colon) {
            // hash literal
            self.bump();
            let first_val = self.parse_expr()?;
            let mut pairs = vec![(first, first_val)];
            while self.at(TokenKind::Comma) {
                self.bump();
                if self.at(TokenKind::RBracket) {
                    break;
                }
                let k = self.parse_expr()?;
                self.expect(TokenKind::Colon)?;
                let v = self.parse_expr()?;
                pairs.push((k, v));
            }
            self.expect(TokenKind::RBracket)?;
            return Some(ExprNode {
                id,
                line,
                kind: ExprKind::HashLiteral(pairs),
            });
        }
        let mut items = vec![first];
        while self.at(TokenKind::Comma) {
            self.bump();
            if self.at(TokenKind::RBracket) {
                break;
            }
            items.push(self.parse_expr()?);
        }
        self.expect(TokenKind::RBracket)?;
        Some(ExprNode {
            id,
            line,
            kind: ExprKind::ArrayLiteral(items),
        })
    }

    fn parse_if(&mut self, is_value_form: bool) -> Option<ExprNode> {
        let line = self.current_line();
        let id = self.ids.next();
        self.bump(); // if
        let cond = self.parse_expr()?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.at(TokenKind::KwElse) {
            self.bump();
            if self.at(TokenKind::KwIf) {
                let inner = self.parse_if(is_value_form)?;
                Some(Block {
                    stmts: vec![StmtNode {
                        id: self.ids.next(),
                        line: inner.line,
                        kind: StmtKind::Expr(inner),
                    }],
                })
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Some(ExprNode {
            id,
            line,
            kind: ExprKind::If {
                cond: Box::new(cond),
                then_branch,
                else_branch,
                is_value_form,
            },
        })
    }

    fn parse_while(&mut self, is_value_form: bool) -> Option<ExprNode> {
        let line = self.current_line();
        let id = self.ids.next();
        self.bump(); // while
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Some(ExprNode {
            id,
            line,
            kind: ExprKind::While {
                cond: Box::new(cond),
                body,
                is_value_form,
            },
        })
    }

    fn parse_for(&mut self, is_value_form: bool) -> Option<ExprNode> {
        let line = self.current_line();
        let id = self.ids.next();
        self.bump(); // for
        self.expect(TokenKind::LParen)?;
        let init = if self.at(TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_stmt_inline()?))
        };
        self.expect(TokenKind::Semicolon)?;
        let cond = if self.at(TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        self.expect(TokenKind::Semicolon)?;
        let update = if self.at(TokenKind::RParen) {
            None
        } else {
            let uline = self.current_line();
            let uid = self.ids.next();
            let expr = self.parse_expr()?;
            Some(Box::new(StmtNode {
                id: uid,
                line: uline,
                kind: StmtKind::Expr(expr),
            }))
        };
        self.expect(TokenKind::RParen)?;
        let body = self.parse_block()?;
        Some(ExprNode {
            id,
            line,
            kind: ExprKind::For {
                init,
                cond,
                update,
                body,
                is_value_form,
            },
        })
    }

    /// Parses a single statement without consuming a trailing semicolon
    /// via `eat_semi` twice (used for `for`-loop init clauses).
    fn parse_stmt_inline(&mut self) -> Option<StmtNode> {
        let line = self.current_line();
        let id = self.ids.next();
        let kind = match self.peek_kind() {
            TokenKind::KwLet => self.parse_decl_no_semi(true)?,
            TokenKind::KwVar => self.parse_decl_no_semi(false)?,
            _ => StmtKind::Expr(self.parse_expr()?),
        };
        Some(StmtNode { id, line, kind })
    }

    fn parse_decl_no_semi(&mut self, is_const: bool) -> Option<StmtKind> {
        self.bump();
        let name = self.expect_ident()?;
        let type_spec = if self.at(TokenKind::Colon) {
            self.bump();
            Some(self.parse_type_spec()?)
        } else {
            None
        };
        let value = if self.at(TokenKind::Eq) {
            self.bump();
            Some(self.parse_expr()?)
        } else {
            None
        };
        Some(StmtKind::Decl {
            name,
            is_const,
            type_spec,
            value,
        })
    }

    // ---- type specs -----------------------------------------------------

    fn parse_type_spec(&mut self) -> Option<TypeSpec> {
        let base = match self.peek_kind() {
            TokenKind::KwInt => {
                self.bump();
                TypeSpec::Int
            }
            TokenKind::KwFloat => {
                self.bump();
                TypeSpec::Float
            }
            TokenKind::KwString => {
                self.bump();
                TypeSpec::Str
            }
            TokenKind::KwBool => {
                self.bump();
                TypeSpec::Bool
            }
            TokenKind::KwChar => {
                self.bump();
                TypeSpec::Char
            }
            TokenKind::KwVoid => {
                self.bump();
                TypeSpec::Void
            }
            TokenKind::LBracket => {
                self.bump();
                let first = self.parse_type_spec()?;
                if self.at(TokenKind::Colon) {
                    self.bump();
                    let val = self.parse_type_spec()?;
                    self.expect(TokenKind::RBracket)?;
                    TypeSpec::Hash(Box::new(first), Box::new(val))
                } else {
                    self.expect(TokenKind::RBracket)?;
                    TypeSpec::Array(Box::new(first))
                }
            }
            TokenKind::LParen => {
                self.bump();
                let mut items = Vec::new();
                while !self.at(TokenKind::RParen) {
                    items.push(self.parse_type_spec()?);
                    if self.at(TokenKind::Comma) {
                        self.bump();
                    } else {
                        break;
                    }
                }
                self.expect(TokenKind::RParen)?;
                TypeSpec::Tuple(items)
            }
            TokenKind::LBrace => {
                self.bump();
                let mut fields = Vec::new();
                while !self.at(TokenKind::RBrace) {
                    let name = self.expect_ident()?;
                    self.expect(TokenKind::Colon)?;
                    let ty = self.parse_type_spec()?;
                    fields.push((name, ty));
                    if self.at(TokenKind::Comma) {
                        self.bump();
                    } else {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace)?;
                TypeSpec::Object(fields)
            }
            TokenKind::Ident(_) => {
                let name = self.expect_ident()?;
                TypeSpec::Named(name)
            }
            _ => {
                self.error_here("expected a type");
                return None;
            }
        };
        if self.at(TokenKind::Question) {
            self.bump();
            Some(TypeSpec::Optional(Box::new(base)))
        } else {
            Some(base)
        }
    }

    // ---- token-stream plumbing -----------------------------------------

    fn peek_kind(&self) -> TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| t.kind.clone())
            .unwrap_or(TokenKind::Eof)
    }

    fn peek_kind_at(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| t.kind.clone())
            .unwrap_or(TokenKind::Eof)
    }

    fn current_line(&self) -> u32 {
        let span = self
            .tokens
            .get(self.pos)
            .map(|t| t.span)
            .unwrap_or(Span::new(0, 0));
        self.lines.line_col(span.start).0
    }

    fn at(&self, kind: TokenKind) -> bool {
        std::mem::discriminant(&self.peek_kind()) == std::mem::discriminant(&kind)
    }

    fn bump(&mut self) -> Token {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .unwrap_or(Token::new(TokenKind::Eof, Span::new(0, 0)));
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> Option<()> {
        if self.at(kind.clone()) {
            self.bump();
            Some(())
        } else {
            self.error_here(&format!("expected {kind:?}, found {:?}", self.peek_kind()));
            None
        }
    }

    fn expect_ident(&mut self) -> Option<String> {
        if let TokenKind::Ident(name) = self.peek_kind() {
            self.bump();
            Some(name)
        } else {
            self.error_here(&format!("expected identifier, found {:?}", self.peek_kind()));
            None
        }
    }

    fn error_here(&mut self, message: &str) {
        let span = self
            .tokens
            .get(self.pos)
            .map(|t| t.span)
            .unwrap_or(Span::new(0, 0));
        self.errors.push(ParseError::new(message, span));
    }
}

fn mark_value_form(expr: &mut ExprNode) {
    match &mut expr.kind {
        ExprKind::If { is_value_form, .. } => *is_value_form = true,
        ExprKind::While { is_value_form, .. } => *is_value_form = true,
        ExprKind::For { is_value_form, .. } => *is_value_form = true,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Program {
        let (program, errors) = parse(src);
        assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
        program
    }

    #[test]
    fn parses_let_decl() {
        let program = parse_ok("let x = 1;");
        assert_eq!(program.stmts.len(), 1);
        assert!(matches!(program.stmts[0].kind, StmtKind::Decl { .. }));
    }

    #[test]
    fn parses_string_concat_chain() {
        let program = parse_ok(r#"let s = "a" + 1 + true;"#);
        let StmtKind::Decl { value: Some(expr), .. } = &program.stmts[0].kind else {
            panic!("expected decl");
        };
        assert!(matches!(expr.kind, ExprKind::Binary { op: BinOpKind::Add, .. }));
    }

    #[test]
    fn parses_recursive_function() {
        let program = parse_ok(
            "func f(n: int): int { if n == 0 { 1 } else { n * f(n - 1) } }",
        );
        assert_eq!(program.stmts.len(), 1);
        let StmtKind::FuncDef(def) = &program.stmts[0].kind else {
            panic!("expected func def");
        };
        assert_eq!(def.name, "f");
        assert_eq!(def.body.stmts.len(), 1);
        let StmtKind::Expr(expr) = &def.body.stmts[0].kind else {
            panic!("expected trailing expr");
        };
        match &expr.kind {
            ExprKind::If { is_value_form, .. } => assert!(*is_value_form),
            _ => panic!("expected if expression"),
        }
    }

    #[test]
    fn parses_class_with_default_field() {
        let program = parse_ok("class Box { var x: int = 0 }");
        let StmtKind::TypeDef(def) = &program.stmts[0].kind else {
            panic!("expected type def");
        };
        assert!(def.is_class);
        assert_eq!(def.fields.len(), 1);
        assert_eq!(def.fields[0].name, "x");
    }

    #[test]
    fn parses_named_struct_construction() {
        let program = parse_ok("var b = Box(x: 3);");
        let StmtKind::Decl { value: Some(expr), .. } = &program.stmts[0].kind else {
            panic!("expected decl");
        };
        let ExprKind::Call { callee, args } = &expr.kind else {
            panic!("expected call");
        };
        assert_eq!(callee, "Box");
        assert_eq!(args[0].name.as_deref(), Some("x"));
    }

    #[test]
    fn parses_while_with_break_value() {
        let program = parse_ok(r#"let r = while true { break "done" };"#);
        let StmtKind::Decl { value: Some(expr), .. } = &program.stmts[0].kind else {
            panic!("expected decl");
        };
        match &expr.kind {
            ExprKind::While { is_value_form, body, .. } => {
                assert!(*is_value_form);
                assert!(matches!(body.stmts[0].kind, StmtKind::Break(Some(_))));
            }
            _ => panic!("expected while expression"),
        }
    }

    #[test]
    fn parses_optional_check() {
        let program = parse_ok("if x? { print(x) }");
        let StmtKind::Expr(expr) = &program.stmts[0].kind else {
            panic!("expected expr stmt");
        };
        let ExprKind::If { cond, .. } = &expr.kind else {
            panic!("expected if");
        };
        assert!(matches!(cond.kind, ExprKind::OptionalCheck { .. }));
    }

    #[test]
    fn parses_field_assignment_and_trailing_field_read() {
        let program = parse_ok(
            "class Box { var x: int = 0 }\nfunc bump(b: Box): int { b.x = b.x + 1; b.x }",
        );
        let StmtKind::FuncDef(def) = &program.stmts[1].kind else {
            panic!("expected func def");
        };
        assert_eq!(def.body.stmts.len(), 2);
        let StmtKind::Expr(assign) = &def.body.stmts[0].kind else {
            panic!("expected assignment statement");
        };
        assert!(matches!(assign.kind, ExprKind::Assign { .. }));
        let StmtKind::Expr(tail) = &def.body.stmts[1].kind else {
            panic!("expected trailing field read");
        };
        assert!(matches!(tail.kind, ExprKind::FieldAccess { .. }));
    }
}
