//! 쿼리 파서 — 토큰 스트림에서 [`Query`]를 생성
//!
//! 쿼리 텍스트는 `:`로 구분되는 두 섹션으로 이루어집니다.
//!
//! - **제어 섹션**: `timestamp=<date>[,<date>]`, `limit=<int>`,
//!   `cursor=<str>`, `sort=[-]<field>(,[-]<field>)*`
//! - **필터 섹션**: 비교의 불리언 트리. 우선순위는 `!` > `&` > `|`이고
//!   괄호로 묶을 수 있습니다. `field=v1,v2`는 `In`, `field~="…"`는
//!   `Like`가 됩니다.
//!
//! 잘못된 입력은 모두 [`Fault`] (`BadInput`)로 보고됩니다.
//! 파서는 어떤 입력에도 패닉하지 않습니다.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use logchute_core::fault::Fault;

use crate::ast::{Comparison, Node, Operator, Query, SortField, Value};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

/// 쿼리 텍스트를 파싱합니다.
pub fn parse(input: &str) -> Result<Query, Fault> {
    Parser::new(Lexer::new(input)).parse_query()
}

/// 쿼리 파서
///
/// 현재 토큰과 미리보기 토큰 하나를 유지하는 재귀 하강 파서입니다.
pub struct Parser {
    lexer: Lexer,
    cur: Token,
    peek: Token,
}

impl Parser {
    /// 주어진 렉서로 새 파서를 생성합니다.
    pub fn new(mut lexer: Lexer) -> Self {
        let cur = lexer.next_token();
        let peek = lexer.next_token();
        Self { lexer, cur, peek }
    }

    fn next_token(&mut self) {
        self.cur = std::mem::replace(&mut self.peek, self.lexer.next_token());
    }

    fn syntax_error(&self, expected: impl std::fmt::Display) -> Fault {
        Fault::bad_input(format!(
            "syntax error: expected {expected}, got {} ('{}')",
            self.cur.kind, self.cur.literal,
        ))
    }

    /// peek 토큰이 기대한 종류이면 전진하고, 아니면 문법 에러를 반환합니다.
    fn expect_peek(&mut self, kind: TokenKind) -> Result<(), Fault> {
        if self.peek.kind == kind {
            self.next_token();
            Ok(())
        } else {
            Err(Fault::bad_input(format!(
                "syntax error: expected {kind} after {} ('{}'), got {} ('{}')",
                self.cur.kind, self.cur.literal, self.peek.kind, self.peek.literal,
            )))
        }
    }

    /// 전체 쿼리를 파싱합니다.
    pub fn parse_query(&mut self) -> Result<Query, Fault> {
        let mut query = Query::default();

        while self.cur.kind != TokenKind::Eof {
            if self.cur.kind == TokenKind::Colon {
                self.next_token();
                query.node = self.parse_filter_section()?;
                if self.cur.kind != TokenKind::Eof {
                    return Err(self.syntax_error("end of input after filter section"));
                }
                break;
            }

            self.parse_control_statement(&mut query)?;
            self.next_token();
        }

        Ok(query)
    }

    // --- 제어 섹션 ---

    fn parse_control_statement(&mut self, query: &mut Query) -> Result<(), Fault> {
        if self.cur.kind != TokenKind::Ident {
            return Err(self.syntax_error("a control keyword (timestamp, limit, cursor, sort)"));
        }

        let keyword = self.cur.literal.clone();
        match keyword.as_str() {
            "timestamp" => self.parse_timestamp(query),
            "limit" => self.parse_limit(query),
            "cursor" => self.parse_cursor(query),
            "sort" => self.parse_sort(query),
            other => Err(Fault::bad_input(format!(
                "syntax error: unexpected keyword '{other}'"
            ))),
        }
    }

    fn parse_timestamp(&mut self, query: &mut Query) -> Result<(), Fault> {
        self.expect_peek(TokenKind::Equal)?;
        self.expect_peek(TokenKind::String)?;
        query.start = Some(parse_datetime(&self.cur.literal)?);

        if self.peek.kind != TokenKind::Comma {
            return Ok(());
        }
        self.next_token();
        self.expect_peek(TokenKind::String)?;
        query.end = Some(parse_datetime(&self.cur.literal)?);
        Ok(())
    }

    fn parse_limit(&mut self, query: &mut Query) -> Result<(), Fault> {
        self.expect_peek(TokenKind::Equal)?;
        self.expect_peek(TokenKind::Int)?;
        query.limit = self.cur.literal.parse().map_err(|_| {
            Fault::bad_input(format!("invalid limit value '{}'", self.cur.literal))
        })?;
        Ok(())
    }

    fn parse_cursor(&mut self, query: &mut Query) -> Result<(), Fault> {
        self.expect_peek(TokenKind::Equal)?;
        if self.peek.kind != TokenKind::String && self.peek.kind != TokenKind::Ident {
            return Err(Fault::bad_input(format!(
                "syntax error: expected string after 'cursor=', got {} ('{}')",
                self.peek.kind, self.peek.literal,
            )));
        }
        self.next_token();
        query.cursor = self.cur.literal.clone();
        Ok(())
    }

    fn parse_sort(&mut self, query: &mut Query) -> Result<(), Fault> {
        self.expect_peek(TokenKind::Equal)?;

        loop {
            let descending = if self.peek.kind == TokenKind::Minus {
                self.next_token();
                true
            } else {
                false
            };

            self.expect_peek(TokenKind::Ident)?;
            query.sort.push(SortField {
                name: self.cur.literal.clone(),
                descending,
            });

            if self.peek.kind != TokenKind::Comma {
                return Ok(());
            }
            self.next_token();
        }
    }

    // --- 필터 섹션 ---
    // 우선순위: ! > & > |

    fn parse_filter_section(&mut self) -> Result<Option<Node>, Fault> {
        if self.cur.kind == TokenKind::Eof {
            return Ok(None);
        }
        self.parse_or_expr().map(Some)
    }

    fn parse_or_expr(&mut self) -> Result<Node, Fault> {
        let first = self.parse_and_expr()?;
        if self.cur.kind != TokenKind::Or {
            return Ok(first);
        }

        let mut children = vec![first];
        while self.cur.kind == TokenKind::Or {
            self.next_token();
            children.push(self.parse_and_expr()?);
        }
        Ok(Node::Or(children))
    }

    fn parse_and_expr(&mut self) -> Result<Node, Fault> {
        let first = self.parse_unary_expr()?;
        if self.cur.kind != TokenKind::And {
            return Ok(first);
        }

        let mut children = vec![first];
        while self.cur.kind == TokenKind::And {
            self.next_token();
            children.push(self.parse_unary_expr()?);
        }
        Ok(Node::And(children))
    }

    fn parse_unary_expr(&mut self) -> Result<Node, Fault> {
        match self.cur.kind {
            TokenKind::Not => {
                self.next_token();
                Ok(Node::not(self.parse_unary_expr()?))
            }
            TokenKind::LParen => {
                self.next_token();
                let node = self.parse_or_expr()?;
                if self.cur.kind != TokenKind::RParen {
                    return Err(self.syntax_error("')'"));
                }
                self.next_token();
                Ok(node)
            }
            TokenKind::Ident => self.parse_comparison(),
            _ => Err(self.syntax_error("a field name, '!' or '('")),
        }
    }

    fn parse_comparison(&mut self) -> Result<Node, Fault> {
        let field = self.cur.literal.clone();
        self.next_token();

        let operator = match self.cur.kind {
            TokenKind::Equal => Operator::Eq,
            TokenKind::NotEqual => Operator::Ne,
            TokenKind::Less => Operator::Lt,
            TokenKind::LessEqual => Operator::Lte,
            TokenKind::Greater => Operator::Gt,
            TokenKind::GreaterEqual => Operator::Gte,
            TokenKind::Tilde => {
                self.expect_peek(TokenKind::Equal)?;
                Operator::Like
            }
            _ => return Err(self.syntax_error("a comparison operator")),
        };
        self.next_token();

        if operator == Operator::Like {
            if self.cur.kind != TokenKind::String {
                return Err(self.syntax_error("a quoted string after '~='"));
            }
            let value = Value::String(self.cur.literal.clone());
            self.next_token();
            return Ok(Node::Comparison(Comparison {
                field,
                operator,
                value,
            }));
        }

        let first = self.parse_value()?;

        // `field=a,b,c`는 In 비교가 됨
        if operator == Operator::Eq && self.cur.kind == TokenKind::Comma {
            let mut values = vec![first];
            while self.cur.kind == TokenKind::Comma {
                self.next_token();
                values.push(self.parse_value()?);
            }
            return Ok(Node::Comparison(Comparison {
                field,
                operator: Operator::In,
                value: Value::List(values),
            }));
        }

        Ok(Node::Comparison(Comparison {
            field,
            operator,
            value: first,
        }))
    }

    /// 값 토큰 하나를 소비하고 값을 반환합니다.
    fn parse_value(&mut self) -> Result<Value, Fault> {
        let negative = if self.cur.kind == TokenKind::Minus {
            self.next_token();
            true
        } else {
            false
        };

        let value = match self.cur.kind {
            TokenKind::Int => {
                let n: i64 = self.cur.literal.parse().map_err(|_| {
                    Fault::bad_input(format!("invalid integer '{}'", self.cur.literal))
                })?;
                Value::Int(if negative { -n } else { n })
            }
            TokenKind::Decimal => {
                let n: f64 = self.cur.literal.parse().map_err(|_| {
                    Fault::bad_input(format!("invalid decimal '{}'", self.cur.literal))
                })?;
                Value::Float(if negative { -n } else { n })
            }
            _ if negative => return Err(self.syntax_error("a number after '-'")),
            TokenKind::String | TokenKind::Ident => Value::String(self.cur.literal.clone()),
            TokenKind::True => Value::Bool(true),
            TokenKind::False => Value::Bool(false),
            TokenKind::Null => Value::Null,
            _ => return Err(self.syntax_error("a value")),
        };

        self.next_token();
        Ok(value)
    }
}

/// 날짜/시각 문자열을 파싱합니다.
///
/// 지원 레이아웃 (순서대로 시도):
/// 1. RFC 3339 (오프셋 또는 `Z` 포함)
/// 2. `YYYY-MM-DDTHH:MM:SS`
/// 3. `YYYY-MM-DDTHH:MM`
/// 4. `YYYY-MM-DD`
///
/// 오프셋이 없는 레이아웃은 UTC로 해석합니다.
fn parse_datetime(value: &str) -> Result<DateTime<Utc>, Fault> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    for layout in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, layout) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(Fault::bad_input(format!(
        "cannot parse datetime '{value}'"
    )))
}
