#![doc = include_str!("../README.md")]

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod sql;
pub mod token;

use logchute_core::fault::Fault;
use logchute_core::pipeline::BoxFuture;
use logchute_core::record::LogRecord;

// --- 주요 타입 re-export ---

pub use ast::{Comparison, Direction, Node, Operator, Query, SortField, Value};
pub use lexer::Lexer;
pub use parser::{Parser, parse};
pub use sql::{SqlOptions, SqlQuery, SqlQueryBuilder};
pub use token::{Token, TokenKind};

/// 쿼리 실행 결과
///
/// 매칭된 레코드와, 이후 재개를 위한 커서 문자열입니다.
/// 커서는 아직 예약 상태로, 현재 구현은 항상 빈 문자열을 반환합니다.
#[derive(Debug, Clone, Default)]
pub struct QueryResponse {
    /// 매칭된 레코드 목록
    pub records: Vec<LogRecord>,
    /// 재개 커서 (예약됨)
    pub cursor: String,
}

/// 쿼리 실행 trait — 저장 백엔드가 구현하는 읽기 경로 계약
pub trait Querier: Send + Sync {
    /// 구조화된 쿼리를 실행하고 매칭된 레코드를 반환합니다.
    fn query(
        &self,
        query: Query,
    ) -> impl std::future::Future<Output = Result<QueryResponse, Fault>> + Send;
}

/// dyn-compatible 쿼리 실행 trait
///
/// [`Querier`] 구현 타입은 blanket impl으로 자동으로 이 trait도 구현합니다.
pub trait DynQuerier: Send + Sync {
    /// 구조화된 쿼리를 실행합니다.
    fn query(&self, query: Query) -> BoxFuture<'_, Result<QueryResponse, Fault>>;
}

impl<T: Querier> DynQuerier for T {
    fn query(&self, query: Query) -> BoxFuture<'_, Result<QueryResponse, Fault>> {
        Box::pin(Querier::query(self, query))
    }
}
