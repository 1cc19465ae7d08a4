//! SQL 변환기 — 쿼리 트리를 파라미터화된 SELECT 문으로 변환
//!
//! [`SqlQueryBuilder`]는 [`Query`]로부터 WHERE(타임스탬프 범위 + 필터 트리),
//! ORDER BY, LIMIT 절을 조립합니다. 필드 이름은 항상 허용 목록으로
//! 검증되고 값은 항상 `?` 플레이스홀더로 바인딩되므로, 사용자 입력이
//! SQL 문자열에 삽입되는 일은 없습니다.

use std::sync::LazyLock;

use regex::Regex;

use logchute_core::fault::Fault;

use crate::ast::{Comparison, Node, Operator, Query, SortField, Value};

/// 기본 필터 필드 허용 패턴
///
/// 최상위 컬럼과 `metadata.` 하위 한 단계 경로(따옴표 경로 포함)를
/// 허용합니다.
static DEFAULT_FILTER_FIELDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(id|level|timestamp|message|source|metadata(\.("[^"]+"|[a-zA-Z0-9_]+))?)$"#)
        .expect("default filter field pattern is a valid regex")
});

/// 기본 정렬 허용 필드
const DEFAULT_SORT_FIELDS: &[&str] = &["source", "level", "timestamp"];

/// SQL 빌더 설정
#[derive(Debug, Clone)]
pub struct SqlOptions {
    /// 조회 대상 테이블 이름
    pub table_name: String,
    /// SELECT 프로젝션 (비어 있으면 `*`)
    pub select_columns: Vec<String>,
    /// ORDER BY에 허용되는 필드 목록 (비어 있으면 기본 목록)
    pub allowed_sort_fields: Vec<String>,
    /// WHERE 필드 이름 검증 패턴 (`None`이면 검증 생략)
    pub allowed_filter_fields: Option<Regex>,
}

impl Default for SqlOptions {
    fn default() -> Self {
        Self {
            table_name: "processed_logs".to_owned(),
            select_columns: vec![
                "id".to_owned(),
                "source".to_owned(),
                "timestamp".to_owned(),
                "level".to_owned(),
                "message".to_owned(),
                "metadata".to_owned(),
            ],
            allowed_sort_fields: Vec::new(),
            allowed_filter_fields: Some(DEFAULT_FILTER_FIELDS.clone()),
        }
    }
}

/// 생성된 SQL과 바인딩 인자
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    /// 파라미터화된 SELECT 문
    pub sql: String,
    /// `?` 순서대로의 바인딩 인자
    pub args: Vec<Value>,
}

/// WHERE/ORDER BY/LIMIT 절을 갖춘 SELECT 쿼리 빌더
#[derive(Debug, Clone, Default)]
pub struct SqlQueryBuilder {
    opts: SqlOptions,
}

impl SqlQueryBuilder {
    /// 주어진 옵션으로 새 빌더를 생성합니다.
    pub fn new(opts: SqlOptions) -> Self {
        Self { opts }
    }

    /// 쿼리로부터 완전한 SELECT 문을 생성합니다.
    pub fn build(&self, query: &Query) -> Result<SqlQuery, Fault> {
        let (where_clause, args) = self.build_where_clause(query)?;
        let order_by_clause = self.build_order_by_clause(query)?;
        let limit_clause = format!("LIMIT {}", query.limit);

        let select_columns = if self.opts.select_columns.is_empty() {
            "*".to_owned()
        } else {
            self.opts.select_columns.join(", ")
        };

        let sql = format!(
            "SELECT {} FROM {} WHERE {} {} {}",
            select_columns, self.opts.table_name, where_clause, order_by_clause, limit_clause,
        );

        Ok(SqlQuery { sql, args })
    }

    /// 타임스탬프 범위와 필터 트리로 WHERE 절을 조립합니다.
    fn build_where_clause(&self, query: &Query) -> Result<(String, Vec<Value>), Fault> {
        let Some(start) = query.start else {
            return Err(
                Fault::bad_input("invalid query").with_field_error("start", "Field is required.")
            );
        };

        // start/end 순서를 정규화해 하한/상한을 정함
        let (lower, upper) = match query.end {
            Some(end) if end < start => (end, Some(start)),
            Some(end) => (start, Some(end)),
            None => (start, None),
        };

        let mut parts = vec!["timestamp >= ?".to_owned()];
        let mut args = vec![Value::Timestamp(lower)];

        if let Some(upper) = upper {
            parts.push("timestamp <= ?".to_owned());
            args.push(Value::Timestamp(upper));
        }

        if let Some(node) = &query.node {
            let (clause, node_args) = self.render_node(node)?;
            if !clause.is_empty() {
                parts.push(clause);
                args.extend(node_args);
            }
        }

        Ok((parts.join(" AND "), args))
    }

    /// 정렬 필드와 start/end 관계로 ORDER BY 절을 조립합니다.
    fn build_order_by_clause(&self, query: &Query) -> Result<String, Fault> {
        // end가 start보다 앞서면 과거 방향 (내림차순)
        let time_direction = match (query.start, query.end) {
            (Some(start), Some(end)) if end < start => "DESC",
            _ => "ASC",
        };

        if query.sort.is_empty() {
            return Ok(format!("ORDER BY timestamp {time_direction}"));
        }

        let allowed: Vec<&str> = if self.opts.allowed_sort_fields.is_empty() {
            DEFAULT_SORT_FIELDS.to_vec()
        } else {
            self.opts.allowed_sort_fields.iter().map(String::as_str).collect()
        };

        let mut parts = Vec::with_capacity(query.sort.len() + 1);
        for field in &query.sort {
            if !allowed.contains(&field.name.as_str()) {
                return Err(Fault::bad_input(format!(
                    "field '{}' is not allowed for sorting",
                    field.name
                )));
            }

            let direction = if field.descending { "DESC" } else { "ASC" };
            parts.push(format!("{} {}", field.name, direction));
        }

        // start/end 방향을 보장하기 위해 timestamp가 명시되지 않았으면
        // 마지막 타이브레이커로 추가
        let has_timestamp = query.sort.iter().any(|f: &SortField| f.name == "timestamp");
        if !has_timestamp {
            parts.push(format!("timestamp {time_direction}"));
        }

        Ok(format!("ORDER BY {}", parts.join(", ")))
    }

    /// 쿼리 트리를 재귀적으로 순회하며 SQL 조각을 생성합니다.
    ///
    /// 빈 그룹은 빈 문자열이 되어 상위에서 통째로 생략됩니다.
    fn render_node(&self, node: &Node) -> Result<(String, Vec<Value>), Fault> {
        match node {
            Node::And(children) => self.join_nodes(children, "AND"),
            Node::Or(children) => self.join_nodes(children, "OR"),
            Node::Not(child) => {
                let (clause, args) = self.render_node(child)?;
                if clause.is_empty() {
                    return Ok((String::new(), Vec::new()));
                }
                Ok((format!("NOT ({clause})"), args))
            }
            Node::Comparison(comparison) => self.render_comparison(comparison),
        }
    }

    fn join_nodes(&self, children: &[Node], operator: &str) -> Result<(String, Vec<Value>), Fault> {
        if children.is_empty() {
            return Ok((String::new(), Vec::new()));
        }

        let mut parts = Vec::with_capacity(children.len());
        let mut args = Vec::new();
        for child in children {
            let (clause, child_args) = self.render_node(child)?;
            if !clause.is_empty() {
                parts.push(clause);
                args.extend(child_args);
            }
        }

        if parts.is_empty() {
            return Ok((String::new(), Vec::new()));
        }

        // 괄호로 감싸 상위 연산자와의 우선순위를 보존
        Ok((
            format!("({})", parts.join(&format!(" {operator} "))),
            args,
        ))
    }

    /// 비교 리프를 `field op ?` 형태로 변환합니다.
    fn render_comparison(&self, comparison: &Comparison) -> Result<(String, Vec<Value>), Fault> {
        if comparison.field.is_empty() || comparison.value == Value::Null {
            return Err(Fault::bad_input(
                "invalid comparison: missing field name or value",
            ));
        }

        // 허용 패턴에 맞지 않는 필드는 SQL에 삽입하지 않고 거부
        if let Some(pattern) = &self.opts.allowed_filter_fields {
            if !pattern.is_match(&comparison.field) {
                return Err(Fault::bad_input(format!(
                    "invalid field name: {}",
                    comparison.field
                )));
            }
        }

        let op = match comparison.operator {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::ILike => "ILIKE",
            Operator::In => "IN",
        };

        Ok((
            format!("{} {} ?", comparison.field, op),
            vec![comparison.value.clone()],
        ))
    }
}
