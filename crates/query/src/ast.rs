//! 쿼리 AST — 비교의 불리언 트리와 페이지네이션/정렬 기술자
//!
//! 파서가 생성하고 SQL 변환기가 순회하는 타입들입니다.
//! [`Node`]는 네 가지 변형(And/Or/Not/Comparison)으로 닫힌 합 타입입니다.

use chrono::{DateTime, Utc};

use logchute_core::fault::Fault;

/// limit 최소값
pub const LIMIT_MIN: i64 = 1;
/// limit 최대값
pub const LIMIT_MAX: i64 = 1000;

/// 시간 축 탐색 방향
///
/// `end`가 `start`보다 앞서면 과거 방향([`Direction::Backward`])입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// 시간 순방향 (오름차순)
    Forward,
    /// 시간 역방향 (내림차순)
    Backward,
}

/// 정렬 기술자 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    /// 정렬 대상 필드 이름
    pub name: String,
    /// 내림차순 여부
    pub descending: bool,
}

impl SortField {
    /// 오름차순 정렬 기술자를 생성합니다.
    pub fn ascending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descending: false,
        }
    }

    /// 내림차순 정렬 기술자를 생성합니다.
    pub fn descending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descending: true,
        }
    }
}

/// 비교 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// 같음
    Eq,
    /// 같지 않음
    Ne,
    /// 초과
    Gt,
    /// 미만
    Lt,
    /// 이상
    Gte,
    /// 이하
    Lte,
    /// 패턴 일치
    Like,
    /// 대소문자 무시 패턴 일치
    ILike,
    /// 목록 포함
    In,
}

/// 비교 값
///
/// 스칼라 또는 (`In` 연산자용) 스칼라 목록입니다.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    List(Vec<Value>),
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// 단일 필드 비교 — 트리의 리프 노드
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// 레코드 안으로의 점 표기 경로 (예: `metadata.user_id`)
    pub field: String,
    /// 비교 연산자
    pub operator: Operator,
    /// 비교 값
    pub value: Value,
}

/// 쿼리 트리 노드
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// 논리곱 — 모든 자식이 참일 때 참
    And(Vec<Node>),
    /// 논리합 — 자식 중 하나라도 참이면 참
    Or(Vec<Node>),
    /// 부정
    Not(Box<Node>),
    /// 필드 비교
    Comparison(Comparison),
}

impl Node {
    /// 비교 리프 노드를 생성합니다.
    pub fn comparison(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self::Comparison(Comparison {
            field: field.into(),
            operator,
            value: value.into(),
        })
    }

    /// 부정 노드를 생성합니다.
    pub fn not(child: Node) -> Self {
        Self::Not(Box::new(child))
    }
}

/// 로그 검색/필터 쿼리
///
/// 시간 기반 페이지네이션과 다중 필드 정렬을 지원합니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// 필터 트리 루트 (없으면 시간 범위만 적용)
    pub node: Option<Node>,
    /// 정렬 기술자 목록 (나열 순서대로 적용)
    pub sort: Vec<SortField>,
    /// 시간 범위 시작 (필수)
    pub start: Option<DateTime<Utc>>,
    /// 시간 범위 끝 (선택; `start`보다 앞서면 역방향 탐색)
    pub end: Option<DateTime<Utc>>,
    /// 최대 반환 레코드 수 (`[1, 1000]`)
    pub limit: i64,
    /// 검색 재개 지점을 가리키는 불투명 토큰 (예약됨)
    pub cursor: String,
}

impl Query {
    /// 쿼리 파라미터의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), Fault> {
        if self.limit > LIMIT_MAX {
            return Err(Fault::bad_input("invalid query").with_field_error(
                "limit",
                format!("Values larger than {LIMIT_MAX} are not supported."),
            ));
        }

        if self.limit < LIMIT_MIN {
            return Err(Fault::bad_input("invalid query").with_field_error(
                "limit",
                format!("Values smaller than {LIMIT_MIN} are not supported."),
            ));
        }

        if self.start.is_none() {
            return Err(
                Fault::bad_input("invalid query").with_field_error("start", "Field is required.")
            );
        }

        Ok(())
    }

    /// 시간 축 탐색 방향을 결정합니다.
    ///
    /// `end`가 존재하고 `start`보다 앞서면 과거 방향입니다.
    pub fn direction(&self) -> Direction {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if end < start {
                return Direction::Backward;
            }
        }
        Direction::Forward
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn valid_query() -> Query {
        Query {
            start: Some(ts("2024-01-01T00:00:00Z")),
            limit: 100,
            ..Default::default()
        }
    }

    #[test]
    fn validate_accepts_minimal_query() {
        valid_query().validate().unwrap();
    }

    #[test]
    fn validate_rejects_limit_above_max() {
        let query = Query {
            limit: 1001,
            ..valid_query()
        };
        let fault = query.validate().unwrap_err();
        let errors = fault.field_errors().unwrap();
        assert!(errors.get("limit").unwrap()[0].contains("larger than 1000"));
    }

    #[test]
    fn validate_rejects_limit_below_min() {
        let query = Query {
            limit: 0,
            ..valid_query()
        };
        let fault = query.validate().unwrap_err();
        assert!(fault.field_errors().unwrap().contains_key("limit"));
    }

    #[test]
    fn validate_requires_start() {
        let query = Query {
            start: None,
            ..valid_query()
        };
        let fault = query.validate().unwrap_err();
        let errors = fault.field_errors().unwrap();
        assert_eq!(errors.get("start").unwrap()[0], "Field is required.");
    }

    #[test]
    fn direction_is_forward_without_end() {
        assert_eq!(valid_query().direction(), Direction::Forward);
    }

    #[test]
    fn direction_is_forward_when_end_after_start() {
        let query = Query {
            end: Some(ts("2024-02-01T00:00:00Z")),
            ..valid_query()
        };
        assert_eq!(query.direction(), Direction::Forward);
    }

    #[test]
    fn direction_is_backward_when_end_before_start() {
        let query = Query {
            start: Some(ts("2022-02-12T12:00:00Z")),
            end: Some(ts("2022-02-12T10:10:10Z")),
            limit: 10,
            ..Default::default()
        };
        assert_eq!(query.direction(), Direction::Backward);
    }

    #[test]
    fn node_constructors_build_expected_tree() {
        let node = Node::And(vec![
            Node::comparison("source", Operator::Eq, "nginx"),
            Node::not(Node::comparison("level", Operator::Eq, "debug")),
        ]);

        match node {
            Node::And(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[0], Node::Comparison(_)));
                assert!(matches!(children[1], Node::Not(_)));
            }
            other => panic!("expected And node, got {other:?}"),
        }
    }

    #[test]
    fn value_conversions() {
        assert_eq!(Value::from("x"), Value::String("x".to_owned()));
        assert_eq!(Value::from(42i64), Value::Int(42));
        assert_eq!(Value::from(1.5), Value::Float(1.5));
        assert_eq!(Value::from(true), Value::Bool(true));
    }
}
