//! 로그 처리기 모듈 — 원시 레코드를 구조화 레코드로 변환합니다.
//!
//! # 처리기 종류
//! - [`JsonProcessor`]: JSON 객체에서 설정된 필드를 추출
//! - [`LuaProcessor`]: 샌드박스된 Lua 스크립트로 사용자 정의 파싱
//!
//! 처리기는 레코드 하나를 받아 레코드 하나를 반환하는 순수 변환기이며,
//! `source`와 `raw_data`는 출력 레코드에 그대로 유지합니다.

pub mod json;
pub mod lua;

pub use json::{JsonProcessor, JsonProcessorConfig};
pub use lua::{LuaProcessor, LuaProcessorConfig};
