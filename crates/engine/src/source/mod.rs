//! 로그 소스 모듈 — 외부 스트림에서 원시 레코드를 생산합니다.
//!
//! 각 소스는 자체 tokio 태스크에서 `provide` 루프를 실행하며,
//! 새로 관찰한 레코드를 유한 mpsc 채널을 통해 처리기 풀로 전달합니다.
//! 채널이 가득 차면 전송이 블로킹되어 다운스트림 속도에 맞춰
//! 자연스럽게 배압이 걸립니다.

pub mod file;

pub use file::FileSource;
