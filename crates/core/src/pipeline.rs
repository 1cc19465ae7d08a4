//! 파이프라인 trait — 소스와 처리기의 확장 포인트 정의
//!
//! [`LogSource`]는 외부 스트림에서 원시 레코드를 생산하는 장기 실행
//! 컴포넌트이고, [`LogProcessor`]는 레코드 하나를 레코드 하나로 변환하는
//! 순수 변환기입니다. 엔진은 설정의 kind 문자열로 만들어진 구현체를
//! 이름으로 조회하여 사용합니다.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::fault::Fault;
use crate::record::LogRecord;

/// dyn-compatible Future 타입 별칭
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 로그 소스 trait
///
/// 구현체는 취소 토큰이 취소되거나, 기반 스트림이 끝나거나, 복구 불가능한
/// I/O 에러가 발생할 때까지 실행되며, 관찰한 레코드를 `out` 채널에
/// 씁니다. 채널이 가득 차면 전송이 블로킹되어 자연스러운 배압이 됩니다.
pub trait LogSource: Send + Sync {
    /// 설정상 소스 이름
    fn name(&self) -> &str;

    /// 이 소스의 레코드에 적용할 처리기 이름 목록 (순서 유지)
    fn processor_names(&self) -> &[String];

    /// 소스를 실행합니다.
    ///
    /// 취소 시에는 `Ok(())`로 조용히 반환합니다. 에러 반환은
    /// 복구 불가능한 실패를 의미합니다.
    fn provide(
        &self,
        cancel: CancellationToken,
        out: mpsc::Sender<LogRecord>,
    ) -> impl Future<Output = Result<(), Fault>> + Send;
}

/// dyn-compatible 로그 소스 trait
///
/// [`LogSource`]는 RPITIT를 사용하므로 `dyn LogSource`가 불가합니다.
/// `DynLogSource`는 `BoxFuture`를 반환하여 소스들을
/// `HashMap<String, Arc<dyn DynLogSource>>`로 동적 관리할 수 있게 합니다.
/// `LogSource` 구현 타입은 blanket impl으로 자동으로 이 trait도 구현합니다.
pub trait DynLogSource: Send + Sync + std::fmt::Debug {
    /// 설정상 소스 이름
    fn name(&self) -> &str;

    /// 처리기 이름 목록
    fn processor_names(&self) -> &[String];

    /// 소스를 실행합니다.
    fn provide(
        &self,
        cancel: CancellationToken,
        out: mpsc::Sender<LogRecord>,
    ) -> BoxFuture<'_, Result<(), Fault>>;
}

impl<T: LogSource + std::fmt::Debug> DynLogSource for T {
    fn name(&self) -> &str {
        LogSource::name(self)
    }

    fn processor_names(&self) -> &[String] {
        LogSource::processor_names(self)
    }

    fn provide(
        &self,
        cancel: CancellationToken,
        out: mpsc::Sender<LogRecord>,
    ) -> BoxFuture<'_, Result<(), Fault>> {
        Box::pin(LogSource::provide(self, cancel, out))
    }
}

/// 로그 처리기 trait
///
/// 원시 레코드를 받아 `level`/`message`/`timestamp`/`metadata`가
/// `raw_data`의 내용을 반영하는 구조화 레코드를 반환합니다.
/// 처리기는 `source`와 `raw_data`를 출력 레코드에 그대로 유지해야 합니다.
pub trait LogProcessor: Send + Sync + std::fmt::Debug {
    /// 레코드 하나를 변환합니다.
    fn process(&self, record: LogRecord) -> Result<LogRecord, Fault>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[derive(Debug)]
    struct StaticSource {
        name: String,
        processors: Vec<String>,
        lines: Vec<&'static str>,
    }

    impl LogSource for StaticSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn processor_names(&self) -> &[String] {
            &self.processors
        }

        async fn provide(
            &self,
            _cancel: CancellationToken,
            out: mpsc::Sender<LogRecord>,
        ) -> Result<(), Fault> {
            for line in &self.lines {
                let record = LogRecord::raw(self.name.clone(), Bytes::from_static(line.as_bytes()));
                out.send(record)
                    .await
                    .map_err(|e| Fault::unknown("log channel closed").with_source(e))?;
            }
            Ok(())
        }
    }

    #[derive(Debug)]
    struct UppercaseProcessor;

    impl LogProcessor for UppercaseProcessor {
        fn process(&self, mut record: LogRecord) -> Result<LogRecord, Fault> {
            record.message = String::from_utf8_lossy(&record.raw_data).to_uppercase();
            Ok(record)
        }
    }

    #[tokio::test]
    async fn source_can_be_boxed_dyn() {
        let source: Box<dyn DynLogSource> = Box::new(StaticSource {
            name: "static".to_owned(),
            processors: vec!["upper".to_owned()],
            lines: vec!["one", "two"],
        });

        assert_eq!(source.name(), "static");
        assert_eq!(source.processor_names(), ["upper".to_owned()]);

        let (tx, mut rx) = mpsc::channel(8);
        source.provide(CancellationToken::new(), tx).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.source, "static");
        assert_eq!(first.raw_data.as_ref(), b"one");
        assert!(first.id.is_none());
    }

    #[test]
    fn processor_is_object_safe() {
        let processor: Box<dyn LogProcessor> = Box::new(UppercaseProcessor);
        let record = LogRecord::raw("s", Bytes::from_static(b"hello"));
        let processed = processor.process(record).unwrap();
        assert_eq!(processed.message, "HELLO");
        assert_eq!(processed.source, "s");
    }
}
