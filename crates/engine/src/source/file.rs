//! 파일 기반 로그 소스
//!
//! 파일 끝으로 이동한 뒤 파일시스템 감시자를 설치하고, 쓰기 이벤트가
//! 올 때마다 새로 추가된 완전한 라인(`\n` 종료)을 레코드로 방출합니다.
//! `tail -f`와 유사하게 동작하며, 시작 시점 이전의 내용은 읽지 않습니다.
//!
//! 파일 로테이션(rename/create로 inode가 바뀌는 경우)은 처리하지 않습니다.
//! 감시자는 원래 inode를 계속 따라가며, 로테이션으로 발생하는 비쓰기
//! 이벤트는 debug 로그로 남기고 무시합니다.

use std::io::SeekFrom;
use std::path::PathBuf;

use bytes::Bytes;
use notify::event::ModifyKind;
use notify::{EventKind, RecursiveMode, Watcher};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use logchute_core::fault::Fault;
use logchute_core::pipeline::LogSource;
use logchute_core::record::LogRecord;

use crate::error::EngineError;

/// 감시자 스레드와 소스 태스크 사이의 이벤트 채널 용량
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// 파일 기반 로그 소스
///
/// 하나의 로그 파일을 감시하며 추가되는 라인을 수집합니다.
#[derive(Debug)]
pub struct FileSource {
    /// 설정상 소스 이름 (레코드의 `source` 필드 값)
    name: String,
    /// 감시할 파일 경로
    path: PathBuf,
    /// 적용할 처리기 이름 목록
    processor_names: Vec<String>,
}

impl FileSource {
    /// 새 파일 소스를 생성합니다.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        processor_names: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            processor_names,
        }
    }

    /// 감시 대상 경로를 반환합니다.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn source_error(&self, reason: impl std::fmt::Display) -> EngineError {
        EngineError::Source {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    async fn run(
        &self,
        cancel: CancellationToken,
        out: mpsc::Sender<LogRecord>,
    ) -> Result<(), EngineError> {
        let file = File::open(&self.path)
            .await
            .map_err(|e| self.source_error(format_args!(
                "cannot open file '{}': {e}",
                self.path.display()
            )))?;

        let mut reader = BufReader::new(file);

        // 항상 파일 끝에서 시작. 이후 읽기는 커서를 계속 전진시킴.
        reader
            .seek(SeekFrom::End(0))
            .await
            .map_err(|e| self.source_error(format_args!("cannot seek to end of file: {e}")))?;

        // 감시자 콜백 스레드에서 tokio 채널로 이벤트를 브리지
        let (event_tx, mut event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
            let _ = event_tx.blocking_send(event);
        })
        .map_err(|e| self.source_error(format_args!("cannot create watcher: {e}")))?;

        watcher
            .watch(&self.path, RecursiveMode::NonRecursive)
            .map_err(|e| self.source_error(format_args!("cannot watch file: {e}")))?;

        // 불완전한 라인을 다음 쓰기 이벤트까지 보관하는 버퍼
        let mut line_buf = Vec::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(source = %self.name, "file source cancelled");
                    return Ok(());
                }
                event = event_rx.recv() => match event {
                    None => {
                        debug!(source = %self.name, "watcher event channel closed");
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(self.source_error(format_args!("watcher error: {e}")));
                    }
                    Some(Ok(event)) => match event.kind {
                        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => {
                            self.read_new_lines(&mut reader, &mut line_buf, &cancel, &out)
                                .await?;
                        }
                        kind => {
                            debug!(source = %self.name, event = ?kind, "ignoring non-write filesystem event");
                        }
                    },
                }
            }
        }
    }

    /// 현재 위치부터 완전한 라인들을 읽어 레코드로 방출합니다.
    ///
    /// EOF를 만나면 반환하고 다음 쓰기 이벤트를 기다립니다.
    /// `\n`으로 끝나지 않은 꼬리 데이터는 `line_buf`에 남겨 두었다가
    /// 다음 호출에서 이어 붙입니다.
    async fn read_new_lines(
        &self,
        reader: &mut BufReader<File>,
        line_buf: &mut Vec<u8>,
        cancel: &CancellationToken,
        out: &mpsc::Sender<LogRecord>,
    ) -> Result<(), EngineError> {
        loop {
            let read = reader
                .read_until(b'\n', line_buf)
                .await
                .map_err(|e| self.source_error(format_args!("cannot read line: {e}")))?;

            if read == 0 {
                // EOF 도달
                return Ok(());
            }

            if line_buf.last() != Some(&b'\n') {
                // 라인이 아직 끝나지 않음
                return Ok(());
            }

            let mut line = &line_buf[..line_buf.len() - 1];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }

            if !line.is_empty() {
                let record = LogRecord::raw(self.name.clone(), Bytes::copy_from_slice(line));
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    result = out.send(record) => {
                        result.map_err(|e| EngineError::Channel(e.to_string()))?;
                    }
                }
            }

            line_buf.clear();
        }
    }
}

impl LogSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn processor_names(&self) -> &[String] {
        &self.processor_names
    }

    async fn provide(
        &self,
        cancel: CancellationToken,
        out: mpsc::Sender<LogRecord>,
    ) -> Result<(), Fault> {
        self.run(cancel, out).await.map_err(Fault::from)
    }
}
