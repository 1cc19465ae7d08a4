//! Lua 스크립트 로그 처리기
//!
//! 사용자가 제공한 Lua 스크립트로 레코드를 파싱합니다. 스크립트는
//! 문자열 하나를 받는 `parse_log` 함수를 반드시 정의해야 하며,
//! 네 값을 반환해야 합니다.
//!
//! 1. level — `debug|info|warn|error|fatal` 문자열 (그 외는 unknown)
//! 2. message — 문자열
//! 3. timestamp — RFC 3339 문자열
//! 4. metadata — 테이블
//!
//! # 샌드박스
//! VM에는 base/table/string/package 라이브러리만 노출됩니다.
//! `os`/`io` 모듈은 제공되지 않으므로 스크립트는 파일시스템이나
//! 프로세스에 접근할 수 없습니다. `local json = require("json")`으로
//! 쓸 수 있는 JSON 헬퍼(encode/decode)가 미리 등록되어 있습니다.
//!
//! # VM 풀
//! 워커마다 호출 시점에 풀에서 VM 하나를 꺼내 쓰고 반환합니다.
//! 각 VM은 생성 시 스크립트를 한 번 로드해 둡니다. 호출 간 스택 정리는
//! mlua의 타입화된 다중 반환이 보장합니다.

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use mlua::{Lua, LuaOptions, LuaSerdeExt, StdLib, Table};
use serde::Deserialize;

use logchute_core::fault::Fault;
use logchute_core::pipeline::LogProcessor;
use logchute_core::record::{LogLevel, LogRecord, Metadata};

use crate::error::EngineError;

/// Lua 처리기 설정
#[derive(Debug, Clone, Deserialize)]
pub struct LuaProcessorConfig {
    /// 사용자 스크립트 경로
    pub script_path: PathBuf,
}

/// Lua 스크립트 로그 처리기
#[derive(Debug)]
pub struct LuaProcessor {
    /// 처리기 이름 (에러 메시지용)
    name: String,
    /// 스크립트 소스 (VM 생성 시마다 로드)
    script: String,
    /// 초기화된 VM 풀
    pool: Mutex<Vec<Lua>>,
}

impl LuaProcessor {
    /// 스크립트 파일을 읽어 새 처리기를 생성합니다.
    ///
    /// 스크립트가 로드되지 않거나 `parse_log`를 정의하지 않으면 에러를
    /// 반환합니다. 이는 레코드 단위 실패가 아니라 엔진 시작 실패입니다.
    pub fn new(name: impl Into<String>, config: LuaProcessorConfig) -> Result<Self, EngineError> {
        let name = name.into();
        let script = std::fs::read_to_string(&config.script_path).map_err(|e| {
            EngineError::Processor {
                name: name.clone(),
                reason: format!(
                    "cannot read script '{}': {e}",
                    config.script_path.display()
                ),
            }
        })?;
        Self::from_script(name, script)
    }

    /// 스크립트 소스 문자열로 새 처리기를 생성합니다.
    pub fn from_script(
        name: impl Into<String>,
        script: impl Into<String>,
    ) -> Result<Self, EngineError> {
        let processor = Self {
            name: name.into(),
            script: script.into(),
            pool: Mutex::new(Vec::new()),
        };

        // 잘못된 스크립트는 여기서 즉시 실패
        let vm = processor.new_vm()?;
        processor.return_vm(vm);

        Ok(processor)
    }

    fn processor_error(&self, reason: impl std::fmt::Display) -> EngineError {
        EngineError::Processor {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    /// 샌드박스된 VM을 하나 생성하고 스크립트를 로드합니다.
    fn new_vm(&self) -> Result<Lua, EngineError> {
        // base 라이브러리는 mlua가 항상 로드하고, 여기에 안전한 모듈만 추가
        let lua = Lua::new_with(
            StdLib::TABLE | StdLib::STRING | StdLib::PACKAGE,
            LuaOptions::default(),
        )
        .map_err(|e| self.processor_error(format_args!("cannot create lua vm: {e}")))?;

        register_json_module(&lua)
            .map_err(|e| self.processor_error(format_args!("cannot register json module: {e}")))?;

        lua.load(&self.script)
            .exec()
            .map_err(|e| self.processor_error(format_args!("cannot load script: {e}")))?;

        let _: mlua::Function = lua
            .globals()
            .get("parse_log")
            .map_err(|_| self.processor_error("script must define a `parse_log` function"))?;

        Ok(lua)
    }

    /// 풀에서 VM을 꺼내거나, 비어 있으면 새로 만듭니다.
    fn checkout_vm(&self) -> Result<Lua, EngineError> {
        let vm = self
            .pool
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop();

        match vm {
            Some(vm) => Ok(vm),
            None => self.new_vm(),
        }
    }

    /// VM을 풀에 반환합니다.
    fn return_vm(&self, vm: Lua) {
        self.pool
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(vm);
    }

    fn call_parse_log(&self, lua: &Lua, record: &LogRecord) -> Result<LogRecord, EngineError> {
        let parse_log: mlua::Function = lua
            .globals()
            .get("parse_log")
            .map_err(|e| self.processor_error(format_args!("script error: {e}")))?;

        let raw = String::from_utf8_lossy(&record.raw_data).into_owned();
        let (level, message, timestamp_raw, metadata): (String, String, String, Table) =
            parse_log
                .call(raw)
                .map_err(|e| self.processor_error(format_args!("script error: {e}")))?;

        // 타임스탬프 파싱은 VM 밖에서 수행
        let timestamp = DateTime::parse_from_rfc3339(&timestamp_raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                self.processor_error(format_args!("cannot parse timestamp '{timestamp_raw}': {e}"))
            })?;

        let metadata = lua_table_to_metadata(lua, metadata)
            .map_err(|e| self.processor_error(format_args!("cannot convert metadata: {e}")))?;

        Ok(LogRecord {
            id: record.id,
            source: record.source.clone(),
            raw_data: record.raw_data.clone(),
            level: LogLevel::parse(&level),
            timestamp,
            message,
            metadata,
        })
    }
}

impl LogProcessor for LuaProcessor {
    fn process(&self, record: LogRecord) -> Result<LogRecord, Fault> {
        let lua = self.checkout_vm().map_err(Fault::from)?;
        let result = self.call_parse_log(&lua, &record);
        self.return_vm(lua);
        result.map_err(Fault::from)
    }
}

/// `require("json")`으로 접근하는 JSON 헬퍼 모듈을 등록합니다.
fn register_json_module(lua: &Lua) -> mlua::Result<()> {
    let loader = lua.create_function(|lua, ()| {
        let module = lua.create_table()?;

        module.set(
            "encode",
            lua.create_function(|lua, value: mlua::Value| {
                let json: serde_json::Value = lua.from_value(value)?;
                serde_json::to_string(&json).map_err(mlua::Error::external)
            })?,
        )?;

        module.set(
            "decode",
            lua.create_function(|lua, text: String| {
                let json: serde_json::Value =
                    serde_json::from_str(&text).map_err(mlua::Error::external)?;
                lua.to_value(&json)
            })?,
        )?;

        Ok(module)
    })?;

    let preload: Table = lua
        .globals()
        .get::<Table>("package")?
        .get::<Table>("preload")?;
    preload.set("json", loader)
}

/// Lua 테이블을 레코드 메타데이터로 변환합니다.
///
/// 빈 테이블은 JSON 배열로 역직렬화될 수 있으므로 객체가 아닌 결과는
/// 빈 메타데이터로 취급합니다.
fn lua_table_to_metadata(lua: &Lua, table: Table) -> mlua::Result<Metadata> {
    let value: serde_json::Value = lua.from_value(mlua::Value::Table(table))?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        _ => Ok(Metadata::new()),
    }
}
