//! # Logging モジュール
//!
//! ナビゲーション支援シミュレーションのログ出力を初期化します。
//!
//! 読み上げ・効果音・振動などのフィードバック出力もすべて tracing のイベントとして
//! 記録されるため、ファイル出力（JSON）を有効にするとセッション全体を後から追跡できます。
//!
//! ## 出力先
//!
//! - `Console`: コンソールのみ（compact 形式）
//! - `File`: ファイルのみ（`<log_dir>/<prefix>.YYYY-MM-DD`、JSON 形式、非同期書き込み）
//! - `Both`: コンソールとファイルの両方
//!
//! 環境変数 `RUST_LOG` が設定されている場合は設定レベルより優先されます。

use std::str::FromStr;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// ログ出力先
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
}

impl LogOutput {
    fn writes_file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stdout" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" | "all" => Ok(LogOutput::Both),
            _ => Err(format!("無効な出力先: {}. 利用可能: console, file, both", s)),
        }
    }
}

/// ログ設定
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub output: LogOutput,
    /// ログファイルのディレクトリ（File / Both の場合）
    pub log_dir: String,
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            output: LogOutput::Console,
            log_dir: "logs".to_string(),
            file_prefix: "wayfinder".to_string(),
        }
    }
}

/// ログシステムを初期化
///
/// # 引数
///
/// * `config` - ログ設定
///
/// # 戻り値
///
/// ファイル出力を行う場合は非同期書き込みのガード。プロセス終了まで保持すること。
/// ガードを破棄すると未書き込みのログがフラッシュされ、以降のファイル出力は止まります。
///
/// # 例
///
/// ```no_run
/// use wayfinder::logging::{LogConfig, LogOutput, init_logging};
///
/// let config = LogConfig {
///     output: LogOutput::Both,
///     ..Default::default()
/// };
/// let _guard = init_logging(config).expect("ログ初期化に失敗");
/// ```
pub fn init_logging(
    config: LogConfig,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_string()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.output.writes_file() {
        ensure_log_directory(&config.log_dir)?;
    }

    let console_layer = (config.output != LogOutput::File).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
    });

    let (file_layer, guard) = if config.output.writes_file() {
        let appender = rolling::daily(&config.log_dir, &config.file_prefix);
        let (writer, guard) = non_blocking(appender);
        let layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .json();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

/// ログレベルを文字列から解析。無効な場合は警告を出して INFO
pub fn parse_log_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!("警告: 無効なログレベル '{}'. INFOを使用します", level_str);
            Level::INFO
        }
    }
}

/// `-v` の指定回数からログレベルを決める
pub fn level_from_verbosity(count: u8) -> Level {
    match count {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// ログディレクトリがなければ作成
pub fn ensure_log_directory(log_dir: &str) -> Result<(), std::io::Error> {
    std::fs::create_dir_all(log_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("console", Ok(LogOutput::Console))]
    #[case("STDOUT", Ok(LogOutput::Console))]
    #[case("file", Ok(LogOutput::File))]
    #[case("all", Ok(LogOutput::Both))]
    fn test_log_output_from_str(#[case] input: &str, #[case] expected: Result<LogOutput, String>) {
        assert_eq!(LogOutput::from_str(input), expected);
    }

    #[test]
    fn test_invalid_log_output() {
        assert!(LogOutput::from_str("syslog").is_err());
    }

    #[rstest]
    #[case("debug", Level::DEBUG)]
    #[case("INFO", Level::INFO)]
    #[case("warning", Level::WARN)]
    #[case("invalid", Level::INFO)]
    fn test_parse_log_level(#[case] input: &str, #[case] expected: Level) {
        assert_eq!(parse_log_level(input), expected);
    }

    #[rstest]
    #[case(0, Level::INFO)]
    #[case(1, Level::DEBUG)]
    #[case(4, Level::TRACE)]
    fn test_level_from_verbosity(#[case] count: u8, #[case] expected: Level) {
        assert_eq!(level_from_verbosity(count), expected);
    }
}
