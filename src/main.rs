use clap::{Arg, ArgAction, Command};
use tracing::{error, info};

use wayfinder::logging::{LogConfig, LogOutput, init_logging, level_from_verbosity, parse_log_level};
use wayfinder::scenario::ScenarioConfig;
use wayfinder::simulation::SimulationEngine;

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("wayfinder")
        .version("0.1.0")
        .about("屋内ナビゲーション支援シミュレーター (Wayfinder)")
        .long_about("視覚障害者向け屋内ナビゲーション支援のシミュレーター\n\
                     環境スキャンから経路誘導、到着までを時間駆動で再現します。")
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
                .long_help("実行するシナリオファイル(.yaml)のパスを指定します。\n\
                           指定しない場合、利用可能なシナリオの一覧を表示します。")
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("詳細出力レベル (-v: 進行状況とデバッグログ, -vv: トレースログ)")
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベル (trace, debug, info, warn, error)。-v より優先")
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("OUTPUT")
                .default_value("console")
                .value_parser(|s: &str| s.parse::<LogOutput>())
                .help("ログ出力先 (console, file, both)")
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .value_name("DIR")
                .default_value("logs")
                .help("ログファイルの出力ディレクトリ")
        )
        .get_matches();

    let verbose_level = matches.get_count("verbose");
    let level = matches
        .get_one::<String>("log-level")
        .map(|s| parse_log_level(s))
        .unwrap_or_else(|| level_from_verbosity(verbose_level));

    let log_config = LogConfig {
        level,
        output: matches
            .get_one::<LogOutput>("log-output")
            .copied()
            .unwrap_or(LogOutput::Console),
        log_dir: matches
            .get_one::<String>("log-dir")
            .cloned()
            .unwrap_or_else(|| "logs".to_string()),
        ..Default::default()
    };

    // ガードはプロセス終了まで保持する
    let _guard = match init_logging(log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ログの初期化に失敗しました: {}", e);
            std::process::exit(1);
        }
    };

    println!("屋内ナビゲーション支援シミュレーター - wayfinder v0.1.0");
    println!();

    if let Some(scenario_path) = matches.get_one::<String>("scenario") {
        match run_scenario(scenario_path, matches.get_flag("info"), verbose_level) {
            Ok(()) => info!(path = %scenario_path, "シナリオ実行が正常に完了しました"),
            Err(e) => {
                error!(error = %e, "シナリオ実行に失敗しました");
                eprintln!("エラー: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        show_default_help();
    }
}

/// シナリオファイルを読み込んで実行
fn run_scenario(
    scenario_path: &str,
    info_only: bool,
    verbose_level: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = ScenarioConfig::from_file(scenario_path)?;
    info!(path = %scenario_path, "シナリオファイル読み込み完了");

    scenario.print_summary();
    println!();
    if info_only {
        return Ok(());
    }

    let mut engine = SimulationEngine::new(scenario, verbose_level);
    engine.initialize();
    let report = engine.run();
    report.print();

    if let Some(err) = report.navigation_error {
        return Err(Box::new(err));
    }
    Ok(())
}

/// デフォルトヘルプとシナリオ一覧を表示
fn show_default_help() {
    println!("使用方法:");
    println!("  wayfinder [オプション]");
    println!();
    println!("オプション:");
    println!("  -s, --scenario <FILE>     シナリオファイルを指定して実行");
    println!("  -i, --info                シナリオ情報のみ表示");
    println!("  -v, --verbose             詳細出力 (複数指定で詳細レベル上昇)");
    println!("      --log-level <LEVEL>   ログレベルを指定");
    println!("      --log-output <OUTPUT> ログ出力先 (console, file, both)");
    println!("      --log-dir <DIR>       ログファイルの出力ディレクトリ");
    println!("  -h, --help                このヘルプを表示");
    println!();
    println!("利用可能なシナリオファイル:");
    println!("  scenarios/corridor.yaml     - 廊下を直進し、脇の障害物を避けて突き当たりへ");
    println!("  scenarios/living_room.yaml  - 家具のある部屋を壁沿いに大回りして対角の目的地へ");
    println!();
    println!("例:");
    println!("  wayfinder -s scenarios/corridor.yaml");
    println!("  wayfinder -s scenarios/living_room.yaml -v");
    println!("  wayfinder -s scenarios/living_room.yaml -i");
    println!("  wayfinder -s scenarios/corridor.yaml --log-output both --log-dir logs");
}
