use clap::Parser;
use condenser_view::config::{reply_value, LogFormat};
use condenser_view::domain::model::SessionPhase;
use condenser_view::utils::error::{CondenserError, ErrorSeverity};
use condenser_view::utils::logger;
use condenser_view::{
    CliConfig, HttpStreamSource, LocalStorage, SessionConfig, StreamSession, TimelineRenderer,
    TranscriptWriter,
};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Upper bound on unattended resumes so a looping workflow cannot spin forever.
const MAX_AUTO_RESUMES: usize = 20;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    match cli.log_format {
        LogFormat::Compact => logger::init_cli_logger(cli.verbose),
        LogFormat::Json => logger::init_json_logger(cli.verbose),
    }
    tracing::debug!("CLI config: {:?}", cli);

    let config = match SessionConfig::resolve(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        tracing::error!(
            "❌ Session failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run(config: SessionConfig) -> Result<(), CondenserError> {
    let source = HttpStreamSource::from_config(&config)?;
    tracing::info!("🔗 Streaming from {}", source.url());

    let mut session = StreamSession::new(source, config.thread_id.clone());
    if !config.quiet {
        session = session.with_observer(Box::new(TimelineRenderer::stdout()));
    }

    match &config.resume {
        Some(value) => session.resume_existing(value.clone()).await?,
        None => session.start(config.input.clone()).await?,
    };

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut auto_resumes = 0;
    while let SessionPhase::Paused { interrupt } = session.phase() {
        let reply = match &config.auto_resume {
            Some(_) if auto_resumes >= MAX_AUTO_RESUMES => {
                tracing::warn!("Stopping after {} automatic resumes", MAX_AUTO_RESUMES);
                None
            }
            Some(value) => {
                auto_resumes += 1;
                Some(value.clone())
            }
            None => prompt_reply(&mut stdin, &interrupt.value).await?,
        };

        match reply {
            Some(value) => {
                session.resume(value).await?;
            }
            None => {
                tracing::info!("⏸️  Leaving thread {} paused", config.thread_id);
                break;
            }
        }
    }

    let view = session.into_view();
    println!("{}", condenser_view::adapters::render::format_summary(&view));

    if config.write_transcript {
        let storage = LocalStorage::new(config.output_dir.clone());
        let dir = storage.base_path().to_string();
        let files = TranscriptWriter::new(storage).write(&view).await?;
        tracing::info!("📁 Transcript saved to {}/{}", dir, files.json);
        println!("📁 Transcript: {}/{} and {}", dir, files.json, files.csv);
    }

    if let SessionPhase::Failed { reason } = &view.phase {
        return Err(CondenserError::RunFailed {
            reason: reason.clone(),
        });
    }
    Ok(())
}

/// Ask on stdin; an empty line or EOF leaves the thread paused.
async fn prompt_reply(
    stdin: &mut Lines<BufReader<Stdin>>,
    question: &serde_json::Value,
) -> Result<Option<serde_json::Value>, CondenserError> {
    let question = match question {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "The workflow is waiting for input".to_string(),
        other => serde_json::to_string_pretty(other)?,
    };
    print!("\n{}\n> ", question);
    std::io::stdout().flush()?;

    let line = stdin.next_line().await?.unwrap_or_default();
    if line.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(reply_value(&line)))
}
