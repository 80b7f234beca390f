//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::RenderArgs;
use crate::config::MixdownConfig;
use crate::engine::{calculate_rms, read_wav_file};
use crate::render::{OutputFormat, RenderStage};
use crate::session::Session;
use crate::sources::SpeechRequest;
use crate::timeline::ClipKind;

/// Load config from file (or defaults), then env, then command-line flags.
pub fn resolve_config(args: &RenderArgs) -> Result<MixdownConfig> {
    let mut config = match &args.config {
        Some(path) => MixdownConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => MixdownConfig::default(),
    };
    config = config.apply_env().context("invalid MIXDOWN_* environment")?;

    if let Some(rate) = args.sample_rate {
        config.target_sample_rate = rate;
    }
    if let Some(bitrate) = args.bitrate {
        config.encoder.bitrate_kbps = bitrate;
    }
    if let Some(quality) = args.quality {
        config.encoder.quality = quality;
    }
    match args.format {
        Some(format) => config.encoder.format = format,
        None => {
            let ext = args.output.extension().and_then(|e| e.to_str());
            if let Some(format) = ext.and_then(|e| e.parse::<OutputFormat>().ok()) {
                config.encoder.format = format;
            }
        }
    }
    config.validate()?;
    Ok(config)
}

/// Build a session from the arguments, render it and write the output.
pub async fn render(args: RenderArgs) -> Result<()> {
    if args.clips.is_empty() && args.speech.is_empty() {
        bail!("nothing to render: pass at least one --clip or --speech");
    }

    let config = resolve_config(&args)?;
    let encoder = config.encoder;
    let mut session = Session::new(config)?;

    for clip in &args.clips {
        let position = clip.at_secs.map(|s| session.secs_to_samples(s));
        let added = session
            .import_path(&clip.value, ClipKind::ImportedMusic, position)
            .await
            .with_context(|| format!("failed to import {}", clip.value.display()))?;
        println!(
            "Imported {} at {:.2}s ({:.2}s)",
            clip.value.display(),
            added.position() as f64 / session.sample_rate() as f64,
            added.trimmed_len() as f64 / session.sample_rate() as f64
        );
    }

    for speech in &args.speech {
        let mut request = SpeechRequest::new(speech.value.clone());
        if let Some(voice) = &args.voice {
            request = request.with_voice(voice.clone());
        }
        let position = speech.at_secs.map(|s| session.secs_to_samples(s));
        let added = session
            .generate_speech(&request, position)
            .await
            .with_context(|| format!("failed to generate speech for \"{}\"", speech.value))?;
        println!(
            "Generated speech at {:.2}s ({:.2}s)",
            added.position() as f64 / session.sample_rate() as f64,
            added.trimmed_len() as f64 / session.sample_rate() as f64
        );
    }

    let cancel = CancellationToken::new();
    let job = session.render_with_token(encoder, cancel.clone());

    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling render");
                cancel.cancel();
            }
        }
    });

    let mut progress = job.subscribe();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let p = *progress.borrow_and_update();
            if p.stage != RenderStage::Pending {
                eprint!("\r{:<10} {:>5.1}%", format!("{:?}", p.stage), p.percent());
            }
        }
        eprintln!();
    });

    let outcome = job.wait().await;
    interrupt.abort();
    let _ = reporter.await;

    let result = match outcome {
        Ok(result) => result,
        Err(e) if e.is_cancellation() => {
            println!("Render cancelled; nothing written.");
            return Ok(());
        }
        Err(e) => return Err(e).context("render failed"),
    };

    result
        .write_to(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!(path = %args.output.display(), digest = %result.digest, "output written");

    println!("Wrote {} ({}, {:.2}s)", args.output.display(), result.format, result.duration_secs());
    if result.gain < 1.0 {
        println!("Peak {:.3} normalized by gain {:.3}", result.peak, result.gain);
    }
    session.accept_render(result);
    Ok(())
}

/// Print format details of a WAV file.
pub fn inspect(path: &Path) -> Result<()> {
    let buffer = read_wav_file(path).with_context(|| format!("failed to read {}", path.display()))?;

    println!("File:        {}", path.display());
    println!("Sample rate: {} Hz", buffer.sample_rate());
    println!("Channels:    {}", buffer.channels());
    println!("Duration:    {:.3}s ({} samples)", buffer.duration_secs(), buffer.len());
    println!("Peak:        {:.4}", buffer.peak());
    println!("RMS:         {:.1} dB", calculate_rms(&buffer));
    Ok(())
}
