use crate::output::print_json;
use anyhow::Context as _;
use outfit_client::{ApiError, Outfit, ProgressFn, UploadFile};
use outfit_core::analysis::CreateAnalysisInput;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Upload `file`, drawing progress on stderr. Ctrl-C cancels the transfer.
pub async fn run(
    outfit: &Outfit,
    file: &Path,
    mime_type: Option<String>,
    analyze: bool,
    json: bool,
) -> anyhow::Result<()> {
    let mut upload = UploadFile::from_path(file)
        .await
        .with_context(|| format!("cannot read {}", file.display()))?;
    if let Some(mime) = mime_type {
        upload = upload.with_mime_type(mime);
    }
    tracing::debug!(file = %file.display(), mime = upload.mime_type(), size = upload.len(), "uploading");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let progress: Option<ProgressFn> = if json {
        None
    } else {
        Some(Arc::new(|pct: f64| {
            eprint!("\ruploading… {pct:>3.0}%");
            let _ = std::io::stderr().flush();
        }))
    };

    let result = outfit.api().upload(upload, progress, Some(cancel)).await;
    interrupt.abort();
    if !json {
        eprintln!();
    }

    let descriptor = match result {
        Ok(d) => d,
        Err(ApiError::Cancelled) => anyhow::bail!("upload cancelled"),
        Err(e) => return Err(e).context("upload failed"),
    };

    if !analyze {
        if json {
            print_json(&descriptor)?;
        } else {
            println!("Uploaded {} ({} bytes)", descriptor.filename, descriptor.size);
            println!("id:  {}", descriptor.id);
            println!("url: {}", descriptor.url);
        }
        return Ok(());
    }

    let input = CreateAnalysisInput {
        image_url: descriptor.url.clone(),
        image_id: descriptor.id.clone(),
        privacy_settings: None,
    };
    let analysis = outfit
        .analyses()
        .create(&input)
        .await
        .context("failed to start analysis")?;

    if json {
        print_json(&serde_json::json!({
            "upload": descriptor,
            "analysis": analysis,
        }))?;
    } else {
        println!("Uploaded {} and started analysis {}.", descriptor.filename, analysis.id);
        println!("Follow it with `outfit watch` or `outfit analysis show {}`.", analysis.id);
    }
    Ok(())
}
