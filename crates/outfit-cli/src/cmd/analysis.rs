use crate::output::{or_dash, print_json, print_table};
use anyhow::Context as _;
use chrono::Utc;
use clap::Subcommand;
use outfit_client::Outfit;
use outfit_core::analysis::{Analysis, AnalysisFilter, AnalysisStatus, CreateAnalysisInput, UserFeedback};
use outfit_core::types::DateRange;

#[derive(Subcommand)]
pub enum AnalysisSubcommand {
    /// List analyses
    List {
        /// Only these statuses (repeatable): pending, processing, detecting,
        /// matching, completed, failed, cancelled
        #[arg(long = "status", value_parser = parse_status)]
        status: Vec<AnalysisStatus>,
        /// Only analyses with product matches
        #[arg(long)]
        has_matches: bool,
        /// Minimum detection confidence (0-1)
        #[arg(long)]
        min_confidence: Option<f64>,
        /// ISO-8601 start date (requires --until)
        #[arg(long, requires = "until")]
        since: Option<String>,
        /// ISO-8601 end date
        #[arg(long, requires = "since")]
        until: Option<String>,
    },
    /// Show one analysis with its detected items
    Show { id: String },
    /// Start an analysis for an already uploaded image
    Create {
        #[arg(long)]
        image_url: String,
        #[arg(long)]
        image_id: String,
    },
    /// Delete an analysis
    Delete { id: String },
    /// Patch one detected item with a JSON object, e.g. '{"color":"navy"}'
    EditItem {
        analysis_id: String,
        item_id: String,
        patch: String,
    },
    /// Rate how well an item was detected
    Feedback {
        analysis_id: String,
        item_id: String,
        /// Rating from 1 to 5
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: u8,
        /// The detection was wrong
        #[arg(long)]
        inaccurate: bool,
        #[arg(long)]
        comment: Option<String>,
    },
}

fn parse_status(s: &str) -> Result<AnalysisStatus, String> {
    serde_json::from_value(serde_json::Value::String(s.to_lowercase()))
        .map_err(|_| format!("unknown status: {s}"))
}

pub async fn run(outfit: &Outfit, subcmd: AnalysisSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        AnalysisSubcommand::List {
            status,
            has_matches,
            min_confidence,
            since,
            until,
        } => {
            let filter = AnalysisFilter {
                status,
                date_range: since
                    .zip(until)
                    .map(|(start, end)| DateRange { start, end }),
                has_matches: has_matches.then_some(true),
                confidence_threshold: min_confidence,
            };
            list(outfit, &filter, json).await
        }
        AnalysisSubcommand::Show { id } => show(outfit, &id, json).await,
        AnalysisSubcommand::Create { image_url, image_id } => {
            let input = CreateAnalysisInput {
                image_url,
                image_id,
                privacy_settings: None,
            };
            let analysis = outfit
                .analyses()
                .create(&input)
                .await
                .context("failed to create analysis")?;
            if json {
                print_json(&analysis)?;
            } else {
                println!("Created analysis {} ({})", analysis.id, analysis.status);
            }
            Ok(())
        }
        AnalysisSubcommand::Delete { id } => {
            outfit
                .analyses()
                .delete(&id)
                .await
                .with_context(|| format!("failed to delete analysis {id}"))?;
            println!("Deleted analysis {id}");
            Ok(())
        }
        AnalysisSubcommand::EditItem {
            analysis_id,
            item_id,
            patch,
        } => {
            let patch: serde_json::Value =
                serde_json::from_str(&patch).context("patch must be a JSON object")?;
            if !patch.is_object() {
                anyhow::bail!("patch must be a JSON object");
            }
            let item = outfit
                .analyses()
                .update_item(&analysis_id, &item_id, &patch)
                .await
                .context("failed to update item")?;
            if json {
                print_json(&item)?;
            } else {
                println!("Updated item {} ({} {})", item.id, item.color, item.category);
            }
            Ok(())
        }
        AnalysisSubcommand::Feedback {
            analysis_id,
            item_id,
            rating,
            inaccurate,
            comment,
        } => {
            let feedback = UserFeedback {
                is_accurate: !inaccurate,
                corrected_attributes: None,
                rating,
                comments: comment,
                submitted_at: Utc::now(),
            };
            outfit
                .analyses()
                .submit_feedback(&analysis_id, &item_id, &feedback)
                .await
                .context("failed to submit feedback")?;
            println!("Thanks, feedback recorded.");
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// list / show
// ---------------------------------------------------------------------------

async fn list(outfit: &Outfit, filter: &AnalysisFilter, json: bool) -> anyhow::Result<()> {
    let analyses = outfit
        .analyses()
        .list(filter)
        .await
        .context("failed to list analyses")?;

    if json {
        return print_json(&analyses);
    }
    let rows = analyses
        .iter()
        .map(|a| {
            vec![
                a.id.clone(),
                a.status.to_string(),
                format!("{:.0}%", a.progress),
                a.detected_items.len().to_string(),
                or_dash(a.created_at.map(|t| t.format("%Y-%m-%d %H:%M"))),
            ]
        })
        .collect();
    print_table(&["ID", "STATUS", "PROGRESS", "ITEMS", "CREATED"], rows);
    Ok(())
}

async fn show(outfit: &Outfit, id: &str, json: bool) -> anyhow::Result<()> {
    let analysis = outfit
        .analyses()
        .get(id)
        .await
        .with_context(|| format!("failed to fetch analysis {id}"))?
        .context("analysis id must not be empty")?;

    if json {
        return print_json(&analysis);
    }
    print_analysis(&analysis);
    Ok(())
}

fn print_analysis(a: &Analysis) {
    println!("id:        {}", a.id);
    println!("status:    {}", a.status);
    if !a.status.is_terminal() {
        println!("progress:  {:.0}%", a.progress);
    }
    println!("image:     {}", a.image_url);
    if let Some(meta) = &a.metadata {
        println!("model:     {}", meta.model_version);
    }
    println!();

    let rows = a
        .detected_items
        .iter()
        .map(|i| {
            vec![
                i.id.clone(),
                i.category.clone(),
                i.item_type.clone(),
                i.color.clone(),
                format!("{:.0}%", i.confidence * 100.0),
                i.product_matches.len().to_string(),
                if i.is_edited { "yes".into() } else { String::new() },
            ]
        })
        .collect();
    print_table(
        &["ITEM", "CATEGORY", "TYPE", "COLOR", "CONF", "MATCHES", "EDITED"],
        rows,
    );
}
