use crate::output::{or_dash, price, print_json, print_table};
use anyhow::Context as _;
use clap::Subcommand;
use outfit_client::Outfit;
use outfit_core::saved_look::{
    CreateSavedLookInput, LookItemSelection, SavedLook, SavedLookFilter, UpdateSavedLookInput,
};

#[derive(Subcommand)]
pub enum LookSubcommand {
    /// List saved looks
    List {
        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Only public looks
        #[arg(long)]
        public: bool,
    },
    /// Show one saved look
    Show { id: String },
    /// The newest looks
    Dashboard,
    /// Save a look
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        image_url: String,
        #[arg(long)]
        description: Option<String>,
        /// DETECTED_ITEM[:PRODUCT[:VARIANT]] (repeatable)
        #[arg(long = "item", value_parser = parse_selection)]
        items: Vec<LookItemSelection>,
        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        public: bool,
    },
    /// Rename, retag or change visibility of a look
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Replace the tags (repeatable)
        #[arg(long = "tag")]
        tags: Option<Vec<String>>,
        #[arg(long)]
        public: Option<bool>,
    },
    /// Delete a saved look
    Delete { id: String },
}

fn parse_selection(s: &str) -> Result<LookItemSelection, String> {
    let mut parts = s.split(':').map(str::trim);
    let detected_item_id = parts
        .next()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| format!("missing detected item id in '{s}'"))?
        .to_string();
    let non_empty = |p: Option<&str>| p.filter(|p| !p.is_empty()).map(str::to_string);
    let selected_product_id = non_empty(parts.next());
    let selected_variant_id = non_empty(parts.next());
    if parts.next().is_some() {
        return Err(format!("too many ':' separated parts in '{s}'"));
    }
    Ok(LookItemSelection {
        detected_item_id,
        selected_product_id,
        selected_variant_id,
        notes: None,
    })
}

pub async fn run(outfit: &Outfit, subcmd: LookSubcommand, json: bool) -> anyhow::Result<()> {
    let looks = outfit.saved_looks();
    match subcmd {
        LookSubcommand::List { tags, public } => {
            let filter = SavedLookFilter {
                tags,
                is_public: public.then_some(true),
                ..Default::default()
            };
            let list = looks.list(&filter).await.context("failed to list looks")?;
            render_looks(&list, json)
        }
        LookSubcommand::Show { id } => {
            let look = looks
                .get(&id)
                .await
                .with_context(|| format!("failed to fetch look {id}"))?
                .context("look id must not be empty")?;
            if json {
                return print_json(&look);
            }
            print_look(&look);
            Ok(())
        }
        LookSubcommand::Dashboard => {
            let list = looks.dashboard().await.context("failed to fetch looks")?;
            render_looks(&list, json)
        }
        LookSubcommand::Create {
            name,
            image_url,
            description,
            items,
            tags,
            public,
        } => {
            let input = CreateSavedLookInput {
                name,
                description,
                image_url,
                items,
                tags,
                is_public: public.then_some(true),
            };
            let look = looks.create(&input).await.context("failed to save look")?;
            if json {
                print_json(&look)?;
            } else {
                println!("Saved look '{}' ({})", look.name, look.id);
            }
            Ok(())
        }
        LookSubcommand::Update {
            id,
            name,
            description,
            tags,
            public,
        } => {
            let input = UpdateSavedLookInput {
                name,
                description,
                items: None,
                tags,
                is_public: public,
            };
            let look = looks
                .update(&id, &input)
                .await
                .with_context(|| format!("failed to update look {id}"))?;
            if json {
                print_json(&look)?;
            } else {
                println!("Updated look '{}'", look.name);
            }
            Ok(())
        }
        LookSubcommand::Delete { id } => {
            looks
                .delete(&id)
                .await
                .with_context(|| format!("failed to delete look {id}"))?;
            println!("Deleted look {id}");
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render_looks(looks: &[SavedLook], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&looks);
    }
    let rows = looks
        .iter()
        .map(|l| {
            vec![
                l.id.clone(),
                l.name.clone(),
                l.items.len().to_string(),
                or_dash(l.total.as_ref().map(|t| price(t.estimated_price, &t.currency))),
                l.tags.join(","),
                or_dash(l.created_at.map(|t| t.format("%Y-%m-%d %H:%M"))),
            ]
        })
        .collect();
    print_table(&["ID", "NAME", "ITEMS", "TOTAL", "TAGS", "CREATED"], rows);
    Ok(())
}

fn print_look(look: &SavedLook) {
    println!("{} ({})", look.name, look.id);
    if let Some(d) = &look.description {
        println!("{d}");
    }
    println!("image:   {}", look.image_url);
    println!("public:  {}", look.is_public);
    if let Some(total) = &look.total {
        println!(
            "total:   {} across {} store(s), {}",
            price(total.estimated_price, &total.currency),
            total.store_count,
            total.availability.as_str()
        );
    }
    println!();
    let rows = look
        .items
        .iter()
        .map(|i| {
            vec![
                i.detected_item.category.clone(),
                i.detected_item.color.clone(),
                or_dash(i.selected_product.as_ref().map(|p| &p.name)),
                or_dash(
                    i.selected_product
                        .as_ref()
                        .map(|p| price(p.price, &p.currency)),
                ),
            ]
        })
        .collect();
    print_table(&["CATEGORY", "COLOR", "PRODUCT", "PRICE"], rows);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_accepts_item_product_and_variant() {
        let s = parse_selection("d1:p1:v1").unwrap();
        assert_eq!(s.detected_item_id, "d1");
        assert_eq!(s.selected_product_id.as_deref(), Some("p1"));
        assert_eq!(s.selected_variant_id.as_deref(), Some("v1"));
    }

    #[test]
    fn selection_without_product() {
        let s = parse_selection("d1").unwrap();
        assert!(s.selected_product_id.is_none());
        assert!(parse_selection(":p1").is_err());
        assert!(parse_selection("a:b:c:d").is_err());
    }
}
