use crate::cmd::product::{parse_price_range, render_products};
use anyhow::Context as _;
use clap::Subcommand;
use outfit_client::services::recommendations::{CATEGORY_LIMIT, SIMILAR_LIMIT, TRENDING_LIMIT};
use outfit_client::Outfit;
use outfit_core::commerce::PersonalizedFilter;
use outfit_core::user::PriceRange;

#[derive(Subcommand)]
pub enum RecommendSubcommand {
    /// Picks for the dashboard
    Dashboard,
    /// Recommendations tailored to your preferences
    Personalized {
        #[arg(long)]
        category: Option<String>,
        /// Price range as MIN-MAX
        #[arg(long, value_parser = parse_price_range)]
        price: Option<PriceRange>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// What is popular right now
    Trending {
        #[arg(long, default_value_t = TRENDING_LIMIT)]
        limit: u32,
    },
    /// Top products in one category
    Category {
        name: String,
        #[arg(long, default_value_t = CATEGORY_LIMIT)]
        limit: u32,
    },
    /// Products similar to another product
    Similar {
        product_id: String,
        #[arg(long, default_value_t = SIMILAR_LIMIT)]
        limit: u32,
    },
}

pub async fn run(outfit: &Outfit, subcmd: RecommendSubcommand, json: bool) -> anyhow::Result<()> {
    let recs = outfit.recommendations();
    let products = match subcmd {
        RecommendSubcommand::Dashboard => recs.dashboard().await,
        RecommendSubcommand::Personalized {
            category,
            price,
            limit,
        } => {
            let filter = PersonalizedFilter {
                category,
                price_range: price,
                limit,
            };
            recs.personalized(Some(&filter)).await
        }
        RecommendSubcommand::Trending { limit } => recs.trending(limit).await,
        RecommendSubcommand::Category { name, limit } => recs
            .category(&name, limit)
            .await
            .map(Option::unwrap_or_default),
        RecommendSubcommand::Similar { product_id, limit } => recs
            .similar(&product_id, limit)
            .await
            .map(Option::unwrap_or_default),
    }
    .context("failed to fetch recommendations")?;

    render_products(&products, json)
}
