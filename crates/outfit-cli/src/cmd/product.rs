use crate::output::{or_dash, price, print_json, print_table};
use anyhow::Context as _;
use clap::{Args, Subcommand};
use outfit_client::services::products::MIN_SEARCH_CHARS;
use outfit_client::Outfit;
use outfit_core::commerce::AddToCartInput;
use outfit_core::product::{Product, ProductFilter, ProductSort};
use outfit_core::types::SortOrder;
use outfit_core::user::PriceRange;

#[derive(Subcommand)]
pub enum ProductSubcommand {
    /// List products
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Show one product with its variants
    Show { id: String },
    /// Free-text product search
    Search {
        query: String,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Candidate products for a detected item
    Matches { item_id: String },
    /// Add a product variant to the cart
    AddToCart {
        product_id: String,
        #[arg(long)]
        variant: String,
        #[arg(long, default_value_t = 1)]
        quantity: u32,
        #[arg(long)]
        notes: Option<String>,
    },
}

/// Product filter flags shared by `list` and `search`.
#[derive(Args, Default)]
pub struct FilterArgs {
    /// Price range as MIN-MAX, e.g. 20-150
    #[arg(long, value_parser = parse_price_range)]
    pub price: Option<PriceRange>,
    /// Brand (repeatable)
    #[arg(long = "brand")]
    pub brands: Vec<String>,
    /// Color (repeatable)
    #[arg(long = "color")]
    pub colors: Vec<String>,
    /// Size (repeatable)
    #[arg(long = "size")]
    pub sizes: Vec<String>,
    /// Category (repeatable)
    #[arg(long = "category")]
    pub categories: Vec<String>,
    /// Store (repeatable)
    #[arg(long = "store")]
    pub stores: Vec<String>,
    /// Only products in stock
    #[arg(long)]
    pub in_stock: bool,
    /// price, relevance, rating or newest
    #[arg(long, value_parser = parse_sort)]
    pub sort: Option<ProductSort>,
    /// Sort descending
    #[arg(long)]
    pub desc: bool,
}

impl FilterArgs {
    pub fn into_filter(self) -> ProductFilter {
        ProductFilter {
            price_range: self.price,
            brands: self.brands,
            colors: self.colors,
            sizes: self.sizes,
            categories: self.categories,
            stores: self.stores,
            availability: self.in_stock.then_some(true),
            sort_order: self
                .sort
                .map(|_| if self.desc { SortOrder::Desc } else { SortOrder::Asc }),
            sort_by: self.sort,
        }
    }
}

pub(crate) fn parse_price_range(s: &str) -> Result<PriceRange, String> {
    let (min, max) = s
        .split_once('-')
        .ok_or_else(|| format!("expected MIN-MAX, got '{s}'"))?;
    let min: f64 = min.trim().parse().map_err(|_| format!("invalid minimum price '{min}'"))?;
    let max: f64 = max.trim().parse().map_err(|_| format!("invalid maximum price '{max}'"))?;
    if min > max {
        return Err(format!("minimum {min} exceeds maximum {max}"));
    }
    Ok(PriceRange { min, max })
}

fn parse_sort(s: &str) -> Result<ProductSort, String> {
    serde_json::from_value(serde_json::Value::String(s.to_lowercase()))
        .map_err(|_| format!("unknown sort field: {s}"))
}

pub async fn run(outfit: &Outfit, subcmd: ProductSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ProductSubcommand::List { filter } => {
            let products = outfit
                .products()
                .list(&filter.into_filter())
                .await
                .context("failed to list products")?;
            render_products(&products, json)
        }
        ProductSubcommand::Show { id } => show(outfit, &id, json).await,
        ProductSubcommand::Search { query, filter } => {
            let found = outfit
                .products()
                .search(&query, &filter.into_filter())
                .await
                .context("search failed")?;
            match found {
                Some(products) => render_products(&products, json),
                None => anyhow::bail!("search needs at least {MIN_SEARCH_CHARS} characters"),
            }
        }
        ProductSubcommand::Matches { item_id } => {
            let matches = outfit
                .products()
                .matches(&item_id)
                .await
                .with_context(|| format!("failed to fetch matches for item {item_id}"))?
                .unwrap_or_default();
            if json {
                return print_json(&matches);
            }
            let rows = matches
                .iter()
                .map(|m| {
                    vec![
                        m.product.id.clone(),
                        m.product.name.clone(),
                        m.product.brand.clone(),
                        price(m.product.price, &m.product.currency),
                        format!("{:.0}%", m.confidence * 100.0),
                        m.match_reasons.join("; "),
                    ]
                })
                .collect();
            print_table(&["ID", "NAME", "BRAND", "PRICE", "MATCH", "WHY"], rows);
            Ok(())
        }
        ProductSubcommand::AddToCart {
            product_id,
            variant,
            quantity,
            notes,
        } => {
            let input = AddToCartInput {
                product_id,
                variant_id: variant,
                quantity,
                notes,
            };
            let resp = outfit
                .products()
                .add_to_cart(&input)
                .await
                .context("failed to add to cart")?;
            if json {
                print_json(&resp)?;
            } else {
                println!("Added {} × {} to the cart.", input.quantity, input.product_id);
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub(crate) fn render_products(products: &[Product], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&products);
    }
    let rows = products
        .iter()
        .map(|p| {
            vec![
                p.id.clone(),
                p.name.clone(),
                p.brand.clone(),
                price(p.price, &p.currency),
                or_dash(p.discount_percent().map(|d| format!("-{d}%"))),
                or_dash(p.store.as_ref().map(|s| &s.name)),
            ]
        })
        .collect();
    print_table(&["ID", "NAME", "BRAND", "PRICE", "SALE", "STORE"], rows);
    Ok(())
}

async fn show(outfit: &Outfit, id: &str, json: bool) -> anyhow::Result<()> {
    let product = outfit
        .products()
        .get(id)
        .await
        .with_context(|| format!("failed to fetch product {id}"))?
        .context("product id must not be empty")?;

    if json {
        return print_json(&product);
    }
    println!("{} by {}", product.name, product.brand);
    println!("price:  {}", price(product.price, &product.currency));
    if let Some(d) = product.discount_percent() {
        println!("sale:   {d}% off");
    }
    if let Some(store) = &product.store {
        println!("store:  {} ({})", store.name, store.domain);
    }
    if let Some(image) = product.primary_image() {
        println!("image:  {}", image.url);
    }
    if !product.description.is_empty() {
        println!();
        println!("{}", product.description);
    }
    if !product.variants.is_empty() {
        println!();
        let rows = product
            .variants
            .iter()
            .map(|v| {
                vec![
                    v.id.clone(),
                    v.size.clone(),
                    v.color.clone(),
                    price(v.price, &product.currency),
                    if v.is_available {
                        v.stock.to_string()
                    } else {
                        "sold out".into()
                    },
                ]
            })
            .collect();
        print_table(&["VARIANT", "SIZE", "COLOR", "PRICE", "STOCK"], rows);
    }
    Ok(())
}
