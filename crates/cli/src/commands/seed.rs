//! Seed the catalog and shipping configuration from a YAML file.
//!
//! Every section is optional. Existing rows are left untouched, so a file can
//! be applied repeatedly: categories match by slug, products by SKU, zones by
//! name, carriers by code and rules by carrier, zone and name. Products get
//! their initial stock through a restock ledger entry.
//!
//! See `seed/demo.yaml` for the format.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use sqlx::PgPool;
use tracing::{error, info};

use andes_api::db::{CategoryRepository, ProductRepository, ShippingRepository};
use andes_api::models::{
    AdjustmentKind, CarrierInput, CategoryInput, ProductInput, RuleInput, StockAdjustment,
    ZoneInput,
};
use andes_api::services::catalog::CatalogService;
use andes_api::services::inventory::adjust_stock;
use andes_core::catalog::{normalize_sku, resolve_slug, slugify};
use andes_core::{CarrierId, CategoryId, Clp, ShippingRuleId, ZoneId};

type SeedResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedFile {
    #[serde(default)]
    pub categories: Vec<SeedCategory>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
    #[serde(default)]
    pub zones: Vec<ZoneInput>,
    #[serde(default)]
    pub carriers: Vec<CarrierInput>,
    #[serde(default)]
    pub rules: Vec<SeedRule>,
}

/// A category; `parent` is the parent's slug.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedCategory {
    pub name: String,
    pub slug: Option<String>,
    pub parent: Option<String>,
    #[serde(default)]
    pub position: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A product; `category` is a category slug and `stock` the units received.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    #[serde(flatten)]
    pub product: ProductInput,
    pub category: Option<String>,
    #[serde(default)]
    pub stock: i32,
}

/// A shipping rule referencing its carrier by code and its zone by name.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedRule {
    pub carrier: String,
    pub zone: String,
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub min_weight_grams: i32,
    pub max_weight_grams: Option<i32>,
    #[serde(default)]
    pub min_amount: Clp,
    pub max_amount: Option<Clp>,
    pub base_cost: Clp,
    #[serde(default)]
    pub cost_per_kg: Clp,
    pub free_over_amount: Option<Clp>,
    pub eta_days: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl SeedRule {
    fn to_input(&self, carrier_id: CarrierId, zone_id: ZoneId) -> RuleInput {
        RuleInput {
            carrier_id,
            zone_id,
            name: self.name.clone(),
            priority: self.priority,
            min_weight_grams: self.min_weight_grams,
            max_weight_grams: self.max_weight_grams,
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            base_cost: self.base_cost,
            cost_per_kg: self.cost_per_kg,
            free_over_amount: self.free_over_amount,
            eta_days: self.eta_days,
            is_active: self.is_active,
        }
    }
}

const fn default_true() -> bool {
    true
}

impl SeedFile {
    /// Checks that need no database: duplicates within the file and
    /// negative stock.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let mut slugs = HashSet::new();
        for category in &self.categories {
            match resolve_slug(category.slug.as_deref(), &category.name) {
                Ok(slug) if !slugs.insert(slug.clone()) => {
                    errors.push(format!("category slug '{slug}' appears twice"));
                }
                Ok(_) => {}
                Err(e) => errors.push(format!("category '{}': {e}", category.name)),
            }
        }

        let mut skus = HashSet::new();
        for item in &self.products {
            match normalize_sku(&item.product.sku) {
                Ok(sku) if !skus.insert(sku.clone()) => {
                    errors.push(format!("SKU '{sku}' appears twice"));
                }
                Ok(_) => {}
                Err(e) => errors.push(format!("product '{}': {e}", item.product.name)),
            }
            if item.stock < 0 {
                errors.push(format!(
                    "product '{}': stock cannot be negative",
                    item.product.sku
                ));
            }
        }

        let mut codes = HashSet::new();
        for carrier in &self.carriers {
            let code = carrier.code.trim().to_ascii_lowercase();
            if !codes.insert(code.clone()) {
                errors.push(format!("carrier code '{code}' appears twice"));
            }
        }

        errors
    }
}

/// Created and already-present counts for one section.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Tally {
    created: usize,
    existing: usize,
}

/// Load a seed file into the database.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation,
/// references an unknown category, carrier or zone, or a database write fails.
pub async fn run(file_path: &str) -> SeedResult<()> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading seed file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;

    let errors = seed.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("  {e}");
        }
        return Err(format!("{} validation error(s) in {file_path}", errors.len()).into());
    }

    let pool = super::connect().await?;

    let (categories, category_tally) = seed_categories(&pool, &seed.categories).await?;
    let product_tally = seed_products(&pool, &seed.products, &categories).await?;
    let (zone_tally, carrier_tally, rule_tally) = seed_shipping(&pool, &seed).await?;

    info!("Seed complete");
    for (section, tally) in [
        ("categories", category_tally),
        ("products", product_tally),
        ("zones", zone_tally),
        ("carriers", carrier_tally),
        ("rules", rule_tally),
    ] {
        info!(
            "  {section}: {} created, {} already present",
            tally.created, tally.existing
        );
    }
    Ok(())
}

async fn seed_categories(
    pool: &PgPool,
    items: &[SeedCategory],
) -> SeedResult<(HashMap<String, CategoryId>, Tally)> {
    let mut by_slug: HashMap<String, CategoryId> = CategoryRepository::new(pool)
        .list(true)
        .await?
        .into_iter()
        .map(|c| (c.slug, c.id))
        .collect();
    let service = CatalogService::new(pool);
    let mut tally = Tally::default();

    // Parents must come before their children in the file.
    for item in items {
        let slug = resolve_slug(item.slug.as_deref(), &item.name)?;
        if by_slug.contains_key(&slug) {
            tally.existing += 1;
            continue;
        }
        let parent_id = match &item.parent {
            Some(parent) => Some(lookup(&by_slug, &slugify(parent), "category", &slug)?),
            None => None,
        };

        let category = service
            .create_category(&CategoryInput {
                name: item.name.clone(),
                slug: Some(slug),
                parent_id,
                position: item.position,
                is_active: item.is_active,
            })
            .await?;
        info!(id = %category.id, slug = %category.slug, "Created category");
        by_slug.insert(category.slug, category.id);
        tally.created += 1;
    }

    Ok((by_slug, tally))
}

async fn seed_products(
    pool: &PgPool,
    items: &[SeedProduct],
    categories: &HashMap<String, CategoryId>,
) -> SeedResult<Tally> {
    let repo = ProductRepository::new(pool);
    let mut tally = Tally::default();

    for item in items {
        let mut input = item.product.clone();
        if let Some(category) = &item.category {
            input.category_id = Some(lookup(
                categories,
                &slugify(category),
                "category",
                &input.sku,
            )?);
        }
        let draft = input.validate()?;

        if repo.get_by_sku(&draft.sku).await?.is_some() {
            tally.existing += 1;
            continue;
        }

        let product = repo.create(&draft).await?;
        if item.stock > 0 {
            let receipt = StockAdjustment {
                delta: item.stock,
                reason: Some("initial stock (seed)".to_owned()),
                kind: Some(AdjustmentKind::Restock),
            };
            adjust_stock(pool, product.id, &receipt, None).await?;
        }
        info!(id = %product.id, sku = %product.sku, stock = item.stock, "Created product");
        tally.created += 1;
    }

    Ok(tally)
}

async fn seed_shipping(pool: &PgPool, seed: &SeedFile) -> SeedResult<(Tally, Tally, Tally)> {
    let repo = ShippingRepository::new(pool);
    let context = repo.context().await?;

    let mut zones: HashMap<String, ZoneId> = context
        .zones
        .iter()
        .map(|z| (z.name.clone(), z.id))
        .collect();
    let mut zone_tally = Tally::default();
    for input in &seed.zones {
        let zone = input.clone().normalized()?;
        if zones.contains_key(&zone.name) {
            zone_tally.existing += 1;
            continue;
        }
        let created = repo
            .create_zone(&zone.name, &zone.region_codes, zone.is_active)
            .await?;
        info!(id = %created.id, name = %created.name, "Created shipping zone");
        zones.insert(created.name, created.id);
        zone_tally.created += 1;
    }

    let mut carriers: HashMap<String, CarrierId> = context
        .carriers
        .iter()
        .map(|c| (c.code.clone(), c.id))
        .collect();
    let mut carrier_tally = Tally::default();
    for input in &seed.carriers {
        let carrier = input.clone().normalized()?;
        if carriers.contains_key(&carrier.code) {
            carrier_tally.existing += 1;
            continue;
        }
        let created = repo
            .create_carrier(&carrier.code, &carrier.name, carrier.is_active)
            .await?;
        info!(id = %created.id, code = %created.code, "Created carrier");
        carriers.insert(created.code, created.id);
        carrier_tally.created += 1;
    }

    let mut rules: HashSet<(CarrierId, ZoneId, String)> = context
        .rules
        .iter()
        .map(|r| (r.carrier_id, r.zone_id, r.name.clone()))
        .collect();
    let mut rule_tally = Tally::default();
    for item in &seed.rules {
        let carrier_id = lookup(
            &carriers,
            &item.carrier.trim().to_ascii_lowercase(),
            "carrier",
            &item.name,
        )?;
        let zone_id = lookup(&zones, item.zone.trim(), "zone", &item.name)?;
        let rule = item
            .to_input(carrier_id, zone_id)
            .into_rule(ShippingRuleId::new(0))?;

        if !rules.insert((carrier_id, zone_id, rule.name.clone())) {
            rule_tally.existing += 1;
            continue;
        }
        let created = repo.create_rule(&rule).await?;
        info!(id = %created.id, name = %created.name, "Created shipping rule");
        rule_tally.created += 1;
    }

    Ok((zone_tally, carrier_tally, rule_tally))
}

fn lookup<T: Copy>(
    known: &HashMap<String, T>,
    key: &str,
    kind: &str,
    referrer: &str,
) -> SeedResult<T> {
    known
        .get(key)
        .copied()
        .ok_or_else(|| format!("{referrer}: unknown {kind} '{key}'").into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const DEMO: &str = include_str!("../../../../seed/demo.yaml");

    #[test]
    fn test_demo_file_parses_and_validates() {
        let seed: SeedFile = serde_yaml::from_str(DEMO).unwrap();
        assert_eq!(seed.categories.len(), 4);
        assert_eq!(seed.products.len(), 3);
        assert_eq!(seed.zones.len(), 3);
        assert_eq!(seed.carriers.len(), 2);
        assert_eq!(seed.rules.len(), 3);
        assert!(seed.validate().is_empty(), "{:?}", seed.validate());

        let te = &seed.products[1];
        assert_eq!(te.category.as_deref(), Some("cafe-y-te"));
        assert_eq!(te.product.discount_price, Some(Clp::new(4_990)));
        assert_eq!(te.stock, 25);
        assert!(te.product.is_active);
    }

    #[test]
    fn test_sections_are_optional() {
        let seed: SeedFile = serde_yaml::from_str("carriers:\n  - code: blue\n    name: Blue Express\n").unwrap();
        assert!(seed.categories.is_empty());
        assert!(seed.rules.is_empty());
        assert!(seed.carriers[0].is_active);
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        assert!(serde_yaml::from_str::<SeedFile>("coupons: []\n").is_err());
    }

    #[test]
    fn test_rule_defaults() {
        let rule: SeedRule = serde_yaml::from_str(
            "carrier: starken\nzone: Zona Sur\nname: Sur\nbase_cost: 4990\neta_days: 5\n",
        )
        .unwrap();
        let rule = rule
            .to_input(CarrierId::new(1), ZoneId::new(2))
            .into_rule(ShippingRuleId::new(0))
            .unwrap();
        assert_eq!(rule.cost_per_kg, Clp::ZERO);
        assert_eq!(rule.max_weight_grams, None);
        assert!(rule.is_active);
    }

    #[test]
    fn test_validate_reports_duplicates_and_negative_stock() {
        let seed: SeedFile = serde_yaml::from_str(
            r"
categories:
  - name: Vinos
  - name: Otros vinos
    slug: vinos
products:
  - sku: vin-1
    name: Uno
    price: 1000
  - sku: VIN-1
    name: Dos
    price: 1000
    stock: -3
carriers:
  - code: Starken
    name: Starken
  - code: starken
    name: Starken 2
",
        )
        .unwrap();
        let errors = seed.validate();
        assert_eq!(errors.len(), 4, "{errors:?}");
        assert!(errors[0].contains("'vinos'"));
        assert!(errors[1].contains("'VIN-1'"));
        assert!(errors[2].contains("stock cannot be negative"));
        assert!(errors[3].contains("'starken'"));
    }

    #[test]
    fn test_lookup_names_the_referrer() {
        let known = HashMap::from([("rm".to_owned(), ZoneId::new(1))]);
        assert_eq!(lookup(&known, "rm", "zone", "x").unwrap(), ZoneId::new(1));
        let err = lookup(&known, "sur", "zone", "Estándar Sur").unwrap_err();
        assert_eq!(err.to_string(), "Estándar Sur: unknown zone 'sur'");
    }
}
