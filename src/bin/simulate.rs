//! Site Fixture Simulator
//!
//! Generates a synthetic site fixture with an injected traffic regression,
//! for demos and pipeline testing without real rollup exports.
//!
//! Usage:
//!   cargo run --bin simulate -- --out fixtures/site.json
//!   cargo run --bin simulate -- --out site.json --drop-pct 40 --robots-block
//!   cargo run --bin simulate -- --out site.json --kill-tag

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::path::PathBuf;

use trafficdx::types::{AnalyticsDailyRollup, PageCheck, SearchDailyRollup, SiteFixture};

#[derive(Parser, Debug)]
#[command(name = "simulate", about = "Generate a synthetic site fixture with an injected regression")]
struct Args {
    /// Output path for the fixture JSON
    #[arg(long)]
    out: PathBuf,

    /// Site identifier
    #[arg(long, default_value = "demo-site")]
    site: String,

    /// Total days of history to generate
    #[arg(long, default_value_t = 28)]
    days: u32,

    /// Last date of the series (YYYY-MM-DD)
    #[arg(long, default_value = "2024-03-17")]
    end_date: NaiveDate,

    /// Days at the end of the series affected by the injected drop
    #[arg(long, default_value_t = 3)]
    drop_days: u32,

    /// Injected click drop percentage in the affected cluster (0 = no drop)
    #[arg(long, default_value_t = 40.0)]
    drop_pct: f64,

    /// Cluster path prefix the drop is injected into
    #[arg(long, default_value = "/services/")]
    drop_prefix: String,

    /// Also add a robots.txt Disallow rule for the dropped prefix
    #[arg(long)]
    robots_block: bool,

    /// Remove the analytics tag from checked pages (tracking-gap scenario)
    #[arg(long)]
    kill_tag: bool,

    /// RNG seed for reproducible fixtures
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Static page inventory: (path, baseline clicks/day, baseline position).
const PAGES: &[(&str, f64, f64)] = &[
    ("/services/seo-audit", 180.0, 3.2),
    ("/services/link-building", 140.0, 4.1),
    ("/services/content-strategy", 90.0, 5.0),
    ("/blog/how-to-rank", 60.0, 6.5),
    ("/blog/core-web-vitals", 40.0, 7.2),
    ("/", 120.0, 2.1),
];

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut rng = StdRng::seed_from_u64(args.seed);

    let start_date = args.end_date - Duration::days(i64::from(args.days) - 1);
    let drop_start = args.end_date - Duration::days(i64::from(args.drop_days) - 1);
    let drop_factor = 1.0 - args.drop_pct / 100.0;

    let mut fixture = SiteFixture {
        site_id: args.site.clone(),
        ..SiteFixture::default()
    };

    for day_offset in 0..args.days {
        let date = start_date + Duration::days(i64::from(day_offset));
        let in_drop = date >= drop_start;

        for (page, base_clicks, base_position) in PAGES {
            let affected = in_drop && page.starts_with(args.drop_prefix.as_str());
            let mean_clicks = if affected {
                base_clicks * drop_factor
            } else {
                *base_clicks
            };

            // ~5% daily noise around the mean
            let noise = Normal::new(0.0, mean_clicks * 0.05)
                .context("building noise distribution")?;
            let clicks = (mean_clicks + noise.sample(&mut rng)).max(0.0);
            let impressions = clicks * rng.gen_range(18.0..22.0);
            let ctr = if impressions > 0.0 { clicks / impressions } else { 0.0 };

            fixture.search.push(SearchDailyRollup {
                date,
                page: (*page).to_string(),
                query: None,
                clicks,
                impressions,
                ctr,
                position: base_position + rng.gen_range(-0.3..0.3),
            });

            // analytics roughly tracks search traffic unless the tag is dead
            let sessions = if args.kill_tag && in_drop {
                clicks * 0.05
            } else {
                clicks * rng.gen_range(1.1..1.3)
            };
            fixture.analytics.push(AnalyticsDailyRollup {
                date,
                landing_page: (*page).to_string(),
                sessions,
                users: sessions * 0.85,
                engaged_sessions: sessions * 0.6,
                conversions: sessions * 0.02,
            });
        }
    }

    // One page check per page, dated inside the drop window
    for (page, _, _) in PAGES {
        let blocked = args.robots_block && page.starts_with(args.drop_prefix.as_str());
        fixture.checks.push(PageCheck {
            url: format!("https://{}.example.com{}", args.site, page),
            date: args.end_date,
            http_status: 200,
            redirect_target: None,
            canonical_url: Some(format!("https://{}.example.com{}", args.site, page)),
            meta_robots: None,
            robots_disallow: if blocked {
                vec![args.drop_prefix.clone()]
            } else {
                Vec::new()
            },
            text_length: Some(1800),
            structured_data_valid: Some(true),
            internal_link_count: Some(12),
            analytics_tag_present: Some(!args.kill_tag),
        });
    }

    let json = serde_json::to_string_pretty(&fixture)?;
    std::fs::write(&args.out, json)
        .with_context(|| format!("writing fixture to {}", args.out.display()))?;
    tracing::info!(
        out = %args.out.display(),
        days = args.days,
        drop_pct = args.drop_pct,
        robots_block = args.robots_block,
        kill_tag = args.kill_tag,
        "Fixture generated"
    );

    Ok(())
}
