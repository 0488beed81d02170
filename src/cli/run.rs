use crate::cli::args::{CalcArgs, Cli, Commands, ReportArgs, ValuateArgs};
use crate::core::cache::{EMISSIONS_PREFIX, FileStore, KeyValueStore, MemoryStore, QuantityCache};
use crate::core::calc::{central_cost_share, compute_social_cost};
use crate::core::catalog;
use crate::core::model::{ProjectProfile, Scenario};
use crate::core::session::CalculatorSession;
use crate::host::{self, HostConfig};
use crate::logging;
use crate::report::{
    self, emissions_html, fmt_fixed2, fmt_money, fmt_num, social_cost_html, summary_txt,
};
use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

pub fn entry() -> Result<()> {
    let cli = Cli::parse();
    logging::init();
    match cli.command {
        Commands::Emissions(args) => emissions(args),
        Commands::SocialCost(args) => social_cost(args),
        Commands::Calc(args) => calc(args),
        Commands::Valuate(args) => valuate(args),
    }
}

/// A rendered report plus what the bundle and the host need to know about it.
struct Rendered {
    file_name: &'static str,
    port: u16,
    banner: &'static str,
    html: String,
    data_json: Vec<u8>,
    summary: String,
}

fn emissions(args: ReportArgs) -> Result<()> {
    let t0 = Instant::now();
    let catalog = stage("catalog", || catalog::load_emissions(args.data.as_deref()))?;
    let rendered = stage("render", || {
        let payload = emissions_html::EmissionsPayload::new(&catalog)?;
        Ok(Rendered {
            file_name: emissions_html::DEFAULT_FILE_NAME,
            port: emissions_html::DEFAULT_PORT,
            banner: "Carbon footprint calculator",
            html: emissions_html::render(&catalog, now_secs())?,
            data_json: serde_json::to_vec_pretty(&payload).context("failed to encode data.json")?,
            summary: summary_txt::emissions(&catalog)?,
        })
    })?;
    publish(args, rendered, t0)
}

fn social_cost(args: ReportArgs) -> Result<()> {
    let t0 = Instant::now();
    let catalog = stage("catalog", || catalog::load_social_cost(args.data.as_deref()))?;
    let rendered = stage("render", || {
        let payload = social_cost_html::SocialCostPayload::new(&catalog)?;
        Ok(Rendered {
            file_name: social_cost_html::DEFAULT_FILE_NAME,
            port: social_cost_html::DEFAULT_PORT,
            banner: "Social cost of carbon dashboard",
            html: social_cost_html::render(&catalog, now_secs())?,
            data_json: serde_json::to_vec_pretty(&payload).context("failed to encode data.json")?,
            summary: summary_txt::social_cost(&catalog)?,
        })
    })?;
    publish(args, rendered, t0)
}

fn publish(args: ReportArgs, rendered: Rendered, t0: Instant) -> Result<()> {
    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(rendered.file_name));
    let (root, document) = split_output(&out)?;
    if !root.is_dir() {
        bail!("output directory not found: {}", root.display());
    }

    stage("write", || {
        report::write_document(&out, &rendered.html)
            .with_context(|| format!("failed to write {}", out.display()))
    })?;
    info!(path = %out.display(), bytes = rendered.html.len(), "report written");

    if args.bundle {
        let zip_path = stage("bundle", || {
            report::zip::write_bundle(
                &out,
                &[
                    report::zip::BundleEntry {
                        name: "data.json",
                        contents: rendered.data_json,
                    },
                    report::zip::BundleEntry {
                        name: "summary.txt",
                        contents: rendered.summary.into_bytes(),
                    },
                ],
            )
            .with_context(|| "failed to create bundle")
        })?;
        info!(path = %zip_path.display(), "bundle written");
    }
    debug!(total = %fmt_dur(t0.elapsed()), "generation finished");

    if args.no_serve {
        println!("Wrote {}", out.display());
        return Ok(());
    }

    host::serve(HostConfig {
        root,
        host: args.host,
        port: args.port.unwrap_or(rendered.port),
        document,
        open_browser: !args.no_browser,
        banner: rendered.banner,
    })
}

/// Directory to serve and the document's name inside it.
fn split_output(out: &Path) -> Result<(PathBuf, String)> {
    let document = out
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .with_context(|| format!("output path has no usable file name: {}", out.display()))?;
    let root = match out.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((root, document))
}

fn calc(args: CalcArgs) -> Result<()> {
    let catalog = stage("catalog", || catalog::load_emissions(args.data.as_deref()))?;
    if args.no_persist {
        let cache = QuantityCache::new(MemoryStore::new(), EMISSIONS_PREFIX);
        return run_session(CalculatorSession::new(&catalog, cache)?, &args);
    }
    let store = FileStore::open(&args.cache);
    debug!(cache = %store.path().display(), "cache opened");
    let cache = QuantityCache::new(store, EMISSIONS_PREFIX);
    run_session(CalculatorSession::new(&catalog, cache)?, &args)
}

fn run_session<S: KeyValueStore>(mut session: CalculatorSession<'_, S>, args: &CalcArgs) -> Result<()> {
    if let Some(id) = &args.project {
        session.select_project(id)?;
    }
    if args.reset {
        session.reset_project();
    }
    for assignment in &args.set {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow!("--set expects KEY=VALUE, got '{}'", assignment))?;
        session.edit_quantity(key.trim(), value.trim())?;
    }

    let project = session.active_project();
    let view = session.view();
    println!("{}", project.label);
    println!(
        "{:<26} {:>16} {:<6} {:>10} {:>12}",
        "Material", "Quantity", "Unit", "FE", "tCO2e"
    );
    for (row, f) in view.breakdown.rows.iter().zip(&project.factors) {
        println!(
            "{:<26} {:>16} {:<6} {:>10} {:>12}",
            row.name,
            fmt_num(row.quantity),
            row.unit,
            f.factor,
            fmt_fixed2(row.emissions)
        );
    }
    println!("{:<61} {:>12}", "TOTAL", fmt_fixed2(view.breakdown.total));
    debug!(project = %view.project_id, generation = view.generation, "session done");
    Ok(())
}

fn valuate(args: ValuateArgs) -> Result<()> {
    let catalog = stage("catalog", || catalog::load_social_cost(args.data.as_deref()))?;
    let profiles: Vec<&ProjectProfile> = match &args.project {
        Some(id) => vec![
            catalog
                .project(id)
                .ok_or_else(|| anyhow!("unknown project '{}'", id))?,
        ],
        None => catalog.projects.iter().collect(),
    };

    for profile in profiles {
        let sc = compute_social_cost(profile);
        println!("{} ({})", profile.title, profile.location);
        println!("  Emissions:      {} tCO2e", fmt_num(profile.emissions));
        println!(
            "  Vulnerability:  {:.2} ({})",
            sc.vulnerability_score,
            sc.vulnerability_label.as_str()
        );
        for s in Scenario::ALL {
            println!(
                "  {:<12} {:>4}%  {:>6}/t  {:>14}",
                s.label(),
                s.discount_rate(),
                fmt_money(sc.prices.get(s)),
                fmt_money(sc.costs.get(s))
            );
        }
        println!();
    }

    if args.project.is_none() {
        let shares = central_cost_share(&catalog.projects);
        let total: f64 = shares.iter().map(|s| s.cost).sum();
        println!("Central scenario share");
        for share in shares {
            let pct = if total > 0.0 { share.cost / total * 100.0 } else { 0.0 };
            println!("  {:<28} {:>14} {:>6.1}%", share.title, fmt_money(share.cost), pct);
        }
    }
    Ok(())
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn stage<T, F>(name: &str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let t = Instant::now();
    let res = f();
    debug!(stage = name, time = %fmt_dur(t.elapsed()), "stage finished");
    res
}

fn fmt_dur(d: Duration) -> String {
    if d.as_secs_f64() < 1.0 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{:.3}s", d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_file_name_is_served_from_cwd() {
        let (root, doc) = split_output(Path::new("index.html")).unwrap();
        assert_eq!(root, PathBuf::from("."));
        assert_eq!(doc, "index.html");

        let (root, doc) = split_output(Path::new("out/reports/social_cost_v2.html")).unwrap();
        assert_eq!(root, PathBuf::from("out/reports"));
        assert_eq!(doc, "social_cost_v2.html");
    }

    #[test]
    fn durations_switch_units_at_one_second() {
        assert_eq!(fmt_dur(Duration::from_millis(250)), "250ms");
        assert_eq!(fmt_dur(Duration::from_millis(1500)), "1.500s");
    }
}
