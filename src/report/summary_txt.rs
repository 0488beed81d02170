use crate::core::calc::{compute_breakdown, compute_social_cost};
use crate::core::model::{EmissionsCatalog, QuantityInput, Scenario, SocialCostCatalog};
use crate::core::session::initial_quantities;
use anyhow::Result;
use std::fmt::Write as FmtWrite;

/// Tab-separated seed breakdown of every project, one row per factor plus a
/// total row.
pub fn emissions(catalog: &EmissionsCatalog) -> Result<String> {
    let mut out = String::new();
    writeln!(
        out,
        "project\tkey\tname\tunit\tquantity\tfactor\temissions_tco2e"
    )?;
    for project in &catalog.projects {
        let quantities = initial_quantities(project, &QuantityInput::new());
        let breakdown = compute_breakdown(&project.factors, &quantities);
        for (row, f) in breakdown.rows.iter().zip(&project.factors) {
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{:.2}",
                project.id, row.key, row.name, row.unit, row.quantity, f.factor, row.emissions
            )?;
        }
        writeln!(out, "{}\tTOTAL\t\t\t\t\t{:.2}", project.id, breakdown.total)?;
    }
    Ok(out)
}

pub fn social_cost(catalog: &SocialCostCatalog) -> Result<String> {
    let mut out = String::new();
    writeln!(
        out,
        "project\temissions_tco2e\tvulnerability\tlabel\tscenario\tdiscount_pct\tprice_usd\tcost_usd"
    )?;
    for project in &catalog.projects {
        let sc = compute_social_cost(project);
        for s in Scenario::ALL {
            writeln!(
                out,
                "{}\t{}\t{:.4}\t{}\t{}\t{}\t{}\t{:.2}",
                project.id,
                project.emissions,
                sc.vulnerability_score,
                sc.vulnerability_label.as_str(),
                s.as_str(),
                s.discount_rate(),
                sc.prices.get(s),
                sc.costs.get(s)
            )?;
        }
    }
    Ok(out)
}
