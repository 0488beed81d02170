use crate::core::model::{
    EmissionFactor, PerScenario, ProjectProfile, QuantityInput, Scenario, Vulnerability,
    VulnerabilityLabel,
};

#[derive(Clone, Debug, PartialEq)]
pub struct BreakdownRow {
    pub key: String,
    pub name: String,
    pub unit: String,
    pub color: String,
    pub quantity: f64,
    /// tCO2e, full precision.
    pub emissions: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Breakdown {
    pub rows: Vec<BreakdownRow>,
    pub total: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SocialCost {
    pub vulnerability_score: f64,
    pub vulnerability_label: VulnerabilityLabel,
    pub costs: PerScenario,
    pub prices: PerScenario,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CostShare {
    pub id: String,
    pub title: String,
    pub cost: f64,
}

/// Missing or non-finite quantities contribute zero. Negative quantities are
/// kept as negative contributions.
pub fn compute_breakdown(factors: &[EmissionFactor], quantities: &QuantityInput) -> Breakdown {
    let mut total = 0.0;
    let rows = factors
        .iter()
        .map(|f| {
            let quantity = quantities
                .get(&f.key)
                .copied()
                .filter(|q| q.is_finite())
                .unwrap_or(0.0);
            let emissions = quantity * f.factor;
            total += emissions;
            BreakdownRow {
                key: f.key.clone(),
                name: f.name.clone(),
                unit: f.unit.clone(),
                color: f.color.clone(),
                quantity,
                emissions,
            }
        })
        .collect();
    Breakdown { rows, total }
}

/// Lenient form-value parse: the longest leading decimal number wins,
/// anything unparseable is zero.
pub fn parse_quantity(raw: &str) -> f64 {
    let s = raw.trim_start();
    let b = s.as_bytes();
    let mut i = 0;
    if i < b.len() && (b[i] == b'+' || b[i] == b'-') {
        i += 1;
    }
    let int_start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;
    if i < b.len() && b[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        digits += j - frac_start;
        if digits > 0 {
            i = j;
        }
    }
    if digits == 0 {
        return 0.0;
    }
    if i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        let mut j = i + 1;
        if j < b.len() && (b[j] == b'+' || b[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    s[..i]
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

pub fn vulnerability_score(v: &Vulnerability) -> f64 {
    (v.exposure + v.sensitivity + (1.0 - v.adaptive_capacity)) / 3.0
}

pub fn compute_social_cost(profile: &ProjectProfile) -> SocialCost {
    let score = vulnerability_score(&profile.vulnerability);
    let prices = profile.scenarios;
    SocialCost {
        vulnerability_score: score,
        vulnerability_label: VulnerabilityLabel::from_score(score),
        costs: prices.map(|_, price| profile.emissions * price),
        prices,
    }
}

/// Central-scenario cost of every profile, in catalog order.
pub fn central_cost_share(profiles: &[ProjectProfile]) -> Vec<CostShare> {
    profiles
        .iter()
        .map(|p| CostShare {
            id: p.id.clone(),
            title: p.title.clone(),
            cost: p.emissions * p.scenarios.get(Scenario::Central),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{builtin_emissions, builtin_social_cost};

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn logrono_seed_total() {
        let catalog = builtin_emissions();
        let project = catalog.project("logroño").unwrap();
        let b = compute_breakdown(&project.factors, &project.seed);
        let expected = 333.73 * 0.40
            + 233.96 * 3.10
            + 10.63 * 1.85
            + 22085.20 * 0.00267
            + 2000.0 * 0.00267
            + 249228.0 * 0.00012;
        assert!(close(b.total, expected, 1e-9));
        // 972.66 when each row is rounded first; the unrounded sum is 972.648.
        assert!(close(b.total, 972.66, 0.02), "total={}", b.total);
        assert_eq!(format!("{:.2}", b.total), "972.65");
        assert_eq!(format!("{:.2}", b.rows[1].emissions), "725.28");
    }

    #[test]
    fn total_is_sum_of_rows_for_every_project() {
        for project in builtin_emissions().projects {
            let b = compute_breakdown(&project.factors, &project.seed);
            let sum: f64 = project
                .factors
                .iter()
                .map(|f| project.seed.get(&f.key).copied().unwrap_or(0.0) * f.factor)
                .sum();
            assert!(close(b.total, sum, 1e-9), "{}", project.id);
        }
    }

    #[test]
    fn rows_follow_factor_order() {
        let catalog = builtin_emissions();
        let project = catalog.project("rumiñahui").unwrap();
        let b = compute_breakdown(&project.factors, &QuantityInput::new());
        let names: Vec<_> = b.rows.iter().map(|r| r.name.as_str()).collect();
        let expected: Vec<_> = project.factors.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn missing_and_non_finite_quantities_count_as_zero() {
        let catalog = builtin_emissions();
        let project = catalog.project("mera").unwrap();
        let mut q = QuantityInput::new();
        q.insert("pvc_tuberia".to_string(), f64::NAN);
        q.insert("acero_refuerzo".to_string(), f64::INFINITY);
        q.insert("hormigon_mortero".to_string(), 10.0);
        let b = compute_breakdown(&project.factors, &q);
        assert!(close(b.total, 4.0, 1e-12));
        assert_eq!(b.rows[1].emissions, 0.0);
        assert_eq!(b.rows[2].emissions, 0.0);
    }

    #[test]
    fn negative_quantities_propagate() {
        let catalog = builtin_emissions();
        let project = catalog.project("logroño").unwrap();
        let mut q = QuantityInput::new();
        q.insert("hormigon_mortero".to_string(), -100.0);
        let b = compute_breakdown(&project.factors, &q);
        assert!(close(b.total, -40.0, 1e-12));
    }

    #[test]
    fn parse_quantity_is_lenient() {
        assert_eq!(parse_quantity("12.5"), 12.5);
        assert_eq!(parse_quantity("  7"), 7.0);
        assert_eq!(parse_quantity("12abc"), 12.0);
        assert_eq!(parse_quantity(".5"), 0.5);
        assert_eq!(parse_quantity("-3.25"), -3.25);
        assert_eq!(parse_quantity("1e3"), 1000.0);
        assert_eq!(parse_quantity("2e"), 2.0);
        assert_eq!(parse_quantity("5."), 5.0);
        assert_eq!(parse_quantity(""), 0.0);
        assert_eq!(parse_quantity("abc"), 0.0);
        assert_eq!(parse_quantity("-"), 0.0);
        assert_eq!(parse_quantity("."), 0.0);
    }

    #[test]
    fn ruminahui_social_cost() {
        let catalog = builtin_social_cost();
        let sc = compute_social_cost(catalog.project("rumiñahui").unwrap());
        assert!(close(sc.costs.conservative, 27029.66, 1e-6));
        assert!(close(sc.costs.central, 81088.98, 1e-6));
        assert!(close(sc.costs.ethical, 135148.30, 1e-6));
        assert!(close(sc.vulnerability_score, 0.4167, 1e-4));
        assert_eq!(sc.vulnerability_label, VulnerabilityLabel::Baja);
        assert_eq!(sc.prices.central, 51.0);
    }

    #[test]
    fn amazon_profiles_are_high_vulnerability() {
        let catalog = builtin_social_cost();
        for id in ["logroño", "mera"] {
            let sc = compute_social_cost(catalog.project(id).unwrap());
            assert_eq!(sc.vulnerability_label, VulnerabilityLabel::Alta, "{}", id);
        }
    }

    #[test]
    fn label_threshold_is_strict() {
        assert_eq!(VulnerabilityLabel::from_score(0.6), VulnerabilityLabel::Baja);
        assert_eq!(VulnerabilityLabel::from_score(0.6000001), VulnerabilityLabel::Alta);
        assert_eq!(VulnerabilityLabel::from_score(0.0).as_str(), "BAJA");
        assert_eq!(VulnerabilityLabel::from_score(1.0).as_str(), "ALTA");
    }

    #[test]
    fn vulnerability_score_stays_in_unit_interval() {
        let steps = [0.0, 0.1, 0.25, 0.5, 0.75, 0.9, 1.0];
        for &exposure in &steps {
            for &sensitivity in &steps {
                for &adaptive_capacity in &steps {
                    let s = vulnerability_score(&Vulnerability {
                        exposure,
                        sensitivity,
                        adaptive_capacity,
                    });
                    assert!((0.0..=1.0).contains(&s), "score {} out of range", s);
                }
            }
        }
    }

    #[test]
    fn central_share_covers_all_profiles() {
        let catalog = builtin_social_cost();
        let share = central_cost_share(&catalog.projects);
        assert_eq!(share.len(), 3);
        assert_eq!(share[1].id, "logroño");
        assert!(close(share[1].cost, 946.03 * 85.0, 1e-9));
    }
}
