use crate::core::model::{
    EmissionFactor, EmissionProject, EmissionsCatalog, PerScenario, ProjectProfile,
    QuantityInput, SocialCostCatalog, Vulnerability,
};
use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

fn factor(name: &str, unit: &str, fe: f64, key: &str, color: &str) -> EmissionFactor {
    EmissionFactor {
        name: name.to_string(),
        unit: unit.to_string(),
        factor: fe,
        key: key.to_string(),
        color: color.to_string(),
    }
}

fn seed(pairs: &[(&str, f64)]) -> QuantityInput {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

pub fn builtin_emissions() -> EmissionsCatalog {
    EmissionsCatalog {
        projects: vec![
            EmissionProject {
                id: "logroño".to_string(),
                label: "Logroño (Datos Presupuesto)".to_string(),
                factors: vec![
                    factor("Hormigón y Mortero", "m³", 0.40, "hormigon_mortero", "#10b981"),
                    factor("Tubería PVC", "t", 3.10, "pvc_tuberia", "#3b82f6"),
                    factor("Acero de Refuerzo", "t", 1.85, "acero_refuerzo", "#6366f1"),
                    factor("Diésel (Maquinaria)", "L", 0.00267, "diesel_obra", "#f59e0b"),
                    factor("Diésel (Generador)", "L", 0.00267, "diesel_respaldo", "#f97316"),
                    factor("Transporte Excavado", "t·km", 0.00012, "transporte_excavado", "#ef4444"),
                ],
                seed: seed(&[
                    ("hormigon_mortero", 333.73),
                    ("pvc_tuberia", 233.96),
                    ("acero_refuerzo", 10.63),
                    ("diesel_obra", 22085.20),
                    ("diesel_respaldo", 2000.0),
                    ("transporte_excavado", 249228.0),
                ]),
            },
            EmissionProject {
                id: "rumiñahui".to_string(),
                label: "Rumiñahui (Agua Potable)".to_string(),
                factors: vec![
                    factor("Hormigón y Mortero", "m³", 0.40, "hormigon_mortero", "#10b981"),
                    factor("Tubería PVC", "t", 3.10, "pvc_tuberia", "#3b82f6"),
                    factor("Acero Refuerzo", "t", 1.85, "acero_refuerzo", "#6366f1"),
                    factor("Mezcla Asfáltica", "t", 0.08, "asfalto", "#1f2937"),
                    factor("Diésel Maquinaria", "L", 0.00267, "diesel_obra", "#f59e0b"),
                    factor("Insumos Químicos", "t", 1.00, "quimicos_operacion", "#06b6d4"),
                ],
                seed: seed(&[
                    ("hormigon_mortero", 2111.18),
                    ("pvc_tuberia", 133.13),
                    ("acero_refuerzo", 84.28),
                    ("asfalto", 1111.87),
                    ("diesel_obra", 39218.36),
                    ("quimicos_operacion", 5.45),
                ]),
            },
            EmissionProject {
                id: "mera".to_string(),
                label: "Mera (Saneamiento)".to_string(),
                factors: vec![
                    factor("Hormigón", "m³", 0.40, "hormigon_mortero", "#10b981"),
                    factor("Tubería PVC", "t", 3.10, "pvc_tuberia", "#3b82f6"),
                    factor("Acero Refuerzo", "t", 1.85, "acero_refuerzo", "#6366f1"),
                    factor("Diésel Maquinaria", "L", 0.00267, "diesel_obra", "#f59e0b"),
                    factor("Diésel Generador", "L", 0.00267, "diesel_respaldo", "#f97316"),
                    factor("Transp. Excavado", "t·km", 0.00012, "transporte_excavado", "#ef4444"),
                    factor("Trat. Biológico", "m³", 0.0003, "tratamiento_biologico", "#8b5cf6"),
                ],
                seed: seed(&[
                    ("hormigon_mortero", 1665.24),
                    ("pvc_tuberia", 179.59),
                    ("acero_refuerzo", 104.25),
                    ("diesel_obra", 54121.12),
                    ("diesel_respaldo", 2000.0),
                    ("transporte_excavado", 219546.83),
                    ("tratamiento_biologico", 746985.0),
                ]),
            },
        ],
    }
}

fn profile(
    id: &str,
    title: &str,
    location: &str,
    label: &str,
    emissions: f64,
    (exposure, sensitivity, adaptive_capacity): (f64, f64, f64),
    (conservative, central, ethical): (f64, f64, f64),
) -> ProjectProfile {
    ProjectProfile {
        id: id.to_string(),
        title: title.to_string(),
        location: location.to_string(),
        label: label.to_string(),
        emissions,
        vulnerability: Vulnerability {
            exposure,
            sensitivity,
            adaptive_capacity,
        },
        scenarios: PerScenario {
            conservative,
            central,
            ethical,
        },
    }
}

pub fn builtin_social_cost() -> SocialCostCatalog {
    // Amazon projects carry a +20% vulnerability adjustment on the base prices.
    SocialCostCatalog {
        projects: vec![
            profile(
                "rumiñahui",
                "Sistema AP Rumiñahui",
                "Sierra (Pichincha)",
                "📍 Rumiñahui (Urbano/Sierra)",
                1589.98,
                (0.85, 0.20, 0.80),
                (17.0, 51.0, 85.0),
            ),
            profile(
                "logroño",
                "Agua Potable Logroño",
                "Amazonía (M. Santiago)",
                "🌳 Logroño (Amazonía)",
                946.03,
                (0.75, 0.85, 0.30),
                (45.0, 85.0, 120.0),
            ),
            profile(
                "mera",
                "Alcantarillado Mera",
                "Amazonía (Pastaza)",
                "💧 Mera (Amazonía)",
                1586.55,
                (0.80, 0.75, 0.40),
                (45.0, 85.0, 120.0),
            ),
        ],
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read data file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse data file {}", path.display()))
}

pub fn load_emissions(path: Option<&Path>) -> Result<EmissionsCatalog> {
    let catalog = match path {
        Some(p) => read_json(p)?,
        None => builtin_emissions(),
    };
    validate_emissions(&catalog)?;
    Ok(catalog)
}

pub fn load_social_cost(path: Option<&Path>) -> Result<SocialCostCatalog> {
    let catalog = match path {
        Some(p) => read_json(p)?,
        None => builtin_social_cost(),
    };
    validate_social_cost(&catalog)?;
    Ok(catalog)
}

pub fn validate_emissions(catalog: &EmissionsCatalog) -> Result<()> {
    if catalog.projects.is_empty() {
        bail!("emission catalog has no projects");
    }
    let mut ids = HashSet::new();
    for project in &catalog.projects {
        if !ids.insert(project.id.as_str()) {
            bail!("duplicate project id '{}'", project.id);
        }
        if project.factors.is_empty() {
            bail!("project '{}' has no emission factors", project.id);
        }
        let mut keys = HashSet::new();
        for f in &project.factors {
            if !keys.insert(f.key.as_str()) {
                bail!("project '{}': duplicate factor key '{}'", project.id, f.key);
            }
            if !(f.factor.is_finite() && f.factor > 0.0) {
                bail!(
                    "project '{}': factor '{}' must be a positive number, got {}",
                    project.id,
                    f.key,
                    f.factor
                );
            }
        }
        for key in project.seed.keys() {
            if !keys.contains(key.as_str()) {
                bail!(
                    "project '{}': seed quantity '{}' has no matching emission factor",
                    project.id,
                    key
                );
            }
        }
    }
    Ok(())
}

pub fn validate_social_cost(catalog: &SocialCostCatalog) -> Result<()> {
    if catalog.projects.is_empty() {
        bail!("social cost catalog has no projects");
    }
    let mut ids = HashSet::new();
    for p in &catalog.projects {
        if !ids.insert(p.id.as_str()) {
            bail!("duplicate project id '{}'", p.id);
        }
        if !(p.emissions.is_finite() && p.emissions >= 0.0) {
            bail!("project '{}': emissions must be >= 0, got {}", p.id, p.emissions);
        }
        let v = &p.vulnerability;
        for (name, value) in [
            ("exposure", v.exposure),
            ("sensitivity", v.sensitivity),
            ("adaptive_capacity", v.adaptive_capacity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("project '{}': {} must be within [0, 1], got {}", p.id, name, value);
            }
        }
        for (name, price) in [
            ("conservative", p.scenarios.conservative),
            ("central", p.scenarios.central),
            ("ethical", p.scenarios.ethical),
        ] {
            if !(price.is_finite() && price > 0.0) {
                bail!("project '{}': {} price must be positive, got {}", p.id, name, price);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalogs_are_valid() {
        validate_emissions(&builtin_emissions()).unwrap();
        validate_social_cost(&builtin_social_cost()).unwrap();
    }

    #[test]
    fn default_projects_follow_declaration_order() {
        assert_eq!(builtin_emissions().default_project().unwrap().id, "logroño");
        assert_eq!(builtin_social_cost().default_project().unwrap().id, "rumiñahui");
    }

    #[test]
    fn seed_key_without_factor_is_rejected() {
        let mut catalog = builtin_emissions();
        catalog.projects[0].seed.insert("unknown".to_string(), 1.0);
        let err = validate_emissions(&catalog).unwrap_err().to_string();
        assert!(err.contains("unknown"), "{}", err);
    }

    #[test]
    fn duplicate_factor_key_is_rejected() {
        let mut catalog = builtin_emissions();
        let dup = catalog.projects[1].factors[0].clone();
        catalog.projects[1].factors.push(dup);
        assert!(validate_emissions(&catalog).is_err());
    }

    #[test]
    fn non_positive_factor_is_rejected() {
        let mut catalog = builtin_emissions();
        catalog.projects[2].factors[3].factor = 0.0;
        assert!(validate_emissions(&catalog).is_err());
    }

    #[test]
    fn out_of_range_vulnerability_is_rejected() {
        let mut catalog = builtin_social_cost();
        catalog.projects[0].vulnerability.sensitivity = 1.2;
        assert!(validate_social_cost(&catalog).is_err());
    }

    #[test]
    fn profile_missing_field_fails_to_load() {
        let dir = std::env::temp_dir().join(format!("carbon-report-cat-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("scc.json");
        std::fs::write(
            &path,
            r#"{"projects":[{"id":"x","title":"X","location":"L","label":"X","emissions":1.0}]}"#,
        )
        .unwrap();
        assert!(load_social_cost(Some(&path)).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn catalog_survives_json_payload() {
        let catalog = builtin_emissions();
        let json = serde_json::to_string(&catalog).unwrap();
        let back: EmissionsCatalog = serde_json::from_str(&json).unwrap();
        let keys: Vec<_> = back.projects[2].factors.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(
            keys,
            [
                "hormigon_mortero",
                "pvc_tuberia",
                "acero_refuerzo",
                "diesel_obra",
                "diesel_respaldo",
                "transporte_excavado",
                "tratamiento_biologico"
            ]
        );
    }
}
