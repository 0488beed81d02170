use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Factor key → user-entered quantity.
pub type QuantityInput = BTreeMap<String, f64>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmissionFactor {
    pub name: String,
    pub unit: String,
    /// tCO2e per unit.
    pub factor: f64,
    pub key: String,
    pub color: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmissionProject {
    pub id: String,
    pub label: String,
    pub factors: Vec<EmissionFactor>,
    #[serde(default)]
    pub seed: QuantityInput,
}

impl EmissionProject {
    pub fn factor(&self, key: &str) -> Option<&EmissionFactor> {
        self.factors.iter().find(|f| f.key == key)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmissionsCatalog {
    pub projects: Vec<EmissionProject>,
}

impl EmissionsCatalog {
    pub fn project(&self, id: &str) -> Option<&EmissionProject> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn default_project(&self) -> Option<&EmissionProject> {
        self.projects.first()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub exposure: f64,
    pub sensitivity: f64,
    pub adaptive_capacity: f64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    Conservative,
    Central,
    Ethical,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Conservative, Scenario::Central, Scenario::Ethical];

    pub fn as_str(self) -> &'static str {
        match self {
            Scenario::Conservative => "conservative",
            Scenario::Central => "central",
            Scenario::Ethical => "ethical",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Scenario::Conservative => "Conservador",
            Scenario::Central => "Central",
            Scenario::Ethical => "Ético",
        }
    }

    /// Discount rate in percent.
    pub fn discount_rate(self) -> f64 {
        match self {
            Scenario::Conservative => 5.0,
            Scenario::Central => 3.0,
            Scenario::Ethical => 2.5,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Scenario::Conservative => "#94a3b8",
            Scenario::Central => "#2563eb",
            Scenario::Ethical => "#10b981",
        }
    }
}

/// One value per discount-rate scenario.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerScenario {
    pub conservative: f64,
    pub central: f64,
    pub ethical: f64,
}

impl PerScenario {
    pub fn get(&self, scenario: Scenario) -> f64 {
        match scenario {
            Scenario::Conservative => self.conservative,
            Scenario::Central => self.central,
            Scenario::Ethical => self.ethical,
        }
    }

    pub fn map<F: Fn(Scenario, f64) -> f64>(&self, f: F) -> PerScenario {
        PerScenario {
            conservative: f(Scenario::Conservative, self.conservative),
            central: f(Scenario::Central, self.central),
            ethical: f(Scenario::Ethical, self.ethical),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectProfile {
    pub id: String,
    pub title: String,
    pub location: String,
    pub label: String,
    /// Construction-phase emissions, tCO2e.
    pub emissions: f64,
    pub vulnerability: Vulnerability,
    /// USD per tCO2e.
    pub scenarios: PerScenario,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SocialCostCatalog {
    pub projects: Vec<ProjectProfile>,
}

impl SocialCostCatalog {
    pub fn project(&self, id: &str) -> Option<&ProjectProfile> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn default_project(&self) -> Option<&ProjectProfile> {
        self.projects.first()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VulnerabilityLabel {
    Alta,
    Baja,
}

impl VulnerabilityLabel {
    pub const THRESHOLD: f64 = 0.6;

    pub fn from_score(score: f64) -> Self {
        if score > Self::THRESHOLD {
            VulnerabilityLabel::Alta
        } else {
            VulnerabilityLabel::Baja
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VulnerabilityLabel::Alta => "ALTA",
            VulnerabilityLabel::Baja => "BAJA",
        }
    }

    pub fn as_str_lower(self) -> &'static str {
        match self {
            VulnerabilityLabel::Alta => "alta",
            VulnerabilityLabel::Baja => "baja",
        }
    }
}
