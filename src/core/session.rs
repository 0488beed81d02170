//! Interactive calculator state, the native twin of the document's
//! `EmissionsView`.
//!
//! A session always holds exactly one rendered view for the active project.
//! Every trigger (project selection, quantity edit, reset) runs a synchronous
//! recompute that replaces the view wholesale and stores the quantities in the
//! cache before returning to `Idle`.

use crate::core::cache::{KeyValueStore, QuantityCache};
use crate::core::calc::{Breakdown, compute_breakdown, parse_quantity};
use crate::core::model::{EmissionProject, EmissionsCatalog, QuantityInput};
use anyhow::{Result, anyhow, bail};
use tracing::debug;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Idle,
    Recomputing,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderedView {
    pub project_id: String,
    pub breakdown: Breakdown,
    pub generation: u64,
}

pub struct CalculatorSession<'a, S> {
    catalog: &'a EmissionsCatalog,
    cache: QuantityCache<S>,
    active: usize,
    quantities: QuantityInput,
    view: RenderedView,
    state: SessionState,
}

/// Cached value when present, else seed, else zero; one entry per factor.
pub fn initial_quantities(project: &EmissionProject, cached: &QuantityInput) -> QuantityInput {
    project
        .factors
        .iter()
        .map(|f| {
            let v = cached
                .get(&f.key)
                .or_else(|| project.seed.get(&f.key))
                .copied()
                .unwrap_or(0.0);
            (f.key.clone(), v)
        })
        .collect()
}

impl<'a, S: KeyValueStore> CalculatorSession<'a, S> {
    pub fn new(catalog: &'a EmissionsCatalog, cache: QuantityCache<S>) -> Result<Self> {
        if catalog.projects.is_empty() {
            bail!("emission catalog has no projects");
        }
        let mut session = CalculatorSession {
            catalog,
            cache,
            active: 0,
            quantities: QuantityInput::new(),
            view: RenderedView {
                project_id: String::new(),
                breakdown: Breakdown::default(),
                generation: 0,
            },
            state: SessionState::Idle,
        };
        session.load_active();
        session.recompute();
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn view(&self) -> &RenderedView {
        &self.view
    }

    pub fn quantities(&self) -> &QuantityInput {
        &self.quantities
    }

    pub fn active_project(&self) -> &'a EmissionProject {
        &self.catalog.projects[self.active]
    }

    pub fn select_project(&mut self, id: &str) -> Result<&RenderedView> {
        let idx = self
            .catalog
            .projects
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| anyhow!("unknown project '{}' (known: {})", id, self.project_ids()))?;
        self.active = idx;
        self.load_active();
        Ok(self.recompute())
    }

    /// `raw` is coerced like a form field: unparseable text counts as zero.
    pub fn edit_quantity(&mut self, key: &str, raw: &str) -> Result<&RenderedView> {
        let project = self.active_project();
        if project.factor(key).is_none() {
            let keys: Vec<&str> = project.factors.iter().map(|f| f.key.as_str()).collect();
            bail!(
                "project '{}' has no factor '{}' (known: {})",
                project.id,
                key,
                keys.join(", ")
            );
        }
        self.quantities.insert(key.to_string(), parse_quantity(raw));
        Ok(self.recompute())
    }

    /// Back to the built-in seed quantities for the active project.
    pub fn reset_project(&mut self) -> &RenderedView {
        self.quantities = initial_quantities(self.active_project(), &QuantityInput::new());
        self.recompute()
    }

    fn load_active(&mut self) {
        let project = self.active_project();
        let cached = self.cache.load(&project.id);
        self.quantities = initial_quantities(project, &cached);
    }

    fn recompute(&mut self) -> &RenderedView {
        self.state = SessionState::Recomputing;
        let project = self.active_project();
        let breakdown = compute_breakdown(&project.factors, &self.quantities);
        self.view = RenderedView {
            project_id: project.id.clone(),
            breakdown,
            generation: self.view.generation + 1,
        };
        self.cache.save(&project.id, &self.quantities);
        self.state = SessionState::Idle;
        debug!(
            project = %self.view.project_id,
            generation = self.view.generation,
            total = self.view.breakdown.total,
            "recomputed"
        );
        &self.view
    }

    fn project_ids(&self) -> String {
        self.catalog
            .projects
            .iter()
            .map(|p| p.id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::{EMISSIONS_PREFIX, MemoryStore};
    use crate::core::catalog::builtin_emissions;

    fn session(catalog: &EmissionsCatalog) -> CalculatorSession<'_, MemoryStore> {
        CalculatorSession::new(catalog, QuantityCache::new(MemoryStore::new(), EMISSIONS_PREFIX))
            .unwrap()
    }

    #[test]
    fn starts_idle_on_default_project_with_seed() {
        let catalog = builtin_emissions();
        let s = session(&catalog);
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(s.view().project_id, "logroño");
        assert_eq!(s.view().generation, 1);
        assert_eq!(s.quantities(), &catalog.projects[0].seed);
        assert_eq!(format!("{:.2}", s.view().breakdown.total), "972.65");
    }

    #[test]
    fn edit_replaces_view_and_persists() {
        let catalog = builtin_emissions();
        let mut s = session(&catalog);
        let before = s.view().clone();
        let after = s.edit_quantity("hormigon_mortero", "433.73").unwrap().clone();
        assert_eq!(after.generation, before.generation + 1);
        assert!((after.breakdown.total - before.breakdown.total - 40.0).abs() < 1e-9);
        assert_eq!(s.state(), SessionState::Idle);

        s.select_project("mera").unwrap();
        s.select_project("logroño").unwrap();
        assert_eq!(s.quantities()["hormigon_mortero"], 433.73);
    }

    #[test]
    fn garbage_edit_counts_as_zero() {
        let catalog = builtin_emissions();
        let mut s = session(&catalog);
        let view = s.edit_quantity("pvc_tuberia", "n/a").unwrap();
        assert_eq!(view.breakdown.rows[1].emissions, 0.0);
    }

    #[test]
    fn unknown_key_or_project_is_rejected() {
        let catalog = builtin_emissions();
        let mut s = session(&catalog);
        assert!(s.edit_quantity("asfalto", "1").is_err());
        assert!(s.select_project("quito").is_err());
        assert_eq!(s.view().project_id, "logroño");
    }

    #[test]
    fn cache_overrides_seed_per_key() {
        let catalog = builtin_emissions();
        let mut cache = QuantityCache::new(MemoryStore::new(), EMISSIONS_PREFIX);
        let mut cached = QuantityInput::new();
        cached.insert("asfalto".to_string(), 0.0);
        cached.insert("not_a_factor".to_string(), 99.0);
        cache.save("rumiñahui", &cached);

        let mut s = CalculatorSession::new(&catalog, cache).unwrap();
        s.select_project("rumiñahui").unwrap();
        assert_eq!(s.quantities()["asfalto"], 0.0);
        assert_eq!(s.quantities()["hormigon_mortero"], 2111.18);
        assert!(!s.quantities().contains_key("not_a_factor"));
    }

    #[test]
    fn non_numeric_cached_value_falls_back_to_seed() {
        let catalog = builtin_emissions();
        let mut store = MemoryStore::new();
        store
            .set(
                "apu_data_rumiñahui",
                r#"{"asfalto":"mucho","hormigon_mortero":5}"#.to_string(),
            )
            .unwrap();
        let mut s =
            CalculatorSession::new(&catalog, QuantityCache::new(store, EMISSIONS_PREFIX)).unwrap();
        s.select_project("rumiñahui").unwrap();
        assert_eq!(s.quantities()["hormigon_mortero"], 5.0);
        assert_eq!(s.quantities()["asfalto"], 1111.87);
    }

    #[test]
    fn reset_restores_seed() {
        let catalog = builtin_emissions();
        let mut s = session(&catalog);
        s.edit_quantity("diesel_obra", "0").unwrap();
        s.reset_project();
        assert_eq!(s.quantities(), &catalog.projects[0].seed);
    }
}
