use crate::core::calc::compute_social_cost;
use crate::core::model::{ProjectProfile, Scenario, SocialCostCatalog, VulnerabilityLabel};
use crate::report::{
    CHART_JS_URL, escape_html, fmt_fixed2, fmt_money, fmt_num, fmt_timestamp, script_json,
};
use anyhow::{Result, anyhow};
use serde::Serialize;
use std::fmt::Write as FmtWrite;

pub const DEFAULT_FILE_NAME: &str = "social_cost_v2.html";
pub const DEFAULT_PORT: u16 = 8003;

#[derive(Serialize)]
pub struct ScenarioInfo {
    pub key: &'static str,
    pub label: &'static str,
    pub rate: f64,
    pub color: &'static str,
}

#[derive(Serialize)]
pub struct SocialCostPayload<'a> {
    pub default_project: &'a str,
    pub threshold: f64,
    pub scenarios: Vec<ScenarioInfo>,
    pub projects: &'a [ProjectProfile],
}

impl<'a> SocialCostPayload<'a> {
    pub fn new(catalog: &'a SocialCostCatalog) -> Result<Self> {
        let default = catalog
            .default_project()
            .ok_or_else(|| anyhow!("social cost catalog has no projects"))?;
        Ok(SocialCostPayload {
            default_project: &default.id,
            threshold: VulnerabilityLabel::THRESHOLD,
            scenarios: Scenario::ALL
                .iter()
                .map(|&s| ScenarioInfo {
                    key: s.as_str(),
                    label: s.label(),
                    rate: s.discount_rate(),
                    color: s.color(),
                })
                .collect(),
            projects: &catalog.projects,
        })
    }
}

fn scenario_card_class(s: Scenario) -> &'static str {
    match s {
        Scenario::Conservative => "scenario conservative",
        Scenario::Central => "scenario central",
        Scenario::Ethical => "scenario ethical",
    }
}

pub fn render(catalog: &SocialCostCatalog, generated_at: u64) -> Result<String> {
    let payload = SocialCostPayload::new(catalog)?;
    let project = catalog
        .default_project()
        .ok_or_else(|| anyhow!("social cost catalog has no projects"))?;
    let sc = compute_social_cost(project);

    let mut html = String::with_capacity(64 * 1024);

    writeln!(html, "<!DOCTYPE html>")?;
    writeln!(html, "<html lang=\"es\">")?;
    writeln!(html, "<head>")?;
    writeln!(html, "<meta charset=\"utf-8\"/>")?;
    writeln!(
        html,
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"/>"
    )?;
    writeln!(
        html,
        "<title>Reporte SC-CO2 V2 | Burke &amp; Fernandez Methodology</title>"
    )?;
    writeln!(html, "<script src=\"{}\"></script>", CHART_JS_URL)?;
    writeln!(
        html,
        "<link rel=\"stylesheet\" href=\"https://fonts.googleapis.com/css2?family=Manrope:wght@300;400;600;800&display=swap\"/>"
    )?;
    write_style(&mut html)?;
    writeln!(html, "</head>")?;
    writeln!(html, "<body>")?;
    writeln!(html, "<div class=\"wrap\">")?;

    writeln!(html, "<header class=\"report-header\">")?;
    writeln!(html, "<div>")?;
    writeln!(
        html,
        "<div class=\"badge\"><span class=\"badge-dot\"></span>Technical Report V2.0</div>"
    )?;
    writeln!(html, "<h1>Costo Social del Carbono</h1>")?;
    writeln!(
        html,
        "<p class=\"lead\">Valoración económica de daños climáticos basada en tasas de descuento (Burke et al., 2023) y vulnerabilidad territorial (Fernandez et al., 2015).</p>"
    )?;
    writeln!(html, "</div>")?;
    writeln!(html, "<div class=\"no-print controls\">")?;
    writeln!(html, "<select id=\"projectSelector\">")?;
    for p in &catalog.projects {
        let selected = if p.id == project.id { " selected" } else { "" };
        writeln!(
            html,
            "<option value=\"{}\"{}>{}</option>",
            escape_html(&p.id),
            selected,
            escape_html(&p.label)
        )?;
    }
    writeln!(html, "</select>")?;
    writeln!(
        html,
        "<button type=\"button\" class=\"print-btn\" onclick=\"window.print()\">Imprimir PDF</button>"
    )?;
    writeln!(html, "</div>")?;
    writeln!(html, "</header>")?;

    writeln!(html, "<div class=\"layout\">")?;
    writeln!(html, "<div class=\"side\">")?;
    writeln!(html, "<div class=\"card dark\">")?;
    writeln!(html, "<h2 class=\"eyebrow\">Proyecto Analizado</h2>")?;
    writeln!(
        html,
        "<div class=\"proj-title\" id=\"projTitle\">{}</div>",
        escape_html(&project.title)
    )?;
    writeln!(
        html,
        "<div class=\"proj-location\" id=\"projLocation\">{}</div>",
        escape_html(&project.location)
    )?;
    writeln!(
        html,
        "<div class=\"emissions\"><span>Emisiones Totales</span><span class=\"mono\" id=\"projEmissions\">{} tCO₂e</span></div>",
        fmt_num(project.emissions)
    )?;
    writeln!(
        html,
        "<p class=\"muted\">Fase de Construcción (Materiales + Maquinaria)</p>"
    )?;
    writeln!(html, "</div>")?;

    writeln!(html, "<div class=\"card\">")?;
    writeln!(
        html,
        "<h3 class=\"card-title\">Perfil de Vulnerabilidad <span class=\"ref\">Fernandez et al. 2015</span></h3>"
    )?;
    writeln!(
        html,
        "<div class=\"chart radar\"><canvas id=\"radarChart\"></canvas></div>"
    )?;
    writeln!(
        html,
        "<p class=\"note\">Métrica normalizada (0-1). Mayor área = Mayor riesgo estructural.</p>"
    )?;
    writeln!(html, "</div>")?;

    writeln!(html, "<div class=\"card accent\">")?;
    writeln!(
        html,
        "<div class=\"card-title\">Índice de Vulnerabilidad <span id=\"vulnLabel\" class=\"label {}\">{}</span></div>",
        sc.vulnerability_label.as_str_lower(),
        sc.vulnerability_label.as_str()
    )?;
    writeln!(
        html,
        "<div class=\"score\" id=\"vulnScore\">{}</div>",
        fmt_fixed2(sc.vulnerability_score)
    )?;
    writeln!(
        html,
        "<p class=\"note\">Calculado ponderando Exposición, Sensibilidad y (1 - Capacidad Adaptativa). Define el multiplicador del costo social.</p>"
    )?;
    writeln!(html, "</div>")?;
    writeln!(html, "</div>")?;

    writeln!(html, "<div class=\"main\">")?;
    writeln!(html, "<div class=\"scenarios\">")?;
    for s in Scenario::ALL {
        writeln!(html, "<div class=\"card {}\">", scenario_card_class(s))?;
        writeln!(
            html,
            "<div class=\"scenario-name\">Escenario {}</div>",
            s.label()
        )?;
        writeln!(
            html,
            "<div class=\"scenario-rate\">Tasa Descuento: {:.1}%</div>",
            s.discount_rate()
        )?;
        writeln!(
            html,
            "<div class=\"scenario-cost\" id=\"cost-{k}\">{}</div>",
            fmt_money(sc.costs.get(s)),
            k = s.as_str()
        )?;
        writeln!(
            html,
            "<div class=\"scenario-price\">Precio/ton: <span class=\"mono\" id=\"price-{k}\">{}</span></div>",
            fmt_money(sc.prices.get(s)),
            k = s.as_str()
        )?;
        writeln!(html, "</div>")?;
    }
    writeln!(html, "</div>")?;

    writeln!(html, "<div class=\"card wide\">")?;
    writeln!(
        html,
        "<h3 class=\"card-title\">Costo Social Total por Escenario (VPN)</h3>"
    )?;
    writeln!(
        html,
        "<div class=\"chart bar\"><canvas id=\"barChart\"></canvas></div>"
    )?;
    writeln!(
        html,
        "<p class=\"note\">*Valores representan el daño económico acumulado futuro (Loss &amp; Damage) atribuible a las emisiones de construcción hoy.</p>"
    )?;
    writeln!(html, "</div>")?;

    writeln!(html, "<div class=\"pair\">")?;
    writeln!(html, "<div class=\"card\">")?;
    writeln!(
        html,
        "<h3 class=\"card-title\">Distribución Relativa del Daño</h3>"
    )?;
    writeln!(
        html,
        "<div class=\"chart doughnut\"><canvas id=\"doughnutChart\"></canvas></div>"
    )?;
    writeln!(html, "</div>")?;
    writeln!(html, "<div class=\"card plain\">")?;
    writeln!(html, "<h3 class=\"card-title\">Interpretación Técnica</h3>")?;
    writeln!(
        html,
        "<p class=\"note\"><strong>Metodología Burke (2023):</strong> Aplica tasas de descuento decrecientes. El escenario \"Ético\" (2.5%) valora más los daños a futuras generaciones, resultando en costos sociales más altos.</p>"
    )?;
    writeln!(
        html,
        "<p class=\"note\"><strong>Ajuste Fernandez (2015):</strong> Los proyectos en <strong>Amazonía (Logroño/Mera)</strong> reciben un precio social por tonelada más alto debido a su baja capacidad adaptativa y alta sensibilidad ecosistémica, lo que amplifica el impacto monetario de cada tonelada emitida.</p>"
    )?;
    writeln!(html, "</div>")?;
    writeln!(html, "</div>")?;
    writeln!(html, "</div>")?;
    writeln!(html, "</div>")?;

    writeln!(
        html,
        "<footer>Generado {} | Referencias: Burke et al. (Stanford, 2023), Fernandez et al. (SpringerPlus, 2015).</footer>",
        fmt_timestamp(generated_at)
    )?;
    writeln!(html, "</div>")?;

    writeln!(
        html,
        "<script type=\"application/json\" id=\"report-data\">{}</script>",
        script_json(&payload)?
    )?;
    html.push_str("<script>");
    html.push_str(SCRIPT);
    html.push_str("</script>\n");
    writeln!(html, "</body></html>")?;
    Ok(html)
}

fn write_style(out: &mut String) -> Result<()> {
    writeln!(out, "<style>")?;
    writeln!(
        out,
        "body{{font-family:'Manrope',Arial,sans-serif;background:#f8fafc;color:#1e293b;margin:0;padding:48px 24px;}}"
    )?;
    writeln!(out, ".wrap{{max-width:1280px;margin:0 auto;}}")?;
    writeln!(
        out,
        ".report-header{{display:flex;justify-content:space-between;align-items:flex-end;gap:24px;border-bottom:1px solid #e2e8f0;padding-bottom:24px;margin-bottom:40px;}}"
    )?;
    writeln!(
        out,
        ".badge{{display:inline-flex;align-items:center;gap:8px;padding:4px 12px;border-radius:999px;background:#f1f5f9;border:1px solid #e2e8f0;font-size:11px;font-weight:700;color:#475569;text-transform:uppercase;letter-spacing:0.08em;}}"
    )?;
    writeln!(
        out,
        ".badge-dot{{width:8px;height:8px;border-radius:50%;background:#10b981;}}"
    )?;
    writeln!(
        out,
        "h1{{font-size:44px;font-weight:800;color:#0f172a;margin:12px 0 8px 0;letter-spacing:-0.02em;}}"
    )?;
    writeln!(out, ".lead{{font-size:18px;color:#64748b;max-width:760px;margin:0;}}")?;
    writeln!(
        out,
        ".controls{{display:flex;flex-direction:column;gap:8px;align-items:flex-end;}}"
    )?;
    writeln!(
        out,
        ".controls select{{width:256px;padding:10px;border:1px solid #cbd5e1;border-radius:8px;font-weight:600;background:#fff;}}"
    )?;
    writeln!(
        out,
        ".print-btn{{background:none;border:none;color:#4f46e5;font-weight:700;cursor:pointer;}}"
    )?;
    writeln!(
        out,
        ".layout{{display:grid;grid-template-columns:minmax(280px,1fr) 2fr;gap:32px;}}"
    )?;
    writeln!(out, ".side,.main{{display:flex;flex-direction:column;gap:24px;}}")?;
    writeln!(
        out,
        ".card{{background:#fff;border:1px solid #e2e8f0;border-radius:16px;box-shadow:0 4px 6px -1px rgba(0,0,0,0.05);padding:24px;}}"
    )?;
    writeln!(out, ".card.dark{{background:#0f172a;color:#fff;}}")?;
    writeln!(out, ".card.accent{{border-left:4px solid #6366f1;}}")?;
    writeln!(out, ".card.plain{{border:none;box-shadow:none;}}")?;
    writeln!(
        out,
        ".eyebrow{{font-size:11px;color:#94a3b8;text-transform:uppercase;letter-spacing:0.15em;margin:0 0 16px 0;}}"
    )?;
    writeln!(out, ".proj-title{{font-size:24px;font-weight:700;}}")?;
    writeln!(out, ".proj-location{{font-size:14px;color:#cbd5e1;margin-bottom:24px;}}")?;
    writeln!(
        out,
        ".emissions{{display:flex;justify-content:space-between;align-items:flex-end;border-top:1px solid #334155;padding-top:16px;color:#94a3b8;font-size:14px;}}"
    )?;
    writeln!(
        out,
        ".emissions .mono{{font-size:20px;color:#34d399;font-weight:700;}}"
    )?;
    writeln!(out, ".mono{{font-family:ui-monospace,Menlo,Consolas,monospace;}}")?;
    writeln!(out, ".muted{{font-size:12px;color:#64748b;}}")?;
    writeln!(
        out,
        ".card-title{{display:flex;justify-content:space-between;align-items:center;font-size:14px;font-weight:700;color:#1e293b;margin:0 0 16px 0;}}"
    )?;
    writeln!(
        out,
        ".ref{{font-size:11px;background:#f1f5f9;padding:2px 8px;border-radius:4px;color:#64748b;font-weight:400;}}"
    )?;
    writeln!(
        out,
        ".label{{font-size:11px;font-weight:700;padding:4px 8px;border-radius:4px;}}"
    )?;
    writeln!(out, ".label.alta{{color:#dc2626;background:#fef2f2;}}")?;
    writeln!(out, ".label.baja{{color:#059669;background:#ecfdf5;}}")?;
    writeln!(
        out,
        ".score{{font-size:36px;font-weight:800;color:#0f172a;margin-bottom:8px;}}"
    )?;
    writeln!(
        out,
        ".note{{font-size:12px;color:#64748b;line-height:1.6;}}"
    )?;
    writeln!(out, ".chart{{position:relative;width:100%;}}")?;
    writeln!(out, ".chart.radar{{height:256px;}}")?;
    writeln!(out, ".chart.bar{{height:320px;}}")?;
    writeln!(out, ".chart.doughnut{{height:192px;}}")?;
    writeln!(
        out,
        ".scenarios{{display:grid;grid-template-columns:repeat(auto-fit,minmax(200px,1fr));gap:16px;}}"
    )?;
    writeln!(
        out,
        ".scenario{{border-top:4px solid #94a3b8;transition:all 0.2s;}}"
    )?;
    writeln!(
        out,
        ".scenario:hover{{transform:translateY(-2px);box-shadow:0 10px 15px -3px rgba(0,0,0,0.1);}}"
    )?;
    writeln!(out, ".scenario.central{{border-top-color:#2563eb;background:#eff6ff;}}")?;
    writeln!(out, ".scenario.ethical{{border-top-color:#10b981;}}")?;
    writeln!(
        out,
        ".scenario-name{{font-size:11px;font-weight:700;text-transform:uppercase;color:#64748b;margin-bottom:4px;}}"
    )?;
    writeln!(out, ".scenario-rate{{font-size:11px;color:#94a3b8;margin-bottom:12px;}}")?;
    writeln!(out, ".scenario-cost{{font-size:24px;font-weight:700;color:#1e293b;}}")?;
    writeln!(out, ".scenario.central .scenario-cost{{font-size:30px;color:#1e3a8a;}}")?;
    writeln!(out, ".scenario-price{{font-size:11px;color:#64748b;margin-top:8px;}}")?;
    writeln!(
        out,
        ".pair{{display:grid;grid-template-columns:repeat(auto-fit,minmax(260px,1fr));gap:24px;}}"
    )?;
    writeln!(
        out,
        "footer{{margin-top:48px;padding-top:24px;border-top:1px solid #e2e8f0;text-align:center;font-size:12px;color:#94a3b8;}}"
    )?;
    writeln!(out, "@media print{{")?;
    writeln!(out, ".no-print{{display:none !important;}}")?;
    writeln!(out, "body{{background:#fff;padding:0;}}")?;
    writeln!(
        out,
        ".card{{box-shadow:none;border:1px solid #ccc;break-inside:avoid;}}"
    )?;
    writeln!(out, ".layout,.pair{{display:block;}}")?;
    writeln!(out, ".main{{width:100%;margin-bottom:20px;}}")?;
    writeln!(out, "}}")?;
    writeln!(out, "</style>")?;
    Ok(())
}

const SCRIPT: &str = r#"
(function () {
  'use strict';
  const payload = JSON.parse(document.getElementById('report-data').textContent);
  const projects = new Map(payload.projects.map(function (p) { return [p.id, p]; }));

  const money = new Intl.NumberFormat('en-US', { style: 'currency', currency: 'USD', maximumFractionDigits: 0 });
  const number = new Intl.NumberFormat('en-US', { maximumFractionDigits: 2 });

  function vulnerabilityScore(v) {
    return (v.exposure + v.sensitivity + (1 - v.adaptive_capacity)) / 3;
  }

  function computeSocialCost(profile) {
    const score = vulnerabilityScore(profile.vulnerability);
    const costs = {};
    for (const s of payload.scenarios) {
      costs[s.key] = profile.emissions * profile.scenarios[s.key];
    }
    return {
      score: score,
      label: score > payload.threshold ? 'ALTA' : 'BAJA',
      costs: costs,
      prices: profile.scenarios
    };
  }

  class SocialCostView {
    constructor(doc) {
      this.doc = doc;
      this.selector = doc.getElementById('projectSelector');
      this.charts = { radar: null, bar: null, doughnut: null };
      this.state = 'idle';
    }

    text(id, value) {
      this.doc.getElementById(id).textContent = value;
    }

    recompute() {
      this.state = 'recomputing';
      const profile = projects.get(this.selector.value) || projects.get(payload.default_project);
      const result = computeSocialCost(profile);

      this.text('projTitle', profile.title);
      this.text('projLocation', profile.location);
      this.text('projEmissions', number.format(profile.emissions) + ' tCO₂e');
      this.text('vulnScore', result.score.toFixed(2));
      const label = this.doc.getElementById('vulnLabel');
      label.textContent = result.label;
      label.className = 'label ' + result.label.toLowerCase();

      for (const s of payload.scenarios) {
        this.text('cost-' + s.key, money.format(result.costs[s.key]));
        this.text('price-' + s.key, money.format(result.prices[s.key]));
      }

      this.replaceCharts(profile, result);
      this.state = 'idle';
    }

    replace(name, canvasId, config) {
      if (this.charts[name]) {
        this.charts[name].destroy();
        this.charts[name] = null;
      }
      if (typeof Chart === 'undefined') return;
      this.charts[name] = new Chart(this.doc.getElementById(canvasId).getContext('2d'), config);
    }

    replaceCharts(profile, result) {
      const v = profile.vulnerability;
      this.replace('radar', 'radarChart', {
        type: 'radar',
        data: {
          labels: ['Exposición (Clima)', 'Sensibilidad (Social)', 'Capacidad Adaptativa'],
          datasets: [{
            label: 'Índice Local',
            data: [v.exposure, v.sensitivity, v.adaptive_capacity],
            backgroundColor: 'rgba(79, 70, 229, 0.2)',
            borderColor: '#4f46e5',
            pointBackgroundColor: '#4f46e5',
            pointBorderColor: '#fff'
          }]
        },
        options: {
          scales: { r: { min: 0, max: 1, ticks: { display: false } } },
          plugins: { legend: { display: false } }
        }
      });

      this.replace('bar', 'barChart', {
        type: 'bar',
        data: {
          labels: payload.scenarios.map(function (s) { return s.label + ' (' + s.rate + '%)'; }),
          datasets: [{
            label: 'Costo Social Total ($)',
            data: payload.scenarios.map(function (s) { return result.costs[s.key]; }),
            backgroundColor: payload.scenarios.map(function (s) { return s.color; }),
            borderRadius: 6,
            barThickness: 50
          }]
        },
        options: {
          responsive: true,
          maintainAspectRatio: false,
          plugins: { legend: { display: false } },
          scales: { y: { beginAtZero: true } }
        }
      });

      const shades = ['#cbd5e1', '#64748b', '#334155'];
      this.replace('doughnut', 'doughnutChart', {
        type: 'doughnut',
        data: {
          labels: payload.projects.map(function (p) { return p.title; }),
          datasets: [{
            data: payload.projects.map(function (p) { return p.emissions * p.scenarios.central; }),
            backgroundColor: payload.projects.map(function (_, i) { return shades[i % shades.length]; }),
            hoverBackgroundColor: payload.projects.map(function () { return '#2563eb'; }),
            borderWidth: 0
          }]
        },
        options: {
          responsive: true,
          maintainAspectRatio: false,
          cutout: '70%',
          plugins: { legend: { position: 'right', labels: { usePointStyle: true, font: { size: 10 } } } }
        }
      });
    }
  }

  window.addEventListener('load', function () {
    const view = new SocialCostView(document);
    view.selector.addEventListener('change', function () { view.recompute(); });
    view.recompute();
  });
})();
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::builtin_social_cost;

    fn doc() -> String {
        render(&builtin_social_cost(), 1_700_000_000).unwrap()
    }

    #[test]
    fn prerenders_ruminahui_valuation() {
        let html = doc();
        assert!(html.contains("id=\"projTitle\">Sistema AP Rumiñahui<"));
        assert!(html.contains("id=\"projEmissions\">1,589.98 tCO₂e<"));
        assert!(html.contains("id=\"vulnScore\">0.42<"));
        assert!(html.contains("class=\"label baja\">BAJA<"));
        assert!(html.contains("id=\"cost-conservative\">$27,030<"));
        assert!(html.contains("id=\"cost-central\">$81,089<"));
        assert!(html.contains("id=\"cost-ethical\">$135,148<"));
        assert!(html.contains("id=\"price-central\">$51<"));
    }

    #[test]
    fn scenario_cards_in_discount_order() {
        let html = doc();
        let a = html.find("Tasa Descuento: 5.0%").unwrap();
        let b = html.find("Tasa Descuento: 3.0%").unwrap();
        let c = html.find("Tasa Descuento: 2.5%").unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn payload_carries_threshold_and_scenarios() {
        let catalog = builtin_social_cost();
        let payload = SocialCostPayload::new(&catalog).unwrap();
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["threshold"], 0.6);
        assert_eq!(value["scenarios"][2]["key"], "ethical");
        assert_eq!(value["projects"][1]["vulnerability"]["adaptive_capacity"], 0.3);
    }

    #[test]
    fn chart_handles_are_owned_by_the_view() {
        let html = doc();
        assert!(html.contains("this.charts = { radar: null, bar: null, doughnut: null };"));
        assert!(!html.contains("let radarChart"));
    }
}
