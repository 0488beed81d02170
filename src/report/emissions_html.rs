use crate::core::cache::EMISSIONS_PREFIX;
use crate::core::calc::{Breakdown, compute_breakdown};
use crate::core::model::{EmissionProject, EmissionsCatalog, QuantityInput};
use crate::core::session::initial_quantities;
use crate::report::{CHART_JS_URL, escape_html, fmt_fixed2, fmt_timestamp, script_json};
use anyhow::{Result, anyhow};
use serde::Serialize;
use std::fmt::Write as FmtWrite;

pub const DEFAULT_FILE_NAME: &str = "index.html";
pub const DEFAULT_PORT: u16 = 8000;

/// Data handed to the document script.
#[derive(Serialize)]
pub struct EmissionsPayload<'a> {
    pub storage_prefix: &'a str,
    pub default_project: &'a str,
    pub projects: &'a [EmissionProject],
}

impl<'a> EmissionsPayload<'a> {
    pub fn new(catalog: &'a EmissionsCatalog) -> Result<Self> {
        let default = catalog
            .default_project()
            .ok_or_else(|| anyhow!("emission catalog has no projects"))?;
        Ok(EmissionsPayload {
            storage_prefix: EMISSIONS_PREFIX,
            default_project: &default.id,
            projects: &catalog.projects,
        })
    }
}

pub fn render(catalog: &EmissionsCatalog, generated_at: u64) -> Result<String> {
    let payload = EmissionsPayload::new(catalog)?;
    let project = catalog
        .default_project()
        .ok_or_else(|| anyhow!("emission catalog has no projects"))?;
    let quantities = initial_quantities(project, &QuantityInput::new());
    let breakdown = compute_breakdown(&project.factors, &quantities);

    let mut html = String::with_capacity(64 * 1024);

    writeln!(html, "<!DOCTYPE html>")?;
    writeln!(html, "<html lang=\"es\">")?;
    writeln!(html, "<head>")?;
    writeln!(html, "<meta charset=\"utf-8\"/>")?;
    writeln!(
        html,
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"/>"
    )?;
    writeln!(html, "<title>Reporte de Huella de Carbono (GEI)</title>")?;
    writeln!(html, "<script src=\"{}\"></script>", CHART_JS_URL)?;
    writeln!(
        html,
        "<link rel=\"stylesheet\" href=\"https://fonts.googleapis.com/css2?family=Inter:wght@300;400;600;800&display=swap\"/>"
    )?;
    write_style(&mut html)?;
    writeln!(html, "</head>")?;
    writeln!(html, "<body>")?;
    writeln!(html, "<div id=\"app\">")?;

    writeln!(html, "<header class=\"report-header\">")?;
    writeln!(html, "<div>")?;
    writeln!(html, "<h1>Reporte de Emisiones GEI</h1>")?;
    writeln!(
        html,
        "<p class=\"lead\">Cálculo de Huella de Carbono para Proyectos de Infraestructura</p>"
    )?;
    writeln!(
        html,
        "<p id=\"project-subtitle\" class=\"project\">PROYECTO: {}</p>",
        escape_html(&project.id.to_uppercase())
    )?;
    writeln!(html, "</div>")?;
    writeln!(
        html,
        "<button type=\"button\" class=\"no-print print-btn\" onclick=\"window.print()\">Imprimir / PDF</button>"
    )?;
    writeln!(html, "</header>")?;

    writeln!(html, "<section class=\"no-print config\">")?;
    writeln!(html, "<h3>Configuración del Proyecto</h3>")?;
    writeln!(
        html,
        "<label for=\"project-selector\">Seleccione Ubicación:</label>"
    )?;
    writeln!(html, "<select id=\"project-selector\">")?;
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
        "<p class=\"hint\">Modifique los valores abajo y presione Imprimir para generar el reporte.</p>"
    )?;
    writeln!(html, "</section>")?;

    writeln!(html, "<div class=\"grid\">")?;
    writeln!(html, "<div>")?;
    writeln!(html, "<h2 class=\"section\">1. Desglose de Emisiones</h2>")?;
    writeln!(html, "<div id=\"results-list\" class=\"results\">")?;
    results_rows(&mut html, &breakdown)?;
    writeln!(html, "</div>")?;
    writeln!(html, "<div class=\"total-card\">")?;
    writeln!(html, "<p class=\"total-label\">Huella Total Estimada</p>")?;
    writeln!(
        html,
        "<p id=\"total-emissions\" class=\"total\">{} tCO₂e</p>",
        fmt_fixed2(breakdown.total)
    )?;
    writeln!(html, "</div>")?;
    writeln!(html, "<div class=\"no-print editor\">")?;
    writeln!(html, "<h3>EDITAR CANTIDADES (APU):</h3>")?;
    writeln!(html, "<form id=\"calculation-form\" class=\"form\">")?;
    input_fields(&mut html, project, &quantities)?;
    writeln!(html, "</form>")?;
    writeln!(html, "</div>")?;
    writeln!(html, "</div>")?;

    writeln!(html, "<div>")?;
    writeln!(html, "<h2 class=\"section alt\">2. Análisis Gráfico</h2>")?;
    writeln!(
        html,
        "<div class=\"chart-box\"><canvas id=\"emissionsChart\"></canvas></div>"
    )?;
    writeln!(
        html,
        "<p class=\"caption\">Gráfico generado automáticamente con Chart.js</p>"
    )?;
    writeln!(html, "<div class=\"fe\">")?;
    writeln!(html, "<h3>Factores de Emisión Utilizados</h3>")?;
    writeln!(html, "<table class=\"fe-table\">")?;
    writeln!(
        html,
        "<thead><tr><th>Rubro</th><th class=\"num\">FE (tCO₂e/u)</th></tr></thead>"
    )?;
    writeln!(html, "<tbody id=\"fe-summary-body\">")?;
    factor_rows(&mut html, project)?;
    writeln!(html, "</tbody>")?;
    writeln!(html, "</table>")?;
    writeln!(html, "</div>")?;
    writeln!(html, "</div>")?;
    writeln!(html, "</div>")?;

    writeln!(
        html,
        "<footer>Generado el: <span id=\"current-date\">{}</span> | Consultoría Ambiental y Cartográfica</footer>",
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
        "body{{font-family:'Inter',Arial,sans-serif;background:#f0fdf4;color:#1f2937;margin:0;padding:24px;}}"
    )?;
    writeln!(
        out,
        "#app{{max-width:1024px;margin:0 auto;background:#fff;border:1px solid #dcfce7;border-radius:16px;box-shadow:0 20px 40px rgba(0,0,0,0.12);padding:32px;}}"
    )?;
    writeln!(
        out,
        ".report-header{{display:flex;justify-content:space-between;align-items:center;border-bottom:1px solid #bbf7d0;padding-bottom:20px;margin-bottom:28px;}}"
    )?;
    writeln!(out, "h1{{margin:0;font-size:32px;font-weight:800;color:#166534;}}")?;
    writeln!(out, ".lead{{color:#6b7280;margin:8px 0 0 0;font-weight:600;}}")?;
    writeln!(
        out,
        ".project{{color:#16a34a;font-size:13px;font-weight:700;letter-spacing:0.05em;margin:4px 0 0 0;}}"
    )?;
    writeln!(
        out,
        ".print-btn{{background:#1f2937;color:#fff;border:none;border-radius:8px;padding:10px 16px;font-weight:700;cursor:pointer;}}"
    )?;
    writeln!(
        out,
        ".config{{background:#f0fdf4;border:1px solid #bbf7d0;border-radius:12px;padding:20px;margin-bottom:28px;}}"
    )?;
    writeln!(
        out,
        ".config h3{{margin:0 0 10px 0;color:#166534;font-size:13px;text-transform:uppercase;letter-spacing:0.08em;}}"
    )?;
    writeln!(
        out,
        ".config select{{width:100%;padding:10px;border:1px solid #86efac;border-radius:8px;background:#fff;}}"
    )?;
    writeln!(out, ".hint{{font-size:12px;color:#6b7280;font-style:italic;}}")?;
    writeln!(
        out,
        ".grid{{display:grid;grid-template-columns:repeat(auto-fit,minmax(320px,1fr));gap:32px;}}"
    )?;
    writeln!(
        out,
        ".section{{font-size:20px;border-left:4px solid #22c55e;padding-left:12px;}}"
    )?;
    writeln!(out, ".section.alt{{border-left-color:#3b82f6;}}")?;
    writeln!(
        out,
        ".results{{border:1px solid #e5e7eb;border-radius:8px;overflow:hidden;}}"
    )?;
    writeln!(
        out,
        ".row{{display:flex;justify-content:space-between;align-items:center;padding:10px 12px;border-bottom:1px solid #f3f4f6;}}"
    )?;
    writeln!(out, ".row:last-child{{border-bottom:none;}}")?;
    writeln!(
        out,
        ".dot{{display:inline-block;width:12px;height:12px;border-radius:50%;margin-right:8px;vertical-align:middle;}}"
    )?;
    writeln!(out, ".value{{font-weight:700;}}")?;
    writeln!(out, ".unit{{font-size:11px;color:#6b7280;font-weight:400;}}")?;
    writeln!(
        out,
        ".total-card{{background:#16a34a;color:#fff;border-radius:12px;padding:20px;margin-top:20px;}}"
    )?;
    writeln!(
        out,
        ".total-label{{margin:0;font-size:13px;text-transform:uppercase;color:#dcfce7;}}"
    )?;
    writeln!(out, ".total{{margin:4px 0 0 0;font-size:30px;font-weight:800;}}")?;
    writeln!(
        out,
        ".editor{{margin-top:28px;padding-top:20px;border-top:1px solid #e5e7eb;}}"
    )?;
    writeln!(out, ".editor h3{{font-size:13px;color:#4b5563;}}")?;
    writeln!(
        out,
        ".form{{display:grid;gap:12px;background:#f9fafb;padding:16px;border-radius:8px;}}"
    )?;
    writeln!(
        out,
        ".form label{{display:block;font-size:11px;font-weight:700;color:#6b7280;text-transform:uppercase;}}"
    )?;
    writeln!(
        out,
        ".form input{{width:100%;box-sizing:border-box;padding:8px;border:1px solid #d1d5db;border-radius:4px;}}"
    )?;
    writeln!(
        out,
        ".chart-box{{position:relative;height:400px;border:1px solid #f3f4f6;border-radius:12px;padding:16px;}}"
    )?;
    writeln!(
        out,
        ".caption{{font-size:12px;color:#9ca3af;text-align:center;}}"
    )?;
    writeln!(
        out,
        ".fe{{margin-top:28px;padding-top:16px;border-top:1px solid #e5e7eb;}}"
    )?;
    writeln!(
        out,
        ".fe h3{{font-size:13px;color:#6b7280;text-transform:uppercase;}}"
    )?;
    writeln!(
        out,
        ".fe-table{{width:100%;border-collapse:collapse;font-size:12px;color:#4b5563;}}"
    )?;
    writeln!(
        out,
        ".fe-table th{{background:#f3f4f6;text-align:left;padding:4px 8px;}}"
    )?;
    writeln!(
        out,
        ".fe-table td{{padding:4px 8px;border-bottom:1px solid #f9fafb;}}"
    )?;
    writeln!(
        out,
        ".num{{text-align:right;font-family:ui-monospace,Menlo,Consolas,monospace;}}"
    )?;
    writeln!(
        out,
        "footer{{margin-top:48px;padding-top:20px;border-top:1px solid #e5e7eb;text-align:center;font-size:12px;color:#9ca3af;}}"
    )?;
    writeln!(out, "@media print{{")?;
    writeln!(out, "@page{{margin:1.5cm;size:auto;}}")?;
    writeln!(
        out,
        "body{{background:#fff;padding:0;-webkit-print-color-adjust:exact;print-color-adjust:exact;}}"
    )?;
    writeln!(out, ".no-print{{display:none !important;}}")?;
    writeln!(
        out,
        "#app{{box-shadow:none;border:none;max-width:100%;padding:0;}}"
    )?;
    writeln!(out, "h1{{color:#166534 !important;}}")?;
    writeln!(out, "}}")?;
    writeln!(out, "</style>")?;
    Ok(())
}

fn results_rows(out: &mut String, breakdown: &Breakdown) -> Result<()> {
    for row in &breakdown.rows {
        writeln!(
            out,
            "<div class=\"row\"><span><span class=\"dot\" style=\"background-color:{}\"></span>{}</span><span class=\"value\">{} <span class=\"unit\">tCO₂e</span></span></div>",
            escape_html(&row.color),
            escape_html(&row.name),
            fmt_fixed2(row.emissions)
        )?;
    }
    Ok(())
}

fn input_fields(out: &mut String, project: &EmissionProject, quantities: &QuantityInput) -> Result<()> {
    for f in &project.factors {
        let value = quantities.get(&f.key).copied().unwrap_or(0.0);
        writeln!(
            out,
            "<div><label for=\"qty-{k}\">{} ({})</label><input type=\"number\" step=\"any\" id=\"qty-{k}\" data-key=\"{k}\" value=\"{}\"/></div>",
            escape_html(&f.name),
            escape_html(&f.unit),
            value,
            k = escape_html(&f.key)
        )?;
    }
    Ok(())
}

fn factor_rows(out: &mut String, project: &EmissionProject) -> Result<()> {
    for f in &project.factors {
        writeln!(
            out,
            "<tr><td>{}</td><td class=\"num\">{}</td></tr>",
            escape_html(&f.name),
            f.factor
        )?;
    }
    Ok(())
}

const SCRIPT: &str = r#"
(function () {
  'use strict';
  const payload = JSON.parse(document.getElementById('report-data').textContent);
  const projects = new Map(payload.projects.map(function (p) { return [p.id, p]; }));

  function escapeHtml(s) {
    return String(s).replace(/[&<>"']/g, function (c) {
      return { '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;' }[c];
    });
  }

  const quantityCache = {
    key: function (project) { return payload.storage_prefix + '_' + project; },
    load: function (project) {
      try {
        const raw = window.localStorage.getItem(this.key(project));
        if (!raw) return {};
        const parsed = JSON.parse(raw);
        if (!parsed || typeof parsed !== 'object' || Array.isArray(parsed)) return {};
        const out = {};
        for (const k of Object.keys(parsed)) {
          if (typeof parsed[k] === 'number' && Number.isFinite(parsed[k])) out[k] = parsed[k];
        }
        return out;
      } catch (e) {
        return {};
      }
    },
    save: function (project, quantities) {
      try {
        window.localStorage.setItem(this.key(project), JSON.stringify(quantities));
      } catch (e) {
        // storage unavailable
      }
    }
  };

  function parseQuantity(raw) {
    const v = parseFloat(raw);
    return Number.isFinite(v) ? v : 0;
  }

  function computeBreakdown(factors, quantities) {
    let total = 0;
    const rows = factors.map(function (f) {
      const q = Number(quantities[f.key]);
      const emissions = (Number.isFinite(q) ? q : 0) * f.factor;
      total += emissions;
      return { name: f.name, color: f.color, emissions: emissions };
    });
    return { rows: rows, total: total };
  }

  class EmissionsView {
    constructor(doc) {
      this.selector = doc.getElementById('project-selector');
      this.form = doc.getElementById('calculation-form');
      this.results = doc.getElementById('results-list');
      this.feBody = doc.getElementById('fe-summary-body');
      this.total = doc.getElementById('total-emissions');
      this.subtitle = doc.getElementById('project-subtitle');
      this.canvas = doc.getElementById('emissionsChart');
      this.chart = null;
      this.state = 'idle';
      this.project = null;
    }

    selectProject(id) {
      this.project = projects.get(id) || projects.get(payload.default_project);
      this.subtitle.textContent = 'PROYECTO: ' + this.project.id.toUpperCase();
      this.renderInputs();
      this.recompute();
    }

    renderInputs() {
      const project = this.project;
      const cached = quantityCache.load(project.id);
      const fields = [];
      const feRows = [];
      for (const f of project.factors) {
        let value = cached[f.key];
        if (value === undefined) value = project.seed[f.key] !== undefined ? project.seed[f.key] : 0;
        const key = escapeHtml(f.key);
        fields.push('<div><label for="qty-' + key + '">' + escapeHtml(f.name) + ' (' + escapeHtml(f.unit) + ')</label>' +
          '<input type="number" step="any" id="qty-' + key + '" data-key="' + key + '" value="' + escapeHtml(value) + '"/></div>');
        feRows.push('<tr><td>' + escapeHtml(f.name) + '</td><td class="num">' + f.factor + '</td></tr>');
      }
      this.form.innerHTML = fields.join('');
      this.feBody.innerHTML = feRows.join('');
      const view = this;
      this.form.querySelectorAll('input').forEach(function (inp) {
        inp.addEventListener('input', function () { view.recompute(); });
      });
    }

    readQuantities() {
      const values = {};
      for (const f of this.project.factors) {
        const inp = document.getElementById('qty-' + f.key);
        values[f.key] = parseQuantity(inp ? inp.value : '');
      }
      return values;
    }

    recompute() {
      this.state = 'recomputing';
      const quantities = this.readQuantities();
      const breakdown = computeBreakdown(this.project.factors, quantities);
      this.results.innerHTML = breakdown.rows.map(function (r) {
        return '<div class="row"><span><span class="dot" style="background-color:' + escapeHtml(r.color) + '"></span>' +
          escapeHtml(r.name) + '</span><span class="value">' + r.emissions.toFixed(2) +
          ' <span class="unit">tCO₂e</span></span></div>';
      }).join('');
      this.total.textContent = breakdown.total.toFixed(2) + ' tCO₂e';
      this.replaceChart(breakdown);
      quantityCache.save(this.project.id, quantities);
      this.state = 'idle';
    }

    replaceChart(breakdown) {
      if (this.chart) {
        this.chart.destroy();
        this.chart = null;
      }
      if (typeof Chart === 'undefined') return;
      this.chart = new Chart(this.canvas.getContext('2d'), {
        type: 'doughnut',
        data: {
          labels: breakdown.rows.map(function (r) { return r.name; }),
          datasets: [{
            data: breakdown.rows.map(function (r) { return r.emissions; }),
            backgroundColor: breakdown.rows.map(function (r) { return r.color || '#ccc'; }),
            borderWidth: 0,
            hoverOffset: 10
          }]
        },
        options: {
          responsive: true,
          maintainAspectRatio: false,
          plugins: {
            legend: { position: 'bottom', labels: { font: { size: 10 }, boxWidth: 12 } },
            title: { display: true, text: 'Distribución de Emisiones (tCO₂e)' }
          },
          layout: { padding: 10 }
        }
      });
    }
  }

  window.addEventListener('load', function () {
    const view = new EmissionsView(document);
    document.getElementById('current-date').textContent =
      new Date().toLocaleDateString('es-EC', { year: 'numeric', month: 'long', day: 'numeric' });
    view.selector.addEventListener('change', function () { view.selectProject(view.selector.value); });
    view.selectProject(view.selector.value || payload.default_project);
  });
})();
"#;
