//! Epichart - renders the COVID-19 dashboards to image files.
//!
//! Usage: `epichart [config.json]`. The config path falls back to
//! `$EPICHART_CONFIG`, then `dashboard.json`.

use anyhow::{bail, Context, Result};
use epichart::charts::{output_file_name, ChartPlotter, ChartView, PreparedPage};
use epichart::config::{DashboardConfig, CONFIG_ENV, DEFAULT_CONFIG_PATH};
use epichart::data::{DataLoader, LoadSession, LoadedTables};
use epichart::interaction::{Dashboard, InteractionEvent, PageRender, Redraw, Selection};
use rayon::prelude::*;
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// One image to write.
struct RenderJob {
    path: PathBuf,
    view: ChartView,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let path = config_path();
    let config = DashboardConfig::load(&path)
        .with_context(|| format!("loading config {}", path.display()))?;

    let tables = DataLoader::load_all(&config.required_sources()).context("loading datasets")?;
    let pages = prepare_pages(&config, &tables);
    if pages.is_empty() {
        bail!("none of the configured pages could be prepared");
    }

    let selection = Selection::new().with_interventions(config.interventions.iter().cloned());
    let mut dashboard = Dashboard::new(pages, selection);
    let mut session = LoadSession::new(tables);

    let countries = config.countries.clone().unwrap_or_else(|| dashboard.countries());
    let mut written = write_charts(&config, &render_all(&mut dashboard, &config, &countries))?;

    for slot in &config.reload {
        let redraw = dashboard.handle(InteractionEvent::Reload { slot: slot.clone() });
        if dispatch(redraw, &mut dashboard, &mut session, &config) == Redraw::Charts {
            written += write_charts(&config, &render_all(&mut dashboard, &config, &countries))?;
        }
    }

    info!(
        charts = written,
        countries = countries.len(),
        output_dir = %config.output_dir.display(),
        "dashboard rendered"
    );
    Ok(())
}

/// Carry out what an event asked for. A reload runs through the session
/// and comes back as `Charts` when a page picked up the new table.
fn dispatch(
    redraw: Redraw,
    dashboard: &mut Dashboard,
    session: &mut LoadSession,
    config: &DashboardConfig,
) -> Redraw {
    let Redraw::Reload(slot) = redraw else {
        return redraw;
    };
    let Some(source) = config.source(&slot) else {
        warn!(%slot, "no source configured for reload");
        return Redraw::Nothing;
    };
    session.request(source.clone());
    let events = session.wait();
    dashboard.apply_loads(session.tables(), &events)
}

/// Overview charts plus the per-country charts of every country.
fn render_all(
    dashboard: &mut Dashboard,
    config: &DashboardConfig,
    countries: &[String],
) -> Vec<RenderJob> {
    let mut jobs = Vec::new();
    collect_jobs(&mut jobs, config, None, dashboard.render_overview());

    for country in countries {
        // pages may have changed since the last pass, so render even when
        // the country is already selected
        dashboard.handle(InteractionEvent::CountrySelected(country.clone()));
        collect_jobs(&mut jobs, config, Some(country.as_str()), dashboard.render());
    }
    jobs
}

fn write_charts(config: &DashboardConfig, jobs: &[RenderJob]) -> Result<usize> {
    let size = (config.width, config.height);
    jobs.par_iter()
        .map(|job| {
            ChartPlotter::render(&job.view, &job.path, size, config.format)
                .with_context(|| format!("writing {}", job.path.display()))
        })
        .collect::<Result<Vec<()>>>()?;
    Ok(jobs.len())
}

fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
        .into()
}

/// Prepare every configured page; a page whose tables are unusable is
/// skipped.
fn prepare_pages(config: &DashboardConfig, tables: &LoadedTables) -> Vec<PreparedPage> {
    config
        .pages
        .iter()
        .filter_map(|kind| match PreparedPage::prepare(*kind, tables) {
            Ok(page) => Some(page),
            Err(e) => {
                warn!(page = kind.slug(), error = %e, "page skipped");
                None
            }
        })
        .collect()
}

fn collect_jobs(
    jobs: &mut Vec<RenderJob>,
    config: &DashboardConfig,
    country: Option<&str>,
    renders: Vec<PageRender>,
) {
    for render in renders {
        let views = match render.views {
            Ok(views) => views,
            Err(e) => {
                warn!(page = render.kind.slug(), country, error = %e, "page render failed");
                continue;
            }
        };
        for (i, view) in views.into_iter().enumerate() {
            let name = output_file_name(render.kind.slug(), country, i, config.format);
            jobs.push(RenderJob {
                path: config.output_dir.join(name),
                view,
            });
        }
    }
}
