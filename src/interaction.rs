//! Interaction Events
//! Typed user interactions and the active selection they drive. The
//! selection has one writer ([`Dashboard::handle`]) and one reader (the
//! redraw in [`Dashboard::render`]).

use crate::charts::{ChartError, ChartView, PageKind, PreparedPage};
use crate::data::{LoadEvent, LoadedTables};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Active country and intervention filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub country: Option<String>,
    /// Enabled response measures, in the order they were enabled.
    pub interventions: Vec<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_country(mut self, country: &str) -> Self {
        self.country = Some(country.to_string());
        self
    }

    pub fn with_interventions<I, S>(mut self, measures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for measure in measures {
            self.enable(measure.into());
        }
        self
    }

    pub fn is_enabled(&self, measure: &str) -> bool {
        self.interventions.iter().any(|m| m == measure)
    }

    fn enable(&mut self, measure: String) -> bool {
        if self.is_enabled(&measure) {
            return false;
        }
        self.interventions.push(measure);
        true
    }

    fn disable(&mut self, measure: &str) -> bool {
        let before = self.interventions.len();
        self.interventions.retain(|m| m != measure);
        self.interventions.len() != before
    }
}

/// Something the user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionEvent {
    CountrySelected(String),
    InterventionToggled { measure: String, enabled: bool },
    /// Ask for the table in `slot` to be fetched again.
    Reload { slot: String },
}

/// What the host has to do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redraw {
    Nothing,
    Charts,
    Reload(String),
}

/// Rendered output of one page.
#[derive(Debug)]
pub struct PageRender {
    pub kind: PageKind,
    pub views: Result<Vec<ChartView>, ChartError>,
}

/// Prepared pages plus the active selection.
pub struct Dashboard {
    pages: Vec<PreparedPage>,
    selection: Selection,
}

impl Dashboard {
    pub fn new(pages: Vec<PreparedPage>, selection: Selection) -> Self {
        Self { pages, selection }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn pages(&self) -> &[PreparedPage] {
        &self.pages
    }

    /// Countries offered by any page, in first-seen order.
    pub fn countries(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.pages
            .iter()
            .flat_map(|page| page.countries().iter())
            .filter(|c| seen.insert(c.as_str()))
            .cloned()
            .collect()
    }

    /// Apply an event to the selection.
    pub fn handle(&mut self, event: InteractionEvent) -> Redraw {
        debug!(?event, "interaction");
        match event {
            InteractionEvent::CountrySelected(country) => {
                if self.selection.country.as_deref() == Some(country.as_str()) {
                    return Redraw::Nothing;
                }
                self.selection.country = Some(country);
                Redraw::Charts
            }
            InteractionEvent::InterventionToggled { measure, enabled } => {
                let changed = if enabled {
                    self.selection.enable(measure)
                } else {
                    self.selection.disable(&measure)
                };
                if changed {
                    Redraw::Charts
                } else {
                    Redraw::Nothing
                }
            }
            InteractionEvent::Reload { slot } => Redraw::Reload(slot),
        }
    }

    /// Prepare again every page that reads `slot`, from `tables`. If any of
    /// them fails, all pages are left as they were.
    pub fn refresh(&mut self, tables: &LoadedTables, slot: &str) -> Result<Vec<PageKind>, ChartError> {
        let refreshed = self
            .pages
            .iter()
            .enumerate()
            .filter(|(_, page)| page.kind().slots().contains(&slot))
            .map(|(i, page)| Ok((i, PreparedPage::prepare(page.kind(), tables)?)))
            .collect::<Result<Vec<_>, ChartError>>()?;

        let kinds: Vec<PageKind> = refreshed.iter().map(|(_, page)| page.kind()).collect();
        for (i, page) in refreshed {
            self.pages[i] = page;
        }
        info!(slot, pages = kinds.len(), "pages refreshed");
        Ok(kinds)
    }

    /// Fold finished loads into the pages. Only applied loads refresh; a
    /// page that cannot be prepared from the new table keeps its old data.
    pub fn apply_loads(&mut self, tables: &LoadedTables, events: &[LoadEvent]) -> Redraw {
        let mut redraw = Redraw::Nothing;
        for event in events {
            let LoadEvent::Applied { slot, .. } = event else {
                continue;
            };
            match self.refresh(tables, slot) {
                Ok(kinds) if !kinds.is_empty() => redraw = Redraw::Charts,
                Ok(_) => {}
                Err(e) => warn!(%slot, error = %e, "refresh failed, keeping previous pages"),
            }
        }
        redraw
    }

    /// Build the pages that follow the selected country.
    pub fn render(&self) -> Vec<PageRender> {
        self.render_where(|kind| kind.is_per_country())
    }

    /// Build the pages that show every country at once.
    pub fn render_overview(&self) -> Vec<PageRender> {
        self.render_where(|kind| !kind.is_per_country())
    }

    fn render_where(&self, include: impl Fn(PageKind) -> bool) -> Vec<PageRender> {
        self.pages
            .iter()
            .filter(|page| include(page.kind()))
            .map(|page| PageRender {
                kind: page.kind(),
                views: page.build(&self.selection),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::{PANDEMIC_DATA, RESPONSES};
    use polars::prelude::df;

    fn dashboard() -> Dashboard {
        Dashboard::new(Vec::new(), Selection::new().with_interventions(["StayHomeOrder"]))
    }

    #[test]
    fn selecting_same_country_twice_needs_no_redraw() {
        let mut dashboard = dashboard();
        let event = InteractionEvent::CountrySelected("Austria".to_string());
        assert_eq!(dashboard.handle(event.clone()), Redraw::Charts);
        assert_eq!(dashboard.handle(event), Redraw::Nothing);
        assert_eq!(dashboard.selection().country.as_deref(), Some("Austria"));
    }

    #[test]
    fn toggling_interventions() {
        let mut dashboard = dashboard();
        let enable = |measure: &str, enabled| InteractionEvent::InterventionToggled {
            measure: measure.to_string(),
            enabled,
        };

        assert_eq!(dashboard.handle(enable("StayHomeOrder", true)), Redraw::Nothing);
        assert_eq!(dashboard.handle(enable("ClosSec", true)), Redraw::Charts);
        assert_eq!(dashboard.selection().interventions, vec!["StayHomeOrder", "ClosSec"]);
        assert_eq!(dashboard.handle(enable("StayHomeOrder", false)), Redraw::Charts);
        assert!(!dashboard.selection().is_enabled("StayHomeOrder"));
    }

    #[test]
    fn reload_is_forwarded_to_the_host() {
        let mut dashboard = dashboard();
        let redraw = dashboard.handle(InteractionEvent::Reload {
            slot: "cases_summary".to_string(),
        });
        assert_eq!(redraw, Redraw::Reload("cases_summary".to_string()));
    }

    fn wave_tables(countries: &[&str]) -> LoadedTables {
        let mut tables = LoadedTables::new();
        tables.insert(
            PANDEMIC_DATA,
            df!(
                "country" => countries.to_vec(),
                "indicator" => vec!["cases"; countries.len()],
                "pandemic_wave" => vec!["First Wave"; countries.len()],
                "weekly_count" => vec!["1"; countries.len()],
            )
            .unwrap(),
        );
        tables
    }

    #[test]
    fn refresh_replaces_only_pages_reading_the_slot() {
        let tables = wave_tables(&["A"]);
        let page = PreparedPage::prepare(PageKind::WaveComparison, &tables).unwrap();
        let mut dashboard = Dashboard::new(vec![page], Selection::new());

        assert!(dashboard.refresh(&tables, RESPONSES).unwrap().is_empty());

        let tables = wave_tables(&["A", "B"]);
        let kinds = dashboard.refresh(&tables, PANDEMIC_DATA).unwrap();
        assert_eq!(kinds, vec![PageKind::WaveComparison]);
        assert_eq!(dashboard.countries(), vec!["A", "B"]);
    }

    #[test]
    fn failed_refresh_keeps_previous_pages() {
        let tables = wave_tables(&["A"]);
        let page = PreparedPage::prepare(PageKind::WaveComparison, &tables).unwrap();
        let mut dashboard = Dashboard::new(vec![page], Selection::new());

        let mut broken = LoadedTables::new();
        broken.insert(PANDEMIC_DATA, df!("country" => ["B"]).unwrap());
        assert!(dashboard.refresh(&broken, PANDEMIC_DATA).is_err());

        let events = [LoadEvent::Applied {
            slot: PANDEMIC_DATA.to_string(),
            rows: 1,
        }];
        assert_eq!(dashboard.apply_loads(&broken, &events), Redraw::Nothing);
        assert_eq!(dashboard.countries(), vec!["A"]);
    }
}
