//! Dashboard Pages
//! Each page coerces its tables once after loading, then derives fresh chart
//! views from them for every selection.

use super::scale::{BandScale, LinearScale, HEADROOM};
use super::view::{BarChart, ChartView, InterventionMarker, LineChart, LineTrace, ProgressionChart};
use super::ChartError;
use crate::data::preprocess::{self, FIRST_WAVE, SECOND_WAVE, WAVE_COLUMN};
use crate::data::{
    coerce, date_values, numeric_values, text_values, FieldKind, FieldSpec, LoadedTables,
    SeriesBuilder, SeriesPoint, XValue,
};
use crate::interaction::Selection;
use crate::stats::Reducer;
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEATHS_BEFORE: &str = "deaths_before";
pub const DEATHS_AFTER: &str = "deaths_after";
pub const CASES_BEFORE: &str = "cases_before";
pub const CASES_AFTER: &str = "cases_after";
pub const CASES_SUMMARY: &str = "cases_summary";
pub const RESPONSES: &str = "responses";
pub const PANDEMIC_DATA: &str = "pandemic_data";
pub const PROGRESSION: &str = "progression";

const WEEKLY_COLUMNS: [&str; 3] = ["country", "week", "weekly_count"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    CasesAndDeaths,
    CasesAndInterventions,
    WaveComparison,
    PandemicProgression,
}

impl PageKind {
    pub const ALL: [PageKind; 4] = [
        PageKind::CasesAndDeaths,
        PageKind::CasesAndInterventions,
        PageKind::WaveComparison,
        PageKind::PandemicProgression,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            PageKind::CasesAndDeaths => "cases_and_deaths",
            PageKind::CasesAndInterventions => "cases_and_interventions",
            PageKind::WaveComparison => "wave_comparison",
            PageKind::PandemicProgression => "pandemic_progression",
        }
    }

    /// Whether the page redraws for the selected country.
    pub fn is_per_country(&self) -> bool {
        !matches!(self, PageKind::WaveComparison)
    }

    /// Table slots the page reads.
    pub fn slots(&self) -> &'static [&'static str] {
        match self {
            PageKind::CasesAndDeaths => &[DEATHS_BEFORE, DEATHS_AFTER, CASES_BEFORE, CASES_AFTER],
            PageKind::CasesAndInterventions => &[CASES_SUMMARY, RESPONSES],
            PageKind::WaveComparison => &[PANDEMIC_DATA],
            PageKind::PandemicProgression => &[PROGRESSION],
        }
    }
}

/// A page whose tables are loaded and typed.
#[derive(Debug, Clone)]
pub enum PreparedPage {
    CasesAndDeaths(CasesAndDeaths),
    CasesAndInterventions(CasesAndInterventions),
    WaveComparison(WaveComparison),
    PandemicProgression(PandemicProgression),
}

impl PreparedPage {
    pub fn prepare(kind: PageKind, tables: &LoadedTables) -> Result<Self, ChartError> {
        let page = match kind {
            PageKind::CasesAndDeaths => Self::CasesAndDeaths(CasesAndDeaths::prepare(tables)?),
            PageKind::CasesAndInterventions => {
                Self::CasesAndInterventions(CasesAndInterventions::prepare(tables)?)
            }
            PageKind::WaveComparison => Self::WaveComparison(WaveComparison::prepare(tables)?),
            PageKind::PandemicProgression => {
                Self::PandemicProgression(PandemicProgression::prepare(tables)?)
            }
        };
        info!(page = kind.slug(), countries = page.countries().len(), "page prepared");
        Ok(page)
    }

    pub fn kind(&self) -> PageKind {
        match self {
            Self::CasesAndDeaths(_) => PageKind::CasesAndDeaths,
            Self::CasesAndInterventions(_) => PageKind::CasesAndInterventions,
            Self::WaveComparison(_) => PageKind::WaveComparison,
            Self::PandemicProgression(_) => PageKind::PandemicProgression,
        }
    }

    /// Selector entries, first-seen order.
    pub fn countries(&self) -> &[String] {
        match self {
            Self::CasesAndDeaths(p) => &p.countries,
            Self::CasesAndInterventions(p) => &p.countries,
            Self::WaveComparison(p) => &p.countries,
            Self::PandemicProgression(p) => &p.countries,
        }
    }

    pub fn build(&self, selection: &Selection) -> Result<Vec<ChartView>, ChartError> {
        if let Self::WaveComparison(page) = self {
            return Ok(vec![page.build()]);
        }
        let Some(country) = selection.country.as_deref() else {
            return Ok(vec![ChartView::NoData {
                title: self.kind().slug().to_string(),
                reason: "No country selected".to_string(),
            }]);
        };

        match self {
            Self::CasesAndDeaths(page) => page.build(country),
            Self::CasesAndInterventions(page) => page.build(country, selection),
            Self::PandemicProgression(page) => page.build(country),
            Self::WaveComparison(page) => Ok(vec![page.build()]),
        }
    }
}

fn no_data(title: String) -> ChartView {
    ChartView::NoData {
        title,
        reason: "No data for this selection".to_string(),
    }
}

fn max_y(points: &[SeriesPoint]) -> f64 {
    points.iter().map(|p| p.y).fold(0.0, f64::max)
}

/// First point at `x`. Duplicates are resolved by taking the earliest row.
fn first_match(points: &[SeriesPoint], x: XValue) -> Option<f64> {
    points.iter().find(|p| p.x == x).map(|p| p.y)
}

/// Weekly deaths and cases split at 2021-03-01.
#[derive(Debug, Clone)]
pub struct CasesAndDeaths {
    deaths: [DataFrame; 2],
    cases: [DataFrame; 2],
    countries: Vec<String>,
}

impl CasesAndDeaths {
    fn prepare(tables: &LoadedTables) -> Result<Self, ChartError> {
        let spec = FieldSpec::new()
            .field("week", FieldKind::Numeric)
            .field("weekly_count", FieldKind::Numeric);

        let typed = |slot: &str| -> Result<DataFrame, ChartError> {
            let raw = tables.get_with_columns(slot, &WEEKLY_COLUMNS)?;
            let coerced = coerce(raw, &spec)?;
            Ok(preprocess::forward_fill_by(&coerced.table, "country", &["weekly_count"])?)
        };

        let deaths = [typed(DEATHS_BEFORE)?, typed(DEATHS_AFTER)?];
        let cases = [typed(CASES_BEFORE)?, typed(CASES_AFTER)?];
        let countries = SeriesBuilder::distinct_keys(&deaths[0], "country")?;

        Ok(Self {
            deaths,
            cases,
            countries,
        })
    }

    fn build(&self, country: &str) -> Result<Vec<ChartView>, ChartError> {
        let filter = [("country", country)];
        let series =
            |df: &DataFrame| SeriesBuilder::select_series(df, &filter, "week", "weekly_count");

        let deaths = [series(&self.deaths[0])?, series(&self.deaths[1])?];
        let cases = [series(&self.cases[0])?, series(&self.cases[1])?];

        let x_max = deaths
            .iter()
            .chain(cases.iter())
            .flatten()
            .map(|p| p.x.as_f64())
            .fold(0.0, f64::max);
        let x_scale = LinearScale::new((0.0, x_max.max(1.0)), (0.0, 1.0));

        Ok(vec![
            Self::period_chart(
                format!("Weekly deaths: {country}"),
                "Weekly Death Count",
                deaths,
                x_scale,
            ),
            Self::period_chart(
                format!("Weekly cases: {country}"),
                "Weekly Cases Count",
                cases,
                x_scale,
            ),
        ])
    }

    fn period_chart(
        title: String,
        y_label: &str,
        [before, after]: [Vec<SeriesPoint>; 2],
        x_scale: LinearScale,
    ) -> ChartView {
        if before.is_empty() && after.is_empty() {
            return no_data(title);
        }
        let y_max = max_y(&before).max(max_y(&after));

        ChartView::Line(LineChart {
            title,
            x_label: "Week".to_string(),
            y_label: y_label.to_string(),
            traces: vec![
                LineTrace {
                    label: "Before 2021-03-01".to_string(),
                    points: before,
                },
                LineTrace {
                    label: "From 2021-03-01".to_string(),
                    points: after,
                },
            ],
            markers: Vec::new(),
            marker_legend: Vec::new(),
            x_scale,
            y_scale: LinearScale::from_max(y_max, HEADROOM),
            x_is_date: false,
        })
    }
}

/// Weekly cases with the government responses that started on a plotted
/// week.
#[derive(Debug, Clone)]
pub struct CasesAndInterventions {
    cases: DataFrame,
    responses: DataFrame,
    countries: Vec<String>,
}

impl CasesAndInterventions {
    fn prepare(tables: &LoadedTables) -> Result<Self, ChartError> {
        let cases = tables.get_with_columns(CASES_SUMMARY, &["country", "year_week", "weekly_count"])?;
        let cases = coerce(
            cases,
            &FieldSpec::new()
                .field("year_week", FieldKind::YearWeek)
                .field("weekly_count", FieldKind::Numeric),
        )?
        .table;

        let responses = tables.get_with_columns(
            RESPONSES,
            &["Country", "Response_measure", "date_start", "date_end"],
        )?;
        let responses = coerce(
            responses,
            &FieldSpec::new()
                .field("date_start", FieldKind::Date)
                .field("date_end", FieldKind::Date),
        )?
        .table;
        let responses = preprocess::prepare_responses(&responses)?;

        let countries = SeriesBuilder::distinct_keys(&cases, "country")?;
        Ok(Self {
            cases,
            responses,
            countries,
        })
    }

    fn build(&self, country: &str, selection: &Selection) -> Result<Vec<ChartView>, ChartError> {
        let title = format!("Weekly cases and interventions: {country}");
        let points = SeriesBuilder::select_series(
            &self.cases,
            &[("country", country)],
            "year_week",
            "weekly_count",
        )?;
        if points.is_empty() {
            return Ok(vec![no_data(title)]);
        }

        let markers = self.markers(country, selection, &points)?;
        debug!(country, markers = markers.len(), "intervention markers matched");

        let x_scale = LinearScale::from_extent(points.iter().map(|p| p.x.as_f64()));
        let y_scale = LinearScale::from_max(max_y(&points), HEADROOM);

        Ok(vec![ChartView::Line(LineChart {
            title,
            x_label: "Date (Month and Year)".to_string(),
            y_label: "Weekly Cases Count".to_string(),
            traces: vec![LineTrace {
                label: "Weekly cases".to_string(),
                points,
            }],
            markers,
            marker_legend: selection.interventions.clone(),
            x_scale,
            y_scale,
            x_is_date: true,
        })])
    }

    /// Enabled responses whose start date is a plotted week, placed on the
    /// first case point of that week.
    fn markers(
        &self,
        country: &str,
        selection: &Selection,
        points: &[SeriesPoint],
    ) -> Result<Vec<InterventionMarker>, ChartError> {
        let rows = SeriesBuilder::filter_rows(&self.responses, &[("Country", country)])?;
        let column = |name: &str| rows.column(name).map_err(crate::data::ProcessError::from);

        let measures = text_values(column("Response_measure")?)?;
        let categories = text_values(column(preprocess::INTERVENTION_CATEGORY)?)?;
        let scores = numeric_values(column(preprocess::STRINGENCY_SCORE)?)?;
        let starts = date_values(column("date_start")?)?;
        let ends = date_values(column("date_end")?)?;

        let mut markers = Vec::new();
        for row in 0..rows.height() {
            let (Some(measure), Some(start)) = (&measures[row], starts[row]) else {
                continue;
            };
            if !selection.is_enabled(measure) {
                continue;
            }
            let x = XValue::Date(start);
            let Some(y) = first_match(points, x) else {
                continue;
            };
            markers.push(InterventionMarker {
                x,
                y,
                measure: measure.clone(),
                category: categories[row].clone().unwrap_or_default(),
                stringency: scores[row],
                start,
                end: ends[row],
            });
        }
        Ok(markers)
    }
}

/// Case totals per country for the first two waves.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveTotals {
    pub country: String,
    pub first_wave: f64,
    pub second_wave: f64,
}

#[derive(Debug, Clone)]
pub struct WaveComparison {
    totals: Vec<WaveTotals>,
    countries: Vec<String>,
}

impl WaveComparison {
    fn prepare(tables: &LoadedTables) -> Result<Self, ChartError> {
        let df = tables.get_with_columns(PANDEMIC_DATA, &["country", "indicator", "weekly_count"])?;

        let tagged;
        let df = if df.column(WAVE_COLUMN).is_ok() {
            df
        } else {
            let date_column = ["year_week", "date"]
                .into_iter()
                .find(|c| df.column(c).is_ok())
                .unwrap_or("year_week");
            tagged = preprocess::assign_waves(df, date_column)?;
            &tagged
        };

        let cases = SeriesBuilder::filter_rows(df, &[("indicator", "cases")])?;
        let totals = SeriesBuilder::aggregate(
            &cases,
            &["country", WAVE_COLUMN],
            "weekly_count",
            Reducer::Sum,
        )?;
        let totals = Self::by_country(&totals)?;
        let countries = totals.iter().map(|t| t.country.clone()).collect();

        Ok(Self { totals, countries })
    }

    /// Pivot `(country, wave, total)` rows; an absent wave counts as zero.
    fn by_country(totals: &DataFrame) -> Result<Vec<WaveTotals>, ChartError> {
        let column = |name: &str| totals.column(name).map_err(crate::data::ProcessError::from);
        let countries = text_values(column("country")?)?;
        let waves = text_values(column(WAVE_COLUMN)?)?;
        let sums = numeric_values(column("weekly_count")?)?;

        let mut out: Vec<WaveTotals> = Vec::new();
        for ((country, wave), sum) in countries.into_iter().zip(waves).zip(sums) {
            let (Some(country), Some(wave)) = (country, wave) else {
                continue;
            };
            let index = match out.iter().position(|t| t.country == country) {
                Some(i) => i,
                None => {
                    out.push(WaveTotals {
                        country,
                        first_wave: 0.0,
                        second_wave: 0.0,
                    });
                    out.len() - 1
                }
            };
            let sum = sum.unwrap_or(0.0);
            match wave.as_str() {
                FIRST_WAVE => out[index].first_wave = sum,
                SECOND_WAVE => out[index].second_wave = sum,
                _ => {}
            }
        }
        Ok(out)
    }

    pub fn totals(&self) -> &[WaveTotals] {
        &self.totals
    }

    fn build(&self) -> ChartView {
        let title = "Cases per pandemic wave".to_string();
        if self.totals.is_empty() {
            return no_data(title);
        }

        let max = self
            .totals
            .iter()
            .map(|t| t.first_wave.max(t.second_wave))
            .fold(0.0, f64::max);
        let n = self.totals.len() as f64;

        ChartView::Bars(BarChart {
            title,
            y_label: "Weekly Cases Count".to_string(),
            bands: BandScale::new(self.countries.clone(), (0.0, n), 0.2),
            groups: vec![FIRST_WAVE.to_string(), SECOND_WAVE.to_string()],
            values: self
                .totals
                .iter()
                .map(|t| vec![t.first_wave, t.second_wave])
                .collect(),
            y_scale: LinearScale::from_max(max, 1.0),
        })
    }
}

/// Monthly cases and deaths (0-100 of the all-country maximum) against the
/// stringency index.
#[derive(Debug, Clone)]
pub struct PandemicProgression {
    table: DataFrame,
    countries: Vec<String>,
}

impl PandemicProgression {
    fn prepare(tables: &LoadedTables) -> Result<Self, ChartError> {
        let raw = tables.get_with_columns(
            PROGRESSION,
            &["country", "date", "cases", "deaths", "stringency"],
        )?;
        let typed = coerce(
            raw,
            &FieldSpec::new()
                .field("date", FieldKind::Date)
                .field("cases", FieldKind::Numeric)
                .field("deaths", FieldKind::Numeric)
                .field("stringency", FieldKind::Numeric),
        )?
        .table;
        let table = SeriesBuilder::normalize(&typed, &["cases", "deaths"])?;
        let countries = SeriesBuilder::distinct_keys(&table, "country")?;
        Ok(Self { table, countries })
    }

    fn build(&self, country: &str) -> Result<Vec<ChartView>, ChartError> {
        let title = format!("Pandemic progression: {country}");
        let filter = [("country", country)];
        let series = |y: &str| SeriesBuilder::select_series(&self.table, &filter, "date", y);

        let cases = series("cases")?;
        if cases.is_empty() {
            return Ok(vec![no_data(title)]);
        }
        let deaths = series("deaths")?;
        let stringency = series("stringency")?;

        let dates: Vec<NaiveDate> = cases.iter().filter_map(|p| p.x.as_date()).collect();
        let labels = dates.iter().map(|d| d.format("%b %Y").to_string()).collect();
        let n = dates.len() as f64;

        Ok(vec![ChartView::Progression(ProgressionChart {
            title,
            cases: cases.iter().map(|p| p.y).collect(),
            deaths: cases
                .iter()
                .map(|p| first_match(&deaths, p.x).unwrap_or(0.0))
                .collect(),
            stringency: cases
                .iter()
                .map(|p| first_match(&stringency, p.x))
                .collect(),
            dates,
            bands: BandScale::new(labels, (0.0, n), 0.2),
            y_scale: LinearScale::new((0.0, 100.0), (0.0, 1.0)),
            stringency_scale: LinearScale::new((20.0, 100.0), (0.0, 1.0)),
        })])
    }
}
