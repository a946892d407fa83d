//! Dataset preparation: country filtering, wave tagging, intervention
//! scoring, vaccination progress, testing effectiveness and per-country
//! running totals.

use super::calendar::days_since_epoch;
use super::columns::{date_values, get_column, numeric_values, require_columns, text_values};
use super::processor::SeriesBuilder;
use super::{ProcessError, SchemaError};
use crate::stats::Reducer;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::collections::HashMap;
use tracing::debug;

pub const WAVE_COLUMN: &str = "pandemic_wave";
pub const FIRST_WAVE: &str = "First Wave";
pub const SECOND_WAVE: &str = "Second Wave";
pub const POST_VACCINE: &str = "Post-Vaccine Era";
pub const UNCATEGORIZED: &str = "Uncategorized";

pub const STRINGENCY_SCORE: &str = "stringency_score";
pub const INTERVENTION_CATEGORY: &str = "intervention_category";
pub const STRINGENCY_CATEGORY: &str = "stringency_category";
pub const INTERVENTION_DURATION: &str = "intervention_duration";

pub const VACCINATION_DATE: &str = "Date";
pub const CUMULATIVE_VACCINATIONS: &str = "CumulativeVaccinations";
pub const CUMULATIVE_VACCINATION_RATE: &str = "CumulativeVaccinationRate";
pub const WEEKLY_VACCINATIONS: &str = "VaccinationRateWeekly";
pub const WEEKLY_VACCINATIONS_AVG: &str = "VaccinationRate_7d_avg";
pub const VACCINATION_MILESTONE: &str = "VaccinationMilestone";
pub const TESTING_EFFECTIVENESS: &str = "testing_effectiveness";

/// Country columns used across the datasets, in lookup order.
const COUNTRY_COLUMNS: [&str; 3] = ["country", "Country", "ReportingCountry"];

pub const EU_EEA_COUNTRIES: [&str; 30] = [
    "Austria",
    "Belgium",
    "Bulgaria",
    "Croatia",
    "Cyprus",
    "Czech Republic",
    "Denmark",
    "Estonia",
    "Finland",
    "France",
    "Germany",
    "Greece",
    "Hungary",
    "Ireland",
    "Italy",
    "Latvia",
    "Lithuania",
    "Luxembourg",
    "Malta",
    "Netherlands",
    "Poland",
    "Portugal",
    "Romania",
    "Slovakia",
    "Slovenia",
    "Spain",
    "Sweden",
    "Iceland",
    "Liechtenstein",
    "Norway",
];

const DEFAULT_WEIGHT: f64 = 0.2;

const INTERVENTION_WEIGHTS: [(&str, f64); 18] = [
    ("StayHomeOrder", 1.0),
    ("StayHomeOrderPartial", 0.5),
    ("RegionalStayHomeOrder", 0.9),
    ("RegionalStayHomeOrderPartial", 0.45),
    ("WorkplaceClosures", 0.8),
    ("WorkplaceClosuresPartial", 0.4),
    ("ClosureOfPublicTransport", 0.7),
    ("ClosureOfPublicTransportPartial", 0.35),
    ("QuarantineForInternationalTravellers", 0.6),
    ("QuarantineForInternationalTravellersPartial", 0.3),
    ("MasksMandatoryAllSpaces", 0.85),
    ("MasksMandatoryAllSpacesPartial", 0.425),
    ("BanOnAllEvents", 0.75),
    ("BanOnAllEventsPartial", 0.375),
    ("PrivateGatheringRestrictions", 0.6),
    ("PrivateGatheringRestrictionsPartial", 0.3),
    ("NonEssentialShops", 0.55),
    ("NonEssentialShopsPartial", 0.275),
];

/// Wave label for a date. Waves switch on 2021-03-01 and 2021-09-01.
pub fn wave_for(date: NaiveDate) -> &'static str {
    match (date.year(), date.month()) {
        ym if ym < (2021, 3) => FIRST_WAVE,
        ym if ym < (2021, 9) => SECOND_WAVE,
        _ => POST_VACCINE,
    }
}

/// Add a `pandemic_wave` column derived from `date_column`.
pub fn assign_waves(df: &DataFrame, date_column: &str) -> Result<DataFrame, ProcessError> {
    let dates = date_values(get_column(df, date_column)?)?;
    let labels: Vec<&str> = dates
        .iter()
        .map(|d| d.map_or(UNCATEGORIZED, wave_for))
        .collect();

    let mut out = df.clone();
    out.with_column(Column::new(WAVE_COLUMN.into(), labels))?;
    Ok(out)
}

/// Severity weight of a response measure, `0.2` when unlisted.
pub fn intervention_weight(measure: &str) -> f64 {
    INTERVENTION_WEIGHTS
        .iter()
        .find(|(name, _)| *name == measure)
        .map_or(DEFAULT_WEIGHT, |(_, weight)| *weight)
}

/// Broad category of a response measure. Partial variants share the
/// category of the full measure, except the indoor/outdoor gathering sizes
/// which have no partial form.
pub fn intervention_category(measure: &str) -> &'static str {
    let (base, partial) = match measure.strip_suffix("Partial") {
        Some(base) => (base, true),
        None => (measure, false),
    };
    match base {
        "StayHomeOrder" | "RegionalStayHomeOrder" | "StayHomeRiskG" | "StayHomeGen" => "Lockdown",
        "WorkplaceClosures" | "Teleworking" | "AdaptationOfWorkplace" => "Workplace",
        "ClosureOfPublicTransport" => "Transport",
        "QuarantineForInternationalTravellers" => "Travel",
        "MasksMandatoryAllSpaces"
        | "MasksMandatoryClosedSpaces"
        | "MasksVoluntaryAllSpaces"
        | "MasksVoluntaryClosedSpaces" => "Masks",
        "BanOnAllEvents" => "Events",
        "RestaurantsCafes" | "HotelsOtherAccommodation" | "NonEssentialShops" => "Business",
        "ClosDaycare" | "ClosHigh" | "ClosPrim" | "ClosSec" => "Education",
        "ClosPubAny" | "EntertainmentVenues" | "GymsSportsCentres" | "PlaceOfWorship" => {
            "Public Space"
        }
        "IndoorOver50" | "IndoorOver100" | "IndoorOver500" | "IndoorOver1000" | "OutdoorOver50"
        | "OutdoorOver100" | "OutdoorOver500" | "OutdoorOver1000"
            if !partial =>
        {
            "Gathering"
        }
        "PrivateGatheringRestrictions" | "MassGather50" | "MassGatherAll" => "Gathering",
        "SocialCircle" => "Social Distancing",
        _ => "Other",
    }
}

/// Severity band of a 0-100 stringency score.
pub fn stringency_level(score: f64) -> &'static str {
    if score >= 75.0 {
        "High"
    } else if score >= 50.0 {
        "Medium"
    } else {
        "Low"
    }
}

/// Add `stringency_score` (measure weight rescaled to 0-100 over the table),
/// `intervention_category` and `stringency_category`.
pub fn score_interventions(df: &DataFrame, measure_column: &str) -> Result<DataFrame, ProcessError> {
    let measures = text_values(get_column(df, measure_column)?)?;

    let weights: Vec<Option<f64>> = measures
        .iter()
        .map(|m| m.as_deref().map(intervention_weight))
        .collect();
    let categories: Vec<&str> = measures
        .iter()
        .map(|m| m.as_deref().map_or("Other", intervention_category))
        .collect();

    let mut out = df.clone();
    out.with_column(Column::new(STRINGENCY_SCORE.into(), weights))?;
    out.with_column(Column::new(INTERVENTION_CATEGORY.into(), categories))?;
    let mut out = SeriesBuilder::normalize(&out, &[STRINGENCY_SCORE])?;

    let levels: Vec<Option<&str>> = numeric_values(get_column(&out, STRINGENCY_SCORE)?)?
        .into_iter()
        .map(|score| score.map(stringency_level))
        .collect();
    out.with_column(Column::new(STRINGENCY_CATEGORY.into(), levels))?;
    Ok(out)
}

/// Replace missing values with the last present value of the same group,
/// in row order. Leading gaps of a group stay missing.
pub fn forward_fill_by(
    df: &DataFrame,
    group_column: &str,
    value_columns: &[&str],
) -> Result<DataFrame, ProcessError> {
    let mut required = value_columns.to_vec();
    required.push(group_column);
    require_columns(df, &required)?;

    let groups = text_values(get_column(df, group_column)?)?;
    let mut out = df.clone();

    for name in value_columns {
        let values = numeric_values(get_column(df, name)?)?;
        let mut last: HashMap<Option<&str>, f64> = HashMap::new();
        let filled: Vec<Option<f64>> = values
            .into_iter()
            .zip(&groups)
            .map(|(value, group)| {
                let group = group.as_deref();
                match value {
                    Some(v) => {
                        last.insert(group, v);
                        Some(v)
                    }
                    None => last.get(&group).copied(),
                }
            })
            .collect();
        out.with_column(Column::new((*name).into(), filled))?;
    }

    Ok(out)
}

/// Running sum of `value_column` per group, in row order. Missing values
/// add nothing.
pub fn cumulative_by(
    df: &DataFrame,
    group_column: &str,
    value_column: &str,
    output_column: &str,
) -> Result<DataFrame, ProcessError> {
    require_columns(df, &[group_column, value_column])?;

    let groups = text_values(get_column(df, group_column)?)?;
    let values = numeric_values(get_column(df, value_column)?)?;

    let mut totals: HashMap<Option<&str>, f64> = HashMap::new();
    let running: Vec<f64> = values
        .iter()
        .zip(&groups)
        .map(|(value, group)| {
            let total = totals.entry(group.as_deref()).or_insert(0.0);
            *total += value.unwrap_or(0.0);
            *total
        })
        .collect();

    let mut out = df.clone();
    out.with_column(Column::new(output_column.into(), running))?;
    Ok(out)
}

/// `value / population * 1e6`; missing when the population is missing or
/// zero.
pub fn per_million(
    df: &DataFrame,
    value_column: &str,
    population_column: &str,
    output_column: &str,
) -> Result<DataFrame, ProcessError> {
    scaled_ratio(df, value_column, population_column, 1e6, output_column)
}

/// `value / base * 100`; missing when the base is missing or zero.
pub fn percent_of(
    df: &DataFrame,
    value_column: &str,
    base_column: &str,
    output_column: &str,
) -> Result<DataFrame, ProcessError> {
    scaled_ratio(df, value_column, base_column, 100.0, output_column)
}

fn scaled_ratio(
    df: &DataFrame,
    value_column: &str,
    base_column: &str,
    scale: f64,
    output_column: &str,
) -> Result<DataFrame, ProcessError> {
    require_columns(df, &[value_column, base_column])?;

    let values = numeric_values(get_column(df, value_column)?)?;
    let bases = numeric_values(get_column(df, base_column)?)?;

    let ratios: Vec<Option<f64>> = values
        .into_iter()
        .zip(bases)
        .map(|(value, base)| match (value, base) {
            (Some(v), Some(b)) if b != 0.0 => Some(v / b * scale),
            _ => None,
        })
        .collect();

    let mut out = df.clone();
    out.with_column(Column::new(output_column.into(), ratios))?;
    Ok(out)
}

/// Change from the previous row of the same group. The first row of a group
/// and rows next to a missing value get `0`.
pub fn diff_by(
    df: &DataFrame,
    group_column: &str,
    value_column: &str,
    output_column: &str,
) -> Result<DataFrame, ProcessError> {
    require_columns(df, &[group_column, value_column])?;

    let groups = text_values(get_column(df, group_column)?)?;
    let values = numeric_values(get_column(df, value_column)?)?;

    let mut previous: HashMap<Option<&str>, Option<f64>> = HashMap::new();
    let diffs: Vec<f64> = values
        .iter()
        .zip(&groups)
        .map(|(value, group)| {
            let before = previous.insert(group.as_deref(), *value).flatten();
            match (value, before) {
                (Some(v), Some(b)) => v - b,
                _ => 0.0,
            }
        })
        .collect();

    let mut out = df.clone();
    out.with_column(Column::new(output_column.into(), diffs))?;
    Ok(out)
}

/// Trailing mean over `window` rows of the same group. Missing until the
/// group has `window` rows, and whenever the window holds a missing value.
pub fn rolling_mean_by(
    df: &DataFrame,
    group_column: &str,
    value_column: &str,
    window: usize,
    output_column: &str,
) -> Result<DataFrame, ProcessError> {
    require_columns(df, &[group_column, value_column])?;

    let groups = text_values(get_column(df, group_column)?)?;
    let values = numeric_values(get_column(df, value_column)?)?;

    let mut history: HashMap<Option<&str>, Vec<Option<f64>>> = HashMap::new();
    let means: Vec<Option<f64>> = values
        .iter()
        .zip(&groups)
        .map(|(value, group)| {
            let seen = history.entry(group.as_deref()).or_default();
            seen.push(*value);
            if window == 0 || seen.len() < window {
                return None;
            }
            let recent = &seen[seen.len() - window..];
            let sum = recent.iter().copied().sum::<Option<f64>>()?;
            Some(sum / window as f64)
        })
        .collect();

    let mut out = df.clone();
    out.with_column(Column::new(output_column.into(), means))?;
    Ok(out)
}

/// Rows whose country is one of `countries`. The country column is the first
/// of `country`, `Country` or `ReportingCountry` present.
pub fn filter_countries(df: &DataFrame, countries: &[&str]) -> Result<DataFrame, ProcessError> {
    let Some(column) = COUNTRY_COLUMNS.into_iter().find(|c| df.column(c).is_ok()) else {
        return Err(SchemaError::MissingColumn(COUNTRY_COLUMNS[0].to_string()).into());
    };

    let keep: Vec<bool> = text_values(get_column(df, column)?)?
        .iter()
        .map(|c| c.as_deref().is_some_and(|c| countries.contains(&c)))
        .collect();
    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    let out = df.filter(&mask)?;

    debug!(column, kept = out.height(), dropped = df.height() - out.height(), "countries filtered");
    Ok(out)
}

/// Rows for EU/EEA member states only.
pub fn filter_eu_eea(df: &DataFrame) -> Result<DataFrame, ProcessError> {
    filter_countries(df, &EU_EEA_COUNTRIES)
}

/// Replace a missing end date with the latest end date in the table.
/// Output is a `Date` column.
pub fn fill_missing_end_dates(df: &DataFrame, end_column: &str) -> Result<DataFrame, ProcessError> {
    let ends = date_values(get_column(df, end_column)?)?;
    let latest = ends.iter().flatten().max().copied();

    let filled: Vec<Option<i32>> = ends
        .into_iter()
        .map(|end| end.or(latest).map(days_since_epoch))
        .collect();

    let mut out = df.clone();
    out.with_column(Column::new(end_column.into(), filled).cast(&DataType::Date)?)?;
    Ok(out)
}

/// Add `intervention_duration`, the days from start to end.
pub fn intervention_duration(
    df: &DataFrame,
    start_column: &str,
    end_column: &str,
) -> Result<DataFrame, ProcessError> {
    require_columns(df, &[start_column, end_column])?;

    let starts = date_values(get_column(df, start_column)?)?;
    let ends = date_values(get_column(df, end_column)?)?;
    let days: Vec<Option<i64>> = starts
        .into_iter()
        .zip(ends)
        .map(|(start, end)| Some((end? - start?).num_days()))
        .collect();

    let mut out = df.clone();
    out.with_column(Column::new(INTERVENTION_DURATION.into(), days))?;
    Ok(out)
}

/// Response table with filled end dates, durations and stringency scores.
/// Date columns are `Date`.
pub fn prepare_responses(df: &DataFrame) -> Result<DataFrame, ProcessError> {
    require_columns(df, &["Country", "Response_measure", "date_start", "date_end"])?;

    let starts: Vec<Option<i32>> = date_values(get_column(df, "date_start")?)?
        .into_iter()
        .map(|d| d.map(days_since_epoch))
        .collect();
    let mut out = df.clone();
    out.with_column(Column::new("date_start".into(), starts).cast(&DataType::Date)?)?;

    let out = fill_missing_end_dates(&out, "date_end")?;
    let out = intervention_duration(&out, "date_start", "date_end")?;
    score_interventions(&out, "Response_measure")
}

/// Summed stringency score per country and start date.
pub fn daily_stringency(responses: &DataFrame) -> Result<DataFrame, ProcessError> {
    SeriesBuilder::aggregate(responses, &["Country", "date_start"], STRINGENCY_SCORE, Reducer::Sum)
}

/// Milestone band of a cumulative vaccination percentage.
pub fn vaccination_milestone(percent: f64) -> &'static str {
    if percent >= 75.0 {
        "75%+ Vaccinated"
    } else if percent >= 50.0 {
        "50%+ Vaccinated"
    } else if percent >= 25.0 {
        "25%+ Vaccinated"
    } else {
        "less than 25% Vaccinated"
    }
}

/// Vaccination progress per reporting country: rows sorted by country and
/// week, then cumulative doses, coverage of the population, weekly change,
/// its 7-row mean and the milestone band.
pub fn prepare_vaccination(df: &DataFrame) -> Result<DataFrame, ProcessError> {
    const COUNTRY: &str = "ReportingCountry";
    const DOSES: &str = "NumberDosesReceived";
    require_columns(df, &[COUNTRY, "YearWeekISO", DOSES, "Population"])?;

    let dates = date_values(get_column(df, "YearWeekISO")?)?;
    let countries = text_values(get_column(df, COUNTRY)?)?;

    let mut order: Vec<usize> = (0..df.height()).collect();
    order.sort_by(|a, b| (&countries[*a], dates[*a]).cmp(&(&countries[*b], dates[*b])));
    let indices: Vec<IdxSize> = order.iter().map(|i| *i as IdxSize).collect();

    let days: Vec<Option<i32>> = order
        .iter()
        .map(|i| dates[*i].map(days_since_epoch))
        .collect();
    let mut out = df.take(&IdxCa::from_vec("order".into(), indices))?;
    out.with_column(Column::new(VACCINATION_DATE.into(), days).cast(&DataType::Date)?)?;

    let out = cumulative_by(&out, COUNTRY, DOSES, CUMULATIVE_VACCINATIONS)?;
    let out = percent_of(&out, CUMULATIVE_VACCINATIONS, "Population", CUMULATIVE_VACCINATION_RATE)?;
    let out = diff_by(&out, COUNTRY, DOSES, WEEKLY_VACCINATIONS)?;
    let mut out = rolling_mean_by(&out, COUNTRY, WEEKLY_VACCINATIONS, 7, WEEKLY_VACCINATIONS_AVG)?;

    let milestones: Vec<&str> = numeric_values(get_column(&out, CUMULATIVE_VACCINATION_RATE)?)?
        .into_iter()
        .map(|rate| vaccination_milestone(rate.unwrap_or(0.0)))
        .collect();
    out.with_column(Column::new(VACCINATION_MILESTONE.into(), milestones))?;
    Ok(out)
}

/// Testing table with gaps in `tests_done` and `positivity_rate` carried
/// forward per country, plus `testing_effectiveness`: `new_cases` as a
/// percentage of `tests_done`, 0 where it cannot be computed. A `date`
/// column is added from `year_week` when that column is present.
pub fn prepare_testing(df: &DataFrame) -> Result<DataFrame, ProcessError> {
    require_columns(df, &["country", "new_cases", "tests_done", "positivity_rate"])?;
    let out = forward_fill_by(df, "country", &["tests_done", "positivity_rate"])?;
    let mut out = percent_of(&out, "new_cases", "tests_done", TESTING_EFFECTIVENESS)?;

    let effectiveness: Vec<f64> = numeric_values(get_column(&out, TESTING_EFFECTIVENESS)?)?
        .into_iter()
        .map(|v| v.unwrap_or(0.0))
        .collect();
    out.with_column(Column::new(TESTING_EFFECTIVENESS.into(), effectiveness))?;

    if out.column("year_week").is_ok() {
        let days: Vec<Option<i32>> = date_values(get_column(&out, "year_week")?)?
            .into_iter()
            .map(|d| d.map(days_since_epoch))
            .collect();
        out.with_column(Column::new("date".into(), days).cast(&DataType::Date)?)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn waves_switch_on_boundary_dates() {
        assert_eq!(wave_for(ymd(2021, 2, 28)), FIRST_WAVE);
        assert_eq!(wave_for(ymd(2021, 3, 1)), SECOND_WAVE);
        assert_eq!(wave_for(ymd(2021, 8, 31)), SECOND_WAVE);
        assert_eq!(wave_for(ymd(2021, 9, 1)), POST_VACCINE);
    }

    #[test]
    fn assign_waves_reads_year_week_text() {
        let df = df!("year_week" => ["2020-10", "2021-20", "2022-01", "bad"]).unwrap();
        let out = assign_waves(&df, "year_week").unwrap();
        let waves = text_values(out.column(WAVE_COLUMN).unwrap()).unwrap();
        assert_eq!(
            waves,
            vec![
                Some(FIRST_WAVE.to_string()),
                Some(SECOND_WAVE.to_string()),
                Some(POST_VACCINE.to_string()),
                Some(UNCATEGORIZED.to_string()),
            ]
        );
    }

    #[test]
    fn intervention_lookups() {
        assert_eq!(intervention_weight("StayHomeOrder"), 1.0);
        assert_eq!(intervention_weight("ClosSec"), DEFAULT_WEIGHT);
        assert_eq!(intervention_category("MasksMandatoryAllSpacesPartial"), "Masks");
        assert_eq!(intervention_category("IndoorOver100"), "Gathering");
        assert_eq!(intervention_category("PrivateGatheringRestrictionsPartial"), "Gathering");
        assert_eq!(intervention_category("ClosSecPartial"), "Education");
        assert_eq!(intervention_category("Unknown"), "Other");
        assert_eq!(stringency_level(80.0), "High");
        assert_eq!(stringency_level(50.0), "Medium");
        assert_eq!(stringency_level(10.0), "Low");
    }

    #[test]
    fn scoring_normalizes_against_strongest_measure() {
        let df = df!("Response_measure" => ["StayHomeOrderPartial", "WorkplaceClosures", "ClosSec"])
            .unwrap();
        let out = score_interventions(&df, "Response_measure").unwrap();

        let scores = numeric_values(out.column(STRINGENCY_SCORE).unwrap()).unwrap();
        assert_eq!(scores, vec![Some(0.5 / 0.8 * 100.0), Some(100.0), Some(0.2 / 0.8 * 100.0)]);

        let levels = text_values(out.column(STRINGENCY_CATEGORY).unwrap()).unwrap();
        assert_eq!(
            levels,
            vec![Some("Medium".to_string()), Some("High".to_string()), Some("Low".to_string())]
        );
    }

    #[test]
    fn forward_fill_does_not_cross_groups() {
        let df = df!(
            "country" => ["A", "A", "B", "B"],
            "weekly_count" => [Some(5.0), None, None, Some(2.0)],
        )
        .unwrap();
        let out = forward_fill_by(&df, "country", &["weekly_count"]).unwrap();
        let values = numeric_values(out.column("weekly_count").unwrap()).unwrap();
        assert_eq!(values, vec![Some(5.0), Some(5.0), None, Some(2.0)]);
    }

    #[test]
    fn cumulative_and_rates() {
        let df = df!(
            "country" => ["A", "B", "A"],
            "weekly_count" => ["1", "4", "2"],
            "population" => [Some(1_000_000.0), Some(0.0), None],
        )
        .unwrap();

        let out = cumulative_by(&df, "country", "weekly_count", "cumulative").unwrap();
        let totals = numeric_values(out.column("cumulative").unwrap()).unwrap();
        assert_eq!(totals, vec![Some(1.0), Some(4.0), Some(3.0)]);

        let out = per_million(&df, "weekly_count", "population", "cases_per_million").unwrap();
        let rates = numeric_values(out.column("cases_per_million").unwrap()).unwrap();
        assert_eq!(rates, vec![Some(1.0), None, None]);
    }

    #[test]
    fn gathering_sizes_have_no_partial_form() {
        for measure in ["IndoorOver50", "IndoorOver100", "OutdoorOver500", "OutdoorOver1000"] {
            assert_eq!(intervention_category(measure), "Gathering");
            assert_eq!(intervention_category(&format!("{measure}Partial")), "Other");
        }
    }

    #[test]
    fn percent_of_skips_missing_or_zero_base() {
        let df = df!(
            "new_cases" => [Some(5.0), Some(1.0), Some(2.0)],
            "tests_done" => [Some(50.0), Some(0.0), None],
        )
        .unwrap();
        let out = percent_of(&df, "new_cases", "tests_done", "share").unwrap();
        let shares = numeric_values(out.column("share").unwrap()).unwrap();
        assert_eq!(shares, vec![Some(10.0), None, None]);
    }

    #[test]
    fn diff_and_rolling_mean_stay_within_groups() {
        let df = df!(
            "country" => ["A", "A", "B", "A", "B"],
            "doses" => [Some(10.0), Some(15.0), Some(4.0), Some(25.0), None],
        )
        .unwrap();

        let out = diff_by(&df, "country", "doses", "change").unwrap();
        let changes = numeric_values(out.column("change").unwrap()).unwrap();
        assert_eq!(changes, vec![Some(0.0), Some(5.0), Some(0.0), Some(10.0), Some(0.0)]);

        let out = rolling_mean_by(&out, "country", "change", 2, "avg").unwrap();
        let means = numeric_values(out.column("avg").unwrap()).unwrap();
        assert_eq!(means, vec![None, Some(2.5), None, Some(7.5), Some(0.0)]);
    }

    #[test]
    fn vaccination_progress_per_country() {
        let df = df!(
            "ReportingCountry" => ["Malta", "Austria", "Malta", "Austria"],
            "YearWeekISO" => ["2021-W02", "2021-W01", "2021-W01", "2021-W02"],
            "NumberDosesReceived" => ["200", "30", "100", "45"],
            "Population" => ["400", "100", "400", "100"],
        )
        .unwrap();
        let out = prepare_vaccination(&df).unwrap();

        let countries = text_values(out.column("ReportingCountry").unwrap()).unwrap();
        let countries: Vec<_> = countries.into_iter().flatten().collect();
        assert_eq!(countries, vec!["Austria", "Austria", "Malta", "Malta"]);

        let dates = date_values(out.column(VACCINATION_DATE).unwrap()).unwrap();
        assert_eq!(dates[0], Some(ymd(2021, 1, 4)));
        assert_eq!(dates[1], Some(ymd(2021, 1, 11)));

        let cumulative = numeric_values(out.column(CUMULATIVE_VACCINATIONS).unwrap()).unwrap();
        assert_eq!(cumulative, vec![Some(30.0), Some(75.0), Some(100.0), Some(300.0)]);

        let rates = numeric_values(out.column(CUMULATIVE_VACCINATION_RATE).unwrap()).unwrap();
        assert_eq!(rates, vec![Some(30.0), Some(75.0), Some(25.0), Some(75.0)]);

        let weekly = numeric_values(out.column(WEEKLY_VACCINATIONS).unwrap()).unwrap();
        assert_eq!(weekly, vec![Some(0.0), Some(15.0), Some(0.0), Some(100.0)]);

        let milestones = text_values(out.column(VACCINATION_MILESTONE).unwrap()).unwrap();
        let milestones: Vec<_> = milestones.into_iter().flatten().collect();
        assert_eq!(
            milestones,
            vec!["25%+ Vaccinated", "75%+ Vaccinated", "25%+ Vaccinated", "75%+ Vaccinated"]
        );
    }

    #[test]
    fn milestone_bands() {
        assert_eq!(vaccination_milestone(80.0), "75%+ Vaccinated");
        assert_eq!(vaccination_milestone(50.0), "50%+ Vaccinated");
        assert_eq!(vaccination_milestone(24.9), "less than 25% Vaccinated");
    }

    #[test]
    fn testing_effectiveness_uses_filled_test_counts() {
        let df = df!(
            "country" => ["A", "A", "B"],
            "year_week" => ["2021-W01", "2021-W02", "2021-W01"],
            "new_cases" => [Some(10.0), Some(20.0), Some(3.0)],
            "tests_done" => [Some(100.0), None, None],
            "positivity_rate" => [Some(1.5), None, None],
        )
        .unwrap();
        let out = prepare_testing(&df).unwrap();

        let tests = numeric_values(out.column("tests_done").unwrap()).unwrap();
        assert_eq!(tests, vec![Some(100.0), Some(100.0), None]);

        let effectiveness = numeric_values(out.column(TESTING_EFFECTIVENESS).unwrap()).unwrap();
        assert_eq!(effectiveness, vec![Some(10.0), Some(20.0), Some(0.0)]);

        let dates = date_values(out.column("date").unwrap()).unwrap();
        assert_eq!(dates[1], Some(ymd(2021, 1, 11)));
    }

    #[test]
    fn country_filter_keeps_eu_eea_rows() {
        let df = df!(
            "Country" => ["Norway", "United Kingdom", "Malta", "Switzerland"],
            "value" => [1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        let out = filter_eu_eea(&df).unwrap();
        let kept = text_values(out.column("Country").unwrap()).unwrap();
        assert_eq!(kept, vec![Some("Norway".to_string()), Some("Malta".to_string())]);

        let unnamed = df!("region" => ["Malta"]).unwrap();
        assert!(filter_eu_eea(&unnamed).is_err());
    }

    #[test]
    fn responses_get_end_dates_durations_and_daily_stringency() {
        let df = df!(
            "Country" => ["A", "A", "A"],
            "Response_measure" => ["StayHomeOrder", "ClosSec", "WorkplaceClosures"],
            "date_start" => ["2020-03-16", "2020-03-16", "2020-04-01"],
            "date_end" => [Some("2020-05-04"), None, Some("2020-04-11")],
        )
        .unwrap();
        let out = prepare_responses(&df).unwrap();

        let ends = date_values(out.column("date_end").unwrap()).unwrap();
        assert_eq!(ends[1], Some(ymd(2020, 5, 4)));
        assert_eq!(out.column("date_end").unwrap().dtype(), &DataType::Date);

        let durations = numeric_values(out.column(INTERVENTION_DURATION).unwrap()).unwrap();
        assert_eq!(durations, vec![Some(49.0), Some(49.0), Some(10.0)]);

        let daily = daily_stringency(&out).unwrap();
        assert_eq!(daily.height(), 2);
        let totals = numeric_values(daily.column(STRINGENCY_SCORE).unwrap()).unwrap();
        assert_eq!(totals, vec![Some(120.0), Some(80.0)]);
    }
}
