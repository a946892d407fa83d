//! End-to-end tests: CSV files on disk through loading, coercion, series
//! building and page assembly.

use epichart::charts::{ChartView, PageKind, PreparedPage, PANDEMIC_DATA, RESPONSES, CASES_SUMMARY};
use epichart::data::{
    coerce, numeric_values, text_values, DataLoader, FieldKind, FieldSpec, LoadEvent, LoadSession,
    SeriesBuilder, TableSource, XValue,
};
use epichart::interaction::{Dashboard, InteractionEvent, Redraw, Selection};
use epichart::stats::Reducer;
use std::fs;
use std::path::{Path, PathBuf};

fn write_csv(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn selects_one_countrys_weekly_series() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        dir.path(),
        "weekly.csv",
        "country,week,weekly_count\nA,1,10\nA,2,20\nB,1,5\n",
    );

    let tables = DataLoader::load_all(&[TableSource::new("weekly", path)]).unwrap();
    let table = tables.get("weekly").unwrap();

    let series = SeriesBuilder::select_series(table, &[("country", "A")], "week", "weekly_count").unwrap();
    let points: Vec<(f64, f64)> = series.iter().map(|p| (p.x.as_f64(), p.y)).collect();
    assert_eq!(points, vec![(1.0, 10.0), (2.0, 20.0)]);
    assert_eq!(series[0].x, XValue::Number(1.0));
}

#[test]
fn wave_totals_match_manual_sums() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        dir.path(),
        "waves.csv",
        "country,pandemic_wave,weekly_count\n\
         A,First Wave,100\n\
         A,Second Wave,40\n\
         B,First Wave,7\n\
         A,First Wave,25\n\
         B,Second Wave,3\n\
         B,Second Wave,not-a-number\n",
    );

    let tables = DataLoader::load_all(&[TableSource::new("waves", path)]).unwrap();
    let raw = tables.get("waves").unwrap();
    let coerced = coerce(raw, &FieldSpec::new().field("weekly_count", FieldKind::Numeric)).unwrap();
    assert_eq!(coerced.warnings.len(), 1);

    let totals = SeriesBuilder::aggregate(
        &coerced.table,
        &["country", "pandemic_wave"],
        "weekly_count",
        Reducer::Sum,
    )
    .unwrap();

    let countries = text_values(totals.column("country").unwrap()).unwrap();
    let waves = text_values(totals.column("pandemic_wave").unwrap()).unwrap();
    let sums = numeric_values(totals.column("weekly_count").unwrap()).unwrap();
    let rows: Vec<(String, String, f64)> = countries
        .into_iter()
        .zip(waves)
        .zip(sums)
        .map(|((c, w), s)| (c.unwrap(), w.unwrap(), s.unwrap()))
        .collect();

    assert_eq!(
        rows,
        vec![
            ("A".to_string(), "First Wave".to_string(), 125.0),
            ("A".to_string(), "Second Wave".to_string(), 40.0),
            ("B".to_string(), "First Wave".to_string(), 7.0),
            ("B".to_string(), "Second Wave".to_string(), 3.0),
        ]
    );
}

#[test]
fn schema_error_only_affects_its_own_page() {
    let dir = tempfile::tempdir().unwrap();
    let pandemic = write_csv(dir.path(), "pandemic.csv", "country,weekly_count\nA,1\n");
    let cases = write_csv(
        dir.path(),
        "cases.csv",
        "country,year_week,weekly_count\nA,2020-12,5\nA,2020-13,9\n",
    );
    let responses = write_csv(
        dir.path(),
        "responses.csv",
        "Country,Response_measure,date_start,date_end\nA,StayHomeOrder,2020-03-16,2020-05-04\n",
    );

    let tables = DataLoader::load_all(&[
        TableSource::new(PANDEMIC_DATA, pandemic),
        TableSource::new(CASES_SUMMARY, cases),
        TableSource::new(RESPONSES, responses),
    ])
    .unwrap();

    let waves = PreparedPage::prepare(PageKind::WaveComparison, &tables);
    assert!(waves.unwrap_err().to_string().contains("'indicator'"));

    let page = PreparedPage::prepare(PageKind::CasesAndInterventions, &tables).unwrap();
    let mut dashboard = Dashboard::new(vec![page], Selection::new().with_interventions(["StayHomeOrder"]));
    assert_eq!(dashboard.countries(), vec!["A"]);

    assert_eq!(
        dashboard.handle(InteractionEvent::CountrySelected("A".to_string())),
        Redraw::Charts
    );
    let renders = dashboard.render();
    let views = renders[0].views.as_ref().unwrap();
    let ChartView::Line(chart) = &views[0] else {
        panic!("expected a line chart");
    };
    // 2020-12 starts on Monday 2020-03-16, the response start date
    assert_eq!(chart.markers.len(), 1);
    assert_eq!(chart.markers[0].y, 5.0);
}

#[test]
fn reload_replaces_table_and_keeps_it_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_csv(dir.path(), "v1.csv", "country\nA\n");
    let second = write_csv(dir.path(), "v2.csv", "country\nA\nB\n");

    let tables = DataLoader::load_all(&[TableSource::new("countries", first)]).unwrap();
    let mut session = LoadSession::new(tables);

    session.request(TableSource::new("countries", second));
    let events = session.wait();
    assert!(matches!(events[..], [LoadEvent::Applied { rows: 2, .. }]));

    session.request(TableSource::new("countries", dir.path().join("gone.csv")));
    let events = session.wait();
    assert!(matches!(events[..], [LoadEvent::Failed { .. }]));

    let keys = SeriesBuilder::distinct_keys(session.tables().get("countries").unwrap(), "country").unwrap();
    assert_eq!(keys, vec!["A", "B"]);
}

#[test]
fn reload_event_redraws_pages_from_the_new_table() {
    let dir = tempfile::tempdir().unwrap();
    let cases = write_csv(
        dir.path(),
        "cases.csv",
        "country,year_week,weekly_count\nA,2020-12,5\nA,2020-13,9\n",
    );
    let responses = write_csv(
        dir.path(),
        "responses.csv",
        "Country,Response_measure,date_start,date_end\nA,StayHomeOrder,2020-03-16,2020-05-04\n",
    );
    let tables = DataLoader::load_all(&[
        TableSource::new(CASES_SUMMARY, &cases),
        TableSource::new(RESPONSES, &responses),
    ])
    .unwrap();

    let page = PreparedPage::prepare(PageKind::CasesAndInterventions, &tables).unwrap();
    let mut dashboard = Dashboard::new(vec![page], Selection::new().with_country("A"));
    let mut session = LoadSession::new(tables);

    let updated = write_csv(
        dir.path(),
        "cases_v2.csv",
        "country,year_week,weekly_count\nA,2020-12,50\nA,2020-13,90\nB,2020-12,1\n",
    );
    let redraw = dashboard.handle(InteractionEvent::Reload {
        slot: CASES_SUMMARY.to_string(),
    });
    let Redraw::Reload(slot) = redraw else {
        panic!("expected a reload request, got {redraw:?}");
    };
    session.request(TableSource::new(&slot, updated));
    let events = session.wait();
    assert_eq!(dashboard.apply_loads(session.tables(), &events), Redraw::Charts);

    assert_eq!(dashboard.countries(), vec!["A", "B"]);
    let renders = dashboard.render();
    let views = renders[0].views.as_ref().unwrap();
    let ChartView::Line(chart) = &views[0] else {
        panic!("expected a line chart");
    };
    let ys: Vec<f64> = chart.traces[0].points.iter().map(|p| p.y).collect();
    assert_eq!(ys, vec![50.0, 90.0]);
}
