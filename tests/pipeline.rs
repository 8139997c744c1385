use std::path::Path;
use std::time::Duration;

use covid19count::region::write_regions;
use covid19count::transform::{Axis, Metric, TransformOptions};
use covid19count::{App, Config, Error, SeriesTable};
use tempfile::TempDir;
use tokio::net::TcpListener;

const CASES: &str = "dateRep,day,month,year,cases,deaths,countriesAndTerritories,geoId\n\
    03/01/2020,3,1,2020,10,1,Testland,TL\n\
    02/01/2020,2,1,2020,5,0,Testland,TL\n\
    01/01/2020,1,1,2020,0,0,Testland,TL\n\
    01/01/2020,1,1,2020,2,0,Otherland,OL\n\
    02/01/2020,2,1,2020,2,1,Otherland,OL\n\
    03/01/2020,3,1,2020,4,1,Otherland,OL\n";

const POPULATION: &str = "Country Name,Country Code,Year,Value\n\
    Testland,TL,2017,900\n\
    Testland,TL,2018,1000\n";

fn url(path: &Path) -> String {
    format!("file://{}", path.display())
}

fn setup() -> (TempDir, App) {
    let dir = tempfile::tempdir().unwrap();
    let remote = dir.path().join("remote");
    std::fs::create_dir_all(&remote).unwrap();
    std::fs::write(
        remote.join("index.html"),
        r#"<html><a href="about.html">About</a>
           <a href="cases-2020-01-03.csv">Download</a></html>"#,
    )
    .unwrap();
    std::fs::write(remote.join("cases-2020-01-03.csv"), CASES).unwrap();
    std::fs::write(remote.join("population.csv"), POPULATION).unwrap();

    let config = Config {
        data_page: url(&remote.join("index.html")),
        data_link_pattern: ".csv".into(),
        population_url: url(&remote.join("population.csv")),
        cache_dir: dir.path().join("cache"),
        ..Config::default()
    };
    (dir, App::new(config).unwrap())
}

#[tokio::test]
async fn cumulative_plot_starts_at_first_case() {
    let (_dir, app) = setup();
    let opts = TransformOptions {
        cumulative: true,
        ..Default::default()
    };
    let prepared = app.plot(&["TESTLAND".to_string()], &opts).await.unwrap();

    assert_eq!(prepared.series.values("Testland"), [5.0, 15.0]);
    assert_eq!(prepared.as_of.unwrap().to_string(), "2020-01-03");
    assert!(prepared.unknown.is_empty());
}

#[tokio::test]
async fn unknown_regions_are_reported_and_skipped() {
    let (_dir, app) = setup();
    let prepared = app
        .plot(
            &["narnia".to_string(), "otherland".to_string()],
            &TransformOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(prepared.unknown, ["narnia"]);
    assert_eq!(prepared.series.columns.len(), 1);
    assert_eq!(prepared.series.values("Otherland"), [2.0, 2.0, 4.0]);
}

#[tokio::test]
async fn only_unknown_regions_fail() {
    let (_dir, app) = setup();
    let err = app
        .plot(&["narnia".to_string()], &TransformOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.downcast_ref::<Error>(), Some(&Error::NoRegions));
}

#[tokio::test]
async fn per_capita_uses_latest_population() {
    let (_dir, app) = setup();
    let opts = TransformOptions {
        cumulative: true,
        per_capita: true,
        ..Default::default()
    };
    let prepared = app.plot(&["testland".to_string()], &opts).await.unwrap();
    assert_eq!(prepared.series.values("Testland"), [5.0 / 1000.0, 15.0 / 1000.0]);

    let err = app
        .plot(&["otherland".to_string()], &opts)
        .await
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<Error>(),
        Some(&Error::MissingPopulation("Otherland".into()))
    );
}

#[tokio::test]
async fn deaths_aligned_to_first_death() {
    let (_dir, app) = setup();
    let opts = TransformOptions {
        metric: Metric::Deaths,
        align_to_first_death: true,
        cumulative: true,
        ..Default::default()
    };
    let prepared = app
        .plot(&["testland".to_string(), "otherland".to_string()], &opts)
        .await
        .unwrap();

    assert_eq!(prepared.series.axis, Axis::Days(2));
    assert_eq!(
        prepared.series.column("Testland").unwrap().values,
        [Some(1.0), None]
    );
    assert_eq!(
        prepared.series.column("Otherland").unwrap().values,
        [Some(1.0), Some(2.0)]
    );
}

#[tokio::test]
async fn cached_spreadsheet_is_reused() {
    let (dir, app) = setup();
    app.dataset().await.unwrap();
    assert!(dir.path().join("cache").join("data.xls").exists());

    // 源文件没了也能从缓存读
    std::fs::remove_dir_all(dir.path().join("remote")).unwrap();
    let ds = app.dataset().await.unwrap();
    assert_eq!(ds.regions(), ["Otherland", "Testland"]);
}

#[tokio::test]
async fn regions_are_listed() {
    let (_dir, app) = setup();
    let ds = app.dataset().await.unwrap();
    let mut buf = Vec::new();
    write_regions(&ds, &mut buf).unwrap();
    assert_eq!(String::from_utf8(buf).unwrap(), "Otherland\nTestland\n");
}

#[tokio::test]
async fn fatality_rate_table_exports_to_csv() {
    let (_dir, app) = setup();
    let prepared = app.fatality(&["otherland".to_string()]).await.unwrap();

    // 累计：病例 2, 4, 8；死亡 0, 1, 2
    assert_eq!(prepared.series.values("Otherland"), [0.0, 25.0, 25.0]);

    let csv = SeriesTable::try_from(&prepared.series)
        .unwrap()
        .to_csv()
        .unwrap();
    assert!(csv.starts_with("date,Otherland\n2020-01-01,"));
    assert_eq!(csv.lines().count(), 4);
}

#[tokio::test]
async fn unresponsive_data_page_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        // 接受连接但不回复
        let mut held = Vec::new();
        while let Ok((sock, _)) = listener.accept().await {
            held.push(sock);
        }
    });

    let dir = tempfile::tempdir().unwrap();
    let app = App::new(Config {
        data_page: format!("http://{}/index.html", addr),
        cache_dir: dir.path().to_path_buf(),
        request_timeout: Duration::from_millis(200),
        ..Config::default()
    })
    .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(10), app.dataset())
        .await
        .expect("download should give up on its own");
    assert!(result.is_err());
    assert!(!dir.path().join("data.xls").exists());
}
