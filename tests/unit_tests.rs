use clap::Parser;
use film_sync::{ElasticOpts, PostgresOpts, Schedule, ScheduleOpts};
use film_sync_elasticsearch_sink::ElasticConfig;
use film_sync_postgresql_source::SourceOpts;
use std::time::Duration;

#[test]
fn test_postgres_opts_conversion() {
    let opts = PostgresOpts::try_parse_from([
        "film-sync",
        "--db-host",
        "db.internal",
        "--db-port",
        "5433",
        "--db-name",
        "movies_database",
        "--db-user",
        "app",
        "--db-password",
        "secret",
    ])
    .unwrap();

    let source = SourceOpts::from(&opts);
    assert_eq!(source.host, "db.internal");
    assert_eq!(source.port, 5433);
    assert_eq!(source.dbname, "movies_database");
    assert_eq!(source.user, "app");
    assert_eq!(source.password, "secret");
    assert_eq!(source.schema, "content");
}

#[test]
fn test_elastic_opts_url() {
    let opts = ElasticOpts {
        elastic_scheme: "https".to_string(),
        elastic_host: "search.internal".to_string(),
        elastic_port: 9243,
        elastic_index: "films".to_string(),
    };

    let config = ElasticConfig::from(&opts);
    assert_eq!(config.url, "https://search.internal:9243");
    assert_eq!(config.index, "films");
    assert_eq!(config.chunk_size, 500);
    assert!(!config.strict);
}

#[test]
fn test_schedule_opts() {
    let opts = ScheduleOpts::try_parse_from(["film-sync", "--interval", "30m", "--once"]).unwrap();
    let schedule = Schedule::from(&opts);
    assert_eq!(schedule.interval, Duration::from_secs(1800));
    assert!(schedule.once);
}

#[test]
fn test_schedule_opts_rejects_bad_interval() {
    assert!(ScheduleOpts::try_parse_from(["film-sync", "--interval", "soon"]).is_err());
}
