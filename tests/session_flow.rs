use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use servicevisor::events::START_SERVICES;
use servicevisor::settings::{CRON_ON_SERVICE_START, LOADER_TIMEOUT};
use servicevisor::{
    Action, Address, CronScheduler, LoaderError, ServiceError, ServiceFn, ServiceRef, Session,
    SessionBuilder, SessionConfig,
};
use tokio::sync::broadcast;

fn session() -> Session {
    SessionBuilder::new(SessionConfig::default())
        .build()
        .expect("session")
}

fn ok_service(name: &'static str) -> ServiceRef {
    ServiceFn::arc(name, |_s: Session| async { Ok::<_, ServiceError>(()) })
}

fn slow_service(name: &'static str, delay: Duration) -> ServiceRef {
    ServiceFn::arc(name, move |_s: Session| async move {
        tokio::time::sleep(delay).await;
        Ok::<_, ServiceError>(())
    })
}

fn hanging_service(name: &'static str) -> ServiceRef {
    ServiceFn::arc(name, |s: Session| async move {
        s.token().cancelled().await;
        Err::<(), _>(ServiceError::Canceled)
    })
}

fn failing_service(name: &'static str) -> ServiceRef {
    ServiceFn::arc(name, |_s: Session| async {
        Err::<(), _>(ServiceError::fail("connection refused"))
    })
}

/// Drains `rx` and returns every start request seen so far.
fn start_requests(rx: &mut broadcast::Receiver<servicevisor::Event>) -> Vec<Vec<String>> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        if ev.is(&START_SERVICES) {
            out.push(
                ev.payload()
                    .values_with_prefix("service.")
                    .map(str::to_string)
                    .collect(),
            );
        }
    }
    out
}

#[tokio::test]
async fn concurrent_loads_close_once() {
    let s = session();
    s.register("db", slow_service("db", Duration::from_millis(150)))
        .unwrap();
    let mut rx = s.subscribe();

    let loader = Arc::new(s.loader(["db"]));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let loader = Arc::clone(&loader);
        handles.push(tokio::spawn(async move {
            loader.load().wait().await;
            loader.err()
        }));
    }
    for h in handles {
        assert_eq!(h.await.unwrap(), Ok(()));
    }

    assert_eq!(start_requests(&mut rx).len(), 1);
    assert!(loader.load().is_closed());
}

#[tokio::test]
async fn unknown_service_fails_without_waiting() {
    let s = session();
    s.set(LOADER_TIMEOUT, "5s");
    s.register("db", ok_service("db")).unwrap();

    let started = Instant::now();
    let err = s.loader(["db", "missing"]).wait().await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(err.to_string().contains("svc://localhost/app/missing"));
}

#[tokio::test]
async fn already_running_services_are_skipped() {
    let s = session();
    let a = s.register("a", ok_service("a")).unwrap();
    s.register("b", slow_service("b", Duration::from_millis(150)))
        .unwrap();

    s.loader(["a"]).wait().await.unwrap();
    assert!(s.service_info(&a.to_string()).unwrap().running());

    let mut rx = s.subscribe();
    s.loader(["a", "b"]).wait().await.unwrap();

    let requests = start_requests(&mut rx);
    assert_eq!(requests, vec![vec!["svc://localhost/app/b".to_string()]]);
    assert!(s.service_info("svc://localhost/app/b").unwrap().running());
}

#[tokio::test]
async fn deadline_names_stragglers() {
    let s = session();
    s.set(LOADER_TIMEOUT, "200ms");
    s.register("stuck", hanging_service("stuck")).unwrap();

    let started = Instant::now();
    let err = s.loader(["stuck"]).wait().await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(600), "{elapsed:?}");

    let leaves: Vec<&LoaderError> = err.iter().collect();
    assert_eq!(
        leaves[0],
        &LoaderError::NotLoadedOnTime {
            address: "svc://localhost/app/stuck".into()
        }
    );
    assert!(matches!(leaves[1], LoaderError::DeadlineExceeded { .. }));
    assert!(err.to_string().contains("svc://localhost/app/stuck"));
}

#[tokio::test]
async fn failed_service_short_circuits() {
    let s = session();
    s.set(LOADER_TIMEOUT, "10s");
    s.register("broken", failing_service("broken")).unwrap();
    s.register("slow", slow_service("slow", Duration::from_secs(5)))
        .unwrap();

    let started = Instant::now();
    let err = s.loader(["broken", "slow"]).wait().await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(2));

    let leaves: Vec<&LoaderError> = err.iter().collect();
    assert!(leaves.iter().any(|e| matches!(
        e,
        LoaderError::Service { address, error: ServiceError::Fail { .. } }
            if address == "svc://localhost/app/broken"
    )));
    assert!(matches!(
        leaves.last(),
        Some(LoaderError::StartFailed { addresses }) if addresses == &vec!["svc://localhost/app/broken".to_string()]
    ));
}

#[tokio::test]
async fn equivalent_references_collapse() {
    let s = session();
    s.register("db", ok_service("db")).unwrap();
    let mut rx = s.subscribe();

    let loader = s.loader(["db", "/db/", "svc://localhost/app/db", "svc://LOCALHOST/app/db"]);
    assert_eq!(loader.requested().len(), 1);
    loader.wait().await.unwrap();

    assert_eq!(
        start_requests(&mut rx),
        vec![vec!["svc://localhost/app/db".to_string()]]
    );
}

#[tokio::test]
async fn err_is_guarded_while_loading() {
    let s = session();
    s.register("slow", slow_service("slow", Duration::from_millis(300)))
        .unwrap();

    let loader = s.loader(["slow"]);
    let done = loader.load();
    assert!(loader.is_loading());
    assert_eq!(loader.err(), Err(LoaderError::NotFinished));

    done.wait().await;
    assert_eq!(loader.err(), Ok(()));
}

#[tokio::test]
async fn shutdown_ends_pending_loads() {
    let s = session();
    s.register("stuck", hanging_service("stuck")).unwrap();

    let loader = s.loader(["stuck"]);
    let done = loader.load();
    tokio::time::sleep(Duration::from_millis(50)).await;
    s.shutdown().await.unwrap();

    tokio::time::timeout(Duration::from_secs(1), done.wait())
        .await
        .unwrap();
    let err = loader.err().unwrap_err();
    assert!(err.iter().any(|e| matches!(e, LoaderError::SessionDestroyed)));
}

#[test]
fn resolved_addresses_round_trip() {
    let host = Address::parse("svc://Example.COM/instance-1").unwrap();
    for reference in ["db", "cache/redis", "/queue/", "svc://example.com/instance-1/a/b.c"] {
        let addr = host.resolve_service(reference).unwrap();
        let again = Address::parse(&addr.to_string()).unwrap();
        assert_eq!(again, addr, "{reference}");
    }
}

#[tokio::test]
async fn cron_runs_jobs_on_start_and_drains_on_stop() {
    let s = SessionBuilder::new(SessionConfig::default())
        .with_setting(CRON_ON_SERVICE_START, true)
        .build()
        .unwrap();
    let cron = CronScheduler::new(s);

    let finished = Arc::new(AtomicUsize::new(0));
    for (name, expr) in [("nightly", "0 3 * * *"), ("yearly", "@yearly")] {
        let finished = Arc::clone(&finished);
        cron.job(
            name,
            expr,
            Action::new(move |_s: Session| {
                let finished = Arc::clone(&finished);
                async move {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ServiceError>(())
                }
            }),
        )
        .unwrap();
    }

    cron.start();
    cron.stop().await;
    assert_eq!(finished.load(Ordering::SeqCst), 2);
}
