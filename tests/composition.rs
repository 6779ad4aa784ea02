//! End-to-end composition scenarios driven through [`Host`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tooldock::{
    AuthAccessor, ComponentFn, EntryFn, EntryPoint, EventKind, GlobalScope, Host, HostConfig, HostExports,
    LinkedEntries, LoadError, LoadPhase, LoadStage, LoopbackTransport, MemoryStore, Module, MountState,
    RawContainer, RealtimeClient, RealtimeConfig, RealtimeError, RemoteDescriptor, RemoteRegistry,
    ScriptHost, SlotView, StaticFetcher, StylesheetInjector,
};

const TOOL_A: &str = "http://localhost:4001";
const TOOL_B: &str = "http://localhost:4002";

struct Page {
    host: Arc<Host>,
    entries: Arc<LinkedEntries>,
    fetch: Arc<StaticFetcher>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn host_with(script_host: Arc<dyn ScriptHost>, fetch: Arc<StaticFetcher>) -> Arc<Host> {
    init_tracing();
    let registry = RemoteRegistry::new([
        RemoteDescriptor::new("toolA", TOOL_A).expose("main", "./App"),
        RemoteDescriptor::new("toolB", TOOL_B).expose("main", "./App"),
    ])
    .unwrap();
    Host::builder(HostConfig::default())
        .with_registry(registry)
        .with_script_host(script_host)
        .with_fetch(fetch)
        .build()
        .unwrap()
}

fn page() -> Page {
    let entries = Arc::new(LinkedEntries::new());
    let fetch = Arc::new(StaticFetcher::new());
    Page {
        host: host_with(entries.clone(), fetch.clone()),
        entries,
        fetch,
    }
}

/// Entry host whose network takes `delay` before the entry runs.
struct SlowHost {
    delay: Duration,
    loads: AtomicUsize,
}

#[async_trait]
impl ScriptHost for SlowHost {
    async fn load_script(&self, _url: &str, globals: &GlobalScope) -> Result<(), String> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        globals.install(
            "toolA",
            RawContainer::builder()
                .expose("./App", || {
                    Ok(Module::component(ComponentFn::new("App", |_| Ok("slow".into()))))
                })
                .build(),
        );
        Ok(())
    }
}

fn slow_host(delay: Duration) -> Arc<SlowHost> {
    Arc::new(SlowHost {
        delay,
        loads: AtomicUsize::new(0),
    })
}

fn rendering(remote: &'static str, markup: &'static str) -> impl EntryPoint {
    EntryFn::new(remote, move |g: &GlobalScope, _: &_| {
        g.install(
            remote,
            RawContainer::builder()
                .init(|_| async { Ok(()) })
                .expose("./App", move || {
                    Ok(Module::component(ComponentFn::new("App", move |_| Ok(markup.to_string()))))
                })
                .build(),
        );
        Ok(())
    })
}

async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test(start_paused = true)]
async fn unreachable_remote_fails_only_its_slot() {
    let Page { host, entries, .. } = page();
    entries.link(format!("{TOOL_B}/remoteEntry.js"), rendering("toolB", "<p>B</p>"));

    let a = host.mount("toolA", "main").unwrap();
    let b = host.mount("toolB", "main").unwrap();

    let MountState::Failed(failure) = a.settled().await else {
        panic!("toolA should fail");
    };
    assert_eq!(failure.stage, LoadStage::Script);
    match &failure.error {
        LoadError::ScriptLoad { remote, url, .. } => {
            assert_eq!(remote, "toolA");
            assert_eq!(url, "http://localhost:4001/remoteEntry.js");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(a.render(&json!({})), SlotView::Failed(_)));
    assert!(!host.document().has_script("http://localhost:4001/remoteEntry.js"));

    assert!(b.settled().await.is_ready());
    assert_eq!(b.render(&json!({})), SlotView::Rendered("<p>B</p>".into()));
}

#[tokio::test(start_paused = true)]
async fn failed_mount_recovers_on_explicit_retry() {
    let Page { host, entries, .. } = page();
    let a = host.mount("toolA", "main").unwrap();
    assert!(matches!(a.settled().await, MountState::Failed(_)));

    // Nothing retries on its own.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(matches!(a.state(), MountState::Failed(_)));
    assert_eq!(a.attempts(), 1);

    entries.link(format!("{TOOL_A}/remoteEntry.js"), rendering("toolA", "<p>A</p>"));
    a.retry().unwrap();
    assert!(a.settled().await.is_ready());
    assert_eq!(a.attempts(), 2);
    assert_eq!(a.render(&json!({})), SlotView::Rendered("<p>A</p>".into()));
}

#[tokio::test(start_paused = true)]
async fn throwing_sibling_leaves_other_slot_rendering() {
    let Page { host, entries, .. } = page();
    entries.link(format!("{TOOL_A}/remoteEntry.js"), rendering("toolA", "<p>A</p>"));
    entries.link(
        format!("{TOOL_B}/remoteEntry.js"),
        EntryFn::new("toolB", |g: &GlobalScope, _: &_| {
            g.install(
                "toolB",
                RawContainer::builder()
                    .expose("./App", || {
                        Ok(Module::component(ComponentFn::new("Broken", |_| {
                            panic!("cannot read properties of undefined")
                        })))
                    })
                    .build(),
            );
            Ok(())
        }),
    );

    let a = host.mount("toolA", "main").unwrap();
    let b = host.mount("toolB", "main").unwrap();
    assert!(a.settled().await.is_ready());
    assert!(b.settled().await.is_ready());

    let SlotView::RenderFailed(err) = b.render(&json!({})) else {
        panic!("toolB should show its error fallback");
    };
    assert_eq!(err.remote, "toolB");
    assert!(err.reason.contains("cannot read properties"));
    assert_eq!(a.render(&json!({})), SlotView::Rendered("<p>A</p>".into()));
}

#[tokio::test(start_paused = true)]
async fn missing_container_times_out_after_poll_budget() {
    let Page { host, entries, .. } = page();
    entries.link(
        format!("{TOOL_A}/remoteEntry.js"),
        EntryFn::new("toolA", |_: &GlobalScope, _: &_| Ok(())),
    );

    let a = host.mount("toolA", "main").unwrap();
    let MountState::Failed(failure) = a.settled().await else {
        panic!("toolA should time out");
    };
    assert_eq!(failure.stage, LoadStage::Container);
    match failure.error {
        LoadError::ContainerTimeout { elapsed, attempts, .. } => {
            assert_eq!(elapsed, Duration::from_millis(5000));
            assert_eq!(attempts, 50);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn unmount_during_load_discards_the_result() {
    let Page { host, entries, .. } = page();
    entries.link(
        format!("{TOOL_A}/remoteEntry.js"),
        EntryFn::new("toolA", |_: &GlobalScope, _: &_| Ok(())),
    );
    let mut events = host.events();

    let a = host.mount("toolA", "main").unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(matches!(a.state(), MountState::Loading(_)));

    // The container shows up after the slot is gone.
    a.unmount();
    host.globals().install(
        "toolA",
        RawContainer::builder()
            .expose("./App", || Ok(Module::value(())))
            .build(),
    );
    tokio::time::sleep(Duration::from_secs(6)).await;

    assert!(matches!(a.state(), MountState::Loading(_)));
    assert_eq!(a.render(&json!({})), SlotView::Unmounted);
    assert!(a.module().is_none());
    assert!(host.document().stylesheet(&StylesheetInjector::element_id("toolA")).is_none());

    let mut kinds = Vec::new();
    while let Ok(ev) = events.try_recv() {
        kinds.push(ev.kind);
    }
    assert!(kinds.contains(&EventKind::MountUnmounted));
    assert!(!kinds.contains(&EventKind::MountReady));
    assert!(!kinds.contains(&EventKind::MountFailed));
}

#[tokio::test(start_paused = true)]
async fn unmount_while_script_is_pending_freezes_the_slot() {
    let scripts = slow_host(Duration::from_secs(2));
    let host = host_with(scripts.clone(), Arc::new(StaticFetcher::new()));

    let a = host.mount("toolA", "main").unwrap();
    let mut state = a.subscribe();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(a.state(), MountState::Loading(LoadPhase::LoadingScript));

    a.unmount();
    state.borrow_and_update();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(scripts.loads.load(Ordering::SeqCst), 1);
    assert!(host.globals().contains("toolA"));
    assert!(!state.has_changed().unwrap());
    assert_eq!(a.state(), MountState::Loading(LoadPhase::LoadingScript));
    assert_eq!(a.render(&json!({})), SlotView::Unmounted);
    assert_eq!(a.settled().await, MountState::Loading(LoadPhase::LoadingScript));
}

#[tokio::test(start_paused = true)]
async fn second_mount_reuses_an_in_flight_script() {
    let scripts = slow_host(Duration::from_millis(400));
    let host = host_with(scripts.clone(), Arc::new(StaticFetcher::new()));
    let mut events = host.events();

    let first = host.mount("toolA", "main").unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = host.mount("toolA", "main").unwrap();

    assert!(first.settled().await.is_ready());
    assert!(second.settled().await.is_ready());
    assert_eq!(scripts.loads.load(Ordering::SeqCst), 1);
    assert_eq!(host.document().scripts().len(), 1);
    assert_eq!(second.render(&json!({})), SlotView::Rendered("slow".into()));

    let mut reused = 0;
    while let Ok(ev) = events.try_recv() {
        if ev.kind == EventKind::ScriptReused {
            reused += 1;
        }
    }
    assert_eq!(reused, 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_mounts_initialize_the_container_once() {
    let Page { host, entries, .. } = page();
    let inits = Arc::new(AtomicUsize::new(0));
    let counter = inits.clone();
    entries.link(
        format!("{TOOL_A}/remoteEntry.js"),
        EntryFn::new("toolA", move |g: &GlobalScope, _: &_| {
            let counter = counter.clone();
            g.install(
                "toolA",
                RawContainer::builder()
                    .init(move |_| {
                        let counter = counter.clone();
                        async move {
                            counter.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(())
                        }
                    })
                    .expose("./App", || {
                        Ok(Module::component(ComponentFn::new("App", |_| Ok("A".into()))))
                    })
                    .build(),
            );
            Ok(())
        }),
    );

    let mounts: Vec<_> = (0..3).map(|_| host.mount("toolA", "main").unwrap()).collect();
    for mount in &mounts {
        assert!(mount.settled().await.is_ready());
    }

    assert_eq!(inits.load(Ordering::SeqCst), 1);
    assert_eq!(host.globals().lookup("toolA").unwrap().init_calls(), 1);
    assert_eq!(host.document().scripts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stylesheet_follows_asset_manifest_and_its_owner() {
    let Page {
        host,
        entries,
        fetch,
    } = page();
    entries.link(format!("{TOOL_A}/remoteEntry.js"), rendering("toolA", "A"));
    fetch.serve_json(
        format!("{TOOL_A}/asset-manifest.json"),
        &json!({ "files": { "main.css": "/static/css/main.1a2b3c.css" } }),
    );
    let id = StylesheetInjector::element_id("toolA");

    let doc = host.document().clone();
    let first = host.mount("toolA", "main").unwrap();
    assert!(first.settled().await.is_ready());
    assert!(eventually(|| doc.stylesheet(&id).is_some()).await);

    let second = host.mount("toolA", "main").unwrap();
    assert!(second.settled().await.is_ready());
    tokio::time::sleep(Duration::from_millis(50)).await;
    let record = doc.stylesheet(&id).unwrap();
    assert_eq!(record.href, "http://localhost:4001/static/css/main.1a2b3c.css");
    assert_eq!(record.owner, first.id());
    assert_eq!(doc.stylesheets().len(), 1);

    second.unmount();
    assert!(doc.stylesheet(&id).is_some());
    first.unmount();
    assert!(doc.stylesheet(&id).is_none());
}

#[tokio::test(start_paused = true)]
async fn stylesheet_falls_back_to_default_path() {
    let Page { host, entries, .. } = page();
    entries.link(format!("{TOOL_B}/remoteEntry.js"), rendering("toolB", "B"));
    let mut events = host.events();

    let b = host.mount("toolB", "main").unwrap();
    assert!(b.settled().await.is_ready());

    let doc = host.document().clone();
    let id = StylesheetInjector::element_id("toolB");
    assert!(eventually(|| doc.stylesheet(&id).is_some()).await);
    assert_eq!(
        doc.stylesheet(&id).unwrap().href,
        "http://localhost:4002/static/css/main.css"
    );

    let mut fell_back = false;
    while let Ok(ev) = events.try_recv() {
        fell_back |= ev.kind == EventKind::StylesheetFallback;
    }
    assert!(fell_back);
}

#[tokio::test(start_paused = true)]
async fn remotes_reach_host_exports() {
    init_tracing();
    let auth = AuthAccessor::new();
    let realtime = Arc::new(RealtimeClient::new(
        Arc::new(LoopbackTransport::silent()),
        &RealtimeConfig::default(),
    ));
    let exports = HostExports::new(auth, Arc::new(MemoryStore::new()), realtime.clone());
    let host = Host::builder(HostConfig::default())
        .with_script_host(Arc::new(LinkedEntries::new()))
        .with_fetch(Arc::new(StaticFetcher::new()))
        .with_exports(exports)
        .build()
        .unwrap();

    let imports = host.imports().await.unwrap();
    assert!(Arc::ptr_eq(&imports.realtime, &realtime));
    assert!(imports.auth.current().is_none());

    // An unanswered request gives up after 30s and clears the loading flag.
    let client = imports.realtime.clone();
    let pending = tokio::spawn(async move { client.request("listTickets", json!({})).await });
    assert!(eventually(|| realtime.is_loading()).await);

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, RealtimeError::RequestTimeout { timeout, .. } if timeout == Duration::from_secs(30)));
    assert!(!realtime.is_loading());
}
